// src/history.rs - 本次登录会话内生成过的卡片（原子写，不保存密码）

use crate::types::{NetworkCredential, Security};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: u64, // Unix timestamp（秒）
    pub ssid: String,
    pub security: Security,
    pub hidden: bool,
    pub artifacts: Vec<PathBuf>,
}

impl HistoryEntry {
    pub fn new(cred: &NetworkCredential, artifacts: Vec<PathBuf>) -> Self {
        Self {
            timestamp: now(),
            ssid: cred.ssid.clone(),
            security: cred.security,
            hidden: cred.hidden,
            artifacts,
        }
    }
}

#[derive(Default, Serialize, Deserialize)]
struct HistoryFile {
    entries: Vec<HistoryEntry>,
}

/// 读取历史；文件不存在或损坏时返回空列表
pub fn read(path: &Path) -> Vec<HistoryEntry> {
    let Ok(text) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    match serde_json::from_str::<HistoryFile>(&text) {
        Ok(f) => f.entries,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "历史文件损坏，已忽略");
            Vec::new()
        }
    }
}

/// 追加一条，超出上限时丢弃最旧的
pub fn append(path: &Path, entry: HistoryEntry, limit: usize) -> Result<()> {
    let mut entries = read(path);
    entries.push(entry);
    if entries.len() > limit {
        let excess = entries.len() - limit;
        entries.drain(..excess);
    }
    write(path, &entries)
}

/// 原子写：先写临时文件再 rename，读者不会看到写一半的数据
fn write(path: &Path, entries: &[HistoryEntry]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    let json = serde_json::to_string(&HistoryFile { entries: entries.to_vec() })?;
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// 清空历史
pub fn clear(path: &Path) {
    let _ = std::fs::remove_file(path);
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cred(ssid: &str) -> NetworkCredential {
        NetworkCredential::new(ssid, Some("TopSecret!".into()), Security::Wpa, true)
    }

    #[test]
    fn appends_and_bounds_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        for name in ["a", "b", "c"] {
            append(&path, HistoryEntry::new(&cred(name), vec![]), 2).unwrap();
        }
        let entries = read(&path);
        let names: Vec<_> = entries.iter().map(|e| e.ssid.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);
        assert!(entries[0].hidden);
    }

    #[test]
    fn never_writes_passwords() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        append(&path, HistoryEntry::new(&cred("Home"), vec![PathBuf::from("GuestPass_Home.png")]), 5).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("TopSecret"));
        assert!(raw.contains("GuestPass_Home.png"));
    }

    #[test]
    fn missing_or_corrupt_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        assert!(read(&path).is_empty());
        std::fs::write(&path, "{not json").unwrap();
        assert!(read(&path).is_empty());
        clear(&path);
        assert!(!path.exists());
    }
}
