// src/scan.rs - 附近网络发现：nmcli 实现 + 模拟数据源，接口相同可互换

use crate::types::{AccessPoint, Security};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::process::Command;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Discovery {
    #[default]
    Nmcli,
    Mock,
}

#[allow(async_fn_in_trait)]
pub trait NetworkSource {
    /// 返回附近的接入点，当前连接的置顶，其余按信号强度降序
    async fn scan(&self) -> Result<Vec<AccessPoint>>;
}

/// 调用 NetworkManager 的 nmcli
#[derive(Debug, Clone, Copy, Default)]
pub struct NmcliSource {
    /// 列表前先触发一次重新扫描
    pub rescan: bool,
}

impl NetworkSource for NmcliSource {
    async fn scan(&self) -> Result<Vec<AccessPoint>> {
        if self.rescan {
            // 触发扫描失败不影响读取已有结果
            let _ = Command::new("nmcli")
                .args(["dev", "wifi", "rescan"])
                .output()
                .await;
        }

        let out = Command::new("nmcli")
            .env("LANGUAGE", "C")
            .args(["--fields", "IN-USE,SSID,SECURITY,SIGNAL", "--terse", "device", "wifi", "list"])
            .output()
            .await
            .map_err(|e| anyhow!("无法运行 nmcli: {e}"))?;
        if !out.status.success() {
            return Err(anyhow!(
                "nmcli 执行失败: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            ));
        }

        let aps = parse_list(&String::from_utf8_lossy(&out.stdout));
        tracing::debug!(count = aps.len(), "nmcli 扫描完成");
        Ok(aps)
    }
}

/// 模拟扫描：没有无线电权限时给界面一个可用的列表
#[derive(Debug, Clone)]
pub struct MockSource {
    pub networks: Vec<AccessPoint>,
}

impl Default for MockSource {
    fn default() -> Self {
        let ap = |ssid: &str, security, signal| AccessPoint {
            ssid: ssid.to_string(),
            security,
            signal,
            in_use: false,
        };
        Self {
            networks: vec![
                ap("Home_5G", Security::Wpa, 92),
                ap("Home_2.4G", Security::Wpa, 78),
                ap("Cafe Free", Security::Open, 55),
                ap("Office-Guest", Security::Wpa, 41),
                ap("Legacy_Printer", Security::Wep, 23),
            ],
        }
    }
}

impl NetworkSource for MockSource {
    async fn scan(&self) -> Result<Vec<AccessPoint>> {
        let mut aps = self.networks.clone();
        sort_and_dedup(&mut aps);
        Ok(aps)
    }
}

/// 解析 `nmcli --terse` 输出
pub fn parse_list(stdout: &str) -> Vec<AccessPoint> {
    let mut aps: Vec<AccessPoint> = stdout.lines().filter_map(parse_ap_line).collect();
    sort_and_dedup(&mut aps);
    aps
}

fn sort_and_dedup(aps: &mut Vec<AccessPoint>) {
    // 信号强度降序，当前连接的始终置顶
    aps.sort_by(|a, b| b.in_use.cmp(&a.in_use).then(b.signal.cmp(&a.signal)));
    // 同一 SSID 可能出现在多个信道，保留排在前面的
    let mut seen = std::collections::HashSet::new();
    aps.retain(|ap| seen.insert(ap.ssid.clone()));
}

/// 格式: IN-USE:SSID:SECURITY:SIGNAL，SSID 中的 ':' 被 nmcli 转义为 '\:'
fn parse_ap_line(line: &str) -> Option<AccessPoint> {
    let parts = split_terse(line);
    if parts.len() < 4 {
        return None;
    }

    let in_use = parts[0].trim() == "*";
    let ssid = parts[1].clone();
    let security = Security::from(parts[2].trim());
    let signal = parts[3].trim().parse::<u8>().unwrap_or(0).min(100);

    if ssid.is_empty() || ssid == "--" {
        return None;
    }

    Some(AccessPoint {
        ssid,
        security,
        signal,
        in_use,
    })
}

/// 按未转义的 ':' 切分，并还原 '\:' 与 '\\'
fn split_terse(line: &str) -> Vec<String> {
    let mut fields = vec![String::new()];
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let (Some(next), Some(cur)) = (chars.next(), fields.last_mut()) {
                    cur.push(next);
                }
            }
            ':' => fields.push(String::new()),
            _ => {
                if let Some(cur) = fields.last_mut() {
                    cur.push(c);
                }
            }
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_terse_output() {
        let out = "\
 :Cafe Free::40
*:Home_5G:WPA2:88
 :Home_5G:WPA2:60
 :Lab\\:Net:WPA1 WPA2:95
 :--:WPA2:10
 ::WPA2:10
 :Old:WEP:30
";
        let aps = parse_list(out);
        let names: Vec<_> = aps.iter().map(|a| a.ssid.as_str()).collect();
        assert_eq!(names, vec!["Home_5G", "Lab:Net", "Cafe Free", "Old"]);
        assert!(aps[0].in_use);
        assert_eq!(aps[0].signal, 88);
        assert_eq!(aps[1].security, Security::Wpa);
        assert_eq!(aps[2].security, Security::Open);
        assert_eq!(aps[3].security, Security::Wep);
    }

    #[test]
    fn short_lines_are_skipped() {
        assert!(parse_list("garbage\n*:only\n").is_empty());
    }

    #[tokio::test]
    async fn mock_source_is_sorted_by_signal() {
        let aps = MockSource::default().scan().await.unwrap();
        assert_eq!(aps.len(), 5);
        assert!(aps.windows(2).all(|w| w[0].signal >= w[1].signal));
    }
}
