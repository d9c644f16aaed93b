// src/payload.rs - 网络凭据 → WIFI-URI 载荷

use crate::types::NetworkCredential;

/// 转义后的 WIFI-URI 字符串，生成后不可变
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodedPayload(String);

impl EncodedPayload {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for EncodedPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// 生成扫码入网用的载荷：
/// `WIFI:S:<ssid>;T:<WPA|WEP>;P:<password>;H:true;;`
///
/// 开放网络不输出 `T:` 与 `P:`，非隐藏网络不输出 `H:`。
/// 不做大小写、空白或长度处理，对任意输入都不会失败。
pub fn encode(cred: &NetworkCredential) -> EncodedPayload {
    let ssid_esc = escape_wifi_field(&cred.ssid);

    let mut out = String::with_capacity(ssid_esc.len() + 32);
    out.push_str("WIFI:S:");
    out.push_str(&ssid_esc);
    out.push(';');

    if let Some(token) = cred.security.wifi_token() {
        let pass_esc = escape_wifi_field(cred.effective_password().unwrap_or(""));
        out.push_str("T:");
        out.push_str(token);
        out.push(';');
        out.push_str("P:");
        out.push_str(&pass_esc);
        out.push(';');
    }

    if cred.hidden {
        out.push_str("H:true;");
    }

    out.push(';');
    EncodedPayload(out)
}

/// 转义 WIFI-URI 中的保留字符（\ ; , : "）
pub fn escape_wifi_field(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for c in s.chars() {
        match c {
            '\\' | ';' | ',' | ':' | '"' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}
