//! The `_appglobal` section: process-wide settings (spec §6).

/// Discovery/state-query method selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryMethod {
    /// Native management API (`wmi` in spec terms).
    Native,
    /// External shell command (`ps` in spec terms).
    Shell,
}

impl DiscoveryMethod {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "wmi" => Some(DiscoveryMethod::Native),
            "ps" => Some(DiscoveryMethod::Shell),
            _ => None,
        }
    }
}

/// Sender sink selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderType {
    Print,
    Send,
}

impl SenderType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "print" => Some(SenderType::Print),
            "send" => Some(SenderType::Send),
            _ => None,
        }
    }
}

/// Process-wide settings from the `_appglobal` INI section, with the same
/// defaults as the original's `configparser` fallbacks (spec §6).
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub interval: u64,
    pub logfile: Option<String>,
    pub loglevel: Option<String>,
    pub discovery_method: DiscoveryMethod,
    pub discovery_prefproto: String,
    pub discovery_prefhost: Option<String>,
    pub sender_type: SenderType,
    pub zbx_srv: String,
    pub zbx_port: u16,
    pub zbx_host: Option<String>,
    pub check_method: DiscoveryMethod,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            interval: 300,
            logfile: None,
            loglevel: None,
            discovery_method: DiscoveryMethod::Shell,
            discovery_prefproto: "https".to_string(),
            discovery_prefhost: None,
            sender_type: SenderType::Print,
            zbx_srv: "127.0.0.1".to_string(),
            zbx_port: 10051,
            zbx_host: None,
            check_method: DiscoveryMethod::Shell,
        }
    }
}
