//! Session lifetime settings.

use serde::{Deserialize, Serialize};

/// Tunables shared by every session kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// TTL in seconds applied when an operation is given no explicit timeout.
    #[serde(default = "default_timeout")]
    pub default_timeout: u64,
    /// TTL of OpenID bridging records. They only live for one redirect.
    #[serde(default = "default_openid_ttl")]
    pub openid_ttl: u64,
    /// Upper bound on `HSCAN` round trips when listing SSO backends.
    #[serde(default = "default_max_scan_pages")]
    pub max_scan_pages: usize,
    /// `COUNT` hint sent with each `HSCAN`; the engine default when unset.
    #[serde(default)]
    pub scan_page_size: Option<usize>,
    /// Directory of Kerberos credential caches handed to the proxy.
    #[serde(default = "default_krb5_cache_dir")]
    pub krb5_cache_dir: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            default_timeout: default_timeout(),
            openid_ttl: default_openid_ttl(),
            max_scan_pages: default_max_scan_pages(),
            scan_page_size: None,
            krb5_cache_dir: default_krb5_cache_dir(),
        }
    }
}

impl SessionSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.default_timeout == 0 {
            return Err("sessions.default_timeout must be > 0".into());
        }
        if self.openid_ttl == 0 {
            return Err("sessions.openid_ttl must be > 0".into());
        }
        if self.max_scan_pages == 0 {
            return Err("sessions.max_scan_pages must be > 0".into());
        }
        if self.scan_page_size == Some(0) {
            return Err("sessions.scan_page_size must be > 0 when set".into());
        }
        Ok(())
    }

    /// Resolves an optional per-call timeout against the default.
    #[must_use]
    pub fn timeout_or_default(&self, timeout: Option<u64>) -> u64 {
        match timeout {
            Some(t) if t > 0 => t,
            _ => self.default_timeout,
        }
    }
}

const fn default_timeout() -> u64 {
    900
}

const fn default_openid_ttl() -> u64 {
    30
}

const fn default_max_scan_pages() -> usize {
    50
}

fn default_krb5_cache_dir() -> String {
    "/tmp".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = SessionSettings::default();
        assert_eq!(settings.default_timeout, 900);
        assert_eq!(settings.openid_ttl, 30);
        assert_eq!(settings.max_scan_pages, 50);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn zero_timeout_falls_back_to_default() {
        let settings = SessionSettings::default();
        assert_eq!(settings.timeout_or_default(None), 900);
        assert_eq!(settings.timeout_or_default(Some(0)), 900);
        assert_eq!(settings.timeout_or_default(Some(60)), 60);
    }

    #[test]
    fn validation() {
        let settings = SessionSettings {
            scan_page_size: Some(0),
            ..SessionSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}
