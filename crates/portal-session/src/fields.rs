//! Field-naming grammar shared with the proxy.
//!
//! The proxy reads and writes the same hashes independently, so these names
//! are a wire format: they must be reproduced exactly.

use std::fmt;

/// Fields with this prefix are written through their own `HSET` and never by
/// a batched commit.
pub const USER_INFOS_PREFIX: &str = "user_infos_";

/// Name of the secondary key mirroring one flag of `base`.
#[must_use]
pub fn marker_key(base: &str, suffix: &str) -> String {
    format!("{base}_{suffix}")
}

/// Fields of an application session hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppField {
    Authenticated,
    Login,
    ApplicationId,
    OtpRetries,
    /// Header-injection text, `"name:value\r\n"` lines.
    Headers,
    Krb5CcName,
    Krb5Service,
}

impl AppField {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authenticated => "authenticated",
            Self::Login => "login",
            Self::ApplicationId => "application_id",
            Self::OtpRetries => "otp_retries",
            Self::Headers => "headers",
            Self::Krb5CcName => "krb5ccname",
            Self::Krb5Service => "krb5service",
        }
    }
}

impl fmt::Display for AppField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields of a portal session hash.
///
/// | variant | stored name |
/// |---|---|
/// | `App(id)` | `<id>` |
/// | `PortalFlag(x)` | `portal_<x>` |
/// | `AppBackend(app)` | `backend_<app>` |
/// | `AppUrl(app)` | `url_<app>` |
/// | `AuthBackend(b)` | `auth_backend_<b>` |
/// | `Login(b)` | `login_<b>` |
/// | `Oauth2Token(b)` | `oauth2_<b>` |
/// | `Password(b)` | `password_<b>` |
/// | `AppIdOf(b)` | `app_id_<b>` |
/// | `UserInfos(b)` | `user_infos_<b>` |
/// | `DoubleAuthenticated(otp)` | `doubleauthenticated_<otp>` |
/// | `OtpRetries(repo)` | `otp_retries_<repo>` |
/// | `Captcha(workflow)` | `captcha_<workflow>` |
/// | `Otp` | `otp` |
/// | `LegacyOtpRetries` | `otp_retries` |
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PortalField {
    App(String),
    PortalFlag(String),
    AppBackend(String),
    AppUrl(String),
    AuthBackend(String),
    Login(String),
    Oauth2Token(String),
    Password(String),
    AppIdOf(String),
    UserInfos(String),
    DoubleAuthenticated(String),
    OtpRetries(String),
    Captcha(String),
    Otp,
    LegacyOtpRetries,
}

// Longer prefixes first: "auth_backend_" must win over "backend_".
const PREFIXES: &[(&str, fn(String) -> PortalField)] = &[
    ("auth_backend_", PortalField::AuthBackend),
    ("doubleauthenticated_", PortalField::DoubleAuthenticated),
    ("otp_retries_", PortalField::OtpRetries),
    ("user_infos_", PortalField::UserInfos),
    ("password_", PortalField::Password),
    ("captcha_", PortalField::Captcha),
    ("backend_", PortalField::AppBackend),
    ("oauth2_", PortalField::Oauth2Token),
    ("portal_", PortalField::PortalFlag),
    ("app_id_", PortalField::AppIdOf),
    ("login_", PortalField::Login),
    ("url_", PortalField::AppUrl),
];

impl PortalField {
    pub fn app(id: impl fmt::Display) -> Self {
        Self::App(id.to_string())
    }

    pub fn app_backend(app_id: impl fmt::Display) -> Self {
        Self::AppBackend(app_id.to_string())
    }

    pub fn auth_backend(backend_id: impl fmt::Display) -> Self {
        Self::AuthBackend(backend_id.to_string())
    }

    pub fn login(backend_id: impl fmt::Display) -> Self {
        Self::Login(backend_id.to_string())
    }

    pub fn oauth2_token(backend_id: impl fmt::Display) -> Self {
        Self::Oauth2Token(backend_id.to_string())
    }

    /// Classifies a stored field name.
    ///
    /// Names matching none of the prefixed patterns are application flags.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name {
            "otp" => return Self::Otp,
            "otp_retries" => return Self::LegacyOtpRetries,
            _ => {}
        }
        for (prefix, build) in PREFIXES {
            if let Some(rest) = name.strip_prefix(prefix) {
                return build(rest.to_string());
            }
        }
        Self::App(name.to_string())
    }

    /// The stored field name.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::App(id) => id.clone(),
            Self::PortalFlag(x) => format!("portal_{x}"),
            Self::AppBackend(app) => format!("backend_{app}"),
            Self::AppUrl(app) => format!("url_{app}"),
            Self::AuthBackend(b) => format!("auth_backend_{b}"),
            Self::Login(b) => format!("login_{b}"),
            Self::Oauth2Token(b) => format!("oauth2_{b}"),
            Self::Password(b) => format!("password_{b}"),
            Self::AppIdOf(b) => format!("app_id_{b}"),
            Self::UserInfos(b) => format!("{USER_INFOS_PREFIX}{b}"),
            Self::DoubleAuthenticated(otp) => format!("doubleauthenticated_{otp}"),
            Self::OtpRetries(repo) => format!("otp_retries_{repo}"),
            Self::Captcha(workflow) => format!("captcha_{workflow}"),
            Self::Otp => "otp".to_string(),
            Self::LegacyOtpRetries => "otp_retries".to_string(),
        }
    }

    /// Suffix of the marker key `<portal_key>_<suffix>` this field owns, if any.
    ///
    /// Only application flags (`<app_id>`) and proxy portal flags
    /// (`portal_<x>`) are mirrored by a marker key.
    #[must_use]
    pub fn marker_suffix(&self) -> Option<String> {
        match self {
            Self::App(_) | Self::PortalFlag(_) => Some(self.name()),
            _ => None,
        }
    }
}

impl fmt::Display for PortalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Field names of an OAuth2 session hash.
pub mod oauth2 {
    pub const TOKEN_TTL: &str = "token_ttl";
    pub const SCOPE: &str = "scope";
    pub const REPO: &str = "repo";
}

/// Field written by every OpenID bridging record.
pub const ACCESS_TOKEN: &str = "access_token";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_every_pattern() {
        let fields = [
            PortalField::app("42"),
            PortalField::PortalFlag("7".into()),
            PortalField::app_backend("42"),
            PortalField::AppUrl("42".into()),
            PortalField::auth_backend("7"),
            PortalField::login("7"),
            PortalField::oauth2_token("7"),
            PortalField::Password("7".into()),
            PortalField::AppIdOf("7".into()),
            PortalField::UserInfos("7".into()),
            PortalField::DoubleAuthenticated("otp1".into()),
            PortalField::OtpRetries("otp1".into()),
            PortalField::Captcha("wf".into()),
            PortalField::Otp,
            PortalField::LegacyOtpRetries,
        ];
        for field in fields {
            assert_eq!(PortalField::parse(&field.name()), field, "{field}");
        }
    }

    #[test]
    fn auth_backend_is_not_an_app_backend() {
        assert_eq!(
            PortalField::parse("auth_backend_7"),
            PortalField::AuthBackend("7".into())
        );
        assert_eq!(
            PortalField::parse("backend_42"),
            PortalField::AppBackend("42".into())
        );
    }

    #[test]
    fn unprefixed_names_are_app_flags() {
        assert_eq!(PortalField::parse("42"), PortalField::App("42".into()));
        // Application ids may contain underscores of their own.
        assert_eq!(
            PortalField::parse("my_app"),
            PortalField::App("my_app".into())
        );
    }

    #[test]
    fn marker_suffixes() {
        assert_eq!(PortalField::app("42").marker_suffix().as_deref(), Some("42"));
        assert_eq!(
            PortalField::PortalFlag("3".into()).marker_suffix().as_deref(),
            Some("portal_3")
        );
        assert_eq!(PortalField::auth_backend("7").marker_suffix(), None);
        assert_eq!(PortalField::Otp.marker_suffix(), None);
        assert_eq!(marker_key("abc", "42"), "abc_42");
    }

    #[test]
    fn app_field_names() {
        assert_eq!(AppField::Authenticated.as_str(), "authenticated");
        assert_eq!(AppField::Krb5CcName.to_string(), "krb5ccname");
    }
}
