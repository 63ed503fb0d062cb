//! Seam to the credential-encryption service.
//!
//! Portal sessions keep autologon passwords only as the opaque token returned
//! by [`CredentialCipher::encrypt`]. The key material lives with the service;
//! every token is bound to the application, backend, user and purpose it was
//! issued for.

use async_trait::async_trait;

/// Purpose tag of autologon secrets. Part of the token binding, so it must
/// not change while tokens issued under it are alive.
pub const AUTOLOGON_PURPOSE: &str = "vlt_autologon_password";

/// What a credential token is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialScope<'a> {
    pub app_id: &'a str,
    pub backend_id: &'a str,
    pub username: &'a str,
    pub purpose: &'a str,
}

/// Display names recorded alongside a freshly encrypted credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialLabels<'a> {
    pub app_name: &'a str,
    pub backend_name: &'a str,
}

#[async_trait]
pub trait CredentialCipher: Send + Sync {
    /// Encrypts `plaintext` and returns the token to store.
    async fn encrypt(
        &self,
        scope: &CredentialScope<'_>,
        labels: &CredentialLabels<'_>,
        plaintext: &str,
    ) -> Result<String, String>;

    /// Decrypts a token previously returned by `encrypt` for the same scope.
    async fn decrypt(&self, token: &str, scope: &CredentialScope<'_>) -> Result<String, String>;
}
