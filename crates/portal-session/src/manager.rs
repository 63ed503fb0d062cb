//! Shared entry point handing out session objects.

use std::sync::Arc;

use portal_store::{StoreClient, StoreConfig};

use crate::app::AppSession;
use crate::config::SessionSettings;
use crate::credentials::CredentialCipher;
use crate::error::SessionResult;
use crate::oauth2::Oauth2Session;
use crate::openid::OpenIdSession;
use crate::portal::PortalSession;

/// Cheap to clone; one per process.
#[derive(Clone)]
pub struct SessionManager {
    store: StoreClient,
    settings: Arc<SessionSettings>,
    credentials: Option<Arc<dyn CredentialCipher>>,
}

impl SessionManager {
    pub fn new(store: StoreClient, settings: SessionSettings) -> Self {
        Self {
            store,
            settings: Arc::new(settings),
            credentials: None,
        }
    }

    /// Connects to the configured store. Fails when no node is reachable.
    pub async fn connect(store: &StoreConfig, settings: SessionSettings) -> SessionResult<Self> {
        let client = StoreClient::connect(store).await?;
        Ok(Self::new(client, settings))
    }

    /// Enables autologon secrets on portal sessions.
    #[must_use]
    pub fn with_credentials(mut self, cipher: Arc<dyn CredentialCipher>) -> Self {
        self.credentials = Some(cipher);
        self
    }

    pub fn store(&self) -> &StoreClient {
        &self.store
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Portal session for `cookie`, or a new one when the browser has none.
    pub async fn portal(&self, cookie: Option<&str>) -> PortalSession {
        PortalSession::open(
            self.store.clone(),
            self.settings.clone(),
            self.credentials.clone(),
            cookie,
        )
        .await
    }

    /// Portal session for `cookie`; `NotFound` when nothing is stored under it.
    pub async fn existing_portal(&self, cookie: &str) -> SessionResult<PortalSession> {
        PortalSession::open_existing(
            self.store.clone(),
            self.settings.clone(),
            self.credentials.clone(),
            cookie,
        )
        .await
    }

    pub async fn app(&self, cookie: &str) -> SessionResult<AppSession> {
        AppSession::open(self.store.clone(), self.settings.clone(), cookie).await
    }

    pub async fn oauth2(&self, token: &str) -> Oauth2Session {
        Oauth2Session::open(self.store.clone(), token).await
    }

    pub async fn openid(&self, code: &str) -> OpenIdSession {
        OpenIdSession::open(self.store.clone(), self.settings.clone(), code).await
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("settings", &self.settings)
            .field("credentials", &self.credentials.is_some())
            .finish_non_exhaustive()
    }
}
