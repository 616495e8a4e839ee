//! Wiring of the agent's components from a [`Config`].

use crate::config::Config;
use crate::error::Result;
use crate::gateway::{HttpGateway, RemoteGateway};
use crate::location::LocationCapture;
use crate::session::FileSessionProvider;
use crate::store::LocalStore;
use crate::sync::{SingleFlight, SyncOrchestrator};
use std::sync::Arc;

/// Application state shared by the binary and the FFI entry points.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: LocalStore,
    pub http: Arc<HttpGateway>,
    pub session: Arc<FileSessionProvider>,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub capture: Arc<LocationCapture>,
}

impl AppState {
    pub async fn open(config: &Config) -> Result<Self> {
        Self::open_with_flight(config, SingleFlight::new()).await
    }

    /// Open the state with a single-flight gate shared beyond this instance.
    pub async fn open_with_flight(config: &Config, flight: SingleFlight) -> Result<Self> {
        let store = LocalStore::open(&config.database_url).await?;
        let session = Arc::new(FileSessionProvider::new(&config.session_path));

        let mut http = HttpGateway::new(
            &config.remote_url,
            config.api_key.clone(),
            config.request_timeout(),
        )?;
        // An unreadable session only costs the user token; the API key still works.
        match session.access_token() {
            Ok(Some(token)) => http = http.with_bearer_token(token),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(path = %session.path().display(), error = %e, "session unreadable, using the API key");
            }
        }
        let http = Arc::new(http);
        let gateway: Arc<dyn RemoteGateway> = http.clone();

        let orchestrator = Arc::new(
            SyncOrchestrator::new(store.clone(), gateway.clone(), config.sync_options())
                .with_single_flight(flight),
        );
        let capture = Arc::new(LocationCapture::new(
            store.clone(),
            gateway,
            session.clone(),
        ));

        Ok(Self {
            config: Arc::new(config.clone()),
            store,
            http,
            session,
            orchestrator,
            capture,
        })
    }
}
