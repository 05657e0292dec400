use soundalike_common::{AppConfig, Result, SoundalikeError};
use soundalike_vector::{Catalog, CatalogHandle};
use std::sync::Arc;
use tracing::info;

use crate::jellyfin::{JellyfinClient, PlaybackDispatcher};

/// Shared application state
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,

    /// Store and index served by every request, swapped as one unit
    pub catalog: Arc<CatalogHandle>,

    /// Media server playback, absent when Jellyfin is not configured
    pub playback: Option<Arc<PlaybackDispatcher>>,
}

impl AppState {
    /// Assemble state from already loaded parts
    pub fn new(
        config: AppConfig,
        catalog: Catalog,
        playback: Option<Arc<PlaybackDispatcher>>,
    ) -> Self {
        Self {
            config,
            catalog: Arc::new(CatalogHandle::new(catalog)),
            playback,
        }
    }

    /// Load the persisted catalog and connect to Jellyfin.
    ///
    /// A missing or inconsistent catalog is fatal; an unreachable media
    /// server only disables playback mapping.
    pub async fn initialize(config: AppConfig) -> Result<Self> {
        let store_path = config.store_path.clone();
        let index_path = config.index_path.clone();
        let catalog =
            tokio::task::spawn_blocking(move || Catalog::load(&store_path, &index_path))
                .await
                .map_err(|e| SoundalikeError::internal(e.to_string()))??;

        let playback = match &config.jellyfin {
            Some(jellyfin) => {
                let client = JellyfinClient::new(jellyfin)?;
                let mapping = client.fetch_song_mapping().await;
                Some(Arc::new(PlaybackDispatcher::new(Arc::new(client), mapping)))
            }
            None => {
                info!("Jellyfin not configured - playback disabled");
                None
            }
        };

        Ok(Self::new(config, catalog, playback))
    }
}
