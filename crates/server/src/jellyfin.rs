//! Jellyfin playback integration
//!
//! Everything here is best effort: failures are logged and never reach the
//! recommendation response.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use soundalike_common::{JellyfinConfig, Result, SoundalikeError};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Media server operations used after a recommendation
#[async_trait]
pub trait PlaybackSink: Send + Sync {
    /// Start playing an item; `Ok(false)` when the server refused
    async fn start_playback(&self, item_id: &str) -> Result<bool>;

    /// Append an item to the configured playlist
    async fn add_to_playlist(&self, item_id: &str) -> Result<bool>;
}

#[derive(Debug, Deserialize)]
struct ItemsResponse {
    #[serde(rename = "Items", default)]
    items: Vec<JellyfinItem>,
}

#[derive(Debug, Deserialize)]
struct JellyfinItem {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Id")]
    id: String,
}

/// Jellyfin REST client authenticated by API key
#[derive(Debug, Clone)]
pub struct JellyfinClient {
    base_url: String,
    api_key: String,
    playlist_id: String,
    music_folder_id: String,
    client: Client,
}

impl JellyfinClient {
    pub fn new(config: &JellyfinConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SoundalikeError::network(format!("Failed to create HTTP client: {}", e)))?;

        info!("Jellyfin client initialized: {}", config.host);
        Ok(Self {
            base_url: config.host.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            playlist_id: config.playlist_id.clone(),
            music_folder_id: config.music_folder_id.clone(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map item name to item id for every audio item in the music library.
    ///
    /// Returns an empty mapping when the server cannot be reached.
    pub async fn fetch_song_mapping(&self) -> HashMap<String, String> {
        match self.try_fetch_song_mapping().await {
            Ok(mapping) => {
                info!("Fetched {} audio items from Jellyfin", mapping.len());
                mapping
            }
            Err(e) => {
                warn!("Error fetching items from Jellyfin: {}", e);
                HashMap::new()
            }
        }
    }

    async fn try_fetch_song_mapping(&self) -> Result<HashMap<String, String>> {
        let response = self
            .client
            .get(self.url("/Users/Me/Items"))
            .header("X-Emby-Token", &self.api_key)
            .query(&[
                ("ParentId", self.music_folder_id.as_str()),
                ("IncludeItemTypes", "Audio"),
                ("Recursive", "true"),
            ])
            .send()
            .await
            .map_err(|e| SoundalikeError::network(e.to_string()))?
            .error_for_status()
            .map_err(|e| SoundalikeError::network(e.to_string()))?;

        let body = response
            .text()
            .await
            .map_err(|e| SoundalikeError::network(e.to_string()))?;
        parse_song_mapping(&body)
    }

    async fn post_items(&self, path: &str, body: serde_json::Value) -> Result<bool> {
        let response = self
            .client
            .post(self.url(path))
            .header("X-Emby-Token", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SoundalikeError::network(e.to_string()))?;

        let status = response.status();
        debug!("POST {} -> {}", path, status);
        Ok(status == StatusCode::OK || status == StatusCode::NO_CONTENT)
    }
}

#[async_trait]
impl PlaybackSink for JellyfinClient {
    async fn start_playback(&self, item_id: &str) -> Result<bool> {
        self.post_items(
            "/Sessions/Playing",
            serde_json::json!({ "ItemIds": [item_id], "StartPositionTicks": 0 }),
        )
        .await
    }

    async fn add_to_playlist(&self, item_id: &str) -> Result<bool> {
        let path = format!("/Playlists/{}/Items", self.playlist_id);
        self.post_items(&path, serde_json::json!({ "ItemIds": [item_id] }))
            .await
    }
}

/// Parse a `/Items` response body into a name → id mapping
pub fn parse_song_mapping(body: &str) -> Result<HashMap<String, String>> {
    let response: ItemsResponse = serde_json::from_str(body)?;
    Ok(response
        .items
        .into_iter()
        .map(|item| (item.name, item.id))
        .collect())
}

/// Plays the first recommendation and queues the rest
pub struct PlaybackDispatcher {
    sink: Arc<dyn PlaybackSink>,
    mapping: HashMap<String, String>,
}

impl PlaybackDispatcher {
    pub fn new(sink: Arc<dyn PlaybackSink>, mapping: HashMap<String, String>) -> Self {
        Self { sink, mapping }
    }

    /// Item id of a track: exact name first, then the file name without extension
    pub fn item_id(&self, track: &str) -> Option<&str> {
        self.mapping
            .get(track)
            .or_else(|| {
                Path::new(track)
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .and_then(|stem| self.mapping.get(stem))
            })
            .map(String::as_str)
    }

    /// Item ids of the tracks the media server knows, in order
    pub fn item_ids(&self, tracks: &[String]) -> Vec<String> {
        tracks
            .iter()
            .filter_map(|t| self.item_id(t))
            .map(str::to_string)
            .collect()
    }

    /// Start the first playable track and enqueue the others
    pub async fn dispatch(&self, tracks: &[String]) {
        let ids = self.item_ids(tracks);
        let Some((first, rest)) = ids.split_first() else {
            warn!("No playable recommendations found on the media server");
            return;
        };

        match self.sink.start_playback(first).await {
            Ok(true) => info!("Started playback of {}", first),
            Ok(false) => warn!("Media server refused playback of {}", first),
            Err(e) => warn!("Failed to start playback of {}: {}", first, e),
        }

        for id in rest {
            match self.sink.add_to_playlist(id).await {
                Ok(true) => debug!("Queued {}", id),
                Ok(false) => warn!("Media server refused to queue {}", id),
                Err(e) => warn!("Failed to queue {}: {}", id, e),
            }
        }
    }

    /// Run [`PlaybackDispatcher::dispatch`] in the background
    pub fn spawn(self: &Arc<Self>, tracks: Vec<String>) {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            dispatcher.dispatch(&tracks).await;
        });
    }
}
