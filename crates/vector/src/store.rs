use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use soundalike_audio::FeatureExtractor;
use soundalike_common::{Result, SoundalikeError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::persist;
use crate::types::STORE_FORMAT;

/// Ordered collection of track embeddings.
///
/// Rows are stored contiguously (`len × dimension`); `positions` maps each
/// identifier to its row so lookups never scan the id list.
#[derive(Debug, Clone)]
pub struct EmbeddingStore {
    ids: Vec<String>,
    data: Vec<f32>,
    positions: HashMap<String, usize>,
    dimension: usize,
    built_at: DateTime<Utc>,
}

/// On-disk layout: identifiers and matrix in one document
#[derive(Serialize, Deserialize)]
struct StoreFile {
    format: String,
    dimension: usize,
    built_at: DateTime<Utc>,
    ids: Vec<String>,
    vectors: Array2<f32>,
}

impl EmbeddingStore {
    /// Create an empty store for `dimension`-long vectors
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(SoundalikeError::invalid_input(
                "Embedding dimension must be at least 1",
            ));
        }

        Ok(Self {
            ids: Vec::new(),
            data: Vec::new(),
            positions: HashMap::new(),
            dimension,
            built_at: Utc::now(),
        })
    }

    /// Append an embedding
    pub fn insert(&mut self, id: impl Into<String>, vector: &[f32]) -> Result<usize> {
        let id = id.into();

        if vector.len() != self.dimension {
            return Err(SoundalikeError::dimension_mismatch(self.dimension, vector.len()));
        }
        if self.positions.contains_key(&id) {
            return Err(SoundalikeError::invalid_input(format!(
                "Duplicate track identifier: {}",
                id
            )));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(SoundalikeError::invalid_input(format!(
                "Embedding for {} contains non-finite values",
                id
            )));
        }

        let position = self.ids.len();
        self.data.extend_from_slice(vector);
        self.positions.insert(id.clone(), position);
        self.ids.push(id);
        Ok(position)
    }

    /// Extract embeddings for `assets` in order.
    ///
    /// Assets the extractor cannot read are logged and skipped. A vector
    /// whose length disagrees with the extractor's declared dimension aborts
    /// the build, since it means every row would be suspect.
    pub async fn build(
        assets: &[PathBuf],
        extractor: Arc<dyn FeatureExtractor>,
        workers: usize,
    ) -> Result<Self> {
        Self::build_with_progress(assets, extractor, workers, |_, _| {}).await
    }

    /// Like [`EmbeddingStore::build`], reporting each finished asset and
    /// whether it made it into the store
    pub async fn build_with_progress<F>(
        assets: &[PathBuf],
        extractor: Arc<dyn FeatureExtractor>,
        workers: usize,
        mut on_progress: F,
    ) -> Result<Self>
    where
        F: FnMut(&Path, bool),
    {
        let mut store = Self::new(extractor.dimension())?;

        info!(
            "Extracting embeddings for {} assets with {} workers",
            assets.len(),
            workers.max(1)
        );

        // `buffered` yields in input order even though work finishes out of order
        let mut results = stream::iter(assets.iter().cloned())
            .map(|path| {
                let extractor = Arc::clone(&extractor);
                async move {
                    let task_path = path.clone();
                    let result =
                        tokio::task::spawn_blocking(move || extractor.extract(&task_path))
                            .await
                            .map_err(|e| {
                                SoundalikeError::internal(format!("Extraction task failed: {}", e))
                            })
                            .and_then(|r| r);
                    (path, result)
                }
            })
            .buffered(workers.max(1));

        let mut skipped = 0usize;
        while let Some((path, result)) = results.next().await {
            let id = track_identifier(&path);
            match result {
                Ok(vector) => {
                    if vector.len() != store.dimension {
                        return Err(SoundalikeError::dimension_mismatch(
                            store.dimension,
                            vector.len(),
                        ));
                    }
                    match store.insert(id.clone(), &vector) {
                        Ok(position) => {
                            debug!("Indexed {} at position {}", id, position);
                            on_progress(&path, true);
                        }
                        Err(e) => {
                            warn!("Skipping {}: {}", path.display(), e);
                            skipped += 1;
                            on_progress(&path, false);
                        }
                    }
                }
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    skipped += 1;
                    on_progress(&path, false);
                }
            }
        }

        info!(
            "Embedding store built - {} tracks, {} skipped",
            store.len(),
            skipped
        );
        Ok(store)
    }

    /// Vector of a track
    pub fn lookup(&self, id: &str) -> Option<&[f32]> {
        self.position_of(id).and_then(|p| self.vector_at(p))
    }

    /// Row of a track
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    /// Identifier stored at `position`
    pub fn identifier_at(&self, position: usize) -> Option<&str> {
        self.ids.get(position).map(String::as_str)
    }

    /// Vector stored at `position`
    pub fn vector_at(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.data.get(start..start.checked_add(self.dimension)?)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn identifiers(&self) -> &[String] {
        &self.ids
    }

    /// `(identifier, vector)` pairs in store order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.ids
            .iter()
            .map(String::as_str)
            .zip(self.data.chunks_exact(self.dimension))
    }

    /// Row-major `len × dimension` view of all vectors
    pub fn vectors(&self) -> ArrayView2<'_, f32> {
        ArrayView2::from_shape((self.len(), self.dimension), &self.data)
            .expect("store rows always hold exactly `dimension` values")
    }

    /// SHA-256 over dimension, identifiers and vector bytes.
    ///
    /// Two stores share a digest exactly when they hold the same tracks in
    /// the same order with bit-identical vectors.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update((self.dimension as u64).to_le_bytes());
        hasher.update((self.ids.len() as u64).to_le_bytes());
        for id in &self.ids {
            hasher.update((id.len() as u64).to_le_bytes());
            hasher.update(id.as_bytes());
        }
        for value in &self.data {
            hasher.update(value.to_le_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Serialize identifiers and vectors as one document
    pub fn to_json(&self) -> Result<String> {
        let file = StoreFile {
            format: STORE_FORMAT.to_string(),
            dimension: self.dimension,
            built_at: self.built_at,
            ids: self.ids.clone(),
            vectors: self.vectors().to_owned(),
        };
        Ok(serde_json::to_string(&file)?)
    }

    /// Parse a store document, validating its shape
    pub fn from_json(data: &str) -> Result<Self> {
        let file: StoreFile = serde_json::from_str(data)
            .map_err(|e| SoundalikeError::corrupt_store(format!("Unparseable store file: {}", e)))?;

        if file.format != STORE_FORMAT {
            return Err(SoundalikeError::corrupt_store(format!(
                "Unknown store format: {}",
                file.format
            )));
        }
        if file.vectors.nrows() != file.ids.len() {
            return Err(SoundalikeError::corrupt_store(format!(
                "{} identifiers but {} vector rows",
                file.ids.len(),
                file.vectors.nrows()
            )));
        }
        if file.vectors.ncols() != file.dimension {
            return Err(SoundalikeError::corrupt_store(format!(
                "Declared dimension {} but vectors have {} columns",
                file.dimension,
                file.vectors.ncols()
            )));
        }

        let mut store = Self::new(file.dimension)
            .map_err(|e| SoundalikeError::corrupt_store(e.to_string()))?;
        store.built_at = file.built_at;
        for (id, row) in file.ids.into_iter().zip(file.vectors.rows()) {
            let row: Vec<f32> = row.iter().copied().collect();
            store
                .insert(id, &row)
                .map_err(|e| SoundalikeError::corrupt_store(e.to_string()))?;
        }

        Ok(store)
    }

    /// Atomically write the store to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        persist::write_atomic(path, self.to_json()?.as_bytes())?;
        info!("Saved {} embeddings to {}", self.len(), path.display());
        Ok(())
    }

    /// Load a store written by [`EmbeddingStore::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let data = persist::read_to_string(path, "embedding store")?;
        let store = Self::from_json(&data)?;
        info!("Loaded {} embeddings from {}", store.len(), path.display());
        Ok(store)
    }
}

/// Track identifier for an asset: its file name
pub fn track_identifier(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Extractor answering from a fixed table, keyed by file name
    pub(crate) struct TableExtractor {
        pub dimension: usize,
        pub table: HashMap<String, Vec<f32>>,
        pub calls: Mutex<Vec<String>>,
    }

    impl TableExtractor {
        pub(crate) fn new(dimension: usize, entries: &[(&str, Vec<f32>)]) -> Self {
            Self {
                dimension,
                table: entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl FeatureExtractor for TableExtractor {
        fn dimension(&self) -> usize {
            self.dimension
        }

        fn extract(&self, path: &Path) -> Result<Vec<f32>> {
            let name = track_identifier(path);
            self.calls.lock().unwrap().push(name.clone());
            self.table
                .get(&name)
                .cloned()
                .ok_or_else(|| SoundalikeError::unreadable_asset(name))
        }
    }

    pub(crate) fn store_of(entries: &[(&str, Vec<f32>)]) -> EmbeddingStore {
        let mut store = EmbeddingStore::new(entries[0].1.len()).unwrap();
        for (id, v) in entries {
            store.insert(*id, v).unwrap();
        }
        store
    }

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| PathBuf::from("/music").join(n)).collect()
    }

    #[test]
    fn test_insert_and_lookup_roundtrip() {
        let store = store_of(&[("a.mp3", vec![0.0, 1.0]), ("b.mp3", vec![2.0, 3.0])]);

        for (id, vector) in [("a.mp3", [0.0, 1.0]), ("b.mp3", [2.0, 3.0])] {
            let position = store.position_of(id).unwrap();
            assert_eq!(store.identifier_at(position), Some(id));
            assert_eq!(store.lookup(id).unwrap(), &vector);
            assert_eq!(store.vector_at(position), Some(&vector[..]));
        }
        assert_eq!(store.lookup("missing.mp3"), None);
        assert_eq!(store.position_of("missing.mp3"), None);
        assert_eq!(store.identifier_at(2), None);
        assert_eq!(store.vector_at(2), None);
        assert_eq!(store.vector_at(usize::MAX), None);
    }

    #[test]
    fn test_insert_rejects_bad_rows() {
        let mut store = EmbeddingStore::new(2).unwrap();
        store.insert("a", &[1.0, 2.0]).unwrap();

        assert!(matches!(
            store.insert("b", &[1.0]),
            Err(SoundalikeError::DimensionMismatch { expected: 2, actual: 1 })
        ));
        assert!(matches!(
            store.insert("a", &[3.0, 4.0]),
            Err(SoundalikeError::InvalidInput(_))
        ));
        assert!(matches!(
            store.insert("c", &[f32::NAN, 0.0]),
            Err(SoundalikeError::InvalidInput(_))
        ));
        assert_eq!(store.len(), 1);
        assert!(EmbeddingStore::new(0).is_err());
    }

    #[tokio::test]
    async fn test_build_skips_unreadable_assets() {
        let extractor = Arc::new(TableExtractor::new(
            2,
            &[("a.mp3", vec![0.0, 0.0]), ("c.mp3", vec![5.0, 5.0])],
        ));

        let store = EmbeddingStore::build(&paths(&["a.mp3", "b.mp3", "c.mp3"]), extractor, 2)
            .await
            .unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.identifiers(), &["a.mp3".to_string(), "c.mp3".to_string()]);
    }

    #[tokio::test]
    async fn test_build_preserves_input_order() {
        let names = ["01.mp3", "02.mp3", "03.mp3", "04.mp3", "05.mp3", "06.mp3"];
        let entries: Vec<(&str, Vec<f32>)> = names
            .iter()
            .enumerate()
            .map(|(i, n)| (*n, vec![i as f32]))
            .collect();
        let extractor = Arc::new(TableExtractor::new(1, &entries));

        let store = EmbeddingStore::build(&paths(&names), extractor, 4).await.unwrap();
        let ids: Vec<&str> = store.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, names);
        assert_eq!(store.vector_at(5), Some(&[5.0][..]));
    }

    #[tokio::test]
    async fn test_build_aborts_on_dimension_mismatch() {
        let extractor = Arc::new(TableExtractor::new(
            2,
            &[("a.mp3", vec![0.0, 0.0]), ("b.mp3", vec![1.0, 2.0, 3.0])],
        ));

        let err = EmbeddingStore::build(&paths(&["a.mp3", "b.mp3"]), extractor, 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SoundalikeError::DimensionMismatch { expected: 2, actual: 3 }
        ));
    }

    #[tokio::test]
    async fn test_build_reports_progress() {
        let extractor = Arc::new(TableExtractor::new(1, &[("a.mp3", vec![1.0])]));
        let mut seen = Vec::new();

        EmbeddingStore::build_with_progress(
            &paths(&["a.mp3", "b.mp3"]),
            extractor,
            1,
            |path, ok| seen.push((track_identifier(path), ok)),
        )
        .await
        .unwrap();

        assert_eq!(
            seen,
            vec![("a.mp3".to_string(), true), ("b.mp3".to_string(), false)]
        );
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embeddings.json");
        let store = store_of(&[("x.mp3", vec![0.5, -1.5]), ("y.mp3", vec![3.25, 0.0])]);

        store.save(&path).unwrap();
        let loaded = EmbeddingStore::load(&path).unwrap();

        assert_eq!(loaded.identifiers(), store.identifiers());
        assert_eq!(loaded.vectors(), store.vectors());
        assert_eq!(loaded.digest(), store.digest());
        assert_eq!(loaded.built_at(), store.built_at());
    }

    #[test]
    fn test_load_rejects_row_count_mismatch() {
        let json = serde_json::json!({
            "format": STORE_FORMAT,
            "dimension": 2,
            "built_at": "2024-01-01T00:00:00Z",
            "ids": ["a.mp3", "b.mp3", "c.mp3"],
            "vectors": { "v": 1, "dim": [2, 2], "data": [0.0, 0.0, 1.0, 1.0] }
        })
        .to_string();

        let err = EmbeddingStore::from_json(&json).unwrap_err();
        assert!(matches!(err, SoundalikeError::CorruptStore(_)));
    }

    #[test]
    fn test_load_rejects_garbage() {
        let err = EmbeddingStore::from_json("{not json").unwrap_err();
        assert!(matches!(err, SoundalikeError::CorruptStore(_)));
    }

    #[test]
    fn test_digest_tracks_content_and_order() {
        let a = store_of(&[("a", vec![1.0]), ("b", vec![2.0])]);
        let same = store_of(&[("a", vec![1.0]), ("b", vec![2.0])]);
        let reordered = store_of(&[("b", vec![2.0]), ("a", vec![1.0])]);
        let changed = store_of(&[("a", vec![1.0]), ("b", vec![2.5])]);

        assert_eq!(a.digest(), same.digest());
        assert_ne!(a.digest(), reordered.digest());
        assert_ne!(a.digest(), changed.digest());
    }
}
