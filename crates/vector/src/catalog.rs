use arc_swap::ArcSwap;
use soundalike_audio::FeatureExtractor;
use soundalike_common::{Result, SoundalikeError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::index::FlatIndex;
use crate::persist;
use crate::resolver;
use crate::store::EmbeddingStore;
use crate::types::Recommendation;

/// An embedding store bound to the index built from it.
///
/// Construction checks that both describe the same rows, so a catalog can
/// always translate index positions back to track identifiers. Catalogs are
/// never modified; a refresh builds or loads a new one.
#[derive(Debug)]
pub struct Catalog {
    store: EmbeddingStore,
    index: FlatIndex,
    digest: String,
}

impl Catalog {
    /// Index a store
    pub fn new(store: EmbeddingStore) -> Result<Self> {
        let index = FlatIndex::build(store.vectors())?;
        let digest = store.digest();
        Ok(Self {
            store,
            index,
            digest,
        })
    }

    /// Pair a store with a previously built index.
    ///
    /// `index_digest` is the store digest recorded when the index was saved.
    pub fn from_parts(store: EmbeddingStore, index: FlatIndex, index_digest: &str) -> Result<Self> {
        let digest = store.digest();

        if index.len() != store.len() {
            return Err(SoundalikeError::corrupt_store(format!(
                "Index holds {} vectors but store holds {}",
                index.len(),
                store.len()
            )));
        }
        if index.dimension() != store.dimension() {
            return Err(SoundalikeError::corrupt_store(format!(
                "Index dimension {} differs from store dimension {}",
                index.dimension(),
                store.dimension()
            )));
        }
        if index_digest != digest {
            return Err(SoundalikeError::corrupt_store(
                "Index was built from a different embedding store; rebuild the catalog",
            ));
        }

        Ok(Self {
            store,
            index,
            digest,
        })
    }

    /// Load and cross-check a persisted store/index pair
    pub fn load(store_path: &Path, index_path: &Path) -> Result<Self> {
        let store = EmbeddingStore::load(store_path)?;
        let (index, index_digest) = FlatIndex::load(index_path)?;
        let catalog = Self::from_parts(store, index, &index_digest)?;

        info!(
            "Catalog loaded - {} tracks, dimension {}, digest {}",
            catalog.len(),
            catalog.store.dimension(),
            catalog.short_digest()
        );
        Ok(catalog)
    }

    /// Persist store and index.
    ///
    /// Both files are fully written to temporary files before either is
    /// renamed into place. If the process dies between the two renames the
    /// digests disagree and the next `load` refuses the pair.
    pub fn save(&self, store_path: &Path, index_path: &Path) -> Result<()> {
        let store_tmp = persist::stage(store_path, self.store.to_json()?.as_bytes())?;
        let index_tmp = persist::stage(index_path, self.index.to_json(&self.digest)?.as_bytes())?;

        persist::commit(store_tmp, store_path)?;
        persist::commit(index_tmp, index_path)?;

        info!(
            "Catalog saved - {} tracks to {} and {}",
            self.len(),
            store_path.display(),
            index_path.display()
        );
        Ok(())
    }

    /// Recommend against this catalog's store and index
    pub fn recommend(&self, track: &str, n: usize) -> Result<Vec<Recommendation>> {
        resolver::recommend(&self.store, &self.index, track, n)
    }

    pub fn store(&self) -> &EmbeddingStore {
        &self.store
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    /// Content digest of the store
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn short_digest(&self) -> &str {
        &self.digest[..self.digest.len().min(12)]
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

/// Extract every asset of a scanned library and index the result.
///
/// `on_progress` is called once per asset, in input order, with whether the
/// asset made it into the store.
pub async fn build_catalog<F>(
    assets: &[PathBuf],
    extractor: Arc<dyn FeatureExtractor>,
    workers: usize,
    on_progress: F,
) -> Result<Catalog>
where
    F: FnMut(&Path, bool),
{
    let store = EmbeddingStore::build_with_progress(assets, extractor, workers, on_progress).await?;
    Catalog::new(store)
}

/// Shared, atomically replaceable catalog.
///
/// Readers take an `Arc<Catalog>` snapshot and keep using it for the whole
/// request; `swap` publishes a new catalog with a single pointer store, so
/// a query sees either the old pair or the new one, never a mix.
pub struct CatalogHandle {
    current: ArcSwap<Catalog>,
}

impl CatalogHandle {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            current: ArcSwap::from_pointee(catalog),
        }
    }

    /// Snapshot of the current catalog
    pub fn current(&self) -> Arc<Catalog> {
        self.current.load_full()
    }

    /// Publish `catalog`, returning the one it replaced
    pub fn swap(&self, catalog: Catalog) -> Arc<Catalog> {
        let previous = self.current.swap(Arc::new(catalog));
        info!(
            "Catalog replaced - {} -> {} ({} tracks)",
            previous.short_digest(),
            self.current.load().short_digest(),
            self.current.load().len()
        );
        previous
    }

    /// Load a catalog from disk and publish it. On failure the current
    /// catalog stays in service.
    pub fn reload(&self, store_path: &Path, index_path: &Path) -> Result<Arc<Catalog>> {
        let catalog = Catalog::load(store_path, index_path)?;
        self.swap(catalog);
        Ok(self.current())
    }
}
