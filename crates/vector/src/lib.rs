//! Soundalike vector search
//!
//! Embedding store, exact flat index and the recommendation resolver that
//! joins them

pub mod catalog;
pub mod index;
mod persist;
pub mod resolver;
pub mod store;
pub mod types;

pub use catalog::{build_catalog, Catalog, CatalogHandle};
pub use index::{squared_l2, FlatIndex};
pub use resolver::recommend;
pub use store::{track_identifier, EmbeddingStore};
pub use types::{Neighbor, Recommendation, INDEX_FORMAT, STORE_FORMAT};
