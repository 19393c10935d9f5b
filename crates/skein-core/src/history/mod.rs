//! History store: per-cycle normalisation of the raw log into item events.

pub mod store;

pub use store::{HistoryStore, ItemCatalog};
