//! Fact storage: types, the similarity test, keyword search, persistence, and
//! the training export.

pub mod export;
pub mod persist;
pub mod similarity;
pub mod store;
pub mod synonyms;
pub mod types;

pub use store::{FactStore, InsertOutcome, JsonFactStore, StoreError};
pub use types::{CandidateFact, Category, Fact};
