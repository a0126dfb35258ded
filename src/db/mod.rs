//! MongoDB persistence

pub mod mongo;
pub mod progress_store;
pub mod schemas;

pub use mongo::{IntoIndexes, MongoClient, MongoCollection};
pub use progress_store::MongoProgressStore;
