//! Database schemas for recall-bridge

mod progress;

pub use progress::{ProgressDoc, PROGRESS_COLLECTION};
