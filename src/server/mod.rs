//! HTTP server for recall-bridge

pub mod http;

pub use http::{run, AppState};
