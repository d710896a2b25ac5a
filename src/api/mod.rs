//! HTTP API over a single shared session
//!
//! Run with `tabflow serve` or `tabflow-server`.

pub mod handlers;
pub mod server;

pub use server::{router, run_api_server, ApiConfig, AppState};
