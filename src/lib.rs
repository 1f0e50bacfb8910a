//! Reads uploaded business case workbooks (BUCAs), normalizes their sheets and
//! aggregates costs, FTEs and yearly figures across files.

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod routes;
pub mod services;

pub use config::Config;
pub use error::AppError;

// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}
