pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;

pub use adapters::{GeminiClient, LocalImageStore, PerplexityClient, StaticMapClient};
pub use app::{build_router, serve, AppState};
pub use config::AppConfig;
pub use core::AnalysisService;
pub use domain::model::{AnalysisRecord, GreeneryReport, WardMetadata};
pub use utils::error::{GreenwardError, Result};
