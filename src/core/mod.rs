pub mod analysis;
pub mod geo;
pub mod markdown;
pub mod prompts;
pub mod text;

pub use analysis::AnalysisService;
pub use crate::domain::ports::{GreeneryAnalyst, ImageStore, MapImagery, TreeAdvisor};
pub use crate::utils::error::Result;
