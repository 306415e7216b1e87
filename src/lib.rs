pub mod config;
pub mod expand;
pub mod export;
pub mod hour_logic;
pub mod models;
pub mod pipeline;
pub mod reconcile;
pub mod reshape;
pub mod shape;

pub use config::ExtenderConfig;
pub use models::{HourClassRow, PeakLabel, PipelineSummary};
pub use pipeline::ExtensionPipeline;
