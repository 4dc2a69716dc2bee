mod config;
mod engine;
mod record;
mod runner;

pub use config::{OutputFormat, Overrides, PipelineConfig, PipelineMode};
pub use engine::SentencePairEngine;
pub use record::{AnonymizedPair, InputRecord, OutputRecord};
pub use runner::{LineRunner, RunStats};
