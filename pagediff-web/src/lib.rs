//! Page acquisition and the comparison pipeline.
//!
//! - Replay-string translation into request descriptors (`translator`)
//! - Plain HTTP fetch and markup stripping (`static_extractor`)
//! - PWA / React detection from the initial HTML (`classifier`)
//! - Rendering through a browser session (`dynamic`)
//! - Per-URL route choice (`selector`)
//! - Extract, normalize, compare (`pipeline`)

pub mod classifier;
pub mod dynamic;
pub mod pipeline;
pub mod selector;
pub mod static_extractor;
pub mod translator;

pub use pipeline::{CompareOutcome, CompareReport, CompareRequest, ComparisonPipeline, PipelineError};
pub use selector::{Mode, Route, StrategySelector};
pub use translator::{RequestDescriptor, TranslateError, translate};
