//! Attribution-matching and event-normalization pipeline: booking
//! classification, attribution resolution, outbound event assembly, and
//! per-webhook orchestration.

pub mod builder;
pub mod classify;
pub mod orchestrator;

pub use orchestrator::{ConversionPipeline, PreparedIntent, RelayOutcome, RequestMeta, SkipReason};
