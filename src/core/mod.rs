//! Core NDVI processing modules

pub mod alignment;
pub mod ndvi;
pub mod classify;
pub mod statistics;
pub mod render;
pub mod pipeline;

// Re-export main types
pub use alignment::{AlignmentValidator, AlignmentParams};
pub use ndvi::{NdviComputer, NdviParams, NDVI_FORMULA, normalized_difference};
pub use classify::{Classifier, classify_exact, classify_value};
pub use statistics::{StatisticsAggregator, StatisticsParams, StatisticsSummary, CategoryShare};
pub use render::{ColorRenderer, RenderParams, RenderMode, RenderedImage, LegendEntry, legend};
pub use pipeline::{NdviProcessor, PipelineParams};
