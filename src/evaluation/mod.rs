//! Evaluation of a finished training run.
//!
//! Metric extraction, per-episode reward aggregation, best-policy selection and
//! the pipeline that ties them to the trajectory loader.

pub mod metrics;
pub mod pipeline;
pub mod reference;
pub mod reward;
pub mod selector;

pub use metrics::{beta_mean, MetricExtractor, TimeSeries, TrajectoryMetrics};
pub use pipeline::{EpisodeSeries, EvaluationPipeline, ExcludedEpisode, PipelineReport};
pub use reference::{time_range, SinusoidalRotation};
pub use reward::{mean, population_std, trajectory_reward, PolicySummary, RewardAggregator};
pub use selector::{rank, select_best, ArtifactRef, PolicySelector, Selection};
