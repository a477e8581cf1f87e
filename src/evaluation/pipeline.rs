//! End-to-end evaluation of a training directory.
//!
//! The pipeline is a one-shot batch transformation:
//!
//! ```text
//! observations files
//!   -> EpisodeLoader        (MissingFile / Unreadable: warn, count, continue)
//!   -> parse records        (MalformedTrajectory: warn, count, exclude)
//!   -> RewardAggregator     (episodes below the validity threshold excluded)
//!   -> PolicySelector       (NoEpisodes if nothing survived)
//! ```
//!
//! With `loading.parallel` set, episodes are loaded and reduced on the rayon
//! pool; outcomes are folded back in ascending index order so logs and reports
//! are identical to the sequential path.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{EvalConfig, RewardEstimator};
use crate::error::{EvalError, Result};
use crate::trajectory::loader::{EpisodeLoader, LoadedEpisode};
use crate::trajectory::naming::FileTemplate;
use crate::trajectory::types::EpisodeIndex;

use super::metrics::{MetricExtractor, TimeSeries, TrajectoryMetrics};
use super::reference::SinusoidalRotation;
use super::reward::{PolicySummary, RewardAggregator};
use super::selector::{rank, PolicySelector, Selection};

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// An episode that loaded but did not qualify for selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExcludedEpisode {
    pub episode: EpisodeIndex,
    pub valid_trajectories: usize,
    pub malformed_trajectories: usize,
}

/// Everything one pipeline run derived from a training directory.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub generated_at: DateTime<Utc>,
    pub directory: PathBuf,
    pub estimator: RewardEstimator,
    pub expected_episodes: usize,
    /// Eligible episodes in ascending index order.
    pub summaries: Vec<PolicySummary>,
    pub excluded: Vec<ExcludedEpisode>,
    pub missing_files: Vec<EpisodeIndex>,
    pub unreadable_files: Vec<EpisodeIndex>,
    pub malformed_trajectories: usize,
}

impl PipelineReport {
    /// Eligible summaries from best to worst.
    pub fn ranked(&self) -> Vec<&PolicySummary> {
        rank(&self.summaries)
    }

    pub fn summary_for(&self, episode: EpisodeIndex) -> Option<&PolicySummary> {
        self.summaries.iter().find(|s| s.episode == episode)
    }
}

/// Plot-ready series for one episode.
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeSeries {
    pub episode: EpisodeIndex,
    pub trajectories: Vec<TrajectoryMetrics>,
    /// Open-loop reference on the first trajectory's control time axis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<TimeSeries>,
}

// ---------------------------------------------------------------------------
// Per-episode outcome
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum EpisodeOutcome {
    Eligible {
        summary: PolicySummary,
        rejected: Vec<EvalError>,
    },
    Excluded {
        excluded: ExcludedEpisode,
        rejected: Vec<EvalError>,
    },
    Failed(EvalError),
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Loads, aggregates and selects over one training directory.
pub struct EvaluationPipeline {
    config: EvalConfig,
    loader: EpisodeLoader,
    extractor: MetricExtractor,
    aggregator: RewardAggregator,
    selector: PolicySelector,
}

impl EvaluationPipeline {
    /// Build a pipeline for `dir`. The configuration is validated first.
    pub fn new(config: EvalConfig, dir: impl AsRef<Path>) -> Result<Self> {
        config.validate()?;
        let dir = dir.as_ref();

        let loader = EpisodeLoader::new(dir, FileTemplate::new(&config.naming.observations)?);
        let extractor = MetricExtractor::new(config.metrics.clone());
        let aggregator = RewardAggregator::new(config.selection.estimator, extractor.clone());
        let selector = PolicySelector::new(dir, &config.naming)?;

        Ok(Self {
            config,
            loader,
            extractor,
            aggregator,
            selector,
        })
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Load every expected episode and summarise the eligible ones.
    ///
    /// Fails with [`EvalError::NoEpisodes`] when no episode is eligible.
    pub fn run(&self) -> Result<PipelineReport> {
        let episodes = self.config.loading.episodes;
        let indices = self.loader.expected_indices(episodes)?;

        info!(
            dir = %self.loader.dir().display(),
            expected = indices.len(),
            parallel = self.config.loading.parallel,
            estimator = ?self.config.selection.estimator,
            "Evaluating training run"
        );

        let outcomes: Vec<EpisodeOutcome> = if self.config.loading.parallel {
            indices
                .par_iter()
                .map(|&index| self.process(self.loader.load_episode(index)))
                .collect()
        } else {
            indices
                .iter()
                .map(|&index| self.process(self.loader.load_episode(index)))
                .collect()
        };

        let mut report = PipelineReport {
            generated_at: Utc::now(),
            directory: self.loader.dir().to_path_buf(),
            estimator: self.config.selection.estimator,
            expected_episodes: indices.len(),
            summaries: Vec::new(),
            excluded: Vec::new(),
            missing_files: Vec::new(),
            unreadable_files: Vec::new(),
            malformed_trajectories: 0,
        };

        for outcome in outcomes {
            match outcome {
                EpisodeOutcome::Eligible { summary, rejected } => {
                    log_rejected(&rejected);
                    report.malformed_trajectories += rejected.len();
                    debug!(
                        episode = summary.episode,
                        mean_reward = summary.mean_reward,
                        trajectories = summary.valid_trajectories,
                        "Episode summarised"
                    );
                    report.summaries.push(summary);
                }
                EpisodeOutcome::Excluded { excluded, rejected } => {
                    log_rejected(&rejected);
                    report.malformed_trajectories += rejected.len();
                    warn!(
                        episode = excluded.episode,
                        valid = excluded.valid_trajectories,
                        malformed = excluded.malformed_trajectories,
                        required = self.config.selection.min_valid_trajectories,
                        "Episode excluded from selection"
                    );
                    report.excluded.push(excluded);
                }
                EpisodeOutcome::Failed(err) => {
                    warn!(error = %err, "Skipping episode");
                    match err {
                        EvalError::MissingFile { index, .. } => report.missing_files.push(index),
                        EvalError::Unreadable { index, .. } => report.unreadable_files.push(index),
                        other => return Err(other),
                    }
                }
            }
        }

        info!(
            eligible = report.summaries.len(),
            excluded = report.excluded.len(),
            missing = report.missing_files.len(),
            unreadable = report.unreadable_files.len(),
            malformed_trajectories = report.malformed_trajectories,
            "Evaluation complete"
        );

        if report.summaries.is_empty() {
            return Err(EvalError::NoEpisodes);
        }
        Ok(report)
    }

    /// Pick the best policy from a finished run.
    pub fn select(&self, report: &PipelineReport) -> Result<Selection> {
        let selection = self.selector.select(&report.summaries)?;
        info!(
            episode = selection.episode,
            mean_reward = selection.mean_reward,
            checkpoint = %selection.checkpoint.path.display(),
            "Selected best policy"
        );
        Ok(selection)
    }

    /// Run the pipeline and select in one step.
    pub fn evaluate(&self) -> Result<(PipelineReport, Selection)> {
        let report = self.run()?;
        let selection = self.select(&report)?;
        Ok((report, selection))
    }

    /// Drag, lift and expected action series for every valid trajectory of
    /// one episode, optionally with an open-loop reference.
    pub fn episode_series(
        &self,
        index: EpisodeIndex,
        reference: Option<&SinusoidalRotation>,
    ) -> Result<EpisodeSeries> {
        let loaded = self.loader.load_episode(index)?;
        log_rejected(&loaded.rejected);

        let trajectories: Vec<TrajectoryMetrics> = loaded
            .episode
            .trajectories
            .iter()
            .map(|t| self.extractor.extract(t))
            .collect();
        let reference = reference.and_then(|rotation| {
            trajectories
                .first()
                .map(|m| rotation.series(&m.action.time))
        });

        Ok(EpisodeSeries {
            episode: index,
            trajectories,
            reference,
        })
    }

    fn process(&self, loaded: Result<LoadedEpisode>) -> EpisodeOutcome {
        let loaded = match loaded {
            Ok(loaded) => loaded,
            Err(err) => return EpisodeOutcome::Failed(err),
        };
        let LoadedEpisode {
            episode, rejected, ..
        } = loaded;

        let eligible = episode.len() >= self.config.selection.min_valid_trajectories;
        match self.aggregator.summarize(&episode) {
            Some(summary) if eligible => EpisodeOutcome::Eligible { summary, rejected },
            _ => EpisodeOutcome::Excluded {
                excluded: ExcludedEpisode {
                    episode: episode.index,
                    valid_trajectories: episode.len(),
                    malformed_trajectories: episode.malformed,
                },
                rejected,
            },
        }
    }
}

fn log_rejected(rejected: &[EvalError]) {
    for err in rejected {
        warn!(error = %err, "Skipping malformed trajectory");
    }
}
