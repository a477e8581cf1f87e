//! Best-policy selection.
//!
//! The best episode is the one with the highest mean reward. Exactly equal
//! means resolve to the lowest episode index, so the earliest policy reaching a
//! given score is preferred and repeated runs agree.

use std::cmp::Reverse;
use std::path::{Path, PathBuf};

use ordered_float::OrderedFloat;
use serde::Serialize;
use tracing::warn;

use crate::config::NamingConfig;
use crate::error::{EvalError, Result};
use crate::trajectory::naming::FileTemplate;
use crate::trajectory::types::EpisodeIndex;

use super::reward::PolicySummary;

/// Sort key: higher reward first, then lower index.
fn ranking_key(s: &PolicySummary) -> (Reverse<OrderedFloat<f64>>, EpisodeIndex) {
    (Reverse(OrderedFloat(s.mean_reward)), s.episode)
}

/// The summary with maximal mean reward, ties to the lowest index.
pub fn select_best(summaries: &[PolicySummary]) -> Result<&PolicySummary> {
    summaries
        .iter()
        .min_by_key(|s| ranking_key(s))
        .ok_or(EvalError::NoEpisodes)
}

/// All summaries from best to worst, using the same ordering as [`select_best`].
pub fn rank(summaries: &[PolicySummary]) -> Vec<&PolicySummary> {
    let mut ranked: Vec<&PolicySummary> = summaries.iter().collect();
    ranked.sort_by_key(|s| ranking_key(s));
    ranked
}

// ---------------------------------------------------------------------------
// Artifact resolution
// ---------------------------------------------------------------------------

/// A training artifact referenced by path. Never opened.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactRef {
    pub path: PathBuf,
    pub exists: bool,
}

impl ArtifactRef {
    fn resolve(template: &FileTemplate, dir: &Path, index: EpisodeIndex) -> Self {
        let path = template.path_for(dir, index);
        let exists = path.is_file();
        Self { path, exists }
    }
}

/// The selected policy, ready to hand to the simulation for a final run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub episode: EpisodeIndex,
    pub mean_reward: f64,
    pub checkpoint: ArtifactRef,
    pub traced_policy: ArtifactRef,
}

/// Selects the best episode and resolves its checkpoint and traced policy.
#[derive(Debug, Clone)]
pub struct PolicySelector {
    dir: PathBuf,
    checkpoint: FileTemplate,
    traced_policy: FileTemplate,
}

impl PolicySelector {
    pub fn new(dir: impl Into<PathBuf>, naming: &NamingConfig) -> Result<Self> {
        Ok(Self {
            dir: dir.into(),
            checkpoint: FileTemplate::new(&naming.checkpoint)?,
            traced_policy: FileTemplate::new(&naming.traced_policy)?,
        })
    }

    pub fn select(&self, summaries: &[PolicySummary]) -> Result<Selection> {
        let best = select_best(summaries)?;
        let selection = Selection {
            episode: best.episode,
            mean_reward: best.mean_reward,
            checkpoint: ArtifactRef::resolve(&self.checkpoint, &self.dir, best.episode),
            traced_policy: ArtifactRef::resolve(&self.traced_policy, &self.dir, best.episode),
        };

        if !selection.checkpoint.exists {
            warn!(
                episode = best.episode,
                path = %selection.checkpoint.path.display(),
                "Checkpoint for selected episode not found"
            );
        }
        if !selection.traced_policy.exists {
            warn!(
                episode = best.episode,
                path = %selection.traced_policy.path.display(),
                "Traced policy for selected episode not found"
            );
        }
        Ok(selection)
    }
}
