//! Trajectory loading: reading per-episode observations files from a training
//! directory.
//!
//! The [`EpisodeLoader`] walks the expected episode indices in ascending order
//! and yields one result per index:
//!   1. `Ok(LoadedEpisode)` with the valid trajectories of that file and the
//!      records that failed validation,
//!   2. `Err(MissingFile)` when no file exists for the index,
//!   3. `Err(Unreadable)` when the file is not JSON of the expected shape.
//!
//! Records are validated field by field from a [`serde_json::Value`] so a single
//! bad record never hides the rest of its file.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{EvalError, Result};
use crate::trajectory::naming::FileTemplate;
use crate::trajectory::types::{BetaParams, Episode, EpisodeIndex, Trajectory};

// ---------------------------------------------------------------------------
// Loaded episode
// ---------------------------------------------------------------------------

/// The outcome of reading one observations file.
#[derive(Debug)]
pub struct LoadedEpisode {
    pub episode: Episode,
    pub path: PathBuf,
    /// `MalformedTrajectory` errors for the records that were skipped.
    pub rejected: Vec<EvalError>,
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Reads observations files named by a [`FileTemplate`] from one directory.
#[derive(Debug, Clone)]
pub struct EpisodeLoader {
    dir: PathBuf,
    naming: FileTemplate,
}

impl EpisodeLoader {
    pub fn new(dir: impl Into<PathBuf>, naming: FileTemplate) -> Self {
        Self {
            dir: dir.into(),
            naming,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Episode indices that have an observations file, ascending.
    pub fn discover_indices(&self) -> Result<Vec<EpisodeIndex>> {
        let mut indices = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            match self.naming.index_of(name) {
                Some(index) => indices.push(index),
                None if self.naming.is_numbered_variant(name) => {
                    warn!(
                        file = name,
                        expected = %self.naming.file_name(0),
                        "Ignoring observations file with a non-canonical index"
                    );
                }
                None => {}
            }
        }
        indices.sort_unstable();
        indices.dedup();
        Ok(indices)
    }

    /// The indices a run is expected to cover.
    ///
    /// With an explicit `count` this is `0..count`. Otherwise it is the
    /// contiguous range between the lowest and highest discovered index, so
    /// gaps inside the range surface as missing files.
    pub fn expected_indices(&self, count: Option<u32>) -> Result<Vec<EpisodeIndex>> {
        if let Some(n) = count {
            return Ok((0..n).collect());
        }
        let discovered = self.discover_indices()?;
        match (discovered.first(), discovered.last()) {
            (Some(&lo), Some(&hi)) => Ok((lo..=hi).collect()),
            _ => Ok(Vec::new()),
        }
    }

    /// Lazily load every expected episode in ascending index order.
    pub fn episodes(
        &self,
        count: Option<u32>,
    ) -> Result<impl Iterator<Item = Result<LoadedEpisode>> + '_> {
        let indices = self.expected_indices(count)?;
        Ok(indices.into_iter().map(move |index| self.load_episode(index)))
    }

    /// Load and validate one observations file.
    pub fn load_episode(&self, index: EpisodeIndex) -> Result<LoadedEpisode> {
        let path = self.naming.path_for(&self.dir, index);
        if !path.is_file() {
            return Err(EvalError::MissingFile { index, path });
        }

        let unreadable = |reason: String| EvalError::Unreadable {
            index,
            path: path.clone(),
            reason,
        };

        let text = fs::read_to_string(&path).map_err(|e| unreadable(e.to_string()))?;
        let root: Value = serde_json::from_str(&text).map_err(|e| unreadable(e.to_string()))?;
        let records = trajectory_records(&root).ok_or_else(|| {
            unreadable("expected an array of trajectories or {\"trajectories\": [...]}".into())
        })?;

        let mut trajectories = Vec::with_capacity(records.len());
        let mut rejected = Vec::new();
        for (position, record) in records.iter().enumerate() {
            match parse_trajectory(record) {
                Ok(t) => trajectories.push(t),
                Err(reason) => {
                    debug!(episode = index, position, %reason, "Rejected trajectory record");
                    rejected.push(EvalError::MalformedTrajectory {
                        index,
                        position,
                        reason,
                    });
                }
            }
        }

        let mut episode = Episode::new(index, trajectories);
        episode.malformed = rejected.len();
        debug!(
            episode = index,
            valid = episode.len(),
            malformed = episode.malformed,
            path = %path.display(),
            "Loaded observations file"
        );

        Ok(LoadedEpisode {
            episode,
            path,
            rejected,
        })
    }
}

fn trajectory_records(root: &Value) -> Option<&Vec<Value>> {
    match root {
        Value::Array(records) => Some(records),
        Value::Object(map) => map.get("trajectories")?.as_array(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Record validation
// ---------------------------------------------------------------------------

/// Validate one trajectory record.
///
/// `states`, `actions` and `rewards` are required; `rewards` must be
/// non-empty. `cd`, `cl`, `alpha`, `beta` and `t` are optional. Policy
/// parameters are kept only when both are present and line up with
/// `actions`; time stamps only when they line up with `actions`.
pub fn parse_trajectory(record: &Value) -> std::result::Result<Trajectory, String> {
    if !record.is_object() {
        return Err("record is not an object".into());
    }

    let states = state_series(record)?;
    let actions = number_series(record, "actions")?.ok_or("missing field `actions`")?;
    let rewards = number_series(record, "rewards")?.ok_or("missing field `rewards`")?;
    if rewards.is_empty() {
        return Err("field `rewards` is empty".into());
    }

    let cd = number_series(record, "cd")?.unwrap_or_default();
    let cl = number_series(record, "cl")?.unwrap_or_default();

    let policy = match (
        number_series(record, "alpha")?,
        number_series(record, "beta")?,
    ) {
        (Some(alpha), Some(beta)) if alpha.len() == actions.len() && beta.len() == actions.len() => {
            let positive = alpha.iter().chain(&beta).all(|&p| p > 0.0);
            if positive {
                Some(BetaParams { alpha, beta })
            } else {
                debug!("Ignoring non-positive policy parameters, falling back to sampled actions");
                None
            }
        }
        (None, None) => None,
        _ => {
            debug!("Ignoring incomplete policy parameters, falling back to sampled actions");
            None
        }
    };

    let time = number_series(record, "t")?.filter(|t| t.len() == actions.len());

    Ok(Trajectory {
        states,
        actions,
        rewards,
        cd,
        cl,
        policy,
        time,
    })
}

fn number_series(record: &Value, field: &str) -> std::result::Result<Option<Vec<f64>>, String> {
    let Some(value) = record.get(field) else {
        return Ok(None);
    };
    let items = value
        .as_array()
        .ok_or_else(|| format!("field `{field}` is not an array"))?;
    items
        .iter()
        .enumerate()
        .map(|(i, v)| {
            finite_number(v).ok_or_else(|| format!("field `{field}`[{i}] is not a finite number"))
        })
        .collect::<std::result::Result<Vec<_>, _>>()
        .map(Some)
}

fn state_series(record: &Value) -> std::result::Result<Vec<Vec<f64>>, String> {
    let rows = record
        .get("states")
        .ok_or("missing field `states`")?
        .as_array()
        .ok_or("field `states` is not an array")?;
    rows.iter()
        .enumerate()
        .map(|(i, row)| -> std::result::Result<Vec<f64>, String> {
            let row = row
                .as_array()
                .ok_or_else(|| format!("field `states`[{i}] is not an array"))?;
            row.iter()
                .map(|v| {
                    finite_number(v)
                        .ok_or_else(|| format!("field `states`[{i}] holds a non-numeric value"))
                })
                .collect()
        })
        .collect()
}

fn finite_number(value: &Value) -> Option<f64> {
    value.as_f64().filter(|x| x.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(rewards: &[f64]) -> Value {
        json!({
            "states": rewards.iter().map(|_| vec![0.1, 0.2]).collect::<Vec<_>>(),
            "actions": rewards.iter().map(|_| 0.5).collect::<Vec<_>>(),
            "rewards": rewards,
            "cd": [3.1, 3.2, 3.15],
            "cl": [0.1, -0.1, 0.05],
        })
    }

    fn write_episode(dir: &Path, index: u32, records: Value) {
        let path = dir.join(format!("observations_{index}.json"));
        fs::write(path, serde_json::to_string(&records).unwrap()).unwrap();
    }

    fn loader(dir: &Path) -> EpisodeLoader {
        EpisodeLoader::new(dir, FileTemplate::new("observations_{}.json").unwrap())
    }

    // ------------------------------------------------------------------
    // parse_trajectory
    // ------------------------------------------------------------------

    #[test]
    fn test_parse_complete_record() {
        let mut r = record(&[1.0, 2.0]);
        r["alpha"] = json!([2.0, 3.0]);
        r["beta"] = json!([2.0, 1.0]);
        r["t"] = json!([4.0, 4.01]);
        let t = parse_trajectory(&r).unwrap();
        assert_eq!(t.rewards, vec![1.0, 2.0]);
        assert_eq!(t.states.len(), 2);
        assert_eq!(t.cd.len(), 3);
        assert_eq!(t.policy.unwrap().alpha, vec![2.0, 3.0]);
        assert_eq!(t.time, Some(vec![4.0, 4.01]));
    }

    #[test]
    fn test_parse_missing_rewards() {
        let mut r = record(&[1.0]);
        r.as_object_mut().unwrap().remove("rewards");
        let err = parse_trajectory(&r).unwrap_err();
        assert!(err.contains("rewards"), "{err}");
    }

    #[test]
    fn test_parse_mistyped_field() {
        let mut r = record(&[1.0]);
        r["actions"] = json!("fast");
        assert!(parse_trajectory(&r).unwrap_err().contains("actions"));

        let mut r = record(&[1.0]);
        r["rewards"] = json!([1.0, "x"]);
        assert!(parse_trajectory(&r).unwrap_err().contains("rewards"));
    }

    #[test]
    fn test_parse_empty_rewards() {
        assert!(parse_trajectory(&record(&[])).is_err());
    }

    #[test]
    fn test_parse_mismatched_policy_params_fall_back() {
        let mut r = record(&[1.0, 2.0]);
        r["alpha"] = json!([2.0]);
        r["beta"] = json!([2.0, 1.0]);
        let t = parse_trajectory(&r).unwrap();
        assert!(t.policy.is_none());
    }

    #[test]
    fn test_parse_non_positive_policy_params_fall_back() {
        let mut r = record(&[1.0, 2.0]);
        r["alpha"] = json!([-1.0, 2.0]);
        r["beta"] = json!([3.0, 1.0]);
        assert!(parse_trajectory(&r).unwrap().policy.is_none());

        r["alpha"] = json!([1.0, 2.0]);
        r["beta"] = json!([0.0, 1.0]);
        assert!(parse_trajectory(&r).unwrap().policy.is_none());
    }

    #[test]
    fn test_parse_optional_fields_absent() {
        let r = json!({"states": [[0.0]], "actions": [0.0], "rewards": [0.5]});
        let t = parse_trajectory(&r).unwrap();
        assert!(t.cd.is_empty());
        assert!(t.cl.is_empty());
        assert!(t.time.is_none());
    }

    // ------------------------------------------------------------------
    // EpisodeLoader
    // ------------------------------------------------------------------

    #[test]
    fn test_discover_and_expected_indices() {
        let tmp = tempfile::tempdir().unwrap();
        for i in [0, 1, 3] {
            write_episode(tmp.path(), i, json!([record(&[1.0])]));
        }
        fs::write(tmp.path().join("checkpoint_0.pt"), b"opaque").unwrap();

        let l = loader(tmp.path());
        assert_eq!(l.discover_indices().unwrap(), vec![0, 1, 3]);
        assert_eq!(l.expected_indices(None).unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(l.expected_indices(Some(2)).unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_discover_skips_zero_padded_names() {
        let tmp = tempfile::tempdir().unwrap();
        write_episode(tmp.path(), 0, json!([record(&[1.0])]));
        fs::write(tmp.path().join("observations_02.json"), "[]").unwrap();

        assert_eq!(loader(tmp.path()).discover_indices().unwrap(), vec![0]);
    }

    #[test]
    fn test_episodes_yields_missing_file_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        for i in [0, 1, 3] {
            write_episode(tmp.path(), i, json!([record(&[i as f64])]));
        }

        let results: Vec<_> = loader(tmp.path()).episodes(None).unwrap().collect();
        assert_eq!(results.len(), 4);
        assert_eq!(results[0].as_ref().unwrap().episode.index, 0);
        assert_eq!(results[1].as_ref().unwrap().episode.index, 1);
        assert!(matches!(results[2], Err(EvalError::MissingFile { index: 2, .. })));
        assert_eq!(results[3].as_ref().unwrap().episode.index, 3);
    }

    #[test]
    fn test_load_episode_keeps_valid_records() {
        let tmp = tempfile::tempdir().unwrap();
        let bad = json!({"states": [[0.0]], "actions": [0.0]});
        write_episode(
            tmp.path(),
            0,
            json!({"trajectories": [record(&[1.0]), bad, record(&[2.0])]}),
        );

        let loaded = loader(tmp.path()).load_episode(0).unwrap();
        assert_eq!(loaded.episode.len(), 2);
        assert_eq!(loaded.episode.malformed, 1);
        assert!(matches!(
            loaded.rejected[0],
            EvalError::MalformedTrajectory { index: 0, position: 1, .. }
        ));
    }

    #[test]
    fn test_load_episode_unreadable() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("observations_0.json"), "not json").unwrap();
        fs::write(tmp.path().join("observations_1.json"), "42").unwrap();

        let l = loader(tmp.path());
        assert!(matches!(l.load_episode(0), Err(EvalError::Unreadable { index: 0, .. })));
        assert!(matches!(l.load_episode(1), Err(EvalError::Unreadable { index: 1, .. })));
    }

    #[test]
    fn test_empty_directory_expects_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(loader(tmp.path()).expected_indices(None).unwrap().is_empty());
    }
}
