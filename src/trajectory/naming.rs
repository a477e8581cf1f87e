//! File name templates keyed by episode index.

use std::path::{Path, PathBuf};

use crate::config::INDEX_PLACEHOLDER;
use crate::error::{EvalError, Result};

use super::types::EpisodeIndex;

/// A file name template such as `observations_{}.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTemplate {
    prefix: String,
    suffix: String,
}

impl FileTemplate {
    /// Split a template around its single `{}` placeholder.
    pub fn new(template: &str) -> Result<Self> {
        let mut parts = template.split(INDEX_PLACEHOLDER);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(prefix), Some(suffix), None) => Ok(Self {
                prefix: prefix.to_string(),
                suffix: suffix.to_string(),
            }),
            _ => Err(EvalError::Config(format!(
                "file template {template:?} must contain exactly one `{INDEX_PLACEHOLDER}`"
            ))),
        }
    }

    pub fn file_name(&self, index: EpisodeIndex) -> String {
        format!("{}{}{}", self.prefix, index, self.suffix)
    }

    pub fn path_for(&self, dir: &Path, index: EpisodeIndex) -> PathBuf {
        dir.join(self.file_name(index))
    }

    /// Recover the episode index from a file name produced by this template.
    ///
    /// Only plain decimal indices match; `observations_01.json` does not
    /// round-trip and is rejected so indices are never renumbered.
    pub fn index_of(&self, file_name: &str) -> Option<EpisodeIndex> {
        let digits = self.digits(file_name)?;
        let index: EpisodeIndex = digits.parse().ok()?;
        (index.to_string() == digits).then_some(index)
    }

    /// Whether `file_name` has this template's shape with a decimal index that
    /// [`index_of`](Self::index_of) rejects, e.g. zero padding or overflow.
    pub fn is_numbered_variant(&self, file_name: &str) -> bool {
        self.digits(file_name).is_some() && self.index_of(file_name).is_none()
    }

    fn digits<'a>(&self, file_name: &'a str) -> Option<&'a str> {
        let digits = file_name
            .strip_prefix(self.prefix.as_str())?
            .strip_suffix(self.suffix.as_str())?;
        (!digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())).then_some(digits)
    }
}
