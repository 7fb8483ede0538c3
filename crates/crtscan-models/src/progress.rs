//! Progress messages relayed to observers.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Progress of one video through inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressUpdate {
    /// `processed` of `total` expected samples handled
    Progress { processed: u64, total: u64 },
    /// The video finished (successfully or not)
    Finished,
}

impl ProgressUpdate {
    /// Wire marker for `Finished`.
    pub const FINISHED_PAIR: (i64, i64) = (-1, -1);

    pub fn progress(processed: u64, total: u64) -> Self {
        Self::Progress { processed, total }
    }

    /// Encode as a `(processed, total)` pair, `(-1, -1)` when finished.
    pub fn to_pair(&self) -> (i64, i64) {
        match *self {
            Self::Progress { processed, total } => (processed as i64, total as i64),
            Self::Finished => Self::FINISHED_PAIR,
        }
    }

    /// Decode a `(processed, total)` pair. Negative counts other than the
    /// finished marker are rejected.
    pub fn from_pair(pair: (i64, i64)) -> Option<Self> {
        match pair {
            Self::FINISHED_PAIR => Some(Self::Finished),
            (processed, total) if processed >= 0 && total >= 0 => Some(Self::Progress {
                processed: processed as u64,
                total: total as u64,
            }),
            _ => None,
        }
    }

    /// Completion percentage, 100 when finished.
    pub fn percentage(&self) -> f64 {
        match *self {
            Self::Progress { total: 0, .. } => 0.0,
            Self::Progress { processed, total } => {
                ((processed as f64 / total as f64) * 100.0).min(100.0)
            }
            Self::Finished => 100.0,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }
}
