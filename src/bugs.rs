use std::{collections::HashSet, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A known anomaly, recognised by a fragment of the message it produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugDefinition {
    pub id: String,
    pub message: String,
}

/// Set of known bugs plus which of them were already reported this episode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BugCatalog {
    bugs: Vec<BugDefinition>,
    #[serde(skip)]
    detected: HashSet<String>,
}

impl BugCatalog {
    pub fn new(bugs: Vec<BugDefinition>) -> Self {
        Self {
            bugs,
            detected: HashSet::new(),
        }
    }

    /// Reads `{"bugs": [{"id": ..., "message": ...}, ...]}`.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Ids of bugs whose message occurs in any of `messages` and that have
    /// not been reported since the last [`BugCatalog::reset`].
    pub fn scan<S: AsRef<str>>(&mut self, messages: &[S]) -> Vec<String> {
        let mut found = Vec::new();
        for bug in &self.bugs {
            if self.detected.contains(&bug.id) {
                continue;
            }
            if messages.iter().any(|m| m.as_ref().contains(&bug.message)) {
                tracing::info!(id = %bug.id, message = %bug.message, "bug detected");
                self.detected.insert(bug.id.clone());
                found.push(bug.id.clone());
            }
        }
        found
    }

    pub fn reset(&mut self) {
        self.detected.clear();
    }

    pub fn len(&self) -> usize {
        self.bugs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bugs.is_empty()
    }

    pub fn detected_count(&self) -> usize {
        self.detected.len()
    }

    pub fn all_detected(&self) -> bool {
        !self.bugs.is_empty() && self.detected.len() == self.bugs.len()
    }
}
