//! Per-source high-water marks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Mapping from source id to the highest sequence already emitted.
///
/// Serialized as a flat JSON object (`{"durov": 412}`). Unknown sources read
/// as 0, and a stored mark never decreases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatermarkMap(BTreeMap<String, u64>);

impl WatermarkMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last emitted sequence for a source (0 if never seen).
    pub fn get(&self, source_id: &str) -> u64 {
        self.0.get(source_id).copied().unwrap_or(0)
    }

    /// Raise the mark for a source. Lower values are ignored.
    ///
    /// Returns true if the stored value changed.
    pub fn advance(&mut self, source_id: &str, sequence: u64) -> bool {
        let entry = self.0.entry(source_id.to_string()).or_insert(0);
        if sequence > *entry {
            *entry = sequence;
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, u64)> for WatermarkMap {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (source, sequence) in iter {
            map.advance(&source, sequence);
        }
        map
    }
}
