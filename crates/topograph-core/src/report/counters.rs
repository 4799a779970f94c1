use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::merge::merge_maps;

/// Per-topology rollup counts, e.g. how many pods a deployment groups.
///
/// Merging keeps the larger count per key, so re-applying the same rollup
/// never inflates it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Counters(BTreeMap<String, u64>);

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn lookup(&self, key: &str) -> Option<u64> {
        self.0.get(key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn set(mut self, key: impl Into<String>, value: u64) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn merge(&self, other: &Counters) -> Counters {
        Counters(merge_maps(&self.0, &other.0, |l, r| *l.max(r)))
    }
}

#[cfg(test)]
mod tests {
    use super::Counters;

    #[test]
    fn merge_keeps_maximum() {
        let a = Counters::new().set("pod", 3).set("container", 1);
        let b = Counters::new().set("pod", 2);
        let merged = a.merge(&b);
        assert_eq!(merged.lookup("pod"), Some(3));
        assert_eq!(merged.lookup("container"), Some(1));
        assert_eq!(merged.merge(&merged), merged);
    }
}
