use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use time::OffsetDateTime;

use super::controls::NodeControlData;
use super::merge::merge_maps;

/// One observed value with the time it was observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestEntry<T> {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub value: T,
}

impl<T: Ord> LatestEntry<T> {
    /// Later timestamp wins; an exact tie goes to the larger value.
    fn newer<'a>(&'a self, other: &'a Self) -> &'a Self {
        match self.timestamp.cmp(&other.timestamp) {
            Ordering::Greater => self,
            Ordering::Less => other,
            Ordering::Equal => {
                if self.value >= other.value {
                    self
                } else {
                    other
                }
            }
        }
    }
}

/// Last-write-wins map from key to timestamped value.
///
/// There is no removal: a missing key means the value was never observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LatestMap<T>(BTreeMap<String, LatestEntry<T>>);

pub type StringLatestMap = LatestMap<String>;
pub type NodeControlDataLatestMap = LatestMap<NodeControlData>;

impl<T> Default for LatestMap<T> {
    fn default() -> Self {
        Self(BTreeMap::new())
    }
}

impl<T> LatestMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LatestEntry<T>)> {
        self.0.iter().map(|(k, e)| (k.as_str(), e))
    }

    pub fn lookup(&self, key: &str) -> Option<&T> {
        self.0.get(key).map(|e| &e.value)
    }

    pub fn lookup_entry(&self, key: &str) -> Option<(&T, OffsetDateTime)> {
        self.0.get(key).map(|e| (&e.value, e.timestamp))
    }
}

impl<T: Clone + Ord> LatestMap<T> {
    /// Records `value` for `key` unless a newer observation is already held.
    pub fn set(mut self, key: impl Into<String>, timestamp: OffsetDateTime, value: T) -> Self {
        let incoming = LatestEntry { timestamp, value };
        let key = key.into();
        let winner = match self.0.get(&key) {
            Some(existing) => existing.newer(&incoming).clone(),
            None => incoming,
        };
        self.0.insert(key, winner);
        self
    }

    pub fn merge(&self, other: &Self) -> Self {
        Self(merge_maps(&self.0, &other.0, |l, r| l.newer(r).clone()))
    }
}

impl<T: Clone + Ord> FromIterator<(String, LatestEntry<T>)> for LatestMap<T> {
    fn from_iter<I: IntoIterator<Item = (String, LatestEntry<T>)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::default(), |map, (k, e)| map.set(k, e.timestamp, e.value))
    }
}
