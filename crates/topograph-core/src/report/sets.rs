use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::merge::merge_maps;

pub type StringSet = BTreeSet<String>;

/// Multi-valued node attributes: key to a set of unique strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sets(BTreeMap<String, StringSet>);

impl Sets {
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

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StringSet)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn lookup(&self, key: &str) -> Option<&StringSet> {
        self.0.get(key)
    }

    /// Unions `values` into the set stored under `key`.
    pub fn add(mut self, key: impl Into<String>, values: StringSet) -> Self {
        if values.is_empty() {
            return self;
        }
        self.0.entry(key.into()).or_default().extend(values);
        self
    }

    pub fn add_string(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.entry(key.into()).or_default().insert(value.into());
        self
    }

    pub fn merge(&self, other: &Sets) -> Sets {
        Sets(merge_maps(&self.0, &other.0, |l, r| l.union(r).cloned().collect()))
    }

    /// Keeps only the values of `key` accepted by `keep`, dropping the key
    /// once it is empty. Used by aging, never by merge.
    pub(crate) fn retain_values(mut self, key: &str, keep: impl Fn(&str) -> bool) -> Self {
        if let Some(values) = self.0.get_mut(key) {
            values.retain(|v| keep(v.as_str()));
            if values.is_empty() {
                self.0.remove(key);
            }
        }
        self
    }
}

impl FromIterator<(String, StringSet)> for Sets {
    fn from_iter<I: IntoIterator<Item = (String, StringSet)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Sets::new(), |sets, (k, v)| sets.add(k, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(values: &[&str]) -> StringSet {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn merge_is_per_key_union() {
        let a = Sets::new()
            .add("parents/deployment", set(&["web;<deployment>"]))
            .add("origins", set(&["probe-a"]));
        let b = Sets::new()
            .add("parents/deployment", set(&["api;<deployment>", "web;<deployment>"]))
            .add("parents/service", set(&["svc;<service>"]));

        let merged = a.merge(&b);

        assert_eq!(
            merged.lookup("parents/deployment"),
            Some(&set(&["api;<deployment>", "web;<deployment>"]))
        );
        assert_eq!(merged.lookup("origins"), Some(&set(&["probe-a"])));
        assert_eq!(merged.lookup("parents/service"), Some(&set(&["svc;<service>"])));
        assert_eq!(merged, b.merge(&a));
    }

    #[test]
    fn add_string_deduplicates() {
        let s = Sets::new().add_string("k", "v").add_string("k", "v");
        assert_eq!(s.lookup("k").map(|v| v.len()), Some(1));
    }

    #[test]
    fn retain_values_drops_emptied_key() {
        let s = Sets::new()
            .add("origins", set(&["a", "b"]))
            .retain_values("origins", |v| v != "a");
        assert_eq!(s.lookup("origins"), Some(&set(&["b"])));

        let s = s.retain_values("origins", |_| false);
        assert!(s.lookup("origins").is_none());
        assert!(s.is_empty());
    }
}
