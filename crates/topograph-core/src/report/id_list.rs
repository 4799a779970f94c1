use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Ordered set of node IDs; used for adjacency and probe identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdList(BTreeSet<String>);

impl IdList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Empty IDs are ignored so producers can pass through optional links.
    pub fn add(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if !id.is_empty() {
            self.0.insert(id);
        }
        self
    }

    pub fn add_all<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ids.into_iter().fold(self, |list, id| list.add(id))
    }

    pub fn merge(&self, other: &IdList) -> IdList {
        if other.0.is_empty() {
            return self.clone();
        }
        if self.0.is_empty() {
            return other.clone();
        }
        IdList(self.0.union(&other.0).cloned().collect())
    }

    pub fn retain(mut self, keep: impl Fn(&str) -> bool) -> Self {
        self.0.retain(|id| keep(id.as_str()));
        self
    }
}

impl<S: Into<String>> FromIterator<S> for IdList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        IdList::new().add_all(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::IdList;

    #[test]
    fn add_ignores_empty_and_duplicates() {
        let list = IdList::new().add("a").add("").add("a").add("b");
        assert_eq!(list.iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn merge_is_union() {
        let a: IdList = ["x", "y"].into_iter().collect();
        let b: IdList = ["y", "z"].into_iter().collect();
        assert_eq!(a.merge(&b).iter().collect::<Vec<_>>(), vec!["x", "y", "z"]);
        assert_eq!(a.merge(&b), b.merge(&a));
    }
}
