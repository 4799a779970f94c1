use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Single-pass merge-join of two ordered maps.
///
/// Keys present on one side only are cloned through; keys present on both
/// sides are combined with `both`. The output is produced in key order, so
/// building the resulting map is linear as well.
pub(crate) fn merge_maps<K, V, F>(
    left: &BTreeMap<K, V>,
    right: &BTreeMap<K, V>,
    mut both: F,
) -> BTreeMap<K, V>
where
    K: Ord + Clone,
    V: Clone,
    F: FnMut(&V, &V) -> V,
{
    if left.is_empty() {
        return right.clone();
    }
    if right.is_empty() {
        return left.clone();
    }

    let mut out: Vec<(K, V)> = Vec::with_capacity(left.len().max(right.len()));
    let mut l = left.iter().peekable();
    let mut r = right.iter().peekable();

    loop {
        let order = match (l.peek(), r.peek()) {
            (Some(&(lk, _)), Some(&(rk, _))) => lk.cmp(rk),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => break,
        };
        match order {
            Ordering::Less => {
                if let Some((k, v)) = l.next() {
                    out.push((k.clone(), v.clone()));
                }
            }
            Ordering::Greater => {
                if let Some((k, v)) = r.next() {
                    out.push((k.clone(), v.clone()));
                }
            }
            Ordering::Equal => {
                if let (Some((k, lv)), Some((_, rv))) = (l.next(), r.next()) {
                    out.push((k.clone(), both(lv, rv)));
                }
            }
        }
    }

    out.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::merge_maps;
    use std::collections::BTreeMap;

    #[test]
    fn combines_shared_keys_and_keeps_the_rest() {
        let left = BTreeMap::from([("a", 1), ("c", 3), ("e", 5)]);
        let right = BTreeMap::from([("b", 20), ("c", 30), ("f", 60)]);

        let merged = merge_maps(&left, &right, |l, r| l + r);

        assert_eq!(
            merged.into_iter().collect::<Vec<_>>(),
            vec![("a", 1), ("b", 20), ("c", 33), ("e", 5), ("f", 60)]
        );
    }

    #[test]
    fn empty_side_returns_other() {
        let left: BTreeMap<&str, i32> = BTreeMap::new();
        let right = BTreeMap::from([("x", 1)]);
        assert_eq!(merge_maps(&left, &right, |l, _| *l), right);
        assert_eq!(merge_maps(&right, &left, |l, _| *l), right);
    }
}
