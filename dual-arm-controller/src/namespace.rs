use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};
use tracing::debug;

/// One arm of a dual-arm device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Fan-out order for every dual-arm operation
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    pub fn prefix(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }

    /// `"<side>.<local>"`
    pub fn composite_key(&self, local_key: &str) -> String {
        format!("{}.{}", self.prefix(), local_key)
    }

    /// Local part of a composite key if it belongs to this side
    pub fn strip<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.prefix())?
            .strip_prefix('.')
            .filter(|local| !local.is_empty())
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Side and local key of a composite key.
pub fn parse_composite_key(key: &str) -> Option<(Side, &str)> {
    Side::BOTH
        .iter()
        .find_map(|side| side.strip(key).map(|local| (*side, local)))
}

pub fn prefix_keys<V>(side: Side, map: BTreeMap<String, V>) -> BTreeMap<String, V> {
    map.into_iter()
        .map(|(key, value)| (side.composite_key(&key), value))
        .collect()
}

/// Prefix both per-side maps and merge them into one composite map.
///
/// Keys can't collide since the two prefixes are disjoint.
pub fn merge_sides<V>(left: BTreeMap<String, V>, right: BTreeMap<String, V>) -> BTreeMap<String, V> {
    let mut merged = prefix_keys(Side::Left, left);
    merged.extend(prefix_keys(Side::Right, right));
    merged
}

/// Split a composite map into left and right local maps.
///
/// Keys without a `left.` or `right.` prefix are dropped.
pub fn split_by_side<V>(map: BTreeMap<String, V>) -> (BTreeMap<String, V>, BTreeMap<String, V>) {
    let mut left = BTreeMap::new();
    let mut right = BTreeMap::new();
    for (key, value) in map {
        match parse_composite_key(&key) {
            Some((Side::Left, local)) => {
                left.insert(local.to_owned(), value);
            }
            Some((Side::Right, local)) => {
                right.insert(local.to_owned(), value);
            }
            None => debug!("Dropping key {:?} without a side prefix", key),
        }
    }
    (left, right)
}
