//! Statistics calculation helpers.
//!
//! Pure functions shared by the report model and the event-log backends:
//! - Ratio metrics with fixed fallbacks for empty denominators
//! - Stable group-and-rank over keyed rows

use std::collections::HashMap;
use std::hash::Hash;

/// Kill/death ratio. With no deaths the ratio is the raw kill count.
pub fn kd_ratio(kills: u64, deaths: u64) -> f64 {
    if deaths == 0 {
        kills as f64
    } else {
        kills as f64 / deaths as f64
    }
}

/// Revives per death, 0 when there are no deaths.
pub fn revives_per_death(revives: u64, deaths: u64) -> f64 {
    if deaths == 0 {
        0.0
    } else {
        revives as f64 / deaths as f64
    }
}

/// Wounds dealt per revive, 0 when there are no revives.
pub fn hits_per_revive(hits: u64, revives: u64) -> f64 {
    if revives == 0 {
        0.0
    } else {
        hits as f64 / revives as f64
    }
}

/// One bucket produced by [`rank_groups`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedGroup<K> {
    pub key: K,
    /// Label carried by the last row seen for this key
    pub label: Option<String>,
    pub count: u64,
}

/// Group rows by key and order the groups by size.
///
/// Groups keep the order in which their key first appeared, and the sort is
/// stable, so among equal counts the earliest group wins. `descending` puts
/// the largest group first.
pub fn rank_groups<K, I>(rows: I, descending: bool) -> Vec<RankedGroup<K>>
where
    K: Eq + Hash + Clone,
    I: IntoIterator<Item = (K, Option<String>)>,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<RankedGroup<K>> = Vec::new();

    for (key, label) in rows {
        match index.get(&key) {
            Some(&i) => {
                let group = &mut groups[i];
                group.count += 1;
                if label.is_some() {
                    group.label = label;
                }
            }
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(RankedGroup {
                    key,
                    label,
                    count: 1,
                });
            }
        }
    }

    if descending {
        groups.sort_by(|a, b| b.count.cmp(&a.count));
    } else {
        groups.sort_by(|a, b| a.count.cmp(&b.count));
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(keys: &[&str]) -> Vec<(String, Option<String>)> {
        keys.iter()
            .map(|k| (k.to_string(), Some(format!("name-{}", k))))
            .collect()
    }

    #[test]
    fn test_kd_ratio() {
        assert_eq!(kd_ratio(5, 2), 2.5);
        assert_eq!(kd_ratio(5, 0), 5.0);
        assert_eq!(kd_ratio(0, 0), 0.0);
        assert_eq!(kd_ratio(0, 4), 0.0);
    }

    #[test]
    fn test_kd_ratio_is_finite_without_deaths() {
        assert!(kd_ratio(1_000, 0).is_finite());
    }

    #[test]
    fn test_revives_per_death() {
        assert_eq!(revives_per_death(6, 3), 2.0);
        assert_eq!(revives_per_death(6, 0), 0.0);
        assert_eq!(revives_per_death(0, 3), 0.0);
    }

    #[test]
    fn test_hits_per_revive() {
        assert_eq!(hits_per_revive(10, 4), 2.5);
        assert_eq!(hits_per_revive(10, 0), 0.0);
        assert_eq!(hits_per_revive(0, 0), 0.0);
    }

    #[test]
    fn test_rank_groups_counts_and_orders() {
        let ranked = rank_groups(rows(&["a", "b", "b", "c", "b", "c"]), true);

        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].key, "b");
        assert_eq!(ranked[0].count, 3);
        assert_eq!(ranked[1].key, "c");
        assert_eq!(ranked[2].key, "a");
    }

    #[test]
    fn test_rank_groups_tie_goes_to_first_seen() {
        let ranked = rank_groups(rows(&["x", "y", "y", "x"]), true);
        assert_eq!(ranked[0].key, "x");

        let ranked = rank_groups(rows(&["y", "x", "y", "x"]), true);
        assert_eq!(ranked[0].key, "y");
    }

    #[test]
    fn test_rank_groups_ascending() {
        let ranked = rank_groups(rows(&["a", "a", "b"]), false);
        assert_eq!(ranked[0].key, "b");
        assert_eq!(ranked[1].key, "a");
    }

    #[test]
    fn test_rank_groups_keeps_latest_label() {
        let input = vec![
            ("1".to_string(), Some("OldName".to_string())),
            ("1".to_string(), None),
            ("1".to_string(), Some("NewName".to_string())),
        ];
        let ranked = rank_groups(input, true);

        assert_eq!(ranked[0].label.as_deref(), Some("NewName"));
        assert_eq!(ranked[0].count, 3);
    }

    #[test]
    fn test_rank_groups_empty() {
        let ranked = rank_groups(Vec::<(String, Option<String>)>::new(), true);
        assert!(ranked.is_empty());
    }
}
