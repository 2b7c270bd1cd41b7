//! Push/pull classification.
//!
//! Every cycle recomputes the full picture from two `(id, mtime)` maps; no
//! change log is kept between cycles. The rules, per id:
//!
//! | local | remote | action |
//! |---|---|---|
//! | `l` | `r`, `r > l` | pull |
//! | `l` | `r`, `l > r` | push |
//! | `t` | `t` | nothing |
//! | present | absent | push |
//! | absent | present | pull |
//!
//! Comparisons are strict, so equal timestamps never move data.

use docsync_protocol::MetaEntry;
use docsync_store::{Document, Timestamp};
use std::collections::BTreeMap;

/// Which side holds the newer copy of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// The local store; the document is pushed.
    Local,
    /// The remote side; the document is pulled.
    Remote,
}

/// One document that has to move this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    /// Document id.
    pub id: String,
    /// Modification instant on the winning side.
    pub mtime: Timestamp,
    /// Winning side.
    pub origin: Origin,
}

/// The push and pull sets of one cycle, each ordered by `(mtime, id)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// Documents to send upstream.
    pub push: Vec<ChangeRecord>,
    /// Documents to fetch and apply locally.
    pub pull: Vec<ChangeRecord>,
}

impl SyncPlan {
    /// Returns true when nothing has to move.
    pub fn is_empty(&self) -> bool {
        self.push.is_empty() && self.pull.is_empty()
    }

    /// Ids to push.
    pub fn push_ids(&self) -> Vec<String> {
        self.push.iter().map(|r| r.id.clone()).collect()
    }

    /// Ids to pull.
    pub fn pull_ids(&self) -> Vec<String> {
        self.pull.iter().map(|r| r.id.clone()).collect()
    }

    /// Remote mtime of each pulled id.
    pub fn pull_mtimes(&self) -> BTreeMap<String, Timestamp> {
        self.pull.iter().map(|r| (r.id.clone(), r.mtime)).collect()
    }
}

/// Builds the local `id → mtime` map.
pub fn local_index(docs: &[Document]) -> BTreeMap<String, Timestamp> {
    docs.iter().map(|d| (d.id.clone(), d.mtime)).collect()
}

/// Builds the remote `id → mtime` map. Duplicate ids keep the largest mtime.
pub fn remote_index(entries: &[MetaEntry]) -> BTreeMap<String, Timestamp> {
    let mut index = BTreeMap::new();
    for entry in entries {
        index
            .entry(entry.id.clone())
            .and_modify(|mtime: &mut Timestamp| *mtime = (*mtime).max(entry.mtime))
            .or_insert(entry.mtime);
    }
    index
}

/// Classifies every id present on either side.
pub fn classify(
    local: &BTreeMap<String, Timestamp>,
    remote: &BTreeMap<String, Timestamp>,
) -> SyncPlan {
    let mut plan = SyncPlan::default();

    for (id, &local_mtime) in local {
        match remote.get(id) {
            Some(&remote_mtime) if remote_mtime > local_mtime => plan.pull.push(ChangeRecord {
                id: id.clone(),
                mtime: remote_mtime,
                origin: Origin::Remote,
            }),
            Some(&remote_mtime) if remote_mtime == local_mtime => {}
            _ => plan.push.push(ChangeRecord {
                id: id.clone(),
                mtime: local_mtime,
                origin: Origin::Local,
            }),
        }
    }

    for (id, &remote_mtime) in remote {
        if !local.contains_key(id) {
            plan.pull.push(ChangeRecord {
                id: id.clone(),
                mtime: remote_mtime,
                origin: Origin::Remote,
            });
        }
    }

    plan.push.sort_by(|a, b| (a.mtime, &a.id).cmp(&(b.mtime, &b.id)));
    plan.pull.sort_by(|a, b| (a.mtime, &a.id).cmp(&(b.mtime, &b.id)));
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn index(pairs: &[(&str, Timestamp)]) -> BTreeMap<String, Timestamp> {
        pairs.iter().map(|(id, m)| (id.to_string(), *m)).collect()
    }

    #[test]
    fn newer_local_is_pushed() {
        let plan = classify(&index(&[("a", 100)]), &index(&[("a", 50)]));
        assert_eq!(plan.push_ids(), vec!["a"]);
        assert!(plan.pull.is_empty());
    }

    #[test]
    fn remote_only_is_pulled_with_remote_mtime() {
        let plan = classify(&index(&[]), &index(&[("b", 200)]));
        assert!(plan.push.is_empty());
        assert_eq!(
            plan.pull,
            vec![ChangeRecord {
                id: "b".into(),
                mtime: 200,
                origin: Origin::Remote
            }]
        );
    }

    #[test]
    fn equal_mtime_is_noop() {
        let plan = classify(&index(&[("a", 7)]), &index(&[("a", 7)]));
        assert!(plan.is_empty());
    }

    #[test]
    fn mixed_plan_is_ordered_by_mtime() {
        let local = index(&[("a", 300), ("b", 10), ("c", 5), ("d", 100)]);
        let remote = index(&[("b", 20), ("c", 5), ("d", 50), ("e", 1)]);
        let plan = classify(&local, &remote);

        assert_eq!(plan.push_ids(), vec!["d", "a"]);
        assert_eq!(plan.pull_ids(), vec!["e", "b"]);
        assert_eq!(plan.pull_mtimes()["b"], 20);
    }

    #[test]
    fn duplicate_remote_ids_keep_max() {
        let entries = vec![
            MetaEntry::new("a", 5),
            MetaEntry::new("a", 9),
            MetaEntry::new("a", 7),
        ];
        assert_eq!(remote_index(&entries)["a"], 9);
    }

    fn mtime_map() -> impl Strategy<Value = BTreeMap<String, Timestamp>> {
        prop::collection::btree_map("[a-f]{1,2}", 0i64..20, 0..12)
    }

    proptest! {
        #[test]
        fn every_id_lands_in_the_right_set(local in mtime_map(), remote in mtime_map()) {
            let plan = classify(&local, &remote);
            let push: BTreeMap<_, _> = plan.push.iter().map(|r| (r.id.clone(), r)).collect();
            let pull: BTreeMap<_, _> = plan.pull.iter().map(|r| (r.id.clone(), r)).collect();

            prop_assert_eq!(push.len(), plan.push.len());
            prop_assert_eq!(pull.len(), plan.pull.len());

            for id in local.keys().chain(remote.keys()) {
                let expected = match (local.get(id), remote.get(id)) {
                    (Some(l), Some(r)) if r > l => Some(Origin::Remote),
                    (Some(l), Some(r)) if l > r => Some(Origin::Local),
                    (Some(_), Some(_)) => None,
                    (Some(_), None) => Some(Origin::Local),
                    (None, Some(_)) => Some(Origin::Remote),
                    (None, None) => unreachable!(),
                };
                match expected {
                    Some(Origin::Local) => {
                        prop_assert!(!pull.contains_key(id));
                        prop_assert_eq!(push[id].mtime, local[id]);
                    }
                    Some(Origin::Remote) => {
                        prop_assert!(!push.contains_key(id));
                        prop_assert_eq!(pull[id].mtime, remote[id]);
                    }
                    None => {
                        prop_assert!(!push.contains_key(id) && !pull.contains_key(id));
                    }
                }
            }
        }

        #[test]
        fn applying_the_plan_converges(local in mtime_map(), remote in mtime_map()) {
            let plan = classify(&local, &remote);
            let mut local_after = local.clone();
            let mut remote_after = remote.clone();
            for r in &plan.push {
                remote_after.insert(r.id.clone(), r.mtime);
            }
            for r in &plan.pull {
                local_after.insert(r.id.clone(), r.mtime);
            }

            prop_assert_eq!(&local_after, &remote_after);
            prop_assert!(classify(&local_after, &remote_after).is_empty());
        }
    }
}
