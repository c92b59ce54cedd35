//! Conversation Differ
//!
//! Computes the edit script that turns one snapshot into the next so the
//! list can update incrementally instead of re-rendering everything.
//!
//! ## Identity and content
//!
//! Entries are matched by [`ThreadId`]. A matched entry needs re-binding only
//! when its snippet, contact name or unread count changed
//! ([`Conversation::same_content`]).
//!
//! ## Script order
//!
//! Operations are emitted so they can be applied one after another without
//! index bookkeeping by the consumer:
//!
//! 1. `Remove`, highest old position first
//! 2. `Move`, for survivors whose relative order changed
//! 3. `Insert`, lowest new position first
//! 4. `Update`, at new positions
//!
//! Survivors on the longest increasing run (by new position, in old order)
//! stay in place. Every other survivor is moved, taken in old-position order.
//!
//! ```rust
//! use cosmic_messages_core::{Conversation, ConversationDiffer, DiffOp};
//!
//! let old = vec![Conversation::new(1, "+1").with_snippet("Hi")];
//! let new = vec![Conversation::new(1, "+1").with_snippet("Hi there")];
//!
//! let script = ConversationDiffer::diff(&old, &new);
//! assert_eq!(
//!     script.ops(),
//!     &[DiffOp::Update { position: 0, item: new[0].clone() }]
//! );
//! ```

use crate::{Conversation, ThreadId};
use serde::Serialize;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// A single edit operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DiffOp {
    /// Remove the entry at `position`
    Remove { position: usize },
    /// Take the entry at `from` out and re-insert it at `to`
    Move { from: usize, to: usize },
    /// Insert `item` so that it ends up at `position`
    Insert { position: usize, item: Conversation },
    /// Replace the entry at `position` with `item`
    Update { position: usize, item: Conversation },
}

/// Number of operations of each kind in a script
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub removes: usize,
    pub moves: usize,
    pub inserts: usize,
    pub updates: usize,
}

/// Ordered edit script between two snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DiffScript {
    ops: Vec<DiffOp>,
}

impl DiffScript {
    pub fn ops(&self) -> &[DiffOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DiffOp> {
        self.ops.iter()
    }

    pub fn summary(&self) -> DiffSummary {
        let mut summary = DiffSummary::default();
        for op in &self.ops {
            match op {
                DiffOp::Remove { .. } => summary.removes += 1,
                DiffOp::Move { .. } => summary.moves += 1,
                DiffOp::Insert { .. } => summary.inserts += 1,
                DiffOp::Update { .. } => summary.updates += 1,
            }
        }
        summary
    }
}

impl IntoIterator for DiffScript {
    type Item = DiffOp;
    type IntoIter = std::vec::IntoIter<DiffOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

impl<'a> IntoIterator for &'a DiffScript {
    type Item = &'a DiffOp;
    type IntoIter = std::slice::Iter<'a, DiffOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.iter()
    }
}

/// Snapshot differ
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversationDiffer;

impl ConversationDiffer {
    /// Compute the script that transforms `old` into `new`
    ///
    /// Neither snapshot is modified. The result depends only on the inputs.
    pub fn diff(old: &[Conversation], new: &[Conversation]) -> DiffScript {
        let old = normalize(old);
        let new = normalize(new);

        let old_index: HashMap<ThreadId, usize> = old
            .iter()
            .enumerate()
            .map(|(pos, c)| (c.thread_id, pos))
            .collect();
        let new_index: HashMap<ThreadId, usize> = new
            .iter()
            .enumerate()
            .map(|(pos, c)| (c.thread_id, pos))
            .collect();

        let mut ops = Vec::new();

        // Removes, back to front so earlier positions stay valid
        for (pos, item) in old.iter().enumerate().rev() {
            if !new_index.contains_key(&item.thread_id) {
                ops.push(DiffOp::Remove { position: pos });
            }
        }

        // Survivors in old order, identified by their new position
        let survivors: Vec<usize> = old
            .iter()
            .filter_map(|c| new_index.get(&c.thread_id).copied())
            .collect();
        ops.extend(plan_moves(&survivors));

        for (pos, item) in new.iter().enumerate() {
            if !old_index.contains_key(&item.thread_id) {
                ops.push(DiffOp::Insert {
                    position: pos,
                    item: item.clone(),
                });
            }
        }

        for (pos, item) in new.iter().enumerate() {
            if let Some(&old_pos) = old_index.get(&item.thread_id) {
                if !old[old_pos].same_content(item) {
                    ops.push(DiffOp::Update {
                        position: pos,
                        item: item.clone(),
                    });
                }
            }
        }

        let script = DiffScript { ops };
        debug!("Computed diff: {:?}", script.summary());
        script
    }

    /// Apply a script to a snapshot
    ///
    /// `apply(diff(old, new), old)` yields `new` (up to timestamps of entries
    /// whose visible content did not change). Operations that do not fit the
    /// snapshot are skipped with a warning.
    pub fn apply(script: &DiffScript, snapshot: &[Conversation]) -> Vec<Conversation> {
        let mut list = snapshot.to_vec();
        for op in script {
            match op {
                DiffOp::Remove { position } if *position < list.len() => {
                    list.remove(*position);
                }
                DiffOp::Move { from, to } if *from < list.len() && *to < list.len() => {
                    let item = list.remove(*from);
                    list.insert(*to, item);
                }
                DiffOp::Insert { position, item } if *position <= list.len() => {
                    list.insert(*position, item.clone());
                }
                DiffOp::Update { position, item } if *position < list.len() => {
                    list[*position] = item.clone();
                }
                other => warn!(
                    "Skipping diff operation {:?} on list of {}",
                    other,
                    list.len()
                ),
            }
        }
        list
    }
}

/// Collapse duplicate thread ids
///
/// The first occurrence keeps its slot and later duplicates overwrite that
/// slot's content.
fn normalize(snapshot: &[Conversation]) -> Cow<'_, [Conversation]> {
    let mut seen = HashSet::with_capacity(snapshot.len());
    if snapshot.iter().all(|c| seen.insert(c.thread_id)) {
        return Cow::Borrowed(snapshot);
    }

    let mut slots: HashMap<ThreadId, usize> = HashMap::with_capacity(snapshot.len());
    let mut normalized: Vec<Conversation> = Vec::with_capacity(snapshot.len());
    for item in snapshot {
        match slots.get(&item.thread_id) {
            Some(&slot) => {
                warn!(
                    "Duplicate thread {} in snapshot, treating it as an update",
                    item.thread_id
                );
                normalized[slot] = item.clone();
            }
            None => {
                slots.insert(item.thread_id, normalized.len());
                normalized.push(item.clone());
            }
        }
    }
    Cow::Owned(normalized)
}

/// Plan the moves that sort survivors into their new order
///
/// `survivors` holds each surviving entry's new position, listed in old
/// order. Positions are unique.
fn plan_moves(survivors: &[usize]) -> Vec<DiffOp> {
    let stable = longest_increasing_run(survivors);

    // Current order, then which entries already sit correctly relative to
    // each other
    let mut work: Vec<usize> = survivors.to_vec();
    let mut placed: Vec<bool> = vec![false; max_position(survivors)];
    for (i, &target) in survivors.iter().enumerate() {
        if stable[i] {
            placed[target] = true;
        }
    }

    let mut ops = Vec::new();
    for (i, &target) in survivors.iter().enumerate() {
        if stable[i] {
            continue;
        }

        let Some(from) = work.iter().position(|&p| p == target) else {
            continue;
        };
        work.remove(from);

        // Right after the closest placed entry that precedes it in new order
        let to = work
            .iter()
            .enumerate()
            .filter(|&(_, &p)| placed[p] && p < target)
            .max_by_key(|&(_, &p)| p)
            .map(|(idx, _)| idx + 1)
            .unwrap_or(0);

        work.insert(to, target);
        placed[target] = true;
        if from != to {
            ops.push(DiffOp::Move { from, to });
        }
    }
    ops
}

fn max_position(positions: &[usize]) -> usize {
    positions.iter().copied().max().map(|m| m + 1).unwrap_or(0)
}

/// Mark the members of one longest strictly increasing subsequence
///
/// Patience sorting: when several runs have the same length, the one
/// ending in the smallest values wins, which keeps later old entries in
/// place and moves earlier ones.
fn longest_increasing_run(values: &[usize]) -> Vec<bool> {
    // tails[k] = index of the smallest tail of an increasing run of length k + 1
    let mut tails: Vec<usize> = Vec::new();
    let mut previous: Vec<Option<usize>> = vec![None; values.len()];

    for (i, &value) in values.iter().enumerate() {
        let slot = tails.partition_point(|&t| values[t] < value);
        previous[i] = if slot > 0 { Some(tails[slot - 1]) } else { None };
        if slot == tails.len() {
            tails.push(i);
        } else {
            tails[slot] = i;
        }
    }

    let mut mask = vec![false; values.len()];
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        mask[i] = true;
        cursor = previous[i];
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conv(id: i64, snippet: &str) -> Conversation {
        Conversation::new(id, format!("+{}", id)).with_snippet(snippet)
    }

    fn ids(list: &[Conversation]) -> Vec<i64> {
        list.iter().map(|c| c.thread_id.0).collect()
    }

    #[test]
    fn test_identical_snapshots_produce_empty_script() {
        let snapshot = vec![conv(1, "a"), conv(2, "b"), conv(3, "c")];
        assert!(ConversationDiffer::diff(&snapshot, &snapshot).is_empty());
        assert!(ConversationDiffer::diff(&[], &[]).is_empty());
    }

    #[test]
    fn test_content_change_is_update() {
        let old = vec![conv(1, "Hi")];
        let new = vec![conv(1, "Hi there")];

        let script = ConversationDiffer::diff(&old, &new);
        assert_eq!(
            script.ops(),
            &[DiffOp::Update {
                position: 0,
                item: conv(1, "Hi there"),
            }]
        );
    }

    #[test]
    fn test_swap_moves_first_entry() {
        let old = vec![conv(1, ""), conv(2, "")];
        let new = vec![conv(2, ""), conv(1, "")];

        let script = ConversationDiffer::diff(&old, &new);
        assert_eq!(script.ops(), &[DiffOp::Move { from: 0, to: 1 }]);
        assert_eq!(ids(&ConversationDiffer::apply(&script, &old)), vec![2, 1]);
    }

    #[test]
    fn test_empty_old_is_all_inserts() {
        let new = vec![conv(1, "")];
        let script = ConversationDiffer::diff(&[], &new);
        assert_eq!(
            script.ops(),
            &[DiffOp::Insert {
                position: 0,
                item: conv(1, ""),
            }]
        );
    }

    #[test]
    fn test_empty_new_is_all_removes() {
        let old = vec![conv(1, ""), conv(2, ""), conv(3, "")];
        let script = ConversationDiffer::diff(&old, &[]);
        assert_eq!(
            script.ops(),
            &[
                DiffOp::Remove { position: 2 },
                DiffOp::Remove { position: 1 },
                DiffOp::Remove { position: 0 },
            ]
        );
        assert!(ConversationDiffer::apply(&script, &old).is_empty());
    }

    #[test]
    fn test_new_message_moves_thread_to_top() {
        let old = vec![conv(1, "a"), conv(2, "b"), conv(3, "c")];
        let new = vec![conv(3, "c2"), conv(1, "a"), conv(2, "b")];

        let script = ConversationDiffer::diff(&old, &new);
        assert_eq!(
            script.ops(),
            &[
                DiffOp::Move { from: 2, to: 0 },
                DiffOp::Update {
                    position: 0,
                    item: conv(3, "c2"),
                },
            ]
        );
    }

    #[test]
    fn test_mixed_operations_order() {
        let old = vec![conv(1, "a"), conv(2, "b"), conv(3, "c"), conv(4, "d")];
        let new = vec![conv(5, "e"), conv(3, "c"), conv(1, "a*"), conv(4, "d")];

        let script = ConversationDiffer::diff(&old, &new);
        let summary = script.summary();
        assert_eq!(summary.removes, 1);
        assert_eq!(summary.inserts, 1);
        assert_eq!(summary.updates, 1);
        assert_eq!(summary.moves, 1);

        // Remove, Move, Insert, Update ordering
        let kinds: Vec<u8> = script
            .iter()
            .map(|op| match op {
                DiffOp::Remove { .. } => 0,
                DiffOp::Move { .. } => 1,
                DiffOp::Insert { .. } => 2,
                DiffOp::Update { .. } => 3,
            })
            .collect();
        let mut sorted = kinds.clone();
        sorted.sort();
        assert_eq!(kinds, sorted);

        assert_eq!(ConversationDiffer::apply(&script, &old), new);
    }

    #[test]
    fn test_reversal_round_trip() {
        let old: Vec<Conversation> = (1..=6).map(|i| conv(i, "x")).collect();
        let new: Vec<Conversation> = old.iter().rev().cloned().collect();

        let script = ConversationDiffer::diff(&old, &new);
        assert_eq!(script.summary().moves, 5);
        assert_eq!(ConversationDiffer::apply(&script, &old), new);
    }

    #[test]
    fn test_duplicate_ids_first_slot_wins() {
        let old = vec![conv(1, "a"), conv(2, "b")];
        let new = vec![conv(1, "a"), conv(2, "b"), conv(1, "a again")];

        let script = ConversationDiffer::diff(&old, &new);
        assert_eq!(
            script.ops(),
            &[DiffOp::Update {
                position: 0,
                item: conv(1, "a again"),
            }]
        );
    }

    #[test]
    fn test_timestamp_only_change_is_not_an_update() {
        let old = vec![conv(1, "a").with_timestamp(1)];
        let new = vec![conv(1, "a").with_timestamp(2)];
        assert!(ConversationDiffer::diff(&old, &new).is_empty());
    }

    #[test]
    fn test_longest_increasing_run_prefers_smaller_tails() {
        assert_eq!(longest_increasing_run(&[1, 0]), vec![false, true]);
        assert_eq!(
            longest_increasing_run(&[0, 3, 1, 2]),
            vec![true, false, true, true]
        );
        assert!(longest_increasing_run(&[]).is_empty());
    }

    #[test]
    fn test_apply_skips_out_of_range_operations() {
        let old = vec![conv(1, "a")];
        let script = DiffScript {
            ops: vec![
                DiffOp::Remove { position: 5 },
                DiffOp::Move { from: 0, to: 3 },
            ],
        };
        assert_eq!(ConversationDiffer::apply(&script, &old), old);
    }

    #[test]
    fn test_script_serializes_with_op_tag() {
        let script = ConversationDiffer::diff(&[conv(1, "a")], &[]);
        let json = serde_json::to_value(&script).unwrap();
        assert_eq!(json[0]["op"], "remove");
        assert_eq!(json[0]["position"], 0);
    }
}
