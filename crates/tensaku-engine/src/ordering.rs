//! Total ordering and change counting over a diff list.
//!
//! Paired entries (unchanged or modified) are ordered by modified index. The
//! unpaired entries between two consecutive paired entries form a *gap*:
//!
//! ```text
//!   paired(m=0)  [gap 1: deleted / inserted ...]  paired(m=1)  [gap 2] ...
//! ```
//!
//! Inside a gap, deletions stay in original-index order and insertions in
//! modified-index order. The two runs are merged by observation sequence: an
//! insertion goes next only when no remaining deletion was observed before
//! it. Every sort key is derived from indices and sequence numbers alone, so
//! sorting an already sorted list changes nothing.

use std::collections::BTreeMap;

use crate::entry::{DiffEntry, EntryKind};

/// Sort key: `(slot, position)`. Paired entries occupy odd slots, gaps even.
type SortKey = (usize, usize);

/// Sort `entries` into the canonical review order.
pub fn sort_cell_changes(entries: &mut Vec<DiffEntry>) {
    let keys = sort_keys(entries);
    let mut keyed: Vec<(SortKey, DiffEntry)> = keys.into_iter().zip(entries.drain(..)).collect();
    keyed.sort_by_key(|(key, _)| *key);
    entries.extend(keyed.into_iter().map(|(_, entry)| entry));
}

/// Total number of atomic changes across `entries`.
pub fn count_changes(entries: &[DiffEntry]) -> usize {
    entries.iter().map(DiffEntry::change_count).sum()
}

#[derive(Default)]
struct Gap {
    /// `(original_index, seq, entry position)`
    deleted: Vec<(usize, u64, usize)>,
    /// `(modified_index, seq, entry position)`
    inserted: Vec<(usize, u64, usize)>,
}

fn sort_keys(entries: &[DiffEntry]) -> Vec<SortKey> {
    let mut keys = vec![(0, 0); entries.len()];

    // Paired entries, ranked by (modified index, seq).
    let mut paired: Vec<(usize, usize, u64, usize)> = entries
        .iter()
        .enumerate()
        .filter_map(|(pos, e)| match e.kind {
            EntryKind::Unchanged {
                original_index,
                modified_index,
            }
            | EntryKind::Modified {
                original_index,
                modified_index,
                ..
            } => Some((modified_index, original_index, e.seq, pos)),
            _ => None,
        })
        .collect();
    paired.sort_unstable_by_key(|&(m, _, seq, _)| (m, seq));

    let paired_modified: Vec<usize> = paired.iter().map(|p| p.0).collect();
    let mut paired_original: Vec<usize> = paired.iter().map(|p| p.1).collect();
    paired_original.sort_unstable();

    for (rank, &(_, _, _, pos)) in paired.iter().enumerate() {
        keys[pos] = (2 * rank + 1, 0);
    }

    let mut gaps: BTreeMap<usize, Gap> = BTreeMap::new();
    for (pos, entry) in entries.iter().enumerate() {
        match entry.kind {
            EntryKind::Inserted { modified_index, .. } => {
                let gap = paired_modified.partition_point(|&m| m < modified_index);
                gaps.entry(gap).or_default().inserted.push((modified_index, entry.seq, pos));
            }
            EntryKind::Deleted { original_index, .. } => {
                let gap = paired_original.partition_point(|&o| o < original_index);
                gaps.entry(gap).or_default().deleted.push((original_index, entry.seq, pos));
            }
            _ => {}
        }
    }

    for (gap, mut items) in gaps {
        items.deleted.sort_unstable_by_key(|&(index, seq, _)| (index, seq));
        items.inserted.sort_unstable_by_key(|&(index, seq, _)| (index, seq));
        for (position, pos) in merge_gap(&items).into_iter().enumerate() {
            keys[pos] = (2 * gap, position);
        }
    }

    keys
}

/// Merge the deletion and insertion runs of one gap.
fn merge_gap(gap: &Gap) -> Vec<usize> {
    // Lowest seq among deletions[i..].
    let mut suffix_min = vec![u64::MAX; gap.deleted.len() + 1];
    for i in (0..gap.deleted.len()).rev() {
        suffix_min[i] = suffix_min[i + 1].min(gap.deleted[i].1);
    }

    let mut out = Vec::with_capacity(gap.deleted.len() + gap.inserted.len());
    let (mut d, mut i) = (0, 0);
    while d < gap.deleted.len() || i < gap.inserted.len() {
        let take_deleted = match gap.inserted.get(i) {
            None => true,
            Some(&(_, insert_seq, _)) => d < gap.deleted.len() && suffix_min[d] < insert_seq,
        };
        if take_deleted {
            out.push(gap.deleted[d].2);
            d += 1;
        } else {
            out.push(gap.inserted[i].2);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensaku_diff::{LineChange, LineDiff, LineRange};
    use tensaku_types::{CellId, CellKind};

    fn id(n: u64) -> CellId {
        CellId::derive(CellKind::Code, "order", n)
    }

    fn tags(entries: &[DiffEntry]) -> Vec<String> {
        entries
            .iter()
            .map(|e| match e.kind {
                EntryKind::Unchanged { modified_index, .. } => format!("U{modified_index}"),
                EntryKind::Modified { modified_index, .. } => format!("M{modified_index}"),
                EntryKind::Inserted { modified_index, .. } => format!("I{modified_index}"),
                EntryKind::Deleted { original_index, .. } => format!("D{original_index}"),
            })
            .collect()
    }

    #[test]
    fn test_paired_by_modified_index() {
        let mut entries = vec![
            DiffEntry::unchanged(id(0), 2, 2, 0),
            DiffEntry::unchanged(id(1), 0, 0, 1),
            DiffEntry::modified(id(2), 1, 1, LineDiff::whole_insert(1), 2),
        ];
        sort_cell_changes(&mut entries);
        assert_eq!(tags(&entries), ["U0", "M1", "U2"]);
    }

    #[test]
    fn test_unpaired_land_in_their_gap() {
        // original [A, X, C], modified [A, Y, C]
        let mut entries = vec![
            DiffEntry::unchanged(id(2), 2, 2, 0),
            DiffEntry::inserted(id(3), 1, 1, 1),
            DiffEntry::deleted(id(1), 1, 1, 2),
            DiffEntry::unchanged(id(0), 0, 0, 3),
        ];
        sort_cell_changes(&mut entries);
        // The insert was observed first and no deletion predates it.
        assert_eq!(tags(&entries), ["U0", "I1", "D1", "U2"]);
    }

    #[test]
    fn test_earlier_deletion_precedes_later_insertion() {
        let mut entries = vec![
            DiffEntry::inserted(id(10), 1, 1, 1),
            DiffEntry::deleted(id(11), 1, 1, 5),
            DiffEntry::deleted(id(12), 2, 1, 0),
            DiffEntry::unchanged(id(0), 0, 0, 9),
        ];
        sort_cell_changes(&mut entries);
        let position = |cell: CellId| entries.iter().position(|e| e.cell == cell).unwrap();
        assert!(position(id(12)) < position(id(10)));
        assert!(position(id(11)) < position(id(12)));
    }

    #[test]
    fn test_sort_is_idempotent() {
        let mut entries = vec![
            DiffEntry::deleted(id(1), 3, 1, 7),
            DiffEntry::inserted(id(2), 0, 1, 3),
            DiffEntry::unchanged(id(3), 0, 1, 0),
            DiffEntry::deleted(id(4), 0, 2, 4),
            DiffEntry::inserted(id(5), 3, 1, 1),
            DiffEntry::modified(id(6), 1, 2, LineDiff::whole_insert(2), 2),
        ];
        sort_cell_changes(&mut entries);
        let once = entries.clone();
        sort_cell_changes(&mut entries);
        assert_eq!(entries, once);

        entries.reverse();
        sort_cell_changes(&mut entries);
        assert_eq!(entries, once);
    }

    #[test]
    fn test_count_changes() {
        let diff = LineDiff {
            changes: vec![
                LineChange::new(LineRange::new(0, 1), LineRange::new(0, 2)),
                LineChange::new(LineRange::new(5, 6), LineRange::new(6, 6)),
                LineChange::new(LineRange::new(9, 9), LineRange::new(9, 10)),
            ],
            identical: false,
        };
        let entries = vec![
            DiffEntry::unchanged(id(0), 0, 0, 0),
            DiffEntry::modified(id(1), 1, 1, diff, 1),
            DiffEntry::inserted(id(2), 2, 30, 2),
            DiffEntry::deleted(id(3), 2, 12, 3),
        ];
        assert_eq!(count_changes(&entries), 5);
        assert_eq!(count_changes(&[]), 0);
    }
}
