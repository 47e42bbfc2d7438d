use draw_core::{DrawRecord, NaturalKey};
use std::collections::HashSet;

/// Appends rows from `new_rows` whose natural key is not yet present, in input
/// order. Existing rows are never reordered, altered or dropped. Returns how
/// many rows were appended.
pub fn merge_into(history: &mut Vec<DrawRecord>, new_rows: impl IntoIterator<Item = DrawRecord>) -> usize {
    let mut seen: HashSet<NaturalKey> = history.iter().map(DrawRecord::natural_key).collect();
    let before = history.len();

    for row in new_rows {
        if seen.insert(row.natural_key()) {
            history.push(row);
        }
    }

    history.len() - before
}

pub fn merge(existing: &[DrawRecord], new_rows: &[DrawRecord]) -> Vec<DrawRecord> {
    let mut out = existing.to_vec();
    merge_into(&mut out, new_rows.iter().cloned());
    out
}
