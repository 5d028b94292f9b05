use super::{ChangeKind, ChangeRecord};
use crate::model::{FileEntry, Inventory};
use std::cmp::Ordering;

/// Symmetric difference of two inventories, in identity-key order.
///
/// Content is never read here; paths on both sides become `EditCandidate`
/// (same case) or `CaseAmbiguous` (case differs).
pub fn classify<'a>(source: &'a Inventory, destination: &'a Inventory) -> Vec<ChangeRecord<'a>> {
    let mut records = Vec::with_capacity(source.len().max(destination.len()));
    let mut src = source.iter().peekable();
    let mut dst = destination.iter().peekable();

    loop {
        let order = match (src.peek(), dst.peek()) {
            (None, None) => break,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some((src_key, _)), Some((dst_key, _))) => src_key.cmp(dst_key),
        };

        let record = match order {
            Ordering::Less => src.next().map(|(key, entry)| source_only(key, entry)),
            Ordering::Greater => dst.next().map(|(key, entry)| destination_only(key, entry)),
            Ordering::Equal => match (src.next(), dst.next()) {
                (Some((key, s)), Some((_, d))) => Some(paired(key, s, d)),
                _ => None,
            },
        };
        records.extend(record);
    }

    records
}

fn source_only<'a>(key: &'a str, entry: &'a FileEntry) -> ChangeRecord<'a> {
    ChangeRecord {
        key,
        kind: ChangeKind::Add,
        source: Some(entry),
        destination: None,
    }
}

fn destination_only<'a>(key: &'a str, entry: &'a FileEntry) -> ChangeRecord<'a> {
    ChangeRecord {
        key,
        kind: ChangeKind::Delete,
        source: None,
        destination: Some(entry),
    }
}

fn paired<'a>(key: &'a str, source: &'a FileEntry, destination: &'a FileEntry) -> ChangeRecord<'a> {
    let kind = if source.path == destination.path {
        ChangeKind::EditCandidate
    } else {
        ChangeKind::CaseAmbiguous
    };
    ChangeRecord {
        key,
        kind,
        source: Some(source),
        destination: Some(destination),
    }
}
