use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::query_session::StatColumn;
use crate::engine::errors::ExecResult;
use crate::engine::remote::{FtgsRow, FtgsStream};
use crate::engine::types::Term;

/// Receives every (term, group) pair of one iteration pass.
pub trait IterateCallback {
    fn term(&mut self, term: Term<'_>, stats: &[i64], group: usize) -> ExecResult<()>;

    /// Terms must arrive in ascending order.
    fn need_sorted(&self) -> bool;

    fn need_group(&self) -> bool;

    fn need_stats(&self) -> bool;
}

/// Next pending row of one dataset stream.
struct HeapEntry {
    row: FtgsRow,
    source: usize,
}

impl HeapEntry {
    fn key_cmp(&self, other: &Self) -> Ordering {
        self.row
            .term
            .cmp(&other.row.term)
            .then(self.row.group.cmp(&other.row.group))
            .then(self.source.cmp(&other.source))
    }
}

impl Eq for HeapEntry {}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key_cmp(other) == Ordering::Equal
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // min-heap on (term, group, source)
        self.key_cmp(other).reverse()
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn absorb(buf: &mut [i64], row: &FtgsRow, columns: &[StatColumn]) {
    for column in columns {
        if let (Some(slot), Some(value)) = (buf.get_mut(column.global), row.stats.get(column.local)) {
            *slot += *value;
        }
    }
}

/// K-way merges per-dataset FTGS streams. Rows sharing (term, group) across
/// datasets are folded into one stats row laid out by global column index.
pub fn merge_ftgs(
    mut streams: Vec<FtgsStream<'_>>,
    columns: &[&[StatColumn]],
    num_stats: usize,
    callback: &mut dyn IterateCallback,
) -> ExecResult<()> {
    let need_stats = callback.need_stats();
    let mut buf = vec![0i64; num_stats];

    if streams.len() == 1 {
        let stream = &mut streams[0];
        for row in stream {
            let row = row?;
            buf.fill(0);
            absorb(&mut buf, &row, columns[0]);
            let stats: &[i64] = if need_stats { &buf } else { &[] };
            callback.term(row.term.as_term(), stats, row.group)?;
        }
        return Ok(());
    }

    let mut heap = BinaryHeap::with_capacity(streams.len());
    for (source, stream) in streams.iter_mut().enumerate() {
        if let Some(row) = stream.next() {
            heap.push(HeapEntry { row: row?, source });
        }
    }

    while let Some(first) = heap.pop() {
        buf.fill(0);
        absorb(&mut buf, &first.row, columns[first.source]);
        if let Some(next) = streams[first.source].next() {
            heap.push(HeapEntry {
                row: next?,
                source: first.source,
            });
        }

        while heap
            .peek()
            .is_some_and(|e| e.row.term == first.row.term && e.row.group == first.row.group)
        {
            let Some(same) = heap.pop() else {
                break;
            };
            absorb(&mut buf, &same.row, columns[same.source]);
            if let Some(next) = streams[same.source].next() {
                heap.push(HeapEntry {
                    row: next?,
                    source: same.source,
                });
            }
        }

        let stats: &[i64] = if need_stats { &buf } else { &[] };
        callback.term(first.row.term.as_term(), stats, first.row.group)?;
    }
    Ok(())
}
