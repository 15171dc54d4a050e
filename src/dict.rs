//! Prefix-tree dictionaries over cells.
//!
//! Order queues are stored as binary prefix trees keyed by fixed-width
//! unsigned integers. Every edge carries a label in one of three encodings
//! (literal with unary length, literal with binary length, or a run of one
//! repeated bit); interior nodes fork into exactly two references. Parsing
//! walks the tree with an explicit stack and yields entries in ascending
//! key order.

use std::sync::Arc;

use crate::cell::{Cell, CellBuilder, CellError, CellSlice};

/// A decoded dictionary entry: the key and a slice positioned at the start
/// of the leaf's value (label already consumed).
pub struct DictEntry {
    pub key: u64,
    pub value: CellSlice,
}

/// Parses a dictionary root into its entries, ascending by key.
///
/// `key_bits` is the fixed key width (32 for price-keyed queues).
pub fn parse_dict(root: Arc<Cell>, key_bits: usize) -> Result<Vec<DictEntry>, CellError> {
    struct Frame {
        cell: Arc<Cell>,
        prefix: u64,
        depth: usize,
    }

    let mut entries = Vec::new();
    let mut stack = vec![Frame {
        cell: root,
        prefix: 0,
        depth: 0,
    }];

    while let Some(frame) = stack.pop() {
        let mut slice = CellSlice::new(frame.cell);
        let remaining = key_bits - frame.depth;
        let (label, label_len) = read_label(&mut slice, remaining)?;
        let depth = frame.depth + label_len;
        let prefix = (frame.prefix << label_len) | label;

        if depth == key_bits {
            entries.push(DictEntry {
                key: prefix,
                value: slice,
            });
        } else {
            let left = slice.load_ref()?;
            let right = slice.load_ref()?;
            // LIFO: push the 1-branch first so the 0-branch is visited
            // first and keys come out ascending.
            stack.push(Frame {
                cell: right,
                prefix: (prefix << 1) | 1,
                depth: depth + 1,
            });
            stack.push(Frame {
                cell: left,
                prefix: prefix << 1,
                depth: depth + 1,
            });
        }
    }

    Ok(entries)
}

/// Builds a dictionary from entries sorted ascending by key.
///
/// Returns the root cell, or `None` for an empty entry set.
pub fn build_dict(
    entries: &[(u64, Cell)],
    key_bits: usize,
) -> Result<Option<Arc<Cell>>, CellError> {
    if entries.is_empty() {
        return Ok(None);
    }
    Ok(Some(Arc::new(build_edge(entries, key_bits, 0)?)))
}

fn build_edge(entries: &[(u64, Cell)], key_bits: usize, depth: usize) -> Result<Cell, CellError> {
    let remaining = key_bits - depth;
    let first = entries[0].0;
    let last = entries[entries.len() - 1].0;

    // Entries are sorted, so the shared prefix of the extremes is shared
    // by every key in between.
    let mut label_len = 0;
    while label_len < remaining && key_bit(first, key_bits, depth + label_len)
        == key_bit(last, key_bits, depth + label_len)
    {
        label_len += 1;
    }
    let label = if label_len == 0 {
        0
    } else {
        (first >> (key_bits - depth - label_len)) & ones(label_len)
    };

    let mut b = CellBuilder::new();
    // Always the binary-length label form; parsers accept all three.
    b.store_uint(0b10, 2)?;
    b.store_uint(label_len as u64, len_width(remaining))?;
    b.store_uint(label, label_len)?;

    if depth + label_len == key_bits {
        b.append_cell(&entries[0].1)?;
        return Ok(b.build());
    }

    let split = entries
        .iter()
        .position(|&(key, _)| key_bit(key, key_bits, depth + label_len))
        .unwrap_or(entries.len());
    let (left, right) = entries.split_at(split);
    b.store_ref(Arc::new(build_edge(left, key_bits, depth + label_len + 1)?))?;
    b.store_ref(Arc::new(build_edge(
        right,
        key_bits,
        depth + label_len + 1,
    )?))?;
    Ok(b.build())
}

/// Reads an edge label given `remaining` unconsumed key bits.
fn read_label(slice: &mut CellSlice, remaining: usize) -> Result<(u64, usize), CellError> {
    let (label, len) = if !slice.load_bit()? {
        // Literal label, unary length: '0' + n ones + '0' + n bits.
        let mut len = 0;
        while slice.load_bit()? {
            len += 1;
        }
        (slice.load_uint(len)?, len)
    } else if !slice.load_bit()? {
        // Literal label, binary length: '10' + len + bits.
        let len = slice.load_uint(len_width(remaining))? as usize;
        (slice.load_uint(len)?, len)
    } else {
        // Repeated bit: '11' + bit + len.
        let bit = slice.load_bit()?;
        let len = slice.load_uint(len_width(remaining))? as usize;
        (if bit { ones(len) } else { 0 }, len)
    };
    if len > remaining {
        return Err(CellError::ValueOutOfRange {
            value: len as u128,
            bits: remaining,
        });
    }
    Ok((label, len))
}

/// Width of a label-length field: enough bits for values `0..=remaining`.
fn len_width(remaining: usize) -> usize {
    (usize::BITS - remaining.leading_zeros()) as usize
}

fn key_bit(key: u64, key_bits: usize, index: usize) -> bool {
    (key >> (key_bits - 1 - index)) & 1 == 1
}

fn ones(len: usize) -> u64 {
    if len == 0 { 0 } else { u64::MAX >> (64 - len) }
}
