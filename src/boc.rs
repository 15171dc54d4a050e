//! Bag-of-cells (de)serialization.
//!
//! Raw contract state arrives as a flat byte blob: a header, a cell count,
//! and each cell's descriptors, data, and child indices. References always
//! point forward (to higher indices), so the blob describes an acyclic
//! graph and can be relinked in a single reverse pass.

use std::collections::HashMap;
use std::sync::Arc;

use crate::cell::{Cell, CellError, MAX_REFS};

/// Serialized bag-of-cells magic prefix.
const BOC_MAGIC: [u8; 4] = [0xb5, 0xee, 0x9c, 0x72];

/// Errors raised while (de)serializing a bag of cells.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BocError {
    /// The blob does not start with the bag-of-cells magic.
    #[error("missing bag-of-cells magic prefix")]
    BadMagic,

    /// The blob ended before the advertised structures.
    #[error("truncated bag of cells ({0})")]
    Truncated(&'static str),

    /// A structural field held an unsupported or inconsistent value.
    #[error("malformed bag of cells: {0}")]
    Malformed(String),

    /// Rebuilding a cell from its serialized form failed.
    #[error("cell rebuild failed: {0}")]
    Cell(#[from] CellError),
}

/// Byte cursor with bounds-checked big-endian reads.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], BocError> {
        if self.pos + len > self.bytes.len() {
            return Err(BocError::Truncated(what));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn byte(&mut self, what: &'static str) -> Result<u8, BocError> {
        Ok(self.take(1, what)?[0])
    }

    fn uint(&mut self, len: usize, what: &'static str) -> Result<usize, BocError> {
        let mut value: usize = 0;
        for &b in self.take(len, what)? {
            value = value << 8 | b as usize;
        }
        Ok(value)
    }
}

/// Parses a serialized bag of cells and returns its single root.
pub fn parse(bytes: &[u8]) -> Result<Arc<Cell>, BocError> {
    let mut r = Reader::new(bytes);
    if r.take(4, "magic")? != BOC_MAGIC {
        return Err(BocError::BadMagic);
    }

    let flags = r.byte("flags")?;
    let has_index = flags & 0x80 != 0;
    let has_crc = flags & 0x40 != 0;
    let ref_size = (flags & 0x07) as usize;
    if ref_size == 0 || ref_size > 4 {
        return Err(BocError::Malformed(format!(
            "reference index width {ref_size} out of range"
        )));
    }

    let offset_size = r.byte("offset size")? as usize;
    if offset_size == 0 || offset_size > 8 {
        return Err(BocError::Malformed(format!(
            "offset width {offset_size} out of range"
        )));
    }

    let cell_count = r.uint(ref_size, "cell count")?;
    let root_count = r.uint(ref_size, "root count")?;
    let absent_count = r.uint(ref_size, "absent count")?;
    let _total_size = r.uint(offset_size, "total cell size")?;

    if root_count != 1 {
        return Err(BocError::Malformed(format!(
            "expected a single root, found {root_count}"
        )));
    }
    if absent_count != 0 {
        return Err(BocError::Malformed("absent cells unsupported".into()));
    }

    let root_index = r.uint(ref_size, "root index")?;
    if root_index >= cell_count {
        return Err(BocError::Malformed(format!(
            "root index {root_index} past cell count {cell_count}"
        )));
    }
    if has_index {
        r.take(cell_count * offset_size, "cell index")?;
    }

    // First pass: raw descriptors, data, and forward reference indices.
    struct RawCell {
        data: Vec<u8>,
        bit_len: usize,
        refs: Vec<usize>,
    }

    let mut raw: Vec<RawCell> = Vec::with_capacity(cell_count);
    for i in 0..cell_count {
        let d1 = r.byte("cell descriptor")?;
        let d2 = r.byte("cell descriptor")? as usize;
        let ref_count = (d1 & 0x07) as usize;
        if d1 & 0x08 != 0 {
            return Err(BocError::Malformed(format!("cell {i} is exotic")));
        }
        if ref_count > MAX_REFS {
            return Err(BocError::Malformed(format!(
                "cell {i} claims {ref_count} references"
            )));
        }

        let byte_len = d2.div_ceil(2);
        let data = r.take(byte_len, "cell data")?.to_vec();
        let bit_len = if d2 % 2 == 0 {
            byte_len * 8
        } else {
            // Partial final byte: a completion tag marks the last data bit.
            let last = *data.last().ok_or(BocError::Truncated("cell data"))?;
            if last == 0 {
                return Err(BocError::Malformed(format!(
                    "cell {i} is missing its completion tag"
                )));
            }
            byte_len * 8 - last.trailing_zeros() as usize - 1
        };

        let mut refs = Vec::with_capacity(ref_count);
        for _ in 0..ref_count {
            let target = r.uint(ref_size, "reference index")?;
            if target <= i || target >= cell_count {
                return Err(BocError::Malformed(format!(
                    "cell {i} references {target} out of order"
                )));
            }
            refs.push(target);
        }
        raw.push(RawCell {
            data,
            bit_len,
            refs,
        });
    }

    if has_crc {
        // Trailing checksum is not verified; the transport already covers
        // integrity and the cell structure is validated above.
        r.take(4, "checksum")?;
    }

    // Second pass: references only point forward, so building back-to-front
    // always finds the children already linked.
    let mut built: Vec<Option<Arc<Cell>>> = vec![None; cell_count];
    for (i, raw_cell) in raw.into_iter().enumerate().rev() {
        let mut data = raw_cell.data;
        if raw_cell.bit_len % 8 != 0 {
            // Strip the completion tag so internal storage is zero-padded.
            let last = data.len() - 1;
            let keep = raw_cell.bit_len % 8;
            data[last] &= !(0xffu8 >> keep);
        }
        let refs = raw_cell
            .refs
            .iter()
            .map(|&t| Arc::clone(built[t].as_ref().expect("forward reference already built")))
            .collect();
        built[i] = Some(Arc::new(Cell::from_parts(data, raw_cell.bit_len, refs)));
    }

    Ok(built[root_index].take().expect("root cell built"))
}

/// Serializes a cell tree into a bag of cells (no index, no checksum).
pub fn serialize(root: &Arc<Cell>) -> Vec<u8> {
    // Reverse post-order is a topological order of the DAG, so every
    // reference points to a higher index as the format requires.
    let mut order: Vec<Arc<Cell>> = Vec::new();
    let mut index: HashMap<*const Cell, usize> = HashMap::new();
    let mut stack: Vec<(Arc<Cell>, usize)> = vec![(Arc::clone(root), 0)];
    while let Some((cell, child)) = stack.last().cloned() {
        if index.contains_key(&Arc::as_ptr(&cell)) {
            stack.pop();
            continue;
        }
        if child < cell.refs().len() {
            if let Some(frame) = stack.last_mut() {
                frame.1 += 1;
            }
            stack.push((Arc::clone(&cell.refs()[child]), 0));
            continue;
        }
        stack.pop();
        index.insert(Arc::as_ptr(&cell), order.len());
        order.push(cell);
    }
    order.reverse();
    let count = order.len();
    for (i, cell) in order.iter().enumerate() {
        index.insert(Arc::as_ptr(cell), i);
    }

    let ref_size = byte_width(count);
    let mut payload: Vec<u8> = Vec::new();
    for cell in &order {
        payload.push(cell.refs().len() as u8);
        payload.push(cell.descriptor_d2());
        let bit_len = cell.bit_len();
        let mut data = cell.data().to_vec();
        if bit_len % 8 != 0 {
            data[bit_len / 8] |= 0x80 >> (bit_len % 8); // completion tag
        }
        payload.extend_from_slice(&data);
        for r in cell.refs() {
            push_be(&mut payload, index[&Arc::as_ptr(r)], ref_size);
        }
    }

    let offset_size = byte_width(payload.len());
    let mut out = Vec::with_capacity(payload.len() + 16);
    out.extend_from_slice(&BOC_MAGIC);
    out.push(ref_size as u8); // no index, no checksum, no cache bits
    out.push(offset_size as u8);
    push_be(&mut out, count, ref_size); // cells
    push_be(&mut out, 1, ref_size); // roots
    push_be(&mut out, 0, ref_size); // absent
    push_be(&mut out, payload.len(), offset_size);
    push_be(&mut out, 0, ref_size); // root index
    out.extend_from_slice(&payload);
    out
}

/// Minimal whole-byte width able to represent `value`.
fn byte_width(value: usize) -> usize {
    let mut width = 1;
    while value >> (width * 8) != 0 {
        width += 1;
    }
    width
}

fn push_be(out: &mut Vec<u8>, value: usize, width: usize) {
    for i in (0..width).rev() {
        out.push((value >> (i * 8)) as u8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{CellBuilder, CellSlice};

    fn leaf(value: u64, bits: usize) -> Arc<Cell> {
        let mut b = CellBuilder::new();
        b.store_uint(value, bits).unwrap();
        Arc::new(b.build())
    }

    #[test]
    fn round_trip_single_cell() {
        let cell = leaf(0x0123_4567, 32);
        let bytes = serialize(&cell);
        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed.repr_hash(), cell.repr_hash());
    }

    #[test]
    fn round_trip_partial_byte() {
        // 13 bits exercises the completion-tag path both ways.
        let cell = leaf(0b1_0110_1100_0101, 13);
        let bytes = serialize(&cell);
        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed.bit_len(), 13);
        let mut s = CellSlice::new(parsed);
        assert_eq!(s.load_uint(13).unwrap(), 0b1_0110_1100_0101);
    }

    #[test]
    fn round_trip_with_references() {
        let mut b = CellBuilder::new();
        b.store_uint(7, 8).unwrap();
        b.store_ref(leaf(1, 8)).unwrap();
        b.store_ref(leaf(2, 8)).unwrap();
        let root = Arc::new(b.build());

        let parsed = parse(&serialize(&root)).unwrap();
        assert_eq!(parsed.repr_hash(), root.repr_hash());
        assert_eq!(parsed.refs().len(), 2);
    }

    #[test]
    fn shared_subtrees_are_pooled() {
        let shared = leaf(0xee, 8);
        let mut b = CellBuilder::new();
        b.store_ref(Arc::clone(&shared)).unwrap();
        b.store_ref(shared).unwrap();
        let root = Arc::new(b.build());

        let bytes = serialize(&root);
        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed.repr_hash(), root.repr_hash());
    }

    #[test]
    fn round_trip_deep_chain() {
        // Deeper than any sane stack budget if traversal recursed.
        let mut cell = leaf(0, 8);
        for i in 0..4_000u64 {
            let mut b = CellBuilder::new();
            b.store_uint(i & 0xff, 8).unwrap();
            b.store_ref(cell).unwrap();
            cell = Arc::new(b.build());
        }
        let parsed = parse(&serialize(&cell)).unwrap();
        assert_eq!(parsed.repr_hash(), cell.repr_hash());
    }

    #[test]
    fn rejects_bad_magic() {
        assert!(matches!(
            parse(&[0x00, 0x11, 0x22, 0x33, 0x01, 0x01]),
            Err(BocError::BadMagic)
        ));
    }

    #[test]
    fn rejects_truncated_blob() {
        let cell = leaf(5, 8);
        let mut bytes = serialize(&cell);
        bytes.truncate(bytes.len() - 1);
        assert!(matches!(parse(&bytes), Err(BocError::Truncated(_))));
    }
}
