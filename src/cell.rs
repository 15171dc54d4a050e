//! Bounded binary cells and bit-level access.
//!
//! Contract state and message bodies are trees of cells: up to 1023 data
//! bits and up to four references each. [`CellBuilder`] writes bits MSB
//! first, [`CellSlice`] reads them back, and both understand the two
//! composite encodings the venue uses everywhere: variable-length coin
//! amounts and account addresses.

use std::collections::HashMap;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::address::Address;

/// Maximum number of data bits a single cell can hold.
pub const MAX_DATA_BITS: usize = 1023;

/// Maximum number of references a single cell can hold.
pub const MAX_REFS: usize = 4;

/// Largest coin amount that fits the variable-length encoding (15 bytes).
const MAX_COIN_BYTES: usize = 15;

/// Errors raised by bit-level cell access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CellError {
    /// Writing would exceed the 1023-bit data capacity.
    #[error("cell data capacity exceeded ({0} bits requested)")]
    DataOverflow(usize),

    /// Writing would exceed the four-reference capacity.
    #[error("cell reference capacity exceeded")]
    RefOverflow,

    /// Reading ran past the end of the cell's data bits.
    #[error("read past the end of cell data")]
    DataUnderflow,

    /// Reading ran past the cell's references.
    #[error("read past the cell's references")]
    RefUnderflow,

    /// A value does not fit in the requested bit width.
    #[error("value {value} does not fit in {bits} bits")]
    ValueOutOfRange { value: u128, bits: usize },

    /// A coin amount needs more than 15 bytes.
    #[error("coin amount too large for the variable-length encoding")]
    CoinsOverflow,

    /// An address field carried an unsupported tag.
    #[error("unsupported address tag {0:#04b}")]
    AddressTag(u8),
}

/// An immutable binary cell: up to 1023 data bits plus up to 4 references.
///
/// Cells are shared via [`Arc`] and never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<Arc<Cell>>,
}

impl Cell {
    /// Returns an empty cell (no data bits, no references).
    pub fn empty() -> Self {
        Cell {
            data: Vec::new(),
            bit_len: 0,
            refs: Vec::new(),
        }
    }

    /// Number of data bits stored in this cell.
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Packed data bytes; unused trailing bits are zero.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Child references in insertion order.
    pub fn refs(&self) -> &[Arc<Cell>] {
        &self.refs
    }

    /// Representation hash: SHA-256 over the cell's shape, data, and the
    /// hashes of its children. Two cells with equal trees hash equally,
    /// which is what the decode loop's visited-reference guard relies on.
    ///
    /// Computed iteratively (post-order with a memo) so deeply chained
    /// continuation cells cannot exhaust the stack.
    pub fn repr_hash(&self) -> [u8; 32] {
        let mut memo: HashMap<*const Cell, [u8; 32]> = HashMap::new();
        let mut stack: Vec<(&Cell, usize)> = vec![(self, 0)];

        while let Some(&(cell, child)) = stack.last() {
            if memo.contains_key(&(cell as *const Cell)) {
                stack.pop();
                continue;
            }
            if child < cell.refs.len() {
                if let Some(frame) = stack.last_mut() {
                    frame.1 += 1;
                }
                stack.push((cell.refs[child].as_ref(), 0));
                continue;
            }
            stack.pop();
            let mut hasher = Sha256::new();
            hasher.update([cell.refs.len() as u8, cell.descriptor_d2()]);
            hasher.update((cell.bit_len as u16).to_be_bytes());
            hasher.update(&cell.data);
            for r in &cell.refs {
                // Children are hashed before parents by the traversal order.
                hasher.update(memo[&Arc::as_ptr(r)]);
            }
            memo.insert(cell as *const Cell, hasher.finalize().into());
        }

        memo[&(self as *const Cell)]
    }

    /// The standard second descriptor byte: `floor(bits/8) + ceil(bits/8)`.
    pub(crate) fn descriptor_d2(&self) -> u8 {
        (self.bit_len / 8 + self.bit_len.div_ceil(8)) as u8
    }

    pub(crate) fn from_parts(data: Vec<u8>, bit_len: usize, refs: Vec<Arc<Cell>>) -> Self {
        Cell {
            data,
            bit_len,
            refs,
        }
    }
}

/// Incremental bit writer producing a [`Cell`].
#[derive(Debug, Default)]
pub struct CellBuilder {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<Arc<Cell>>,
}

impl CellBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finalizes the builder into an immutable cell.
    pub fn build(self) -> Cell {
        Cell {
            data: self.data,
            bit_len: self.bit_len,
            refs: self.refs,
        }
    }

    /// Appends a single bit.
    pub fn store_bit(&mut self, bit: bool) -> Result<(), CellError> {
        if self.bit_len >= MAX_DATA_BITS {
            return Err(CellError::DataOverflow(1));
        }
        let byte = self.bit_len / 8;
        if byte == self.data.len() {
            self.data.push(0);
        }
        if bit {
            self.data[byte] |= 0x80 >> (self.bit_len % 8);
        }
        self.bit_len += 1;
        Ok(())
    }

    /// Appends `bits` bits of an unsigned integer, MSB first. `bits` ≤ 64.
    pub fn store_uint(&mut self, value: u64, bits: usize) -> Result<(), CellError> {
        self.store_uint128(value as u128, bits)
    }

    /// Appends `bits` bits of an unsigned integer, MSB first. `bits` ≤ 128.
    pub fn store_uint128(&mut self, value: u128, bits: usize) -> Result<(), CellError> {
        if bits < 128 && value >> bits != 0 {
            return Err(CellError::ValueOutOfRange { value, bits });
        }
        if self.bit_len + bits > MAX_DATA_BITS {
            return Err(CellError::DataOverflow(bits));
        }
        for i in (0..bits).rev() {
            self.store_bit((value >> i) & 1 == 1)?;
        }
        Ok(())
    }

    /// Appends a variable-length coin amount: a 4-bit byte count followed
    /// by the amount in that many big-endian bytes.
    pub fn store_coins(&mut self, amount: u128) -> Result<(), CellError> {
        let byte_len = (128 - amount.leading_zeros() as usize).div_ceil(8);
        if byte_len > MAX_COIN_BYTES {
            return Err(CellError::CoinsOverflow);
        }
        self.store_uint(byte_len as u64, 4)?;
        self.store_uint128(amount, byte_len * 8)
    }

    /// Appends an address: `None` is the 2-bit addr-none marker, `Some` is
    /// the internal form (tag, no anycast, 8-bit workchain, 256-bit id).
    pub fn store_address(&mut self, address: Option<&Address>) -> Result<(), CellError> {
        match address {
            None => self.store_uint(0b00, 2),
            Some(addr) => {
                self.store_uint(0b10, 2)?;
                self.store_bit(false)?; // no anycast
                self.store_uint(addr.workchain as u8 as u64, 8)?;
                for &byte in addr.account_id() {
                    self.store_uint(byte as u64, 8)?;
                }
                Ok(())
            }
        }
    }

    /// Appends another cell's data bits and references verbatim.
    pub fn append_cell(&mut self, cell: &Cell) -> Result<(), CellError> {
        for i in 0..cell.bit_len {
            let bit = cell.data[i / 8] & (0x80 >> (i % 8)) != 0;
            self.store_bit(bit)?;
        }
        for r in &cell.refs {
            self.store_ref(Arc::clone(r))?;
        }
        Ok(())
    }

    /// Appends a child reference.
    pub fn store_ref(&mut self, cell: Arc<Cell>) -> Result<(), CellError> {
        if self.refs.len() >= MAX_REFS {
            return Err(CellError::RefOverflow);
        }
        self.refs.push(cell);
        Ok(())
    }
}

/// Sequential reader over a cell's data bits and references.
///
/// Owns its cell via [`Arc`], so slices can outlive the structure they were
/// cut from (dictionary leaves, continuation records).
#[derive(Debug, Clone)]
pub struct CellSlice {
    cell: Arc<Cell>,
    bit_pos: usize,
    ref_pos: usize,
}

impl CellSlice {
    pub fn new(cell: Arc<Cell>) -> Self {
        CellSlice {
            cell,
            bit_pos: 0,
            ref_pos: 0,
        }
    }

    /// The underlying cell this slice reads from.
    pub fn cell(&self) -> &Arc<Cell> {
        &self.cell
    }

    /// Data bits not yet consumed.
    pub fn remaining_bits(&self) -> usize {
        self.cell.bit_len - self.bit_pos
    }

    /// References not yet consumed.
    pub fn remaining_refs(&self) -> usize {
        self.cell.refs.len() - self.ref_pos
    }

    /// Reads a single bit.
    pub fn load_bit(&mut self) -> Result<bool, CellError> {
        if self.bit_pos >= self.cell.bit_len {
            return Err(CellError::DataUnderflow);
        }
        let bit = self.cell.data[self.bit_pos / 8] & (0x80 >> (self.bit_pos % 8)) != 0;
        self.bit_pos += 1;
        Ok(bit)
    }

    /// Reads `bits` bits as an unsigned integer, MSB first. `bits` ≤ 64.
    pub fn load_uint(&mut self, bits: usize) -> Result<u64, CellError> {
        Ok(self.load_uint128(bits)? as u64)
    }

    /// Reads `bits` bits as an unsigned integer, MSB first. `bits` ≤ 128.
    pub fn load_uint128(&mut self, bits: usize) -> Result<u128, CellError> {
        if bits > self.remaining_bits() {
            return Err(CellError::DataUnderflow);
        }
        let mut value: u128 = 0;
        for _ in 0..bits {
            value = (value << 1) | self.load_bit()? as u128;
        }
        Ok(value)
    }

    /// Reads a variable-length coin amount.
    pub fn load_coins(&mut self) -> Result<u128, CellError> {
        let byte_len = self.load_uint(4)? as usize;
        self.load_uint128(byte_len * 8)
    }

    /// Reads an address field. Returns `None` for the addr-none marker.
    pub fn load_address(&mut self) -> Result<Option<Address>, CellError> {
        let tag = self.load_uint(2)? as u8;
        match tag {
            0b00 => Ok(None),
            0b10 => {
                if self.load_bit()? {
                    // Anycast prefixes never appear in venue state.
                    return Err(CellError::AddressTag(tag));
                }
                let workchain = self.load_uint(8)? as u8 as i8;
                let mut account_id = [0u8; 32];
                for byte in account_id.iter_mut() {
                    *byte = self.load_uint(8)? as u8;
                }
                Ok(Some(Address::new(workchain, account_id)))
            }
            other => Err(CellError::AddressTag(other)),
        }
    }

    /// Reads the next child reference.
    pub fn load_ref(&mut self) -> Result<Arc<Cell>, CellError> {
        if self.ref_pos >= self.cell.refs.len() {
            return Err(CellError::RefUnderflow);
        }
        let cell = Arc::clone(&self.cell.refs[self.ref_pos]);
        self.ref_pos += 1;
        Ok(cell)
    }
}
