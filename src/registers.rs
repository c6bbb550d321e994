//! ## Register storage
//! Holds the sketches of all `N` nodes, `M` registers per node, each register `W` bits wide.
//!
//! Registers are bit-packed into a single `u32` buffer in node-major order:
//! register `j` of node `i` occupies bits `[(i * M + j) * W, (i * M + j + 1) * W)`.
//!
//! Buffer encoding:
//! - data[0..K]    - store register values using `W` bits per each register.
//! - data[K]       - one extra element for branchless register updates (see `set_register`).

use std::mem::size_of_val;

/// Largest supported register width in bits
pub const MAX_REGISTER_WIDTH: u32 = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Registers {
    /// Register width `W`
    width: usize,
    /// Registers per node `M`
    per_node: usize,
    /// Packed register values
    data: Vec<u32>,
}

impl Registers {
    /// Create zeroed registers for `nodes` sketches of `per_node` registers of `width` bits.
    pub(crate) fn new(nodes: usize, per_node: usize, width: u32) -> Self {
        debug_assert!((1..=MAX_REGISTER_WIDTH).contains(&width));
        let width = width as usize;
        let len = (nodes * per_node * width).div_ceil(32) + 1;
        Self {
            width,
            per_node,
            data: vec![0; len],
        }
    }

    /// Largest value a register can hold
    #[cfg(test)]
    pub(crate) fn max_value(&self) -> u32 {
        (1 << self.width) - 1
    }

    /// Return register `idx` of `node`
    #[inline]
    pub(crate) fn get(&self, node: usize, idx: usize) -> u32 {
        self.get_register(node * self.per_node + idx)
    }

    /// Set register `idx` of `node` to `value`, truncated to register width
    #[inline]
    pub(crate) fn set(&mut self, node: usize, idx: usize, value: u32) {
        self.set_register(node * self.per_node + idx, value);
    }

    /// Unpack registers of `node` into `row`
    #[inline]
    pub(crate) fn read_row(&self, node: usize, row: &mut [u32]) {
        let base = node * self.per_node;
        for (j, r) in row.iter_mut().enumerate() {
            *r = self.get_register(base + j);
        }
    }

    /// Pack `row` into registers of `node`
    #[inline]
    pub(crate) fn write_row(&mut self, node: usize, row: &[u32]) {
        let base = node * self.per_node;
        for (j, &r) in row.iter().enumerate() {
            self.set_register(base + j, r);
        }
    }

    /// Return memory size of packed registers
    pub(crate) fn size_of(&self) -> usize {
        size_of_val(self.data.as_slice())
    }

    /// Get register at flat position `pos`
    #[inline]
    fn get_register(&self, pos: usize) -> u32 {
        let bit_idx = pos * self.width;
        let u32_idx = bit_idx / 32;
        let bit_pos = bit_idx % 32;
        let bits = &self.data[u32_idx..u32_idx + 2];
        let bits_1 = self.width.min(32 - bit_pos);
        let bits_2 = self.width - bits_1;
        let mask_1 = (1u32 << bits_1) - 1;
        let mask_2 = (1u32 << bits_2) - 1;

        ((bits[0] >> bit_pos) & mask_1) | ((bits[1] & mask_2) << bits_1)
    }

    /// Set register at flat position `pos` to `value`
    #[inline]
    fn set_register(&mut self, pos: usize, value: u32) {
        let bit_idx = pos * self.width;
        let u32_idx = bit_idx / 32;
        let bit_pos = bit_idx % 32;
        let bits_1 = self.width.min(32 - bit_pos);
        let bits_2 = self.width - bits_1;
        let mask_1 = (1u32 << bits_1) - 1;
        let mask_2 = (1u32 << bits_2) - 1;
        let bits = &mut self.data[u32_idx..u32_idx + 2];

        // Unconditionally update two `u32` elements based on `value` bits and masks
        bits[0] &= !(mask_1 << bit_pos);
        bits[0] |= (value & mask_1) << bit_pos;
        bits[1] &= !mask_2;
        bits[1] |= (value >> bits_1) & mask_2;
    }
}

/// Element-wise maximum of `acc` and `other`, stored in `acc`
#[inline]
pub(crate) fn merge_max(acc: &mut [u32], other: &[u32]) {
    for (a, &b) in acc.iter_mut().zip(other) {
        *a = (*a).max(b);
    }
}
