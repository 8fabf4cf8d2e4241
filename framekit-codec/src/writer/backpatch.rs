//! Placeholder bookkeeping for length fields written after their content

/// width of a length placeholder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthWidth {
    U8,
    U16,
    U32,
    /// arbitrary width in bytes, clamped to 1 through 4
    Bytes(usize),
}

impl LengthWidth {
    /// width in bytes
    pub fn size(self) -> usize {
        match self {
            LengthWidth::U8 => 1,
            LengthWidth::U16 => 2,
            LengthWidth::U32 => 4,
            LengthWidth::Bytes(n) => clamp_size(n),
        }
    }

    /// largest length representable in this width
    pub fn max_value(self) -> u64 {
        (1u64 << (8 * self.size())) - 1
    }
}

/// clamp an integer width to the supported 1 through 4 bytes
pub fn clamp_size(size: usize) -> usize {
    size.clamp(1, 4)
}

/// stack of placeholder offsets, innermost on top
#[derive(Debug, Default)]
pub struct BackpatchStack {
    offsets: Vec<usize>,
}

impl BackpatchStack {
    pub fn new() -> BackpatchStack {
        Default::default()
    }

    /// record a placeholder at `offset`
    pub fn push(&mut self, offset: usize) {
        self.offsets.push(offset);
    }

    /// take the most recent unmatched placeholder
    ///
    /// Panics if there is none: every pop must match an earlier push.
    pub fn pop(&mut self) -> usize {
        match self.offsets.pop() {
            Some(offset) => offset,
            None => panic!("backpatch pop without matching push"),
        }
    }

    /// number of unmatched placeholders
    pub fn depth(&self) -> usize {
        self.offsets.len()
    }

    pub fn clear(&mut self) {
        self.offsets.clear();
    }
}
