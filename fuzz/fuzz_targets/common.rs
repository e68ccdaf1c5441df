// SPDX-License-Identifier: MIT OR Apache-2.0

pub struct ByteCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn is_exhausted(&self) -> bool {
        self.offset >= self.data.len()
    }

    pub fn next_u8(&mut self) -> u8 {
        let value = self.data.get(self.offset).copied().unwrap_or(0);
        self.offset = self.offset.saturating_add(1);
        value
    }

    pub fn next_i16(&mut self) -> i16 {
        i16::from_le_bytes([self.next_u8(), self.next_u8()])
    }

    /// A value that is usually ordinary and occasionally non-finite, zero or
    /// huge.
    pub fn next_value(&mut self) -> f64 {
        let mode = self.next_u8();
        let raw = self.next_i16();
        match mode % 16 {
            0 => f64::NAN,
            1 => f64::INFINITY,
            2 => 0.0,
            3 => f64::from(raw) * 1.0e300,
            4 => f64::from(raw) * 1.0e-300,
            _ => f64::from(raw) / 64.0,
        }
    }
}

pub fn bounded(seed: u8, min: usize, max: usize) -> usize {
    if max <= min {
        return min;
    }
    min + usize::from(seed) % (max - min + 1)
}
