//! Forward-only MSB-first bit reader over the compressed bitstream.
//!
use bitvec::{field::BitField, order::Msb0, slice::BitSlice, view::BitView};

use crate::DecompressError;

/// Sequential reader that hands out the bitstream `n` bits at a time, most significant bit first.
///
/// The reader never peeks or rewinds: every successful read advances the cursor, and a read that would run past the
/// end of the buffer fails with [`DecompressError::BitstreamExhausted`] without consuming anything.
pub struct BitReader<'a> {
    src: &'a BitSlice<u8, Msb0>,
    src_index: usize,
}

impl<'a> BitReader<'a> {
    /// Creates a reader positioned at the first (most significant) bit of `src[0]`.
    pub fn new(src: &'a [u8]) -> Self {
        Self { src: src.view_bits::<Msb0>(), src_index: 0 }
    }

    /// Consumes the next `count` bits and returns them as an unsigned integer, first bit most significant.
    ///
    /// A `count` of zero returns 0 and leaves the cursor untouched. A `count` wider than 64 bits cannot be returned
    /// and fails with [`DecompressError::BitstreamExhausted`]; the format never asks for more than 32 bits at a time.
    pub fn read(&mut self, count: usize) -> Result<u64, DecompressError> {
        if count > u64::BITS as usize {
            Err(DecompressError::BitstreamExhausted)?;
        }
        if count == 0 {
            return Ok(0);
        }
        let end = self.src_index.checked_add(count).ok_or(DecompressError::BitstreamExhausted)?;
        let bits = self.src.get(self.src_index..end).ok_or(DecompressError::BitstreamExhausted)?;
        self.src_index = end;
        Ok(bits.load_be::<u64>())
    }

    /// Consumes a single bit.
    pub fn read_bit(&mut self) -> Result<bool, DecompressError> {
        let bit = *self.src.get(self.src_index).ok_or(DecompressError::BitstreamExhausted)?;
        self.src_index += 1;
        Ok(bit)
    }

    /// Total number of bits consumed so far.
    pub fn position(&self) -> usize {
        self.src_index
    }

    /// Index of the byte holding the next unread bit.
    pub fn byte_index(&self) -> usize {
        self.src_index / 8
    }

    /// Index (0 = most significant) of the next unread bit within [`Self::byte_index`]. Always in `0..8`.
    pub fn bit_index(&self) -> usize {
        self.src_index % 8
    }

    /// Number of bits still available.
    pub fn remaining(&self) -> usize {
        self.src.len() - self.src_index
    }
}

#[cfg(test)]
mod test {
    use super::BitReader;
    use crate::DecompressError;

    #[test]
    fn reads_should_be_msb_first_across_byte_boundaries() {
        let mut bits = BitReader::new(&[0b1011_0011, 0b1100_0001]);
        assert_eq!(bits.read(3).unwrap(), 0b101);
        assert_eq!(bits.read(7).unwrap(), 0b1_0011_11);
        assert_eq!(bits.byte_index(), 1);
        assert_eq!(bits.bit_index(), 2);
        assert!(!bits.read_bit().unwrap());
        assert_eq!(bits.read(5).unwrap(), 0b00001);
        assert_eq!(bits.position(), 16);
        assert_eq!(bits.remaining(), 0);
    }

    #[test]
    fn zero_width_read_should_not_advance() {
        let mut bits = BitReader::new(&[]);
        assert_eq!(bits.read(0).unwrap(), 0);
        assert_eq!(bits.position(), 0);
    }

    #[test]
    fn wide_reads_should_span_several_bytes() {
        let mut bits = BitReader::new(&[0x12, 0x34, 0x56, 0x78, 0x9a]);
        assert_eq!(bits.read(4).unwrap(), 0x1);
        assert_eq!(bits.read(32).unwrap(), 0x2345_6789);
        assert_eq!(bits.read(4).unwrap(), 0xa);
    }

    #[test]
    fn reads_wider_than_64_bits_should_fail_without_consuming() {
        let src = [0xa5; 16];
        let mut bits = BitReader::new(&src);
        assert_eq!(bits.read(65), Err(DecompressError::BitstreamExhausted));
        assert_eq!(bits.position(), 0);
        assert_eq!(bits.read(64).unwrap(), 0xa5a5_a5a5_a5a5_a5a5);
    }

    #[test]
    fn reading_past_the_end_should_fail_without_consuming() {
        let mut bits = BitReader::new(&[0xff]);
        assert_eq!(bits.read(5).unwrap(), 0x1f);
        assert_eq!(bits.read(4), Err(DecompressError::BitstreamExhausted));
        assert_eq!(bits.position(), 5);
        assert_eq!(bits.read(3).unwrap(), 0x7);
        assert_eq!(bits.read_bit(), Err(DecompressError::BitstreamExhausted));
    }
}
