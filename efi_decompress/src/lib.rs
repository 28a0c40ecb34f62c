#![no_std]
//! Decompression of EFI-compressed firmware payloads.
//!
//! A compressed buffer is an 8-byte header (little-endian compressed size, then little-endian original size)
//! followed by an MSB-first bitstream of blocks. Each block declares how many symbols it holds, transmits three
//! canonical Huffman tables and then the symbols themselves. A symbol is either a literal byte or a
//! length/position pair that copies previously decompressed bytes.
//!
//! ```
//! # fn main() -> Result<(), efi_decompress::DecompressError> {
//! // original size 3, one block of three symbols whose Char&Len set only holds 'A'.
//! let src = [0x10, 0, 0, 0, 0x03, 0, 0, 0, 0x00, 0x03, 0x00, 0x00, 0x04, 0x10, 0x00, 0x00];
//! assert_eq!(efi_decompress::decompress(&src)?, b"AAA");
//! # Ok(())
//! # }
//! ```
extern crate alloc;

pub mod bits;
mod error;
pub mod huffman;

use alloc::vec::Vec;

use bits::BitReader;
use huffman::{load_char_length_table, load_table, HuffmanTrie};

pub use error::DecompressError;

//Nomenclature: Char&Len set = 'C', Position set = 'P', Extra set = 'T'

//Width of the block size field.
const BLOCK_SIZE_BITS: usize = 16;

//Width of the Extra Set count field, and the index after which its 2-bit skip field appears.
const TBIT: usize = 5;
const TSKIP: usize = 3;

//Width of the Position Set count field. The Position Set has no skip field.
const PBIT: usize = 5;

//Shortest string a Char&Len symbol can copy.
const MIN_MATCH: usize = 3;

/// The fixed-size header in front of every compressed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Size of the compressed buffer as recorded by the compressor. Informational only; it does not bound decoding.
    pub compressed_size: u32,
    /// Exact size of the decompressed output.
    pub decompressed_size: u32,
}

impl Header {
    /// Size of the header in bytes.
    pub const SIZE: usize = 8;

    /// Parses the header at the start of `src`.
    pub fn parse(src: &[u8]) -> Result<Self, DecompressError> {
        let header = src.get(..Self::SIZE).ok_or(DecompressError::TruncatedHeader)?;
        Ok(Self {
            compressed_size: u32::from_le_bytes([header[0], header[1], header[2], header[3]]),
            decompressed_size: u32::from_le_bytes([header[4], header[5], header[6], header[7]]),
        })
    }
}

/// Returns the size of the buffer needed by [`decompress_into`] for `src`.
pub fn decompressed_size(src: &[u8]) -> Result<usize, DecompressError> {
    Ok(Header::parse(src)?.decompressed_size as usize)
}

/// Decompresses `src` into a newly allocated buffer.
///
/// The returned buffer holds exactly the number of bytes announced by the header. It grows as data is decoded, so a
/// corrupt header cannot force a large allocation up front.
pub fn decompress(src: &[u8]) -> Result<Vec<u8>, DecompressError> {
    let header = read_header(src)?;
    let mut output = Vec::new();
    expand(&src[Header::SIZE..], header.decompressed_size as usize, &mut output)?;
    Ok(output)
}

/// Decompresses `src` into `dst`.
///
/// `dst` must be exactly as long as the original size recorded in the header (see [`decompressed_size`]),
/// otherwise [`DecompressError::LengthMismatch`] is returned. On error the contents of `dst` are unspecified.
pub fn decompress_into(src: &[u8], dst: &mut [u8]) -> Result<(), DecompressError> {
    let header = read_header(src)?;
    if header.decompressed_size as usize != dst.len() {
        Err(DecompressError::LengthMismatch)?;
    }
    expand(&src[Header::SIZE..], dst.len(), &mut SliceWindow { dst, len: 0 })
}

fn read_header(src: &[u8]) -> Result<Header, DecompressError> {
    let header = Header::parse(src)?;
    log::debug!(
        "decompress: compressed size {:#x}, original size {:#x}",
        header.compressed_size,
        header.decompressed_size
    );
    Ok(header)
}

// Destination of the decompressed bytes. Everything pushed so far is also the history that back-references copy from.
trait OutputWindow {
    fn len(&self) -> usize;
    fn push(&mut self, byte: u8);
    fn byte_at(&self, idx: usize) -> u8;
}

impl OutputWindow for Vec<u8> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn push(&mut self, byte: u8) {
        Vec::push(self, byte)
    }

    fn byte_at(&self, idx: usize) -> u8 {
        self[idx]
    }
}

// Caller-provided buffer that is filled front to back. `expand` never pushes more than `dst.len()` bytes.
struct SliceWindow<'a> {
    dst: &'a mut [u8],
    len: usize,
}

impl OutputWindow for SliceWindow<'_> {
    fn len(&self) -> usize {
        self.len
    }

    fn push(&mut self, byte: u8) {
        self.dst[self.len] = byte;
        self.len += 1;
    }

    fn byte_at(&self, idx: usize) -> u8 {
        self.dst[idx]
    }
}

// Runs the symbol stream in `src` until `orig_size` bytes have been produced in `output`.
fn expand<W: OutputWindow>(src: &[u8], orig_size: usize, output: &mut W) -> Result<(), DecompressError> {
    let mut symbols = CodeIterator::new(src);
    fill(&mut symbols, orig_size, output).inspect_err(|err| {
        log::warn!(
            "decompress: aborted at bit {:#x} after {:#x} bytes: {}",
            symbols.bits.position(),
            output.len(),
            err
        )
    })
}

fn fill<W: OutputWindow>(
    symbols: &mut CodeIterator,
    orig_size: usize,
    output: &mut W,
) -> Result<(), DecompressError> {
    let mut remaining = orig_size;
    while remaining > 0 {
        match symbols.next().ok_or(DecompressError::LengthMismatch)?? {
            CodeSymbol::OrigChar(char) => {
                // symbol is an original character literal - copy it directly to the output buffer.
                output.push(char);
                remaining -= 1;
            }
            CodeSymbol::StrPointer(offset, len) => {
                if len > remaining {
                    Err(DecompressError::LengthMismatch)?;
                }
                let start = output
                    .len()
                    .checked_sub(offset)
                    .and_then(|x| x.checked_sub(1))
                    .ok_or(DecompressError::InvalidBackReference)?;

                // note: the copy goes byte by byte because the source window may run into bytes appended by this same
                // copy. Those "new" bytes must be read back, which produces the periodic repetition the compressor
                // expects when `offset` is smaller than `len`.
                for idx in start..start + len {
                    let byte = output.byte_at(idx);
                    output.push(byte);
                }
                remaining -= len;
            }
        }
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum CodeSymbol {
    OrigChar(u8),
    StrPointer(usize, usize),
}

// Huffman tables for the current block.
struct BlockTables {
    char_len: HuffmanTrie,
    position: HuffmanTrie,
}

struct CodeIterator<'a> {
    bits: BitReader<'a>,
    is_error: bool,
    remaining_block_size: usize,
    tables: Option<BlockTables>,
}

impl<'a> CodeIterator<'a> {
    fn new(src: &'a [u8]) -> Self {
        Self { bits: BitReader::new(src), is_error: false, remaining_block_size: 0, tables: None }
    }

    // Reads a block header: the block size, then the Extra Set, Char&Len Set and Position Set tables.
    //
    // A block size of zero never runs out: its tables stay in force for the rest of the stream.
    fn read_block_header(bits: &mut BitReader) -> Result<(usize, BlockTables), DecompressError> {
        let block_size = match bits.read(BLOCK_SIZE_BITS)? as usize {
            0 => usize::MAX,
            size => size,
        };

        // The Extra Set is only needed to decode the Char&Len Set code lengths.
        let extra = HuffmanTrie::build(&load_table(bits, TBIT, Some(TSKIP))?)?;
        let char_len = HuffmanTrie::build(&load_char_length_table(bits, &extra)?)?;
        let position = HuffmanTrie::build(&load_table(bits, PBIT, None)?)?;

        log::debug!("decompress: block of {:#x} symbols, tables end at bit {:#x}", block_size, bits.position());
        Ok((block_size, BlockTables { char_len, position }))
    }

    // Decodes a "position" value. Position codes 0 and 1 are the position itself; a larger code `n` is followed by
    // the low `n - 1` bits of a position whose highest bit (bit `n - 1`) is implied.
    // Example: position 18 ('10010b') is sent as the code for "5" followed by '0010b'.
    fn decode_position(bits: &mut BitReader, position: &HuffmanTrie) -> Result<usize, DecompressError> {
        let code = position.decode(bits)? as usize;
        if code <= 1 {
            return Ok(code);
        }
        Ok((1 << (code - 1)) + bits.read(code - 1)? as usize)
    }

    fn next_symbol(&mut self) -> Result<CodeSymbol, DecompressError> {
        let tables = if self.remaining_block_size == 0 {
            let (block_size, tables) = Self::read_block_header(&mut self.bits)?;
            self.remaining_block_size = block_size;
            &*self.tables.insert(tables)
        } else {
            self.tables.as_ref().ok_or(DecompressError::InvalidCodeTable)?
        };

        let symbol = tables.char_len.decode(&mut self.bits)? as usize;
        self.remaining_block_size -= 1;

        if symbol < 0x100 {
            // symbols from 0-255 are byte literals.
            Ok(CodeSymbol::OrigChar(symbol as u8))
        } else {
            // symbols greater than 255 are string lengths, followed by the encoded string position.
            let len = (symbol & 0xff) + MIN_MATCH;
            let pos = Self::decode_position(&mut self.bits, &tables.position)?;
            Ok(CodeSymbol::StrPointer(pos, len))
        }
    }
}

impl Iterator for CodeIterator<'_> {
    type Item = Result<CodeSymbol, DecompressError>;

    // Returns the next CodeSymbol from the bitstream. Iteration ends after the first error.
    fn next(&mut self) -> Option<Self::Item> {
        if self.is_error {
            return None;
        }
        let result = self.next_symbol();
        self.is_error = result.is_err();
        Some(result)
    }
}
