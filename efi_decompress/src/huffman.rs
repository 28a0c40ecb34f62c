//! Canonical Huffman table transmission and the binary trie used to decode it.
//!
//! Every block carries three code tables, each sent as a list of per-symbol code lengths from which the canonical
//! codes are rebuilt:
//! - the Extra Set ('T'), sent with [`load_table`] and used only to decode the Char&Len code lengths,
//! - the Char&Len Set ('C'), sent with [`load_char_length_table`],
//! - the Position Set ('P'), sent with [`load_table`].
//!
use alloc::vec::Vec;

use crate::{bits::BitReader, DecompressError};

/// Longest code the decoder accepts. Longer lengths, and trie walks deeper than this, mean the stream is corrupt.
pub const MAX_CODE_LEN: usize = 32;

/// A symbol together with its transmitted code length. Symbols with a zero length are never recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolEntry {
    pub symbol: u16,
    pub bit_len: u8,
}

/// A symbol with its assigned canonical code. The code occupies the low `bit_len` bits of `code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalCode {
    pub symbol: u16,
    pub bit_len: u8,
    pub code: u32,
}

// Table for an alphabet that uses a single symbol. Both one-bit codes resolve to it, so decoding consumes exactly one
// (arbitrary) bit.
fn single_symbol_table(symbol: u16) -> Vec<CanonicalCode> {
    log::trace!("single symbol table: {:#x}", symbol);
    alloc::vec![CanonicalCode { symbol, bit_len: 1, code: 0 }, CanonicalCode { symbol, bit_len: 1, code: 1 }]
}

/// Assigns canonical codes to `entries`.
///
/// Entries are stably sorted by code length, so symbols of equal length keep their transmitted order. The first
/// entry gets code 0, and each following code is `(previous + 1) << (length - previous length)`.
pub fn assign_canonical_codes(mut entries: Vec<SymbolEntry>) -> Result<Vec<CanonicalCode>, DecompressError> {
    entries.sort_by_key(|entry| entry.bit_len);

    let mut codes = Vec::with_capacity(entries.len());
    let mut prev: Option<(u64, u8)> = None;
    for entry in entries {
        if entry.bit_len == 0 || entry.bit_len as usize > MAX_CODE_LEN {
            Err(DecompressError::InvalidCodeTable)?;
        }
        let code = match prev {
            None => 0,
            Some((prev_code, prev_len)) => (prev_code + 1) << (entry.bit_len - prev_len),
        };
        // the code must still fit in its own length, otherwise the table is over-subscribed.
        if code >> entry.bit_len != 0 {
            Err(DecompressError::InvalidCodeTable)?;
        }
        codes.push(CanonicalCode { symbol: entry.symbol, bit_len: entry.bit_len, code: code as u32 });
        prev = Some((code, entry.bit_len));
    }
    Ok(codes)
}

/// Reads an Extra Set or Position Set code length table and returns its canonical codes.
///
/// The table opens with a `count_bits`-wide symbol count. A count of zero is followed by one more `count_bits`-wide
/// field holding the only symbol of the alphabet.
///
/// Otherwise, `count` lengths follow, one per symbol index:
/// - a length below 7 is a plain 3-bit value,
/// - a 3-bit `111b` is extended by a run of `1b` bits closed by a `0b`, each `1b` adding one to the length.
///   Example: "4" is coded as '100b', "7" as '1110b', and "9" as '111110b'.
///
/// When `skip_index` is set, then right after the length for index `skip_index - 1` comes a 2-bit field giving a
/// number of symbol indexes to skip; those symbols get no code. The Extra Set uses this at index 3, the Position
/// Set never does.
pub fn load_table(
    bits: &mut BitReader,
    count_bits: usize,
    skip_index: Option<usize>,
) -> Result<Vec<CanonicalCode>, DecompressError> {
    let count = bits.read(count_bits)? as usize;
    if count == 0 {
        let symbol = bits.read(count_bits)? as u16;
        return Ok(single_symbol_table(symbol));
    }

    let mut entries = Vec::new();
    let mut idx = 0;
    while idx < count {
        let mut bit_len = bits.read(3)? as usize;
        if bit_len == 7 {
            while bits.read_bit()? {
                bit_len += 1;
                if bit_len > MAX_CODE_LEN {
                    Err(DecompressError::InvalidCodeTable)?;
                }
            }
        }
        if bit_len != 0 {
            entries.push(SymbolEntry { symbol: idx as u16, bit_len: bit_len as u8 });
        }
        idx += 1;

        if Some(idx) == skip_index {
            idx += bits.read(2)? as usize;
        }
    }
    log::trace!("code length table: {} symbols, {} coded", count, entries.len());
    assign_canonical_codes(entries)
}

/// Reads the Char&Len Set code length table and returns its canonical codes.
///
/// The table opens with a 9-bit symbol count. A count of zero is followed by a 9-bit field holding the only symbol
/// of the alphabet.
///
/// Otherwise the lengths are themselves Huffman coded with the Extra Set (`extra`). Each decoded Extra Set symbol
/// means:
/// - `0`: the current symbol is unused,
/// - `1`: a 4-bit value `v` follows; `v + 3` consecutive symbols are unused,
/// - `2`: a 9-bit value `v` follows; `v + 20` consecutive symbols are unused,
/// - anything else: the current symbol has a code length of `symbol - 2`.
pub fn load_char_length_table(
    bits: &mut BitReader,
    extra: &HuffmanTrie,
) -> Result<Vec<CanonicalCode>, DecompressError> {
    const CBIT: usize = 9;

    let count = bits.read(CBIT)? as usize;
    if count == 0 {
        let symbol = bits.read(CBIT)? as u16;
        return Ok(single_symbol_table(symbol));
    }

    let mut entries = Vec::new();
    let mut idx = 0;
    while idx < count {
        match extra.decode(bits)? {
            0 => idx += 1,
            1 => idx += bits.read(4)? as usize + 3,
            2 => idx += bits.read(CBIT)? as usize + 20,
            symbol => {
                let bit_len = symbol - 2;
                if bit_len as usize > MAX_CODE_LEN {
                    Err(DecompressError::InvalidCodeTable)?;
                }
                entries.push(SymbolEntry { symbol: idx as u16, bit_len: bit_len as u8 });
                idx += 1;
            }
        }
    }
    log::trace!("char&len table: {} symbols, {} coded", count, entries.len());
    assign_canonical_codes(entries)
}

type NodeIndex = u32;

#[derive(Debug, Clone, Copy)]
enum Node {
    Leaf(u16),
    Internal([Option<NodeIndex>; 2]),
}

/// Binary decode trie for one canonical code table.
///
/// Nodes live in an arena; the root is always at index 0. A `0b` bit selects the left child and `1b` the right.
#[derive(Debug, Clone)]
pub struct HuffmanTrie {
    nodes: Vec<Node>,
}

impl HuffmanTrie {
    /// Builds the trie for `codes`, allocating internal nodes along each code's path as needed.
    pub fn build(codes: &[CanonicalCode]) -> Result<Self, DecompressError> {
        if codes.is_empty() {
            Err(DecompressError::InvalidCodeTable)?;
        }
        let mut nodes = alloc::vec![Node::Internal([None, None])];

        for code in codes {
            let bit_len = code.bit_len as usize;
            if bit_len == 0 || bit_len > MAX_CODE_LEN {
                Err(DecompressError::InvalidCodeTable)?;
            }

            let mut node = 0;
            for bit in (0..bit_len).rev() {
                let branch = ((code.code as u64 >> bit) & 1) as usize;
                let is_last = bit == 0;
                let next = nodes.len();
                let Node::Internal(children) = &mut nodes[node] else {
                    // a shorter code is a prefix of this one.
                    return Err(DecompressError::InvalidCodeTable);
                };

                match children[branch] {
                    Some(_) if is_last => return Err(DecompressError::InvalidCodeTable),
                    Some(child) => {
                        node = child as usize;
                        continue;
                    }
                    None => children[branch] = Some(next as NodeIndex),
                }
                nodes.push(if is_last { Node::Leaf(code.symbol) } else { Node::Internal([None, None]) });
                node = next;
            }
        }
        Ok(Self { nodes })
    }

    /// Decodes one symbol by consuming bits until a leaf is reached.
    pub fn decode(&self, bits: &mut BitReader) -> Result<u16, DecompressError> {
        let mut node = 0;
        for _ in 0..MAX_CODE_LEN {
            let Node::Internal(children) = self.nodes[node] else {
                break;
            };
            let child = children[bits.read_bit()? as usize].ok_or(DecompressError::UnboundedTrieDescent)?;
            node = child as usize;
            if let Node::Leaf(symbol) = self.nodes[node] {
                return Ok(symbol);
            }
        }
        Err(DecompressError::UnboundedTrieDescent)
    }
}
