use core::fmt;

use r_efi::efi;

/// Decompress Error Definitions
///
/// Every error is fatal to the call that raised it; no partial output is ever returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecompressError {
    /// The source buffer is shorter than the 8-byte size header.
    TruncatedHeader,
    /// A bit field was requested with fewer bits left in the source buffer.
    BitstreamExhausted,
    /// A Huffman trie walk did not reach a symbol within the maximum code length, or took a branch that no code uses.
    UnboundedTrieDescent,
    /// A back-reference points before the start of the output.
    InvalidBackReference,
    /// The decoded output does not add up to the size announced in the header (or to the caller's buffer size).
    LengthMismatch,
    /// A transmitted code length table cannot be turned into a prefix-free code.
    InvalidCodeTable,
}

impl fmt::Display for DecompressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            DecompressError::TruncatedHeader => "compressed buffer is shorter than its 8-byte header",
            DecompressError::BitstreamExhausted => "compressed bitstream ended in the middle of a field",
            DecompressError::UnboundedTrieDescent => "huffman code does not resolve to a symbol",
            DecompressError::InvalidBackReference => "back-reference reaches before the start of the output",
            DecompressError::LengthMismatch => "decoded length does not match the announced size",
            DecompressError::InvalidCodeTable => "code length table does not form a prefix-free code",
        };
        f.write_str(msg)
    }
}

impl From<DecompressError> for efi::Status {
    fn from(err: DecompressError) -> Self {
        match err {
            DecompressError::TruncatedHeader => efi::Status::BAD_BUFFER_SIZE,
            _ => efi::Status::VOLUME_CORRUPTED,
        }
    }
}

#[cfg(test)]
mod test {
    extern crate std;
    use std::string::ToString;

    use r_efi::efi;

    use super::DecompressError;

    #[test]
    fn errors_should_map_to_efi_status() {
        assert_eq!(efi::Status::from(DecompressError::TruncatedHeader), efi::Status::BAD_BUFFER_SIZE);
        for err in [
            DecompressError::BitstreamExhausted,
            DecompressError::UnboundedTrieDescent,
            DecompressError::InvalidBackReference,
            DecompressError::LengthMismatch,
            DecompressError::InvalidCodeTable,
        ] {
            assert_eq!(efi::Status::from(err), efi::Status::VOLUME_CORRUPTED);
        }
    }

    #[test]
    fn errors_should_display_a_reason() {
        assert_eq!(
            DecompressError::InvalidBackReference.to_string(),
            "back-reference reaches before the start of the output"
        );
    }
}
