#![cfg_attr(not(test), no_std)]

#[cfg(feature = "efi_decompress")]
pub use efi_decompress;
