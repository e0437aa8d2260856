//! Derive macros for the land ledger crate.
//!
//! - `#[derive(BinaryCodec)]`: canonical `Encode`/`Decode` implementations
//! - `#[derive(Error)]`: `Display` and `std::error::Error` from `#[error("...")]`

mod codec;
mod error;

use proc_macro::TokenStream;

/// Implements `crate::types::encoding::{Encode, Decode}` field by field.
#[proc_macro_derive(BinaryCodec)]
pub fn derive_binary_codec(input: TokenStream) -> TokenStream {
    codec::expand(input)
}

/// Implements `Display` and `Error` from per-variant `#[error("...")]` messages.
#[proc_macro_derive(Error, attributes(error))]
pub fn derive_error(input: TokenStream) -> TokenStream {
    error::expand(input)
}
