//! Embedded image metadata (EXIF) tag assembly.
//!
//! Tags and value types come from `kamadak-exif`; this module only decides
//! which entries a JPEG gets and how capture values are encoded.

mod assembler;
pub mod convert;
mod entries;

pub use assembler::MetadataAssembler;
pub use entries::{TagEntry, TagEntrySet};
