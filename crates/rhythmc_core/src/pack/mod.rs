//! Resource pack contents.

mod assembler;
mod meta;

pub use assembler::PackAssembler;
pub use meta::{pack_description, pack_meta, MAX_SUPPORTED_FORMAT, PACK_FORMAT};
