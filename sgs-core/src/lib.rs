//! Codec and patcher core for a legacy visual-novel engine's asset formats:
//! the `SGS.` archive container, its dictionary-window LZ codec, the
//! animation format, the PCM/WAV sound codec, and the script bytecode
//! disassembler/patcher.
//!
//! Every module here is synchronous and operates on in-memory buffers; none
//! of it touches the filesystem beyond [`fsutil`]'s directory walking.

pub mod anm;
pub mod arc;
pub mod bmp;
pub mod encoding;
pub mod error;
pub mod fsutil;
pub mod lzw;
pub mod pcm;
pub mod reader;
pub mod script;

pub use error::{CoreError, Result};
