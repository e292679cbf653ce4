use thiserror::Error;

/// Errors produced by the codec core.
///
/// `MissingTranslation` and recoverable opcode failures are *not* represented
/// here: per the patcher's error policy those degrade to a logged warning
/// instead of aborting the operation, so callers never have to match on them.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("bad magic: expected {expected:?}, got {got:?}")]
    BadMagic { expected: Vec<u8>, got: Vec<u8> },

    #[error("entry placement out of bounds: offset {offset} + size {size} > file length {length}")]
    BadPlacement {
        offset: u64,
        size: u64,
        length: u64,
    },

    #[error("truncated read: expected {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("could not encode string in target codec: {0:?}")]
    EncodingFailure(String),

    #[error("patched jump target {0:#06x} does not fit in 16 bits")]
    OverflowTarget(u32),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
