use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("hex string has odd length")]
    OddLengthHex,

    #[error("invalid hex character '{0}'")]
    InvalidHexChar(char),

    #[error("transaction truncated while reading {0}")]
    Truncated(&'static str),

    #[error("varint exceeds remaining buffer")]
    OversizedVarInt,

    #[error("trailing bytes after transaction")]
    TrailingBytes,

    #[error("transaction has no inputs")]
    NoInputs,

    #[error("transaction has no outputs")]
    NoOutputs,
}

pub type Result<T> = std::result::Result<T, CodecError>;
