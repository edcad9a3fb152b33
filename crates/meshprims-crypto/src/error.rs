/// Errors from cipher construction and CBC processing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    /// Only 16-byte keys are supported.
    #[error("invalid key length: {0} bytes (expected 16)")]
    InvalidKeyLength(usize),

    /// The IV must be exactly one block.
    #[error("invalid IV length: {0} bytes (expected 16)")]
    InvalidIvLength(usize),

    /// CBC input must be a whole number of blocks.
    #[error("input length {0} is not a multiple of the 16-byte block size")]
    UnalignedInput(usize),

    /// PKCS#7 padding is missing or malformed.
    #[error("invalid padding")]
    InvalidPadding,
}

pub type Result<T> = std::result::Result<T, CryptoError>;
