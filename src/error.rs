use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the splitting and reconstruction routines.
#[derive(Error, Debug)]
pub enum Error {
    /// Threshold, share count or secret rejected before any work was done.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// The randomness source could not supply polynomial coefficients.
    #[error("randomness source failure: {0}")]
    Randomness(#[from] rand::Error),

    /// Two of the supplied shares carry the same evaluation point.
    #[error("singular interpolation: duplicate share identifiers")]
    SingularInterpolation,

    #[error("inconsistent share lengths")]
    InconsistentShareLengths,

    #[error("at least two shares are required")]
    InsufficientShares,

    #[error("division by zero in GF(256)")]
    DivisionByZero,

    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

/// Errors raised while encoding or decoding serialized shares.
#[derive(Error, Debug, PartialEq)]
pub enum EncodingError {
    #[error("invalid share X value")]
    InvalidShareX,

    #[error("empty payload")]
    EmptyPayload,

    #[error("payload of {0} bytes does not fit the length field")]
    PayloadTooLong(usize),

    #[error("unexpected end of input")]
    UnexpectedEnd,

    #[error("unknown TLV tag 0x{0:02x}")]
    UnknownTag(u8),

    #[error("missing length before payload")]
    MissingLength,

    #[error("incomplete share encoding")]
    Incomplete,

    #[error("invalid share prefix")]
    InvalidPrefix,

    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("invalid magic value")]
    InvalidMagic,

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),

    #[error("invalid share header: {0}")]
    InvalidHeader(&'static str),

    #[error("crc32 mismatch: expected {expected:08x}, computed {actual:08x}")]
    CrcMismatch { expected: u32, actual: u32 },

    #[error("MAC key must not be empty")]
    InvalidMacKey,

    #[error("MAC verification failed")]
    MacMismatch,
}
