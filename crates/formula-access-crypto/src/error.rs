use thiserror::Error;

pub type Result<T> = std::result::Result<T, CryptCodecError>;

#[derive(Debug, Error)]
pub enum CryptCodecError {
    /// Truncated or malformed header bytes / descriptor XML.
    #[error("invalid format: {0}")]
    InvalidFormat(String),
    /// Well-formed but inconsistent encryption parameters (key size out of range, wrong salt
    /// size, unknown algorithm name, ...).
    #[error("invalid crypto configuration: {0}")]
    InvalidCryptoConfiguration(String),
    /// A recognized scheme that cannot be decoded here (extensible providers, certificate key
    /// encryptors, ...).
    #[error("unsupported encryption: {0}")]
    UnsupportedEncryption(String),
    #[error("incorrect password provided")]
    InvalidPassword,
}

/// Coarse classification callers can use to pick a user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The file is corrupt or uses parameters outside the documented ranges.
    Structural,
    /// The file is fine but uses a scheme this crate cannot decode.
    UnsupportedScheme,
    /// The password did not match the embedded verifier; retrying with another password may
    /// succeed.
    InvalidCredentials,
}

impl CryptCodecError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CryptCodecError::InvalidFormat(_) | CryptCodecError::InvalidCryptoConfiguration(_) => {
                ErrorKind::Structural
            }
            CryptCodecError::UnsupportedEncryption(_) => ErrorKind::UnsupportedScheme,
            CryptCodecError::InvalidPassword => ErrorKind::InvalidCredentials,
        }
    }

    pub(crate) fn truncated(context: &str) -> Self {
        CryptCodecError::InvalidFormat(format!("truncated data while reading {context}"))
    }
}
