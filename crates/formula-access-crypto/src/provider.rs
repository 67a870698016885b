//! Entry point: pick the codec for an open database from its header page.

use crate::codec::CodecHandler;
use crate::error::Result;
use crate::format::{CodecType, FormatConstants};
use crate::password::PasswordSource;
use crate::{jet, msisam, office};

/// Default upper bound on the Agile `spinCount`.
pub const DEFAULT_MAX_SPIN_COUNT: u32 = 10_000_000;

/// Limits applied while parsing untrusted encryption headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecryptOptions {
    /// Maximum accepted Agile password `spinCount`. Larger values are rejected with
    /// [`crate::CryptCodecError::InvalidCryptoConfiguration`] before any hashing starts.
    pub max_spin_count: u32,
}

impl Default for DecryptOptions {
    fn default() -> Self {
        Self {
            max_spin_count: DEFAULT_MAX_SPIN_COUNT,
        }
    }
}

/// Build the page codec for a database whose header page is `header`.
///
/// The password is only requested from `password` when the detected scheme needs one. A wrong
/// password fails here with [`crate::CryptCodecError::InvalidPassword`]; nothing is decoded
/// until the caller asks for a page.
pub fn create(
    password: &mut PasswordSource<'_>,
    header: &[u8],
    format: &FormatConstants,
) -> Result<CodecHandler> {
    create_with_options(password, header, format, &DecryptOptions::default())
}

/// [`create`] with explicit parsing limits.
pub fn create_with_options(
    password: &mut PasswordSource<'_>,
    header: &[u8],
    format: &FormatConstants,
    options: &DecryptOptions,
) -> Result<CodecHandler> {
    match format.codec_type {
        CodecType::None => Ok(CodecHandler::plain()),
        CodecType::Jet => jet::create(header, format),
        CodecType::Msisam => msisam::create(password, header, format),
        CodecType::Office => office::create(password, header, format, options),
    }
}
