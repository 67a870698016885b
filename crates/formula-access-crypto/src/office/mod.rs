//! Office (ACCDB) encryption providers.
//!
//! The header page embeds an [MS-OFFCRYPTO] `EncryptionInfo`-style blob at 0x299: a 16-bit
//! length, then the version pair that selects the provider.

pub(crate) mod agile;
pub(crate) mod binary_rc4;
pub(crate) mod descriptor;
pub(crate) mod header;
pub(crate) mod rc4_cryptoapi;
pub(crate) mod standard;

use zeroize::Zeroizing;

use crate::codec::{
    CodecHandler, PageCodec, PageKeys, PageTransform, Scheme, OFFICE_MAX_ENCODED_PAGE,
};
use crate::block::BlockCipherSpec;
use crate::error::{CryptCodecError, Result};
use crate::format::FormatConstants;
use crate::jet::ENCODING_KEY_LENGTH;
use crate::password::PasswordSource;
use crate::provider::DecryptOptions;
use crate::util::{header_bytes, is_blank_key, Reader};

use agile::PendingAgileKeys;
use binary_rc4::PendingBinaryRc4Keys;
use header::{is_flag_set, FAES, FCRYPTO_API, FEXTERNAL};
use rc4_cryptoapi::PendingRc4CryptoApiKeys;
use standard::{PendingStandardKeys, NON_STANDARD_HASH_ITERATIONS, STANDARD_HASH_ITERATIONS};

const CRYPT_STRUCTURE_OFFSET: usize = 0x299;
const MAX_PASSWORD_LEN: usize = 255;

/// Parsed provider, waiting for the password.
enum Pending {
    Standard(Scheme, PendingStandardKeys),
    Rc4CryptoApi(PendingRc4CryptoApiKeys),
    BinaryRc4(PendingBinaryRc4Keys),
    Agile(PendingAgileKeys),
}

impl Pending {
    fn verify(self, password: &[u8]) -> Result<PageCodec> {
        let (scheme, keys, transform) = match self {
            Pending::Standard(scheme, pending) => (
                scheme,
                PageKeys::Standard(pending.verify_password(password)?),
                PageTransform::Block(BlockCipherSpec::AES_ECB),
            ),
            Pending::Rc4CryptoApi(pending) => (
                Scheme::OfficeRc4CryptoApi,
                PageKeys::Rc4CryptoApi(pending.verify_password(password)?),
                PageTransform::Stream,
            ),
            Pending::BinaryRc4(pending) => (
                Scheme::OfficeBinaryRc4,
                PageKeys::BinaryRc4(pending.verify_password(password)?),
                PageTransform::Stream,
            ),
            Pending::Agile(pending) => {
                let spec = pending.page_spec();
                (
                    Scheme::OfficeAgile,
                    PageKeys::Agile(pending.verify_password(password)?),
                    PageTransform::Block(spec),
                )
            }
        };
        Ok(PageCodec::new(scheme, keys, transform, OFFICE_MAX_ENCODED_PAGE))
    }
}

pub(crate) fn create(
    password: &mut PasswordSource<'_>,
    header: &[u8],
    format: &FormatConstants,
    options: &DecryptOptions,
) -> Result<CodecHandler> {
    let encoding_key = header_bytes(
        header,
        format.offset_encoding_key,
        ENCODING_KEY_LENGTH,
        "Office encoding key",
    )?;
    if is_blank_key(encoding_key) {
        log::debug!("Office header carries a blank encoding key; pages are not encoded");
        return Ok(CodecHandler::plain());
    }

    let len_bytes = header_bytes(header, CRYPT_STRUCTURE_OFFSET, 2, "encryption info length")?;
    let info_len = i16::from_le_bytes([len_bytes[0], len_bytes[1]]);
    let info_len = usize::try_from(info_len).map_err(|_| {
        CryptCodecError::InvalidFormat(format!("negative encryption info length {info_len}"))
    })?;
    let info = header_bytes(header, CRYPT_STRUCTURE_OFFSET + 2, info_len, "encryption info")?;

    let mut r = Reader::new(info);
    let major = r.read_u16_le("EncryptionVersionInfo.major")?;
    let minor = r.read_u16_le("EncryptionVersionInfo.minor")?;

    let password_bytes = password_bytes(password.get());

    let pending = match (major, minor) {
        (4, 4) => Pending::Agile(PendingAgileKeys::read(
            &mut r,
            encoding_key,
            options.max_spin_count,
        )?),
        (1, 1) => Pending::BinaryRc4(PendingBinaryRc4Keys::read(&mut r, encoding_key)?),
        (3 | 4, 3) => {
            return Err(CryptCodecError::UnsupportedEncryption(
                "Extensible encryption provider is not supported".to_string(),
            ))
        }
        (2..=4, 2) => {
            let flags = r.read_u32_le("EncryptionInfo.flags")?;
            if !is_flag_set(flags, FCRYPTO_API) {
                return Err(unsupported_version(major, minor));
            }
            if is_flag_set(flags, FEXTERNAL) {
                return Err(CryptCodecError::UnsupportedEncryption(format!(
                    "externally managed encryption (flags {flags:#x}) is not supported"
                )));
            }
            if is_flag_set(flags, FAES) {
                Pending::Standard(
                    Scheme::OfficeStandard,
                    PendingStandardKeys::read(&mut r, encoding_key, STANDARD_HASH_ITERATIONS)?,
                )
            } else {
                read_rc4_cryptoapi(&mut r, encoding_key)?
            }
        }
        _ => return Err(unsupported_version(major, minor)),
    };

    let codec = pending.verify(&password_bytes)?;
    Ok(CodecHandler::encoded(codec))
}

/// RC4 CryptoAPI, or the AES "non-standard" layout some Access builds write under the same flags.
fn read_rc4_cryptoapi(r: &mut Reader<'_>, encoding_key: &[u8]) -> Result<Pending> {
    let start = r.position();
    match PendingRc4CryptoApiKeys::read(r, encoding_key) {
        Ok(pending) => Ok(Pending::Rc4CryptoApi(pending)),
        Err(err @ CryptCodecError::InvalidCryptoConfiguration(_)) => {
            log::warn!("RC4 CryptoAPI header rejected ({err}); trying the non-standard AES layout");
            r.set_position(start)?;
            match PendingStandardKeys::read(r, encoding_key, NON_STANDARD_HASH_ITERATIONS) {
                Ok(pending) => Ok(Pending::Standard(Scheme::OfficeNonStandard, pending)),
                Err(fallback) => {
                    log::debug!("non-standard AES layout rejected: {fallback}");
                    Err(err)
                }
            }
        }
        Err(err) => Err(err),
    }
}

fn unsupported_version(major: u16, minor: u16) -> CryptCodecError {
    CryptCodecError::UnsupportedEncryption(format!(
        "Unsupported office encryption provider: vMajor {major}, vMinor {minor}"
    ))
}

/// UTF-16LE password bytes, limited to 255 code units. No password hashes as empty.
fn password_bytes(password: Option<&str>) -> Zeroizing<Vec<u8>> {
    let mut out = Zeroizing::new(Vec::new());
    if let Some(password) = password {
        for unit in password.encode_utf16().take(MAX_PASSWORD_LEN) {
            out.extend_from_slice(&unit.to_le_bytes());
        }
    }
    out
}
