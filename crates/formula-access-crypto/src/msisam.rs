//! MSISAM (Microsoft Money) page encryption.
//!
//! Newer files derive the RC4 key from a digest of the uppercased password plus a header salt
//! and embed 4 check bytes to verify it. Older files only scramble the Jet-style header key with
//! header bytes, so no password is needed to read them.

use crate::codec::{
    CipherParams, CodecHandler, PageCodec, PageKeys, PageTransform, Scheme,
    MSISAM_MAX_ENCODED_PAGE,
};
use crate::error::{CryptCodecError, Result};
use crate::format::{FormatConstants, TextEncoding};
use crate::hash::HashAlgorithm;
use crate::jet;
use crate::password::PasswordSource;
use crate::rc4::Rc4;
use crate::util::{concat, header_bytes, header_u8, is_blank_key};

const SALT_OFFSET: usize = 0x72;
const SALT_LENGTH: usize = 8;
const BASE_SALT_LENGTH: usize = 4;
const CRYPT_CHECK_START: usize = 0x2E9;
const CRYPT_CHECK_LENGTH: usize = 4;
const ENCRYPTION_FLAGS_OFFSET: usize = 0x298;
const NEW_ENCRYPTION: u8 = 0x06;
const USE_SHA1: u8 = 0x20;
const PASSWORD_LENGTH: usize = 0x28;
const PASSWORD_DIGEST_LENGTH: usize = 0x10;
const TRAILING_PWD_LEN: usize = 20;

pub(crate) struct MsisamKeys {
    /// `password digest (16) || base salt (4)`.
    base_hash: Vec<u8>,
}

impl MsisamKeys {
    pub(crate) fn cipher_params(&self, page: u32) -> CipherParams {
        CipherParams::key(crate::util::apply_page_number(
            &self.base_hash,
            PASSWORD_DIGEST_LENGTH,
            page,
        ))
    }
}

/// Header material for a modern MSISAM file whose password has not been checked yet.
struct PendingMsisamKeys {
    digest: HashAlgorithm,
    text_encoding: TextEncoding,
    salt: Vec<u8>,
    check_bytes: Vec<u8>,
}

impl PendingMsisamKeys {
    fn read(header: &[u8], format: &FormatConstants) -> Result<Self> {
        let flags = header_u8(header, ENCRYPTION_FLAGS_OFFSET, "MSISAM encryption flags")?;
        let digest = if flags & USE_SHA1 != 0 {
            HashAlgorithm::Sha1
        } else {
            HashAlgorithm::Md5
        };
        let salt = header_bytes(header, SALT_OFFSET, SALT_LENGTH, "MSISAM salt")?.to_vec();
        let check_offset = CRYPT_CHECK_START + usize::from(salt[0]);
        let check_bytes = header_bytes(
            header,
            check_offset,
            CRYPT_CHECK_LENGTH,
            "MSISAM password check bytes",
        )?
        .to_vec();
        Ok(Self {
            digest,
            text_encoding: format.text_encoding,
            salt,
            check_bytes,
        })
    }

    fn password_digest(&self, password: Option<&str>) -> Vec<u8> {
        let mut field = [0u8; PASSWORD_LENGTH];
        if let Some(password) = password {
            let encoded = self.text_encoding.encode(&password.to_uppercase());
            let n = encoded.len().min(PASSWORD_LENGTH);
            field[..n].copy_from_slice(&encoded[..n]);
        }
        self.digest.hash_to_len(&[&field], PASSWORD_DIGEST_LENGTH)
    }

    fn verify_password(self, password: Option<&str>) -> Result<MsisamKeys> {
        let pwd_digest = self.password_digest(password);
        let base_salt = &self.salt[..BASE_SALT_LENGTH];

        // All-zero check bytes: the file was saved without a password.
        if !is_blank_key(&self.check_bytes) {
            let mut check = self.check_bytes.clone();
            Rc4::new(&concat(&pwd_digest, &self.salt)).apply_keystream(&mut check);
            if check != base_salt {
                return Err(CryptCodecError::InvalidPassword);
            }
        }

        Ok(MsisamKeys {
            base_hash: concat(&pwd_digest, base_salt),
        })
    }
}

pub(crate) fn create(
    password: &mut PasswordSource<'_>,
    header: &[u8],
    format: &FormatConstants,
) -> Result<CodecHandler> {
    let flags = header_u8(header, ENCRYPTION_FLAGS_OFFSET, "MSISAM encryption flags")?;
    if flags & NEW_ENCRYPTION != 0 {
        let pending = PendingMsisamKeys::read(header, format)?;
        let keys = pending.verify_password(password.get())?;
        return Ok(CodecHandler::encoded(PageCodec::new(
            Scheme::MsisamModern,
            PageKeys::Msisam(keys),
            PageTransform::Stream,
            MSISAM_MAX_ENCODED_PAGE,
        )));
    }

    let key = old_encoding_key(header, format)?;
    Ok(jet::handler(
        Scheme::MsisamOld,
        key.to_vec(),
        MSISAM_MAX_ENCODED_PAGE,
    ))
}

/// Derive the page key of an old-style MSISAM file from the header alone.
fn old_encoding_key(header: &[u8], format: &FormatConstants) -> Result<[u8; 4]> {
    let salt = header_bytes(
        header,
        SALT_OFFSET,
        jet::ENCODING_KEY_LENGTH,
        "MSISAM salt",
    )?;
    let mut key = [salt[0], salt[1], salt[2], salt[3]];

    let field_len = format.size_password.checked_mul(2).ok_or_else(|| {
        CryptCodecError::InvalidFormat(format!(
            "MSISAM password field size {} overflows",
            format.size_password
        ))
    })?;
    let mut full = header_bytes(
        header,
        format.offset_password,
        field_len,
        "MSISAM password field",
    )?
    .to_vec();
    if let Some(mask) = password_mask(header, format)? {
        for (i, b) in full.iter_mut().take(format.size_password).enumerate() {
            *b ^= mask[i % mask.len()];
        }
        let trailing = full.len().saturating_sub(TRAILING_PWD_LEN);
        for (i, b) in full[trailing..].iter_mut().enumerate() {
            *b ^= mask[i % mask.len()];
        }
    }
    let hash_data: Vec<u8> = full.iter().step_by(2).copied().collect();
    hash_salt(&mut key, &hash_data);

    let engine_name = header_bytes(
        header,
        format.offset_engine_name,
        format.length_engine_name,
        "engine name",
    )?;
    hash_salt(&mut key, engine_name);

    Ok(key)
}

/// Mask applied to the legacy password field: the header creation date, truncated to an int.
fn password_mask(header: &[u8], format: &FormatConstants) -> Result<Option<[u8; 4]>> {
    let Some(offset) = format.offset_header_date else {
        return Ok(None);
    };
    let raw = header_bytes(header, offset, 8, "header date")?;
    let mut bits = [0u8; 8];
    bits.copy_from_slice(raw);
    let date = f64::from_bits(u64::from_le_bytes(bits));
    Ok(Some((date as i32).to_le_bytes()))
}

fn hash_salt(salt: &mut [u8; 4], data: &[u8]) {
    let mut hash = u32::from_le_bytes(*salt);
    for (pos, b) in data.iter().enumerate() {
        hash ^= u32::from(*b) << (pos % 0x18);
    }
    *salt = hash.to_le_bytes();
}
