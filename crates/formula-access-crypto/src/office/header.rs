//! `EncryptionHeader` / `EncryptionVerifier` structures shared by the Standard, non-standard and
//! RC4 CryptoAPI providers ([MS-OFFCRYPTO] 2.3.2 and 2.3.3).

use crate::error::{CryptCodecError, Result};
use crate::util::Reader;

pub(crate) const FCRYPTO_API: u32 = 0x04;
pub(crate) const FEXTERNAL: u32 = 0x10;
pub(crate) const FAES: u32 = 0x20;

const ALGID_FLAGS: u32 = 0;
const ALGID_RC4: u32 = 0x6801;
const ALGID_AES_128: u32 = 0x660E;
const ALGID_AES_192: u32 = 0x660F;
const ALGID_AES_256: u32 = 0x6610;

const HASHALGID_FLAGS: u32 = 0;
const HASHALGID_SHA1: u32 = 0x8004;

const CSP_BASE_MARKER: &str = " base ";
const RC4_BASE_DEFAULT_KEY_SIZE: u32 = 0x28;
const RC4_STRONG_DEFAULT_KEY_SIZE: u32 = 0x80;

const SALT_SIZE: usize = 16;
const ENC_VERIFIER_SIZE: usize = 16;

pub(crate) fn is_flag_set(flags: u32, mask: u32) -> bool {
    flags & mask != 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CryptoAlgorithm {
    External,
    Rc4,
    Aes128,
    Aes192,
    Aes256,
}

impl CryptoAlgorithm {
    /// Length of the encrypted verifier hash stored after the verifier.
    pub(crate) fn encrypted_verifier_hash_len(self) -> usize {
        match self {
            CryptoAlgorithm::External => 0,
            CryptoAlgorithm::Rc4 => 20,
            CryptoAlgorithm::Aes128 | CryptoAlgorithm::Aes192 | CryptoAlgorithm::Aes256 => 32,
        }
    }

    /// Valid key sizes in bits.
    fn key_size_range(self) -> (u32, u32) {
        match self {
            CryptoAlgorithm::External => (0, 0),
            // CryptoAPI documents 40-128 bits; CNG allows up to 512.
            CryptoAlgorithm::Rc4 => (0x28, 0x200),
            CryptoAlgorithm::Aes128 => (0x80, 0x80),
            CryptoAlgorithm::Aes192 => (0xC0, 0xC0),
            CryptoAlgorithm::Aes256 => (0x100, 0x100),
        }
    }

    fn parse(alg_id: u32, flags: u32) -> Result<Self> {
        match alg_id {
            ALGID_FLAGS if is_flag_set(flags, FEXTERNAL) => Ok(Self::External),
            ALGID_FLAGS if is_flag_set(flags, FCRYPTO_API) => Ok(if is_flag_set(flags, FAES) {
                Self::Aes128
            } else {
                Self::Rc4
            }),
            ALGID_RC4 => Ok(Self::Rc4),
            ALGID_AES_128 => Ok(Self::Aes128),
            ALGID_AES_192 => Ok(Self::Aes192),
            ALGID_AES_256 => Ok(Self::Aes256),
            _ => Err(CryptCodecError::UnsupportedEncryption(format!(
                "unsupported encryption algorithm {alg_id:#x} (flags {flags:#x})"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HeaderHashAlgorithm {
    External,
    Sha1,
}

impl HeaderHashAlgorithm {
    fn parse(alg_id_hash: u32, flags: u32) -> Result<Self> {
        match alg_id_hash {
            HASHALGID_FLAGS if is_flag_set(flags, FEXTERNAL) => Ok(Self::External),
            HASHALGID_FLAGS | HASHALGID_SHA1 => Ok(Self::Sha1),
            _ => Err(CryptCodecError::UnsupportedEncryption(format!(
                "unsupported hash algorithm {alg_id_hash:#x} (flags {flags:#x})"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EncryptionHeader {
    pub(crate) flags: u32,
    pub(crate) size_extra: u32,
    pub(crate) crypto_algorithm: CryptoAlgorithm,
    pub(crate) hash_algorithm: HeaderHashAlgorithm,
    /// Key size in bits, after defaulting.
    pub(crate) key_size: u32,
    pub(crate) provider_type: u32,
    pub(crate) csp_name: String,
}

impl EncryptionHeader {
    /// Read a length-prefixed header and validate it against the caller's accepted algorithms.
    ///
    /// The cursor is left just past the declared header length, whatever the header itself
    /// consumed.
    pub(crate) fn read(
        r: &mut Reader<'_>,
        valid_algorithms: &[CryptoAlgorithm],
        valid_hashes: &[HeaderHashAlgorithm],
    ) -> Result<Self> {
        let header_len = r.read_u32_le("EncryptionHeader.headerSize")? as usize;
        let mut hr = Reader::new(r.take(header_len, "EncryptionHeader")?);

        let flags = hr.read_u32_le("EncryptionHeader.flags")?;
        let size_extra = hr.read_u32_le("EncryptionHeader.sizeExtra")?;
        let alg_id = hr.read_u32_le("EncryptionHeader.algId")?;
        let alg_id_hash = hr.read_u32_le("EncryptionHeader.algIdHash")?;
        let raw_key_size = hr.read_u32_le("EncryptionHeader.keySize")?;
        let provider_type = hr.read_u32_le("EncryptionHeader.providerType")?;

        let crypto_algorithm = CryptoAlgorithm::parse(alg_id, flags)?;
        let hash_algorithm = HeaderHashAlgorithm::parse(alg_id_hash, flags)?;

        hr.read_u32_le("EncryptionHeader.reserved1")?;
        hr.read_u32_le("EncryptionHeader.reserved2")?;
        let csp_name = decode_csp_name(hr.remaining());
        let key_size = default_key_size(raw_key_size, crypto_algorithm, &csp_name);

        let header = Self {
            flags,
            size_extra,
            crypto_algorithm,
            hash_algorithm,
            key_size,
            provider_type,
            csp_name,
        };

        if header.crypto_algorithm == CryptoAlgorithm::External
            && !valid_algorithms.contains(&CryptoAlgorithm::External)
        {
            return Err(CryptCodecError::UnsupportedEncryption(format!(
                "externally managed encryption (flags {flags:#x}) is not supported"
            )));
        }
        if !valid_algorithms.contains(&header.crypto_algorithm) {
            return Err(CryptCodecError::InvalidCryptoConfiguration(format!(
                "crypto algorithm {:?} must be one of {valid_algorithms:?}",
                header.crypto_algorithm
            )));
        }
        if !valid_hashes.contains(&header.hash_algorithm) {
            return Err(CryptCodecError::InvalidCryptoConfiguration(format!(
                "hash algorithm {:?} must be one of {valid_hashes:?}",
                header.hash_algorithm
            )));
        }
        log::debug!(
            "EncryptionHeader flags {:#x}, sizeExtra {}, {:?}/{:?}, {} bit key, provider type {:#x}, CSP {:?}",
            header.flags,
            header.size_extra,
            header.crypto_algorithm,
            header.hash_algorithm,
            header.key_size,
            header.provider_type,
            header.csp_name
        );
        let (min, max) = header.crypto_algorithm.key_size_range();
        if !(min..=max).contains(&header.key_size) {
            return Err(CryptCodecError::InvalidCryptoConfiguration(format!(
                "key size {} is outside the allowable range {min}..={max} for {:?}",
                header.key_size, header.crypto_algorithm
            )));
        }
        if header.key_size % 8 != 0 {
            return Err(CryptCodecError::InvalidCryptoConfiguration(format!(
                "key size {} must be a multiple of 8",
                header.key_size
            )));
        }

        Ok(header)
    }

    pub(crate) fn key_size_bytes(&self) -> usize {
        (self.key_size / 8) as usize
    }
}

fn default_key_size(key_size: u32, algorithm: CryptoAlgorithm, csp_name: &str) -> u32 {
    if key_size != 0 {
        return key_size;
    }
    if algorithm == CryptoAlgorithm::Rc4 {
        // An unnamed or "Base" provider defaults to 40 bits; the Strong/Enhanced ones to 128.
        let csp = csp_name.trim().to_lowercase();
        return if csp.is_empty() || csp.contains(CSP_BASE_MARKER) {
            RC4_BASE_DEFAULT_KEY_SIZE
        } else {
            RC4_STRONG_DEFAULT_KEY_SIZE
        };
    }
    algorithm.key_size_range().0
}

/// UTF-16LE, NUL-terminated; a trailing odd byte is ignored.
fn decode_csp_name(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .take_while(|u| *u != 0)
        .collect();
    String::from_utf16_lossy(&units)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EncryptionVerifier {
    pub(crate) salt: Vec<u8>,
    pub(crate) encrypted_verifier: Vec<u8>,
    pub(crate) verifier_hash_size: u32,
    pub(crate) encrypted_verifier_hash: Vec<u8>,
}

impl EncryptionVerifier {
    pub(crate) fn read(r: &mut Reader<'_>, algorithm: CryptoAlgorithm) -> Result<Self> {
        let salt_size = r.read_u32_le("EncryptionVerifier.saltSize")? as usize;
        if salt_size != SALT_SIZE {
            return Err(CryptCodecError::InvalidCryptoConfiguration(format!(
                "salt size {salt_size} must be {SALT_SIZE}"
            )));
        }
        let salt = r.take(salt_size, "EncryptionVerifier.salt")?.to_vec();
        let encrypted_verifier = r
            .take(ENC_VERIFIER_SIZE, "EncryptionVerifier.encryptedVerifier")?
            .to_vec();
        let verifier_hash_size = r.read_u32_le("EncryptionVerifier.verifierHashSize")?;
        let encrypted_verifier_hash = r
            .take(
                algorithm.encrypted_verifier_hash_len(),
                "EncryptionVerifier.encryptedVerifierHash",
            )?
            .to_vec();
        Ok(Self {
            salt,
            encrypted_verifier,
            verifier_hash_size,
            encrypted_verifier_hash,
        })
    }
}
