//! Digest selection and the hashing helpers shared by every key-derivation scheme.

use digest::DynDigest;

use crate::error::{CryptCodecError, Result};
use crate::util::fix_to_length;

/// Digest algorithms that can appear in an encryption descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
    Md5,
    Md4,
    Md2,
    Ripemd128,
    Ripemd160,
    Whirlpool,
}

impl HashAlgorithm {
    /// Parse a descriptor hash name (`SHA512`, `sha-256`, `RIPEMD160`, ...).
    pub fn parse_descriptor_name(name: &str) -> Result<Self> {
        match normalize_descriptor_name(name).as_str() {
            "SHA1" => Ok(Self::Sha1),
            "SHA256" => Ok(Self::Sha256),
            "SHA384" => Ok(Self::Sha384),
            "SHA512" => Ok(Self::Sha512),
            "MD5" => Ok(Self::Md5),
            "MD4" => Ok(Self::Md4),
            "MD2" => Ok(Self::Md2),
            "RIPEMD128" => Ok(Self::Ripemd128),
            "RIPEMD160" => Ok(Self::Ripemd160),
            "WHIRLPOOL" => Ok(Self::Whirlpool),
            _ => Err(CryptCodecError::InvalidCryptoConfiguration(format!(
                "unsupported encryption parameter: {name}"
            ))),
        }
    }

    pub fn digest_len(self) -> usize {
        match self {
            HashAlgorithm::Sha1 | HashAlgorithm::Ripemd160 => 20,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 | HashAlgorithm::Whirlpool => 64,
            HashAlgorithm::Md5 | HashAlgorithm::Md4 | HashAlgorithm::Md2 => 16,
            HashAlgorithm::Ripemd128 => 16,
        }
    }

    fn hasher(self) -> Box<dyn DynDigest> {
        match self {
            HashAlgorithm::Sha1 => Box::<sha1::Sha1>::default(),
            HashAlgorithm::Sha256 => Box::<sha2::Sha256>::default(),
            HashAlgorithm::Sha384 => Box::<sha2::Sha384>::default(),
            HashAlgorithm::Sha512 => Box::<sha2::Sha512>::default(),
            HashAlgorithm::Md5 => Box::<md5::Md5>::default(),
            HashAlgorithm::Md4 => Box::<md4::Md4>::default(),
            HashAlgorithm::Md2 => Box::<md2::Md2>::default(),
            HashAlgorithm::Ripemd128 => Box::<ripemd::Ripemd128>::default(),
            HashAlgorithm::Ripemd160 => Box::<ripemd::Ripemd160>::default(),
            HashAlgorithm::Whirlpool => Box::<whirlpool::Whirlpool>::default(),
        }
    }

    /// `Hash(parts[0] || parts[1] || ...)`.
    pub(crate) fn hash(self, parts: &[&[u8]]) -> Vec<u8> {
        let mut h = self.hasher();
        for part in parts {
            h.update(part);
        }
        h.finalize().into_vec()
    }

    /// Hash and truncate/zero-pad to `len` bytes. A `len` of 0 keeps the natural digest length.
    pub(crate) fn hash_to_len(self, parts: &[&[u8]], len: usize) -> Vec<u8> {
        let digest = self.hash(parts);
        if len == 0 {
            return digest;
        }
        fix_to_length(digest, len, 0)
    }

    /// `H = Hash(LE32(i) || H)` for `i in 0..iterations`.
    ///
    /// Zero iterations return `base` untouched.
    pub(crate) fn iterate_hash(self, base: &[u8], iterations: u32) -> Vec<u8> {
        let mut h = base.to_vec();
        for i in 0..iterations {
            h = self.hash(&[&i.to_le_bytes(), &h]);
        }
        h
    }
}

/// Normalize a descriptor enum name: trim, uppercase, drop `-`/`_`, and prefix names starting
/// with a digit (`3DES` -> `_3DES`).
pub(crate) fn normalize_descriptor_name(name: &str) -> String {
    let mut out: String = name
        .trim()
        .chars()
        .filter(|c| !matches!(c, '-' | '_'))
        .flat_map(char::to_uppercase)
        .collect();
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}
