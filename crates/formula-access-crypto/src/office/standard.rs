//! ECMA-376 Standard encryption (AES-ECB, SHA-1 key derivation).
//!
//! The same layout with zero stretching rounds is what some Access versions write when the
//! version flags claim RC4 CryptoAPI; that "non-standard" variant shares this module.

use crate::block::BlockCipherSpec;
use crate::codec::CipherParams;
use crate::error::{CryptCodecError, Result};
use crate::hash::HashAlgorithm;
use crate::office::header::{
    CryptoAlgorithm, EncryptionHeader, EncryptionVerifier, HeaderHashAlgorithm,
};
use crate::util::{apply_page_number, ct_eq, fix_to_length, Reader};

pub(crate) const STANDARD_HASH_ITERATIONS: u32 = 50_000;
pub(crate) const NON_STANDARD_HASH_ITERATIONS: u32 = 0;

const VALID_ALGORITHMS: &[CryptoAlgorithm] = &[
    CryptoAlgorithm::Aes128,
    CryptoAlgorithm::Aes192,
    CryptoAlgorithm::Aes256,
];
const VALID_HASHES: &[HeaderHashAlgorithm] = &[HeaderHashAlgorithm::Sha1];

const DIGEST: HashAlgorithm = HashAlgorithm::Sha1;

/// Parsed Standard header and verifier, before the password is checked.
pub(crate) struct PendingStandardKeys {
    encoding_key: Vec<u8>,
    verifier: EncryptionVerifier,
    key_len: usize,
    iterations: u32,
}

impl PendingStandardKeys {
    pub(crate) fn read(r: &mut Reader<'_>, encoding_key: &[u8], iterations: u32) -> Result<Self> {
        let header = EncryptionHeader::read(r, VALID_ALGORITHMS, VALID_HASHES)?;
        let verifier = EncryptionVerifier::read(r, header.crypto_algorithm)?;
        Ok(Self {
            encoding_key: encoding_key.to_vec(),
            verifier,
            key_len: header.key_size_bytes(),
            iterations,
        })
    }

    pub(crate) fn verify_password(self, password: &[u8]) -> Result<StandardKeys> {
        let base_hash = DIGEST.hash(&[&self.verifier.salt, password]);
        let iterated_hash = DIGEST.iterate_hash(&base_hash, self.iterations);
        let key = derive_key(&iterated_hash, &0u32.to_le_bytes(), self.key_len);

        let mut verifier = self.verifier.encrypted_verifier.clone();
        BlockCipherSpec::AES_ECB.decrypt(&key, None, &mut verifier)?;
        let mut verifier_hash = self.verifier.encrypted_verifier_hash.clone();
        BlockCipherSpec::AES_ECB.decrypt(&key, None, &mut verifier_hash)?;

        // Both sides are zero-padded to verifierHashSize; past the decrypted hash the padding
        // always matches, so the comparison stops there.
        let len = (self.verifier.verifier_hash_size as usize).min(verifier_hash.len());
        let expected = fix_to_length(DIGEST.hash(&[&verifier]), len, 0);
        if !ct_eq(&fix_to_length(verifier_hash, len, 0), &expected) {
            return Err(CryptCodecError::InvalidPassword);
        }

        Ok(StandardKeys {
            encoding_key: self.encoding_key,
            iterated_hash,
            key_len: self.key_len,
        })
    }
}

pub(crate) struct StandardKeys {
    encoding_key: Vec<u8>,
    /// The stretched password hash; only the final block hash depends on the page.
    iterated_hash: Vec<u8>,
    key_len: usize,
}

impl StandardKeys {
    pub(crate) fn cipher_params(&self, page: u32) -> CipherParams {
        let block = apply_page_number(&self.encoding_key, 0, page);
        CipherParams::key(derive_key(&self.iterated_hash, &block, self.key_len))
    }
}

/// [MS-OFFCRYPTO] 2.3.4.7 after the password hash has been stretched.
fn derive_key(iterated_hash: &[u8], block: &[u8], key_len: usize) -> Vec<u8> {
    let final_hash = DIGEST.hash(&[iterated_hash, block]);
    let x1 = DIGEST.hash(&[&x_bytes(&final_hash, 0x36)]);
    let x2 = DIGEST.hash(&[&x_bytes(&final_hash, 0x5C)]);
    fix_to_length(crate::util::concat(&x1, &x2), key_len, 0)
}

fn x_bytes(final_hash: &[u8], fill: u8) -> [u8; 64] {
    let mut x = [fill; 64];
    for (dst, src) in x.iter_mut().zip(final_hash) {
        *dst ^= src;
    }
    x
}
