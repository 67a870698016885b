//! RC4 CryptoAPI encryption ([MS-OFFCRYPTO] 2.3.5).

use crate::codec::CipherParams;
use crate::error::{CryptCodecError, Result};
use crate::hash::HashAlgorithm;
use crate::office::header::{
    CryptoAlgorithm, EncryptionHeader, EncryptionVerifier, HeaderHashAlgorithm,
};
use crate::rc4::Rc4;
use crate::util::{apply_page_number, ct_eq, fix_to_length, Reader};

const VALID_ALGORITHMS: &[CryptoAlgorithm] = &[CryptoAlgorithm::Rc4];
const VALID_HASHES: &[HeaderHashAlgorithm] = &[HeaderHashAlgorithm::Sha1];

const DIGEST: HashAlgorithm = HashAlgorithm::Sha1;

/// 40-bit keys are zero-extended to a 128-bit RC4 key.
const WEAK_KEY_BITS: u32 = 40;
const WEAK_KEY_PADDED_LEN: usize = 16;

pub(crate) struct PendingRc4CryptoApiKeys {
    encoding_key: Vec<u8>,
    verifier: EncryptionVerifier,
    key_bits: u32,
}

impl PendingRc4CryptoApiKeys {
    pub(crate) fn read(r: &mut Reader<'_>, encoding_key: &[u8]) -> Result<Self> {
        let header = EncryptionHeader::read(r, VALID_ALGORITHMS, VALID_HASHES)?;
        let verifier = EncryptionVerifier::read(r, header.crypto_algorithm)?;
        Ok(Self {
            encoding_key: encoding_key.to_vec(),
            verifier,
            key_bits: header.key_size,
        })
    }

    pub(crate) fn verify_password(self, password: &[u8]) -> Result<Rc4CryptoApiKeys> {
        let keys = Rc4CryptoApiKeys {
            base_hash: DIGEST.hash(&[&self.verifier.salt, password]),
            encoding_key: self.encoding_key,
            key_bits: self.key_bits,
        };

        // Verifier and verifier hash are one continuous keystream.
        let mut rc4 = Rc4::new(&keys.derive_key(&0u32.to_le_bytes()));
        let mut verifier = self.verifier.encrypted_verifier;
        rc4.apply_keystream(&mut verifier);
        let mut verifier_hash = self.verifier.encrypted_verifier_hash;
        rc4.apply_keystream(&mut verifier_hash);

        let len = (self.verifier.verifier_hash_size as usize).min(verifier_hash.len());
        let expected = fix_to_length(DIGEST.hash(&[&verifier]), len, 0);
        if !ct_eq(&fix_to_length(verifier_hash, len, 0), &expected) {
            return Err(CryptCodecError::InvalidPassword);
        }
        Ok(keys)
    }
}

pub(crate) struct Rc4CryptoApiKeys {
    encoding_key: Vec<u8>,
    base_hash: Vec<u8>,
    key_bits: u32,
}

impl Rc4CryptoApiKeys {
    fn derive_key(&self, block: &[u8]) -> Vec<u8> {
        let key = DIGEST.hash_to_len(&[&self.base_hash, block], (self.key_bits / 8) as usize);
        if self.key_bits == WEAK_KEY_BITS {
            fix_to_length(key, WEAK_KEY_PADDED_LEN, 0)
        } else {
            key
        }
    }

    pub(crate) fn cipher_params(&self, page: u32) -> CipherParams {
        CipherParams::key(self.derive_key(&apply_page_number(&self.encoding_key, 0, page)))
    }
}
