//! Office binary document RC4 encryption ([MS-OFFCRYPTO] 2.3.6), version 1.1.

use crate::codec::CipherParams;
use crate::error::{CryptCodecError, Result};
use crate::hash::HashAlgorithm;
use crate::rc4::Rc4;
use crate::util::{apply_page_number, concat, ct_eq, Reader};

const DIGEST: HashAlgorithm = HashAlgorithm::Md5;

const SALT_LEN: usize = 16;
const VERIFIER_LEN: usize = 16;
const TRUNCATED_HASH_LEN: usize = 5;
const INTERMEDIATE_BUFFER_LEN: usize = 336;
const KEY_LEN: usize = 16;

pub(crate) struct PendingBinaryRc4Keys {
    encoding_key: Vec<u8>,
    salt: Vec<u8>,
    encrypted_verifier: Vec<u8>,
    encrypted_verifier_hash: Vec<u8>,
}

impl PendingBinaryRc4Keys {
    pub(crate) fn read(r: &mut Reader<'_>, encoding_key: &[u8]) -> Result<Self> {
        Ok(Self {
            encoding_key: encoding_key.to_vec(),
            salt: r.take(SALT_LEN, "RC4EncryptionHeader.salt")?.to_vec(),
            encrypted_verifier: r
                .take(VERIFIER_LEN, "RC4EncryptionHeader.encryptedVerifier")?
                .to_vec(),
            encrypted_verifier_hash: r
                .take(VERIFIER_LEN, "RC4EncryptionHeader.encryptedVerifierHash")?
                .to_vec(),
        })
    }

    pub(crate) fn verify_password(self, password: &[u8]) -> Result<BinaryRc4Keys> {
        // MD5(password) truncated to 40 bits, salted, repeated 16 times.
        let fill = concat(&DIGEST.hash_to_len(&[password], TRUNCATED_HASH_LEN), &self.salt);
        let mut intermediate = Vec::with_capacity(INTERMEDIATE_BUFFER_LEN);
        while intermediate.len() < INTERMEDIATE_BUFFER_LEN {
            let n = fill.len().min(INTERMEDIATE_BUFFER_LEN - intermediate.len());
            intermediate.extend_from_slice(&fill[..n]);
        }
        let keys = BinaryRc4Keys {
            encoding_key: self.encoding_key,
            base_hash: DIGEST.hash_to_len(&[&intermediate], TRUNCATED_HASH_LEN),
        };

        let mut rc4 = Rc4::new(&keys.derive_key(&0u32.to_le_bytes()));
        let mut verifier = self.encrypted_verifier;
        rc4.apply_keystream(&mut verifier);
        let mut verifier_hash = self.encrypted_verifier_hash;
        rc4.apply_keystream(&mut verifier_hash);

        if !ct_eq(&verifier_hash, &DIGEST.hash(&[&verifier])) {
            return Err(CryptCodecError::InvalidPassword);
        }
        Ok(keys)
    }
}

pub(crate) struct BinaryRc4Keys {
    encoding_key: Vec<u8>,
    base_hash: Vec<u8>,
}

impl BinaryRc4Keys {
    fn derive_key(&self, block: &[u8]) -> Vec<u8> {
        DIGEST.hash_to_len(&[&self.base_hash, block], KEY_LEN)
    }

    pub(crate) fn cipher_params(&self, page: u32) -> CipherParams {
        CipherParams::key(self.derive_key(&apply_page_number(&self.encoding_key, 0, page)))
    }
}
