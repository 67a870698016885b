//! Agile encryption ([MS-OFFCRYPTO] 2.3.4.10 - 2.3.4.13).
//!
//! The password key encryptor unwraps a random intermediate key (`keyValue`); pages are then
//! block-encrypted with that key and a per-page IV derived from the `keyData` salt.

use zeroize::Zeroizing;

use crate::block::BlockCipherSpec;
use crate::codec::CipherParams;
use crate::error::{CryptCodecError, Result};
use crate::hash::HashAlgorithm;
use crate::office::descriptor::{self, CipherDescriptor, KeyEncryptor, PasswordKeyEncryptor};
use crate::util::{apply_page_number, ct_eq, fix_to_length, Reader};

const RESERVED_VALUE: u32 = 0x40;

const VERIFIER_INPUT_BLOCK: [u8; 8] = [0xfe, 0xa7, 0xd2, 0x76, 0x3b, 0x4b, 0x9e, 0x79];
const VERIFIER_VALUE_BLOCK: [u8; 8] = [0xd7, 0xaa, 0x0f, 0x6d, 0x30, 0x61, 0x34, 0x4e];
const KEY_VALUE_BLOCK: [u8; 8] = [0x14, 0x6e, 0x0b, 0xe7, 0xab, 0xac, 0xd0, 0xd6];

const KEY_PAD: u8 = 0x36;

/// Hash and cipher resolved from one descriptor element.
#[derive(Debug, Clone, Copy)]
struct Suite {
    hash: HashAlgorithm,
    spec: BlockCipherSpec,
    key_len: usize,
    block_size: usize,
}

impl Suite {
    fn resolve(desc: &CipherDescriptor, element: &str) -> Result<Self> {
        let hash = HashAlgorithm::parse_descriptor_name(&desc.hash_algorithm)?;
        let spec = BlockCipherSpec::from_descriptor_names(
            &desc.cipher_algorithm,
            &desc.cipher_chaining,
        )?;
        if desc.hash_size as usize != hash.digest_len() {
            log::warn!(
                "{element}.hashSize is {} but {:?} produces {} bytes",
                desc.hash_size,
                hash,
                hash.digest_len()
            );
        }
        let key_len = desc.key_bits.div_ceil(8) as usize;
        if !spec.algorithm().supports_key_len(key_len) {
            return Err(CryptCodecError::InvalidCryptoConfiguration(format!(
                "{element}.keyBits {} is not a valid {:?} key size",
                desc.key_bits,
                spec.algorithm()
            )));
        }
        // Checked for ECB too: IVs and verifier padding are sized from it.
        let block_size = desc.block_size as usize;
        if block_size != spec.block_size() {
            return Err(CryptCodecError::InvalidCryptoConfiguration(format!(
                "{element}.blockSize {block_size} does not match the {:?} block size {}",
                spec.algorithm(),
                spec.block_size()
            )));
        }
        Ok(Self {
            hash,
            spec,
            key_len,
            block_size,
        })
    }
}

/// Parsed descriptor whose password has not been checked yet.
pub(crate) struct PendingAgileKeys {
    encoding_key: Vec<u8>,
    key_encryptor: PasswordKeyEncryptor,
    password_suite: Suite,
    crypt_suite: Suite,
    key_data_salt: Vec<u8>,
}

impl PendingAgileKeys {
    /// Parse the provider bytes that follow the (4, 4) version.
    pub(crate) fn read(
        r: &mut Reader<'_>,
        encoding_key: &[u8],
        max_spin_count: u32,
    ) -> Result<Self> {
        let reserved = r.read_u32_le("Agile reserved value")?;
        if reserved != RESERVED_VALUE {
            return Err(CryptCodecError::InvalidFormat(format!(
                "unexpected Agile reserved value {reserved:#x}"
            )));
        }
        let desc = descriptor::parse(r.remaining())?;
        if desc.data_integrity.is_some() {
            log::debug!("Agile descriptor carries dataIntegrity; its HMAC is not checked");
        }

        let mut encryptors = desc.key_encryptors.into_iter();
        let key_encryptor = match (encryptors.next(), encryptors.next()) {
            (Some(KeyEncryptor::Password(pwd)), None) => pwd,
            _ => {
                return Err(CryptCodecError::UnsupportedEncryption(
                    "missing or unexpected key encryptor".to_string(),
                ))
            }
        };

        if key_encryptor.spin_count > max_spin_count {
            return Err(CryptCodecError::InvalidCryptoConfiguration(format!(
                "spinCount {} exceeds the limit of {max_spin_count}",
                key_encryptor.spin_count
            )));
        }

        let password_suite = Suite::resolve(&key_encryptor.cipher, "encryptedKey")?;
        let crypt_suite = Suite::resolve(&desc.key_data, "keyData")?;

        Ok(Self {
            encoding_key: encoding_key.to_vec(),
            key_data_salt: desc.key_data.salt_value,
            key_encryptor,
            password_suite,
            crypt_suite,
        })
    }

    pub(crate) fn verify_password(self, password: &[u8]) -> Result<AgileKeys> {
        let suite = self.password_suite;
        let enc = &self.key_encryptor;
        let salt = enc.cipher.salt_value.as_slice();

        let base_hash = suite.hash.hash(&[salt, password]);
        let iterated_hash = Zeroizing::new(suite.hash.iterate_hash(&base_hash, enc.spin_count));
        let unwrap = |block: &[u8], blob: &[u8]| -> Result<Vec<u8>> {
            let key = Zeroizing::new(fix_to_length(
                suite.hash.hash(&[iterated_hash.as_slice(), block]),
                suite.key_len,
                KEY_PAD,
            ));
            let mut out = blob.to_vec();
            suite.spec.decrypt(&key, Some(salt), &mut out)?;
            Ok(out)
        };

        let verifier = unwrap(&VERIFIER_INPUT_BLOCK, &enc.encrypted_verifier_hash_input)?;
        let verifier_hash = unwrap(&VERIFIER_VALUE_BLOCK, &enc.encrypted_verifier_hash_value)?;

        let test_hash = suite.hash.hash(&[&verifier]);
        let padded_len = test_hash.len().div_ceil(suite.block_size) * suite.block_size;
        if !ct_eq(&verifier_hash, &fix_to_length(test_hash, padded_len, 0)) {
            return Err(CryptCodecError::InvalidPassword);
        }

        let mut key_value = unwrap(&KEY_VALUE_BLOCK, &enc.encrypted_key_value)?;
        let key_len = self.crypt_suite.key_len;
        if key_value.len() < key_len {
            return Err(CryptCodecError::InvalidCryptoConfiguration(format!(
                "decrypted key value has {} bytes, keyData needs {key_len}",
                key_value.len()
            )));
        }
        // The wrapped key is padded to the encryptor's block size.
        key_value.truncate(key_len);

        Ok(AgileKeys {
            encoding_key: self.encoding_key,
            key_value: Zeroizing::new(key_value),
            crypt_hash: self.crypt_suite.hash,
            key_data_salt: self.key_data_salt,
            block_size: self.crypt_suite.block_size,
        })
    }

    /// Cipher used for page data.
    pub(crate) fn page_spec(&self) -> BlockCipherSpec {
        self.crypt_suite.spec
    }
}

pub(crate) struct AgileKeys {
    encoding_key: Vec<u8>,
    key_value: Zeroizing<Vec<u8>>,
    crypt_hash: HashAlgorithm,
    key_data_salt: Vec<u8>,
    block_size: usize,
}

impl AgileKeys {
    pub(crate) fn cipher_params(&self, page: u32) -> CipherParams {
        let block = apply_page_number(&self.encoding_key, 0, page);
        let iv = fix_to_length(
            self.crypt_hash.hash(&[&self.key_data_salt, &block]),
            self.block_size,
            KEY_PAD,
        );
        CipherParams::key_iv(self.key_value.to_vec(), iv)
    }
}
