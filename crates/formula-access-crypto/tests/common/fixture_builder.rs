#![allow(dead_code)]

//! Builds synthetic encrypted header pages and on-disk page images.
//!
//! Everything here is written against the RustCrypto primitives directly (plus a local RC4), so
//! the fixtures do not share key-derivation code with the crate under test.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cipher::block_padding::NoPadding;
use cipher::generic_array::GenericArray;
use cipher::{BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit};
use md5::Md5;
use sha1::{Digest, Sha1};
use sha2::Sha512;

pub const PAGE_SIZE: usize = 4096;
pub const ENCODING_KEY: [u8; 4] = [0x5E, 0x11, 0x22, 0x33];

const OFFSET_ENCODING_KEY: usize = 0x3E;
const CRYPT_STRUCTURE_OFFSET: usize = 0x299;

// ---------------------------------------------------------------------------------------------
// Primitives
// ---------------------------------------------------------------------------------------------

pub fn rc4(key: &[u8], data: &mut [u8]) {
    let mut s: Vec<u8> = (0..=255u8).collect();
    let mut j = 0u8;
    for i in 0..256 {
        j = j.wrapping_add(s[i]).wrapping_add(key[i % key.len()]);
        s.swap(i, j as usize);
    }
    let (mut i, mut j) = (0u8, 0u8);
    for b in data {
        i = i.wrapping_add(1);
        j = j.wrapping_add(s[i as usize]);
        s.swap(i as usize, j as usize);
        *b ^= s[s[i as usize].wrapping_add(s[j as usize]) as usize];
    }
}

pub fn sha1(parts: &[&[u8]]) -> Vec<u8> {
    let mut h = Sha1::new();
    for p in parts {
        h.update(p);
    }
    h.finalize().to_vec()
}

pub fn sha512(parts: &[&[u8]]) -> Vec<u8> {
    let mut h = Sha512::new();
    for p in parts {
        h.update(p);
    }
    h.finalize().to_vec()
}

pub fn md5(parts: &[&[u8]]) -> Vec<u8> {
    let mut h = Md5::new();
    for p in parts {
        h.update(p);
    }
    h.finalize().to_vec()
}

pub fn utf16le(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

/// The 4-byte block value for `page`: the encoding key XOR the little-endian page number.
pub fn page_block(page: u32) -> [u8; 4] {
    let n = page.to_le_bytes();
    [
        ENCODING_KEY[0] ^ n[0],
        ENCODING_KEY[1] ^ n[1],
        ENCODING_KEY[2] ^ n[2],
        ENCODING_KEY[3] ^ n[3],
    ]
}

fn fixed(mut bytes: Vec<u8>, len: usize, pad: u8) -> Vec<u8> {
    bytes.resize(len, pad);
    bytes
}

pub fn aes_ecb_encrypt(key: &[u8], data: &mut [u8]) {
    assert_eq!(data.len() % 16, 0);
    match key.len() {
        16 => {
            let cipher = aes::Aes128::new_from_slice(key).expect("aes-128 key");
            for block in data.chunks_exact_mut(16) {
                cipher.encrypt_block(GenericArray::from_mut_slice(block));
            }
        }
        32 => {
            let cipher = aes::Aes256::new_from_slice(key).expect("aes-256 key");
            for block in data.chunks_exact_mut(16) {
                cipher.encrypt_block(GenericArray::from_mut_slice(block));
            }
        }
        n => panic!("unsupported AES key length {n}"),
    }
}

pub fn aes256_cbc_encrypt(key: &[u8], iv: &[u8], data: &mut [u8]) {
    let len = data.len();
    cbc::Encryptor::<aes::Aes256>::new_from_slices(key, iv)
        .expect("aes-256-cbc key/iv")
        .encrypt_padded_mut::<NoPadding>(data, len)
        .expect("block aligned");
}

// ---------------------------------------------------------------------------------------------
// Header pages
// ---------------------------------------------------------------------------------------------

pub fn jet_header(page_size: usize, key: [u8; 4]) -> Vec<u8> {
    let mut header = vec![0u8; page_size];
    header[OFFSET_ENCODING_KEY..OFFSET_ENCODING_KEY + 4].copy_from_slice(&key);
    header
}

/// An ACCDB header page carrying `info` as its encryption provider blob.
pub fn office_header(info: &[u8]) -> Vec<u8> {
    let mut header = jet_header(PAGE_SIZE, ENCODING_KEY);
    let len = i16::try_from(info.len()).expect("info fits in an i16");
    header[CRYPT_STRUCTURE_OFFSET..CRYPT_STRUCTURE_OFFSET + 2].copy_from_slice(&len.to_le_bytes());
    header[CRYPT_STRUCTURE_OFFSET + 2..CRYPT_STRUCTURE_OFFSET + 2 + info.len()]
        .copy_from_slice(info);
    header
}

fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Length-prefixed `EncryptionHeader`.
fn encryption_header(flags: u32, alg_id: u32, key_size: u32, csp_name: &str) -> Vec<u8> {
    let mut header = Vec::new();
    push_u32(&mut header, flags);
    push_u32(&mut header, 0); // sizeExtra
    push_u32(&mut header, alg_id);
    push_u32(&mut header, 0x8004); // SHA-1
    push_u32(&mut header, key_size);
    push_u32(&mut header, 0x18); // providerType
    push_u32(&mut header, 0);
    push_u32(&mut header, 0);
    header.extend_from_slice(&utf16le(csp_name));
    header.extend_from_slice(&[0, 0]);

    let mut out = Vec::new();
    push_u32(&mut out, header.len() as u32);
    out.extend_from_slice(&header);
    out
}

fn encryption_verifier(salt: &[u8], verifier: &[u8], hash_size: u32, hash: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    push_u32(&mut out, salt.len() as u32);
    out.extend_from_slice(salt);
    out.extend_from_slice(verifier);
    push_u32(&mut out, hash_size);
    out.extend_from_slice(hash);
    out
}

// ---------------------------------------------------------------------------------------------
// Office Standard / non-standard
// ---------------------------------------------------------------------------------------------

pub struct StandardFixture {
    pub header: Vec<u8>,
    iterated_hash: Vec<u8>,
}

impl StandardFixture {
    const SALT: [u8; 16] = [
        0x90, 0xAC, 0x68, 0x0E, 0x76, 0xF9, 0x43, 0x2B, 0x8D, 0x13, 0xB7, 0x1D, 0xB7, 0xC0, 0xFC,
        0x0D,
    ];

    /// ECMA-376 Standard encryption with 50,000 stretching rounds.
    pub fn standard(password: &str) -> Self {
        Self::build(password, 50_000, 0x24)
    }

    /// The same AES layout announced with CryptoAPI-only flags and no stretching rounds.
    pub fn non_standard(password: &str) -> Self {
        Self::build(password, 0, 0x04)
    }

    fn build(password: &str, iterations: u32, outer_flags: u32) -> Self {
        let mut h = sha1(&[&Self::SALT, &utf16le(password)]);
        for i in 0..iterations {
            h = sha1(&[&i.to_le_bytes(), &h]);
        }
        let fixture = Self {
            header: Vec::new(),
            iterated_hash: h,
        };

        let key = fixture.key(&0u32.to_le_bytes());
        let mut verifier = *b"standard-verifie";
        let mut verifier_hash = fixed(sha1(&[&verifier]), 32, 0);
        aes_ecb_encrypt(&key, &mut verifier);
        aes_ecb_encrypt(&key, &mut verifier_hash);

        let mut info = Vec::new();
        push_u16(&mut info, 4);
        push_u16(&mut info, 2);
        push_u32(&mut info, outer_flags);
        info.extend_from_slice(&encryption_header(
            0x24,
            0x660E,
            128,
            "Microsoft Enhanced RSA and AES Cryptographic Provider",
        ));
        info.extend_from_slice(&encryption_verifier(&Self::SALT, &verifier, 20, &verifier_hash));

        Self {
            header: office_header(&info),
            ..fixture
        }
    }

    fn key(&self, block: &[u8]) -> Vec<u8> {
        let final_hash = sha1(&[&self.iterated_hash, block]);
        let mut x1 = [0x36u8; 64];
        for (dst, src) in x1.iter_mut().zip(&final_hash) {
            *dst ^= src;
        }
        sha1(&[&x1])[..16].to_vec()
    }

    pub fn encrypt_page(&self, page: u32, plain: &[u8]) -> Vec<u8> {
        let mut out = plain.to_vec();
        aes_ecb_encrypt(&self.key(&page_block(page)), &mut out);
        out
    }
}

// ---------------------------------------------------------------------------------------------
// Office RC4 CryptoAPI
// ---------------------------------------------------------------------------------------------

pub struct Rc4CryptoApiFixture {
    pub header: Vec<u8>,
    base_hash: Vec<u8>,
    key_bits: usize,
}

impl Rc4CryptoApiFixture {
    const SALT: [u8; 16] = [
        0x3C, 0x81, 0x06, 0xDF, 0x5B, 0x22, 0x9A, 0x70, 0xE1, 0x44, 0x0B, 0xC7, 0x19, 0x6E, 0xA2,
        0x58,
    ];

    /// `declared_key_size` is written to the header as-is (0 lets the CSP name decide);
    /// `key_bits` is the size the reader is expected to settle on.
    pub fn new(password: &str, declared_key_size: u32, csp_name: &str, key_bits: usize) -> Self {
        let fixture = Self {
            header: Vec::new(),
            base_hash: sha1(&[&Self::SALT, &utf16le(password)]),
            key_bits,
        };

        let mut verifier = *b"rc4-cryptoapi-vf";
        let mut verifier_hash = sha1(&[&verifier]);
        let mut stream = Vec::new();
        stream.extend_from_slice(&verifier);
        stream.extend_from_slice(&verifier_hash);
        rc4(&fixture.key(&0u32.to_le_bytes()), &mut stream);
        verifier.copy_from_slice(&stream[..16]);
        verifier_hash.copy_from_slice(&stream[16..]);

        let mut info = Vec::new();
        push_u16(&mut info, 4);
        push_u16(&mut info, 2);
        push_u32(&mut info, 0x04);
        info.extend_from_slice(&encryption_header(0x04, 0x6801, declared_key_size, csp_name));
        info.extend_from_slice(&encryption_verifier(&Self::SALT, &verifier, 20, &verifier_hash));

        Self {
            header: office_header(&info),
            ..fixture
        }
    }

    pub fn key(&self, block: &[u8]) -> Vec<u8> {
        let key = sha1(&[&self.base_hash, block])[..self.key_bits / 8].to_vec();
        if self.key_bits == 40 {
            fixed(key, 16, 0)
        } else {
            key
        }
    }

    pub fn encrypt_page(&self, page: u32, plain: &[u8]) -> Vec<u8> {
        let mut out = plain.to_vec();
        rc4(&self.key(&page_block(page)), &mut out);
        out
    }
}

// ---------------------------------------------------------------------------------------------
// Office binary-document RC4 (version 1.1)
// ---------------------------------------------------------------------------------------------

pub struct BinaryRc4Fixture {
    pub header: Vec<u8>,
    base_hash: Vec<u8>,
}

impl BinaryRc4Fixture {
    const SALT: [u8; 16] = [
        0xE8, 0x82, 0x66, 0x49, 0x0C, 0x5B, 0xD1, 0xEE, 0xBD, 0x2B, 0x43, 0x94, 0xE3, 0xF8, 0x30,
        0xEF,
    ];

    pub fn new(password: &str) -> Self {
        let mut fill = md5(&[&utf16le(password)])[..5].to_vec();
        fill.extend_from_slice(&Self::SALT);
        let intermediate: Vec<u8> = fill.iter().copied().cycle().take(336).collect();
        let base_hash = md5(&[&intermediate])[..5].to_vec();
        let fixture = Self {
            header: Vec::new(),
            base_hash,
        };

        let verifier = *b"binary-rc4-verif";
        let mut stream = verifier.to_vec();
        stream.extend_from_slice(&md5(&[&verifier]));
        rc4(&fixture.key(&0u32.to_le_bytes()), &mut stream);

        let mut info = Vec::new();
        push_u16(&mut info, 1);
        push_u16(&mut info, 1);
        info.extend_from_slice(&Self::SALT);
        info.extend_from_slice(&stream);

        Self {
            header: office_header(&info),
            ..fixture
        }
    }

    fn key(&self, block: &[u8]) -> Vec<u8> {
        md5(&[&self.base_hash, block])
    }

    pub fn encrypt_page(&self, page: u32, plain: &[u8]) -> Vec<u8> {
        let mut out = plain.to_vec();
        rc4(&self.key(&page_block(page)), &mut out);
        out
    }
}

// ---------------------------------------------------------------------------------------------
// Office Agile (AES-256-CBC, SHA-512)
// ---------------------------------------------------------------------------------------------

pub struct AgileFixture {
    pub header: Vec<u8>,
}

impl AgileFixture {
    const PASSWORD_SALT: [u8; 16] = [
        0x1F, 0x94, 0x2D, 0x6A, 0xB0, 0x03, 0x7E, 0xC5, 0x58, 0xE9, 0x21, 0x4D, 0x86, 0xFA, 0x37,
        0x0B,
    ];
    const KEY_DATA_SALT: [u8; 16] = [
        0xA4, 0x6C, 0x19, 0xF3, 0x52, 0x8E, 0xD7, 0x30, 0x0A, 0xBB, 0x65, 0x4F, 0xC9, 0x12, 0x7D,
        0xE6,
    ];
    const KEY_VALUE: [u8; 32] = [
        0x60, 0x3D, 0xEB, 0x10, 0x15, 0xCA, 0x71, 0xBE, 0x2B, 0x73, 0xAE, 0xF0, 0x85, 0x7D, 0x77,
        0x81, 0x1F, 0x35, 0x2C, 0x07, 0x3B, 0x61, 0x08, 0xD7, 0x2D, 0x98, 0x10, 0xA3, 0x09, 0x14,
        0xDF, 0xF4,
    ];
    const VERIFIER_INPUT_BLOCK: [u8; 8] = [0xfe, 0xa7, 0xd2, 0x76, 0x3b, 0x4b, 0x9e, 0x79];
    const VERIFIER_VALUE_BLOCK: [u8; 8] = [0xd7, 0xaa, 0x0f, 0x6d, 0x30, 0x61, 0x34, 0x4e];
    const KEY_VALUE_BLOCK: [u8; 8] = [0x14, 0x6e, 0x0b, 0xe7, 0xab, 0xac, 0xd0, 0xd6];

    pub fn new(password: &str, spin_count: u32) -> Self {
        let mut h = sha512(&[&Self::PASSWORD_SALT, &utf16le(password)]);
        for i in 0..spin_count {
            h = sha512(&[&i.to_le_bytes(), &h]);
        }
        let verifier = *b"agile-verifier-i";
        let verifier_hash = fixed(sha512(&[&verifier]), 64, 0);
        let input = Self::wrap(&h, &Self::VERIFIER_INPUT_BLOCK, &verifier);
        let value = Self::wrap(&h, &Self::VERIFIER_VALUE_BLOCK, &verifier_hash);
        let key = Self::wrap(&h, &Self::KEY_VALUE_BLOCK, &Self::KEY_VALUE);

        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<encryption xmlns="http://schemas.microsoft.com/office/2006/encryption" xmlns:p="http://schemas.microsoft.com/office/2006/keyEncryptor/password">
<keyData saltSize="16" blockSize="16" keyBits="256" hashSize="64" cipherAlgorithm="AES" cipherChaining="ChainingModeCBC" hashAlgorithm="SHA512" saltValue="{kd_salt}"/>
<keyEncryptors><keyEncryptor uri="http://schemas.microsoft.com/office/2006/keyEncryptor/password"><p:encryptedKey spinCount="{spin_count}" saltSize="16" blockSize="16" keyBits="256" hashSize="64" cipherAlgorithm="AES" cipherChaining="ChainingModeCBC" hashAlgorithm="SHA512" saltValue="{pwd_salt}" encryptedVerifierHashInput="{input}" encryptedVerifierHashValue="{value}" encryptedKeyValue="{key}"/></keyEncryptor></keyEncryptors>
</encryption>"#,
            kd_salt = STANDARD.encode(Self::KEY_DATA_SALT),
            pwd_salt = STANDARD.encode(Self::PASSWORD_SALT),
        );

        let mut info = Vec::new();
        push_u16(&mut info, 4);
        push_u16(&mut info, 4);
        push_u32(&mut info, 0x40);
        info.extend_from_slice(xml.as_bytes());

        Self {
            header: office_header(&info),
        }
    }

    /// Encrypt `plain` under the password-derived key for `block`, base64 encoded.
    fn wrap(iterated_hash: &[u8], block: &[u8], plain: &[u8]) -> String {
        let key = fixed(sha512(&[iterated_hash, block]), 32, 0x36);
        let mut out = plain.to_vec();
        aes256_cbc_encrypt(&key, &Self::PASSWORD_SALT, &mut out);
        STANDARD.encode(out)
    }

    pub fn encrypt_page(&self, page: u32, plain: &[u8]) -> Vec<u8> {
        let iv = sha512(&[&Self::KEY_DATA_SALT, &page_block(page)])[..16].to_vec();
        let mut out = plain.to_vec();
        aes256_cbc_encrypt(&Self::KEY_VALUE, &iv, &mut out);
        out
    }
}

// ---------------------------------------------------------------------------------------------
// MSISAM
// ---------------------------------------------------------------------------------------------

pub struct MsisamFixture {
    pub header: Vec<u8>,
    page_key_base: Vec<u8>,
}

impl MsisamFixture {
    const SALT: [u8; 8] = [0x07, 0x21, 0x42, 0x63, 0x84, 0xA5, 0xC6, 0xE7];

    /// A modern (password digest) MSISAM header; `use_sha1` selects SHA-1 over MD5.
    pub fn new(password: &str, use_sha1: bool) -> Self {
        let mut field = [0u8; 0x28];
        let encoded = utf16le(&password.to_uppercase());
        let n = encoded.len().min(field.len());
        field[..n].copy_from_slice(&encoded[..n]);
        let mut digest = if use_sha1 {
            sha1(&[&field])
        } else {
            md5(&[&field])
        };
        digest.truncate(16);

        let mut rc4_key = digest.clone();
        rc4_key.extend_from_slice(&Self::SALT);
        let mut check = Self::SALT[..4].to_vec();
        rc4(&rc4_key, &mut check);

        let mut header = vec![0u8; PAGE_SIZE];
        header[0x298] = 0x06 | if use_sha1 { 0x20 } else { 0 };
        header[0x72..0x7A].copy_from_slice(&Self::SALT);
        let check_offset = 0x2E9 + usize::from(Self::SALT[0]);
        header[check_offset..check_offset + 4].copy_from_slice(&check);

        let mut page_key_base = digest;
        page_key_base.extend_from_slice(&Self::SALT[..4]);
        Self {
            header,
            page_key_base,
        }
    }

    pub fn encrypt_page(&self, page: u32, plain: &[u8]) -> Vec<u8> {
        let mut key = self.page_key_base.clone();
        for (dst, src) in key[16..20].iter_mut().zip(page.to_le_bytes()) {
            *dst ^= src;
        }
        let mut out = plain.to_vec();
        rc4(&key, &mut out);
        out
    }
}

/// An old-style MSISAM header: no password digest, the page key comes from header bytes.
pub fn old_msisam_header() -> Vec<u8> {
    let mut header = vec![0u8; PAGE_SIZE];
    header[0x04..0x13].copy_from_slice(b"MSISAM Database");
    header[0x72..0x7A].copy_from_slice(&39_000.5f64.to_bits().to_le_bytes());
    for (i, b) in header[0x42..0x92].iter_mut().enumerate() {
        *b = (i as u8).wrapping_mul(37) ^ 0x5A;
    }
    header
}

// ---------------------------------------------------------------------------------------------
// Data pages
// ---------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: u32,
    pub col1: String,
    pub col2: i32,
}

pub fn sample_rows() -> Vec<Row> {
    vec![
        Row {
            id: 1,
            col1: "hello".to_string(),
            col2: 0,
        },
        Row {
            id: 2,
            col1: "world".to_string(),
            col2: 42,
        },
    ]
}

const DATA_PAGE_TYPE: u8 = 0x01;

/// A minimal data page: type byte, row count, then `id, text length, UTF-16LE text, value` per
/// row. The rest of the page is filler so block ciphers see a full page.
pub fn data_page(rows: &[Row]) -> Vec<u8> {
    let mut page = Vec::with_capacity(PAGE_SIZE);
    page.push(DATA_PAGE_TYPE);
    page.push(0);
    push_u16(&mut page, rows.len() as u16);
    for row in rows {
        push_u32(&mut page, row.id);
        let text = utf16le(&row.col1);
        push_u16(&mut page, text.len() as u16);
        page.extend_from_slice(&text);
        page.extend_from_slice(&row.col2.to_le_bytes());
    }
    let mut filler = 0u8;
    while page.len() < PAGE_SIZE {
        page.push(filler);
        filler = filler.wrapping_add(7);
    }
    page
}

pub fn parse_rows(page: &[u8]) -> Vec<Row> {
    assert_eq!(page[0], DATA_PAGE_TYPE, "not a data page");
    let count = u16::from_le_bytes([page[2], page[3]]) as usize;
    let mut pos = 4;
    let mut rows = Vec::with_capacity(count);
    for _ in 0..count {
        let id = u32::from_le_bytes(page[pos..pos + 4].try_into().expect("id"));
        let len = u16::from_le_bytes([page[pos + 4], page[pos + 5]]) as usize;
        pos += 6;
        let units: Vec<u16> = page[pos..pos + len]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        pos += len;
        let col2 = i32::from_le_bytes(page[pos..pos + 4].try_into().expect("col2"));
        pos += 4;
        rows.push(Row {
            id,
            col1: String::from_utf16(&units).expect("utf-16 text"),
            col2,
        });
    }
    rows
}
