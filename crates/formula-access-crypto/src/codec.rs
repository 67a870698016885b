//! The per-session page codec returned by [`crate::create`].

use std::fmt;

use zeroize::Zeroizing;

use crate::block::BlockCipherSpec;
use crate::error::{CryptCodecError, Result};
use crate::jet::JetKeys;
use crate::key_cache::KeyCache;
use crate::msisam::MsisamKeys;
use crate::office::agile::AgileKeys;
use crate::office::binary_rc4::BinaryRc4Keys;
use crate::office::rc4_cryptoapi::Rc4CryptoApiKeys;
use crate::office::standard::StandardKeys;
use crate::rc4::Rc4;

/// Highest page number a Jet file encodes (pages are addressed with a signed 32-bit index).
pub(crate) const JET_MAX_ENCODED_PAGE: u32 = i32::MAX as u32;
/// MSISAM only encodes its first 15 pages.
pub(crate) const MSISAM_MAX_ENCODED_PAGE: u32 = 0x0E;
pub(crate) const OFFICE_MAX_ENCODED_PAGE: u32 = u32::MAX;

/// Which historical scheme protects the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// Pages are stored as-is.
    Plain,
    /// Access 97/2000-2003 RC4 with a 4-byte header key.
    Jet,
    /// MSISAM with a password digest (SHA-1 or MD5) and salt.
    MsisamModern,
    /// MSISAM with a key derived from header bytes only.
    MsisamOld,
    /// ECMA-376 Standard encryption (AES-ECB, 50,000 SHA-1 rounds).
    OfficeStandard,
    /// ECMA-376 Standard layout without the key-stretching rounds.
    OfficeNonStandard,
    OfficeRc4CryptoApi,
    OfficeBinaryRc4,
    OfficeAgile,
}

/// Key and optional IV for transforming a single page.
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct CipherParams {
    pub(crate) key: Zeroizing<Vec<u8>>,
    pub(crate) iv: Option<Vec<u8>>,
}

impl CipherParams {
    pub(crate) fn key(key: Vec<u8>) -> Self {
        Self {
            key: Zeroizing::new(key),
            iv: None,
        }
    }

    pub(crate) fn key_iv(key: Vec<u8>, iv: Vec<u8>) -> Self {
        Self {
            key: Zeroizing::new(key),
            iv: Some(iv),
        }
    }
}

impl fmt::Debug for CipherParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherParams")
            .field("key_len", &self.key.len())
            .field("iv_len", &self.iv.as_ref().map(Vec::len))
            .finish()
    }
}

/// Verified key material for each scheme.
pub(crate) enum PageKeys {
    Jet(JetKeys),
    Msisam(MsisamKeys),
    Standard(StandardKeys),
    Rc4CryptoApi(Rc4CryptoApiKeys),
    BinaryRc4(BinaryRc4Keys),
    Agile(AgileKeys),
}

impl PageKeys {
    pub(crate) fn cipher_params(&self, page: u32) -> CipherParams {
        match self {
            PageKeys::Jet(keys) => keys.cipher_params(page),
            PageKeys::Msisam(keys) => keys.cipher_params(page),
            PageKeys::Standard(keys) => keys.cipher_params(page),
            PageKeys::Rc4CryptoApi(keys) => keys.cipher_params(page),
            PageKeys::BinaryRc4(keys) => keys.cipher_params(page),
            PageKeys::Agile(keys) => keys.cipher_params(page),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PageTransform {
    /// RC4 keystream from page offset 0.
    Stream,
    /// Whole-page block transform without padding.
    Block(BlockCipherSpec),
}

pub(crate) struct PageCodec {
    scheme: Scheme,
    keys: PageKeys,
    transform: PageTransform,
    max_encoded_page: u32,
    cache: KeyCache<CipherParams>,
    temp: Vec<u8>,
}

impl PageCodec {
    pub(crate) fn new(
        scheme: Scheme,
        keys: PageKeys,
        transform: PageTransform,
        max_encoded_page: u32,
    ) -> Self {
        Self {
            scheme,
            keys,
            transform,
            max_encoded_page,
            cache: KeyCache::new(),
            temp: Vec::new(),
        }
    }

    fn is_encoded_page(&self, page: u32) -> bool {
        page > 0 && page <= self.max_encoded_page
    }

    /// Transform `buf` in place. Stream ciphers are symmetric; block ciphers need the direction.
    fn apply(&mut self, buf: &mut [u8], page: u32, encrypt: bool) -> Result<()> {
        let keys = &self.keys;
        let params = self
            .cache
            .get_or_compute(page, || keys.cipher_params(page));
        match self.transform {
            PageTransform::Stream => {
                Rc4::new(&params.key).apply_keystream(buf);
                Ok(())
            }
            PageTransform::Block(spec) => {
                let iv = params.iv.as_deref();
                if encrypt {
                    spec.encrypt(&params.key, iv, buf)
                } else {
                    spec.decrypt(&params.key, iv, buf)
                }
            }
        }
    }
}

enum Handler {
    Plain,
    Encoded(Box<PageCodec>),
}

/// Page encoder/decoder for one open database.
///
/// Created once per session by [`crate::create`]. Page 0 (the header) is never encoded, and each
/// scheme leaves pages past its own limit untouched. Every method that transforms a page takes
/// `&mut self`: the handler owns a small key cache and a scratch buffer, so concurrent use needs
/// external serialisation.
pub struct CodecHandler {
    handler: Handler,
}

impl CodecHandler {
    /// Handler for unencrypted files.
    pub fn plain() -> Self {
        Self {
            handler: Handler::Plain,
        }
    }

    pub(crate) fn encoded(codec: PageCodec) -> Self {
        log::debug!("using {:?} page codec", codec.scheme);
        Self {
            handler: Handler::Encoded(Box::new(codec)),
        }
    }

    pub fn scheme(&self) -> Scheme {
        match &self.handler {
            Handler::Plain => Scheme::Plain,
            Handler::Encoded(codec) => codec.scheme,
        }
    }

    /// Whether the bytes of `page` are stored encoded on disk.
    pub fn is_encoded_page(&self, page: u32) -> bool {
        match &self.handler {
            Handler::Plain => false,
            Handler::Encoded(codec) => codec.is_encoded_page(page),
        }
    }

    /// True when a write of part of a page can be encoded (stream ciphers).
    pub fn can_encode_partial_page(&self) -> bool {
        self.is_stream()
    }

    /// True when [`CodecHandler::decode_page`] can decode directly in the read buffer. Block
    /// schemes prefer [`CodecHandler::decode_page_into`] with a separate output buffer.
    pub fn can_decode_inline(&self) -> bool {
        self.is_stream()
    }

    fn is_stream(&self) -> bool {
        match &self.handler {
            Handler::Plain => true,
            Handler::Encoded(codec) => codec.transform == PageTransform::Stream,
        }
    }

    /// Decode `page` (the full page as read from disk) in place.
    pub fn decode_page(&mut self, page: &mut [u8], page_number: u32) -> Result<()> {
        match &mut self.handler {
            Handler::Encoded(codec) if codec.is_encoded_page(page_number) => {
                codec.apply(page, page_number, false)
            }
            _ => Ok(()),
        }
    }

    /// Decode `input` into the first `input.len()` bytes of `output`.
    ///
    /// Pages that are not encoded are copied unchanged.
    pub fn decode_page_into(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        page_number: u32,
    ) -> Result<()> {
        let output_len = output.len();
        let out = output.get_mut(..input.len()).ok_or_else(|| {
            CryptCodecError::InvalidFormat(format!(
                "output buffer of {output_len} bytes cannot hold a {}-byte page",
                input.len()
            ))
        })?;
        out.copy_from_slice(input);
        self.decode_page(out, page_number)
    }

    /// Encode the page bytes in `page` for writing.
    ///
    /// `page` always starts at page offset 0 (stream ciphers must line the keystream up with
    /// the page start); a partial write simply supplies a shorter prefix. `page_offset` is the
    /// offset of the first modified byte and is accepted for callers that track it.
    ///
    /// Returns `page` itself when the page is not encoded, otherwise a view of the handler's
    /// scratch buffer that stays valid until the next call.
    pub fn encode_page<'a>(
        &'a mut self,
        page: &'a [u8],
        page_number: u32,
        page_offset: usize,
    ) -> Result<&'a [u8]> {
        let codec = match &mut self.handler {
            Handler::Encoded(codec) if codec.is_encoded_page(page_number) => codec,
            _ => return Ok(page),
        };
        if page_offset > page.len() {
            return Err(CryptCodecError::InvalidFormat(format!(
                "page offset {page_offset} is past the end of a {}-byte page",
                page.len()
            )));
        }

        let mut temp = std::mem::take(&mut codec.temp);
        temp.clear();
        temp.extend_from_slice(page);
        let result = codec.apply(&mut temp, page_number, true);
        codec.temp = temp;
        result?;
        Ok(&codec.temp)
    }
}

impl Default for CodecHandler {
    fn default() -> Self {
        Self::plain()
    }
}

impl fmt::Debug for CodecHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecHandler")
            .field("scheme", &self.scheme())
            .finish_non_exhaustive()
    }
}
