//! Legacy Jet (Access 97/2000-2003) page obfuscation.
//!
//! Every page except the header is RC4'd with the 4-byte header key XORed with the page number.
//! No password is involved; the database password is a separate access check the host performs.

use crate::codec::{
    CipherParams, CodecHandler, PageCodec, PageKeys, PageTransform, Scheme, JET_MAX_ENCODED_PAGE,
};
use crate::error::Result;
use crate::format::FormatConstants;
use crate::util::{apply_page_number, header_bytes, is_blank_key};

pub(crate) const ENCODING_KEY_LENGTH: usize = 4;

pub(crate) struct JetKeys {
    encoding_key: Vec<u8>,
}

impl JetKeys {
    pub(crate) fn new(encoding_key: Vec<u8>) -> Self {
        Self { encoding_key }
    }

    pub(crate) fn cipher_params(&self, page: u32) -> CipherParams {
        CipherParams::key(apply_page_number(&self.encoding_key, 0, page))
    }
}

/// RC4 page codec over an arbitrary 4-byte key, shared with old-style MSISAM files.
pub(crate) fn handler(
    scheme: Scheme,
    encoding_key: Vec<u8>,
    max_encoded_page: u32,
) -> CodecHandler {
    CodecHandler::encoded(PageCodec::new(
        scheme,
        PageKeys::Jet(JetKeys::new(encoding_key)),
        PageTransform::Stream,
        max_encoded_page,
    ))
}

pub(crate) fn create(header: &[u8], format: &FormatConstants) -> Result<CodecHandler> {
    let encoding_key = header_bytes(
        header,
        format.offset_encoding_key,
        ENCODING_KEY_LENGTH,
        "Jet encoding key",
    )?;
    if is_blank_key(encoding_key) {
        log::debug!("Jet header carries a blank encoding key; pages are not encoded");
        return Ok(CodecHandler::plain());
    }
    Ok(handler(Scheme::Jet, encoding_key.to_vec(), JET_MAX_ENCODED_PAGE))
}
