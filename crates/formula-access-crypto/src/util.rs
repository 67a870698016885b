use subtle::ConstantTimeEq;

use crate::error::{CryptCodecError, Result};

/// Little-endian cursor over a header buffer.
pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn set_position(&mut self, pos: usize) -> Result<()> {
        if pos > self.bytes.len() {
            return Err(CryptCodecError::InvalidFormat(format!(
                "position {pos} is past the end of a {}-byte buffer",
                self.bytes.len()
            )));
        }
        self.pos = pos;
        Ok(())
    }

    pub(crate) fn remaining(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }

    pub(crate) fn take(&mut self, n: usize, context: &'static str) -> Result<&'a [u8]> {
        let end = self.pos.saturating_add(n);
        if end > self.bytes.len() {
            return Err(CryptCodecError::truncated(context));
        }
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub(crate) fn read_u16_le(&mut self, context: &'static str) -> Result<u16> {
        let b = self.take(2, context)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub(crate) fn read_u32_le(&mut self, context: &'static str) -> Result<u32> {
        let b = self.take(4, context)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Copy `len` bytes starting at `offset`, failing if the header page is too short.
pub(crate) fn header_bytes<'a>(
    header: &'a [u8],
    offset: usize,
    len: usize,
    context: &'static str,
) -> Result<&'a [u8]> {
    header
        .get(offset..offset.saturating_add(len))
        .ok_or_else(|| CryptCodecError::truncated(context))
}

pub(crate) fn header_u8(header: &[u8], offset: usize, context: &'static str) -> Result<u8> {
    header
        .get(offset)
        .copied()
        .ok_or_else(|| CryptCodecError::truncated(context))
}

/// Truncate `bytes` to `len`, or extend it with `pad`.
pub(crate) fn fix_to_length(mut bytes: Vec<u8>, len: usize, pad: u8) -> Vec<u8> {
    bytes.resize(len, pad);
    bytes
}

/// Return a copy of `key` whose 4 bytes at `offset` are XORed with the little-endian page number.
///
/// Keys shorter than `offset + 4` are extended with zeros first, so the page number always
/// lands in full.
pub(crate) fn apply_page_number(key: &[u8], offset: usize, page_number: u32) -> Vec<u8> {
    let mut out = key.to_vec();
    if out.len() < offset + 4 {
        out.resize(offset + 4, 0);
    }
    for (dst, src) in out[offset..offset + 4]
        .iter_mut()
        .zip(page_number.to_le_bytes())
    {
        *dst ^= src;
    }
    out
}

pub(crate) fn is_blank_key(key: &[u8]) -> bool {
    key.iter().all(|b| *b == 0)
}

pub(crate) fn password_to_utf16le_bytes(password: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(password.len() * 2);
    for unit in password.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}

pub(crate) fn concat(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    out.extend_from_slice(a);
    out.extend_from_slice(b);
    out
}

/// Constant-time equality for verifier comparisons. Length mismatches compare unequal.
pub(crate) fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    bool::from(a.ct_eq(b))
}
