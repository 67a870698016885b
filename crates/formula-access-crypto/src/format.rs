//! Header layout constants for the database formats that carry an encoding key.

/// Which family of codec protects a file of this format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecType {
    None,
    Jet,
    Msisam,
    Office,
}

/// How header text (the legacy password field, MSISAM passwords) is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// One byte per character (Jet 3). Characters outside Latin-1 become `?`.
    SingleByte,
    Utf16Le,
}

impl TextEncoding {
    pub(crate) fn encode(self, text: &str) -> Vec<u8> {
        match self {
            TextEncoding::SingleByte => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
            TextEncoding::Utf16Le => crate::util::password_to_utf16le_bytes(text),
        }
    }
}

/// Header offsets and sizes the codecs read from page 0.
///
/// The presets cover the formats that exist in the wild; the fields are public so hosts with
/// their own format tables can fill them in directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatConstants {
    pub codec_type: CodecType,
    pub page_size: usize,
    pub offset_encoding_key: usize,
    pub offset_password: usize,
    /// Length of the legacy password field in characters.
    pub size_password: usize,
    /// Offset of the creation date used to mask the legacy password field, if the format masks it.
    pub offset_header_date: Option<usize>,
    pub offset_engine_name: usize,
    pub length_engine_name: usize,
    pub text_encoding: TextEncoding,
}

impl FormatConstants {
    /// Access 97.
    pub fn jet3() -> Self {
        Self {
            codec_type: CodecType::Jet,
            page_size: 2048,
            offset_encoding_key: 0x3E,
            offset_password: 0x42,
            size_password: 20,
            offset_header_date: None,
            offset_engine_name: 0x04,
            length_engine_name: 0x0F,
            text_encoding: TextEncoding::SingleByte,
        }
    }

    /// Access 2000-2003.
    pub fn jet4() -> Self {
        Self {
            codec_type: CodecType::Jet,
            page_size: 4096,
            offset_encoding_key: 0x3E,
            offset_password: 0x42,
            size_password: 40,
            offset_header_date: Some(0x72),
            offset_engine_name: 0x04,
            length_engine_name: 0x0F,
            text_encoding: TextEncoding::Utf16Le,
        }
    }

    /// Microsoft Money (MSISAM) files.
    pub fn msisam() -> Self {
        Self {
            codec_type: CodecType::Msisam,
            ..Self::jet4()
        }
    }

    /// Access 2007+ (ACCDB).
    pub fn accdb() -> Self {
        Self {
            codec_type: CodecType::Office,
            ..Self::jet4()
        }
    }

    /// A format whose pages are never encoded.
    pub fn unencrypted(page_size: usize) -> Self {
        Self {
            codec_type: CodecType::None,
            page_size,
            ..Self::jet4()
        }
    }
}
