#![no_main]

use formula_access_crypto::{create_with_options, DecryptOptions, FormatConstants, PasswordSource};
use libfuzzer_sys::fuzz_target;

const CRYPT_STRUCTURE_OFFSET: usize = 0x299;
const PAGE_SIZE: usize = 4096;
/// Room left in the header page after the version, reserved value and length fields.
const MAX_XML_BYTES: usize = PAGE_SIZE - CRYPT_STRUCTURE_OFFSET - 2 - 8;

const OPTIONS: DecryptOptions = DecryptOptions { max_spin_count: 64 };

fuzz_target!(|data: &[u8]| {
    let xml = &data[..data.len().min(MAX_XML_BYTES)];

    let mut info = Vec::with_capacity(8 + xml.len());
    info.extend_from_slice(&4u16.to_le_bytes());
    info.extend_from_slice(&4u16.to_le_bytes());
    info.extend_from_slice(&0x40u32.to_le_bytes());
    info.extend_from_slice(xml);

    let mut header = vec![0u8; PAGE_SIZE];
    header[0x3E..0x42].copy_from_slice(&[0x5E, 0x11, 0x22, 0x33]);
    header[CRYPT_STRUCTURE_OFFSET..CRYPT_STRUCTURE_OFFSET + 2]
        .copy_from_slice(&(info.len() as i16).to_le_bytes());
    header[CRYPT_STRUCTURE_OFFSET + 2..CRYPT_STRUCTURE_OFFSET + 2 + info.len()]
        .copy_from_slice(&info);

    let _ = create_with_options(
        &mut PasswordSource::new("pw"),
        &header,
        &FormatConstants::accdb(),
        &OPTIONS,
    );
});
