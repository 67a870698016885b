#![no_main]

use formula_access_crypto::{create_with_options, DecryptOptions, FormatConstants, PasswordSource};
use libfuzzer_sys::fuzz_target;

/// Large enough for every preset's header page.
const MAX_HEADER_BYTES: usize = 4096;

/// Hostile spin counts would otherwise dominate the run time.
const OPTIONS: DecryptOptions = DecryptOptions { max_spin_count: 64 };

fuzz_target!(|data: &[u8]| {
    let Some((&selector, header)) = data.split_first() else {
        return;
    };
    let header = &header[..header.len().min(MAX_HEADER_BYTES)];

    let format = match selector % 4 {
        0 => FormatConstants::jet3(),
        1 => FormatConstants::jet4(),
        2 => FormatConstants::msisam(),
        _ => FormatConstants::accdb(),
    };

    let Ok(mut handler) =
        create_with_options(&mut PasswordSource::new("pw"), header, &format, &OPTIONS)
    else {
        return;
    };

    // Exercise the page paths with a page built from the header bytes.
    let mut page = header.to_vec();
    page.truncate(page.len() - page.len() % 16);
    let _ = handler.decode_page(&mut page, 1);
    let _ = handler.encode_page(&page, 2, 0);
});
