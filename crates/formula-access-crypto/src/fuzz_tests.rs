#![allow(unexpected_cfgs)]

use proptest::prelude::*;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::format::FormatConstants;
use crate::password::PasswordSource;
use crate::provider::{create_with_options, DecryptOptions};

#[cfg(fuzzing)]
const CASES: u32 = 256;
#[cfg(not(fuzzing))]
const CASES: u32 = 32;

const CRYPT_STRUCTURE_OFFSET: usize = 0x299;

/// Keep hostile headers from spending the test budget on key stretching.
const OPTIONS: DecryptOptions = DecryptOptions { max_spin_count: 16 };

fn office_header(info: &[u8]) -> Vec<u8> {
    let mut header = vec![0u8; 4096];
    header[0x3E..0x42].copy_from_slice(&[0x5E, 0x11, 0x22, 0x33]);
    let len = info.len().min(4096 - CRYPT_STRUCTURE_OFFSET - 2);
    header[CRYPT_STRUCTURE_OFFSET..CRYPT_STRUCTURE_OFFSET + 2]
        .copy_from_slice(&(len as i16).to_le_bytes());
    header[CRYPT_STRUCTURE_OFFSET + 2..CRYPT_STRUCTURE_OFFSET + 2 + len]
        .copy_from_slice(&info[..len]);
    header
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: CASES,
        max_shrink_iters: 0,
        .. ProptestConfig::default()
    })]

    #[test]
    fn create_is_panic_free_on_arbitrary_headers(
        header in prop::collection::vec(any::<u8>(), 0..=4096),
        which in 0usize..4,
    ) {
        let format = match which {
            0 => FormatConstants::jet3(),
            1 => FormatConstants::jet4(),
            2 => FormatConstants::msisam(),
            _ => FormatConstants::accdb(),
        };
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            create_with_options(&mut PasswordSource::new("pw"), &header, &format, &OPTIONS)
                .map(|_| ())
        }));
        prop_assert!(outcome.is_ok(), "create panicked");
    }

    #[test]
    fn office_providers_are_panic_free_and_reject_garbage(
        version in prop::sample::select(vec![(1u16, 1u16), (2, 2), (3, 2), (4, 2), (4, 4)]),
        flags in prop::sample::select(vec![0x04u32, 0x24, 0x10, 0x00]),
        tail in prop::collection::vec(any::<u8>(), 0..=1024),
    ) {
        let mut info = Vec::with_capacity(8 + tail.len());
        info.extend_from_slice(&version.0.to_le_bytes());
        info.extend_from_slice(&version.1.to_le_bytes());
        if version.1 == 2 {
            info.extend_from_slice(&flags.to_le_bytes());
        } else if version == (4, 4) {
            info.extend_from_slice(&0x40u32.to_le_bytes());
        }
        info.extend_from_slice(&tail);
        let header = office_header(&info);

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            create_with_options(
                &mut PasswordSource::new("pw"),
                &header,
                &FormatConstants::accdb(),
                &OPTIONS,
            )
            .map(|_| ())
        }));
        prop_assert!(outcome.is_ok(), "create panicked");
        // Random bytes never carry a verifier that matches the password.
        prop_assert!(outcome.unwrap().is_err(), "garbage provider data should not verify");
    }

    #[test]
    fn descriptor_parser_is_panic_free(
        xml in "<encryption( xmlns=\"http://schemas.microsoft.com/office/2006/encryption\")?>(<keyData[ a-zA-Z=\"0-9]{0,40}/>)?(<keyEncryptors>(<keyEncryptor uri=\"[a-z:/.]{0,20}\"/>)?</keyEncryptors>)?</encryption>",
    ) {
        let outcome =
            catch_unwind(AssertUnwindSafe(|| crate::office::descriptor::parse(xml.as_bytes())));
        prop_assert!(outcome.is_ok(), "descriptor parse panicked");
    }
}
