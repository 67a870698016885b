//! Page-level decryption and encryption for encrypted Access-family database files.
//!
//! The header page (page 0) of a Jet, MSISAM or ACCDB file records how the remaining pages are
//! protected. [`create`] inspects it once per open database and returns a [`CodecHandler`] that
//! the host's page channel calls for every page it reads or writes:
//!
//! - legacy Jet (Access 97/2000-2003): RC4 keyed by the header key and page number;
//! - MSISAM (Microsoft Money): RC4 keyed by a password digest, or a header-only key for old files;
//! - Office (Access 2007+): [MS-OFFCRYPTO] Standard, RC4 CryptoAPI, binary RC4 and Agile
//!   encryption, plus the zero-iteration Standard variant some Access builds write.
//!
//! Key material is derived and verified while the handler is built; a wrong password is
//! reported as [`CryptCodecError::InvalidPassword`] by [`create`] and never surfaces later.

mod block;
mod codec;
mod error;
mod format;
mod hash;
mod jet;
mod key_cache;
mod msisam;
mod office;
mod password;
mod provider;
mod rc4;
mod util;

#[cfg(test)]
mod fuzz_tests;

pub use crate::block::{BlockCipherSpec, CipherAlgorithm, CipherChaining};
pub use crate::codec::{CodecHandler, Scheme};
pub use crate::error::{CryptCodecError, ErrorKind, Result};
pub use crate::format::{CodecType, FormatConstants, TextEncoding};
pub use crate::hash::HashAlgorithm;
pub use crate::password::PasswordSource;
pub use crate::provider::{create, create_with_options, DecryptOptions, DEFAULT_MAX_SPIN_COUNT};
