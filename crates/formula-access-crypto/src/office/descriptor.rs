//! Agile `<encryption>` descriptor XML ([MS-OFFCRYPTO] 2.3.4.10).
//!
//! Only the shape the page codec needs is kept: `keyData`, the optional `dataIntegrity` and each
//! `keyEncryptor` with its `encryptedKey`. Elements are matched by namespace URI, so any prefix
//! choice (or a default namespace) is accepted.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use quick_xml::events::{BytesStart, Event as XmlEvent};
use quick_xml::Reader as XmlReader;

use crate::error::{CryptCodecError, Result};

pub(crate) const ENCRYPTION_NS: &str = "http://schemas.microsoft.com/office/2006/encryption";
pub(crate) const PASSWORD_KEY_ENCRYPTOR_NS: &str =
    "http://schemas.microsoft.com/office/2006/keyEncryptor/password";
pub(crate) const CERTIFICATE_KEY_ENCRYPTOR_NS: &str =
    "http://schemas.microsoft.com/office/2006/keyEncryptor/certificate";

/// Cipher parameters shared by `keyData` and the password `encryptedKey`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CipherDescriptor {
    pub(crate) salt_size: u32,
    pub(crate) block_size: u32,
    pub(crate) key_bits: u32,
    pub(crate) hash_size: u32,
    pub(crate) cipher_algorithm: String,
    pub(crate) cipher_chaining: String,
    pub(crate) hash_algorithm: String,
    pub(crate) salt_value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DataIntegrity {
    #[allow(dead_code)]
    pub(crate) encrypted_hmac_key: Vec<u8>,
    #[allow(dead_code)]
    pub(crate) encrypted_hmac_value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PasswordKeyEncryptor {
    pub(crate) cipher: CipherDescriptor,
    pub(crate) spin_count: u32,
    pub(crate) encrypted_verifier_hash_input: Vec<u8>,
    pub(crate) encrypted_verifier_hash_value: Vec<u8>,
    pub(crate) encrypted_key_value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CertificateKeyEncryptor {
    #[allow(dead_code)]
    pub(crate) encrypted_key_value: Vec<u8>,
    #[allow(dead_code)]
    pub(crate) x509_certificate: Vec<u8>,
    #[allow(dead_code)]
    pub(crate) cert_verifier: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum KeyEncryptor {
    Password(PasswordKeyEncryptor),
    Certificate(CertificateKeyEncryptor),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EncryptionDescriptor {
    pub(crate) key_data: CipherDescriptor,
    pub(crate) data_integrity: Option<DataIntegrity>,
    pub(crate) key_encryptors: Vec<KeyEncryptor>,
}

/// Attribute values of one element, keyed by local name.
#[derive(Debug)]
struct Attrs {
    element: &'static str,
    values: Vec<(Vec<u8>, String)>,
}

impl Attrs {
    fn collect(element: &'static str, e: &BytesStart<'_>) -> Result<Self> {
        let mut values = Vec::new();
        for attr in e.attributes().with_checks(false) {
            let attr = attr.map_err(|err| {
                CryptCodecError::InvalidFormat(format!(
                    "invalid XML attribute on <{element}>: {err}"
                ))
            })?;
            let key = attr.key.as_ref();
            if key == b"xmlns" || key.starts_with(b"xmlns:") {
                continue;
            }
            let value = std::str::from_utf8(attr.value.as_ref()).map_err(|_| {
                CryptCodecError::InvalidFormat(format!(
                    "attribute on <{element}> is not valid UTF-8"
                ))
            })?;
            values.push((attr.key.local_name().as_ref().to_vec(), value.to_string()));
        }
        Ok(Self { element, values })
    }

    /// Trimmed value; empty counts as missing.
    fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k.as_slice() == name.as_bytes())
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, name: &str) -> Result<String> {
        self.get(name).map(str::to_string).ok_or_else(|| {
            CryptCodecError::InvalidCryptoConfiguration(format!(
                "could not find xml config {name} under {}",
                self.element
            ))
        })
    }

    fn number(&self, name: &str) -> Result<u32> {
        let value = self.string(name)?;
        value.parse::<u32>().map_err(|_| {
            CryptCodecError::InvalidCryptoConfiguration(format!(
                "{}.{name} is not a valid number: {value:?}",
                self.element
            ))
        })
    }

    fn base64(&self, name: &str) -> Result<Vec<u8>> {
        // Wrapped values carry whitespace; some producers drop the `=` padding.
        let compact: String = self
            .string(name)?
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        STANDARD
            .decode(&compact)
            .or_else(|_| STANDARD_NO_PAD.decode(&compact))
            .map_err(|_| {
                CryptCodecError::InvalidCryptoConfiguration(format!(
                    "{}.{name} is not valid base64",
                    self.element
                ))
            })
    }

    fn cipher_descriptor(&self) -> Result<CipherDescriptor> {
        let desc = CipherDescriptor {
            salt_size: self.number("saltSize")?,
            block_size: self.number("blockSize")?,
            key_bits: self.number("keyBits")?,
            hash_size: self.number("hashSize")?,
            cipher_algorithm: self.string("cipherAlgorithm")?,
            cipher_chaining: self.string("cipherChaining")?,
            hash_algorithm: self.string("hashAlgorithm")?,
            salt_value: self.base64("saltValue")?,
        };
        if desc.salt_value.len() != desc.salt_size as usize {
            log::warn!(
                "{}: saltSize is {} but saltValue decodes to {} bytes",
                self.element,
                desc.salt_size,
                desc.salt_value.len()
            );
        }
        Ok(desc)
    }
}

#[derive(Debug, Default)]
struct RawKeyEncryptor {
    uri: Option<String>,
    password: Option<Attrs>,
    certificate: Option<Attrs>,
}

impl RawKeyEncryptor {
    fn build(self) -> Result<KeyEncryptor> {
        let uri = self.uri.ok_or_else(|| {
            CryptCodecError::InvalidCryptoConfiguration(
                "could not find xml config uri under keyEncryptor".to_string(),
            )
        })?;
        let missing_encrypted_key = || {
            CryptCodecError::InvalidCryptoConfiguration(
                "could not find xml config encryptedKey under keyEncryptor".to_string(),
            )
        };
        match uri.as_str() {
            PASSWORD_KEY_ENCRYPTOR_NS => {
                let attrs = self.password.ok_or_else(missing_encrypted_key)?;
                Ok(KeyEncryptor::Password(PasswordKeyEncryptor {
                    cipher: attrs.cipher_descriptor()?,
                    spin_count: attrs.number("spinCount")?,
                    encrypted_verifier_hash_input: attrs.base64("encryptedVerifierHashInput")?,
                    encrypted_verifier_hash_value: attrs.base64("encryptedVerifierHashValue")?,
                    encrypted_key_value: attrs.base64("encryptedKeyValue")?,
                }))
            }
            CERTIFICATE_KEY_ENCRYPTOR_NS => {
                let attrs = self.certificate.ok_or_else(missing_encrypted_key)?;
                Ok(KeyEncryptor::Certificate(CertificateKeyEncryptor {
                    encrypted_key_value: attrs.base64("encryptedKeyValue")?,
                    x509_certificate: attrs.base64("x509Certificate")?,
                    cert_verifier: attrs.base64("certVerifier")?,
                }))
            }
            other => Err(CryptCodecError::UnsupportedEncryption(format!(
                "unsupported keyEncryptor uri {other}"
            ))),
        }
    }
}

/// `xmlns` declarations in scope, one frame per open element.
#[derive(Debug, Default)]
struct NamespaceScopes {
    frames: Vec<Vec<(Vec<u8>, Vec<u8>)>>,
}

impl NamespaceScopes {
    fn enter(&mut self, e: &BytesStart<'_>) -> Result<()> {
        let mut decls = Vec::new();
        for attr in e.attributes().with_checks(false) {
            let attr = attr.map_err(|err| {
                CryptCodecError::InvalidFormat(format!("invalid XML attribute: {err}"))
            })?;
            let key = attr.key.as_ref();
            let prefix = if key == b"xmlns" {
                Some(&b""[..])
            } else {
                key.strip_prefix(b"xmlns:")
            };
            if let Some(prefix) = prefix {
                decls.push((prefix.to_vec(), attr.value.to_vec()));
            }
        }
        self.frames.push(decls);
        Ok(())
    }

    fn leave(&mut self) {
        self.frames.pop();
    }

    /// URI bound to the element's prefix (or the default namespace); empty when unbound.
    fn uri_of(&self, e: &BytesStart<'_>) -> &[u8] {
        let name = e.name();
        let declared = name.prefix();
        let prefix = declared.as_ref().map_or(&b""[..], |p| p.as_ref());
        self.frames
            .iter()
            .rev()
            .flatten()
            .find(|(p, _)| p.as_slice() == prefix)
            .map_or(&b""[..], |(_, uri)| uri.as_slice())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Open {
    KeyEncryptors,
    KeyEncryptor,
    Other,
}

/// Collected element attributes, before the typed model is built.
#[derive(Default)]
struct Collected {
    saw_root: bool,
    key_data: Option<Attrs>,
    data_integrity: Option<Attrs>,
    saw_key_encryptors: bool,
    key_encryptors: Vec<RawKeyEncryptor>,
}

impl Collected {
    /// Record one start (or empty) element; returns how it nests for later elements.
    fn visit(
        &mut self,
        scopes: &NamespaceScopes,
        open: &[Open],
        e: &BytesStart<'_>,
    ) -> Result<Open> {
        let ns = scopes.uri_of(e);
        let local_name = e.local_name();
        let local = local_name.as_ref();

        if !self.saw_root {
            if local != b"encryption" || ns != ENCRYPTION_NS.as_bytes() {
                return Err(CryptCodecError::InvalidCryptoConfiguration(format!(
                    "unexpected xml config root element {}",
                    String::from_utf8_lossy(e.name().as_ref())
                )));
            }
            self.saw_root = true;
            return Ok(Open::Other);
        }

        let in_key_encryptors = open.contains(&Open::KeyEncryptors);
        let in_key_encryptor = open.contains(&Open::KeyEncryptor);

        if ns == ENCRYPTION_NS.as_bytes() {
            match local {
                b"keyData" if self.key_data.is_none() => {
                    self.key_data = Some(Attrs::collect("keyData", e)?);
                }
                b"dataIntegrity" if self.data_integrity.is_none() => {
                    self.data_integrity = Some(Attrs::collect("dataIntegrity", e)?);
                }
                b"keyEncryptors" if !self.saw_key_encryptors => {
                    self.saw_key_encryptors = true;
                    return Ok(Open::KeyEncryptors);
                }
                b"keyEncryptor" if in_key_encryptors => {
                    let attrs = Attrs::collect("keyEncryptor", e)?;
                    self.key_encryptors.push(RawKeyEncryptor {
                        uri: attrs.get("uri").map(str::to_string),
                        ..RawKeyEncryptor::default()
                    });
                    return Ok(Open::KeyEncryptor);
                }
                _ => {}
            }
        } else if local == b"encryptedKey" && in_key_encryptor {
            if let Some(current) = self.key_encryptors.last_mut() {
                if ns == PASSWORD_KEY_ENCRYPTOR_NS.as_bytes() && current.password.is_none() {
                    current.password = Some(Attrs::collect("encryptedKey", e)?);
                } else if ns == CERTIFICATE_KEY_ENCRYPTOR_NS.as_bytes()
                    && current.certificate.is_none()
                {
                    current.certificate = Some(Attrs::collect("encryptedKey", e)?);
                }
            }
        }
        Ok(Open::Other)
    }

    fn build(self) -> Result<EncryptionDescriptor> {
        if !self.saw_root {
            return Err(CryptCodecError::InvalidFormat(
                "encryption descriptor has no root element".to_string(),
            ));
        }
        let key_data = self
            .key_data
            .ok_or_else(|| missing_element("keyData"))?
            .cipher_descriptor()?;
        let data_integrity = match self.data_integrity {
            Some(attrs) => Some(DataIntegrity {
                encrypted_hmac_key: attrs.base64("encryptedHmacKey")?,
                encrypted_hmac_value: attrs.base64("encryptedHmacValue")?,
            }),
            None => None,
        };
        if !self.saw_key_encryptors {
            return Err(missing_element("keyEncryptors"));
        }
        let key_encryptors = self
            .key_encryptors
            .into_iter()
            .map(RawKeyEncryptor::build)
            .collect::<Result<Vec<_>>>()?;

        Ok(EncryptionDescriptor {
            key_data,
            data_integrity,
            key_encryptors,
        })
    }
}

fn missing_element(name: &str) -> CryptCodecError {
    CryptCodecError::InvalidCryptoConfiguration(format!(
        "could not find xml config {name} under encryption"
    ))
}

/// Parse the descriptor that follows the Agile version/reserved fields.
pub(crate) fn parse(xml_bytes: &[u8]) -> Result<EncryptionDescriptor> {
    let xml_bytes = xml_bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(xml_bytes);
    let end = xml_bytes
        .iter()
        .rposition(|b| *b != 0)
        .map_or(0, |idx| idx + 1);
    let xml = std::str::from_utf8(&xml_bytes[..end]).map_err(|_| {
        CryptCodecError::InvalidFormat("encryption descriptor XML is not valid UTF-8".to_string())
    })?;

    let mut reader = XmlReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut scopes = NamespaceScopes::default();
    let mut open: Vec<Open> = Vec::new();
    let mut collected = Collected::default();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|err| {
            CryptCodecError::InvalidFormat(format!("encryption descriptor XML parse error: {err}"))
        })?;

        match event {
            XmlEvent::Start(e) => {
                scopes.enter(&e)?;
                let kind = collected.visit(&scopes, &open, &e)?;
                open.push(kind);
            }
            XmlEvent::Empty(e) => {
                scopes.enter(&e)?;
                collected.visit(&scopes, &open, &e)?;
                scopes.leave();
            }
            XmlEvent::End(_) => {
                scopes.leave();
                open.pop();
            }
            XmlEvent::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    collected.build()
}
