//! Raw key identifier extensions.
//!
//! The etcd CA and the certificates it signs carry Subject and Authority Key
//! Identifiers computed from the RSA modulus rather than the library default
//! (a hash of the whole public key bit string). The AKI also names the
//! signer by subject and serial. Both are encoded here by hand and attached
//! as opaque DER extensions.

use crate::crypto_err;
use certgen_types::Result;
use openssl::asn1::{Asn1Object, Asn1OctetString};
use openssl::x509::X509Extension;
use sha1::{Digest, Sha1};
use yasna::Tag;

/// id-ce-authorityKeyIdentifier
pub const AUTHORITY_KEY_IDENTIFIER_OID: &str = "2.5.29.35";

/// id-ce-subjectKeyIdentifier
pub const SUBJECT_KEY_IDENTIFIER_OID: &str = "2.5.29.14";

/// SHA-1 of the big-endian RSA modulus bytes.
pub fn key_id(modulus: &[u8]) -> Vec<u8> {
    Sha1::digest(modulus).to_vec()
}

/// `SubjectKeyIdentifier ::= OCTET STRING`
pub fn subject_key_identifier_der(key_id: &[u8]) -> Vec<u8> {
    yasna::construct_der(|writer| writer.write_bytes(key_id))
}

/// `AuthorityKeyIdentifier` naming the signer by subject and serial.
///
/// ```text
/// SEQUENCE {
///   [0] IMPLICIT OCTET STRING              -- key_id, omitted when None
///   [1] IMPLICIT SEQUENCE { [4] EXPLICIT Name }
///   [2] IMPLICIT INTEGER                   -- signer serial
/// }
/// ```
///
/// `issuer_name_der` is the DER of the signer's subject `Name`; `serial` is
/// the big-endian magnitude of the signer's serial number.
pub fn authority_key_identifier_der(
    key_id: Option<&[u8]>,
    issuer_name_der: &[u8],
    serial: &[u8],
) -> Vec<u8> {
    yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            if let Some(key_id) = key_id {
                writer
                    .next()
                    .write_tagged_implicit(Tag::context(0), |writer| writer.write_bytes(key_id));
            }
            writer.next().write_tagged_implicit(Tag::context(1), |writer| {
                writer.write_sequence(|writer| {
                    writer
                        .next()
                        .write_tagged(Tag::context(4), |writer| writer.write_der(issuer_name_der));
                });
            });
            writer
                .next()
                .write_tagged_implicit(Tag::context(2), |writer| writer.write_bigint_bytes(serial, true));
        });
    })
}

/// Wrap already-encoded extension contents as a non-critical extension.
pub fn raw_extension(oid: &str, der: &[u8]) -> Result<X509Extension> {
    let object = Asn1Object::from_str(oid).map_err(crypto_err("parse extension OID"))?;
    let contents = Asn1OctetString::new_from_bytes(der).map_err(crypto_err("wrap extension contents"))?;
    X509Extension::new_from_der(&object, false, &contents).map_err(crypto_err("build raw extension"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_id_is_sha1() {
        // SHA-1("abc")
        assert_eq!(
            hex::encode(key_id(b"abc")),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn test_subject_key_identifier_der() {
        let id = key_id(b"abc");
        let der = subject_key_identifier_der(&id);
        assert_eq!(der[0], 0x04);
        assert_eq!(der[1], 20);
        assert_eq!(&der[2..], id.as_slice());
    }

    #[test]
    fn test_authority_key_identifier_with_key_id() {
        let der = authority_key_identifier_der(Some(&[0xaa]), &[0x30, 0x00], &[0x05]);
        assert_eq!(
            der,
            vec![
                0x30, 0x0c, // SEQUENCE
                0x80, 0x01, 0xaa, // [0] keyIdentifier
                0xa1, 0x04, 0xa4, 0x02, 0x30, 0x00, // [1] { [4] Name }
                0x82, 0x01, 0x05, // [2] serial
            ]
        );
    }

    #[test]
    fn test_authority_key_identifier_without_key_id() {
        let der = authority_key_identifier_der(None, &[0x30, 0x00], &[0x05]);
        assert_eq!(
            der,
            vec![0x30, 0x09, 0xa1, 0x04, 0xa4, 0x02, 0x30, 0x00, 0x82, 0x01, 0x05]
        );
    }

    #[test]
    fn test_raw_extension_builds() {
        let der = authority_key_identifier_der(None, &[0x30, 0x00], &[0x01]);
        assert!(raw_extension(AUTHORITY_KEY_IDENTIFIER_OID, &der).is_ok());
        assert!(raw_extension("not-an-oid", &der).is_err());
    }
}
