//! X.509 certificates.
//!
//! This module covers the subset of [RFC 5280] certificates this crate
//! issues and verifies: version 3 certificates signed with RSA or ECDSA,
//! carrying the Basic Constraints, Key Usage, Extended Key Usage, and the
//! two key identifier extensions.
//!
//! [RFC 5280]: https://tools.ietf.org/html/rfc5280

use std::{fmt, io, ops};
use bcder::{decode, encode};
use bcder::{BitString, Captured, Mode, OctetString, Oid, Tag};
use bcder::decode::{ContentError, DecodeError, IntoSource, Source};
use bcder::encode::{PrimitiveContent, Values};
use bytes::Bytes;
use crate::oid;
use crate::crypto::{
    KeyIdentifier, PublicKey, SignatureAlgorithm, SignatureVerificationError,
    Signer, SigningError,
};
use crate::x509::{encode_extension, Name, Serial, SignedData, Time, Validity};


//------------ Cert ----------------------------------------------------------

/// A certificate.
///
/// If a certificate is stored in a file, you can use the [`decode`] function
/// to parse the DER encoded data. New certificates are created through
/// [`TbsCert::into_cert`]. In either case, the encoded form is kept, so
/// encoding a certificate always reproduces the exact bytes.
///
/// The content of the certificate is available through `Deref` to
/// [`TbsCert`].
///
/// [`decode`]: #method.decode
#[derive(Clone, Debug)]
pub struct Cert {
    /// The outer structure of the certificate.
    signed_data: SignedData,

    /// The actual data of the certificate.
    tbs: TbsCert,
}


/// # Decoding and Encoding
///
impl Cert {
    /// Decodes a source as a certificate.
    pub fn decode<S: IntoSource>(
        source: S,
    ) -> Result<Self, DecodeError<<S::Source as Source>::Error>> {
        Mode::Der.decode(source, Self::take_from)
    }

    /// Takes an encoded certificate from the beginning of a value.
    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(Self::from_constructed)
    }

    /// Parses the content of a Certificate sequence.
    pub fn from_constructed<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        let signed_data = SignedData::from_constructed(cons)?;
        let tbs = signed_data.data().clone().decode(
            TbsCert::from_constructed
        ).map_err(DecodeError::convert)?;
        if tbs.signature != signed_data.signature().algorithm() {
            return Err(cons.content_err("signature algorithm mismatch"))
        }
        Ok(Self { signed_data, tbs })
    }

    /// Returns a value encoder for a reference to the certificate.
    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        self.signed_data.encode_ref()
    }

    /// Returns a captured encoding of the certificate.
    pub fn to_captured(&self) -> Captured {
        Captured::from_values(Mode::Der, self.encode_ref())
    }

    /// Returns the DER encoding of the certificate.
    pub fn to_der(&self) -> Bytes {
        self.to_captured().into_bytes()
    }
}


/// # Verification
///
impl Cert {
    /// Verifies that `issuer` claims to have issued this certificate.
    ///
    /// The issuer name of this certificate must be the subject name of
    /// `issuer`. If this certificate carries an authority key identifier,
    /// it must match the subject key identifier of `issuer`.
    pub fn verify_issuer_claim(&self, issuer: &TbsCert) -> bool {
        if self.issuer != issuer.subject {
            return false
        }
        match self.authority_key_identifier {
            Some(aki) => aki == issuer.subject_key_identifier(),
            None => true
        }
    }

    /// Verifies the signature of the certificate with the given key.
    pub fn verify_signature(
        &self,
        issuer_key: &PublicKey
    ) -> Result<(), SignatureVerificationError> {
        self.signed_data.verify_signature(issuer_key)
    }

    /// Returns whether the certificate is valid at the given time.
    pub fn is_valid_at(&self, now: Time) -> bool {
        self.validity.contains(now)
    }
}


//--- Deref, AsRef

impl ops::Deref for Cert {
    type Target = TbsCert;

    fn deref(&self) -> &Self::Target {
        &self.tbs
    }
}

impl AsRef<TbsCert> for Cert {
    fn as_ref(&self) -> &TbsCert {
        &self.tbs
    }
}


//--- PartialEq and Eq

impl PartialEq for Cert {
    fn eq(&self, other: &Self) -> bool {
        self.signed_data == other.signed_data
    }
}

impl Eq for Cert { }


//------------ TbsCert -------------------------------------------------------

/// The data of a certificate.
#[derive(Clone, Debug)]
pub struct TbsCert {
    /// The serial number.
    serial_number: Serial,

    /// The algorithm used for signing the certificate.
    signature: SignatureAlgorithm,

    /// The name of the issuer.
    issuer: Name,

    /// The validity of the certificate.
    validity: Validity,

    /// The name of the subject of this certificate.
    subject: Name,

    /// Information about the public key of this certificate.
    subject_public_key_info: PublicKey,

    /// Basic Constraints extension.
    basic_constraints: Option<BasicConstraints>,

    /// Subject Key Identifier extension.
    ///
    /// Certificates we create always have it.
    subject_key_identifier: Option<KeyIdentifier>,

    /// Authority Key Identifier extension.
    authority_key_identifier: Option<KeyIdentifier>,

    /// Key Usage extension.
    key_usage: Option<KeyUsage>,

    /// Extended Key Usage extension.
    extended_key_usage: Option<ExtendedKeyUsage>,
}


/// # Creation and Conversion
///
impl TbsCert {
    /// Creates a new value from the necessary data.
    ///
    /// The subject key identifier is derived from the public key. All other
    /// extensions are left out and can be added via the setters.
    pub fn new(
        serial_number: Serial,
        signature: SignatureAlgorithm,
        issuer: Name,
        validity: Validity,
        subject: Name,
        subject_public_key_info: PublicKey,
    ) -> Self {
        Self {
            serial_number,
            signature,
            issuer,
            validity,
            subject,
            subject_key_identifier: Some(
                subject_public_key_info.key_identifier()
            ),
            subject_public_key_info,
            basic_constraints: None,
            authority_key_identifier: None,
            key_usage: None,
            extended_key_usage: None,
        }
    }

    /// Converts the value into a signed certificate.
    pub fn into_cert<S: Signer>(
        self,
        signer: &S,
        key: &S::KeyId,
    ) -> Result<Cert, SigningError<S::Error>> {
        let data = Captured::from_values(Mode::Der, self.encode_ref());
        let signature = signer.sign(key, self.signature, &data)?;
        Ok(Cert {
            signed_data: SignedData::new(data, signature),
            tbs: self
        })
    }
}


/// # Data Access
///
impl TbsCert {
    pub fn serial_number(&self) -> Serial {
        self.serial_number
    }

    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        self.signature
    }

    pub fn issuer(&self) -> &Name {
        &self.issuer
    }

    pub fn validity(&self) -> Validity {
        self.validity
    }

    pub fn subject(&self) -> &Name {
        &self.subject
    }

    pub fn subject_public_key_info(&self) -> &PublicKey {
        &self.subject_public_key_info
    }

    pub fn basic_constraints(&self) -> Option<BasicConstraints> {
        self.basic_constraints
    }

    pub fn set_basic_constraints(&mut self, value: Option<BasicConstraints>) {
        self.basic_constraints = value
    }

    /// Returns the subject key identifier.
    ///
    /// If the certificate doesn’t have the extension, the identifier is
    /// derived from the public key.
    pub fn subject_key_identifier(&self) -> KeyIdentifier {
        self.subject_key_identifier.unwrap_or_else(|| {
            self.subject_public_key_info.key_identifier()
        })
    }

    pub fn authority_key_identifier(&self) -> Option<KeyIdentifier> {
        self.authority_key_identifier
    }

    pub fn set_authority_key_identifier(
        &mut self,
        id: Option<KeyIdentifier>
    ) {
        self.authority_key_identifier = id
    }

    pub fn key_usage(&self) -> Option<KeyUsage> {
        self.key_usage
    }

    pub fn set_key_usage(&mut self, key_usage: Option<KeyUsage>) {
        self.key_usage = key_usage
    }

    pub fn extended_key_usage(&self) -> Option<&ExtendedKeyUsage> {
        self.extended_key_usage.as_ref()
    }

    pub fn set_extended_key_usage(&mut self, eku: Option<ExtendedKeyUsage>) {
        self.extended_key_usage = eku
    }

    /// Returns whether this is a CA certificate.
    pub fn is_ca(&self) -> bool {
        self.basic_constraints.map(|bc| bc.ca).unwrap_or(false)
    }

    /// Returns the path length constraint of a CA certificate.
    pub fn path_len(&self) -> Option<u32> {
        self.basic_constraints.and_then(|bc| {
            if bc.ca { bc.path_len } else { None }
        })
    }

    /// Returns whether the certificate claims to be self-signed.
    ///
    /// This only compares names and key identifiers. It does not check the
    /// signature.
    pub fn is_self_signed(&self) -> bool {
        if self.issuer != self.subject {
            return false
        }
        match self.authority_key_identifier {
            Some(aki) => aki == self.subject_key_identifier(),
            None => true
        }
    }
}


/// # Decoding and Encoding
///
impl TbsCert {
    /// Parses the content of a Certificate sequence.
    pub fn from_constructed<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            // version [0] EXPLICIT Version DEFAULT v1.
            //  -- we need extensions so we want v3 which, confusingly, is 2.
            cons.take_constructed_if(Tag::CTX_0, |c| c.skip_u8_if(2))?;

            let serial_number = Serial::take_from(cons)?;
            let signature = SignatureAlgorithm::x509_take_from(cons)?;
            let issuer = Name::take_from(cons)?;
            let validity = Validity::take_from(cons)?;
            let subject = Name::take_from(cons)?;
            let subject_public_key_info = PublicKey::take_from(cons)?;

            let mut basic_constraints = None;
            let mut subject_key_id = None;
            let mut authority_key_id = None;
            let mut key_usage = None;
            let mut extended_key_usage = None;

            cons.take_opt_constructed_if(Tag::CTX_3, |c| c.take_sequence(|cons| {
                while let Some(()) = cons.take_opt_sequence(|cons| {
                    let id = Oid::take_from(cons)?;
                    let critical = cons.take_opt_bool()?.unwrap_or(false);
                    let value = OctetString::take_from(cons)?;
                    Mode::Der.decode(value, |content| {
                        if id == oid::CE_BASIC_CONSTRAINTS {
                            Self::take_basic_constraints(
                                content, &mut basic_constraints
                            )
                        } else if id == oid::CE_SUBJECT_KEY_IDENTIFIER {
                            Self::take_subject_key_identifier(
                                content, &mut subject_key_id
                            )
                        } else if id == oid::CE_AUTHORITY_KEY_IDENTIFIER {
                            Self::take_authority_key_identifier(
                                content, &mut authority_key_id
                            )
                        } else if id == oid::CE_KEY_USAGE {
                            Self::take_key_usage(
                                content, &mut key_usage
                            )
                        } else if id == oid::CE_EXTENDED_KEY_USAGE {
                            Self::take_extended_key_usage(
                                content, &mut extended_key_usage
                            )
                        } else if critical {
                            Err(content.content_err(
                                UnexpectedCriticalExtension::new(id)
                            ))
                        } else {
                            // RFC 5280 says we can ignore non-critical
                            // extensions we don’t know of.
                            Ok(())
                        }
                    }).map_err(DecodeError::convert)?;
                    Ok(())
                })? { }
                Ok(())
            }))?;

            Ok(Self {
                serial_number,
                signature,
                issuer,
                validity,
                subject,
                subject_public_key_info,
                basic_constraints,
                subject_key_identifier: subject_key_id,
                authority_key_identifier: authority_key_id.flatten(),
                key_usage,
                extended_key_usage,
            })
        })
    }

    /// Parses the Basic Constraints extension.
    ///
    /// ```text
    /// BasicConstraints        ::= SEQUENCE {
    ///     cA                      BOOLEAN DEFAULT FALSE,
    ///     pathLenConstraint       INTEGER (0..MAX) OPTIONAL
    /// }
    /// ```
    fn take_basic_constraints<S: decode::Source>(
        cons: &mut decode::Constructed<S>,
        basic_constraints: &mut Option<BasicConstraints>,
    ) -> Result<(), DecodeError<S::Error>> {
        if basic_constraints.is_some() {
            return Err(cons.content_err(
                "duplicate Basic Constraints extension"
            ))
        }
        cons.take_sequence(|cons| {
            let ca = cons.take_opt_bool()?.unwrap_or(false);
            let path_len = match cons.take_opt_u64()? {
                Some(len) => Some(u32::try_from(len).map_err(|_| {
                    cons.content_err("pathLenConstraint out of range")
                })?),
                None => None
            };
            *basic_constraints = Some(BasicConstraints { ca, path_len });
            Ok(())
        })
    }

    /// Parses the Subject Key Identifier extension.
    ///
    /// ```text
    /// SubjectKeyIdentifier ::= KeyIdentifier
    /// ```
    fn take_subject_key_identifier<S: decode::Source>(
        cons: &mut decode::Constructed<S>,
        subject_key_id: &mut Option<KeyIdentifier>,
    ) -> Result<(), DecodeError<S::Error>> {
        if subject_key_id.is_some() {
            Err(cons.content_err(
                "duplicate Subject Key Identifier extension"
            ))
        }
        else {
            *subject_key_id = Some(KeyIdentifier::take_from(cons)?);
            Ok(())
        }
    }

    /// Parses the Authority Key Identifier extension.
    ///
    /// ```text
    /// AuthorityKeyIdentifier ::= SEQUENCE {
    ///   keyIdentifier             [0] KeyIdentifier           OPTIONAL,
    ///   authorityCertIssuer       [1] GeneralNames            OPTIONAL,
    ///   authorityCertSerialNumber [2] CertificateSerialNumber OPTIONAL  }
    /// ```
    ///
    /// Only the keyIdentifier field is kept. The issuer and serial number
    /// fields are skipped. The outer option records that the extension was
    /// present.
    fn take_authority_key_identifier<S: decode::Source>(
        cons: &mut decode::Constructed<S>,
        authority_key_id: &mut Option<Option<KeyIdentifier>>,
    ) -> Result<(), DecodeError<S::Error>> {
        if authority_key_id.is_some() {
            Err(cons.content_err(
                "duplicate Authority Key Identifier extension"
            ))
        }
        else {
            *authority_key_id = Some(
                cons.take_sequence(|cons| {
                    let id = cons.take_opt_value_if(
                        Tag::CTX_0, KeyIdentifier::from_content
                    )?;
                    cons.skip_all()?;
                    Ok(id)
                })?
            );
            Ok(())
        }
    }

    /// Parses the Key Usage extension.
    fn take_key_usage<S: decode::Source>(
        cons: &mut decode::Constructed<S>,
        key_usage: &mut Option<KeyUsage>
    ) -> Result<(), DecodeError<S::Error>> {
        if key_usage.is_some() {
            Err(cons.content_err("duplicate Key Usage extension"))
        }
        else {
            *key_usage = Some(KeyUsage::from_bits(
                &BitString::take_from(cons)?
            ));
            Ok(())
        }
    }

    /// Parses the Extended Key Usage extension.
    ///
    /// ```text
    /// ExtKeyUsageSyntax ::= SEQUENCE SIZE (1..MAX) OF KeyPurposeId
    /// KeyPurposeId ::= OBJECT IDENTIFIER
    /// ```
    fn take_extended_key_usage<S: decode::Source>(
        cons: &mut decode::Constructed<S>,
        extended_key_usage: &mut Option<ExtendedKeyUsage>
    ) -> Result<(), DecodeError<S::Error>> {
        if extended_key_usage.is_some() {
            Err(cons.content_err("duplicate Extended Key Usage extension"))
        }
        else {
            *extended_key_usage = Some(ExtendedKeyUsage::take_from(cons)?);
            Ok(())
        }
    }

    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        encode::sequence((
            encode::sequence_as(Tag::CTX_0, 2.encode()), // version
            self.serial_number.encode(),
            self.signature.x509_encode(),
            self.issuer.encode_ref(),
            self.validity.encode(),
            self.subject.encode_ref(),
            self.subject_public_key_info.encode_ref(),
            // no issuerUniqueID
            // no subjectUniqueID
            // extensions
            encode::sequence_as(Tag::CTX_3, encode::sequence((
                // Basic Constraints
                self.basic_constraints.map(|bc| {
                    encode_extension(
                        &oid::CE_BASIC_CONSTRAINTS, true,
                        encode::sequence((
                            if bc.ca {
                                Some(bc.ca.encode())
                            }
                            else {
                                None
                            },
                            bc.path_len.map(|len| u64::from(len).encode()),
                        ))
                    )
                }),

                // Subject Key Identifier
                encode_extension(
                    &oid::CE_SUBJECT_KEY_IDENTIFIER, false,
                    self.subject_key_identifier().encode(),
                ),

                // Authority Key Identifier
                self.authority_key_identifier.as_ref().map(|id| {
                    encode_extension(
                        &oid::CE_AUTHORITY_KEY_IDENTIFIER, false,
                        encode::sequence(id.encode_ref_as(Tag::CTX_0))
                    )
                }),

                // Key Usage
                self.key_usage.map(|key_usage| {
                    encode_extension(
                        &oid::CE_KEY_USAGE, true,
                        key_usage.encode()
                    )
                }),

                // Extended Key Usage
                self.extended_key_usage.as_ref().map(|eku| {
                    encode_extension(
                        &oid::CE_EXTENDED_KEY_USAGE, false,
                        encode::sequence(eku.encode_ref())
                    )
                }),
            )))
        ))
    }
}


//------------ BasicConstraints ----------------------------------------------

/// The content of the Basic Constraints extension.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct BasicConstraints {
    /// Whether the subject is a CA.
    pub ca: bool,

    /// The maximum number of CA certificates that may follow.
    ///
    /// Only meaningful if `ca` is true.
    pub path_len: Option<u32>,
}

impl BasicConstraints {
    /// Returns the constraints for a CA with the given path length.
    pub fn ca(path_len: u32) -> Self {
        BasicConstraints { ca: true, path_len: Some(path_len) }
    }

    /// Returns the constraints for an end entity.
    pub fn end_entity() -> Self {
        BasicConstraints { ca: false, path_len: None }
    }
}


//------------ KeyUsage ------------------------------------------------------

/// The key usage bits of a certificate.
///
/// ```text
/// KeyUsage ::= BIT STRING {
///      digitalSignature        (0),
///      nonRepudiation          (1),
///      keyEncipherment         (2),
///      dataEncipherment        (3),
///      keyAgreement            (4),
///      keyCertSign             (5),
///      cRLSign                 (6),
///      encipherOnly            (7),
///      decipherOnly            (8) }
/// ```
#[derive(Clone, Copy, Default, Eq, Hash, PartialEq)]
pub struct KeyUsage(u16);

impl KeyUsage {
    pub const DIGITAL_SIGNATURE: Self = KeyUsage(1 << 0);
    pub const NON_REPUDIATION: Self = KeyUsage(1 << 1);
    pub const KEY_ENCIPHERMENT: Self = KeyUsage(1 << 2);
    pub const DATA_ENCIPHERMENT: Self = KeyUsage(1 << 3);
    pub const KEY_AGREEMENT: Self = KeyUsage(1 << 4);
    pub const KEY_CERT_SIGN: Self = KeyUsage(1 << 5);
    pub const CRL_SIGN: Self = KeyUsage(1 << 6);
    pub const ENCIPHER_ONLY: Self = KeyUsage(1 << 7);
    pub const DECIPHER_ONLY: Self = KeyUsage(1 << 8);

    /// Returns whether all bits of `other` are set in `self`.
    pub fn contains(self, other: KeyUsage) -> bool {
        self.0 & other.0 == other.0
    }

    fn from_bits(bits: &BitString) -> Self {
        KeyUsage((0..9).filter(|&bit| bits.bit(bit)).fold(0, |res, bit| {
            res | (1 << bit)
        }))
    }

    /// Returns the content octets of the DER encoded bit string.
    ///
    /// DER requires trailing zero bits to be dropped, so the first octet
    /// gives the number of unused bits in the last one.
    fn octets(self) -> ([u8; 3], usize) {
        let first = (0..8).fold(0u8, |res, bit| {
            if self.0 & (1 << bit) != 0 { res | (0x80 >> bit) } else { res }
        });
        if self.0 & (1 << 8) != 0 {
            ([7, first, 0x80], 3)
        }
        else if first != 0 {
            ([first.trailing_zeros() as u8, first, 0], 2)
        }
        else {
            ([0, 0, 0], 1)
        }
    }
}


//--- BitOr

impl ops::BitOr for KeyUsage {
    type Output = Self;

    fn bitor(self, other: Self) -> Self {
        KeyUsage(self.0 | other.0)
    }
}


//--- PrimitiveContent

impl PrimitiveContent for KeyUsage {
    const TAG: Tag = Tag::BIT_STRING;

    fn encoded_len(&self, _: Mode) -> usize {
        self.octets().1
    }

    fn write_encoded<W: io::Write>(
        &self,
        _: Mode,
        target: &mut W
    ) -> Result<(), io::Error> {
        let (octets, len) = self.octets();
        target.write_all(&octets[..len])
    }
}


//--- Debug

impl fmt::Debug for KeyUsage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        const NAMES: [&str; 9] = [
            "digitalSignature", "nonRepudiation", "keyEncipherment",
            "dataEncipherment", "keyAgreement", "keyCertSign", "cRLSign",
            "encipherOnly", "decipherOnly",
        ];
        f.debug_set().entries(
            NAMES.iter().enumerate().filter(|(bit, _)| {
                self.0 & (1 << bit) != 0
            }).map(|(_, name)| name)
        ).finish()
    }
}


//------------ ExtendedKeyUsage ----------------------------------------------

/// The extended key usages of a certificate.
#[derive(Clone, Debug)]
pub struct ExtendedKeyUsage {
    content: Captured,
    has_server_auth: bool,
    has_client_auth: bool,
}

impl ExtendedKeyUsage {
    fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        let mut has_server_auth = false;
        let mut has_client_auth = false;
        let content = cons.take_sequence(|cons| cons.capture(|cons| {
            let mut empty = true;
            while let Some(oid) = Oid::take_opt_from(cons)? {
                if oid == oid::KP_SERVER_AUTH {
                    has_server_auth = true;
                }
                else if oid == oid::KP_CLIENT_AUTH {
                    has_client_auth = true;
                }
                empty = false;
            }
            if empty {
                Err(cons.content_err(
                    "empty Extended key Usage extension"
                ))
            }
            else {
                Ok(())
            }
        }))?;
        Ok(ExtendedKeyUsage { content, has_server_auth, has_client_auth })
    }

    fn encode_ref(&self) -> impl encode::Values + '_ {
        &self.content
    }

    /// Creates the usage for TLS servers.
    pub fn server_auth() -> Self {
        ExtendedKeyUsage {
            content: oid::KP_SERVER_AUTH.encode().to_captured(Mode::Der),
            has_server_auth: true,
            has_client_auth: false,
        }
    }

    /// Creates the usage for TLS clients.
    pub fn client_auth() -> Self {
        ExtendedKeyUsage {
            content: oid::KP_CLIENT_AUTH.encode().to_captured(Mode::Der),
            has_server_auth: false,
            has_client_auth: true,
        }
    }

    pub fn has_server_auth(&self) -> bool {
        self.has_server_auth
    }

    pub fn has_client_auth(&self) -> bool {
        self.has_client_auth
    }
}


//------------ UnexpectedCriticalExtension -----------------------------------

/// An unknown critical certificate extension was encountered.
#[derive(Clone, Debug)]
struct UnexpectedCriticalExtension {
    oid: Oid<Bytes>,
}

impl UnexpectedCriticalExtension {
    fn new(oid: Oid<Bytes>) -> Self {
       UnexpectedCriticalExtension { oid }
    }
}

impl From<UnexpectedCriticalExtension> for ContentError {
    fn from(err: UnexpectedCriticalExtension) -> Self {
        ContentError::from_boxed(Box::new(err))
    }
}

impl fmt::Display for UnexpectedCriticalExtension {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unexpected critical extension {}", self.oid)
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    fn encode_usage(usage: KeyUsage) -> Vec<u8> {
        usage.encode().to_captured(Mode::Der).as_slice().to_vec()
    }

    #[test]
    fn key_usage_encoding() {
        assert_eq!(
            encode_usage(
                KeyUsage::KEY_CERT_SIGN | KeyUsage::CRL_SIGN
                | KeyUsage::DIGITAL_SIGNATURE
            ),
            b"\x03\x02\x01\x86"
        );
        assert_eq!(
            encode_usage(
                KeyUsage::DIGITAL_SIGNATURE | KeyUsage::KEY_ENCIPHERMENT
            ),
            b"\x03\x02\x05\xa0"
        );
        assert_eq!(
            encode_usage(KeyUsage::DIGITAL_SIGNATURE | KeyUsage::KEY_AGREEMENT),
            b"\x03\x02\x03\x88"
        );
        assert_eq!(
            encode_usage(KeyUsage::DECIPHER_ONLY),
            b"\x03\x03\x07\x00\x80"
        );
        assert_eq!(encode_usage(KeyUsage::default()), b"\x03\x01\x00");
    }

    #[test]
    fn key_usage_decoding() {
        let der = encode_usage(KeyUsage::KEY_CERT_SIGN | KeyUsage::CRL_SIGN);
        let usage = Mode::Der.decode(der.as_slice(), |cons| {
            Ok(KeyUsage::from_bits(&BitString::take_from(cons)?))
        }).unwrap();
        assert!(usage.contains(KeyUsage::KEY_CERT_SIGN));
        assert!(usage.contains(KeyUsage::CRL_SIGN));
        assert!(!usage.contains(KeyUsage::DIGITAL_SIGNATURE));
    }

    fn decode_aki(der: &[u8]) -> Option<Option<KeyIdentifier>> {
        let mut res = None;
        Mode::Der.decode(der, |cons| {
            TbsCert::take_authority_key_identifier(cons, &mut res)
        }).unwrap();
        res
    }

    #[test]
    fn authority_key_identifier_fields() {
        let key_id = [0x14u8; 20];

        let mut der = vec![0x30, 0x16, 0x80, 0x14];
        der.extend_from_slice(&key_id);
        assert_eq!(decode_aki(&der), Some(Some(KeyIdentifier::from(key_id))));

        // keyIdentifier followed by authorityCertSerialNumber.
        let mut der = vec![0x30, 0x19, 0x80, 0x14];
        der.extend_from_slice(&key_id);
        der.extend_from_slice(&[0x82, 0x01, 0x05]);
        assert_eq!(decode_aki(&der), Some(Some(KeyIdentifier::from(key_id))));

        // Only authorityCertSerialNumber.
        assert_eq!(decode_aki(b"\x30\x03\x82\x01\x05"), Some(None));
        assert_eq!(decode_aki(b"\x30\x00"), Some(None));
    }

    #[test]
    fn decode_external_cert() {
        let cert = Cert::decode(
            Bytes::from_static(include_bytes!("../test-data/full-aki.cer"))
        ).unwrap();
        let key_id = cert.subject_public_key_info().key_identifier();
        assert_eq!(cert.subject_key_identifier(), key_id);
        assert_eq!(cert.authority_key_identifier(), Some(key_id));
        assert_eq!(cert.serial_number(), Serial::from(4711));
        assert!(cert.is_ca());
        assert_eq!(cert.path_len(), Some(1));
        assert!(cert.is_self_signed());
        assert!(cert.verify_issuer_claim(&cert));
        assert_eq!(
            cert.subject().common_name().as_deref(), Some("External Root")
        );
        cert.verify_signature(cert.subject_public_key_info()).unwrap();
    }

    #[cfg(feature = "softkeys")]
    #[test]
    fn build_and_decode_cert() {
        use crate::crypto::{Curve, PublicKeyFormat};
        use crate::crypto::softsigner::OpenSslSigner;
        use crate::x509::NameAttributes;

        let signer = OpenSslSigner::new();
        let key = signer.create_key(PublicKeyFormat::Ec(Curve::P256)).unwrap();
        let pubkey = signer.get_key_info(&key).unwrap();
        let name = Name::from_attributes(NameAttributes {
            common_name: "Test Root",
            ..Default::default()
        });
        let mut tbs = TbsCert::new(
            1001.into(),
            SignatureAlgorithm::EcdsaSha256,
            name.clone(),
            Validity::from_secs(3600).unwrap(),
            name,
            pubkey.clone(),
        );
        tbs.set_basic_constraints(Some(BasicConstraints::ca(2)));
        tbs.set_authority_key_identifier(Some(pubkey.key_identifier()));
        tbs.set_key_usage(Some(KeyUsage::KEY_CERT_SIGN | KeyUsage::CRL_SIGN));
        tbs.set_extended_key_usage(Some(ExtendedKeyUsage::server_auth()));
        let cert = tbs.into_cert(&signer, &key).unwrap();

        let decoded = Cert::decode(cert.to_der()).unwrap();
        assert_eq!(decoded, cert);
        assert_eq!(decoded.serial_number(), Serial::from(1001));
        assert!(decoded.is_ca());
        assert_eq!(decoded.path_len(), Some(2));
        assert!(decoded.is_self_signed());
        assert!(decoded.verify_issuer_claim(&decoded));
        assert!(decoded.extended_key_usage().unwrap().has_server_auth());
        assert_eq!(decoded.subject().common_name().as_deref(), Some("Test Root"));
        decoded.verify_signature(&pubkey).unwrap();
        assert!(decoded.is_valid_at(Time::now()));
    }
}
