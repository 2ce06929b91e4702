//! Types and parameters of keys.

use std::{error, fmt, io};
use bcder::{decode, encode};
use bcder::{BitString, ConstOid, Mode, OctetString, Oid, Tag};
use bcder::decode::{DecodeError, IntoSource, Source};
use bcder::encode::{PrimitiveContent, Values};
use bytes::Bytes;
use ring::{digest, signature};
use ring::error::Unspecified;
use crate::oid;
use super::signature::{Signature, SignatureAlgorithm};


//------------ KeyAlgorithmSpec ----------------------------------------------

/// The algorithm requested for a new key pair.
///
/// This is what a caller asks for. It is resolved into a concrete
/// [`PublicKeyFormat`] via [`public_key_format`][Self::public_key_format]
/// before a key is created.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub enum KeyAlgorithmSpec {
    /// An RSA key of [`RSA_KEY_BITS`] bits.
    #[default]
    Rsa,

    /// An elliptic curve key.
    ///
    /// If no curve name is given, [`Curve::default`] is used.
    EllipticCurve(Option<String>),
}

impl KeyAlgorithmSpec {
    /// Returns a spec for an elliptic curve key on the default curve.
    pub fn ec() -> Self {
        KeyAlgorithmSpec::EllipticCurve(None)
    }

    /// Returns a spec for an elliptic curve key on the named curve.
    pub fn ec_named(name: impl Into<String>) -> Self {
        KeyAlgorithmSpec::EllipticCurve(Some(name.into()))
    }

    /// Resolves the algorithm into the format of the key to create.
    pub fn public_key_format(&self) -> Result<PublicKeyFormat, UnsupportedCurve> {
        match *self {
            KeyAlgorithmSpec::Rsa => Ok(PublicKeyFormat::Rsa),
            KeyAlgorithmSpec::EllipticCurve(None) => {
                Ok(PublicKeyFormat::Ec(Curve::default()))
            }
            KeyAlgorithmSpec::EllipticCurve(Some(ref name)) => {
                Curve::from_name(name).map(PublicKeyFormat::Ec).ok_or_else(|| {
                    UnsupportedCurve(name.clone())
                })
            }
        }
    }
}


//------------ Curve ---------------------------------------------------------

/// The size of newly created RSA keys in bits.
pub const RSA_KEY_BITS: u32 = 2048;

/// A supported elliptic curve.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Curve {
    /// NIST P-256, also known as `prime256v1` and `secp256r1`.
    #[default]
    P256,

    /// NIST P-384, also known as `secp384r1`.
    P384,
}

impl Curve {
    /// Returns the curve for one of its common names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "prime256v1" | "secp256r1" | "P-256" => Some(Curve::P256),
            "secp384r1" | "P-384" => Some(Curve::P384),
            _ => None
        }
    }

    /// Returns the OpenSSL name of the curve.
    pub fn name(self) -> &'static str {
        match self {
            Curve::P256 => "prime256v1",
            Curve::P384 => "secp384r1",
        }
    }

    /// Returns the object identifier of the named curve.
    pub fn oid(self) -> &'static ConstOid {
        match self {
            Curve::P256 => &oid::SECP256R1,
            Curve::P384 => &oid::SECP384R1,
        }
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}


//------------ PublicKeyFormat -----------------------------------------------

/// The formats of public keys we can issue and verify.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PublicKeyFormat {
    /// An RSA public key.
    Rsa,

    /// An ECDSA public key on the given named curve.
    Ec(Curve),
}

impl PublicKeyFormat {
    /// Returns the signature algorithm used when signing with such a key.
    pub fn signature_algorithm(self) -> SignatureAlgorithm {
        match self {
            PublicKeyFormat::Rsa => SignatureAlgorithm::RsaSha256,
            PublicKeyFormat::Ec(Curve::P256) => SignatureAlgorithm::EcdsaSha256,
            PublicKeyFormat::Ec(Curve::P384) => SignatureAlgorithm::EcdsaSha384,
        }
    }
}

/// # ASN.1 Algorithm Identifiers
///
/// The format of the public key is identified in certificates through a
/// algorithm identifier defined with this ASN.1:
///
/// ```txt
/// AlgorithmIdentifier ::= SEQUENCE {
///      algorithm          OBJECT IDENTIFIER,
///      parameters         ANY DEFINED BY algorithm OPTIONAL }
/// ```
///
/// For RSA keys, the object identifier needs to be that of `rsaEncryption`
/// defined by [RFC 4055] and the parameters must be present and NULL.
/// When parsing, we generously also allow it to be absent altogether.
///
/// For ECDSA keys, the object identifer needs to be `id-ecPublicKey`
/// defined in [RFC 5480] with the parameter being the object identifier of
/// one of the supported named curves.
///
/// [RFC 4055]: https://tools.ietf.org/html/rfc4055
/// [RFC 5480]: https://tools.ietf.org/html/rfc5480
impl PublicKeyFormat {
    /// Takes and returns a algorithm identifier.
    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(Self::from_constructed)
    }

    /// Parses the algorithm identifier from the contents of its sequence.
    fn from_constructed<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        let alg = Oid::take_from(cons)?;
        if alg == oid::RSA_ENCRYPTION {
            cons.take_opt_primitive_if(Tag::NULL, |_| Ok(()))?;
            Ok(PublicKeyFormat::Rsa)
        }
        else if alg == oid::EC_PUBLIC_KEY {
            let curve = Oid::take_from(cons)?;
            if curve == oid::SECP256R1 {
                Ok(PublicKeyFormat::Ec(Curve::P256))
            }
            else if curve == oid::SECP384R1 {
                Ok(PublicKeyFormat::Ec(Curve::P384))
            }
            else {
                Err(cons.content_err("unsupported elliptic curve"))
            }
        }
        else {
            Err(cons.content_err("unsupported public key algorithm"))
        }
    }

    /// Provides an encoder for the algorihm identifier.
    pub fn encode(self) -> impl encode::Values {
        match self {
            PublicKeyFormat::Rsa => {
                encode::Choice2::One(
                    encode::sequence((
                        oid::RSA_ENCRYPTION.encode(),
                        ().encode(),
                    ))
                )
            }
            PublicKeyFormat::Ec(curve) => {
                encode::Choice2::Two(
                    encode::sequence((
                        oid::EC_PUBLIC_KEY.encode(),
                        curve.oid().encode(),
                    ))
                )
            }
        }
    }
}

impl fmt::Display for PublicKeyFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            PublicKeyFormat::Rsa => f.write_str("RSA"),
            PublicKeyFormat::Ec(curve) => write!(f, "EC {}", curve),
        }
    }
}


//------------ PublicKey -----------------------------------------------------

/// A public key.
///
/// Two public keys compare equal if they are of the same format and have
/// identical key bits. This is what establishes that a private key belongs
/// to a certificate.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PublicKey {
    algorithm: PublicKeyFormat,
    bits: BitString,
}

impl PublicKey {
    /// Returns the algorithm of this public key.
    pub fn algorithm(&self) -> PublicKeyFormat {
        self.algorithm
    }

    /// Returns the bits of this public key.
    ///
    /// For RSA keys, this is the DER encoded `RSAPublicKey`, for EC keys
    /// the uncompressed curve point.
    pub fn bits(&self) -> &[u8] {
        self.bits.octet_slice().unwrap_or(&[])
    }

    /// Returns a key identifier for this key.
    ///
    /// The identifier will be the SHA-1 hash of the key’s bits.
    pub fn key_identifier(&self) -> KeyIdentifier {
        let hash = digest::digest(
            &digest::SHA1_FOR_LEGACY_USE_ONLY, self.bits()
        );
        let mut res = [0u8; 20];
        res.copy_from_slice(hash.as_ref());
        KeyIdentifier(res)
    }

    /// Verifies a signature using this public key.
    ///
    /// Fails if the signature’s algorithm can’t be used with this key or if
    /// the signature is not valid.
    pub fn verify(
        &self, message: &[u8], signature: &Signature
    ) -> Result<(), SignatureVerificationError> {
        let alg: &'static dyn signature::VerificationAlgorithm = match (
            self.algorithm, signature.algorithm()
        ) {
            (PublicKeyFormat::Rsa, SignatureAlgorithm::RsaSha256) => {
                &signature::RSA_PKCS1_2048_8192_SHA256
            }
            (
                PublicKeyFormat::Ec(Curve::P256),
                SignatureAlgorithm::EcdsaSha256
            ) => &signature::ECDSA_P256_SHA256_ASN1,
            (
                PublicKeyFormat::Ec(Curve::P256),
                SignatureAlgorithm::EcdsaSha384
            ) => &signature::ECDSA_P256_SHA384_ASN1,
            (
                PublicKeyFormat::Ec(Curve::P384),
                SignatureAlgorithm::EcdsaSha256
            ) => &signature::ECDSA_P384_SHA256_ASN1,
            (
                PublicKeyFormat::Ec(Curve::P384),
                SignatureAlgorithm::EcdsaSha384
            ) => &signature::ECDSA_P384_SHA384_ASN1,
            _ => return Err(SignatureVerificationError)
        };
        signature::UnparsedPublicKey::new(alg, self.bits()).verify(
            message, signature.value().as_ref()
        ).map_err(Into::into)
    }
}


/// # As `SubjectPublicKeyInfo`
///
/// Public keys are included in X.509 certificates as `SubjectPublicKeyInfo`
/// structures. As these contain the same information as `PublicKey`,
/// it can be decoded from and encoded to such sequences.
impl PublicKey {
    pub fn decode<S: IntoSource>(
        source: S
    ) -> Result<Self, DecodeError<<S::Source as Source>::Error>> {
        Mode::Der.decode(source, Self::take_from)
    }

    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            Ok(PublicKey {
                algorithm: PublicKeyFormat::take_from(cons)?,
                bits: BitString::take_from(cons)?
            })
        })
    }

    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        encode::sequence((
            self.algorithm.encode(),
            self.bits.encode_ref()
        ))
    }

    /// Returns a bytes values of the encoded the *subjectPublicKeyInfo*.
    pub fn to_info_bytes(&self) -> Bytes {
        self.encode_ref().to_captured(Mode::Der).into_bytes()
    }
}


//------------ KeyIdentifier -------------------------------------------------

/// A key identifier.
///
/// This is the SHA-1 hash over the public key’s bits.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct KeyIdentifier([u8; 20]);

impl KeyIdentifier {
    /// Returns an octet slice of the key identifer’s value.
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_ref()
    }

    /// Takes an encoded key identifier from a constructed value.
    ///
    /// ```text
    /// KeyIdentifier ::= OCTET STRING
    /// ```
    ///
    /// The content of the octet string needs to be a SHA-1 hash, so it must
    /// be exactly 20 octets long.
    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_value_if(Tag::OCTET_STRING, Self::from_content)
    }

    /// Parses an encoded key identifer from a encoded content.
    pub fn from_content<S: decode::Source>(
        content: &mut decode::Content<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        let octets = OctetString::from_content(content)?.to_bytes();
        match <[u8; 20]>::try_from(octets.as_ref()) {
            Ok(array) => Ok(KeyIdentifier(array)),
            Err(_) => Err(content.content_err("invalid key identifier")),
        }
    }
}


//--- From

impl From<[u8; 20]> for KeyIdentifier {
    fn from(src: [u8; 20]) -> Self {
        KeyIdentifier(src)
    }
}


//--- AsRef

impl AsRef<[u8]> for KeyIdentifier {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}


//--- Display and Debug

impl fmt::Display for KeyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for ch in self.0.iter() {
            write!(f, "{:02X}", ch)?;
        }
        Ok(())
    }
}

impl fmt::Debug for KeyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "KeyIdentifier({})", self)
    }
}


//--- PrimitiveContent

impl PrimitiveContent for KeyIdentifier {
    const TAG: Tag = Tag::OCTET_STRING;

    fn encoded_len(&self, _mode: Mode) -> usize {
        20
    }

    fn write_encoded<W: io::Write>(
        &self,
        _mode: Mode,
        target: &mut W
    ) -> Result<(), io::Error> {
        target.write_all(&self.0)
    }
}


//------------ UnsupportedCurve ----------------------------------------------

/// The requested elliptic curve is not supported.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnsupportedCurve(String);

impl UnsupportedCurve {
    /// Returns the name that was asked for.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnsupportedCurve {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unsupported elliptic curve '{}'", self.0)
    }
}

impl error::Error for UnsupportedCurve { }


//------------ SignatureVerificationError ------------------------------------

/// An error happened while verifying a signature.
///
/// No further information is provided. This is on purpose.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SignatureVerificationError;

impl From<Unspecified> for SignatureVerificationError {
    fn from(_: Unspecified) -> Self {
        SignatureVerificationError
    }
}

impl fmt::Display for SignatureVerificationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("signature verification failed")
    }
}

impl error::Error for SignatureVerificationError { }


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn resolve_key_specs() {
        assert_eq!(
            KeyAlgorithmSpec::Rsa.public_key_format(),
            Ok(PublicKeyFormat::Rsa)
        );
        assert_eq!(
            KeyAlgorithmSpec::ec().public_key_format(),
            Ok(PublicKeyFormat::Ec(Curve::P256))
        );
        assert_eq!(
            KeyAlgorithmSpec::ec_named("prime256v1").public_key_format(),
            Ok(PublicKeyFormat::Ec(Curve::P256))
        );
        assert_eq!(
            KeyAlgorithmSpec::ec_named("secp384r1").public_key_format(),
            Ok(PublicKeyFormat::Ec(Curve::P384))
        );
        let err = KeyAlgorithmSpec::ec_named("brainpoolP256r1")
            .public_key_format().unwrap_err();
        assert_eq!(err.name(), "brainpoolP256r1");
    }

    #[test]
    fn algorithm_identifiers() {
        fn encode(format: PublicKeyFormat) -> Vec<u8> {
            format.encode().to_captured(Mode::Der).as_slice().to_vec()
        }

        assert_eq!(
            encode(PublicKeyFormat::Rsa),
            b"\x30\x0d\x06\x09\x2a\x86\x48\x86\xf7\x0d\x01\x01\x01\x05\x00"
        );
        for format in [
            PublicKeyFormat::Rsa,
            PublicKeyFormat::Ec(Curve::P256),
            PublicKeyFormat::Ec(Curve::P384),
        ] {
            let der = encode(format);
            assert_eq!(
                Mode::Der.decode(der.as_slice(), PublicKeyFormat::take_from)
                    .unwrap(),
                format
            );
        }
    }

    #[test]
    fn signature_algorithm_for_format() {
        assert_eq!(
            PublicKeyFormat::Rsa.signature_algorithm(),
            SignatureAlgorithm::RsaSha256
        );
        assert_eq!(
            PublicKeyFormat::Ec(Curve::P384).signature_algorithm(),
            SignatureAlgorithm::EcdsaSha384
        );
    }
}
