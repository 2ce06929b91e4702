//! Signature algorithms and operations.

use std::fmt;
use bcder::{decode, encode};
use bcder::decode::DecodeError;
use bcder::encode::PrimitiveContent;
use bcder::{Oid, Tag};
use bytes::Bytes;
use crate::oid;
use super::keys::{Curve, PublicKeyFormat};


//------------ SignatureAlgorithm --------------------------------------------

/// The signature algorithms used in certificates.
///
/// RSA keys always sign with PKCS #1 v1.5 padding over SHA-256. ECDSA keys
/// pick the digest matching the size of their curve.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SignatureAlgorithm {
    /// RSA with PKCS #1 v1.5 padding using SHA-256.
    RsaSha256,

    /// ECDSA using SHA-256.
    EcdsaSha256,

    /// ECDSA using SHA-384.
    EcdsaSha384,
}

impl SignatureAlgorithm {
    /// Returns whether a key of the given format can create signatures.
    pub fn allows_key(self, format: PublicKeyFormat) -> bool {
        matches!(
            (self, format),
            (SignatureAlgorithm::RsaSha256, PublicKeyFormat::Rsa)
            | (SignatureAlgorithm::EcdsaSha256, PublicKeyFormat::Ec(_))
            | (SignatureAlgorithm::EcdsaSha384, PublicKeyFormat::Ec(_))
        )
    }

    /// Returns the default algorithm for a key on the given curve.
    pub fn for_curve(curve: Curve) -> Self {
        PublicKeyFormat::Ec(curve).signature_algorithm()
    }
}

/// # ASN.1 Values
///
/// Signature algorithm identifiers appear in certificates as algorithm
/// identifiers defined in [RFC 5280]:
///
/// ```txt
/// AlgorithmIdentifier          ::= SEQUENCE {
///      algorithm                   OBJECT IDENTIFIER,
///      parameters                  ANY DEFINED BY algorithm OPTIONAL }
/// ```
///
/// For `sha256WithRSAEncryption` the parameters are NULL. We accept them
/// missing, too. The ECDSA identifiers from [RFC 5758] have no parameters
/// at all.
///
/// [RFC 5280]: https://tools.ietf.org/html/rfc5280
/// [RFC 5758]: https://tools.ietf.org/html/rfc5758
impl SignatureAlgorithm {
    /// Takes the algorithm identifier from a DER value in X.509 signed data.
    pub fn x509_take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(Self::x509_from_constructed)
    }

    fn x509_from_constructed<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        let alg = Oid::take_from(cons)?;
        if alg == oid::SHA256_WITH_RSA_ENCRYPTION {
            cons.take_opt_primitive_if(Tag::NULL, |_| Ok(()))?;
            Ok(SignatureAlgorithm::RsaSha256)
        }
        else if alg == oid::ECDSA_WITH_SHA256 {
            Ok(SignatureAlgorithm::EcdsaSha256)
        }
        else if alg == oid::ECDSA_WITH_SHA384 {
            Ok(SignatureAlgorithm::EcdsaSha384)
        }
        else {
            Err(cons.content_err("unsupported signature algorithm"))
        }
    }

    /// Provides an encoder for X.509 objects.
    pub fn x509_encode(self) -> impl encode::Values {
        match self {
            SignatureAlgorithm::RsaSha256 => {
                encode::Choice2::One(encode::sequence((
                    oid::SHA256_WITH_RSA_ENCRYPTION.encode(),
                    ().encode(),
                )))
            }
            SignatureAlgorithm::EcdsaSha256 => {
                encode::Choice2::Two(encode::sequence(
                    oid::ECDSA_WITH_SHA256.encode()
                ))
            }
            SignatureAlgorithm::EcdsaSha384 => {
                encode::Choice2::Two(encode::sequence(
                    oid::ECDSA_WITH_SHA384.encode()
                ))
            }
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            SignatureAlgorithm::RsaSha256 => "sha256WithRSAEncryption",
            SignatureAlgorithm::EcdsaSha256 => "ecdsa-with-SHA256",
            SignatureAlgorithm::EcdsaSha384 => "ecdsa-with-SHA384",
        })
    }
}


//------------ Signature -----------------------------------------------------

/// A signature together with the algorithm that created it.
///
/// For ECDSA, the value is the DER encoded `Ecdsa-Sig-Value`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Signature {
    algorithm: SignatureAlgorithm,
    value: Bytes
}

impl Signature {
    pub fn new(algorithm: SignatureAlgorithm, value: Bytes) -> Self {
        Signature { algorithm, value }
    }

    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }

    pub fn unwrap(self) -> (SignatureAlgorithm, Bytes) {
        (self.algorithm, self.value)
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use bcder::Mode;
    use bcder::encode::Values;
    use super::*;

    fn round_trip(alg: SignatureAlgorithm) -> SignatureAlgorithm {
        let der = alg.x509_encode().to_captured(Mode::Der);
        Mode::Der.decode(
            der.as_slice(), SignatureAlgorithm::x509_take_from
        ).unwrap()
    }

    #[test]
    fn x509_identifiers() {
        assert_eq!(
            round_trip(SignatureAlgorithm::RsaSha256),
            SignatureAlgorithm::RsaSha256
        );
        assert_eq!(
            round_trip(SignatureAlgorithm::EcdsaSha384),
            SignatureAlgorithm::EcdsaSha384
        );

        // RSA without the NULL parameters.
        let der = b"\x30\x0b\x06\x09\x2a\x86\x48\x86\xf7\x0d\x01\x01\x0b";
        assert_eq!(
            Mode::Der.decode(
                der.as_ref(), SignatureAlgorithm::x509_take_from
            ).unwrap(),
            SignatureAlgorithm::RsaSha256
        );

        // SHA-1 with RSA is rejected.
        let der = b"\x30\x0d\x06\x09\x2a\x86\x48\x86\xf7\x0d\x01\x01\x05\
                    \x05\x00";
        assert!(
            Mode::Der.decode(
                der.as_ref(), SignatureAlgorithm::x509_take_from
            ).is_err()
        );
    }

    #[test]
    fn key_compatibility() {
        assert!(SignatureAlgorithm::RsaSha256.allows_key(PublicKeyFormat::Rsa));
        assert!(
            !SignatureAlgorithm::RsaSha256.allows_key(
                PublicKeyFormat::Ec(Curve::P256)
            )
        );
        assert!(
            SignatureAlgorithm::EcdsaSha384.allows_key(
                PublicKeyFormat::Ec(Curve::P256)
            )
        );
        assert_eq!(
            SignatureAlgorithm::for_curve(Curve::P256),
            SignatureAlgorithm::EcdsaSha256
        );
    }
}
