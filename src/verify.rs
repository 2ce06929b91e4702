//! One-hop certificate verification.
//!
//! [`verify`] answers whether a certificate, the key that is supposed to
//! belong to it, and the certificate that is supposed to have issued it fit
//! together. It does not build or walk chains. A certificate presented as
//! its own issuer is treated as a trust anchor. Verifying it against
//! itself checks the key and the validity period, plus the signature if the
//! certificate claims to be self-signed.

use std::{error, fmt};
use log::debug;
use crate::cert::Cert;
use crate::crypto::{KeyError, Signer};
use crate::x509::Time;


/// Verifies a certificate against its key and its issuer right now.
///
/// Returns `Ok(false)` if any check fails. An error is only returned if the
/// signer doesn’t know `subject_key` or fails otherwise.
pub fn verify<S: Signer>(
    signer: &S,
    subject_cert: &Cert,
    subject_key: &S::KeyId,
    issuer_cert: &Cert,
) -> Result<bool, VerificationError<S::Error>> {
    verify_at(signer, subject_cert, subject_key, issuer_cert, Time::now())
}

/// Verifies a certificate against its key and its issuer at a given time.
///
/// The following must hold for the result to be `true`:
///
/// * the public key of `subject_key` is the subject public key of
///   `subject_cert`,
/// * `now` lies within the validity period of `subject_cert`,
/// * either `issuer_cert` is `subject_cert` itself and, if it claims to be
///   self-signed, its own key verifies its signature, or it is a CA
///   certificate whose subject is the issuer of `subject_cert` and whose
///   key verifies the signature of `subject_cert`.
pub fn verify_at<S: Signer>(
    signer: &S,
    subject_cert: &Cert,
    subject_key: &S::KeyId,
    issuer_cert: &Cert,
    now: Time,
) -> Result<bool, VerificationError<S::Error>> {
    let public_key = signer.get_key_info(subject_key)?;
    if &public_key != subject_cert.subject_public_key_info() {
        debug!(
            "certificate {} doesn’t match the given key",
            subject_cert.serial_number()
        );
        return Ok(false)
    }
    if !subject_cert.is_valid_at(now) {
        debug!(
            "certificate {} not valid at {}",
            subject_cert.serial_number(), now
        );
        return Ok(false)
    }
    if subject_cert == issuer_cert {
        if subject_cert.is_self_signed() && subject_cert.verify_signature(
            subject_cert.subject_public_key_info()
        ).is_err() {
            debug!(
                "bad self-signature on certificate {}",
                subject_cert.serial_number()
            );
            return Ok(false)
        }
        return Ok(true)
    }
    if !subject_cert.verify_issuer_claim(issuer_cert) {
        debug!(
            "certificate {} not issued by '{}'",
            subject_cert.serial_number(), issuer_cert.subject()
        );
        return Ok(false)
    }
    if !issuer_cert.is_ca() {
        debug!("issuer '{}' is not a CA", issuer_cert.subject());
        return Ok(false)
    }
    if subject_cert.verify_signature(
        issuer_cert.subject_public_key_info()
    ).is_err() {
        debug!(
            "bad signature on certificate {}", subject_cert.serial_number()
        );
        return Ok(false)
    }
    Ok(true)
}


//------------ VerificationError ---------------------------------------------

/// Verification couldn’t be performed.
#[derive(Clone, Debug)]
pub enum VerificationError<S> {
    /// The subject key is not known to the signer.
    UnknownKey,

    /// The signer failed.
    Signer(S),
}

impl<S> From<KeyError<S>> for VerificationError<S> {
    fn from(err: KeyError<S>) -> Self {
        match err {
            KeyError::KeyNotFound => VerificationError::UnknownKey,
            KeyError::Signer(err) => VerificationError::Signer(err),
        }
    }
}

impl<S: fmt::Display> fmt::Display for VerificationError<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            VerificationError::UnknownKey => f.write_str("unknown key"),
            VerificationError::Signer(ref err) => {
                write!(f, "signer failure: {}", err)
            }
        }
    }
}

impl<S: fmt::Debug + fmt::Display> error::Error for VerificationError<S> { }


//============ Tests =========================================================

#[cfg(all(test, feature = "softkeys"))]
mod test {
    use crate::crypto::KeyAlgorithmSpec;
    use crate::crypto::softsigner::{KeyId, OpenSslSigner};
    use crate::issue::{
        issue_self_signed, issue_self_signed_at, issue_signed,
        IssuedCertificate, SubjectKey,
    };
    use crate::props::{CertificateProperties, CertificateType};
    use super::*;

    fn props(
        alias: &str, issuer_alias: &str, cert_type: CertificateType
    ) -> CertificateProperties {
        let mut props = CertificateProperties::new();
        props.set_common_name(format!("{} common name", alias));
        props.set_alias(alias);
        props.set_issuer_alias(issuer_alias);
        props.set_certificate_type(cert_type);
        props.set_validity_seconds(3600);
        props.set_organization("Test Org");
        props
    }

    struct Chain {
        root: IssuedCertificate<KeyId>,
        int: IssuedCertificate<KeyId>,
        server: IssuedCertificate<KeyId>,
    }

    fn chain(signer: &OpenSslSigner, spec: KeyAlgorithmSpec) -> Chain {
        let root = issue_self_signed(
            signer, &props("ca1", "ca1", CertificateType::Ca), 1001u64, 2,
            SubjectKey::Generate(spec)
        ).unwrap();
        let int = issue_signed(
            signer, &props("int", "ca1", CertificateType::Ca), 1002u64, 1,
            root.key(), root.cert()
        ).unwrap();
        let server = issue_signed(
            signer, &props("srv", "int", CertificateType::Server), 1003u64, 0,
            int.key(), int.cert()
        ).unwrap();
        Chain { root, int, server }
    }

    fn check_chain(spec: KeyAlgorithmSpec) {
        let signer = OpenSslSigner::new();
        let chain = chain(&signer, spec);
        let verify = |c: &IssuedCertificate<KeyId>, issuer: &Cert| {
            super::verify(&signer, c.cert(), c.key(), issuer).unwrap()
        };
        assert!(verify(&chain.root, chain.root.cert()));
        assert!(verify(&chain.int, chain.root.cert()));
        assert!(verify(&chain.server, chain.int.cert()));
        assert!(verify(&chain.server, chain.server.cert()));
        assert!(!verify(&chain.server, chain.root.cert()));
        assert!(!verify(&chain.int, chain.server.cert()));
    }

    #[test]
    fn rsa_chain() {
        check_chain(KeyAlgorithmSpec::Rsa)
    }

    #[test]
    fn default_ec_chain() {
        check_chain(KeyAlgorithmSpec::ec())
    }

    #[test]
    fn named_curve_chains() {
        check_chain(KeyAlgorithmSpec::ec_named("prime256v1"));
        check_chain(KeyAlgorithmSpec::ec_named("secp384r1"));
    }

    #[test]
    fn key_mismatch() {
        let signer = OpenSslSigner::new();
        let chain = chain(&signer, KeyAlgorithmSpec::Rsa);
        assert!(!verify(
            &signer, chain.int.cert(), chain.root.key(), chain.root.cert()
        ).unwrap());
        assert!(!verify(
            &signer, chain.root.cert(), chain.int.key(), chain.root.cert()
        ).unwrap());
    }

    #[test]
    fn unrelated_roots() {
        let signer = OpenSslSigner::new();
        let one = chain(&signer, KeyAlgorithmSpec::Rsa);
        let two = chain(&signer, KeyAlgorithmSpec::Rsa);
        assert!(!verify(
            &signer, one.int.cert(), one.int.key(), two.root.cert()
        ).unwrap());
    }

    #[test]
    fn issuer_not_ca() {
        let signer = OpenSslSigner::new();
        let chain = chain(&signer, KeyAlgorithmSpec::ec());

        // A certificate made to look issued by the server: right name,
        // signed with the server key, but the server is not a CA.
        let leaf_key = signer.create_key(
            chain.server.cert().subject_public_key_info().algorithm()
        ).unwrap();
        let mut tbs = crate::cert::TbsCert::new(
            1004u64.into(),
            chain.server.cert().signature_algorithm(),
            chain.server.cert().subject().clone(),
            chain.server.cert().validity(),
            chain.server.cert().subject().clone(),
            signer.get_key_info(&leaf_key).unwrap(),
        );
        tbs.set_authority_key_identifier(
            Some(chain.server.cert().subject_key_identifier())
        );
        let leaf = tbs.into_cert(&signer, chain.server.key()).unwrap();
        assert!(leaf.verify_signature(
            chain.server.cert().subject_public_key_info()
        ).is_ok());
        assert!(!verify(
            &signer, &leaf, &leaf_key, chain.server.cert()
        ).unwrap());
    }

    #[test]
    fn outside_validity() {
        let signer = OpenSslSigner::new();
        let start = Time::utc(2020, 1, 1, 0, 0, 0).unwrap();
        let root = issue_self_signed_at(
            &signer, &props("ca1", "ca1", CertificateType::Ca), 1u64, 0,
            SubjectKey::Generate(KeyAlgorithmSpec::Rsa), start
        ).unwrap();
        assert!(verify_at(
            &signer, root.cert(), root.key(), root.cert(), start
        ).unwrap());
        assert!(!verify(&signer, root.cert(), root.key(), root.cert()).unwrap());
    }

    #[test]
    fn broken_self_signature() {
        let signer = OpenSslSigner::new();
        let chain = chain(&signer, KeyAlgorithmSpec::Rsa);
        let mut der = chain.root.cert().to_der().to_vec();
        if let Some(last) = der.last_mut() {
            *last ^= 0x01;
        }
        let broken = Cert::decode(bytes::Bytes::from(der)).unwrap();
        assert!(broken.is_self_signed());
        assert!(!verify(&signer, &broken, chain.root.key(), &broken).unwrap());

        // A leaf checked against itself makes no self-signature claim.
        assert!(!chain.server.cert().is_self_signed());
        assert!(verify(
            &signer, chain.server.cert(), chain.server.key(),
            chain.server.cert()
        ).unwrap());
    }

    #[test]
    fn unknown_key() {
        let signer = OpenSslSigner::new();
        let chain = chain(&signer, KeyAlgorithmSpec::Rsa);
        assert!(matches!(
            verify(
                &OpenSslSigner::new(), chain.root.cert(), chain.root.key(),
                chain.root.cert()
            ),
            Err(VerificationError::UnknownKey)
        ));
    }
}
