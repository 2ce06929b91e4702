//! Issuing certificates.
//!
//! The issuer turns a set of [`CertificateProperties`] into a signed
//! certificate. It decides from the certificate type which extensions the
//! certificate gets and enforces the rules a sound chain depends on before
//! any key is generated or anything is signed:
//!
//! * only CA certificates carry a path length constraint, so a non-CA
//!   certificate with a non-zero path length is refused,
//! * the validity must not be empty,
//! * the subject must have a common name and both aliases must be given,
//!   with the issuer alias naming the certificate itself exactly when it is
//!   self-signed,
//! * a signing certificate must be a CA whose own path length leaves room
//!   for a CA below it,
//! * the issuer key must belong to the issuer certificate.
//!
//! Issuance either succeeds completely or leaves nothing behind: a key
//! generated along the way is destroyed again if signing fails.

use std::{error, fmt};
use log::{debug, warn};
use crate::cert::{BasicConstraints, Cert, ExtendedKeyUsage, KeyUsage, TbsCert};
use crate::crypto::{
    KeyAlgorithmSpec, KeyGenerationError, Signer, SigningError,
};
use crate::props::{CertificateProperties, CertificateType};
use crate::x509::{Name, Serial, Time, Validity};


//------------ IssuedCertificate ---------------------------------------------

/// A freshly issued certificate and the key of its subject.
///
/// The key stays in the signer. Whoever holds this value owns it and is
/// responsible for destroying it once it has been persisted or is no longer
/// needed.
#[derive(Clone, Debug)]
pub struct IssuedCertificate<K> {
    cert: Cert,
    key: K,
}

impl<K> IssuedCertificate<K> {
    pub fn cert(&self) -> &Cert {
        &self.cert
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn into_parts(self) -> (Cert, K) {
        (self.cert, self.key)
    }
}


//------------ SubjectKey ----------------------------------------------------

/// The key a self-signed certificate is issued for.
#[derive(Clone, Debug)]
pub enum SubjectKey<'a, K> {
    /// Generate a new key pair.
    Generate(KeyAlgorithmSpec),

    /// Use a key already present in the signer.
    Existing(&'a K),
}


//------------ Issuing -------------------------------------------------------

/// Issues a self-signed certificate.
///
/// Subject and issuer are both made from `props`. The certificate is
/// signed by the subject key itself.
pub fn issue_self_signed<S: Signer>(
    signer: &S,
    props: &CertificateProperties,
    serial: impl Into<Serial>,
    path_length: u32,
    key: SubjectKey<S::KeyId>,
) -> Result<IssuedCertificate<S::KeyId>, IssueError<S::Error>>
where S::KeyId: Clone {
    issue_self_signed_at(signer, props, serial, path_length, key, Time::now())
}

/// Issues a self-signed certificate valid from the given time.
pub fn issue_self_signed_at<S: Signer>(
    signer: &S,
    props: &CertificateProperties,
    serial: impl Into<Serial>,
    path_length: u32,
    key: SubjectKey<S::KeyId>,
    now: Time,
) -> Result<IssuedCertificate<S::KeyId>, IssueError<S::Error>>
where S::KeyId: Clone {
    let profile = check_properties(props, path_length, true)?;
    let validity = make_validity(props, now)?;
    let (key, generated) = match key {
        SubjectKey::Generate(spec) => (signer.generate_key_pair(&spec)?, true),
        SubjectKey::Existing(key) => (key.clone(), false),
    };
    match sign_self_signed(
        signer, props, serial.into(), profile, validity, &key
    ) {
        Ok(cert) => {
            debug!(
                "issued self-signed {} certificate '{}' serial {}",
                profile.cert_type, props.alias(), cert.serial_number()
            );
            Ok(IssuedCertificate { cert, key })
        }
        Err(err) => {
            if generated {
                discard_key(signer, &key);
            }
            Err(err)
        }
    }
}

/// Issues a certificate signed by an issuer.
///
/// A new key is created for the subject, using the same key format as the
/// issuer certificate. The issuer name is taken from `issuer_cert`, which
/// must be a CA certificate matching `issuer_key`.
pub fn issue_signed<S: Signer>(
    signer: &S,
    props: &CertificateProperties,
    serial: impl Into<Serial>,
    path_length: u32,
    issuer_key: &S::KeyId,
    issuer_cert: &Cert,
) -> Result<IssuedCertificate<S::KeyId>, IssueError<S::Error>> {
    issue_signed_at(
        signer, props, serial, path_length, issuer_key, issuer_cert,
        Time::now()
    )
}

/// Issues a certificate signed by an issuer valid from the given time.
pub fn issue_signed_at<S: Signer>(
    signer: &S,
    props: &CertificateProperties,
    serial: impl Into<Serial>,
    path_length: u32,
    issuer_key: &S::KeyId,
    issuer_cert: &Cert,
    now: Time,
) -> Result<IssuedCertificate<S::KeyId>, IssueError<S::Error>> {
    let profile = check_properties(props, path_length, false)?;
    check_issuer(issuer_cert, profile)?;
    let validity = make_validity(props, now)?;

    let issuer_public = signer.get_key_info(issuer_key).map_err(
        SigningError::<S::Error>::from
    )?;
    if &issuer_public != issuer_cert.subject_public_key_info() {
        return Err(SigningError::KeyMismatch.into())
    }

    let key = signer.create_key(issuer_public.algorithm()).map_err(
        KeyGenerationError::Signer
    )?;
    match sign_issued(
        signer, props, serial.into(), profile, validity, &key,
        issuer_key, issuer_cert,
    ) {
        Ok(cert) => {
            debug!(
                "issued {} certificate '{}' serial {} under '{}'",
                profile.cert_type, props.alias(), cert.serial_number(),
                props.issuer_alias(),
            );
            Ok(IssuedCertificate { cert, key })
        }
        Err(err) => {
            discard_key(signer, &key);
            Err(err)
        }
    }
}

fn sign_self_signed<S: Signer>(
    signer: &S,
    props: &CertificateProperties,
    serial: Serial,
    profile: Profile,
    validity: Validity,
    key: &S::KeyId,
) -> Result<Cert, IssueError<S::Error>> {
    let public_key = signer.get_key_info(key).map_err(
        SigningError::<S::Error>::from
    )?;
    let name = Name::from_attributes(props.subject_attributes());
    let mut tbs = TbsCert::new(
        serial,
        public_key.algorithm().signature_algorithm(),
        name.clone(),
        validity,
        name,
        public_key,
    );
    tbs.set_authority_key_identifier(Some(tbs.subject_key_identifier()));
    profile.apply(&mut tbs);
    Ok(tbs.into_cert(signer, key)?)
}

#[allow(clippy::too_many_arguments)]
fn sign_issued<S: Signer>(
    signer: &S,
    props: &CertificateProperties,
    serial: Serial,
    profile: Profile,
    validity: Validity,
    key: &S::KeyId,
    issuer_key: &S::KeyId,
    issuer_cert: &Cert,
) -> Result<Cert, IssueError<S::Error>> {
    let public_key = signer.get_key_info(key).map_err(
        SigningError::<S::Error>::from
    )?;
    let mut tbs = TbsCert::new(
        serial,
        issuer_cert.subject_public_key_info().algorithm()
            .signature_algorithm(),
        issuer_cert.subject().clone(),
        validity,
        Name::from_attributes(props.subject_attributes()),
        public_key,
    );
    tbs.set_authority_key_identifier(
        Some(issuer_cert.subject_key_identifier())
    );
    profile.apply(&mut tbs);
    Ok(tbs.into_cert(signer, issuer_key)?)
}

/// Destroys a key created for an issuance that failed.
fn discard_key<S: Signer>(signer: &S, key: &S::KeyId) {
    if let Err(err) = signer.destroy_key(key) {
        warn!("failed to destroy key of failed issuance: {}", err);
    }
}


//------------ Policy --------------------------------------------------------

/// Checks the properties and returns the profile to issue with.
fn check_properties(
    props: &CertificateProperties,
    path_length: u32,
    self_signed: bool,
) -> Result<Profile, InvalidPropertyError> {
    if props.common_name().is_empty() {
        return Err(InvalidPropertyError::MissingCommonName)
    }
    if props.alias().is_empty() {
        return Err(InvalidPropertyError::MissingAlias)
    }
    if props.issuer_alias().is_empty() {
        return Err(InvalidPropertyError::MissingIssuerAlias)
    }
    if self_signed != (props.issuer_alias() == props.alias()) {
        return Err(InvalidPropertyError::IssuerAliasMismatch { self_signed })
    }
    let cert_type = props.certificate_type().ok_or(
        InvalidPropertyError::MissingCertificateType
    )?;
    match cert_type {
        CertificateType::Ca => { }
        CertificateType::Server | CertificateType::Client => {
            if path_length != 0 {
                return Err(InvalidPropertyError::PathLengthNotAllowed {
                    cert_type, path_length
                })
            }
        }
    }
    Ok(Profile { cert_type, path_length })
}

/// Checks that the issuer certificate may sign a certificate of `profile`.
fn check_issuer(
    issuer_cert: &Cert,
    profile: Profile,
) -> Result<(), InvalidPropertyError> {
    if !issuer_cert.is_ca() {
        return Err(InvalidPropertyError::IssuerNotCa)
    }
    match profile.cert_type {
        CertificateType::Ca => {
            if let Some(limit) = issuer_cert.path_len() {
                if profile.path_length >= limit {
                    return Err(InvalidPropertyError::PathLengthExceedsIssuer {
                        path_length: profile.path_length, limit
                    })
                }
            }
        }
        CertificateType::Server | CertificateType::Client => { }
    }
    Ok(())
}

fn make_validity(
    props: &CertificateProperties,
    now: Time,
) -> Result<Validity, InvalidPropertyError> {
    if props.validity_seconds() == 0 {
        return Err(InvalidPropertyError::ZeroValidity)
    }
    Validity::from_secs_at(now, props.validity_seconds()).ok_or(
        InvalidPropertyError::ValidityOutOfRange
    )
}


//------------ Profile -------------------------------------------------------

/// The extensions a certificate gets for its type.
#[derive(Clone, Copy, Debug)]
struct Profile {
    cert_type: CertificateType,
    path_length: u32,
}

impl Profile {
    fn basic_constraints(self) -> BasicConstraints {
        match self.cert_type {
            CertificateType::Ca => BasicConstraints::ca(self.path_length),
            CertificateType::Server | CertificateType::Client => {
                BasicConstraints::end_entity()
            }
        }
    }

    fn key_usage(self) -> KeyUsage {
        match self.cert_type {
            CertificateType::Ca => {
                KeyUsage::KEY_CERT_SIGN | KeyUsage::CRL_SIGN
                | KeyUsage::DIGITAL_SIGNATURE
            }
            CertificateType::Server => {
                KeyUsage::DIGITAL_SIGNATURE | KeyUsage::KEY_ENCIPHERMENT
            }
            CertificateType::Client => {
                KeyUsage::DIGITAL_SIGNATURE | KeyUsage::KEY_AGREEMENT
            }
        }
    }

    fn extended_key_usage(self) -> Option<ExtendedKeyUsage> {
        match self.cert_type {
            CertificateType::Ca => None,
            CertificateType::Server => Some(ExtendedKeyUsage::server_auth()),
            CertificateType::Client => Some(ExtendedKeyUsage::client_auth()),
        }
    }

    fn apply(self, tbs: &mut TbsCert) {
        tbs.set_basic_constraints(Some(self.basic_constraints()));
        tbs.set_key_usage(Some(self.key_usage()));
        tbs.set_extended_key_usage(self.extended_key_usage());
    }
}


//------------ InvalidPropertyError ------------------------------------------

/// The certificate properties can’t be issued.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InvalidPropertyError {
    MissingCommonName,
    MissingAlias,
    MissingIssuerAlias,

    /// The issuer alias is the alias for a signed certificate or differs
    /// from it for a self-signed one.
    IssuerAliasMismatch { self_signed: bool },

    MissingCertificateType,

    /// A path length was given for a certificate that isn’t a CA.
    PathLengthNotAllowed { cert_type: CertificateType, path_length: u32 },

    ZeroValidity,

    /// The validity ends beyond what a certificate can express.
    ValidityOutOfRange,

    /// The issuer certificate isn’t a CA certificate.
    IssuerNotCa,

    /// The issuer’s path length constraint doesn’t allow another CA with
    /// this path length below it.
    PathLengthExceedsIssuer { path_length: u32, limit: u32 },
}

impl fmt::Display for InvalidPropertyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::InvalidPropertyError::*;

        match *self {
            MissingCommonName => f.write_str("missing common name"),
            MissingAlias => f.write_str("missing alias"),
            MissingIssuerAlias => f.write_str("missing issuer alias"),
            IssuerAliasMismatch { self_signed: true } => {
                f.write_str("self-signed certificate with foreign issuer alias")
            }
            IssuerAliasMismatch { self_signed: false } => {
                f.write_str("issuer alias refers to the certificate itself")
            }
            MissingCertificateType => f.write_str("missing certificate type"),
            PathLengthNotAllowed { cert_type, path_length } => {
                write!(
                    f, "path length {} not allowed for {} certificate",
                    path_length, cert_type
                )
            }
            ZeroValidity => f.write_str("validity must not be zero"),
            ValidityOutOfRange => f.write_str("validity out of range"),
            IssuerNotCa => f.write_str("issuer is not a CA"),
            PathLengthExceedsIssuer { path_length, limit } => {
                write!(
                    f, "path length {} not allowed below issuer path length {}",
                    path_length, limit
                )
            }
        }
    }
}

impl error::Error for InvalidPropertyError { }


//------------ IssueError ----------------------------------------------------

/// Issuing a certificate failed.
#[derive(Clone, Debug)]
pub enum IssueError<S> {
    /// The properties violate the issuance policy.
    InvalidProperty(InvalidPropertyError),

    /// The subject key couldn’t be created.
    KeyGeneration(KeyGenerationError<S>),

    /// Signing the certificate failed.
    Signing(SigningError<S>),
}

impl<S> From<InvalidPropertyError> for IssueError<S> {
    fn from(err: InvalidPropertyError) -> Self {
        IssueError::InvalidProperty(err)
    }
}

impl<S> From<KeyGenerationError<S>> for IssueError<S> {
    fn from(err: KeyGenerationError<S>) -> Self {
        IssueError::KeyGeneration(err)
    }
}

impl<S> From<SigningError<S>> for IssueError<S> {
    fn from(err: SigningError<S>) -> Self {
        IssueError::Signing(err)
    }
}

impl<S: fmt::Display> fmt::Display for IssueError<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            IssueError::InvalidProperty(ref err) => {
                write!(f, "invalid certificate properties: {}", err)
            }
            IssueError::KeyGeneration(ref err) => err.fmt(f),
            IssueError::Signing(ref err) => {
                write!(f, "signing failed: {}", err)
            }
        }
    }
}

impl<S: fmt::Debug + fmt::Display> error::Error for IssueError<S> { }


//============ Tests =========================================================
