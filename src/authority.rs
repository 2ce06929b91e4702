//! Issuing and verifying certificates kept in files.
//!
//! An [`Authority`] combines the issuer and the verifier with a
//! [`PemStore`]. Its operations take file paths for all keys and
//! certificates involved. Keys are loaded into the authority’s signer only
//! for the duration of a call.

use std::{error, fmt, io};
use std::path::{Path, PathBuf};
use log::{debug, warn};
use crate::crypto::{KeyAlgorithmSpec, Signer};
use crate::crypto::softsigner::{KeyId, OpenSslSigner};
use crate::issue::{
    issue_self_signed, issue_signed, IssueError, IssuedCertificate,
    SubjectKey,
};
use crate::props::CertificateProperties;
use crate::store::{PemStore, StoreConfig, StoreError};
use crate::verify::{verify, VerificationError};


//------------ Authority -----------------------------------------------------

/// A certificate authority working on files.
pub struct Authority {
    store: PemStore,
    signer: OpenSslSigner,
}

impl Authority {
    pub fn new(config: StoreConfig) -> Self {
        Authority {
            store: PemStore::new(config),
            signer: OpenSslSigner::new(),
        }
    }

    pub fn store(&self) -> &PemStore {
        &self.store
    }

    pub fn signer(&self) -> &OpenSslSigner {
        &self.signer
    }

    /// Creates a self-signed certificate and a new key for it.
    ///
    /// The key is written to `key_path`, the certificate to `cert_path`.
    /// Returns the paths actually written to.
    pub fn generate_self_signed(
        &self,
        props: &CertificateProperties,
        serial: u64,
        path_length: u32,
        key_path: impl AsRef<Path>,
        cert_path: impl AsRef<Path>,
        key_spec: &KeyAlgorithmSpec,
    ) -> Result<(PathBuf, PathBuf), AuthorityError> {
        let issued = issue_self_signed(
            &self.signer, props, serial, path_length,
            SubjectKey::Generate(key_spec.clone())
        )?;
        self.persist(issued, key_path.as_ref(), cert_path.as_ref())
    }

    /// Creates a certificate signed by an issuer stored in files.
    #[allow(clippy::too_many_arguments)]
    pub fn generate_signed(
        &self,
        props: &CertificateProperties,
        serial: u64,
        path_length: u32,
        key_path: impl AsRef<Path>,
        cert_path: impl AsRef<Path>,
        issuer_key_path: impl AsRef<Path>,
        issuer_cert_path: impl AsRef<Path>,
    ) -> Result<(PathBuf, PathBuf), AuthorityError> {
        let issuer_cert = self.store.read_cert(issuer_cert_path)?;
        let issuer_key = self.store.read_key(&self.signer, issuer_key_path)?;
        let issued = issue_signed(
            &self.signer, props, serial, path_length, &issuer_key,
            &issuer_cert
        );
        self.release(issuer_key);
        self.persist(issued?, key_path.as_ref(), cert_path.as_ref())
    }

    /// Verifies a certificate file against its key and issuer files.
    ///
    /// Passing the certificate path as issuer path checks the certificate
    /// as a trust anchor.
    pub fn verify_certificate(
        &self,
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
        issuer_cert_path: impl AsRef<Path>,
    ) -> Result<bool, AuthorityError> {
        let cert = self.store.read_cert(cert_path.as_ref())?;
        let issuer_cert = self.store.read_cert(issuer_cert_path)?;
        let key = self.store.read_key(&self.signer, key_path)?;
        let res = verify(&self.signer, &cert, &key, &issuer_cert);
        self.release(key);
        let res = res?;
        debug!(
            "verification of {} {}",
            cert_path.as_ref().display(),
            if res { "succeeded" } else { "failed" }
        );
        Ok(res)
    }

    /// Concatenates certificate files into a chain file.
    ///
    /// The certificates should be given leaf first.
    pub fn write_chain<P: AsRef<Path>>(
        &self,
        cert_paths: &[P],
        chain_path: impl AsRef<Path>,
    ) -> Result<PathBuf, AuthorityError> {
        let certs = cert_paths.iter().map(|path| {
            self.store.read_cert(path)
        }).collect::<Result<Vec<_>, _>>()?;
        Ok(self.store.write_chain(&certs, chain_path)?)
    }

    /// Writes key and certificate of an issued certificate.
    ///
    /// Either both files are written or neither is. The key is removed from
    /// the signer in any case.
    fn persist(
        &self,
        issued: IssuedCertificate<KeyId>,
        key_path: &Path,
        cert_path: &Path,
    ) -> Result<(PathBuf, PathBuf), AuthorityError> {
        let (cert, key) = issued.into_parts();
        let key_path = self.store.write_key(&self.signer, key, key_path);
        self.release(key);
        let key_path = key_path?;
        match self.store.write_cert(&cert, cert_path) {
            Ok(cert_path) => Ok((key_path, cert_path)),
            Err(err) => {
                if let Err(err) = self.store.delete(&key_path) {
                    warn!("failed to remove orphaned key file: {}", err);
                }
                Err(err.into())
            }
        }
    }

    fn release(&self, key: KeyId) {
        if let Err(err) = self.signer.destroy_key(&key) {
            warn!("failed to release key: {}", err);
        }
    }
}


//------------ AuthorityError ------------------------------------------------

/// An authority operation failed.
#[derive(Debug)]
pub enum AuthorityError {
    /// The certificate couldn’t be issued.
    Issue(IssueError<io::Error>),

    /// A file couldn’t be read or written.
    Store(StoreError),

    /// The verification couldn’t be performed.
    Verification(VerificationError<io::Error>),
}

impl AuthorityError {
    /// Returns whether the issuance policy rejected the properties.
    pub fn is_invalid_property(&self) -> bool {
        matches!(self, AuthorityError::Issue(IssueError::InvalidProperty(_)))
    }
}

impl From<IssueError<io::Error>> for AuthorityError {
    fn from(err: IssueError<io::Error>) -> Self {
        AuthorityError::Issue(err)
    }
}

impl From<StoreError> for AuthorityError {
    fn from(err: StoreError) -> Self {
        AuthorityError::Store(err)
    }
}

impl From<VerificationError<io::Error>> for AuthorityError {
    fn from(err: VerificationError<io::Error>) -> Self {
        AuthorityError::Verification(err)
    }
}

impl fmt::Display for AuthorityError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            AuthorityError::Issue(ref err) => err.fmt(f),
            AuthorityError::Store(ref err) => err.fmt(f),
            AuthorityError::Verification(ref err) => {
                write!(f, "verification failed: {}", err)
            }
        }
    }
}

impl error::Error for AuthorityError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            AuthorityError::Issue(ref err) => Some(err),
            AuthorityError::Store(ref err) => Some(err),
            AuthorityError::Verification(ref err) => Some(err),
        }
    }
}
