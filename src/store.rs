//! Keys and certificates as PEM files.
//!
//! Private keys are stored as PKCS #8 PEM and are only readable by their
//! owner on Unix systems. Certificates are stored as `CERTIFICATE` PEM
//! blocks, a chain file being several of these one after the other.
//!
//! The store does no locking. Callers writing to the same files from
//! several places at once need to serialize that themselves.

use std::{error, fmt, fs, io};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use bytes::Bytes;
use bcder::decode::DecodeError;
use log::debug;
use pem::{EncodeConfig, LineEnding, Pem, PemError};
use crate::cert::Cert;
use crate::crypto::KeyError;
use crate::crypto::softsigner::{KeyId, OpenSslSigner};


//------------ StoreConfig ---------------------------------------------------

/// Where the store keeps its files.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct StoreConfig {
    /// The directory relative paths are resolved against.
    home_dir: PathBuf,
}

impl StoreConfig {
    pub fn new(home_dir: impl Into<PathBuf>) -> Self {
        StoreConfig { home_dir: home_dir.into() }
    }

    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    /// Returns the default path of the certificate with the given alias.
    pub fn cert_path(&self, alias: &str) -> PathBuf {
        self.home_dir.join("hsm").join("certs").join(
            format!("{}.cert.pem", alias)
        )
    }

    /// Returns the default path of the private key with the given alias.
    pub fn key_path(&self, alias: &str) -> PathBuf {
        self.home_dir.join("hsm").join("cert_keys").join(
            format!("{}.key.pem", alias)
        )
    }

    /// Resolves a path against the home directory.
    ///
    /// Absolute paths are returned unchanged.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        self.home_dir.join(path)
    }
}


//------------ PemStore ------------------------------------------------------

/// Reads and writes keys and certificates.
#[derive(Clone, Debug)]
pub struct PemStore {
    config: StoreConfig,
}

impl PemStore {
    const CERT_TAG: &'static str = "CERTIFICATE";

    const PEM_CONFIG: EncodeConfig = EncodeConfig::new().set_line_ending(
        LineEnding::LF
    );

    #[cfg(unix)]
    const KEY_MODE: u32 = 0o600;

    pub fn new(config: StoreConfig) -> Self {
        PemStore { config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Writes the private key of `key` to `path`.
    ///
    /// Missing parent directories are created. An existing file is
    /// replaced.
    pub fn write_key(
        &self,
        signer: &OpenSslSigner,
        key: KeyId,
        path: impl AsRef<Path>,
    ) -> Result<PathBuf, StoreError> {
        let path = self.config.resolve(path);
        let pem = signer.key_to_pem(key).map_err(|err| match err {
            KeyError::KeyNotFound => {
                StoreError::new(&path, ErrorKind::KeyNotFound)
            }
            KeyError::Signer(err) => StoreError::new(&path, err),
        })?;
        Self::create_dir(&path)?;
        Self::create_key_file(&path).and_then(|mut file| {
            file.write_all(&pem)?;
            file.sync_all()
        }).map_err(|err| StoreError::new(&path, err))?;
        debug!("wrote key to {}", path.display());
        Ok(path)
    }

    /// Reads a private key from `path` into `signer`.
    pub fn read_key(
        &self,
        signer: &OpenSslSigner,
        path: impl AsRef<Path>,
    ) -> Result<KeyId, StoreError> {
        let path = self.config.resolve(path);
        let pem = fs::read(&path).map_err(|err| StoreError::new(&path, err))?;
        signer.key_from_pem(&pem).map_err(|err| {
            StoreError::new(&path, ErrorKind::Key(err))
        })
    }

    /// Writes a certificate to `path`.
    pub fn write_cert(
        &self, cert: &Cert, path: impl AsRef<Path>
    ) -> Result<PathBuf, StoreError> {
        self.write_chain(std::slice::from_ref(cert), path)
    }

    /// Reads a certificate from `path`.
    ///
    /// The file must contain exactly one certificate.
    pub fn read_cert(
        &self, path: impl AsRef<Path>
    ) -> Result<Cert, StoreError> {
        let path = self.config.resolve(path);
        let mut certs = Self::read_certs(&path)?;
        match certs.len() {
            0 => Err(StoreError::new(&path, ErrorKind::NoCertificate)),
            1 => Ok(certs.remove(0)),
            _ => Err(StoreError::new(&path, ErrorKind::MultipleCertificates)),
        }
    }

    /// Writes several certificates into one file.
    ///
    /// The certificates are written in the given order, which for a chain
    /// should be leaf first.
    pub fn write_chain(
        &self, certs: &[Cert], path: impl AsRef<Path>
    ) -> Result<PathBuf, StoreError> {
        let path = self.config.resolve(path);
        let blocks: Vec<_> = certs.iter().map(|cert| {
            Pem::new(Self::CERT_TAG, cert.to_der().to_vec())
        }).collect();
        let pem = pem::encode_many_config(&blocks, Self::PEM_CONFIG);
        Self::create_dir(&path)?;
        fs::write(&path, pem).map_err(|err| StoreError::new(&path, err))?;
        debug!("wrote {} certificate(s) to {}", certs.len(), path.display());
        Ok(path)
    }

    /// Reads all certificates from a file.
    pub fn read_chain(
        &self, path: impl AsRef<Path>
    ) -> Result<Vec<Cert>, StoreError> {
        let path = self.config.resolve(path);
        let certs = Self::read_certs(&path)?;
        if certs.is_empty() {
            return Err(StoreError::new(&path, ErrorKind::NoCertificate))
        }
        Ok(certs)
    }

    /// Deletes a file.
    ///
    /// Returns whether there was a file to delete.
    pub fn delete(&self, path: impl AsRef<Path>) -> Result<bool, StoreError> {
        let path = self.config.resolve(path);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("deleted {}", path.display());
                Ok(true)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StoreError::new(&path, err)),
        }
    }

    /// Reads all `CERTIFICATE` blocks of a PEM file.
    ///
    /// Blocks with other tags, such as a private key in a bundle file, are
    /// skipped.
    fn read_certs(path: &Path) -> Result<Vec<Cert>, StoreError> {
        let data = fs::read(path).map_err(|err| StoreError::new(path, err))?;
        let blocks = pem::parse_many(data).map_err(|err| {
            StoreError::new(path, err)
        })?;
        blocks.into_iter().filter(|block| {
            block.tag() == Self::CERT_TAG
        }).map(|block| {
            Cert::decode(Bytes::from(block.into_contents())).map_err(|err| {
                StoreError::new(path, err)
            })
        }).collect()
    }

    fn create_dir(path: &Path) -> Result<(), StoreError> {
        match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => {
                fs::create_dir_all(dir).map_err(|err| {
                    StoreError::new(dir, err)
                })
            }
            _ => Ok(())
        }
    }

    #[cfg(unix)]
    fn create_key_file(path: &Path) -> Result<fs::File, io::Error> {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

        let file = OpenOptions::new()
            .write(true).create(true).truncate(true)
            .mode(Self::KEY_MODE)
            .open(path)?;
        // The mode only applies to new files.
        file.set_permissions(fs::Permissions::from_mode(Self::KEY_MODE))?;
        Ok(file)
    }

    #[cfg(not(unix))]
    fn create_key_file(path: &Path) -> Result<fs::File, io::Error> {
        OpenOptions::new().write(true).create(true).truncate(true).open(path)
    }
}


//------------ StoreError ----------------------------------------------------

/// Reading or writing a file failed.
#[derive(Debug)]
pub struct StoreError {
    path: PathBuf,
    kind: ErrorKind,
}

#[derive(Debug)]
enum ErrorKind {
    Io(io::Error),
    Pem(PemError),
    NoCertificate,
    MultipleCertificates,
    Decode(DecodeError<std::convert::Infallible>),
    Key(io::Error),
    KeyNotFound,
}

impl StoreError {
    fn new(path: &Path, kind: impl Into<ErrorKind>) -> Self {
        StoreError { path: path.into(), kind: kind.into() }
    }

    /// Returns the path of the file that caused the error.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns whether the error was caused by a missing file.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Io(ref err) if err.kind() == io::ErrorKind::NotFound
        )
    }
}

impl From<io::Error> for ErrorKind {
    fn from(err: io::Error) -> Self {
        ErrorKind::Io(err)
    }
}

impl From<PemError> for ErrorKind {
    fn from(err: PemError) -> Self {
        ErrorKind::Pem(err)
    }
}

impl From<DecodeError<std::convert::Infallible>> for ErrorKind {
    fn from(err: DecodeError<std::convert::Infallible>) -> Self {
        ErrorKind::Decode(err)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: ", self.path.display())?;
        match self.kind {
            ErrorKind::Io(ref err) => err.fmt(f),
            ErrorKind::Pem(ref err) => write!(f, "invalid PEM: {}", err),
            ErrorKind::NoCertificate => f.write_str("no certificate found"),
            ErrorKind::MultipleCertificates => {
                f.write_str("more than one certificate found")
            }
            ErrorKind::Decode(ref err) => {
                write!(f, "invalid certificate: {}", err)
            }
            ErrorKind::Key(ref err) => write!(f, "invalid key: {}", err),
            ErrorKind::KeyNotFound => f.write_str("key not found in signer"),
        }
    }
}

impl error::Error for StoreError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self.kind {
            ErrorKind::Io(ref err) | ErrorKind::Key(ref err) => Some(err),
            ErrorKind::Pem(ref err) => Some(err),
            _ => None
        }
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use crate::crypto::{KeyAlgorithmSpec, Signer};
    use crate::issue::{issue_self_signed, issue_signed, SubjectKey};
    use crate::props::{CertificateProperties, CertificateType};
    use super::*;

    fn props(
        alias: &str, issuer_alias: &str, cert_type: CertificateType
    ) -> CertificateProperties {
        let mut props = CertificateProperties::new();
        props.set_common_name(alias);
        props.set_alias(alias);
        props.set_issuer_alias(issuer_alias);
        props.set_certificate_type(cert_type);
        props.set_validity_seconds(60);
        props
    }

    #[test]
    fn alias_paths() {
        let config = StoreConfig::new("/var/lib/edge");
        assert_eq!(
            config.cert_path("ca1"),
            Path::new("/var/lib/edge/hsm/certs/ca1.cert.pem")
        );
        assert_eq!(
            config.key_path("ca1"),
            Path::new("/var/lib/edge/hsm/cert_keys/ca1.key.pem")
        );
        assert_eq!(
            config.resolve("a/b.pem"), Path::new("/var/lib/edge/a/b.pem")
        );
        assert_eq!(config.resolve("/etc/x.pem"), Path::new("/etc/x.pem"));
    }

    #[test]
    fn key_and_cert_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = PemStore::new(StoreConfig::new(dir.path()));
        let signer = OpenSslSigner::new();
        let issued = issue_self_signed(
            &signer, &props("ca1", "ca1", CertificateType::Ca), 1u64, 1,
            SubjectKey::Generate(KeyAlgorithmSpec::ec())
        ).unwrap();

        let key_path = store.write_key(
            &signer, *issued.key(), store.config().key_path("ca1")
        ).unwrap();
        let cert_path = store.write_cert(issued.cert(), "ca1.pem").unwrap();
        assert_eq!(cert_path, dir.path().join("ca1.pem"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&key_path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        let other = OpenSslSigner::new();
        let key = store.read_key(&other, &key_path).unwrap();
        assert_eq!(
            other.get_key_info(&key).unwrap(),
            signer.get_key_info(issued.key()).unwrap()
        );
        assert_eq!(&store.read_cert("ca1.pem").unwrap(), issued.cert());
    }

    #[test]
    fn chain_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = PemStore::new(StoreConfig::new(dir.path()));
        let signer = OpenSslSigner::new();
        let root = issue_self_signed(
            &signer, &props("ca1", "ca1", CertificateType::Ca), 1u64, 1,
            SubjectKey::Generate(KeyAlgorithmSpec::Rsa)
        ).unwrap();
        let leaf = issue_signed(
            &signer, &props("srv", "ca1", CertificateType::Server), 2u64, 0,
            root.key(), root.cert()
        ).unwrap();

        let certs = vec![leaf.cert().clone(), root.cert().clone()];
        store.write_chain(&certs, "chain/chain.pem").unwrap();
        assert_eq!(store.read_chain("chain/chain.pem").unwrap(), certs);

        // A chain file is not a single certificate.
        assert!(store.read_cert("chain/chain.pem").is_err());
    }

    #[test]
    fn cert_pem_format() {
        let dir = tempfile::tempdir().unwrap();
        let store = PemStore::new(StoreConfig::new(dir.path()));
        let signer = OpenSslSigner::new();
        let issued = issue_self_signed(
            &signer, &props("ca1", "ca1", CertificateType::Ca), 1u64, 1,
            SubjectKey::Generate(KeyAlgorithmSpec::Rsa)
        ).unwrap();
        let path = store.write_cert(issued.cert(), "ca1.pem").unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert!(text.starts_with("-----BEGIN CERTIFICATE-----\n"));
        assert!(text.ends_with("-----END CERTIFICATE-----\n"));
        assert!(!text.contains('\r'));
        assert!(text.lines().all(|line| line.len() <= 64));
    }

    #[test]
    fn bundle_with_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = PemStore::new(StoreConfig::new(dir.path()));
        let mut bundle = String::from("subject=CN = External Root\n");
        bundle.push_str(include_str!("../test-data/full-aki.key.pem"));
        bundle.push_str(include_str!("../test-data/full-aki.cert.pem"));
        fs::write(dir.path().join("bundle.pem"), bundle).unwrap();

        let cert = store.read_cert("bundle.pem").unwrap();
        assert_eq!(
            cert,
            Cert::decode(Bytes::from_static(
                include_bytes!("../test-data/full-aki.cer")
            )).unwrap()
        );
        assert_eq!(store.read_chain("bundle.pem").unwrap(), vec![cert]);

        let signer = OpenSslSigner::new();
        let key = store.read_key(&signer, "bundle.pem").unwrap();
        assert_eq!(
            &signer.get_key_info(&key).unwrap(),
            store.read_cert("bundle.pem").unwrap().subject_public_key_info()
        );
    }

    #[test]
    fn broken_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = PemStore::new(StoreConfig::new(dir.path()));
        let signer = OpenSslSigner::new();

        let err = store.read_cert("missing.pem").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.path(), dir.path().join("missing.pem"));

        fs::write(dir.path().join("empty.pem"), "").unwrap();
        assert!(!store.read_cert("empty.pem").unwrap_err().is_not_found());
        assert!(store.read_chain("empty.pem").is_err());
        assert!(store.read_key(&signer, "empty.pem").is_err());

        fs::write(
            dir.path().join("junk.pem"),
            "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n"
        ).unwrap();
        assert!(store.read_cert("junk.pem").is_err());
        assert_eq!(signer.key_count(), 0);
    }

    #[test]
    fn delete_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = PemStore::new(StoreConfig::new(dir.path()));
        fs::write(dir.path().join("file.pem"), "x").unwrap();
        assert!(store.delete("file.pem").unwrap());
        assert!(!store.delete("file.pem").unwrap());
    }
}
