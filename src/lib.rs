//! Certificates for a local device identity PKI.
//!
//! This crate issues and verifies the X.509 certificates an edge device
//! needs to identify itself and its modules: a self-signed root, an
//! intermediate CA or two, and TLS server and client certificates below
//! them.
//!
//! Certificates are described by [`CertificateProperties`] and issued by
//! the functions in [`issue`], which also enforce the issuance policy. Keys
//! live in a [`Signer`], with an OpenSSL based one in
//! [`crypto::softsigner`]. The [`verify`] module checks a certificate
//! against its key and its issuer. Finally, [`store`] persists keys and
//! certificates as PEM files and [`authority`] wraps everything into
//! operations on files.
//!
//! [`CertificateProperties`]: props::CertificateProperties
//! [`Signer`]: crypto::Signer

pub mod cert;
pub mod crypto;
pub mod issue;
pub mod oid;
pub mod props;
pub mod verify;
pub mod x509;

#[cfg(feature = "softkeys")] pub mod authority;
#[cfg(feature = "softkeys")] pub mod store;
