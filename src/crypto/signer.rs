//! A generic interface to a signer.

use std::{error, fmt};
use super::keys::{
    KeyAlgorithmSpec, PublicKey, PublicKeyFormat, UnsupportedCurve
};
use super::signature::{Signature, SignatureAlgorithm};


//------------ Signer --------------------------------------------------------

/// A type that allow creating signatures.
///
/// The signer holds private keys and hands out identifiers for them. The
/// key material itself never needs to leave the signer except through
/// whatever means an implementation provides for persisting it.
pub trait Signer {
    /// The type used for identifying keys.
    type KeyId;

    /// An operational error happened in the signer.
    type Error: fmt::Debug + fmt::Display;

    /// Creates a new key and returns an identifier.
    fn create_key(
        &self,
        algorithm: PublicKeyFormat
    ) -> Result<Self::KeyId, Self::Error>;

    /// Returns the public key information for the given key.
    ///
    /// If the key identified by `key` does not exist, returns
    /// `KeyError::KeyNotFound`.
    fn get_key_info(
        &self,
        key: &Self::KeyId
    ) -> Result<PublicKey, KeyError<Self::Error>>;

    /// Destroys a key.
    fn destroy_key(
        &self,
        key: &Self::KeyId
    ) -> Result<(), KeyError<Self::Error>>;

    /// Signs data.
    fn sign<D: AsRef<[u8]> + ?Sized>(
        &self,
        key: &Self::KeyId,
        algorithm: SignatureAlgorithm,
        data: &D
    ) -> Result<Signature, SigningError<Self::Error>>;

    /// Creates random data.
    ///
    /// The method fills the provide bytes slice with random data.
    fn rand(&self, target: &mut [u8]) -> Result<(), Self::Error>;

    /// Generates a key pair as requested by a key algorithm spec.
    fn generate_key_pair(
        &self,
        spec: &KeyAlgorithmSpec
    ) -> Result<Self::KeyId, KeyGenerationError<Self::Error>> {
        let format = spec.public_key_format()?;
        self.create_key(format).map_err(KeyGenerationError::Signer)
    }
}


//------------ KeyError ------------------------------------------------------

#[derive(Clone, Debug)]
pub enum KeyError<S> {
    /// A key with the given key ID doesn’t exist.
    KeyNotFound,

    /// An error happened during signing.
    Signer(S)
}

impl<S> From<S> for KeyError<S> {
    fn from(err: S) -> Self {
        KeyError::Signer(err)
    }
}

impl<S: fmt::Display> fmt::Display for KeyError<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::KeyError::*;

        match *self {
            KeyNotFound => write!(f, "key not found"),
            Signer(ref s) => s.fmt(f)
        }
    }
}

impl<S: fmt::Debug + fmt::Display> error::Error for KeyError<S> { }


//------------ KeyGenerationError --------------------------------------------

/// Creating a new key pair failed.
#[derive(Clone, Debug)]
pub enum KeyGenerationError<S> {
    /// The requested curve isn’t supported.
    UnsupportedCurve(UnsupportedCurve),

    /// The signer failed to create the key.
    Signer(S)
}

impl<S> From<UnsupportedCurve> for KeyGenerationError<S> {
    fn from(err: UnsupportedCurve) -> Self {
        KeyGenerationError::UnsupportedCurve(err)
    }
}

impl<S: fmt::Display> fmt::Display for KeyGenerationError<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            KeyGenerationError::UnsupportedCurve(ref err) => err.fmt(f),
            KeyGenerationError::Signer(ref s) => {
                write!(f, "key generation failed: {}", s)
            }
        }
    }
}

impl<S: fmt::Debug + fmt::Display> error::Error for KeyGenerationError<S> { }


//------------ SigningError --------------------------------------------------

#[derive(Clone, Debug)]
pub enum SigningError<S> {
    /// A key with the given key ID doesn’t exist.
    KeyNotFound,

    /// The key cannot be used with the algorithm.
    IncompatibleKey,

    /// The key doesn’t belong to the certificate it is supposed to sign as.
    KeyMismatch,

    /// An error happened during signing.
    Signer(S)
}

impl<S> From<S> for SigningError<S> {
    fn from(err: S) -> Self {
        SigningError::Signer(err)
    }
}

impl<S> From<KeyError<S>> for SigningError<S> {
    fn from(err: KeyError<S>) -> Self {
        match err {
            KeyError::KeyNotFound => SigningError::KeyNotFound,
            KeyError::Signer(err) => SigningError::Signer(err)
        }
    }
}

impl<S: fmt::Display> fmt::Display for SigningError<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::SigningError::*;

        match *self {
            KeyNotFound => write!(f, "key not found"),
            IncompatibleKey => write!(f, "key not compatible with algorithm"),
            KeyMismatch => {
                write!(f, "key does not match the issuer certificate")
            }
            Signer(ref s) => s.fmt(f)
        }
    }
}

impl<S: fmt::Debug + fmt::Display> error::Error for SigningError<S> { }
