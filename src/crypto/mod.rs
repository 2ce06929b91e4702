//! Keys, signatures, and the signers that create them.

pub use self::keys::{
    Curve, KeyAlgorithmSpec, KeyIdentifier, PublicKey, PublicKeyFormat,
    SignatureVerificationError, UnsupportedCurve,
};
pub use self::signer::{
    KeyError, KeyGenerationError, Signer, SigningError
};
pub use self::signature::{Signature, SignatureAlgorithm};

pub mod keys;
pub mod signer;
pub mod signature;
#[cfg(feature = "softkeys")] pub mod softsigner;
