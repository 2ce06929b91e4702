//! The properties of a certificate to be issued.

use std::fmt;
use std::str::FromStr;
use crate::x509::NameAttributes;


//------------ CertificateType -----------------------------------------------

/// The role of a certificate.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum CertificateType {
    /// A certificate authority that signs other certificates.
    Ca,

    /// A TLS server.
    Server,

    /// A TLS client.
    Client,
}

impl CertificateType {
    pub fn as_str(self) -> &'static str {
        match self {
            CertificateType::Ca => "ca",
            CertificateType::Server => "server",
            CertificateType::Client => "client",
        }
    }
}

impl FromStr for CertificateType {
    type Err = UnknownCertificateType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ca" => Ok(CertificateType::Ca),
            "server" => Ok(CertificateType::Server),
            "client" => Ok(CertificateType::Client),
            _ => Err(UnknownCertificateType(s.into()))
        }
    }
}

impl fmt::Display for CertificateType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


//------------ CertificateProperties -----------------------------------------

/// Everything the issuer needs to know about a certificate to be.
///
/// A new value has all fields empty or unset. The setters don’t check
/// anything; whether the properties make sense together is decided when
/// the certificate is issued.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CertificateProperties {
    common_name: String,
    alias: String,
    issuer_alias: String,
    certificate_type: Option<CertificateType>,
    validity_seconds: u64,
    country: String,
    state: String,
    locality: String,
    organization: String,
    organization_unit: String,
}

impl CertificateProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn common_name(&self) -> &str {
        &self.common_name
    }

    pub fn set_common_name(&mut self, value: impl Into<String>) {
        self.common_name = value.into()
    }

    /// Returns the alias under which the key and certificate are stored.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn set_alias(&mut self, value: impl Into<String>) {
        self.alias = value.into()
    }

    /// Returns the alias of the signing certificate.
    ///
    /// This is the same as the alias for self-signed certificates.
    pub fn issuer_alias(&self) -> &str {
        &self.issuer_alias
    }

    pub fn set_issuer_alias(&mut self, value: impl Into<String>) {
        self.issuer_alias = value.into()
    }

    pub fn certificate_type(&self) -> Option<CertificateType> {
        self.certificate_type
    }

    pub fn set_certificate_type(&mut self, value: CertificateType) {
        self.certificate_type = Some(value)
    }

    pub fn validity_seconds(&self) -> u64 {
        self.validity_seconds
    }

    pub fn set_validity_seconds(&mut self, value: u64) {
        self.validity_seconds = value
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn set_country(&mut self, value: impl Into<String>) {
        self.country = value.into()
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn set_state(&mut self, value: impl Into<String>) {
        self.state = value.into()
    }

    pub fn locality(&self) -> &str {
        &self.locality
    }

    pub fn set_locality(&mut self, value: impl Into<String>) {
        self.locality = value.into()
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    pub fn set_organization(&mut self, value: impl Into<String>) {
        self.organization = value.into()
    }

    pub fn organization_unit(&self) -> &str {
        &self.organization_unit
    }

    pub fn set_organization_unit(&mut self, value: impl Into<String>) {
        self.organization_unit = value.into()
    }

    /// Returns the attributes for the subject name.
    pub fn subject_attributes(&self) -> NameAttributes<'_> {
        NameAttributes {
            country: &self.country,
            state: &self.state,
            locality: &self.locality,
            organization: &self.organization,
            organizational_unit: &self.organization_unit,
            common_name: &self.common_name,
        }
    }
}


//------------ UnknownCertificateType ----------------------------------------

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnknownCertificateType(String);

impl fmt::Display for UnknownCertificateType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f, "unknown certificate type '{}' (expected ca, server, or client)",
            self.0
        )
    }
}

impl std::error::Error for UnknownCertificateType { }


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn new_is_empty() {
        let props = CertificateProperties::new();
        assert_eq!(props.common_name(), "");
        assert_eq!(props.alias(), "");
        assert_eq!(props.issuer_alias(), "");
        assert_eq!(props.certificate_type(), None);
        assert_eq!(props.validity_seconds(), 0);
        assert_eq!(props.organization_unit(), "");
    }

    #[test]
    fn last_write_wins() {
        let mut props = CertificateProperties::new();
        props.set_alias("first");
        props.set_alias("second");
        props.set_certificate_type(CertificateType::Server);
        props.set_certificate_type(CertificateType::Ca);
        assert_eq!(props.alias(), "second");
        assert_eq!(props.certificate_type(), Some(CertificateType::Ca));
    }

    #[test]
    fn certificate_type_names() {
        assert_eq!(CertificateType::from_str("CA"), Ok(CertificateType::Ca));
        assert_eq!(
            CertificateType::from_str("client"), Ok(CertificateType::Client)
        );
        assert!(CertificateType::from_str("router").is_err());
        assert_eq!(CertificateType::Server.to_string(), "server");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserialize_properties() {
        let props: CertificateProperties = serde_json::from_str(r#"{
            "common_name": "edge-ca",
            "alias": "ca1",
            "issuer_alias": "ca1",
            "certificate_type": "ca",
            "validity_seconds": 3600
        }"#).unwrap();
        assert_eq!(props.certificate_type(), Some(CertificateType::Ca));
        assert_eq!(props.validity_seconds(), 3600);
        assert_eq!(props.country(), "");
    }
}
