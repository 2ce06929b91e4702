//! Making and checking of certificates kept in PEM files.

use std::path::PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use edgeca::authority::Authority;
use edgeca::crypto::KeyAlgorithmSpec;
use edgeca::props::{CertificateProperties, CertificateType};
use edgeca::store::StoreConfig;


//------------ main ----------------------------------------------------------

fn main() {
    if let Err(()) = Command::parse().run() {
        std::process::exit(1)
    }
}


//------------ Command -------------------------------------------------------

#[derive(Parser)]
#[command(name = "mkcert", version, about = "Creates and checks certificates.")]
struct Command {
    /// The directory relative paths are resolved against.
    #[arg(long, default_value = ".")]
    home: PathBuf,

    #[command(subcommand)]
    operation: Operation,
}

#[derive(Subcommand)]
enum Operation {
    /// Creates a self-signed certificate and its key.
    SelfSigned(SelfSigned),

    /// Creates a certificate signed by an existing CA.
    Issue(Issue),

    /// Verifies a certificate against its key and issuer.
    Verify(Verify),
}

impl Command {
    fn run(self) -> Result<(), ()> {
        let authority = Authority::new(StoreConfig::new(self.home));
        match self.operation {
            Operation::SelfSigned(op) => op.run(&authority),
            Operation::Issue(op) => op.run(&authority),
            Operation::Verify(op) => op.run(&authority),
        }
    }
}


//------------ Subject -------------------------------------------------------

/// The properties shared by all issuing operations.
#[derive(Args)]
struct Subject {
    /// The common name of the subject.
    #[arg(long)]
    cn: String,

    /// The alias of the new certificate.
    #[arg(long)]
    alias: String,

    /// The certificate type: ca, server, or client.
    #[arg(long = "type")]
    cert_type: CertificateType,

    /// The validity in seconds.
    #[arg(long, default_value_t = 365 * 24 * 3600)]
    validity: u64,

    /// The serial number.
    #[arg(long)]
    serial: u64,

    /// The path length constraint. Only allowed for CA certificates.
    #[arg(long, default_value_t = 0)]
    path_len: u32,

    #[arg(long, default_value = "")]
    country: String,

    #[arg(long, default_value = "")]
    state: String,

    #[arg(long, default_value = "")]
    locality: String,

    #[arg(long, default_value = "")]
    organization: String,

    #[arg(long, default_value = "")]
    organization_unit: String,

    /// Where to write the private key. Defaults to the alias location.
    #[arg(long)]
    key_out: Option<PathBuf>,

    /// Where to write the certificate. Defaults to the alias location.
    #[arg(long)]
    cert_out: Option<PathBuf>,
}

impl Subject {
    fn properties(&self, issuer_alias: &str) -> CertificateProperties {
        let mut props = CertificateProperties::new();
        props.set_common_name(self.cn.as_str());
        props.set_alias(self.alias.as_str());
        props.set_issuer_alias(issuer_alias);
        props.set_certificate_type(self.cert_type);
        props.set_validity_seconds(self.validity);
        props.set_country(self.country.as_str());
        props.set_state(self.state.as_str());
        props.set_locality(self.locality.as_str());
        props.set_organization(self.organization.as_str());
        props.set_organization_unit(self.organization_unit.as_str());
        props
    }

    fn key_out(&self, authority: &Authority) -> PathBuf {
        self.key_out.clone().unwrap_or_else(|| {
            authority.store().config().key_path(&self.alias)
        })
    }

    fn cert_out(&self, authority: &Authority) -> PathBuf {
        self.cert_out.clone().unwrap_or_else(|| {
            authority.store().config().cert_path(&self.alias)
        })
    }
}


//------------ SelfSigned ----------------------------------------------------

#[derive(Args)]
struct SelfSigned {
    #[command(flatten)]
    subject: Subject,

    /// The key algorithm.
    #[arg(long, value_enum, default_value_t = KeyType::Rsa)]
    key_type: KeyType,

    /// The curve of an elliptic curve key. Defaults to prime256v1.
    #[arg(long)]
    curve: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum KeyType {
    Rsa,
    Ec,
}

impl SelfSigned {
    fn run(self, authority: &Authority) -> Result<(), ()> {
        let spec = match self.key_type {
            KeyType::Rsa => KeyAlgorithmSpec::Rsa,
            KeyType::Ec => KeyAlgorithmSpec::EllipticCurve(self.curve.clone()),
        };
        let subject = &self.subject;
        match authority.generate_self_signed(
            &subject.properties(&subject.alias),
            subject.serial,
            subject.path_len,
            subject.key_out(authority),
            subject.cert_out(authority),
            &spec,
        ) {
            Ok((key, cert)) => {
                println!("{}", key.display());
                println!("{}", cert.display());
                Ok(())
            }
            Err(err) => {
                eprintln!("Failed to create certificate: {}", err);
                Err(())
            }
        }
    }
}


//------------ Issue ---------------------------------------------------------

#[derive(Args)]
struct Issue {
    #[command(flatten)]
    subject: Subject,

    /// The alias of the issuing CA.
    #[arg(long)]
    issuer_alias: String,

    /// The private key of the issuer. Defaults to the alias location.
    #[arg(long)]
    issuer_key: Option<PathBuf>,

    /// The certificate of the issuer. Defaults to the alias location.
    #[arg(long)]
    issuer_cert: Option<PathBuf>,
}

impl Issue {
    fn run(self, authority: &Authority) -> Result<(), ()> {
        let config = authority.store().config();
        let issuer_key = self.issuer_key.clone().unwrap_or_else(|| {
            config.key_path(&self.issuer_alias)
        });
        let issuer_cert = self.issuer_cert.clone().unwrap_or_else(|| {
            config.cert_path(&self.issuer_alias)
        });
        let subject = &self.subject;
        match authority.generate_signed(
            &subject.properties(&self.issuer_alias),
            subject.serial,
            subject.path_len,
            subject.key_out(authority),
            subject.cert_out(authority),
            issuer_key,
            issuer_cert,
        ) {
            Ok((key, cert)) => {
                println!("{}", key.display());
                println!("{}", cert.display());
                Ok(())
            }
            Err(err) => {
                eprintln!("Failed to issue certificate: {}", err);
                Err(())
            }
        }
    }
}


//------------ Verify --------------------------------------------------------

#[derive(Args)]
struct Verify {
    /// The certificate to verify.
    cert: PathBuf,

    /// The private key belonging to the certificate.
    key: PathBuf,

    /// The certificate of the issuer.
    ///
    /// Pass the certificate itself to check a self-signed certificate.
    issuer_cert: PathBuf,
}

impl Verify {
    fn run(self, authority: &Authority) -> Result<(), ()> {
        match authority.verify_certificate(
            &self.cert, &self.key, &self.issuer_cert
        ) {
            Ok(true) => {
                println!("ok");
                Ok(())
            }
            Ok(false) => {
                println!("failed");
                Err(())
            }
            Err(err) => {
                eprintln!("Failed to verify certificate: {}", err);
                Err(())
            }
        }
    }
}
