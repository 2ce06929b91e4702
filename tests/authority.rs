//! Issuing and verifying a certificate chain through files.

#![cfg(feature = "softkeys")]

use edgeca::authority::Authority;
use edgeca::crypto::KeyAlgorithmSpec;
use edgeca::props::{CertificateProperties, CertificateType};
use edgeca::store::StoreConfig;

fn props(
    alias: &str, issuer_alias: &str, cert_type: CertificateType
) -> CertificateProperties {
    let mut props = CertificateProperties::new();
    props.set_common_name(format!("{} common name", alias));
    props.set_alias(alias);
    props.set_issuer_alias(issuer_alias);
    props.set_certificate_type(cert_type);
    props.set_validity_seconds(3600);
    props.set_country("US");
    props.set_state("Test State");
    props.set_locality("Test Locality");
    props.set_organization("Test Org");
    props.set_organization_unit("Test Org Unit");
    props
}

/// Creates root, intermediate, and server certificates in `home`.
fn make_chain(authority: &Authority, spec: &KeyAlgorithmSpec) {
    let config = authority.store().config();
    authority.generate_self_signed(
        &props("root", "root", CertificateType::Ca), 1001, 2,
        config.key_path("root"), config.cert_path("root"), spec,
    ).unwrap();
    authority.generate_signed(
        &props("int", "root", CertificateType::Ca), 1002, 1,
        config.key_path("int"), config.cert_path("int"),
        config.key_path("root"), config.cert_path("root"),
    ).unwrap();
    authority.generate_signed(
        &props("srv", "int", CertificateType::Server), 1003, 0,
        "srv.key.pem", "srv.cert.pem",
        config.key_path("int"), config.cert_path("int"),
    ).unwrap();
}

fn check_chain(spec: KeyAlgorithmSpec) {
    let dir = tempfile::tempdir().unwrap();
    let authority = Authority::new(StoreConfig::new(dir.path()));
    make_chain(&authority, &spec);
    let config = authority.store().config();
    let root_key = config.key_path("root");
    let root_cert = config.cert_path("root");
    let int_key = config.key_path("int");
    let int_cert = config.cert_path("int");

    assert!(
        authority.verify_certificate(&root_cert, &root_key, &root_cert).unwrap()
    );
    assert!(
        authority.verify_certificate(&int_cert, &int_key, &root_cert).unwrap()
    );
    assert!(
        authority.verify_certificate(
            "srv.cert.pem", "srv.key.pem", &int_cert
        ).unwrap()
    );
    assert!(
        authority.verify_certificate(
            "srv.cert.pem", "srv.key.pem", "srv.cert.pem"
        ).unwrap()
    );
    assert!(
        !authority.verify_certificate(
            "srv.cert.pem", "srv.key.pem", &root_cert
        ).unwrap()
    );
    assert!(
        !authority.verify_certificate(&int_cert, &root_key, &root_cert).unwrap()
    );

    // No keys are left behind in the signer.
    assert_eq!(authority.signer().key_count(), 0);
}

#[test]
fn rsa_chain() {
    check_chain(KeyAlgorithmSpec::Rsa)
}

#[test]
fn ec_chain() {
    check_chain(KeyAlgorithmSpec::ec())
}

#[test]
fn prime256v1_chain() {
    check_chain(KeyAlgorithmSpec::ec_named("prime256v1"))
}

#[test]
fn rejected_properties_leave_no_files() {
    let dir = tempfile::tempdir().unwrap();
    let authority = Authority::new(StoreConfig::new(dir.path()));
    let err = authority.generate_self_signed(
        &props("srv", "srv", CertificateType::Server), 1001, 2,
        "srv.key.pem", "srv.cert.pem", &KeyAlgorithmSpec::Rsa,
    ).unwrap_err();
    assert!(err.is_invalid_property());
    assert!(!dir.path().join("srv.key.pem").exists());
    assert!(!dir.path().join("srv.cert.pem").exists());
    assert_eq!(authority.signer().key_count(), 0);
}

#[test]
fn unrelated_roots() {
    let one = tempfile::tempdir().unwrap();
    let two = tempfile::tempdir().unwrap();
    let authority = Authority::new(StoreConfig::new(one.path()));
    make_chain(&authority, &KeyAlgorithmSpec::Rsa);
    make_chain(
        &Authority::new(StoreConfig::new(two.path())), &KeyAlgorithmSpec::Rsa
    );
    let other_root = StoreConfig::new(two.path()).cert_path("root");
    let config = authority.store().config();
    assert!(
        !authority.verify_certificate(
            config.cert_path("int"), config.key_path("int"), &other_root
        ).unwrap()
    );
}

#[test]
fn missing_issuer() {
    let dir = tempfile::tempdir().unwrap();
    let authority = Authority::new(StoreConfig::new(dir.path()));
    assert!(authority.generate_signed(
        &props("int", "root", CertificateType::Ca), 1002, 1,
        "int.key.pem", "int.cert.pem", "root.key.pem", "root.cert.pem",
    ).is_err());
    assert!(!dir.path().join("int.key.pem").exists());
    assert!(authority.verify_certificate(
        "int.cert.pem", "int.key.pem", "int.cert.pem"
    ).is_err());
}

#[test]
fn chain_file() {
    let dir = tempfile::tempdir().unwrap();
    let authority = Authority::new(StoreConfig::new(dir.path()));
    make_chain(&authority, &KeyAlgorithmSpec::ec());
    let config = authority.store().config();
    let paths = [
        dir.path().join("srv.cert.pem"),
        config.cert_path("int"),
        config.cert_path("root"),
    ];
    let chain_path = authority.write_chain(&paths, "chain_file.pem").unwrap();
    assert_eq!(chain_path, dir.path().join("chain_file.pem"));

    let chain = authority.store().read_chain("chain_file.pem").unwrap();
    assert_eq!(chain.len(), 3);
    for (cert, path) in chain.iter().zip(paths.iter()) {
        assert_eq!(cert, &authority.store().read_cert(path).unwrap());
    }
    assert_eq!(chain[0].issuer(), chain[1].subject());
    assert_eq!(chain[1].issuer(), chain[2].subject());
}

#[test]
fn external_root() {
    let dir = tempfile::tempdir().unwrap();
    let authority = Authority::new(StoreConfig::new(dir.path()));
    std::fs::write(
        dir.path().join("ext.cert.pem"),
        include_str!("../test-data/full-aki.cert.pem")
    ).unwrap();
    std::fs::write(
        dir.path().join("ext.key.pem"),
        include_str!("../test-data/full-aki.key.pem")
    ).unwrap();
    assert!(
        authority.verify_certificate(
            "ext.cert.pem", "ext.key.pem", "ext.cert.pem"
        ).unwrap()
    );

    authority.generate_signed(
        &props("srv", "ext", CertificateType::Server), 1003, 0,
        "srv.key.pem", "srv.cert.pem", "ext.key.pem", "ext.cert.pem",
    ).unwrap();
    assert!(
        authority.verify_certificate(
            "srv.cert.pem", "srv.key.pem", "ext.cert.pem"
        ).unwrap()
    );
    assert_eq!(authority.signer().key_count(), 0);
}
