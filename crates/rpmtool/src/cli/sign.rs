// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::fs::{self, File};
use std::io::Cursor;
use std::path::PathBuf;

use chrono::SubsecRound;
use clap::{Arg, ArgMatches, Command};
use log::info;
use pgp::crypto::HashAlgorithm;
use pgp::packet::{SignatureConfig, SignatureType, Subpacket};
use pgp::ser::Serialize;
use pgp::types::{KeyTrait, KeyVersion, SecretParams};
use pgp::{Deserializable, SignedSecretKey, StandaloneSignature};
use rpmfile::{SignError, Signer};
use smallvec::SmallVec;
use thiserror::Error;

pub fn command() -> Command {
    Command::new("sign")
        .about("Rewrite a package with a detached OpenPGP signature")
        .arg(
            Arg::new("input-path")
                .long("input-path")
                .value_name("PATH")
                .help("Input RPM file path")
                .value_parser(clap::value_parser!(PathBuf))
                .default_value("/dev/stdin"),
        )
        .arg(
            Arg::new("output-path")
                .long("output-path")
                .value_name("PATH")
                .help("Output RPM file path")
                .value_parser(clap::value_parser!(PathBuf))
                .default_value("/dev/stdout"),
        )
        .arg(
            Arg::new("private-key-path")
                .long("private-key-path")
                .value_name("PATH")
                .help("ASCII armored private key")
                .value_parser(clap::value_parser!(PathBuf))
                .required(true),
        )
}

pub fn handle(args: &ArgMatches) -> Result<(), Error> {
    let input = args
        .get_one::<PathBuf>("input-path")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("/dev/stdin"));
    let output = args
        .get_one::<PathBuf>("output-path")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("/dev/stdout"));
    let key_path = args
        .get_one::<PathBuf>("private-key-path")
        .cloned()
        .unwrap_or_default();

    let armored = fs::read_to_string(key_path)?;
    let (key, _headers) = SignedSecretKey::from_armor_single(Cursor::new(armored.into_bytes()))?;
    if matches!(key.primary_key.secret_params(), SecretParams::Encrypted(_)) {
        return Err(Error::LockedKey);
    }

    let mut package = rpmfile::read(File::open(input)?)?;
    package.set_signer(Signer::pgp(move |bytes| {
        info!("signing {} bytes of package content", bytes.len());
        detached_signature(&key, bytes).map_err(|error| SignError(error.to_string()))
    }));

    package.write(&mut File::create(output)?)?;

    Ok(())
}

/// Produce a binary detached signature packet over `bytes`
fn detached_signature(key: &SignedSecretKey, bytes: &[u8]) -> Result<Vec<u8>, pgp::errors::Error> {
    let hashed_subpackets = vec![
        Subpacket::IssuerFingerprint(KeyVersion::V4, SmallVec::from_slice(&key.fingerprint())),
        Subpacket::SignatureCreationTime(chrono::Utc::now().trunc_subsecs(0)),
    ];
    let unhashed_subpackets = vec![Subpacket::Issuer(key.key_id())];

    let config = SignatureConfig::new_v4(
        Default::default(),
        SignatureType::Binary,
        key.algorithm(),
        HashAlgorithm::SHA2_256,
        hashed_subpackets,
        unhashed_subpackets,
    );

    let signature = config.sign(key, String::new, Cursor::new(bytes.to_vec()))?;

    StandaloneSignature::new(signature).to_bytes()
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("io failure")]
    Io(#[from] std::io::Error),

    #[error("key failure: {0}")]
    Key(#[from] pgp::errors::Error),

    #[error("private key is passphrase locked")]
    LockedKey,

    #[error("format failure")]
    Read(#[from] rpmfile::read::Error),

    #[error("write failure")]
    Write(#[from] rpmfile::write::Error),
}
