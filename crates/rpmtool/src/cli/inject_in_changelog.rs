// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::fs::File;
use std::path::PathBuf;

use clap::{Arg, ArgMatches, Command};
use log::info;
use thiserror::Error;

pub fn command() -> Command {
    Command::new("inject-in-changelog")
        .about("Append text to one changelog entry and rewrite the package")
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
                .help("Output RPM file path with changelog injected")
                .value_parser(clap::value_parser!(PathBuf))
                .default_value("/dev/stdout"),
        )
        .arg(
            Arg::new("changelog-text")
                .long("changelog-text")
                .value_name("TEXT")
                .help("Changelog text to inject")
                .required(true),
        )
        .arg(
            Arg::new("index")
                .long("index")
                .value_name("N")
                .help("Changelog entry to modify; negative indices wrap from the end")
                .value_parser(clap::value_parser!(i64))
                .allow_hyphen_values(true)
                .default_value("0"),
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
    let text = args
        .get_one::<String>("changelog-text")
        .cloned()
        .unwrap_or_default();
    let index = args.get_one::<i64>("index").copied().unwrap_or(0);

    let mut package = rpmfile::read(File::open(input)?)?;

    let length = package.changelog.len();
    if length == 0 {
        return Err(Error::EmptyChangelog);
    }

    let effective = if index < 0 { index + length as i64 } else { index };
    if effective < 0 || effective >= length as i64 {
        return Err(Error::IndexOutOfRange { index, length });
    }

    let entry = &mut package.changelog[effective as usize];
    entry.text = format!("{}\n{}", entry.text, text);

    package.write(&mut File::create(output)?)?;
    info!("injected changelog text at index {effective}");

    Ok(())
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("io failure")]
    Io(#[from] std::io::Error),

    #[error("format failure")]
    Read(#[from] rpmfile::read::Error),

    #[error("write failure")]
    Write(#[from] rpmfile::write::Error),

    #[error("the package carries no changelog")]
    EmptyChangelog,

    #[error("index {index} is out of range for {length} changelog entries")]
    IndexOutOfRange { index: i64, length: usize },
}
