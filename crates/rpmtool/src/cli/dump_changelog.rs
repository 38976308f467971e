// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::fs::File;
use std::path::PathBuf;

use chrono::DateTime;
use clap::{Arg, ArgMatches, Command};
use thiserror::Error;

pub fn command() -> Command {
    Command::new("dump-changelog")
        .about("Print the changelog entries of an RPM file")
        .arg(
            Arg::new("input-path")
                .long("input-path")
                .value_name("PATH")
                .help("Input RPM file path")
                .value_parser(clap::value_parser!(PathBuf))
                .default_value("/dev/stdin"),
        )
}

pub fn handle(args: &ArgMatches) -> Result<(), Error> {
    let path = args
        .get_one::<PathBuf>("input-path")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("/dev/stdin"));

    let package = rpmfile::read(File::open(path)?)?;

    for (index, entry) in package.changelog.iter().enumerate() {
        let time = DateTime::from_timestamp(entry.time as i64, 0).unwrap_or_default();
        println!(
            "Index: {index}\nTime: {time}\nAuthor: {author}\nContent:\n{text}\n",
            author = entry.author,
            text = entry.text,
        );
    }

    Ok(())
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("read failure")]
    Io(#[from] std::io::Error),

    #[error("format failure")]
    Format(#[from] rpmfile::read::Error),
}
