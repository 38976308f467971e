// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use clap::Command;
use thiserror::Error;

mod dump_changelog;
mod inject_in_changelog;
mod sign;

/// Generate the CLI command structure
fn command() -> Command {
    Command::new("rpmtool")
        .about("Inspect and rewrite RPM package files")
        .arg_required_else_help(true)
        .subcommand(dump_changelog::command())
        .subcommand(inject_in_changelog::command())
        .subcommand(sign::command())
}

/// Process all CLI arguments
pub fn process() -> Result<(), Error> {
    let matches = command().try_get_matches().map_err(Error::Args)?;
    match matches.subcommand() {
        Some(("dump-changelog", args)) => {
            dump_changelog::handle(args).map_err(Error::DumpChangelog)
        }
        Some(("inject-in-changelog", args)) => {
            inject_in_changelog::handle(args).map_err(Error::InjectInChangelog)
        }
        Some(("sign", args)) => sign::handle(args).map_err(Error::Sign),
        _ => unreachable!(),
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Args(clap::Error),

    #[error("error dumping changelog: {0}")]
    DumpChangelog(#[from] dump_changelog::Error),

    #[error("error injecting changelog text: {0}")]
    InjectInChangelog(#[from] inject_in_changelog::Error),

    #[error("error signing package: {0}")]
    Sign(#[from] sign::Error),
}
