// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use std::process::ExitCode;

mod cli;

fn main() -> ExitCode {
    if let Err(error) = color_eyre::install() {
        eprintln!("{error}");
        return ExitCode::from(2);
    }
    env_logger::init();

    match cli::process() {
        Ok(()) => ExitCode::SUCCESS,
        Err(cli::Error::Args(error)) => {
            let _ = error.print();
            ExitCode::from(1)
        }
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(2)
        }
    }
}
