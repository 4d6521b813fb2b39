// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use clap::Parser;
use colored::Colorize;
use kubectl_kruise::cli::CliArgs;
use kubectl_kruise::shared::error::{error_message, exit_code_of};
use std::io::IsTerminal;
use tracing::Level;

fn log_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    tracing_subscriber::fmt()
        .with_max_level(log_level(args.verbose))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = args.execute().await {
        let message = error_message(&err.to_string());
        if std::io::stderr().is_terminal() {
            match message.strip_prefix("error:") {
                Some(rest) => eprint!("{}{}", "error:".red().bold(), rest),
                None => eprint!("{}", message),
            }
        } else {
            eprint!("{}", message);
        }
        std::process::exit(exit_code_of(&err));
    }
}
