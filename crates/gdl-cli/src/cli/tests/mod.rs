//! CLI parse tests.


use clap::Parser;

use super::{Cli, CliCommand};

/// Parse helper used by the test modules.
pub(crate) fn parse(args: &[&str]) -> CliCommand {
    Cli::try_parse_from(args).expect("parse").command
}
