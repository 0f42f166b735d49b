//! Binary entrypoint for the `stackup` provisioning CLI.

use std::process;

fn main() {
    process::exit(stackup_cli::run());
}
