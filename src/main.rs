//! Binary entrypoint for the semantic memory command line.

use std::process::ExitCode;

use semantic_memory::start;

/// Parse arguments, run one command and exit.
fn main() -> ExitCode {
    start::run()
}
