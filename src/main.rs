use clap::Parser;
use treefolio::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
