use clap::Parser;
use trendsim::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
