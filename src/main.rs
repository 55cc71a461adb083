use anyhow::Result;
use clap::Parser;
use te_forge::cli::Cli;

fn main() -> Result<()> {
    Cli::parse().execute()
}
