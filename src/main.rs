mod app;
mod backend;
mod cli;
mod domain;
mod infra;
mod realtime;
#[cfg(test)]
mod test_support;
mod usecases;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    infra::secrets::install_panic_redaction_hook();

    let cli = cli::Cli::parse();
    app::run(cli)
}
