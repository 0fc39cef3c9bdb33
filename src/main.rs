// Copyright (c) 2025 Chatmark Project. All rights reserved.
// Released under the GPL-3.0 license as described in the file LICENSE.

mod cli;

use clap::Parser;

use crate::cli::{profiles::ProfilesCommand, render::RenderCommand};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Render a model response to HTML.
    #[command(visible_alias = "r")]
    Render(RenderCommand),

    /// List the renderer profiles known to the current configuration.
    #[command(visible_alias = "p")]
    Profiles(ProfilesCommand),
}

fn main() -> eyre::Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Command::Render(command) => crate::cli::render::render(command)?,
        Command::Profiles(command) => crate::cli::profiles::profiles(command)?,
    };
    Ok(())
}
