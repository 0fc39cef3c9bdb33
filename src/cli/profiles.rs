// Copyright (c) 2025 Chatmark Project. All rights reserved.
// Released under the GPL-3.0 license as described in the file LICENSE.

use camino::Utf8PathBuf;
use eyre::WrapErr;

#[derive(clap::Args)]
pub struct ProfilesCommand {
    /// Path to the configuration file (e.g., "Chatmark.toml").
    #[arg(short, long)]
    config: Option<Utf8PathBuf>,

    /// Dump every profile with its full settings as JSON.
    #[arg(long)]
    json: bool,
}

pub fn profiles(command: &ProfilesCommand) -> eyre::Result<()> {
    let registry = super::load_registry(command.config.clone())?;
    if command.json {
        let json =
            serde_json::to_string_pretty(&registry).wrap_err("failed to serialize profiles")?;
        println!("{}", json);
        return Ok(());
    }

    color_print::cprintln!("<y>(default)</>");
    for name in registry.names() {
        color_print::cprintln!("<c>{}</>", name);
    }
    Ok(())
}
