// Copyright (c) 2025 Chatmark Project. All rights reserved.
// Released under the GPL-3.0 license as described in the file LICENSE.

use std::io::{self, Read};

use camino::Utf8PathBuf;
use chatmark::{html_flake, Renderer};
use eyre::{eyre, WrapErr};

#[derive(clap::Args)]
pub struct RenderCommand {
    /// Markdown file to render. Reads standard input when omitted or `-`.
    input: Option<Utf8PathBuf>,

    /// Model identifier used to pick the renderer profile (e.g., "gpt-4o").
    #[arg(short, long)]
    profile: Option<String>,

    /// Path to the configuration file (e.g., "Chatmark.toml").
    #[arg(short, long)]
    config: Option<Utf8PathBuf>,

    /// Write the HTML to this file instead of standard output.
    #[arg(short, long)]
    output: Option<Utf8PathBuf>,

    /// Wrap the result in a complete HTML document with styles and scripts.
    #[arg(long)]
    standalone: bool,
}

pub fn render(command: &RenderCommand) -> eyre::Result<()> {
    let registry = super::load_registry(command.config.clone())?;
    let text = read_input(command.input.as_ref())?;

    let renderer = Renderer::new(registry);
    let html = renderer.render(&text, command.profile.as_deref());
    let html = match command.standalone {
        true => html_flake::html_doc(&html, &document_title(command)),
        false => html,
    };

    match &command.output {
        Some(path) => {
            std::fs::write(path, html).wrap_err_with(|| eyre!("failed to write `{}`", path))?;
            color_print::ceprintln!("<g>Rendered</> to <c>{}</>", path);
        }
        None => println!("{}", html),
    }
    Ok(())
}

fn read_input(input: Option<&Utf8PathBuf>) -> eyre::Result<String> {
    match input {
        Some(path) if path.as_str() != "-" => std::fs::read_to_string(path)
            .wrap_err_with(|| eyre!("failed to read input file `{}`", path)),
        _ => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .wrap_err("failed to read standard input")?;
            Ok(text)
        }
    }
}

fn document_title(command: &RenderCommand) -> String {
    command
        .input
        .as_ref()
        .and_then(|path| path.file_stem())
        .filter(|stem| *stem != "-")
        .unwrap_or("chatmark")
        .to_string()
}
