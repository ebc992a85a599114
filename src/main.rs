//! pleb - build and serve server-rendered React pages.

#![allow(dead_code)]

mod build;
mod cli;
mod compiler;
mod config;
mod core;
mod embed;
mod logger;
mod page;
mod render;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::Cli;
use config::PlebConfig;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = PlebConfig::load(&cli)?;

    // The server binds only once the build has returned
    let (output, compiler) = cli::build::build_project(&config)?;
    if cli.is_serve() {
        cli::serve::serve(&config, output, compiler)?;
    }
    Ok(())
}
