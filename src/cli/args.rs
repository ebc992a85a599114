//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::{net::IpAddr, path::PathBuf};

use crate::core::Mode;

/// pleb: server-rendered React pages
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path, relative to the project root (default: pleb.toml)
    #[arg(short = 'C', long, global = true, default_value = "pleb.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the development server, rendering every page on request
    #[command(visible_alias = "d")]
    Dev {
        #[command(flatten)]
        args: ServeArgs,
    },

    /// Build every page and start the production server
    #[command(visible_alias = "s")]
    Start {
        #[command(flatten)]
        args: ServeArgs,
    },

    /// Build every page without serving (mode from PLEB_ENV / NODE_ENV)
    #[command(visible_alias = "b")]
    Build {
        #[command(flatten)]
        build_args: BuildArgs,
    },
}

/// Shared arguments of every command
#[derive(clap::Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Project root, or a file inside it (default: current directory)
    #[arg(short, long, value_hint = clap::ValueHint::AnyPath)]
    pub entry: Option<PathBuf>,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long)]
    pub verbose: bool,
}

/// Arguments of the serving commands
#[derive(clap::Args, Debug, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub build_args: BuildArgs,

    /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
    #[arg(short, long)]
    pub interface: Option<IpAddr>,

    /// Port number to listen on
    #[arg(short, long)]
    pub port: Option<u16>,
}

impl Cli {
    pub fn build_args(&self) -> &BuildArgs {
        match &self.command {
            Commands::Dev { args } | Commands::Start { args } => &args.build_args,
            Commands::Build { build_args } => build_args,
        }
    }

    /// `dev` is always development, `start` always production.
    pub fn mode(&self) -> Mode {
        match self.command {
            Commands::Dev { .. } => Mode::Development,
            Commands::Start { .. } => Mode::Production,
            Commands::Build { .. } => Mode::from_env(),
        }
    }

    pub const fn is_serve(&self) -> bool {
        matches!(self.command, Commands::Dev { .. } | Commands::Start { .. })
    }
}
