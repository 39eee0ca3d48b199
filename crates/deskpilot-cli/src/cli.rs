//! # CLI Arguments
//!
//! Command-line argument definitions using clap.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use deskpilot_desktop::Resolution;
use std::path::PathBuf;

/// deskpilot - let a computer-use model drive a Linux desktop
#[derive(Parser, Debug)]
#[command(name = "deskpilot")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file to use instead of the global and project files
    #[arg(short, long, global = true, env = "DESKPILOT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where desktop commands run (overrides config)
#[derive(clap::Args, Debug, Clone, Default)]
pub struct DesktopArgs {
    /// X display, e.g. ":1"
    #[arg(short, long)]
    pub display: Option<String>,

    /// Run desktop commands on this host over ssh (user@host)
    #[arg(long)]
    pub ssh: Option<String>,

    /// Largest display the model sees, e.g. 1280x800
    #[arg(long, value_parser = parse_resolution)]
    pub max_display: Option<Resolution>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Carry out an instruction on the desktop
    Run {
        /// What the model should do
        instruction: String,

        /// Provider to use: openai, anthropic
        #[arg(short, long)]
        provider: Option<String>,

        /// Model to use
        #[arg(short, long)]
        model: Option<String>,

        /// Maximum model turns
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Acknowledge safety checks without stopping
        #[arg(long)]
        yes: bool,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        desktop: DesktopArgs,
    },

    /// Save a screenshot as the model would see it
    Screenshot {
        /// Output PNG path
        path: PathBuf,

        /// Keep the native resolution
        #[arg(long)]
        native: bool,

        #[command(flatten)]
        desktop: DesktopArgs,
    },

    /// Print the effective configuration
    Config,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_resolution(s: &str) -> Result<Resolution, String> {
    Resolution::parse(s).ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))
}

/// Generate shell completions
pub fn generate_completions(shell: Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "deskpilot", &mut io::stdout());
}
