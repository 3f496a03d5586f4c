//! Command-line interface.
//!
//! Thin wiring only: argument definitions and dispatch into [`crate::site`].
//! Everything the subcommands do goes through the `Site` command surface.

use crate::settings::Settings;
use crate::site::Site;
use anyhow::Context;
use clap::{Parser, Subcommand};

/// A simple WordPress development environment for plugin and theme
/// developers.
#[derive(Debug, Parser)]
#[command(name = "wpdev", version, about)]
pub struct Cli {
    /// Name for the site, overriding the current folder's name
    #[arg(short, long, global = true)]
    pub name: Option<String>,

    /// Display debugging information along with detailed command output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the site's containers
    Start,
    /// Stop the site's containers, keeping their data
    Stop,
    /// Stop and remove the site's containers
    Destroy,
    /// Run a wp-cli command against the site
    #[command(disable_help_flag = true)]
    Wp {
        /// Arguments passed to wp-cli verbatim
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

impl Cli {
    /// Execute the parsed command.
    ///
    /// # Errors
    ///
    /// Surfaces settings and orchestration failures to `main`. A wp-cli
    /// command that itself exits non-zero is not an error here; its exit
    /// code becomes the process exit code.
    pub async fn run(self) -> anyhow::Result<i32> {
        let working_directory =
            std::env::current_dir().context("cannot determine the working directory")?;
        let settings = Settings::new(self.name, working_directory)?;

        let mut site = Site::connect(settings).await?;

        match self.command {
            Command::Start => {
                site.start().await?;
                println!("Your site is up: {}", site.settings().url());
                Ok(0)
            }
            Command::Stop => {
                site.stop().await?;
                Ok(0)
            }
            Command::Destroy => {
                site.destroy().await?;
                Ok(0)
            }
            Command::Wp { args } => {
                let (code, output) = site.run_wp_cli(args, false).await?;
                print!("{output}");
                Ok(code as i32)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wp_passes_hyphenated_args_through() {
        let cli = Cli::parse_from(["wpdev", "wp", "plugin", "list", "--format=json"]);
        match cli.command {
            Command::Wp { args } => {
                assert_eq!(args, vec!["plugin", "list", "--format=json"]);
            }
            _ => panic!("expected wp subcommand"),
        }
    }

    #[test]
    fn test_global_name_flag() {
        let cli = Cli::parse_from(["wpdev", "--name", "acme", "start"]);
        assert_eq!(cli.name.as_deref(), Some("acme"));
        assert!(matches!(cli.command, Command::Start));
    }
}
