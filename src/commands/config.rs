use clap::{Args, Subcommand};

use crate::bootstrap::{PublishOutcome, Registry};
use crate::commands::CommandError;
use crate::config;

#[derive(Debug, Args, Clone)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Debug, Subcommand, Clone)]
enum ConfigSubcommand {
    /// Install the default config file
    Publish {
        /// Overwrite files that already exist
        #[arg(long)]
        force: bool,
    },
    /// Validate the config file
    Check {
        #[arg(long)]
        profile: Option<String>,
    },
}

pub fn run(args: ConfigArgs, registry: &Registry) -> Result<(), CommandError> {
    match args.command {
        ConfigSubcommand::Publish { force } => {
            let outcomes = registry.publish(force)?;
            if outcomes.is_empty() {
                return Err(CommandError::NothingToPublish);
            }
            for outcome in outcomes {
                match outcome {
                    PublishOutcome::Written(path) => println!("published: {}", path.display()),
                    PublishOutcome::Skipped(path) => {
                        println!("skipped (exists): {}", path.display())
                    }
                }
            }
            Ok(())
        }
        ConfigSubcommand::Check { profile } => {
            let path = config::validate_config(profile.as_deref())?;
            println!("config OK: {}", path.display());
            Ok(())
        }
    }
}
