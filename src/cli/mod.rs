pub mod commands;
pub mod config;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Parser)]
#[command(name = "nextstep")]
#[command(about = "NextStep CLI - career guidance from the command line")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(long, global = true, help = "API base URL (overrides NEXTSTEP_API_URL)")]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Authentication and token management")]
    Auth {
        #[command(subcommand)]
        cmd: commands::auth::AuthCommands,
    },

    #[command(about = "View and edit your profile")]
    Profile {
        #[command(subcommand)]
        cmd: commands::profile::ProfileCommands,
    },

    #[command(about = "Interest quiz and career recommendations")]
    Quiz {
        #[command(subcommand)]
        cmd: commands::quiz::QuizCommands,
    },

    #[command(about = "Browse the Career Bank")]
    Careers {
        #[command(subcommand)]
        cmd: commands::careers::CareerCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let client = config::build_client(cli.api_url.as_deref())?;

    let result = match cli.command {
        Commands::Auth { cmd } => commands::auth::handle(cmd, &client, output_format.clone()).await,
        Commands::Profile { cmd } => commands::profile::handle(cmd, &client, output_format.clone()).await,
        Commands::Quiz { cmd } => commands::quiz::handle(cmd, &client, output_format.clone()).await,
        Commands::Careers { cmd } => commands::careers::handle(cmd, &client, output_format.clone()).await,
    };

    result.map_err(|e| report_error(e, &output_format))
}

/// Final error for the binary to print. JSON mode also writes the structured
/// error to stdout; text mode leaves printing to the binary so each failure
/// is shown once.
fn report_error(e: anyhow::Error, output_format: &OutputFormat) -> anyhow::Error {
    let Some(api) = e.downcast_ref::<ApiError>() else {
        return e;
    };
    if matches!(output_format, OutputFormat::Json) {
        let _ = utils::output_error(output_format, &api.to_string(), Some(api.error_code()));
    }
    // The client already tried to refresh; a 401 here means the session is gone
    if api.is_unauthorized() {
        anyhow::anyhow!("Not logged in or session expired. Run `nextstep auth login <username>`")
    } else {
        e
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unauthorized_becomes_single_login_hint() {
        let err = anyhow::Error::from(ApiError::Status {
            status: 401,
            body: json!({"detail": "Given token not valid for any token type"}),
        });
        let reported = report_error(err, &OutputFormat::Text);
        assert_eq!(
            reported.to_string(),
            "Not logged in or session expired. Run `nextstep auth login <username>`"
        );
        assert!(reported.downcast_ref::<ApiError>().is_none());
    }

    #[test]
    fn test_other_errors_pass_through() {
        let err = anyhow::Error::from(ApiError::Status {
            status: 404,
            body: json!({"detail": "Not found."}),
        });
        let reported = report_error(err, &OutputFormat::Text);
        assert_eq!(reported.downcast_ref::<ApiError>().and_then(ApiError::status_code), Some(404));

        let reported = report_error(anyhow::anyhow!("No answers given"), &OutputFormat::Text);
        assert_eq!(reported.to_string(), "No answers given");
    }
}
