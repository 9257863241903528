use clap::Subcommand;
use serde_json::json;

use crate::api::models::{RegisterRequest, Role};
use crate::api::NextStepClient;
use crate::auth::{fingerprint, inspect_access_token, FileCredentialStore};
use crate::cli::config::credentials_path;
use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::error::ApiError;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Login to server")]
    Login {
        #[arg(help = "Username")]
        username: String,
        #[arg(long, help = "Password (will prompt if not provided)")]
        password: Option<String>,
    },

    #[command(about = "Logout from server")]
    Logout,

    #[command(about = "Show current authentication status")]
    Status,

    #[command(about = "Refresh authentication token")]
    Refresh,

    #[command(about = "Show current user information")]
    Whoami,

    #[command(about = "Register new user")]
    Register {
        #[arg(help = "Username")]
        username: String,
        #[arg(help = "Email")]
        email: String,
        #[arg(long, help = "Role: student, graduate or professional")]
        role: Role,
        #[arg(long, default_value = "", help = "First name")]
        first_name: String,
        #[arg(long, default_value = "", help = "Last name")]
        last_name: String,
        #[arg(long, help = "Password (will prompt if not provided)")]
        password: Option<String>,
        #[arg(long, help = "Password confirmation (will prompt if not provided)")]
        password2: Option<String>,
    },

    #[command(about = "Change the password of the logged-in user")]
    ChangePassword {
        #[arg(long, help = "Current password (will prompt if not provided)")]
        old_password: Option<String>,
        #[arg(long, help = "New password (will prompt if not provided)")]
        new_password: Option<String>,
    },

    #[command(about = "Email a password reset link")]
    ResetPassword {
        #[arg(help = "Account email")]
        email: String,
    },

    #[command(about = "Set a new password using the uid and token from a reset link")]
    ConfirmReset {
        #[arg(help = "uid from the reset link")]
        uid: String,
        #[arg(help = "token from the reset link")]
        token: String,
        #[arg(long, help = "New password (will prompt if not provided)")]
        new_password: Option<String>,
    },
}

pub async fn handle(cmd: AuthCommands, client: &NextStepClient, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AuthCommands::Login { username, password } => {
            let password = value_or_prompt(password, "Password")?;
            let tokens = client.login(&username, &password).await?;

            output_success(
                &output_format,
                &format!("Logged in as '{}'", username),
                Some(json!({
                    "username": username,
                    "refresh_token_stored": tokens.refresh.is_some(),
                })),
            )
        }
        AuthCommands::Logout => match client.logout().await {
            Ok(()) => output_success(&output_format, "Logged out", None),
            Err(e @ ApiError::Credentials(_)) => Err(e.into()),
            Err(e) => output_success(
                &output_format,
                &format!("Logged out locally (server logout failed: {})", e),
                Some(json!({ "server_logout": false })),
            ),
        },
        AuthCommands::Status => {
            let Some(pair) = client.credentials().await? else {
                return output_success(&output_format, "Not logged in", Some(json!({ "logged_in": false })));
            };

            let claims = inspect_access_token(&pair.access_token);
            let stored_at = FileCredentialStore::new(credentials_path()?).stored_at().await?;

            let details = json!({
                "logged_in": true,
                "access_token": fingerprint(&pair.access_token),
                "refresh_token": pair.refresh_token.is_some(),
                "expires_at": claims.as_ref().and_then(|c| c.expires_at()),
                "expired": claims.as_ref().map(|c| c.is_expired()),
                "stored_at": stored_at,
            });
            output_record(&output_format, &details)
        }
        AuthCommands::Refresh => match client.refresh().await {
            Some(token) => output_success(
                &output_format,
                "Access token refreshed",
                Some(json!({ "access_token": fingerprint(&token) })),
            ),
            None => Err(anyhow::anyhow!(
                "Session could not be refreshed and has been cleared. Run `nextstep auth login <username>`"
            )),
        },
        AuthCommands::Whoami => {
            let user = client.account().await?;
            output_record(&output_format, &serde_json::to_value(&user)?)
        }
        AuthCommands::Register { username, email, role, first_name, last_name, password, password2 } => {
            let password = value_or_prompt(password, "Password")?;
            let password2 = value_or_prompt(password2, "Confirm password")?;

            let request = RegisterRequest {
                first_name,
                last_name,
                username: username.clone(),
                email,
                password,
                password2,
                role,
            };
            match client.register(&request).await {
                Ok(_) => output_success(
                    &output_format,
                    &format!("Registered '{}'. Log in with `nextstep auth login {}`", username, username),
                    Some(json!({ "username": username, "role": role })),
                ),
                Err(e) => {
                    let fields = e.field_errors();
                    if fields.is_empty() {
                        return Err(e.into());
                    }
                    let mut lines: Vec<String> = fields.iter().map(|(f, m)| format!("{}: {}", f, m)).collect();
                    lines.sort();
                    Err(anyhow::anyhow!("Registration rejected\n  {}", lines.join("\n  ")))
                }
            }
        }
        AuthCommands::ChangePassword { old_password, new_password } => {
            let old_password = value_or_prompt(old_password, "Current password")?;
            let new_password = value_or_prompt(new_password, "New password")?;
            let detail = client.change_password(&old_password, &new_password).await?;
            output_success(&output_format, &detail, None)
        }
        AuthCommands::ResetPassword { email } => {
            let detail = client.request_password_reset(&email).await?;
            output_success(&output_format, &detail, None)
        }
        AuthCommands::ConfirmReset { uid, token, new_password } => {
            let new_password = value_or_prompt(new_password, "New password")?;
            let detail = client.confirm_password_reset(&uid, &token, &new_password).await?;
            output_success(&output_format, &detail, None)
        }
    }
}
