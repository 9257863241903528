use clap::Subcommand;
use serde_json::json;
use std::path::PathBuf;

use crate::api::models::{ProfileImage, ProfileUpdate};
use crate::api::NextStepClient;
use crate::cli::utils::*;
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum ProfileCommands {
    #[command(about = "Show your profile")]
    Show,

    #[command(about = "Update profile fields")]
    Update {
        #[arg(long, help = "Short bio")]
        bio: Option<String>,
        #[arg(long, help = "none, primary, secondary, diploma, bachelors, masters, phd or other")]
        education_level: Option<String>,
        #[arg(long, help = "Comma-separated interest tag ids, e.g. 1,4,9")]
        interests: Option<String>,
        #[arg(long, help = "Path to a new profile picture")]
        image: Option<PathBuf>,
    },
}

pub async fn handle(cmd: ProfileCommands, client: &NextStepClient, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ProfileCommands::Show => {
            let profile = client.profile().await?;
            output_record(&output_format, &serde_json::to_value(&profile)?)
        }
        ProfileCommands::Update { bio, education_level, interests, image } => {
            let interests = interests.as_deref().map(parse_id_list).transpose()?;
            let profile_image = match image {
                Some(path) => Some(
                    ProfileImage::from_path(&path)
                        .await
                        .map_err(|e| anyhow::anyhow!("Cannot read image '{}': {}", path.display(), e))?,
                ),
                None => None,
            };

            let update = ProfileUpdate { bio, education_level, interests, profile_image };
            if update.is_empty() {
                anyhow::bail!("Nothing to update: pass --bio, --education-level, --interests or --image");
            }

            let profile = client.update_profile(&update).await?;
            output_success(
                &output_format,
                "Profile updated",
                Some(json!({ "profile": profile })),
            )
        }
    }
}
