use clap::{Args, Subcommand};
use serde_json::json;
use std::path::PathBuf;

use crate::api::models::Role;
use crate::api::NextStepClient;
use crate::careers::{interest_responses, Career, CareerData, CareerQuery, SortOption};
use crate::cli::config::career_data_dir;
use crate::cli::utils::*;
use crate::cli::OutputFormat;

#[derive(Args)]
pub struct DataSource {
    #[arg(long, help = "Directory holding careerData.json (defaults to NEXTSTEP_CAREER_DATA_DIR)")]
    data_dir: Option<PathBuf>,
    #[arg(long = "as", value_name = "ROLE", help = "student, graduate or professional")]
    audience: Option<Role>,
}

#[derive(Subcommand)]
pub enum CareerCommands {
    #[command(about = "List careers, optionally filtered and sorted")]
    List {
        #[command(flatten)]
        source: DataSource,
        #[arg(short, long, default_value = "", help = "Match career name or a required skill")]
        search: String,
        #[arg(short, long, help = "Only this industry (see `careers industries`)")]
        industry: Option<String>,
        #[arg(long, value_enum, default_value_t = SortOption::Unsorted)]
        sort: SortOption,
        #[arg(long, help = "Do not put careers for your role first")]
        all: bool,
    },

    #[command(about = "Show one career in detail")]
    Show {
        #[command(flatten)]
        source: DataSource,
        #[arg(help = "Career name")]
        name: String,
    },

    #[command(about = "List industries to filter by")]
    Industries {
        #[command(flatten)]
        source: DataSource,
    },

    #[command(about = "Show the interest questions for an area of interest")]
    Questions {
        #[command(flatten)]
        source: DataSource,
        #[arg(long, help = "Area of interest (an industry)")]
        interest: String,
    },

    #[command(about = "Answer the interest questions and get career recommendations")]
    Recommend {
        #[command(flatten)]
        source: DataSource,
        #[arg(long, help = "Area of interest (an industry)")]
        interest: String,
        #[arg(short, long = "answer", help = "<question id>=<answer or option number>, repeatable")]
        answers: Vec<String>,
    },
}

pub async fn handle(cmd: CareerCommands, client: &NextStepClient, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        CareerCommands::List { source, search, industry, sort, all } => {
            let data = load(&source).await?;
            let query = CareerQuery {
                search,
                industry,
                sort,
                audience: source.audience,
                show_all: all,
            };
            output_careers(&output_format, &data.search(&query))
        }
        CareerCommands::Show { source, name } => {
            let data = load(&source).await?;
            let career = data
                .find(&name)
                .ok_or_else(|| anyhow::anyhow!("No career matching '{}'", name))?;
            output_record(&output_format, &career_record(career))
        }
        CareerCommands::Industries { source } => {
            let industries = load(&source).await?.industries();
            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&json!({ "industries": industries }))?),
                OutputFormat::Text => industries.iter().for_each(|i| println!("{}", i)),
            }
            Ok(())
        }
        CareerCommands::Questions { source, interest } => {
            let data = load(&source).await?;
            let questions = data.questions_for(source.audience, &interest);
            if questions.is_empty() {
                anyhow::bail!(
                    "No questions for '{}'. Pick one of: {}",
                    interest,
                    data.interests().join(", ")
                );
            }

            match output_format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&json!({ "questions": questions }))?)
                }
                OutputFormat::Text => {
                    for question in questions {
                        println!("[{}] {}", question.id, question.question);
                        for (i, option) in question.options.iter().enumerate() {
                            println!("      {}. {}", i + 1, option);
                        }
                    }
                }
            }
            Ok(())
        }
        CareerCommands::Recommend { source, interest, answers } => {
            let data = load(&source).await?;
            let questions = data.questions_for(source.audience, &interest);
            let answers = parse_answers(&answers)?;
            let responses = interest_responses(&questions, &answers)?;

            let recommendations = client.recommend(&responses).await?;
            output_recommendations(&output_format, &recommendations)
        }
    }
}

async fn load(source: &DataSource) -> anyhow::Result<CareerData> {
    let dir = match &source.data_dir {
        Some(dir) => dir.clone(),
        None => career_data_dir()?,
    };
    Ok(CareerData::load_for(&dir, source.audience).await?)
}

fn career_record(career: &Career) -> serde_json::Value {
    json!({
        "name": career.career_name,
        "industry": career.industry_or_other(),
        "average_salary": career.average_salary,
        "description": career.description,
        "skills": career.skills_required.join(", "),
        "education_path": career.education_path,
        "job_outlook": career.job_outlook,
        "day_in_the_life": career.day_in_the_life,
        "related_roles": career.related_roles.join(", "),
        "video": career.career_video,
    })
}

fn output_careers(output_format: &OutputFormat, careers: &[&Career]) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ "careers": careers }))?);
        }
        OutputFormat::Text => {
            if careers.is_empty() {
                println!("No careers match");
                return Ok(());
            }
            println!("{:<32} {:<20} {}", "CAREER", "INDUSTRY", "SALARY");
            println!("{}", "-".repeat(68));
            for career in careers {
                println!(
                    "{:<32} {:<20} {}",
                    career.career_name,
                    career.industry_or_other(),
                    career.average_salary
                );
            }
        }
    }
    Ok(())
}
