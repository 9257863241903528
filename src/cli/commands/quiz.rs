use clap::{Args, Subcommand};
use serde_json::json;

use crate::api::format::{self, Answers};
use crate::api::models::Quiz;
use crate::api::NextStepClient;
use crate::cli::utils::*;
use crate::cli::OutputFormat;

#[derive(Args)]
pub struct QuizSelector {
    #[arg(long, help = "Quiz id (defaults to the quiz for your role)")]
    id: Option<u64>,
    #[arg(long, conflicts_with = "id", help = "Pick the quiz for a role instead of your own")]
    role: Option<String>,
}

#[derive(Subcommand)]
pub enum QuizCommands {
    #[command(about = "Show a quiz and its questions")]
    Show {
        #[command(flatten)]
        quiz: QuizSelector,
    },

    #[command(about = "Submit quiz answers")]
    Submit {
        #[command(flatten)]
        quiz: QuizSelector,
        #[arg(short, long = "answer", help = "<question id>=<answer or option number>, repeatable")]
        answers: Vec<String>,
        #[arg(long, help = "Also ask for career recommendations")]
        recommend: bool,
    },

    #[command(about = "Get career recommendations from quiz answers")]
    Recommend {
        #[command(flatten)]
        quiz: QuizSelector,
        #[arg(short, long = "answer", help = "<question id>=<answer or option number>, repeatable")]
        answers: Vec<String>,
    },
}

pub async fn handle(cmd: QuizCommands, client: &NextStepClient, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        QuizCommands::Show { quiz } => {
            let quiz = load_quiz(client, &quiz).await?;
            output_quiz(&output_format, &quiz)
        }
        QuizCommands::Submit { quiz, answers, recommend } => {
            let quiz = load_quiz(client, &quiz).await?;
            let answers = collect_answers(&quiz, &answers)?;

            let attempt = client.submit_quiz_attempt(quiz.id, &answers).await?;
            output_success(
                &output_format,
                &format!(
                    "Submitted {} answers to '{}' ({}% complete)",
                    answers.len(),
                    quiz.title,
                    format::progress(&quiz, &answers)
                ),
                Some(json!({ "attempt": attempt })),
            )?;

            if recommend {
                let recommendations = client.recommend(&format::quiz_responses(&quiz, &answers)).await?;
                output_recommendations(&output_format, &recommendations)?;
            }
            Ok(())
        }
        QuizCommands::Recommend { quiz, answers } => {
            let quiz = load_quiz(client, &quiz).await?;
            let answers = collect_answers(&quiz, &answers)?;

            let recommendations = client.recommend(&format::quiz_responses(&quiz, &answers)).await?;
            output_recommendations(&output_format, &recommendations)
        }
    }
}

async fn load_quiz(client: &NextStepClient, selector: &QuizSelector) -> anyhow::Result<Quiz> {
    if let Some(id) = selector.id {
        return Ok(client.quiz(id).await?);
    }
    if let Some(role) = &selector.role {
        return Ok(client.quiz_for_role(role).await?);
    }

    let user = client.account().await?;
    let role = user
        .role
        .ok_or_else(|| anyhow::anyhow!("Your account has no role; pass --id or --role"))?;
    Ok(client.quiz_for_role(&role).await?)
}

fn collect_answers(quiz: &Quiz, pairs: &[String]) -> anyhow::Result<Answers> {
    let answers = parse_answers(pairs)?;
    if answers.is_empty() {
        anyhow::bail!("No answers given; use --answer <question id>=<answer>");
    }
    if let Some(unknown) = answers.keys().find(|id| !quiz.questions.iter().any(|q| q.id == **id)) {
        anyhow::bail!("Quiz '{}' has no question {}", quiz.title, unknown);
    }
    Ok(format::resolve_answers(quiz, &answers))
}

fn output_quiz(output_format: &OutputFormat, quiz: &Quiz) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(quiz)?),
        OutputFormat::Text => {
            println!("{} (quiz {})", quiz.title, quiz.id);
            if !quiz.description.is_empty() {
                println!("{}", quiz.description);
            }
            println!("{}", "-".repeat(60));

            for question in &quiz.questions {
                println!("[{}] {}", question.id, question.question_text);
                for (i, option) in question.option_texts().iter().enumerate() {
                    println!("      {}. {}", i + 1, option);
                }
            }
        }
    }
    Ok(())
}
