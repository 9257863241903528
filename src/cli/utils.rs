use serde_json::{json, Value};
use std::io::{self, BufRead, Write};

use crate::api::format::Answers;
use crate::api::models::Recommendation;
use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(
    output_format: &OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(Value::Object(extra)), Some(obj)) = (data, response.as_object_mut()) {
                obj.extend(extra);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(
    output_format: &OutputFormat,
    message: &str,
    error_code: Option<&str>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });

            if let Some(code) = error_code {
                response["error_code"] = json!(code);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

/// Print a record: pretty JSON, or `key: value` lines for text output
pub fn output_record(output_format: &OutputFormat, record: &Value) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(record)?),
        OutputFormat::Text => {
            if let Some(obj) = record.as_object() {
                for (key, value) in obj {
                    let shown = match value {
                        Value::Null => "-".to_string(),
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    println!("{:<18} {}", format!("{}:", key), shown);
                }
            } else {
                println!("{}", record);
            }
        }
    }
    Ok(())
}

pub fn output_recommendations(output_format: &OutputFormat, recommendations: &[Recommendation]) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ "recommendations": recommendations }))?);
        }
        OutputFormat::Text => {
            if recommendations.is_empty() {
                println!("No recommendations returned");
            }
            for (i, rec) in recommendations.iter().enumerate() {
                println!("{}. {}", i + 1, rec.career);
                println!("   {}", rec.reason);
            }
        }
    }
    Ok(())
}

/// Parse `<question id>=<answer>` pairs
pub fn parse_answers(pairs: &[String]) -> anyhow::Result<Answers> {
    pairs
        .iter()
        .map(|pair| {
            let (id, answer) = pair
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("Answer '{}' must look like <question id>=<answer>", pair))?;
            let id: u64 = id
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("Question id '{}' is not a number", id.trim()))?;
            let answer = answer.trim();
            if answer.is_empty() {
                anyhow::bail!("Answer for question {} is empty", id);
            }
            Ok((id, answer.to_string()))
        })
        .collect()
}

/// Comma-separated ids, e.g. `1,4,9`
pub fn parse_id_list(list: &str) -> anyhow::Result<Vec<i64>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().map_err(|_| anyhow::anyhow!("'{}' is not a numeric id", s)))
        .collect()
}

/// Use the provided value or read one line from stdin after a prompt
pub fn value_or_prompt(provided: Option<String>, prompt: &str) -> anyhow::Result<String> {
    if let Some(value) = provided {
        return Ok(value);
    }

    eprint!("{}: ", prompt);
    io::stderr().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let value = line.trim_end_matches(['\r', '\n']).to_string();
    if value.is_empty() {
        anyhow::bail!("{} is required", prompt);
    }
    Ok(value)
}
