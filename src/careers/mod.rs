//! Career Bank: the career dataset shipped alongside the client, and the
//! search, audience priority and sort rules used to browse it.
//!
//! The same file carries the interest questions for each audience. Answers
//! to those questions are sent to `/ai/recommend/` by the CLI.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::api::format::Answers;
use crate::api::models::{QuizResponse, Role};
use crate::error::ApiError;

/// File read when no audience-specific dataset exists
pub const DEFAULT_DATA_FILE: &str = "careerData.json";

/// Industry filter value that matches every career
pub const ALL_INDUSTRIES: &str = "All";

const OTHER_INDUSTRY: &str = "Other";

#[derive(Debug, Error)]
pub enum CareerDataError {
    #[error("cannot read career data {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid career data {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CareerData {
    #[serde(default)]
    pub career_bank: Vec<Career>,
    /// Interest questions keyed by audience (`student`, `graduate`, ...)
    #[serde(default)]
    pub quiz_questions: BTreeMap<String, Vec<InterestQuestion>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Career {
    #[serde(default)]
    pub id: Option<Value>,
    pub career_name: String,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub skills_required: Vec<String>,
    /// Free text such as `"$85,000"`
    #[serde(default)]
    pub average_salary: String,
    #[serde(default)]
    pub education_path: Option<Value>,
    #[serde(default)]
    pub job_outlook: Option<String>,
    #[serde(default)]
    pub day_in_the_life: Option<String>,
    #[serde(default)]
    pub related_roles: Vec<String>,
    #[serde(default)]
    pub career_video: Option<String>,
    #[serde(default)]
    pub audiences: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestQuestion {
    pub id: u64,
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    /// Industries the question applies to; empty means all of them
    #[serde(default)]
    pub industries: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SortOption {
    /// Keep dataset (or audience priority) order
    #[default]
    #[value(name = "none")]
    Unsorted,
    SalaryAsc,
    SalaryDesc,
    AlphaAsc,
    AlphaDesc,
}

/// What to show from the Career Bank
#[derive(Debug, Clone, Default)]
pub struct CareerQuery {
    /// Case-insensitive match on career name or any required skill
    pub search: String,
    /// `None` or `"All"` for every industry
    pub industry: Option<String>,
    pub sort: SortOption,
    /// Careers aimed at this audience are listed first
    pub audience: Option<Role>,
    /// Ignore audience priority
    pub show_all: bool,
}

impl Career {
    /// Industry as shown in filters; careers without one are grouped as "Other"
    pub fn industry_or_other(&self) -> &str {
        self.industry.as_deref().unwrap_or(OTHER_INDUSTRY)
    }

    /// Every digit of the salary text read as one number, 0 when there are none
    pub fn salary_value(&self) -> u64 {
        let digits: String = self.average_salary.chars().filter(char::is_ascii_digit).collect();
        digits.parse().unwrap_or(0)
    }

    pub fn is_for(&self, audience: Role) -> bool {
        self.audiences
            .iter()
            .any(|a| a.eq_ignore_ascii_case(audience.as_str()))
    }

    fn matches_search(&self, needle: &str) -> bool {
        self.career_name.to_lowercase().contains(needle)
            || self
                .skills_required
                .iter()
                .any(|skill| skill.to_lowercase().contains(needle))
    }

    fn in_industry(&self, industry: Option<&str>) -> bool {
        match industry {
            None | Some(ALL_INDUSTRIES) => true,
            Some(selected) => self.industry_or_other() == selected,
        }
    }
}

impl CareerData {
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    pub async fn load(path: &Path) -> Result<Self, CareerDataError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CareerDataError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json(&content).map_err(|source| CareerDataError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `career_<audience>.json` from `dir`, falling back to the default
    /// dataset when there is no audience or its file is missing or broken.
    pub async fn load_for(dir: &Path, audience: Option<Role>) -> Result<Self, CareerDataError> {
        if let Some(audience) = audience {
            let path = dir.join(format!("career_{}.json", audience));
            match Self::load(&path).await {
                Ok(data) => return Ok(data),
                Err(CareerDataError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                    debug!(audience = %audience, "No audience-specific career data, using default");
                }
                Err(e) => warn!("{}, using default career data", e),
            }
        }
        Self::load(&dir.join(DEFAULT_DATA_FILE)).await
    }

    /// Industry filter choices: "All", then each industry in dataset order
    pub fn industries(&self) -> Vec<String> {
        let mut industries = vec![ALL_INDUSTRIES.to_string()];
        for career in &self.career_bank {
            let industry = career.industry_or_other();
            if !industries.iter().any(|i| i == industry) {
                industries.push(industry.to_string());
            }
        }
        industries
    }

    /// Areas of interest offered before the interest questions
    pub fn interests(&self) -> Vec<String> {
        let mut interests: Vec<String> = Vec::new();
        for industry in self.career_bank.iter().filter_map(|c| c.industry.as_deref()) {
            if !interests.iter().any(|i| i == industry) {
                interests.push(industry.to_string());
            }
        }
        interests
    }

    /// Careers matching the query, in display order.
    ///
    /// Search and industry filter first. With an audience (and without
    /// `show_all`) careers for that audience come first, each group by name.
    /// The explicit sort is stable, so it keeps that grouping among equal keys.
    pub fn search(&self, query: &CareerQuery) -> Vec<&Career> {
        let needle = query.search.trim().to_lowercase();
        let mut careers: Vec<&Career> = self
            .career_bank
            .iter()
            .filter(|c| c.matches_search(&needle) && c.in_industry(query.industry.as_deref()))
            .collect();

        if let Some(audience) = query.audience.filter(|_| !query.show_all) {
            careers.sort_by(|a, b| {
                priority(a, audience)
                    .cmp(&priority(b, audience))
                    .then_with(|| compare_names(&a.career_name, &b.career_name))
            });
        }

        match query.sort {
            SortOption::Unsorted => {}
            SortOption::SalaryAsc => careers.sort_by_key(|c| c.salary_value()),
            SortOption::SalaryDesc => careers.sort_by(|a, b| b.salary_value().cmp(&a.salary_value())),
            SortOption::AlphaAsc => careers.sort_by(|a, b| compare_names(&a.career_name, &b.career_name)),
            SortOption::AlphaDesc => careers.sort_by(|a, b| compare_names(&b.career_name, &a.career_name)),
        }
        careers
    }

    /// Case-insensitive exact name match, else the first partial match
    pub fn find(&self, name: &str) -> Option<&Career> {
        let name = name.trim();
        let needle = name.to_lowercase();
        self.career_bank
            .iter()
            .find(|c| c.career_name.eq_ignore_ascii_case(name))
            .or_else(|| {
                self.career_bank
                    .iter()
                    .find(|c| c.career_name.to_lowercase().contains(&needle))
            })
    }

    /// Questions for an audience (students when unset or unknown) that apply
    /// to `interest`. No interest means no questions.
    pub fn questions_for(&self, audience: Option<Role>, interest: &str) -> Vec<&InterestQuestion> {
        if interest.trim().is_empty() {
            return Vec::new();
        }
        let key = audience.unwrap_or(Role::Student).as_str();
        let questions = self
            .quiz_questions
            .get(key)
            .or_else(|| self.quiz_questions.get(Role::Student.as_str()))
            .map(Vec::as_slice)
            .unwrap_or_default();

        questions
            .iter()
            .filter(|q| q.industries.is_empty() || q.industries.iter().any(|i| i == interest))
            .collect()
    }
}

/// Recommendation payload for the interest questions. Every question must be
/// answered; a 1-based option number is replaced by that option's text.
pub fn interest_responses(questions: &[&InterestQuestion], answers: &Answers) -> Result<Vec<QuizResponse>, ApiError> {
    if questions.is_empty() {
        return Err(ApiError::field("interest", "No questions for this area of interest"));
    }

    let missing: Vec<String> = questions
        .iter()
        .filter(|q| !answers.contains_key(&q.id))
        .map(|q| q.id.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ApiError::field(
            "answers",
            format!("Answer every question first (missing {})", missing.join(", ")),
        ));
    }

    Ok(questions
        .iter()
        .filter_map(|q| {
            answers.get(&q.id).map(|answer| QuizResponse {
                question: q.question.clone(),
                answer: resolve_option(q, answer),
            })
        })
        .collect())
}

fn resolve_option(question: &InterestQuestion, answer: &str) -> String {
    answer
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| question.options.get(i).cloned())
        .unwrap_or_else(|| answer.to_string())
}

fn priority(career: &Career, audience: Role) -> u8 {
    if career.is_for(audience) {
        0
    } else {
        1
    }
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}
