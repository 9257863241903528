use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::api::models::{ProfileUpdate, Quiz, QuizResponse};
use crate::auth::FormPart;

/// Answers keyed by question id
pub type Answers = BTreeMap<u64, String>;

/// Resolve an answer given on the command line against the question's options:
/// a 1-based option number becomes that option's text, anything else is kept.
pub fn resolve_answers(quiz: &Quiz, answers: &Answers) -> Answers {
    answers
        .iter()
        .map(|(id, answer)| {
            let options = quiz
                .questions
                .iter()
                .find(|q| q.id == *id)
                .map(|q| q.option_texts())
                .unwrap_or_default();

            let resolved = answer
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| options.get(i).cloned())
                .unwrap_or_else(|| answer.clone());
            (*id, resolved)
        })
        .collect()
}

/// `[{question, answer}]` for `/ai/recommend/`, in quiz order, skipping
/// unanswered questions
pub fn quiz_responses(quiz: &Quiz, answers: &Answers) -> Vec<QuizResponse> {
    quiz.questions
        .iter()
        .filter_map(|q| {
            answers.get(&q.id).map(|answer| QuizResponse {
                question: q.question_text.clone(),
                answer: answer.clone(),
            })
        })
        .collect()
}

/// `{quiz, answers: {"<question id>": "<answer>"}}` for `/core/quiz-attempts/`
pub fn attempt_payload(quiz_id: u64, answers: &Answers) -> Value {
    let answers: Map<String, Value> = answers
        .iter()
        .map(|(id, answer)| (id.to_string(), Value::String(answer.clone())))
        .collect();

    json!({
        "quiz": quiz_id,
        "answers": answers,
    })
}

/// Multipart parts for `PATCH /core/profile/`. The profile view only parses
/// form data; interests go out as repeated `interests` fields and the image
/// as a `profile_image` file part.
pub fn profile_form(update: &ProfileUpdate) -> Vec<FormPart> {
    let mut parts = Vec::new();
    if let Some(bio) = &update.bio {
        parts.push(FormPart::text("bio", bio.as_str()));
    }
    if let Some(level) = &update.education_level {
        parts.push(FormPart::text("education_level", level.as_str()));
    }
    if let Some(interests) = &update.interests {
        for id in interests {
            parts.push(FormPart::text("interests", id.to_string()));
        }
    }
    if let Some(image) = &update.profile_image {
        parts.push(FormPart::File {
            name: "profile_image".to_string(),
            file_name: image.file_name.clone(),
            content_type: image.content_type.clone(),
            bytes: image.bytes.clone(),
        });
    }
    parts
}

/// Percentage of questions answered, rounded
pub fn progress(quiz: &Quiz, answers: &Answers) -> u32 {
    let total = quiz.questions.len();
    if total == 0 {
        return 0;
    }
    let answered = quiz.questions.iter().filter(|q| answers.contains_key(&q.id)).count();
    ((answered as f64 / total as f64) * 100.0).round() as u32
}
