//! Generative-text health analysis client.
//!
//! The model is instructed to answer with a bare JSON object. Responses are
//! still treated as hostile: a markdown code fence is stripped before
//! parsing, and anything that fails to parse degrades to the same JSON
//! shape carrying the raw text, so clients always see one contract.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::AiConfig;
use crate::db::models::Pet;
use crate::error::{AppError, AppResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct AiClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisBlock {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub analysis: AnalysisBlock,
    pub recommendations: Vec<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl AiClient {
    pub fn from_config(config: &AiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    /// Run the checkup prompt. Transport, auth, and quota failures are fatal
    /// for the request; only an unparseable reply degrades.
    pub async fn analyze(&self, prompt: &str) -> AppResult<AnalysisResult> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Upstream("AI service is not configured".into()))?;

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "messages": [{ "role": "user", "content": prompt }],
            }))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("AI request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Upstream(format!(
                "AI service returned status {}",
                status.as_u16()
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("AI response unreadable: {e}")))?;
        let raw = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::Upstream("AI response contained no choices".into()))?;

        Ok(parse_analysis(&raw))
    }
}

pub fn build_prompt(pet: &Pet, age_years: i64, symptoms: &[String]) -> String {
    let neutered = if pet.is_neutered {
        "neutered"
    } else {
        "not neutered"
    };
    let notes = pet.special_notes.as_deref().unwrap_or("none");
    format!(
        "You are a veterinary assistant. A {age_years}-year-old {gender} {species} \
         ({breed}, {neutered}, known conditions: {notes}) is showing these symptoms: \
         {symptoms}. Respond with a pure JSON object and no surrounding prose, in \
         exactly this shape: {{\"analysis\": {{\"title\": string, \"description\": \
         string}}, \"recommendations\": [string, string, string]}}. Provide at \
         least 3 recommendations and always advise consulting a veterinarian.",
        gender = pet.gender,
        species = pet.species,
        breed = pet.breed,
        symptoms = symptoms.join(", "),
    )
}

/// Parse the model's reply, degrading to a raw-text payload in the same
/// shape when it does not match the contract.
pub fn parse_analysis(raw: &str) -> AnalysisResult {
    let stripped = strip_code_fence(raw);
    match serde_json::from_str::<AnalysisResult>(stripped) {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!("AI reply did not match the JSON contract: {}", e);
            AnalysisResult {
                analysis: AnalysisBlock {
                    title: "Analysis could not be structured".to_string(),
                    description: raw.trim().to_string(),
                },
                recommendations: vec![],
            }
        }
    }
}

/// Strip a wrapping markdown code fence (``` or ```json) if present.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}
