//! Naming collaborator backed by a hosted Llama model on Replicate.

use fusion_engine::{topic, NameFuture, Namer, NamingError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "meta/meta-llama-3-8b-instruct";
pub const DEFAULT_BASE_URL: &str = "https://api.replicate.com";

const MAX_NEW_TOKENS: u32 = 512;

const SYSTEM_PROMPT: &str = "You are a concept generator. Generate interesting academic or \
scientific concepts by combining different fields of study. Return only valid JSON with a \
single combined concept name.";

const PROMPT_TEMPLATE: &str = "<|begin_of_text|><|start_header_id|>system<|end_header_id|>\n\n\
{system_prompt}<|eot_id|><|start_header_id|>user<|end_header_id|>\n\n\
{prompt}<|eot_id|><|start_header_id|>assistant<|end_header_id|>\n\n";

#[derive(Debug, Clone)]
pub struct ReplicateConfig {
    /// Bearer token. Without one every request fails with a configuration error.
    pub token: Option<String>,
    pub model: String,
    pub base_url: String,
    /// How many times a prediction that outlived `Prefer: wait` is re-fetched.
    pub poll_attempts: u32,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for ReplicateConfig {
    fn default() -> Self {
        Self {
            token: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_attempts: 60,
            poll_interval: Duration::from_millis(500),
            request_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Serialize)]
struct PredictionRequest<'a> {
    input: PredictionInput<'a>,
}

#[derive(Debug, Serialize)]
struct PredictionInput<'a> {
    prompt: String,
    system_prompt: &'a str,
    max_new_tokens: u32,
    prompt_template: &'a str,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    #[serde(default)]
    get: Option<String>,
}

impl Prediction {
    fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "succeeded" | "failed" | "canceled")
    }

    // Language models stream their output as an array of token strings.
    fn output_text(&self) -> String {
        match &self.output {
            Some(Value::Array(parts)) => parts.iter().filter_map(Value::as_str).collect(),
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        }
    }

    fn error_message(&self) -> String {
        match &self.error {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => "no error reported".to_string(),
            Some(other) => other.to_string(),
        }
    }
}

pub struct ReplicateNamer {
    client: reqwest::Client,
    config: ReplicateConfig,
}

impl ReplicateNamer {
    pub fn new(config: ReplicateConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    async fn generate(&self, first: &str, second: &str) -> Result<String, NamingError> {
        let token = self
            .config
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| NamingError::Config("Missing REPLICATE_API_TOKEN".to_string()))?;

        let url = format!(
            "{}/v1/models/{}/predictions",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );
        let body = PredictionRequest {
            input: PredictionInput {
                prompt: prompt(topic(first), topic(second)),
                system_prompt: SYSTEM_PROMPT,
                max_new_tokens: MAX_NEW_TOKENS,
                prompt_template: PROMPT_TEMPLATE,
            },
        };

        tracing::debug!(model = %self.config.model, "requesting prediction");
        let request = self
            .client
            .post(url)
            .bearer_auth(token)
            .header("Prefer", "wait")
            .json(&body);
        let mut prediction = fetch(request).await?;

        let mut attempts = 0;
        while !prediction.is_terminal() {
            if attempts >= self.config.poll_attempts {
                return Err(NamingError::Upstream {
                    status: prediction.status,
                    message: "prediction did not finish in time".to_string(),
                });
            }
            attempts += 1;
            let Some(get) = prediction.urls.as_ref().and_then(|u| u.get.clone()) else {
                return Err(NamingError::Upstream {
                    status: prediction.status,
                    message: "prediction has no status url".to_string(),
                });
            };
            tokio::time::sleep(self.config.poll_interval).await;
            prediction = fetch(self.client.get(get).bearer_auth(token)).await?;
        }

        if prediction.status != "succeeded" {
            let message = prediction.error_message();
            return Err(NamingError::Upstream {
                status: prediction.status,
                message,
            });
        }

        let text = prediction.output_text();
        if text.trim().is_empty() {
            return Err(NamingError::Empty);
        }
        tracing::info!(
            prediction = prediction.id.as_deref().unwrap_or("-"),
            polls = attempts,
            "prediction succeeded"
        );
        Ok(text)
    }
}

impl Namer for ReplicateNamer {
    fn name<'a>(&'a self, first: &'a str, second: &'a str) -> NameFuture<'a> {
        Box::pin(self.generate(first, second))
    }
}

async fn fetch(request: reqwest::RequestBuilder) -> Result<Prediction, NamingError> {
    let transport = |e: reqwest::Error| NamingError::Transport(e.to_string());
    request
        .send()
        .await
        .map_err(transport)?
        .error_for_status()
        .map_err(transport)?
        .json()
        .await
        .map_err(transport)
}

/// Prompt asking for a real discipline at the intersection of two topics.
pub fn prompt(first: &str, second: &str) -> String {
    format!(
        r#"IMPORTANT: Generate a REAL, EXISTING academic or professional field that represents the intersection of these topics, NOT a made-up term by combining these two topics: "{first}" and "{second}".

The new word should be a topic that represents the intersection of both fields, NOT just a simple concatenation of the words.

Examples of good combinations:
- Nature + Music = "Bioacoustics" (the study of sound in nature)
- Technology + Art = "MediaArt" (art created with new technologies)
- Science + History = "Archaeometry" (scientific analysis of archaeological finds)
- Food + Technology = "Molecular Gastronomy" (applying scientific techniques to cooking)
- Space + Biology = "Astrobiology" (study of life in the universe)

Create a word or compound term (can have a space if needed) that genuinely represents the intersection of both topics. The term should be a real discipline or concept.

Return ONLY a valid JSON object with the format:
{{
  "name": "YourNewConcept"
}}"#
    )
}
