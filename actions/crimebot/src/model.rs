use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;

use crate::error::{Error, Result};
use crate::hub::blocking_client;

/// Text-in, text-out generation. The assistant only ever sees this.
pub trait TextModel {
    fn generate(&self, prompt: &str, max_new_tokens: usize) -> Result<String>;
}

impl<M: TextModel + ?Sized> TextModel for Box<M> {
    fn generate(&self, prompt: &str, max_new_tokens: usize) -> Result<String> {
        (**self).generate(prompt, max_new_tokens)
    }
}

#[derive(Debug, Deserialize)]
struct Generation {
    generated_text: String,
}

/// Hugging Face Inference API client for text2text / text-generation models
pub struct HfInferenceModel {
    client: Client,
    endpoint: String,
    model: String,
    token: Option<String>,
}

impl HfInferenceModel {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: blocking_client(),
            endpoint: endpoint.into(),
            model: model.into(),
            token,
        }
    }

    fn url(&self) -> String {
        format!("{}/models/{}", self.endpoint.trim_end_matches('/'), self.model)
    }
}

impl TextModel for HfInferenceModel {
    fn generate(&self, prompt: &str, max_new_tokens: usize) -> Result<String> {
        let body = json!({
            "inputs": prompt,
            "parameters": { "max_new_tokens": max_new_tokens },
        });

        let mut request = self.client.post(self.url()).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::Model(format!("{} returned {}: {}", self.model, status, text)));
        }

        // The API answers with a list of generations for a single input
        let generations: Vec<Generation> = response.json()?;
        generations
            .into_iter()
            .next()
            .map(|g| g.generated_text)
            .ok_or_else(|| Error::Model(format!("{} returned no generations", self.model)))
    }
}
