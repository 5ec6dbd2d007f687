use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Client for the external embedding/inference collaborator. Speaks the
/// OpenAI-compatible `/v1/embeddings` shape.
///
/// Callers treat any failure here as DependencyDegraded: log it and fall back
/// to the neutral semantic score — a feed request never fails because this
/// service is down.
pub struct EmbeddingClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl EmbeddingClient {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
            model,
        }
    }

    pub async fn generate(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url.trim_end_matches('/')))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(std::time::Duration::from_secs(10))
            .json(&EmbeddingRequest {
                model: self.model.clone(),
                input: text.to_string(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            anyhow::bail!("Embedding API error {}: {}", status, body);
        }

        let embedding_response: EmbeddingResponse = response.json().await?;

        let embedding = embedding_response
            .data
            .first()
            .ok_or_else(|| anyhow::anyhow!("No embedding returned"))?
            .embedding
            .clone();

        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires a live embedding endpoint
    async fn test_generate_embedding() {
        let base_url =
            std::env::var("EMBER_EMBEDDING_URL").expect("EMBER_EMBEDDING_URL not set");
        let api_key = std::env::var("EMBER_EMBEDDING_API_KEY").unwrap_or_default();
        let client =
            EmbeddingClient::new(base_url, api_key, "text-embedding-3-small".to_string());

        let embedding = client
            .generate("Climber, coffee snob, looking for someone to share sunrises with")
            .await
            .expect("Failed to generate embedding");

        assert!(!embedding.is_empty());
    }
}
