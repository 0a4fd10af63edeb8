use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum JudgeError {
    #[error("judge request failed: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for JudgeError {
    fn from(e: reqwest::Error) -> Self {
        JudgeError::Transport(e.to_string())
    }
}

#[derive(Debug, Serialize)]
struct SubmissionBody<'a> {
    language_id: u32,
    source_code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    stdin: Option<&'a str>,
}

/// Acknowledgement of a submission. The token is opaque; its absence is a
/// fatal submission failure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SubmissionTicket {
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusInfo {
    pub id: i32,
    pub description: Option<String>,
}

/// One poll result for a submission token. Status ids 1 and 2 mean the judge
/// is still working; anything else is terminal.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SubmissionStatus {
    pub status: Option<StatusInfo>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub compile_output: Option<String>,
}

/// Seam to the external code-execution collaborator.
#[async_trait]
pub trait Judge: Send + Sync {
    async fn submit(
        &self,
        language_id: u32,
        source: &str,
        stdin: Option<&str>,
    ) -> Result<SubmissionTicket, JudgeError>;

    async fn poll(&self, token: &str) -> Result<SubmissionStatus, JudgeError>;
}

/// HTTP client for a Judge0-style API behind a RapidAPI gateway.
pub struct JudgeClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_host: String,
}

impl JudgeClient {
    pub fn new(base_url: String, api_key: String, api_host: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            api_key,
            api_host,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.judge_api_url.clone(),
            config.judge_api_key.clone().unwrap_or_default(),
            config.judge_api_host.clone(),
        )
    }
}

#[async_trait]
impl Judge for JudgeClient {
    async fn submit(
        &self,
        language_id: u32,
        source: &str,
        stdin: Option<&str>,
    ) -> Result<SubmissionTicket, JudgeError> {
        let url = format!("{}/submissions", self.base_url);
        let ticket = self
            .client
            .post(&url)
            .query(&[("base64_encoded", "false"), ("fields", "*")])
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", &self.api_host)
            .json(&SubmissionBody {
                language_id,
                source_code: source,
                stdin,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(ticket)
    }

    async fn poll(&self, token: &str) -> Result<SubmissionStatus, JudgeError> {
        let url = format!("{}/submissions/{}", self.base_url, token);
        let status = self
            .client
            .get(&url)
            .query(&[("base64_encoded", "false"), ("fields", "*")])
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", &self.api_host)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(status)
    }
}
