//! External collaborators the pipeline depends on but does not implement in
//! full: the AI text generator and the email sender. Each is a small async
//! port trait with a deterministic mock (for tests) and a thin real binding,
//! mirroring this codebase's `EmailProvider` abstraction.

use crate::error::{PipelineError, PipelineResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Generates story content from a free-form preferences string.
#[async_trait]
pub trait AiStoryGenerator: Send + Sync {
    async fn generate(&self, preferences: &str) -> PipelineResult<String>;

    fn name(&self) -> &'static str;
}

/// Sends a notification email to an address. Subject/body are fixed by the
/// pipeline's email stage, not parameterized here — templating is out of
/// scope for this port.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, address: &str) -> PipelineResult<()>;

    fn name(&self) -> &'static str;
}

/// Deterministic in-memory story generator for tests. Fails the first
/// `fail_times` calls, then succeeds, returning a canned string derived from
/// the input preferences so call sites can assert on content.
pub struct MockAiStoryGenerator {
    fail_times: usize,
    calls: AtomicUsize,
    latency: Duration,
}

impl MockAiStoryGenerator {
    pub fn new() -> Self {
        Self {
            fail_times: 0,
            calls: AtomicUsize::new(0),
            latency: Duration::ZERO,
        }
    }

    pub fn failing(fail_times: usize) -> Self {
        Self {
            fail_times,
            calls: AtomicUsize::new(0),
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockAiStoryGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AiStoryGenerator for MockAiStoryGenerator {
    async fn generate(&self, preferences: &str) -> PipelineResult<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if call < self.fail_times {
            return Err(PipelineError::StoryGeneration(format!(
                "mock failure {}/{}",
                call + 1,
                self.fail_times
            )));
        }
        Ok(format!("Once upon a time, a story about {preferences}..."))
    }

    fn name(&self) -> &'static str {
        "MockAiStoryGenerator"
    }
}

/// Deterministic in-memory email sender for tests.
pub struct MockEmailSender {
    fail_times: usize,
    calls: AtomicUsize,
}

impl MockEmailSender {
    pub fn new() -> Self {
        Self {
            fail_times: 0,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(fail_times: usize) -> Self {
        Self {
            fail_times,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockEmailSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmailSender for MockEmailSender {
    async fn send(&self, address: &str) -> PipelineResult<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_times {
            return Err(PipelineError::EmailDelivery(format!(
                "mock failure {}/{}",
                call + 1,
                self.fail_times
            )));
        }
        debug!(address, "mock email sent");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "MockEmailSender"
    }
}

/// Thin real binding: posts to a configurable AI HTTP endpoint and reads the
/// generated text back out of a `{"text": "..."}` response body.
pub struct HttpAiStoryGenerator {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAiStoryGenerator {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn from_env() -> PipelineResult<Self> {
        let endpoint = std::env::var("AI_ENDPOINT_URL")
            .map_err(|_| PipelineError::Validation("AI_ENDPOINT_URL is not set".into()))?;
        Ok(Self::new(endpoint))
    }
}

#[derive(serde::Serialize)]
struct GenerateRequest<'a> {
    preferences: &'a str,
}

#[derive(serde::Deserialize)]
struct GenerateResponse {
    text: String,
}

#[async_trait]
impl AiStoryGenerator for HttpAiStoryGenerator {
    async fn generate(&self, preferences: &str) -> PipelineResult<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&GenerateRequest { preferences })
            .send()
            .await
            .map_err(|e| PipelineError::StoryGeneration(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PipelineError::StoryGeneration(format!(
                "AI endpoint returned {}",
                response.status()
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::StoryGeneration(e.to_string()))?;

        Ok(body.text)
    }

    fn name(&self) -> &'static str {
        "HttpAiStoryGenerator"
    }
}

/// Thin SendGrid-style real binding, mirroring
/// `domain_notifications::providers::sendgrid::SendGridProvider` but reduced
/// to the single fixed notification this pipeline sends.
pub struct SendGridEmailSender {
    client: reqwest::Client,
    api_key: String,
    from_email: String,
    from_name: String,
}

impl SendGridEmailSender {
    pub fn from_env() -> PipelineResult<Self> {
        let api_key = std::env::var("SENDGRID_API_KEY")
            .map_err(|_| PipelineError::Validation("SENDGRID_API_KEY is not set".into()))?;
        let from_email = std::env::var("SENDGRID_FROM_EMAIL")
            .map_err(|_| PipelineError::Validation("SENDGRID_FROM_EMAIL is not set".into()))?;
        let from_name = std::env::var("SENDGRID_FROM_NAME").unwrap_or_else(|_| "Pipeline".into());

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            from_email,
            from_name,
        })
    }
}

#[async_trait]
impl EmailSender for SendGridEmailSender {
    async fn send(&self, address: &str) -> PipelineResult<()> {
        let body = serde_json::json!({
            "personalizations": [{"to": [{"email": address}]}],
            "from": {"email": self.from_email, "name": self.from_name},
            "subject": "Your story is ready",
            "content": [{"type": "text/plain", "value": "Your story has finished generating."}],
        });

        let response = self
            .client
            .post("https://api.sendgrid.com/v3/mail/send")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::EmailDelivery(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %text, "sendgrid send failed");
            return Err(PipelineError::EmailDelivery(format!(
                "sendgrid returned {status}"
            )));
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "SendGridEmailSender"
    }
}

/// `Arc`-sharable alias used by executors so both the story and email worker
/// binaries can construct a port once and hand clones to every worker.
pub type SharedAiStoryGenerator = Arc<dyn AiStoryGenerator>;
pub type SharedEmailSender = Arc<dyn EmailSender>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_story_generator_fails_then_succeeds() {
        let gen = MockAiStoryGenerator::failing(1);
        assert!(gen.generate("pirates").await.is_err());
        assert!(gen.generate("pirates").await.is_ok());
        assert_eq!(gen.call_count(), 2);
    }

    #[tokio::test]
    async fn mock_email_sender_fails_then_succeeds() {
        let sender = MockEmailSender::failing(2);
        assert!(sender.send("a@x").await.is_err());
        assert!(sender.send("a@x").await.is_err());
        assert!(sender.send("a@x").await.is_ok());
        assert_eq!(sender.call_count(), 3);
    }
}
