//! Gemini backend implementation
//!
//! Talks to the `generateContent` endpoint of the Generative Language API.
//! Every operation is a single POST, wrapped in the retry policy configured
//! for that operation.
//!
//! # Configuration
//!
//! See `config/gateway.toml` and the `GEMINI_*` environment variables.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use tracing::{debug, warn};

use crate::aggregate::{grand_total, summarize};
use crate::config::{Config, GatewayConfig, GenerationConfig};
use crate::error::{Error, Result};
use crate::models::{Category, ChatTurn, Receipt};
use crate::prompts::{PromptId, PromptLibrary};

use super::parsing::{classify_http_error, parse_extracted_receipt};
use super::retry::{RetryPolicy, Sleeper, TokioSleeper};
use super::types::{
    Content, ExtractedReceipt, GenerateContentRequest, GenerateContentResponse, Part, QuotaStatus,
};
use super::AIBackend;

const QUOTA_PROBE_PROMPT: &str = "Say \"OK\"";

const QUOTA_PROBE_CONFIG: GenerationConfig = GenerationConfig {
    temperature: 0.1,
    top_k: None,
    top_p: None,
    max_output_tokens: 5,
};

/// Gemini generateContent backend
///
/// Cheap to clone: the HTTP client pools connections internally and the
/// configuration and prompts are shared.
#[derive(Clone)]
pub struct GeminiBackend {
    http_client: Client,
    config: Arc<GatewayConfig>,
    prompts: Arc<RwLock<PromptLibrary>>,
    sleeper: Arc<dyn Sleeper>,
}

impl GeminiBackend {
    /// Create a backend from gateway settings
    pub fn new(config: GatewayConfig) -> Self {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(
                    error = %e,
                    timeout_secs = config.timeout.as_secs(),
                    "Failed to build HTTP client with timeout, using defaults"
                );
                Client::new()
            });

        Self {
            http_client,
            config: Arc::new(config),
            prompts: Arc::new(RwLock::new(PromptLibrary::new())),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Create from the layered configuration
    ///
    /// Returns None when no API key is configured.
    pub fn from_config(config: &Config) -> Option<Self> {
        config.gateway.api_key.as_ref()?;
        Some(Self::new(config.gateway.clone()))
    }

    /// Create from config files and environment variables
    pub fn from_env() -> Option<Self> {
        let config = Config::load().ok()?;
        Self::from_config(&config)
    }

    /// Replace the backoff sleeper
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Replace the prompt library
    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = Arc::new(RwLock::new(prompts));
        self
    }

    /// Create a new instance with a different model
    pub fn with_model(&self, model: &str) -> Self {
        let mut config = (*self.config).clone();
        config.model = model.to_string();
        Self {
            config: Arc::new(config),
            ..self.clone()
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn render_prompt(&self, id: PromptId, vars: &HashMap<&str, &str>) -> Result<String> {
        let mut prompts = self
            .prompts
            .write()
            .map_err(|_| Error::InvalidData("Failed to acquire prompt library lock".into()))?;
        prompts.render(id, vars)
    }

    /// One generateContent call, no retries
    async fn generate(&self, contents: &[Content], generation: &GenerationConfig) -> Result<String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Config("GEMINI_API_KEY is not set".into()))?;

        let request = GenerateContentRequest {
            contents,
            generation_config: generation,
        };

        debug!(
            model = %self.config.model,
            turns = contents.len(),
            parts = contents.iter().map(|c| c.parts.len()).sum::<usize>(),
            "Sending generateContent request"
        );

        let response = self
            .http_client
            .post(self.config.endpoint())
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), body = %body, "Gemini error response");
            return Err(classify_http_error(status.as_u16(), &body));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| Error::MalformedResponse(format!("Invalid response envelope: {}", e)))?;

        body.text()
            .ok_or_else(|| Error::MalformedResponse("Response contained no candidate text".into()))
    }

    /// `generate` wrapped in the retry policy for `operation`
    async fn generate_with_retry(
        &self,
        operation: &str,
        policy: RetryPolicy,
        contents: &[Content],
        generation: &GenerationConfig,
    ) -> Result<String> {
        let backend = self;
        policy
            .run(self.sleeper.as_ref(), operation, move || {
                backend.generate(contents, generation)
            })
            .await
    }

    /// Context block that opens every chat
    pub fn chat_context(&self, receipts: &[Receipt]) -> Result<String> {
        let (shown, lines) = recent_receipt_lines(
            receipts,
            self.config.chat_window,
            self.config.items_per_line,
            &self.config.currency,
        );

        let receipt_count = receipts.len().to_string();
        let total = format!("{:.2}", grand_total(receipts));
        let shown = shown.to_string();

        let mut vars = HashMap::new();
        vars.insert("receipt_count", receipt_count.as_str());
        vars.insert("currency", self.config.currency.as_str());
        vars.insert("total", total.as_str());
        vars.insert("shown", shown.as_str());
        vars.insert("receipt_lines", lines.as_str());

        self.render_prompt(PromptId::ChatAssistant, &vars)
    }

    fn insights_prompt(&self, receipts: &[Receipt]) -> Result<String> {
        let summary = summarize(receipts);

        let total = format!("{:.2}", summary.grand_total);
        let count = summary.receipt_count.to_string();
        let by_category = serde_json::to_string(&summary.by_category)?;
        let by_month = serde_json::to_string(&summary.by_month)?;

        let mut vars = HashMap::new();
        vars.insert("currency", self.config.currency.as_str());
        vars.insert("total", total.as_str());
        vars.insert("count", count.as_str());
        vars.insert("by_category", by_category.as_str());
        vars.insert("by_month", by_month.as_str());

        self.render_prompt(PromptId::GenerateInsights, &vars)
    }

    fn policy(&self, op: &crate::config::OperationConfig) -> RetryPolicy {
        RetryPolicy::for_operation(op, self.config.rate_limit_floor)
    }
}

/// Numbered lines for the most recent receipts, newest first.
///
/// Returns how many receipts made it into the window along with the text.
pub fn recent_receipt_lines(
    receipts: &[Receipt],
    window: usize,
    items_per_line: usize,
    currency: &str,
) -> (usize, String) {
    let mut recent: Vec<&Receipt> = receipts.iter().collect();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    recent.truncate(window);

    let mut lines = Vec::with_capacity(recent.len() * 2);
    for (i, r) in recent.iter().enumerate() {
        lines.push(format!(
            "{}. [{}] {} - {} {:.2} ({})",
            i + 1,
            r.date,
            r.store_name,
            currency,
            r.total_amount,
            r.category
        ));

        if !r.items.is_empty() {
            let listed: Vec<String> = r
                .items
                .iter()
                .take(items_per_line)
                .map(|item| format!("{} ({} {:.2})", item.name, currency, item.unit_price))
                .collect();
            let mut line = format!("   Items: {}", listed.join(", "));
            if r.items.len() > items_per_line {
                line.push_str(&format!(" ... and {} more items", r.items.len() - items_per_line));
            }
            lines.push(line);
        }
    }

    (recent.len(), lines.join("\n"))
}

/// Build the turn-alternating request for a chat message.
///
/// Without history the context and the message share one user turn. With
/// history the context becomes its own first turn, followed by the replayed
/// history and the new message.
pub fn build_chat_contents(context: &str, history: &[ChatTurn], message: &str) -> Vec<Content> {
    if history.is_empty() {
        return vec![Content::with_role(
            "user",
            format!("{}\n\n{}", context, message),
        )];
    }

    let mut contents = Vec::with_capacity(history.len() + 2);
    contents.push(Content::with_role("user", context));
    contents.extend(
        history
            .iter()
            .map(|turn| Content::with_role(turn.role.wire_role(), turn.content.as_str())),
    );
    contents.push(Content::with_role("user", message));
    contents
}

#[async_trait]
impl AIBackend for GeminiBackend {
    async fn extract_receipt(
        &self,
        image_data: &[u8],
        mime_type: &str,
    ) -> Result<ExtractedReceipt> {
        let categories = Category::all()
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let mut vars = HashMap::new();
        vars.insert("categories", categories.as_str());
        let prompt = self.render_prompt(PromptId::ExtractReceipt, &vars)?;

        let encoded = base64::engine::general_purpose::STANDARD.encode(image_data);
        let contents = vec![Content::user(vec![
            Part::text(prompt),
            Part::inline_data(mime_type, encoded),
        ])];

        let text = self
            .generate_with_retry(
                "extract_receipt",
                self.policy(&self.config.extract),
                &contents,
                &self.config.extract.generation,
            )
            .await?;
        debug!("Gemini extraction response: {}", text);

        parse_extracted_receipt(&text)
    }

    async fn generate_insights(&self, receipts: &[Receipt]) -> Result<String> {
        let prompt = self.insights_prompt(receipts)?;
        let contents = vec![Content::with_role("user", prompt)];

        self.generate_with_retry(
            "generate_insights",
            self.policy(&self.config.insights),
            &contents,
            &self.config.insights.generation,
        )
        .await
    }

    async fn chat(
        &self,
        message: &str,
        receipts: &[Receipt],
        history: &[ChatTurn],
    ) -> Result<String> {
        let context = self.chat_context(receipts)?;
        let contents = build_chat_contents(&context, history, message);

        self.generate_with_retry(
            "chat",
            self.policy(&self.config.chat),
            &contents,
            &self.config.chat.generation,
        )
        .await
    }

    async fn check_quota(&self) -> Result<QuotaStatus> {
        let contents = vec![Content::with_role("user", QUOTA_PROBE_PROMPT)];

        let started = Instant::now();
        let reply = self.generate(&contents, &QUOTA_PROBE_CONFIG).await?;
        let latency = Duration::from_millis(started.elapsed().as_millis() as u64);

        Ok(QuotaStatus {
            model: self.config.model.clone(),
            latency,
            reply: reply.trim().to_string(),
        })
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn host(&self) -> &str {
        &self.config.base_url
    }
}
