//! Korean abstract summaries through an OpenAI-compatible chat API.
//!
//! Single summaries fail with a typed error. Batches run one request at a
//! time with a fixed pause between requests and never fail as a whole: each
//! article gets its own outcome.

use crate::article::{collapse_whitespace, ArticleRecord, NO_ABSTRACT};
use crate::credentials::validate_credential;
use crate::error::{OrthoError, Result};
use crate::prompts::abstract_summary::{build_user_prompt, SYSTEM_PROMPT};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};

/// OpenAI API base URL
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Korean "no abstract" sentinel, treated like [`NO_ABSTRACT`]
pub const NO_ABSTRACT_KO: &str = "초록 정보 없음.";

/// Returned instead of a summary when there is no abstract
pub const NOTHING_TO_SUMMARIZE: &str = "초록 내용이 없어 요약할 수 없습니다.";

/// Returned when markup stripping leaves no text
pub const NO_PROCESSABLE_TEXT: &str = "처리할 수 있는 텍스트 내용이 없습니다.";

/// Appended to abstracts cut at the length limit
pub const TRUNCATION_SUFFIX: &str = "... (내용이 길어 일부만 요약)";

static TAG_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"</?[A-Za-z][^<>]*>").ok());

/// Summarizer configuration
#[derive(Debug, Clone)]
pub struct SummaryConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Abstracts longer than this many characters are cut at a word boundary
    pub max_abstract_chars: usize,
    /// Pause between requests in a batch
    pub batch_delay: Duration,
    pub timeout: Duration,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            base_url: OPENAI_BASE_URL.to_string(),
            model: "gpt-4o".to_string(),
            temperature: 0.3,
            max_tokens: 300,
            max_abstract_chars: 4000,
            batch_delay: Duration::from_millis(500),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Outcome of one article in a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStatus {
    Succeeded,
    Failed,
}

/// Per-article batch result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryOutcome {
    pub pmid: String,
    pub title: String,
    pub status: SummaryStatus,
    /// Summary text, or the failure message
    pub text: String,
}

impl SummaryOutcome {
    pub fn is_success(&self) -> bool {
        self.status == SummaryStatus::Succeeded
    }
}

/// Result of the local checks in front of a request
enum Prepared {
    /// Answered without a request (placeholder text)
    Answered(String),
    /// Preprocessed abstract to send
    Send(String),
}

/// OpenAI-compatible API response structures
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

/// True for empty text and the "no abstract" placeholders.
pub fn is_missing_abstract(text: &str) -> bool {
    let text = text.trim();
    text.is_empty() || text == NO_ABSTRACT || text == NO_ABSTRACT_KO
}

/// Strip markup, collapse whitespace, and cut to `max_chars` at a word boundary.
///
/// The cut only falls mid-word when the text has no whitespace before the limit.
pub fn preprocess_abstract(text: &str, max_chars: usize) -> String {
    let stripped = match TAG_RE.as_ref() {
        Some(re) => re.replace_all(text, " ").into_owned(),
        None => text.to_string(),
    };
    let collapsed = collapse_whitespace(&stripped);

    let Some((limit, _)) = collapsed.char_indices().nth(max_chars) else {
        return collapsed;
    };

    let cut = if collapsed[limit..].starts_with(' ') {
        limit
    } else {
        collapsed[..limit].rfind(' ').unwrap_or(limit)
    };

    format!("{}{}", collapsed[..cut].trim_end(), TRUNCATION_SUFFIX)
}

/// Abstract summarizer
pub struct SummaryClient {
    client: reqwest::Client,
    config: SummaryConfig,
}

impl SummaryClient {
    /// Create a new SummaryClient
    pub fn new(config: SummaryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| OrthoError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &SummaryConfig {
        &self.config
    }

    /// Summarize one abstract.
    ///
    /// Bad credentials and missing abstracts are handled locally; neither
    /// makes a request.
    pub async fn summarize(&self, abstract_text: &str, credential: &str) -> Result<String> {
        match self.prepare(abstract_text, credential)? {
            Prepared::Answered(text) => Ok(text),
            Prepared::Send(processed) => self.request_summary(&processed, credential).await,
        }
    }

    /// Local checks and preprocessing that run before any request.
    fn prepare(&self, abstract_text: &str, credential: &str) -> Result<Prepared> {
        validate_credential(credential)?;

        if is_missing_abstract(abstract_text) {
            return Ok(Prepared::Answered(NOTHING_TO_SUMMARIZE.to_string()));
        }

        let processed = preprocess_abstract(abstract_text, self.config.max_abstract_chars);
        if processed.is_empty() {
            return Ok(Prepared::Answered(NO_PROCESSABLE_TEXT.to_string()));
        }

        Ok(Prepared::Send(processed))
    }

    async fn request_summary(&self, processed: &str, credential: &str) -> Result<String> {
        let request_body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": build_user_prompt(processed)}
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens
        });

        let api_url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        debug!(chars = processed.chars().count(), model = %self.config.model, "Sending summary request");

        let response = self
            .client
            .post(&api_url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", credential.trim()))
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Summary request rejected");
            return Err(OrthoError::from_status(status.as_u16(), &error_text, "OpenAI API"));
        }

        let body = response.text().await?;
        let api_response: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| OrthoError::MalformedResponse(format!("Failed to parse LLM response: {}", e)))?;

        if let Some(usage) = &api_response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Summary token usage"
            );
        }

        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| OrthoError::MalformedResponse("LLM response has no message".to_string()))?;

        Ok(content.trim().to_string())
    }

    /// Summarize articles one after another.
    ///
    /// Output has one outcome per input article, in input order.
    pub async fn summarize_batch(&self, articles: &[ArticleRecord], credential: &str) -> Vec<SummaryOutcome> {
        info!(count = articles.len(), model = %self.config.model, "Starting batch summarization");

        let mut outcomes = Vec::with_capacity(articles.len());
        let mut requests_sent = 0usize;
        for article in articles {
            let result = match self.prepare(&article.abstract_text, credential) {
                Ok(Prepared::Send(processed)) => {
                    // Pause only between requests that actually go out
                    if requests_sent > 0 && !self.config.batch_delay.is_zero() {
                        tokio::time::sleep(self.config.batch_delay).await;
                    }
                    requests_sent += 1;
                    self.request_summary(&processed, credential).await
                }
                Ok(Prepared::Answered(text)) => Ok(text),
                Err(e) => Err(e),
            };

            let outcome = match result {
                Ok(text) => SummaryOutcome {
                    pmid: article.pmid.clone(),
                    title: article.title.clone(),
                    status: SummaryStatus::Succeeded,
                    text,
                },
                Err(e) => {
                    warn!(pmid = %article.pmid, error = %e, "Failed to summarize article");
                    SummaryOutcome {
                        pmid: article.pmid.clone(),
                        title: article.title.clone(),
                        status: SummaryStatus::Failed,
                        text: format!("요약 생성 실패: {}", e.user_message()),
                    }
                }
            };
            outcomes.push(outcome);
        }

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        info!(
            succeeded = succeeded,
            failed = outcomes.len() - succeeded,
            requests = requests_sent,
            "Batch summarization complete"
        );

        outcomes
    }
}
