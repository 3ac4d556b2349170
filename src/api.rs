//! Language-model calls with exponential backoff and JSON validation.
//!
//! The pipeline talks to an OpenAI-compatible chat API through `awful_aj`.
//! Every call goes through [`RetryAsk`], and every answer is parsed straight
//! into one of the shared DTOs in [`crate::models`] by [`ask_json`], so a
//! malformed answer is rejected at this boundary rather than deep inside the
//! pipeline.
//!
//! # Architecture
//!
//! - [`AskAsync`]: core trait for a single prompt/answer exchange
//! - [`AskFnWrapper`]: adapts `awful_aj::api::ask` to [`AskAsync`]
//! - [`RetryAsk`]: decorator adding retries to any [`AskAsync`]
//! - [`LlmClient`]: the two above, wired with the production retry policy
//!
//! # Retry Strategy
//!
//! - Maximum 5 retry attempts
//! - Exponential backoff starting at 1 second, capped at 30 seconds
//! - Random jitter (0-250ms) on every delay

use crate::utils::{looks_truncated, strip_code_fences, truncate_for_log};
use awful_aj::api::ask;
use awful_aj::{config::AwfulJadeConfig, template::ChatTemplate};
use rand::{Rng, rng};
use serde::de::DeserializeOwned;
use std::error::Error;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Trait for async language-model interaction.
pub trait AskAsync {
    /// The type of response returned by the model.
    type Response;

    /// Send `text` and wait for the answer.
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>>;
}

/// Adds exponential backoff retries to any [`AskAsync`] implementation.
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryAsk<T> {
    inner: T,
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// Wrap `inner`; the delay cap defaults to 30 seconds.
    ///
    /// ```ignore
    /// let client = AskFnWrapper { config, template };
    /// let retry_client = RetryAsk::new(client, 5, Duration::from_secs(1));
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }

    pub fn with_max_delay(mut self, max_delay: StdDuration) -> Self {
        self.max_delay = max_delay;
        self
    }

    fn backoff(&self, attempt: usize) -> StdDuration {
        let shift = (attempt.saturating_sub(1)).min(31) as u32;
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + StdDuration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync + fmt::Debug,
{
    type Response = T::Response;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(text).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.backoff(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Adapts `awful_aj::api::ask` to [`AskAsync`].
#[derive(Debug)]
pub struct AskFnWrapper<'a> {
    /// Endpoint, key and model settings.
    pub config: &'a AwfulJadeConfig,
    /// System prompt and canned messages.
    pub template: &'a ChatTemplate,
}

impl<'a> AskAsync for AskFnWrapper<'a> {
    type Response = String;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let t0 = Instant::now();
        let res = ask(self.config, text.to_string(), self.template, None, None).await;
        if let Err(e) = &res {
            warn!(elapsed_ms = t0.elapsed().as_millis() as u64, error = %e, "API call failed");
        }
        res
    }
}

/// Production model client: `awful_aj` behind the standard retry policy.
pub type LlmClient<'a> = RetryAsk<AskFnWrapper<'a>>;

/// Build an [`LlmClient`] with 5 retries and a 1 second base delay.
pub fn llm_client<'a>(config: &'a AwfulJadeConfig, template: &'a ChatTemplate) -> LlmClient<'a> {
    RetryAsk::new(AskFnWrapper { config, template }, 5, StdDuration::from_secs(1))
}

/// Ask `api` and deserialize the answer as `T`.
///
/// Markdown code fences around the JSON are tolerated. If the answer was cut
/// off mid-JSON the question is asked once more.
///
/// # Errors
///
/// The model call failed after retries, or the answer is not valid JSON for `T`.
#[instrument(level = "info", skip_all, fields(target_type = std::any::type_name::<T>()))]
pub async fn ask_json<A, T>(api: &A, prompt: &str) -> Result<T, Box<dyn Error>>
where
    A: AskAsync<Response = String>,
    T: DeserializeOwned,
{
    let t0 = Instant::now();
    let mut answer = api.ask(prompt).await?;
    let mut parsed = serde_json::from_str::<T>(strip_code_fences(&answer));

    if let Err(e) = &parsed {
        if looks_truncated(e) {
            warn!(error = %e, "EOF while parsing; re-asking once");
            answer = api.ask(prompt).await?;
            parsed = serde_json::from_str::<T>(strip_code_fences(&answer));
        }
    }

    match parsed {
        Ok(value) => {
            info!(elapsed_ms_total = t0.elapsed().as_millis() as u64, "Model answer parsed");
            Ok(value)
        }
        Err(e) => {
            warn!(
                error = %e,
                response_preview = %truncate_for_log(&answer, 300),
                "Model returned non-conforming JSON"
            );
            Err(e.into())
        }
    }
}
