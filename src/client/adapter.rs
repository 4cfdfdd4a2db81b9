// Prompt construction, sampling and retry around a completion service
use crate::client::traits::{CompletionRequest, CompletionService};
use crate::model::{CompletionError, Dataset};
use rand::Rng;
use rand::seq::index;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Upper bound on the rows serialized into a prompt.
pub const MAX_SAMPLE_SIZE: usize = 200;

/// Bounded exponential backoff for rate-limited calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after the zero-based `attempt`, without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Backoff plus a uniform jitter of up to one base delay.
    fn backoff_with_jitter(&self, attempt: u32) -> Duration {
        let jitter: f64 = rand::rng().random();
        self.backoff(attempt) + self.base_delay.mul_f64(jitter)
    }
}

/// Asks a completion service for car names matching a free-text requirement.
pub struct CompletionAdapter<S> {
    service: S,
    model: String,
    max_tokens: u32,
    sample_size: usize,
    retry: RetryPolicy,
}

impl<S: CompletionService> CompletionAdapter<S> {
    pub fn new(service: S, model: impl Into<String>) -> Self {
        Self {
            service,
            model: model.into(),
            max_tokens: 1000,
            sample_size: MAX_SAMPLE_SIZE,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Rows sampled into the prompt, capped at [`MAX_SAMPLE_SIZE`].
    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        if sample_size > MAX_SAMPLE_SIZE {
            warn!("Sample size {} exceeds the cap, using {}", sample_size, MAX_SAMPLE_SIZE);
        }
        self.sample_size = sample_size.min(MAX_SAMPLE_SIZE);
        self
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Returns the candidate names proposed for `requirements`.
    pub async fn candidates(
        &self,
        requirements: &str,
        dataset: &Dataset,
        top_n: usize,
    ) -> Result<Vec<String>, CompletionError> {
        let sample = render_sample(&sample_rows(dataset, self.sample_size));
        let request = CompletionRequest {
            model: self.model.clone(),
            prompt: build_prompt(requirements, &sample, top_n),
            max_tokens: self.max_tokens,
        };
        let response = self.complete_with_retry(&request).await?;
        info!("Completion response: {}", response);
        let candidates = parse_candidates(&response);
        info!("Extracted car names: {:?}", candidates);
        Ok(candidates)
    }

    async fn complete_with_retry(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            info!("Making API request (attempt {}/{})", attempt + 1, max_attempts);
            let err = match self.service.complete(request).await {
                Ok(text) => return Ok(text),
                Err(err) => err,
            };
            if !err.is_rate_limit() {
                warn!("Completion request failed: {}", err);
                return Err(CompletionError::Service(err.to_string()));
            }
            if attempt + 1 >= max_attempts {
                warn!("Maximum retry attempts reached. Giving up.");
                return Err(CompletionError::RateLimited {
                    attempts: max_attempts,
                    message: err.to_string(),
                });
            }
            let delay = self.retry.backoff_with_jitter(attempt);
            warn!("Rate limit exceeded. Retrying in {:.2} seconds...", delay.as_secs_f64());
            sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Random sample of at most `size` rows, bounding the prompt size.
pub fn sample_rows(dataset: &Dataset, size: usize) -> Dataset {
    let amount = size.min(dataset.len());
    let picked = index::sample(&mut rand::rng(), dataset.len(), amount);
    let rows = picked.into_iter().map(|i| dataset.rows()[i].clone()).collect();
    debug!("Sampled {} of {} rows for the prompt", amount, dataset.len());
    dataset.with_rows(rows)
}

/// Serializes a dataset as CSV text for the prompt.
pub fn render_sample(dataset: &Dataset) -> String {
    match write_csv(dataset) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to render dataset sample: {}", e);
            String::new()
        }
    }
}

fn write_csv(dataset: &Dataset) -> Result<String, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(dataset.schema().names())?;
    for row in dataset.rows() {
        writer.write_record(row.iter().map(|v| v.to_string()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn build_prompt(requirements: &str, sample: &str, top_n: usize) -> String {
    format!(
        "You are an automotive expert assistant. I have a dataset of cars with the following sample:\n\
         {sample}\n\
         The user has the following requirements:\n\
         {requirements}\n\n\
         Based on these requirements, provide the names of {top_n} DIFFERENT car models \
         (not just different years of the same model) that best match these criteria. \
         Consider factors like price, fuel efficiency, body type, and features that align with the user's needs.\n\n\
         IMPORTANT:\n\
         1. Select DIVERSE models - do not recommend multiple years of the same model\n\
         2. Each recommendation should be a different make/model\n\
         3. For each car, specify both make and model (e.g., \"Toyota Camry\", \"Honda Accord\")\n\
         4. Format your response as a comma-separated list (e.g., \"Toyota Camry, Honda Accord, Ford Fusion\")\n\n\
         Your response should ONLY contain the comma-separated list, with no additional text."
    )
}

/// Splits a comma-separated reply into trimmed names.
pub fn parse_candidates(response: &str) -> Vec<String> {
    response.split(',').map(|s| s.trim().to_string()).collect()
}
