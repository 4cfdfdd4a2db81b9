use std::fmt;

/// One text-completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
}

/// Error reported by a completion service. Rate limiting is recognized by
/// inspecting the status code and message text only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    pub status: Option<u16>,
    pub message: String,
}

impl ServiceError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        let text = self.to_string().to_lowercase();
        text.contains("429") || text.contains("rate limit") || text.contains("too many requests")
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "[{}] {}", status, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ServiceError {}

#[async_trait::async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError>;
}
