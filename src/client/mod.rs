// Completion client: service seam, HTTP implementation and the retrying adapter.

pub mod traits;
pub mod anthropic;
pub mod adapter;

pub use adapter::{CompletionAdapter, RetryPolicy};
pub use anthropic::AnthropicClient;
pub use traits::{CompletionRequest, CompletionService, ServiceError};
