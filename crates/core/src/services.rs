//! Seams for the two outbound HTTP services. Implementations live with the
//! binaries; handlers only see these traits.

use async_trait::async_trait;

use crate::domain::feedback::FeedbackRecord;
use crate::domain::query::{AnswerResponse, QueryRequest};
use crate::errors::ServiceError;

#[async_trait]
pub trait AnswerService: Send + Sync {
    async fn ask(&self, request: &QueryRequest) -> Result<AnswerResponse, ServiceError>;
}

#[async_trait]
pub trait FeedbackSink: Send + Sync {
    /// The response body is ignored; only transport and status failures surface.
    async fn submit(&self, record: &FeedbackRecord) -> Result<(), ServiceError>;
}
