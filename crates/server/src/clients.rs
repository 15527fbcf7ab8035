//! reqwest-backed clients for the answer and feedback services.

use async_trait::async_trait;
use faqbot_core::{
    AnswerResponse, AnswerService, FeedbackRecord, FeedbackSink, QueryRequest, ServiceError,
    ServiceKind,
};
use reqwest::{Client, Response};

pub struct HttpAnswerService {
    client: Client,
    url: String,
}

impl HttpAnswerService {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }
}

#[async_trait]
impl AnswerService for HttpAnswerService {
    async fn ask(&self, request: &QueryRequest) -> Result<AnswerResponse, ServiceError> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|error| transport(ServiceKind::Answer, error))?;
        let response = ensure_success(ServiceKind::Answer, response).await?;

        response.json::<AnswerResponse>().await.map_err(|error| ServiceError::Decode {
            service: ServiceKind::Answer,
            message: error.to_string(),
        })
    }
}

pub struct HttpFeedbackService {
    client: Client,
    url: String,
}

impl HttpFeedbackService {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }
}

#[async_trait]
impl FeedbackSink for HttpFeedbackService {
    async fn submit(&self, record: &FeedbackRecord) -> Result<(), ServiceError> {
        let response = self
            .client
            .post(&self.url)
            .json(record)
            .send()
            .await
            .map_err(|error| transport(ServiceKind::Feedback, error))?;
        ensure_success(ServiceKind::Feedback, response).await?;
        Ok(())
    }
}

fn transport(service: ServiceKind, error: reqwest::Error) -> ServiceError {
    ServiceError::Transport { service, message: error.to_string() }
}

async fn ensure_success(service: ServiceKind, response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Status { service, status: status.as_u16(), body })
}
