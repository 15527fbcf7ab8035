pub mod answer;
pub mod config;
pub mod domain;
pub mod errors;
pub mod services;

pub use answer::{numbered_sources, truncate_answer};
pub use config::{AnswerConfig, AppConfig};
pub use domain::feedback::{FeedbackRecord, FeedbackType};
pub use domain::query::{AnswerResponse, QueryRequest};
pub use errors::{ServiceError, ServiceKind, GENERIC_ANSWER_FAILURE};
pub use services::{AnswerService, FeedbackSink};
