use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Body posted to the answer service for one `/ask` invocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QueryRequest {
    pub query: String,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into() }
    }
}

/// Answer service reply. `answer` is required; `sources` tolerates any shape
/// and only a JSON array yields entries.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AnswerResponse {
    pub answer: String,
    #[serde(default, deserialize_with = "lenient_sources")]
    pub sources: Vec<String>,
}

fn lenient_sources<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(text) => text,
                other => other.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    })
}
