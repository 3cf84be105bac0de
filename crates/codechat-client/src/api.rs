use std::collections::BTreeMap;

use crate::model::RepositoryId;

/// Body of `POST /ask`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AskRequest {
    pub repo_id: RepositoryId,
    pub question: String,
}

impl AskRequest {
    pub fn new(repo_id: impl Into<RepositoryId>, question: impl Into<String>) -> Self {
        Self {
            repo_id: repo_id.into(),
            question: question.into(),
        }
    }
}

/// Non-streaming `/ask` response, returned once the exchange completes.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AskAnswer {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Body of `POST /analyze` and `DELETE /delete`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RepositoryRequest {
    pub repo_id: RepositoryId,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AnalyzeResponse {
    pub repo_id: RepositoryId,
    pub status: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
    /// Per-store outcome, keyed by store name.
    #[serde(default)]
    pub deleted_from: BTreeMap<String, bool>,
}

/// Extracts the server-supplied `detail` from an error body.
///
/// `detail` is usually a string but validation failures send a list; those are
/// rendered as compact JSON.
pub(crate) fn error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(detail) if !detail.trim().is_empty() => Some(detail.clone()),
        serde_json::Value::String(_) | serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}
