//! Client for the extraction, costing and document-generation server.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::BackendConfig;
use crate::costing::{costed_tables, CostedTable, CostingRequest};
use crate::error::{AvailableFile, BoqError, BoqResult};
use crate::table::FileId;

/// Successful `/stitch-tables/{fileId}` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StitchResponse {
    #[serde(default)]
    pub success: bool,
    pub stitched_html: String,
    #[serde(default)]
    pub row_count: usize,
    #[serde(default)]
    pub page_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Error payload shared by every endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    hint: Option<String>,
    #[serde(default)]
    available_files: Vec<AvailableFile>,
    #[serde(default)]
    available_keys: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct CostingResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeneratedDocument {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Offer,
    Presentation,
    Mas,
    ZeroCosting,
}

impl DocumentKind {
    fn endpoint(&self) -> &'static str {
        match self {
            DocumentKind::Offer => "generate-offer",
            DocumentKind::Presentation => "generate-presentation",
            DocumentKind::Mas => "generate-mas",
            DocumentKind::ZeroCosting => "apply-zero-costing",
        }
    }

    /// Path segment under `/download/`, when the document can be downloaded.
    fn download_segment(&self) -> &'static str {
        match self {
            DocumentKind::Offer => "offer",
            DocumentKind::Presentation => "presentation",
            DocumentKind::Mas => "mas",
            DocumentKind::ZeroCosting => "costed",
        }
    }
}

impl std::str::FromStr for DocumentKind {
    type Err = BoqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "offer" => Ok(DocumentKind::Offer),
            "presentation" => Ok(DocumentKind::Presentation),
            "mas" => Ok(DocumentKind::Mas),
            "zero-costing" | "zero_costing" | "costed" => Ok(DocumentKind::ZeroCosting),
            other => Err(BoqError::configuration(format!("unknown document kind: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresentationFormat {
    Pdf,
    Pptx,
}

pub struct BackendClient {
    http: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> BoqResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn stitch_tables(&self, file_id: &FileId) -> BoqResult<StitchResponse> {
        let url = self.url(&format!("stitch-tables/{}", file_id));
        info!(%file_id, "Requesting stitched tables");
        let response = self.http.post(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(map_error(status, &body));
        }
        let stitched: StitchResponse = serde_json::from_str(&body)?;
        if !stitched.success {
            return Err(map_error(status, &body));
        }
        debug!(rows = stitched.row_count, pages = stitched.page_count, "Stitch response received");
        Ok(stitched)
    }

    pub async fn apply_costing(&self, request: &CostingRequest<'_>) -> BoqResult<Vec<CostedTable>> {
        let url = self.url("costing");
        let response = self.http.post(&url).json(request).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(map_error(status, &body));
        }
        let parsed: CostingResponse = serde_json::from_str(&body)?;
        if !parsed.success {
            return Err(BoqError::upstream(
                status.as_u16(),
                parsed.error.unwrap_or_else(|| "Costing failed".to_string()),
            ));
        }
        costed_tables(parsed.result.unwrap_or(Value::Null))
    }

    /// Trigger generation of a downstream document.
    pub async fn generate(
        &self,
        kind: DocumentKind,
        file_id: &FileId,
        format: Option<PresentationFormat>,
    ) -> BoqResult<GeneratedDocument> {
        let url = self.url(&format!("{}/{}", kind.endpoint(), file_id));
        let mut request = self.http.post(&url);
        if let Some(format) = format {
            request = request.json(&serde_json::json!({ "format": format }));
        }
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(map_error(status, &body));
        }
        let document: GeneratedDocument = serde_json::from_str(&body)?;
        if !document.success {
            return Err(BoqError::upstream(
                status.as_u16(),
                document.error.clone().unwrap_or_else(|| "Generation failed".to_string()),
            ));
        }
        info!(%file_id, kind = kind.endpoint(), path = ?document.file_path, "Document generated");
        Ok(document)
    }

    /// Direct download link; these endpoints have no JSON contract.
    pub fn download_url(&self, kind: DocumentKind, file_id: &FileId, format: Option<PresentationFormat>) -> String {
        let mut url = self.url(&format!("download/{}/{}", kind.download_segment(), file_id));
        if kind != DocumentKind::ZeroCosting {
            if let Some(PresentationFormat::Pdf) = format {
                url.push_str("?format=pdf");
            }
        }
        url
    }
}

fn map_error(status: StatusCode, body: &str) -> BoqError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .error
        .clone()
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
    warn!(status = status.as_u16(), %message, "Backend request failed");
    match status {
        StatusCode::NOT_FOUND => BoqError::UpstreamNotFound {
            message,
            available_files: parsed.available_files,
        },
        StatusCode::BAD_REQUEST => BoqError::UpstreamBadRequest {
            message,
            details: parsed.details,
            hint: parsed.hint,
            available_keys: parsed.available_keys.unwrap_or_default(),
        },
        _ => BoqError::upstream(status.as_u16(), message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_carries_available_files() {
        let err = map_error(
            StatusCode::NOT_FOUND,
            r#"{"error":"File not found","available_files":[{"id":"a1","name":"boq.pdf"}]}"#,
        );
        match err {
            BoqError::UpstreamNotFound { available_files, .. } => {
                assert_eq!(available_files[0].name, "boq.pdf");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_non_json_error_body() {
        let err = map_error(StatusCode::INTERNAL_SERVER_ERROR, "<html>boom</html>");
        assert!(matches!(err, BoqError::Upstream { status: 500, .. }));
    }

    #[test]
    fn test_costed_tables_accepts_wrapped_result() {
        let tables = costed_tables(serde_json::json!({"tables": [{"headers": ["A"], "rows": [{"A": 1}]}]})).unwrap();
        assert_eq!(tables[0].cell_text(0, "A"), "1");
    }

    #[test]
    fn test_download_urls() {
        let client = BackendClient::new(&BackendConfig {
            base_url: "http://localhost:5000/".into(),
            timeout_secs: 5,
        })
        .unwrap();
        let id = FileId::from("f1");
        assert_eq!(
            client.download_url(DocumentKind::Presentation, &id, Some(PresentationFormat::Pdf)),
            "http://localhost:5000/download/presentation/f1?format=pdf"
        );
        assert_eq!(
            client.download_url(DocumentKind::ZeroCosting, &id, None),
            "http://localhost:5000/download/costed/f1"
        );
    }
}
