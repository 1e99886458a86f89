//! Inline error messages rendered into a container in place of a failed
//! operation's result.

use serde::Serialize;

use crate::error::{AvailableFile, BoqError};
use html_escape::{encode_double_quoted_attribute, encode_text};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub title: String,
    pub message: String,
    pub remediation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub available_files: Vec<AvailableFile>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub available_keys: Vec<String>,
}

impl Diagnostic {
    pub fn from_error(err: &BoqError) -> Self {
        let title = match err {
            BoqError::UpstreamNotFound { .. } => "File not found",
            BoqError::UpstreamBadRequest { .. } => "Nothing to stitch",
            BoqError::Upstream { .. } | BoqError::Http(_) => "Server error",
            BoqError::NoTable | BoqError::StructuralDegeneracy { .. } => "Table could not be loaded",
            BoqError::MissingTarget { .. } => "Page element missing",
            _ => "Error",
        };
        let (details, available_files, available_keys) = match err {
            BoqError::UpstreamNotFound { available_files, .. } => (None, available_files.clone(), Vec::new()),
            BoqError::UpstreamBadRequest {
                details,
                available_keys,
                ..
            } => (details.clone(), Vec::new(), available_keys.clone()),
            _ => (None, Vec::new(), Vec::new()),
        };
        Self {
            title: title.to_string(),
            message: err.to_string(),
            remediation: err.user_message(),
            details,
            available_files,
            available_keys,
        }
    }

    pub fn to_html(&self) -> String {
        let mut html = format!(
            "<div class=\"diagnostic\" role=\"alert\"><h4>{}</h4><p>{}</p>",
            encode_text(&self.title),
            encode_text(&self.message)
        );
        if let Some(details) = &self.details {
            html.push_str(&format!("<p class=\"diagnostic-details\">{}</p>", encode_text(details)));
        }
        if !self.available_keys.is_empty() {
            html.push_str(&format!(
                "<p class=\"diagnostic-details\">Available keys: {}</p>",
                encode_text(&self.available_keys.join(", "))
            ));
        }
        html.push_str(&format!("<p class=\"diagnostic-hint\">{}</p>", encode_text(&self.remediation)));
        if !self.available_files.is_empty() {
            html.push_str("<ul class=\"available-files\">");
            for file in &self.available_files {
                let label = if file.name.is_empty() { &file.id } else { &file.name };
                html.push_str(&format!(
                    "<li><a href=\"#\" data-file-id=\"{}\">{}</a></li>",
                    encode_double_quoted_attribute(&file.id),
                    encode_text(label)
                ));
            }
            html.push_str("</ul>");
        }
        html.push_str("</div>");
        html
    }
}

impl From<&BoqError> for Diagnostic {
    fn from(err: &BoqError) -> Self {
        Self::from_error(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_lists_files() {
        let err = BoqError::UpstreamNotFound {
            message: "File not found".into(),
            available_files: vec![
                AvailableFile {
                    id: "a1".into(),
                    name: "tender.pdf".into(),
                },
                AvailableFile {
                    id: "b2".into(),
                    name: String::new(),
                },
            ],
        };
        let html = Diagnostic::from(&err).to_html();
        assert!(html.contains("data-file-id=\"a1\">tender.pdf</a>"));
        assert!(html.contains("data-file-id=\"b2\">b2</a>"));
    }

    #[test]
    fn test_bad_request_shows_keys_and_hint() {
        let err = BoqError::UpstreamBadRequest {
            message: "No tables found to stitch".into(),
            details: Some("No layout results".into()),
            hint: Some("Extract again".into()),
            available_keys: vec!["status".into()],
        };
        let diagnostic = Diagnostic::from_error(&err);
        assert_eq!(diagnostic.title, "Nothing to stitch");
        let html = diagnostic.to_html();
        assert!(html.contains("Available keys: status"));
        assert!(html.contains("Extract again"));
    }
}
