// Report generation handler
//
// Renders an assessment report in the requested format and returns it as a
// base64 buffer the caller can store or attach.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use jobqueue_core::domain::JobPayload;
use jobqueue_core::port::time_provider::to_rfc3339;
use jobqueue_core::port::{HandlerError, JobHandler, TimeProvider};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Json,
    Csv,
    Html,
    Markdown,
}

impl ReportFormat {
    fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Csv => "csv",
            ReportFormat::Html => "html",
            ReportFormat::Markdown => "md",
        }
    }

    fn mime_type(&self) -> &'static str {
        match self {
            ReportFormat::Json => "application/json",
            ReportFormat::Csv => "text/csv",
            ReportFormat::Html => "text/html",
            ReportFormat::Markdown => "text/markdown",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportSection {
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportRequest {
    assessment_id: String,
    tenant_id: String,
    format: ReportFormat,
    template_type: String,
    #[serde(default)]
    sections: Vec<ReportSection>,
}

pub struct ReportGenerationHandler {
    time_provider: Arc<dyn TimeProvider>,
}

impl ReportGenerationHandler {
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self { time_provider }
    }
}

#[async_trait]
impl JobHandler for ReportGenerationHandler {
    async fn handle(&self, payload: &JobPayload) -> Result<Value, HandlerError> {
        let req: ReportRequest = serde_json::from_value(payload.as_value().clone())?;
        for (field, value) in [
            ("assessmentId", &req.assessment_id),
            ("tenantId", &req.tenant_id),
            ("templateType", &req.template_type),
        ] {
            if value.trim().is_empty() {
                return Err(HandlerError::missing_field(field));
            }
        }

        let now = self.time_provider.now_millis();
        let generated_at = to_rfc3339(now);
        let body = render(&req, &generated_at)?;

        let filename = format!(
            "{}-{}-{}.{}",
            slug(&req.template_type),
            slug(&req.assessment_id),
            now,
            req.format.extension()
        );

        info!(
            assessment_id = %req.assessment_id,
            tenant_id = %req.tenant_id,
            format = req.format.extension(),
            bytes = body.len(),
            "Report generated"
        );

        Ok(json!({
            "filename": filename,
            "buffer": STANDARD.encode(body.as_bytes()),
            "mimeType": req.format.mime_type(),
        }))
    }
}

fn render(req: &ReportRequest, generated_at: &str) -> Result<String, HandlerError> {
    let title = format!("{} report for assessment {}", req.template_type, req.assessment_id);
    let out = match req.format {
        ReportFormat::Json => serde_json::to_string_pretty(&json!({
            "title": title,
            "assessmentId": req.assessment_id,
            "tenantId": req.tenant_id,
            "templateType": req.template_type,
            "generatedAt": generated_at,
            "sections": req.sections,
        }))?,
        ReportFormat::Csv => {
            let mut out = String::from("section,content\n");
            for s in &req.sections {
                out.push_str(&format!("{},{}\n", csv_field(&s.title), csv_field(&s.content)));
            }
            out
        }
        ReportFormat::Html => {
            let mut out = format!(
                "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{t}</title></head>\n<body>\n<h1>{t}</h1>\n<p>Tenant: {tenant} | Generated: {at}</p>\n",
                t = html_escape(&title),
                tenant = html_escape(&req.tenant_id),
                at = generated_at
            );
            for s in &req.sections {
                out.push_str(&format!(
                    "<h2>{}</h2>\n<p>{}</p>\n",
                    html_escape(&s.title),
                    html_escape(&s.content)
                ));
            }
            out.push_str("</body>\n</html>\n");
            out
        }
        ReportFormat::Markdown => {
            let mut out = format!(
                "# {}\n\n- Tenant: {}\n- Generated: {}\n",
                title, req.tenant_id, generated_at
            );
            for s in &req.sections {
                out.push_str(&format!("\n## {}\n\n{}\n", s.title, s.content));
            }
            out
        }
    };
    Ok(out)
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn html_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Filename-safe version of an identifier
fn slug(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobqueue_core::port::time_provider::mocks::MockTimeProvider;

    fn handler() -> ReportGenerationHandler {
        ReportGenerationHandler::new(Arc::new(MockTimeProvider::new(1_700_000_000_000)))
    }

    fn decode(out: &Value) -> String {
        let bytes = STANDARD.decode(out["buffer"].as_str().unwrap()).unwrap();
        String::from_utf8(bytes).unwrap()
    }

    fn payload(format: &str) -> JobPayload {
        JobPayload::new(json!({
            "assessmentId": "as-1",
            "tenantId": "tenant-a",
            "format": format,
            "templateType": "summary",
            "sections": [{"title": "Findings", "content": "a, \"b\" & <c>"}]
        }))
    }

    #[tokio::test]
    async fn test_csv_report() {
        let out = handler().handle(&payload("csv")).await.unwrap();
        assert_eq!(out["mimeType"], "text/csv");
        assert_eq!(out["filename"], "summary-as-1-1700000000000.csv");
        assert_eq!(
            decode(&out),
            "section,content\nFindings,\"a, \"\"b\"\" & <c>\"\n"
        );
    }

    #[tokio::test]
    async fn test_html_report_escapes_content() {
        let out = handler().handle(&payload("html")).await.unwrap();
        assert_eq!(out["mimeType"], "text/html");
        let html = decode(&out);
        assert!(html.contains("<h2>Findings</h2>"));
        assert!(html.contains("&amp; &lt;c&gt;"));
    }

    #[tokio::test]
    async fn test_json_and_markdown_reports() {
        let out = handler().handle(&payload("json")).await.unwrap();
        let doc: Value = serde_json::from_str(&decode(&out)).unwrap();
        assert_eq!(doc["assessmentId"], "as-1");
        assert_eq!(doc["sections"][0]["title"], "Findings");

        let out = handler().handle(&payload("markdown")).await.unwrap();
        assert_eq!(out["mimeType"], "text/markdown");
        assert!(decode(&out).contains("## Findings"));
    }

    #[tokio::test]
    async fn test_missing_field_and_unknown_format_are_rejected() {
        let err = handler()
            .handle(&JobPayload::new(json!({"assessmentId": "a", "format": "csv"})))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::InvalidPayload(_)));

        let err = handler().handle(&payload("pdf")).await.unwrap_err();
        assert!(matches!(err, HandlerError::InvalidPayload(_)));
    }
}
