//! Document endpoints

use muni_session::{ApiRequest, FilePart};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::client::{status_error, ApiClient, ErrorBody};
use crate::error::ApiError;
use crate::Result;

pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "text/plain",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

/// Accepted when the MIME type is missing or generic
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "txt", "doc", "docx"];

const NO_SUMMARY: &str = "No se generó resumen.";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Document {
    #[serde(default)]
    pub id: serde_json::Value,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub uploaded_at: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Document {
    /// Identifier as used in document URLs; numeric and string ids both occur
    pub fn id(&self) -> String {
        match &self.id {
            serde_json::Value::String(id) => id.clone(),
            other => other.to_string(),
        }
    }

    pub fn display_name(&self) -> String {
        match self.file_name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => format!("Documento {}", self.id()),
        }
    }

    pub fn display_status(&self) -> DisplayStatus {
        DisplayStatus::from_raw(self.status.as_deref().unwrap_or_default())
    }
}

/// Backend processing states collapsed to what the user sees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayStatus {
    Pending,
    Error,
    Ready,
}

impl DisplayStatus {
    pub fn from_raw(status: &str) -> Self {
        let status = status.to_lowercase();
        if status.contains("pend") {
            DisplayStatus::Pending
        } else if status.contains("err") || status.contains("fail") {
            DisplayStatus::Error
        } else {
            DisplayStatus::Ready
        }
    }

    /// Spanish label shown in the document list
    pub fn label(&self) -> &'static str {
        match self {
            DisplayStatus::Pending => "pendiente",
            DisplayStatus::Error => "error",
            DisplayStatus::Ready => "listo",
        }
    }

    fn names(&self) -> &'static [&'static str] {
        match self {
            DisplayStatus::Pending => &["pending", "pendiente"],
            DisplayStatus::Error => &["error"],
            DisplayStatus::Ready => &["ready", "listo"],
        }
    }

    /// Whether a status filter as typed by the user selects this status.
    ///
    /// Matching is loose: equality or containment either way.
    pub fn matches_filter(&self, filter: &str) -> bool {
        let filter = filter.trim().to_lowercase();
        if filter.is_empty() || filter.contains("all") || filter.contains("todos") {
            return true;
        }
        self.names()
            .iter()
            .any(|name| *name == filter || filter.contains(name) || name.contains(filter.as_str()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentQuery {
    pub q: Option<String>,
    pub status: Option<String>,
    pub sort: Option<String>,
}

impl DocumentQuery {
    fn params(&self) -> Vec<(&'static str, &str)> {
        [("q", &self.q), ("status", &self.status), ("sort", &self.sort)]
            .into_iter()
            .filter_map(|(name, value)| {
                value
                    .as_deref()
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(|v| (name, v))
            })
            .collect()
    }
}

/// A file selected for upload
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    /// Empty when unknown
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, inferring the MIME type from its extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = mime_for_extension(&extension(&file_name)).unwrap_or_default();
        Ok(Self::new(file_name, mime_type, bytes))
    }

    pub fn validate(&self) -> Result<()> {
        let size = self.bytes.len() as u64;
        if size > MAX_UPLOAD_BYTES {
            return Err(ApiError::FileTooLarge {
                size,
                limit: MAX_UPLOAD_BYTES,
            });
        }

        let allowed = ALLOWED_MIME_TYPES.contains(&self.mime_type.as_str())
            || ALLOWED_EXTENSIONS.contains(&extension(&self.file_name).as_str());
        if !allowed {
            return Err(ApiError::UnsupportedFileType(self.file_name.clone()));
        }

        Ok(())
    }
}

fn extension(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

fn mime_for_extension(ext: &str) -> Option<String> {
    let mime = match ext {
        "pdf" => ALLOWED_MIME_TYPES[0],
        "txt" => ALLOWED_MIME_TYPES[1],
        "doc" => ALLOWED_MIME_TYPES[2],
        "docx" => ALLOWED_MIME_TYPES[3],
        _ => return None,
    };
    Some(mime.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Stored; processing continues in the background
    Accepted,
    /// Processed synchronously; names of the files that failed
    Processed { failed: Vec<String> },
}

#[derive(Deserialize)]
struct UploadBody {
    #[serde(default)]
    results: Option<Vec<UploadResult>>,
    #[serde(flatten)]
    error: ErrorBody,
}

#[derive(Deserialize)]
struct UploadResult {
    #[serde(default, rename = "fileName")]
    file_name: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Deserialize)]
struct UrlBody {
    #[serde(default)]
    url: Option<String>,
    #[serde(default, rename = "publicUrl")]
    public_url: Option<String>,
}

#[derive(Deserialize)]
struct SummaryBody {
    #[serde(default)]
    summary: Option<String>,
}

impl ApiClient {
    pub async fn list_documents(&self, query: &DocumentQuery) -> Result<Vec<Document>> {
        let mut url = self.endpoint(&["api", "documents"]);
        let params = query.params();
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }

        let response = self.send_authorized(&ApiRequest::get(url)).await?;
        if !response.is_success() {
            return Err(status_error(&response));
        }

        let documents = match response.json::<serde_json::Value>()? {
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(serde_json::from_value::<Document>)
                .collect::<std::result::Result<Vec<_>, _>>()?,
            _ => Vec::new(),
        };

        let filter = query.status.as_deref().unwrap_or_default();
        let documents: Vec<Document> = documents
            .into_iter()
            .filter(|doc| doc.display_status().matches_filter(filter))
            .collect();

        tracing::debug!(count = documents.len(), "Listed documents");

        Ok(documents)
    }

    pub async fn upload_document(&self, file: UploadFile) -> Result<UploadOutcome> {
        file.validate()?;

        let size = file.bytes.len();
        let request = ApiRequest::post(self.endpoint(&["api", "documents"])).multipart(FilePart {
            field: "file".to_string(),
            file_name: file.file_name.clone(),
            mime_type: if file.mime_type.is_empty() {
                "application/octet-stream".to_string()
            } else {
                file.mime_type
            },
            bytes: file.bytes,
        });

        let response = self.send_authorized(&request).await?;

        tracing::info!(
            file = %file.file_name,
            size,
            status = response.status().as_u16(),
            "Uploaded document"
        );

        if response.status() == StatusCode::ACCEPTED {
            return Ok(UploadOutcome::Accepted);
        }

        if let Ok(body) = response.json::<UploadBody>() {
            if let Some(results) = body.results {
                let failed = results
                    .into_iter()
                    .filter(|r| r.status.as_deref() == Some("error"))
                    .map(|r| r.file_name.unwrap_or_default())
                    .collect();
                return Ok(UploadOutcome::Processed { failed });
            }
            if let Some(message) = body.error.message() {
                return Err(ApiError::Rejected(message));
            }
        }

        if response.is_success() {
            return Ok(UploadOutcome::Processed { failed: Vec::new() });
        }

        Err(status_error(&response))
    }

    /// Public URL of a stored document, if the backend exposes one
    pub async fn document_url(&self, id: &str) -> Result<Option<String>> {
        let url = self.endpoint(&["api", "documents", id, "url"]);
        let response = self.send_authorized(&ApiRequest::get(url)).await?;
        if !response.is_success() {
            return Err(status_error(&response));
        }

        let body: UrlBody = response.json()?;
        Ok(body.url.filter(|u| !u.is_empty()).or(body.public_url))
    }

    pub async fn summarize_document(&self, id: &str) -> Result<String> {
        let url = self.endpoint(&["api", "documents", id, "summarize"]);
        let response = self.send_authorized(&ApiRequest::post(url)).await?;
        if !response.is_success() {
            if let Some(message) = response.json::<ErrorBody>().ok().and_then(ErrorBody::message) {
                return Err(ApiError::Rejected(message));
            }
            return Err(status_error(&response));
        }

        let body: SummaryBody = response.json()?;
        Ok(body
            .summary
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| NO_SUMMARY.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muni_session::testing::{json_response, status_response, FakeTransport, TestSession};
    use muni_session::RequestBody;
    use serde_json::json;

    fn client(transport: FakeTransport) -> (ApiClient, TestSession) {
        let session = TestSession::new(transport).with_tokens("access-1", Some("refresh-1"));
        (ApiClient::new(session.manager.clone()), session)
    }

    fn listing() -> serde_json::Value {
        json!([
            { "id": 1, "file_name": "ordenanza.pdf", "status": "processed", "uploaded_at": "2024-03-01T10:00:00Z" },
            { "id": 2, "file_name": "acta.docx", "status": "PENDING" },
            { "id": "3", "status": "failed" },
            { "id": 4, "file_name": "informe.txt", "status": "error_extracting" }
        ])
    }

    #[test]
    fn test_display_status() {
        assert_eq!(DisplayStatus::from_raw("pending_ocr"), DisplayStatus::Pending);
        assert_eq!(DisplayStatus::from_raw("Error"), DisplayStatus::Error);
        assert_eq!(DisplayStatus::from_raw("failed"), DisplayStatus::Error);
        assert_eq!(DisplayStatus::from_raw("done"), DisplayStatus::Ready);
        assert_eq!(DisplayStatus::from_raw(""), DisplayStatus::Ready);
        assert_eq!(DisplayStatus::Ready.label(), "listo");
    }

    #[test]
    fn test_status_filter_matching() {
        assert!(DisplayStatus::Pending.matches_filter(""));
        assert!(DisplayStatus::Pending.matches_filter("all"));
        assert!(DisplayStatus::Error.matches_filter("Todos"));

        assert!(DisplayStatus::Pending.matches_filter("pendiente"));
        assert!(DisplayStatus::Pending.matches_filter("pending"));
        assert!(DisplayStatus::Pending.matches_filter("pend"));
        assert!(!DisplayStatus::Ready.matches_filter("pendiente"));

        assert!(DisplayStatus::Ready.matches_filter("listo"));
        assert!(DisplayStatus::Ready.matches_filter("ready"));
        assert!(DisplayStatus::Error.matches_filter("errores"));
        assert!(!DisplayStatus::Error.matches_filter("listo"));
    }

    #[test]
    fn test_query_params_skip_empty_values() {
        let query = DocumentQuery {
            q: Some("  licencia ".to_string()),
            status: Some(String::new()),
            sort: Some("date_desc".to_string()),
        };
        assert_eq!(query.params(), vec![("q", "licencia"), ("sort", "date_desc")]);
        assert!(DocumentQuery::default().params().is_empty());
    }

    #[test]
    fn test_document_identity() {
        let doc: Document =
            serde_json::from_value(json!({ "id": 42, "owner": "ana" })).unwrap();
        assert_eq!(doc.id(), "42");
        assert_eq!(doc.display_name(), "Documento 42");
        assert_eq!(doc.extra["owner"], "ana");

        let doc: Document =
            serde_json::from_value(json!({ "id": "abc", "file_name": "a.pdf" })).unwrap();
        assert_eq!(doc.id(), "abc");
        assert_eq!(doc.display_name(), "a.pdf");
    }

    #[test]
    fn test_upload_validation() {
        let ok = UploadFile::new("a.pdf", "application/pdf", vec![0; 16]);
        assert!(ok.validate().is_ok());

        let by_extension = UploadFile::new("notas.TXT", "", b"hola".to_vec());
        assert!(by_extension.validate().is_ok());

        let unsupported = UploadFile::new("foto.png", "image/png", vec![0; 16]);
        assert!(matches!(
            unsupported.validate(),
            Err(ApiError::UnsupportedFileType(_))
        ));

        let at_limit = UploadFile::new("a.pdf", "application/pdf", vec![0; MAX_UPLOAD_BYTES as usize]);
        assert!(at_limit.validate().is_ok());

        let too_large =
            UploadFile::new("a.pdf", "application/pdf", vec![0; MAX_UPLOAD_BYTES as usize + 1]);
        assert!(matches!(
            too_large.validate(),
            Err(ApiError::FileTooLarge { .. })
        ));
    }

    #[test]
    fn test_mime_inferred_from_extension() {
        assert_eq!(mime_for_extension("docx").as_deref(), Some(ALLOWED_MIME_TYPES[3]));
        assert_eq!(mime_for_extension("exe"), None);
        assert_eq!(extension("archive.tar.PDF"), "pdf");
        assert_eq!(extension("README"), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_documents_sends_query_and_filters() {
        let (client, session) = client(FakeTransport::new(|_| json_response(200, listing())));

        let query = DocumentQuery {
            q: Some("acta".to_string()),
            status: Some("error".to_string()),
            sort: None,
        };
        let docs = client.list_documents(&query).await.unwrap();

        let ids: Vec<String> = docs.iter().map(Document::id).collect();
        assert_eq!(ids, vec!["3", "4"]);

        let requests = session.transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url.query(), Some("q=acta&status=error"));
        assert_eq!(
            requests[0].header_value("Authorization"),
            Some("Bearer access-1")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_documents_without_filter() {
        let (client, session) = client(FakeTransport::new(|_| json_response(200, listing())));

        let docs = client.list_documents(&DocumentQuery::default()).await.unwrap();

        assert_eq!(docs.len(), 4);
        assert_eq!(session.transport.requests()[0].url.query(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_documents_non_array_body_is_empty() {
        let (client, _session) =
            client(FakeTransport::new(|_| json_response(200, json!({ "documents": [] }))));

        let docs = client.list_documents(&DocumentQuery::default()).await.unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_documents_server_error() {
        let (client, _session) = client(FakeTransport::new(|_| {
            Ok(muni_session::ApiResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "db down"))
        }));

        match client.list_documents(&DocumentQuery::default()).await.unwrap_err() {
            ApiError::Status { status, body } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "db down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_forbidden_ends_session() {
        let (client, session) = client(FakeTransport::new(|_| status_response(403)));

        let err = client.list_documents(&DocumentQuery::default()).await.unwrap_err();

        assert!(matches!(err, ApiError::Unauthorized));
        assert!(err.is_session_expired());
        assert_eq!(session.tokens().access_token, None);
        assert_eq!(session.navigator.redirects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_accepted() {
        let (client, session) = client(FakeTransport::new(|_| status_response(202)));

        let outcome = client
            .upload_document(UploadFile::new("a.pdf", "application/pdf", b"%PDF".to_vec()))
            .await
            .unwrap();

        assert_eq!(outcome, UploadOutcome::Accepted);
        let requests = session.transport.requests();
        assert_eq!(requests[0].url.path(), "/api/documents");
        match &requests[0].body {
            RequestBody::Multipart(part) => {
                assert_eq!(part.field, "file");
                assert_eq!(part.file_name, "a.pdf");
                assert_eq!(part.bytes, b"%PDF".to_vec());
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_processed_with_failures() {
        let (client, _session) = client(FakeTransport::new(|_| {
            json_response(
                200,
                json!({ "results": [
                    { "fileName": "a.pdf", "status": "ok" },
                    { "fileName": "b.pdf", "status": "error" }
                ] }),
            )
        }));

        let outcome = client
            .upload_document(UploadFile::new("a.pdf", "application/pdf", b"%PDF".to_vec()))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            UploadOutcome::Processed {
                failed: vec!["b.pdf".to_string()]
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_rejected_with_detail() {
        let (client, _session) = client(FakeTransport::new(|_| {
            json_response(400, json!({ "error": "Archivo inválido", "detail": "PDF cifrado" }))
        }));

        let err = client
            .upload_document(UploadFile::new("a.pdf", "application/pdf", b"%PDF".to_vec()))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Rejected(m) if m == "Archivo inválido: PDF cifrado"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_upload_sends_nothing() {
        let (client, session) = client(FakeTransport::new(|_| status_response(202)));

        let err = client
            .upload_document(UploadFile::new("virus.exe", "application/x-msdownload", vec![1]))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::UnsupportedFileType(_)));
        assert_eq!(session.transport.request_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_document_url_prefers_url_then_public_url() {
        let (client, session) = client(FakeTransport::new(|request| {
            if request.url.path().contains("/7/") {
                json_response(200, json!({ "url": "https://cdn/7.pdf" }))
            } else {
                json_response(200, json!({ "publicUrl": "https://cdn/8.pdf" }))
            }
        }));

        assert_eq!(
            client.document_url("7").await.unwrap().as_deref(),
            Some("https://cdn/7.pdf")
        );
        assert_eq!(
            client.document_url("8").await.unwrap().as_deref(),
            Some("https://cdn/8.pdf")
        );
        assert_eq!(
            session.transport.requests()[0].url.path(),
            "/api/documents/7/url"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_summarize_document() {
        let (client, session) = client(FakeTransport::new(|request| {
            if request.url.path().contains("/1/") {
                json_response(200, json!({ "summary": "Ordenanza de tránsito." }))
            } else {
                json_response(200, json!({}))
            }
        }));

        assert_eq!(
            client.summarize_document("1").await.unwrap(),
            "Ordenanza de tránsito."
        );
        assert_eq!(client.summarize_document("2").await.unwrap(), NO_SUMMARY);

        let request = &session.transport.requests()[0];
        assert_eq!(request.method, reqwest::Method::POST);
        assert_eq!(request.url.path(), "/api/documents/1/summarize");
    }
}
