//! API route handlers for the gateway.

use std::path::Path;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use ragdesk_core::access::{User, normalize_role};
use ragdesk_core::config::expand_path;
use ragdesk_core::error::RagDeskError;
use ragdesk_knowledge::extract::{DocumentKind, extract_text};
use ragdesk_knowledge::save_as_markdown;
use serde::Deserialize;

use super::server::AppState;

/// Error response: `{"ok": false, "error": ...}` with a matching status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<RagDeskError> for ApiError {
    fn from(e: RagDeskError) -> Self {
        let status = match &e {
            RagDeskError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            RagDeskError::Auth(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        RagDeskError::from(e).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({"ok": false, "error": self.message})),
        )
            .into_response()
    }
}

type ApiResult = Result<Json<serde_json::Value>, ApiError>;

fn require_privileged(state: &AppState, user: &User, action: &str) -> Result<(), ApiError> {
    if state.ctx.users.scope_for(user).is_privileged() {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!(
            "Only {} users can {action}",
            state.ctx.users.privileged_role()
        )))
    }
}

/// Health check endpoint.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "ragdesk-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn login(Extension(user): Extension<User>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": format!("Welcome {}!", user.name),
        "role": user.role,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// Answer a question within the caller's role.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<ChatRequest>,
) -> ApiResult {
    if req.message.trim().is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }
    tracing::info!("💬 {} ({}) asked a question", user.name, user.role);
    let answer = state.ctx.router.answer(&req.message, &user.role).await;
    Ok(Json(serde_json::json!({"answer": answer})))
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub filename: String,
    pub department: String,
    /// File body as UTF-8 text.
    pub content: String,
}

/// Bare file name, or `None` if the name carries any path component.
fn safe_file_name(name: &str) -> Option<&str> {
    let file = Path::new(name).file_name()?.to_str()?;
    (file == name && !file.starts_with('.')).then_some(file)
}

fn safe_department(department: &str) -> Option<String> {
    let dept = normalize_role(department);
    let valid = !dept.is_empty()
        && dept
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_');
    valid.then_some(dept)
}

/// Store an uploaded file for a department.
///
/// Datasets (`.csv`) are saved raw for the tabular engine and become
/// queryable after a restart. Documents (`.md`, `.txt`) are saved raw,
/// normalized to markdown with a metadata header and indexed right away.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<UploadRequest>,
) -> ApiResult {
    require_privileged(&state, &user, "upload documents")?;

    let filename = safe_file_name(&req.filename)
        .ok_or_else(|| ApiError::bad_request(format!("invalid filename '{}'", req.filename)))?;
    let department = safe_department(&req.department)
        .ok_or_else(|| ApiError::bad_request(format!("invalid department '{}'", req.department)))?;

    let kind = DocumentKind::from_path(Path::new(filename));
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match kind {
        DocumentKind::Tabular if extension == "csv" => {}
        DocumentKind::Markdown | DocumentKind::PlainText => {}
        _ => return Err(RagDeskError::UnsupportedFormat(format!(".{extension}")).into()),
    }

    let gateway = &state.ctx.config.gateway;
    let upload_path = expand_path(&gateway.upload_dir).join(&department).join(filename);
    write_file(&upload_path, &req.content).await?;
    tracing::info!("📥 {} uploaded {filename} for {department}", user.name);

    if kind == DocumentKind::Tabular {
        return Ok(Json(serde_json::json!({
            "ok": true,
            "message": "CSV file saved. It will be queryable after the next restart.",
            "filename": filename,
            "department": department,
        })));
    }

    let text = extract_text(&upload_path)?;
    let markdown_root = expand_path(&gateway.markdown_dir);
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    let md_path = markdown_root.join(&department).join(format!("{stem}.md"));
    save_as_markdown(
        &text,
        &md_path,
        &[
            ("department", department.as_str()),
            ("original_filename", filename),
            ("uploaded_by", user.name.as_str()),
        ],
    )?;

    let chunks = state.ctx.indexer.index_file(&markdown_root, &md_path).await?;

    Ok(Json(serde_json::json!({
        "ok": true,
        "message": "Document processed and indexed successfully",
        "filename": filename,
        "department": department,
        "chunks": chunks,
    })))
}

async fn write_file(path: &Path, content: &str) -> Result<(), ApiError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, content).await?;
    Ok(())
}

/// Store and dataset statistics, limited to what the caller's role may see.
pub async fn stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> ApiResult {
    let ctx = &state.ctx;
    let scope = ctx.users.scope_for(&user);

    let mut vectors = 0;
    let mut departments = Vec::new();
    for (department, chunks) in ctx.store.departments()? {
        if scope.allows(&department) {
            vectors += chunks;
            departments.push(serde_json::json!({"department": department, "chunks": chunks}));
        }
    }
    let datasets: Vec<_> = ctx
        .datasets
        .summaries()
        .into_iter()
        .filter(|summary| scope.allows(&summary.department))
        .collect();

    Ok(Json(serde_json::json!({
        "ok": true,
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "collection": ctx.store.collection(),
        "vectors": vectors,
        "departments": departments,
        "datasets": datasets,
    })))
}

/// Re-index the whole document tree. Appends; existing vectors stay.
pub async fn reindex(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> ApiResult {
    require_privileged(&state, &user, "re-index documents")?;
    let report = state.ctx.indexer.index_directory(&state.ctx.docs_dir()).await?;
    Ok(Json(serde_json::json!({"ok": true, "report": report})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::build_router;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, header};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use ragdesk_agent::{NOT_FOUND_MESSAGE, ServiceContext};
    use ragdesk_core::config::RagDeskConfig;
    use ragdesk_core::error::Result;
    use ragdesk_core::traits::{Embedder, GenerateParams, Provider};
    use ragdesk_core::types::{Message, ProviderResponse};
    use ragdesk_knowledge::VectorStore;
    use ragdesk_tabular::DatasetRegistry;
    use tower::ServiceExt;

    struct EchoModel;

    #[async_trait]
    impl Provider for EchoModel {
        fn name(&self) -> &str {
            "echo"
        }

        async fn chat(&self, messages: &[Message], _: &GenerateParams) -> Result<ProviderResponse> {
            let prompt = &messages[messages.len() - 1].content;
            if prompt.contains("$5M") {
                Ok(ProviderResponse::text("Revenue in Q1 was $5M."))
            } else {
                Ok(ProviderResponse::text("NOT_FOUND_IN_EMBEDDINGS"))
            }
        }
    }

    struct FlatEmbedder;

    #[async_trait]
    impl Embedder for FlatEmbedder {
        fn name(&self) -> &str {
            "flat"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.5, 0.5]).collect())
        }
    }

    fn test_state(dir: &Path) -> State<Arc<AppState>> {
        let mut config = RagDeskConfig::default();
        config.gateway.upload_dir = dir.join("uploads").display().to_string();
        config.gateway.markdown_dir = dir.join("markdown").display().to_string();
        config.index.docs_dir = dir.join("markdown").display().to_string();
        let ctx = ServiceContext::from_parts(
            config,
            Arc::new(EchoModel),
            Arc::new(FlatEmbedder),
            Arc::new(VectorStore::open_in_memory("company_docs").unwrap()),
            Arc::new(DatasetRegistry::new()),
        );
        State(Arc::new(AppState::new(Arc::new(ctx))))
    }

    fn user(name: &str, role: &str) -> Extension<User> {
        Extension(User {
            name: name.into(),
            role: role.into(),
        })
    }

    fn upload_req(filename: &str, department: &str, content: &str) -> Json<UploadRequest> {
        Json(UploadRequest {
            filename: filename.into(),
            department: department.into(),
            content: content.into(),
        })
    }

    #[tokio::test]
    async fn test_health_check() {
        let json = health_check().await.0;
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_login() {
        let json = login(user("Sam", "finance")).await.0;
        assert_eq!(json["message"], "Welcome Sam!");
        assert_eq!(json["role"], "finance");
    }

    #[tokio::test]
    async fn test_upload_requires_privileged_role() {
        let dir = tempfile::tempdir().unwrap();
        let err = upload(
            test_state(dir.path()),
            user("Sam", "finance"),
            upload_req("report.md", "finance", "Revenue Q1 was $5M for the company"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_upload_indexes_and_chat_answers() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        let json = upload(
            state.clone(),
            user("Peter", "c-level"),
            upload_req("report.md", "Finance", "# Q1\n\nRevenue Q1 was $5M for the company."),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(json["ok"], true);
        assert_eq!(json["department"], "finance");
        assert_eq!(json["chunks"], 1);

        let saved = std::fs::read_to_string(dir.path().join("markdown/finance/report.md")).unwrap();
        assert!(saved.starts_with("---\ndepartment: finance\noriginal_filename: report.md\nuploaded_by: Peter\n---"));
        assert!(dir.path().join("uploads/finance/report.md").exists());

        let answer = chat(
            state.clone(),
            user("Sam", "finance"),
            Json(ChatRequest { message: "What was revenue in Q1?".into() }),
        )
        .await
        .unwrap()
        .0;
        let answer = answer["answer"].as_str().unwrap();
        assert!(answer.contains("$5M"));
        assert!(answer.contains("Sources:\n- report.md"));

        let answer = chat(
            state,
            user("Natasha", "hr"),
            Json(ChatRequest { message: "What was revenue in Q1?".into() }),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(answer["answer"], NOT_FOUND_MESSAGE);
    }

    #[tokio::test]
    async fn test_upload_csv_saved_raw() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let json = upload(
            state.clone(),
            user("Peter", "c-level"),
            upload_req("q1.csv", "finance", "quarter,revenue\nQ1,5000000\n"),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(json["ok"], true);
        assert!(dir.path().join("uploads/finance/q1.csv").exists());
        assert_eq!(state.ctx.store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upload_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        let err = upload(state.clone(), user("Peter", "c-level"), upload_req("deck.pptx", "sales", "x"))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let err = upload(state.clone(), user("Peter", "c-level"), upload_req("../evil.md", "hr", "x"))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err = upload(state, user("Peter", "c-level"), upload_req("a.md", "../hr", "x"))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat_rejects_empty_message() {
        let dir = tempfile::tempdir().unwrap();
        let err = chat(
            test_state(dir.path()),
            user("Tony", "engineering"),
            Json(ChatRequest { message: "  ".into() }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_stats_and_reindex() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let hr = dir.path().join("markdown/hr");
        std::fs::create_dir_all(&hr).unwrap();
        std::fs::write(hr.join("leave.md"), "Employees receive twenty days of annual leave.").unwrap();

        let err = reindex(state.clone(), user("Natasha", "hr")).await.unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);

        let json = reindex(state.clone(), user("Peter", "c-level")).await.unwrap().0;
        assert_eq!(json["report"]["chunks_added"], 1);

        let json = stats(state, user("Peter", "c-level")).await.unwrap().0;
        assert_eq!(json["vectors"], 1);
        assert_eq!(json["departments"][0]["department"], "hr");
        assert_eq!(json["collection"], "company_docs");
    }

    #[tokio::test]
    async fn test_stats_are_scoped_to_role() {
        let dir = tempfile::tempdir().unwrap();
        let mut datasets = DatasetRegistry::new();
        for (dept, csv) in [("finance", "quarter,revenue\nQ1,5\n"), ("hr", "employee,salary\nA,1\n")] {
            datasets.insert(
                ragdesk_tabular::Dataset::from_reader(dept, &format!("{dept}.csv"), csv.as_bytes()).unwrap(),
            );
        }
        let mut config = RagDeskConfig::default();
        config.index.docs_dir = dir.path().display().to_string();
        let ctx = ServiceContext::from_parts(
            config,
            Arc::new(EchoModel),
            Arc::new(FlatEmbedder),
            Arc::new(VectorStore::open_in_memory("company_docs").unwrap()),
            Arc::new(datasets),
        );
        for (dept, file) in [("finance", "report.md"), ("hr", "leave.md"), ("hr", "pay.md")] {
            std::fs::create_dir_all(dir.path().join(dept)).unwrap();
            std::fs::write(dir.path().join(dept).join(file), "Some department text worth indexing here.").unwrap();
        }
        ctx.indexer.index_directory(dir.path()).await.unwrap();
        let state = State(Arc::new(AppState::new(Arc::new(ctx))));

        let json = stats(state.clone(), user("Sam", "finance")).await.unwrap().0;
        assert_eq!(json["vectors"], 1);
        assert_eq!(json["departments"].as_array().unwrap().len(), 1);
        assert_eq!(json["departments"][0]["department"], "finance");
        assert_eq!(json["datasets"].as_array().unwrap().len(), 1);
        assert_eq!(json["datasets"][0]["department"], "finance");

        let json = stats(state, user("Peter", "c-level")).await.unwrap().0;
        assert_eq!(json["vectors"], 3);
        assert_eq!(json["datasets"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_router_requires_basic_auth() {
        let dir = tempfile::tempdir().unwrap();
        let State(state) = test_state(dir.path());
        let app = build_router(AppState::clone(&state));

        let resp = app
            .clone()
            .oneshot(Request::builder().uri("/login").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let auth = format!("Basic {}", STANDARD.encode("Tony:password123"));
        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/login")
                    .header(header::AUTHORIZATION, auth)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["role"], "engineering");

        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
