use crate::config::Config;
use artio_core::{
    ArtifactRecord, ArtioError, CheckConsistencyOperation, CheckConsistencyOperationOutcome,
    CheckConsistencyOperationRequest, ConnectivityGuard, CreateArtifactOperation,
    CreateArtifactOperationOutcome, CreateArtifactOperationRequest, DeleteArtifactOperation,
    DeleteArtifactOperationOutcome, DeleteArtifactOperationRequest, FsBlobStore, KeyLocks,
    ListArtifactsOperation, ListArtifactsOperationOutcome, ListArtifactsOperationRequest,
    ReadArtifactOperation, ReadArtifactOperationOutcome, ReadArtifactOperationRequest, Result,
    SqliteRecordStore, UpdateArtifactOperation, UpdateArtifactOperationOutcome,
    UpdateArtifactOperationRequest, validate_segment,
};
use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Content types accepted for pipeline uploads.
const ALLOWED_CONTENT_TYPES: [&str; 2] = ["application/octet-stream", "application/x-pickle"];

pub struct ServerState {
    pub records: Arc<SqliteRecordStore>,
    pub guard: ConnectivityGuard,
    pub list_op: ListArtifactsOperation,
    pub read_op: ReadArtifactOperation,
    pub create_op: CreateArtifactOperation,
    pub update_op: UpdateArtifactOperation,
    pub delete_op: DeleteArtifactOperation,
    pub check_op: CheckConsistencyOperation,
}

#[derive(Debug, Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct PipelineResponse {
    name: String,
    email: String,
    pname: String,
    size_bytes: u64,
    sha256: String,
    created_at: String,
    updated_at: String,
}

impl From<ArtifactRecord> for PipelineResponse {
    fn from(record: ArtifactRecord) -> Self {
        Self {
            name: record.name,
            email: record.owner,
            pname: record.project,
            size_bytes: record.size_bytes,
            sha256: record.sha256,
            created_at: record.created_at.to_rfc3339(),
            updated_at: record.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScopeQuery {
    email: String,
    pname: String,
}

#[derive(Debug, Deserialize)]
struct PipelineQuery {
    email: String,
    pname: String,
    name: String,
}

pub async fn run_server(config: Config) -> Result<()> {
    if let Some(parent) = config.storage.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let records = Arc::new(SqliteRecordStore::new(&config.storage.db_path)?);
    let blobs = Arc::new(FsBlobStore::new(&config.storage.root)?);
    let locks = Arc::new(KeyLocks::new());

    let state = Arc::new(ServerState {
        records: records.clone(),
        guard: ConnectivityGuard::new(records.clone()),
        list_op: ListArtifactsOperation::new(records.clone()),
        read_op: ReadArtifactOperation::new(records.clone(), blobs.clone()),
        create_op: CreateArtifactOperation::new(
            records.clone(),
            blobs.clone(),
            records.clone(),
            locks.clone(),
        ),
        update_op: UpdateArtifactOperation::new(records.clone(), blobs.clone(), locks.clone()),
        delete_op: DeleteArtifactOperation::new(records.clone(), blobs.clone(), locks),
        check_op: CheckConsistencyOperation::new(records, blobs),
    });

    let app = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/health/consistency", get(consistency_handler))
        .route(
            "/pipeline",
            get(get_pipeline)
                .post(create_pipeline)
                .put(update_pipeline)
                .delete(delete_pipeline),
        )
        .route("/pipeline/all", get(list_pipelines))
        .route("/project", post(register_project))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::very_permissive()),
        )
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn error_response(error: ArtioError) -> Response {
    let status = match &error {
        ArtioError::NotFound(_) => StatusCode::NOT_FOUND,
        ArtioError::Conflict(_) => StatusCode::CONFLICT,
        ArtioError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let resp = ApiResponse::<()> {
        success: false,
        data: None,
        error: Some(error.to_string()),
    };
    (status, axum::Json(resp)).into_response()
}

fn json_ok<T: Serialize>(status: StatusCode, data: T) -> Response {
    let resp = ApiResponse {
        success: true,
        data: Some(data),
        error: None,
    };
    (status, axum::Json(resp)).into_response()
}

async fn ensure_connected(state: &ServerState) -> std::result::Result<(), Response> {
    state.guard.ensure().await.map_err(error_response)
}

struct UploadedFile {
    name: String,
    body: Bytes,
}

async fn read_upload(multipart: &mut Multipart) -> std::result::Result<UploadedFile, Response> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => {
                return Err(error_response(ArtioError::InvalidRequest(
                    "missing file field".to_string(),
                )));
            }
            Err(error) => {
                return Err(error_response(ArtioError::InvalidRequest(format!(
                    "invalid multipart body: {}",
                    error
                ))));
            }
        };

        if field.name() != Some("file") {
            continue;
        }

        let Some(name) = field.file_name().map(|name| name.to_string()) else {
            return Err(error_response(ArtioError::InvalidRequest(
                "file field has no filename".to_string(),
            )));
        };

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
            return Err(error_response(ArtioError::InvalidRequest(format!(
                "invalid file type: {}",
                content_type
            ))));
        }

        let body = match field.bytes().await {
            Ok(body) => body,
            Err(error) => {
                return Err(error_response(ArtioError::InvalidRequest(format!(
                    "failed to read upload: {}",
                    error
                ))));
            }
        };

        return Ok(UploadedFile { name, body });
    }
}

async fn root_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "message": "Hello from the Artio pipeline artifact service!",
    }))
}

async fn health_handler(State(state): State<Arc<ServerState>>) -> Response {
    if let Err(resp) = ensure_connected(&state).await {
        return resp;
    }

    let pipelines = match state.records.count_artifacts() {
        Ok(count) => count,
        Err(error) => return error_response(error),
    };

    json_ok(
        StatusCode::OK,
        serde_json::json!({
            "status": "ok",
            "pipelines": pipelines,
            "checked_at": chrono::Utc::now().to_rfc3339(),
        }),
    )
}

async fn consistency_handler(
    State(state): State<Arc<ServerState>>,
    Query(scope): Query<ScopeQuery>,
) -> Response {
    if let Err(resp) = ensure_connected(&state).await {
        return resp;
    }

    let outcome = state
        .check_op
        .run(CheckConsistencyOperationRequest {
            owner: scope.email,
            project: scope.pname,
        })
        .await;

    match outcome {
        Ok(CheckConsistencyOperationOutcome::Consistent { artifacts }) => json_ok(
            StatusCode::OK,
            serde_json::json!({ "consistent": true, "artifacts": artifacts }),
        ),
        Ok(CheckConsistencyOperationOutcome::Diverged(report)) => json_ok(
            StatusCode::OK,
            serde_json::json!({
                "consistent": false,
                "dangling_records": report.dangling_records,
                "orphan_blobs": report.orphan_blobs,
            }),
        ),
        Err(error) => error_response(error),
    }
}

async fn list_pipelines(
    State(state): State<Arc<ServerState>>,
    Query(scope): Query<ScopeQuery>,
) -> Response {
    if let Err(resp) = ensure_connected(&state).await {
        return resp;
    }

    let outcome = state
        .list_op
        .run(ListArtifactsOperationRequest {
            owner: scope.email,
            project: scope.pname,
        })
        .await;

    match outcome {
        Ok(ListArtifactsOperationOutcome::Found(records)) => {
            let pipelines: Vec<PipelineResponse> =
                records.into_iter().map(PipelineResponse::from).collect();
            json_ok(StatusCode::OK, pipelines)
        }
        Ok(ListArtifactsOperationOutcome::NotFound) => {
            error_response(ArtioError::NotFound("pipelines not found".to_string()))
        }
        Err(error) => error_response(error),
    }
}

async fn get_pipeline(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<PipelineQuery>,
) -> Response {
    if let Err(resp) = ensure_connected(&state).await {
        return resp;
    }

    let outcome = state
        .read_op
        .run(ReadArtifactOperationRequest {
            owner: query.email,
            project: query.pname,
            name: query.name,
        })
        .await;

    match outcome {
        Ok(ReadArtifactOperationOutcome::Found(result)) => {
            let headers = [
                (
                    header::CONTENT_TYPE,
                    "application/octet-stream".to_string(),
                ),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", result.record.name),
                ),
            ];
            (StatusCode::OK, headers, result.body).into_response()
        }
        Ok(ReadArtifactOperationOutcome::NotFound) => {
            error_response(ArtioError::NotFound("pipeline not found".to_string()))
        }
        Err(error) => error_response(error),
    }
}

async fn create_pipeline(
    State(state): State<Arc<ServerState>>,
    Query(scope): Query<ScopeQuery>,
    mut multipart: Multipart,
) -> Response {
    if let Err(resp) = ensure_connected(&state).await {
        return resp;
    }

    let upload = match read_upload(&mut multipart).await {
        Ok(upload) => upload,
        Err(resp) => return resp,
    };
    let name = upload.name.clone();

    let outcome = state
        .create_op
        .run(CreateArtifactOperationRequest {
            owner: scope.email,
            project: scope.pname,
            name: upload.name,
            body: upload.body,
        })
        .await;

    match outcome {
        Ok(CreateArtifactOperationOutcome::Created(result)) => {
            json_ok(StatusCode::CREATED, PipelineResponse::from(result.record))
        }
        Ok(CreateArtifactOperationOutcome::ProjectNotFound) => {
            error_response(ArtioError::NotFound("user/project not found".to_string()))
        }
        Ok(CreateArtifactOperationOutcome::NameTaken) => error_response(ArtioError::Conflict(
            format!("a pipeline named {} already exists under this user and project", name),
        )),
        Err(error) => error_response(error),
    }
}

async fn update_pipeline(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<PipelineQuery>,
    mut multipart: Multipart,
) -> Response {
    if let Err(resp) = ensure_connected(&state).await {
        return resp;
    }

    let upload = match read_upload(&mut multipart).await {
        Ok(upload) => upload,
        Err(resp) => return resp,
    };
    let new_name = upload.name.clone();

    let outcome = state
        .update_op
        .run(UpdateArtifactOperationRequest {
            owner: query.email,
            project: query.pname,
            name: query.name,
            new_name: upload.name,
            body: upload.body,
        })
        .await;

    match outcome {
        Ok(UpdateArtifactOperationOutcome::Updated(result)) => {
            json_ok(StatusCode::OK, PipelineResponse::from(result.record))
        }
        Ok(UpdateArtifactOperationOutcome::NotFound) => {
            error_response(ArtioError::NotFound("pipeline not found".to_string()))
        }
        Ok(UpdateArtifactOperationOutcome::NameTaken) => error_response(ArtioError::Conflict(
            format!("a pipeline named {} already exists under this user and project", new_name),
        )),
        Err(error) => error_response(error),
    }
}

async fn delete_pipeline(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<PipelineQuery>,
) -> Response {
    if let Err(resp) = ensure_connected(&state).await {
        return resp;
    }

    let outcome = state
        .delete_op
        .run(DeleteArtifactOperationRequest {
            owner: query.email,
            project: query.pname,
            name: query.name,
        })
        .await;

    match outcome {
        Ok(DeleteArtifactOperationOutcome::Deleted(result)) => json_ok(
            StatusCode::OK,
            serde_json::json!({
                "message": "pipeline deleted successfully",
                "blob_removed": result.blob_removed,
            }),
        ),
        Ok(DeleteArtifactOperationOutcome::NotFound) => {
            error_response(ArtioError::NotFound("pipeline not found".to_string()))
        }
        Err(error) => error_response(error),
    }
}

async fn register_project(
    State(state): State<Arc<ServerState>>,
    Query(scope): Query<ScopeQuery>,
) -> Response {
    if let Err(resp) = ensure_connected(&state).await {
        return resp;
    }

    if let Err(error) = validate_segment("owner", &scope.email)
        .and_then(|_| validate_segment("project", &scope.pname))
    {
        return error_response(error);
    }

    match state.records.register_project(&scope.email, &scope.pname) {
        Ok(created) => json_ok(
            StatusCode::OK,
            serde_json::json!({ "email": scope.email, "pname": scope.pname, "created": created }),
        ),
        Err(error) => error_response(error),
    }
}
