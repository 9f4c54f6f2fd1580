mod config;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use extract::{ChatClient, Extractor};
use graph::{GraphExport, GraphReader, GraphStats, GraphWriter, NodeHit};
use ingest::{Chunker, FileReader};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
struct AppState {
    neo4j: neo4rs::Graph,
    reader: Arc<GraphReader>,
    builder: Arc<pipeline::GraphBuilder<ChatClient>>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    neo4j: String,
}

#[derive(Deserialize)]
struct BuildRequest {
    /// Path to a plain-text document on the server.
    path: Option<String>,
    /// Inline document text; takes precedence over `path`.
    text: Option<String>,
}

#[derive(Serialize)]
struct BuildResponse {
    entities: usize,
    relationships: usize,
    entities_failed: usize,
    relationships_failed: usize,
}

#[derive(Deserialize)]
struct SearchParams {
    q: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = config::AppConfig::from_env();

    let neo4j = neo4rs::Graph::new(
        &config.neo4j.uri,
        &config.neo4j.user,
        &config.neo4j.password,
    )
    .await
    .expect("Failed to connect to Neo4j");

    let client = ChatClient::from_env().expect("DEEPSEEK_API_KEY must be set");
    let builder = pipeline::GraphBuilder::new(
        Chunker::new(config.chunker.clone()),
        Extractor::new(client),
        GraphWriter::new(neo4j.clone()),
    );

    let state = Arc::new(AppState {
        neo4j: neo4j.clone(),
        reader: Arc::new(GraphReader::new(neo4j)),
        builder: Arc::new(builder),
    });

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/build", post(build_graph))
        .route("/stats", get(get_stats))
        .route("/search", get(search_nodes))
        .route("/graph", get(export_graph))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .unwrap();

    tracing::info!("Server listening on http://{}", config.bind_addr);

    axum::serve(listener, app).await.unwrap();
}

async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Json<HealthResponse> {
    let neo4j_status = match state.neo4j.run(neo4rs::query("RETURN 1")).await {
        Ok(_) => "ok".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        neo4j: neo4j_status,
    })
}

async fn build_graph(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BuildRequest>,
) -> Result<Json<BuildResponse>, StatusCode> {
    let document_text = match (req.text, req.path) {
        (Some(text), _) => text,
        (None, Some(path)) => FileReader::read_file(Path::new(&path))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "failed to read document");
                StatusCode::BAD_REQUEST
            })?,
        (None, None) => return Err(StatusCode::BAD_REQUEST),
    };

    let (kg, write_stats) = state.builder.build(&document_text).await.map_err(|e| {
        tracing::error!(error = %e, "pipeline run failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(BuildResponse {
        entities: kg.entities.len(),
        relationships: kg.relationships.len(),
        entities_failed: write_stats.entities_failed,
        relationships_failed: write_stats.relationships_failed,
    }))
}

async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<GraphStats>, StatusCode> {
    let stats = state.reader.stats().await.map_err(|e| {
        tracing::error!(error = %e, "stats query failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(stats))
}

async fn search_nodes(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<NodeHit>>, StatusCode> {
    let hits = state.reader.search(&params.q).await.map_err(|e| {
        tracing::error!(error = %e, "search query failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(hits))
}

async fn export_graph(
    State(state): State<Arc<AppState>>,
) -> Result<Json<GraphExport>, StatusCode> {
    let export = state.reader.export().await.map_err(|e| {
        tracing::error!(error = %e, "graph export failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(export))
}
