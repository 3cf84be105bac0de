use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, post};
use axum::{Json, Router};
use bytes::Bytes;
use codechat_client::prelude::*;
use codechat_client::{AnalyzeResponse, AskRequest, DeleteResponse, RepositoryId};
use serde_json::json;

/// NDJSON answer split mid-frame and inside the multi-byte `é`.
const STREAMED_CHUNKS: &[&[u8]] = &[
    b"{\"type\":\"sources\",\"data\":[\"a.py:10\"]}\n{\"type\":\"con",
    b"tent\",\"data\":\"It starts \xc3",
    b"\xa9\"}\n{\"type\":\"content\",\"data\":\"up.\"}\n",
    b"{\"type\":\"done\"}\n",
];

async fn ask(Json(request): Json<AskRequest>) -> Response {
    match request.repo_id.as_str() {
        "missing" => (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "Repo not ready"})),
        )
            .into_response(),
        "broken" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        _ if request.question == "fallback" => Json(json!({
            "answer": "It starts up.",
            "sources": ["a.py:10"],
        }))
        .into_response(),
        _ => {
            let chunks = STREAMED_CHUNKS
                .iter()
                .map(|chunk| Ok::<_, Infallible>(Bytes::from_static(chunk)));
            Response::builder()
                .header(header::CONTENT_TYPE, "application/x-ndjson")
                .body(Body::from_stream(futures::stream::iter(chunks)))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
    }
}

async fn analyze(Json(body): Json<serde_json::Value>) -> Json<serde_json::Value> {
    Json(json!({
        "repo_id": body["repo_id"],
        "status": "cloning",
        "message": "Ingestion started",
    }))
}

async fn remove(Json(body): Json<serde_json::Value>) -> Response {
    if body["repo_id"] == "unknown" {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Repository not found"})))
            .into_response();
    }
    Json(json!({
        "success": true,
        "message": "Repository deleted",
        "deleted_from": {"vector_store": true, "graph_store": false},
    }))
    .into_response()
}

async fn spawn_server() -> SocketAddr {
    let app = Router::new()
        .route("/ask", post(ask))
        .route("/analyze", post(analyze))
        .route("/delete", delete(remove));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    addr
}

async fn transport() -> HttpTransport {
    let addr = spawn_server().await;
    HttpTransport::new(ClientConfig::new(format!("http://{addr}"))).expect("transport")
}

#[tokio::test]
async fn streamed_answer_is_decoded_across_chunk_boundaries() {
    let transport = Arc::new(transport().await);
    let answer = StreamSession::new(transport, "repo-1", "What does main do?")
        .collect_answer()
        .await
        .expect("answer");
    assert_eq!(answer.text, "It starts \u{e9}up.");
    assert_eq!(answer.sources, vec!["a.py:10"]);
}

#[tokio::test]
async fn json_answer_fallback_goes_through_the_same_session() {
    let transport = Arc::new(transport().await);
    let mut stream = StreamSession::new(transport, "repo-1", "fallback")
        .start()
        .await
        .expect("start");
    let mut events = Vec::new();
    while let Some(event) = stream.next_event().await {
        events.push(event);
    }
    assert_eq!(events.first(), Some(&SessionEvent::Streaming));
    assert_eq!(
        events.last(),
        Some(&SessionEvent::Completed(Answer {
            text: "It starts up.".into(),
            sources: vec!["a.py:10".into()],
        }))
    );
}

#[tokio::test]
async fn error_status_carries_the_detail() {
    let transport = transport().await;
    let err = transport
        .ask(AskRequest::new("missing", "q"))
        .await
        .expect_err("400");
    assert_eq!(err, StreamFailure::server(Some(400), "Repo not ready"));

    let err = transport
        .ask(AskRequest::new("broken", "q"))
        .await
        .expect_err("500");
    assert_eq!(err.status_code(), Some(500));
    assert!(err.message().contains("Internal Server Error"));
}

#[tokio::test]
async fn conversation_rolls_back_when_the_service_rejects_the_question() {
    let transport = Arc::new(transport().await);
    let mut chat = Conversation::new(transport, Repository::ready("missing"));
    chat.submit("q").await.expect("submit");
    assert_eq!(
        chat.finish_exchange().await,
        Some(TranscriptUpdate::Failed {
            error: "Repo not ready".into(),
            rolled_back: true,
        })
    );
    assert!(chat.transcript().is_empty());
}

#[tokio::test]
async fn analyze_and_delete_return_typed_responses() {
    let transport = transport().await;

    let analyzed = transport.analyze("repo-1").await.expect("analyze");
    assert_eq!(
        analyzed,
        AnalyzeResponse {
            repo_id: RepositoryId::new("repo-1"),
            status: "cloning".into(),
            message: "Ingestion started".into(),
        }
    );

    let deleted: DeleteResponse = transport.delete("repo-1").await.expect("delete");
    assert!(deleted.success);
    assert_eq!(deleted.deleted_from.get("graph_store"), Some(&false));

    let err = transport.delete("unknown").await.expect_err("404");
    assert_eq!(
        err,
        ChatError::Failed(StreamFailure::server(Some(404), "Repository not found"))
    );
}
