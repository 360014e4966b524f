use std::future::Future;
use std::net::SocketAddr;

use axum::{extract::State, routing::get, Json, Router};
use hls_stream::StitchedAd;
use serde::Serialize;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};

use crate::state::LatestStitched;

pub struct QueryServer {
    pub handle: JoinHandle<()>,
    pub addr: SocketAddr,
}

#[derive(Debug, Serialize)]
pub struct StitchedResponse {
    pub data: Option<StitchedAd>,
}

async fn handler_get_stitched(State(latest): State<LatestStitched>) -> Json<StitchedResponse> {
    Json(StitchedResponse {
        data: latest.get().await,
    })
}

pub fn router(latest: LatestStitched) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    Router::new()
        .route("/", get(handler_get_stitched))
        .layer(cors)
        .with_state(latest)
}

pub async fn start_query_server<F>(
    bind_addr: SocketAddr,
    latest: LatestStitched,
    shutdown: F,
) -> Result<QueryServer, std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    log::info!("Starting query server binding to {}", bind_addr);

    let listener = match tokio::net::TcpListener::bind(bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            log::error!("Failed to bind query server: {}", e);
            return Err(e);
        }
    };
    let addr = listener.local_addr()?;
    log::info!("Query server listening on http://{}", addr);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router(latest))
            .with_graceful_shutdown(shutdown)
            .await
        {
            log::error!("Server error: {}", e);
        }
    });

    Ok(QueryServer { handle, addr })
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;

    async fn serve(latest: LatestStitched) -> QueryServer {
        start_query_server(
            SocketAddr::from(([127, 0, 0, 1], 0)),
            latest,
            std::future::pending(),
        )
        .await
        .unwrap()
    }

    async fn query(server: &QueryServer) -> (reqwest::StatusCode, String, serde_json::Value) {
        let response = reqwest::get(format!("http://{}/", server.addr))
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.json().await.unwrap();
        (status, content_type, body)
    }

    fn ad(start_date: &str, roll_type: &str, pod_length: u32) -> StitchedAd {
        StitchedAd {
            start_date: DateTime::parse_from_rfc3339(start_date).unwrap(),
            roll_type: roll_type.to_string(),
            pod_length,
        }
    }

    #[tokio::test]
    async fn empty_state_is_null_data() {
        let server = serve(LatestStitched::new()).await;
        let (status, content_type, body) = query(&server).await;
        assert_eq!(status, reqwest::StatusCode::OK);
        assert_eq!(content_type, "application/json");
        assert_eq!(body, serde_json::json!({ "data": null }));
    }

    #[tokio::test]
    async fn reflects_each_published_value() {
        let latest = LatestStitched::new();
        let server = serve(latest.clone()).await;

        latest
            .set(Some(ad("2024-01-01T00:00:00Z", "MIDROLL", 90)))
            .await;
        let (_, _, body) = query(&server).await;
        assert_eq!(
            body,
            serde_json::json!({
                "data": {
                    "start_date": "2024-01-01T00:00:00Z",
                    "roll_type": "MIDROLL",
                    "pod_length": 90
                }
            })
        );

        latest.set(None).await;
        let (status, _, body) = query(&server).await;
        assert_eq!(status, reqwest::StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "data": null }));

        latest
            .set(Some(ad("2024-01-01T00:30:00Z", "MIDROLL", 60)))
            .await;
        let (_, _, body) = query(&server).await;
        assert_eq!(body["data"]["start_date"], "2024-01-01T00:30:00Z");
        assert_eq!(body["data"]["pod_length"], 60);
    }

    #[tokio::test]
    async fn allows_cross_origin_reads() {
        let server = serve(LatestStitched::new()).await;
        let response = reqwest::Client::new()
            .get(format!("http://{}/", server.addr))
            .header(reqwest::header::ORIGIN, "https://overlay.example.com")
            .send()
            .await
            .unwrap();
        assert_eq!(
            response
                .headers()
                .get(reqwest::header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
    }
}
