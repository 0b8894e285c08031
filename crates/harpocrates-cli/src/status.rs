//! Status endpoint for continuous mode.

use axum::{Router, extract::State, http::StatusCode, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpListener;
use tracing::info;

pub const DEFAULT_STATUS_PORT: u16 = 8000;

/// Shared flag flipped by the refresh loop.
pub type Health = Arc<AtomicBool>;

pub fn router(health: Health) -> Router {
    Router::new()
        .route("/status", get(status))
        .with_state(health)
}

/// 200 while the last refresh succeeded, 425 otherwise.
async fn status(State(health): State<Health>) -> StatusCode {
    if health.load(Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::TOO_EARLY
    }
}

pub async fn serve(addr: SocketAddr, health: Health) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Status endpoint listening");
    axum::serve(listener, router(health)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn get_status(health: Health) -> StatusCode {
        router(health)
            .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_healthy() {
        let health = Arc::new(AtomicBool::new(true));
        assert_eq!(get_status(health).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_not_ready() {
        let health = Arc::new(AtomicBool::new(false));
        assert_eq!(get_status(health).await, StatusCode::TOO_EARLY);
    }

    #[tokio::test]
    async fn test_flag_is_shared() {
        let health = Arc::new(AtomicBool::new(false));
        let app = router(Arc::clone(&health));
        health.store(true, Ordering::Relaxed);

        let response = app
            .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
