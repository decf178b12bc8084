//! HTTP/WebSocket server setup.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::ui::{
    handler::{
        http::{get_rooms, health_check, publish_notification},
        notification::{
            admin_notifications_handler, teacher_notifications_handler, user_notifications_handler,
        },
        websocket::classroom_websocket_handler,
    },
    signal::shutdown_signal,
    state::AppState,
};

pub struct Server {
    state: Arc<AppState>,
}

impl Server {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/ws/attendance/{class_id}", get(classroom_websocket_handler))
            .route("/ws/admin/notifications", get(admin_notifications_handler))
            .route(
                "/ws/teacher/notifications",
                get(teacher_notifications_handler),
            )
            .route(
                "/ws/user/{user_id}/notifications",
                get(user_notifications_handler),
            )
            .route("/api/health", get(health_check))
            .route("/api/rooms", get(get_rooms))
            .route("/api/notifications", post(publish_notification))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind and serve until a shutdown signal arrives.
    pub async fn run(&self, host: &str, port: u16) -> Result<(), std::io::Error> {
        let addr = format!("{host}:{port}");
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!("Listening on {}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}
