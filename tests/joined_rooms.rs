//! Integration tests for the joined-rooms route.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use parking_lot::Mutex;
use serde_json::{Value, json};
use strata::http::{
    Device, JOINED_ROOMS_PATH, Membership, MembershipError, REQUEST_ID_HEADER, RequestIdLayer,
    RoomMembershipStore, router,
};
use tower::ServiceExt;
use tracing::instrument::WithSubscriber;
use tracing_subscriber::fmt::MakeWriter;

/// Memberships keyed by user.
#[derive(Default)]
struct MemoryMemberships {
    rooms: HashMap<String, Vec<(String, Membership)>>,
    fail: bool,
}

impl MemoryMemberships {
    fn with(mut self, user: &str, room: &str, membership: Membership) -> Self {
        self.rooms
            .entry(user.to_string())
            .or_default()
            .push((room.to_string(), membership));
        self
    }
}

#[async_trait::async_trait]
impl RoomMembershipStore for MemoryMemberships {
    async fn rooms_for_user(
        &self,
        user_id: &str,
        membership: Membership,
    ) -> Result<Vec<String>, MembershipError> {
        if self.fail {
            return Err(MembershipError::unavailable("pool timed out after 30s"));
        }
        Ok(self
            .rooms
            .get(user_id)
            .into_iter()
            .flatten()
            .filter(|(_, m)| *m == membership)
            .map(|(room, _)| room.clone())
            .collect())
    }
}

/// Log output captured in memory.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

async fn get_joined_rooms(store: MemoryMemberships, user: &str) -> (StatusCode, Value) {
    let app = router(Arc::new(store))
        .layer(axum::Extension(Device::new(user, "DEVICE")))
        .layer(RequestIdLayer::new());

    let response = app
        .oneshot(
            Request::builder()
                .uri(JOINED_ROOMS_PATH)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_only_joined_rooms_are_listed() {
    let store = MemoryMemberships::default()
        .with("@alice:example.org", "!joined:example.org", Membership::Join)
        .with("@alice:example.org", "!invited:example.org", Membership::Invite)
        .with("@bob:example.org", "!other:example.org", Membership::Join);

    let (status, body) = get_joined_rooms(store, "@alice:example.org").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "joined_rooms": ["!joined:example.org"] }));
}

#[tokio::test]
async fn test_user_without_rooms_gets_empty_list() {
    let (status, body) = get_joined_rooms(MemoryMemberships::default(), "@new:example.org").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["joined_rooms"], json!([]));
    assert!(!body["joined_rooms"].is_null());
}

#[tokio::test]
async fn test_backend_failure_returns_generic_500() {
    let store = MemoryMemberships {
        fail: true,
        ..Default::default()
    };

    let (status, body) = get_joined_rooms(store, "@alice:example.org").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({ "errcode": "M_UNKNOWN", "error": "Internal Server Error" })
    );
}

#[tokio::test]
async fn test_backend_failure_logs_cause_with_request_context() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .finish();

    let store = MemoryMemberships {
        fail: true,
        ..Default::default()
    };
    let app = router(Arc::new(store))
        .layer(axum::Extension(Device::new("@alice:example.org", "DEVICE")))
        .layer(RequestIdLayer::new());

    let response = app
        .oneshot(
            Request::builder()
                .uri(JOINED_ROOMS_PATH)
                .header(REQUEST_ID_HEADER, "req-7f3a")
                .body(Body::empty())
                .unwrap(),
        )
        .with_subscriber(subscriber)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = String::from_utf8_lossy(&bytes);
    assert!(!body.contains("pool timed out"));

    let output = logs.contents();
    assert!(output.contains("Failed to list joined rooms"));
    assert!(output.contains("pool timed out after 30s"));
    assert!(output.contains("req-7f3a"));
    assert!(output.contains("@alice:example.org"));
}
