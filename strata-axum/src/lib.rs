//! Axum routes over the Strata account store.
//!
//! The routes here only depend on the [`RoomMembershipStore`] contract;
//! any backend that can list a user's rooms by membership can serve them.
//!
//! # Features
//!
//! - **Joined rooms**: `GET /_matrix/client/v3/joined_rooms`
//! - **Generic failures**: backend errors become a `500 M_UNKNOWN` with no
//!   internal detail, while the cause is logged with the user and request ID
//! - **Correlation**: [`RequestIdLayer`] tags every request with an
//!   `x-request-id`
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use strata_axum::{RequestIdLayer, router};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(MyMembershipStore::new());
//!
//!     let app = router(store)
//!         .layer(MyAuthLayer::new())
//!         .layer(RequestIdLayer::new());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8008").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

pub mod error;
pub mod membership;
pub mod middleware;
pub mod routes;

pub use error::RoomsApiError;
pub use membership::{Membership, MembershipError, RoomMembershipStore};
pub use middleware::{REQUEST_ID_HEADER, RequestId, RequestIdLayer, RequestIdService};
pub use routes::{Device, JOINED_ROOMS_PATH, JoinedRoomsResponse, RoomsState, joined_rooms, router};

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::{
        Device, JoinedRoomsResponse, Membership, MembershipError, RequestIdLayer,
        RoomMembershipStore, RoomsApiError, router,
    };
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::Router;
    use axum::body::{Body, to_bytes};
    use http::{Request, StatusCode};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;

    #[derive(Default)]
    struct StaticStore {
        rooms: Vec<String>,
        calls: Mutex<Vec<(String, Membership)>>,
    }

    #[async_trait::async_trait]
    impl RoomMembershipStore for StaticStore {
        async fn rooms_for_user(
            &self,
            user_id: &str,
            membership: Membership,
        ) -> Result<Vec<String>, MembershipError> {
            self.calls.lock().push((user_id.to_string(), membership));
            Ok(self.rooms.clone())
        }
    }

    struct FailingStore;

    #[async_trait::async_trait]
    impl RoomMembershipStore for FailingStore {
        async fn rooms_for_user(
            &self,
            _user_id: &str,
            _membership: Membership,
        ) -> Result<Vec<String>, MembershipError> {
            Err(MembershipError::query("connection reset by peer"))
        }
    }

    fn request(device: Option<Device>) -> Request<Body> {
        let mut builder = Request::builder()
            .uri(JOINED_ROOMS_PATH)
            .header(REQUEST_ID_HEADER, "req-1");
        if let Some(device) = device {
            builder = builder.extension(device);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_joined_rooms_lists_rooms() {
        let store = Arc::new(StaticStore {
            rooms: vec!["!a:example.org".to_string(), "!b:example.org".to_string()],
            ..Default::default()
        });
        let app = router(store.clone());

        let response = app
            .oneshot(request(Some(Device::new("@alice:example.org", "DEV"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            serde_json::json!({ "joined_rooms": ["!a:example.org", "!b:example.org"] })
        );
        assert_eq!(
            *store.calls.lock(),
            vec![("@alice:example.org".to_string(), Membership::Join)]
        );
    }

    #[tokio::test]
    async fn test_no_rooms_is_empty_list() {
        let app = router(Arc::new(StaticStore::default()));

        let response = app
            .oneshot(request(Some(Device::new("@bob:example.org", "DEV"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, serde_json::json!({ "joined_rooms": [] }));
    }

    #[tokio::test]
    async fn test_backend_failure_is_generic() {
        let app = router(Arc::new(FailingStore));

        let response = app
            .oneshot(request(Some(Device::new("@carol:example.org", "DEV"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(
            body,
            serde_json::json!({ "errcode": "M_UNKNOWN", "error": "Internal Server Error" })
        );
        assert!(!body.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_missing_device_is_rejected() {
        let app = router(Arc::new(StaticStore::default()));

        let response = app.oneshot(request(None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["errcode"], "M_MISSING_TOKEN");
    }

    #[tokio::test]
    async fn test_request_id_layer_assigns_id() {
        let app = Router::new()
            .route(
                "/id",
                axum::routing::get(|id: RequestId| async move { id.0 }),
            )
            .layer(RequestIdLayer::new());

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/id").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes.len(), 36);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/id")
                    .header(REQUEST_ID_HEADER, "abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"abc");
    }
}
