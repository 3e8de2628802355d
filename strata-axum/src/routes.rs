//! Client-server routes over the account store.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{FromRequestParts, State},
    routing::get,
};
use http::request::Parts;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::RoomsApiError;
use crate::membership::{Membership, RoomMembershipStore};
use crate::middleware::RequestId;

/// Path of the joined-rooms endpoint.
pub const JOINED_ROOMS_PATH: &str = "/_matrix/client/v3/joined_rooms";

/// The authenticated device making a request.
///
/// Inserted into the request extensions by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Fully qualified user ID.
    pub user_id: String,
    /// Device ID.
    pub device_id: String,
}

impl Device {
    /// Create a device.
    pub fn new(user_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            device_id: device_id.into(),
        }
    }
}

impl<S> FromRequestParts<S> for Device
where
    S: Send + Sync,
{
    type Rejection = RoomsApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Device>()
            .cloned()
            .ok_or(RoomsApiError::MissingDevice)
    }
}

/// Shared state of the room routes.
#[derive(Clone)]
pub struct RoomsState {
    store: Arc<dyn RoomMembershipStore>,
}

impl RoomsState {
    /// Create state over a membership store.
    pub fn new(store: Arc<dyn RoomMembershipStore>) -> Self {
        Self { store }
    }
}

/// Body of a joined-rooms response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinedRoomsResponse {
    /// Rooms the user is joined to. Empty, never absent.
    pub joined_rooms: Vec<String>,
}

/// `GET /_matrix/client/v3/joined_rooms`
pub async fn joined_rooms(
    State(state): State<RoomsState>,
    request_id: RequestId,
    device: Device,
) -> Result<Json<JoinedRoomsResponse>, RoomsApiError> {
    match state
        .store
        .rooms_for_user(&device.user_id, Membership::Join)
        .await
    {
        Ok(joined_rooms) => {
            debug!(
                user_id = %device.user_id,
                request_id = %request_id.as_str(),
                count = joined_rooms.len(),
                "Listed joined rooms"
            );
            Ok(Json(JoinedRoomsResponse { joined_rooms }))
        }
        Err(e) => {
            error!(
                user_id = %device.user_id,
                device_id = %device.device_id,
                request_id = %request_id.as_str(),
                error = %e,
                "Failed to list joined rooms"
            );
            Err(RoomsApiError::Storage(e))
        }
    }
}

/// Router serving the room routes.
pub fn router(store: Arc<dyn RoomMembershipStore>) -> Router {
    Router::new()
        .route(JOINED_ROOMS_PATH, get(joined_rooms))
        .with_state(RoomsState::new(store))
}
