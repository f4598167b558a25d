// Vehicle Registry
// Copyright 2023 Julio Merino
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! Generic code for the REST handlers.
//!
//! Every API is put in its own `.rs` file, using a name like `<entity>_<method>.rs`.  This may
//! seem overkill, but putting every API in its own file makes it easy to ensure all the
//! integration tests for the given API truly belong to that API.
//!
//! More specifically, the `tests` module within an API should define a `route` method that
//! returns the HTTP method and the API path under test.  All integration tests within the module
//! then rely on `route` to obtain this information, ensuring that they all test the desired API.

use crate::driver::{Driver, DriverError};
use crate::model::{EntityId, EntityKind, IdKind, PersonId, Resource, VehicleKind, Vin};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

mod owner_vehicles_get;
mod owner_vehicles_post;
mod resource_get;
mod resource_post;
mod resource_put;
mod resources_get;
mod resources_post;
#[cfg(test)]
mod testutils;

/// Frontend errors.  These are the errors that are visible to the user on failed requests.
#[derive(Debug, PartialEq, thiserror::Error)]
pub(crate) enum RestError {
    /// Catch-all error type for all unexpected errors.
    #[error("{0}")]
    InternalError(String),

    /// Indicates an error in the contents of the request.
    #[error("{0}")]
    InvalidRequest(String),

    /// Indicates that a requested entity does not exist.
    #[error("{0}")]
    NotFound(String),
}

impl From<DriverError> for RestError {
    fn from(e: DriverError) -> Self {
        match e {
            DriverError::AlreadyExists(_) => RestError::InvalidRequest(e.to_string()),
            // Store-level faults surface as client errors in this contract, not as server
            // errors; only unknown entity types and I/O-level failures are the server's fault.
            DriverError::BackendError(_) => RestError::InvalidRequest(e.to_string()),
            DriverError::NotFound(_) => RestError::NotFound(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for RestError {
    fn from(e: serde_json::Error) -> Self {
        RestError::InvalidRequest(e.to_string())
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> axum::response::Response {
        let status = match self {
            RestError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RestError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RestError::NotFound(_) => StatusCode::NOT_FOUND,
        };

        let response = ErrorResponse { message: self.to_string() };

        (status, Json(response)).into_response()
    }
}

/// Result type for this module.
pub(crate) type RestResult<T> = Result<T, RestError>;

/// Representation of the details of an error response.
#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct ErrorResponse {
    /// Textual representation of the error message.
    pub(crate) message: String,
}

/// Resolves the `{class}` path segment into an entity kind.
///
/// An unknown segment is the server's configuration problem as far as the contract is
/// concerned, so the failure maps to an internal error.
fn resolve_kind(name: &str) -> RestResult<EntityKind> {
    EntityKind::resolve(name).map_err(|e| RestError::InternalError(e.to_string()))
}

/// Resolves the `type` query parameter of the add-vehicle API into a vehicle subtype.
///
/// Unlike `resolve_kind`, failures here are the client's: both unknown names and entity kinds
/// that are not vehicles are rejected as invalid requests.
fn resolve_vehicle_kind(name: &str) -> RestResult<VehicleKind> {
    let kind = EntityKind::resolve(name).map_err(|e| RestError::InvalidRequest(e.to_string()))?;
    kind.as_vehicle()
        .ok_or_else(|| RestError::InvalidRequest(format!("Entity type '{}' is not a vehicle", name)))
}

/// Parses the `{id}` path segment in the form dictated by the entity kind's identity kind.
fn parse_id(kind: EntityKind, raw: &str) -> RestResult<EntityId> {
    match kind.id_kind() {
        IdKind::Numeric => match raw.parse::<i64>() {
            Ok(id) => Ok(EntityId::Numeric(PersonId::new(id))),
            Err(e) => Err(RestError::InvalidRequest(format!("Invalid numeric id '{}': {}", raw, e))),
        },
        IdKind::Vin => match Vin::new(raw) {
            Ok(vin) => Ok(EntityId::Vin(vin)),
            Err(e) => Err(RestError::InvalidRequest(e.to_string())),
        },
    }
}

/// Parses the numeric owner id of the vehicles sub-resource APIs.
fn parse_owner_id(raw: &str) -> RestResult<PersonId> {
    match raw.parse::<i64>() {
        Ok(id) => Ok(PersonId::new(id)),
        Err(e) => Err(RestError::InvalidRequest(format!("Invalid owner id '{}': {}", raw, e))),
    }
}

/// Decodes a JSON request body into a resource of the given kind.
fn decode_resource(kind: EntityKind, data: &[u8]) -> RestResult<Resource> {
    Ok(Resource::decode(kind, data)?)
}

/// Creates the router for the application.
pub(crate) fn app(driver: Driver) -> Router {
    use axum::routing::get;
    Router::new()
        .route(
            "/owner/:id/vehicles",
            get(owner_vehicles_get::handler).post(owner_vehicles_post::handler),
        )
        .route("/:class", get(resources_get::handler).post(resources_post::handler))
        .route(
            "/:class/:id",
            get(resource_get::handler)
                .post(resource_post::handler)
                .put(resource_put::handler),
        )
        .with_state(driver)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_kind_failure_is_internal() {
        match resolve_kind("boat") {
            Err(RestError::InternalError(message)) => {
                assert!(message.contains("Unknown entity type 'boat'"))
            }
            other => panic!("Expected an internal error, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_vehicle_kind() {
        assert_eq!(VehicleKind::Car, resolve_vehicle_kind("car").unwrap());
        assert_eq!(VehicleKind::Truck, resolve_vehicle_kind("TRUCK").unwrap());

        match resolve_vehicle_kind("person") {
            Err(RestError::InvalidRequest(message)) => {
                assert_eq!("Entity type 'person' is not a vehicle", message)
            }
            other => panic!("Expected an invalid request error, got {:?}", other),
        }
        match resolve_vehicle_kind("boat") {
            Err(RestError::InvalidRequest(_)) => (),
            other => panic!("Expected an invalid request error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_id_by_kind() {
        assert_eq!(
            EntityId::Numeric(PersonId::new(5)),
            parse_id(EntityKind::Person, "5").unwrap()
        );
        assert_eq!(
            EntityId::Vin(Vin::new("5").unwrap()),
            parse_id(EntityKind::Truck, "5").unwrap()
        );

        match parse_id(EntityKind::Owner, "1A").unwrap_err() {
            RestError::InvalidRequest(message) => assert!(message.contains("Invalid numeric id")),
            other => panic!("Expected an invalid request error, got {:?}", other),
        }
    }
}
