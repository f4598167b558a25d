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

//! API to add a vehicle to the set of one owner, creating the vehicle on first sight.

use crate::driver::Driver;
use crate::model::Vehicle;
use crate::rest::{parse_owner_id, resolve_vehicle_kind, RestError, RestResult};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

/// Query parameters for this API.
#[derive(Deserialize)]
pub(crate) struct AddVehicleQuery {
    /// The vehicle subtype to decode the payload as.
    #[serde(rename = "type")]
    vehicle_type: Option<String>,
}

/// POST handler for this API.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    Path(id): Path<String>,
    Query(query): Query<AddVehicleQuery>,
    body: Bytes,
) -> RestResult<Response> {
    let kind = match query.vehicle_type {
        Some(name) => resolve_vehicle_kind(&name)?,
        None => {
            return Err(RestError::InvalidRequest("Missing query parameter 'type'".to_owned()))
        }
    };
    let vehicle = Vehicle::decode(kind, &body).map_err(RestError::from)?;
    let id = parse_owner_id(&id)?;

    let vin = vehicle.vin().clone();
    let created = driver.add_vehicle_to_owner(id, vehicle).await?;
    if created {
        let location = format!("/{}/{}", kind.as_str(), vin);
        Ok((StatusCode::CREATED, [(header::LOCATION, location)]).into_response())
    } else {
        Ok(StatusCode::NO_CONTENT.into_response())
    }
}
