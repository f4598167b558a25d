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

//! API to create or update one resource under a client-chosen identifier.

use crate::driver::Driver;
use crate::rest::{decode_resource, parse_id, resolve_kind, RestResult};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

/// PUT handler for this API.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    Path((class, id)): Path<(String, String)>,
    body: Bytes,
) -> RestResult<Response> {
    let kind = resolve_kind(&class)?;
    let resource = decode_resource(kind, &body)?;
    let id = parse_id(kind, &id)?;
    let created = driver.create_or_update(&id, resource).await?;
    if created {
        let location = format!("/{}/{}", class, id);
        Ok((StatusCode::CREATED, [(header::LOCATION, location)]).into_response())
    } else {
        Ok(StatusCode::NO_CONTENT.into_response())
    }
}
