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

//! API to update one pre-existing resource.

use crate::driver::Driver;
use crate::rest::{decode_resource, parse_id, resolve_kind, RestResult};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;

/// POST handler for this API.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    Path((class, id)): Path<(String, String)>,
    body: Bytes,
) -> RestResult<StatusCode> {
    let kind = resolve_kind(&class)?;
    let resource = decode_resource(kind, &body)?;
    let id = parse_id(kind, &id)?;
    driver.update(&id, resource).await?;
    Ok(StatusCode::NO_CONTENT)
}
