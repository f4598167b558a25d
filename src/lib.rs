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

//! REST service exposing a small registry of persons, owners and their vehicles.
//!
//! The code is structured as a layered web service:
//!
//! 1.  `model`: High-level data types that represent concepts in the registry domain, including
//!     the closed registry of entity kinds addressable over HTTP.
//!
//! 1.  `db`: The persistence layer, offering entity queries over an abstract executor with
//!     PostgreSQL and SQLite implementations.
//!
//! 1.  `driver`: The business logic layer, wrapping every operation in exactly one transaction.
//!
//! 1.  `rest`: The HTTP layer, mapping operation outcomes onto status codes.
//!
//! 1.  `main`: The app launcher, gathering configuration from environment variables.
//!
//! There are result and error types in every layer, such as `DbResult` and `DbError`.  Errors
//! float to the top of the app using the `?` operator, being translated to HTTP status codes
//! once returned from the REST layer.

// Keep these in sync with other top-level files.
#![warn(anonymous_parameters, bad_style, clippy::missing_docs_in_private_items, missing_docs)]
#![warn(unused, unused_extern_crates, unused_import_braces, unused_qualifications)]
#![warn(unsafe_code)]

use crate::db::Db;
use crate::driver::Driver;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

pub mod db;
pub mod driver;
pub mod env;
pub mod model;
mod rest;

/// Instantiates all resources to serve the application on `addr` against `db`.
///
/// While it'd be nice to push this responsibility to `main`, doing so would force us to expose
/// the REST internals to the public, which in turn would make dead code detection harder.
pub async fn serve(addr: SocketAddr, db: Arc<dyn Db + Send + Sync>) -> Result<(), Box<dyn Error>> {
    let driver = Driver::new(db);
    let app = rest::app(driver);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
