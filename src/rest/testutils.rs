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

//! Test utilities for the REST API.

use crate::db::{self, Db, Executor, PersonRow};
use crate::driver::Driver;
use crate::model::{PersonId, PersonKind, Vehicle, Vin};
use crate::rest::{app, ErrorResponse};
use axum::body::Body;
use axum::http::{self, Request};
use axum::Router;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tower::util::ServiceExt;

/// Maximum body size for testing purposes.
const MAX_BODY_SIZE: usize = 1024;

/// State of a running test: the application under test plus direct database access to set up
/// fixtures and validate side effects.
pub(crate) struct TestContext {
    /// The database backing the application.
    db: Arc<dyn Db + Send + Sync>,

    /// The router for the app being tested.
    app: Router,
}

impl TestContext {
    /// Initializes the database and the application under test.
    pub(crate) async fn setup() -> Self {
        let db = Arc::from(crate::db::sqlite::testutils::setup().await);
        db::init_schema(&mut db.ex().await.unwrap()).await.unwrap();
        let driver = Driver::new(db.clone());
        let app = app(driver);
        Self { db, app }
    }

    /// Returns the application router, for tests that issue several requests.
    pub(crate) fn app(&self) -> Router {
        self.app.clone()
    }

    /// Consumes the context and returns the application router.
    pub(crate) fn into_app(self) -> Router {
        self.app
    }

    /// Closes the database pool so that requests start failing at the store level.
    pub(crate) async fn close_db(&self) {
        self.db.close().await;
    }

    /// Returns a direct executor against the database, bypassing the application.
    async fn ex(&self) -> Executor {
        self.db.ex().await.unwrap()
    }

    /// Inserts a persons row directly into the database and returns its id.
    pub(crate) async fn insert_person(&self, kind: PersonKind, name: &str, email: &str) -> PersonId {
        db::create_person(&mut self.ex().await, kind, name, email).await.unwrap()
    }

    /// Inserts a vehicles row directly into the database.
    pub(crate) async fn insert_vehicle(&self, vehicle: &Vehicle) {
        db::create_vehicle(&mut self.ex().await, vehicle).await.unwrap()
    }

    /// Associates a vehicle with an owner directly in the database.
    pub(crate) async fn insert_owner_vehicle(&self, owner_id: PersonId, vin: &Vin) {
        db::add_owner_vehicle(&mut self.ex().await, owner_id, vin).await.unwrap()
    }

    /// Gets the persons row with the given `id`, if any.
    pub(crate) async fn get_person(&self, id: i64) -> Option<PersonRow> {
        db::get_person(&mut self.ex().await, PersonId::new(id)).await.unwrap()
    }

    /// Counts the persons rows currently in the database, owners included.
    pub(crate) async fn count_persons(&self) -> usize {
        db::list_persons(&mut self.ex().await).await.unwrap().len()
    }

    /// Gets the vehicle with the given `vin`, if any.
    pub(crate) async fn get_vehicle(&self, vin: &str) -> Option<Vehicle> {
        db::get_vehicle(&mut self.ex().await, &Vin::new(vin).unwrap()).await.unwrap()
    }

    /// Gets the VINs associated with the owner `id`, in order.
    pub(crate) async fn owner_vins(&self, id: PersonId) -> Vec<String> {
        db::list_owner_vehicles(&mut self.ex().await, id)
            .await
            .unwrap()
            .into_iter()
            .map(|vehicle| vehicle.vin().as_str().to_owned())
            .collect()
    }
}

/// Builder for a single request to the API server.
#[must_use]
pub(crate) struct OneShotBuilder {
    /// The router for the app being tested.
    app: Router,

    /// Builder for the request that will be sent to the app.
    builder: http::request::Builder,
}

impl OneShotBuilder {
    /// Creates a new request against a given `method`/`uri` pair served by an `app` router.
    pub(crate) fn new<U: AsRef<str>>(app: Router, (method, uri): (http::Method, U)) -> Self {
        let builder = Request::builder().method(method).uri(uri.as_ref());
        Self { app, builder }
    }

    /// Extends the URI in the request with a `query`.
    pub(crate) fn with_query<Q: Serialize>(mut self, query: Q) -> Self {
        let uri = self.builder.uri_ref().unwrap().to_string();
        assert!(!uri.contains('?'), "URI already contains a query: {}", uri);
        self.builder =
            self.builder.uri(format!("{}?{}", uri, serde_urlencoded::to_string(query).unwrap()));
        self
    }

    /// Finishes building the request and sends it with an empty payload.
    pub(crate) async fn send_empty(self) -> ResponseChecker {
        let request = self.builder.body(Body::empty()).unwrap();
        ResponseChecker::from(self.app.oneshot(request).await.unwrap())
    }

    /// Finishes building the request and sends it with a text payload.
    pub(crate) async fn send_text<T: Into<String>>(self, text: T) -> ResponseChecker {
        let request = self
            .builder
            .header(http::header::CONTENT_TYPE, mime::TEXT_PLAIN.as_ref())
            .body(Body::from(text.into()))
            .unwrap();
        ResponseChecker::from(self.app.oneshot(request).await.unwrap())
    }

    /// Finishes building the request and sends it with a JSON payload.
    pub(crate) async fn send_json<T: Serialize>(self, request: T) -> ResponseChecker {
        let request = self
            .builder
            .header(http::header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
            .body(Body::from(serde_json::to_vec(&request).unwrap()))
            .unwrap();
        ResponseChecker::from(self.app.oneshot(request).await.unwrap())
    }
}

/// Type alias for the complex type returned by the `oneshot` function.
type HttpResponse = axum::response::Response;

/// Validator for the outcome of a request sent by a `OneShotBuilder`.
#[must_use]
pub(crate) struct ResponseChecker {
    /// Actual response that we received from the app.
    response: HttpResponse,

    /// Expected HTTP status code in the response above.
    exp_status: http::StatusCode,
}

impl From<HttpResponse> for ResponseChecker {
    fn from(response: HttpResponse) -> Self {
        Self { response, exp_status: http::StatusCode::OK }
    }
}

impl ResponseChecker {
    /// Sets the expected exit HTTP status to `status`.
    pub(crate) fn expect_status(mut self, status: http::StatusCode) -> Self {
        self.exp_status = status;
        self
    }

    /// Performs common validation operations on the response.
    pub(crate) fn verify(&self) {
        assert_eq!(self.exp_status, self.response.status());
    }

    /// Finishes checking the response and expects it to contain an empty body.
    pub(crate) async fn expect_empty(self) {
        self.verify();

        let body = axum::body::to_bytes(self.response.into_body(), MAX_BODY_SIZE).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.is_empty(), "Body not empty; got {}", body);
    }

    /// Finishes checking the response and expects its body to be an `ErrorResponse` that
    /// matches `exp_re`.
    pub(crate) async fn expect_error(self, exp_re: &str) {
        self.verify();

        let body = axum::body::to_bytes(self.response.into_body(), MAX_BODY_SIZE).await.unwrap();
        let response: ErrorResponse = match serde_json::from_slice(&body) {
            Ok(response) => response,
            Err(e) => {
                let body = String::from_utf8(body.to_vec()).unwrap();
                panic!("Invalid error response due to {}; content was {}", e, body);
            }
        };
        let re = regex::Regex::new(exp_re).unwrap();
        assert!(
            re.is_match(&response.message),
            "Response content '{:?}' does not match re '{}'",
            response,
            exp_re
        );
    }

    /// Finishes checking the response and expects it to contain a valid JSON object of
    /// type `T`.
    pub(crate) async fn expect_json<T: DeserializeOwned>(self) -> T {
        self.verify();

        let body = axum::body::to_bytes(self.response.into_body(), MAX_BODY_SIZE).await.unwrap();
        serde_json::from_slice::<T>(&body).unwrap()
    }

    /// Finishes checking the response and returns the response itself for out of band
    /// validation of properties not supported by the `ResponseChecker`.
    pub(crate) async fn take_response(self) -> HttpResponse {
        self.verify();

        self.response
    }
}
