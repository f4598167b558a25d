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

//! Test utilities for the business logic.

use crate::db::{self, Db, Executor};
use crate::driver::Driver;
use crate::model::{PersonId, PersonKind, Vehicle, Vin};
use std::sync::Arc;

/// State of a running test, backed by an in-memory database.
pub(crate) struct TestContext {
    /// The database the driver under test talks to.
    db: Arc<dyn Db + Send + Sync>,
}

impl TestContext {
    /// Initializes the database and the driver under test.
    pub(crate) async fn setup() -> Self {
        let db = Arc::from(crate::db::sqlite::testutils::setup().await);
        db::init_schema(&mut db.ex().await.unwrap()).await.unwrap();
        Self { db }
    }

    /// Returns a driver instance for the one operation a test needs.
    pub(crate) fn driver(&self) -> Driver {
        Driver::new(self.db.clone())
    }

    /// Returns a direct executor against the database, bypassing the driver.
    pub(crate) async fn ex(&self) -> Executor {
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
}
