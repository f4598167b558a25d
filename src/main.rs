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

//! Entry point to the registry service.

// Keep these in sync with other top-level files.
#![warn(anonymous_parameters, bad_style, clippy::missing_docs_in_private_items, missing_docs)]
#![warn(unused, unused_extern_crates, unused_import_braces, unused_qualifications)]
#![warn(unsafe_code)]

use log::info;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use vehicle_registry::db::{self, Db};
use vehicle_registry::env::get_optional_var;
use vehicle_registry::serve;

/// Connects to the store selected by the `REGISTRY_DB` environment variable.
///
/// The SQLite backend (the default) reads its connection string from `REGISTRY_SQLITE_URI` and
/// falls back to an in-memory database; the PostgreSQL backend reads the `REGISTRY_PG_*`
/// variables.
async fn connect_db() -> Arc<dyn Db + Send + Sync> {
    let backend = get_optional_var::<String>("REGISTRY", "DB")
        .expect("Invalid REGISTRY_DB")
        .unwrap_or_else(|| "sqlite".to_owned());
    match backend.as_str() {
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let uri = get_optional_var::<String>("REGISTRY", "SQLITE_URI")
                .expect("Invalid REGISTRY_SQLITE_URI")
                .unwrap_or_else(|| ":memory:".to_owned());
            let db = db::sqlite::connect(&uri).await.expect("Cannot open the SQLite database");
            Arc::new(db)
        }

        #[cfg(feature = "postgres")]
        "postgres" => {
            let opts = db::postgres::PostgresOptions::from_env("REGISTRY_PG")
                .expect("Invalid PostgreSQL connection settings");
            let db = db::postgres::PostgresDb::connect(opts)
                .expect("Cannot open the PostgreSQL database");
            Arc::new(db)
        }

        other => panic!("Unknown REGISTRY_DB value '{}'", other),
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let port = get_optional_var::<u16>("REGISTRY", "PORT")
        .expect("Invalid REGISTRY_PORT")
        .unwrap_or(3000);
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));

    let db = connect_db().await;
    let mut ex = db.ex().await.expect("Cannot connect to the database");
    db::init_schema(&mut ex).await.expect("Cannot initialize the database schema");
    drop(ex);

    info!("Listening on {}", addr);
    serve(addr, db).await.expect("The server failed")
}
