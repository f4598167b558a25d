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

//! Database abstraction in terms of the operations needed by the server.
//!
//! The facilities in this module provide an abstraction over different database systems.  The
//! PostgreSQL backend is for production use and the SQLite backend is primarily intended to
//! support unit tests, though it can also back small standalone deployments.
//!
//! Entity queries are free functions over an `Executor`, which can wrap either a direct pool
//! connection or an open transaction.  Transactions commit explicitly and roll back when dropped
//! without a commit.

use crate::model::{Car, ModelError, PersonId, PersonKind, Truck, Vehicle, VehicleKind, Vin};
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::Row;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(any(feature = "sqlite", test))]
pub mod sqlite;

#[cfg(not(any(feature = "postgres", feature = "sqlite", test)))]
compile_error!("at least one database backend feature must be enabled");

/// Database errors.  Any unexpected errors that come from the database are classified as
/// `BackendError`, but errors we know about have more specific types.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum DbError {
    /// Indicates that a request to create an entry failed because it already exists.
    #[error("Already exists")]
    AlreadyExists,

    /// Catch-all error type for unexpected database errors.
    #[error("Database error: {0}")]
    BackendError(String),

    /// Indicates a failure processing the data that already exists in the database.
    #[error("Data integrity error: {0}")]
    DataIntegrityError(String),

    /// Indicates that a requested entry does not exist.
    #[error("Entity not found")]
    NotFound,

    /// Indicates that the database is not available (maybe because of too many active concurrent
    /// connections).
    #[error("Unavailable")]
    Unavailable,
}

impl From<ModelError> for DbError {
    fn from(e: ModelError) -> Self {
        DbError::DataIntegrityError(e.to_string())
    }
}

/// Result type for this module.
pub type DbResult<T> = Result<T, DbError>;

/// A database executor that can talk to multiple database implementations.
///
/// Note that this can wrap an executor that talks directly to a pool or to an open transaction.
pub enum Executor {
    /// A PostgreSQL executor.
    #[cfg(feature = "postgres")]
    Postgres(postgres::PostgresExecutor),

    /// A SQLite executor.
    #[cfg(any(feature = "sqlite", test))]
    Sqlite(sqlite::SqliteExecutor),
}

/// A wrapper for a database executor backed by an open transaction.
pub struct TxExecutor(Executor);

impl TxExecutor {
    /// Returns the executor wrapped by this transaction.
    ///
    /// This would be better called `executor` but this method is used so frequently that it makes
    /// call sites too verbose.
    pub fn ex(&mut self) -> &mut Executor {
        &mut self.0
    }

    /// Commits the transaction.
    pub async fn commit(self) -> DbResult<()> {
        match self.0 {
            #[cfg(feature = "postgres")]
            Executor::Postgres(e) => e.commit().await,

            #[cfg(any(feature = "sqlite", test))]
            Executor::Sqlite(e) => e.commit().await,
        }
    }
}

/// Abstraction over the database connection.
#[async_trait]
pub trait Db {
    /// Obtains an executor for direct access to the pool.
    ///
    /// This would be better called `executor` but this method is used so frequently that it makes
    /// call sites too verbose.
    async fn ex(&self) -> DbResult<Executor>;

    /// Begins a transaction.
    ///
    /// It is the responsibility of the caller to call `commit` on the returned executor.  Otherwise
    /// the transaction is rolled back on drop.
    async fn begin(&self) -> DbResult<TxExecutor>;

    /// Closes the connection pool.
    async fn close(&self);
}

/// Initializes the database schema.
pub async fn init_schema(ex: &mut Executor) -> DbResult<()> {
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ref mut ex) => {
            postgres::run_schema(ex, include_str!("postgres.sql")).await
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ref mut ex) => sqlite::run_schema(ex, include_str!("sqlite.sql")).await,
    }
}

/// Validates that a statement that should have touched exactly one row of `entity` did so.
///
/// Zero touched rows means the target row does not exist; anything above one means the keys we
/// rely on are not actually keys.
fn ensure_one_row(entity: &str, affected: u64) -> DbResult<()> {
    match affected {
        0 => Err(DbError::NotFound),
        1 => Ok(()),
        _ => Err(DbError::BackendError(format!("Update of {} affected {} rows", entity, affected))),
    }
}

/// Raw scalar columns of a persons row.
///
/// Owners and plain persons share the same table, so this carries the kind discriminator and
/// leaves the assembly of full resources (including an owner's vehicle set) to the caller.
#[derive(Clone)]
#[cfg_attr(test, derive(Debug, PartialEq))]
pub struct PersonRow {
    /// Store-assigned identifier of the row.
    pub id: PersonId,

    /// Which concrete person kind the row holds.
    pub kind: PersonKind,

    /// Full name of the person.
    pub name: String,

    /// Contact email address of the person.
    pub email: String,
}

/// Rebuilds a `PersonRow` from its raw column values.
fn person_from_parts(id: i64, kind: &str, name: String, email: String) -> DbResult<PersonRow> {
    let kind = PersonKind::parse(kind)?;
    Ok(PersonRow { id: PersonId::new(id), kind, name, email })
}

/// Rebuilds a `Vehicle` from its raw column values.
fn vehicle_from_parts(
    vin: String,
    kind: &str,
    fuel_consumption: i32,
    horsepower: i32,
    speed: i32,
    doors: Option<i32>,
    axles: Option<i32>,
) -> DbResult<Vehicle> {
    let vin = Vin::new(vin)?;
    match VehicleKind::parse(kind)? {
        VehicleKind::Car => {
            let doors = doors.ok_or_else(|| {
                DbError::DataIntegrityError(format!("Car {} has no doors count", vin))
            })?;
            Ok(Vehicle::Car(Car::new(vin, fuel_consumption, horsepower, speed, doors)))
        }
        VehicleKind::Truck => {
            let axles = axles.ok_or_else(|| {
                DbError::DataIntegrityError(format!("Truck {} has no axles count", vin))
            })?;
            Ok(Vehicle::Truck(Truck::new(vin, fuel_consumption, horsepower, speed, axles)))
        }
    }
}

/// Splits a vehicle into the column values shared by both backends.
fn vehicle_to_parts(vehicle: &Vehicle) -> (&str, &'static str, i32, i32, i32, Option<i32>, Option<i32>) {
    match vehicle {
        Vehicle::Car(car) => (
            car.vin().as_str(),
            VehicleKind::Car.as_str(),
            *car.fuel_consumption(),
            *car.horsepower(),
            *car.speed(),
            Some(*car.doors()),
            None,
        ),
        Vehicle::Truck(truck) => (
            truck.vin().as_str(),
            VehicleKind::Truck.as_str(),
            *truck.fuel_consumption(),
            *truck.horsepower(),
            *truck.speed(),
            None,
            Some(*truck.axles()),
        ),
    }
}

/// Gets all persons rows, owners included, ordered by id.
pub async fn list_persons(ex: &mut Executor) -> DbResult<Vec<PersonRow>> {
    let query_str = "SELECT id, kind, name, email FROM persons ORDER BY id";
    let mut persons = vec![];
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ref mut ex) => {
            let mut rows = sqlx::query(query_str).fetch(ex.conn());
            while let Some(row) = rows.try_next().await.map_err(postgres::map_sqlx_error)? {
                let id: i64 = row.try_get("id").map_err(postgres::map_sqlx_error)?;
                let kind: String = row.try_get("kind").map_err(postgres::map_sqlx_error)?;
                let name: String = row.try_get("name").map_err(postgres::map_sqlx_error)?;
                let email: String = row.try_get("email").map_err(postgres::map_sqlx_error)?;
                persons.push(person_from_parts(id, &kind, name, email)?);
            }
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ref mut ex) => {
            let mut rows = sqlx::query(query_str).fetch(ex.conn());
            while let Some(row) = rows.try_next().await.map_err(sqlite::map_sqlx_error)? {
                let id: i64 = row.try_get("id").map_err(sqlite::map_sqlx_error)?;
                let kind: String = row.try_get("kind").map_err(sqlite::map_sqlx_error)?;
                let name: String = row.try_get("name").map_err(sqlite::map_sqlx_error)?;
                let email: String = row.try_get("email").map_err(sqlite::map_sqlx_error)?;
                persons.push(person_from_parts(id, &kind, name, email)?);
            }
        }
    }
    Ok(persons)
}

/// Gets the persons row with the given `id`, or `None` if it does not exist.
pub async fn get_person(ex: &mut Executor, id: PersonId) -> DbResult<Option<PersonRow>> {
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ref mut ex) => {
            let query_str = "SELECT id, kind, name, email FROM persons WHERE id = $1";
            match sqlx::query(query_str)
                .bind(id.as_i64())
                .fetch_optional(ex.conn())
                .await
                .map_err(postgres::map_sqlx_error)?
            {
                Some(row) => {
                    let id: i64 = row.try_get("id").map_err(postgres::map_sqlx_error)?;
                    let kind: String = row.try_get("kind").map_err(postgres::map_sqlx_error)?;
                    let name: String = row.try_get("name").map_err(postgres::map_sqlx_error)?;
                    let email: String = row.try_get("email").map_err(postgres::map_sqlx_error)?;
                    Ok(Some(person_from_parts(id, &kind, name, email)?))
                }
                None => Ok(None),
            }
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ref mut ex) => {
            let query_str = "SELECT id, kind, name, email FROM persons WHERE id = ?";
            match sqlx::query(query_str)
                .bind(id.as_i64())
                .fetch_optional(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?
            {
                Some(row) => {
                    let id: i64 = row.try_get("id").map_err(sqlite::map_sqlx_error)?;
                    let kind: String = row.try_get("kind").map_err(sqlite::map_sqlx_error)?;
                    let name: String = row.try_get("name").map_err(sqlite::map_sqlx_error)?;
                    let email: String = row.try_get("email").map_err(sqlite::map_sqlx_error)?;
                    Ok(Some(person_from_parts(id, &kind, name, email)?))
                }
                None => Ok(None),
            }
        }
    }
}

/// Gets the persons row with the given `id` while holding a pessimistic lock on it for the rest
/// of the transaction, or `None` if the row does not exist.
///
/// This must run within a transaction to be of any use.
pub async fn get_person_locked(ex: &mut Executor, id: PersonId) -> DbResult<Option<PersonRow>> {
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ref mut ex) => {
            let query_str = "SELECT id, kind, name, email FROM persons WHERE id = $1 FOR UPDATE";
            match sqlx::query(query_str)
                .bind(id.as_i64())
                .fetch_optional(ex.conn())
                .await
                .map_err(postgres::map_sqlx_error)?
            {
                Some(row) => {
                    let id: i64 = row.try_get("id").map_err(postgres::map_sqlx_error)?;
                    let kind: String = row.try_get("kind").map_err(postgres::map_sqlx_error)?;
                    let name: String = row.try_get("name").map_err(postgres::map_sqlx_error)?;
                    let email: String = row.try_get("email").map_err(postgres::map_sqlx_error)?;
                    Ok(Some(person_from_parts(id, &kind, name, email)?))
                }
                None => Ok(None),
            }
        }

        // SQLite has no row-level locks: the transaction that performs the lookup serializes
        // against all other writers at the database level already.
        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(_) => get_person(ex, id).await,
    }
}

/// Creates a new persons row of the given `kind` and returns the store-assigned id.
pub async fn create_person(
    ex: &mut Executor,
    kind: PersonKind,
    name: &str,
    email: &str,
) -> DbResult<PersonId> {
    let id: i64 = match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ref mut ex) => {
            let query_str =
                "INSERT INTO persons (kind, name, email) VALUES ($1, $2, $3) RETURNING id";
            let row = sqlx::query(query_str)
                .bind(kind.as_str())
                .bind(name)
                .bind(email)
                .fetch_one(ex.conn())
                .await
                .map_err(postgres::map_sqlx_error)?;
            row.try_get("id").map_err(postgres::map_sqlx_error)?
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ref mut ex) => {
            let query_str =
                "INSERT INTO persons (kind, name, email) VALUES (?, ?, ?) RETURNING id";
            let row = sqlx::query(query_str)
                .bind(kind.as_str())
                .bind(name)
                .bind(email)
                .fetch_one(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?;
            row.try_get("id").map_err(sqlite::map_sqlx_error)?
        }
    };
    Ok(PersonId::new(id))
}

/// Creates a new persons row of the given `kind` under a caller-supplied `id`.
///
/// Fails with `AlreadyExists` if a row with that id exists.
pub async fn create_person_with_id(
    ex: &mut Executor,
    id: PersonId,
    kind: PersonKind,
    name: &str,
    email: &str,
) -> DbResult<()> {
    let rows_affected = match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ref mut ex) => {
            let query_str = "INSERT INTO persons (id, kind, name, email) VALUES ($1, $2, $3, $4)";
            sqlx::query(query_str)
                .bind(id.as_i64())
                .bind(kind.as_str())
                .bind(name)
                .bind(email)
                .execute(ex.conn())
                .await
                .map_err(postgres::map_sqlx_error)?
                .rows_affected()
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ref mut ex) => {
            let query_str = "INSERT INTO persons (id, kind, name, email) VALUES (?, ?, ?, ?)";
            sqlx::query(query_str)
                .bind(id.as_i64())
                .bind(kind.as_str())
                .bind(name)
                .bind(email)
                .execute(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?
                .rows_affected()
        }
    };
    if rows_affected != 1 {
        return Err(DbError::BackendError(format!("Insert created {} rows", rows_affected)));
    }
    Ok(())
}

/// Updates the scalar fields of the persons row with the given `id`.
///
/// Fails with `NotFound` if no row matches.  The kind discriminator is never changed.
pub async fn update_person(
    ex: &mut Executor,
    id: PersonId,
    name: &str,
    email: &str,
) -> DbResult<()> {
    let rows_affected = match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ref mut ex) => {
            let query_str = "UPDATE persons SET name = $1, email = $2 WHERE id = $3";
            sqlx::query(query_str)
                .bind(name)
                .bind(email)
                .bind(id.as_i64())
                .execute(ex.conn())
                .await
                .map_err(postgres::map_sqlx_error)?
                .rows_affected()
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ref mut ex) => {
            let query_str = "UPDATE persons SET name = ?, email = ? WHERE id = ?";
            sqlx::query(query_str)
                .bind(name)
                .bind(email)
                .bind(id.as_i64())
                .execute(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?
                .rows_affected()
        }
    };
    ensure_one_row("person", rows_affected)
}

/// Deletes the persons row with the given `id`, used by tests that need a pristine id.
#[cfg(all(test, feature = "postgres"))]
pub(crate) async fn delete_person(ex: &mut Executor, id: PersonId) -> DbResult<()> {
    match ex {
        Executor::Postgres(ref mut ex) => {
            let query_str = "DELETE FROM persons WHERE id = $1";
            sqlx::query(query_str)
                .bind(id.as_i64())
                .execute(ex.conn())
                .await
                .map_err(postgres::map_sqlx_error)?;
            Ok(())
        }

        Executor::Sqlite(ref mut ex) => {
            let query_str = "DELETE FROM persons WHERE id = ?";
            sqlx::query(query_str)
                .bind(id.as_i64())
                .execute(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?;
            Ok(())
        }
    }
}

/// Gets all vehicles of the given `kind`, ordered by VIN.
pub async fn list_vehicles(ex: &mut Executor, kind: VehicleKind) -> DbResult<Vec<Vehicle>> {
    let mut vehicles = vec![];
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ref mut ex) => {
            let query_str = "
                SELECT vin, kind, fuel_consumption, horsepower, speed, doors, axles
                FROM vehicles WHERE kind = $1 ORDER BY vin
            ";
            let mut rows = sqlx::query(query_str).bind(kind.as_str()).fetch(ex.conn());
            while let Some(row) = rows.try_next().await.map_err(postgres::map_sqlx_error)? {
                vehicles.push(vehicle_from_row_pg(&row)?);
            }
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ref mut ex) => {
            let query_str = "
                SELECT vin, kind, fuel_consumption, horsepower, speed, doors, axles
                FROM vehicles WHERE kind = ? ORDER BY vin
            ";
            let mut rows = sqlx::query(query_str).bind(kind.as_str()).fetch(ex.conn());
            while let Some(row) = rows.try_next().await.map_err(sqlite::map_sqlx_error)? {
                vehicles.push(vehicle_from_row_sqlite(&row)?);
            }
        }
    }
    Ok(vehicles)
}

/// Gets the vehicle with the given `vin` regardless of its subtype, or `None` if it does not
/// exist.
pub async fn get_vehicle(ex: &mut Executor, vin: &Vin) -> DbResult<Option<Vehicle>> {
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ref mut ex) => {
            let query_str = "
                SELECT vin, kind, fuel_consumption, horsepower, speed, doors, axles
                FROM vehicles WHERE vin = $1
            ";
            match sqlx::query(query_str)
                .bind(vin.as_str())
                .fetch_optional(ex.conn())
                .await
                .map_err(postgres::map_sqlx_error)?
            {
                Some(row) => Ok(Some(vehicle_from_row_pg(&row)?)),
                None => Ok(None),
            }
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ref mut ex) => {
            let query_str = "
                SELECT vin, kind, fuel_consumption, horsepower, speed, doors, axles
                FROM vehicles WHERE vin = ?
            ";
            match sqlx::query(query_str)
                .bind(vin.as_str())
                .fetch_optional(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?
            {
                Some(row) => Ok(Some(vehicle_from_row_sqlite(&row)?)),
                None => Ok(None),
            }
        }
    }
}

/// Gets the vehicle with the given `vin` while holding a pessimistic lock on it for the rest of
/// the transaction, or `None` if it does not exist.
///
/// This must run within a transaction to be of any use.
pub async fn get_vehicle_locked(ex: &mut Executor, vin: &Vin) -> DbResult<Option<Vehicle>> {
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ref mut ex) => {
            let query_str = "
                SELECT vin, kind, fuel_consumption, horsepower, speed, doors, axles
                FROM vehicles WHERE vin = $1 FOR UPDATE
            ";
            match sqlx::query(query_str)
                .bind(vin.as_str())
                .fetch_optional(ex.conn())
                .await
                .map_err(postgres::map_sqlx_error)?
            {
                Some(row) => Ok(Some(vehicle_from_row_pg(&row)?)),
                None => Ok(None),
            }
        }

        // See get_person_locked for why the plain lookup is sufficient on SQLite.
        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(_) => get_vehicle(ex, vin).await,
    }
}

/// Creates a new vehicles row.  Fails with `AlreadyExists` if the VIN is taken, no matter by
/// which subtype.
pub async fn create_vehicle(ex: &mut Executor, vehicle: &Vehicle) -> DbResult<()> {
    let (vin, kind, fuel_consumption, horsepower, speed, doors, axles) =
        vehicle_to_parts(vehicle);
    let rows_affected = match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ref mut ex) => {
            let query_str = "
                INSERT INTO vehicles (vin, kind, fuel_consumption, horsepower, speed, doors, axles)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
            ";
            sqlx::query(query_str)
                .bind(vin)
                .bind(kind)
                .bind(fuel_consumption)
                .bind(horsepower)
                .bind(speed)
                .bind(doors)
                .bind(axles)
                .execute(ex.conn())
                .await
                .map_err(postgres::map_sqlx_error)?
                .rows_affected()
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ref mut ex) => {
            let query_str = "
                INSERT INTO vehicles (vin, kind, fuel_consumption, horsepower, speed, doors, axles)
                VALUES (?, ?, ?, ?, ?, ?, ?)
            ";
            sqlx::query(query_str)
                .bind(vin)
                .bind(kind)
                .bind(fuel_consumption)
                .bind(horsepower)
                .bind(speed)
                .bind(doors)
                .bind(axles)
                .execute(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?
                .rows_affected()
        }
    };
    if rows_affected != 1 {
        return Err(DbError::BackendError(format!("Insert created {} rows", rows_affected)));
    }
    Ok(())
}

/// Updates the fields of the vehicles row keyed by `vin` to those of `vehicle`.  The VIN column
/// itself and the kind discriminator are never changed.
///
/// Fails with `NotFound` if no row matches.
pub async fn update_vehicle(ex: &mut Executor, vin: &Vin, vehicle: &Vehicle) -> DbResult<()> {
    let (_vin, _kind, fuel_consumption, horsepower, speed, doors, axles) =
        vehicle_to_parts(vehicle);
    let rows_affected = match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ref mut ex) => {
            let query_str = "
                UPDATE vehicles
                SET fuel_consumption = $1, horsepower = $2, speed = $3, doors = $4, axles = $5
                WHERE vin = $6
            ";
            sqlx::query(query_str)
                .bind(fuel_consumption)
                .bind(horsepower)
                .bind(speed)
                .bind(doors)
                .bind(axles)
                .bind(vin.as_str())
                .execute(ex.conn())
                .await
                .map_err(postgres::map_sqlx_error)?
                .rows_affected()
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ref mut ex) => {
            let query_str = "
                UPDATE vehicles
                SET fuel_consumption = ?, horsepower = ?, speed = ?, doors = ?, axles = ?
                WHERE vin = ?
            ";
            sqlx::query(query_str)
                .bind(fuel_consumption)
                .bind(horsepower)
                .bind(speed)
                .bind(doors)
                .bind(axles)
                .bind(vin.as_str())
                .execute(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?
                .rows_affected()
        }
    };
    ensure_one_row("vehicle", rows_affected)
}

/// Gets the vehicles associated with the owner `owner_id`, ordered by VIN.
///
/// The owner's own existence is not checked here: a missing owner yields an empty collection.
pub async fn list_owner_vehicles(ex: &mut Executor, owner_id: PersonId) -> DbResult<Vec<Vehicle>> {
    let mut vehicles = vec![];
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ref mut ex) => {
            let query_str = "
                SELECT v.vin, v.kind, v.fuel_consumption, v.horsepower, v.speed, v.doors, v.axles
                FROM vehicles v JOIN owner_vehicles ov ON ov.vin = v.vin
                WHERE ov.owner_id = $1
                ORDER BY v.vin
            ";
            let mut rows = sqlx::query(query_str).bind(owner_id.as_i64()).fetch(ex.conn());
            while let Some(row) = rows.try_next().await.map_err(postgres::map_sqlx_error)? {
                vehicles.push(vehicle_from_row_pg(&row)?);
            }
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ref mut ex) => {
            let query_str = "
                SELECT v.vin, v.kind, v.fuel_consumption, v.horsepower, v.speed, v.doors, v.axles
                FROM vehicles v JOIN owner_vehicles ov ON ov.vin = v.vin
                WHERE ov.owner_id = ?
                ORDER BY v.vin
            ";
            let mut rows = sqlx::query(query_str).bind(owner_id.as_i64()).fetch(ex.conn());
            while let Some(row) = rows.try_next().await.map_err(sqlite::map_sqlx_error)? {
                vehicles.push(vehicle_from_row_sqlite(&row)?);
            }
        }
    }
    Ok(vehicles)
}

/// Associates the vehicle `vin` with the owner `owner_id`.
///
/// The association is a set: adding a vehicle that is already present is not an error and leaves
/// the set unchanged.
pub async fn add_owner_vehicle(ex: &mut Executor, owner_id: PersonId, vin: &Vin) -> DbResult<()> {
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ref mut ex) => {
            let query_str = "
                INSERT INTO owner_vehicles (owner_id, vin) VALUES ($1, $2)
                ON CONFLICT DO NOTHING
            ";
            sqlx::query(query_str)
                .bind(owner_id.as_i64())
                .bind(vin.as_str())
                .execute(ex.conn())
                .await
                .map_err(postgres::map_sqlx_error)?;
            Ok(())
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ref mut ex) => {
            let query_str = "INSERT OR IGNORE INTO owner_vehicles (owner_id, vin) VALUES (?, ?)";
            sqlx::query(query_str)
                .bind(owner_id.as_i64())
                .bind(vin.as_str())
                .execute(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?;
            Ok(())
        }
    }
}

/// Rebuilds a `Vehicle` from a PostgreSQL row.
#[cfg(feature = "postgres")]
fn vehicle_from_row_pg(row: &sqlx::postgres::PgRow) -> DbResult<Vehicle> {
    let vin: String = row.try_get("vin").map_err(postgres::map_sqlx_error)?;
    let kind: String = row.try_get("kind").map_err(postgres::map_sqlx_error)?;
    let fuel_consumption: i32 =
        row.try_get("fuel_consumption").map_err(postgres::map_sqlx_error)?;
    let horsepower: i32 = row.try_get("horsepower").map_err(postgres::map_sqlx_error)?;
    let speed: i32 = row.try_get("speed").map_err(postgres::map_sqlx_error)?;
    let doors: Option<i32> = row.try_get("doors").map_err(postgres::map_sqlx_error)?;
    let axles: Option<i32> = row.try_get("axles").map_err(postgres::map_sqlx_error)?;
    vehicle_from_parts(vin, &kind, fuel_consumption, horsepower, speed, doors, axles)
}

/// Rebuilds a `Vehicle` from a SQLite row.
#[cfg(any(feature = "sqlite", test))]
fn vehicle_from_row_sqlite(row: &sqlx::sqlite::SqliteRow) -> DbResult<Vehicle> {
    let vin: String = row.try_get("vin").map_err(sqlite::map_sqlx_error)?;
    let kind: String = row.try_get("kind").map_err(sqlite::map_sqlx_error)?;
    let fuel_consumption: i32 = row.try_get("fuel_consumption").map_err(sqlite::map_sqlx_error)?;
    let horsepower: i32 = row.try_get("horsepower").map_err(sqlite::map_sqlx_error)?;
    let speed: i32 = row.try_get("speed").map_err(sqlite::map_sqlx_error)?;
    let doors: Option<i32> = row.try_get("doors").map_err(sqlite::map_sqlx_error)?;
    let axles: Option<i32> = row.try_get("axles").map_err(sqlite::map_sqlx_error)?;
    vehicle_from_parts(vin, &kind, fuel_consumption, horsepower, speed, doors, axles)
}
