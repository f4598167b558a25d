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

//! Operations on the vehicle set of one owner.

use crate::db::{self, DbError, Executor};
use crate::driver::{Driver, DriverResult};
use crate::model::{PersonId, PersonKind, Vehicle};

/// Ensures that `id` names an existing owner, not any other kind of person.
async fn require_owner(ex: &mut Executor, id: PersonId) -> DriverResult<()> {
    match db::get_person(ex, id).await? {
        Some(row) if row.kind == PersonKind::Owner => Ok(()),
        _ => Err(DbError::NotFound.into()),
    }
}

impl Driver {
    /// Gets the vehicles held by the owner `owner_id`, ordered by VIN.
    pub(crate) async fn vehicles_of_owner(self, owner_id: PersonId) -> DriverResult<Vec<Vehicle>> {
        let mut tx = self.db.begin().await?;
        require_owner(tx.ex(), owner_id).await?;
        let vehicles = db::list_owner_vehicles(tx.ex(), owner_id).await?;
        tx.commit().await?;
        Ok(vehicles)
    }

    /// Adds `vehicle` to the set held by the owner `owner_id` and returns true when the vehicle
    /// itself had to be created.
    ///
    /// When a vehicle with the same VIN already exists, of whichever subtype, it is reused as-is:
    /// the fields of the payload do not overwrite the stored ones.  Nothing prevents the vehicle
    /// from being held by several owners at once.
    pub(crate) async fn add_vehicle_to_owner(
        self,
        owner_id: PersonId,
        vehicle: Vehicle,
    ) -> DriverResult<bool> {
        let mut tx = self.db.begin().await?;
        require_owner(tx.ex(), owner_id).await?;

        let created = match db::get_vehicle(tx.ex(), vehicle.vin()).await? {
            Some(_) => false,
            None => {
                db::create_vehicle(tx.ex(), &vehicle).await?;
                true
            }
        };
        db::add_owner_vehicle(tx.ex(), owner_id, vehicle.vin()).await?;
        tx.commit().await?;
        Ok(created)
    }
}
