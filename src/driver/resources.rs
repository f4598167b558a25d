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

//! Uniform CRUD operations over the closed registry of entity kinds.
//!
//! Every operation here opens exactly one transaction, commits it on success and lets it roll
//! back on drop otherwise.  The pairing between an `EntityId` and the `Resource` it addresses is
//! established by the REST layer, which derives both from the same entity kind.

use crate::db::{self, DbError, Executor, PersonRow};
use crate::driver::{Driver, DriverResult};
use crate::model::{
    EntityId, EntityKind, Owner, Person, PersonId, PersonKind, Resource, Vehicle, VehicleKind, Vin,
};

/// Builds the resource representation of a persons row, fetching an owner's vehicle set.
async fn person_resource(ex: &mut Executor, row: PersonRow) -> DriverResult<Resource> {
    match row.kind {
        PersonKind::Person => {
            Ok(Resource::Person(Person::new(Some(row.id), row.name, row.email)))
        }
        PersonKind::Owner => {
            let vehicles = db::list_owner_vehicles(ex, row.id).await?;
            Ok(Resource::Owner(Owner::new(Some(row.id), row.name, row.email, vehicles)))
        }
    }
}

/// Updates the vehicle keyed by `vin` after checking that it exists under the same subtype.
async fn update_vehicle_checked(
    ex: &mut Executor,
    vin: &Vin,
    vehicle: Vehicle,
) -> DriverResult<()> {
    match db::get_vehicle(ex, vin).await? {
        Some(existing) if existing.kind() == vehicle.kind() => (),
        _ => return Err(DbError::NotFound.into()),
    }
    db::update_vehicle(ex, vin, &vehicle).await?;
    Ok(())
}

/// Create-or-update of the persons row `id`.  The lookup takes a pessimistic lock so that the
/// check-then-act is atomic against concurrent calls targeting the same id.
///
/// A person-kind merge applies to any matching row; an owner-kind merge requires the row to be
/// an owner.  When the lookup misses, the row is created under the caller-supplied id.
async fn upsert_person(
    ex: &mut Executor,
    id: PersonId,
    kind: PersonKind,
    name: &str,
    email: &str,
) -> DriverResult<bool> {
    match db::get_person_locked(ex, id).await? {
        Some(row) if kind == PersonKind::Person || row.kind == kind => {
            db::update_person(ex, id, name, email).await?;
            Ok(false)
        }
        _ => {
            db::create_person_with_id(ex, id, kind, name, email).await?;
            Ok(true)
        }
    }
}

/// Create-or-update of the vehicles row `vin`, with the same locking contract as
/// `upsert_person`.  A lookup that misses because the VIN belongs to the sibling subtype falls
/// through to creation, whose identity collision then surfaces to the caller.
async fn upsert_vehicle(ex: &mut Executor, vin: &Vin, mut vehicle: Vehicle) -> DriverResult<bool> {
    // The path identifier is authoritative over whatever VIN the payload carries.
    vehicle.set_vin(vin.clone());

    match db::get_vehicle_locked(ex, vin).await? {
        Some(existing) if existing.kind() == vehicle.kind() => {
            db::update_vehicle(ex, vin, &vehicle).await?;
            Ok(false)
        }
        _ => {
            db::create_vehicle(ex, &vehicle).await?;
            Ok(true)
        }
    }
}

impl Driver {
    /// Gets all resources of the given `kind`.
    pub(crate) async fn list(self, kind: EntityKind) -> DriverResult<Vec<Resource>> {
        let mut tx = self.db.begin().await?;
        let mut resources = vec![];
        match kind {
            EntityKind::Car => {
                for vehicle in db::list_vehicles(tx.ex(), VehicleKind::Car).await? {
                    resources.push(Resource::from(vehicle));
                }
            }
            EntityKind::Truck => {
                for vehicle in db::list_vehicles(tx.ex(), VehicleKind::Truck).await? {
                    resources.push(Resource::from(vehicle));
                }
            }
            EntityKind::Person => {
                let rows = db::list_persons(tx.ex()).await?;
                for row in rows {
                    let resource = person_resource(tx.ex(), row).await?;
                    resources.push(resource);
                }
            }
            EntityKind::Owner => {
                let rows = db::list_persons(tx.ex()).await?;
                for row in rows {
                    if row.kind == PersonKind::Owner {
                        let resource = person_resource(tx.ex(), row).await?;
                        resources.push(resource);
                    }
                }
            }
        }
        tx.commit().await?;
        Ok(resources)
    }

    /// Gets the resource of the given `kind` with the given `id`.
    ///
    /// Person-kind lookups are polymorphic and match owners too; owner, car and truck lookups
    /// match only their own kind.
    pub(crate) async fn get(self, kind: EntityKind, id: &EntityId) -> DriverResult<Resource> {
        let mut tx = self.db.begin().await?;
        let resource = match (kind, id) {
            (EntityKind::Person, EntityId::Numeric(id)) => {
                let row = db::get_person(tx.ex(), *id).await?.ok_or(DbError::NotFound)?;
                person_resource(tx.ex(), row).await?
            }
            (EntityKind::Owner, EntityId::Numeric(id)) => {
                let row = db::get_person(tx.ex(), *id).await?.ok_or(DbError::NotFound)?;
                if row.kind != PersonKind::Owner {
                    return Err(DbError::NotFound.into());
                }
                person_resource(tx.ex(), row).await?
            }
            (EntityKind::Car, EntityId::Vin(vin)) | (EntityKind::Truck, EntityId::Vin(vin)) => {
                let vehicle = db::get_vehicle(tx.ex(), vin).await?.ok_or(DbError::NotFound)?;
                if Some(vehicle.kind()) != kind.as_vehicle() {
                    return Err(DbError::NotFound.into());
                }
                Resource::from(vehicle)
            }
            _ => unreachable!("Entity kind and identifier kind must agree"),
        };
        tx.commit().await?;
        Ok(resource)
    }

    /// Creates a new resource and returns its identifier.
    ///
    /// Numeric-id resources get a store-assigned id, ignoring any id the payload carries; VIN
    /// resources keep their client-supplied VIN and fail on a collision.  An owner's vehicle
    /// set travels through the sub-resource API, never through creation.
    pub(crate) async fn create(self, resource: Resource) -> DriverResult<EntityId> {
        let mut tx = self.db.begin().await?;
        let id = match resource {
            Resource::Person(person) => {
                let id =
                    db::create_person(tx.ex(), PersonKind::Person, person.name(), person.email())
                        .await?;
                EntityId::Numeric(id)
            }
            Resource::Owner(owner) => {
                let id =
                    db::create_person(tx.ex(), PersonKind::Owner, owner.name(), owner.email())
                        .await?;
                EntityId::Numeric(id)
            }
            Resource::Car(car) => {
                let vehicle = Vehicle::Car(car);
                db::create_vehicle(tx.ex(), &vehicle).await?;
                EntityId::Vin(vehicle.vin().clone())
            }
            Resource::Truck(truck) => {
                let vehicle = Vehicle::Truck(truck);
                db::create_vehicle(tx.ex(), &vehicle).await?;
                EntityId::Vin(vehicle.vin().clone())
            }
        };
        tx.commit().await?;
        Ok(id)
    }

    /// Updates the pre-existing resource with the given `id` to match `resource`.
    ///
    /// The path identifier is authoritative: for numeric kinds it selects the row regardless of
    /// the id in the payload, and for VIN kinds the payload's VIN is not allowed to redirect the
    /// write to a different row.
    pub(crate) async fn update(self, id: &EntityId, resource: Resource) -> DriverResult<()> {
        let mut tx = self.db.begin().await?;
        match (id, resource) {
            (EntityId::Numeric(id), Resource::Person(person)) => {
                db::update_person(tx.ex(), *id, person.name(), person.email()).await?;
            }
            (EntityId::Numeric(id), Resource::Owner(owner)) => {
                match db::get_person(tx.ex(), *id).await? {
                    Some(row) if row.kind == PersonKind::Owner => (),
                    _ => return Err(DbError::NotFound.into()),
                }
                db::update_person(tx.ex(), *id, owner.name(), owner.email()).await?;
            }
            (EntityId::Vin(vin), Resource::Car(car)) => {
                update_vehicle_checked(tx.ex(), vin, Vehicle::Car(car)).await?;
            }
            (EntityId::Vin(vin), Resource::Truck(truck)) => {
                update_vehicle_checked(tx.ex(), vin, Vehicle::Truck(truck)).await?;
            }
            _ => unreachable!("Entity kind and identifier kind must agree"),
        }
        tx.commit().await?;
        Ok(())
    }

    /// Creates the resource with the given `id` if it does not exist yet, or updates it to match
    /// `resource` otherwise.  Returns true when a new resource was created.
    pub(crate) async fn create_or_update(
        self,
        id: &EntityId,
        resource: Resource,
    ) -> DriverResult<bool> {
        let mut tx = self.db.begin().await?;
        let created = match (id, resource) {
            (EntityId::Numeric(id), Resource::Person(person)) => {
                upsert_person(tx.ex(), *id, PersonKind::Person, person.name(), person.email())
                    .await?
            }
            (EntityId::Numeric(id), Resource::Owner(owner)) => {
                upsert_person(tx.ex(), *id, PersonKind::Owner, owner.name(), owner.email())
                    .await?
            }
            (EntityId::Vin(vin), Resource::Car(car)) => {
                upsert_vehicle(tx.ex(), vin, Vehicle::Car(car)).await?
            }
            (EntityId::Vin(vin), Resource::Truck(truck)) => {
                upsert_vehicle(tx.ex(), vin, Vehicle::Truck(truck)).await?
            }
            _ => unreachable!("Entity kind and identifier kind must agree"),
        };
        tx.commit().await?;
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::testutils::TestContext;
    use crate::driver::DriverError;
    use crate::model::{Car, Truck};

    #[tokio::test]
    async fn test_list_empty() {
        let context = TestContext::setup().await;

        for kind in [EntityKind::Car, EntityKind::Owner, EntityKind::Person, EntityKind::Truck] {
            assert!(context.driver().list(kind).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_list_persons_is_polymorphic() {
        let context = TestContext::setup().await;

        let person_id = context.insert_person(PersonKind::Person, "Plain", "p@example.com").await;
        let owner_id = context.insert_person(PersonKind::Owner, "Holder", "h@example.com").await;
        let car = Vehicle::Car(Car::new(Vin::new("1A").unwrap(), 10, 200, 120, 4));
        context.insert_vehicle(&car).await;
        context.insert_owner_vehicle(owner_id, car.vin()).await;

        let resources = context.driver().list(EntityKind::Person).await.unwrap();
        assert_eq!(
            vec![
                Resource::Person(Person::new(Some(person_id), "Plain".to_owned(), "p@example.com".to_owned())),
                Resource::Owner(Owner::new(
                    Some(owner_id),
                    "Holder".to_owned(),
                    "h@example.com".to_owned(),
                    vec![car.clone()],
                )),
            ],
            resources
        );

        let resources = context.driver().list(EntityKind::Owner).await.unwrap();
        assert_eq!(1, resources.len());
        match &resources[0] {
            Resource::Owner(owner) => assert_eq!(&vec![car], owner.vehicles()),
            other => panic!("Expected an owner resource, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_person_matches_owners_too() {
        let context = TestContext::setup().await;

        let owner_id = context.insert_person(PersonKind::Owner, "Holder", "h@example.com").await;

        let resource = context
            .driver()
            .get(EntityKind::Person, &EntityId::Numeric(owner_id))
            .await
            .unwrap();
        match resource {
            Resource::Owner(owner) => assert_eq!(&Some(owner_id), owner.id()),
            other => panic!("Expected an owner resource, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_owner_requires_owner_kind() {
        let context = TestContext::setup().await;

        let person_id = context.insert_person(PersonKind::Person, "Plain", "p@example.com").await;

        assert_eq!(
            DriverError::NotFound("Entity not found".to_owned()),
            context
                .driver()
                .get(EntityKind::Owner, &EntityId::Numeric(person_id))
                .await
                .unwrap_err()
        );
    }

    #[tokio::test]
    async fn test_get_vehicle_requires_matching_subtype() {
        let context = TestContext::setup().await;

        let truck = Vehicle::Truck(Truck::new(Vin::new("T1").unwrap(), 30, 500, 90, 3));
        context.insert_vehicle(&truck).await;

        let id = EntityId::Vin(Vin::new("T1").unwrap());
        assert_eq!(
            DriverError::NotFound("Entity not found".to_owned()),
            context.driver().get(EntityKind::Car, &id).await.unwrap_err()
        );
        assert_eq!(
            Resource::from(truck),
            context.driver().get(EntityKind::Truck, &id).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_get_absent_is_not_found() {
        let context = TestContext::setup().await;

        assert_eq!(
            DriverError::NotFound("Entity not found".to_owned()),
            context
                .driver()
                .get(EntityKind::Person, &EntityId::Numeric(PersonId::new(123)))
                .await
                .unwrap_err()
        );
    }

    #[tokio::test]
    async fn test_create_person_assigns_id_and_ignores_payload_id() {
        let context = TestContext::setup().await;

        let person =
            Person::new(Some(PersonId::new(99)), "New".to_owned(), "new@example.com".to_owned());
        let id = context.driver().create(Resource::Person(person)).await.unwrap();

        let id = match id {
            EntityId::Numeric(id) => id,
            other => panic!("Expected a numeric id, got {:?}", other),
        };
        assert_ne!(PersonId::new(99), id);

        let row = db::get_person(&mut context.ex().await, id).await.unwrap().unwrap();
        assert_eq!("New", &row.name);
        assert_eq!(None, db::get_person(&mut context.ex().await, PersonId::new(99)).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_vehicle_keeps_vin_and_detects_collisions() {
        let context = TestContext::setup().await;

        let car = Car::new(Vin::new("1A").unwrap(), 10, 200, 120, 4);
        let id = context.driver().create(Resource::Car(car.clone())).await.unwrap();
        assert_eq!(EntityId::Vin(Vin::new("1A").unwrap()), id);

        assert_eq!(
            DriverError::AlreadyExists("Already exists".to_owned()),
            context.driver().create(Resource::Car(car)).await.unwrap_err()
        );
    }

    #[tokio::test]
    async fn test_update_person() {
        let context = TestContext::setup().await;

        let id = context.insert_person(PersonKind::Person, "Old", "old@example.com").await;
        let person = Person::new(None, "New".to_owned(), "new@example.com".to_owned());
        context
            .driver()
            .update(&EntityId::Numeric(id), Resource::Person(person))
            .await
            .unwrap();

        let row = db::get_person(&mut context.ex().await, id).await.unwrap().unwrap();
        assert_eq!("New", &row.name);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found_not_a_create() {
        let context = TestContext::setup().await;

        let person = Person::new(None, "New".to_owned(), "new@example.com".to_owned());
        assert_eq!(
            DriverError::NotFound("Entity not found".to_owned()),
            context
                .driver()
                .update(&EntityId::Numeric(PersonId::new(5)), Resource::Person(person))
                .await
                .unwrap_err()
        );
        assert_eq!(None, db::get_person(&mut context.ex().await, PersonId::new(5)).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_owner_requires_owner_kind() {
        let context = TestContext::setup().await;

        let id = context.insert_person(PersonKind::Person, "Plain", "p@example.com").await;
        let owner = Owner::new(None, "New".to_owned(), "new@example.com".to_owned(), vec![]);
        assert_eq!(
            DriverError::NotFound("Entity not found".to_owned()),
            context
                .driver()
                .update(&EntityId::Numeric(id), Resource::Owner(owner))
                .await
                .unwrap_err()
        );
    }

    #[tokio::test]
    async fn test_update_vehicle_requires_matching_subtype() {
        let context = TestContext::setup().await;

        let truck = Vehicle::Truck(Truck::new(Vin::new("T1").unwrap(), 30, 500, 90, 3));
        context.insert_vehicle(&truck).await;

        let car = Car::new(Vin::new("T1").unwrap(), 10, 200, 120, 4);
        assert_eq!(
            DriverError::NotFound("Entity not found".to_owned()),
            context
                .driver()
                .update(&EntityId::Vin(Vin::new("T1").unwrap()), Resource::Car(car))
                .await
                .unwrap_err()
        );
    }

    #[tokio::test]
    async fn test_create_or_update_person_creates_then_updates() {
        let context = TestContext::setup().await;

        let id = EntityId::Numeric(PersonId::new(5));
        let first = Person::new(None, "First".to_owned(), "first@example.com".to_owned());
        let second = Person::new(None, "Second".to_owned(), "second@example.com".to_owned());

        assert!(context.driver().create_or_update(&id, Resource::Person(first)).await.unwrap());
        assert!(!context.driver().create_or_update(&id, Resource::Person(second)).await.unwrap());

        let row = db::get_person(&mut context.ex().await, PersonId::new(5)).await.unwrap().unwrap();
        assert_eq!("Second", &row.name);
        assert_eq!("second@example.com", &row.email);
    }

    #[tokio::test]
    async fn test_create_or_update_vehicle_injects_path_vin() {
        let context = TestContext::setup().await;

        let id = EntityId::Vin(Vin::new("PATH").unwrap());
        let car = Car::new(Vin::new("BODY").unwrap(), 10, 200, 120, 4);

        assert!(context.driver().create_or_update(&id, Resource::Car(car)).await.unwrap());

        let vehicle =
            db::get_vehicle(&mut context.ex().await, &Vin::new("PATH").unwrap()).await.unwrap();
        assert!(vehicle.is_some());
        assert_eq!(
            None,
            db::get_vehicle(&mut context.ex().await, &Vin::new("BODY").unwrap()).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_create_or_update_vehicle_sibling_kind_collides() {
        let context = TestContext::setup().await;

        let truck = Vehicle::Truck(Truck::new(Vin::new("T1").unwrap(), 30, 500, 90, 3));
        context.insert_vehicle(&truck).await;

        let car = Car::new(Vin::new("T1").unwrap(), 10, 200, 120, 4);
        assert_eq!(
            DriverError::AlreadyExists("Already exists".to_owned()),
            context
                .driver()
                .create_or_update(&EntityId::Vin(Vin::new("T1").unwrap()), Resource::Car(car))
                .await
                .unwrap_err()
        );
    }

    #[cfg(feature = "postgres")]
    mod postgres {
        use super::*;
        use crate::db::{init_schema, Db};
        use std::sync::Arc;

        #[tokio::test]
        #[ignore = "Requires environment configuration and is expensive"]
        async fn test_create_or_update_concurrent_single_creation() {
            let db = Arc::from(crate::db::postgres::testutils::setup().await);
            init_schema(&mut db.ex().await.unwrap()).await.unwrap();

            let id = PersonId::new(424242);
            db::delete_person(&mut db.ex().await.unwrap(), id).await.unwrap();

            let person = Person::new(None, "Racer".to_owned(), "racer@example.com".to_owned());
            let entity_id = EntityId::Numeric(id);
            let d1 = Driver::new(db.clone());
            let d2 = Driver::new(db.clone());
            let (r1, r2) = tokio::join!(
                d1.create_or_update(&entity_id, Resource::Person(person.clone())),
                d2.create_or_update(&entity_id, Resource::Person(person.clone())),
            );

            // Exactly one call creates the row.  The loser either merged the winner's row
            // after waiting on the lock or collided with the concurrent insert; the lock
            // cannot cover a row that does not exist yet.
            let outcomes = [r1, r2];
            assert_eq!(1, outcomes.iter().filter(|r| matches!(r, Ok(true))).count());
            for outcome in outcomes {
                match outcome {
                    Ok(_) | Err(DriverError::AlreadyExists(_)) => (),
                    Err(e) => panic!("Unexpected error from concurrent upsert: {:?}", e),
                }
            }

            db.close().await;
        }
    }
}
