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

//! High-level data types for the registry domain.
//!
//! The entity kinds addressable over the REST surface form a closed registry, represented by
//! `EntityKind`.  Each kind carries an explicit identity kind (`IdKind`) so that callers decide
//! once, per request, how to treat the `{id}` path segment instead of re-deriving the answer from
//! type comparisons at every call site.

use derive_getters::Getters;
use derive_more::{Constructor, Display};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors in the construction or validation of model types.
#[derive(Debug, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct ModelError(pub String);

/// Result type for this module.
pub type ModelResult<T> = Result<T, ModelError>;

/// The closed registry of entity kinds addressable as REST resources.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EntityKind {
    /// A car, a concrete vehicle subtype.
    Car,

    /// An owner, a person that holds a set of vehicles.
    Owner,

    /// A plain person.
    Person,

    /// A truck, a concrete vehicle subtype.
    Truck,
}

impl EntityKind {
    /// Resolves a class name from the URL path into an entity kind.
    ///
    /// The name is normalized by upper-casing its first character and lower-casing the rest
    /// before the lookup, so any casing of the four known names is accepted.
    pub fn resolve(name: &str) -> ModelResult<EntityKind> {
        let mut chars = name.chars();
        let first = match chars.next() {
            Some(first) => first,
            None => return Err(ModelError("Entity type name cannot be empty".to_owned())),
        };
        let normalized =
            first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect::<String>();
        match normalized.as_str() {
            "Car" => Ok(EntityKind::Car),
            "Owner" => Ok(EntityKind::Owner),
            "Person" => Ok(EntityKind::Person),
            "Truck" => Ok(EntityKind::Truck),
            _ => Err(ModelError(format!("Unknown entity type '{}'", name))),
        }
    }

    /// Returns the identity kind used by this entity kind.
    pub fn id_kind(self) -> IdKind {
        match self {
            EntityKind::Owner | EntityKind::Person => IdKind::Numeric,
            EntityKind::Car | EntityKind::Truck => IdKind::Vin,
        }
    }

    /// Returns the vehicle subtype for this kind, or `None` if the kind is not a vehicle.
    pub fn as_vehicle(self) -> Option<VehicleKind> {
        match self {
            EntityKind::Car => Some(VehicleKind::Car),
            EntityKind::Truck => Some(VehicleKind::Truck),
            EntityKind::Owner | EntityKind::Person => None,
        }
    }
}

/// The form an entity kind's identifier takes in the URL path and in storage.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IdKind {
    /// A numeric identifier assigned by the store.
    Numeric,

    /// A client-supplied VIN.
    Vin,
}

/// Discriminator for the two concrete person kinds held in the persons table.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PersonKind {
    /// A plain person.
    Person,

    /// An owner.
    Owner,
}

impl PersonKind {
    /// Returns the storage representation of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            PersonKind::Person => "person",
            PersonKind::Owner => "owner",
        }
    }

    /// Parses a storage representation back into a kind.
    pub fn parse(s: &str) -> ModelResult<PersonKind> {
        match s {
            "person" => Ok(PersonKind::Person),
            "owner" => Ok(PersonKind::Owner),
            _ => Err(ModelError(format!("Unknown person kind '{}'", s))),
        }
    }
}

/// Discriminator for the two concrete vehicle subtypes held in the vehicles table.
///
/// The storage representation doubles as the path segment under which the subtype is addressed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VehicleKind {
    /// A car.
    Car,

    /// A truck.
    Truck,
}

impl VehicleKind {
    /// Returns the storage and path representation of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            VehicleKind::Car => "car",
            VehicleKind::Truck => "truck",
        }
    }

    /// Parses a storage representation back into a kind.
    pub fn parse(s: &str) -> ModelResult<VehicleKind> {
        match s {
            "car" => Ok(VehicleKind::Car),
            "truck" => Ok(VehicleKind::Truck),
            _ => Err(ModelError(format!("Unknown vehicle kind '{}'", s))),
        }
    }
}

/// Numeric identifier for persons and owners, assigned by the store on creation.
#[derive(
    Clone, Constructor, Copy, Deserialize, Display, Eq, Ord, PartialEq, PartialOrd, Serialize,
)]
#[cfg_attr(test, derive(Debug))]
pub struct PersonId(i64);

impl PersonId {
    /// Returns the identifier as the `i64` the database backends need.
    pub fn as_i64(self) -> i64 {
        self.0
    }
}

/// A Vehicle Identification Number, the client-supplied natural key of every vehicle.
///
/// VINs contain letters as well as digits, so they are strings; hyphens are tolerated as
/// separators.  They are never generated by the store.
#[derive(Clone, Deserialize, Display, Eq, Ord, PartialEq, PartialOrd, Serialize)]
#[cfg_attr(test, derive(Debug))]
#[serde(try_from = "String")]
pub struct Vin(String);

impl Vin {
    /// Creates a new VIN after validating its syntax.
    pub fn new<S: Into<String>>(vin: S) -> ModelResult<Vin> {
        let vin = vin.into();
        if vin.is_empty() {
            return Err(ModelError("VIN cannot be empty".to_owned()));
        }
        if !vin.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(ModelError(format!("VIN '{}' contains unsupported characters", vin)));
        }
        Ok(Vin(vin))
    }

    /// Returns the VIN as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Vin {
    type Error = ModelError;

    fn try_from(vin: String) -> ModelResult<Vin> {
        Vin::new(vin)
    }
}

/// The identifier of a resource in the form dictated by its entity kind.
#[derive(Clone)]
#[cfg_attr(test, derive(Debug, PartialEq))]
pub enum EntityId {
    /// A parsed numeric identifier.
    Numeric(PersonId),

    /// A validated VIN.
    Vin(Vin),
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Numeric(id) => write!(f, "{}", id),
            EntityId::Vin(vin) => write!(f, "{}", vin),
        }
    }
}

/// A plain person.
#[derive(Clone, Constructor, Deserialize, Getters, Serialize)]
#[cfg_attr(test, derive(Debug, PartialEq))]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Person {
    /// Store-assigned identifier; absent until the person has been created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<PersonId>,

    /// Full name of the person.
    name: String,

    /// Contact email address of the person.
    email: String,
}

/// A person that owns vehicles.
#[derive(Clone, Constructor, Deserialize, Getters, Serialize)]
#[cfg_attr(test, derive(Debug, PartialEq))]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Owner {
    /// Store-assigned identifier; absent until the owner has been created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<PersonId>,

    /// Full name of the owner.
    name: String,

    /// Contact email address of the owner.
    email: String,

    /// The vehicles this owner holds, unique by VIN.  Serialized ordered by VIN so that
    /// responses are deterministic; the set itself is unordered.
    #[serde(default)]
    vehicles: Vec<Vehicle>,
}

/// A car.
#[derive(Clone, Constructor, Deserialize, Getters, Serialize)]
#[cfg_attr(test, derive(Debug, PartialEq))]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Car {
    /// The VIN identifying this car.
    vin: Vin,

    /// Fuel consumption as an integral quantity.
    fuel_consumption: i32,

    /// Engine power in horsepower.
    horsepower: i32,

    /// Top speed as an integral quantity.
    speed: i32,

    /// Number of doors.
    doors: i32,
}

/// A truck.
#[derive(Clone, Constructor, Deserialize, Getters, Serialize)]
#[cfg_attr(test, derive(Debug, PartialEq))]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Truck {
    /// The VIN identifying this truck.
    vin: Vin,

    /// Fuel consumption as an integral quantity.
    fuel_consumption: i32,

    /// Engine power in horsepower.
    horsepower: i32,

    /// Top speed as an integral quantity.
    speed: i32,

    /// Number of axles.
    axles: i32,
}

/// A vehicle of any concrete subtype.
///
/// Serialization is untagged: the subtype is always established out of band by the path or
/// query parameter that addressed the vehicle, never by the payload itself.
#[derive(Clone, Deserialize, Serialize)]
#[cfg_attr(test, derive(Debug, PartialEq))]
#[serde(untagged)]
pub enum Vehicle {
    /// A car.
    Car(Car),

    /// A truck.
    Truck(Truck),
}

impl Vehicle {
    /// Decodes a JSON payload into a vehicle of the subtype selected by `kind`.
    pub fn decode(kind: VehicleKind, data: &[u8]) -> serde_json::Result<Vehicle> {
        Ok(match kind {
            VehicleKind::Car => Vehicle::Car(serde_json::from_slice(data)?),
            VehicleKind::Truck => Vehicle::Truck(serde_json::from_slice(data)?),
        })
    }

    /// Returns the VIN of the vehicle.
    pub fn vin(&self) -> &Vin {
        match self {
            Vehicle::Car(car) => &car.vin,
            Vehicle::Truck(truck) => &truck.vin,
        }
    }

    /// Returns the concrete subtype of the vehicle.
    pub fn kind(&self) -> VehicleKind {
        match self {
            Vehicle::Car(_) => VehicleKind::Car,
            Vehicle::Truck(_) => VehicleKind::Truck,
        }
    }

    /// Replaces the VIN of the vehicle, used when the identifier in the request path is
    /// authoritative over the one in the payload.
    pub fn set_vin(&mut self, vin: Vin) {
        match self {
            Vehicle::Car(car) => car.vin = vin,
            Vehicle::Truck(truck) => truck.vin = vin,
        }
    }
}

/// A REST-addressable record of any entity kind.
///
/// Serialization is untagged for the same reason as `Vehicle`'s.
#[derive(Clone, Serialize)]
#[cfg_attr(test, derive(Debug, PartialEq))]
#[serde(untagged)]
pub enum Resource {
    /// A car.
    Car(Car),

    /// An owner.
    Owner(Owner),

    /// A plain person.
    Person(Person),

    /// A truck.
    Truck(Truck),
}

impl Resource {
    /// Decodes a JSON payload into a resource of the type selected by `kind`.
    pub fn decode(kind: EntityKind, data: &[u8]) -> serde_json::Result<Resource> {
        Ok(match kind {
            EntityKind::Car => Resource::Car(serde_json::from_slice(data)?),
            EntityKind::Owner => Resource::Owner(serde_json::from_slice(data)?),
            EntityKind::Person => Resource::Person(serde_json::from_slice(data)?),
            EntityKind::Truck => Resource::Truck(serde_json::from_slice(data)?),
        })
    }

    /// Returns the entity kind of the resource.
    pub fn kind(&self) -> EntityKind {
        match self {
            Resource::Car(_) => EntityKind::Car,
            Resource::Owner(_) => EntityKind::Owner,
            Resource::Person(_) => EntityKind::Person,
            Resource::Truck(_) => EntityKind::Truck,
        }
    }
}

impl From<Vehicle> for Resource {
    fn from(vehicle: Vehicle) -> Self {
        match vehicle {
            Vehicle::Car(car) => Resource::Car(car),
            Vehicle::Truck(truck) => Resource::Truck(truck),
        }
    }
}
