//! The accessory object model (C7): accessories → services →
//! characteristics, each with a stable `(aid,iid)` and a typed, permissioned
//! value (§3 Data Model).

mod accessory;
pub mod builder;
mod characteristic;
mod permissions;
mod service;
pub mod types;
mod tree;
mod value;

#[cfg(test)]
mod tests;

pub use accessory::Accessory;
pub use builder::{AccessoryBuilder, CharacteristicBuilder, ServiceBuilder, accessory_information};
pub use characteristic::{Characteristic, Getter, Setter, SessionId};
pub use permissions::CharacteristicPermissions;
pub use service::Service;
pub use tree::{AccessoryTree, JsonFlags, characteristic_json};
pub use value::{Format, Value, ValueError};
