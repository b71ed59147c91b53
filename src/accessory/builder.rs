//! Fluent builders for accessories/services/characteristics. `iid`
//! assignment happens here, by a pre-order walk over the builder tree, so
//! callers never have to hand-number instance ids (§3, §9 Design Notes).

use std::collections::HashSet;

use super::accessory::Accessory;
use super::characteristic::{Characteristic, Getter, Setter};
use super::permissions::CharacteristicPermissions;
use super::service::Service;
use super::types;
use super::value::{Format, Value};

pub struct CharacteristicBuilder {
    type_: String,
    format: Format,
    value: Value,
    permissions: CharacteristicPermissions,
    description: Option<String>,
    unit: Option<String>,
    min_value: Option<f64>,
    max_value: Option<f64>,
    min_step: Option<f64>,
    max_len: Option<usize>,
    max_data_len: Option<usize>,
    valid_values: Option<Vec<Value>>,
    valid_values_range: Option<(f64, f64)>,
    getter: Option<Getter>,
    setter: Option<Setter>,
}

impl CharacteristicBuilder {
    #[must_use]
    pub fn new(type_: impl Into<String>, format: Format, value: Value) -> Self {
        Self {
            type_: type_.into(),
            format,
            value,
            permissions: CharacteristicPermissions::PAIRED_READ,
            description: None,
            unit: None,
            min_value: None,
            max_value: None,
            min_step: None,
            max_len: None,
            max_data_len: None,
            valid_values: None,
            valid_values_range: None,
            getter: None,
            setter: None,
        }
    }

    #[must_use]
    pub fn permissions(mut self, permissions: CharacteristicPermissions) -> Self {
        self.permissions = permissions;
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    #[must_use]
    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min_value = Some(min);
        self.max_value = Some(max);
        self
    }

    #[must_use]
    pub fn min_step(mut self, step: f64) -> Self {
        self.min_step = Some(step);
        self
    }

    #[must_use]
    pub fn max_len(mut self, len: usize) -> Self {
        self.max_len = Some(len);
        self
    }

    #[must_use]
    pub fn max_data_len(mut self, len: usize) -> Self {
        self.max_data_len = Some(len);
        self
    }

    #[must_use]
    pub fn valid_values(mut self, values: Vec<Value>) -> Self {
        self.valid_values = Some(values);
        self
    }

    #[must_use]
    pub fn valid_values_range(mut self, low: f64, high: f64) -> Self {
        self.valid_values_range = Some((low, high));
        self
    }

    #[must_use]
    pub fn getter(mut self, getter: impl FnMut() -> Value + Send + 'static) -> Self {
        self.getter = Some(Box::new(getter));
        self
    }

    #[must_use]
    pub fn setter(mut self, setter: impl FnMut(&Value) -> Result<(), String> + Send + 'static) -> Self {
        self.setter = Some(Box::new(setter));
        self
    }

    fn build(self, iid: u64) -> Characteristic {
        Characteristic {
            iid,
            type_: self.type_,
            format: self.format,
            permissions: self.permissions,
            value: self.value,
            description: self.description,
            unit: self.unit,
            min_value: self.min_value,
            max_value: self.max_value,
            min_step: self.min_step,
            max_len: self.max_len,
            max_data_len: self.max_data_len,
            valid_values: self.valid_values,
            valid_values_range: self.valid_values_range,
            getter: self.getter,
            setter: self.setter,
            subscribers: HashSet::new(),
        }
    }
}

pub struct ServiceBuilder {
    type_: String,
    primary: bool,
    hidden: bool,
    linked: Vec<u64>,
    characteristics: Vec<CharacteristicBuilder>,
}

impl ServiceBuilder {
    #[must_use]
    pub fn new(type_: impl Into<String>) -> Self {
        Self {
            type_: type_.into(),
            primary: false,
            hidden: false,
            linked: Vec::new(),
            characteristics: Vec::new(),
        }
    }

    #[must_use]
    pub fn primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        self
    }

    #[must_use]
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    #[must_use]
    pub fn linked(mut self, linked: Vec<u64>) -> Self {
        self.linked = linked;
        self
    }

    #[must_use]
    pub fn characteristic(mut self, characteristic: CharacteristicBuilder) -> Self {
        self.characteristics.push(characteristic);
        self
    }

    fn build(self, next_iid: &mut u64) -> Service {
        let iid = *next_iid;
        *next_iid += 1;
        let characteristics = self
            .characteristics
            .into_iter()
            .map(|c| {
                let cid = *next_iid;
                *next_iid += 1;
                c.build(cid)
            })
            .collect();
        Service {
            iid,
            type_: self.type_,
            primary: self.primary,
            hidden: self.hidden,
            linked: self.linked,
            characteristics,
        }
    }
}

pub struct AccessoryBuilder {
    aid: u64,
    category: u16,
    services: Vec<ServiceBuilder>,
}

impl AccessoryBuilder {
    #[must_use]
    pub fn new(aid: u64, category: u16) -> Self {
        Self {
            aid,
            category,
            services: Vec::new(),
        }
    }

    #[must_use]
    pub fn service(mut self, service: ServiceBuilder) -> Self {
        self.services.push(service);
        self
    }

    #[must_use]
    pub fn build(self) -> Accessory {
        let mut next_iid = 1;
        let services = self.services.into_iter().map(|s| s.build(&mut next_iid)).collect();
        Accessory {
            aid: self.aid,
            category: self.category,
            services,
        }
    }
}

/// The mandatory Accessory Information service every bridge/accessory must
/// expose (S2): `NAME, MANUFACTURER, MODEL, SERIAL_NUMBER,
/// FIRMWARE_REVISION, IDENTIFY`.
#[must_use]
pub fn accessory_information(name: &str, manufacturer: &str, model: &str, serial_number: &str, firmware_revision: &str) -> ServiceBuilder {
    ServiceBuilder::new(types::full_uuid(types::service::ACCESSORY_INFORMATION))
        .primary(true)
        .characteristic(
            CharacteristicBuilder::new(types::full_uuid(types::characteristic::NAME), Format::String, Value::String(name.to_string()))
                .permissions(CharacteristicPermissions::PAIRED_READ),
        )
        .characteristic(
            CharacteristicBuilder::new(
                types::full_uuid(types::characteristic::MANUFACTURER),
                Format::String,
                Value::String(manufacturer.to_string()),
            )
            .permissions(CharacteristicPermissions::PAIRED_READ),
        )
        .characteristic(
            CharacteristicBuilder::new(types::full_uuid(types::characteristic::MODEL), Format::String, Value::String(model.to_string()))
                .permissions(CharacteristicPermissions::PAIRED_READ),
        )
        .characteristic(
            CharacteristicBuilder::new(
                types::full_uuid(types::characteristic::SERIAL_NUMBER),
                Format::String,
                Value::String(serial_number.to_string()),
            )
            .permissions(CharacteristicPermissions::PAIRED_READ),
        )
        .characteristic(
            CharacteristicBuilder::new(
                types::full_uuid(types::characteristic::FIRMWARE_REVISION),
                Format::String,
                Value::String(firmware_revision.to_string()),
            )
            .permissions(CharacteristicPermissions::PAIRED_READ),
        )
        .characteristic(
            CharacteristicBuilder::new(types::full_uuid(types::characteristic::IDENTIFY), Format::Bool, Value::Bool(false))
                .permissions(CharacteristicPermissions::PAIRED_WRITE),
        )
}
