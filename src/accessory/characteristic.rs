//! A single typed, permissioned data point (§3 Data Model, §9 Design Notes).

use std::collections::HashSet;

use super::permissions::CharacteristicPermissions;
use super::value::{Format, Value, ValueError};

/// Identifies a session for subscription bookkeeping. Assigned by the
/// server loop (C10); opaque here.
pub type SessionId = u64;

/// Per-characteristic read/write hooks, invoked on the server loop thread
/// (§6 — Accessory builder contract). Both may mutate accessory-side state;
/// setters may reject a write by returning `Err`.
pub type Getter = Box<dyn FnMut() -> Value + Send>;
pub type Setter = Box<dyn FnMut(&Value) -> Result<(), String> + Send>;

pub struct Characteristic {
    pub iid: u64,
    pub type_: String,
    pub format: Format,
    pub permissions: CharacteristicPermissions,
    pub value: Value,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub min_step: Option<f64>,
    pub max_len: Option<usize>,
    pub max_data_len: Option<usize>,
    pub valid_values: Option<Vec<Value>>,
    pub valid_values_range: Option<(f64, f64)>,
    pub getter: Option<Getter>,
    pub setter: Option<Setter>,
    pub subscribers: HashSet<SessionId>,
}

impl Characteristic {
    /// Read the current value, invoking the getter hook if one is
    /// installed (§6).
    pub fn read(&mut self) -> Value {
        if let Some(getter) = self.getter.as_mut() {
            self.value = getter();
        }
        self.value.clone()
    }

    /// Validate and apply a write, invoking the setter hook if installed.
    /// `minStep` is deliberately not checked (§9 Open Question 1).
    ///
    /// # Errors
    /// Returns [`ValueError`] on any declared-constraint violation.
    pub fn write(&mut self, json: &serde_json::Value) -> Result<(), ValueError> {
        let candidate = Value::coerce(json, self.format)?;
        candidate.validate(
            self.min_value,
            self.max_value,
            self.valid_values.as_deref(),
            self.valid_values_range,
            self.max_len,
            self.max_data_len,
        )?;

        if let Some(setter) = self.setter.as_mut() {
            setter(&candidate).map_err(ValueError::SetterRejected)?;
        }
        self.value = candidate;
        Ok(())
    }
}
