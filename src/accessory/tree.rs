//! The accessory/service/characteristic tree, flat-indexed by `(aid,iid)`
//! at construction time (§3 Data Model, §9 Design Notes — cyclic /
//! back-references).

use std::collections::HashMap;

use super::accessory::Accessory;
use super::characteristic::{Characteristic, SessionId};
use super::permissions::CharacteristicPermissions;
use serde_json::{Value as Json, json};

/// Owns the accessory list and a flat `(aid,iid) -> (accessory, service,
/// characteristic)` index, built once by a pre-order walk when the server
/// starts (§3).
pub struct AccessoryTree {
    accessories: Vec<Accessory>,
    index: HashMap<(u64, u64), (usize, usize, usize)>,
}

impl AccessoryTree {
    #[must_use]
    pub fn new(accessories: Vec<Accessory>) -> Self {
        let mut index = HashMap::new();
        for (ai, accessory) in accessories.iter().enumerate() {
            for (si, service) in accessory.services.iter().enumerate() {
                for (ci, characteristic) in service.characteristics.iter().enumerate() {
                    index.insert((accessory.aid, characteristic.iid), (ai, si, ci));
                }
            }
        }
        Self { accessories, index }
    }

    #[must_use]
    pub fn accessories(&self) -> &[Accessory] {
        &self.accessories
    }

    #[must_use]
    pub fn contains(&self, aid: u64, iid: u64) -> bool {
        self.index.contains_key(&(aid, iid))
    }

    #[must_use]
    pub fn get(&self, aid: u64, iid: u64) -> Option<&Characteristic> {
        let &(ai, si, ci) = self.index.get(&(aid, iid))?;
        self.accessories.get(ai)?.services.get(si)?.characteristics.get(ci)
    }

    pub fn get_mut(&mut self, aid: u64, iid: u64) -> Option<&mut Characteristic> {
        let &(ai, si, ci) = self.index.get(&(aid, iid))?;
        self.accessories.get_mut(ai)?.services.get_mut(si)?.characteristics.get_mut(ci)
    }

    /// Add or remove `session` from a characteristic's subscriber set
    /// (§4.5 step 3, §9 Design Notes — subscription list).
    pub fn set_subscription(&mut self, aid: u64, iid: u64, session: SessionId, subscribe: bool) {
        if let Some(ch) = self.get_mut(aid, iid) {
            if subscribe {
                ch.subscribers.insert(session);
            } else {
                ch.subscribers.remove(&session);
            }
        }
    }

    /// Remove `session` from every characteristic's subscriber set (§4.7 —
    /// client teardown walks the tree once to clear membership).
    pub fn unsubscribe_all(&mut self, session: SessionId) {
        for accessory in &mut self.accessories {
            for service in &mut accessory.services {
                for ch in &mut service.characteristics {
                    ch.subscribers.remove(&session);
                }
            }
        }
    }

    /// Render the full tree for `GET /accessories` (§4.5). `value` is
    /// included only when `paired-read` is set (§8 property 6).
    #[must_use]
    pub fn to_json(&self) -> Json {
        let accessories: Vec<Json> = self
            .accessories
            .iter()
            .map(|accessory| {
                let services: Vec<Json> = accessory
                    .services
                    .iter()
                    .map(|service| {
                        let characteristics: Vec<Json> = service
                            .characteristics
                            .iter()
                            .map(|ch| characteristic_json(accessory.aid, ch, JsonFlags::full()))
                            .collect();
                        json!({
                            "iid": service.iid,
                            "type": service.type_,
                            "primary": service.primary,
                            "hidden": service.hidden,
                            "linked": service.linked,
                            "characteristics": characteristics,
                        })
                    })
                    .collect();
                json!({ "aid": accessory.aid, "services": services })
            })
            .collect();
        json!({ "accessories": accessories })
    }
}

/// Which optional fields to render alongside the mandatory `aid/iid/value?`
/// (§4.5 — `GET /characteristics?...&meta=1&perms=1&type=1&ev=1`).
#[derive(Debug, Clone, Copy)]
pub struct JsonFlags {
    pub type_: bool,
    pub perms: bool,
    pub meta: bool,
    /// `Some(session)` includes `ev`: whether `session` is currently
    /// subscribed to this characteristic.
    pub ev: Option<SessionId>,
}

impl JsonFlags {
    /// `GET /accessories` (§4.5) always renders type/perms/metadata.
    #[must_use]
    pub fn full() -> Self {
        Self {
            type_: true,
            perms: true,
            meta: true,
            ev: None,
        }
    }
}

/// Render one characteristic as a `GET /accessories` or `GET
/// /characteristics` element, gating optional fields by `flags`.
#[must_use]
pub fn characteristic_json(aid: u64, ch: &Characteristic, flags: JsonFlags) -> Json {
    let mut obj = serde_json::Map::new();
    obj.insert("aid".into(), json!(aid));
    obj.insert("iid".into(), json!(ch.iid));

    if flags.type_ {
        obj.insert("type".into(), json!(ch.type_));
    }
    if flags.perms {
        obj.insert("perms".into(), json!(ch.permissions.to_json_strings()));
    }
    if let Some(session) = flags.ev {
        obj.insert("ev".into(), json!(ch.subscribers.contains(&session)));
    }

    if ch.permissions.contains(CharacteristicPermissions::PAIRED_READ) {
        obj.insert("value".into(), ch.value.to_json());
    }

    if flags.meta {
        obj.insert("format".into(), json!(ch.format.as_str()));
        if let Some(d) = &ch.description {
            obj.insert("description".into(), json!(d));
        }
        if let Some(u) = &ch.unit {
            obj.insert("unit".into(), json!(u));
        }
        if let Some(v) = ch.min_value {
            obj.insert("minValue".into(), json!(v));
        }
        if let Some(v) = ch.max_value {
            obj.insert("maxValue".into(), json!(v));
        }
        if let Some(v) = ch.min_step {
            obj.insert("minStep".into(), json!(v));
        }
        if let Some(v) = ch.max_len {
            obj.insert("maxLen".into(), json!(v));
        }
        if let Some(v) = ch.max_data_len {
            obj.insert("maxDataLen".into(), json!(v));
        }
        if let Some(values) = &ch.valid_values {
            obj.insert("valid-values".into(), json!(values.iter().map(super::value::Value::to_json).collect::<Vec<_>>()));
        }
        if let Some((low, high)) = ch.valid_values_range {
            obj.insert("valid-values-range".into(), json!([low, high]));
        }
    }

    Json::Object(obj)
}
