//! A grouping of related characteristics (§3 Data Model).

use super::characteristic::Characteristic;

pub struct Service {
    pub iid: u64,
    pub type_: String,
    pub primary: bool,
    pub hidden: bool,
    pub linked: Vec<u64>,
    pub characteristics: Vec<Characteristic>,
}
