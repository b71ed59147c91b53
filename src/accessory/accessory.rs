//! A logical device exposed by this server (§3 Data Model, §GLOSSARY).

use super::service::Service;

pub struct Accessory {
    pub aid: u64,
    pub category: u16,
    pub services: Vec<Service>,
}
