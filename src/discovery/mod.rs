//! `_hap._tcp` mDNS/DNS-SD advertisement (delegated collaborator, §6).
//!
//! One `mdns-sd` daemon publishing a single named HAP service, whose TXT
//! records are recomputed and re-announced whenever the accessory's
//! pairing state changes.

use std::collections::HashMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use mdns_sd::{ServiceDaemon, ServiceInfo};

use crate::protocol::crypto::derive_key;

const SERVICE_TYPE: &str = "_hap._tcp.local.";

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("mDNS error: {0}")]
    Mdns(#[from] mdns_sd::Error),

    #[error("service not registered")]
    NotRegistered,
}

/// Everything the TXT record (§6) is computed from.
#[derive(Debug, Clone)]
pub struct AdvertisedState {
    pub model: String,
    pub accessory_id: String,
    pub config_number: u32,
    pub category: u16,
    pub paired: bool,
    pub setup_id: Option<String>,
}

impl AdvertisedState {
    fn txt_records(&self) -> HashMap<String, String> {
        let mut txt = HashMap::new();
        txt.insert("md".to_string(), self.model.clone());
        txt.insert("pv".to_string(), "1.0".to_string());
        txt.insert("id".to_string(), self.accessory_id.clone());
        txt.insert("c#".to_string(), self.config_number.to_string());
        txt.insert("s#".to_string(), "1".to_string());
        txt.insert("ff".to_string(), "0".to_string());
        txt.insert("sf".to_string(), if self.paired { "0" } else { "1" }.to_string());
        txt.insert("ci".to_string(), self.category.to_string());
        if let Some(setup_id) = &self.setup_id {
            txt.insert("sh".to_string(), setup_hash(setup_id, &self.accessory_id));
        }
        txt
    }
}

/// Truncated HKDF-SHA512 of `setupId‖accessoryId`, base64-encoded (§6).
fn setup_hash(setup_id: &str, accessory_id: &str) -> String {
    let mut ikm = Vec::with_capacity(setup_id.len() + accessory_id.len());
    ikm.extend_from_slice(setup_id.as_bytes());
    ikm.extend_from_slice(accessory_id.as_bytes());
    let truncated = derive_key(None, &ikm, b"", 4).unwrap_or_else(|_| vec![0u8; 4]);
    BASE64.encode(truncated)
}

/// Publishes one `_hap._tcp` service instance and keeps its `sf`/`c#` TXT
/// fields current as pairing state changes.
pub struct Advertiser {
    daemon: ServiceDaemon,
    fullname: Option<String>,
    name: String,
    port: u16,
}

impl Advertiser {
    /// # Errors
    /// Returns an error if the mDNS daemon fails to start.
    pub fn new(name: impl Into<String>, port: u16) -> Result<Self, DiscoveryError> {
        Ok(Self {
            daemon: ServiceDaemon::new()?,
            fullname: None,
            name: name.into(),
            port,
        })
    }

    /// Announce the service, or re-announce it with updated TXT records if
    /// already registered (§6 — re-announce on pairing-state change).
    ///
    /// # Errors
    /// Returns an error if service construction or registration fails.
    pub fn announce(&mut self, state: &AdvertisedState) -> Result<(), DiscoveryError> {
        if let Some(fullname) = self.fullname.take() {
            let _ = self.daemon.unregister(&fullname);
        }

        let hostname = local_hostname();
        let service_info = ServiceInfo::new(SERVICE_TYPE, &self.name, &hostname, "", self.port, state.txt_records())?;
        let fullname = service_info.get_fullname().to_string();
        self.daemon.register(service_info)?;
        self.fullname = Some(fullname);
        Ok(())
    }

    /// Stop advertising.
    ///
    /// # Errors
    /// Returns an error if mDNS unregistration fails.
    pub fn withdraw(&mut self) -> Result<(), DiscoveryError> {
        let fullname = self.fullname.take().ok_or(DiscoveryError::NotRegistered)?;
        self.daemon.unregister(&fullname)?;
        Ok(())
    }
}

fn local_hostname() -> String {
    hostname::get().map_or_else(|_| "hap-server.local.".to_string(), |s| format!("{}.local.", s.to_string_lossy()))
}
