//! Predefined HAP service/characteristic type UUIDs needed to satisfy the
//! mandatory Accessory Information service (§4.5, S2). HAP types are
//! 128-bit UUIDs; the base ones share a common suffix and are conventionally
//! written by their 8-hex-digit prefix.

const HAP_BASE_SUFFIX: &str = "-0000-1000-8000-0026BB765291";

#[must_use]
pub fn full_uuid(short: &str) -> String {
    format!("{short:0>8}{HAP_BASE_SUFFIX}")
}

pub mod service {
    pub const ACCESSORY_INFORMATION: &str = "0000003E";
}

pub mod characteristic {
    pub const IDENTIFY: &str = "00000014";
    pub const MANUFACTURER: &str = "00000020";
    pub const MODEL: &str = "00000021";
    pub const NAME: &str = "00000023";
    pub const SERIAL_NUMBER: &str = "00000030";
    pub const FIRMWARE_REVISION: &str = "00000052";
}
