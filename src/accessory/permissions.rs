//! Characteristic permission bits (§3 Data Model).

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CharacteristicPermissions: u8 {
        const PAIRED_READ = 1 << 0;
        const PAIRED_WRITE = 1 << 1;
        const NOTIFY = 1 << 2;
        const ADDITIONAL_AUTHORIZATION = 1 << 3;
        const TIMED_WRITE = 1 << 4;
        const HIDDEN = 1 << 5;
    }
}

impl CharacteristicPermissions {
    /// Render as the lowercase HAP permission strings used in
    /// `GET /accessories` (`pr`, `pw`, `ev`, ...).
    #[must_use]
    pub fn to_json_strings(self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.contains(Self::PAIRED_READ) {
            out.push("pr");
        }
        if self.contains(Self::PAIRED_WRITE) {
            out.push("pw");
        }
        if self.contains(Self::NOTIFY) {
            out.push("ev");
        }
        if self.contains(Self::ADDITIONAL_AUTHORIZATION) {
            out.push("aa");
        }
        if self.contains(Self::TIMED_WRITE) {
            out.push("tw");
        }
        if self.contains(Self::HIDDEN) {
            out.push("hd");
        }
        out
    }
}
