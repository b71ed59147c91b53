//! HAP status codes used in JSON `status` fields (§7).

pub const SUCCESS: i64 = 0;
pub const INSUFFICIENT_PRIVILEGES: i64 = -70401;
pub const NO_ACCESSORY_CONNECTION: i64 = -70402;
pub const RESOURCE_BUSY: i64 = -70403;
pub const READ_ONLY: i64 = -70404;
pub const WRITE_ONLY: i64 = -70405;
pub const NOTIFICATIONS_UNSUPPORTED: i64 = -70406;
pub const OUT_OF_RESOURCES: i64 = -70407;
pub const TIMEOUT: i64 = -70408;
pub const NO_RESOURCE: i64 = -70409;
pub const INVALID_VALUE: i64 = -70410;
pub const INSUFFICIENT_AUTHORIZATION: i64 = -70411;
