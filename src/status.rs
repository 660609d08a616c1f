//! Raw transfer status codes reported by the bus capability
//!
//! Bus and power-domain calls return a signed status in the style of the
//! RTOS driver API underneath: `0` is success, negative values are errno
//! codes.

/// Raw status returned by a bus or power-domain call
pub type BusStatus = i32;

pub const BUS_OK: BusStatus = 0;
pub const EIO: BusStatus = -5;
pub const EAGAIN: BusStatus = -11;
pub const EBUSY: BusStatus = -16;
pub const ENODEV: BusStatus = -19;
pub const EINVAL: BusStatus = -22;
pub const EALREADY: BusStatus = -120;
pub const ETIMEDOUT: BusStatus = -116;
pub const ENOTSUP: BusStatus = -134;

/// Helper function to convert a status into its errno name
pub fn status_to_string(status: BusStatus) -> &'static str {
    match status {
        BUS_OK => "OK",
        EIO => "EIO",
        EAGAIN => "EAGAIN",
        EBUSY => "EBUSY",
        ENODEV => "ENODEV",
        EINVAL => "EINVAL",
        EALREADY => "EALREADY",
        ETIMEDOUT => "ETIMEDOUT",
        ENOTSUP => "ENOTSUP",
        _ => "UNKNOWN_ERROR",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes_have_names() {
        assert_eq!(status_to_string(EIO), "EIO");
        assert_eq!(status_to_string(ETIMEDOUT), "ETIMEDOUT");
        assert_eq!(status_to_string(-9999), "UNKNOWN_ERROR");
    }
}
