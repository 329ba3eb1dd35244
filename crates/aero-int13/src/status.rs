//! INT 13h status codes and execution-engine errors.

use thiserror::Error;

/// Status byte reported in `AH` (with CF set) when a disk service fails.
///
/// Success is not a variant: handlers return `Ok(..)` and the status path writes `AH=0`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DiskRet {
    /// Malformed or out-of-range request (`01h`).
    #[error("invalid parameter")]
    Param,
    /// Address mark not found (`02h`).
    #[error("address mark not found")]
    AddrNotFound,
    /// Medium is write protected (`03h`).
    #[error("write protected")]
    WriteProtect,
    /// Media changed (`06h`).
    #[error("media changed")]
    Changed,
    /// DMA crossed a 64K boundary (`09h`).
    #[error("data boundary error")]
    Boundary,
    /// The execution engine failed a well-formed request (`0Ch`).
    #[error("bad track / transfer failed")]
    BadTrack,
    /// Controller failure (`20h`).
    #[error("controller failure")]
    Controller,
    /// Timeout (`80h`).
    #[error("timeout")]
    Timeout,
    /// Device not ready (`AAh`).
    #[error("drive not ready")]
    NotReady,
    /// Volume not locked in drive (`B0h`).
    #[error("volume not locked")]
    NotLocked,
    /// Volume locked in drive (`B1h`).
    #[error("volume locked")]
    Locked,
    /// Volume not removable (`B2h`).
    #[error("volume not removable")]
    NotRemovable,
    /// Lock count exceeded (`B4h`).
    #[error("lock count exceeded")]
    TooManyLocks,
    /// Media error on an emulated volume (`C0h`).
    #[error("media error")]
    Media,
    /// Status byte without a dedicated variant (e.g. replayed from the last-status field).
    #[error("disk status {0:#04x}")]
    Other(u8),
}

impl DiskRet {
    pub const SUCCESS: u8 = 0x00;

    pub fn code(self) -> u8 {
        match self {
            DiskRet::Param => 0x01,
            DiskRet::AddrNotFound => 0x02,
            DiskRet::WriteProtect => 0x03,
            DiskRet::Changed => 0x06,
            DiskRet::Boundary => 0x09,
            DiskRet::BadTrack => 0x0C,
            DiskRet::Controller => 0x20,
            DiskRet::Timeout => 0x80,
            DiskRet::NotReady => 0xAA,
            DiskRet::NotLocked => 0xB0,
            DiskRet::Locked => 0xB1,
            DiskRet::NotRemovable => 0xB2,
            DiskRet::TooManyLocks => 0xB4,
            DiskRet::Media => 0xC0,
            DiskRet::Other(code) => code,
        }
    }

    /// Inverse of [`DiskRet::code`]; `None` for the success byte.
    pub fn from_code(code: u8) -> Option<Self> {
        let ret = match code {
            0x00 => return None,
            0x01 => DiskRet::Param,
            0x02 => DiskRet::AddrNotFound,
            0x03 => DiskRet::WriteProtect,
            0x06 => DiskRet::Changed,
            0x09 => DiskRet::Boundary,
            0x0C => DiskRet::BadTrack,
            0x20 => DiskRet::Controller,
            0x80 => DiskRet::Timeout,
            0xAA => DiskRet::NotReady,
            0xB0 => DiskRet::NotLocked,
            0xB1 => DiskRet::Locked,
            0xB2 => DiskRet::NotRemovable,
            0xB4 => DiskRet::TooManyLocks,
            0xC0 => DiskRet::Media,
            other => DiskRet::Other(other),
        };
        Some(ret)
    }
}

/// Failure reported by a [`crate::bridge::BlockDriver`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    /// Drive support is compiled out ([`crate::DiskConfig::drives`] is false).
    #[error("drive support disabled")]
    Disabled,
    /// The operation names a drive id missing from the drive table.
    #[error("unknown drive id {0}")]
    UnknownDrive(u8),
    /// No driver is registered for the drive's device class.
    #[error("no driver registered for {0:?}")]
    NoDriver(crate::drives::DeviceClass),
    /// The request addressed blocks beyond the end of the medium.
    #[error("block {lba} + {count} beyond end of medium ({capacity} blocks)")]
    OutOfRange { lba: u64, count: u16, capacity: u64 },
    /// Device did not become ready.
    #[error("device not ready")]
    NotReady,
    /// Device rejected the command (e.g. writes to read-only media).
    #[error("command {0:?} not supported by device")]
    Unsupported(crate::op::Command),
    /// Raw controller status code.
    #[error("device error status {0}")]
    Status(i32),
}

impl DriverError {
    /// Non-zero status code recorded in the session after a failed operation.
    pub fn code(self) -> i32 {
        match self {
            DriverError::Disabled => -1,
            DriverError::UnknownDrive(_) => -2,
            DriverError::NoDriver(_) => -3,
            DriverError::OutOfRange { .. } => -4,
            DriverError::NotReady => -5,
            DriverError::Unsupported(_) => -6,
            DriverError::Status(0) => -7,
            DriverError::Status(code) => code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_round_trip() {
        for code in 1..=0xFFu8 {
            let ret = DiskRet::from_code(code).unwrap();
            assert_eq!(ret.code(), code);
        }
        assert_eq!(DiskRet::from_code(0), None);
    }

    #[test]
    fn named_codes_match_the_wire_values() {
        assert_eq!(DiskRet::Param.code(), 0x01);
        assert_eq!(DiskRet::BadTrack.code(), 0x0C);
        assert_eq!(DiskRet::NotReady.code(), 0xAA);
        assert_eq!(DiskRet::NotRemovable.code(), 0xB2);
        assert_eq!(DiskRet::from_code(0x03), Some(DiskRet::WriteProtect));
    }

    #[test]
    fn driver_error_codes_are_never_zero() {
        assert_ne!(DriverError::Status(0).code(), 0);
        assert_eq!(DriverError::Status(4).code(), 4);
        assert_eq!(DriverError::Disabled.code(), -1);
    }
}
