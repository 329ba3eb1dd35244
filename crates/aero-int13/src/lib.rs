//! BIOS INT 13h disk services for Aero's legacy firmware path.
//!
//! Requests arrive as a real-mode register image ([`DiskRegs`]) and are turned into normalized
//! [`DiskOp`]s that a per-device-class [`BlockDriver`] executes against guest memory. This crate
//! provides:
//!
//! - [`DiskServices`]: the INT 13h / INT 40h / INT 76h entry points and the fixed-disk function
//!   table, including EDD 3.0 extended access and drive parameters
//! - El Torito floppy/hard-disk emulation over 2048-byte CD media ([`CdEmu`])
//! - [`DriveTable`]: drive records and the guest drive-number map
//! - [`MemDisk`] / [`MemCdrom`]: RAM-backed engines for tests and small images
//!
//! Controller programming, PIC handling and drive enumeration stay with the host: they plug in
//! through [`BlockDriver`], [`IrqControl`] and [`DriveTable`].

mod access;
mod backend;
mod bridge;
mod cdemu;
mod config;
mod disk;
mod drives;
mod edd;
mod geometry;
mod memory;
mod op;
mod regs;
mod service;
mod status;

pub use access::AddressPacket;
pub use backend::{MemCdrom, MemDisk, CDROM_SECTOR_SIZE, DISK_SECTOR_SIZE};
pub use bridge::{BlockDriver, Executor, IrqControl, NoIrq};
pub use cdemu::{CdEmu, CdEmuMedia, SpecPacket, SECTORS_PER_CD_BLOCK};
pub use config::{DiskConfig, EbdaLayout, DEFAULT_EBDA_SEGMENT};
pub use disk::DiskFunction;
pub use drives::{
    AtaChannel, Chs, DeviceClass, DriveRecord, DriveTable, ExtType, TableError, Translation,
    EXTDRIVE_CD_BASE, EXTDRIVE_HD_BASE, MAX_DRIVES, MAX_EXTDRIVE,
};
pub use edd::{
    checksum, DevicePathInfo, Dpte, DpteOptions, EddInfo, DPI_KEY, DPI_LENGTH, DPTE_REVISION,
    DPTE_SIZE, EDD1_SIZE, EDD2_SIZE, EDD3_SIZE,
};
pub use geometry::{legacy_lba, ChsRequest, MAX_LEGACY_COUNT};
pub use memory::{FarPtr, MemoryBus, VecMemory};
pub use op::{Command, DiskOp};
pub use regs::DiskRegs;
pub use service::{DiskResult, DiskServices, ExternalDiskServices, Reply, Session};
pub use status::{DiskRet, DriverError};
