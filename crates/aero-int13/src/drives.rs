//! Drive records and the BIOS drive-number map.
//!
//! Drives are registered once during device enumeration (outside this crate). After that the
//! table is only read: INT 13h resolves the guest-visible drive number in `DL` to an internal
//! drive id through the per-category map, and handlers look up geometry and controller details
//! from the drive record.

use thiserror::Error;

/// Capacity of the drive record table.
pub const MAX_DRIVES: usize = 16;
/// Number of BIOS drive numbers per category (`00h..`, `80h..`, `E0h..`).
pub const MAX_EXTDRIVE: usize = 16;

/// Drive numbers below this value are floppies.
pub const EXTDRIVE_HD_BASE: u8 = 0x80;
/// Drive numbers at or above this value are CD-ROMs.
pub const EXTDRIVE_CD_BASE: u8 = 0xE0;

const UNMAPPED: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    Floppy,
    Ata,
    Atapi,
}

/// Cylinder/head/sector geometry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Chs {
    pub cylinders: u16,
    pub heads: u16,
    /// Sectors per track.
    pub spt: u16,
}

impl Chs {
    pub const fn new(cylinders: u16, heads: u16, spt: u16) -> Self {
        Self {
            cylinders,
            heads,
            spt,
        }
    }

    /// Number of 512-byte sectors addressable through this geometry.
    pub const fn sectors(&self) -> u64 {
        self.cylinders as u64 * self.heads as u64 * self.spt as u64
    }
}

/// CHS translation applied between the logical (INT 13h) and physical (drive) geometry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Translation {
    #[default]
    None,
    Lba,
    Large,
    /// Revised ECHS.
    Rechs,
}

/// Legacy IDE channel resources, owned by the ATA driver layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtaChannel {
    /// Command block base (e.g. `0x1F0`).
    pub iobase1: u16,
    /// Control block base (e.g. `0x3F0`); the device control register lives at `+6`.
    pub iobase2: u16,
    pub irq: u8,
    /// PCI bus/device/function of the controller, packed as `bus << 8 | dev << 3 | fn`.
    pub pci_bdf: u16,
}

impl AtaChannel {
    pub const PRIMARY: AtaChannel = AtaChannel {
        iobase1: 0x1F0,
        iobase2: 0x3F0,
        irq: 14,
        pci_bdf: 0,
    };

    pub const SECONDARY: AtaChannel = AtaChannel {
        iobase1: 0x170,
        iobase2: 0x370,
        irq: 15,
        pci_bdf: 0,
    };

    pub fn with_pci_bdf(mut self, bus: u8, dev: u8, func: u8) -> Self {
        self.pci_bdf = ((bus as u16) << 8) | (((dev & 0x1F) as u16) << 3) | ((func & 0x07) as u16);
        self
    }

    pub fn pci_bus(&self) -> u8 {
        (self.pci_bdf >> 8) as u8
    }

    pub fn pci_dev(&self) -> u8 {
        ((self.pci_bdf >> 3) & 0x1F) as u8
    }

    pub fn pci_fn(&self) -> u8 {
        (self.pci_bdf & 0x07) as u8
    }
}

/// One enumerated drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveRecord {
    pub class: DeviceClass,
    /// Controller-relative id: `channel * 2 + slave`.
    pub cntl_id: u8,
    /// Geometry seen through INT 13h.
    pub lchs: Chs,
    /// Geometry reported by the device.
    pub pchs: Chs,
    /// Total number of blocks.
    pub sectors: u64,
    /// Bytes per block.
    pub blksize: u16,
    pub translation: Translation,
}

impl DriveRecord {
    pub fn ata(cntl_id: u8, pchs: Chs, lchs: Chs, sectors: u64, translation: Translation) -> Self {
        Self {
            class: DeviceClass::Ata,
            cntl_id,
            lchs,
            pchs,
            sectors,
            blksize: 512,
            translation,
        }
    }

    pub fn atapi(cntl_id: u8, sectors: u64) -> Self {
        Self {
            class: DeviceClass::Atapi,
            cntl_id,
            lchs: Chs::default(),
            pchs: Chs::default(),
            sectors,
            blksize: 2048,
            translation: Translation::None,
        }
    }

    pub fn floppy(lchs: Chs) -> Self {
        Self {
            class: DeviceClass::Floppy,
            cntl_id: 0,
            lchs,
            pchs: lchs,
            sectors: lchs.sectors(),
            blksize: 512,
            translation: Translation::None,
        }
    }

    pub fn channel_index(&self) -> usize {
        (self.cntl_id / 2) as usize
    }

    pub fn is_slave(&self) -> bool {
        self.cntl_id % 2 == 1
    }
}

/// Drive-number category used to index the drive map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtType {
    Floppy = 0,
    Hd = 1,
    Cd = 2,
}

impl ExtType {
    /// Split a guest drive number into its category and category-relative ordinal.
    pub fn classify(extdrive: u8) -> (ExtType, u8) {
        if extdrive < EXTDRIVE_HD_BASE {
            (ExtType::Floppy, extdrive)
        } else if extdrive >= EXTDRIVE_CD_BASE {
            (ExtType::Cd, extdrive - EXTDRIVE_CD_BASE)
        } else {
            (ExtType::Hd, extdrive - EXTDRIVE_HD_BASE)
        }
    }

    /// First guest drive number of this category.
    pub fn base(self) -> u8 {
        match self {
            ExtType::Floppy => 0,
            ExtType::Hd => EXTDRIVE_HD_BASE,
            ExtType::Cd => EXTDRIVE_CD_BASE,
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TableError {
    #[error("drive table full")]
    Full,
    #[error("drive map for {0:?} is full")]
    MapFull(ExtType),
    #[error("unknown drive id {0}")]
    UnknownDrive(u8),
    #[error("logical geometry covers {lchs_sectors} sectors but the drive has {sectors}")]
    GeometryExceedsCapacity { lchs_sectors: u64, sectors: u64 },
}

/// Enumerated drives plus the guest drive-number map.
#[derive(Debug, Clone)]
pub struct DriveTable {
    drives: Vec<DriveRecord>,
    idmap: [[u8; MAX_EXTDRIVE]; 3],
    mapped: [u8; 3],
    channels: Vec<AtaChannel>,
}

impl Default for DriveTable {
    fn default() -> Self {
        Self::new()
    }
}

impl DriveTable {
    pub fn new() -> Self {
        Self {
            drives: Vec::new(),
            idmap: [[UNMAPPED; MAX_EXTDRIVE]; 3],
            mapped: [0; 3],
            channels: Vec::new(),
        }
    }

    /// Register an ATA channel; returns its channel index.
    pub fn add_channel(&mut self, channel: AtaChannel) -> usize {
        self.channels.push(channel);
        self.channels.len() - 1
    }

    /// Register a drive; returns its internal drive id.
    pub fn add_drive(&mut self, drive: DriveRecord) -> Result<u8, TableError> {
        if self.drives.len() >= MAX_DRIVES {
            return Err(TableError::Full);
        }
        if drive.class == DeviceClass::Ata && drive.lchs.sectors() > drive.sectors {
            return Err(TableError::GeometryExceedsCapacity {
                lchs_sectors: drive.lchs.sectors(),
                sectors: drive.sectors,
            });
        }
        self.drives.push(drive);
        Ok((self.drives.len() - 1) as u8)
    }

    /// Assign the next free drive number of `ext` to `driveid`; returns the guest drive number.
    pub fn map_drive(&mut self, ext: ExtType, driveid: u8) -> Result<u8, TableError> {
        if driveid as usize >= self.drives.len() {
            return Err(TableError::UnknownDrive(driveid));
        }
        let slot = self.mapped[ext as usize] as usize;
        if slot >= MAX_EXTDRIVE {
            return Err(TableError::MapFull(ext));
        }
        self.idmap[ext as usize][slot] = driveid;
        self.mapped[ext as usize] += 1;
        Ok(ext.base() + slot as u8)
    }

    /// Resolve a category-relative ordinal to a drive id.
    pub fn resolve(&self, ext: ExtType, ordinal: u8) -> Option<u8> {
        // basic check: the drive number must be inside the map
        let row = &self.idmap[ext as usize];
        let driveid = *row.get(ordinal as usize)?;

        // and the mapped id must name a real drive
        if driveid as usize >= self.drives.len() {
            return None;
        }
        Some(driveid)
    }

    pub fn drive(&self, driveid: u8) -> Option<&DriveRecord> {
        self.drives.get(driveid as usize)
    }

    pub fn channel(&self, index: usize) -> Option<&AtaChannel> {
        self.channels.get(index)
    }

    /// Number of fixed disks exposed at `80h..` (reported by AH=08h).
    pub fn hdcount(&self) -> u8 {
        self.mapped[ExtType::Hd as usize]
    }

    pub fn cdcount(&self) -> u8 {
        self.mapped[ExtType::Cd as usize]
    }

    pub fn len(&self) -> usize {
        self.drives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drives.is_empty()
    }
}
