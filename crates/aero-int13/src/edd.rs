//! INT 13h AH=48h: EDD drive parameters.
//!
//! The caller declares the size of its buffer in the first word of the block at `DS:SI`. The
//! block is filled tier by tier (EDD 1.x: 26 bytes, 2.x: 30 bytes plus the DPTE in the EBDA,
//! 3.x: 66 bytes with the device path information) and stops at the last tier that fits.

use bitflags::bitflags;

use crate::drives::{AtaChannel, DeviceClass, DriveRecord, Translation};
use crate::memory::{FarPtr, MemoryBus};
use crate::regs::DiskRegs;
use crate::service::{DiskResult, DiskServices, Reply};
use crate::status::DiskRet;

bitflags! {
    /// Information flags word of the parameter block.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct EddInfo: u16 {
        const DMA_BOUNDARY_ERRORS = 1 << 0;
        const GEOMETRY_VALID = 1 << 1;
        const REMOVABLE = 1 << 2;
        const WRITE_VERIFY = 1 << 3;
        const MEDIA_CHANGE = 1 << 4;
        const LOCKABLE = 1 << 5;
        /// Geometry fields hold maximum values (no media present).
        const MAX_GEOMETRY = 1 << 6;
    }
}

bitflags! {
    /// Option word of the device parameter table extension.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct DpteOptions: u16 {
        const FAST_PIO = 1 << 0;
        const DMA = 1 << 1;
        const BLOCK_PIO = 1 << 2;
        const CHS_TRANSLATION = 1 << 3;
        const LBA_TRANSLATION = 1 << 4;
        const REMOVABLE = 1 << 5;
        const ATAPI = 1 << 6;
        const PIO32 = 1 << 7;
        const TRANSLATION_LBA = 1 << 9;
        const TRANSLATION_RECHS = 3 << 9;
    }
}

/// Size of the EDD 1.x parameter block.
pub const EDD1_SIZE: u16 = 26;
/// Size reported once the DPTE pointer is present.
pub const EDD2_SIZE: u16 = 30;
/// Buffer size required for the device path information.
pub const EDD3_SIZE: u16 = 66;
/// Length of the device path information block at offset 30.
pub const DPI_LENGTH: u8 = 36;
pub const DPI_KEY: u16 = 0xBEDD;

pub const DPTE_SIZE: usize = 16;
pub const DPTE_REVISION: u8 = 0x11;

// ATA device/head register bits.
const ATA_CB_DC: u16 = 6;
const ATA_CB_DH_DEV0: u8 = 0xA0;
const ATA_CB_DH_DEV1: u8 = 0xB0;
const ATA_CB_DH_LBA: u8 = 0x40;

// Parameter block field offsets.
const DPT_SIZE: u16 = 0;
const DPT_INFOS: u16 = 2;
const DPT_CYLINDERS: u16 = 4;
const DPT_HEADS: u16 = 8;
const DPT_SPT: u16 = 12;
const DPT_SECTOR_COUNT: u16 = 16;
const DPT_BLKSIZE: u16 = 24;
const DPT_DPTE_OFFSET: u16 = 26;
const DPT_DPTE_SEGMENT: u16 = 28;
const DPT_DPI: u16 = 30;

/// Two's complement of the byte sum, so that the covered bytes plus the result sum to zero.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes
        .iter()
        .fold(0u8, |sum, b| sum.wrapping_add(*b))
        .wrapping_neg()
}

/// Device parameter table extension (EDD 2.x).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dpte {
    pub iobase1: u16,
    pub iobase2: u16,
    pub prefix: u8,
    pub irq: u8,
    pub options: DpteOptions,
}

impl Dpte {
    pub fn new(drive: &DriveRecord, channel: &AtaChannel, pio32: bool) -> Self {
        let mut options = DpteOptions::empty();
        if drive.class == DeviceClass::Ata {
            if drive.translation != Translation::None {
                options |= DpteOptions::CHS_TRANSLATION;
                match drive.translation {
                    Translation::Lba => options |= DpteOptions::TRANSLATION_LBA,
                    Translation::Rechs => options |= DpteOptions::TRANSLATION_RECHS,
                    Translation::None | Translation::Large => {}
                }
            }
        } else {
            options |= DpteOptions::REMOVABLE | DpteOptions::ATAPI;
        }
        options |= DpteOptions::LBA_TRANSLATION;
        if pio32 {
            options |= DpteOptions::PIO32;
        }

        let dev = if drive.is_slave() {
            ATA_CB_DH_DEV1
        } else {
            ATA_CB_DH_DEV0
        };

        Self {
            iobase1: channel.iobase1,
            iobase2: channel.iobase2 + ATA_CB_DC,
            prefix: dev | ATA_CB_DH_LBA,
            irq: channel.irq,
            options,
        }
    }

    pub fn to_bytes(&self) -> [u8; DPTE_SIZE] {
        let mut b = [0u8; DPTE_SIZE];
        b[0..2].copy_from_slice(&self.iobase1.to_le_bytes());
        b[2..4].copy_from_slice(&self.iobase2.to_le_bytes());
        b[4] = self.prefix;
        b[5] = 0xCB;
        b[6] = self.irq;
        // Block count 1, DMA and PIO mode 0.
        b[7] = 1;
        b[10..12].copy_from_slice(&self.options.bits().to_le_bytes());
        b[14] = DPTE_REVISION;
        b[15] = checksum(&b[..15]);
        b
    }
}

/// Device path information (EDD 3.x), 36 bytes starting at offset 30 of the parameter block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevicePathInfo {
    /// PCI location packed as `bus | dev << 8 | fn << 16`.
    pub iface_path: u64,
    /// 0 for master, 1 for slave.
    pub device_path: u64,
}

impl DevicePathInfo {
    pub fn new(drive: &DriveRecord, channel: &AtaChannel) -> Self {
        Self {
            iface_path: channel.pci_bus() as u64
                | (channel.pci_dev() as u64) << 8
                | (channel.pci_fn() as u64) << 16,
            device_path: drive.is_slave() as u64,
        }
    }

    /// Write the block and its checksum. The reserved byte in front of the checksum keeps
    /// whatever the caller left there; it is still covered by the checksum.
    fn write(&self, bus: &mut dyn MemoryBus, dpi: FarPtr) {
        let mut b = [0u8; DPI_LENGTH as usize];
        bus.read_physical(dpi.linear(), &mut b);

        b[0..2].copy_from_slice(&DPI_KEY.to_le_bytes());
        b[2] = DPI_LENGTH;
        b[3] = 0;
        b[4..6].copy_from_slice(&0u16.to_le_bytes());
        b[6..10].copy_from_slice(b"PCI\0");
        b[10..18].copy_from_slice(b"ATA\0\0\0\0\0");
        b[18..26].copy_from_slice(&self.iface_path.to_le_bytes());
        b[26..34].copy_from_slice(&self.device_path.to_le_bytes());
        b[35] = checksum(&b[..35]);

        bus.write_physical(dpi.linear(), &b);
    }
}

impl DiskServices {
    /// IBM/MS get drive parameters.
    pub(crate) fn disk_1348(
        &mut self,
        regs: &mut DiskRegs,
        bus: &mut dyn MemoryBus,
        driveid: u8,
    ) -> DiskResult {
        let dpt = regs.ds_si();
        let size = bus.read_u16(dpt.linear());

        // Buffer is too small.
        if size < EDD1_SIZE {
            return Err(DiskRet::Param);
        }

        let drive = *self.drives.drive(driveid).ok_or(DiskRet::Param)?;
        let pchs = drive.pchs;
        tracing::debug!(
            "disk_1348 size={} t={:?} chs={},{},{} lba={} bs={}",
            size,
            drive.class,
            pchs.cylinders,
            pchs.heads,
            pchs.spt,
            drive.sectors,
            drive.blksize
        );

        // EDD 1.x
        let at = |off: u16| dpt.add(off).linear();
        bus.write_u16(at(DPT_SIZE), EDD1_SIZE);
        if drive.class == DeviceClass::Atapi {
            let infos = EddInfo::REMOVABLE
                | EddInfo::MEDIA_CHANGE
                | EddInfo::LOCKABLE
                | EddInfo::MAX_GEOMETRY;
            bus.write_u16(at(DPT_INFOS), infos.bits());
            bus.write_u32(at(DPT_CYLINDERS), u32::MAX);
            bus.write_u32(at(DPT_HEADS), u32::MAX);
            bus.write_u32(at(DPT_SPT), u32::MAX);
            bus.write_u64(at(DPT_SECTOR_COUNT), u64::MAX);
        } else {
            if drive.sectors > pchs.spt as u64 * pchs.heads as u64 * 0x3FFF {
                bus.write_u16(at(DPT_INFOS), EddInfo::empty().bits());
                bus.write_u32(at(DPT_CYLINDERS), 0x3FFF);
            } else {
                bus.write_u16(at(DPT_INFOS), EddInfo::GEOMETRY_VALID.bits());
                bus.write_u32(at(DPT_CYLINDERS), pchs.cylinders as u32);
            }
            bus.write_u32(at(DPT_HEADS), pchs.heads as u32);
            bus.write_u32(at(DPT_SPT), pchs.spt as u32);
            bus.write_u64(at(DPT_SECTOR_COUNT), drive.sectors);
        }
        bus.write_u16(at(DPT_BLKSIZE), drive.blksize);

        if size < EDD2_SIZE || drive.class == DeviceClass::Floppy {
            return Ok(Reply::Done);
        }
        let Some(channel) = self.drives.channel(drive.channel_index()).copied() else {
            tracing::warn!(
                "disk_1348: drive {} has no channel {}; stopping at EDD 1.x",
                driveid,
                drive.channel_index()
            );
            return Ok(Reply::Done);
        };

        // EDD 2.x
        let dpte_at = self.config.ebda.dpte();
        bus.write_u16(at(DPT_SIZE), EDD2_SIZE);
        bus.write_u16(at(DPT_DPTE_OFFSET), dpte_at.offset);
        bus.write_u16(at(DPT_DPTE_SEGMENT), dpte_at.segment);

        let dpte = Dpte::new(&drive, &channel, self.config.ata_pio32);
        bus.write_physical(dpte_at.linear(), &dpte.to_bytes());

        if size < EDD3_SIZE {
            return Ok(Reply::Done);
        }

        // EDD 3.x
        DevicePathInfo::new(&drive, &channel).write(bus, dpt.add(DPT_DPI));

        Ok(Reply::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drives::Chs;
    use pretty_assertions::assert_eq;

    #[test]
    fn checksum_makes_sum_zero() {
        let data = [0x12u8, 0xFF, 0x80, 0x01];
        let sum = data
            .iter()
            .fold(checksum(&data), |acc, b| acc.wrapping_add(*b));
        assert_eq!(sum, 0);
        assert_eq!(checksum(&[]), 0);
    }

    #[test]
    fn dpte_for_lba_translated_slave() {
        let chs = Chs::new(1024, 255, 63);
        let drive = DriveRecord::ata(1, chs, chs, chs.sectors(), Translation::Lba);
        let dpte = Dpte::new(&drive, &AtaChannel::PRIMARY, false);

        let mut expected = [
            0xF0, 0x01, 0xF6, 0x03, 0xF0, 0xCB, 14, 1, 0, 0, 0x18, 0x02, 0, 0, 0x11, 0,
        ];
        expected[15] = checksum(&expected[..15]);
        assert_eq!(dpte.to_bytes(), expected);
    }

    #[test]
    fn dpte_options_by_translation() {
        let chs = Chs::new(16, 16, 63);
        let options = |t| {
            Dpte::new(
                &DriveRecord::ata(0, chs, chs, chs.sectors(), t),
                &AtaChannel::PRIMARY,
                false,
            )
            .options
        };

        assert_eq!(options(Translation::None), DpteOptions::LBA_TRANSLATION);
        assert_eq!(
            options(Translation::Large),
            DpteOptions::LBA_TRANSLATION | DpteOptions::CHS_TRANSLATION
        );
        assert_eq!(options(Translation::Rechs).bits(), (1 << 4) | (1 << 3) | (3 << 9));

        let cd = Dpte::new(&DriveRecord::atapi(2, 1000), &AtaChannel::SECONDARY, true);
        assert_eq!(cd.options.bits(), 0xF0);
        assert_eq!(cd.prefix, 0xE0);
        assert_eq!(cd.iobase2, 0x376);
    }
}
