//! El Torito disk emulation on top of a 2048-byte-sector CD.
//!
//! While emulation is active the boot image is exposed as a floppy or hard disk with 512-byte
//! sectors. Reads are split into an optional leading partial CD sector, a bulk run of whole CD
//! sectors transferred straight into the caller's buffer, and an optional trailing partial
//! sector. Partial sectors go through the scratch buffer in the EBDA.

use crate::drives::Chs;
use crate::geometry::legacy_lba;
use crate::memory::{FarPtr, MemoryBus};
use crate::op::{Command, DiskOp};
use crate::regs::DiskRegs;
use crate::service::{DiskResult, DiskServices, Reply};
use crate::status::DiskRet;

/// 512-byte emulated sectors per 2048-byte CD sector.
pub const SECTORS_PER_CD_BLOCK: u32 = 4;

const SECTOR_SIZE: usize = 512;

/// Boot media type from the El Torito boot catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum CdEmuMedia {
    #[default]
    NoEmulation = 0,
    Floppy1_2M = 1,
    Floppy1_44M = 2,
    Floppy2_88M = 3,
    HardDisk = 4,
}

impl CdEmuMedia {
    pub fn is_floppy(self) -> bool {
        matches!(
            self,
            CdEmuMedia::Floppy1_2M | CdEmuMedia::Floppy1_44M | CdEmuMedia::Floppy2_88M
        )
    }
}

/// Active emulated-volume descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CdEmu {
    pub active: bool,
    pub media: CdEmuMedia,
    /// Guest drive number the image is exposed as (`00h` or `80h`).
    pub emulated_extdrive: u8,
    pub controller_index: u8,
    /// Drive id of the backing ATAPI device.
    pub driveid: u8,
    pub device_spec: u16,
    /// CD sector where the image starts.
    pub ilba: u32,
    pub buffer_segment: u16,
    pub load_segment: u16,
    pub sector_count: u16,
    /// Geometry of the emulated medium.
    pub lchs: Chs,
}

/// Emulation functions (`AH` values) that the emulated drive serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CdEmuFunction {
    Nop,
    Status,
    Read,
    Verify,
    WriteProtected,
    GetParameters,
    GetType,
}

impl CdEmuFunction {
    fn from_ah(ah: u8) -> Option<Self> {
        Some(match ah {
            0x00 | 0x09 | 0x0C | 0x0D | 0x10 | 0x11 | 0x14 | 0x16 => CdEmuFunction::Nop,
            0x01 => CdEmuFunction::Status,
            0x02 => CdEmuFunction::Read,
            0x03 | 0x05 => CdEmuFunction::WriteProtected,
            0x04 => CdEmuFunction::Verify,
            0x08 => CdEmuFunction::GetParameters,
            0x15 => CdEmuFunction::GetType,
            _ => return None,
        })
    }
}

impl DiskServices {
    /// Bind the emulated volume and start intercepting its drive number.
    pub fn activate_cdemu(&mut self, mut emu: CdEmu) {
        emu.active = true;
        tracing::debug!(
            "cdemu: drive {:02x} media {:?} ilba {} lchs {:?}",
            emu.emulated_extdrive,
            emu.media,
            emu.ilba,
            emu.lchs
        );
        self.session.cdemu = emu;
    }

    /// Perform a read or verify against the emulated volume.
    pub(crate) fn cdemu_access(
        &mut self,
        regs: &mut DiskRegs,
        bus: &mut dyn MemoryBus,
        command: Command,
    ) -> DiskResult {
        let emu = self.session.cdemu;
        let vlba = legacy_lba(regs, &emu.lchs)?;

        let scratch = self.config.ebda.cdemu_buf();
        let mut dop = DiskOp {
            driveid: emu.driveid,
            command,
            lba: emu.ilba as u64 + (vlba / SECTORS_PER_CD_BLOCK) as u64,
            count: 0,
            buf: 0,
        };
        let mut count = regs.al();
        let mut dest = regs.es_bx();
        regs.set_al(0);

        let offset = (vlba % SECTORS_PER_CD_BLOCK) as u8;
        if offset != 0 {
            let thiscount = (SECTORS_PER_CD_BLOCK as u8 - offset).min(count);
            self.read_partial(&mut dop, bus, scratch.add(offset as u16 * 512), dest, thiscount)?;
            count -= thiscount;
            dest = dest.add(thiscount as u16 * 512);
            regs.set_al(regs.al() + thiscount);
            dop.lba += 1;
        }

        if count >= SECTORS_PER_CD_BLOCK as u8 {
            dop.count = (count / 4) as u16;
            dop.buf = dest.linear();
            let res = self.send_disk_op(&mut dop, bus);
            regs.set_al(regs.al().wrapping_add((dop.count * 4) as u8));
            res.map_err(|_| DiskRet::BadTrack)?;

            let thiscount = count & !3;
            count &= 3;
            dest = dest.add((thiscount as u32 * 512) as u16);
            dop.lba += (thiscount / 4) as u64;
        }

        if count > 0 {
            self.read_partial(&mut dop, bus, scratch, dest, count)?;
            regs.set_al(regs.al() + count);
        }

        Ok(Reply::Done)
    }

    /// Read the CD sector at `dop.lba` into the scratch buffer and copy `count` emulated sectors
    /// starting at `from` out to `dest`.
    fn read_partial(
        &mut self,
        dop: &mut DiskOp,
        bus: &mut dyn MemoryBus,
        from: FarPtr,
        dest: FarPtr,
        count: u8,
    ) -> Result<(), DiskRet> {
        dop.count = 1;
        dop.buf = self.config.ebda.cdemu_buf().linear();
        self.send_disk_op(dop, bus).map_err(|_| DiskRet::BadTrack)?;
        bus.copy_within(dest.linear(), from.linear(), count as usize * SECTOR_SIZE);
        Ok(())
    }

    /// INT 13h for the emulated drive number.
    pub(crate) fn cdemu_13(&mut self, regs: &mut DiskRegs, bus: &mut dyn MemoryBus) {
        let res = match CdEmuFunction::from_ah(regs.ah()) {
            Some(func) => self.cdemu_fn(func, regs, bus),
            None => {
                tracing::debug!("cdemu: unsupported function {:02x}", regs.ah());
                Err(DiskRet::Param)
            }
        };
        self.disk_ret(regs, res);
    }

    fn cdemu_fn(
        &mut self,
        func: CdEmuFunction,
        regs: &mut DiskRegs,
        bus: &mut dyn MemoryBus,
    ) -> DiskResult {
        let emu = self.session.cdemu;
        match func {
            CdEmuFunction::Nop => Ok(Reply::Done),
            CdEmuFunction::Status => Ok(Reply::Status(self.session.disk_last_status)),
            CdEmuFunction::Read => self.cdemu_access(regs, bus, Command::Read),
            CdEmuFunction::Verify => self.cdemu_access(regs, bus, Command::Verify),
            CdEmuFunction::WriteProtected => Err(DiskRet::WriteProtect),
            CdEmuFunction::GetParameters => {
                let nlc = emu.lchs.cylinders.wrapping_sub(1);
                let nlh = emu.lchs.heads.wrapping_sub(1);
                regs.set_al(0);
                regs.set_bl(match emu.media {
                    CdEmuMedia::Floppy1_2M => 2,
                    CdEmuMedia::Floppy1_44M => 4,
                    CdEmuMedia::Floppy2_88M => 6,
                    CdEmuMedia::NoEmulation | CdEmuMedia::HardDisk => 0,
                });
                regs.set_ch(nlc as u8);
                regs.set_cl((((nlc >> 2) & 0xC0) | (emu.lchs.spt & 0x3F)) as u8);
                regs.set_dh(nlh as u8);
                regs.set_dl(1);
                Ok(Reply::Done)
            }
            CdEmuFunction::GetType => {
                if emu.media.is_floppy() {
                    // Floppy with change-line support.
                    return Ok(Reply::Ah(0x02));
                }
                let sectors = emu.lchs.sectors() as u32;
                regs.set_cx((sectors >> 16) as u16);
                regs.set_dx(sectors as u16);
                Ok(Reply::Ah(0x03))
            }
        }
    }

    /// INT 13h AH=4Bh: terminate emulation (`AL=00h`) or return its status (`AL=01h`).
    pub(crate) fn cdemu_134b(&mut self, regs: &mut DiskRegs, bus: &mut dyn MemoryBus) -> DiskResult {
        let al = regs.al();
        if !self.session.cdemu.active || al > 0x01 {
            tracing::debug!("cdemu: 4b{:02x} rejected", al);
            return Err(DiskRet::Param);
        }

        SpecPacket::from(&self.session.cdemu).write(bus, regs.ds_si());
        if al == 0x00 {
            tracing::debug!("cdemu: emulation terminated");
            self.session.cdemu.active = false;
        }
        Ok(Reply::Done)
    }
}

/// Specification packet returned by AH=4Bh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecPacket {
    pub media: u8,
    pub emulated_drive: u8,
    pub controller_index: u8,
    pub ilba: u32,
    pub device_spec: u16,
    pub buffer_segment: u16,
    pub load_segment: u16,
    pub sector_count: u16,
    pub cylinders: u16,
    pub spt: u16,
    pub heads: u16,
}

impl SpecPacket {
    pub const SIZE: u8 = 0x13;

    pub fn write(&self, bus: &mut dyn MemoryBus, at: FarPtr) {
        let mut packet = [0u8; Self::SIZE as usize];
        packet[0] = Self::SIZE;
        packet[1] = self.media;
        packet[2] = self.emulated_drive;
        packet[3] = self.controller_index;
        packet[4..8].copy_from_slice(&self.ilba.to_le_bytes());
        packet[8..10].copy_from_slice(&self.device_spec.to_le_bytes());
        packet[10..12].copy_from_slice(&self.buffer_segment.to_le_bytes());
        packet[12..14].copy_from_slice(&self.load_segment.to_le_bytes());
        packet[14..16].copy_from_slice(&self.sector_count.to_le_bytes());
        packet[16] = self.cylinders as u8;
        packet[17] = ((self.spt & 0x3F) | ((self.cylinders >> 2) & 0xC0)) as u8;
        packet[18] = self.heads as u8;
        bus.write_physical(at.linear(), &packet);
    }
}

impl From<&CdEmu> for SpecPacket {
    fn from(emu: &CdEmu) -> Self {
        Self {
            media: emu.media as u8,
            emulated_drive: emu.emulated_extdrive,
            controller_index: emu.controller_index,
            ilba: emu.ilba,
            device_spec: emu.device_spec,
            buffer_segment: emu.buffer_segment,
            load_segment: emu.load_segment,
            sector_count: emu.sector_count,
            cylinders: emu.lchs.cylinders,
            spt: emu.lchs.spt,
            heads: emu.lchs.heads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::VecMemory;

    #[test]
    fn spec_packet_layout() {
        let emu = CdEmu {
            active: true,
            media: CdEmuMedia::Floppy1_44M,
            emulated_extdrive: 0x00,
            controller_index: 1,
            driveid: 2,
            device_spec: 0,
            ilba: 0x0102_0304,
            buffer_segment: 0,
            load_segment: 0x07C0,
            sector_count: 4,
            lchs: Chs::new(80, 2, 18),
        };
        let mut mem = VecMemory::new(0x1000);
        SpecPacket::from(&emu).write(&mut mem, FarPtr::new(0, 0x100));

        assert_eq!(
            mem.slice(0x100, 0x13).unwrap(),
            &[
                0x13, 0x02, 0x00, 0x01, 0x04, 0x03, 0x02, 0x01, 0x00, 0x00, 0x00, 0x00, 0xC0,
                0x07, 0x04, 0x00, 80, 18, 2
            ]
        );
    }

    #[test]
    fn emulated_function_table() {
        assert_eq!(CdEmuFunction::from_ah(0x02), Some(CdEmuFunction::Read));
        assert_eq!(CdEmuFunction::from_ah(0x03), Some(CdEmuFunction::WriteProtected));
        assert_eq!(CdEmuFunction::from_ah(0x16), Some(CdEmuFunction::Nop));
        assert_eq!(CdEmuFunction::from_ah(0x42), None);
        assert_eq!(CdEmuFunction::from_ah(0x48), None);
    }
}
