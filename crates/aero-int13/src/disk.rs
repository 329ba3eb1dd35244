//! Fixed-disk function table.

use crate::memory::MemoryBus;
use crate::op::{Command, DiskOp};
use crate::regs::DiskRegs;
use crate::service::{DiskResult, DiskServices, Reply};
use crate::status::DiskRet;

/// INT 13h function codes (`AH`) served for fixed disks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DiskFunction {
    Reset = 0x00,
    ReadStatus = 0x01,
    Read = 0x02,
    Write = 0x03,
    Verify = 0x04,
    FormatTrack = 0x05,
    GetParameters = 0x08,
    InitParameters = 0x09,
    Seek = 0x0C,
    AltReset = 0x0D,
    CheckReady = 0x10,
    Recalibrate = 0x11,
    Diagnostic = 0x14,
    GetSize = 0x15,
    InstallCheck = 0x41,
    ExtRead = 0x42,
    ExtWrite = 0x43,
    ExtVerify = 0x44,
    LockUnlock = 0x45,
    Eject = 0x46,
    ExtSeek = 0x47,
    GetEddParameters = 0x48,
    MediaChange = 0x49,
    SetHwConfig = 0x4E,
}

impl TryFrom<u8> for DiskFunction {
    type Error = u8;

    fn try_from(ah: u8) -> Result<Self, Self::Error> {
        Ok(match ah {
            0x00 => DiskFunction::Reset,
            0x01 => DiskFunction::ReadStatus,
            0x02 => DiskFunction::Read,
            0x03 => DiskFunction::Write,
            0x04 => DiskFunction::Verify,
            0x05 => DiskFunction::FormatTrack,
            0x08 => DiskFunction::GetParameters,
            0x09 => DiskFunction::InitParameters,
            0x0C => DiskFunction::Seek,
            0x0D => DiskFunction::AltReset,
            0x10 => DiskFunction::CheckReady,
            0x11 => DiskFunction::Recalibrate,
            0x14 => DiskFunction::Diagnostic,
            0x15 => DiskFunction::GetSize,
            0x41 => DiskFunction::InstallCheck,
            0x42 => DiskFunction::ExtRead,
            0x43 => DiskFunction::ExtWrite,
            0x44 => DiskFunction::ExtVerify,
            0x45 => DiskFunction::LockUnlock,
            0x46 => DiskFunction::Eject,
            0x47 => DiskFunction::ExtSeek,
            0x48 => DiskFunction::GetEddParameters,
            0x49 => DiskFunction::MediaChange,
            0x4E => DiskFunction::SetHwConfig,
            other => return Err(other),
        })
    }
}

impl DiskServices {
    /// Serve a fixed-disk (or built-in CD) request for `driveid`.
    pub(crate) fn disk_13(&mut self, regs: &mut DiskRegs, bus: &mut dyn MemoryBus, driveid: u8) {
        // clear completion flag
        self.session.disk_interrupt_flag = 0;

        let res = match DiskFunction::try_from(regs.ah()) {
            Ok(func) => self.disk_fn(func, regs, bus, driveid),
            Err(ah) => {
                tracing::debug!("int13: unsupported function {:02x}", ah);
                Err(DiskRet::Param)
            }
        };
        self.disk_ret(regs, res);
    }

    fn disk_fn(
        &mut self,
        func: DiskFunction,
        regs: &mut DiskRegs,
        bus: &mut dyn MemoryBus,
        driveid: u8,
    ) -> DiskResult {
        use DiskFunction::*;

        match func {
            Reset => {
                let mut dop = DiskOp::control(driveid, Command::Reset);
                let _ = self.send_disk_op(&mut dop, bus);
                Ok(Reply::Done)
            }
            ReadStatus => Ok(Reply::Status(self.session.disk_last_status)),
            Read => self.basic_access(regs, bus, driveid, Command::Read),
            Write => self.basic_access(regs, bus, driveid, Command::Write),
            Verify => self.basic_access(regs, bus, driveid, Command::Verify),
            FormatTrack | InitParameters | Seek | AltReset | Recalibrate | Diagnostic => {
                tracing::debug!("int13: stub function {:02x}", func as u8);
                Ok(Reply::Done)
            }
            GetParameters => self.disk_1308(regs, driveid),
            CheckReady => {
                let mut dop = DiskOp::control(driveid, Command::IsReady);
                self.send_disk_op(&mut dop, bus).map_err(|_| DiskRet::NotReady)?;
                Ok(Reply::Done)
            }
            GetSize => self.disk_1315(regs, driveid),
            InstallCheck => {
                regs.set_bx(0xAA55);
                // Extended disk access, EDD and removable media support.
                regs.set_cx(0x0007);
                // EDD 3.0
                Ok(Reply::Ah(0x30))
            }
            ExtRead => self.extended_access(regs, bus, driveid, Command::Read),
            ExtWrite => self.extended_access(regs, bus, driveid, Command::Write),
            ExtVerify => self.extended_access(regs, bus, driveid, Command::Verify),
            ExtSeek => self.extended_access(regs, bus, driveid, Command::Seek),
            // Always success for HD.
            LockUnlock | MediaChange => Ok(Reply::Done),
            Eject => Err(DiskRet::NotRemovable),
            GetEddParameters => self.disk_1348(regs, bus, driveid),
            SetHwConfig => match regs.al() {
                0x01 | 0x03 | 0x04 | 0x06 => Ok(Reply::Done),
                _ => Err(DiskRet::Param),
            },
        }
    }

    /// Read disk drive parameters.
    fn disk_1308(&mut self, regs: &mut DiskRegs, driveid: u8) -> DiskResult {
        let lchs = self
            .drives
            .drive(driveid)
            .map(|d| d.lchs)
            .ok_or(DiskRet::Param)?;

        // 0 based, last cylinder not used
        let nlc = lchs.cylinders.wrapping_sub(2);
        regs.set_al(0);
        regs.set_ch(nlc as u8);
        regs.set_cl((((nlc >> 2) & 0xC0) | (lchs.spt & 0x3F)) as u8);
        regs.set_dh(lchs.heads.wrapping_sub(1) as u8);
        regs.set_dl(self.drives.hdcount());
        Ok(Reply::Done)
    }

    /// Read disk drive size.
    fn disk_1315(&mut self, regs: &mut DiskRegs, driveid: u8) -> DiskResult {
        let lchs = self
            .drives
            .drive(driveid)
            .map(|d| d.lchs)
            .ok_or(DiskRet::Param)?;

        // Sector count seen by int13.
        let lba = (lchs.cylinders as u32)
            .wrapping_sub(1)
            .wrapping_mul(lchs.heads as u32 * lchs.spt as u32);
        regs.set_cx((lba >> 16) as u16);
        regs.set_dx(lba as u16);

        // Hard disk accessible.
        Ok(Reply::Ah(0x03))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_codes_round_trip() {
        for ah in 0..=0xFFu8 {
            if let Ok(func) = DiskFunction::try_from(ah) {
                assert_eq!(func as u8, ah);
            }
        }
    }

    #[test]
    fn unknown_codes_are_rejected() {
        for ah in [0x06, 0x07, 0x0A, 0x12, 0x16, 0x40, 0x4A, 0x4B, 0x4F, 0xFF] {
            assert_eq!(DiskFunction::try_from(ah), Err(ah));
        }
    }
}
