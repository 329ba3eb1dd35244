//! CHS to LBA translation for the legacy (AH=02h..04h) access functions.

use crate::drives::Chs;
use crate::regs::DiskRegs;
use crate::status::DiskRet;

/// Largest sector count accepted by the CHS access functions.
pub const MAX_LEGACY_COUNT: u8 = 128;

/// Sector count and CHS address decoded from `AL`/`CX`/`DH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChsRequest {
    pub count: u8,
    pub cylinder: u16,
    pub head: u16,
    /// 1-based sector number.
    pub sector: u16,
}

impl ChsRequest {
    /// `CH` holds cylinder bits 0-7, `CL[7:6]` cylinder bits 8-9 and `CL[5:0]` the sector.
    pub fn from_regs(regs: &DiskRegs) -> Self {
        let cl = regs.cl() as u16;
        Self {
            count: regs.al(),
            cylinder: (regs.ch() as u16) | ((cl << 2) & 0x300),
            head: regs.dh() as u16,
            sector: cl & 0x3F,
        }
    }

    /// Validate the request against `lchs` and return its linear block address.
    pub fn to_lba(&self, lchs: &Chs) -> Result<u32, DiskRet> {
        if self.count == 0 || self.count > MAX_LEGACY_COUNT || self.sector == 0 {
            return Err(DiskRet::Param);
        }
        if self.cylinder >= lchs.cylinders || self.head >= lchs.heads || self.sector > lchs.spt {
            return Err(DiskRet::Param);
        }

        Ok((((self.cylinder as u32 * lchs.heads as u32) + self.head as u32) * lchs.spt as u32)
            + self.sector as u32
            - 1)
    }
}

/// Obtain the requested block address from an old-style CHS request.
pub fn legacy_lba(regs: &DiskRegs, lchs: &Chs) -> Result<u32, DiskRet> {
    let req = ChsRequest::from_regs(regs);
    req.to_lba(lchs).map_err(|err| {
        tracing::debug!(
            "int13: function {:02x}, parameters out of range {:04x}/{:04x}/{:04x} count={}",
            regs.ah(),
            req.cylinder,
            req.head,
            req.sector,
            req.count
        );
        err
    })
}
