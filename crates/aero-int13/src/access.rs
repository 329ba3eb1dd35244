//! Read/write/verify/seek requests normalized into [`DiskOp`]s.

use crate::geometry::legacy_lba;
use crate::memory::{FarPtr, MemoryBus};
use crate::op::{Command, DiskOp};
use crate::regs::DiskRegs;
use crate::service::{DiskResult, DiskServices, Reply};
use crate::status::DiskRet;

/// Disk address packet passed at `DS:SI` to the extended access functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressPacket {
    pub size: u8,
    pub count: u16,
    pub buffer: FarPtr,
    pub lba: u64,
}

impl AddressPacket {
    const COUNT: u16 = 2;
    const OFFSET: u16 = 4;
    const SEGMENT: u16 = 6;
    const LBA: u16 = 8;

    pub fn read(bus: &mut dyn MemoryBus, at: FarPtr) -> Self {
        Self {
            size: bus.read_u8(at.linear()),
            count: bus.read_u16(at.add(Self::COUNT).linear()),
            buffer: FarPtr::new(
                bus.read_u16(at.add(Self::SEGMENT).linear()),
                bus.read_u16(at.add(Self::OFFSET).linear()),
            ),
            lba: bus.read_u64(at.add(Self::LBA).linear()),
        }
    }

    /// Report the number of blocks transferred back through the packet.
    pub fn write_count(bus: &mut dyn MemoryBus, at: FarPtr, count: u16) {
        bus.write_u16(at.add(Self::COUNT).linear(), count);
    }
}

impl DiskServices {
    /// Perform read/write/verify using old-style CHS accesses.
    pub(crate) fn basic_access(
        &mut self,
        regs: &mut DiskRegs,
        bus: &mut dyn MemoryBus,
        driveid: u8,
        command: Command,
    ) -> DiskResult {
        let lchs = self
            .drives
            .drive(driveid)
            .map(|d| d.lchs)
            .ok_or(DiskRet::Param)?;
        let lba = legacy_lba(regs, &lchs)?;

        let mut dop = DiskOp {
            driveid,
            command,
            lba: lba as u64,
            count: regs.al() as u16,
            buf: regs.es_bx().linear(),
        };
        let res = self.send_disk_op(&mut dop, bus);

        regs.set_al(dop.count as u8);

        res.map_err(|_| DiskRet::BadTrack)?;
        Ok(Reply::Done)
    }

    /// Perform read/write/verify/seek using the extended address packet at `DS:SI`.
    pub(crate) fn extended_access(
        &mut self,
        regs: &mut DiskRegs,
        bus: &mut dyn MemoryBus,
        driveid: u8,
        command: Command,
    ) -> DiskResult {
        let sectors = self
            .drives
            .drive(driveid)
            .map(|d| d.sectors)
            .ok_or(DiskRet::Param)?;
        let dap_at = regs.ds_si();
        let dap = AddressPacket::read(bus, dap_at);
        if dap.lba >= sectors {
            tracing::debug!(
                "int13: function {:02x}, lba {} out of range ({} sectors)",
                regs.ah(),
                dap.lba,
                sectors
            );
            return Err(DiskRet::Param);
        }

        let mut dop = DiskOp {
            driveid,
            command,
            lba: dap.lba,
            count: dap.count,
            buf: dap.buffer.linear(),
        };
        let res = self.send_disk_op(&mut dop, bus);

        AddressPacket::write_count(bus, dap_at, dop.count);

        res.map_err(|_| DiskRet::BadTrack)?;
        Ok(Reply::Done)
    }
}
