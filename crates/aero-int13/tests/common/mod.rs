#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use aero_int13::{
    AtaChannel, BlockDriver, Chs, DeviceClass, DiskConfig, DiskOp, DiskRegs, DiskServices,
    DriveRecord, DriveTable, DriverError, ExtType, FarPtr, IrqControl, MemCdrom, MemDisk,
    MemoryBus, Translation, VecMemory,
};

pub const MEM_SIZE: usize = 1 << 20;

/// Geometry of the fixed disk mapped at `80h`.
pub const HD_CHS: Chs = Chs::new(20, 16, 63);
pub const HD_SECTORS: u64 = HD_CHS.sectors();
pub const CD_SECTORS: u64 = 1000;

pub const HD_ID: u8 = 0;
pub const CD_ID: u8 = 1;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn request(ah: u8, dl: u8) -> DiskRegs {
    let mut regs = DiskRegs::default();
    regs.set_ah(ah);
    regs.set_dl(dl);
    regs
}

/// Image whose every byte encodes its sector number and offset.
pub fn pattern_image(sectors: u64, sector_size: usize) -> Vec<u8> {
    (0..sectors as usize * sector_size)
        .map(|i| {
            let lba = i / sector_size;
            (lba as u8).wrapping_mul(31) ^ (i as u8)
        })
        .collect()
}

/// Drive table with an ATA disk on the primary master (`80h`) and an ATAPI drive on the
/// secondary master (`E0h`).
pub fn drive_table() -> DriveTable {
    let mut drives = DriveTable::new();
    drives.add_channel(AtaChannel::PRIMARY.with_pci_bdf(0, 1, 1));
    drives.add_channel(AtaChannel::SECONDARY.with_pci_bdf(0, 1, 1));

    let hd = drives
        .add_drive(DriveRecord::ata(
            0,
            HD_CHS,
            HD_CHS,
            HD_SECTORS,
            Translation::None,
        ))
        .unwrap();
    let cd = drives.add_drive(DriveRecord::atapi(2, CD_SECTORS)).unwrap();
    assert_eq!((hd, cd), (HD_ID, CD_ID));

    assert_eq!(drives.map_drive(ExtType::Hd, hd), Ok(0x80));
    assert_eq!(drives.map_drive(ExtType::Cd, cd), Ok(0xE0));
    drives
}

/// Services over [`drive_table`] with RAM-backed images for both drives.
pub fn services_with(config: DiskConfig, drives: DriveTable) -> DiskServices {
    let mut svc = DiskServices::new(config, drives);
    svc.register_driver(
        DeviceClass::Ata,
        Box::new(MemDisk::new().with_image(HD_ID, pattern_image(HD_SECTORS, 512))),
    );
    svc.register_driver(
        DeviceClass::Atapi,
        Box::new(MemCdrom::new().with_image(CD_ID, pattern_image(CD_SECTORS, 2048))),
    );
    svc
}

pub fn services() -> DiskServices {
    services_with(DiskConfig::default(), drive_table())
}

pub fn memory() -> VecMemory {
    VecMemory::new(MEM_SIZE)
}

/// Write an extended disk address packet.
pub fn write_dap(mem: &mut VecMemory, at: FarPtr, count: u16, buffer: FarPtr, lba: u64) {
    let base = at.linear();
    mem.write_u8(base, 0x10);
    mem.write_u8(base + 1, 0);
    mem.write_u16(base + 2, count);
    mem.write_u16(base + 4, buffer.offset);
    mem.write_u16(base + 6, buffer.segment);
    mem.write_u64(base + 8, lba);
}

/// Shared log of every operation a [`Recording`] driver receives.
#[derive(Debug, Clone, Default)]
pub struct OpLog(pub Arc<Mutex<Vec<DiskOp>>>);

impl OpLog {
    pub fn ops(&self) -> Vec<DiskOp> {
        self.0.lock().unwrap().clone()
    }
}

/// Forwards to `inner` after recording the operation as submitted.
pub struct Recording<D> {
    pub inner: D,
    pub log: OpLog,
}

impl<D: BlockDriver> BlockDriver for Recording<D> {
    fn execute(
        &mut self,
        drive: &DriveRecord,
        op: &mut DiskOp,
        bus: &mut dyn MemoryBus,
    ) -> Result<(), DriverError> {
        self.log.0.lock().unwrap().push(*op);
        self.inner.execute(drive, op, bus)
    }
}

/// Transfers at most `limit` blocks and then reports a controller error.
pub struct Failing {
    pub limit: u16,
}

impl BlockDriver for Failing {
    fn execute(
        &mut self,
        _drive: &DriveRecord,
        op: &mut DiskOp,
        _bus: &mut dyn MemoryBus,
    ) -> Result<(), DriverError> {
        op.count = op.count.min(self.limit);
        Err(DriverError::Status(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqEvent {
    Enable,
    Disable,
    Eoi,
}

#[derive(Debug, Clone, Default)]
pub struct IrqLog(pub Arc<Mutex<Vec<IrqEvent>>>);

impl IrqLog {
    pub fn events(&self) -> Vec<IrqEvent> {
        self.0.lock().unwrap().clone()
    }
}

impl IrqControl for IrqLog {
    fn irq_enable(&mut self) {
        self.0.lock().unwrap().push(IrqEvent::Enable);
    }

    fn irq_disable(&mut self) {
        self.0.lock().unwrap().push(IrqEvent::Disable);
    }

    fn eoi_pic2(&mut self) {
        self.0.lock().unwrap().push(IrqEvent::Eoi);
    }
}
