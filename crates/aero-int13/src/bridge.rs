//! Hand-off of normalized operations to the block-device execution engine.
//!
//! The engine runs as a nested synchronous call. The caller's [`DiskOp`] is copied into the
//! callee, transfer-completion interrupts are unmasked for the duration of the call, and only the
//! transferred block count is written back into the caller's copy.

use crate::drives::{DeviceClass, DriveRecord};
use crate::memory::MemoryBus;
use crate::op::DiskOp;
use crate::service::DiskServices;
use crate::status::DriverError;

/// Execution engine for one device class.
///
/// Implementations perform the transfer described by `op` against guest memory and rewrite
/// `op.count` with the number of blocks actually transferred (which may be short on error).
pub trait BlockDriver {
    fn execute(
        &mut self,
        drive: &DriveRecord,
        op: &mut DiskOp,
        bus: &mut dyn MemoryBus,
    ) -> Result<(), DriverError>;
}

/// Interrupt masking around the transfer window.
pub trait IrqControl {
    fn irq_enable(&mut self);
    fn irq_disable(&mut self);

    /// Acknowledge the secondary interrupt controller (IRQ 8-15).
    fn eoi_pic2(&mut self) {}
}

/// [`IrqControl`] for hosts that deliver device completions without modelling the PIC.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIrq;

impl IrqControl for NoIrq {
    fn irq_enable(&mut self) {}
    fn irq_disable(&mut self) {}
}

/// Registered execution engines, selected by [`DeviceClass`].
pub struct Executor {
    ata: Option<Box<dyn BlockDriver>>,
    atapi: Option<Box<dyn BlockDriver>>,
    irq: Box<dyn IrqControl>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    pub fn new() -> Self {
        Self {
            ata: None,
            atapi: None,
            irq: Box::new(NoIrq),
        }
    }

    pub fn set_irq_control(&mut self, irq: Box<dyn IrqControl>) {
        self.irq = irq;
    }

    /// Install the engine for `class`. Floppy operations never reach an engine through this
    /// bridge, so registering one for [`DeviceClass::Floppy`] is ignored.
    pub fn register(&mut self, class: DeviceClass, driver: Box<dyn BlockDriver>) {
        match class {
            DeviceClass::Ata => self.ata = Some(driver),
            DeviceClass::Atapi => self.atapi = Some(driver),
            DeviceClass::Floppy => {
                tracing::warn!("ignoring block driver registered for floppy class");
            }
        }
    }

    pub(crate) fn eoi_pic2(&mut self) {
        self.irq.eoi_pic2();
    }

    /// Run `op` against `drive` inside the interrupt window.
    fn run(
        &mut self,
        drive: &DriveRecord,
        op: &mut DiskOp,
        bus: &mut dyn MemoryBus,
    ) -> Result<(), DriverError> {
        self.irq.irq_enable();

        let res = match drive.class {
            DeviceClass::Ata => match self.ata.as_deref_mut() {
                Some(driver) => driver.execute(drive, op, bus),
                None => Err(DriverError::NoDriver(DeviceClass::Ata)),
            },
            DeviceClass::Atapi => match self.atapi.as_deref_mut() {
                Some(driver) => driver.execute(drive, op, bus),
                None => Err(DriverError::NoDriver(DeviceClass::Atapi)),
            },
            // Only ATA and ATAPI operations are bridged; anything else completes as a no-op.
            DeviceClass::Floppy => Ok(()),
        };

        self.irq.irq_disable();
        res
    }
}

impl DiskServices {
    /// Execute a [`DiskOp`], updating `op.count` with the number of blocks transferred.
    pub(crate) fn send_disk_op(
        &mut self,
        op: &mut DiskOp,
        bus: &mut dyn MemoryBus,
    ) -> Result<(), DriverError> {
        let res = self.send_disk_op_inner(op, bus);
        self.session.last_op_status = match res {
            Ok(()) => 0,
            Err(err) => err.code(),
        };
        res
    }

    fn send_disk_op_inner(
        &mut self,
        op: &mut DiskOp,
        bus: &mut dyn MemoryBus,
    ) -> Result<(), DriverError> {
        if !self.config.drives {
            return Err(DriverError::Disabled);
        }

        let mut dop = *op;
        tracing::debug!(
            "disk_op d={} lba={} buf={:#x} count={} cmd={:?}",
            dop.driveid,
            dop.lba,
            dop.buf,
            dop.count,
            dop.command
        );

        let drive = self
            .drives
            .drive(dop.driveid)
            .ok_or(DriverError::UnknownDrive(dop.driveid))?;
        let res = self.executor.run(drive, &mut dop, bus);

        // Update count with total sectors transferred.
        op.count = dop.count;

        if let Err(err) = res {
            tracing::warn!("disk_op cmd {:?} error {}", dop.command, err);
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drives::{Chs, DriveTable, ExtType, Translation};
    use crate::memory::VecMemory;
    use crate::op::Command;
    use crate::DiskConfig;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        Enable,
        Disable,
        Execute(u64, u16),
    }

    struct RecordingIrq(Arc<Mutex<Vec<Event>>>);

    impl IrqControl for RecordingIrq {
        fn irq_enable(&mut self) {
            self.0.lock().unwrap().push(Event::Enable);
        }

        fn irq_disable(&mut self) {
            self.0.lock().unwrap().push(Event::Disable);
        }
    }

    /// Transfers half of what was asked for, then fails.
    struct ShortDriver(Arc<Mutex<Vec<Event>>>);

    impl BlockDriver for ShortDriver {
        fn execute(
            &mut self,
            _drive: &DriveRecord,
            op: &mut DiskOp,
            _bus: &mut dyn MemoryBus,
        ) -> Result<(), DriverError> {
            self.0.lock().unwrap().push(Event::Execute(op.lba, op.count));
            op.count /= 2;
            // The bridge must ignore anything but the count.
            op.lba = u64::MAX;
            Err(DriverError::Status(4))
        }
    }

    fn services(events: &Arc<Mutex<Vec<Event>>>, class: DeviceClass) -> DiskServices {
        let mut drives = DriveTable::new();
        let chs = Chs::new(20, 16, 63);
        let record = match class {
            DeviceClass::Ata => DriveRecord::ata(0, chs, chs, chs.sectors(), Translation::None),
            DeviceClass::Atapi => DriveRecord::atapi(2, 1000),
            DeviceClass::Floppy => DriveRecord::floppy(Chs::new(80, 2, 18)),
        };
        let id = drives.add_drive(record).unwrap();
        drives.map_drive(ExtType::Hd, id).unwrap();

        let mut svc = DiskServices::new(DiskConfig::default(), drives);
        svc.executor_mut()
            .set_irq_control(Box::new(RecordingIrq(events.clone())));
        svc.executor_mut()
            .register(DeviceClass::Ata, Box::new(ShortDriver(events.clone())));
        svc
    }

    fn read_op(lba: u64, count: u16) -> DiskOp {
        DiskOp {
            driveid: 0,
            command: Command::Read,
            lba,
            count,
            buf: 0x1000,
        }
    }

    #[test]
    fn interrupt_window_brackets_the_driver_call() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut svc = services(&events, DeviceClass::Ata);
        let mut mem = VecMemory::new(0x10000);

        let mut op = read_op(7, 8);
        let res = svc.send_disk_op(&mut op, &mut mem);

        assert_eq!(res, Err(DriverError::Status(4)));
        assert_eq!(
            events.lock().unwrap().as_slice(),
            &[Event::Enable, Event::Execute(7, 8), Event::Disable]
        );
        // Partial progress is written back; nothing else is.
        assert_eq!(op.count, 4);
        assert_eq!(op.lba, 7);
        assert_eq!(svc.session().last_op_status, 4);
    }

    #[test]
    fn unbridged_class_is_a_successful_no_op() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut svc = services(&events, DeviceClass::Floppy);
        let mut mem = VecMemory::new(0x10000);

        let mut op = read_op(0, 3);
        assert_eq!(svc.send_disk_op(&mut op, &mut mem), Ok(()));
        assert_eq!(op.count, 3);
        assert_eq!(
            events.lock().unwrap().as_slice(),
            &[Event::Enable, Event::Disable]
        );
        assert_eq!(svc.session().last_op_status, 0);
    }

    #[test]
    fn missing_driver_and_disabled_drives_fail() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut svc = services(&events, DeviceClass::Atapi);
        let mut mem = VecMemory::new(0x10000);

        let mut op = read_op(0, 1);
        assert_eq!(
            svc.send_disk_op(&mut op, &mut mem),
            Err(DriverError::NoDriver(DeviceClass::Atapi))
        );

        let mut svc = DiskServices::new(
            DiskConfig {
                drives: false,
                ..Default::default()
            },
            DriveTable::new(),
        );
        assert_eq!(
            svc.send_disk_op(&mut op, &mut mem),
            Err(DriverError::Disabled)
        );
        assert_eq!(svc.session().last_op_status, -1);
    }
}
