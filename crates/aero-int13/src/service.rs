//! Service object, session state and the INT 13h / 40h / 76h entry points.

use crate::bridge::{BlockDriver, Executor, IrqControl};
use crate::cdemu::CdEmu;
use crate::config::DiskConfig;
use crate::drives::{DeviceClass, DriveRecord, DriveTable, ExtType, EXTDRIVE_CD_BASE};
use crate::memory::MemoryBus;
use crate::regs::DiskRegs;
use crate::status::DiskRet;

/// Mutable per-boot state shared by every request.
///
/// Lives as long as the [`DiskServices`] that owns it. Requests run to completion one at a time,
/// so no field is ever observed half-updated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Status byte of the last completed request, returned by AH=01h.
    pub disk_last_status: u8,
    /// Fixed-disk completion flag; cleared at request entry and set by IRQ 14/15 (INT 76h).
    pub disk_interrupt_flag: u8,
    /// Status of the last operation executed through the bridge (0 on success).
    pub last_op_status: i32,
    pub cdemu: CdEmu,
}

/// Successful handler outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// `AH=0`, CF clear.
    Done,
    /// Success with a function-specific value in `AH` (e.g. the EDD version from AH=41h).
    Ah(u8),
    /// Replay a previous status byte without recording it as the new last status.
    Status(u8),
}

pub type DiskResult = Result<Reply, DiskRet>;

/// Handlers for the device categories this crate does not implement itself.
pub trait ExternalDiskServices {
    /// Serve a request for a floppy drive (`DL < 80h`).
    fn floppy_13(
        &mut self,
        regs: &mut DiskRegs,
        bus: &mut dyn MemoryBus,
        driveid: u8,
        drive: &DriveRecord,
    ) -> DiskResult;

    /// Serve a request for a CD drive (`DL >= E0h`).
    fn cdrom_13(
        &mut self,
        regs: &mut DiskRegs,
        bus: &mut dyn MemoryBus,
        driveid: u8,
        drive: &DriveRecord,
    ) -> DiskResult;
}

/// BIOS disk services bound to an enumerated drive table.
pub struct DiskServices {
    pub(crate) config: DiskConfig,
    pub(crate) drives: DriveTable,
    pub(crate) session: Session,
    pub(crate) executor: Executor,
    external: Option<Box<dyn ExternalDiskServices>>,
}

impl DiskServices {
    pub fn new(config: DiskConfig, drives: DriveTable) -> Self {
        Self {
            config,
            drives,
            session: Session::default(),
            executor: Executor::new(),
            external: None,
        }
    }

    pub fn with_irq(mut self, irq: Box<dyn IrqControl>) -> Self {
        self.executor.set_irq_control(irq);
        self
    }

    pub fn register_driver(&mut self, class: DeviceClass, driver: Box<dyn BlockDriver>) {
        self.executor.register(class, driver);
    }

    pub fn set_external(&mut self, external: Box<dyn ExternalDiskServices>) {
        self.external = Some(external);
    }

    pub fn config(&self) -> &DiskConfig {
        &self.config
    }

    pub fn drives(&self) -> &DriveTable {
        &self.drives
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn executor_mut(&mut self) -> &mut Executor {
        &mut self.executor
    }

    /// Record the outcome of a request in `AH`, CF and the last-status field.
    pub(crate) fn disk_ret(&mut self, regs: &mut DiskRegs, res: DiskResult) {
        match res {
            Ok(Reply::Status(code)) => {
                regs.set_ah(code);
                regs.set_carry(code != DiskRet::SUCCESS);
            }
            Ok(reply) => {
                self.session.disk_last_status = DiskRet::SUCCESS;
                regs.set_ah(DiskRet::SUCCESS);
                regs.set_carry(false);
                if let Reply::Ah(ah) = reply {
                    regs.set_ah(ah);
                }
            }
            Err(err) => {
                tracing::debug!("int13 ah={:02x} failed: {} ({:#04x})", regs.ah(), err, err.code());
                self.session.disk_last_status = err.code();
                regs.set_ah(err.code());
                regs.set_carry(true);
            }
        }
    }

    /// INT 13h: fixed disk services.
    pub fn handle_13(&mut self, regs: &mut DiskRegs, bus: &mut dyn MemoryBus) {
        tracing::debug!(
            "int13 ax={:04x} bx={:04x} cx={:04x} dx={:04x}",
            regs.ax(),
            regs.bx(),
            regs.cx(),
            regs.dx()
        );
        let mut extdrive = regs.dl();

        if self.config.cdrom_emu {
            if regs.ah() == 0x4B {
                let res = self.cdemu_134b(regs, bus);
                self.disk_ret(regs, res);
                return;
            }
            if self.session.cdemu.active {
                let emudrive = self.session.cdemu.emulated_extdrive;
                if extdrive == emudrive {
                    self.cdemu_13(regs, bus);
                    return;
                }
                // The emulated volume takes over a slot; real drives behind it move up by one.
                if extdrive < EXTDRIVE_CD_BASE && ((emudrive ^ extdrive) & 0x80) == 0 {
                    extdrive = extdrive.wrapping_sub(1);
                }
            }
        }

        self.handle_legacy_disk(regs, bus, extdrive);
    }

    /// INT 40h: relocated floppy services.
    pub fn handle_40(&mut self, regs: &mut DiskRegs, bus: &mut dyn MemoryBus) {
        tracing::debug!("int40 ax={:04x} dx={:04x}", regs.ax(), regs.dx());
        let extdrive = regs.dl();
        self.handle_legacy_disk(regs, bus, extdrive);
    }

    /// INT 76h: IRQ 14/15 fixed-disk completion.
    pub fn handle_76(&mut self) {
        self.session.disk_interrupt_flag = 0xFF;
        self.executor.eoi_pic2();
    }

    fn handle_legacy_disk(&mut self, regs: &mut DiskRegs, bus: &mut dyn MemoryBus, extdrive: u8) {
        if !self.config.drives {
            self.disk_ret(regs, Err(DiskRet::Param));
            return;
        }

        let (ext, ordinal) = ExtType::classify(extdrive);
        let Some(driveid) = self.drives.resolve(ext, ordinal) else {
            tracing::debug!("int13: no drive mapped at {:02x}", extdrive);
            self.disk_ret(regs, Err(DiskRet::Param));
            return;
        };

        match ext {
            ExtType::Hd => self.disk_13(regs, bus, driveid),
            ExtType::Floppy => {
                let res = match (self.external.as_deref_mut(), self.drives.drive(driveid)) {
                    (Some(ext), Some(drive)) => ext.floppy_13(regs, bus, driveid, drive),
                    _ => Err(DiskRet::Param),
                };
                self.disk_ret(regs, res);
            }
            ExtType::Cd => match (self.external.as_deref_mut(), self.drives.drive(driveid)) {
                (Some(ext), Some(drive)) => {
                    let res = ext.cdrom_13(regs, bus, driveid, drive);
                    self.disk_ret(regs, res);
                }
                _ => self.disk_13(regs, bus, driveid),
            },
        }
    }
}
