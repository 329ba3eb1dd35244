use crate::memory::FarPtr;

/// Default EBDA segment (`0x9F000`, the top 4KiB of conventional memory).
pub const DEFAULT_EBDA_SEGMENT: u16 = 0x9F00;

/// Placement of the disk-service scratch areas inside the extended BIOS data area.
///
/// Both areas are addressed by the guest: the device parameter table extension (DPTE) through the
/// pointer returned by INT 13h AH=48h, and the emulation scratch buffer through the transfer
/// buffer address handed to the execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EbdaLayout {
    pub segment: u16,
    /// Offset of the 16-byte DPTE.
    pub dpte_offset: u16,
    /// Offset of the 2048-byte CD emulation scratch buffer.
    pub cdemu_buf_offset: u16,
}

impl EbdaLayout {
    pub fn dpte(&self) -> FarPtr {
        FarPtr::new(self.segment, self.dpte_offset)
    }

    pub fn cdemu_buf(&self) -> FarPtr {
        FarPtr::new(self.segment, self.cdemu_buf_offset)
    }
}

impl Default for EbdaLayout {
    fn default() -> Self {
        Self {
            segment: DEFAULT_EBDA_SEGMENT,
            dpte_offset: 0x0080,
            cdemu_buf_offset: 0x0400,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiskConfig {
    /// Whether ATA/ATAPI drive support is present. When unset every legacy request fails with
    /// `EPARAM` and the execution bridge refuses to run operations.
    pub drives: bool,
    /// Whether El Torito CD emulation interception is active on the INT 13h entry point.
    pub cdrom_emu: bool,
    /// Advertise 32-bit PIO transfers in the DPTE option word.
    pub ata_pio32: bool,
    pub ebda: EbdaLayout,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            drives: true,
            cdrom_emu: true,
            ata_pio32: false,
            ebda: EbdaLayout::default(),
        }
    }
}
