//! Register image exchanged with the INT 13h entry points.

use crate::memory::FarPtr;

/// Real-mode register state captured at the `INT 13h` call site.
///
/// Handlers read their inputs from and write their results back into this image; the host
/// copies it back into the guest CPU before resuming at the interrupt stub's `IRET`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DiskRegs {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
    pub esi: u32,
    pub edi: u32,

    pub ds: u16,
    pub es: u16,

    /// Real-mode FLAGS register bits. Only CF is meaningful to the disk services.
    pub flags: u32,
}

impl DiskRegs {
    pub const FLAG_CF: u32 = 1 << 0;

    pub fn ax(&self) -> u16 {
        self.eax as u16
    }

    pub fn set_ax(&mut self, val: u16) {
        self.eax = (self.eax & 0xFFFF_0000) | (val as u32);
    }

    pub fn ah(&self) -> u8 {
        (self.eax >> 8) as u8
    }

    pub fn set_ah(&mut self, val: u8) {
        self.eax = (self.eax & 0xFFFF_00FF) | ((val as u32) << 8);
    }

    pub fn al(&self) -> u8 {
        self.eax as u8
    }

    pub fn set_al(&mut self, val: u8) {
        self.eax = (self.eax & 0xFFFF_FF00) | (val as u32);
    }

    pub fn bx(&self) -> u16 {
        self.ebx as u16
    }

    pub fn set_bx(&mut self, val: u16) {
        self.ebx = (self.ebx & 0xFFFF_0000) | (val as u32);
    }

    pub fn bl(&self) -> u8 {
        self.ebx as u8
    }

    pub fn set_bl(&mut self, val: u8) {
        self.ebx = (self.ebx & 0xFFFF_FF00) | (val as u32);
    }

    pub fn cx(&self) -> u16 {
        self.ecx as u16
    }

    pub fn set_cx(&mut self, val: u16) {
        self.ecx = (self.ecx & 0xFFFF_0000) | (val as u32);
    }

    pub fn ch(&self) -> u8 {
        (self.ecx >> 8) as u8
    }

    pub fn set_ch(&mut self, val: u8) {
        self.ecx = (self.ecx & 0xFFFF_00FF) | ((val as u32) << 8);
    }

    pub fn cl(&self) -> u8 {
        self.ecx as u8
    }

    pub fn set_cl(&mut self, val: u8) {
        self.ecx = (self.ecx & 0xFFFF_FF00) | (val as u32);
    }

    pub fn dx(&self) -> u16 {
        self.edx as u16
    }

    pub fn set_dx(&mut self, val: u16) {
        self.edx = (self.edx & 0xFFFF_0000) | (val as u32);
    }

    pub fn dh(&self) -> u8 {
        (self.edx >> 8) as u8
    }

    pub fn set_dh(&mut self, val: u8) {
        self.edx = (self.edx & 0xFFFF_00FF) | ((val as u32) << 8);
    }

    pub fn dl(&self) -> u8 {
        self.edx as u8
    }

    pub fn set_dl(&mut self, val: u8) {
        self.edx = (self.edx & 0xFFFF_FF00) | (val as u32);
    }

    pub fn si(&self) -> u16 {
        self.esi as u16
    }

    pub fn di(&self) -> u16 {
        self.edi as u16
    }

    pub fn carry(&self) -> bool {
        (self.flags & Self::FLAG_CF) != 0
    }

    pub fn set_carry(&mut self, carry: bool) {
        if carry {
            self.flags |= Self::FLAG_CF;
        } else {
            self.flags &= !Self::FLAG_CF;
        }
    }

    /// `ES:BX`, the legacy transfer buffer.
    pub fn es_bx(&self) -> FarPtr {
        FarPtr::new(self.es, self.bx())
    }

    /// `DS:SI`, the extended request / parameter block pointer.
    pub fn ds_si(&self) -> FarPtr {
        FarPtr::new(self.ds, self.si())
    }
}
