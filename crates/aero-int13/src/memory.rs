//! Guest memory access used by the disk services.
//!
//! Buffers handed to INT 13h are described by real-mode `segment:offset` pairs. The services never
//! hold on to them: every access goes through a [`MemoryBus`] using the linear address of the
//! region plus an explicit byte offset.

/// Abstraction for guest physical memory access.
///
/// Reads take `&mut self` so implementations may route accesses to MMIO with side effects.
pub trait MemoryBus {
    fn read_physical(&mut self, paddr: u64, buf: &mut [u8]);
    fn write_physical(&mut self, paddr: u64, buf: &[u8]);

    fn read_u8(&mut self, paddr: u64) -> u8 {
        let mut buf = [0u8; 1];
        self.read_physical(paddr, &mut buf);
        buf[0]
    }

    fn read_u16(&mut self, paddr: u64) -> u16 {
        let mut buf = [0u8; 2];
        self.read_physical(paddr, &mut buf);
        u16::from_le_bytes(buf)
    }

    fn read_u32(&mut self, paddr: u64) -> u32 {
        let mut buf = [0u8; 4];
        self.read_physical(paddr, &mut buf);
        u32::from_le_bytes(buf)
    }

    fn read_u64(&mut self, paddr: u64) -> u64 {
        let mut buf = [0u8; 8];
        self.read_physical(paddr, &mut buf);
        u64::from_le_bytes(buf)
    }

    fn write_u8(&mut self, paddr: u64, val: u8) {
        self.write_physical(paddr, &[val]);
    }

    fn write_u16(&mut self, paddr: u64, val: u16) {
        self.write_physical(paddr, &val.to_le_bytes());
    }

    fn write_u32(&mut self, paddr: u64, val: u32) {
        self.write_physical(paddr, &val.to_le_bytes());
    }

    fn write_u64(&mut self, paddr: u64, val: u64) {
        self.write_physical(paddr, &val.to_le_bytes());
    }

    /// Copy `len` bytes between two guest regions.
    fn copy_within(&mut self, dst: u64, src: u64, len: usize) {
        let mut tmp = vec![0u8; len];
        self.read_physical(src, &mut tmp);
        self.write_physical(dst, &tmp);
    }
}

/// Real-mode `segment:offset` pointer.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FarPtr {
    pub segment: u16,
    pub offset: u16,
}

impl FarPtr {
    pub const fn new(segment: u16, offset: u16) -> Self {
        Self { segment, offset }
    }

    /// 20-bit linear address (no A20 wrap is applied).
    pub const fn linear(self) -> u64 {
        (self.segment as u64) * 16 + (self.offset as u64)
    }

    /// Same segment, offset advanced by `bytes` (wrapping within the segment).
    pub const fn add(self, bytes: u16) -> Self {
        Self {
            segment: self.segment,
            offset: self.offset.wrapping_add(bytes),
        }
    }
}

/// Flat RAM-backed [`MemoryBus`].
///
/// Accesses outside the backing store read as all-ones and drop writes, matching an unmapped
/// region on the platform bus.
#[derive(Debug, Clone)]
pub struct VecMemory {
    data: Vec<u8>,
}

impl VecMemory {
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Borrow `len` bytes starting at `paddr`, or `None` if the range is not backed.
    pub fn slice(&self, paddr: u64, len: usize) -> Option<&[u8]> {
        let start = usize::try_from(paddr).ok()?;
        let end = start.checked_add(len)?;
        self.data.get(start..end)
    }
}

impl MemoryBus for VecMemory {
    fn read_physical(&mut self, paddr: u64, buf: &mut [u8]) {
        for (i, out) in buf.iter_mut().enumerate() {
            *out = usize::try_from(paddr.wrapping_add(i as u64))
                .ok()
                .and_then(|addr| self.data.get(addr).copied())
                .unwrap_or(0xFF);
        }
    }

    fn write_physical(&mut self, paddr: u64, buf: &[u8]) {
        for (i, &b) in buf.iter().enumerate() {
            if let Some(slot) = usize::try_from(paddr.wrapping_add(i as u64))
                .ok()
                .and_then(|addr| self.data.get_mut(addr))
            {
                *slot = b;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn far_pointer_linear_address() {
        assert_eq!(FarPtr::new(0x07C0, 0x0000).linear(), 0x7C00);
        assert_eq!(FarPtr::new(0x0000, 0x7C00).linear(), 0x7C00);
        assert_eq!(FarPtr::new(0xFFFF, 0x0010).linear(), 0x10_0000);
        assert_eq!(FarPtr::new(0x1000, 0xFFFF).add(1), FarPtr::new(0x1000, 0));
    }

    #[test]
    fn unbacked_reads_return_all_ones() {
        let mut mem = VecMemory::new(4);
        mem.write_u16(0, 0x2211);
        assert_eq!(mem.read_u16(0), 0x2211);
        assert_eq!(mem.read_u16(3), 0xFF00);
        assert_eq!(mem.read_u32(0x1000), 0xFFFF_FFFF);

        // Writes past the end are dropped rather than growing the store.
        mem.write_u32(2, 0xAABB_CCDD);
        assert_eq!(mem.as_slice(), &[0x11, 0x22, 0xDD, 0xCC]);
    }

    #[test]
    fn copy_within_moves_bytes_between_regions() {
        let mut mem = VecMemory::new(32);
        mem.write_physical(0, &[1, 2, 3, 4]);
        mem.copy_within(16, 1, 3);
        assert_eq!(mem.slice(16, 4), Some(&[2u8, 3, 4, 0][..]));
    }
}
