//! RAM-backed execution engines.
//!
//! [`MemDisk`] serves 512-byte-sector ATA disks and [`MemCdrom`] 2048-byte-sector ATAPI media,
//! one image per drive id. Transfers that run past the end of an image are truncated: the
//! blocks that exist are moved, `op.count` reports them, and the call fails with
//! [`DriverError::OutOfRange`].

use std::collections::BTreeMap;

use crate::bridge::BlockDriver;
use crate::drives::DriveRecord;
use crate::memory::MemoryBus;
use crate::op::{Command, DiskOp};
use crate::status::DriverError;

pub const DISK_SECTOR_SIZE: usize = 512;
pub const CDROM_SECTOR_SIZE: usize = 2048;

#[derive(Debug, Clone)]
struct Images {
    block_size: usize,
    images: BTreeMap<u8, Vec<u8>>,
}

impl Images {
    fn new(block_size: usize) -> Self {
        Self {
            block_size,
            images: BTreeMap::new(),
        }
    }

    fn insert(&mut self, driveid: u8, mut data: Vec<u8>) {
        let rem = data.len() % self.block_size;
        if rem != 0 {
            data.resize(data.len() + self.block_size - rem, 0);
        }
        self.images.insert(driveid, data);
    }

    fn blocks(&self, driveid: u8) -> u64 {
        self.images
            .get(&driveid)
            .map_or(0, |data| (data.len() / self.block_size) as u64)
    }

    fn execute(
        &mut self,
        op: &mut DiskOp,
        bus: &mut dyn MemoryBus,
        writable: bool,
    ) -> Result<(), DriverError> {
        let bs = self.block_size;
        let Some(data) = self.images.get_mut(&op.driveid) else {
            op.count = 0;
            return Err(DriverError::NotReady);
        };
        let capacity = (data.len() / bs) as u64;

        match op.command {
            Command::Reset | Command::IsReady => return Ok(()),
            Command::Seek => {
                if op.lba >= capacity {
                    return Err(DriverError::OutOfRange {
                        lba: op.lba,
                        count: op.count,
                        capacity,
                    });
                }
                return Ok(());
            }
            Command::Write if !writable => {
                op.count = 0;
                return Err(DriverError::Unsupported(Command::Write));
            }
            Command::Read | Command::Write | Command::Verify => {}
        }

        let requested = op.count;
        let available = capacity.saturating_sub(op.lba);
        let count = (requested as u64).min(available) as u16;

        if op.command.transfers_data() {
            for i in 0..count as u64 {
                let start = ((op.lba + i) as usize) * bs;
                let block = &mut data[start..start + bs];
                let paddr = op.buf.wrapping_add(i * bs as u64);
                if op.command == Command::Read {
                    bus.write_physical(paddr, block);
                } else {
                    bus.read_physical(paddr, block);
                }
            }
        }

        op.count = count;
        if count < requested {
            return Err(DriverError::OutOfRange {
                lba: op.lba,
                count: requested,
                capacity,
            });
        }
        Ok(())
    }
}

/// Fixed disks held in memory, 512-byte sectors.
#[derive(Debug, Clone)]
pub struct MemDisk {
    images: Images,
}

impl Default for MemDisk {
    fn default() -> Self {
        Self::new()
    }
}

impl MemDisk {
    pub fn new() -> Self {
        Self {
            images: Images::new(DISK_SECTOR_SIZE),
        }
    }

    /// Attach `data` as the image of `driveid`, zero-padded to a whole sector.
    pub fn insert(&mut self, driveid: u8, data: Vec<u8>) {
        self.images.insert(driveid, data);
    }

    pub fn with_image(mut self, driveid: u8, data: Vec<u8>) -> Self {
        self.insert(driveid, data);
        self
    }

    pub fn size_in_sectors(&self, driveid: u8) -> u64 {
        self.images.blocks(driveid)
    }
}

impl BlockDriver for MemDisk {
    fn execute(
        &mut self,
        _drive: &DriveRecord,
        op: &mut DiskOp,
        bus: &mut dyn MemoryBus,
    ) -> Result<(), DriverError> {
        self.images.execute(op, bus, true)
    }
}

/// Read-only CD media held in memory, 2048-byte sectors.
#[derive(Debug, Clone)]
pub struct MemCdrom {
    images: Images,
}

impl Default for MemCdrom {
    fn default() -> Self {
        Self::new()
    }
}

impl MemCdrom {
    pub fn new() -> Self {
        Self {
            images: Images::new(CDROM_SECTOR_SIZE),
        }
    }

    pub fn insert(&mut self, driveid: u8, data: Vec<u8>) {
        self.images.insert(driveid, data);
    }

    pub fn with_image(mut self, driveid: u8, data: Vec<u8>) -> Self {
        self.insert(driveid, data);
        self
    }

    pub fn size_in_sectors(&self, driveid: u8) -> u64 {
        self.images.blocks(driveid)
    }
}

impl BlockDriver for MemCdrom {
    fn execute(
        &mut self,
        _drive: &DriveRecord,
        op: &mut DiskOp,
        bus: &mut dyn MemoryBus,
    ) -> Result<(), DriverError> {
        self.images.execute(op, bus, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drives::Chs;
    use crate::memory::VecMemory;

    fn drive() -> DriveRecord {
        DriveRecord::floppy(Chs::new(1, 1, 4))
    }

    fn op(command: Command, lba: u64, count: u16, buf: u64) -> DiskOp {
        DiskOp {
            driveid: 0,
            command,
            lba,
            count,
            buf,
        }
    }

    #[test]
    fn pads_images_to_whole_sectors() {
        let disk = MemDisk::new().with_image(0, vec![1; 513]);
        assert_eq!(disk.size_in_sectors(0), 2);
        assert_eq!(disk.size_in_sectors(1), 0);
    }

    #[test]
    fn read_then_write_back() {
        let image: Vec<u8> = (0..4 * 512).map(|i| (i / 512) as u8).collect();
        let mut disk = MemDisk::new().with_image(0, image);
        let mut mem = VecMemory::new(0x4000);

        let mut read = op(Command::Read, 1, 2, 0x1000);
        disk.execute(&drive(), &mut read, &mut mem).unwrap();
        assert_eq!(read.count, 2);
        assert!(mem.slice(0x1000, 512).unwrap().iter().all(|&b| b == 1));
        assert!(mem.slice(0x1200, 512).unwrap().iter().all(|&b| b == 2));

        mem.write_physical(0x2000, &[0xAB; 512]);
        let mut write = op(Command::Write, 3, 1, 0x2000);
        disk.execute(&drive(), &mut write, &mut mem).unwrap();

        let mut check = op(Command::Read, 3, 1, 0x3000);
        disk.execute(&drive(), &mut check, &mut mem).unwrap();
        assert!(mem.slice(0x3000, 512).unwrap().iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn truncates_at_end_of_image() {
        let mut disk = MemDisk::new().with_image(0, vec![7; 4 * 512]);
        let mut mem = VecMemory::new(0x4000);

        let mut read = op(Command::Read, 2, 5, 0x1000);
        let err = disk.execute(&drive(), &mut read, &mut mem).unwrap_err();
        assert_eq!(
            err,
            DriverError::OutOfRange {
                lba: 2,
                count: 5,
                capacity: 4
            }
        );
        assert_eq!(read.count, 2);
        assert!(mem.slice(0x1000, 1024).unwrap().iter().all(|&b| b == 7));
        assert!(mem.slice(0x1400, 512).unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn cdrom_is_read_only() {
        let mut cd = MemCdrom::new().with_image(0, vec![0; CDROM_SECTOR_SIZE * 2]);
        let mut mem = VecMemory::new(0x4000);

        let mut write = op(Command::Write, 0, 1, 0x1000);
        assert_eq!(
            cd.execute(&drive(), &mut write, &mut mem),
            Err(DriverError::Unsupported(Command::Write))
        );
        assert_eq!(write.count, 0);

        let mut verify = op(Command::Verify, 1, 1, 0);
        assert_eq!(cd.execute(&drive(), &mut verify, &mut mem), Ok(()));
    }

    #[test]
    fn missing_image_is_not_ready() {
        let mut cd = MemCdrom::new();
        let mut mem = VecMemory::new(0x100);
        let mut read = op(Command::Read, 0, 1, 0);
        assert_eq!(
            cd.execute(&drive(), &mut read, &mut mem),
            Err(DriverError::NotReady)
        );
    }
}
