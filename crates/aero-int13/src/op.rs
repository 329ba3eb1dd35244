/// Command carried by a [`DiskOp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Reset,
    IsReady,
    Read,
    Write,
    Verify,
    Seek,
}

impl Command {
    /// Whether the command moves data between the medium and the transfer buffer.
    pub fn transfers_data(self) -> bool {
        matches!(self, Command::Read | Command::Write)
    }
}

/// A normalized disk request handed to the execution engine.
///
/// Built per INT 13h call and passed by value across the execution boundary. `count` is in the
/// drive's native block size; the driver rewrites it with the number of blocks actually
/// transferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskOp {
    pub driveid: u8,
    pub command: Command,
    pub lba: u64,
    pub count: u16,
    /// Linear guest address of the transfer buffer.
    pub buf: u64,
}

impl DiskOp {
    /// An operation that addresses no blocks (reset, ready check).
    pub fn control(driveid: u8, command: Command) -> Self {
        Self {
            driveid,
            command,
            lba: 0,
            count: 0,
            buf: 0,
        }
    }
}
