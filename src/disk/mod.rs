use std::fmt::Debug;

use serde::Deserialize;
use serde::Serialize;

use crate::error::Result;

pub mod file;
pub mod memory;

/// Logical identifier of a disk page.
pub type PageId = i64;

/// Size of a data page in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Reserved id that no allocation ever produces; marks a frame with no
/// resident page.
pub const INVALID_PAGE_ID: PageId = -1;

/// A synchronous, page-oriented disk manager. Pages are fixed-size byte
/// blocks addressed by `PageId`; page-id allocation is handled by the buffer
/// pool, the disk manager only has to honor reads, writes and deallocations.
///
/// The buffer pool calls into the disk manager from inside its own critical
/// section, so implementations see at most one concurrent caller per pool and
/// need not take their own locks.
pub trait DiskManager: Debug + Send {
    /// Read the page into `buf`. A page that was never written reads back as
    /// all zeroes.
    fn read_page(&mut self, page_id: PageId, buf: &mut [u8; PAGE_SIZE]) -> Result<()>;

    /// Write the page. The data is durable when this returns.
    fn write_page(&mut self, page_id: PageId, buf: &[u8; PAGE_SIZE]) -> Result<()>;

    /// Release the page's backing storage. The cache never reuses a page id
    /// within a process lifetime; whether the physical block is recycled is
    /// up to the implementation.
    fn deallocate_page(&mut self, page_id: PageId) -> Result<()>;
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskType {
    Memory,
    File,
}

pub fn new_disk_manager(typ: DiskType, path: &str) -> Result<Box<dyn DiskManager>> {
    match typ {
        DiskType::Memory => Ok(Box::new(memory::MemoryDiskManager::new())),
        DiskType::File => Ok(Box::new(file::FileDiskManager::open(path)?)),
    }
}
