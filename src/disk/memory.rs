use std::collections::HashMap;

use crate::disk::DiskManager;
use crate::disk::PageId;
use crate::disk::PAGE_SIZE;
use crate::error::Result;

/// In-memory disk manager backed by a page map. Useful for tests and for
/// running a pool without a backing file.
#[derive(Debug, Default)]
pub struct MemoryDiskManager {
    pages: HashMap<PageId, Box<[u8; PAGE_SIZE]>>,
}

impl MemoryDiskManager {
    pub fn new() -> MemoryDiskManager {
        MemoryDiskManager { pages: HashMap::new() }
    }
}

impl DiskManager for MemoryDiskManager {
    fn read_page(&mut self, page_id: PageId, buf: &mut [u8; PAGE_SIZE]) -> Result<()> {
        match self.pages.get(&page_id) {
            Some(data) => buf.copy_from_slice(data.as_slice()),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, buf: &[u8; PAGE_SIZE]) -> Result<()> {
        self.pages.insert(page_id, Box::new(*buf));
        Ok(())
    }

    fn deallocate_page(&mut self, page_id: PageId) -> Result<()> {
        self.pages.remove(&page_id);
        Ok(())
    }
}
