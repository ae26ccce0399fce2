use std::ops::Deref;
use std::sync::RwLock;

use crate::disk::PageId;
use crate::disk::INVALID_PAGE_ID;
use crate::disk::PAGE_SIZE;

/// Index of a buffer pool frame, in `[0, pool_size)`. Frames are created
/// once with the pool; only their resident page changes.
pub type FrameId = usize;

/// The in-memory image of one disk page: the byte buffer plus the metadata
/// the pool keeps per frame. `id` is `INVALID_PAGE_ID` while the frame is
/// free.
pub struct PageData {
    pub id: PageId,
    pub data: [u8; PAGE_SIZE],
    pub is_dirty: bool,
    pub pin_count: u32,
}

impl PageData {
    fn new() -> Self {
        PageData { id: INVALID_PAGE_ID, data: [0; PAGE_SIZE], is_dirty: false, pin_count: 0 }
    }

    /// Reset to the unoccupied state: invalid id, clean, unpinned, zeroed
    /// bytes.
    pub fn clear(&mut self) {
        self.id = INVALID_PAGE_ID;
        self.is_dirty = false;
        self.pin_count = 0;
        self.data.fill(0);
    }
}

/// Page is the container of the actual page data, providing concurrent
/// access protection: the pool serializes metadata updates under its own
/// mutex, while pinning callers read and write the bytes through this lock
/// without holding the pool up.
pub struct Page {
    inner: RwLock<PageData>,
}

impl Page {
    pub fn new() -> Self {
        Page { inner: RwLock::new(PageData::new()) }
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::new()
    }
}

impl Deref for Page {
    type Target = RwLock<PageData>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
