use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::Mutex;

use log::debug;

use crate::buffer::page::FrameId;
use crate::buffer::page::Page;
use crate::buffer::replacer::Replacer;
use crate::buffer::replacer::SyncLRUKReplacer;
use crate::config::Config;
use crate::container::extendible_hash::ExtendibleHashTable;
use crate::disk::new_disk_manager;
use crate::disk::DiskManager;
use crate::disk::PageId;
use crate::disk::INVALID_PAGE_ID;
use crate::error::Result;
use crate::wal::LogManager;

/// Default number of entries per page-table directory bucket.
const DEFAULT_BUCKET_SIZE: usize = 4;

/// The buffer pool is responsible for moving physical pages back and forth
/// between main memory and disk, letting the system work with databases
/// larger than the memory available to it.
///
/// Its operations are transparent to the rest of the system: callers ask for
/// a page by id without knowing whether it is already in memory or has to be
/// fetched from disk.
struct BufferPool {
    pool_size: usize,
    /// Array of pool frames; the array index is the FrameId, in
    /// `[0, pool_size)`.
    pages: Vec<Arc<Page>>,
    /// Directory of resident pages: page id to the frame holding it.
    page_table: ExtendibleHashTable<PageId, FrameId>,
    /// Frames that hold no page at all.
    free_list: VecDeque<FrameId>,
    /// Picks the victim frame once the free list runs dry.
    replacer: Arc<dyn Replacer>,
    disk: Box<dyn DiskManager>,
    /// The next page id to be allocated; ids are never reused.
    next_page_id: PageId,
    /// Held for future write-ahead log ordering; never invoked.
    #[allow(dead_code)]
    log_manager: Option<Arc<dyn LogManager>>,
}

impl BufferPool {
    fn new(
        pool_size: usize,
        replacer_k: usize,
        bucket_size: usize,
        disk: Box<dyn DiskManager>,
        log_manager: Option<Arc<dyn LogManager>>,
    ) -> Self {
        assert!(pool_size > 0, "pool size should be larger than zero");
        let mut pages = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);
        for frame_id in 0..pool_size {
            pages.push(Arc::new(Page::new()));
            // initially, every frame is in the free list
            free_list.push_back(frame_id);
        }
        let replacer: Arc<dyn Replacer> = Arc::new(SyncLRUKReplacer::new(replacer_k, pool_size));
        BufferPool {
            pool_size,
            pages,
            page_table: ExtendibleHashTable::new(bucket_size),
            free_list,
            replacer,
            disk,
            next_page_id: 0,
            log_manager,
        }
    }

    /// Secure a frame for a new resident: the free list first, then the
    /// replacer. An evicted victim's dirty contents go back to disk and its
    /// directory entry is dropped; the frame comes back reset. Returns None
    /// when every frame is pinned.
    fn acquire_frame(&mut self) -> Result<Option<FrameId>> {
        let frame_id = match self.free_list.pop_front() {
            Some(frame_id) => frame_id,
            None => match self.replacer.evict() {
                Some(frame_id) => frame_id,
                None => return Ok(None),
            },
        };
        let page = Arc::clone(&self.pages[frame_id]);
        let mut guard = page.write()?;
        if guard.id != INVALID_PAGE_ID {
            if guard.is_dirty {
                debug!("evicting dirty page {} from frame {}", guard.id, frame_id);
                self.disk.write_page(guard.id, &guard.data)?;
            }
            self.page_table.remove(&guard.id);
        }
        guard.clear();
        Ok(Some(frame_id))
    }

    fn allocate_page(&mut self) -> PageId {
        let page_id = self.next_page_id;
        self.next_page_id += 1;
        page_id
    }

    /// Create a new page in the buffer pool, or None if all frames are
    /// currently in use and not evictable (in other words, pinned).
    ///
    /// The frame is secured before the id is allocated, so a failed call
    /// burns no page id. The new page comes back zeroed, clean, pinned once
    /// and marked non-evictable.
    fn new_page(&mut self) -> Result<Option<Arc<Page>>> {
        let frame_id = match self.acquire_frame()? {
            Some(frame_id) => frame_id,
            None => return Ok(None),
        };
        let page_id = self.allocate_page();
        let page = Arc::clone(&self.pages[frame_id]);
        {
            let mut guard = page.write()?;
            guard.id = page_id;
            guard.pin_count = 1;
        }
        self.page_table.insert(page_id, frame_id);
        self.replacer.record_access(frame_id);
        self.replacer.set_evictable(frame_id, false);
        Ok(Some(page))
    }

    /// Fetch the requested page from the buffer pool. A resident page is
    /// pinned and returned directly; otherwise a frame is secured as in
    /// new_page and the page is read from disk. Returns None only when the
    /// page is not resident and every frame is pinned.
    fn fetch_page(&mut self, page_id: PageId) -> Result<Option<Arc<Page>>> {
        if page_id == INVALID_PAGE_ID {
            return Ok(None);
        }
        if let Some(frame_id) = self.page_table.find(&page_id) {
            let page = Arc::clone(&self.pages[frame_id]);
            page.write()?.pin_count += 1;
            self.replacer.record_access(frame_id);
            self.replacer.set_evictable(frame_id, false);
            return Ok(Some(page));
        }

        let frame_id = match self.acquire_frame()? {
            Some(frame_id) => frame_id,
            None => return Ok(None),
        };
        let page = Arc::clone(&self.pages[frame_id]);
        {
            let mut guard = page.write()?;
            self.disk.read_page(page_id, &mut guard.data)?;
            guard.id = page_id;
            guard.pin_count = 1;
        }
        self.page_table.insert(page_id, frame_id);
        self.replacer.record_access(frame_id);
        self.replacer.set_evictable(frame_id, false);
        Ok(Some(page))
    }

    /// Unpin the target page. Returns false if the page is not resident or
    /// its pin count is already zero; in that case the dirty hint is not
    /// applied either.
    ///
    /// The hint only ever sets the dirty bit: an earlier pinner's write must
    /// survive a later clean unpin. The pin count reaching zero makes the
    /// frame evictable.
    fn unpin_page(&mut self, page_id: PageId, is_dirty: bool) -> Result<bool> {
        let frame_id = match self.page_table.find(&page_id) {
            Some(frame_id) => frame_id,
            None => return Ok(false),
        };
        let page = Arc::clone(&self.pages[frame_id]);
        let mut guard = page.write()?;
        if guard.pin_count == 0 {
            return Ok(false);
        }
        guard.pin_count -= 1;
        if is_dirty {
            guard.is_dirty = true;
        }
        if guard.pin_count == 0 {
            self.replacer.set_evictable(frame_id, true);
        }
        Ok(true)
    }

    /// Flush the target page to disk regardless of the dirty bit, then
    /// clear the bit. Returns false if the page is not resident.
    fn flush_page(&mut self, page_id: PageId) -> Result<bool> {
        if page_id == INVALID_PAGE_ID {
            return Ok(false);
        }
        let frame_id = match self.page_table.find(&page_id) {
            Some(frame_id) => frame_id,
            None => return Ok(false),
        };
        let page = Arc::clone(&self.pages[frame_id]);
        let mut guard = page.write()?;
        self.disk.write_page(page_id, &guard.data)?;
        guard.is_dirty = false;
        Ok(true)
    }

    /// Flush every resident page to disk and clear its dirty bit. Pin state
    /// is left alone.
    fn flush_all_pages(&mut self) -> Result<()> {
        for page in &self.pages {
            let mut guard = page.write()?;
            if guard.id != INVALID_PAGE_ID {
                self.disk.write_page(guard.id, &guard.data)?;
                guard.is_dirty = false;
            }
        }
        Ok(())
    }

    /// Delete a page from the buffer pool. A page that is not resident is a
    /// vacuous success; a pinned page cannot be deleted and returns false.
    ///
    /// Deletion writes the page back if dirty, drops the replacement record
    /// and the directory entry, resets the frame onto the free list and
    /// forwards the deallocation to the disk manager.
    fn delete_page(&mut self, page_id: PageId) -> Result<bool> {
        let frame_id = match self.page_table.find(&page_id) {
            Some(frame_id) => frame_id,
            None => return Ok(true),
        };
        let page = Arc::clone(&self.pages[frame_id]);
        let mut guard = page.write()?;
        if guard.pin_count > 0 {
            return Ok(false);
        }
        if guard.is_dirty {
            debug!("deleting dirty page {}, writing back first", page_id);
            self.disk.write_page(page_id, &guard.data)?;
        }
        self.replacer.remove(frame_id);
        self.page_table.remove(&page_id);
        guard.clear();
        self.free_list.push_back(frame_id);
        self.disk.deallocate_page(page_id)?;
        Ok(true)
    }
}

/// Buffer pool manager: wraps the buffer pool in a mutex for concurrent
/// access; basically all the heavy lifting happens in the buffer pool.
/// Cloning is cheap and yields a handle to the same pool.
#[derive(Clone)]
pub struct BufferPoolManager {
    pool_size: usize,
    inner: Arc<Mutex<BufferPool>>,
}

impl BufferPoolManager {
    pub fn new(pool_size: usize, replacer_k: usize, disk: Box<dyn DiskManager>) -> Self {
        Self::with_options(pool_size, replacer_k, DEFAULT_BUCKET_SIZE, disk, None)
    }

    pub fn with_options(
        pool_size: usize,
        replacer_k: usize,
        bucket_size: usize,
        disk: Box<dyn DiskManager>,
        log_manager: Option<Arc<dyn LogManager>>,
    ) -> Self {
        let inner = BufferPool::new(pool_size, replacer_k, bucket_size, disk, log_manager);
        BufferPoolManager { pool_size, inner: Arc::new(Mutex::new(inner)) }
    }

    /// Build a pool from configuration, constructing the configured disk
    /// manager.
    pub fn open(cfg: &Config) -> Result<BufferPoolManager> {
        let disk = new_disk_manager(cfg.disk_type, &cfg.path)?;
        Ok(Self::with_options(cfg.pool_size, cfg.replacer_k, cfg.bucket_size, disk, None))
    }

    /// Number of frames owned by the pool.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Create a new page, pinned once. Returns None when every frame is
    /// pinned. The page id is readable from the returned page.
    pub fn new_page(&self) -> Result<Option<Arc<Page>>> {
        self.inner.lock()?.new_page()
    }

    /// Fetch the page with the given page id, pinning it. Returns None only
    /// when the page is not resident and every frame is pinned.
    pub fn fetch_page(&self, page_id: PageId) -> Result<Option<Arc<Page>>> {
        self.inner.lock()?.fetch_page(page_id)
    }

    /// Create a new page and wrap it in a guard that unpins on drop.
    pub fn new_page_pinned(&self) -> Result<Option<PinGuard>> {
        let page = match self.inner.lock()?.new_page()? {
            Some(page) => page,
            None => return Ok(None),
        };
        let page_id = page.read()?.id;
        Ok(Some(PinGuard { inner: Arc::clone(&self.inner), page, page_id, dirty: false }))
    }

    /// Fetch a page and wrap it in a guard that unpins on drop.
    pub fn fetch_page_pinned(&self, page_id: PageId) -> Result<Option<PinGuard>> {
        let page = match self.inner.lock()?.fetch_page(page_id)? {
            Some(page) => page,
            None => return Ok(None),
        };
        Ok(Some(PinGuard { inner: Arc::clone(&self.inner), page, page_id, dirty: false }))
    }

    /// Unpin the target page, optionally marking it dirty. Returns false if
    /// the page is not resident or was not pinned.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<bool> {
        self.inner.lock()?.unpin_page(page_id, is_dirty)
    }

    /// Flush the target page to disk regardless of the dirty bit.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        self.inner.lock()?.flush_page(page_id)
    }

    /// Flush every resident page to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        self.inner.lock()?.flush_all_pages()
    }

    /// Delete an unpinned page, freeing its frame. True when the page is
    /// gone (including when it was never resident), false when pinned.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        self.inner.lock()?.delete_page(page_id)
    }
}

/// A pinned page handle that releases the pin when dropped. The manual
/// fetch/unpin pairing stays available for pins whose lifetime does not fit
/// a scope; everything else should prefer the guard.
pub struct PinGuard {
    inner: Arc<Mutex<BufferPool>>,
    page: Arc<Page>,
    page_id: PageId,
    dirty: bool,
}

impl PinGuard {
    pub fn page(&self) -> &Arc<Page> {
        &self.page
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Record that the caller wrote the page; the dirty hint is applied at
    /// unpin time.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

impl Deref for PinGuard {
    type Target = Page;

    fn deref(&self) -> &Page {
        &self.page
    }
}

impl Drop for PinGuard {
    fn drop(&mut self) {
        if let Ok(mut pool) = self.inner.lock() {
            let _ = pool.unpin_page(self.page_id, self.dirty);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::memory::MemoryDiskManager;

    fn new_pool(pool_size: usize, replacer_k: usize) -> BufferPoolManager {
        BufferPoolManager::new(pool_size, replacer_k, Box::new(MemoryDiskManager::new()))
    }

    #[test]
    fn test_buffer_pool_basic() -> Result<()> {
        let pool_size = 10;
        let bpm = new_pool(pool_size, 5);

        // Scenario: the buffer pool is empty, we should be able to create a
        // new page.
        let page0 = bpm.new_page()?.unwrap();
        let page0_id = page0.read()?.id;

        // Scenario: once we have a page, we should be able to read and write
        // its content.
        page0.write()?.data[..5].copy_from_slice(b"hello");
        assert_eq!(b"hello", &page0.read()?.data[..5]);

        // Scenario: we should be able to create pages until we fill up the
        // pool.
        for _ in 1..pool_size {
            assert!(bpm.new_page()?.is_some());
        }
        // Scenario: once the pool is full, no new page can be created.
        for _ in 0..pool_size {
            assert!(bpm.new_page()?.is_none());
        }

        // Scenario: after unpinning pages 0..5 dirty and pinning four new
        // pages, one buffer frame is left for re-reading page 0.
        for page_id in 0..5 {
            assert!(bpm.unpin_page(page_id, true)?);
        }
        for _ in 0..4 {
            assert!(bpm.new_page()?.is_some());
        }
        // Scenario: the data written a while ago survived the eviction.
        let page0 = bpm.fetch_page(page0_id)?.unwrap();
        assert_eq!(b"hello", &page0.read()?.data[..5]);

        // Scenario: unpinning page 0 and creating one more page leaves every
        // frame pinned; fetching page 0 fails.
        assert!(bpm.unpin_page(page0_id, true)?);
        assert!(bpm.new_page()?.is_some());
        assert!(bpm.fetch_page(page0_id)?.is_none());

        Ok(())
    }

    #[test]
    fn test_churn_beyond_capacity() -> Result<()> {
        let bpm = new_pool(3, 2);

        // three pages fill the pool, all pinned
        let a = bpm.new_page()?.unwrap().read()?.id;
        let b = bpm.new_page()?.unwrap().read()?.id;
        let c = bpm.new_page()?.unwrap().read()?.id;
        assert!(bpm.new_page()?.is_none());

        // unpinning B frees exactly one victim
        assert!(bpm.unpin_page(b, false)?);
        let d = bpm.new_page()?.unwrap().read()?.id;
        assert_ne!(b, d);

        // B was evicted and nothing is evictable now
        assert!(bpm.fetch_page(b)?.is_none());

        // A, C and D are still resident
        for page_id in [a, c, d] {
            assert!(bpm.fetch_page(page_id)?.is_some());
            assert!(bpm.unpin_page(page_id, false)?);
        }

        Ok(())
    }

    #[test]
    fn test_unpin_semantics() -> Result<()> {
        let bpm = new_pool(2, 2);

        let page = bpm.new_page()?.unwrap();
        let page_id = page.read()?.id;

        // not resident
        assert!(!bpm.unpin_page(999, false)?);

        // double fetch, pin count 2: two unpins succeed, the third fails
        assert!(bpm.fetch_page(page_id)?.is_some());
        assert!(bpm.unpin_page(page_id, false)?);
        assert!(bpm.unpin_page(page_id, true)?);
        assert!(!bpm.unpin_page(page_id, false)?);

        // the clean unpin did not wipe the dirty hint of the second one
        assert!(page.read()?.is_dirty);

        Ok(())
    }

    #[test]
    fn test_flush_is_unconditional() -> Result<()> {
        let bpm = new_pool(2, 2);

        let page = bpm.new_page()?.unwrap();
        let page_id = page.read()?.id;
        page.write()?.data[0] = 42;
        assert!(bpm.unpin_page(page_id, true)?);

        // flush clears the dirty bit
        assert!(bpm.flush_page(page_id)?);
        assert!(!page.read()?.is_dirty);

        // flushing a clean page still writes
        assert!(bpm.flush_page(page_id)?);

        // invalid and non-resident ids fail
        assert!(!bpm.flush_page(INVALID_PAGE_ID)?);
        assert!(!bpm.flush_page(999)?);

        Ok(())
    }

    #[test]
    fn test_delete_page() -> Result<()> {
        let bpm = new_pool(2, 2);

        let page = bpm.new_page()?.unwrap();
        let page_id = page.read()?.id;
        page.write()?.data[0] = 7;

        // pinned pages cannot be deleted
        assert!(!bpm.delete_page(page_id)?);

        assert!(bpm.unpin_page(page_id, true)?);
        assert!(bpm.delete_page(page_id)?);

        // a deleted page is no longer resident; deleting again is vacuous
        assert!(bpm.delete_page(page_id)?);

        // re-fetching reads from disk: the frame was zeroed and the memory
        // disk dropped the page, so the bytes come back fresh
        let page = bpm.fetch_page(page_id)?.unwrap();
        assert_eq!(0, page.read()?.data[0]);

        Ok(())
    }

    #[test]
    fn test_pin_guard_unpins_on_drop() -> Result<()> {
        let bpm = new_pool(1, 2);

        let page_id = {
            let mut guard = bpm.new_page_pinned()?.unwrap();
            guard.page().write()?.data[0] = 9;
            guard.mark_dirty();
            guard.page_id()
        };

        // the drop released the only frame: a new page can evict it
        let other = bpm.new_page_pinned()?.unwrap();
        assert_ne!(page_id, other.page_id());
        drop(other);

        // and the guard's dirty hint made the eviction write back
        let guard = bpm.fetch_page_pinned(page_id)?.unwrap();
        assert_eq!(9, guard.read()?.data[0]);

        Ok(())
    }

    #[test]
    fn test_open_from_config() -> Result<()> {
        let cfg = Config::new("")?;
        let bpm = BufferPoolManager::open(&cfg)?;
        assert_eq!(cfg.pool_size, bpm.pool_size());

        let page = bpm.new_page()?.unwrap();
        let page_id = page.read()?.id;
        assert!(bpm.unpin_page(page_id, false)?);

        Ok(())
    }

    #[test]
    fn test_pool_isolation() -> Result<()> {
        // pools share nothing: the same page id holds different data
        let bpm1 = new_pool(2, 2);
        let bpm2 = new_pool(2, 2);

        let p1 = bpm1.new_page()?.unwrap();
        let p2 = bpm2.new_page()?.unwrap();
        assert_eq!(p1.read()?.id, p2.read()?.id);

        p1.write()?.data[0] = 1;
        p2.write()?.data[0] = 2;
        assert_eq!(1, p1.read()?.data[0]);
        assert_eq!(2, p2.read()?.data[0]);

        Ok(())
    }
}
