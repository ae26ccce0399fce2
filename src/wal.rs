/// Hook for a future write-ahead log manager. The buffer pool holds a
/// reference so log-before-write ordering can be threaded through the
/// write-back paths later, but it makes no calls today: recovery is handled
/// above this crate.
pub trait LogManager: Send + Sync {}
