use serde::Deserialize;

use crate::disk::DiskType;
use crate::error::Result;

#[derive(Debug, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
}

/// Buffer pool configuration, loaded from an optional file plus the
/// `BUFPOOL_` environment. Every field has a default so `Config::new("")`
/// always succeeds.
#[derive(Debug, PartialEq, Deserialize)]
pub struct Config {
    pub log_level: LogLevel,
    pub disk_type: DiskType,
    /// Path of the backing file; ignored for the memory disk manager.
    pub path: String,
    /// Number of frames owned by the pool.
    pub pool_size: usize,
    /// K of the LRU-K replacement policy.
    pub replacer_k: usize,
    /// Entries per page-table directory bucket.
    pub bucket_size: usize,
}

impl Config {
    pub fn new(file: &str) -> Result<Config> {
        let mut cfg = config::Config::builder()
            .set_default("log_level", "debug")?
            .set_default("disk_type", "memory")?
            .set_default("path", "bufpool.db")?
            .set_default("pool_size", 64)?
            .set_default("replacer_k", 2)?
            .set_default("bucket_size", 4)?;
        if !file.is_empty() {
            cfg = cfg.add_source(config::File::with_name(file))
        }
        cfg = cfg.add_source(config::Environment::with_prefix("BUFPOOL"));
        Ok(cfg.build()?.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() -> Result<()> {
        let cfg = Config::new("")?;
        assert_eq!(LogLevel::Debug, cfg.log_level);
        assert_eq!(DiskType::Memory, cfg.disk_type);
        assert_eq!(64, cfg.pool_size);
        assert_eq!(2, cfg.replacer_k);
        assert_eq!(4, cfg.bucket_size);
        Ok(())
    }
}
