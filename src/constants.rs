//! Shared constants

// Permission name syntax
pub const WILDCARD_TOKEN: &str = "*";
pub const PART_DELIMITER: char = '.';

// Separator for "a|b|c" reference lists
pub const PIPE: char = '|';

// Cache expiry when the configuration leaves it out (24 hours)
pub const DEFAULT_CACHE_EXPIRY_SECS: u64 = 24 * 60 * 60;

pub const DEFAULT_GUARD: &str = "web";

// LMDB environment sizing
pub const LMDB_MAP_SIZE: usize = 1 << 30;
pub const LMDB_MAX_DBS: u32 = 10;
