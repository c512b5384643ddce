pub mod cache_write;
pub mod tree_utils;
