pub mod completion;
pub mod config;
pub mod fuse;
pub mod plan;
