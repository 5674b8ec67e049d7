pub mod directory_manager;
pub mod file_deleter;
pub mod utils;
pub mod writer_file;

/// Marker type implementing the filesystem traits against the local disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFile;
