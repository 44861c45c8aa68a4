pub mod disk;
pub mod naming;

pub use disk::{FileStorage, StagedFile, StoredFile};
pub use naming::{content_disposition, sanitize_filename, stored_name_for};
