pub mod transfer;

pub use transfer::{CheckResponse, UploadResponse};
