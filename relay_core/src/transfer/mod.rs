//! Upload, check, download and expiry of shared files.

pub mod download;
pub mod service;
pub mod sweeper;

pub use download::DownloadStream;
pub use service::{Download, SweepReport, TransferService};
pub use sweeper::spawn_sweeper;
