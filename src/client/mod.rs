pub mod commands;
pub mod device;
pub mod upload;

pub use device::Device;
pub use upload::{UploadProgress, UploadReport, file_md5};
