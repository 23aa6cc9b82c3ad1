//! Client for Huidu LED controllers over the SDK TCP protocol.
//!
//! ```no_run
//! # async fn demo() -> huidu_sdk::Result<()> {
//! use huidu_sdk::{ClientConfig, Device};
//!
//! let device = Device::new(ClientConfig::new("192.168.6.1"));
//! device.connect().await?;
//! let info = device.device_info().await?;
//! println!("{} {}x{}", info.model, info.screen_width, info.screen_height);
//! device.close().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod services;

pub use client::{Device, UploadProgress, UploadReport, file_md5};
pub use config::ClientConfig;
pub use error::{Error, ProtocolError, Result};
pub use protocol::command::{CmdType, ErrorCode, FileType};
pub use protocol::discovery::{DiscoveredDevice, scan};
pub use protocol::xml::{
    BootLogoInfo, DeviceInfo, EthernetInfo, FileInfo, FontInfo, LuminanceInfo, LuminanceItem,
    LuminanceMode, SdkResponse, ServerInfo, SwitchTimeInfo, SwitchTimeItem, TimeInfo, WifiApInfo,
    WifiInfo, WifiMode,
};
