/// Typed wrappers over `send_command`.
use tracing::info;

use super::device::Device;
use crate::error::{Error, Result};
use crate::protocol::command::method;
use crate::protocol::xml::{
    self, BootLogoInfo, DeviceInfo, EthernetInfo, FileInfo, FontInfo, LuminanceInfo, SdkResponse,
    ServerInfo, SwitchTimeInfo, TimeInfo, WifiInfo,
};

impl Device {
    async fn call(&self, method: &str, inner: &str) -> Result<SdkResponse> {
        self.send_command(method, inner).await?.into_success()
    }

    /// Query the descriptor and refresh the cached copy.
    pub async fn device_info(&self) -> Result<DeviceInfo> {
        let resp = self.call(method::GET_DEVICE_INFO, "").await?;
        let info = xml::parse_device_info(&resp.inner_xml)?;
        self.cache_device_info(info.clone());
        Ok(info)
    }

    pub async fn ethernet_info(&self) -> Result<EthernetInfo> {
        let resp = self.call(method::GET_ETH0_INFO, "").await?;
        xml::parse_ethernet_info(&resp.inner_xml)
    }

    /// Reconfigure the wired interface. A wrong address makes the device
    /// unreachable once it applies the change.
    pub async fn set_ethernet_info(&self, eth: &EthernetInfo) -> Result<()> {
        self.call(method::SET_ETH0_INFO, &xml::build_set_ethernet_xml(eth))
            .await?;
        info!("Ethernet set (DHCP: {}, IP: {})", eth.auto_dhcp, eth.ip);
        Ok(())
    }

    pub async fn wifi_info(&self) -> Result<WifiInfo> {
        let resp = self.call(method::GET_WIFI_INFO, "").await?;
        xml::parse_wifi_info(&resp.inner_xml)
    }

    pub async fn set_wifi_info(&self, wifi: &WifiInfo) -> Result<()> {
        self.call(method::SET_WIFI_INFO, &xml::build_set_wifi_xml(wifi))
            .await?;
        info!("WiFi set to {} mode", wifi.mode.as_str());
        Ok(())
    }

    pub async fn time_info(&self) -> Result<TimeInfo> {
        let resp = self.call(method::GET_TIME_INFO, "").await?;
        xml::parse_time_info(&resp.inner_xml)
    }

    pub async fn set_time_info(&self, info: &TimeInfo) -> Result<()> {
        self.call(method::SET_TIME_INFO, &xml::build_set_time_xml(info))
            .await?;
        info!("Device time set to {} ({})", info.time, info.timezone);
        Ok(())
    }

    pub async fn luminance_info(&self) -> Result<LuminanceInfo> {
        let resp = self.call(method::GET_LUMINANCE_PLOY, "").await?;
        xml::parse_luminance_info(&resp.inner_xml)
    }

    pub async fn set_luminance_info(&self, lum: &LuminanceInfo) -> Result<()> {
        self.call(method::SET_LUMINANCE_PLOY, &xml::build_set_luminance_xml(lum))
            .await?;
        info!(
            "Brightness policy set ({}, default {}%)",
            lum.mode.as_str(),
            lum.default_value
        );
        Ok(())
    }

    /// Fixed brightness in percent; out-of-range values are clamped to 1..=100.
    pub async fn set_brightness(&self, percent: u32) -> Result<()> {
        self.set_luminance_info(&LuminanceInfo::fixed(percent)).await
    }

    pub async fn open_screen(&self) -> Result<()> {
        self.call(method::OPEN_SCREEN, "").await.map(drop)
    }

    pub async fn close_screen(&self) -> Result<()> {
        self.call(method::CLOSE_SCREEN, "").await.map(drop)
    }

    pub async fn switch_time_info(&self) -> Result<SwitchTimeInfo> {
        let resp = self.call(method::GET_SWITCH_TIME, "").await?;
        xml::parse_switch_time_info(&resp.inner_xml)
    }

    pub async fn set_switch_time_info(&self, schedule: &SwitchTimeInfo) -> Result<()> {
        self.call(
            method::SET_SWITCH_TIME,
            &xml::build_set_switch_time_xml(schedule),
        )
        .await?;
        info!("Screen schedule set ({} window(s))", schedule.items.len());
        Ok(())
    }

    pub async fn boot_logo_info(&self) -> Result<BootLogoInfo> {
        let resp = self.call(method::GET_BOOT_LOGO, "").await?;
        xml::parse_boot_logo_info(&resp.inner_xml)
    }

    /// Point the boot logo at an image that was uploaded beforehand.
    pub async fn set_boot_logo(&self, logo: &BootLogoInfo) -> Result<()> {
        if logo.name.is_empty() {
            return Err(Error::InvalidArgument("boot logo needs a file name"));
        }
        self.call(method::SET_BOOT_LOGO_NAME, &xml::build_set_boot_logo_xml(logo))
            .await
            .map(drop)
    }

    pub async fn clear_boot_logo(&self) -> Result<()> {
        self.call(method::CLEAR_BOOT_LOGO, "").await.map(drop)
    }

    pub async fn server_info(&self) -> Result<ServerInfo> {
        let resp = self.call(method::GET_SDK_TCP_SERVER, "").await?;
        xml::parse_server_info(&resp.inner_xml)
    }

    pub async fn set_server_info(&self, server: &ServerInfo) -> Result<()> {
        self.call(method::SET_SDK_TCP_SERVER, &xml::build_set_server_xml(server))
            .await?;
        info!("Remote server set to {}:{}", server.host, server.port);
        Ok(())
    }

    pub async fn file_list(&self) -> Result<Vec<FileInfo>> {
        let resp = self.call(method::GET_FILES, "").await?;
        xml::parse_file_list(&resp.inner_xml)
    }

    pub async fn delete_files(&self, names: &[&str]) -> Result<()> {
        if names.is_empty() {
            return Err(Error::InvalidArgument("no file names given"));
        }
        self.call(method::DELETE_FILES, &xml::build_delete_files_xml(names))
            .await?;
        info!("Deleted {} file(s)", names.len());
        Ok(())
    }

    /// Replace the playing content with an empty screen.
    pub async fn delete_all_programs(&self) -> Result<()> {
        let screen = xml::build_empty_screen_xml(chrono::Utc::now().timestamp_millis());
        self.call(method::ADD_PROGRAM, &screen).await?;
        info!("All programs removed");
        Ok(())
    }

    pub async fn font_info(&self) -> Result<Vec<FontInfo>> {
        let resp = self.call(method::GET_ALL_FONT_INFO, "").await?;
        xml::parse_font_list(&resp.inner_xml)
    }
}
