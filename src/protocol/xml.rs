/// SDK XML envelopes and the typed payloads carried inside `<out>`.
///
/// Request:  `<sdk guid="ID"><in method="NAME">...</in></sdk>`
/// Response: `<sdk guid="ID"><out method="NAME" result="CODE">...</out></sdk>`
use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use serde::Deserialize;

use crate::config::DEFAULT_PORT;
use crate::error::{Error, Result};
use crate::protocol::command::method;

/// `result` value of a successful SDK response.
pub const SUCCESS: &str = "kSuccess";

/// GUID sent before the device has assigned one.
pub const GUID_PLACEHOLDER: &str = "##GUID";

pub const SDK_VERSION: u32 = 0x0100_0000;

pub fn build_sdk_xml(guid: &str, method: &str, inner: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <sdk guid=\"{}\"><in method=\"{}\">{inner}</in></sdk>",
        escape(guid),
        escape(method)
    )
}

/// Handshake phase 2 body: the SDK protocol version under the placeholder GUID.
pub fn build_version_xml() -> String {
    let version = format!("{SDK_VERSION:x}");
    let inner = element("version", &[("value", version.as_str())]);
    build_sdk_xml(GUID_PLACEHOLDER, method::GET_IF_VERSION, &inner)
}

fn open_tag(tag: &str, attrs: &[(&str, &str)]) -> String {
    let mut out = format!("<{tag}");
    for (key, value) in attrs {
        out.push_str(&format!(" {key}=\"{}\"", escape(*value)));
    }
    out
}

/// Self-closing element with escaped attribute values.
pub fn element(tag: &str, attrs: &[(&str, &str)]) -> String {
    format!("{}/>", open_tag(tag, attrs))
}

/// Element wrapping already-built children; self-closing when there are none.
pub fn container(tag: &str, attrs: &[(&str, &str)], children: &str) -> String {
    if children.is_empty() {
        element(tag, attrs)
    } else {
        format!("{}>{children}</{tag}>", open_tag(tag, attrs))
    }
}

/// Swap the first `guid="..."` attribute value for `guid`.
pub fn replace_guid(xml: &str, guid: &str) -> String {
    const ATTR: &str = "guid=\"";
    let Some(pos) = xml.find(ATTR) else {
        return xml.to_string();
    };
    let start = pos + ATTR.len();
    let Some(len) = xml[start..].find('"') else {
        return xml.to_string();
    };
    format!("{}{}{}", &xml[..start], escape(guid), &xml[start + len..])
}

/// Parsed SDK reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SdkResponse {
    pub guid: String,
    pub method: String,
    pub result: String,
    /// Raw XML between `<out ...>` and `</out>`.
    pub inner_xml: String,
    pub raw_xml: String,
}

impl SdkResponse {
    pub fn is_success(&self) -> bool {
        self.result == SUCCESS
    }

    /// Turn a non-success result into `Error::Rejected`.
    pub fn into_success(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::Rejected {
                method: self.method,
                result: self.result,
            })
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let mut resp = SdkResponse {
            raw_xml: raw.to_string(),
            ..Default::default()
        };

        let mut reader = Reader::from_str(raw);
        loop {
            match reader.read_event().map_err(Error::xml)? {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"sdk" => resp.guid = attr(&e, b"guid")?.unwrap_or_default(),
                    b"out" => {
                        resp.read_out_attrs(&e)?;
                        // Everything up to the closing tag is handed back verbatim.
                        let start = reader.buffer_position() as usize;
                        let end = raw[start..]
                            .rfind("</out")
                            .ok_or_else(|| Error::Xml("unterminated <out> element".into()))?;
                        resp.inner_xml = raw[start..start + end].trim().to_string();
                        break;
                    }
                    _ => {}
                },
                Event::Empty(e) => match e.local_name().as_ref() {
                    b"sdk" => resp.guid = attr(&e, b"guid")?.unwrap_or_default(),
                    b"out" => {
                        resp.read_out_attrs(&e)?;
                        break;
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }

        if resp.guid.is_empty() && resp.method.is_empty() {
            return Err(Error::Xml(
                "response carries neither an sdk guid nor an out method".into(),
            ));
        }
        Ok(resp)
    }

    fn read_out_attrs(&mut self, e: &BytesStart<'_>) -> Result<()> {
        self.method = attr(e, b"method")?.unwrap_or_default();
        self.result = attr(e, b"result")?.unwrap_or_default();
        Ok(())
    }
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for a in e.attributes() {
        let a = a.map_err(Error::xml)?;
        if a.key.local_name().as_ref() == key {
            return Ok(Some(a.unescape_value().map_err(Error::xml)?.into_owned()));
        }
    }
    Ok(None)
}

/// Attribute maps of every `<tag>` element, at any depth, in document order.
pub fn elements(xml: &str, tag: &str) -> Result<Vec<HashMap<String, String>>> {
    let mut reader = Reader::from_str(xml);
    let mut found = Vec::new();
    loop {
        match reader.read_event().map_err(Error::xml)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == tag.as_bytes() => {
                found.push(attr_map(&e)?);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(found)
}

fn attr_map(e: &BytesStart<'_>) -> Result<HashMap<String, String>> {
    let mut attrs = HashMap::new();
    for a in e.attributes() {
        let a = a.map_err(Error::xml)?;
        let key = String::from_utf8_lossy(a.key.local_name().as_ref()).into_owned();
        let value = a.unescape_value().map_err(Error::xml)?.into_owned();
        attrs.insert(key, value);
    }
    Ok(attrs)
}

fn first(xml: &str, tag: &str) -> Result<HashMap<String, String>> {
    Ok(elements(xml, tag)?.into_iter().next().unwrap_or_default())
}

fn flag(attrs: &HashMap<String, String>, key: &str) -> bool {
    attrs
        .get(key)
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

fn text(attrs: &HashMap<String, String>, key: &str) -> String {
    attrs.get(key).cloned().unwrap_or_default()
}

fn number<T: std::str::FromStr>(attrs: &HashMap<String, String>, key: &str, fallback: T) -> T {
    attrs
        .get(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(fallback)
}

// ---------------------------------------------------------------------------
// Typed payloads
// ---------------------------------------------------------------------------

/// Hardware and firmware descriptor returned by `GetDeviceInfo`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub cpu: String,
    pub model: String,
    pub device_id: String,
    pub device_name: String,
    pub fpga_version: String,
    pub app_version: String,
    pub kernel_version: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub screen_rotation: u32,
}

#[derive(Debug, Default, Deserialize)]
struct DeviceInfoDoc {
    #[serde(default)]
    device: DeviceNode,
    #[serde(default)]
    version: VersionNode,
    #[serde(default)]
    screen: ScreenNode,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DeviceNode {
    #[serde(rename = "@cpu")]
    cpu: String,
    #[serde(rename = "@model")]
    model: String,
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@name")]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VersionNode {
    #[serde(rename = "@fpga")]
    fpga: String,
    #[serde(rename = "@app")]
    app: String,
    #[serde(rename = "@kernel")]
    kernel: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ScreenNode {
    #[serde(rename = "@width")]
    width: u32,
    #[serde(rename = "@height")]
    height: u32,
    #[serde(rename = "@rotation")]
    rotation: u32,
}

pub fn parse_device_info(inner: &str) -> Result<DeviceInfo> {
    let doc: DeviceInfoDoc =
        quick_xml::de::from_str(&format!("<out>{inner}</out>")).map_err(Error::xml)?;
    Ok(DeviceInfo {
        cpu: doc.device.cpu,
        model: doc.device.model,
        device_id: doc.device.id,
        device_name: doc.device.name,
        fpga_version: doc.version.fpga,
        app_version: doc.version.app,
        kernel_version: doc.version.kernel,
        screen_width: doc.screen.width,
        screen_height: doc.screen.height,
        screen_rotation: doc.screen.rotation,
    })
}

/// Wall clock and synchronisation settings (`GetTimeInfo` / `SetTimeInfo`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TimeInfo {
    #[serde(rename = "timezone", deserialize_with = "value_attr")]
    pub timezone: String,
    #[serde(rename = "summer", deserialize_with = "enable_attr")]
    pub summer: bool,
    #[serde(rename = "sync", deserialize_with = "value_attr")]
    pub sync: String,
    /// `YYYY-MM-DD hh:mm:ss`, honoured when `sync` is `none`.
    #[serde(rename = "time", deserialize_with = "value_attr")]
    pub time: String,
}

#[derive(Deserialize)]
struct ValueAttr {
    #[serde(rename = "@value", default)]
    value: String,
}

#[derive(Deserialize)]
struct EnableAttr {
    #[serde(rename = "@enable", default)]
    enable: String,
}

fn value_attr<'de, D: serde::Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    Ok(ValueAttr::deserialize(d)?.value)
}

fn enable_attr<'de, D: serde::Deserializer<'de>>(d: D) -> std::result::Result<bool, D::Error> {
    Ok(EnableAttr::deserialize(d)?.enable.eq_ignore_ascii_case("true"))
}

pub fn parse_time_info(inner: &str) -> Result<TimeInfo> {
    quick_xml::de::from_str(&format!("<out>{inner}</out>")).map_err(Error::xml)
}

pub fn build_set_time_xml(info: &TimeInfo) -> String {
    [
        element("timezone", &[("value", info.timezone.as_str())]),
        element("summer", &[("enable", bool_str(info.summer))]),
        element("sync", &[("value", info.sync.as_str())]),
        element("time", &[("value", info.time.as_str())]),
    ]
    .concat()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EthernetInfo {
    pub enabled: bool,
    pub auto_dhcp: bool,
    pub ip: String,
    pub netmask: String,
    pub gateway: String,
    pub dns: String,
}

pub fn parse_ethernet_info(inner: &str) -> Result<EthernetInfo> {
    let address = first(inner, "address")?;
    Ok(EthernetInfo {
        enabled: flag(&first(inner, "enable")?, "value"),
        auto_dhcp: flag(&first(inner, "dhcp")?, "auto"),
        ip: text(&address, "ip"),
        netmask: text(&address, "netmask"),
        gateway: text(&address, "gateway"),
        dns: text(&address, "dns"),
    })
}

pub fn build_set_ethernet_xml(info: &EthernetInfo) -> String {
    let children = [
        element("enable", &[("value", bool_str(info.enabled))]),
        element("dhcp", &[("auto", bool_str(info.auto_dhcp))]),
        element(
            "address",
            &[
                ("ip", info.ip.as_str()),
                ("netmask", info.netmask.as_str()),
                ("gateway", info.gateway.as_str()),
                ("dns", info.dns.as_str()),
            ],
        ),
    ]
    .concat();
    container("eth", &[("valid", "true")], &children)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WifiMode {
    /// The controller runs its own access point.
    #[default]
    Ap,
    /// The controller joins an existing network.
    Station,
}

impl WifiMode {
    pub fn as_str(self) -> &'static str {
        match self {
            WifiMode::Ap => "ap",
            WifiMode::Station => "station",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WifiApInfo {
    pub ssid: String,
    pub password: String,
    pub channel: String,
    pub encryption: String,
}

/// Wireless module state (`GetWifiInfo` / `SetWifiInfo`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WifiInfo {
    /// False on controllers without a wireless module.
    pub has_wifi: bool,
    pub enabled: bool,
    pub mode: WifiMode,
    pub ap: WifiApInfo,
    pub station_ssid: String,
    pub station_password: String,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum WifiSection {
    Top,
    Ap,
    Station,
}

pub fn parse_wifi_info(inner: &str) -> Result<WifiInfo> {
    let mut info = WifiInfo::default();
    let mut section = WifiSection::Top;
    let mut reader = Reader::from_str(inner);
    loop {
        let (e, opens) = match reader.read_event().map_err(Error::xml)? {
            Event::Start(e) => (e, true),
            Event::Empty(e) => (e, false),
            Event::End(e) => {
                if matches!(e.local_name().as_ref(), b"ap" | b"station") {
                    section = WifiSection::Top;
                }
                continue;
            }
            Event::Eof => break,
            _ => continue,
        };
        let attrs = attr_map(&e)?;
        match e.local_name().as_ref() {
            b"wifi" => info.has_wifi = flag(&attrs, "valid"),
            b"enable" => info.enabled = flag(&attrs, "value"),
            b"mode" => {
                info.mode = if text(&attrs, "value") == "ap" {
                    WifiMode::Ap
                } else {
                    WifiMode::Station
                }
            }
            b"ap" if opens => section = WifiSection::Ap,
            b"station" if opens => section = WifiSection::Station,
            b"ssid" if section == WifiSection::Station => info.station_ssid = text(&attrs, "value"),
            b"passwd" if section == WifiSection::Station => {
                info.station_password = text(&attrs, "value")
            }
            b"ssid" => info.ap.ssid = text(&attrs, "value"),
            b"passwd" => info.ap.password = text(&attrs, "value"),
            b"channel" => info.ap.channel = text(&attrs, "value"),
            b"encryption" => info.ap.encryption = text(&attrs, "value"),
            _ => {}
        }
    }
    Ok(info)
}

pub fn build_set_wifi_xml(info: &WifiInfo) -> String {
    let encryption = if info.ap.encryption.is_empty() {
        "WPA-PSK"
    } else {
        info.ap.encryption.as_str()
    };
    let ap = [
        element("ssid", &[("value", info.ap.ssid.as_str())]),
        element("passwd", &[("value", info.ap.password.as_str())]),
        element("channel", &[("value", info.ap.channel.as_str())]),
        element("encryption", &[("value", encryption)]),
        element("dhcp", &[("auto", "true")]),
        element(
            "address",
            &[
                ("ip", "0.0.0.0"),
                ("netmask", "0.0.0.0"),
                ("gateway", "0.0.0.0"),
                ("dns", "0.0.0.0"),
            ],
        ),
    ]
    .concat();
    let station = [
        element("ssid", &[("value", info.station_ssid.as_str())]),
        element("passwd", &[("value", info.station_password.as_str())]),
    ]
    .concat();
    [
        element("mode", &[("value", info.mode.as_str())]),
        container("ap", &[], &ap),
        container("station", &[], &station),
    ]
    .concat()
}

/// A file stored on the device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    /// Bytes present when the file is only partially uploaded.
    pub exist_size: u64,
    pub md5: String,
    pub file_type: String,
}

pub fn parse_file_list(inner: &str) -> Result<Vec<FileInfo>> {
    Ok(elements(inner, "file")?
        .iter()
        .map(|a| FileInfo {
            name: text(a, "name"),
            size: text(a, "size").parse().unwrap_or(0),
            exist_size: text(a, "existSize").parse().unwrap_or(0),
            md5: text(a, "md5"),
            file_type: text(a, "type"),
        })
        .collect())
}

pub fn build_delete_files_xml(names: &[&str]) -> String {
    let files: String = names
        .iter()
        .map(|&name| element("file", &[("name", name)]))
        .collect();
    format!("<files>{files}</files>")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FontInfo {
    pub font_name: String,
    pub file_name: String,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

pub fn parse_font_list(inner: &str) -> Result<Vec<FontInfo>> {
    Ok(elements(inner, "font")?
        .iter()
        .map(|a| FontInfo {
            font_name: text(a, "fontName"),
            file_name: text(a, "fileName"),
            bold: flag(a, "bold"),
            italic: flag(a, "italic"),
            underline: flag(a, "underline"),
        })
        .collect())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LuminanceMode {
    /// One fixed level.
    #[default]
    Fixed,
    /// Levels switched by time of day.
    Scheduled,
    /// Level follows the light sensor.
    Sensor,
}

impl LuminanceMode {
    pub fn as_str(self) -> &'static str {
        match self {
            LuminanceMode::Fixed => "default",
            LuminanceMode::Scheduled => "ploys",
            LuminanceMode::Sensor => "sensor",
        }
    }

    fn from_attr(value: &str) -> Option<Self> {
        match value {
            "default" => Some(LuminanceMode::Fixed),
            "ploys" => Some(LuminanceMode::Scheduled),
            "sensor" => Some(LuminanceMode::Sensor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LuminanceItem {
    pub enabled: bool,
    /// `hh:mm:ss`
    pub start: String,
    pub percent: u32,
}

/// Brightness policy (`GetLuminancePloy` / `SetLuminancePloy`). Levels are
/// percentages in 1..=100.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LuminanceInfo {
    pub mode: LuminanceMode,
    pub default_value: u32,
    pub items: Vec<LuminanceItem>,
    pub sensor_min: u32,
    pub sensor_max: u32,
    /// Seconds between sensor adjustments.
    pub sensor_time: u32,
}

impl Default for LuminanceInfo {
    fn default() -> Self {
        Self {
            mode: LuminanceMode::Fixed,
            default_value: 100,
            items: Vec::new(),
            sensor_min: 1,
            sensor_max: 100,
            sensor_time: 10,
        }
    }
}

impl LuminanceInfo {
    /// Fixed brightness, clamped to 1..=100.
    pub fn fixed(percent: u32) -> Self {
        Self {
            default_value: percent.clamp(1, 100),
            ..Self::default()
        }
    }
}

pub fn parse_luminance_info(inner: &str) -> Result<LuminanceInfo> {
    let fallback = LuminanceInfo::default();
    let sensor = first(inner, "sensor")?;
    Ok(LuminanceInfo {
        mode: LuminanceMode::from_attr(&text(&first(inner, "mode")?, "value"))
            .unwrap_or(fallback.mode),
        default_value: number(&first(inner, "default")?, "value", fallback.default_value),
        items: elements(inner, "item")?
            .iter()
            .map(|a| LuminanceItem {
                enabled: flag_or(a, "enable", true),
                start: a.get("start").cloned().unwrap_or_else(|| "00:00:00".into()),
                percent: number(a, "percent", 100),
            })
            .collect(),
        sensor_min: number(&sensor, "min", fallback.sensor_min),
        sensor_max: number(&sensor, "max", fallback.sensor_max),
        sensor_time: number(&sensor, "time", fallback.sensor_time),
    })
}

/// Zero sensor bounds are replaced by the device defaults.
pub fn build_set_luminance_xml(info: &LuminanceInfo) -> String {
    let fallback = LuminanceInfo::default();
    let or_default = |v: u32, d: u32| if v == 0 { d } else { v };
    let items: String = info
        .items
        .iter()
        .map(|item| {
            element(
                "item",
                &[
                    ("enable", bool_str(item.enabled)),
                    ("start", item.start.as_str()),
                    ("percent", item.percent.to_string().as_str()),
                ],
            )
        })
        .collect();
    [
        element("mode", &[("value", info.mode.as_str())]),
        element("default", &[("value", info.default_value.to_string().as_str())]),
        container("ploy", &[], &items),
        element(
            "sensor",
            &[
                ("min", or_default(info.sensor_min, fallback.sensor_min).to_string().as_str()),
                ("max", or_default(info.sensor_max, fallback.sensor_max).to_string().as_str()),
                ("time", or_default(info.sensor_time, fallback.sensor_time).to_string().as_str()),
            ],
        ),
    ]
    .concat()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchTimeItem {
    /// True keeps the screen on during the window.
    pub enabled: bool,
    pub start: String,
    pub end: String,
}

/// Scheduled screen on/off (`GetSwitchTime` / `SetSwitchTime`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchTimeInfo {
    pub open_enabled: bool,
    pub ploy_enabled: bool,
    pub items: Vec<SwitchTimeItem>,
}

impl Default for SwitchTimeInfo {
    fn default() -> Self {
        Self {
            open_enabled: true,
            ploy_enabled: false,
            items: Vec::new(),
        }
    }
}

pub fn parse_switch_time_info(inner: &str) -> Result<SwitchTimeInfo> {
    Ok(SwitchTimeInfo {
        open_enabled: flag_or(&first(inner, "open")?, "enable", true),
        ploy_enabled: flag(&first(inner, "ploy")?, "enable"),
        items: elements(inner, "item")?
            .iter()
            .map(|a| SwitchTimeItem {
                enabled: flag_or(a, "enable", true),
                start: text(a, "start"),
                end: text(a, "end"),
            })
            .collect(),
    })
}

pub fn build_set_switch_time_xml(info: &SwitchTimeInfo) -> String {
    let items: String = info
        .items
        .iter()
        .map(|item| {
            element(
                "item",
                &[
                    ("enable", bool_str(item.enabled)),
                    ("start", item.start.as_str()),
                    ("end", item.end.as_str()),
                ],
            )
        })
        .collect();
    [
        element("open", &[("enable", bool_str(info.open_enabled))]),
        container("ploy", &[("enable", bool_str(info.ploy_enabled))], &items),
    ]
    .concat()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootLogoInfo {
    pub exists: bool,
    /// Name of an image already uploaded to the device.
    pub name: String,
    pub md5: String,
}

pub fn parse_boot_logo_info(inner: &str) -> Result<BootLogoInfo> {
    let logo = first(inner, "logo")?;
    Ok(BootLogoInfo {
        exists: flag(&logo, "exist"),
        name: text(&logo, "name"),
        md5: text(&logo, "md5"),
    })
}

pub fn build_set_boot_logo_xml(info: &BootLogoInfo) -> String {
    element(
        "logo",
        &[
            ("exist", bool_str(info.exists)),
            ("name", info.name.as_str()),
            ("md5", info.md5.as_str()),
        ],
    )
}

/// Remote TCP server the controller dials out to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub host: String,
    pub port: u16,
}

pub fn parse_server_info(inner: &str) -> Result<ServerInfo> {
    let server = first(inner, "server")?;
    Ok(ServerInfo {
        host: text(&server, "host"),
        port: number(&server, "port", DEFAULT_PORT),
    })
}

pub fn build_set_server_xml(info: &ServerInfo) -> String {
    element(
        "server",
        &[("host", info.host.as_str()), ("port", info.port.to_string().as_str())],
    )
}

/// A screen with no programs; sent through `AddProgram` it replaces whatever
/// the device is playing.
pub fn build_empty_screen_xml(timestamp_ms: i64) -> String {
    element("screen", &[("timeStamps", timestamp_ms.to_string().as_str())])
}

fn flag_or(attrs: &HashMap<String, String>, key: &str, default: bool) -> bool {
    attrs
        .get(key)
        .map_or(default, |v| v.eq_ignore_ascii_case("true"))
}

fn bool_str(b: bool) -> &'static str {
    if b { "true" } else { "false" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_sdk_xml() {
        let xml = build_sdk_xml("abc-123", "GetDeviceInfo", "");
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains(r#"<sdk guid="abc-123"><in method="GetDeviceInfo"></in></sdk>"#));

        let escaped = build_sdk_xml("a\"b", "M", "<x/>");
        assert!(escaped.contains(r#"guid="a&quot;b""#));
        assert!(escaped.contains("<x/></in>"));
    }

    #[test]
    fn test_version_xml() {
        let xml = build_version_xml();
        assert!(xml.contains(r###"guid="##GUID""###));
        assert!(xml.contains(r#"method="GetIFVersion""#));
        assert!(xml.contains(r#"<version value="1000000"/>"#));
    }

    #[test]
    fn test_parse_response() {
        let raw = r#"<?xml version="1.0" encoding="utf-8"?>
        <sdk guid="abc-123">
          <out method="GetDeviceInfo" result="kSuccess">
            <device cpu="TI.335x" model="C16" id="C16-19-A0001" name="hall"/>
            <screen width="128" height="64" rotation="0"/>
          </out>
        </sdk>"#;

        let resp = SdkResponse::parse(raw).unwrap();
        assert_eq!(resp.guid, "abc-123");
        assert_eq!(resp.method, "GetDeviceInfo");
        assert!(resp.is_success());
        assert!(resp.inner_xml.starts_with("<device cpu=\"TI.335x\""));
        assert!(resp.inner_xml.ends_with("rotation=\"0\"/>"));
        assert_eq!(resp.raw_xml, raw);
    }

    #[test]
    fn test_parse_nested_and_empty_out() {
        let resp = SdkResponse::parse(
            r#"<sdk guid="g"><out method="GetFiles" result="kSuccess"><files><file name="a"/></files></out></sdk>"#,
        )
        .unwrap();
        assert_eq!(resp.inner_xml, r#"<files><file name="a"/></files>"#);

        let resp = SdkResponse::parse(r#"<sdk guid="g"><out method="OpenScreen" result="kSuccess"/></sdk>"#)
            .unwrap();
        assert_eq!(resp.method, "OpenScreen");
        assert_eq!(resp.inner_xml, "");
    }

    #[test]
    fn test_non_success_is_data() {
        let resp = SdkResponse::parse(
            r#"<sdk guid="g"><out method="AddProgram" result="kParseXmlFailed"/></sdk>"#,
        )
        .unwrap();
        assert!(!resp.is_success());
        assert!(matches!(
            resp.into_success(),
            Err(Error::Rejected { method, result }) if method == "AddProgram" && result == "kParseXmlFailed"
        ));
    }

    #[test]
    fn test_parse_rejects_foreign_xml() {
        assert!(matches!(SdkResponse::parse("<hello/>"), Err(Error::Xml(_))));
        assert!(SdkResponse::parse("").is_err());
    }

    #[test]
    fn test_parse_device_info() {
        let inner = r#"<device cpu="Freescale.iMax6" model="A3L" id="A3L-D20-00123" name="lobby"/>
            <version fpga="5.2" app="7.10.78.9" kernel="3.0.35"/>
            <screen width="256" height="128" rotation="90"/>"#;
        let info = parse_device_info(inner).unwrap();
        assert_eq!(info.model, "A3L");
        assert_eq!(info.device_id, "A3L-D20-00123");
        assert_eq!(info.app_version, "7.10.78.9");
        assert_eq!((info.screen_width, info.screen_height, info.screen_rotation), (256, 128, 90));

        assert_eq!(parse_device_info("").unwrap(), DeviceInfo::default());
    }

    #[test]
    fn test_time_info_roundtrip_fields() {
        let info = TimeInfo {
            timezone: "(UTC+03:00)Istanbul".into(),
            summer: true,
            sync: "none".into(),
            time: "2024-05-01 12:00:00".into(),
        };
        let xml = build_set_time_xml(&info);
        assert!(xml.contains(r#"<summer enable="true"/>"#));
        assert_eq!(parse_time_info(&xml).unwrap(), info);
    }

    #[test]
    fn test_parse_ethernet_and_lists() {
        let eth = parse_ethernet_info(
            r#"<eth valid="true"><enable value="true"/><dhcp auto="false"/>
               <address ip="192.168.6.1" netmask="255.255.255.0" gateway="192.168.6.254" dns="8.8.8.8"/></eth>"#,
        )
        .unwrap();
        assert!(eth.enabled);
        assert!(!eth.auto_dhcp);
        assert_eq!(eth.ip, "192.168.6.1");

        let files = parse_file_list(
            r#"<files><file name="a.png" size="2048" existSize="1024" md5="ff" type="image"/><file name="b.mp4"/></files>"#,
        )
        .unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].exist_size, 1024);
        assert_eq!(files[1].size, 0);

        let fonts = parse_font_list(r#"<font fontName="Arial" fileName="arial.ttf" bold="TRUE"/>"#).unwrap();
        assert_eq!(fonts[0].file_name, "arial.ttf");
        assert!(fonts[0].bold);
        assert!(!fonts[0].italic);
    }

    #[test]
    fn test_replace_guid() {
        let xml = r###"<sdk guid="##GUID"><in method="X"/></sdk>"###;
        assert_eq!(replace_guid(xml, "abc"), r#"<sdk guid="abc"><in method="X"/></sdk>"#);
        assert_eq!(replace_guid("<sdk/>", "abc"), "<sdk/>");
    }

    #[test]
    fn test_delete_files_xml() {
        assert_eq!(
            build_delete_files_xml(&["a.png", "b&c.mp4"]),
            r#"<files><file name="a.png"/><file name="b&amp;c.mp4"/></files>"#
        );
    }

    #[test]
    fn test_container() {
        assert_eq!(container("ploy", &[("enable", "true")], ""), r#"<ploy enable="true"/>"#);
        assert_eq!(container("ap", &[], "<ssid/>"), "<ap><ssid/></ap>");
    }

    #[test]
    fn test_set_ethernet_xml() {
        let xml = build_set_ethernet_xml(&EthernetInfo {
            enabled: true,
            auto_dhcp: false,
            ip: "192.168.6.1".into(),
            netmask: "255.255.255.0".into(),
            gateway: "192.168.6.254".into(),
            dns: "8.8.8.8".into(),
        });
        assert!(xml.starts_with(r#"<eth valid="true"><enable value="true"/><dhcp auto="false"/>"#));
        assert!(xml.ends_with("</eth>"));
        assert_eq!(parse_ethernet_info(&xml).unwrap().gateway, "192.168.6.254");
    }

    #[test]
    fn test_parse_wifi_sections() {
        let wifi = parse_wifi_info(
            r#"<wifi valid="true"><enable value="true"/><mode value="station"/>
               <ap><ssid value="hd-ap"/><passwd value="88888888"/><channel value="6"/><encryption value="WPA-PSK"/></ap>
               <station><ssid value="office"/><passwd value="secret"/></station></wifi>"#,
        )
        .unwrap();
        assert!(wifi.has_wifi);
        assert_eq!(wifi.mode, WifiMode::Station);
        assert_eq!(wifi.ap.ssid, "hd-ap");
        assert_eq!(wifi.ap.channel, "6");
        assert_eq!(wifi.station_ssid, "office");
        assert_eq!(wifi.station_password, "secret");

        assert!(!parse_wifi_info(r#"<wifi valid="false"/>"#).unwrap().has_wifi);
    }

    #[test]
    fn test_set_wifi_xml() {
        let xml = build_set_wifi_xml(&WifiInfo {
            mode: WifiMode::Ap,
            ap: WifiApInfo {
                ssid: "led".into(),
                password: "pw".into(),
                channel: "11".into(),
                encryption: String::new(),
            },
            ..WifiInfo::default()
        });
        assert!(xml.starts_with(r#"<mode value="ap"/><ap><ssid value="led"/>"#));
        assert!(xml.contains(r#"<encryption value="WPA-PSK"/>"#));
        assert!(xml.ends_with(r#"<station><ssid value=""/><passwd value=""/></station>"#));
    }

    #[test]
    fn test_luminance_roundtrip() {
        let info = LuminanceInfo {
            mode: LuminanceMode::Scheduled,
            default_value: 80,
            items: vec![
                LuminanceItem { enabled: true, start: "06:00:00".into(), percent: 100 },
                LuminanceItem { enabled: false, start: "22:00:00".into(), percent: 20 },
            ],
            ..LuminanceInfo::default()
        };
        let xml = build_set_luminance_xml(&info);
        assert!(xml.starts_with(r#"<mode value="ploys"/><default value="80"/><ploy>"#));
        assert!(xml.ends_with(r#"<sensor min="1" max="100" time="10"/>"#));
        assert_eq!(parse_luminance_info(&xml).unwrap(), info);
    }

    #[test]
    fn test_luminance_defaults() {
        let xml = build_set_luminance_xml(&LuminanceInfo {
            sensor_min: 0,
            sensor_max: 0,
            sensor_time: 0,
            ..LuminanceInfo::fixed(150)
        });
        assert!(xml.contains(r#"<default value="100"/><ploy/>"#));
        assert!(xml.contains(r#"<sensor min="1" max="100" time="10"/>"#));

        let parsed = parse_luminance_info(r#"<mode value="sensor"/><item start="08:00:00"/>"#).unwrap();
        assert_eq!(parsed.mode, LuminanceMode::Sensor);
        assert_eq!(parsed.default_value, 100);
        assert_eq!(parsed.items[0].percent, 100);
        assert!(parsed.items[0].enabled);
        assert_eq!(LuminanceInfo::fixed(0).default_value, 1);
    }

    #[test]
    fn test_switch_time_roundtrip() {
        let info = SwitchTimeInfo {
            open_enabled: true,
            ploy_enabled: true,
            items: vec![SwitchTimeItem {
                enabled: true,
                start: "08:00:00".into(),
                end: "22:00:00".into(),
            }],
        };
        let xml = build_set_switch_time_xml(&info);
        assert_eq!(
            xml,
            r#"<open enable="true"/><ploy enable="true"><item enable="true" start="08:00:00" end="22:00:00"/></ploy>"#
        );
        assert_eq!(parse_switch_time_info(&xml).unwrap(), info);
        assert_eq!(parse_switch_time_info("").unwrap(), SwitchTimeInfo::default());
    }

    #[test]
    fn test_logo_server_and_screen() {
        let logo = parse_boot_logo_info(r#"<logo exist="true" name="boot.png" md5="abc"/>"#).unwrap();
        assert!(logo.exists);
        assert_eq!(build_set_boot_logo_xml(&logo), r#"<logo exist="true" name="boot.png" md5="abc"/>"#);

        let server = parse_server_info(r#"<server host="led.example.com" port="9000"/>"#).unwrap();
        assert_eq!(server, ServerInfo { host: "led.example.com".into(), port: 9000 });
        assert_eq!(parse_server_info("").unwrap().port, DEFAULT_PORT);
        assert_eq!(build_set_server_xml(&server), r#"<server host="led.example.com" port="9000"/>"#);

        assert_eq!(build_empty_screen_xml(1700000000000), r#"<screen timeStamps="1700000000000"/>"#);
    }
}
