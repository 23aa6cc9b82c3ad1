/// Command codes, device result codes, SDK method names and upload file types.
/// Every TCP frame carries its command code in bytes [2..4) (little-endian).
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Command type of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CmdType(pub u16);

impl CmdType {
    pub const HEARTBEAT_ASK: CmdType = CmdType(0x005F);
    pub const HEARTBEAT_ANSWER: CmdType = CmdType(0x0060);
    pub const SEARCH_DEVICE_ASK: CmdType = CmdType(0x1001);
    pub const SEARCH_DEVICE_ANSWER: CmdType = CmdType(0x1002);
    pub const ERROR_ANSWER: CmdType = CmdType(0x2000);
    pub const VERSION_ASK: CmdType = CmdType(0x2001);
    pub const VERSION_ANSWER: CmdType = CmdType(0x2002);
    pub const SDK_CMD_ASK: CmdType = CmdType(0x2003);
    pub const SDK_CMD_ANSWER: CmdType = CmdType(0x2004);
    pub const FILE_START_ASK: CmdType = CmdType(0x8001);
    pub const FILE_START_ANSWER: CmdType = CmdType(0x8002);
    pub const FILE_CONTENT_ASK: CmdType = CmdType(0x8003);
    pub const FILE_CONTENT_ANSWER: CmdType = CmdType(0x8004);
    pub const FILE_END_ASK: CmdType = CmdType(0x8005);
    pub const FILE_END_ANSWER: CmdType = CmdType(0x8006);

    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            CmdType::HEARTBEAT_ASK => "HeartbeatAsk",
            CmdType::HEARTBEAT_ANSWER => "HeartbeatAnswer",
            CmdType::SEARCH_DEVICE_ASK => "SearchDeviceAsk",
            CmdType::SEARCH_DEVICE_ANSWER => "SearchDeviceAnswer",
            CmdType::ERROR_ANSWER => "ErrorAnswer",
            CmdType::VERSION_ASK => "VersionAsk",
            CmdType::VERSION_ANSWER => "VersionAnswer",
            CmdType::SDK_CMD_ASK => "SdkCmdAsk",
            CmdType::SDK_CMD_ANSWER => "SdkCmdAnswer",
            CmdType::FILE_START_ASK => "FileStartAsk",
            CmdType::FILE_START_ANSWER => "FileStartAnswer",
            CmdType::FILE_CONTENT_ASK => "FileContentAsk",
            CmdType::FILE_CONTENT_ANSWER => "FileContentAnswer",
            CmdType::FILE_END_ASK => "FileEndAsk",
            CmdType::FILE_END_ANSWER => "FileEndAnswer",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for CmdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "Unknown(0x{:04X})", self.0),
        }
    }
}

/// Result code carried by error answers and file-transfer answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    pub const SUCCESS: ErrorCode = ErrorCode(0);
    pub const WRITE_FINISH: ErrorCode = ErrorCode(1);
    pub const PROCESS_ERROR: ErrorCode = ErrorCode(2);
    pub const VERSION_TOO_LOW: ErrorCode = ErrorCode(3);
    pub const DEVICE_OCCUPIED: ErrorCode = ErrorCode(4);
    pub const FILE_OCCUPIED: ErrorCode = ErrorCode(5);
    pub const INVALID_PACKET_LEN: ErrorCode = ErrorCode(7);
    pub const INVALID_PARAM: ErrorCode = ErrorCode(8);
    pub const NOT_SPACE_TO_SAVE: ErrorCode = ErrorCode(9);
    pub const WRITE_FILE_FAILED: ErrorCode = ErrorCode(11);
    pub const FILE_NOT_FINISH: ErrorCode = ErrorCode(19);
    pub const PARSE_XML_FAILED: ErrorCode = ErrorCode(22);
    pub const INVALID_METHOD: ErrorCode = ErrorCode(23);
    pub const INVALID_GUID: ErrorCode = ErrorCode(43);

    pub fn is_success(self) -> bool {
        self == ErrorCode::SUCCESS
    }

    pub fn description(self) -> &'static str {
        match self.0 {
            0 => "success",
            1 => "file write finished",
            2 => "process error",
            3 => "protocol version too low",
            4 => "device occupied by another client",
            5 => "file occupied",
            6 => "too many file read requests",
            7 => "invalid packet length",
            8 => "invalid parameter",
            9 => "not enough space to save",
            10 => "create file failed",
            11 => "write file failed",
            12 => "read file failed",
            13 => "invalid file data",
            14 => "file content error",
            15 => "open file failed",
            16 => "seek file failed",
            17 => "rename failed",
            18 => "file not found",
            19 => "file not finished",
            20 => "XML command too long",
            21 => "invalid XML index",
            22 => "parse XML failed",
            23 => "invalid method",
            24 => "memory failure",
            25 => "system error",
            26 => "unsupported video",
            27 => "not a media file",
            28 => "parse video failed",
            29 => "unsupported frame rate",
            30 => "unsupported resolution",
            31 => "unsupported format",
            32 => "unsupported duration",
            33 => "download failed",
            34 => "screen node missing",
            35 => "node exists",
            36 => "node does not exist",
            37 => "plugin does not exist",
            38 => "license check failed",
            39 => "wifi module not found",
            40 => "wifi test failed",
            41 => "running error",
            42 => "unsupported method",
            43 => "invalid GUID",
            44 => "firmware format error",
            45 => "tag not found",
            46 => "attribute not found",
            47 => "create tag failed",
            48 => "unsupported device",
            49 => "permission denied",
            50 => "password too simple",
            _ => "unknown error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error {} ({})", self.0, self.description())
    }
}

/// SDK method names used in `<in method="...">`.
pub mod method {
    pub const GET_IF_VERSION: &str = "GetIFVersion";
    pub const GET_DEVICE_INFO: &str = "GetDeviceInfo";
    pub const GET_ETH0_INFO: &str = "GetEth0Info";
    pub const SET_ETH0_INFO: &str = "SetEth0Info";
    pub const GET_WIFI_INFO: &str = "GetWifiInfo";
    pub const SET_WIFI_INFO: &str = "SetWifiInfo";
    pub const GET_TIME_INFO: &str = "GetTimeInfo";
    pub const SET_TIME_INFO: &str = "SetTimeInfo";
    pub const GET_LUMINANCE_PLOY: &str = "GetLuminancePloy";
    pub const SET_LUMINANCE_PLOY: &str = "SetLuminancePloy";
    pub const GET_SWITCH_TIME: &str = "GetSwitchTime";
    pub const SET_SWITCH_TIME: &str = "SetSwitchTime";
    pub const OPEN_SCREEN: &str = "OpenScreen";
    pub const CLOSE_SCREEN: &str = "CloseScreen";
    pub const GET_BOOT_LOGO: &str = "GetBootLogo";
    pub const SET_BOOT_LOGO_NAME: &str = "SetBootLogoName";
    pub const CLEAR_BOOT_LOGO: &str = "ClearBootLogo";
    pub const GET_SDK_TCP_SERVER: &str = "GetSDKTcpServer";
    pub const SET_SDK_TCP_SERVER: &str = "SetSDKTcpServer";
    pub const GET_FILES: &str = "GetFiles";
    pub const DELETE_FILES: &str = "DeleteFiles";
    pub const GET_ALL_FONT_INFO: &str = "GetAllFontInfo";
    pub const ADD_PROGRAM: &str = "AddProgram";
}

/// Storage class announced in the file-start frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    Image,
    Video,
    Font,
    Firmware,
    FpgaConfig,
    SettingConfig,
    ProgramXml,
    TempImage,
    TempVideo,
}

impl FileType {
    pub fn code(self) -> u16 {
        match self {
            FileType::Image => 0,
            FileType::Video => 1,
            FileType::Font => 2,
            FileType::Firmware => 3,
            FileType::FpgaConfig => 4,
            FileType::SettingConfig => 5,
            FileType::ProgramXml => 9,
            FileType::TempImage => 128,
            FileType::TempVideo => 129,
        }
    }

    /// Classify by extension. Anything unrecognised uploads as an image.
    pub fn detect(path: &Path) -> FileType {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "bmp" | "jpg" | "jpeg" | "png" | "ico" | "gif" | "tif" | "tiff" => FileType::Image,
            "mp4" | "avi" | "mkv" | "flv" | "mov" | "wmv" | "mp3" | "swf" | "f4v" | "trp"
            | "asf" | "mpeg" | "webm" | "asx" | "rm" | "rmvb" | "3gp" | "m4v" | "dat" | "vob"
            | "ts" => FileType::Video,
            "ttf" | "ttc" | "bdf" => FileType::Font,
            "bin" => FileType::Firmware,
            "xml" => {
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_ascii_lowercase)
                    .unwrap_or_default();
                match name.as_str() {
                    "fpga.xml" => FileType::FpgaConfig,
                    "config.xml" => FileType::SettingConfig,
                    _ => FileType::ProgramXml,
                }
            }
            _ => FileType::Image,
        }
    }
}

impl FromStr for FileType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" | "img" => Ok(FileType::Image),
            "video" => Ok(FileType::Video),
            "font" => Ok(FileType::Font),
            "firmware" | "fw" => Ok(FileType::Firmware),
            "fpga" => Ok(FileType::FpgaConfig),
            "setting" | "config" => Ok(FileType::SettingConfig),
            "program" | "xml" => Ok(FileType::ProgramXml),
            "temp-image" => Ok(FileType::TempImage),
            "temp-video" => Ok(FileType::TempVideo),
            _ => Err(format!("Unknown file type: {s}")),
        }
    }
}
