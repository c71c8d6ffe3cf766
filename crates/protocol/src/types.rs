//! Shared protocol types
//!
//! Numeric tables and configuration types for the dongle wire protocol. The
//! discriminant values are dictated by the dongle firmware and must not be
//! changed.

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};

/// Message type codes as they appear in the wire header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MessageType {
    Open = 0x01,
    Plugged = 0x02,
    Phase = 0x03,
    Unplugged = 0x04,
    Touch = 0x05,
    VideoData = 0x06,
    AudioData = 0x07,
    Command = 0x08,
    LogoType = 0x09,
    BluetoothAddress = 0x0a,
    BluetoothPin = 0x0c,
    BluetoothDeviceName = 0x0d,
    WifiDeviceName = 0x0e,
    DisconnectPhone = 0x0f,
    BluetoothPairedList = 0x12,
    ManufacturerInfo = 0x14,
    CloseDongle = 0x15,
    MultiTouch = 0x17,
    HiCarLink = 0x18,
    BoxSettings = 0x19,
    MediaData = 0x2a,
    SendFile = 0x99,
    HeartBeat = 0xaa,
    SoftwareVersion = 0xcc,
}

impl MessageType {
    /// Look up a type code; `None` for codes the driver does not know,
    /// which decode to the `Unknown` fallback variant
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0x01 => Self::Open,
            0x02 => Self::Plugged,
            0x03 => Self::Phase,
            0x04 => Self::Unplugged,
            0x05 => Self::Touch,
            0x06 => Self::VideoData,
            0x07 => Self::AudioData,
            0x08 => Self::Command,
            0x09 => Self::LogoType,
            0x0a => Self::BluetoothAddress,
            0x0c => Self::BluetoothPin,
            0x0d => Self::BluetoothDeviceName,
            0x0e => Self::WifiDeviceName,
            0x0f => Self::DisconnectPhone,
            0x12 => Self::BluetoothPairedList,
            0x14 => Self::ManufacturerInfo,
            0x15 => Self::CloseDongle,
            0x17 => Self::MultiTouch,
            0x18 => Self::HiCarLink,
            0x19 => Self::BoxSettings,
            0x2a => Self::MediaData,
            0x99 => Self::SendFile,
            0xaa => Self::HeartBeat,
            0xcc => Self::SoftwareVersion,
            _ => return None,
        })
    }
}

/// Command ids carried by `Command` messages, both directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum CommandId {
    Invalid = 0,
    StartRecordAudio = 1,
    StopRecordAudio = 2,
    RequestHostUi = 3,
    Siri = 5,
    Mic = 7,
    Frame = 12,
    BoxMic = 15,
    EnableNightMode = 16,
    DisableNightMode = 17,
    AudioTransferOn = 22,
    AudioTransferOff = 23,
    Wifi24g = 24,
    Wifi5g = 25,
    Left = 100,
    Right = 101,
    SelectDown = 104,
    SelectUp = 105,
    Back = 106,
    Up = 113,
    Down = 114,
    Home = 200,
    Play = 201,
    Pause = 202,
    PlayOrPause = 203,
    Next = 204,
    Prev = 205,
    AcceptPhone = 300,
    RejectPhone = 301,
    RequestVideoFocus = 500,
    ReleaseVideoFocus = 501,
    WifiEnable = 1000,
    AutoConnectEnable = 1001,
    WifiConnect = 1002,
    ScanningDevice = 1003,
    DeviceFound = 1004,
    DeviceNotFound = 1005,
    ConnectDeviceFailed = 1006,
    BtConnected = 1007,
    BtDisconnected = 1008,
    WifiConnected = 1009,
    WifiDisconnected = 1010,
    BtPairStart = 1011,
    WifiPair = 1012,
}

impl CommandId {
    pub fn from_value(value: u32) -> Result<Self> {
        Ok(match value {
            0 => Self::Invalid,
            1 => Self::StartRecordAudio,
            2 => Self::StopRecordAudio,
            3 => Self::RequestHostUi,
            5 => Self::Siri,
            7 => Self::Mic,
            12 => Self::Frame,
            15 => Self::BoxMic,
            16 => Self::EnableNightMode,
            17 => Self::DisableNightMode,
            22 => Self::AudioTransferOn,
            23 => Self::AudioTransferOff,
            24 => Self::Wifi24g,
            25 => Self::Wifi5g,
            100 => Self::Left,
            101 => Self::Right,
            104 => Self::SelectDown,
            105 => Self::SelectUp,
            106 => Self::Back,
            113 => Self::Up,
            114 => Self::Down,
            200 => Self::Home,
            201 => Self::Play,
            202 => Self::Pause,
            203 => Self::PlayOrPause,
            204 => Self::Next,
            205 => Self::Prev,
            300 => Self::AcceptPhone,
            301 => Self::RejectPhone,
            500 => Self::RequestVideoFocus,
            501 => Self::ReleaseVideoFocus,
            1000 => Self::WifiEnable,
            1001 => Self::AutoConnectEnable,
            1002 => Self::WifiConnect,
            1003 => Self::ScanningDevice,
            1004 => Self::DeviceFound,
            1005 => Self::DeviceNotFound,
            1006 => Self::ConnectDeviceFailed,
            1007 => Self::BtConnected,
            1008 => Self::BtDisconnected,
            1009 => Self::WifiConnected,
            1010 => Self::WifiDisconnected,
            1011 => Self::BtPairStart,
            1012 => Self::WifiPair,
            _ => {
                return Err(ProtocolError::InvalidField {
                    kind: "command",
                    field: "id",
                    value,
                });
            }
        })
    }
}

/// Phone/projection session type reported by `Plugged` messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum PhoneType {
    AndroidMirror = 1,
    CarPlay = 3,
    IPhoneMirror = 4,
    AndroidAuto = 5,
    HiCar = 6,
}

impl PhoneType {
    pub fn from_value(value: u32) -> Result<Self> {
        match value {
            1 => Ok(Self::AndroidMirror),
            3 => Ok(Self::CarPlay),
            4 => Ok(Self::IPhoneMirror),
            5 => Ok(Self::AndroidAuto),
            6 => Ok(Self::HiCar),
            _ => Err(ProtocolError::InvalidField {
                kind: "plugged",
                field: "phone_type",
                value,
            }),
        }
    }
}

/// Single-touch actions (wire values of the `Touch` message)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum TouchAction {
    Down = 14,
    Move = 15,
    Up = 16,
}

impl TouchAction {
    pub fn from_value(value: u32) -> Result<Self> {
        match value {
            14 => Ok(Self::Down),
            15 => Ok(Self::Move),
            16 => Ok(Self::Up),
            _ => Err(ProtocolError::InvalidField {
                kind: "touch",
                field: "action",
                value,
            }),
        }
    }
}

/// Per-point actions of the `MultiTouch` message (different value space
/// than [`TouchAction`])
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum MultiTouchAction {
    Up = 0,
    Down = 1,
    Move = 2,
}

impl MultiTouchAction {
    pub fn from_value(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Self::Up),
            1 => Ok(Self::Down),
            2 => Ok(Self::Move),
            _ => Err(ProtocolError::InvalidField {
                kind: "multi_touch",
                field: "action",
                value,
            }),
        }
    }
}

/// One contact point of a multi-touch event
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    /// Normalized x in 0.0..=1.0
    pub x: f32,
    /// Normalized y in 0.0..=1.0
    pub y: f32,
    pub action: MultiTouchAction,
    pub id: u32,
}

/// Audio control sub-commands carried in 1-byte `AudioData` payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AudioCommand {
    OutputStart = 1,
    OutputStop = 2,
    InputConfig = 3,
    PhonecallStart = 4,
    PhonecallStop = 5,
    NaviStart = 6,
    NaviStop = 7,
    SiriStart = 8,
    SiriStop = 9,
    MediaStart = 10,
    MediaStop = 11,
    AlertStart = 12,
    AlertStop = 13,
}

impl AudioCommand {
    pub fn from_value(value: u8) -> Result<Self> {
        Ok(match value {
            1 => Self::OutputStart,
            2 => Self::OutputStop,
            3 => Self::InputConfig,
            4 => Self::PhonecallStart,
            5 => Self::PhonecallStop,
            6 => Self::NaviStart,
            7 => Self::NaviStop,
            8 => Self::SiriStart,
            9 => Self::SiriStop,
            10 => Self::MediaStart,
            11 => Self::MediaStop,
            12 => Self::AlertStart,
            13 => Self::AlertStop,
            _ => {
                return Err(ProtocolError::InvalidField {
                    kind: "audio",
                    field: "command",
                    value: value as u32,
                });
            }
        })
    }
}

/// PCM format implied by an `AudioData` decode_type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub frequency: u32,
    pub channels: u8,
    pub bit_depth: u8,
}

impl AudioFormat {
    /// Format table indexed by decode_type; values observed from dongle
    /// firmware
    pub fn for_decode_type(decode_type: u32) -> Option<AudioFormat> {
        let (frequency, channels) = match decode_type {
            1 | 2 => (44_100, 2),
            3 => (8_000, 1),
            4 => (48_000, 2),
            5 => (16_000, 1),
            6 => (24_000, 1),
            7 => (16_000, 2),
            _ => return None,
        };
        Some(AudioFormat {
            frequency,
            channels,
            bit_depth: 16,
        })
    }
}

/// Home-bar logo variants selectable via `LogoType`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum LogoType {
    HomeButton = 1,
    Siri = 2,
}

/// Drive-hand orientation sent during the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandDrive {
    Left,
    Right,
}

impl HandDrive {
    pub fn wire_value(self) -> u32 {
        match self {
            HandDrive::Left => 0,
            HandDrive::Right => 1,
        }
    }
}

/// Wifi band the dongle should offer to the phone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WifiBand {
    #[serde(rename = "2.4ghz")]
    Band24,
    #[serde(rename = "5ghz")]
    Band5,
}

/// Which microphone feeds call/Siri audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MicSource {
    /// Host operating system microphone, captured by us and sent as audio
    /// messages
    Os,
    /// Microphone built into the dongle
    Box,
}

/// Virtual file paths the dongle accepts via `SendFile`
pub mod file_address {
    pub const DPI: &str = "/tmp/screen_dpi";
    pub const NIGHT_MODE: &str = "/tmp/night_mode";
    pub const HAND_DRIVE_MODE: &str = "/tmp/hand_drive_mode";
    pub const CHARGE_MODE: &str = "/tmp/charge_mode";
    pub const BOX_NAME: &str = "/etc/box_name";
    pub const OEM_ICON: &str = "/etc/oem_icon.png";
    pub const AIRPLAY_CONFIG: &str = "/etc/airplay.conf";
    pub const ANDROID_WORK_MODE: &str = "/etc/android_work_mode";
}

/// Session parameters supplied by the caller at `start()`
///
/// Immutable for the lifetime of a streaming session. Field defaults match
/// the values the dongle firmware was tuned against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Projection width in pixels
    pub width: u32,
    /// Projection height in pixels
    pub height: u32,
    /// Target frames per second
    pub fps: u32,
    /// Screen density reported to the phone
    pub dpi: u32,
    /// Video format selector (firmware-defined)
    pub format: u32,
    /// Maximum transfer packet size in bytes
    pub packet_max: u32,
    /// Dongle protocol generation
    pub ibox_version: u32,
    /// Phone work mode selector (firmware-defined)
    pub phone_work_mode: u32,
    /// Name the dongle advertises over bluetooth/wifi
    pub box_name: String,
    pub night_mode: bool,
    pub hand_drive: HandDrive,
    /// Audio/video sync delay in milliseconds
    pub media_delay: u32,
    /// Route phone-call audio through the dongle instead of the host
    pub audio_transfer_mode: bool,
    pub wifi_band: WifiBand,
    pub mic_source: MicSource,
    /// Android Auto work mode; `None` leaves the dongle default untouched
    pub android_work_mode: Option<bool>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 640,
            fps: 20,
            dpi: 160,
            format: 5,
            packet_max: 49_152,
            ibox_version: 2,
            phone_work_mode: 2,
            box_name: "nodePlay".to_string(),
            night_mode: false,
            hand_drive: HandDrive::Left,
            media_delay: 300,
            audio_transfer_mode: false,
            wifi_band: WifiBand::Band5,
            mic_source: MicSource::Os,
            android_work_mode: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_roundtrip() {
        for code in [0x01u32, 0x06, 0x07, 0x17, 0x99, 0xaa, 0xcc] {
            let ty = MessageType::from_code(code).unwrap();
            assert_eq!(ty as u32, code);
        }
    }

    #[test]
    fn test_message_type_unknown() {
        assert_eq!(MessageType::from_code(0x26), None);
        assert_eq!(MessageType::from_code(0xffff), None);
    }

    #[test]
    fn test_command_id_lookup() {
        assert_eq!(CommandId::from_value(1000).unwrap(), CommandId::WifiEnable);
        assert_eq!(CommandId::from_value(25).unwrap(), CommandId::Wifi5g);
        assert!(CommandId::from_value(9999).is_err());
    }

    #[test]
    fn test_audio_format_table() {
        let fmt = AudioFormat::for_decode_type(5).unwrap();
        assert_eq!(fmt.frequency, 16_000);
        assert_eq!(fmt.channels, 1);
        assert_eq!(fmt.bit_depth, 16);
        assert!(AudioFormat::for_decode_type(0).is_none());
        assert!(AudioFormat::for_decode_type(8).is_none());
    }

    #[test]
    fn test_config_defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.width, 800);
        assert_eq!(config.height, 640);
        assert_eq!(config.packet_max, 49_152);
        assert_eq!(config.hand_drive, HandDrive::Left);
        assert_eq!(config.android_work_mode, None);
    }

    #[test]
    fn test_config_toml_partial() {
        let config: ConnectionConfig =
            toml::from_str("width = 1280\nheight = 720\nwifi_band = \"2.4ghz\"").unwrap();
        assert_eq!(config.width, 1280);
        assert_eq!(config.height, 720);
        assert_eq!(config.wifi_band, WifiBand::Band24);
        // untouched fields keep their defaults
        assert_eq!(config.fps, 20);
    }
}
