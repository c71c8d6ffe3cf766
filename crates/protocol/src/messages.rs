//! Protocol message definitions
//!
//! One [`Message`] variant per wire type code. Inbound variants are decoded
//! from dongle bytes; outbound variants serialize via
//! [`Message::wire_payload`]. A few types (`Open`, `Command`, `AudioData`,
//! `HeartBeat`, `BoxSettings`) travel in both directions with the same
//! layout. All numeric fields are little-endian; see each variant for its
//! payload layout.

use crate::error::{ProtocolError, Result};
use crate::types::{
    AudioCommand, CommandId, ConnectionConfig, LogoType, MessageType, MultiTouchAction, PhoneType,
    TouchAction, TouchPoint, file_address,
};
use byteorder::{ByteOrder, LittleEndian};
use std::time::{SystemTime, UNIX_EPOCH};

/// Touch coordinates are scaled to this range on the wire
const TOUCH_SCALE: f32 = 10_000.0;

/// `Open` handshake parameters; same 28-byte layout outbound (request) and
/// inbound (dongle acknowledgement)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenInfo {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub format: u32,
    pub packet_max: u32,
    pub ibox_version: u32,
    pub phone_work_mode: u32,
}

impl From<&ConnectionConfig> for OpenInfo {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            fps: config.fps,
            format: config.format,
            packet_max: config.packet_max,
            ibox_version: config.ibox_version,
            phone_work_mode: config.phone_work_mode,
        }
    }
}

/// One compressed video frame from the dongle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub flags: u32,
    /// Declared frame byte count (firmware does not always match `data.len()`)
    pub length: u32,
    pub unknown: u32,
    /// Compressed bitstream, fed to an external decoder
    pub data: Vec<u8>,
}

/// Body of an `AudioData` message, discriminated by payload length
#[derive(Debug, Clone, PartialEq)]
pub enum AudioBody {
    /// 1-byte control payload
    Command(AudioCommand),
    /// 4-byte volume ramp duration
    VolumeDuration(f32),
    /// Raw S16LE PCM samples
    Pcm(Vec<u8>),
}

/// An `AudioData` message, either direction
///
/// Layout: decode_type u32, volume f32, audio_type u32, then the body.
/// Mic capture to the dongle uses decode_type 5, volume 0.0, audio_type 3.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioPacket {
    /// Index into the audio format table ([`crate::AudioFormat`])
    pub decode_type: u32,
    pub volume: f32,
    pub audio_type: u32,
    pub body: AudioBody,
}

/// `MediaData` payload, discriminated by a leading media-type word
#[derive(Debug, Clone, PartialEq)]
pub enum MediaPayload {
    /// Now-playing metadata as JSON (media_type 1)
    Metadata(serde_json::Value),
    /// Album art image bytes (media_type 3)
    AlbumCover(Vec<u8>),
}

/// Every message the driver can receive from or send to the dongle
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Session handshake; outbound carries the requested parameters, inbound
    /// echoes what the dongle accepted
    Open(OpenInfo),
    /// A phone connected to the dongle
    Plugged {
        phone_type: PhoneType,
        /// Present only in the 8-byte form of the payload
        wifi: Option<u32>,
    },
    /// Connection phase indicator
    Phase(u32),
    /// The phone disconnected
    Unplugged,
    /// Single-touch input (outbound); x/y normalized to 0.0..=1.0
    Touch {
        action: TouchAction,
        x: f32,
        y: f32,
    },
    /// Compressed video frame (inbound)
    Video(VideoFrame),
    /// Audio payload or audio control (either direction)
    Audio(AudioPacket),
    /// Generic command code (either direction)
    Command(CommandId),
    /// Home-bar logo selection (outbound)
    Logo(LogoType),
    /// Dongle bluetooth MAC as ASCII (inbound)
    BluetoothAddress(String),
    /// Bluetooth pairing PIN (inbound)
    BluetoothPin(String),
    /// Bluetooth device name (inbound)
    BluetoothDeviceName(String),
    /// Wifi SSID the dongle advertises (inbound)
    WifiDeviceName(String),
    /// Ask the dongle to drop the phone session (outbound)
    DisconnectPhone,
    /// Known bluetooth pairings dump (inbound)
    BluetoothPairedList(String),
    /// Two opaque firmware words (inbound)
    ManufacturerInfo { a: u32, b: u32 },
    /// Power down the dongle (outbound)
    CloseDongle,
    /// Multi-touch input (outbound)
    MultiTouch(Vec<TouchPoint>),
    /// HiCar pairing link URL (inbound)
    HiCarLink(String),
    /// Dongle settings JSON; outbound carries ours, inbound the dongle's
    BoxSettings(serde_json::Value),
    /// Media metadata or album art (inbound)
    Media(MediaPayload),
    /// Write a virtual file on the dongle (outbound)
    SendFile { path: String, content: Vec<u8> },
    /// Keep-alive, empty payload (outbound, periodic)
    Heartbeat,
    /// Firmware version string (inbound)
    SoftwareVersion(String),
    /// Structurally valid frame whose type code we do not know; raw payload
    /// preserved for forward compatibility
    Unknown { type_code: u32, payload: Vec<u8> },
}

fn read_u32(kind: &'static str, payload: &[u8], offset: usize) -> Result<u32> {
    let end = offset + 4;
    if payload.len() < end {
        return Err(ProtocolError::TruncatedPayload {
            kind,
            needed: end,
            got: payload.len(),
        });
    }
    Ok(LittleEndian::read_u32(&payload[offset..end]))
}

fn read_f32(kind: &'static str, payload: &[u8], offset: usize) -> Result<f32> {
    read_u32(kind, payload, offset).map(f32::from_bits)
}

fn read_string(kind: &'static str, payload: &[u8]) -> Result<String> {
    std::str::from_utf8(payload)
        .map(str::to_owned)
        .map_err(|source| ProtocolError::InvalidString { kind, source })
}

fn clamp_touch(value: f32) -> u32 {
    (value * TOUCH_SCALE).round().clamp(0.0, TOUCH_SCALE) as u32
}

impl Message {
    /// Wire type code of this message
    pub fn type_code(&self) -> u32 {
        match self {
            Message::Open(_) => MessageType::Open as u32,
            Message::Plugged { .. } => MessageType::Plugged as u32,
            Message::Phase(_) => MessageType::Phase as u32,
            Message::Unplugged => MessageType::Unplugged as u32,
            Message::Touch { .. } => MessageType::Touch as u32,
            Message::Video(_) => MessageType::VideoData as u32,
            Message::Audio(_) => MessageType::AudioData as u32,
            Message::Command(_) => MessageType::Command as u32,
            Message::Logo(_) => MessageType::LogoType as u32,
            Message::BluetoothAddress(_) => MessageType::BluetoothAddress as u32,
            Message::BluetoothPin(_) => MessageType::BluetoothPin as u32,
            Message::BluetoothDeviceName(_) => MessageType::BluetoothDeviceName as u32,
            Message::WifiDeviceName(_) => MessageType::WifiDeviceName as u32,
            Message::DisconnectPhone => MessageType::DisconnectPhone as u32,
            Message::BluetoothPairedList(_) => MessageType::BluetoothPairedList as u32,
            Message::ManufacturerInfo { .. } => MessageType::ManufacturerInfo as u32,
            Message::CloseDongle => MessageType::CloseDongle as u32,
            Message::MultiTouch(_) => MessageType::MultiTouch as u32,
            Message::HiCarLink(_) => MessageType::HiCarLink as u32,
            Message::BoxSettings(_) => MessageType::BoxSettings as u32,
            Message::Media(_) => MessageType::MediaData as u32,
            Message::SendFile { .. } => MessageType::SendFile as u32,
            Message::Heartbeat => MessageType::HeartBeat as u32,
            Message::SoftwareVersion(_) => MessageType::SoftwareVersion as u32,
            Message::Unknown { type_code, .. } => *type_code,
        }
    }

    /// Short variant name, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Open(_) => "open",
            Message::Plugged { .. } => "plugged",
            Message::Phase(_) => "phase",
            Message::Unplugged => "unplugged",
            Message::Touch { .. } => "touch",
            Message::Video(_) => "video",
            Message::Audio(_) => "audio",
            Message::Command(_) => "command",
            Message::Logo(_) => "logo",
            Message::BluetoothAddress(_) => "bluetooth_address",
            Message::BluetoothPin(_) => "bluetooth_pin",
            Message::BluetoothDeviceName(_) => "bluetooth_device_name",
            Message::WifiDeviceName(_) => "wifi_device_name",
            Message::DisconnectPhone => "disconnect_phone",
            Message::BluetoothPairedList(_) => "bluetooth_paired_list",
            Message::ManufacturerInfo { .. } => "manufacturer_info",
            Message::CloseDongle => "close_dongle",
            Message::MultiTouch(_) => "multi_touch",
            Message::HiCarLink(_) => "hicar_link",
            Message::BoxSettings(_) => "box_settings",
            Message::Media(_) => "media",
            Message::SendFile { .. } => "send_file",
            Message::Heartbeat => "heartbeat",
            Message::SoftwareVersion(_) => "software_version",
            Message::Unknown { .. } => "unknown",
        }
    }

    /// Parse a payload for the given type code
    ///
    /// Unrecognized type codes succeed as [`Message::Unknown`]; malformed
    /// payloads of known types fail, which the reader treats as a dropped
    /// frame, never a stream error.
    pub fn from_wire(type_code: u32, payload: &[u8]) -> Result<Message> {
        let Some(message_type) = MessageType::from_code(type_code) else {
            return Ok(Message::Unknown {
                type_code,
                payload: payload.to_vec(),
            });
        };

        Ok(match message_type {
            MessageType::Open => Message::Open(OpenInfo {
                width: read_u32("open", payload, 0)?,
                height: read_u32("open", payload, 4)?,
                fps: read_u32("open", payload, 8)?,
                format: read_u32("open", payload, 12)?,
                packet_max: read_u32("open", payload, 16)?,
                ibox_version: read_u32("open", payload, 20)?,
                phone_work_mode: read_u32("open", payload, 24)?,
            }),
            MessageType::Plugged => {
                let phone_type = PhoneType::from_value(read_u32("plugged", payload, 0)?)?;
                let wifi = if payload.len() == 8 {
                    Some(read_u32("plugged", payload, 4)?)
                } else {
                    None
                };
                Message::Plugged { phone_type, wifi }
            }
            MessageType::Phase => Message::Phase(read_u32("phase", payload, 0)?),
            MessageType::Unplugged => Message::Unplugged,
            MessageType::Touch => {
                let action = TouchAction::from_value(read_u32("touch", payload, 0)?)?;
                let x = read_u32("touch", payload, 4)? as f32 / TOUCH_SCALE;
                let y = read_u32("touch", payload, 8)? as f32 / TOUCH_SCALE;
                Message::Touch { action, x, y }
            }
            MessageType::VideoData => {
                let data = payload.get(20..).ok_or(ProtocolError::TruncatedPayload {
                    kind: "video",
                    needed: 20,
                    got: payload.len(),
                })?;
                Message::Video(VideoFrame {
                    width: read_u32("video", payload, 0)?,
                    height: read_u32("video", payload, 4)?,
                    flags: read_u32("video", payload, 8)?,
                    length: read_u32("video", payload, 12)?,
                    unknown: read_u32("video", payload, 16)?,
                    data: data.to_vec(),
                })
            }
            MessageType::AudioData => Message::Audio(parse_audio(payload)?),
            MessageType::Command => {
                Message::Command(CommandId::from_value(read_u32("command", payload, 0)?)?)
            }
            MessageType::LogoType => match read_u32("logo", payload, 0)? {
                1 => Message::Logo(LogoType::HomeButton),
                2 => Message::Logo(LogoType::Siri),
                value => {
                    return Err(ProtocolError::InvalidField {
                        kind: "logo",
                        field: "logo_type",
                        value,
                    });
                }
            },
            MessageType::BluetoothAddress => {
                Message::BluetoothAddress(read_string("bluetooth_address", payload)?)
            }
            MessageType::BluetoothPin => {
                Message::BluetoothPin(read_string("bluetooth_pin", payload)?)
            }
            MessageType::BluetoothDeviceName => {
                Message::BluetoothDeviceName(read_string("bluetooth_device_name", payload)?)
            }
            MessageType::WifiDeviceName => {
                Message::WifiDeviceName(read_string("wifi_device_name", payload)?)
            }
            MessageType::DisconnectPhone => Message::DisconnectPhone,
            MessageType::BluetoothPairedList => {
                Message::BluetoothPairedList(read_string("bluetooth_paired_list", payload)?)
            }
            MessageType::ManufacturerInfo => Message::ManufacturerInfo {
                a: read_u32("manufacturer_info", payload, 0)?,
                b: read_u32("manufacturer_info", payload, 4)?,
            },
            MessageType::CloseDongle => Message::CloseDongle,
            MessageType::MultiTouch => Message::MultiTouch(parse_multi_touch(payload)?),
            MessageType::HiCarLink => Message::HiCarLink(read_string("hicar_link", payload)?),
            MessageType::BoxSettings => Message::BoxSettings(serde_json::from_slice(payload)?),
            MessageType::MediaData => Message::Media(parse_media(payload)?),
            MessageType::SendFile => parse_send_file(payload)?,
            MessageType::HeartBeat => Message::Heartbeat,
            MessageType::SoftwareVersion => {
                Message::SoftwareVersion(read_string("software_version", payload)?)
            }
        })
    }

    /// Serialize the payload of an outbound (or bidirectional) message
    ///
    /// Inbound-only variants fail with
    /// [`ProtocolError::NotEncodable`]; the driver never re-emits them.
    pub fn wire_payload(&self) -> Result<Vec<u8>> {
        match self {
            Message::Open(info) => {
                let mut buf = Vec::with_capacity(28);
                for value in [
                    info.width,
                    info.height,
                    info.fps,
                    info.format,
                    info.packet_max,
                    info.ibox_version,
                    info.phone_work_mode,
                ] {
                    buf.extend_from_slice(&(value).to_le_bytes());
                }
                Ok(buf)
            }
            Message::Touch { action, x, y } => {
                let mut buf = Vec::with_capacity(16);
                buf.extend_from_slice(&(*action as u32).to_le_bytes());
                buf.extend_from_slice(&clamp_touch(*x).to_le_bytes());
                buf.extend_from_slice(&clamp_touch(*y).to_le_bytes());
                buf.extend_from_slice(&0u32.to_le_bytes());
                Ok(buf)
            }
            Message::MultiTouch(points) => {
                let mut buf = Vec::with_capacity(points.len() * 16);
                for point in points {
                    buf.extend_from_slice(&(point.x).to_le_bytes());
                    buf.extend_from_slice(&(point.y).to_le_bytes());
                    buf.extend_from_slice(&(point.action as u32).to_le_bytes());
                    buf.extend_from_slice(&(point.id).to_le_bytes());
                }
                Ok(buf)
            }
            Message::Audio(packet) => {
                let mut buf = Vec::with_capacity(16);
                buf.extend_from_slice(&(packet.decode_type).to_le_bytes());
                buf.extend_from_slice(&(packet.volume).to_le_bytes());
                buf.extend_from_slice(&(packet.audio_type).to_le_bytes());
                match &packet.body {
                    AudioBody::Command(command) => buf.push(*command as u8),
                    AudioBody::VolumeDuration(duration) => {
                        buf.extend_from_slice(&(*duration).to_le_bytes());
                    }
                    AudioBody::Pcm(samples) => buf.extend_from_slice(samples),
                }
                Ok(buf)
            }
            Message::Command(id) => {
                let mut buf = Vec::with_capacity(4);
                buf.extend_from_slice(&(*id as u32).to_le_bytes());
                Ok(buf)
            }
            Message::Logo(logo) => {
                let mut buf = Vec::with_capacity(4);
                buf.extend_from_slice(&(*logo as u32).to_le_bytes());
                Ok(buf)
            }
            Message::SendFile { path, content } => {
                let mut name = path.clone().into_bytes();
                name.push(0);
                let mut buf = Vec::with_capacity(8 + name.len() + content.len());
                buf.extend_from_slice(&(name.len() as u32).to_le_bytes());
                buf.extend_from_slice(&name);
                buf.extend_from_slice(&(content.len() as u32).to_le_bytes());
                buf.extend_from_slice(content);
                Ok(buf)
            }
            Message::BoxSettings(settings) => Ok(serde_json::to_vec(settings)?),
            Message::Heartbeat | Message::DisconnectPhone | Message::CloseDongle => Ok(Vec::new()),
            Message::Unknown { payload, .. } => Ok(payload.clone()),
            Message::Plugged { .. }
            | Message::Phase(_)
            | Message::Unplugged
            | Message::Video(_)
            | Message::BluetoothAddress(_)
            | Message::BluetoothPin(_)
            | Message::BluetoothDeviceName(_)
            | Message::WifiDeviceName(_)
            | Message::BluetoothPairedList(_)
            | Message::ManufacturerInfo { .. }
            | Message::HiCarLink(_)
            | Message::Media(_)
            | Message::SoftwareVersion(_) => {
                Err(ProtocolError::NotEncodable { kind: self.kind() })
            }
        }
    }

    /// Handshake open request for the given session configuration
    pub fn open(config: &ConnectionConfig) -> Message {
        Message::Open(OpenInfo::from(config))
    }

    /// Dongle settings JSON sent during the handshake
    ///
    /// `sync_time` defaults to the current wall clock in milliseconds.
    pub fn box_settings(config: &ConnectionConfig, sync_time: Option<u64>) -> Message {
        let sync_time = sync_time.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0)
        });
        Message::BoxSettings(serde_json::json!({
            "mediaDelay": config.media_delay,
            "syncTime": sync_time,
            "androidAutoSizeW": config.width,
            "androidAutoSizeH": config.height,
        }))
    }

    /// Write a little-endian u32 to a virtual file on the dongle
    pub fn file_u32(value: u32, path: &str) -> Message {
        Message::SendFile {
            path: path.to_string(),
            content: value.to_le_bytes().to_vec(),
        }
    }

    /// Write a boolean (as u32 0/1) to a virtual file on the dongle
    pub fn file_bool(value: bool, path: &str) -> Message {
        Message::file_u32(value as u32, path)
    }

    /// Write an ASCII string to a virtual file on the dongle
    pub fn file_string(value: &str, path: &str) -> Message {
        Message::SendFile {
            path: path.to_string(),
            content: value.as_bytes().to_vec(),
        }
    }

    /// Set the name the dongle advertises
    pub fn box_name(name: &str) -> Message {
        Message::file_string(name, file_address::BOX_NAME)
    }

    /// Mic capture PCM toward the dongle (decode_type 5, audio_type 3)
    pub fn mic_audio(samples: Vec<u8>) -> Message {
        Message::Audio(AudioPacket {
            decode_type: 5,
            volume: 0.0,
            audio_type: 3,
            body: AudioBody::Pcm(samples),
        })
    }
}

fn parse_audio(payload: &[u8]) -> Result<AudioPacket> {
    let decode_type = read_u32("audio", payload, 0)?;
    let volume = read_f32("audio", payload, 4)?;
    let audio_type = read_u32("audio", payload, 8)?;
    let body = match payload.len() - 12 {
        1 => AudioBody::Command(AudioCommand::from_value(payload[12])?),
        4 => AudioBody::VolumeDuration(read_f32("audio", payload, 12)?),
        _ => AudioBody::Pcm(payload[12..].to_vec()),
    };
    Ok(AudioPacket {
        decode_type,
        volume,
        audio_type,
        body,
    })
}

fn parse_multi_touch(payload: &[u8]) -> Result<Vec<TouchPoint>> {
    if payload.len() % 16 != 0 {
        return Err(ProtocolError::TruncatedPayload {
            kind: "multi_touch",
            needed: payload.len().next_multiple_of(16),
            got: payload.len(),
        });
    }
    payload
        .chunks_exact(16)
        .map(|chunk| {
            Ok(TouchPoint {
                x: read_f32("multi_touch", chunk, 0)?,
                y: read_f32("multi_touch", chunk, 4)?,
                action: MultiTouchAction::from_value(read_u32("multi_touch", chunk, 8)?)?,
                id: read_u32("multi_touch", chunk, 12)?,
            })
        })
        .collect()
}

fn parse_media(payload: &[u8]) -> Result<MediaPayload> {
    match read_u32("media", payload, 0)? {
        1 => {
            // metadata JSON carries a trailing NUL
            let body = payload[4..].strip_suffix(&[0]).unwrap_or(&payload[4..]);
            Ok(MediaPayload::Metadata(serde_json::from_slice(body)?))
        }
        3 => Ok(MediaPayload::AlbumCover(payload[4..].to_vec())),
        value => Err(ProtocolError::InvalidField {
            kind: "media",
            field: "media_type",
            value,
        }),
    }
}

fn parse_send_file(payload: &[u8]) -> Result<Message> {
    let name_len = read_u32("send_file", payload, 0)? as usize;
    let name_end = 4 + name_len;
    let name = payload
        .get(4..name_end)
        .ok_or(ProtocolError::TruncatedPayload {
            kind: "send_file",
            needed: name_end,
            got: payload.len(),
        })?;
    let name = name.strip_suffix(&[0]).unwrap_or(name);
    let path = std::str::from_utf8(name)
        .map_err(|source| ProtocolError::InvalidString {
            kind: "send_file",
            source,
        })?
        .to_string();

    let content_len = read_u32("send_file", payload, name_end)? as usize;
    let content_start = name_end + 4;
    let content = payload
        .get(content_start..content_start + content_len)
        .ok_or(ProtocolError::TruncatedPayload {
            kind: "send_file",
            needed: content_start + content_len,
            got: payload.len(),
        })?;
    Ok(Message::SendFile {
        path,
        content: content.to_vec(),
    })
}
