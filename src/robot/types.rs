//! Typed records for the non-info robot-mode lines

use serde::{Deserialize, Serialize};
use std::fmt;

/// Line tags understood by the decoder. The vocabulary is closed: any other
/// tag is a decode error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    Message,
    ProgressTitle,
    ProgressCurrent,
    ProgressValue,
    Drive,
    StreamInfo,
    TitleInfo,
    DiscInfo,
    TitleCount,
}

impl Tag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Message => "MSG",
            Tag::ProgressTitle => "PRGT",
            Tag::ProgressCurrent => "PRGC",
            Tag::ProgressValue => "PRGV",
            Tag::Drive => "DRV",
            Tag::StreamInfo => "SINFO",
            Tag::TitleInfo => "TINFO",
            Tag::DiscInfo => "CINFO",
            Tag::TitleCount => "TCOUNT",
        }
    }

    pub fn parse(tag: &str) -> Option<Tag> {
        match tag {
            "MSG" => Some(Tag::Message),
            "PRGT" => Some(Tag::ProgressTitle),
            "PRGC" => Some(Tag::ProgressCurrent),
            "PRGV" => Some(Tag::ProgressValue),
            "DRV" => Some(Tag::Drive),
            "SINFO" => Some(Tag::StreamInfo),
            "TINFO" => Some(Tag::TitleInfo),
            "CINFO" => Some(Tag::DiscInfo),
            "TCOUNT" => Some(Tag::TitleCount),
            _ => None,
        }
    }

    /// True for the tags that update the disc aggregate
    pub fn is_info(&self) -> bool {
        matches!(self, Tag::StreamInfo | Tag::TitleInfo | Tag::DiscInfo)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rendering hints attached to a `MSG` line.
///
/// The box bits (`BOX_MASK`) select a dialog style; the remaining bits are
/// independent flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageFlags(pub i64);

impl MessageFlags {
    pub const BOX_MASK: i64 = 0xf0e;
    pub const BOX_OK: i64 = 0x104;
    pub const BOX_ERROR: i64 = 0x204;
    pub const BOX_WARNING: i64 = 0x404;
    pub const BOX_YES_NO: i64 = 0x308;
    pub const BOX_YES_NO_ERR: i64 = 0x508;
    pub const BOX_YES_NO_REG: i64 = 0x608;
    pub const DEBUG: i64 = 0x20;
    pub const HIDDEN: i64 = 0x40;
    pub const EVENT: i64 = 0x80;
    pub const HAVE_URL: i64 = 0x20000;

    pub fn contains(&self, flag: i64) -> bool {
        self.0 & flag == flag
    }

    /// Box style bits, or 0 when the message is not a dialog
    pub fn box_kind(&self) -> i64 {
        self.0 & Self::BOX_MASK
    }
}

/// Free-text notice for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Language-neutral message code
    pub code: i64,
    pub flags: MessageFlags,
    /// Number of parameters the tool reported for `format`
    pub count: i64,
    /// Pre-formatted text
    pub message: String,
    /// printf-style template that produced `message`
    pub format: String,
    pub params: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressKind {
    /// Name of the overall operation (`PRGT`)
    Total,
    /// Name of the current step within the overall operation (`PRGC`)
    Current,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressTitle {
    pub kind: ProgressKind,
    pub code: i64,
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub current: i64,
    pub total: i64,
    pub max: i64,
}

/// Drive state. Despite looking like flags these are plain constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriveState {
    EmptyClosed,
    EmptyOpen,
    Inserted,
    Loading,
    NoDrive,
    Unmounting,
    Other(i64),
}

impl DriveState {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => DriveState::EmptyClosed,
            1 => DriveState::EmptyOpen,
            2 => DriveState::Inserted,
            3 => DriveState::Loading,
            256 => DriveState::NoDrive,
            257 => DriveState::Unmounting,
            other => DriveState::Other(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            DriveState::EmptyClosed => 0,
            DriveState::EmptyOpen => 1,
            DriveState::Inserted => 2,
            DriveState::Loading => 3,
            DriveState::NoDrive => 256,
            DriveState::Unmounting => 257,
            DriveState::Other(code) => *code,
        }
    }
}

/// Which disc file systems were detected in a drive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscFlags(pub i64);

impl DiscFlags {
    pub const DVD_FILES_PRESENT: i64 = 0x1;
    pub const HDDVD_FILES_PRESENT: i64 = 0x2;
    pub const BLURAY_FILES_PRESENT: i64 = 0x4;
    pub const AACS_FILES_PRESENT: i64 = 0x8;
    pub const BDSVM_FILES_PRESENT: i64 = 0x10;

    pub fn contains(&self, flag: i64) -> bool {
        self.0 & flag == flag
    }

    /// Disc format for display
    pub fn format(&self) -> &'static str {
        if self.contains(Self::BLURAY_FILES_PRESENT) {
            "Blu-ray"
        } else if self.contains(Self::HDDVD_FILES_PRESENT) {
            "HD DVD"
        } else if self.contains(Self::DVD_FILES_PRESENT) {
            "DVD"
        } else {
            "unknown format"
        }
    }
}

/// One physical or virtual drive known to the ripping tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drive {
    pub index: i64,
    pub state: DriveState,
    /// Always 999 in observed output
    pub unknown: i64,
    pub flags: DiscFlags,
    pub drive_name: String,
    pub disc_name: String,
    pub drive_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_vocabulary() {
        for tag in [
            Tag::Message,
            Tag::ProgressTitle,
            Tag::ProgressCurrent,
            Tag::ProgressValue,
            Tag::Drive,
            Tag::StreamInfo,
            Tag::TitleInfo,
            Tag::DiscInfo,
            Tag::TitleCount,
        ] {
            assert_eq!(Tag::parse(tag.as_str()), Some(tag));
        }
        assert_eq!(Tag::parse("msg"), None);
        assert_eq!(Tag::parse("XINFO"), None);
        assert!(Tag::DiscInfo.is_info());
        assert!(!Tag::TitleCount.is_info());
    }

    #[test]
    fn test_drive_state_codes() {
        assert_eq!(DriveState::from_code(2), DriveState::Inserted);
        assert_eq!(DriveState::from_code(256), DriveState::NoDrive);
        assert_eq!(DriveState::from_code(42), DriveState::Other(42));
        assert_eq!(DriveState::Other(42).code(), 42);
        assert_eq!(DriveState::Unmounting.code(), 257);
    }

    #[test]
    fn test_message_box_bits() {
        let flags = MessageFlags(MessageFlags::BOX_ERROR | MessageFlags::HAVE_URL);
        assert_eq!(flags.box_kind(), MessageFlags::BOX_ERROR);
        assert!(flags.contains(MessageFlags::HAVE_URL));
        assert!(!flags.contains(MessageFlags::HIDDEN));
    }

    #[test]
    fn test_disc_format() {
        let bluray = DiscFlags(DiscFlags::BLURAY_FILES_PRESENT | DiscFlags::AACS_FILES_PRESENT);
        assert!(bluray.contains(DiscFlags::AACS_FILES_PRESENT));
        assert_eq!(bluray.format(), "Blu-ray");
        assert_eq!(DiscFlags(DiscFlags::DVD_FILES_PRESENT).format(), "DVD");
        assert_eq!(DiscFlags::default().format(), "unknown format");
    }
}
