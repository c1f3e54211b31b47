//! Decoder for the ripping tool's robot-mode output

mod decoder;
mod info;
pub mod process;
mod record;
mod types;

pub use decoder::{DecodeError, Decoder, RobotEvent, RobotParser, EVENT_CHANNEL_CAPACITY};
pub use info::{DiscInfo, GenericInfo, StreamInfo, TitleInfo};
pub use process::{ProcessError, RobotProcess};
pub use record::{normalize_escapes, parse_record};
pub use types::{
    DiscFlags, Drive, DriveState, Message, MessageFlags, ProgressKind, ProgressTitle,
    ProgressUpdate, Tag,
};
