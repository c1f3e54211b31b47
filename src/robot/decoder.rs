//! Robot-mode line decoding and the event stream built on top of it

use crate::robot::info::{DiscInfo, GenericInfo};
use crate::robot::record::{normalize_escapes, parse_record};
use crate::robot::types::{
    DiscFlags, Drive, DriveState, Message, MessageFlags, ProgressKind, ProgressTitle,
    ProgressUpdate, Tag,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Events waiting for the consumer. The producer blocks once this fills up,
/// which in turn lets the ripping process block on its own stdout pipe.
pub const EVENT_CHANNEL_CAPACITY: usize = 1;

/// Largest title or stream index accepted from an info line
pub const MAX_INFO_INDEX: usize = 4096;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Invalid line {line:?}: missing ':' after tag")]
    MissingColon { line: String },
    #[error("Unknown tag {tag:?} in line {line:?}")]
    UnknownTag { tag: String, line: String },
    #[error("Unable to parse record in line {line:?}: {reason}")]
    Csv { line: String, reason: String },
    #[error("{tag} line {line:?} has {got} column(s), expected {expected}")]
    ColumnCount {
        tag: Tag,
        line: String,
        expected: &'static str,
        got: usize,
    },
    #[error("{tag} line {line:?}: {field} is not a valid integer: {value:?}")]
    InvalidInteger {
        tag: Tag,
        line: String,
        field: &'static str,
        value: String,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    /// The offending raw line, when the error came from decoding one
    pub fn line(&self) -> Option<&str> {
        match self {
            DecodeError::MissingColon { line }
            | DecodeError::UnknownTag { line, .. }
            | DecodeError::Csv { line, .. }
            | DecodeError::ColumnCount { line, .. }
            | DecodeError::InvalidInteger { line, .. } => Some(line),
            DecodeError::Io(_) => None,
        }
    }
}

/// One decoded event
///
/// Every variant except `DiscInfo` and `Interrupted` corresponds to exactly
/// one line. `DiscInfo` is a snapshot of the aggregate and carries the info
/// lines folded into it since the previous snapshot, so each raw line is
/// delivered exactly once. `Interrupted` hands over the info lines absorbed
/// when the stream stops early, without a snapshot of the half-built disc.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RobotEvent {
    Message { raw: String, message: Message },
    ProgressTitle { raw: String, progress: ProgressTitle },
    ProgressUpdate { raw: String, progress: ProgressUpdate },
    Drive { raw: String, drive: Drive },
    /// Purely informational: an unparsable count is kept as `None`
    TitleCount { raw: String, count: Option<i64> },
    DiscInfo { raw: Vec<String>, disc: DiscInfo },
    Interrupted { raw: Vec<String> },
}

impl RobotEvent {
    /// Raw lines this event accounts for, in input order
    pub fn raw_lines(&self) -> Vec<&str> {
        match self {
            RobotEvent::Message { raw, .. }
            | RobotEvent::ProgressTitle { raw, .. }
            | RobotEvent::ProgressUpdate { raw, .. }
            | RobotEvent::Drive { raw, .. }
            | RobotEvent::TitleCount { raw, .. } => vec![raw.as_str()],
            RobotEvent::DiscInfo { raw, .. } | RobotEvent::Interrupted { raw } => {
                raw.iter().map(String::as_str).collect()
            }
        }
    }
}

/// Line-at-a-time decoder holding the disc aggregate
#[derive(Debug, Default)]
pub struct Decoder {
    disc: DiscInfo,
    prev_tag: Option<Tag>,
    /// Info lines absorbed since the last snapshot
    pending: Vec<String>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current, possibly incomplete, aggregate
    pub fn disc(&self) -> &DiscInfo {
        &self.disc
    }

    /// Decode one line.
    ///
    /// Info lines update the aggregate and produce no event of their own. The
    /// first non-info line after a run of info lines is preceded by a
    /// snapshot of the aggregate.
    pub fn decode_line(&mut self, raw: &str) -> Result<Vec<RobotEvent>, DecodeError> {
        let raw = raw.trim_end_matches('\r');
        let (tag_name, rest) = raw.split_once(':').ok_or_else(|| DecodeError::MissingColon {
            line: raw.to_string(),
        })?;
        let tag = Tag::parse(tag_name).ok_or_else(|| DecodeError::UnknownTag {
            tag: tag_name.to_string(),
            line: raw.to_string(),
        })?;
        let fields = parse_record(&normalize_escapes(rest)).map_err(|reason| DecodeError::Csv {
            line: raw.to_string(),
            reason,
        })?;
        let line = Line { tag, raw, fields };

        let mut events = Vec::new();
        if tag.is_info() {
            self.apply_info(&line)?;
            self.pending.push(raw.to_string());
        } else {
            let event = line.to_event()?;
            if self.prev_tag.is_some_and(|prev| prev.is_info()) && !self.pending.is_empty() {
                events.push(self.snapshot());
            }
            events.push(event);
        }
        self.prev_tag = Some(tag);
        Ok(events)
    }

    /// End of input: deliver the last aggregate state if info lines arrived
    /// since the previous snapshot
    pub fn finish(&mut self) -> Option<RobotEvent> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.snapshot())
        }
    }

    /// Early stop: hand over the info lines absorbed since the last
    /// snapshot, leaving the aggregate behind
    pub fn interrupt(&mut self) -> Option<RobotEvent> {
        if self.pending.is_empty() {
            None
        } else {
            Some(RobotEvent::Interrupted {
                raw: std::mem::take(&mut self.pending),
            })
        }
    }

    fn snapshot(&mut self) -> RobotEvent {
        RobotEvent::DiscInfo {
            raw: std::mem::take(&mut self.pending),
            disc: self.disc.clone(),
        }
    }

    fn apply_info(&mut self, line: &Line<'_>) -> Result<(), DecodeError> {
        match line.tag {
            Tag::DiscInfo => {
                line.expect_columns(3)?;
                update_generic(&mut self.disc.info, line, 0)
            }
            Tag::TitleInfo => {
                line.expect_columns(4)?;
                let title = line.index(0, "title index")?;
                update_generic(&mut self.disc.ensure_title(title).info, line, 1)
            }
            Tag::StreamInfo => {
                line.expect_columns(5)?;
                let title = line.index(0, "title index")?;
                let stream = line.index(1, "stream index")?;
                update_generic(&mut self.disc.ensure_stream(title, stream).info, line, 2)
            }
            _ => Ok(()),
        }
    }
}

/// `(property id, message code, value)` starting at column `offset`
fn update_generic(info: &mut GenericInfo, line: &Line<'_>, offset: usize) -> Result<(), DecodeError> {
    let id = line.int(offset, "property id")?;
    // The message code carries nothing useful for attributes
    line.int(offset + 1, "message code")?;
    let value = &line.fields[offset + 2];
    let known = u32::try_from(id).is_ok_and(|id| info.set(id, value));
    if !known {
        debug!("Ignoring unknown {} property id {}", line.tag, id);
    }
    Ok(())
}

struct Line<'a> {
    tag: Tag,
    raw: &'a str,
    fields: Vec<String>,
}

impl Line<'_> {
    fn expect_columns(&self, expected: usize) -> Result<(), DecodeError> {
        if self.fields.len() == expected {
            return Ok(());
        }
        Err(self.column_error(match expected {
            1 => "1",
            3 => "3",
            4 => "4",
            5 => "5",
            7 => "7",
            _ => "a different number",
        }))
    }

    fn column_error(&self, expected: &'static str) -> DecodeError {
        DecodeError::ColumnCount {
            tag: self.tag,
            line: self.raw.to_string(),
            expected,
            got: self.fields.len(),
        }
    }

    fn int(&self, column: usize, field: &'static str) -> Result<i64, DecodeError> {
        let value = &self.fields[column];
        value.parse::<i64>().map_err(|_| self.integer_error(field, value))
    }

    fn index(&self, column: usize, field: &'static str) -> Result<usize, DecodeError> {
        let value = &self.fields[column];
        match value.parse::<usize>() {
            Ok(index) if index <= MAX_INFO_INDEX => Ok(index),
            _ => Err(self.integer_error(field, value)),
        }
    }

    fn integer_error(&self, field: &'static str, value: &str) -> DecodeError {
        DecodeError::InvalidInteger {
            tag: self.tag,
            line: self.raw.to_string(),
            field,
            value: value.to_string(),
        }
    }

    fn to_event(&self) -> Result<RobotEvent, DecodeError> {
        let raw = self.raw.to_string();
        match self.tag {
            Tag::Message => {
                if self.fields.len() < 5 {
                    return Err(self.column_error("at least 5"));
                }
                Ok(RobotEvent::Message {
                    raw,
                    message: Message {
                        code: self.int(0, "code")?,
                        flags: MessageFlags(self.int(1, "flags")?),
                        count: self.int(2, "parameter count")?,
                        message: self.fields[3].clone(),
                        format: self.fields[4].clone(),
                        params: self.fields[5..].to_vec(),
                    },
                })
            }
            Tag::ProgressTitle | Tag::ProgressCurrent => {
                self.expect_columns(3)?;
                let kind = if self.tag == Tag::ProgressTitle {
                    ProgressKind::Total
                } else {
                    ProgressKind::Current
                };
                Ok(RobotEvent::ProgressTitle {
                    raw,
                    progress: ProgressTitle {
                        kind,
                        code: self.int(0, "code")?,
                        id: self.int(1, "id")?,
                        name: self.fields[2].clone(),
                    },
                })
            }
            Tag::ProgressValue => {
                self.expect_columns(3)?;
                Ok(RobotEvent::ProgressUpdate {
                    raw,
                    progress: ProgressUpdate {
                        current: self.int(0, "current")?,
                        total: self.int(1, "total")?,
                        max: self.int(2, "max")?,
                    },
                })
            }
            Tag::Drive => {
                self.expect_columns(7)?;
                Ok(RobotEvent::Drive {
                    raw,
                    drive: Drive {
                        index: self.int(0, "index")?,
                        state: DriveState::from_code(self.int(1, "state")?),
                        unknown: self.int(2, "unknown")?,
                        flags: DiscFlags(self.int(3, "flags")?),
                        drive_name: self.fields[4].clone(),
                        disc_name: self.fields[5].clone(),
                        drive_path: self.fields[6].clone(),
                    },
                })
            }
            Tag::TitleCount => {
                let count = self.fields[0].parse::<i64>().ok();
                if count.is_none() {
                    debug!("Ignoring unparsable title count in {:?}", self.raw);
                }
                Ok(RobotEvent::TitleCount { raw, count })
            }
            Tag::StreamInfo | Tag::TitleInfo | Tag::DiscInfo => {
                unreachable!("info lines never become standalone events")
            }
        }
    }
}

/// Turns a robot-mode byte stream into a stream of [`RobotEvent`]s
pub struct RobotParser<R> {
    reader: R,
}

impl<R> RobotParser<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Spawn the decoding task and return its event stream.
    ///
    /// The stream is finite and ends after the first error. Cancelling
    /// `cancel` stops the task before its next line; events already decoded
    /// are still delivered, and info lines absorbed without a snapshot arrive
    /// as [`RobotEvent::Interrupted`]. Dropping the stream stops the task at
    /// its next emission.
    pub fn stream(self, cancel: CancellationToken) -> ReceiverStream<Result<RobotEvent, DecodeError>> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(produce_events(self.reader, cancel, tx));
        ReceiverStream::new(rx)
    }
}

type EventSender = mpsc::Sender<Result<RobotEvent, DecodeError>>;

async fn produce_events<R>(mut reader: R, cancel: CancellationToken, tx: EventSender)
where
    R: AsyncBufRead + Unpin,
{
    let mut decoder = Decoder::new();
    let mut buf = Vec::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Robot stream cancelled");
                interrupt(&tx, &mut decoder).await;
                return;
            }
            next = next_line(&mut reader, &mut buf) => next,
        };

        match next {
            Ok(Some(line)) => match decoder.decode_line(&line) {
                Ok(events) => {
                    for event in events {
                        if !emit(&tx, Ok(event)).await {
                            return;
                        }
                    }
                }
                Err(e) => {
                    warn!("Failed to decode robot line: {}", e);
                    if interrupt(&tx, &mut decoder).await {
                        emit(&tx, Err(e)).await;
                    }
                    return;
                }
            },
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read robot stream: {}", e);
                if interrupt(&tx, &mut decoder).await {
                    emit(&tx, Err(e.into())).await;
                }
                return;
            }
        }
    }

    if let Some(event) = decoder.finish() {
        emit(&tx, Ok(event)).await;
    }
}

/// Next line without its terminator. Bytes that are not UTF-8 are replaced
/// rather than failing the stream.
async fn next_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}

/// Hand one item to the consumer; false once the consumer is gone
async fn emit(tx: &EventSender, item: Result<RobotEvent, DecodeError>) -> bool {
    tx.send(item).await.is_ok()
}

/// Deliver pending info lines before stopping; false once the consumer is gone
async fn interrupt(tx: &EventSender, decoder: &mut Decoder) -> bool {
    match decoder.interrupt() {
        Some(event) => emit(tx, Ok(event)).await,
        None => true,
    }
}
