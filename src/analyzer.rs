//! Analysis session: drive scanning, disc analysis and fingerprint bookkeeping

use crate::config::Config;
use crate::database::{Database, DbRobotLog, DbSession, LogEntryKind};
use crate::discid::{self, Disc, FingerprintError};
use crate::robot::{
    DecodeError, DiscInfo, Drive, DriveState, Message, MessageFlags, ProcessError, RobotEvent,
    RobotProcess,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::process::ExitStatus;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("No disc drives found")]
    NoDrives,
    #[error("No disc inserted in any drive")]
    NoDiscInserted,
    #[error("Ripping tool reported no disc info")]
    NoDiscInfo,
    #[error("Ripping tool exited with {status}")]
    RipperFailed { status: ExitStatus },
    #[error("Analysis cancelled")]
    Cancelled,
    #[error("Process error: {0}")]
    Process(#[from] ProcessError),
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Fingerprint error: {0}")]
    Fingerprint(#[from] FingerprintError),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result of analyzing the disc in one drive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    /// Position of the analyzed drive in the list given to `analyze`
    pub drive_index: usize,
    /// True when this fingerprint had never been seen before
    pub is_new: bool,
    pub disc_info: DiscInfo,
    #[serde(with = "hex::serde")]
    pub fingerprint: [u8; 32],
    pub disc_fingerprint_id: String,
}

/// One finished invocation of the ripping tool
#[derive(Debug)]
pub struct RobotRun {
    pub robot_log: DbRobotLog,
    pub status: ExitStatus,
}

pub struct Analyzer {
    database: Database,
    config: Config,
    session: Option<DbSession>,
    cancel: CancellationToken,
}

impl Analyzer {
    pub fn new(database: Database, config: Config) -> Self {
        Analyzer {
            database,
            config,
            session: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Cancelling this token stops the run in progress and every later one
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// The session all runs are recorded under, created on first use
    pub async fn session(&mut self) -> Result<&DbSession, AnalyzeError> {
        let session = match self.session.take() {
            Some(session) => session,
            None => self.database.create_session().await?,
        };
        Ok(self.session.insert(session))
    }

    /// Run the ripping tool with `args`, logging every raw line and each
    /// disc snapshot, and hand each decoded event to `on_event`.
    ///
    /// A non-zero exit is returned in the run's status, not as an error.
    pub async fn run<F>(&mut self, args: &[String], mut on_event: F) -> Result<RobotRun, AnalyzeError>
    where
        F: FnMut(&RobotEvent),
    {
        let session_id = self.session().await?.id.clone();
        let mut process = RobotProcess::new(&self.config.ripper_path, args);
        let parser = process.start()?;
        let robot_log = self.database.insert_robot_log(&session_id, process.args()).await?;
        debug!("Recording robot log {} for {:?}", robot_log.id, process.args());

        let cancel = self.cancel.child_token();
        let mut events = parser.stream(cancel.clone());
        while let Some(item) = events.next().await {
            let event = match item {
                Ok(event) => event,
                Err(e) => {
                    warn!("Stopping ripping tool after decode error: {}", e);
                    stop(&mut process).await;
                    if let Some(line) = e.line() {
                        self.database
                            .append_log_entry(&robot_log.id, LogEntryKind::Raw, line)
                            .await?;
                    }
                    return Err(e.into());
                }
            };

            for raw in event.raw_lines() {
                self.database
                    .append_log_entry(&robot_log.id, LogEntryKind::Raw, raw)
                    .await?;
            }
            if let RobotEvent::DiscInfo { disc, .. } = &event {
                let snapshot = serde_json::to_string(disc)?;
                self.database
                    .append_log_entry(&robot_log.id, LogEntryKind::DiscInfo, &snapshot)
                    .await?;
            }
            if let RobotEvent::Message { message, .. } = &event {
                relay_message(message);
            }
            on_event(&event);
        }

        if cancel.is_cancelled() {
            stop(&mut process).await;
            return Err(AnalyzeError::Cancelled);
        }

        let status = match process.wait().await {
            Ok(status) => status,
            Err(ProcessError::Failed { status, .. }) => status,
            Err(e) => return Err(e.into()),
        };
        Ok(RobotRun { robot_log, status })
    }

    /// Every drive the ripping tool knows about, minus empty slots.
    ///
    /// The tool has no drive-listing command, but prints drive lines before
    /// rejecting an unknown one, so its failing exit is expected here.
    pub async fn scan_drives(&mut self) -> Result<Vec<Drive>, AnalyzeError> {
        info!("Looking for disc drives");
        let mut drives = Vec::new();
        self.run(&["invalid".to_string()], |event| {
            if let RobotEvent::Drive { drive, .. } = event {
                if drive.state != DriveState::NoDrive {
                    drives.push(drive.clone());
                }
            }
        })
        .await?;
        info!("Found {} drive(s)", drives.len());
        Ok(drives)
    }

    /// Analyze the first drive holding a disc and record its fingerprint
    pub async fn analyze(&mut self, drives: &[Drive]) -> Result<Analysis, AnalyzeError> {
        if drives.is_empty() {
            return Err(AnalyzeError::NoDrives);
        }
        let drive_index = drives
            .iter()
            .position(|drive| drive.state == DriveState::Inserted)
            .ok_or(AnalyzeError::NoDiscInserted)?;
        let drive = &drives[drive_index];

        info!(
            "💿 Analyzing drive {} ({}, {})",
            drive.index,
            drive.drive_name,
            drive.flags.format()
        );
        // --noscan keeps the tool away from the other drives
        let args = vec![
            "--noscan".to_string(),
            "info".to_string(),
            format!("disc:{}", drive.index),
        ];
        let mut disc_info = None;
        let run = self
            .run(&args, |event| {
                if let RobotEvent::DiscInfo { disc, .. } = event {
                    disc_info = Some(disc.clone());
                }
            })
            .await?;
        if !run.status.success() {
            return Err(AnalyzeError::RipperFailed { status: run.status });
        }
        let disc_info = disc_info.ok_or(AnalyzeError::NoDiscInfo)?;

        let disc = Disc::from_disc_info(&disc_info);
        let fingerprint = discid::fingerprint(Some(&disc))?;
        let fingerprint_hex = discid::fingerprint_hex(Some(&disc))?;
        let (row, is_new) = self
            .database
            .find_or_create_fingerprint(&fingerprint, &disc_info.info.name, &disc_info.info.volume_name)
            .await?;
        let session_id = self.session().await?.id.clone();
        self.database.set_session_fingerprint(&session_id, &row.id).await?;

        info!(
            "✓ Found disc {} ({}) = {} [{}]",
            row.volume_name,
            row.name,
            fingerprint_hex,
            if is_new { "new" } else { "seen before" }
        );

        Ok(Analysis {
            drive_index,
            is_new,
            disc_info,
            fingerprint,
            disc_fingerprint_id: row.id,
        })
    }
}

/// Forward a tool message to the log at a level matching its flags
fn relay_message(message: &Message) {
    let flags = message.flags;
    if flags.contains(MessageFlags::HIDDEN) || flags.contains(MessageFlags::DEBUG) {
        debug!("[{}] {}", message.code, message.message);
    } else if flags.box_kind() == MessageFlags::BOX_ERROR
        || flags.box_kind() == MessageFlags::BOX_WARNING
    {
        warn!("[{}] {}", message.code, message.message);
    } else {
        info!("[{}] {}", message.code, message.message);
    }
}

async fn stop(process: &mut RobotProcess) {
    if let Err(e) = process.kill().await {
        debug!("Ripping tool already gone: {}", e);
    }
}
