use discplan::analyzer::{AnalyzeError, Analyzer};
use discplan::config::Config;
use discplan::database::Database;
use discplan::robot::{RobotEvent, RobotParser};
use futures::StreamExt;
use std::env;
use std::io::Cursor;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, PartialEq, Eq)]
enum Command {
    /// Decode a robot-mode capture and print each event as JSON
    Parse { source: ParseSource, disc_only: bool },
    /// List drives known to the ripping tool
    Drives,
    /// Analyze the first inserted disc
    Analyze,
    /// List every disc seen so far
    Discs,
}

#[derive(Debug, PartialEq, Eq)]
enum ParseSource {
    File(PathBuf),
    Log(String),
}

#[tokio::main]
async fn main() {
    // Use RUST_LOG env var if set, otherwise default to info level
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(log_filter)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let program_name = args.first().map(String::as_str).unwrap_or("discplan");
    let command = match parse_args(args.get(1..).unwrap_or(&[])) {
        Ok(command) => command,
        Err(message) => {
            error!("{}", message);
            print_usage(program_name);
            std::process::exit(1);
        }
    };

    if let Err(message) = run(command).await {
        error!("{}", message);
        std::process::exit(1);
    }
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    let Some((name, rest)) = args.split_first() else {
        return Err("No command specified".to_string());
    };

    match name.as_str() {
        "parse" => {
            let mut file = None;
            let mut log_id = None;
            let mut disc_only = false;
            let mut i = 0;
            while i < rest.len() {
                match rest[i].as_str() {
                    "--disc-only" => {
                        disc_only = true;
                        i += 1;
                    }
                    "--log-id" => {
                        let id = rest.get(i + 1).ok_or("--log-id requires a log id")?;
                        log_id = Some(id.clone());
                        i += 2;
                    }
                    other if other.starts_with("--") => {
                        return Err(format!("Unknown argument: {}", other));
                    }
                    path => {
                        if file.is_some() {
                            return Err(format!("Unexpected argument: {}", path));
                        }
                        file = Some(PathBuf::from(path));
                        i += 1;
                    }
                }
            }
            let source = match (file, log_id) {
                (Some(file), None) => ParseSource::File(file),
                (None, Some(id)) => ParseSource::Log(id),
                (Some(_), Some(_)) => {
                    return Err("Cannot use a file together with --log-id".to_string())
                }
                (None, None) => return Err("parse requires a file or --log-id".to_string()),
            };
            Ok(Command::Parse { source, disc_only })
        }
        "drives" | "analyze" | "discs" if !rest.is_empty() => {
            Err(format!("{} takes no arguments", name))
        }
        "drives" => Ok(Command::Drives),
        "analyze" => Ok(Command::Analyze),
        "discs" => Ok(Command::Discs),
        other => Err(format!("Unknown command: {}", other)),
    }
}

async fn run(command: Command) -> Result<(), String> {
    let config = Config::load().map_err(|e| e.to_string())?;

    match command {
        Command::Parse {
            source: ParseSource::File(path),
            disc_only,
        } => {
            let file = tokio::fs::File::open(&path)
                .await
                .map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;
            print_events(BufReader::new(file), disc_only).await
        }
        Command::Parse {
            source: ParseSource::Log(log_id),
            disc_only,
        } => {
            let database = open_database(&config).await?;
            let robot_log = database
                .get_robot_log(&log_id)
                .await
                .map_err(|e| format!("Failed to read log {}: {}", log_id, e))?
                .ok_or_else(|| format!("No log with id {}", log_id))?;
            info!("Replaying log {} ({})", robot_log.id, robot_log.args.join(" "));
            let lines = database
                .get_log_entries(&log_id)
                .await
                .map_err(|e| format!("Failed to read log {}: {}", log_id, e))?;
            if lines.is_empty() {
                return Err(format!("Log {} has no entries", log_id));
            }
            let mut replay = lines.join("\n");
            replay.push('\n');
            print_events(Cursor::new(replay.into_bytes()), disc_only).await
        }
        Command::Drives => {
            let mut analyzer = Analyzer::new(open_database(&config).await?, config);
            let drives = analyzer.scan_drives().await.map_err(|e| e.to_string())?;
            print_json(&drives)
        }
        Command::Analyze => {
            let mut analyzer = Analyzer::new(open_database(&config).await?, config);
            let cancel = analyzer.cancel_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Interrupted, stopping ripping tool");
                    cancel.cancel();
                }
            });

            let drives = analyzer.scan_drives().await.map_err(|e| e.to_string())?;
            match analyzer.analyze(&drives).await {
                Ok(analysis) => print_json(&analysis),
                Err(e @ (AnalyzeError::NoDrives | AnalyzeError::NoDiscInserted)) => {
                    Err(e.to_string())
                }
                Err(e) => Err(format!("Analysis failed: {}", e)),
            }
        }
        Command::Discs => {
            let database = open_database(&config).await?;
            let discs = database.get_all_discs().await.map_err(|e| e.to_string())?;
            print_json(&discs)
        }
    }
}

async fn open_database(config: &Config) -> Result<Database, String> {
    if let Some(parent) = config.database_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
    }
    let path = config.database_path.to_string_lossy();
    Database::new(&path)
        .await
        .map_err(|e| format!("Failed to open database {}: {}", path, e))
}

async fn print_events<R>(reader: R, disc_only: bool) -> Result<(), String>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let mut events = RobotParser::new(reader).stream(CancellationToken::new());
    while let Some(item) = events.next().await {
        let event = item.map_err(|e| e.to_string())?;
        let json = match &event {
            RobotEvent::DiscInfo { disc, .. } => serde_json::to_string(disc),
            RobotEvent::Interrupted { .. } => continue,
            _ if disc_only => continue,
            RobotEvent::Message { message, .. } => serde_json::to_string(message),
            RobotEvent::ProgressTitle { progress, .. } => serde_json::to_string(progress),
            RobotEvent::ProgressUpdate { progress, .. } => serde_json::to_string(progress),
            RobotEvent::Drive { drive, .. } => serde_json::to_string(drive),
            RobotEvent::TitleCount { count, .. } => serde_json::to_string(count),
        };
        println!("{}", json.map_err(|e| e.to_string())?);
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

fn print_usage(program_name: &str) {
    eprintln!("Usage:");
    eprintln!("  {} parse <robot_log> [--disc-only]", program_name);
    eprintln!("  {} parse --log-id <id> [--disc-only]", program_name);
    eprintln!("  {} drives", program_name);
    eprintln!("  {} analyze", program_name);
    eprintln!("  {} discs", program_name);
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  DISCPLAN_MAKEMKVCON  ripping executable (default: makemkvcon)");
    eprintln!("  DISCPLAN_DB_PATH     database file (default: ~/.discplan/discplan.sqlite)");
}
