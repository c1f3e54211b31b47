#![cfg(unix)]

mod support;

use discplan::analyzer::{AnalyzeError, Analyzer};
use discplan::config::Config;
use discplan::database::{Database, LogEntryKind};
use discplan::discid::{self, Disc};
use discplan::robot::{DecodeError, DiscInfo, DriveState};
use support::{fake_ripper, tracing_init, DRIVES_LOG, SAMPLE_LOG};
use tempfile::TempDir;

async fn analyzer_with(dir: &TempDir, drive_output: &str, info_output: &str) -> Analyzer {
    let ripper_path = fake_ripper(dir.path(), drive_output, info_output);
    let database_path = dir.path().join("discplan.sqlite");
    let database = Database::new(database_path.to_str().unwrap()).await.unwrap();
    Analyzer::new(
        database,
        Config {
            ripper_path,
            database_path,
        },
    )
}

#[tokio::test]
async fn test_scan_drives_skips_empty_slots() {
    tracing_init();
    let dir = TempDir::new().unwrap();
    let mut analyzer = analyzer_with(&dir, DRIVES_LOG, SAMPLE_LOG).await;

    let drives = analyzer.scan_drives().await.unwrap();
    assert_eq!(drives.len(), 1);
    let drive = &drives[0];
    assert_eq!(drive.index, 0);
    assert_eq!(drive.state, DriveState::Inserted);
    assert_eq!(drive.flags.0, 4);
    assert_eq!(drive.disc_name, "SomeDisc");
    assert_eq!(drive.drive_path, "/dev/rdisk4");
}

#[tokio::test]
async fn test_analyze_records_fingerprint_once() {
    tracing_init();
    let dir = TempDir::new().unwrap();
    let mut analyzer = analyzer_with(&dir, DRIVES_LOG, SAMPLE_LOG).await;

    let drives = analyzer.scan_drives().await.unwrap();
    let first = analyzer.analyze(&drives).await.unwrap();
    assert!(first.is_new);
    assert_eq!(first.drive_index, 0);
    assert_eq!(first.disc_info.info.volume_name, "VOLUME_ID");
    assert_eq!(
        first.fingerprint,
        discid::fingerprint(Some(&Disc::from_disc_info(&first.disc_info))).unwrap()
    );

    let second = analyzer.analyze(&drives).await.unwrap();
    assert!(!second.is_new);
    assert_eq!(second.fingerprint, first.fingerprint);
    assert_eq!(second.disc_fingerprint_id, first.disc_fingerprint_id);

    let discs = analyzer.database().get_all_discs().await.unwrap();
    assert_eq!(discs.len(), 1);
    assert_eq!(discs[0].disc.id, first.disc_fingerprint_id);
    assert_eq!(discs[0].disc.name, "Volume Name");
    assert_eq!(discs[0].disc.fingerprint, first.fingerprint.to_vec());
    assert!(discs[0].robot_log_id.is_some());
}

#[tokio::test]
async fn test_session_links_logs_and_disc() {
    tracing_init();
    let dir = TempDir::new().unwrap();
    let mut analyzer = analyzer_with(&dir, DRIVES_LOG, SAMPLE_LOG).await;

    let drives = analyzer.scan_drives().await.unwrap();
    let analysis = analyzer.analyze(&drives).await.unwrap();

    let session_id = analyzer.session().await.unwrap().id.clone();
    let database = analyzer.database();
    let session = database.get_session(&session_id).await.unwrap().unwrap();
    assert_eq!(
        session.disc_fingerprint_id.as_deref(),
        Some(analysis.disc_fingerprint_id.as_str())
    );

    let logs = database.get_robot_logs_for_session(&session_id).await.unwrap();
    assert_eq!(logs.len(), 2);
    assert!(logs[0].args.iter().any(|arg| arg == "invalid"));
    assert!(logs[1].args.ends_with(&[
        "--noscan".to_string(),
        "info".to_string(),
        "disc:0".to_string()
    ]));
}

#[tokio::test]
async fn test_logged_lines_replay_the_output() {
    tracing_init();
    let dir = TempDir::new().unwrap();
    let mut analyzer = analyzer_with(&dir, DRIVES_LOG, SAMPLE_LOG).await;

    let drives = analyzer.scan_drives().await.unwrap();
    let analysis = analyzer.analyze(&drives).await.unwrap();

    let session_id = analyzer.session().await.unwrap().id.clone();
    let database = analyzer.database();
    let logs = database.get_robot_logs_for_session(&session_id).await.unwrap();

    let scan_lines = database.get_log_entries(&logs[0].id).await.unwrap();
    assert_eq!(scan_lines, DRIVES_LOG.lines().collect::<Vec<_>>());
    let info_lines = database.get_log_entries(&logs[1].id).await.unwrap();
    assert_eq!(info_lines, SAMPLE_LOG.lines().collect::<Vec<_>>());

    // The snapshot follows the info lines it was built from
    let entries = database.get_all_log_entries(&logs[1].id).await.unwrap();
    let last = entries.last().unwrap();
    assert_eq!(last.kind, LogEntryKind::DiscInfo);
    let snapshot: DiscInfo = serde_json::from_str(&last.entry).unwrap();
    assert_eq!(snapshot, analysis.disc_info);
    assert_eq!(
        database.latest_disc_snapshot(&logs[1].id).await.unwrap(),
        Some(last.entry.clone())
    );
}

#[tokio::test]
async fn test_analyze_stops_on_decode_error() {
    tracing_init();
    let dir = TempDir::new().unwrap();
    let broken = format!("{}BOGUS:1\n", SAMPLE_LOG);
    let mut analyzer = analyzer_with(&dir, DRIVES_LOG, &broken).await;

    let drives = analyzer.scan_drives().await.unwrap();
    let result = analyzer.analyze(&drives).await;
    match result {
        Err(AnalyzeError::Decode(DecodeError::UnknownTag { tag, .. })) => assert_eq!(tag, "BOGUS"),
        other => panic!("expected an unknown tag error, got {:?}", other),
    }
    assert!(analyzer.database().get_all_discs().await.unwrap().is_empty());

    // Every line that decoded, plus the rejected one, is in the log
    let session_id = analyzer.session().await.unwrap().id.clone();
    let database = analyzer.database();
    let logs = database.get_robot_logs_for_session(&session_id).await.unwrap();
    let info_lines = database.get_log_entries(&logs[1].id).await.unwrap();
    assert_eq!(info_lines, broken.lines().collect::<Vec<_>>());

    // No snapshot of the unfinished disc is stored
    assert_eq!(database.latest_disc_snapshot(&logs[1].id).await.unwrap(), None);
}

#[tokio::test]
async fn test_analyze_without_inserted_disc() {
    tracing_init();
    let dir = TempDir::new().unwrap();
    let empty_drive = "DRV:0,0,999,0,\"BD-RE HL-DT-ST BD-RE FAKE 1.00 SERIAL\",\"\",\"\"\n";
    let mut analyzer = analyzer_with(&dir, empty_drive, SAMPLE_LOG).await;

    let drives = analyzer.scan_drives().await.unwrap();
    assert_eq!(drives.len(), 1);
    assert!(matches!(
        analyzer.analyze(&drives).await,
        Err(AnalyzeError::NoDiscInserted)
    ));
}
