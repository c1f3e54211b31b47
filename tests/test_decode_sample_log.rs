mod support;

use discplan::robot::{DriveState, ProgressKind, RobotEvent, RobotParser};
use futures::StreamExt;
use std::io::Cursor;
use support::{tracing_init, DRIVES_LOG, SAMPLE_LOG};
use tokio_util::sync::CancellationToken;

async fn decode_all(log: &str) -> Vec<RobotEvent> {
    let reader = Cursor::new(log.as_bytes().to_vec());
    RobotParser::new(reader)
        .stream(CancellationToken::new())
        .map(|item| item.expect("sample log decodes cleanly"))
        .collect()
        .await
}

#[tokio::test]
async fn test_sample_log_event_order() {
    tracing_init();
    let events = decode_all(SAMPLE_LOG).await;
    assert_eq!(events.len(), 7);

    let RobotEvent::Message { message, .. } = &events[0] else {
        panic!("expected a message first, got {:?}", events[0]);
    };
    assert_eq!(message.code, 1005);
    assert_eq!(message.message, "FakeMKV v0.0.1 mock(cpu-release) started");
    assert_eq!(message.params, vec!["FakeMKV v0.0.1 mock(cpu-release)"]);

    let RobotEvent::ProgressTitle { progress, .. } = &events[1] else {
        panic!("expected PRGT, got {:?}", events[1]);
    };
    assert_eq!(progress.kind, ProgressKind::Total);
    assert_eq!(progress.name, "Scanning CD-ROM devices");

    let RobotEvent::ProgressTitle { progress, .. } = &events[2] else {
        panic!("expected PRGC, got {:?}", events[2]);
    };
    assert_eq!(progress.kind, ProgressKind::Current);

    let RobotEvent::ProgressUpdate { progress, .. } = &events[3] else {
        panic!("expected PRGV, got {:?}", events[3]);
    };
    assert_eq!((progress.current, progress.total, progress.max), (0, 0, 65536));

    let RobotEvent::Drive { drive, .. } = &events[4] else {
        panic!("expected DRV, got {:?}", events[4]);
    };
    assert_eq!(drive.index, 0);
    assert_eq!(drive.state, DriveState::EmptyClosed);
    assert_eq!(drive.drive_name, "BD-RE HL-DT-ST BD-RE FAKE 1.00 SERIAL");

    assert!(matches!(events[5], RobotEvent::TitleCount { count: Some(1), .. }));
    assert!(matches!(events[6], RobotEvent::DiscInfo { .. }));
}

#[tokio::test]
async fn test_sample_log_disc_tree() {
    tracing_init();
    let events = decode_all(SAMPLE_LOG).await;
    let Some(RobotEvent::DiscInfo { disc, raw }) = events.last() else {
        panic!("expected a final disc snapshot");
    };
    assert_eq!(raw.len(), 19);

    assert_eq!(disc.info.name, "Volume Name");
    assert_eq!(disc.info.volume_name, "VOLUME_ID");
    assert_eq!(disc.titles.len(), 1);

    let title = &disc.titles[0];
    assert_eq!(title.info.chapter_count, "4");
    assert_eq!(title.info.duration, "1:00:00");
    assert_eq!(title.info.disk_size, "10.0 GB");
    assert_eq!(title.info.disk_size_bytes, "10737418240");
    assert_eq!(title.info.source_file_name, "00000.mpls");
    assert_eq!(title.streams.len(), 3);

    let video = &title.streams[0].info;
    assert_eq!(
        (video.kind.as_str(), video.codec_id.as_str(), video.codec_short.as_str()),
        ("Video", "V_MPEG2", "Mpeg2")
    );
    let audio = &title.streams[1].info;
    assert_eq!(
        (
            audio.kind.as_str(),
            audio.name.as_str(),
            audio.codec_id.as_str(),
            audio.codec_short.as_str()
        ),
        ("Audio", "Surround 5.1", "A_DTS", "DTS-HD MA")
    );
    let subtitles = &title.streams[2].info;
    assert_eq!(subtitles.kind, "Subtitles");
    assert_eq!(subtitles.lang_code, "eng");
    assert_eq!(subtitles.lang_name, "English");
    assert_eq!(subtitles.codec_id, "S_HDMV/PGS");
    assert_eq!(subtitles.codec_short, "PGS");
}

#[tokio::test]
async fn test_every_line_is_accounted_for() {
    tracing_init();
    let events = decode_all(SAMPLE_LOG).await;
    let replayed: Vec<&str> = events.iter().flat_map(|e| e.raw_lines()).collect();
    let original: Vec<&str> = SAMPLE_LOG.lines().collect();
    assert_eq!(replayed, original);
}

#[tokio::test]
async fn test_drive_scan_output() {
    tracing_init();
    let events = decode_all(DRIVES_LOG).await;
    let drives: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            RobotEvent::Drive { drive, .. } => Some(drive),
            _ => None,
        })
        .collect();
    assert_eq!(drives.len(), 3);
    assert_eq!(drives[0].state, DriveState::Inserted);
    assert_eq!(drives[0].disc_name, "SomeDisc");
    assert_eq!(drives[0].drive_path, "/dev/rdisk4");
    assert_eq!(drives[1].state, DriveState::NoDrive);

    let Some(RobotEvent::Message { message, .. }) = events.last() else {
        panic!("expected the rejection message last");
    };
    assert_eq!(message.code, 2003);
    assert_eq!(message.message, "Unknown command \"invalid\"");
}
