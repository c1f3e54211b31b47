#![allow(dead_code)]

use std::path::{Path, PathBuf};

/// Robot-mode output of `info` on a one-title disc
pub const SAMPLE_LOG: &str = include_str!("../fixtures/sample.log");

/// Robot-mode output of a drive scan with one inserted disc
pub const DRIVES_LOG: &str = include_str!("../fixtures/drives.log");

/// Initialize tracing for tests with proper test output handling
pub fn tracing_init() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Write an executable stand-in for the ripping tool into `dir`.
///
/// It answers the drive scan with `drive_output` (exiting 1, like the real
/// tool rejecting the command) and `info` with `info_output`.
#[cfg(unix)]
pub fn fake_ripper(dir: &Path, drive_output: &str, info_output: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let drive_output = with_newline(drive_output);
    let info_output = with_newline(info_output);
    let script = format!(
        "#!/bin/sh\n\
         case \" $* \" in\n\
         *\" invalid \"*)\n\
         cat <<'ROBOT'\n{drive_output}ROBOT\n\
         exit 1\n\
         ;;\n\
         *\" info \"*)\n\
         cat <<'ROBOT'\n{info_output}ROBOT\n\
         ;;\n\
         *)\n\
         exit 2\n\
         ;;\n\
         esac\n"
    );
    let path = dir.join("fakemkv.sh");
    std::fs::write(&path, script).unwrap();
    let mut permissions = std::fs::metadata(&path).unwrap().permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&path, permissions).unwrap();
    path
}

fn with_newline(text: &str) -> String {
    if text.is_empty() || text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{}\n", text)
    }
}
