//! Content-derived disc identity.
//!
//! A disc is encoded as
//!
//! ```text
//! SEQUENCE {
//!   OCTET STRING name
//!   SEQUENCE OF SEQUENCE {
//!     OCTET STRING filename
//!     INTEGER      size
//!     OCTET STRING duration
//!   }
//! }
//! ```
//!
//! using DER tag-length-value framing, and the fingerprint is the SHA-256 of
//! that encoding. Titles are written sorted by `(filename, size, duration)`
//! so the fingerprint does not depend on the order titles were reported in.

use crate::robot::DiscInfo;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

const TAG_INTEGER: u8 = 0x02;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_SEQUENCE: u8 = 0x30;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FingerprintError {
    #[error("Cannot fingerprint a missing disc")]
    NullDisc,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DiscTitle {
    pub filename: String,
    pub size: i64,
    pub duration: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disc {
    pub name: String,
    pub titles: Vec<DiscTitle>,
}

impl Disc {
    /// Identity of a decoded disc: volume label plus each title's source
    /// file, byte size (0 when unparsable) and duration
    pub fn from_disc_info(disc: &DiscInfo) -> Self {
        Disc {
            name: disc.info.volume_name.clone(),
            titles: disc
                .titles
                .iter()
                .map(|title| DiscTitle {
                    filename: title.info.source_file_name.clone(),
                    size: title.info.disk_size_bytes.parse().unwrap_or(0),
                    duration: title.info.duration.clone(),
                })
                .collect(),
        }
    }
}

pub fn serialize(disc: Option<&Disc>) -> Result<Vec<u8>, FingerprintError> {
    let disc = disc.ok_or(FingerprintError::NullDisc)?;

    let mut titles: Vec<&DiscTitle> = disc.titles.iter().collect();
    titles.sort();

    let mut out = Vec::new();
    write_tlv(&mut out, TAG_SEQUENCE, |body| {
        write_octet_string(body, disc.name.as_bytes());
        write_tlv(body, TAG_SEQUENCE, |list| {
            for title in titles {
                write_tlv(list, TAG_SEQUENCE, |entry| {
                    write_octet_string(entry, title.filename.as_bytes());
                    write_integer(entry, title.size);
                    write_octet_string(entry, title.duration.as_bytes());
                });
            }
        });
    });
    Ok(out)
}

pub fn fingerprint(disc: Option<&Disc>) -> Result<[u8; 32], FingerprintError> {
    let encoded = serialize(disc)?;
    Ok(Sha256::digest(&encoded).into())
}

/// Fingerprint as lowercase hex, for logs and display
pub fn fingerprint_hex(disc: Option<&Disc>) -> Result<String, FingerprintError> {
    fingerprint(disc).map(hex::encode)
}

/// Append `tag`, the length of what `body` writes, then the body itself
fn write_tlv(out: &mut Vec<u8>, tag: u8, body: impl FnOnce(&mut Vec<u8>)) {
    let mut content = Vec::new();
    body(&mut content);
    out.push(tag);
    write_length(out, content.len());
    out.extend_from_slice(&content);
}

fn write_octet_string(out: &mut Vec<u8>, value: &[u8]) {
    out.push(TAG_OCTET_STRING);
    write_length(out, value.len());
    out.extend_from_slice(value);
}

/// Minimal two's-complement, big-endian
fn write_integer(out: &mut Vec<u8>, value: i64) {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xff && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    out.push(TAG_INTEGER);
    write_length(out, bytes.len() - start);
    out.extend_from_slice(&bytes[start..]);
}

/// Short form below 128, long form (`0x80 | n` then `n` length bytes) above
fn write_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    out.push(0x80 | (bytes.len() - skip) as u8);
    out.extend_from_slice(&bytes[skip..]);
}
