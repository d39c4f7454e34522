//! ReplayGain extraction for OGG sources
//!
//! Vorbis comment headers sit near the start of an OGG stream, so only a
//! bounded prefix is scanned for `replaygain_track_gain=<dB> dB`. The gain is
//! turned into a linear playback scalar clamped to `[0, 1]`.
//!
//! Parsing never fails from the caller's point of view: a missing or
//! malformed tag is treated as 0 dB.

use crate::audio::source::peek_prefix;
use crate::error::{Error, Result};
use std::io::{Read, Seek, SeekFrom};
use tracing::{debug, warn};

/// Bytes scanned from the start of the stream
pub const SCAN_LIMIT_BYTES: usize = 1000;

const TRACK_GAIN_TAG: &[u8] = b"replaygain_track_gain";

/// Headroom factor applied on top of the decibel conversion
const GAIN_HEADROOM: f32 = 1.9;

/// Scan the stream prefix and return the playback scalar.
///
/// The stream is left at offset 0 whatever the outcome, since the bitstream
/// decoder consumes it next.
pub fn analyze<R: Read + Seek>(stream: &mut R) -> f32 {
    let mut prefix = [0u8; SCAN_LIMIT_BYTES];
    let gain_db = match peek_prefix(stream, &mut prefix) {
        Ok(read) => match parse_track_gain(&prefix[..read]) {
            Ok(Some(db)) => {
                debug!("ReplayGain track gain: {} dB", db);
                db
            }
            Ok(None) => 0.0,
            Err(e) => {
                debug!("{}, using 0 dB", e);
                0.0
            }
        },
        Err(e) => {
            warn!("ReplayGain scan failed: {}", e);
            0.0
        }
    };

    if let Err(e) = stream.seek(SeekFrom::Start(0)) {
        warn!("Failed to rewind stream after ReplayGain scan: {}", e);
    }

    scalar_from_db(gain_db)
}

/// Convert a track gain in decibels to the clamped playback scalar.
pub fn scalar_from_db(gain_db: f32) -> f32 {
    let percent = 100.0 * 10f32.powf(gain_db / 20.0);
    (percent / 100.0 * GAIN_HEADROOM).clamp(0.0, 1.0)
}

/// Extract the decibel value following the track gain tag.
///
/// `Ok(None)` when the tag is absent. The value runs from the byte after the
/// first `=` following the tag up to, not including, the next `d`.
pub fn parse_track_gain(bytes: &[u8]) -> Result<Option<f32>> {
    let Some(tag_start) = find(bytes, TRACK_GAIN_TAG) else {
        return Ok(None);
    };

    let after_tag = &bytes[tag_start..];
    let equals = after_tag
        .iter()
        .position(|&b| b == b'=')
        .ok_or_else(|| Error::InvalidReplayGainMetadata("missing '=' after tag".to_string()))?;

    let value_bytes = &after_tag[equals + 1..];
    let end = value_bytes
        .iter()
        .position(|&b| b == b'd')
        .ok_or_else(|| Error::InvalidReplayGainMetadata("unterminated gain value".to_string()))?;

    let text = std::str::from_utf8(&value_bytes[..end])
        .map_err(|_| Error::InvalidReplayGainMetadata("non-ASCII gain value".to_string()))?;

    text.trim()
        .parse::<f32>()
        .map(Some)
        .map_err(|e| Error::InvalidReplayGainMetadata(format!("'{}': {}", text.trim(), e)))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
