//! Upload normalisation and the fluency numbers sent to the grader.

use anyhow::{bail, Context, Result};
use std::io::Cursor;
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::TimeBase;

/// Duration assumed when the upload's length cannot be read.
pub const DEFAULT_DURATION_SECS: f64 = 30.0;

const ALLOWED_EXTENSIONS: [&str; 5] = ["webm", "mp3", "wav", "m4a", "ogg"];

/// Task number from the form field: 1-4, anything else is task 1.
pub fn parse_task(raw: Option<&str>) -> u8 {
    raw.and_then(|s| s.trim().parse::<u8>().ok())
        .filter(|t| (1..=4).contains(t))
        .unwrap_or(1)
}

/// Lowercased extension of the uploaded file name, restricted to the accepted audio types.
pub fn normalize_extension(file_name: Option<&str>) -> &'static str {
    let ext = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_lowercase());
    ext.and_then(|e| ALLOWED_EXTENSIONS.iter().copied().find(|a| *a == e))
        .unwrap_or("webm")
}

pub fn mime_type(extension: &str) -> &'static str {
    match extension {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        "ogg" => "audio/ogg",
        _ => "audio/webm",
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Length of an uploaded recording in seconds.
///
/// The container is probed with the upload's extension as a hint. When the
/// track header carries a frame count that is used directly; otherwise
/// (browser `webm` recordings usually have none) the packets are walked and
/// the last timestamp is converted through the track's time base.
pub fn audio_duration_secs(bytes: &[u8], extension: &str) -> Result<f64> {
    if bytes.is_empty() {
        bail!("empty audio data");
    }

    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());
    let mut hint = Hint::new();
    hint.with_extension(extension);

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("unrecognized audio format")?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("no audio track found")?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    if let (Some(frames), Some(rate)) = (params.n_frames, params.sample_rate) {
        if rate > 0 {
            return Ok(frames as f64 / rate as f64);
        }
    }

    let time_base = params
        .time_base
        .or_else(|| params.sample_rate.map(|rate| TimeBase::new(1, rate)))
        .context("track has no time base")?;

    let mut first: Option<u64> = None;
    let mut end = 0u64;
    loop {
        match format.next_packet() {
            Ok(packet) if packet.track_id() == track_id => {
                first.get_or_insert(packet.ts());
                end = end.max(packet.ts().saturating_add(packet.dur()));
            }
            Ok(_) => {}
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e).context("failed to read audio packet"),
        }
    }

    let time = time_base.calc_time(end.saturating_sub(first.unwrap_or(0)));
    Ok(time.seconds as f64 + time.frac)
}

/// Seconds of speech to use for the rate: the probed length when readable and positive.
pub fn duration_or_default(bytes: &[u8], extension: &str) -> f64 {
    match audio_duration_secs(bytes, extension) {
        Ok(secs) if secs > 0.0 => secs,
        Ok(_) => DEFAULT_DURATION_SECS,
        Err(e) => {
            tracing::debug!(error = %e, extension, "audio length unknown, assuming {DEFAULT_DURATION_SECS}s");
            DEFAULT_DURATION_SECS
        }
    }
}

pub fn words_per_minute(words: usize, duration_secs: f64) -> f64 {
    if duration_secs > 0.0 {
        words as f64 / duration_secs * 60.0
    } else {
        0.0
    }
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
pub(crate) fn wav_bytes(sample_rate: u32, channels: u16, bits: u16, frames: u32) -> Vec<u8> {
    let block_align = channels * bits / 8;
    let data_len = frames * block_align as u32;
    let mut out = Vec::new();
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&bits.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.resize(out.len() + data_len as usize, 0);
    out
}
