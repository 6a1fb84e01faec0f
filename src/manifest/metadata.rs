//! Tag and duration extraction with symphonia.

use std::fs::File;
use std::path::Path;

use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, StandardTagKey, Tag};
use symphonia::core::probe::Hint;

use super::types::TrackMetadata;

/// Track id derived from a file name: stem, lowercased, whitespace runs
/// replaced by a single `-`.
pub fn track_id(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name.to_string());
    stem.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Leading integer of a track number tag such as `"3"` or `"3/12"`.
pub fn parse_track_number(value: &str) -> u32 {
    let digits: String = value
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

#[derive(Debug, Default)]
struct TagFields {
    title: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    comment: Option<String>,
    track_number: Option<u32>,
}

impl TagFields {
    /// Earlier revisions win; only missing fields are filled in.
    fn absorb(&mut self, tags: &[Tag]) {
        for tag in tags {
            let value = tag.value.to_string();
            if value.trim().is_empty() {
                continue;
            }
            let slot = match tag.std_key {
                Some(StandardTagKey::TrackTitle) => &mut self.title,
                Some(StandardTagKey::Artist) => &mut self.artist,
                Some(StandardTagKey::Album) => &mut self.album,
                Some(StandardTagKey::Comment) => &mut self.comment,
                Some(StandardTagKey::TrackNumber) => {
                    if self.track_number.is_none() {
                        self.track_number = Some(parse_track_number(&value));
                    }
                    continue;
                }
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
    }
}

/// Reads tags and duration of `path`, filling gaps with file-derived defaults.
///
/// # Errors
/// - If the file cannot be opened or probed
/// - If it contains no audio track
pub fn extract_metadata(path: &Path, album_dir: &str) -> anyhow::Result<TrackMetadata> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| anyhow::anyhow!("Not a file path: {}", path.display()))?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name.clone());

    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let mut probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut fields = TagFields::default();

    // ID3v2 and similar containers land in the probe metadata
    if let Some(metadata) = probed.metadata.get() {
        if let Some(revision) = metadata.current() {
            fields.absorb(revision.tags());
        }
    }
    if let Some(revision) = probed.format.metadata().current() {
        fields.absorb(revision.tags());
    }

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| anyhow::anyhow!("No audio track found"))?;

    let params = &track.codec_params;
    let duration = match (params.n_frames, params.time_base, params.sample_rate) {
        (Some(frames), Some(time_base), _) => {
            let time = time_base.calc_time(frames);
            time.seconds as f64 + time.frac
        }
        (Some(frames), None, Some(rate)) if rate > 0 => frames as f64 / f64::from(rate),
        _ => 0.0,
    };

    Ok(TrackMetadata {
        id: track_id(&file_name),
        title: fields.title.unwrap_or(stem),
        artist: fields.artist.unwrap_or_else(|| "Unknown Artist".to_string()),
        album: fields.album.unwrap_or_else(|| album_dir.to_string()),
        album_description: fields.comment.unwrap_or_default(),
        duration,
        filename: file_name,
        track_number: fields.track_number.unwrap_or(0),
    })
}
