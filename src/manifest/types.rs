//! JSON artifacts shared by the generator and the player.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One playable track as stored in `tracks.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    #[serde(default)]
    pub album_description: String,
    /// Seconds, 0 when unknown
    #[serde(default)]
    pub duration: f64,
    pub filename: String,
    #[serde(default)]
    pub track_number: u32,
    pub url: String,
    #[serde(default)]
    pub artwork: Option<String>,
    /// Site path of the per-track waveform file
    #[serde(default)]
    pub waveform: String,
}

/// Contents of `tracks.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackManifest {
    pub tracks: Vec<Track>,
    pub generated_at: String,
}

/// Contents of `waveforms.json`: track id to amplitude series.
pub type WaveformMap = BTreeMap<String, Vec<f32>>;

/// Track metadata read from an audio file, before URLs are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackMetadata {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub album_description: String,
    pub duration: f64,
    pub filename: String,
    pub track_number: u32,
}

impl TrackMetadata {
    pub fn into_track(self, url: String, artwork: Option<String>, waveform: String) -> Track {
        Track {
            id: self.id,
            title: self.title,
            artist: self.artist,
            album: self.album,
            album_description: self.album_description,
            duration: self.duration,
            filename: self.filename,
            track_number: self.track_number,
            url,
            artwork,
            waveform,
        }
    }
}

/// Orders tracks by album name, then by track number.
pub fn sort_tracks(tracks: &mut [Track]) {
    tracks.sort_by(|a, b| {
        a.album
            .cmp(&b.album)
            .then(a.track_number.cmp(&b.track_number))
    });
}
