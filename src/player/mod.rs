//! Playback of manifest tracks: fetching media, audio output and the
//! single-active-track controller.

pub mod backend;
pub mod controller;
pub mod media;

pub use backend::{AudioBackend, RodioBackend};
pub use controller::PlaybackController;
pub use media::MediaFetcher;
