//! Waveform series generation with an on-disk cache.
//!
//! Real waveforms come from the external `audiowaveform` tool. When the tool is
//! unavailable or fails, a pseudo-random series seeded from the track id keeps
//! the output deterministic across runs.

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

use super::tools::find_audiowaveform;

/// Where a series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveformOrigin {
    Cached,
    Tool,
    Fallback,
}

/// The subset of audiowaveform's JSON output we read.
#[derive(Debug, Deserialize)]
struct ToolOutput {
    data: Vec<f64>,
}

/// 64-bit FNV-1a hash.
pub fn fnv1a64(input: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    input.bytes().fold(OFFSET, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(PRIME)
    })
}

/// Deterministic stand-in series for a track: values in [0.3, 0.8).
pub fn fallback_waveform(id: &str, samples: usize) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(fnv1a64(id));
    (0..samples)
        .map(|_| 0.3 + 0.5 * rng.random::<f32>())
        .collect()
}

/// Absolute values scaled so the loudest sample is 1.
pub fn normalize(data: &[f64]) -> Vec<f32> {
    let max = data.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if max <= 0.0 || !max.is_finite() {
        return vec![0.0; data.len()];
    }
    data.iter().map(|v| (v.abs() / max) as f32).collect()
}

/// Length-normalizes `series` to exactly `samples` values: bucket peaks when
/// shrinking, nearest index when stretching.
pub fn resample(series: &[f32], samples: usize) -> Vec<f32> {
    let len = series.len();
    if len == 0 || samples == 0 {
        return vec![0.0; samples];
    }
    if len <= samples {
        return (0..samples).map(|i| series[i * len / samples]).collect();
    }
    (0..samples)
        .map(|i| {
            let start = i * len / samples;
            let end = ((i + 1) * len / samples).max(start + 1);
            series[start..end].iter().copied().fold(0.0, f32::max)
        })
        .collect()
}

pub struct WaveformGenerator {
    cache_dir: PathBuf,
    samples: usize,
    tool: Option<PathBuf>,
}

impl WaveformGenerator {
    /// Creates a generator caching under `cache_dir`. Looks up audiowaveform
    /// once; a missing tool is not an error.
    pub fn new(cache_dir: PathBuf, samples: usize) -> Self {
        let tool = match find_audiowaveform() {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!("Falling back to generated waveforms: {e}");
                None
            }
        };
        Self::with_tool(cache_dir, samples, tool)
    }

    pub fn with_tool(cache_dir: PathBuf, samples: usize, tool: Option<PathBuf>) -> Self {
        Self {
            cache_dir,
            samples,
            tool,
        }
    }

    pub fn cache_path(&self, id: &str) -> PathBuf {
        self.cache_dir.join(format!("{id}.json"))
    }

    fn read_cache(&self, id: &str) -> Option<Vec<f32>> {
        let content = std::fs::read_to_string(self.cache_path(id)).ok()?;
        let series: Vec<f32> = serde_json::from_str(&content).ok()?;
        (series.len() == self.samples).then_some(series)
    }

    async fn run_tool(&self, tool: &Path, audio: &Path, id: &str) -> anyhow::Result<Vec<f32>> {
        let output_path =
            std::env::temp_dir().join(format!("unjazz-{}-{id}.json", std::process::id()));

        let output = tokio::process::Command::new(tool)
            .arg("-i")
            .arg(audio)
            .arg("-o")
            .arg(&output_path)
            .args(["--pixels-per-second", "10", "-b", "8"])
            .output()
            .await?;

        if !output.status.success() {
            let _ = tokio::fs::remove_file(&output_path).await;
            return Err(anyhow::anyhow!(
                "audiowaveform failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        let content = tokio::fs::read_to_string(&output_path).await;
        let _ = tokio::fs::remove_file(&output_path).await;
        let parsed: ToolOutput = serde_json::from_str(&content?)?;
        if parsed.data.is_empty() {
            return Err(anyhow::anyhow!("audiowaveform produced no data"));
        }

        Ok(resample(&normalize(&parsed.data), self.samples))
    }

    /// Returns the series for track `id`, reusing the cache when it has the
    /// configured length. Every freshly computed series is written back.
    pub async fn waveform_for(
        &self,
        id: &str,
        audio: &Path,
    ) -> anyhow::Result<(Vec<f32>, WaveformOrigin)> {
        if let Some(series) = self.read_cache(id) {
            tracing::debug!("Reusing cached waveform for {id}");
            return Ok((series, WaveformOrigin::Cached));
        }

        let computed = match &self.tool {
            Some(tool) => match self.run_tool(tool, audio, id).await {
                Ok(series) => Some(series),
                Err(e) => {
                    tracing::warn!("audiowaveform failed for {}: {e}", audio.display());
                    None
                }
            },
            None => None,
        };

        let (series, origin) = match computed {
            Some(series) => (series, WaveformOrigin::Tool),
            None => (fallback_waveform(id, self.samples), WaveformOrigin::Fallback),
        };

        std::fs::create_dir_all(&self.cache_dir)?;
        std::fs::write(self.cache_path(id), serde_json::to_string(&series)?)?;
        Ok((series, origin))
    }
}
