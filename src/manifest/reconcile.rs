//! Diffing local files against the assets already attached to a release.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use super::release::ReleaseAsset;

/// Release asset name for `file` inside `album_dir`, normalized the way
/// GitHub stores it: anything outside `[A-Za-z0-9._-]` becomes `.`.
pub fn asset_name(album_dir: &str, file: &str) -> String {
    format!("{album_dir}-{file}")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '.'
            }
        })
        .collect()
}

/// A local file that should exist as a release asset.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpectedAsset {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

/// What to do with every expected and existing asset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetPlan {
    /// Already uploaded with the same size
    pub keep: Vec<ReleaseAsset>,
    /// Not uploaded yet
    pub upload: Vec<ExpectedAsset>,
    /// Uploaded with a different size: delete the old asset, then upload
    pub replace: Vec<(ReleaseAsset, ExpectedAsset)>,
    /// Uploaded but no longer backed by a local file
    pub orphans: Vec<ReleaseAsset>,
}

impl AssetPlan {
    pub fn is_noop(&self) -> bool {
        self.upload.is_empty() && self.replace.is_empty() && self.orphans.is_empty()
    }
}

/// Classifies `expected` against `existing`. The first expected entry wins
/// when two local files normalize to the same name.
pub fn plan_assets(expected: &[ExpectedAsset], existing: &[ReleaseAsset]) -> AssetPlan {
    let by_name: BTreeMap<&str, &ReleaseAsset> =
        existing.iter().map(|a| (a.name.as_str(), a)).collect();

    let mut plan = AssetPlan::default();
    let mut seen: HashSet<&str> = HashSet::new();

    for wanted in expected {
        if !seen.insert(wanted.name.as_str()) {
            tracing::warn!(
                "Skipping {}: another file already maps to asset {}",
                wanted.path.display(),
                wanted.name
            );
            continue;
        }
        match by_name.get(wanted.name.as_str()) {
            Some(current) if current.size == wanted.size => plan.keep.push((*current).clone()),
            Some(current) => plan.replace.push(((*current).clone(), wanted.clone())),
            None => plan.upload.push(wanted.clone()),
        }
    }

    plan.orphans = existing
        .iter()
        .filter(|a| !seen.contains(a.name.as_str()))
        .cloned()
        .collect();

    plan
}
