//! Asset command handlers

use std::path::PathBuf;

use anyhow::{Context, Result};

use invite_core::data_url::sniff_mime;
use invite_core::{AssetId, Store};

use crate::output::Output;

/// Write an asset's bytes to a file
pub fn get(store: &Store, id: AssetId, out: PathBuf, output: &Output) -> Result<()> {
    let asset = store.resolve_asset(id)?;
    std::fs::write(&out, &asset.blob).with_context(|| format!("Failed to write {:?}", out))?;

    output.print_report(
        &format!(
            "✓ Wrote asset {} ({}, {} bytes, project {}) to {}",
            asset.id,
            sniff_mime(&asset.blob),
            asset.blob.len(),
            asset.project_id,
            out.display()
        ),
        &serde_json::json!({
            "id": asset.id,
            "project": asset.project_id,
            "mime": sniff_mime(&asset.blob),
            "bytes": asset.blob.len(),
            "path": out,
        }),
    );
    Ok(())
}
