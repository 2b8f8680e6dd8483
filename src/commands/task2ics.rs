use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;

pub async fn run(data_dir: Option<PathBuf>, outfile: Option<PathBuf>) -> Result<()> {
    let icstask = super::open(data_dir)?;

    let ics = icstask
        .to_ics(None, None)
        .await
        .context("Failed to export tasks")?;

    match outfile {
        Some(path) => tokio::fs::write(&path, ics)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(ics.as_bytes()).await?;
            stdout.flush().await?;
        }
    }

    Ok(())
}
