use std::path::PathBuf;

use anyhow::{Context, Result};
use icstask_core::ics::parse_todos;
use tokio::io::AsyncReadExt;

pub async fn run(infile: Option<PathBuf>, data_dir: Option<PathBuf>, project: Option<String>) -> Result<()> {
    let content = match infile {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut content = String::new();
            tokio::io::stdin()
                .read_to_string(&mut content)
                .await
                .context("Failed to read stdin")?;
            content
        }
    };

    let icstask = super::open(data_dir)?;
    let todos = parse_todos(&content, icstask.timezone()).context("Failed to parse iCalendar input")?;

    for todo in &todos {
        let uid = icstask
            .append_vobject(todo, project.as_deref())
            .await
            .with_context(|| format!("Failed to import '{}'", todo.summary.as_deref().unwrap_or(&todo.uid)))?;
        log::info!("Imported {}", uid);
    }

    if todos.is_empty() {
        log::warn!("No VTODO found in input");
    }

    Ok(())
}
