use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::backend::{BackendClient, DocumentKind, PresentationFormat};
use crate::config::BoqConfig;
use crate::costing::{self, CostingFactors};
use crate::export;
use crate::prompt::{AutoPrompt, ConsolePrompt, Prompt};
use crate::session::{Workspace, STITCHED_CONTAINER};
use crate::stitch;
use crate::table::{FileId, TableEvent};

async fn read_input(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(anyhow!("Input file not found: {:?}", path));
    }
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {:?}", path))
}

async fn write_output(output: Option<&Path>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            tokio::fs::write(path, content).await?;
            info!("Wrote {:?}", path);
        }
        None => println!("{}", content),
    }
    Ok(())
}

/// Normalize a stitched file into a fresh workspace.
async fn mounted_workspace(config: &BoqConfig, input: &Path, file_id: &FileId) -> Result<Workspace> {
    let html = read_input(input).await?;
    let mut workspace = Workspace::new(config.theme.clone());
    let report = workspace.mount_stitched(STITCHED_CONTAINER, file_id, &html)?;
    info!(
        tables = report.tables,
        rows = report.data_rows,
        empty_removed = report.empty_rows_removed,
        "Loaded {:?}",
        input
    );
    Ok(workspace)
}

/// Stitch page files: one layout JSON, or HTML / markdown pages.
pub async fn stitch_command(pages: Vec<PathBuf>, output: Option<PathBuf>) -> Result<()> {
    let is_json = |p: &PathBuf| p.extension().map(|e| e == "json").unwrap_or(false);
    let stitched = if pages.len() == 1 && is_json(&pages[0]) {
        let extraction: Value = serde_json::from_str(&read_input(&pages[0]).await?)?;
        stitch::stitch_layout(&extraction)?
    } else {
        let mut contents = Vec::with_capacity(pages.len());
        for page in &pages {
            contents.push(read_input(page).await?);
        }
        stitch::stitch_pages(&contents)?
    };
    if let Some(message) = &stitched.message {
        eprintln!("{}", message);
    }
    write_output(output.as_deref(), &stitched.stitched_html).await
}

pub async fn normalize_command(
    config: &BoqConfig,
    input: PathBuf,
    file_id: FileId,
    output: Option<PathBuf>,
) -> Result<()> {
    let workspace = mounted_workspace(config, &input, &file_id).await?;
    write_output(output.as_deref(), &workspace.html(STITCHED_CONTAINER)?).await
}

/// Run a JSON array of events against the live table, printing one outcome
/// per line.
pub async fn replay_command(
    config: &BoqConfig,
    input: PathBuf,
    file_id: FileId,
    events: PathBuf,
    yes: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut workspace = mounted_workspace(config, &input, &file_id).await?;
    let events: Vec<TableEvent> = serde_json::from_str(&read_input(&events).await?)?;
    let mut prompt: Box<dyn Prompt> = if yes {
        Box::new(AutoPrompt { answer: true })
    } else {
        Box::new(ConsolePrompt)
    };

    for event in &events {
        match workspace.dispatch(STITCHED_CONTAINER, event, prompt.as_mut()) {
            Ok(outcome) => println!("{}", serde_json::to_string(&outcome)?),
            Err(err) => {
                warn!(error = %err, "Event failed");
                println!("{}", serde_json::json!({ "outcome": "error", "message": err.to_string() }));
            }
        }
    }

    let html = workspace.html(STITCHED_CONTAINER)?;
    match output {
        Some(path) => {
            tokio::fs::write(&path, html).await?;
            info!("Wrote {:?}", path);
        }
        None => eprintln!("{} events replayed", events.len()),
    }
    Ok(())
}

pub async fn extract_command(config: &BoqConfig, input: PathBuf, file_id: FileId) -> Result<()> {
    let workspace = mounted_workspace(config, &input, &file_id).await?;
    let data = workspace.extract(STITCHED_CONTAINER)?;
    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}

pub async fn export_command(
    config: &BoqConfig,
    input: PathBuf,
    file_id: FileId,
    title: String,
    output: Option<PathBuf>,
) -> Result<()> {
    let workspace = mounted_workspace(config, &input, &file_id).await?;
    match output {
        Some(path) => export::write_document(workspace.tables(STITCHED_CONTAINER)?, &title, &path).await?,
        None => println!("{}", workspace.export(STITCHED_CONTAINER, &title)?),
    }
    Ok(())
}

/// Summary of a costing result saved as JSON.
pub async fn summary_command(config: &BoqConfig, costed: PathBuf) -> Result<()> {
    let result: Value = serde_json::from_str(&read_input(&costed).await?)?;
    let result = match result {
        Value::Object(mut map) if map.contains_key("result") => map.remove("result").unwrap_or(Value::Null),
        other => other,
    };
    let tables = costing::costed_tables(result)?;
    let summary = costing::summarize(&tables, config.costing.tax_rate);
    println!("Subtotal:    {}", summary.subtotal_display());
    println!("Tax ({:.0}%):   {}", summary.tax_rate * 100.0, summary.tax_display());
    println!("Grand Total: {}", summary.grand_total_display());
    Ok(())
}

pub async fn fetch_command(config: &BoqConfig, file_id: FileId, output: Option<PathBuf>) -> Result<()> {
    let client = BackendClient::new(&config.backend)?;
    let mut workspace = Workspace::new(config.theme.clone());
    let loaded = workspace.load_from_backend(&client, STITCHED_CONTAINER, &file_id).await;
    let html = workspace.html(STITCHED_CONTAINER)?;
    write_output(output.as_deref(), &html).await?;
    loaded?;
    Ok(())
}

pub async fn cost_command(
    config: &BoqConfig,
    input: PathBuf,
    file_id: FileId,
    factors: CostingFactors,
    output: Option<PathBuf>,
) -> Result<()> {
    let client = BackendClient::new(&config.backend)?;
    let mut workspace = mounted_workspace(config, &input, &file_id).await?;
    let outcome = workspace
        .submit_costing(&client, STITCHED_CONTAINER, &factors, config.costing.tax_rate)
        .await?;
    eprintln!(
        "Subtotal {} / Tax {} / Grand total {}",
        outcome.summary.subtotal_display(),
        outcome.summary.tax_display(),
        outcome.summary.grand_total_display()
    );
    write_output(output.as_deref(), &outcome.html).await
}

pub async fn generate_command(
    config: &BoqConfig,
    kind: DocumentKind,
    file_id: FileId,
    format: Option<PresentationFormat>,
) -> Result<()> {
    let client = BackendClient::new(&config.backend)?;
    let document = client.generate(kind, &file_id, format).await?;
    if let Some(path) = &document.file_path {
        println!("Generated: {}", path);
    }
    println!("Download:  {}", client.download_url(kind, &file_id, format));
    Ok(())
}
