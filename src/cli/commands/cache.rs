//! Cache command - inspect content-addressed cache volumes

use super::Invocation;
use crate::cache::{cache_key_for_set, CacheVolume, FileSet};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::error::StepResult;
use crate::runtime::{BuildClient, PodmanClient};
use crate::ui;
use serde::Serialize;

/// Execute the cache command
pub async fn execute(args: CacheArgs, inv: &Invocation) -> StepResult<()> {
    match args.action {
        CacheAction::Key {
            prefix,
            files,
            require_all,
        } => {
            let key = compute_key(&prefix, &files, require_all, inv).await?;
            println!("{}", key);
            Ok(())
        }
        CacheAction::List { format } => list_caches(format).await,
    }
}

/// Volume name that `prefix` and `files` resolve to
pub async fn compute_key(
    prefix: &str,
    files: &[String],
    require_all: bool,
    inv: &Invocation,
) -> StepResult<String> {
    let mut set = FileSet::new(inv.workdir.clone(), files)?;
    if require_all {
        set = set.require_all();
    }
    let key = cache_key_for_set(prefix, &set, &inv.cancel).await?;
    Ok(key.volume_name())
}

async fn list_caches(format: OutputFormat) -> StepResult<()> {
    let client = PodmanClient::new();
    client.ensure_ready().await?;
    let caches = client.list_volumes().await?;

    if caches.is_empty() && !matches!(format, OutputFormat::Json) {
        println!("No cache volumes found.");
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_cache_table(&caches),
        OutputFormat::Json => print_cache_json(&caches)?,
        OutputFormat::Plain => print_cache_plain(&caches),
    }

    Ok(())
}

fn print_cache_table(caches: &[CacheVolume]) {
    println!("{:<16} {:<20} {:<}", "PREFIX", "CREATED", "VOLUME");
    println!("{}", "-".repeat(100));

    for cache in caches {
        let created = cache
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<16} {:<20} {}",
            cache.prefix.as_deref().unwrap_or("-"),
            created,
            cache.name
        );
    }

    println!();
    ui::key_value("Total", &format!("{} cache(s)", caches.len()));
}

#[derive(Serialize)]
struct CacheJson<'a> {
    name: &'a str,
    prefix: Option<&'a str>,
    digest: Option<&'a str>,
    created_at: Option<String>,
}

fn to_json(caches: &[CacheVolume]) -> StepResult<String> {
    let entries: Vec<CacheJson<'_>> = caches
        .iter()
        .map(|c| CacheJson {
            name: &c.name,
            prefix: c.prefix.as_deref(),
            digest: c.digest.as_deref(),
            created_at: c.created_at.map(|t| t.to_rfc3339()),
        })
        .collect();

    Ok(serde_json::to_string_pretty(&entries)?)
}

fn print_cache_json(caches: &[CacheVolume]) -> StepResult<()> {
    println!("{}", to_json(caches)?);
    Ok(())
}

fn print_cache_plain(caches: &[CacheVolume]) {
    for cache in caches {
        println!("{}", cache.name);
    }
}
