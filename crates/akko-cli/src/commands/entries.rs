use std::fs;
use std::io::{self, Read};
use std::path::Path;

use akko_cache::{CacheEntry, CacheManager};
use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::Value;

use crate::cli::{CacheArgs, KeyArgs, OutputFormat, PutArgs};
use crate::output::{print_success, print_value, print_warning};

fn read_value(value: Option<&str>, file: Option<&Path>) -> Result<Value> {
    let content = match (value, file) {
        (Some(text), _) => text.to_string(),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?,
        (None, None) => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            buf
        }
    };
    serde_json::from_str(&content).context("Invalid JSON")
}

pub async fn get(manager: &CacheManager, args: &KeyArgs, format: OutputFormat) -> Result<()> {
    let cache = manager.get_cache(&args.cache).await?;
    match cache.get(&args.key).await {
        CacheEntry::Value(value) => print_value(&value, format),
        CacheEntry::Null => println!("{} {}", args.key.cyan(), "cached as absent".yellow()),
        CacheEntry::Miss => anyhow::bail!("Key \"{}\" not found in cache {}", args.key, args.cache),
    }
    Ok(())
}

pub async fn put(manager: &CacheManager, args: &PutArgs) -> Result<()> {
    let cache = manager.get_cache(&args.cache).await?;
    let target = format!("{}/{}", args.cache.cyan(), args.key.cyan());

    if args.null {
        cache.put_null(&args.key).await?;
        print_success(&format!("Cached absence for {target}"));
        return Ok(());
    }

    let value = read_value(args.value.as_deref(), args.file.as_deref())?;
    if args.if_absent {
        let previous = cache.put_if_absent(&args.key, value).await?;
        if previous.is_hit() {
            print_warning(&format!("{target} already cached, left unchanged"));
        } else {
            print_success(&format!("Stored {target}"));
        }
    } else {
        cache.put(&args.key, value).await?;
        print_success(&format!("Stored {target}"));
    }
    Ok(())
}

pub async fn evict(manager: &CacheManager, args: &KeyArgs) -> Result<()> {
    let cache = manager.get_cache(&args.cache).await?;
    cache.evict(&args.key).await?;
    print_success(&format!("Evicted {}/{}", args.cache.cyan(), args.key.cyan()));
    Ok(())
}

pub async fn clear(manager: &CacheManager, args: &CacheArgs) -> Result<()> {
    let cache = manager.get_cache(&args.cache).await?;
    cache.clear().await?;
    print_success(&format!("Cleared cache {}", args.cache.cyan()));
    Ok(())
}
