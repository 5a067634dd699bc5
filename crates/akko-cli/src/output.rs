use akko_cache::{CachePolicy, LayoutKind};
use colored::Colorize;
use serde_json::Value;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::cli::OutputFormat;

pub fn print_value(value: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", pretty(value)),
        OutputFormat::Table => print_as_table(value),
    }
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

pub fn print_policies(policies: &[CachePolicy], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let rows: Vec<Value> = policies
                .iter()
                .map(|p| {
                    serde_json::json!({
                        "name": p.name,
                        "key_prefix": p.key_prefix,
                        "local_max_entries": p.local_max_entries,
                        "local_ttl_secs": p.local_ttl.as_secs(),
                        "distributed_ttl_secs": p.distributed_ttl.as_secs(),
                        "cache_null_values": p.cache_null_values,
                        "null_ttl_secs": p.effective_null_ttl().as_secs(),
                    })
                })
                .collect();
            println!("{}", pretty(&Value::Array(rows)));
        }
        OutputFormat::Table => {
            let mut builder = Builder::default();
            builder.push_record(["Cache", "Key prefix", "Local max", "Local TTL", "Redis TTL", "Nulls"]);
            for p in policies {
                builder.push_record([
                    p.name.clone(),
                    p.key_prefix.clone(),
                    p.local_max_entries.to_string(),
                    format!("{}s", p.local_ttl.as_secs()),
                    format!("{}s", p.distributed_ttl.as_secs()),
                    if p.cache_null_values {
                        format!("{}s", p.effective_null_ttl().as_secs())
                    } else {
                        "off".to_string()
                    },
                ]);
            }
            println!("{}", builder.build().with(Style::rounded()));
        }
    }
}

/// One provisioned cache in the `status` view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRow {
    pub name: String,
    pub layout: LayoutKind,
    pub key_prefix: String,
}

pub fn print_status(rows: &[StatusRow]) {
    let mut builder = Builder::default();
    builder.push_record(["Cache", "Layout", "Key prefix"]);
    for row in rows {
        builder.push_record([
            row.name.clone(),
            row.layout.to_string(),
            row.key_prefix.clone(),
        ]);
    }
    println!("{}", builder.build().with(Style::rounded()));
}

fn print_as_table(value: &Value) {
    let Some(object) = value.as_object() else {
        println!("{}", pretty(value));
        return;
    };

    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (field, v) in object {
        let rendered = match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        builder.push_record([field.clone(), rendered]);
    }
    println!("{}", builder.build().with(Style::rounded()));
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
