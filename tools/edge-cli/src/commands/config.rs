//! Configuration management commands.

use std::fs;

use anyhow::{bail, Result};
use edge_cache::PartitionSet;
use url::Url;

use super::{ConfigArgs, ConfigCommand};
use crate::config::{generate_default_config, CliConfig};
use crate::context::Context;

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx).await,
        ConfigCommand::Init { origin, force } => init_config(&origin, force, ctx).await,
        ConfigCommand::Validate => validate_config(ctx).await,
    }
}

async fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    match &ctx.config_path {
        Some(path) => ctx.output.kv("file", &path.display().to_string()),
        None => ctx.output.kv("file", "(defaults)"),
    }
    if let Some(ref origin) = ctx.config.origin {
        ctx.output.kv("origin", origin);
    }

    let worker = &ctx.config.worker;

    // Worker section
    ctx.output.info("");
    ctx.output.info("[worker]");
    ctx.output.kv("version", &worker.version);
    ctx.output.kv("sweep_interval_secs", &worker.sweep_interval_secs.to_string());
    ctx.output.kv("sync_tag", &worker.sync_tag);
    ctx.output.kv("explain_headers", &worker.explain_headers.to_string());

    // Precache manifest
    ctx.output.info("");
    ctx.output.info(&format!("[worker.precache] ({} entries)", worker.precache.len()));
    for url in &worker.precache {
        ctx.output.list_item(url);
    }

    // Partitions
    let partitions = PartitionSet::from_config(worker);
    ctx.output.info("");
    ctx.output.info("[worker.partitions]");
    ctx.output.kv("static", &partitions.static_partition);
    ctx.output.kv("dynamic", &partitions.dynamic_partition);
    ctx.output.kv("image", &partitions.image_partition);

    // Classifier
    let rules = &worker.classifier;
    ctx.output.info("");
    ctx.output.info("[worker.classifier]");
    ctx.output.kv("static_prefixes", &rules.static_prefixes.join(", "));
    ctx.output.kv("manifest_files", &rules.manifest_files.join(", "));
    ctx.output.kv("image_extensions", &rules.image_extensions.join(", "));
    ctx.output.kv("api_segment", &rules.api_segment);
    ctx.output.kv("telemetry_hosts", &rules.telemetry_hosts.join(", "));

    // Logging
    ctx.output.info("");
    ctx.output.info("[logging]");
    ctx.output.kv("level", &ctx.config.logging.level.to_string());
    ctx.output.kv("format", &format!("{:?}", ctx.config.logging.format).to_lowercase());

    Ok(())
}

async fn init_config(origin: &str, force: bool, ctx: &Context) -> Result<()> {
    let config_path = ctx.cwd.join("edge.toml");

    if config_path.exists() && !force {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    if Url::parse(origin).is_err() {
        bail!("Invalid origin: {}", origin);
    }

    let content = generate_default_config(origin);
    fs::write(&config_path, content)?;

    ctx.output.success(&format!("Created: {}", config_path.display()));

    Ok(())
}

async fn validate_config(ctx: &Context) -> Result<()> {
    ctx.output.header("Validating configuration");

    let (errors, warnings) = check_config(&ctx.config);

    // Print results
    if errors.is_empty() && warnings.is_empty() {
        ctx.output.success("Configuration is valid");
        return Ok(());
    }

    for error in &errors {
        ctx.output.error(&format!("Error: {}", error));
    }

    for warning in &warnings {
        ctx.output.warn(&format!("Warning: {}", warning));
    }

    if !errors.is_empty() {
        bail!("Configuration has {} error(s)", errors.len());
    }

    ctx.output.success("Configuration is valid (with warnings)");

    Ok(())
}

fn check_config(config: &CliConfig) -> (Vec<String>, Vec<String>) {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    if let Err(e) = config.worker.validate() {
        errors.push(format!("worker: {}", e));
    }

    match config.origin.as_deref() {
        Some(origin) => {
            if Url::parse(origin).is_err() {
                errors.push(format!("origin '{}' is not a valid URL", origin));
            }
        }
        None => warnings.push("origin is not set; `edge replay` will need --origin".to_string()),
    }

    if config.worker.precache.is_empty() {
        warnings.push("worker.precache is empty; nothing is available offline after install".to_string());
    }

    let rules = &config.worker.classifier;
    if rules.api_segment.contains('/') {
        errors.push("worker.classifier.api_segment must be a single path segment".to_string());
    }
    for ext in &rules.image_extensions {
        if ext.starts_with('.') {
            warnings.push(format!(
                "worker.classifier.image_extensions entry '{}' should not start with '.'",
                ext
            ));
        }
    }
    for prefix in &rules.static_prefixes {
        if !prefix.starts_with('/') {
            errors.push(format!(
                "worker.classifier.static_prefixes entry '{}' must start with '/'",
                prefix
            ));
        }
    }

    (errors, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_config_is_clean() {
        let config: CliConfig = toml::from_str(&generate_default_config("http://localhost:3000")).unwrap();
        let (errors, warnings) = check_config(&config);

        assert!(errors.is_empty(), "{:?}", errors);
        assert!(warnings.is_empty(), "{:?}", warnings);
    }

    #[test]
    fn test_missing_origin_is_a_warning() {
        let (errors, warnings) = check_config(&CliConfig::default());

        assert!(errors.is_empty());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let mut config = CliConfig::default();
        config.origin = Some("not a url".to_string());
        config.worker.version = "".to_string();
        config.worker.classifier.api_segment = "v1/api".to_string();
        config.worker.classifier.static_prefixes = vec!["static/".to_string()];

        let (errors, _) = check_config(&config);

        assert_eq!(errors.len(), 4);
        assert!(errors[0].contains("version"));
    }
}
