//! Config file loading and CLI-over-file-over-default resolution.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use space_export_core::export::constants::DEFAULT_TIMEOUT_SECS;
use space_export_core::{Credentials, DEFAULT_CONCURRENCY, SpaceFilter};
use tracing::{info, warn};

use crate::cli::Args;

/// Output directory used when neither the CLI nor the file names one.
pub(crate) const DEFAULT_OUTPUT_DIR: &str = "confluence_export";

/// Written to the config path when no file exists yet. Every setting is
/// commented out so the defaults still apply.
pub(crate) const CONFIG_TEMPLATE: &str = r#"# space-export configuration
# Values given on the command line override the values in this file.

[confluence]
# confluence_url = "https://your-domain.atlassian.net/wiki"
# username = "you@example.com"
# api_token = "your-api-token"

[export]
# output_dir = "confluence_export"
# max_concurrent = 5
# timeout = 300
# include_personal = false
# include_archived = false
# insecure = false
"#;

/// Settings read from the `key = value` config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FileConfig {
    pub(crate) confluence_url: Option<String>,
    pub(crate) username: Option<String>,
    pub(crate) api_token: Option<String>,
    pub(crate) output_dir: Option<PathBuf>,
    pub(crate) max_concurrent: Option<u8>,
    pub(crate) timeout: Option<u64>,
    pub(crate) include_personal: Option<bool>,
    pub(crate) include_archived: Option<bool>,
    pub(crate) insecure: Option<bool>,
}

impl FileConfig {
    /// Validates config values against the same ranges as the CLI.
    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(max_concurrent) = self.max_concurrent
            && !(1..=100).contains(&max_concurrent)
        {
            bail!(
                "Invalid config value for `max_concurrent`: {max_concurrent}. Expected range: 1..=100"
            );
        }
        if let Some(timeout) = self.timeout
            && !(1..=3600).contains(&timeout)
        {
            bail!("Invalid config value for `timeout`: {timeout}. Expected range: 1..=3600");
        }
        Ok(())
    }
}

/// Fully resolved run settings.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(crate) base_url: String,
    pub(crate) credentials: Credentials,
    pub(crate) output_dir: PathBuf,
    pub(crate) concurrency: usize,
    pub(crate) timeout: Duration,
    pub(crate) filter: SpaceFilter,
    pub(crate) insecure: bool,
}

/// Loads the config file, writing the template first if it does not exist.
pub(crate) fn load_or_create(path: &Path) -> Result<FileConfig> {
    if !path.exists() {
        match fs::write(path, CONFIG_TEMPLATE) {
            Ok(()) => info!(path = %path.display(), "Created config template"),
            Err(error) => {
                warn!(path = %path.display(), error = %error, "Could not write config template");
            }
        }
        return Ok(FileConfig::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

/// Merges CLI arguments over file values over defaults.
pub(crate) fn resolve_settings(args: &Args, file: &FileConfig) -> Result<Settings> {
    let Some(base_url) = pick(args.url.as_ref(), file.confluence_url.as_ref()) else {
        bail!("Missing wiki URL: pass --url or set `confluence_url` in the config file");
    };
    let Some(username) = pick(args.username.as_ref(), file.username.as_ref()) else {
        bail!("Missing username: pass --username or set `username` in the config file");
    };
    let Some(token) = pick(args.token.as_ref(), file.api_token.as_ref()) else {
        bail!("Missing API token: pass --token or set `api_token` in the config file");
    };

    let output_dir = args
        .output
        .clone()
        .or_else(|| file.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
    let concurrency = args
        .concurrent
        .or(file.max_concurrent)
        .map_or(DEFAULT_CONCURRENCY, usize::from);
    let timeout_secs = args.timeout.or(file.timeout).unwrap_or(DEFAULT_TIMEOUT_SECS);

    // flags can only switch a setting on, so an absent flag defers to the file
    let filter = SpaceFilter {
        allow_list: args.spaces.clone(),
        include_personal: args.personal || file.include_personal.unwrap_or(false),
        include_archived: args.archived || file.include_archived.unwrap_or(false),
    };

    Ok(Settings {
        base_url,
        credentials: Credentials::new(username, token),
        output_dir,
        concurrency,
        timeout: Duration::from_secs(timeout_secs),
        filter,
        insecure: args.insecure || file.insecure.unwrap_or(false),
    })
}

fn pick(cli: Option<&String>, file: Option<&String>) -> Option<String> {
    cli.or(file)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_no = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();

        match key {
            "confluence_url" => cfg.confluence_url = Some(parse_string(value)),
            "username" => cfg.username = Some(parse_string(value)),
            "api_token" => cfg.api_token = Some(parse_string(value)),
            "output_dir" => cfg.output_dir = Some(PathBuf::from(parse_string(value))),
            "max_concurrent" => {
                let parsed = parse_integer_u8(value).with_context(|| {
                    format!("Invalid `max_concurrent` value on line {line_no}")
                })?;
                cfg.max_concurrent = Some(parsed);
            }
            "timeout" => {
                let parsed = parse_integer_u64(value)
                    .with_context(|| format!("Invalid `timeout` value on line {line_no}"))?;
                cfg.timeout = Some(parsed);
            }
            "include_personal" => {
                let parsed = parse_boolean(value).with_context(|| {
                    format!("Invalid `include_personal` value on line {line_no}")
                })?;
                cfg.include_personal = Some(parsed);
            }
            "include_archived" => {
                let parsed = parse_boolean(value).with_context(|| {
                    format!("Invalid `include_archived` value on line {line_no}")
                })?;
                cfg.include_archived = Some(parsed);
            }
            "insecure" => {
                let parsed = parse_boolean(value)
                    .with_context(|| format!("Invalid `insecure` value on line {line_no}"))?;
                cfg.insecure = Some(parsed);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

/// Accepts a double-quoted or a bare string.
fn parse_string(raw_value: &str) -> String {
    let trimmed = raw_value.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(trimmed)
        .to_string()
}

fn parse_integer_u8(raw_value: &str) -> Result<u8> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<u16>()?;
    u8::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u8"))
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => bail!("Expected one of: true, false, yes, no, on, off, 1, 0"),
    }
}
