//! Pipeline options from an optional TOML file plus command-line overrides.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use order_ingest::normalize_header;
use order_model::{ExtraFieldPolicy, MissingKeyPolicy, PipelineOptions};

/// Flag values that win over the config file. `None`/`false` leaves the
/// file's value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionOverrides {
    pub missing_key_policy: Option<MissingKeyPolicy>,
    pub reject_extra_fields: bool,
    pub chunk_size: Option<usize>,
    pub no_parallel: bool,
    pub delimiter: Option<char>,
}

impl OptionOverrides {
    pub fn apply(&self, mut options: PipelineOptions) -> PipelineOptions {
        if let Some(policy) = self.missing_key_policy {
            options = options.with_missing_key_policy(policy);
        }
        if self.reject_extra_fields {
            options = options.with_extra_field_policy(ExtraFieldPolicy::Reject);
        }
        if let Some(size) = self.chunk_size {
            options = options.with_chunk_size(size);
        }
        if self.no_parallel {
            options = options.with_parallel(false);
        }
        if let Some(delimiter) = self.delimiter {
            options = options.with_delimiter(delimiter);
        }
        options
    }
}

pub fn load_options_file(path: &Path) -> Result<PipelineOptions> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("parse config {}", path.display()))
}

pub fn resolve_options(config: Option<&Path>, overrides: &OptionOverrides) -> Result<PipelineOptions> {
    let base = match config {
        Some(path) => load_options_file(path)?,
        None => PipelineOptions::default(),
    };
    Ok(overrides.apply(base))
}

/// Parse a `name=value` form assignment. The name is normalized like an
/// upload header, so `"Order Item Quantity=2"` sets `order_item_quantity`.
pub fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let name = normalize_header(name);
    if name.is_empty() {
        return Err(format!("empty field name in '{raw}'"));
    }
    Ok((name, value.to_string()))
}

/// Collect assignments into a form, rejecting a field given twice.
pub fn form_fields(assignments: &[(String, String)]) -> Result<BTreeMap<String, String>> {
    let mut fields = BTreeMap::new();
    for (name, value) in assignments {
        if fields.insert(name.clone(), value.clone()).is_some() {
            bail!("field '{name}' given more than once");
        }
    }
    Ok(fields)
}
