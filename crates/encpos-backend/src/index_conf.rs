//! Index configuration payloads read from `<config_dir>/_global.conf.json`
//! (shared settings) and `<config_dir>/<index>.conf.json` (mappings).

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

pub const GLOBAL_CONF: &str = "_global.conf.json";

/// Payload for `PUT /<index>`, or `None` when either file is missing.
pub fn load_index_conf(config_dir: &Path, index: &str) -> Result<Option<Value>> {
    let Some(global) = read_json(&config_dir.join(GLOBAL_CONF))? else { return Ok(None) };
    let Some(mut payload) = read_json(&config_dir.join(format!("{}.conf.json", index)))? else { return Ok(None) };
    let object = payload
        .as_object_mut()
        .ok_or_else(|| anyhow!("{}.conf.json is not a JSON object", index))?;
    object.insert("settings".to_string(), global);
    Ok(Some(payload))
}

fn read_json(path: &Path) -> Result<Option<Value>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::warn!("conf not found: {}", path.display());
            Ok(None)
        }
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}
