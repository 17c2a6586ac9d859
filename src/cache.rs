use anyhow::{anyhow, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Save a serializable snapshot (token metadata, balances, operations) as JSON.
pub fn save_to_file<T: Serialize>(data: &T, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .map_err(|e| anyhow!("Failed to create cache file {}: {}", path.display(), e))?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, data)
        .map_err(|e| anyhow!("Failed to write cache to {}: {}", path.display(), e))?;
    Ok(())
}

/// Load a snapshot written by `save_to_file`.
pub fn load_from_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| anyhow!("Failed to open cache file {}: {}", path.display(), e))?;
    let reader = BufReader::new(file);
    let data = serde_json::from_reader(reader)
        .map_err(|e| anyhow!("Failed to parse cache file {}: {}", path.display(), e))?;
    Ok(data)
}
