use anyhow::{Context, Result};
use std::fs::File;
use std::io::prelude::*;
use std::io::BufReader;
use std::path::Path;

pub fn open_file(filename: &Path) -> Result<String> {
    let file =
        File::open(filename).with_context(|| format!("Failed to open file: {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut contents = String::new();
    reader
        .read_to_string(&mut contents)
        .with_context(|| "Failed to read file contents")?;
    Ok(contents)
}

/// Writes `contents` next to `filename` first, then renames over it.
pub fn save_file(filename: &Path, contents: &str) -> Result<()> {
    let temp_filename = filename.with_extension("tmp");

    let mut file = File::create(&temp_filename)
        .with_context(|| format!("Failed to create temporary file: {:?}", temp_filename))?;

    file.write_all(contents.as_bytes())
        .with_context(|| "Failed to write content to temporary file")?;

    file.sync_all()
        .with_context(|| "Failed to sync temporary file")?;

    std::fs::rename(&temp_filename, filename)
        .with_context(|| format!("Failed to rename temporary file to {:?}", filename))?;

    Ok(())
}
