use anyhow::{bail, Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

pub const SIDECAR_EXTENSION: &str = "json";

pub trait Tagger {
    fn tag(&self, path: &Path) -> Result<Vec<String>>;

    fn persist(&self, image_path: &Path, tags: &[String]) -> Result<PathBuf> {
        write_sidecar(image_path, tags)
    }
}

/// Used when tagging is disabled; never produces labels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTagger;

impl Tagger for NoopTagger {
    fn tag(&self, _path: &Path) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Runs an external classifier with the image path as the last argument and
/// reads one label per non-empty stdout line.
#[derive(Debug, Clone)]
pub struct CommandTagger {
    program: String,
    args: Vec<String>,
}

impl CommandTagger {
    pub fn new(command: &[String]) -> Result<Self> {
        let Some((program, args)) = command.split_first() else {
            bail!("tagging command is empty");
        };
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl Tagger for CommandTagger {
    fn tag(&self, path: &Path) -> Result<Vec<String>> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .output()
            .with_context(|| format!("failed to run tagger: {}", self.program))?;
        if !output.status.success() {
            bail!(
                "tagger exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(parse_labels(&String::from_utf8_lossy(&output.stdout)))
    }
}

fn parse_labels(stdout: &str) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for line in stdout.lines() {
        let label = line.trim();
        if !label.is_empty() && !labels.iter().any(|l| l == label) {
            labels.push(label.to_string());
        }
    }
    labels
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TagSidecar {
    pub image_path: PathBuf,
    pub tags: Vec<String>,
    pub timestamp: String,
}

pub fn sidecar_path(image_path: &Path) -> PathBuf {
    image_path.with_extension(SIDECAR_EXTENSION)
}

pub fn write_sidecar(image_path: &Path, tags: &[String]) -> Result<PathBuf> {
    let path = sidecar_path(image_path);
    if path.exists() {
        // IMG.jpg and IMG.png in one directory share IMG.json
        log::warn!("replacing existing tag sidecar {}", path.display());
    }
    let sidecar = TagSidecar {
        image_path: image_path.to_path_buf(),
        tags: tags.to_vec(),
        timestamp: Local::now().to_rfc3339(),
    };
    let body = serde_json::to_string_pretty(&sidecar).context("failed to serialize tags")?;
    fs::write(&path, body)
        .with_context(|| format!("failed to write tag sidecar: {}", path.display()))?;
    Ok(path)
}
