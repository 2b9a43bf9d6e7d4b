//! Whisper transcription backend.
//!
//! Shells out to the local whisper binary. The model for the selected tier
//! is loaded by whisper on each invocation, so an engine here is just the
//! resolved binary, model and device.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use super::{Transcriber, TranscriberFactory};
use crate::domain::{Device, TierSelection};

/// Default whisper binary (resolved via PATH)
pub const DEFAULT_WHISPER_PATH: &str = "whisper";

/// Whisper output JSON structure
#[derive(Debug, Deserialize)]
struct WhisperOutput {
    text: String,
}

/// Factory for whisper CLI engines
#[derive(Debug, Clone)]
pub struct WhisperCli {
    binary_path: PathBuf,
}

impl Default for WhisperCli {
    fn default() -> Self {
        Self::new(DEFAULT_WHISPER_PATH)
    }
}

impl WhisperCli {
    pub fn new(binary_path: impl Into<PathBuf>) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }
}

impl TranscriberFactory for WhisperCli {
    fn name(&self) -> &str {
        "whisper"
    }

    fn initialize(&self, selection: &TierSelection) -> Result<Box<dyn Transcriber>> {
        // Fail early if the binary cannot be started at all
        Command::new(&self.binary_path)
            .arg("--help")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .with_context(|| {
                format!("Failed to start whisper at {}", self.binary_path.display())
            })?;

        Ok(Box::new(WhisperEngine {
            binary_path: self.binary_path.clone(),
            model: selection.tier.model_name().to_string(),
            device: selection.device,
        }))
    }
}

/// A whisper invocation bound to one model and device
#[derive(Debug, Clone)]
pub struct WhisperEngine {
    binary_path: PathBuf,
    model: String,
    device: Device,
}

impl WhisperEngine {
    fn device_arg(&self) -> &'static str {
        match self.device {
            Device::Accelerator => "cuda",
            Device::Cpu => "cpu",
        }
    }
}

impl Transcriber for WhisperEngine {
    fn transcribe(&mut self, media: &Path) -> Result<String> {
        let temp_dir = tempfile::tempdir().context("Failed to create temp dir")?;

        debug!(media = %media.display(), model = %self.model, "Running whisper");

        let output = Command::new(&self.binary_path)
            .arg(media)
            .arg("--model")
            .arg(&self.model)
            .arg("--device")
            .arg(self.device_arg())
            .arg("--output_dir")
            .arg(temp_dir.path())
            .arg("--output_format")
            .arg("json")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .context("Failed to run whisper")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Whisper failed: {}", stderr.trim());
        }

        let stem = media.file_stem().unwrap_or_default().to_string_lossy();
        let json_path = temp_dir.path().join(format!("{}.json", stem));

        let json_content =
            std::fs::read_to_string(&json_path).context("Failed to read whisper output")?;

        parse_whisper_json(&json_content)
    }
}

fn parse_whisper_json(content: &str) -> Result<String> {
    let whisper: WhisperOutput =
        serde_json::from_str(content).context("Failed to parse whisper JSON")?;
    Ok(whisper.text.trim().to_string())
}
