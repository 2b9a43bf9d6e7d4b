//! Host memory probes.
//!
//! Accelerator memory comes from `nvidia-smi`; a missing binary or any
//! failure is treated as "no accelerator". System memory comes from sysinfo.

use std::process::Stdio;

use async_trait::async_trait;
use sysinfo::System;
use tokio::process::Command;
use tracing::debug;

use super::MemoryProbe;

const MIB: u64 = 1024 * 1024;

/// Memory probe backed by the local machine
pub struct SystemMemoryProbe {
    /// Path to the nvidia-smi binary
    smi_path: String,
}

impl Default for SystemMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemMemoryProbe {
    pub fn new() -> Self {
        Self {
            smi_path: "nvidia-smi".to_string(),
        }
    }

    /// Use a custom nvidia-smi binary
    pub fn with_smi_path(smi_path: impl Into<String>) -> Self {
        Self {
            smi_path: smi_path.into(),
        }
    }
}

#[async_trait]
impl MemoryProbe for SystemMemoryProbe {
    async fn accelerator_memory(&self) -> Option<u64> {
        let output = Command::new(&self.smi_path)
            .args(["--query-gpu=memory.free", "--format=csv,noheader,nounits"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await;

        let output = match output {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                debug!(status = ?output.status, "nvidia-smi reported failure");
                return None;
            }
            Err(e) => {
                debug!(error = %e, "nvidia-smi not available");
                return None;
            }
        };

        parse_smi_free_mib(&String::from_utf8_lossy(&output.stdout)).map(|mib| mib * MIB)
    }

    async fn general_memory(&self) -> u64 {
        let mut system = System::new();
        system.refresh_memory();
        system.available_memory()
    }
}

/// Parse the first device's free memory (MiB) from nvidia-smi CSV output
fn parse_smi_free_mib(stdout: &str) -> Option<u64> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_smi_first_device() {
        assert_eq!(parse_smi_free_mib("24000\n8000\n"), Some(24000));
        assert_eq!(parse_smi_free_mib("  \n 512 \n"), Some(512));
    }

    #[test]
    fn test_parse_smi_garbage() {
        assert_eq!(parse_smi_free_mib(""), None);
        assert_eq!(parse_smi_free_mib("No devices were found"), None);
    }

    #[tokio::test]
    async fn test_missing_smi_means_no_accelerator() {
        let probe = SystemMemoryProbe::with_smi_path("/nonexistent/nvidia-smi");
        assert_eq!(probe.accelerator_memory().await, None);
    }
}
