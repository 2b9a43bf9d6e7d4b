//! Transcription tier selection from available memory.
//!
//! Accelerator memory is preferred when it can be queried; otherwise system
//! memory is used. In both cases a tier fits when its requirement is at most
//! half of what is free (whole GiB, rounded down). The tier is chosen once
//! per run.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument};

use crate::adapters::MemoryProbe;
use crate::domain::{Device, ResourceTier, TierSelection, GIB};

/// Errors from tier selection
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(
        "Insufficient resources: {available_gib:.1} GiB free on {device}, smallest tier needs {needed_gib} GiB after halving"
    )]
    InsufficientResources {
        device: Device,
        available_gib: f64,
        needed_gib: u64,
    },
}

/// Selects a transcription tier for the run
#[derive(Clone)]
pub struct ResourceProbe {
    memory: Arc<dyn MemoryProbe>,
}

impl ResourceProbe {
    pub fn new(memory: Arc<dyn MemoryProbe>) -> Self {
        Self { memory }
    }

    /// Query memory and pick the most capable tier that fits.
    ///
    /// When an accelerator is present, only accelerator memory is
    /// considered, even if no tier fits it.
    #[instrument(skip(self))]
    pub async fn choose_tier(&self) -> Result<TierSelection, ProbeError> {
        let selection = match self.memory.accelerator_memory().await {
            Some(free) => select_tier(free, Device::Accelerator)?,
            None => select_tier(self.memory.general_memory().await, Device::Cpu)?,
        };

        info!(tier = %selection.tier, device = %selection.device, "Selected transcription tier");
        Ok(selection)
    }
}

/// Pick the first tier (most capable first) whose requirement fits in half
/// of `available_bytes`.
pub fn select_tier(available_bytes: u64, device: Device) -> Result<TierSelection, ProbeError> {
    let budget_gib = available_bytes / GIB / 2;

    ResourceTier::DESCENDING
        .iter()
        .find(|tier| tier.required_gib(device) <= budget_gib)
        .map(|&tier| TierSelection {
            tier,
            device,
            available_bytes,
        })
        .ok_or_else(|| ProbeError::InsufficientResources {
            device,
            available_gib: available_bytes as f64 / GIB as f64,
            needed_gib: ResourceTier::DESCENDING
                .iter()
                .map(|tier| tier.required_gib(device))
                .min()
                .unwrap_or(0),
        })
}
