//! Transcription model tiers and their memory requirements.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Bytes per GiB
pub const GIB: u64 = 1024 * 1024 * 1024;

/// Transcription workload size.
///
/// Ordering follows capability: `Large` is the greatest, `Tiny` the least.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceTier {
    Tiny,
    Base,
    Small,
    Medium,
    Turbo,
    Large,
}

impl ResourceTier {
    /// All tiers, most capable first
    pub const DESCENDING: [ResourceTier; 6] = [
        ResourceTier::Large,
        ResourceTier::Turbo,
        ResourceTier::Medium,
        ResourceTier::Small,
        ResourceTier::Base,
        ResourceTier::Tiny,
    ];

    /// Model name understood by the transcription engine
    pub fn model_name(&self) -> &'static str {
        match self {
            Self::Tiny => "tiny",
            Self::Base => "base",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Turbo => "turbo",
            Self::Large => "large",
        }
    }

    /// Minimum free accelerator memory, in GiB
    pub fn accelerator_gib(&self) -> u64 {
        match self {
            Self::Tiny | Self::Base => 1,
            Self::Small => 2,
            Self::Medium => 5,
            Self::Turbo => 6,
            Self::Large => 10,
        }
    }

    /// Minimum free system memory, in GiB
    pub fn general_gib(&self) -> u64 {
        match self {
            Self::Tiny | Self::Base => 1,
            Self::Small => 3,
            Self::Medium => 6,
            Self::Turbo => 7,
            Self::Large => 10,
        }
    }

    pub fn required_gib(&self, device: Device) -> u64 {
        match device {
            Device::Accelerator => self.accelerator_gib(),
            Device::Cpu => self.general_gib(),
        }
    }
}

impl fmt::Display for ResourceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.model_name())
    }
}

/// Where the transcription workload will run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    Accelerator,
    Cpu,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accelerator => write!(f, "accelerator"),
            Self::Cpu => write!(f, "cpu"),
        }
    }
}

/// A tier together with the device and memory it was sized against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSelection {
    pub tier: ResourceTier,
    pub device: Device,
    pub available_bytes: u64,
}

impl fmt::Display for TierSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} ({:.1} GiB free)",
            self.tier,
            self.device,
            self.available_bytes as f64 / GIB as f64
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descending_is_sorted_by_capability() {
        let mut sorted = ResourceTier::DESCENDING.to_vec();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(sorted, ResourceTier::DESCENDING.to_vec());
        assert!(ResourceTier::Large > ResourceTier::Tiny);
    }

    #[test]
    fn test_requirements_never_increase_down_the_list() {
        for pair in ResourceTier::DESCENDING.windows(2) {
            assert!(pair[0].accelerator_gib() >= pair[1].accelerator_gib());
            assert!(pair[0].general_gib() >= pair[1].general_gib());
        }
    }
}
