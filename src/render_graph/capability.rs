//! One-time pass selection from backend capabilities and display density.

use crate::backend::Capabilities;

/// Outcome of [`CapabilityPolicy::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityDecision {
    /// Append an [`AntialiasPass`](crate::AntialiasPass) to the pipeline.
    pub insert_antialias_pass: bool,
    /// Sample count for the ping-pong targets (0 = single sampled).
    pub target_samples: u32,
}

/// Decides how the pipeline antialiases, once, at construction.
///
/// | pixel density | native multisample | antialias pass | target samples |
/// |---|---|---|---|
/// | <= 1 | no  | inserted | 0 |
/// | <= 1 | yes | none     | preferred, clamped to the backend max |
/// | > 1  | any | none     | 0 |
///
/// Above a density of 1 aliasing is visually negligible and either form of
/// antialiasing only costs bandwidth. Where the backend can multisample,
/// that is cheaper than an extra pass. Capabilities do not change at
/// runtime, so the decision is not revisited on resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityPolicy {
    /// Sample count requested when multisampled targets are chosen.
    pub preferred_samples: u32,
}

impl Default for CapabilityPolicy {
    fn default() -> Self {
        Self {
            preferred_samples: 4,
        }
    }
}

impl CapabilityPolicy {
    pub fn new(preferred_samples: u32) -> Self {
        Self { preferred_samples }
    }

    pub fn decide(&self, capabilities: Capabilities, pixel_density: f32) -> CapabilityDecision {
        if pixel_density > 1.0 {
            return CapabilityDecision {
                insert_antialias_pass: false,
                target_samples: 0,
            };
        }

        if capabilities.supports_native_multisample {
            let samples = self.preferred_samples.min(capabilities.max_sample_count);
            CapabilityDecision {
                insert_antialias_pass: false,
                target_samples: if samples > 1 { samples } else { 0 },
            }
        } else {
            CapabilityDecision {
                insert_antialias_pass: true,
                target_samples: 0,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MSAA: Capabilities = Capabilities {
        supports_native_multisample: true,
        max_sample_count: 8,
    };

    #[test]
    fn low_density_without_msaa_inserts_pass() {
        let decision = CapabilityPolicy::default().decide(Capabilities::SINGLE_SAMPLE, 1.0);
        assert!(decision.insert_antialias_pass);
        assert_eq!(decision.target_samples, 0);
    }

    #[test]
    fn low_density_with_msaa_uses_target_samples() {
        let decision = CapabilityPolicy::default().decide(MSAA, 1.0);
        assert!(!decision.insert_antialias_pass);
        assert_eq!(decision.target_samples, 4);
    }

    #[test]
    fn high_density_never_antialiases() {
        for caps in [Capabilities::SINGLE_SAMPLE, MSAA] {
            let decision = CapabilityPolicy::default().decide(caps, 2.0);
            assert!(!decision.insert_antialias_pass);
            assert_eq!(decision.target_samples, 0);
        }
    }

    #[test]
    fn preferred_samples_clamp_to_backend_max() {
        let caps = Capabilities {
            supports_native_multisample: true,
            max_sample_count: 2,
        };
        assert_eq!(CapabilityPolicy::new(8).decide(caps, 0.5).target_samples, 2);
        assert_eq!(CapabilityPolicy::new(1).decide(caps, 1.0).target_samples, 0);
    }
}
