//! Device posture factor.

use super::{FactorScorer, RequestContext};

/// Scores device health from its posture checks.
///
/// A request with no device fingerprint is unscoreable and reads as the
/// worst case. A fingerprinted device with no recorded checks scores the
/// neutral baseline of 50; otherwise the fraction of passing checks.
pub struct PostureScorer;

const BASELINE: f64 = 50.0;

impl FactorScorer for PostureScorer {
    fn name(&self) -> &str {
        "device_posture"
    }

    fn score(&self, ctx: &RequestContext) -> Option<f64> {
        ctx.device.fingerprint.as_ref()?;

        if ctx.device.checks_total == 0 {
            return Some(BASELINE);
        }

        Some(f64::from(ctx.device.checks_passed) / f64::from(ctx.device.checks_total) * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{DeviceContext, IdentityContext, NetworkContext};
    use chrono::{TimeZone, Utc};

    fn ctx(device: DeviceContext) -> RequestContext {
        RequestContext {
            identity: IdentityContext::default(),
            device,
            network: NetworkContext {
                ip: None,
                geo_location: None,
                trusted_cidrs: vec![],
                at: Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap(),
            },
        }
    }

    #[test]
    fn missing_fingerprint_is_unscoreable() {
        let ctx = ctx(DeviceContext {
            fingerprint: None,
            checks_passed: 5,
            checks_total: 5,
        });
        assert_eq!(PostureScorer.score(&ctx), None);
    }

    #[test]
    fn no_checks_scores_baseline() {
        let ctx = ctx(DeviceContext {
            fingerprint: Some("fp-1".to_string()),
            checks_passed: 0,
            checks_total: 0,
        });
        assert_eq!(PostureScorer.score(&ctx), Some(50.0));
    }

    #[test]
    fn fraction_of_passing_checks() {
        let ctx = ctx(DeviceContext {
            fingerprint: Some("fp-1".to_string()),
            checks_passed: 3,
            checks_total: 4,
        });
        assert_eq!(PostureScorer.score(&ctx), Some(75.0));
    }
}
