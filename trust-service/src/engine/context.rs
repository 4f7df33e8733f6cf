//! Network and temporal context factor.

use super::{FactorScorer, RequestContext};
use chrono::Timelike;
use std::net::{IpAddr, Ipv4Addr};

/// Scores the request context: business-hours time component plus a network
/// component favouring private or registered-network addresses. Capped at 100.
pub struct ContextScorer;

const BUSINESS_HOURS_SCORE: f64 = 40.0;
const OFF_HOURS_SCORE: f64 = 20.0;
const TRUSTED_NETWORK_SCORE: f64 = 60.0;
const UNTRUSTED_NETWORK_SCORE: f64 = 40.0;

impl FactorScorer for ContextScorer {
    fn name(&self) -> &str {
        "context"
    }

    fn score(&self, ctx: &RequestContext) -> Option<f64> {
        let hour = ctx.network.at.hour();
        let time_score = if (9..=18).contains(&hour) {
            BUSINESS_HOURS_SCORE
        } else {
            OFF_HOURS_SCORE
        };

        let trusted = match ctx.network.ip {
            Some(ip) => is_private(ip) || in_trusted_network(ip, &ctx.network.trusted_cidrs),
            None => false,
        };
        let network_score = if trusted {
            TRUSTED_NETWORK_SCORE
        } else {
            UNTRUSTED_NETWORK_SCORE
        };

        Some((time_score + network_score).min(100.0))
    }
}

fn is_private(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let octets = v4.octets();
            octets[0] == 10
                || (octets[0] == 192 && octets[1] == 168)
                || (octets[0] == 172 && (16..=31).contains(&octets[1]))
        }
        IpAddr::V6(_) => false,
    }
}

/// Membership test against IPv4 CIDR strings like "10.20.0.0/16". Malformed
/// entries never match.
fn in_trusted_network(ip: IpAddr, cidrs: &[String]) -> bool {
    let IpAddr::V4(ip) = ip else {
        return false;
    };
    cidrs.iter().any(|cidr| cidr_contains(cidr, ip))
}

fn cidr_contains(cidr: &str, ip: Ipv4Addr) -> bool {
    let Some((base, prefix)) = cidr.split_once('/') else {
        return false;
    };
    let (Ok(base), Ok(prefix)) = (base.parse::<Ipv4Addr>(), prefix.parse::<u32>()) else {
        return false;
    };
    if prefix > 32 {
        return false;
    }
    let mask = if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix)
    };
    (u32::from(ip) & mask) == (u32::from(base) & mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{DeviceContext, IdentityContext, NetworkContext};
    use chrono::{TimeZone, Utc};

    fn ctx(ip: Option<&str>, hour: u32, cidrs: Vec<String>) -> RequestContext {
        RequestContext {
            identity: IdentityContext::default(),
            device: DeviceContext::default(),
            network: NetworkContext {
                ip: ip.map(|s| s.parse().unwrap()),
                geo_location: None,
                trusted_cidrs: cidrs,
                at: Utc.with_ymd_and_hms(2025, 3, 10, hour, 30, 0).unwrap(),
            },
        }
    }

    #[test]
    fn private_ip_in_business_hours() {
        let score = ContextScorer.score(&ctx(Some("192.168.1.10"), 11, vec![]));
        assert_eq!(score, Some(100.0));
    }

    #[test]
    fn public_ip_off_hours() {
        let score = ContextScorer.score(&ctx(Some("8.8.8.8"), 3, vec![]));
        assert_eq!(score, Some(60.0));
    }

    #[test]
    fn missing_ip_scores_untrusted() {
        let score = ContextScorer.score(&ctx(None, 11, vec![]));
        assert_eq!(score, Some(80.0));
    }

    #[test]
    fn rfc1918_172_range_bounds() {
        assert!(is_private("172.16.0.1".parse().unwrap()));
        assert!(is_private("172.31.255.254".parse().unwrap()));
        assert!(!is_private("172.15.0.1".parse().unwrap()));
        assert!(!is_private("172.32.0.1".parse().unwrap()));
    }

    #[test]
    fn registered_cidr_counts_as_trusted() {
        let score = ContextScorer.score(&ctx(
            Some("100.64.3.7"),
            11,
            vec!["100.64.0.0/16".to_string()],
        ));
        assert_eq!(score, Some(100.0));
    }

    #[test]
    fn malformed_cidr_never_matches() {
        assert!(!cidr_contains("not-a-cidr", "10.0.0.1".parse().unwrap()));
        assert!(!cidr_contains("10.0.0.0/40", "10.0.0.1".parse().unwrap()));
    }
}
