//! Lease arithmetic
//!
//! A lease is the window, ending at `expires_at`, during which a cluster is
//! allowed to exist. Every function here takes "now" as an argument instead
//! of reading the wall clock, so lease math is deterministic under test.

use chrono::{DateTime, Duration, Utc};

use crate::{Error, Result};

/// Lease given to clusters discovered during reconciliation
pub const DISCOVERY_LEASE: Duration = Duration::hours(8);

/// Lease requested by a deploy that does not specify one
pub const DEFAULT_DEPLOY_LEASE: Duration = Duration::hours(8);

/// Extension applied by a renew that does not specify one
pub const DEFAULT_RENEWAL: Duration = Duration::hours(1);

/// Longest lifetime a deploy or a single renewal may request
pub const MAX_LEASE: Duration = Duration::hours(48);

/// Compute the expiry of a lease that starts at `base` and lasts `lifetime`
pub fn compute_expiry(base: DateTime<Utc>, lifetime: Duration) -> DateTime<Utc> {
    base + lifetime
}

/// Time left on a lease. Negative once the lease has lapsed.
pub fn remaining(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    expires_at - now
}

/// Whether a lease has lapsed at `now`
pub fn is_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expires_at <= now
}

/// Bounds on what a caller may request for a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseLimits {
    /// Largest node count a deploy may request
    pub max_nodes: u32,
}

impl Default for LeaseLimits {
    fn default() -> Self {
        Self { max_nodes: 5 }
    }
}

impl LeaseLimits {
    /// Reject lifetimes outside (0, MAX_LEASE]
    pub fn check_lifetime(&self, cluster: &str, lifetime: Duration) -> Result<()> {
        check_lease_duration(cluster, "lifetime", lifetime)
    }

    /// Reject node counts outside [1, max_nodes]
    pub fn check_node_count(&self, cluster: &str, node_count: u32) -> Result<()> {
        if node_count < 1 || node_count > self.max_nodes {
            return Err(Error::validation_for_field(
                cluster,
                "node_count",
                format!(
                    "node count {} is outside 1..={}",
                    node_count, self.max_nodes
                ),
            ));
        }
        Ok(())
    }
}

/// Reject durations outside (0, MAX_LEASE]
///
/// Shared by deploy lifetimes and renewals, which have the same bounds.
pub fn check_lease_duration(cluster: &str, field: &str, duration: Duration) -> Result<()> {
    if duration <= Duration::zero() {
        return Err(Error::validation_for_field(
            cluster,
            field,
            format!("{} must be positive, got {}", field, duration),
        ));
    }
    if duration > MAX_LEASE {
        return Err(Error::validation_for_field(
            cluster,
            field,
            format!(
                "{} of {}h exceeds the {}h maximum",
                field,
                duration.num_hours(),
                MAX_LEASE.num_hours()
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    #[rstest]
    #[case(Duration::zero())]
    #[case(Duration::minutes(1))]
    #[case(Duration::hours(8))]
    #[case(Duration::hours(48))]
    fn expiry_is_base_plus_lifetime(#[case] lifetime: Duration) {
        let expires_at = compute_expiry(t0(), lifetime);
        assert_eq!(expires_at, t0() + lifetime);
        assert_eq!(remaining(expires_at, t0()), lifetime);
    }

    #[rstest]
    #[case::well_before(Duration::hours(-1), false)]
    #[case::one_second_before(Duration::seconds(-1), false)]
    #[case::exactly_at(Duration::zero(), true)]
    #[case::one_second_after(Duration::seconds(1), true)]
    fn expired_at_and_after_deadline(#[case] offset: Duration, #[case] expired: bool) {
        let lifetime = Duration::hours(8);
        let expires_at = compute_expiry(t0(), lifetime);
        let now = t0() + lifetime + offset;
        assert_eq!(is_expired(expires_at, now), expired);
        assert_eq!(is_expired(expires_at, now), now >= t0() + lifetime);
    }

    #[test]
    fn remaining_goes_negative_after_expiry() {
        let expires_at = compute_expiry(t0(), Duration::hours(1));
        let now = t0() + Duration::hours(3);
        assert_eq!(remaining(expires_at, now), Duration::hours(-2));
    }

    #[rstest]
    #[case::zero(Duration::zero(), false)]
    #[case::negative(Duration::hours(-2), false)]
    #[case::one_hour(Duration::hours(1), true)]
    #[case::maximum(Duration::hours(48), true)]
    #[case::over_maximum(Duration::hours(49), false)]
    fn lifetime_bounds(#[case] lifetime: Duration, #[case] ok: bool) {
        let limits = LeaseLimits::default();
        assert_eq!(limits.check_lifetime("lab", lifetime).is_ok(), ok);
    }

    #[rstest]
    #[case(0, false)]
    #[case(1, true)]
    #[case(5, true)]
    #[case(6, false)]
    fn node_count_bounds(#[case] nodes: u32, #[case] ok: bool) {
        let limits = LeaseLimits { max_nodes: 5 };
        assert_eq!(limits.check_node_count("lab", nodes).is_ok(), ok);
    }

    #[test]
    fn validation_error_names_field() {
        let err = check_lease_duration("lab", "renewal", Duration::zero()).unwrap_err();
        match err {
            Error::Validation { cluster, field, .. } => {
                assert_eq!(cluster, "lab");
                assert_eq!(field.as_deref(), Some("renewal"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
