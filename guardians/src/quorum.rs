//! Quorum strategies.
//!
//! How many approvals a request needs, and whether a given set of approvers
//! meets that bar, is policy, injected as a [`QuorumPolicy`]. Fractions are
//! held in basis points so `ceil(count * fraction)` is exact.

use keyward_store::GuardianRecord;
use keyward_types::{AccountRole, GuardianId, RequestType};

const BPS_DENOMINATOR: u64 = 10_000;

pub trait QuorumPolicy: Send + Sync {
    /// Approvals required from `guardians` (active, non-empty) for `request_type`.
    ///
    /// Implementations return a value in `1..=guardians.len()`.
    fn required_approvals(&self, guardians: &[GuardianRecord], request_type: RequestType) -> u32;

    /// Whether `approvers` meet the policy over `electorate`, for a request
    /// that recorded `required` approvals at creation.
    ///
    /// Counting policies compare the number of approvers; weighted policies
    /// look at who approved.
    fn is_satisfied(
        &self,
        _electorate: &[GuardianRecord],
        approvers: &[GuardianId],
        required: u32,
    ) -> bool {
        approvers.len() as u32 >= required
    }

    fn name(&self) -> &'static str;
}

/// Convert a fraction in `(0, 1]` to basis points, clamped to `1..=10_000`.
fn fraction_to_bps(fraction: f64) -> u64 {
    let bps = (fraction * BPS_DENOMINATOR as f64).round();
    if bps.is_nan() || bps < 1.0 {
        1
    } else if bps > BPS_DENOMINATOR as f64 {
        BPS_DENOMINATOR
    } else {
        bps as u64
    }
}

fn ceil_bps(value: u64, bps: u64) -> u64 {
    (value * bps).div_ceil(BPS_DENOMINATOR)
}

fn clamp_to_set(required: u64, guardian_count: usize) -> u32 {
    required.clamp(1, guardian_count.max(1) as u64) as u32
}

/// `ceil(guardian_count * fraction)`, the default consensus rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FractionalQuorum {
    bps: u64,
}

impl FractionalQuorum {
    pub fn from_fraction(fraction: f64) -> Self {
        Self {
            bps: fraction_to_bps(fraction),
        }
    }

    pub fn bps(&self) -> u64 {
        self.bps
    }
}

impl QuorumPolicy for FractionalQuorum {
    fn required_approvals(&self, guardians: &[GuardianRecord], _request_type: RequestType) -> u32 {
        let required = ceil_bps(guardians.len() as u64, self.bps);
        clamp_to_set(required, guardians.len())
    }

    fn name(&self) -> &'static str {
        "fractional"
    }
}

/// A fixed approval count, capped at the number of guardians.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedQuorum {
    pub count: u32,
}

impl QuorumPolicy for FixedQuorum {
    fn required_approvals(&self, guardians: &[GuardianRecord], _request_type: RequestType) -> u32 {
        clamp_to_set(self.count as u64, guardians.len())
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// Role-weighted quorum: guardians carry weight by role, and the request needs
/// approvals worth at least `fraction` of the electorate's total weight.
///
/// `required_approvals` reports the smallest number of approvers that can
/// reach that weight (heaviest first). It is a lower bound only;
/// [`is_satisfied`](QuorumPolicy::is_satisfied) checks the weight actually approved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WeightedRoleQuorum {
    bps: u64,
}

impl WeightedRoleQuorum {
    pub fn from_fraction(fraction: f64) -> Self {
        Self {
            bps: fraction_to_bps(fraction),
        }
    }

    fn needed_weight(&self, electorate: &[GuardianRecord]) -> u64 {
        let total: u64 = electorate.iter().map(|g| Self::weight(g.role)).sum();
        ceil_bps(total, self.bps)
    }

    /// Approval weight per role.
    pub fn weight(role: AccountRole) -> u64 {
        match role {
            AccountRole::Guardian => 3,
            AccountRole::Steward => 2,
            AccountRole::Adult | AccountRole::Offspring => 1,
            AccountRole::Private => 0,
        }
    }
}

impl QuorumPolicy for WeightedRoleQuorum {
    fn required_approvals(&self, guardians: &[GuardianRecord], _request_type: RequestType) -> u32 {
        let mut weights: Vec<u64> = guardians.iter().map(|g| Self::weight(g.role)).collect();
        weights.sort_unstable_by(|a, b| b.cmp(a));
        let needed = self.needed_weight(guardians);

        let mut acc = 0u64;
        let mut count = 0u64;
        for w in weights {
            if acc >= needed {
                break;
            }
            acc += w;
            count += 1;
        }
        clamp_to_set(count, guardians.len())
    }

    fn is_satisfied(
        &self,
        electorate: &[GuardianRecord],
        approvers: &[GuardianId],
        required: u32,
    ) -> bool {
        if (approvers.len() as u32) < required {
            return false;
        }
        let approved: u64 = electorate
            .iter()
            .filter(|g| approvers.contains(&g.guardian_id))
            .map(|g| Self::weight(g.role))
            .sum();
        approved >= self.needed_weight(electorate)
    }

    fn name(&self) -> &'static str {
        "weighted_role"
    }
}
