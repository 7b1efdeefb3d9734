//! Entitlement ledger
//!
//! Tracks a per-account monthly generation counter against a limit derived from
//! the account's plan. The limit is never stored; it is looked up through
//! [`PlanLimits`] at the moment of every check so plan and configuration changes
//! apply on the next request.

use crate::database::entities::{Plan, UserRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

pub mod config;
pub mod ledger;

pub use config::{PlanSettings, PlansConfig};
pub use ledger::{ConsumeOutcome, EntitlementLedger, UsageSummary};

/// Monthly generation allowance of a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanLimit {
    Limited(u32),
    Unbounded,
}

impl PlanLimit {
    /// Whether one more generation fits on top of `used`
    pub fn allows(&self, used: u32) -> bool {
        match self {
            PlanLimit::Limited(limit) => used < *limit,
            PlanLimit::Unbounded => true,
        }
    }

    /// Generations left in the period, `None` when unbounded
    pub fn remaining(&self, used: u32) -> Option<u32> {
        match self {
            PlanLimit::Limited(limit) => Some(limit.saturating_sub(used)),
            PlanLimit::Unbounded => None,
        }
    }

    pub fn as_option(&self) -> Option<u32> {
        match self {
            PlanLimit::Limited(limit) => Some(*limit),
            PlanLimit::Unbounded => None,
        }
    }
}

/// Plan to limit mapping built from the `plans` configuration section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanLimits {
    free: PlanLimit,
    pro: PlanLimit,
    enterprise: PlanLimit,
    admin: PlanLimit,
}

impl PlanLimits {
    pub fn new(free: PlanLimit, pro: PlanLimit, enterprise: PlanLimit, admin: PlanLimit) -> Self {
        Self {
            free,
            pro,
            enterprise,
            admin,
        }
    }

    pub fn limit_for(&self, plan: Plan) -> PlanLimit {
        match plan {
            Plan::Free => self.free,
            Plan::Pro => self.pro,
            Plan::Enterprise => self.enterprise,
            Plan::Admin => self.admin,
        }
    }
}

impl Default for PlanLimits {
    fn default() -> Self {
        PlansConfig::default().limits()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntitlementState {
    Active,
    Exhausted,
}

/// In-memory view of one account's entitlement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entitlement {
    pub account_id: i32,
    pub plan: Plan,
    pub used: u32,
    pub period_start: DateTime<Utc>,
}

impl Entitlement {
    pub fn new(account_id: i32, plan: Plan) -> Self {
        Self {
            account_id,
            plan,
            used: 0,
            period_start: Utc::now(),
        }
    }

    pub fn from_user(user: &UserRecord) -> Self {
        Self {
            account_id: user.id,
            plan: user.plan,
            // The column is never negative; clamp anything odd written outside the ledger
            used: u32::try_from(user.generations_used).unwrap_or(0),
            period_start: user.period_start,
        }
    }

    pub fn limit(&self, limits: &PlanLimits) -> PlanLimit {
        limits.limit_for(self.plan)
    }

    /// True iff `used < limit`, or always for unbounded plans. No side effects.
    pub fn can_consume(&self, limits: &PlanLimits) -> bool {
        self.limit(limits).allows(self.used)
    }

    /// Count one generation. Does not look at the limit.
    pub fn record_consumption(&mut self) {
        self.used = self.used.saturating_add(1);
    }

    /// Start a new counting window
    pub fn reset_period(&mut self) {
        self.used = 0;
        self.period_start = Utc::now();
    }

    /// Switch plans, leaving `used` untouched
    pub fn change_plan(&mut self, plan: Plan) {
        self.plan = plan;
    }

    pub fn state(&self, limits: &PlanLimits) -> EntitlementState {
        if self.can_consume(limits) {
            EntitlementState::Active
        } else {
            EntitlementState::Exhausted
        }
    }
}
