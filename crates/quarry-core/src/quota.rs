//! Quota accounting for the metered external API.
//!
//! [`QuotaLedger`] is the single gate for spending budget. Every call that
//! costs quota must be authorized first; a denied authorization changes
//! nothing, so `consumed` can never exceed `limit`.
//!
//! A ledger started with [`QuotaLedger::fresh`] authorizes against a full
//! budget but still reports the period's earlier usage through
//! [`QuotaLedger::usage`], so a recorded total never goes backwards.

use chrono::NaiveDate;

use crate::QuotaUsage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaLedger {
    consumed: u64,
    limit: u64,
    period: NaiveDate,
    /// Usage recorded earlier in the period that does not count against `limit`.
    baseline: u64,
}

impl QuotaLedger {
    /// Creates a ledger with nothing consumed.
    pub fn new(limit: u64, period: NaiveDate) -> Self {
        Self {
            consumed: 0,
            limit,
            period,
            baseline: 0,
        }
    }

    /// Resumes a ledger from a previously recorded usage.
    ///
    /// Usage from a different period is ignored. A stored value above the
    /// limit (for example after the limit was lowered) is capped.
    pub fn resume(limit: u64, previous: Option<QuotaUsage>, period: NaiveDate) -> Self {
        let consumed = previous
            .filter(|usage| usage.period == period)
            .map_or(0, |usage| usage.consumed.min(limit));
        Self {
            consumed,
            limit,
            period,
            baseline: 0,
        }
    }

    /// Starts a full budget while keeping the period's recorded usage.
    ///
    /// Authorization ignores `previous`, but [`usage`](Self::usage) reports
    /// it plus whatever this ledger spends.
    pub fn fresh(limit: u64, previous: Option<QuotaUsage>, period: NaiveDate) -> Self {
        let baseline = previous
            .filter(|usage| usage.period == period)
            .map_or(0, |usage| usage.consumed);
        Self {
            baseline,
            ..Self::new(limit, period)
        }
    }

    /// Spends `cost` iff it fits in the remaining budget.
    pub fn authorize(&mut self, cost: u64) -> bool {
        match self.consumed.checked_add(cost) {
            Some(total) if total <= self.limit => {
                self.consumed = total;
                true
            }
            _ => false,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.consumed)
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn period(&self) -> NaiveDate {
        self.period
    }

    /// Total spent in the period, including any recorded baseline.
    pub fn usage(&self) -> QuotaUsage {
        QuotaUsage {
            period: self.period,
            consumed: self.baseline.saturating_add(self.consumed),
        }
    }
}
