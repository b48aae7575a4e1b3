//! Running cost and cache-hit bookkeeping.

use crate::tokens::{CostEstimate, ModelPricing};
use crate::types::Estimate;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::info;

/// Classification of the running cache-hit ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationLevel {
    High,
    Medium,
    Low,
}

impl OptimizationLevel {
    /// `ratio` is in 0..=1. Above 30% is high, above 15% medium.
    pub fn from_hit_ratio(ratio: f64) -> Self {
        let pct = ratio * 100.0;
        if pct > 30.0 {
            OptimizationLevel::High
        } else if pct > 15.0 {
            OptimizationLevel::Medium
        } else {
            OptimizationLevel::Low
        }
    }
}

/// Snapshot returned by [`CostTracker::stats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostStats {
    pub total_requests: u64,
    pub cached_requests: u64,
    pub failed_requests: u64,
    pub total_tokens: u64,
    pub estimated_cost: Estimate<f64>,
    pub estimated_savings: Estimate<f64>,
    pub cache_hit_ratio: f64,
    pub optimization_level: OptimizationLevel,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    total_requests: u64,
    cached_requests: u64,
    failed_requests: u64,
    total_tokens: u64,
    estimated_cost: f64,
    estimated_savings: f64,
}

/// Process-wide counters. Every counter only grows until [`reset`](Self::reset).
pub struct CostTracker {
    pricing: ModelPricing,
    counters: Mutex<Counters>,
}

impl CostTracker {
    pub fn new(pricing: ModelPricing) -> Self {
        Self {
            pricing,
            counters: Mutex::new(Counters::default()),
        }
    }

    pub fn pricing(&self) -> &ModelPricing {
        &self.pricing
    }

    /// Account one backend call and return its estimated cost.
    pub fn record(&self, input_tokens: u32, output_tokens: u32) -> CostEstimate {
        let estimate = self.pricing.calculate_cost(input_tokens, output_tokens);
        self.with_counters(|c| {
            c.total_requests += 1;
            c.total_tokens += u64::from(input_tokens) + u64::from(output_tokens);
            c.estimated_cost += estimate.total_cost.max(0.0);
        });
        estimate
    }

    /// Account a request served from cache. `saved` is the cost the cached
    /// result originally incurred.
    pub fn record_cache_hit(&self, saved: f64) {
        self.with_counters(|c| {
            c.total_requests += 1;
            c.cached_requests += 1;
            c.estimated_savings += saved.max(0.0);
        });
    }

    /// Account a request whose backend call failed.
    pub fn record_failure(&self) {
        self.with_counters(|c| {
            c.total_requests += 1;
            c.failed_requests += 1;
        });
    }

    pub fn stats(&self) -> CostStats {
        let c = match self.counters.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        };
        let ratio = if c.total_requests == 0 {
            0.0
        } else {
            c.cached_requests as f64 / c.total_requests as f64
        };
        CostStats {
            total_requests: c.total_requests,
            cached_requests: c.cached_requests,
            failed_requests: c.failed_requests,
            total_tokens: c.total_tokens,
            estimated_cost: Estimate::priced(c.estimated_cost),
            estimated_savings: Estimate::priced(c.estimated_savings),
            cache_hit_ratio: ratio,
            optimization_level: OptimizationLevel::from_hit_ratio(ratio),
        }
    }

    /// Zero every counter. Operator action only.
    pub fn reset(&self) {
        self.with_counters(|c| *c = Counters::default());
        info!("cost counters reset");
    }

    fn with_counters(&self, f: impl FnOnce(&mut Counters)) {
        // plain counters stay consistent even if a holder panicked
        let mut guard = match self.counters.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard);
    }
}

impl Default for CostTracker {
    fn default() -> Self {
        Self::new(ModelPricing::default())
    }
}
