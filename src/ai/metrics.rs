//! Backend Usage Ledger
//!
//! Per-role counters for calls, failures, tokens, latency and reported cost
//! across one job. Thread-safe for concurrent extraction and scoring.
//!
//! ## Usage
//!
//! ```ignore
//! let ledger = UsageLedger::new(job_id.as_str());
//! ledger.record(AgentRole::Scorer, &response);
//! info!("{}", ledger.summary().display());
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

use crate::ai::provider::LlmResponse;
use crate::config::AgentRole;

#[derive(Default)]
struct RoleCounters {
    calls: AtomicU32,
    failures: AtomicU32,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    latency_ms: AtomicU64,
    /// Microdollars, for atomic accumulation
    cost_micros: AtomicU64,
}

/// Thread-safe usage ledger for one job.
pub struct UsageLedger {
    job_id: String,
    start_time: Instant,
    roles: [RoleCounters; 5],
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoleUsage {
    pub role: AgentRole,
    pub calls: u32,
    pub failures: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub avg_latency_ms: f64,
    pub cost_usd: f64,
}

#[derive(Debug, Clone)]
pub struct UsageSummary {
    pub job_id: String,
    pub elapsed_ms: u64,
    pub roles: Vec<RoleUsage>,
}

fn slot(role: AgentRole) -> usize {
    match role {
        AgentRole::Extractor => 0,
        AgentRole::Scorer => 1,
        AgentRole::Technical => 2,
        AgentRole::Market => 3,
        AgentRole::Risk => 4,
    }
}

impl UsageLedger {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            start_time: Instant::now(),
            roles: Default::default(),
        }
    }

    /// Record a successful call
    pub fn record(&self, role: AgentRole, response: &LlmResponse) {
        let c = &self.roles[slot(role)];
        c.calls.fetch_add(1, Ordering::Relaxed);
        c.input_tokens
            .fetch_add(response.usage.input_tokens as u64, Ordering::Relaxed);
        c.output_tokens
            .fetch_add(response.usage.output_tokens as u64, Ordering::Relaxed);
        c.latency_ms
            .fetch_add(response.timing.total_ms, Ordering::Relaxed);
        c.cost_micros
            .fetch_add((response.cost_usd * 1_000_000.0) as u64, Ordering::Relaxed);
    }

    /// Record a call that produced no usable response
    pub fn record_failure(&self, role: AgentRole) {
        let c = &self.roles[slot(role)];
        c.calls.fetch_add(1, Ordering::Relaxed);
        c.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn summary(&self) -> UsageSummary {
        let roles = AgentRole::ALL
            .iter()
            .map(|&role| {
                let c = &self.roles[slot(role)];
                let calls = c.calls.load(Ordering::Relaxed);
                let failures = c.failures.load(Ordering::Relaxed);
                let succeeded = calls.saturating_sub(failures);
                let latency = c.latency_ms.load(Ordering::Relaxed);
                RoleUsage {
                    role,
                    calls,
                    failures,
                    input_tokens: c.input_tokens.load(Ordering::Relaxed),
                    output_tokens: c.output_tokens.load(Ordering::Relaxed),
                    avg_latency_ms: if succeeded > 0 {
                        latency as f64 / succeeded as f64
                    } else {
                        0.0
                    },
                    cost_usd: c.cost_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0,
                }
            })
            .collect();

        UsageSummary {
            job_id: self.job_id.clone(),
            elapsed_ms: self.start_time.elapsed().as_millis() as u64,
            roles,
        }
    }
}

impl UsageSummary {
    pub fn total_calls(&self) -> u32 {
        self.roles.iter().map(|r| r.calls).sum()
    }

    pub fn total_tokens(&self) -> u64 {
        self.roles
            .iter()
            .map(|r| r.input_tokens + r.output_tokens)
            .sum()
    }

    pub fn total_cost_usd(&self) -> f64 {
        self.roles.iter().map(|r| r.cost_usd).sum()
    }

    pub fn display(&self) -> String {
        let mut out = format!(
            "Job: {}\nDuration: {:.1}s\nCalls: {}\nTokens: {}\nCost: ${:.4}",
            self.job_id,
            self.elapsed_ms as f64 / 1000.0,
            self.total_calls(),
            self.total_tokens(),
            self.total_cost_usd()
        );
        for r in self.roles.iter().filter(|r| r.calls > 0) {
            out.push_str(&format!(
                "\n  {:<10} {:>4} calls ({} failed), {:>7} tokens, {:.0}ms avg",
                r.role.as_str(),
                r.calls,
                r.failures,
                r.input_tokens + r.output_tokens,
                r.avg_latency_ms
            ));
        }
        out
    }
}

/// Shared ledger for pipeline stages
pub type SharedLedger = Arc<UsageLedger>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::{ResponseTiming, TokenUsage};

    fn response(input: u32, output: u32, cost: f64, ms: u64) -> LlmResponse {
        let mut r = LlmResponse::content_only("{}");
        r.usage = TokenUsage {
            input_tokens: input,
            output_tokens: output,
        };
        r.cost_usd = cost;
        r.timing = ResponseTiming { total_ms: ms };
        r
    }

    #[test]
    fn test_record_per_role() {
        let ledger = UsageLedger::new("job-1");
        ledger.record(AgentRole::Scorer, &response(100, 50, 0.0125, 500));
        ledger.record(AgentRole::Scorer, &response(100, 50, 0.0125, 300));
        ledger.record_failure(AgentRole::Risk);

        let summary = ledger.summary();
        let scorer = &summary.roles[1];
        assert_eq!(scorer.role, AgentRole::Scorer);
        assert_eq!(scorer.calls, 2);
        assert_eq!(scorer.avg_latency_ms, 400.0);
        assert!((scorer.cost_usd - 0.025).abs() < 1e-6);

        let risk = &summary.roles[4];
        assert_eq!((risk.calls, risk.failures), (1, 1));
        assert_eq!(summary.total_calls(), 3);
        assert_eq!(summary.total_tokens(), 300);
    }

    #[test]
    fn test_concurrent_recording() {
        use std::thread;

        let ledger = Arc::new(UsageLedger::new("concurrent"));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let l = Arc::clone(&ledger);
                thread::spawn(move || {
                    for _ in 0..100 {
                        l.record(AgentRole::Extractor, &response(10, 5, 0.001, 50));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let summary = ledger.summary();
        assert_eq!(summary.roles[0].calls, 800);
        assert_eq!(summary.total_tokens(), 12_000);
        assert!((summary.total_cost_usd() - 0.8).abs() < 0.001);
    }

    #[test]
    fn test_display_lists_active_roles_only() {
        let ledger = UsageLedger::new("display");
        ledger.record(AgentRole::Market, &response(1000, 500, 0.05, 1000));
        let text = ledger.summary().display();
        assert!(text.contains("display"));
        assert!(text.contains("market"));
        assert!(!text.contains("extractor"));
        assert!(text.contains('$'));
    }
}
