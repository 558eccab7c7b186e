// File: verdict.rs
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use crate::samples::Sample;
use crate::transport::TransportOutcome;

/// How a "blocked" response is recognized. Supplied once per run by the
/// control surface and never mutated.
#[derive(Debug, Clone)]
pub struct DetectionPolicy {
    /// Status code the WAF answers with when it blocks (403 by default,
    /// some deployments use 406, 419, ...).
    pub block_status: u16,
    /// Count an abrupt peer reset as a block (WAFs that drop instead of
    /// answering).
    pub treat_reset_as_block: bool,
    /// Substring of the response body or reason phrase that marks a block
    /// page.
    pub block_keyword: Option<String>,
}

impl Default for DetectionPolicy {
    fn default() -> Self {
        DetectionPolicy {
            block_status: 403,
            treat_reset_as_block: false,
            block_keyword: None,
        }
    }
}

/// The per-sample judgement. Produced exactly once, immutable afterwards.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub sample: Sample,
    pub expected_blocked: bool,
    pub actually_blocked: bool,
    pub correct: bool,
    pub outcome: TransportOutcome,
}

/// Applies the detection policy to a transport outcome. Pure: identical
/// inputs always produce the identical verdict.
pub fn classify(sample: &Sample, outcome: TransportOutcome, policy: &DetectionPolicy) -> Verdict {
    let mut actually_blocked = outcome.status == policy.block_status;
    if policy.treat_reset_as_block && outcome.connection_reset {
        actually_blocked = true;
    }
    if let Some(keyword) = &policy.block_keyword {
        if outcome.body.contains(keyword.as_str()) || outcome.reason.contains(keyword.as_str()) {
            actually_blocked = true;
        }
    }

    let expected_blocked = sample.expected_blocked();
    Verdict {
        sample: sample.clone(),
        expected_blocked,
        actually_blocked,
        correct: expected_blocked == actually_blocked,
        outcome,
    }
}

/// Verdict for a sample that failed before any response could be judged
/// (unreadable file, malformed request line, unresolvable destination).
/// Always counts as incorrect so the failure is visible in the report.
pub fn failure_verdict(sample: &Sample, reason: impl Into<String>) -> Verdict {
    Verdict {
        sample: sample.clone(),
        expected_blocked: sample.expected_blocked(),
        actually_blocked: false,
        correct: false,
        outcome: TransportOutcome::synthetic(reason, false, Duration::ZERO),
    }
}
