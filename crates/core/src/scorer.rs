// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Account scoring: pick the best account under the lowest-utilization
//! policy or the priority-with-threshold-partitioning policy.

use crate::model::{effective_utilization, Account, UsageSnapshot};

/// Render both windows' percentages for an audit-trail reason string, e.g.
/// `"session 42%, weekly 80%"`. A missing window prints as `unknown`.
fn window_percentages(usage: &UsageSnapshot) -> String {
    let session =
        usage.session.as_ref().map(|w| format!("{:.0}%", w.utilization)).unwrap_or_else(|| "unknown".to_string());
    let weekly =
        usage.weekly.as_ref().map(|w| format!("{:.0}%", w.utilization)).unwrap_or_else(|| "unknown".to_string());
    format!("session {session}, weekly {weekly}")
}

/// Utilization at/above this is considered "exhausted" for the priority
/// policy's partitioning step.
const EXHAUSTED_THRESHOLD: f64 = 98.0;

/// One candidate: an account, its token (if any), and its usage snapshot.
pub struct Candidate<'a> {
    pub account: &'a Account,
    pub token: Option<&'a str>,
    pub usage: &'a UsageSnapshot,
}

/// The winning account plus a human-readable audit reason.
pub struct Pick<'a> {
    pub account: &'a Account,
    pub reason: String,
}

#[derive(Clone, Copy, Default)]
pub struct ScorerOptions {
    pub use_priority: bool,
}

fn eligible<'a>(candidates: &'a [Candidate<'a>], exclude: Option<&str>) -> Vec<&'a Candidate<'a>> {
    candidates
        .iter()
        .filter(|c| exclude.map(|ex| c.account.name != ex).unwrap_or(true))
        .filter(|c| c.token.is_some())
        .filter(|c| c.usage.error.is_none())
        .collect()
}

/// Pick the best account. Returns `None` only if the filtered candidate
/// set is empty.
pub fn pick_best<'a>(
    candidates: &'a [Candidate<'a>],
    exclude: Option<&str>,
    opts: ScorerOptions,
) -> Option<Pick<'a>> {
    let pool = eligible(candidates, exclude);
    if pool.is_empty() {
        return None;
    }

    if opts.use_priority {
        pick_by_priority_impl(pool)
    } else {
        pick_lowest_utilization(pool)
    }
}

/// Convenience wrapper forcing the priority policy.
pub fn pick_by_priority<'a>(candidates: &'a [Candidate<'a>], exclude: Option<&str>) -> Option<Pick<'a>> {
    pick_best(candidates, exclude, ScorerOptions { use_priority: true })
}

fn pick_lowest_utilization<'a>(pool: Vec<&'a Candidate<'a>>) -> Option<Pick<'a>> {
    pool.into_iter()
        .enumerate()
        .min_by(|(ia, a), (ib, b)| {
            let ua = effective_utilization(a.usage);
            let ub = effective_utilization(b.usage);
            ua.partial_cmp(&ub).unwrap_or(std::cmp::Ordering::Equal).then(ia.cmp(ib))
        })
        .map(|(_, c)| Pick { account: c.account, reason: format!("lowest utilization: {}", window_percentages(c.usage)) })
}

fn pick_by_priority_impl<'a>(pool: Vec<&'a Candidate<'a>>) -> Option<Pick<'a>> {
    let mut non_exhausted = Vec::new();
    let mut exhausted = Vec::new();
    for (idx, c) in pool.into_iter().enumerate() {
        let util = effective_utilization(c.usage);
        if util < EXHAUSTED_THRESHOLD {
            non_exhausted.push((idx, c, util));
        } else {
            exhausted.push((idx, c, util));
        }
    }

    let partition = if !non_exhausted.is_empty() { non_exhausted } else { exhausted };

    partition
        .into_iter()
        .min_by(|(ia, a, ua), (ib, b, ub)| {
            let pa = a.account.priority.unwrap_or(u32::MAX);
            let pb = b.account.priority.unwrap_or(u32::MAX);
            pa.cmp(&pb).then(ua.partial_cmp(ub).unwrap_or(std::cmp::Ordering::Equal)).then(ia.cmp(ib))
        })
        .map(|(_, c, _util)| {
            let priority = c.account.priority.map(|p| p.to_string()).unwrap_or_else(|| "none".to_string());
            Pick { account: c.account, reason: format!("priority {priority}, {}", window_percentages(c.usage)) }
        })
}

#[cfg(test)]
#[path = "scorer_tests.rs"]
mod tests;
