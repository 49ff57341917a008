//! Core data types for URL verification.
//!
//! This module defines the threat categories that can be queried, the
//! per-URL verdicts, the result set a run accumulates, the distribution
//! computed from persisted results, and the pool configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Threat lists the Web Risk API can match a URL against.
///
/// `THREAT_TYPE_UNSPECIFIED` is deliberately absent: the API never matches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreatCategory {
    /// Malicious software targeting any platform
    Malware,
    /// Deceptive sites that trick users into revealing information
    SocialEngineering,
    /// Software that degrades the user experience without being malware
    UnwantedSoftware,
    /// Extended-coverage social engineering list
    SocialEngineeringExtendedCoverage,
}

impl ThreatCategory {
    /// Every category, in the order queried by default.
    pub const ALL: [ThreatCategory; 4] = [
        ThreatCategory::Malware,
        ThreatCategory::SocialEngineering,
        ThreatCategory::UnwantedSoftware,
        ThreatCategory::SocialEngineeringExtendedCoverage,
    ];

    /// Wire name used by the API and in result files.
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatCategory::Malware => "MALWARE",
            ThreatCategory::SocialEngineering => "SOCIAL_ENGINEERING",
            ThreatCategory::UnwantedSoftware => "UNWANTED_SOFTWARE",
            ThreatCategory::SocialEngineeringExtendedCoverage => {
                "SOCIAL_ENGINEERING_EXTENDED_COVERAGE"
            }
        }
    }
}

impl fmt::Display for ThreatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThreatCategory {
    type Err = String;

    /// Parse a category name case-insensitively (`malware`, `MALWARE`, `Social_Engineering`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase().replace('-', "_");
        ThreatCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == wanted)
            .ok_or_else(|| {
                format!(
                    "Unknown threat type '{}'. Valid types: {}",
                    s.trim(),
                    ThreatCategory::ALL
                        .iter()
                        .map(ThreatCategory::as_str)
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }
}

/// Outcome of checking a single URL.
///
/// [`Verdict::from_matches`] is the supported way to build a verdict from
/// source matches. A `Threats` value with no categories is treated as `Safe`:
/// its label is `SAFE` and [`ResultSet::record`] stores it as `Safe`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// No queried category matched
    Safe,
    /// One or more categories matched, in the order reported by the source.
    /// Never empty when built by `from_matches`.
    Threats(Vec<ThreatCategory>),
    /// The lookup itself failed (recognized remote fault or timeout)
    Error,
}

impl Verdict {
    /// Separator used when more than one category is written into a single cell.
    pub const LABEL_SEPARATOR: &'static str = ";";

    /// Turn the categories reported by a source into a verdict.
    ///
    /// Duplicates are dropped while keeping first-seen order.
    pub fn from_matches(matches: Vec<ThreatCategory>) -> Self {
        let mut categories: Vec<ThreatCategory> = Vec::with_capacity(matches.len());
        for category in matches {
            if !categories.contains(&category) {
                categories.push(category);
            }
        }

        if categories.is_empty() {
            Verdict::Safe
        } else {
            Verdict::Threats(categories)
        }
    }

    /// Collapse an empty `Threats` into `Safe`.
    pub fn normalized(self) -> Self {
        match self {
            Verdict::Threats(categories) => Verdict::from_matches(categories),
            other => other,
        }
    }

    /// Text written to the `Threat Type` column. Never empty.
    pub fn label(&self) -> String {
        match self {
            Verdict::Safe => "SAFE".to_string(),
            Verdict::Threats(categories) if categories.is_empty() => "SAFE".to_string(),
            Verdict::Error => "ERROR".to_string(),
            Verdict::Threats(categories) => categories
                .iter()
                .map(ThreatCategory::as_str)
                .collect::<Vec<_>>()
                .join(Self::LABEL_SEPARATOR),
        }
    }

    pub fn is_threat(&self) -> bool {
        matches!(self, Verdict::Threats(categories) if !categories.is_empty())
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Mapping from URL to verdict accumulated over one run.
///
/// Iteration follows the order in which each distinct URL was first recorded.
/// Recording a URL again replaces its verdict but keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    verdicts: HashMap<String, Verdict>,
    order: Vec<String>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a verdict for a URL; the last write for a URL wins.
    pub fn record<U: Into<String>>(&mut self, url: U, verdict: Verdict) {
        let url = url.into();
        let verdict = verdict.normalized();
        if !self.verdicts.contains_key(&url) {
            self.order.push(url.clone());
        }
        self.verdicts.insert(url, verdict);
    }

    pub fn get(&self, url: &str) -> Option<&Verdict> {
        self.verdicts.get(url)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.verdicts.contains_key(url)
    }

    /// Number of distinct URLs.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterate `(url, verdict)` pairs in first-recorded order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Verdict)> + '_ {
        self.order
            .iter()
            .filter_map(move |url| self.verdicts.get(url).map(|v| (url.as_str(), v)))
    }

    /// Count verdicts by label, in first-seen label order.
    pub fn label_counts(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for (_, verdict) in self.iter() {
            let label = verdict.label();
            match counts.iter_mut().find(|(l, _)| *l == label) {
                Some((_, count)) => *count += 1,
                None => counts.push((label, 1)),
            }
        }
        counts
    }
}

/// One label's share of the persisted results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Share {
    pub label: String,
    pub count: usize,
    /// Percentage of all rows, rounded to two decimals (0–100)
    pub percentage: f64,
}

/// Percentage breakdown of verdict labels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub total: usize,
    pub shares: Vec<Share>,
}

impl Distribution {
    /// Build a distribution from labels in table order.
    ///
    /// An empty input yields an empty distribution; the divisor is clamped to 1.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut counts: Vec<(String, usize)> = Vec::new();
        let mut total = 0usize;

        for label in labels {
            let label = label.as_ref();
            total += 1;
            match counts.iter_mut().find(|(l, _)| l == label) {
                Some((_, count)) => *count += 1,
                None => counts.push((label.to_string(), 1)),
            }
        }

        let divisor = total.max(1) as f64;
        let shares = counts
            .into_iter()
            .map(|(label, count)| Share {
                label,
                count,
                percentage: round2(count as f64 / divisor * 100.0),
            })
            .collect();

        Self { total, shares }
    }

    /// Percentage for a label, if present.
    pub fn percentage(&self, label: &str) -> Option<f64> {
        self.shares
            .iter()
            .find(|share| share.label == label)
            .map(|share| share.percentage)
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    pub fn len(&self) -> usize {
        self.shares.len()
    }

    /// Label → percentage map, handy for JSON output.
    pub fn as_map(&self) -> HashMap<String, f64> {
        self.shares
            .iter()
            .map(|share| (share.label.clone(), share.percentage))
            .collect()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Configuration for a verification pool.
///
/// The concurrency bound is always finite; there is no "unlimited" setting.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of lookups in flight at once
    /// Default: 5, Range: 1-100
    pub concurrency: usize,

    /// Number of worker loops draining the queue.
    /// Defaults to `concurrency` when unset; never tied to the batch size.
    pub workers: Option<usize>,

    /// Deadline for a single lookup; an expired lookup becomes `Verdict::Error`
    /// Default: 10 seconds
    pub timeout: Duration,

    /// Threat categories queried for every URL
    pub categories: Vec<ThreatCategory>,
}

impl Default for PoolConfig {
    /// Conservative defaults: a handful of lookups at a time, all categories.
    fn default() -> Self {
        Self {
            concurrency: 5,
            workers: None,
            timeout: Duration::from_secs(10),
            categories: ThreatCategory::ALL.to_vec(),
        }
    }
}

impl PoolConfig {
    /// Set the concurrency bound (not clamped; validated when the pool is built).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the number of worker loops.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Set the per-lookup timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the threat categories to query.
    pub fn with_categories(mut self, categories: Vec<ThreatCategory>) -> Self {
        self.categories = categories;
        self
    }

    /// Worker count after applying the default.
    pub fn effective_workers(&self) -> usize {
        self.workers.unwrap_or(self.concurrency)
    }
}
