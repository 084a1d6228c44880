//! Empirical p-values by stratified permutation.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;

use super::bins::Bins;
use super::zones::{FeatureId, FeatureTable};
use crate::query::profile::{profile_timer, record_profile_timer, ProfileKind};

/// Permutation test over a binned feature table.
#[derive(Debug, Clone, Copy)]
pub struct PermutationTest<'a> {
    table: &'a FeatureTable,
    bins: &'a Bins,
    permutations: u32,
    max_successes: Option<u32>,
}

impl<'a> PermutationTest<'a> {
    /// A test running `permutations` trials per feature set.
    pub fn new(table: &'a FeatureTable, bins: &'a Bins, permutations: u32) -> Self {
        Self {
            table,
            bins,
            permutations: permutations.max(1),
            max_successes: None,
        }
    }

    /// Stops once the p-value is known to reach `max_p`.
    pub fn with_max_p_value(mut self, max_p: Option<f64>) -> Self {
        self.max_successes = max_p
            .map(|p| (p * f64::from(self.permutations) + 0.5).floor() as u32)
            .filter(|n| *n > 0);
        self
    }

    /// Trials per feature set.
    pub fn permutations(&self) -> u32 {
        self.permutations
    }

    fn significant(&self, id: FeatureId) -> bool {
        self.table.get(id).is_some_and(|f| f.is_significant())
    }

    /// Number of trials drawing at least as many significant features as `features` has.
    ///
    /// Features in bin 0 or without a bin never count. A set with no
    /// significant feature succeeds in every trial.
    pub fn successes<R: Rng + ?Sized>(&self, features: &[FeatureId], rng: &mut R) -> u32 {
        let mut draws: BTreeMap<usize, usize> = BTreeMap::new();
        let mut observed = 0usize;
        for id in features {
            match self.bins.bin_of(*id) {
                Some(bin) if bin != 0 => {
                    *draws.entry(bin).or_default() += 1;
                    observed += usize::from(self.significant(*id));
                }
                _ => {}
            }
        }
        if observed < 1 {
            return self.permutations;
        }

        let start = profile_timer();
        let mut successes = 0u32;
        for _ in 0..self.permutations {
            let mut score = 0usize;
            for (bin, count) in &draws {
                score += self
                    .bins
                    .members(*bin)
                    .choose_multiple(rng, *count)
                    .filter(|id| self.significant(**id))
                    .count();
            }
            if score >= observed {
                successes += 1;
                if self.max_successes.is_some_and(|max| successes >= max) {
                    break;
                }
            }
        }
        record_profile_timer(ProfileKind::Permute, start);
        successes
    }

    /// Renders a success count as a p-value string.
    pub fn render(&self, successes: u32) -> String {
        let trials = f64::from(self.permutations);
        if successes < 1 {
            return format!("< {}", format_general(1.0 / trials));
        }
        let value = format_general(f64::from(successes) / trials);
        if self.max_successes.is_some_and(|max| successes >= max) {
            format!(">= {value}")
        } else {
            value
        }
    }
}

/// Formats with six significant digits, trailing zeros trimmed, switching to
/// exponent notation below `1e-4` and from `1e6`.
pub fn format_general(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return value.to_string();
    }
    let sci = format!("{value:.5e}");
    let (mantissa, exponent) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    if !(-4..6).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{}e{sign}{:02}", trim_zeros(mantissa), exponent.abs());
    }
    let decimals = (5 - exponent) as usize;
    trim_zeros(&format!("{value:.decimals$}")).to_string()
}

fn trim_zeros(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}
