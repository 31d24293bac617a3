use serde::{Deserialize, Serialize};

/// One leap-year rule: a year matches when `(year - offset) % interval == 0`
/// and it matches none of the `exclude` rules (same evaluation, recursively).
///
/// Gregorian leap years are one nested rule:
/// `{interval: 4, exclude: [{interval: 100, exclude: [{interval: 400}]}]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeapRule {
    pub interval: i64,
    #[serde(default)]
    pub offset: i64,
    /// Month index (0-based) that receives the extra day. `None` appends the
    /// day to the final month.
    #[serde(default)]
    pub target_month: Option<usize>,
    #[serde(default)]
    pub exclude: Vec<LeapRule>,
}

impl LeapRule {
    pub fn matches_year(&self, year: i64) -> bool {
        if self.interval <= 0 {
            return false;
        }
        (year - self.offset).rem_euclid(self.interval) == 0
            && !self.exclude.iter().any(|r| r.matches_year(year))
    }
}

/// Largest rule cycle we precompute. Rule sets whose combined cycle exceeds
/// this fall back to per-year iteration for counting.
const MAX_CYCLE_YEARS: i64 = 100_000;

/// Compiled leap-rule set with closed-form counting.
///
/// The whole predicate is periodic in the lcm of every interval in the rule
/// tree, so counts over huge spans reduce to whole-cycle multiples plus a
/// bounded prefix walk. That keeps date arithmetic exact at day magnitudes
/// of 10^12 without iterating billions of years.
#[derive(Debug, Clone)]
pub struct LeapSchedule {
    rules: Vec<LeapRule>,
    /// `Some((cycle, prefix))` when the combined cycle fits the cap;
    /// `prefix[r]` = leap years in `[0, r)` of one cycle.
    cycle: Option<(i64, Vec<i64>)>,
}

fn gcd(a: i64, b: i64) -> i64 {
    if b == 0 { a.abs() } else { gcd(b, a % b) }
}

fn gather_lcm(rules: &[LeapRule], acc: i64) -> i64 {
    let mut acc = acc;
    for rule in rules {
        let iv = rule.interval.max(1);
        acc = (acc / gcd(acc, iv)).saturating_mul(iv);
        if acc > MAX_CYCLE_YEARS {
            return acc;
        }
        acc = gather_lcm(&rule.exclude, acc);
    }
    acc
}

impl LeapSchedule {
    /// Compile a rule set. Closed-form counting requires the combined rule
    /// cycle (lcm of every interval in the tree) to fit within
    /// `MAX_CYCLE_YEARS`; past that, counting walks year by year, which is
    /// only viable for modest date ranges.
    pub fn new(rules: Vec<LeapRule>) -> Self {
        let cycle = if rules.is_empty() {
            None
        } else {
            let lcm = gather_lcm(&rules, 1);
            if lcm > MAX_CYCLE_YEARS {
                tracing::warn!(
                    cycle_years = lcm,
                    cap = MAX_CYCLE_YEARS,
                    "leap-rule cycle exceeds the precompute cap, counting will iterate per year"
                );
            }
            (lcm <= MAX_CYCLE_YEARS).then(|| {
                let mut prefix = Vec::with_capacity(lcm as usize + 1);
                let mut count = 0i64;
                prefix.push(0);
                for year in 0..lcm {
                    if rules.iter().any(|r| r.matches_year(year)) {
                        count += 1;
                    }
                    prefix.push(count);
                }
                (lcm, prefix)
            })
        };
        Self { rules, cycle }
    }

    pub fn rules(&self) -> &[LeapRule] {
        &self.rules
    }

    /// A year is a leap year iff it matches any top-level rule.
    pub fn is_leap_year(&self, year: i64) -> bool {
        self.rules.iter().any(|r| r.matches_year(year))
    }

    /// Leap days gained per full cycle, and the cycle length in years.
    /// `None` when there are no rules or the cycle exceeds the cap.
    pub fn per_cycle(&self) -> Option<(i64, i64)> {
        self.cycle
            .as_ref()
            .map(|(len, prefix)| (*prefix.last().unwrap_or(&0), *len))
    }

    /// Signed count of leap years in `[0, n)`; negative `n` counts `[n, 0)`
    /// negated. Monotone in `n`, so differences give range counts.
    fn signed_prefix(&self, n: i64) -> i64 {
        match &self.cycle {
            None => 0,
            Some((len, prefix)) => {
                let q = n.div_euclid(*len);
                let r = n.rem_euclid(*len);
                q * prefix[*len as usize] + prefix[r as usize]
            }
        }
    }

    /// Count leap years in `[from, to)`. Returns 0 when `from >= to`.
    pub fn count_leap_years(&self, from: i64, to: i64) -> i64 {
        if from >= to || self.rules.is_empty() {
            return 0;
        }
        match &self.cycle {
            Some(_) => self.signed_prefix(to) - self.signed_prefix(from),
            // Cycle too large to compile; direct walk.
            None => (from..to).filter(|&y| self.is_leap_year(y)).count() as i64,
        }
    }

    /// Signed leap-day offset of `target` relative to `base`: positive when
    /// `target > base`, negative when `target < base`.
    pub fn leap_days_before(&self, target: i64, base: i64) -> i64 {
        if target >= base {
            self.count_leap_years(base, target)
        } else {
            -self.count_leap_years(target, base)
        }
    }

    /// Per-month day counts for a year: the base layout plus exactly one
    /// extra day in leap years, placed in the first matching rule's target
    /// month (final month when unset).
    pub fn month_days(&self, base: &[i64], year: i64) -> Vec<i64> {
        let mut days = base.to_vec();
        if days.is_empty() {
            return days;
        }
        if let Some(rule) = self.rules.iter().find(|r| r.matches_year(year)) {
            let target = rule
                .target_month
                .filter(|m| *m < days.len())
                .unwrap_or(days.len() - 1);
            days[target] += 1;
        }
        days
    }
}
