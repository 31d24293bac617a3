//! Parser for human-authored duration expressions.
//!
//! Accepts fixed terms (`"3 days"`, `"2 weeks"`), dice terms (`"2d4 days"`,
//! `"1d6"`), and compound chains with `+`/`-` and mixed units
//! (`"2 months - 2 weeks + 1d3 weeks"`). Dice are rolled against the
//! supplied [`SeededRng`]; each `NdM` term consumes exactly `N` draws.
//! Unparseable input never fails — it logs a warning and yields the 1-day
//! default without consuming any draws.

use crate::rng::SeededRng;

const DAYS_PER_WEEK: f64 = 7.0;
const MONTHS_PER_YEAR: f64 = 12.0;
const FALLBACK_MONTH_DAYS: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Amount {
    Fixed(i64),
    /// `count` dice with `faces` faces each.
    Dice { count: i64, faces: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Unit {
    Days,
    Weeks,
    Months,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Term {
    negative: bool,
    amount: Amount,
    unit: Unit,
}

fn parse_unit(word: &str) -> Option<Unit> {
    match word.to_ascii_lowercase().as_str() {
        "day" | "days" => Some(Unit::Days),
        "week" | "weeks" => Some(Unit::Weeks),
        "month" | "months" => Some(Unit::Months),
        _ => None,
    }
}

fn parse_amount(word: &str) -> Option<Amount> {
    if let Ok(n) = word.parse::<i64>() {
        return (n >= 0).then_some(Amount::Fixed(n));
    }
    let (count, faces) = word
        .split_once(['d', 'D'])
        .and_then(|(a, b)| Some((a.parse::<i64>().ok()?, b.parse::<i64>().ok()?)))?;
    (count > 0 && faces > 0).then_some(Amount::Dice { count, faces })
}

/// Split an expression into signed terms, then parse each. `None` when any
/// term is malformed — the caller falls back to the 1-day default so a typo
/// in authored content can never break evaluation.
fn parse_terms(expr: &str) -> Option<Vec<Term>> {
    let mut terms = Vec::new();
    let mut negative = false;
    for (i, chunk) in expr.split_inclusive(['+', '-']).enumerate() {
        let (body, next_negative) = match chunk.strip_suffix(['+', '-']) {
            Some(body) => (body, chunk.ends_with('-')),
            None => (chunk, false),
        };
        let body = body.trim();
        if body.is_empty() {
            // A leading sign binds to the first term; anything else is
            // malformed ("3 days + + 2 days").
            if i == 0 && terms.is_empty() {
                negative = next_negative;
                continue;
            }
            return None;
        }
        let mut words = body.split_whitespace();
        let amount = parse_amount(words.next()?)?;
        let unit = match words.next() {
            Some(word) => parse_unit(word)?,
            None => Unit::Days,
        };
        if words.next().is_some() {
            return None;
        }
        terms.push(Term { negative, amount, unit });
        negative = next_negative;
    }
    (!terms.is_empty()).then_some(terms)
}

fn roll(amount: Amount, rng: &mut SeededRng) -> i64 {
    match amount {
        Amount::Fixed(n) => n,
        Amount::Dice { count, faces } => (0..count)
            .map(|_| (rng.next_f64() * faces as f64).floor() as i64 + 1)
            .sum(),
    }
}

/// Parse a duration expression into a concrete day count (always ≥ 1).
///
/// `avg_year_days` supplies the calendar's average year length for
/// month-unit terms; `None` falls back to 30-day months.
pub fn parse_duration(expr: &str, rng: &mut SeededRng, avg_year_days: Option<f64>) -> i64 {
    let Some(terms) = parse_terms(expr) else {
        tracing::warn!(expr, "unparseable duration expression, defaulting to 1 day");
        return 1;
    };
    let month_days = avg_year_days.map_or(FALLBACK_MONTH_DAYS, |avg| avg / MONTHS_PER_YEAR);
    let mut total = 0.0f64;
    for term in terms {
        let rolled = roll(term.amount, rng) as f64;
        let days = match term.unit {
            Unit::Days => rolled,
            Unit::Weeks => rolled * DAYS_PER_WEEK,
            Unit::Months => rolled * month_days,
        };
        total += if term.negative { -days } else { days };
    }
    (total.round() as i64).max(1)
}
