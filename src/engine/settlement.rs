//! Grading settled fixtures against their final score.
//!
//! `resolve` is a pure function: the selection text is matched against
//! a dispatch table (most specific pattern first, case-insensitive) and
//! graded from the score alone. Unit staking throughout: a win pays
//! odds minus one, a loss costs the stake.

use crate::types::{BetOutcome, MatchResult, Pick};

/// Parse the goal line out of a totals selection ("Over 2.5 Goals" → 2.5).
/// Falls back to 2.5 when no number is present.
fn goal_line(selection: &str) -> f64 {
    selection
        .split_whitespace()
        .find_map(|tok| tok.parse::<f64>().ok())
        .unwrap_or(2.5)
}

/// Whether a selection won given the final score.
///
/// Unrecognized selection text grades as a home win, the most common
/// market, so a malformed record still settles instead of sticking
/// around pending forever.
fn selection_won(selection: &str, result: &MatchResult) -> bool {
    let s = selection.to_lowercase();
    let home = result.home_score;
    let away = result.away_score;
    let total = result.total_goals();

    // Double chances before single outcomes: "home or draw" must not
    // fall through to the bare "draw" arm
    if s.contains("home or draw") {
        home >= away
    } else if s.contains("away or draw") || s.contains("draw or away") {
        away >= home
    } else if s.contains("home or away") {
        home != away
    } else if s.contains("over") {
        f64::from(total) > goal_line(&s)
    } else if s.contains("under") {
        f64::from(total) < goal_line(&s)
    } else if s.contains("btts") && s.contains("yes") {
        home > 0 && away > 0
    } else if s.contains("btts") && s.contains("no") {
        home == 0 || away == 0
    } else if s.contains("away") {
        away > home
    } else if s.contains("draw") {
        home == away
    } else {
        home > away
    }
}

/// Grade a pick against a final score. Returns the outcome and the
/// unit profit, rounded to two decimals.
pub fn resolve(pick: &Pick, result: &MatchResult) -> (BetOutcome, f64) {
    if selection_won(&pick.selection, result) {
        let profit = ((pick.odds - 1.0) * 100.0).round() / 100.0;
        (BetOutcome::Win, profit)
    } else {
        (BetOutcome::Loss, -1.0)
    }
}
