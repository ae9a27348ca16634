//! End-state scoring.
//!
//! All sums iterate `BTreeMap`s so the floating point result does not depend
//! on hash ordering.

use std::collections::BTreeMap;

use crate::domain::values::evaluation::ScoreBreakdown;

use super::simulation::{EvaluationContext, PortfolioState};

const BULL_THRESHOLD: f64 = 0.3;
const BEAR_THRESHOLD: f64 = -0.3;
const NEUTRAL: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub quality: f64,
    pub diversification: f64,
    pub risk: f64,
    pub improvement: f64,
}

impl ScoreWeights {
    pub fn for_regime(regime: f64) -> Self {
        let mut w = Self {
            quality: 0.35,
            diversification: 0.30,
            risk: 0.25,
            improvement: 0.10,
        };
        if regime > BULL_THRESHOLD {
            let f = (regime - BULL_THRESHOLD) / 0.7;
            w.quality += 0.03 * f;
            w.risk -= 0.03 * f;
        } else if regime < BEAR_THRESHOLD {
            let f = (BEAR_THRESHOLD - regime) / 0.7;
            w.risk += 0.08 * f;
            w.diversification += 0.02 * f;
            w.quality -= 0.05 * f;
            w.improvement -= 0.05 * f;
        }
        w
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Components {
    quality: f64,
    diversification: f64,
    risk: f64,
}

fn components(state: &PortfolioState, ctx: &EvaluationContext) -> Components {
    Components {
        quality: quality_score(state, ctx),
        diversification: diversification_score(state, ctx),
        risk: risk_score(state, ctx),
    }
}

/// Scores `end` relative to the context's starting state, charging
/// `transaction_cost` against the end value.
pub fn score_state(end: &PortfolioState, ctx: &EvaluationContext, transaction_cost: f64) -> ScoreBreakdown {
    let weights = ScoreWeights::for_regime(ctx.regime_score);
    let before = components(&ctx.start, ctx);
    let after = components(end, ctx);

    let delta = ((after.quality - before.quality)
        + (after.diversification - before.diversification)
        + (after.risk - before.risk))
        / 3.0;
    let improvement = clamp01(NEUTRAL + delta * 0.5);

    let raw = after.quality * weights.quality
        + after.diversification * weights.diversification
        + after.risk * weights.risk
        + improvement * weights.improvement;

    let total = end.total_value();
    let penalty = if ctx.costs.penalty_factor > 0.0 && total > 0.0 {
        transaction_cost / total * ctx.costs.penalty_factor
    } else {
        0.0
    };

    ScoreBreakdown {
        start_score: ctx.start_score,
        quality: after.quality,
        diversification: after.diversification,
        risk: after.risk,
        improvement,
        transaction_cost,
        final_score: clamp01(raw - penalty),
    }
}

fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// Value-weighted average of `metric` over the positions that have it.
fn weighted(state: &PortfolioState, metric: &BTreeMap<String, f64>, total: f64) -> Option<f64> {
    if total <= 0.0 {
        return None;
    }
    let mut sum = 0.0;
    let mut found = false;
    for (isin, value) in &state.positions {
        if let Some(m) = metric.get(isin) {
            sum += m * (value / total);
            found = true;
        }
    }
    found.then_some(sum)
}

// ---------------------------------------------------------------------------
// Quality

fn quality_score(state: &PortfolioState, ctx: &EvaluationContext) -> f64 {
    let total = state.total_value();
    let m = &ctx.metrics;

    let growth = weighted(state, &m.cagr, total)
        .or_else(|| weighted(state, &m.quality, total).map(|q| q * 0.15))
        .unwrap_or(0.0);
    let dividend = weighted(state, &m.dividend, total).unwrap_or(0.0);
    let total_return = total_return_curve(growth + dividend, ctx.target_return);

    let promise = weighted(state, &m.quality, total).unwrap_or(NEUTRAL);

    let stability = match (
        weighted(state, &m.volatility, total),
        weighted(state, &m.max_drawdown, total),
    ) {
        (None, None) => NEUTRAL,
        (vol, dd) => {
            let v = vol.map(stability_volatility_curve).unwrap_or(NEUTRAL);
            let d = dd.map(|d| stability_drawdown_curve(d.abs())).unwrap_or(NEUTRAL);
            v * 0.6 + d * 0.4
        }
    };

    clamp01(total_return * 0.40 + promise * 0.35 + stability * 0.25)
}

const RETURN_CEILING: f64 = 0.20;
const EPS: f64 = 1e-9;

/// Peaks at the target return; both slopes are scaled to the target so the
/// curve stays continuous there.
fn total_return_curve(r: f64, target: f64) -> f64 {
    if r >= target {
        let span = RETURN_CEILING - target;
        if span <= EPS || r >= RETURN_CEILING {
            return if r - target < EPS { 1.0 } else { 0.95 };
        }
        1.0 - (r - target) / span * 0.15
    } else if r >= 0.05 {
        0.5 + (r - 0.05) / (target - 0.05).max(EPS) * 0.5
    } else if r >= 0.0 {
        r / 0.05 * 0.5
    } else {
        0.1
    }
}

fn stability_volatility_curve(v: f64) -> f64 {
    if v <= 0.15 {
        1.0
    } else if v <= 0.25 {
        1.0 - (v - 0.15) / 0.10 * 0.3
    } else if v <= 0.40 {
        0.7 - (v - 0.25) / 0.15 * 0.4
    } else {
        (0.3 - (v - 0.40)).max(0.1)
    }
}

fn stability_drawdown_curve(d: f64) -> f64 {
    if d <= 0.10 {
        1.0
    } else if d <= 0.20 {
        0.8 + (0.20 - d) * 2.0
    } else if d <= 0.30 {
        0.6 + (0.30 - d) * 2.0
    } else {
        (0.6 - (d - 0.30) * 2.0).max(0.1)
    }
}

// ---------------------------------------------------------------------------
// Diversification

fn diversification_score(state: &PortfolioState, ctx: &EvaluationContext) -> f64 {
    let geo = group_alignment(state, &ctx.metrics.country, &ctx.country_weights);
    let industry = group_alignment(state, &ctx.metrics.industry, &ctx.industry_weights);
    let optimizer = optimizer_alignment(state, &ctx.target_weights);
    clamp01(geo * 0.35 + industry * 0.30 + optimizer * 0.35)
}

fn group_alignment(
    state: &PortfolioState,
    groups: &BTreeMap<String, String>,
    targets: &BTreeMap<String, f64>,
) -> f64 {
    let invested = state.invested();
    if targets.is_empty() || invested <= 0.0 {
        return NEUTRAL;
    }
    let mut current: BTreeMap<&str, f64> = BTreeMap::new();
    for (isin, value) in &state.positions {
        let group = groups.get(isin).map(String::as_str).unwrap_or("OTHER");
        *current.entry(group).or_insert(0.0) += value / invested;
    }
    let deviation: f64 = targets
        .iter()
        .map(|(group, target)| (current.get(group.as_str()).copied().unwrap_or(0.0) - target).abs())
        .sum::<f64>()
        / targets.len() as f64;
    (1.0 - deviation / 0.3).max(0.0)
}

fn optimizer_alignment(state: &PortfolioState, targets: &BTreeMap<String, f64>) -> f64 {
    let total = state.total_value();
    if targets.is_empty() || total <= 0.0 {
        return NEUTRAL;
    }
    let deviation: f64 = targets
        .iter()
        .map(|(isin, target)| {
            let current = state.positions.get(isin).copied().unwrap_or(0.0) / total;
            (current - target).abs()
        })
        .sum::<f64>()
        / targets.len() as f64;
    (1.0 - deviation / 0.20).max(0.0)
}

// ---------------------------------------------------------------------------
// Risk

fn risk_score(state: &PortfolioState, ctx: &EvaluationContext) -> f64 {
    let total = state.total_value();
    let m = &ctx.metrics;
    let sharpe = weighted(state, &m.sharpe, total).map(sharpe_curve);
    let vol = weighted(state, &m.volatility, total).map(risk_volatility_curve);
    let dd = weighted(state, &m.max_drawdown, total).map(|d| risk_drawdown_curve(d.abs()));
    if sharpe.is_none() && vol.is_none() && dd.is_none() {
        return NEUTRAL;
    }
    clamp01(
        sharpe.unwrap_or(NEUTRAL) * 0.40 + vol.unwrap_or(NEUTRAL) * 0.35 + dd.unwrap_or(NEUTRAL) * 0.25,
    )
}

fn sharpe_curve(s: f64) -> f64 {
    if s >= 2.0 {
        1.0
    } else if s >= 1.0 {
        0.7 + (s - 1.0) * 0.3
    } else if s >= 0.5 {
        0.4 + (s - 0.5) * 0.6
    } else if s >= 0.0 {
        s * 0.8
    } else {
        0.0
    }
}

fn risk_volatility_curve(v: f64) -> f64 {
    if v <= 0.15 {
        1.0
    } else if v <= 0.25 {
        0.8 + (0.25 - v) * 2.0
    } else if v <= 0.40 {
        0.5 + (0.40 - v) / 0.15 * 0.3
    } else {
        (0.5 - (v - 0.40)).max(0.2)
    }
}

fn risk_drawdown_curve(d: f64) -> f64 {
    if d <= 0.10 {
        1.0
    } else if d <= 0.20 {
        0.8 + (0.20 - d) * 2.0
    } else if d <= 0.30 {
        0.6 + (0.30 - d) * 2.0
    } else if d <= 0.50 {
        0.2 + (0.50 - d) * 2.0
    } else {
        (0.2 - (d - 0.50)).max(0.0)
    }
}
