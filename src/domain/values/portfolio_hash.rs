use sha2::{Digest, Sha256};

use crate::domain::values::context::OpportunityContext;

/// Stable identifier for a portfolio snapshot.
///
/// Covers holdings, cash to the cent, tradability flags and pending orders.
/// Prices are excluded so that quote ticks alone do not re-key plans.
pub fn portfolio_hash(ctx: &OpportunityContext) -> String {
    let mut positions: Vec<(&str, f64)> = ctx
        .positions
        .iter()
        .map(|p| (p.isin.as_str(), p.quantity))
        .collect();
    positions.sort_by(|a, b| a.0.cmp(b.0));

    let mut securities: Vec<(&str, bool, bool)> = ctx
        .securities
        .iter()
        .map(|s| (s.isin.as_str(), s.allow_buy, s.allow_sell))
        .collect();
    securities.sort_by(|a, b| a.0.cmp(b.0));

    let mut pending: Vec<&str> = ctx.pending_order_symbols.iter().map(String::as_str).collect();
    pending.sort_unstable();

    let mut hasher = Sha256::new();
    for (isin, quantity) in positions {
        hasher.update(format!("p:{isin}:{quantity:.6};"));
    }
    hasher.update(format!("c:{:.2};", ctx.available_cash_eur));
    for (isin, allow_buy, allow_sell) in securities {
        hasher.update(format!("s:{isin}:{allow_buy}:{allow_sell};"));
    }
    for symbol in pending {
        hasher.update(format!("o:{symbol};"));
    }
    hex::encode(hasher.finalize())
}
