//! Turns the winning sequence into an ordered plan.

use crate::application::evaluation::{score_actions, EvaluationContext};
use crate::domain::entities::plan::{HolisticPlan, PlanStep};
use crate::domain::values::action::ActionSequence;
use crate::domain::values::evaluation::EvaluationResult;
use crate::domain::values::opportunity::OpportunityCategory;
use crate::domain::values::trade_side::TradeSide;

pub fn assemble(sequence: &ActionSequence, result: &EvaluationResult, ctx: &EvaluationContext) -> HolisticPlan {
    let mut steps = Vec::with_capacity(sequence.len());
    let mut cash = ctx.start.cash;
    let mut score_before = ctx.start_score;

    for (idx, action) in sequence.actions.iter().enumerate() {
        let cash_before = cash;
        match action.side {
            TradeSide::Buy => cash -= action.value_eur,
            TradeSide::Sell => cash += action.value_eur,
        }
        let score_after = if idx + 1 == sequence.len() {
            result.end_score
        } else {
            score_actions(ctx, &sequence.actions[..=idx]).unwrap_or(score_before)
        };

        steps.push(PlanStep {
            step_number: idx + 1,
            side: action.side,
            isin: action.isin.clone(),
            symbol: action.symbol.clone(),
            name: action.name.clone(),
            quantity: action.quantity,
            estimated_price: action.price,
            estimated_value: action.value_eur,
            currency: action.currency.clone(),
            reason: action.reason.clone(),
            narrative: format!("Step {}: {} {} shares of {}", idx + 1, action.side, action.quantity, action.symbol),
            is_windfall: action.has_tag("windfall"),
            is_averaging_down: action.has_tag("averaging_down")
                || action.category == OpportunityCategory::AveragingDown,
            portfolio_score_before: score_before,
            portfolio_score_after: score_after,
            cash_before,
            cash_after: cash,
        });
        score_before = score_after;
    }

    let cash_required = sequence.buy_cost();
    let cash_generated = sequence.sell_proceeds();
    let sells = sequence.actions.iter().filter(|a| a.side.is_sell()).count();
    let buys = sequence.len() - sells;
    let narrative_summary = format!(
        "{} actions ({} sells, {} buys) via {}: score {:.3} to {:.3}",
        sequence.len(),
        sells,
        buys,
        sequence.pattern,
        ctx.start_score,
        result.end_score
    );

    HolisticPlan {
        steps,
        current_score: ctx.start_score,
        end_state_score: result.end_score,
        improvement: result.end_score - ctx.start_score,
        narrative_summary,
        cash_required,
        cash_generated,
        feasible: result.feasible,
        pattern: Some(sequence.pattern.clone()),
        sequence_hash: Some(result.sequence_hash.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::evaluation::evaluate_sequence;
    use crate::application::patterns::fixtures::{candidate, snapshot};
    use crate::domain::values::context::Position;
    use crate::domain::values::opportunity::OpportunityCategory::*;
    use crate::domain::values::planner_config::PlannerConfiguration;
    use crate::domain::values::trade_side::TradeSide::*;

    #[test]
    fn steps_track_running_cash_and_scores() {
        let mut ctx = snapshot(1000.0);
        ctx.positions.push(Position {
            isin: "ISIN-OLD".into(),
            symbol: "OLD".into(),
            quantity: 2.0,
            avg_cost: 100.0,
            current_price: 170.0,
            market_value_eur: 340.0,
            first_bought_at: None,
        });
        let mut sell = candidate(ProfitTaking, Sell, "OLD", 340.0, 0.8);
        sell.quantity = 2;
        sell.price = 170.0;
        sell.tags = vec!["windfall".into()];
        let mut buy = candidate(AveragingDown, Buy, "NEW", 750.0, 0.7);
        buy.quantity = 5;
        buy.price = 150.0;
        let sequence = ActionSequence::new("profit_taking", vec![sell, buy]);

        let eval = EvaluationContext::new(&ctx, &PlannerConfiguration::default());
        let result = evaluate_sequence(&eval, &sequence, "hash");
        let plan = assemble(&sequence, &result, &eval);

        assert_eq!(plan.steps.len(), 2);
        assert!((plan.steps[0].cash_before - 1000.0).abs() < 1e-9);
        assert!((plan.steps[0].cash_after - 1340.0).abs() < 1e-9);
        assert!((plan.steps[1].cash_after - 590.0).abs() < 1e-9);
        assert!(plan.steps[0].is_windfall);
        assert!(plan.steps[1].is_averaging_down);
        assert_eq!(plan.steps[1].narrative, "Step 2: BUY 5 shares of NEW");
        assert_eq!(plan.steps[0].portfolio_score_after, plan.steps[1].portfolio_score_before);
        assert_eq!(plan.steps[1].portfolio_score_after, plan.end_state_score);
        assert!((plan.cash_required - 750.0).abs() < 1e-9);
        assert!((plan.cash_generated - 340.0).abs() < 1e-9);
    }
}
