//! Property tests for the orchestrator's trade log.
//!
//! Uses proptest to verify, for a bot driven through random tick/price
//! sequences against the simulator:
//! 1. Record ids are strictly increasing and the log is append-only
//! 2. Every CLOSE refers to a ticket previously opened or adopted
//! 3. Realized PnL in the log matches the simulator's balance change

use proptest::prelude::*;
use signalbot_core::domain::{Action, TradeAction};
use signalbot_core::market::{Bridge, Credentials, MarketSimulator, SimulatorConfig};
use signalbot_core::model::{DecisionModel, ModelParams};
use signalbot_runner::{BotConfig, HistorySummary, TradingBot};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Step {
    Tick,
    Shock(f64),
    CloseAll,
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => Just(Step::Tick),
        2 => (-0.01..0.01_f64).prop_map(Step::Shock),
        1 => Just(Step::CloseAll),
    ]
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![Just(Action::Buy), Just(Action::Sell)]
}

fn biased(action: Action) -> Arc<DecisionModel> {
    let mut params = ModelParams::zeros();
    params.output_bias[action.index()] = 5.0;
    Arc::new(DecisionModel::from_params(params).unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn trade_log_is_consistent(
        seed in any::<u64>(),
        action in arb_action(),
        steps in prop::collection::vec(arb_step(), 1..25),
    ) {
        let sim = MarketSimulator::new(SimulatorConfig { seed, ..SimulatorConfig::default() });
        let mut bot = TradingBot::new(BotConfig::default(), sim, biased(action));
        bot.connect(&Credentials::new("1", "Sim", "pw")).unwrap();
        bot.start().unwrap();

        for step in steps {
            match step {
                Step::Tick => {
                    bot.tick().unwrap();
                }
                Step::Shock(r) => {
                    let price = bot.bridge().current_price("EURUSD").unwrap();
                    bot.bridge_mut().inject_tick("EURUSD", price * (1.0 + r)).unwrap();
                }
                Step::CloseAll => {
                    bot.close_all_positions().unwrap();
                }
            }
        }
        bot.close_all_positions().unwrap();

        let history = bot.history();
        for pair in history.windows(2) {
            prop_assert!(pair[0].id < pair[1].id);
        }

        let mut opened = HashSet::new();
        for record in history {
            match record.action {
                TradeAction::Buy | TradeAction::Sell => {
                    prop_assert!(record.profit.is_none());
                    opened.insert(record.ticket);
                }
                TradeAction::Close => {
                    prop_assert!(opened.remove(&record.ticket), "close of unopened {}", record.ticket);
                }
            }
        }
        prop_assert!(opened.is_empty());

        let summary = HistorySummary::from_records(history);
        let balance_change = bot.bridge().balance() - 10_000.0;
        prop_assert!((summary.realized_pnl - balance_change).abs() < 1e-6);
        prop_assert_eq!(summary.wins + summary.losses, summary.closed);
    }
}
