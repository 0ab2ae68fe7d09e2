//! Order assembly: turns a sized order into a two-leg bracket.

use chrono::Utc;

use bracketeer_domain::{BracketOrder, EntryKind, Instrument, OrderLeg, OrderType, TimeInForce};

use crate::sizing::SizedOrder;

/// Build the entry and protective stop legs for a sized order.
///
/// - Entry: the sized action and quantity; order type picked by `kind`
///   (`Market` sends no price, `Limit` uses the limit price, `Midpoint`
///   caps the peg at the limit price); DAY.
/// - Stop: opposite action, same quantity, triggers at the stop loss; GTC.
///
/// Both legs transmit immediately. The stop is left unlinked: its parent
/// id is attached once the broker has assigned one to the entry.
pub fn build_bracket(sized: &SizedOrder, instrument: &Instrument, kind: EntryKind) -> BracketOrder {
    let limit_price = sized.limit_price();
    let entry_type = match kind {
        EntryKind::Market => OrderType::Market,
        EntryKind::Limit => OrderType::Limit { limit_price },
        EntryKind::Midpoint => OrderType::Midpoint { price_cap: limit_price },
    };

    let entry = OrderLeg::new(sized.action(), sized.quantity(), entry_type, TimeInForce::Day);
    let stop = OrderLeg::new(
        sized.action().opposite(),
        sized.quantity(),
        OrderType::Stop { trigger_price: sized.stop_loss_price() },
        TimeInForce::Gtc,
    );

    BracketOrder {
        instrument: instrument.clone(),
        entry,
        stop,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sizing::{size_order, RiskInputs, SizingPolicy};
    use bracketeer_domain::{OrderAction, PositionTier, Price, Symbol};
    use rust_decimal_macros::dec;

    fn sized(action: OrderAction) -> SizedOrder {
        let inputs =
            RiskInputs::new(action, PositionTier::Full, "", dec!(50), dec!(10000)).unwrap();
        size_order(&inputs, Price::new(dec!(100)).unwrap(), &SizingPolicy::default()).unwrap()
    }

    fn instrument() -> Instrument {
        Instrument::us_stock(Symbol::parse("AAPL").unwrap(), 265598)
    }

    #[test]
    fn test_market_bracket() {
        let sized = sized(OrderAction::Buy);
        let bracket = build_bracket(&sized, &instrument(), EntryKind::Market);

        assert_eq!(bracket.entry.action, OrderAction::Buy);
        assert_eq!(bracket.entry.order_type, OrderType::Market);
        assert_eq!(bracket.entry.time_in_force, TimeInForce::Day);
        assert_eq!(bracket.entry.quantity, sized.quantity());
        assert!(bracket.entry.transmit);
        assert!(!bracket.entry.is_child());
    }

    #[test]
    fn test_limit_and_midpoint_carry_limit_price() {
        let sized = sized(OrderAction::Buy);

        let limit = build_bracket(&sized, &instrument(), EntryKind::Limit);
        assert_eq!(limit.entry.order_type, OrderType::Limit { limit_price: sized.limit_price() });

        let mid = build_bracket(&sized, &instrument(), EntryKind::Midpoint);
        assert_eq!(mid.entry.order_type, OrderType::Midpoint { price_cap: sized.limit_price() });
    }

    #[test]
    fn test_stop_leg_protects_entry() {
        for action in [OrderAction::Buy, OrderAction::Sell] {
            let sized = sized(action);
            let bracket = build_bracket(&sized, &instrument(), EntryKind::Limit);

            assert_eq!(bracket.stop.action, action.opposite());
            assert_eq!(bracket.stop.quantity, bracket.entry.quantity);
            assert_eq!(
                bracket.stop.order_type,
                OrderType::Stop { trigger_price: sized.stop_loss_price() }
            );
            assert_eq!(bracket.stop.time_in_force, TimeInForce::Gtc);
            assert!(bracket.stop.transmit);
            assert!(bracket.stop.parent_order_id.is_none());
        }
    }

    #[test]
    fn test_legs_have_distinct_client_ids() {
        let bracket = build_bracket(&sized(OrderAction::Buy), &instrument(), EntryKind::Market);
        assert_ne!(bracket.entry.client_order_id, bracket.stop.client_order_id);
        assert_eq!(bracket.instrument.symbol.as_str(), "AAPL");
    }
}
