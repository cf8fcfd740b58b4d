//! Message interpreter
//!
//! Classifies raw feed messages into tracker events and derives USD values
//! from the native (SOL) market cap. Classification order matters: creation
//! first, then graduation, then trades, then the pre-normalized formats.

use super::messages::FeedMessage;

/// Fixed pump.fun token supply
pub const TOTAL_SUPPLY: f64 = 1_000_000_000.0;

/// A classified feed event
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    TokenCreated(TokenCreated),
    Trade(Trade),
    Graduation(Graduation),
    /// Recognizable JSON that is none of the above, labelled by its type field
    Unrecognized(String),
}

/// Market values derived from one message
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MarketSnapshot {
    pub market_cap_sol: f64,
    pub market_cap_usd: f64,
    pub price_usd: f64,
    pub bonding_progress: f64,
    pub v_sol_in_bonding_curve: f64,
}

impl MarketSnapshot {
    /// Derive USD values from native market cap and curve reserves
    pub fn derive(
        market_cap_sol: Option<f64>,
        v_tokens_in_bonding_curve: Option<f64>,
        v_sol_in_bonding_curve: Option<f64>,
        sol_price_usd: f64,
    ) -> Self {
        let market_cap_sol = finite_or_zero(market_cap_sol.unwrap_or(0.0));
        let market_cap_usd = market_cap_usd(market_cap_sol, sol_price_usd);
        Self {
            market_cap_sol,
            market_cap_usd,
            price_usd: price_per_unit(market_cap_usd),
            bonding_progress: bonding_progress(v_tokens_in_bonding_curve),
            v_sol_in_bonding_curve: finite_or_zero(v_sol_in_bonding_curve.unwrap_or(0.0)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenCreated {
    pub mint: String,
    pub creator: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub uri: Option<String>,
    pub market: MarketSnapshot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub mint: String,
    pub trader: Option<String>,
    pub is_buy: bool,
    pub volume_usd: f64,
    pub market: MarketSnapshot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Graduation {
    pub mint: String,
    pub signature: Option<String>,
}

/// `marketCapSol × solPrice`, 0 when not finite
pub fn market_cap_usd(market_cap_sol: f64, sol_price_usd: f64) -> f64 {
    finite_or_zero(market_cap_sol * sol_price_usd)
}

/// USD market cap spread over the fixed supply
pub fn price_per_unit(market_cap_usd: f64) -> f64 {
    finite_or_zero(market_cap_usd / TOTAL_SUPPLY)
}

/// Percentage of the curve sold, from the tokens still in it.
///
/// Missing input yields 0 rather than a spurious 100%.
pub fn bonding_progress(v_tokens_in_bonding_curve: Option<f64>) -> f64 {
    match v_tokens_in_bonding_curve {
        Some(remaining) => finite_or_zero((TOTAL_SUPPLY - remaining) / TOTAL_SUPPLY * 100.0),
        None => 0.0,
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn is_graduation(msg: &FeedMessage) -> bool {
    if msg.tx_type.as_deref() == Some("migration") || msg.kind.as_deref() == Some("migration") {
        return true;
    }
    msg.signature.is_some()
        && msg.mint.is_some()
        && (msg.migrated == Some(true) || msg.bonding_curve_complete == Some(true))
}

/// Classify a message. `None` means the message is silently discarded.
pub fn interpret(msg: &FeedMessage, sol_price_usd: f64) -> Option<FeedEvent> {
    let tx_type = msg.tx_type.as_deref();

    if tx_type == Some("create") {
        let mint = non_empty(&msg.mint)?;
        let creator = non_empty(&msg.trader_public_key)?;
        return Some(FeedEvent::TokenCreated(TokenCreated {
            mint,
            creator,
            name: non_empty(&msg.name),
            symbol: non_empty(&msg.symbol),
            uri: non_empty(&msg.uri),
            market: MarketSnapshot::derive(
                msg.market_cap_sol,
                msg.v_tokens_in_bonding_curve,
                msg.v_sol_in_bonding_curve,
                sol_price_usd,
            ),
        }));
    }

    if is_graduation(msg) {
        let mint = non_empty(&msg.mint)?;
        return Some(FeedEvent::Graduation(Graduation {
            mint,
            signature: msg.signature.clone(),
        }));
    }

    if matches!(tx_type, Some("buy") | Some("sell")) {
        let mint = non_empty(&msg.mint)?;
        let volume_usd = finite_or_zero(msg.sol_amount.unwrap_or(0.0) * sol_price_usd);
        return Some(FeedEvent::Trade(Trade {
            mint,
            trader: non_empty(&msg.trader_public_key),
            is_buy: tx_type == Some("buy"),
            volume_usd,
            market: MarketSnapshot::derive(
                msg.market_cap_sol,
                msg.v_tokens_in_bonding_curve,
                msg.v_sol_in_bonding_curve,
                sol_price_usd,
            ),
        }));
    }

    match msg.kind.as_deref() {
        Some("new_token") => interpret_normalized_creation(msg),
        Some("token_trade") => interpret_normalized_trade(msg),
        Some("token_graduated") => {
            let mint = non_empty(&msg.mint)?;
            Some(FeedEvent::Graduation(Graduation {
                mint,
                signature: msg.signature.clone(),
            }))
        }
        _ => Some(FeedEvent::Unrecognized(msg.kind_label().to_string())),
    }
}

fn normalized_snapshot(msg: &FeedMessage) -> MarketSnapshot {
    let market_cap_usd = finite_or_zero(msg.market_cap_usd.unwrap_or(0.0));
    MarketSnapshot {
        market_cap_sol: finite_or_zero(msg.market_cap_sol.unwrap_or(0.0)),
        market_cap_usd,
        price_usd: finite_or_zero(msg.price_usd.unwrap_or(0.0)),
        bonding_progress: finite_or_zero(msg.bonding_progress.unwrap_or(0.0)),
        v_sol_in_bonding_curve: finite_or_zero(msg.v_sol_in_bonding_curve.unwrap_or(0.0)),
    }
}

fn interpret_normalized_creation(msg: &FeedMessage) -> Option<FeedEvent> {
    let mint = non_empty(&msg.mint)?;
    let creator = non_empty(&msg.creator).or_else(|| non_empty(&msg.trader_public_key))?;
    Some(FeedEvent::TokenCreated(TokenCreated {
        mint,
        creator,
        name: non_empty(&msg.name),
        symbol: non_empty(&msg.symbol),
        uri: non_empty(&msg.uri),
        market: normalized_snapshot(msg),
    }))
}

fn interpret_normalized_trade(msg: &FeedMessage) -> Option<FeedEvent> {
    let mint = non_empty(&msg.mint)?;
    Some(FeedEvent::Trade(Trade {
        mint,
        trader: non_empty(&msg.trader_public_key),
        is_buy: msg.is_buy.unwrap_or(false),
        volume_usd: finite_or_zero(msg.volume_usd.unwrap_or(0.0)),
        market: normalized_snapshot(msg),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::messages::parse_message;

    fn interpret_text(text: &str, sol_price: f64) -> Option<FeedEvent> {
        interpret(&parse_message(text).unwrap(), sol_price)
    }

    #[test]
    fn test_market_cap_derivation() {
        let snapshot = MarketSnapshot::derive(Some(30.0), None, None, 185.0);
        assert_eq!(snapshot.market_cap_usd, 5550.0);
        assert!((snapshot.price_usd - 5.55e-6).abs() < 1e-15);
    }

    #[test]
    fn test_bonding_progress() {
        assert_eq!(bonding_progress(Some(200_000_000.0)), 80.0);
        assert_eq!(bonding_progress(Some(1_000_000_000.0)), 0.0);
        assert_eq!(bonding_progress(None), 0.0);
        assert_eq!(bonding_progress(Some(f64::NAN)), 0.0);
    }

    #[test]
    fn test_create() {
        let event = interpret_text(
            r#"{"txType":"create","mint":"M1","traderPublicKey":"Dev1","name":"Foo","symbol":"FOO",
                "marketCapSol":30,"vTokensInBondingCurve":200000000,"vSolInBondingCurve":42}"#,
            185.0,
        );

        match event {
            Some(FeedEvent::TokenCreated(created)) => {
                assert_eq!(created.mint, "M1");
                assert_eq!(created.creator, "Dev1");
                assert_eq!(created.name.as_deref(), Some("Foo"));
                assert_eq!(created.market.market_cap_usd, 5550.0);
                assert_eq!(created.market.bonding_progress, 80.0);
                assert_eq!(created.market.v_sol_in_bonding_curve, 42.0);
            }
            other => panic!("expected creation, got {:?}", other),
        }
    }

    #[test]
    fn test_create_missing_fields_is_discarded() {
        assert_eq!(interpret_text(r#"{"txType":"create","mint":"M1"}"#, 100.0), None);
        assert_eq!(
            interpret_text(r#"{"txType":"create","traderPublicKey":"Dev1"}"#, 100.0),
            None
        );
        assert_eq!(
            interpret_text(r#"{"txType":"create","mint":"","traderPublicKey":"Dev1"}"#, 100.0),
            None
        );
    }

    #[test]
    fn test_trade() {
        let event = interpret_text(
            r#"{"txType":"sell","mint":"M1","traderPublicKey":"W","solAmount":0.5,"marketCapSol":40}"#,
            200.0,
        );

        match event {
            Some(FeedEvent::Trade(trade)) => {
                assert!(!trade.is_buy);
                assert_eq!(trade.volume_usd, 100.0);
                assert_eq!(trade.market.market_cap_usd, 8000.0);
                assert_eq!(trade.market.bonding_progress, 0.0);
            }
            other => panic!("expected trade, got {:?}", other),
        }
    }

    #[test]
    fn test_graduation_markers() {
        let explicit = interpret_text(r#"{"txType":"migration","mint":"M1","signature":"s"}"#, 100.0);
        assert!(matches!(explicit, Some(FeedEvent::Graduation(ref g)) if g.mint == "M1"));

        let by_type = interpret_text(r#"{"type":"migration","mint":"M2"}"#, 100.0);
        assert!(matches!(by_type, Some(FeedEvent::Graduation(_))));

        let heuristic = interpret_text(
            r#"{"signature":"s","mint":"M3","bondingCurveComplete":true}"#,
            100.0,
        );
        assert!(matches!(heuristic, Some(FeedEvent::Graduation(ref g)) if g.mint == "M3"));

        let incomplete = interpret_text(r#"{"signature":"s","mint":"M4","migrated":false}"#, 100.0);
        assert_eq!(incomplete, Some(FeedEvent::Unrecognized("unknown".to_string())));
    }

    #[test]
    fn test_create_wins_over_graduation_heuristic() {
        let event = interpret_text(
            r#"{"txType":"create","mint":"M1","traderPublicKey":"D","signature":"s","migrated":true}"#,
            100.0,
        );
        assert!(matches!(event, Some(FeedEvent::TokenCreated(_))));
    }

    #[test]
    fn test_normalized_formats() {
        let created = interpret_text(
            r#"{"type":"new_token","mint":"M1","creator":"Dev1","marketCapUsd":9000,"priceUsd":0.000009}"#,
            100.0,
        );
        match created {
            Some(FeedEvent::TokenCreated(c)) => {
                assert_eq!(c.creator, "Dev1");
                assert_eq!(c.market.market_cap_usd, 9000.0);
            }
            other => panic!("expected creation, got {:?}", other),
        }

        let trade = interpret_text(
            r#"{"type":"token_trade","mint":"M1","isBuy":true,"volumeUsd":25}"#,
            100.0,
        );
        assert!(matches!(trade, Some(FeedEvent::Trade(ref t)) if t.is_buy && t.volume_usd == 25.0));

        let graduated = interpret_text(r#"{"type":"token_graduated","mint":"M1"}"#, 100.0);
        assert!(matches!(graduated, Some(FeedEvent::Graduation(_))));
    }

    #[test]
    fn test_unrecognized() {
        assert_eq!(
            interpret_text(r#"{"message":"Successfully subscribed"}"#, 100.0),
            Some(FeedEvent::Unrecognized("unknown".to_string()))
        );
        assert_eq!(
            interpret_text(r#"{"txType":"withdraw","mint":"M"}"#, 100.0),
            Some(FeedEvent::Unrecognized("withdraw".to_string()))
        );
    }
}
