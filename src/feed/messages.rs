//! PumpPortal wire messages
//!
//! Outbound subscription requests and the loosely-typed inbound push message.
//! Every inbound field is optional: the feed mixes several payload shapes on
//! one socket and classification happens in the interpreter.

use serde::{Deserialize, Serialize};

use super::FeedError;

/// A subscription request sent to the feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum Subscription {
    /// All token creations
    #[serde(rename = "subscribeNewToken")]
    NewToken,

    /// All bonding-curve migrations
    #[serde(rename = "subscribeMigration")]
    Migration,

    /// Trades (including creations) made by these wallets
    #[serde(rename = "subscribeAccountTrade")]
    AccountTrade { keys: Vec<String> },

    /// Trades on these mints
    #[serde(rename = "subscribeTokenTrade")]
    TokenTrade { keys: Vec<String> },
}

impl Subscription {
    pub fn method(&self) -> &'static str {
        match self {
            Subscription::NewToken => "subscribeNewToken",
            Subscription::Migration => "subscribeMigration",
            Subscription::AccountTrade { .. } => "subscribeAccountTrade",
            Subscription::TokenTrade { .. } => "subscribeTokenTrade",
        }
    }

    pub fn keys(&self) -> &[String] {
        match self {
            Subscription::AccountTrade { keys } | Subscription::TokenTrade { keys } => keys,
            _ => &[],
        }
    }

    pub fn to_json(&self) -> Result<String, FeedError> {
        serde_json::to_string(self).map_err(FeedError::Encode)
    }
}

/// An inbound push message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedMessage {
    pub tx_type: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,

    pub mint: Option<String>,
    pub trader_public_key: Option<String>,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub uri: Option<String>,
    pub signature: Option<String>,

    pub market_cap_sol: Option<f64>,
    pub v_tokens_in_bonding_curve: Option<f64>,
    pub v_sol_in_bonding_curve: Option<f64>,
    pub sol_amount: Option<f64>,
    pub token_amount: Option<f64>,

    pub migrated: Option<bool>,
    pub bonding_curve_complete: Option<bool>,

    // Pre-normalized alternate format
    pub creator: Option<String>,
    pub market_cap_usd: Option<f64>,
    pub price_usd: Option<f64>,
    pub bonding_progress: Option<f64>,
    pub volume_usd: Option<f64>,
    pub is_buy: Option<bool>,

    /// Server notices such as subscription acknowledgements
    pub message: Option<String>,
}

impl FeedMessage {
    /// `txType`, else `type`, else "unknown"
    pub fn kind_label(&self) -> &str {
        self.tx_type
            .as_deref()
            .or(self.kind.as_deref())
            .unwrap_or("unknown")
    }
}

/// Decode one text frame
pub fn parse_message(text: &str) -> Result<FeedMessage, FeedError> {
    serde_json::from_str(text).map_err(FeedError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_wire_format() {
        assert_eq!(
            Subscription::NewToken.to_json().unwrap(),
            r#"{"method":"subscribeNewToken"}"#
        );
        assert_eq!(
            Subscription::AccountTrade {
                keys: vec!["Dev1".to_string()]
            }
            .to_json()
            .unwrap(),
            r#"{"method":"subscribeAccountTrade","keys":["Dev1"]}"#
        );

        let parsed: Subscription =
            serde_json::from_str(r#"{"method":"subscribeTokenTrade","keys":["M1","M2"]}"#).unwrap();
        assert_eq!(parsed.method(), "subscribeTokenTrade");
        assert_eq!(parsed.keys().len(), 2);
    }

    #[test]
    fn test_parse_create_message() {
        let msg = parse_message(
            r#"{
                "signature": "5sig",
                "mint": "MintAAA",
                "traderPublicKey": "DevAAA",
                "txType": "create",
                "initialBuy": 1000000,
                "solAmount": 1.5,
                "bondingCurveKey": "Curve",
                "vTokensInBondingCurve": 1000000000,
                "vSolInBondingCurve": 30,
                "marketCapSol": 30,
                "name": "Test",
                "symbol": "TST",
                "uri": "https://ipfs.io/x",
                "pool": "pump"
            }"#,
        )
        .unwrap();

        assert_eq!(msg.tx_type.as_deref(), Some("create"));
        assert_eq!(msg.trader_public_key.as_deref(), Some("DevAAA"));
        assert_eq!(msg.market_cap_sol, Some(30.0));
        assert_eq!(msg.v_tokens_in_bonding_curve, Some(1e9));
        assert_eq!(msg.kind_label(), "create");
    }

    #[test]
    fn test_parse_ack_and_malformed() {
        let ack = parse_message(r#"{"message":"Successfully subscribed to token creation events."}"#)
            .unwrap();
        assert!(ack.tx_type.is_none());
        assert_eq!(ack.kind_label(), "unknown");

        assert!(matches!(parse_message("not json"), Err(FeedError::Malformed(_))));
        assert!(parse_message("[1,2,3]").is_err());
    }
}
