//! Channel ids and ready-made subscriptions for every Huobi stream.
//!
//! Market channels travel on the `market` socket except MBP depth, which Huobi only
//! serves on the `mbp` socket. Order, clearing and account channels need the
//! authenticated `account` socket.

use crate::core::types::{Subscription, SubscriptionKind};

pub fn kline(symbol: &str, period: &str) -> Subscription {
    Subscription::market_data(format!("market.{}.kline.{}", symbol, period))
}

/// Aggregated depth; `step` is one of `step0`..`step5`
pub fn depth(symbol: &str, step: &str) -> Subscription {
    Subscription::market_data(format!("market.{}.depth.{}", symbol, step))
}

/// Incremental MBP depth; `levels` is 5, 20 or 150
pub fn mbp(symbol: &str, levels: u32) -> Subscription {
    Subscription::market_data(format!("market.{}.mbp.{}", symbol, levels))
}

/// Full-refresh MBP depth
pub fn mbp_refresh(symbol: &str, levels: u32) -> Subscription {
    Subscription::market_data(format!("market.{}.mbp.refresh.{}", symbol, levels))
}

pub fn bbo(symbol: &str) -> Subscription {
    Subscription::market_data(format!("market.{}.bbo", symbol))
}

pub fn trade_detail(symbol: &str) -> Subscription {
    Subscription::market_data(format!("market.{}.trade.detail", symbol))
}

pub fn market_detail(symbol: &str) -> Subscription {
    Subscription::market_data(format!("market.{}.detail", symbol))
}

pub fn etp(symbol: &str) -> Subscription {
    Subscription::market_data(format!("market.{}.etp", symbol))
}

/// Order updates; `symbol` accepts the `*` wildcard
pub fn orders(symbol: &str) -> Subscription {
    Subscription::order(format!("orders#{}", symbol))
}

/// Trade clearing; mode 0 pushes fills only, mode 1 also pushes cancels
pub fn trade_clearing(symbol: &str, mode: u8) -> Subscription {
    Subscription::order(format!("trade.clearing#{}#{}", symbol, mode))
}

/// Account balance changes; mode is 0, 1 or 2
pub fn account_updates(mode: u8) -> Subscription {
    Subscription::account(format!("accounts.update#{}", mode))
}

pub fn is_mbp(subscription: &Subscription) -> bool {
    subscription.kind == SubscriptionKind::MarketData && subscription.channel_id.contains(".mbp.")
}

pub fn is_market(subscription: &Subscription) -> bool {
    subscription.kind == SubscriptionKind::MarketData && !is_mbp(subscription)
}

pub fn is_account(subscription: &Subscription) -> bool {
    matches!(
        subscription.kind,
        SubscriptionKind::Account | SubscriptionKind::Order
    )
}
