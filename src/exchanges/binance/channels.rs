//! Stream names for the combined-stream socket. Symbols are lowercased on the wire.

use crate::core::types::Subscription;

fn stream(symbol: &str, suffix: &str) -> Subscription {
    Subscription::market_data(format!("{}@{}", symbol.to_lowercase(), suffix))
}

/// Candles; `interval` is e.g. `1m`, `1h`, `1d`
pub fn kline(symbol: &str, interval: &str) -> Subscription {
    stream(symbol, &format!("kline_{}", interval))
}

pub fn trade(symbol: &str) -> Subscription {
    stream(symbol, "trade")
}

pub fn agg_trade(symbol: &str) -> Subscription {
    stream(symbol, "aggTrade")
}

/// Diff depth updates
pub fn depth(symbol: &str) -> Subscription {
    stream(symbol, "depth")
}

/// Top `levels` of the book (5, 10 or 20)
pub fn partial_depth(symbol: &str, levels: u32) -> Subscription {
    stream(symbol, &format!("depth{}", levels))
}

pub fn ticker(symbol: &str) -> Subscription {
    stream(symbol, "ticker")
}

pub fn book_ticker(symbol: &str) -> Subscription {
    stream(symbol, "bookTicker")
}
