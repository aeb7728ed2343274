//! Trading pair catalog
//!
//! The program supports a fixed set of pairs quoted in USDT. Pair indices and
//! decimal precisions mirror the deployed program and never change at runtime.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

use crate::error::{EngineError, Result};

/// Quote asset (USDT) precision, shared by every pair
pub const QUOTE_DECIMALS: u8 = 6;

/// One supported market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PairSpec {
    pub symbol: &'static str,
    pub pair_index: u8,
    pub base_decimals: u8,
}

impl PairSpec {
    /// Display name, e.g. "SOL/USDT"
    pub fn market_name(&self) -> String {
        format!("{}/USDT", self.symbol)
    }
}

/// Every pair the program knows about
pub const PAIRS: [PairSpec; 5] = [
    PairSpec { symbol: "SOL", pair_index: 0, base_decimals: 9 },
    PairSpec { symbol: "BTC", pair_index: 1, base_decimals: 8 },
    PairSpec { symbol: "ETH", pair_index: 2, base_decimals: 18 },
    PairSpec { symbol: "AVAX", pair_index: 3, base_decimals: 18 },
    PairSpec { symbol: "LINK", pair_index: 4, base_decimals: 18 },
];

static PAIRS_BY_SYMBOL: Lazy<HashMap<&'static str, &'static PairSpec>> =
    Lazy::new(|| PAIRS.iter().map(|pair| (pair.symbol, pair)).collect());

/// Look up a pair by its on-chain index
pub fn by_index(pair_index: u8) -> Result<&'static PairSpec> {
    PAIRS
        .get(pair_index as usize)
        .ok_or_else(|| EngineError::UnknownPair(format!("index {}", pair_index)))
}

/// Look up a pair by symbol (case-insensitive)
pub fn by_symbol(symbol: &str) -> Result<&'static PairSpec> {
    PAIRS_BY_SYMBOL
        .get(symbol.to_ascii_uppercase().as_str())
        .copied()
        .ok_or_else(|| EngineError::UnknownPair(symbol.to_string()))
}
