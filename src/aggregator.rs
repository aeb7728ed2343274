//! Ledger aggregation
//!
//! Scans program accounts on a venue and folds them into caller-facing
//! views: position lists, balances, and the competition leaderboard.
//! A record that fails to decode is skipped with a warning; a partial view
//! is still served.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use tracing::warn;

use crate::accounts::{
    PositionDirection, PositionRecord, PositionStatus, UserAccountRecord, POSITION_ACCOUNT_LEN,
    USER_ACCOUNT_LEN,
};
use crate::error::Result;
use crate::pairs;
use crate::scale::{from_quote_units, from_scaled};
use crate::venue::{AccountFilter, VenueTransport};

/// Every account starts the competition with this portfolio value in quote units
pub const STARTING_PORTFOLIO_VALUE: f64 = 10_000.0;

/// Offset of the owner pubkey in both user and position records
const OWNER_OFFSET: usize = 8;

/// A position rendered in human units
#[derive(Debug, Clone, Serialize)]
pub struct PositionView {
    pub address: String,
    pub pair: String,
    pub position_id: u64,
    pub direction: PositionDirection,
    pub base_amount: f64,
    pub entry_price: f64,
    pub take_profit: Option<f64>,
    pub stop_loss: Option<f64>,
    pub status: PositionStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub opened_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub closed_at: Option<DateTime<Utc>>,
}

impl PositionView {
    /// Render a decoded record. Fails when the pair index is outside the
    /// catalog, since the base amount cannot be scaled without it.
    pub fn from_record(address: &Pubkey, record: &PositionRecord) -> Result<Self> {
        let pair = pairs::by_index(record.pair_index)?;

        Ok(PositionView {
            address: address.to_string(),
            pair: pair.symbol.to_string(),
            position_id: record.position_id,
            direction: record.direction,
            base_amount: from_scaled(record.base_amount, pair.base_decimals),
            entry_price: from_quote_units(record.entry_price),
            take_profit: record.take_profit_price().map(from_quote_units),
            stop_loss: record.stop_loss_price().map(from_quote_units),
            status: record.status,
            opened_at: DateTime::from_timestamp(record.opened_at, 0).unwrap_or_default(),
            closed_at: match record.status {
                PositionStatus::Closed => DateTime::from_timestamp(record.closed_at, 0),
                PositionStatus::Active => None,
            },
        })
    }
}

/// Per-pair balances rendered in human units
#[derive(Debug, Clone, Serialize)]
pub struct BalanceView {
    pub pair: String,
    pub quote_balance: f64,
    pub base_balance: f64,
    pub total_positions: u64,
}

impl BalanceView {
    pub fn from_record(record: &UserAccountRecord) -> Self {
        let pair = match pairs::by_index(record.pair_index) {
            Ok(spec) => {
                if spec.base_decimals != record.base_decimals {
                    warn!(
                        "Pair {} stores {} base decimals, catalog says {}; using stored",
                        spec.symbol, record.base_decimals, spec.base_decimals
                    );
                }
                spec.symbol.to_string()
            }
            Err(_) => format!("PAIR-{}", record.pair_index),
        };

        BalanceView {
            pair,
            quote_balance: record.quote_balance_ui(),
            base_balance: record.base_balance_ui(),
            total_positions: record.total_positions,
        }
    }
}

/// One leaderboard entry
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardRow {
    pub rank: usize,
    pub address: String,
    pub portfolio_value: f64,
    pub pnl: f64,
}

/// Portfolio value of one pair account at the given price.
/// A missing price values the base leg at zero.
pub fn account_value(record: &UserAccountRecord, price: Option<f64>) -> f64 {
    let base_value = price
        .map(|p| record.base_balance_ui() * p)
        .unwrap_or(0.0);
    record.quote_balance_ui() + base_value
}

/// First characters of the base58 owner, the display form used in rankings
pub fn short_address(owner: &Pubkey) -> String {
    owner.to_string().chars().take(8).collect()
}

/// All positions of one owner, scan order
pub async fn scan_positions(
    venue: &dyn VenueTransport,
    program_id: &Pubkey,
    owner: &Pubkey,
) -> Result<Vec<PositionView>> {
    let accounts = venue
        .query_program_accounts(
            program_id,
            vec![
                AccountFilter::DataSize(POSITION_ACCOUNT_LEN as u64),
                AccountFilter::MemcmpAt {
                    offset: OWNER_OFFSET,
                    bytes: owner.as_ref().to_vec(),
                },
            ],
        )
        .await?;

    let mut views = Vec::with_capacity(accounts.len());
    for (address, data) in accounts {
        let view = PositionRecord::decode(&data)
            .and_then(|record| PositionView::from_record(&address, &record));
        match view {
            Ok(view) => views.push(view),
            Err(err) => warn!("Skipping position {}: {}", address, err),
        }
    }
    Ok(views)
}

/// Every per-pair user account of the program, scan order
pub async fn scan_user_accounts(
    venue: &dyn VenueTransport,
    program_id: &Pubkey,
) -> Result<Vec<(Pubkey, UserAccountRecord)>> {
    let accounts = venue
        .query_program_accounts(
            program_id,
            vec![AccountFilter::DataSize(USER_ACCOUNT_LEN as u64)],
        )
        .await?;

    let mut records = Vec::with_capacity(accounts.len());
    for (address, data) in accounts {
        match UserAccountRecord::decode(&data) {
            Ok(record) => records.push((address, record)),
            Err(err) => warn!("Skipping user account {}: {}", address, err),
        }
    }
    Ok(records)
}

/// Rank every participant by profit over the starting portfolio.
/// `prices` maps pair index to the current price in quote units; owners tied
/// on pnl keep their scan order.
pub async fn leaderboard(
    venue: &dyn VenueTransport,
    program_id: &Pubkey,
    prices: &HashMap<u8, f64>,
) -> Result<Vec<LeaderboardRow>> {
    let accounts = scan_user_accounts(venue, program_id).await?;

    let mut order: Vec<Pubkey> = Vec::new();
    let mut totals: HashMap<Pubkey, f64> = HashMap::new();
    for (_, record) in &accounts {
        let value = account_value(record, prices.get(&record.pair_index).copied());
        if !totals.contains_key(&record.owner) {
            order.push(record.owner);
        }
        *totals.entry(record.owner).or_insert(0.0) += value;
    }

    let mut rows: Vec<LeaderboardRow> = order
        .iter()
        .map(|owner| {
            let portfolio_value = totals.get(owner).copied().unwrap_or(0.0);
            LeaderboardRow {
                rank: 0,
                address: short_address(owner),
                portfolio_value,
                pnl: portfolio_value - STARTING_PORTFOLIO_VALUE,
            }
        })
        .collect();

    rows.sort_by(|a, b| b.pnl.partial_cmp(&a.pnl).unwrap_or(std::cmp::Ordering::Equal));
    for (index, row) in rows.iter_mut().enumerate() {
        row.rank = index + 1;
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::venue::{MemoryVenue, VenueKind};

    fn user_account_bytes(
        owner: &Pubkey,
        pair_index: u8,
        quote_balance: u64,
        base_balance: u64,
        base_decimals: u8,
    ) -> Vec<u8> {
        let mut data = vec![0u8; USER_ACCOUNT_LEN];
        data[8..40].copy_from_slice(owner.as_ref());
        data[40] = pair_index;
        data[41..49].copy_from_slice(&quote_balance.to_le_bytes());
        data[49..57].copy_from_slice(&base_balance.to_le_bytes());
        data[57] = 6;
        data[58] = base_decimals;
        data
    }

    fn position_bytes(owner: &Pubkey, pair_index: u8, direction: u8, status: u8) -> Vec<u8> {
        let mut data = vec![0u8; POSITION_ACCOUNT_LEN];
        data[8..40].copy_from_slice(owner.as_ref());
        data[40] = pair_index;
        data[41..49].copy_from_slice(&1u64.to_le_bytes());
        data[49] = direction;
        data[50..58].copy_from_slice(&1_500_000_000u64.to_le_bytes());
        data[58..66].copy_from_slice(&150_000_000u64.to_le_bytes());
        data[66..74].copy_from_slice(&200_000_000u64.to_le_bytes());
        data[82] = status;
        data[83..91].copy_from_slice(&1_700_000_000i64.to_le_bytes());
        data
    }

    #[tokio::test]
    async fn test_leaderboard_values_and_ranks() {
        let venue = MemoryVenue::new(VenueKind::Rollup);
        let program = Pubkey::new_unique();

        // 500 quote on SOL plus 2 BTC priced at 100: portfolio 700
        let behind = Pubkey::new_unique();
        venue.insert_account(
            program,
            Pubkey::new_unique(),
            user_account_bytes(&behind, 0, 500_000_000, 0, 9),
        );
        venue.insert_account(
            program,
            Pubkey::new_unique(),
            user_account_bytes(&behind, 1, 0, 200_000_000, 8),
        );

        // 12000 quote, in profit
        let ahead = Pubkey::new_unique();
        venue.insert_account(
            program,
            Pubkey::new_unique(),
            user_account_bytes(&ahead, 0, 12_000_000_000, 0, 9),
        );

        let prices = HashMap::from([(0u8, 150.0), (1u8, 100.0)]);
        let rows = leaderboard(&venue, &program, &prices).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[0].address, short_address(&ahead));
        assert!((rows[0].pnl - 2_000.0).abs() < 1e-6);

        assert_eq!(rows[1].rank, 2);
        assert_eq!(rows[1].address, short_address(&behind));
        assert!((rows[1].portfolio_value - 700.0).abs() < 1e-6);
        assert!((rows[1].pnl + 9_300.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_leaderboard_missing_price_counts_quote_only() {
        let venue = MemoryVenue::new(VenueKind::Rollup);
        let program = Pubkey::new_unique();

        let owner = Pubkey::new_unique();
        // 100 quote and 5 ETH, but no ETH price supplied
        venue.insert_account(
            program,
            Pubkey::new_unique(),
            user_account_bytes(&owner, 2, 100_000_000, 5_000_000_000_000_000_000, 18),
        );

        let rows = leaderboard(&venue, &program, &HashMap::new())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert!((rows[0].portfolio_value - 100.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_leaderboard_ties_keep_scan_order() {
        let venue = MemoryVenue::new(VenueKind::Rollup);
        let program = Pubkey::new_unique();

        let first = Pubkey::new_unique();
        let second = Pubkey::new_unique();
        for owner in [&first, &second] {
            venue.insert_account(
                program,
                Pubkey::new_unique(),
                user_account_bytes(owner, 0, 3_000_000_000, 0, 9),
            );
        }

        let rows = leaderboard(&venue, &program, &HashMap::new())
            .await
            .unwrap();
        assert_eq!(rows[0].address, short_address(&first));
        assert_eq!(rows[1].address, short_address(&second));
    }

    #[tokio::test]
    async fn test_scan_positions_skips_undecodable() {
        let venue = MemoryVenue::new(VenueKind::Rollup);
        let program = Pubkey::new_unique();
        let owner = Pubkey::new_unique();

        venue.insert_account(
            program,
            Pubkey::new_unique(),
            position_bytes(&owner, 0, 0, 0),
        );
        // Direction byte outside the enum
        venue.insert_account(
            program,
            Pubkey::new_unique(),
            position_bytes(&owner, 0, 7, 0),
        );
        // Pair index outside the catalog
        venue.insert_account(
            program,
            Pubkey::new_unique(),
            position_bytes(&owner, 9, 0, 0),
        );
        // Another owner entirely
        venue.insert_account(
            program,
            Pubkey::new_unique(),
            position_bytes(&Pubkey::new_unique(), 0, 0, 0),
        );

        let views = scan_positions(&venue, &program, &owner).await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].pair, "SOL");
        assert_eq!(views[0].direction, PositionDirection::Long);
    }

    #[test]
    fn test_position_view_rendering() {
        let owner = Pubkey::new_unique();
        let address = Pubkey::new_unique();
        let record = PositionRecord::decode(&position_bytes(&owner, 0, 1, 0)).unwrap();

        let view = PositionView::from_record(&address, &record).unwrap();
        assert_eq!(view.pair, "SOL");
        assert_eq!(view.direction, PositionDirection::Short);
        assert!((view.base_amount - 1.5).abs() < 1e-9);
        assert!((view.entry_price - 150.0).abs() < 1e-9);
        assert_eq!(view.take_profit, Some(200.0));
        assert_eq!(view.stop_loss, None);
        assert_eq!(view.opened_at.timestamp_millis(), 1_700_000_000_000);
        assert!(view.closed_at.is_none());
    }

    #[test]
    fn test_balance_view_uses_stored_decimals() {
        let owner = Pubkey::new_unique();
        // Catalog says SOL has 9 base decimals; the record stores 8
        let record =
            UserAccountRecord::decode(&user_account_bytes(&owner, 0, 250_000_000, 300_000_000, 8))
                .unwrap();

        let view = BalanceView::from_record(&record);
        assert_eq!(view.pair, "SOL");
        assert!((view.quote_balance - 250.0).abs() < 1e-9);
        assert!((view.base_balance - 3.0).abs() < 1e-9);
    }
}
