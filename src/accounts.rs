//! On-chain record layouts and decoding
//!
//! The program writes accounts with fixed field offsets, so decoding is plain
//! little-endian reads at known positions. Allocation sizes are larger than
//! the field span (the program pads to alignment); the padded size is what
//! scans filter on and what a well-formed record must have.

use serde::Serialize;
use solana_sdk::pubkey::Pubkey;

use crate::error::{EngineError, Result};
use crate::scale::{from_quote_units, from_scaled};

/// Allocated size of a per-pair user account
pub const USER_ACCOUNT_LEN: usize = 68;

/// Allocated size of a position account
pub const POSITION_ACCOUNT_LEN: usize = 104;

// Fixed part of a competition record, before the length-prefixed name
const COMPETITION_FIXED_LEN: usize = 77;

fn read_pubkey(data: &[u8], offset: usize) -> Pubkey {
    let mut buf = [0u8; 32];
    buf.copy_from_slice(&data[offset..offset + 32]);
    Pubkey::new_from_array(buf)
}

fn read_u64(data: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

fn read_i64(data: &[u8], offset: usize) -> i64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[offset..offset + 8]);
    i64::from_le_bytes(buf)
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(buf)
}

/// Side of a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionDirection {
    Long,
    Short,
}

impl PositionDirection {
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(PositionDirection::Long),
            1 => Ok(PositionDirection::Short),
            other => Err(EngineError::MalformedRecord {
                record: "position",
                reason: format!("unknown direction byte {}", other),
            }),
        }
    }
}

impl std::fmt::Display for PositionDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionDirection::Long => write!(f, "LONG"),
            PositionDirection::Short => write!(f, "SHORT"),
        }
    }
}

/// Lifecycle state of a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    Active,
    Closed,
}

impl PositionStatus {
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(PositionStatus::Active),
            1 => Ok(PositionStatus::Closed),
            other => Err(EngineError::MalformedRecord {
                record: "position",
                reason: format!("unknown status byte {}", other),
            }),
        }
    }
}

/// Per-pair trading balances for one owner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserAccountRecord {
    pub owner: Pubkey,
    pub pair_index: u8,
    pub quote_balance: u64,
    pub base_balance: u64,
    pub quote_decimals: u8,
    pub base_decimals: u8,
    pub total_positions: u64,
}

impl UserAccountRecord {
    /// Decode from raw account data. The discriminator is opaque and skipped.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < USER_ACCOUNT_LEN {
            return Err(EngineError::MalformedRecord {
                record: "user account",
                reason: format!("{} bytes, expected {}", data.len(), USER_ACCOUNT_LEN),
            });
        }

        Ok(UserAccountRecord {
            owner: read_pubkey(data, 8),
            pair_index: data[40],
            quote_balance: read_u64(data, 41),
            base_balance: read_u64(data, 49),
            quote_decimals: data[57],
            base_decimals: data[58],
            total_positions: read_u64(data, 59),
        })
    }

    /// Quote balance in human units, using the stored precision
    pub fn quote_balance_ui(&self) -> f64 {
        from_scaled(self.quote_balance, self.quote_decimals)
    }

    /// Base balance in human units, using the stored precision
    pub fn base_balance_ui(&self) -> f64 {
        from_scaled(self.base_balance, self.base_decimals)
    }
}

/// One leveraged paper position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionRecord {
    pub owner: Pubkey,
    pub pair_index: u8,
    pub position_id: u64,
    pub direction: PositionDirection,
    pub base_amount: u64,
    pub entry_price: u64,
    pub take_profit: u64,
    pub stop_loss: u64,
    pub status: PositionStatus,
    pub opened_at: i64,
    pub closed_at: i64,
}

impl PositionRecord {
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < POSITION_ACCOUNT_LEN {
            return Err(EngineError::MalformedRecord {
                record: "position",
                reason: format!("{} bytes, expected {}", data.len(), POSITION_ACCOUNT_LEN),
            });
        }

        Ok(PositionRecord {
            owner: read_pubkey(data, 8),
            pair_index: data[40],
            position_id: read_u64(data, 41),
            direction: PositionDirection::from_byte(data[49])?,
            base_amount: read_u64(data, 50),
            entry_price: read_u64(data, 58),
            take_profit: read_u64(data, 66),
            stop_loss: read_u64(data, 74),
            status: PositionStatus::from_byte(data[82])?,
            opened_at: read_i64(data, 83),
            closed_at: read_i64(data, 91),
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == PositionStatus::Active
    }

    /// Take-profit trigger price, zero on chain means unset
    pub fn take_profit_price(&self) -> Option<u64> {
        (self.take_profit != 0).then_some(self.take_profit)
    }

    /// Stop-loss trigger price, zero on chain means unset
    pub fn stop_loss_price(&self) -> Option<u64> {
        (self.stop_loss != 0).then_some(self.stop_loss)
    }

    /// Open time in milliseconds (stored as unix seconds)
    pub fn opened_at_ms(&self) -> i64 {
        self.opened_at * 1000
    }

    /// Close time in milliseconds (stored as unix seconds)
    pub fn closed_at_ms(&self) -> i64 {
        self.closed_at * 1000
    }

    /// Profit or loss in quote units at the given mark price
    pub fn unrealized_pnl(&self, mark_price: f64, base_decimals: u8) -> f64 {
        let amount = from_scaled(self.base_amount, base_decimals);
        let entry = from_quote_units(self.entry_price);
        match self.direction {
            PositionDirection::Long => (mark_price - entry) * amount,
            PositionDirection::Short => (entry - mark_price) * amount,
        }
    }
}

/// Program-wide settings record, holds the fee destination
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalConfigRecord {
    pub authority: Pubkey,
    pub treasury: Pubkey,
}

impl GlobalConfigRecord {
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 72 {
            return Err(EngineError::MalformedRecord {
                record: "config",
                reason: format!("{} bytes, expected at least 72", data.len()),
            });
        }

        Ok(GlobalConfigRecord {
            authority: read_pubkey(data, 8),
            treasury: read_pubkey(data, 40),
        })
    }
}

/// Competition state stored in the rollup component
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetitionRecord {
    pub authority: Pubkey,
    pub start_time: i64,
    pub end_time: i64,
    pub total_participants: u64,
    pub prize_pool: u64,
    pub is_active: bool,
    pub name: String,
}

impl CompetitionRecord {
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < COMPETITION_FIXED_LEN {
            return Err(EngineError::MalformedRecord {
                record: "competition",
                reason: format!(
                    "{} bytes, expected at least {}",
                    data.len(),
                    COMPETITION_FIXED_LEN
                ),
            });
        }

        let name_len = read_u32(data, 73) as usize;
        let name_end = COMPETITION_FIXED_LEN + name_len;
        if data.len() < name_end {
            return Err(EngineError::MalformedRecord {
                record: "competition",
                reason: format!(
                    "name length {} runs past the {} byte record",
                    name_len,
                    data.len()
                ),
            });
        }

        Ok(CompetitionRecord {
            authority: read_pubkey(data, 8),
            start_time: read_i64(data, 40),
            end_time: read_i64(data, 48),
            total_participants: read_u64(data, 56),
            prize_pool: read_u64(data, 64),
            is_active: data[72] == 1,
            name: String::from_utf8_lossy(&data[COMPETITION_FIXED_LEN..name_end]).into_owned(),
        })
    }

    pub fn start_time_ms(&self) -> i64 {
        self.start_time * 1000
    }

    pub fn end_time_ms(&self) -> i64 {
        self.end_time * 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user_account(owner: &Pubkey) -> Vec<u8> {
        let mut data = vec![0u8; USER_ACCOUNT_LEN];
        data[..8].copy_from_slice(&[7u8; 8]);
        data[8..40].copy_from_slice(owner.as_ref());
        data[40] = 1;
        data[41..49].copy_from_slice(&500_000_000u64.to_le_bytes());
        data[49..57].copy_from_slice(&200_000_000u64.to_le_bytes());
        data[57] = 6;
        data[58] = 8;
        data[59..67].copy_from_slice(&3u64.to_le_bytes());
        data
    }

    fn sample_position(owner: &Pubkey) -> Vec<u8> {
        let mut data = vec![0u8; POSITION_ACCOUNT_LEN];
        data[..8].copy_from_slice(&[9u8; 8]);
        data[8..40].copy_from_slice(owner.as_ref());
        data[40] = 0;
        data[41..49].copy_from_slice(&2u64.to_le_bytes());
        data[49] = 0;
        data[50..58].copy_from_slice(&2_000_000_000u64.to_le_bytes());
        data[58..66].copy_from_slice(&100_000_000u64.to_le_bytes());
        data[66..74].copy_from_slice(&120_000_000u64.to_le_bytes());
        data[74..82].copy_from_slice(&0u64.to_le_bytes());
        data[82] = 0;
        data[83..91].copy_from_slice(&1_700_000_000i64.to_le_bytes());
        data[91..99].copy_from_slice(&0i64.to_le_bytes());
        data
    }

    #[test]
    fn test_user_account_round_trip() {
        let owner = Pubkey::new_unique();
        let record = UserAccountRecord::decode(&sample_user_account(&owner)).unwrap();

        assert_eq!(record.owner, owner);
        assert_eq!(record.pair_index, 1);
        assert_eq!(record.quote_balance, 500_000_000);
        assert_eq!(record.base_balance, 200_000_000);
        assert_eq!(record.quote_decimals, 6);
        assert_eq!(record.base_decimals, 8);
        assert_eq!(record.total_positions, 3);

        assert!((record.quote_balance_ui() - 500.0).abs() < 1e-9);
        assert!((record.base_balance_ui() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_user_account_rejects_short_buffer() {
        let owner = Pubkey::new_unique();
        let data = sample_user_account(&owner);

        for len in [0, 8, 40, USER_ACCOUNT_LEN - 1] {
            match UserAccountRecord::decode(&data[..len]) {
                Err(EngineError::MalformedRecord { record, .. }) => {
                    assert_eq!(record, "user account")
                }
                other => panic!("expected MalformedRecord for len {}, got {:?}", len, other),
            }
        }
    }

    #[test]
    fn test_position_round_trip() {
        let owner = Pubkey::new_unique();
        let record = PositionRecord::decode(&sample_position(&owner)).unwrap();

        assert_eq!(record.owner, owner);
        assert_eq!(record.position_id, 2);
        assert_eq!(record.direction, PositionDirection::Long);
        assert_eq!(record.base_amount, 2_000_000_000);
        assert_eq!(record.entry_price, 100_000_000);
        assert_eq!(record.take_profit_price(), Some(120_000_000));
        assert_eq!(record.stop_loss_price(), None);
        assert_eq!(record.status, PositionStatus::Active);
        assert!(record.is_active());
        assert_eq!(record.opened_at, 1_700_000_000);
        assert_eq!(record.opened_at_ms(), 1_700_000_000_000);
    }

    #[test]
    fn test_position_rejects_bad_enums() {
        let owner = Pubkey::new_unique();

        let mut data = sample_position(&owner);
        data[49] = 7;
        assert!(PositionRecord::decode(&data).is_err());

        let mut data = sample_position(&owner);
        data[82] = 2;
        assert!(PositionRecord::decode(&data).is_err());
    }

    #[test]
    fn test_position_rejects_short_buffer() {
        let owner = Pubkey::new_unique();
        let data = sample_position(&owner);
        assert!(PositionRecord::decode(&data[..POSITION_ACCOUNT_LEN - 1]).is_err());
    }

    #[test]
    fn test_unrealized_pnl_by_direction() {
        let owner = Pubkey::new_unique();
        let mut long = PositionRecord::decode(&sample_position(&owner)).unwrap();

        // 2.0 base at entry 100, marked at 110
        let pnl = long.unrealized_pnl(110.0, 9);
        assert!((pnl - 20.0).abs() < 1e-9);

        long.direction = PositionDirection::Short;
        let pnl = long.unrealized_pnl(110.0, 9);
        assert!((pnl + 20.0).abs() < 1e-9);
    }

    fn sample_competition(authority: &Pubkey, name: &str) -> Vec<u8> {
        let mut data = vec![0u8; COMPETITION_FIXED_LEN + name.len()];
        data[..8].copy_from_slice(&[3u8; 8]);
        data[8..40].copy_from_slice(authority.as_ref());
        data[40..48].copy_from_slice(&1_700_000_000i64.to_le_bytes());
        data[48..56].copy_from_slice(&1_700_600_000i64.to_le_bytes());
        data[56..64].copy_from_slice(&42u64.to_le_bytes());
        data[64..72].copy_from_slice(&1_000_000u64.to_le_bytes());
        data[72] = 1;
        data[73..77].copy_from_slice(&(name.len() as u32).to_le_bytes());
        data[77..].copy_from_slice(name.as_bytes());
        data
    }

    #[test]
    fn test_competition_decode() {
        let authority = Pubkey::new_unique();
        let record =
            CompetitionRecord::decode(&sample_competition(&authority, "Weekly Sprint")).unwrap();

        assert_eq!(record.authority, authority);
        assert_eq!(record.start_time, 1_700_000_000);
        assert_eq!(record.end_time, 1_700_600_000);
        assert_eq!(record.total_participants, 42);
        assert_eq!(record.prize_pool, 1_000_000);
        assert!(record.is_active);
        assert_eq!(record.name, "Weekly Sprint");
        assert_eq!(record.end_time_ms(), 1_700_600_000_000);
    }

    #[test]
    fn test_global_config_decode() {
        let authority = Pubkey::new_unique();
        let treasury = Pubkey::new_unique();
        let mut data = vec![0u8; 80];
        data[8..40].copy_from_slice(authority.as_ref());
        data[40..72].copy_from_slice(treasury.as_ref());

        let record = GlobalConfigRecord::decode(&data).unwrap();
        assert_eq!(record.authority, authority);
        assert_eq!(record.treasury, treasury);

        assert!(GlobalConfigRecord::decode(&data[..71]).is_err());
    }

    #[test]
    fn test_competition_rejects_bad_name_length() {
        let authority = Pubkey::new_unique();
        let mut data = sample_competition(&authority, "ok");
        // Claim a name far longer than the buffer
        data[73..77].copy_from_slice(&1000u32.to_le_bytes());
        assert!(CompetitionRecord::decode(&data).is_err());

        assert!(CompetitionRecord::decode(&data[..50]).is_err());
    }
}
