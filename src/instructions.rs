//! Instruction construction for the paper trading program
//!
//! The program dispatches on an 8-byte selector (sha256 of "global:" plus the
//! method name) followed by little-endian fields at fixed offsets. Amounts and
//! prices arrive here already scaled; see [`crate::scale`].

use sha2::{Digest, Sha256};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program,
};

use crate::accounts::PositionDirection;

/// Method names dispatched by the program
pub mod methods {
    pub const INITIALIZE_ACCOUNT: &str = "initialize_account";
    pub const BUY: &str = "buy";
    pub const SELL: &str = "sell";
    pub const OPEN_LONG_POSITION: &str = "open_long_position";
    pub const OPEN_SHORT_POSITION: &str = "open_short_position";
    pub const CLOSE_POSITION: &str = "close_position";
}

/// selector + pair u8 + entry fee u64 + initial quote u64 + two decimal bytes
pub const INITIALIZE_ACCOUNT_DATA_LEN: usize = 27;
/// selector + amount u64 + price u64
pub const TRADE_DATA_LEN: usize = 24;
/// selector + amount u64 + price u64 + take profit u64 + stop loss u64
pub const OPEN_POSITION_DATA_LEN: usize = 40;
/// selector + price u64
pub const CLOSE_POSITION_DATA_LEN: usize = 16;

/// First 8 bytes of sha256("global:<method>")
pub fn method_discriminator(method: &str) -> [u8; 8] {
    let mut hasher = Sha256::new();
    hasher.update(b"global:");
    hasher.update(method.as_bytes());
    let digest = hasher.finalize();
    let mut selector = [0u8; 8];
    selector.copy_from_slice(&digest[..8]);
    selector
}

/// Builds instructions against one deployment of the trading program
pub struct InstructionBuilder {
    program_id: Pubkey,
}

impl InstructionBuilder {
    pub fn new(program_id: Pubkey) -> Self {
        Self { program_id }
    }

    /// Create the per-pair user account and pay the entry fee
    #[allow(clippy::too_many_arguments)]
    pub fn initialize_account(
        &self,
        user_account: &Pubkey,
        config: &Pubkey,
        owner: &Pubkey,
        treasury: &Pubkey,
        pair_index: u8,
        entry_fee: u64,
        initial_quote: u64,
        quote_decimals: u8,
        base_decimals: u8,
    ) -> Instruction {
        let mut data = Vec::with_capacity(INITIALIZE_ACCOUNT_DATA_LEN);
        data.extend_from_slice(&method_discriminator(methods::INITIALIZE_ACCOUNT));
        data.push(pair_index);
        data.extend_from_slice(&entry_fee.to_le_bytes());
        data.extend_from_slice(&initial_quote.to_le_bytes());
        data.push(quote_decimals);
        data.push(base_decimals);

        Instruction {
            program_id: self.program_id,
            accounts: vec![
                AccountMeta::new(*user_account, false),
                AccountMeta::new_readonly(*config, false),
                AccountMeta::new(*owner, true),
                AccountMeta::new(*treasury, false),
                AccountMeta::new_readonly(system_program::id(), false),
            ],
            data,
        }
    }

    /// Spend quote balance for base at the given price
    pub fn buy(
        &self,
        user_account: &Pubkey,
        owner: &Pubkey,
        quote_amount: u64,
        price: u64,
    ) -> Instruction {
        self.trade(methods::BUY, user_account, owner, quote_amount, price)
    }

    /// Sell base balance back to quote at the given price
    pub fn sell(
        &self,
        user_account: &Pubkey,
        owner: &Pubkey,
        base_amount: u64,
        price: u64,
    ) -> Instruction {
        self.trade(methods::SELL, user_account, owner, base_amount, price)
    }

    fn trade(
        &self,
        method: &str,
        user_account: &Pubkey,
        owner: &Pubkey,
        amount: u64,
        price: u64,
    ) -> Instruction {
        let mut data = Vec::with_capacity(TRADE_DATA_LEN);
        data.extend_from_slice(&method_discriminator(method));
        data.extend_from_slice(&amount.to_le_bytes());
        data.extend_from_slice(&price.to_le_bytes());

        Instruction {
            program_id: self.program_id,
            accounts: vec![
                AccountMeta::new(*user_account, false),
                AccountMeta::new_readonly(*owner, true),
            ],
            data,
        }
    }

    /// Open a long or short position. Zero take-profit or stop-loss means
    /// the trigger is unset.
    #[allow(clippy::too_many_arguments)]
    pub fn open_position(
        &self,
        user_account: &Pubkey,
        position: &Pubkey,
        owner: &Pubkey,
        direction: PositionDirection,
        base_amount: u64,
        price: u64,
        take_profit: u64,
        stop_loss: u64,
    ) -> Instruction {
        let method = match direction {
            PositionDirection::Long => methods::OPEN_LONG_POSITION,
            PositionDirection::Short => methods::OPEN_SHORT_POSITION,
        };

        let mut data = Vec::with_capacity(OPEN_POSITION_DATA_LEN);
        data.extend_from_slice(&method_discriminator(method));
        data.extend_from_slice(&base_amount.to_le_bytes());
        data.extend_from_slice(&price.to_le_bytes());
        data.extend_from_slice(&take_profit.to_le_bytes());
        data.extend_from_slice(&stop_loss.to_le_bytes());

        Instruction {
            program_id: self.program_id,
            accounts: vec![
                AccountMeta::new(*user_account, false),
                AccountMeta::new(*position, false),
                AccountMeta::new(*owner, true),
                AccountMeta::new_readonly(system_program::id(), false),
            ],
            data,
        }
    }

    /// Close an active position at the given price
    pub fn close_position(
        &self,
        position: &Pubkey,
        user_account: &Pubkey,
        owner: &Pubkey,
        price: u64,
    ) -> Instruction {
        let mut data = Vec::with_capacity(CLOSE_POSITION_DATA_LEN);
        data.extend_from_slice(&method_discriminator(methods::CLOSE_POSITION));
        data.extend_from_slice(&price.to_le_bytes());

        Instruction {
            program_id: self.program_id,
            accounts: vec![
                AccountMeta::new(*position, false),
                AccountMeta::new(*user_account, false),
                AccountMeta::new_readonly(*owner, true),
            ],
            data,
        }
    }
}
