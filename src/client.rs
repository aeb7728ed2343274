//! Session context and high-level operations
//!
//! `PaperTradingClient` ties the venues, the signer stack, and the codec
//! modules together into the operations a caller performs: onboarding, spot
//! trades, leveraged positions, reads, rankings, and competition settlement.
//! Reads prefer the rollup and fall through to the base chain; submissions
//! follow the rollup-primary policy in `submit`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use solana_sdk::{instruction::Instruction, pubkey::Pubkey, signature::Signature};
use tracing::{info, warn};

use crate::accounts::{
    CompetitionRecord, GlobalConfigRecord, PositionDirection, PositionRecord, PositionStatus,
    UserAccountRecord,
};
use crate::aggregator::{self, BalanceView, LeaderboardRow, PositionView};
use crate::config::EngineConfig;
use crate::ecs;
use crate::error::{EngineError, Result};
use crate::instructions::InstructionBuilder;
use crate::pairs::{self, PairSpec, PAIRS, QUOTE_DECIMALS};
use crate::pda::{self, PdaGenerator};
use crate::scale::{self, from_scaled, to_quote_units};
use crate::signer::{self, SignerStack, TransactionSigner};
use crate::submit::{self, SubmissionReceipt};
use crate::venue::{RpcVenue, VenueKind, VenueTransport};

/// Tolerance when comparing requested amounts against displayed balances
const BALANCE_EPSILON: f64 = 1e-6;

/// Lamport precision of the native token
const SOL_DECIMALS: u8 = 9;

/// Result of an onboarding call
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InitializeOutcome {
    AlreadyInitialized { address: Pubkey },
    Submitted(SubmissionReceipt),
}

/// Initialization state of one pair account
#[derive(Debug, Serialize)]
pub struct AccountStatus {
    pub pair: String,
    pub initialized: bool,
    pub balances: Option<BalanceView>,
}

/// One session against the paper trading deployment
pub struct PaperTradingClient {
    config: EngineConfig,
    rollup: Arc<dyn VenueTransport>,
    base: Arc<dyn VenueTransport>,
    signers: SignerStack,
    builder: InstructionBuilder,
    pda: PdaGenerator,
    trading_program: Pubkey,
}

impl PaperTradingClient {
    /// Build a client from configuration: RPC transports for both venues plus
    /// the configured signing stack (admin key when provided, otherwise the
    /// session keypair file).
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let commitment = config.commitment_config();
        let rollup: Arc<dyn VenueTransport> = Arc::new(RpcVenue::new(
            VenueKind::Rollup,
            &config.venues.rollup_url,
            commitment,
        ));
        let base: Arc<dyn VenueTransport> = Arc::new(RpcVenue::new(
            VenueKind::Base,
            &config.venues.base_url,
            commitment,
        ));

        let mut signers = SignerStack::new();
        match &config.session.admin_key {
            Some(encoded) => signers.set_local(signer::keypair_from_encoded(encoded)?),
            None => signers.set_local(signer::load_or_create_session_keypair(Path::new(
                &config.session.key_path,
            ))?),
        }

        Self::with_venues(config, rollup, base, signers)
    }

    /// Build a client over explicit venue transports, for tests and embedders
    /// that bring their own
    pub fn with_venues(
        config: EngineConfig,
        rollup: Arc<dyn VenueTransport>,
        base: Arc<dyn VenueTransport>,
        signers: SignerStack,
    ) -> Result<Self> {
        config.validate()?;
        let trading_program = config.trading_program_id()?;
        info!("Paper trading client for program {}", trading_program);

        Ok(Self {
            builder: InstructionBuilder::new(trading_program),
            pda: PdaGenerator::new(trading_program),
            trading_program,
            config,
            rollup,
            base,
            signers,
        })
    }

    /// Attach an external signing capability; it takes priority over the
    /// local keypair
    pub fn set_external_signer(&mut self, external: Arc<dyn TransactionSigner>) {
        self.signers.set_external(external);
    }

    /// Identity whose transactions this session signs
    pub fn identity(&self) -> Result<Pubkey> {
        self.signers.identity()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn signers(&self) -> &SignerStack {
        &self.signers
    }

    async fn read_account(&self, address: &Pubkey) -> Result<Option<Vec<u8>>> {
        match self.rollup.get_account(address).await {
            Ok(Some(data)) => Ok(Some(data)),
            Ok(None) => self.base.get_account(address).await,
            Err(err) => {
                warn!("Rollup read of {} failed: {}", address, err);
                self.base.get_account(address).await
            }
        }
    }

    async fn read_user_record(&self, pair: &PairSpec) -> Result<Option<UserAccountRecord>> {
        let owner = self.signers.identity()?;
        let (address, _) = self.pda.get_user_account_pda(&owner, pair.pair_index);
        match self.read_account(&address).await? {
            Some(data) => Ok(Some(UserAccountRecord::decode(&data)?)),
            None => Ok(None),
        }
    }

    /// Decoded per-pair account of the session identity, `None` when the
    /// pair has not been initialized
    pub async fn user_account(&self, symbol: &str) -> Result<Option<UserAccountRecord>> {
        let pair = pairs::by_symbol(symbol)?;
        self.read_user_record(pair).await
    }

    /// Balances of one pair in human units
    pub async fn balances(&self, symbol: &str) -> Result<Option<BalanceView>> {
        Ok(self
            .user_account(symbol)
            .await?
            .map(|record| BalanceView::from_record(&record)))
    }

    /// Initialization state of all pairs, read concurrently
    pub async fn account_status(&self) -> Result<Vec<AccountStatus>> {
        let reads = join_all(PAIRS.iter().map(|pair| self.read_user_record(pair))).await;

        let mut statuses = Vec::with_capacity(PAIRS.len());
        for (pair, read) in PAIRS.iter().zip(reads) {
            let record = read?;
            statuses.push(AccountStatus {
                pair: pair.symbol.to_string(),
                initialized: record.is_some(),
                balances: record.map(|r| BalanceView::from_record(&r)),
            });
        }
        Ok(statuses)
    }

    /// Every position of the given owner
    pub async fn positions(&self, owner: &Pubkey) -> Result<Vec<PositionView>> {
        match aggregator::scan_positions(self.rollup.as_ref(), &self.trading_program, owner).await
        {
            Ok(views) => Ok(views),
            Err(err) => {
                warn!("Rollup position scan failed: {}", err);
                aggregator::scan_positions(self.base.as_ref(), &self.trading_program, owner).await
            }
        }
    }

    /// Active positions of the session identity
    pub async fn open_positions(&self) -> Result<Vec<PositionView>> {
        let owner = self.signers.identity()?;
        let mut views = self.positions(&owner).await?;
        views.retain(|view| view.status == PositionStatus::Active);
        Ok(views)
    }

    /// Competition ranking at the given prices (pair index to quote price)
    pub async fn leaderboard(&self, prices: &HashMap<u8, f64>) -> Result<Vec<LeaderboardRow>> {
        match aggregator::leaderboard(self.rollup.as_ref(), &self.trading_program, prices).await {
            Ok(rows) => Ok(rows),
            Err(err) => {
                warn!("Rollup leaderboard scan failed: {}", err);
                aggregator::leaderboard(self.base.as_ref(), &self.trading_program, prices).await
            }
        }
    }

    /// Current competition record, `None` when no competition is configured
    /// on chain
    pub async fn competition(&self) -> Result<Option<CompetitionRecord>> {
        let component_program = self.config.competition_component_id()?;
        let entity = self.config.competition_entity()?;
        let (address, _) = pda::get_component_pda(&component_program, &entity);

        match self.read_account(&address).await? {
            Some(data) => Ok(Some(CompetitionRecord::decode(&data)?)),
            None => Ok(None),
        }
    }

    async fn submit(&self, instruction: Instruction) -> Result<SubmissionReceipt> {
        submit::submit_with_fallback(
            self.rollup.as_ref(),
            self.base.as_ref(),
            &self.signers,
            instruction,
        )
        .await
    }

    /// Create the per-pair account, paying the configured entry fee.
    /// Requires the session identity to hold the minimum base-chain balance.
    pub async fn initialize_account(&self, symbol: &str) -> Result<InitializeOutcome> {
        let pair = pairs::by_symbol(symbol)?;
        let owner = self.signers.identity()?;
        let (user_account, _) = self.pda.get_user_account_pda(&owner, pair.pair_index);

        if self.read_account(&user_account).await?.is_some() {
            info!("{} account for {} already initialized", pair.symbol, owner);
            return Ok(InitializeOutcome::AlreadyInitialized {
                address: user_account,
            });
        }

        let lamports = self.base.get_balance(&owner).await?;
        if lamports < self.config.onboarding.min_base_lamports {
            return Err(EngineError::InsufficientFunds {
                required: from_scaled(self.config.onboarding.min_base_lamports, SOL_DECIMALS),
                available: from_scaled(lamports, SOL_DECIMALS),
            });
        }

        let (config_address, _) = self.pda.get_config_pda();
        let config_data =
            self.read_account(&config_address)
                .await?
                .ok_or(EngineError::RecordNotFound {
                    record: "config",
                    address: config_address.to_string(),
                })?;
        let global_config = GlobalConfigRecord::decode(&config_data)?;

        let entry_fee = scale::to_scaled(self.config.onboarding.entry_fee_sol, SOL_DECIMALS)?;
        let initial_quote = to_quote_units(self.config.onboarding.initial_quote)?;
        let instruction = self.builder.initialize_account(
            &user_account,
            &config_address,
            &owner,
            &global_config.treasury,
            pair.pair_index,
            entry_fee,
            initial_quote,
            QUOTE_DECIMALS,
            pair.base_decimals,
        );

        let receipt = self.submit(instruction).await?;
        Ok(InitializeOutcome::Submitted(receipt))
    }

    /// Spend quote balance on the base asset at the given price
    pub async fn buy(
        &self,
        symbol: &str,
        quote_amount: f64,
        price: f64,
    ) -> Result<SubmissionReceipt> {
        let pair = pairs::by_symbol(symbol)?;
        let owner = self.signers.identity()?;
        let record =
            self.read_user_record(pair)
                .await?
                .ok_or(EngineError::AccountNotInitialized {
                    pair_index: pair.pair_index,
                })?;

        let available = record.quote_balance_ui();
        if quote_amount > available + BALANCE_EPSILON {
            return Err(EngineError::InsufficientFunds {
                required: quote_amount,
                available,
            });
        }

        let (user_account, _) = self.pda.get_user_account_pda(&owner, pair.pair_index);
        let instruction = self.builder.buy(
            &user_account,
            &owner,
            to_quote_units(quote_amount)?,
            to_quote_units(price)?,
        );
        self.submit(instruction).await
    }

    /// Sell base balance back to quote at the given price
    pub async fn sell(
        &self,
        symbol: &str,
        base_amount: f64,
        price: f64,
    ) -> Result<SubmissionReceipt> {
        let pair = pairs::by_symbol(symbol)?;
        let owner = self.signers.identity()?;
        let record =
            self.read_user_record(pair)
                .await?
                .ok_or(EngineError::AccountNotInitialized {
                    pair_index: pair.pair_index,
                })?;

        let available = record.base_balance_ui();
        if base_amount > available + BALANCE_EPSILON {
            return Err(EngineError::InsufficientFunds {
                required: base_amount,
                available,
            });
        }

        let (user_account, _) = self.pda.get_user_account_pda(&owner, pair.pair_index);
        let instruction = self.builder.sell(
            &user_account,
            &owner,
            scale::to_base_units(base_amount, pair.pair_index)?,
            to_quote_units(price)?,
        );
        self.submit(instruction).await
    }

    /// Open a position sized in quote units.
    ///
    /// The position address derives from the account's current position
    /// counter, so two concurrent opens for the same owner and pair collide
    /// on the same address. Callers serialize their own submissions.
    pub async fn open_position(
        &self,
        symbol: &str,
        direction: PositionDirection,
        size_quote: f64,
        price: f64,
        take_profit: Option<f64>,
        stop_loss: Option<f64>,
    ) -> Result<SubmissionReceipt> {
        let pair = pairs::by_symbol(symbol)?;
        let owner = self.signers.identity()?;
        let record =
            self.read_user_record(pair)
                .await?
                .ok_or(EngineError::AccountNotInitialized {
                    pair_index: pair.pair_index,
                })?;

        let available = record.quote_balance_ui();
        if size_quote > available + BALANCE_EPSILON {
            return Err(EngineError::InsufficientFunds {
                required: size_quote,
                available,
            });
        }

        let (user_account, _) = self.pda.get_user_account_pda(&owner, pair.pair_index);
        let (position, _) =
            self.pda
                .get_position_pda(&owner, pair.pair_index, record.total_positions);

        let base_amount = scale::base_amount_for_notional(size_quote, price, pair.base_decimals)?;
        let instruction = self.builder.open_position(
            &user_account,
            &position,
            &owner,
            direction,
            base_amount,
            to_quote_units(price)?,
            take_profit.map(to_quote_units).transpose()?.unwrap_or(0),
            stop_loss.map(to_quote_units).transpose()?.unwrap_or(0),
        );
        self.submit(instruction).await
    }

    /// Close one position at the given price. Only the owner can close, and
    /// only while the position is active.
    pub async fn close_position(
        &self,
        position_address: &Pubkey,
        price: f64,
    ) -> Result<SubmissionReceipt> {
        let owner = self.signers.identity()?;
        let data =
            self.read_account(position_address)
                .await?
                .ok_or(EngineError::RecordNotFound {
                    record: "position",
                    address: position_address.to_string(),
                })?;
        let record = PositionRecord::decode(&data)?;

        if record.owner != owner {
            return Err(EngineError::Rejected {
                reason: format!(
                    "position {} is owned by {}",
                    position_address, record.owner
                ),
            });
        }
        if !record.is_active() {
            return Err(EngineError::Rejected {
                reason: format!("position {} is not active", position_address),
            });
        }

        let (user_account, _) = self
            .pda
            .get_user_account_pda(&record.owner, record.pair_index);
        let instruction = self.builder.close_position(
            position_address,
            &user_account,
            &owner,
            to_quote_units(price)?,
        );
        self.submit(instruction).await
    }

    /// Apply the join system, enrolling the session identity's trading
    /// account in the competition
    pub async fn join_competition(&self) -> Result<SubmissionReceipt> {
        let authority = self.signers.identity()?;
        let instruction = ecs::join_competition_instruction(
            &self.config.world_program_id()?,
            &self.config.join_system_id()?,
            &authority,
            &self.config.world_instance()?,
            self.config.ecs.world_id,
            &self.config.competition_component_id()?,
            &self.config.competition_entity()?,
            &self.config.trading_account_component_id()?,
        )?;
        self.submit(instruction).await
    }

    /// Apply the settle system to the competition component
    pub async fn settle_competition(&self) -> Result<SubmissionReceipt> {
        let authority = self.signers.identity()?;
        let instruction = ecs::settle_competition_instruction(
            &self.config.world_program_id()?,
            &self.config.settle_system_id()?,
            &authority,
            &self.config.world_instance()?,
            &self.config.competition_component_id()?,
            &self.config.competition_entity()?,
        )?;
        self.submit(instruction).await
    }

    /// Request devnet lamports for the session identity on the base chain
    pub async fn request_airdrop(&self, lamports: u64) -> Result<Signature> {
        let owner = self.signers.identity()?;
        let signature = self.base.request_airdrop(&owner, lamports).await?;
        info!("Airdrop of {} lamports to {}: {}", lamports, owner, signature);
        Ok(signature)
    }
}
