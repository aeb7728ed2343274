//! Venue transports
//!
//! The engine talks to two venues with one interface: the MagicBlock rollup
//! for low-latency execution and the base chain as the canonical fallback.
//! [`RpcVenue`] adapts the Solana RPC client; [`MemoryVenue`] is an in-memory
//! implementation for tests and offline use.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use solana_client::{
    client_error::ClientError,
    rpc_client::RpcClient,
    rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig, RpcSendTransactionConfig},
    rpc_filter::{Memcmp, RpcFilterType},
};
use solana_sdk::{
    commitment_config::CommitmentConfig,
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
    transaction::{Transaction, TransactionError},
};
use tracing::debug;

use crate::error::{EngineError, Result};

/// Which chain a transport talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VenueKind {
    Rollup,
    Base,
}

impl VenueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VenueKind::Rollup => "rollup",
            VenueKind::Base => "base",
        }
    }
}

impl std::fmt::Display for VenueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account scan filter, venue-agnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountFilter {
    DataSize(u64),
    MemcmpAt { offset: usize, bytes: Vec<u8> },
}

impl AccountFilter {
    /// Whether raw account data passes this filter
    pub fn matches(&self, data: &[u8]) -> bool {
        match self {
            AccountFilter::DataSize(size) => data.len() as u64 == *size,
            AccountFilter::MemcmpAt { offset, bytes } => data
                .get(*offset..*offset + bytes.len())
                .map(|slice| slice == bytes.as_slice())
                .unwrap_or(false),
        }
    }
}

/// What the engine needs from a chain endpoint
#[async_trait]
pub trait VenueTransport: Send + Sync {
    fn kind(&self) -> VenueKind;

    async fn latest_blockhash(&self) -> Result<Hash>;

    /// Send a signed transaction. A duplicate rejection surfaces as
    /// [`EngineError::DuplicateSubmission`].
    async fn broadcast(&self, transaction: &Transaction) -> Result<Signature>;

    /// Wait until the signature reaches the venue's commitment level
    async fn confirm(&self, signature: &Signature) -> Result<()>;

    /// Whether the venue reports any confirmation status for the signature,
    /// at any commitment level. Used to disambiguate duplicate rejections.
    async fn signature_confirmed(&self, signature: &Signature) -> Result<bool>;

    /// Raw account data, `None` when the account does not exist
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Vec<u8>>>;

    async fn query_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: Vec<AccountFilter>,
    ) -> Result<Vec<(Pubkey, Vec<u8>)>>;

    async fn get_balance(&self, address: &Pubkey) -> Result<u64>;

    async fn request_airdrop(&self, address: &Pubkey, lamports: u64) -> Result<Signature>;
}

const CONFIRM_POLL_ATTEMPTS: u32 = 30;
const CONFIRM_POLL_INTERVAL_MS: u64 = 400;

/// RPC-backed venue
pub struct RpcVenue {
    kind: VenueKind,
    url: String,
    rpc: Arc<RpcClient>,
    commitment: CommitmentConfig,
}

impl RpcVenue {
    pub fn new(kind: VenueKind, url: &str, commitment: CommitmentConfig) -> Self {
        Self {
            kind,
            url: url.to_string(),
            rpc: Arc::new(RpcClient::new_with_commitment(url.to_string(), commitment)),
            commitment,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn classify(&self, err: ClientError) -> EngineError {
        let message = err.to_string();

        let transaction_error = err.get_transaction_error();
        if matches!(transaction_error, Some(TransactionError::AlreadyProcessed))
            || message.contains("already been processed")
        {
            return EngineError::DuplicateSubmission {
                venue: self.kind.to_string(),
            };
        }

        // Program and consistency errors pass through unchanged
        if let Some(tx_err) = transaction_error {
            return EngineError::Rejected {
                reason: format!("{:?}", tx_err),
            };
        }

        EngineError::VenueUnavailable {
            venue: self.kind.to_string(),
            reason: message,
        }
    }

    fn venue_fault(&self, err: ClientError) -> EngineError {
        EngineError::VenueUnavailable {
            venue: self.kind.to_string(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl VenueTransport for RpcVenue {
    fn kind(&self) -> VenueKind {
        self.kind
    }

    async fn latest_blockhash(&self) -> Result<Hash> {
        self.rpc
            .get_latest_blockhash()
            .map_err(|e| self.venue_fault(e))
    }

    async fn broadcast(&self, transaction: &Transaction) -> Result<Signature> {
        let config = RpcSendTransactionConfig {
            skip_preflight: false,
            preflight_commitment: Some(self.commitment.commitment),
            encoding: None,
            max_retries: Some(0), // Retries are decided at the submission level
            min_context_slot: None,
        };

        self.rpc
            .send_transaction_with_config(transaction, config)
            .map_err(|e| self.classify(e))
    }

    async fn confirm(&self, signature: &Signature) -> Result<()> {
        for attempt in 0..CONFIRM_POLL_ATTEMPTS {
            let confirmed = self
                .rpc
                .confirm_transaction_with_commitment(signature, self.commitment)
                .map_err(|e| self.venue_fault(e))?;
            if confirmed.value {
                return Ok(());
            }
            debug!(
                "Awaiting confirmation of {} on {} (attempt {})",
                signature, self.kind, attempt
            );
            tokio::time::sleep(Duration::from_millis(CONFIRM_POLL_INTERVAL_MS)).await;
        }

        Err(EngineError::VenueUnavailable {
            venue: self.kind.to_string(),
            reason: format!("confirmation timed out for {}", signature),
        })
    }

    async fn signature_confirmed(&self, signature: &Signature) -> Result<bool> {
        let statuses = self
            .rpc
            .get_signature_statuses(&[*signature])
            .map_err(|e| self.venue_fault(e))?;

        Ok(statuses
            .value
            .first()
            .and_then(|entry| entry.as_ref())
            .map(|status| status.confirmation_status.is_some())
            .unwrap_or(false))
    }

    async fn get_account(&self, address: &Pubkey) -> Result<Option<Vec<u8>>> {
        let response = self
            .rpc
            .get_account_with_commitment(address, self.commitment)
            .map_err(|e| self.venue_fault(e))?;
        Ok(response.value.map(|account| account.data))
    }

    async fn query_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: Vec<AccountFilter>,
    ) -> Result<Vec<(Pubkey, Vec<u8>)>> {
        let rpc_filters = filters
            .into_iter()
            .map(|filter| match filter {
                AccountFilter::DataSize(size) => RpcFilterType::DataSize(size),
                AccountFilter::MemcmpAt { offset, bytes } => {
                    RpcFilterType::Memcmp(Memcmp::new_raw_bytes(offset, bytes))
                }
            })
            .collect();

        let accounts = self
            .rpc
            .get_program_accounts_with_config(
                program_id,
                RpcProgramAccountsConfig {
                    filters: Some(rpc_filters),
                    account_config: RpcAccountInfoConfig {
                        encoding: None,
                        data_slice: None,
                        commitment: Some(self.commitment),
                        min_context_slot: None,
                    },
                    with_context: None,
                },
            )
            .map_err(|e| self.venue_fault(e))?;

        Ok(accounts
            .into_iter()
            .map(|(pubkey, account)| (pubkey, account.data))
            .collect())
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64> {
        self.rpc
            .get_balance(address)
            .map_err(|e| self.venue_fault(e))
    }

    async fn request_airdrop(&self, address: &Pubkey, lamports: u64) -> Result<Signature> {
        self.rpc
            .request_airdrop(address, lamports)
            .map_err(|e| self.venue_fault(e))
    }
}

/// In-memory venue for tests and offline flows.
/// Accounts are seeded by the caller and scanned in insertion order;
/// broadcasts auto-confirm unless told not to.
#[derive(Default)]
pub struct MemoryVenue {
    kind: Option<VenueKind>,
    accounts: Mutex<Vec<(Pubkey, Pubkey, Vec<u8>)>>,
    balances: Mutex<HashMap<Pubkey, u64>>,
    broadcasts: Mutex<Vec<Transaction>>,
    confirmed: Mutex<HashSet<Signature>>,
    fail_reason: Mutex<Option<String>>,
    reject_reason: Mutex<Option<String>>,
    duplicate_mode: AtomicBool,
    probe_override: Mutex<Option<bool>>,
    auto_confirm: AtomicBool,
}

impl MemoryVenue {
    pub fn new(kind: VenueKind) -> Self {
        let venue = MemoryVenue {
            kind: Some(kind),
            ..Default::default()
        };
        venue.auto_confirm.store(true, Ordering::SeqCst);
        venue
    }

    /// Seed an account owned by `program_id`, replacing any prior data
    pub fn insert_account(&self, program_id: Pubkey, address: Pubkey, data: Vec<u8>) {
        let mut accounts = self.accounts.lock().unwrap();
        if let Some(entry) = accounts.iter_mut().find(|(a, _, _)| *a == address) {
            entry.1 = program_id;
            entry.2 = data;
        } else {
            accounts.push((address, program_id, data));
        }
    }

    pub fn remove_account(&self, address: &Pubkey) {
        self.accounts.lock().unwrap().retain(|(a, _, _)| a != address);
    }

    pub fn set_balance(&self, address: Pubkey, lamports: u64) {
        self.balances
            .lock()
            .unwrap()
            .insert(address, lamports);
    }

    /// Every broadcast fails as a venue fault with this reason
    pub fn fail_broadcasts(&self, reason: &str) {
        *self.fail_reason.lock().unwrap() = Some(reason.to_string());
    }

    /// Every broadcast fails as a program rejection with this reason
    pub fn reject_broadcasts(&self, reason: &str) {
        *self.reject_reason.lock().unwrap() = Some(reason.to_string());
    }

    /// Every broadcast is rejected as already processed
    pub fn set_duplicate_mode(&self, enabled: bool) {
        self.duplicate_mode.store(enabled, Ordering::SeqCst);
    }

    /// Force the duplicate probe result instead of consulting broadcasts
    pub fn set_probe_override(&self, confirmed: Option<bool>) {
        *self.probe_override.lock().unwrap() = confirmed;
    }

    pub fn set_auto_confirm(&self, enabled: bool) {
        self.auto_confirm.store(enabled, Ordering::SeqCst);
    }

    pub fn broadcast_count(&self) -> usize {
        self.broadcasts.lock().unwrap().len()
    }

    pub fn broadcast_signatures(&self) -> Vec<Signature> {
        self.broadcasts
            .lock()
            .unwrap()
            .iter()
            .map(|tx| tx.signatures[0])
            .collect()
    }

    /// Every transaction accepted so far, broadcast order
    pub fn broadcast_transactions(&self) -> Vec<Transaction> {
        self.broadcasts.lock().unwrap().clone()
    }
}

#[async_trait]
impl VenueTransport for MemoryVenue {
    fn kind(&self) -> VenueKind {
        self.kind.unwrap_or(VenueKind::Base)
    }

    async fn latest_blockhash(&self) -> Result<Hash> {
        Ok(Hash::new_unique())
    }

    async fn broadcast(&self, transaction: &Transaction) -> Result<Signature> {
        if let Some(reason) = self.fail_reason.lock().unwrap().clone() {
            return Err(EngineError::VenueUnavailable {
                venue: self.kind().to_string(),
                reason,
            });
        }
        if let Some(reason) = self.reject_reason.lock().unwrap().clone() {
            return Err(EngineError::Rejected { reason });
        }
        if self.duplicate_mode.load(Ordering::SeqCst) {
            return Err(EngineError::DuplicateSubmission {
                venue: self.kind().to_string(),
            });
        }

        let signature = transaction.signatures[0];
        self.broadcasts
            .lock()
            .unwrap()
            .push(transaction.clone());
        if self.auto_confirm.load(Ordering::SeqCst) {
            self.confirmed
                .lock()
                .unwrap()
                .insert(signature);
        }
        Ok(signature)
    }

    async fn confirm(&self, signature: &Signature) -> Result<()> {
        if self.confirmed.lock().unwrap().contains(signature) {
            Ok(())
        } else {
            Err(EngineError::VenueUnavailable {
                venue: self.kind().to_string(),
                reason: format!("confirmation timed out for {}", signature),
            })
        }
    }

    async fn signature_confirmed(&self, signature: &Signature) -> Result<bool> {
        if let Some(forced) = *self.probe_override.lock().unwrap() {
            return Ok(forced);
        }
        Ok(self
            .confirmed
            .lock()
            .unwrap()
            .contains(signature))
    }

    async fn get_account(&self, address: &Pubkey) -> Result<Option<Vec<u8>>> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .find(|(a, _, _)| a == address)
            .map(|(_, _, data)| data.clone()))
    }

    async fn query_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: Vec<AccountFilter>,
    ) -> Result<Vec<(Pubkey, Vec<u8>)>> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, owner, data)| {
                owner == program_id && filters.iter().all(|f| f.matches(data))
            })
            .map(|(address, _, data)| (*address, data.clone()))
            .collect())
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64> {
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(address)
            .copied()
            .unwrap_or(0))
    }

    async fn request_airdrop(&self, address: &Pubkey, lamports: u64) -> Result<Signature> {
        let mut balances = self.balances.lock().unwrap();
        *balances.entry(*address).or_insert(0) += lamports;
        Ok(Signature::new_unique())
    }
}
