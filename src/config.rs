//! Environment configuration with validation

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Venue endpoints
    pub venues: VenueConfig,

    /// On-chain program addresses
    pub programs: ProgramConfig,

    /// World and component addressing
    pub ecs: EcsConfig,

    /// Session signing configuration
    pub session: SessionConfig,

    /// Account onboarding parameters
    pub onboarding: OnboardingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    pub rollup_url: String,
    pub base_url: String,
    pub commitment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramConfig {
    pub trading_program: String,
    pub world_program: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcsConfig {
    pub world_id: u64,
    pub world_instance: String,
    pub competition_entity: String,
    pub trading_account_component: String,
    pub competition_component: String,
    pub position_component: String,
    pub leaderboard_component: String,
    pub join_system: String,
    pub open_position_system: String,
    pub close_position_system: String,
    pub settle_system: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub key_path: String,
    pub admin_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingConfig {
    pub entry_fee_sol: f64,
    pub initial_quote: f64,
    pub min_base_lamports: u64,
}

impl EngineConfig {
    /// Load configuration from environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(EngineConfig {
            venues: VenueConfig {
                rollup_url: env::var("ROLLUP_RPC_URL")
                    .unwrap_or_else(|_| "https://rpc.magicblock.app/devnet/".to_string()),
                base_url: env::var("BASE_RPC_URL")
                    .unwrap_or_else(|_| "https://api.devnet.solana.com".to_string()),
                commitment: env::var("SOLANA_COMMITMENT")
                    .unwrap_or_else(|_| "confirmed".to_string()),
            },

            programs: ProgramConfig {
                trading_program: env::var("TRADING_PROGRAM_ID")
                    .unwrap_or_else(|_| "ENpbjfPxXx9fLhLDcqbLsHmo25LRU4fW9RXFfrqbKbmo".to_string()),
                world_program: env::var("WORLD_PROGRAM_ID")
                    .unwrap_or_else(|_| "WorLD15A7CrDwLcLy4fRqtaTb9fbd8o8iqiEMUDse2n".to_string()),
            },

            ecs: EcsConfig {
                world_id: env::var("WORLD_ID")
                    .unwrap_or_else(|_| "2409".to_string())
                    .parse()
                    .unwrap_or(2409),
                world_instance: env::var("WORLD_INSTANCE")
                    .unwrap_or_else(|_| "CVndFdiiuFhkcLEQy71JomGwgZT8Lqeq9oFuU14E9Ngk".to_string()),
                competition_entity: env::var("COMPETITION_ENTITY")
                    .unwrap_or_else(|_| "5ebXENtrEamPapRhzMGjvrcavWwrEwWiY4Yftjx3wUsk".to_string()),
                trading_account_component: env::var("TRADING_ACCOUNT_COMPONENT_ID")
                    .unwrap_or_else(|_| "3PDo9AKeLhU6hcUC7gft3PKQuotH4624mcevqdSiyTPS".to_string()),
                competition_component: env::var("COMPETITION_COMPONENT_ID")
                    .unwrap_or_else(|_| "FPKpeKHnfYuYo8JDiDW7mNzZB8qgf1mLYwpQAcbGyVhJ".to_string()),
                position_component: env::var("POSITION_COMPONENT_ID")
                    .unwrap_or_else(|_| "9ACLRxNoDHXpHugLUmDtBGTQ6Q5vwnD4wUVSaWaNaVbv".to_string()),
                leaderboard_component: env::var("LEADERBOARD_COMPONENT_ID")
                    .unwrap_or_else(|_| "BCrmcoi7dEgg7UY3SpZfM4dihAWaYuNk3wprXsy1Xp5X".to_string()),
                join_system: env::var("JOIN_SYSTEM_ID")
                    .unwrap_or_else(|_| "5aJzg88rRLAFGN1imRwK84WMD4JyZBvz7n47nSQz9oGm".to_string()),
                open_position_system: env::var("OPEN_POSITION_SYSTEM_ID")
                    .unwrap_or_else(|_| "GdWvbNgbNxWHbSDTBweSi9zPgtRhggGxaJsCxL5vwDp9".to_string()),
                close_position_system: env::var("CLOSE_POSITION_SYSTEM_ID")
                    .unwrap_or_else(|_| "CXnKyp5DGMWRHsj9JsbECqBbDP1GeUF3c8AYSPZMmNd2".to_string()),
                settle_system: env::var("SETTLE_SYSTEM_ID")
                    .unwrap_or_else(|_| "32S5nHLK93PNVJQZgd4PQY4v9tkiLU2j9bEbHhJN4CuL".to_string()),
            },

            session: SessionConfig {
                key_path: env::var("SESSION_KEY_PATH")
                    .unwrap_or_else(|_| ".paper-trading/session-keypair.json".to_string()),
                admin_key: env::var("ADMIN_SECRET_KEY").ok(),
            },

            onboarding: OnboardingConfig {
                entry_fee_sol: env::var("ENTRY_FEE_SOL")
                    .unwrap_or_else(|_| "0.1".to_string())
                    .parse()
                    .unwrap_or(0.1),
                initial_quote: env::var("INITIAL_QUOTE")
                    .unwrap_or_else(|_| "10000".to_string())
                    .parse()
                    .unwrap_or(10_000.0),
                min_base_lamports: env::var("MIN_BASE_LAMPORTS")
                    .unwrap_or_else(|_| "100000000".to_string())
                    .parse()
                    .unwrap_or(100_000_000),
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate venue endpoints
        for (name, url) in [
            ("ROLLUP_RPC_URL", &self.venues.rollup_url),
            ("BASE_RPC_URL", &self.venues.base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidUrl {
                    name: name.to_string(),
                    value: url.clone(),
                });
            }
        }

        if !matches!(
            self.venues.commitment.as_str(),
            "processed" | "confirmed" | "finalized"
        ) {
            return Err(ConfigError::InvalidConfig(format!(
                "unknown commitment level '{}'",
                self.venues.commitment
            )));
        }

        // Validate every program address
        self.trading_program_id()?;
        self.world_program_id()?;
        self.world_instance()?;
        self.competition_entity()?;
        self.trading_account_component_id()?;
        self.competition_component_id()?;
        self.position_component_id()?;
        self.leaderboard_component_id()?;
        self.join_system_id()?;
        self.open_position_system_id()?;
        self.close_position_system_id()?;
        self.settle_system_id()?;

        // Validate onboarding parameters
        if self.onboarding.entry_fee_sol < 0.0 {
            return Err(ConfigError::InvalidConfig(
                "entry fee cannot be negative".to_string(),
            ));
        }
        if self.onboarding.initial_quote <= 0.0 {
            return Err(ConfigError::InvalidConfig(
                "initial quote grant must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn commitment_config(&self) -> CommitmentConfig {
        match self.venues.commitment.as_str() {
            "processed" => CommitmentConfig::processed(),
            "finalized" => CommitmentConfig::finalized(),
            _ => CommitmentConfig::confirmed(),
        }
    }

    pub fn trading_program_id(&self) -> Result<Pubkey, ConfigError> {
        parse_pubkey("TRADING_PROGRAM_ID", &self.programs.trading_program)
    }

    pub fn world_program_id(&self) -> Result<Pubkey, ConfigError> {
        parse_pubkey("WORLD_PROGRAM_ID", &self.programs.world_program)
    }

    pub fn world_instance(&self) -> Result<Pubkey, ConfigError> {
        parse_pubkey("WORLD_INSTANCE", &self.ecs.world_instance)
    }

    pub fn competition_entity(&self) -> Result<Pubkey, ConfigError> {
        parse_pubkey("COMPETITION_ENTITY", &self.ecs.competition_entity)
    }

    pub fn trading_account_component_id(&self) -> Result<Pubkey, ConfigError> {
        parse_pubkey(
            "TRADING_ACCOUNT_COMPONENT_ID",
            &self.ecs.trading_account_component,
        )
    }

    pub fn competition_component_id(&self) -> Result<Pubkey, ConfigError> {
        parse_pubkey("COMPETITION_COMPONENT_ID", &self.ecs.competition_component)
    }

    pub fn position_component_id(&self) -> Result<Pubkey, ConfigError> {
        parse_pubkey("POSITION_COMPONENT_ID", &self.ecs.position_component)
    }

    pub fn leaderboard_component_id(&self) -> Result<Pubkey, ConfigError> {
        parse_pubkey("LEADERBOARD_COMPONENT_ID", &self.ecs.leaderboard_component)
    }

    pub fn join_system_id(&self) -> Result<Pubkey, ConfigError> {
        parse_pubkey("JOIN_SYSTEM_ID", &self.ecs.join_system)
    }

    pub fn open_position_system_id(&self) -> Result<Pubkey, ConfigError> {
        parse_pubkey("OPEN_POSITION_SYSTEM_ID", &self.ecs.open_position_system)
    }

    pub fn close_position_system_id(&self) -> Result<Pubkey, ConfigError> {
        parse_pubkey("CLOSE_POSITION_SYSTEM_ID", &self.ecs.close_position_system)
    }

    pub fn settle_system_id(&self) -> Result<Pubkey, ConfigError> {
        parse_pubkey("SETTLE_SYSTEM_ID", &self.ecs.settle_system)
    }
}

fn parse_pubkey(name: &str, value: &str) -> Result<Pubkey, ConfigError> {
    Pubkey::from_str(value).map_err(|_| ConfigError::InvalidPubkey {
        name: name.to_string(),
        value: value.to_string(),
    })
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid public key in {name}: {value}")]
    InvalidPubkey { name: String, value: String },

    #[error("Invalid URL in {name}: {value}")]
    InvalidUrl { name: String, value: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Create example .env file
pub fn create_env_example() -> String {
    r#"# Venue Endpoints
ROLLUP_RPC_URL=https://rpc.magicblock.app/devnet/
BASE_RPC_URL=https://api.devnet.solana.com
SOLANA_COMMITMENT=confirmed

# Program Addresses
TRADING_PROGRAM_ID=ENpbjfPxXx9fLhLDcqbLsHmo25LRU4fW9RXFfrqbKbmo
WORLD_PROGRAM_ID=WorLD15A7CrDwLcLy4fRqtaTb9fbd8o8iqiEMUDse2n

# World Addressing
WORLD_ID=2409
WORLD_INSTANCE=CVndFdiiuFhkcLEQy71JomGwgZT8Lqeq9oFuU14E9Ngk
COMPETITION_ENTITY=5ebXENtrEamPapRhzMGjvrcavWwrEwWiY4Yftjx3wUsk
TRADING_ACCOUNT_COMPONENT_ID=3PDo9AKeLhU6hcUC7gft3PKQuotH4624mcevqdSiyTPS
COMPETITION_COMPONENT_ID=FPKpeKHnfYuYo8JDiDW7mNzZB8qgf1mLYwpQAcbGyVhJ
POSITION_COMPONENT_ID=9ACLRxNoDHXpHugLUmDtBGTQ6Q5vwnD4wUVSaWaNaVbv
LEADERBOARD_COMPONENT_ID=BCrmcoi7dEgg7UY3SpZfM4dihAWaYuNk3wprXsy1Xp5X
JOIN_SYSTEM_ID=5aJzg88rRLAFGN1imRwK84WMD4JyZBvz7n47nSQz9oGm
OPEN_POSITION_SYSTEM_ID=GdWvbNgbNxWHbSDTBweSi9zPgtRhggGxaJsCxL5vwDp9
CLOSE_POSITION_SYSTEM_ID=CXnKyp5DGMWRHsj9JsbECqBbDP1GeUF3c8AYSPZMmNd2
SETTLE_SYSTEM_ID=32S5nHLK93PNVJQZgd4PQY4v9tkiLU2j9bEbHhJN4CuL

# Session Signing
SESSION_KEY_PATH=.paper-trading/session-keypair.json
# ADMIN_SECRET_KEY=base58-or-base64-encoded-64-byte-secret

# Onboarding
ENTRY_FEE_SOL=0.1
INITIAL_QUOTE=10000
MIN_BASE_LAMPORTS=100000000

# Logging
RUST_LOG=info
"#
    .to_string()
}
