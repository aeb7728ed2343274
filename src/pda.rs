//! Program Derived Address (PDA) utilities
//!
//! Centralized module for every address the client derives. Keeping the seed
//! recipes in one place makes them easy to audit against the deployed program.

use solana_sdk::pubkey::Pubkey;

/// PDA seeds for different account types
pub mod seeds {
    pub const USER: &[u8] = b"user";
    pub const POSITION: &[u8] = b"position";
    pub const CONFIG: &[u8] = b"config";
    pub const TRADING_ACCOUNT: &[u8] = b"trading-account";
    pub const COMPONENT: &[u8] = b"component";
    pub const ENTITY: &[u8] = b"entity";
}

/// PDA generator for accounts owned by the paper trading program
pub struct PdaGenerator {
    program_id: Pubkey,
}

impl PdaGenerator {
    /// Create a new PDA generator for the given program
    pub fn new(program_id: Pubkey) -> Self {
        Self { program_id }
    }

    /// Get the per-pair user account PDA
    pub fn get_user_account_pda(&self, owner: &Pubkey, pair_index: u8) -> (Pubkey, u8) {
        Pubkey::find_program_address(
            &[seeds::USER, owner.as_ref(), &[pair_index]],
            &self.program_id,
        )
    }

    /// Get the position account PDA. The position counter is the owner's
    /// `total_positions` at open time, so the caller must read it first.
    pub fn get_position_pda(
        &self,
        owner: &Pubkey,
        pair_index: u8,
        total_positions: u64,
    ) -> (Pubkey, u8) {
        Pubkey::find_program_address(
            &[
                seeds::POSITION,
                owner.as_ref(),
                &[pair_index],
                &total_positions.to_le_bytes(),
            ],
            &self.program_id,
        )
    }

    /// Get the global config PDA
    pub fn get_config_pda(&self) -> (Pubkey, u8) {
        Pubkey::find_program_address(&[seeds::CONFIG], &self.program_id)
    }
}

/// Convenience functions for quick PDA generation
pub mod helpers {
    use super::*;

    /// Get user account PDA without bump
    pub fn user_account_pda(program_id: &Pubkey, owner: &Pubkey, pair_index: u8) -> Pubkey {
        PdaGenerator::new(*program_id)
            .get_user_account_pda(owner, pair_index)
            .0
    }

    /// Get position PDA without bump
    pub fn position_pda(
        program_id: &Pubkey,
        owner: &Pubkey,
        pair_index: u8,
        total_positions: u64,
    ) -> Pubkey {
        PdaGenerator::new(*program_id)
            .get_position_pda(owner, pair_index, total_positions)
            .0
    }

    /// Get config PDA without bump
    pub fn config_pda(program_id: &Pubkey) -> Pubkey {
        PdaGenerator::new(*program_id).get_config_pda().0
    }
}

// Component accounts live under their own programs, not the trading program.

/// Get the rollup trading-account component PDA for an owner
pub fn get_trading_account_pda(component_program: &Pubkey, owner: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[seeds::TRADING_ACCOUNT, owner.as_ref()],
        component_program,
    )
}

/// Get a seed-addressed entity PDA in the given world. The world id is
/// big-endian in the seeds and the zero block marks the entity as
/// seed-addressed rather than counter-addressed.
pub fn get_entity_pda(world_program: &Pubkey, world_id: u64, seed: &[u8]) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[seeds::ENTITY, &world_id.to_be_bytes(), &[0u8; 8], seed],
        world_program,
    )
}

/// Get the component record PDA attached to an entity
pub fn get_component_pda(component_program: &Pubkey, entity: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[seeds::COMPONENT, entity.as_ref(), component_program.as_ref()],
        component_program,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_account_pda_determinism() {
        let program_id = Pubkey::new_unique();
        let generator = PdaGenerator::new(program_id);
        let owner = Pubkey::new_unique();

        let (pda1, bump1) = generator.get_user_account_pda(&owner, 0);
        let (pda2, bump2) = generator.get_user_account_pda(&owner, 0);
        assert_eq!(pda1, pda2);
        assert_eq!(bump1, bump2);

        // Different pair indices map to different accounts
        let (pda3, _) = generator.get_user_account_pda(&owner, 1);
        assert_ne!(pda1, pda3);

        // Different owners map to different accounts
        let other = Pubkey::new_unique();
        let (pda4, _) = generator.get_user_account_pda(&other, 0);
        assert_ne!(pda1, pda4);
    }

    #[test]
    fn test_position_pda_uses_counter() {
        let program_id = Pubkey::new_unique();
        let generator = PdaGenerator::new(program_id);
        let owner = Pubkey::new_unique();

        let (first, _) = generator.get_position_pda(&owner, 0, 0);
        let (second, _) = generator.get_position_pda(&owner, 0, 1);
        assert_ne!(first, second);

        let (again, _) = generator.get_position_pda(&owner, 0, 0);
        assert_eq!(first, again);
    }

    #[test]
    fn test_helper_functions() {
        let program_id = Pubkey::new_unique();
        let owner = Pubkey::new_unique();

        let pda1 = helpers::user_account_pda(&program_id, &owner, 2);
        let generator = PdaGenerator::new(program_id);
        let (pda2, _) = generator.get_user_account_pda(&owner, 2);
        assert_eq!(pda1, pda2);

        assert_eq!(
            helpers::config_pda(&program_id),
            generator.get_config_pda().0
        );
    }

    #[test]
    fn test_component_pdas() {
        let component_program = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let entity = Pubkey::new_unique();

        let (trading1, _) = get_trading_account_pda(&component_program, &owner);
        let (trading2, _) = get_trading_account_pda(&component_program, &owner);
        assert_eq!(trading1, trading2);

        let (component1, _) = get_component_pda(&component_program, &entity);
        let (component2, _) = get_component_pda(&component_program, &Pubkey::new_unique());
        assert_ne!(component1, component2);
    }

    #[test]
    fn test_entity_pda_separates_worlds_and_seeds() {
        let world_program = Pubkey::new_unique();
        let owner = Pubkey::new_unique();

        let (entity1, bump1) = get_entity_pda(&world_program, 2409, owner.as_ref());
        let (entity2, bump2) = get_entity_pda(&world_program, 2409, owner.as_ref());
        assert_eq!(entity1, entity2);
        assert_eq!(bump1, bump2);

        let (other_world, _) = get_entity_pda(&world_program, 2410, owner.as_ref());
        assert_ne!(entity1, other_world);

        let (other_seed, _) =
            get_entity_pda(&world_program, 2409, Pubkey::new_unique().as_ref());
        assert_ne!(entity1, other_seed);
    }
}
