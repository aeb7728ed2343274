//! World and component plumbing
//!
//! The rollup side of the deployment is organized as an entity-component
//! world: the shared competition record lives in a component account and
//! lifecycle transitions run through system programs applied by the world
//! program. This module builds the `apply` instructions for those systems.

use borsh::BorshSerialize;
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    sysvar,
};

use crate::error::{EngineError, Result};
use crate::instructions::method_discriminator;
use crate::pda;

/// Args for a system that takes none; systems deserialize a JSON object
const EMPTY_SYSTEM_ARGS: &[u8] = b"{}";

/// Build the world-program `apply` instruction running one system over the
/// given `(component_program, component_account)` pairs
pub fn apply_system_instruction(
    world_program: &Pubkey,
    system: &Pubkey,
    authority: &Pubkey,
    world_instance: &Pubkey,
    components: &[(Pubkey, Pubkey)],
    args: &[u8],
) -> Result<Instruction> {
    let mut data = method_discriminator("apply").to_vec();
    let encoded_args = args
        .to_vec()
        .try_to_vec()
        .map_err(|e| EngineError::Encoding(e.to_string()))?;
    data.extend_from_slice(&encoded_args);

    let mut accounts = vec![
        AccountMeta::new_readonly(*system, false),
        AccountMeta::new_readonly(*authority, true),
        AccountMeta::new_readonly(sysvar::instructions::id(), false),
        AccountMeta::new(*world_instance, false),
    ];
    for (component_program, component) in components {
        accounts.push(AccountMeta::new_readonly(*component_program, false));
        accounts.push(AccountMeta::new(*component, false));
    }

    Ok(Instruction {
        program_id: *world_program,
        accounts,
        data,
    })
}

/// Instruction applying the join system to the competition and the caller's
/// trading-account component. The caller's entity is seed-addressed by their
/// public key in the configured world.
#[allow(clippy::too_many_arguments)]
pub fn join_competition_instruction(
    world_program: &Pubkey,
    join_system: &Pubkey,
    authority: &Pubkey,
    world_instance: &Pubkey,
    world_id: u64,
    competition_component_program: &Pubkey,
    competition_entity: &Pubkey,
    trading_component_program: &Pubkey,
) -> Result<Instruction> {
    let (competition_component, _) =
        pda::get_component_pda(competition_component_program, competition_entity);
    let (owner_entity, _) = pda::get_entity_pda(world_program, world_id, authority.as_ref());
    let (trading_component, _) =
        pda::get_component_pda(trading_component_program, &owner_entity);
    apply_system_instruction(
        world_program,
        join_system,
        authority,
        world_instance,
        &[
            (*competition_component_program, competition_component),
            (*trading_component_program, trading_component),
        ],
        EMPTY_SYSTEM_ARGS,
    )
}

/// Instruction applying the settle system to the competition component.
/// The program only accepts it once the competition end time has passed.
pub fn settle_competition_instruction(
    world_program: &Pubkey,
    settle_system: &Pubkey,
    authority: &Pubkey,
    world_instance: &Pubkey,
    competition_component_program: &Pubkey,
    competition_entity: &Pubkey,
) -> Result<Instruction> {
    let (component, _) =
        pda::get_component_pda(competition_component_program, competition_entity);
    apply_system_instruction(
        world_program,
        settle_system,
        authority,
        world_instance,
        &[(*competition_component_program, component)],
        EMPTY_SYSTEM_ARGS,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_data_layout() {
        let instruction = apply_system_instruction(
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &Pubkey::new_unique(),
            &[],
            EMPTY_SYSTEM_ARGS,
        )
        .unwrap();

        // selector, u32 args length, then the args bytes
        assert_eq!(instruction.data.len(), 8 + 4 + 2);
        assert_eq!(instruction.data[..8], method_discriminator("apply"));
        assert_eq!(instruction.data[8..12], 2u32.to_le_bytes());
        assert_eq!(&instruction.data[12..], b"{}");
    }

    #[test]
    fn test_settle_account_order() {
        let world_program = Pubkey::new_unique();
        let settle_system = Pubkey::new_unique();
        let authority = Pubkey::new_unique();
        let world_instance = Pubkey::new_unique();
        let component_program = Pubkey::new_unique();
        let entity = Pubkey::new_unique();

        let instruction = settle_competition_instruction(
            &world_program,
            &settle_system,
            &authority,
            &world_instance,
            &component_program,
            &entity,
        )
        .unwrap();

        assert_eq!(instruction.program_id, world_program);
        assert_eq!(instruction.accounts.len(), 6);

        assert_eq!(instruction.accounts[0].pubkey, settle_system);
        assert!(!instruction.accounts[0].is_signer);

        assert_eq!(instruction.accounts[1].pubkey, authority);
        assert!(instruction.accounts[1].is_signer);

        assert_eq!(instruction.accounts[2].pubkey, sysvar::instructions::id());

        assert_eq!(instruction.accounts[3].pubkey, world_instance);
        assert!(instruction.accounts[3].is_writable);

        assert_eq!(instruction.accounts[4].pubkey, component_program);
        let expected_component = pda::get_component_pda(&component_program, &entity).0;
        assert_eq!(instruction.accounts[5].pubkey, expected_component);
        assert!(instruction.accounts[5].is_writable);
    }

    #[test]
    fn test_join_attaches_both_components() {
        let world_program = Pubkey::new_unique();
        let join_system = Pubkey::new_unique();
        let authority = Pubkey::new_unique();
        let world_instance = Pubkey::new_unique();
        let competition_program = Pubkey::new_unique();
        let entity = Pubkey::new_unique();
        let trading_program = Pubkey::new_unique();

        let instruction = join_competition_instruction(
            &world_program,
            &join_system,
            &authority,
            &world_instance,
            2409,
            &competition_program,
            &entity,
            &trading_program,
        )
        .unwrap();

        // Two component pairs after the four fixed metas
        assert_eq!(instruction.accounts.len(), 8);
        assert_eq!(instruction.accounts[0].pubkey, join_system);
        assert_eq!(instruction.accounts[4].pubkey, competition_program);
        assert_eq!(
            instruction.accounts[5].pubkey,
            pda::get_component_pda(&competition_program, &entity).0
        );
        assert_eq!(instruction.accounts[6].pubkey, trading_program);

        let (owner_entity, _) =
            pda::get_entity_pda(&world_program, 2409, authority.as_ref());
        assert_eq!(
            instruction.accounts[7].pubkey,
            pda::get_component_pda(&trading_program, &owner_entity).0
        );
        assert!(instruction.accounts[7].is_writable);
    }

    #[test]
    fn test_apply_selector_is_method_specific() {
        assert_ne!(
            method_discriminator("apply"),
            method_discriminator("close_position")
        );
    }
}
