use std::collections::BTreeMap;

use crate::error::{ErrorCode, VaultResult};
use crate::state::events::{EventEnvelope, LifecycleEventRelayed, VaultEvent};
use crate::math::safe_math::SafeMath;
use crate::state::VaultVersion;
use crate::validate;
use anchor_lang::prelude::*;

/// Source of lifecycle events the emitter relays.
pub trait EmitsLifecycleEvents {
    fn vault_key(&self) -> Pubkey;

    /// Hands over queued events in the order they were recorded.
    fn drain_events(&mut self) -> Vec<VaultEvent>;
}

/// Single relay point for lifecycle events of every registered vault.
///
/// Each relayed event gets a version tag and a sequence number that is
/// monotonically increasing across all vaults.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Emitter {
    pub pubkey: Pubkey,
    /// Only the owner registers vaults; normally the factory.
    pub owner: Pubkey,
    vaults: BTreeMap<Pubkey, VaultVersion>,
    sequence: u64,
}

impl Emitter {
    pub fn new(pubkey: Pubkey, owner: Pubkey) -> Self {
        Self {
            pubkey,
            owner,
            vaults: BTreeMap::new(),
            sequence: 0,
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn version_of(&self, vault: &Pubkey) -> Option<VaultVersion> {
        self.vaults.get(vault).copied()
    }

    pub fn validate_owner(&self, caller: &Pubkey) -> VaultResult {
        validate!(
            caller.eq(&self.owner),
            ErrorCode::Unauthorized,
            "{} cannot register vaults with emitter {}",
            caller,
            self.pubkey
        )
    }

    pub fn register_vault(
        &mut self,
        caller: &Pubkey,
        vault: Pubkey,
        version: VaultVersion,
    ) -> VaultResult {
        self.validate_owner(caller)?;
        validate!(
            !self.vaults.contains_key(&vault),
            ErrorCode::VaultAlreadyRegistered,
            "vault {} already registered with emitter",
            vault
        )?;

        self.vaults.insert(vault, version);
        Ok(())
    }

    /// Relays everything `source` has queued. Unregistered vaults are rejected
    /// and keep their queue.
    pub fn relay(
        &mut self,
        source: &mut dyn EmitsLifecycleEvents,
        now: i64,
    ) -> VaultResult<Vec<EventEnvelope>> {
        let vault = source.vault_key();
        let version = self.version_of(&vault).ok_or_else(|| {
            msg!("vault {} not registered with emitter {}", vault, self.pubkey);
            ErrorCode::VaultNotRegistered
        })?;

        let events = source.drain_events();
        let mut envelopes = Vec::with_capacity(events.len());
        for payload in events {
            self.sequence = self.sequence.safe_add(1)?;

            emit!(LifecycleEventRelayed {
                ts: now,
                vault,
                version,
                sequence: self.sequence,
                kind: payload.kind(),
            });

            envelopes.push(EventEnvelope {
                version,
                vault,
                sequence: self.sequence,
                payload,
            });
        }

        Ok(envelopes)
    }
}
