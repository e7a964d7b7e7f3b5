//! Coin wallet and reward crediting.
//!
//! The destruction engine pays out through [`RewardEvent`]; this module
//! owns the balance. Crediting is unconditional; only the player-facing
//! announcement is suppressed while the destroyed object was being
//! carried.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::destructible::Held;
use crate::DemolitionSet;

pub struct EconomyPlugin;

impl Plugin for EconomyPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<RewardEvent>()
            .init_resource::<CoinWallet>()
            .add_systems(
                Update,
                (credit_rewards, announce_rewards)
                    .chain()
                    .in_set(DemolitionSet::Economy),
            );
    }
}

/// Coins granted for one destroyed object.
#[derive(Event, Debug, Clone, Copy)]
pub struct RewardEvent {
    pub amount: u32,
    pub source: Entity,
}

/// Player coin balance.
#[derive(Resource, Debug, Default, Clone, Serialize, Deserialize)]
pub struct CoinWallet {
    coins: u64,
}

impl CoinWallet {
    pub fn balance(&self) -> u64 {
        self.coins
    }

    pub fn add(&mut self, amount: u32) {
        self.coins += u64::from(amount);
    }

    pub fn has_at_least(&self, amount: u64) -> bool {
        self.coins >= amount
    }

    /// Deduct `amount` if covered. Refusal is not an error, just `false`.
    pub fn try_spend(&mut self, amount: u64) -> bool {
        if self.coins < amount {
            debug!(amount, balance = self.coins, "purchase refused");
            return false;
        }
        self.coins -= amount;
        debug!(amount, balance = self.coins, "coins spent");
        true
    }
}

fn credit_rewards(mut wallet: ResMut<CoinWallet>, mut rewards: EventReader<RewardEvent>) {
    for reward in rewards.read() {
        wallet.add(reward.amount);
        debug!(
            amount = reward.amount,
            balance = wallet.balance(),
            "reward credited"
        );
    }
}

/// Player-facing pickup note. Stays quiet when the source was held;
/// the coins are credited either way.
fn announce_rewards(mut rewards: EventReader<RewardEvent>, held: Query<(), With<Held>>) {
    for reward in rewards.read() {
        if held.contains(reward.source) {
            continue;
        }
        info!(amount = reward.amount, "coins collected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_starts_empty() {
        assert_eq!(CoinWallet::default().balance(), 0);
    }

    #[test]
    fn test_add_accumulates() {
        let mut wallet = CoinWallet::default();
        wallet.add(10);
        wallet.add(5);
        assert_eq!(wallet.balance(), 15);
        assert!(wallet.has_at_least(15));
        assert!(!wallet.has_at_least(16));
    }

    #[test]
    fn test_try_spend() {
        let mut wallet = CoinWallet::default();
        wallet.add(20);
        assert!(wallet.try_spend(15));
        assert_eq!(wallet.balance(), 5);
        assert!(!wallet.try_spend(6));
        assert_eq!(wallet.balance(), 5);
    }

    #[test]
    fn test_credit_rewards_sums_all_events() {
        let mut app = App::new();
        app.add_event::<RewardEvent>()
            .init_resource::<CoinWallet>()
            .add_systems(Update, credit_rewards);

        let source = app.world_mut().spawn_empty().id();
        app.world_mut().send_event(RewardEvent { amount: 10, source });
        app.world_mut().send_event(RewardEvent { amount: 25, source });
        app.update();

        assert_eq!(app.world().resource::<CoinWallet>().balance(), 35);
    }
}
