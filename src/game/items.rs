//! Item Pickup Rules
//!
//! Pure pickup logic: the ability set, the fixed exclusivity matrix, and
//! the random/select pools. Stat changes and conflict outcomes are computed
//! here; the world applies the resulting ejections and events.

use serde::{Deserialize, Serialize};

use crate::core::Mulberry32;
use crate::game::scheme::{ItemRules, ItemType, OverrideMode};

/// Everything a player can permanently hold within a round.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Ability {
    /// Kick bombs by walking into them.
    pub kick: bool,
    /// Punch an adjacent bomb across the arena.
    pub boxing: bool,
    /// Pick up and throw bombs.
    pub hand: bool,
    /// Remote-trigger bombs.
    pub trigger: bool,
    /// Kicked/thrown bombs bounce.
    pub jelly: bool,
    /// Line-bomb placement.
    pub spooge: bool,
    /// Flame pinned to maximum.
    pub full_fire: bool,
}

/// Anything other than a Skull counts as good and cures one disease.
pub fn is_good_pickup(item: ItemType) -> bool {
    item != ItemType::Skull
}

/// Items that set an [`Ability`] flag rather than a stat.
pub fn is_ability_item(item: ItemType) -> bool {
    matches!(
        item,
        ItemType::Kick
            | ItemType::BoxingGlove
            | ItemType::PowerGlove
            | ItemType::RemoteControl
            | ItemType::RubberBomb
            | ItemType::LineBomb
    )
}

/// Items the map seeding may hide under soft blocks. SpeedDown never spawns
/// from the map.
pub const MAP_SPAWNABLE: [ItemType; 12] = [
    ItemType::BombUp,
    ItemType::FireUp,
    ItemType::FullFire,
    ItemType::SpeedUp,
    ItemType::Kick,
    ItemType::BoxingGlove,
    ItemType::PowerGlove,
    ItemType::RemoteControl,
    ItemType::RubberBomb,
    ItemType::LineBomb,
    ItemType::Skull,
    ItemType::SelectItem,
];

/// Pool a SelectItem rerolls from: map-spawnable items minus SelectItem
/// itself and anything the scheme forbids in random.
pub fn random_pool(rules: &ItemRules) -> Vec<ItemType> {
    MAP_SPAWNABLE
        .iter()
        .copied()
        .filter(|it| *it != ItemType::SelectItem && !rules.rule(*it).forbid_in_random)
        .collect()
}

/// Weighted entries for hidden-item seeding. FixedCount items are allocated
/// separately and carry no random weight; ChanceIn10 scales the default
/// weight of 10.
pub fn weighted_pool(rules: &ItemRules) -> Vec<(ItemType, u32)> {
    let mut pool = Vec::new();
    for it in MAP_SPAWNABLE {
        let rule = rules.rule(it);
        let weight = match rule.override_rule.mode {
            OverrideMode::Default => 10,
            OverrideMode::FixedCount => 0,
            OverrideMode::ChanceIn10 => rule.override_rule.value.min(10),
        };
        if weight > 0 {
            pool.push((it, weight));
        }
    }
    pool
}

/// Draw one item from a weighted pool. Falls back to BombUp on an empty
/// pool.
pub fn pick_weighted(rng: &mut Mulberry32, pool: &[(ItemType, u32)]) -> ItemType {
    let total: u32 = pool.iter().map(|(_, w)| w).sum();
    if total == 0 {
        return ItemType::BombUp;
    }
    let mut roll = rng.next_below(total);
    for (it, w) in pool {
        if roll < *w {
            return *it;
        }
        roll -= w;
    }
    pool.last().map(|(it, _)| *it).unwrap_or(ItemType::BombUp)
}

/// Result of applying an ability pickup against the exclusivity matrix.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AbilityPickup {
    /// False when the pickup itself was rejected (trigger beats glove).
    pub accepted: bool,
    /// Items ejected back onto the floor, in order.
    pub ejected: Vec<ItemType>,
}

/// Apply an ability item to the set, resolving the fixed exclusivity
/// matrix: RemoteControl vs BoxingGlove, RemoteControl vs RubberBomb, and
/// PowerGlove vs LineBomb. Acquiring one side ejects the other, except that
/// a held RemoteControl rejects an incoming BoxingGlove outright.
pub fn apply_ability_pickup(ability: &mut Ability, item: ItemType) -> AbilityPickup {
    let mut out = AbilityPickup {
        accepted: true,
        ejected: Vec::new(),
    };
    match item {
        ItemType::Kick => ability.kick = true,
        ItemType::BoxingGlove => {
            if ability.trigger {
                out.accepted = false;
                out.ejected.push(ItemType::BoxingGlove);
            } else {
                ability.boxing = true;
            }
        }
        ItemType::PowerGlove => {
            if ability.spooge {
                ability.spooge = false;
                out.ejected.push(ItemType::LineBomb);
            }
            ability.hand = true;
        }
        ItemType::RemoteControl => {
            if ability.jelly {
                ability.jelly = false;
                out.ejected.push(ItemType::RubberBomb);
            }
            if ability.boxing {
                ability.boxing = false;
                out.ejected.push(ItemType::BoxingGlove);
            }
            ability.trigger = true;
        }
        ItemType::RubberBomb => {
            if ability.trigger {
                ability.trigger = false;
                out.ejected.push(ItemType::RemoteControl);
            }
            ability.jelly = true;
        }
        ItemType::LineBomb => {
            if ability.hand {
                ability.hand = false;
                out.ejected.push(ItemType::PowerGlove);
            }
            ability.spooge = true;
        }
        _ => out.accepted = false,
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::scheme::default_scheme;

    #[test]
    fn test_trigger_beats_glove() {
        let mut ability = Ability {
            trigger: true,
            ..Default::default()
        };
        let out = apply_ability_pickup(&mut ability, ItemType::BoxingGlove);
        assert!(!out.accepted);
        assert_eq!(out.ejected, vec![ItemType::BoxingGlove]);
        assert!(!ability.boxing);
        assert!(ability.trigger);
    }

    #[test]
    fn test_remote_ejects_glove_and_jelly() {
        let mut ability = Ability {
            boxing: true,
            jelly: true,
            ..Default::default()
        };
        let out = apply_ability_pickup(&mut ability, ItemType::RemoteControl);
        assert!(out.accepted);
        assert_eq!(out.ejected, vec![ItemType::RubberBomb, ItemType::BoxingGlove]);
        assert!(ability.trigger);
        assert!(!ability.boxing);
        assert!(!ability.jelly);
    }

    #[test]
    fn test_hand_and_spooge_exclusive() {
        let mut ability = Ability {
            hand: true,
            ..Default::default()
        };
        let out = apply_ability_pickup(&mut ability, ItemType::LineBomb);
        assert_eq!(out.ejected, vec![ItemType::PowerGlove]);
        assert!(ability.spooge);
        assert!(!ability.hand);

        let out = apply_ability_pickup(&mut ability, ItemType::PowerGlove);
        assert_eq!(out.ejected, vec![ItemType::LineBomb]);
        assert!(ability.hand);
        assert!(!ability.spooge);
    }

    #[test]
    fn test_random_pool_excludes_select_and_speed_down() {
        let scheme = default_scheme();
        let pool = random_pool(&scheme.item_rules);
        assert!(!pool.contains(&ItemType::SelectItem));
        assert!(!pool.contains(&ItemType::SpeedDown));
        assert!(pool.contains(&ItemType::Skull));
    }

    #[test]
    fn test_forbid_in_random_honored() {
        let mut scheme = default_scheme();
        if let Some(rule) = scheme.item_rules.items.get_mut(&ItemType::Skull) {
            rule.forbid_in_random = true;
        }
        let pool = random_pool(&scheme.item_rules);
        assert!(!pool.contains(&ItemType::Skull));
    }

    #[test]
    fn test_weighted_pick_respects_zero_weight() {
        let mut scheme = default_scheme();
        for (it, rule) in scheme.item_rules.items.iter_mut() {
            if *it != ItemType::FireUp {
                rule.override_rule.mode = OverrideMode::FixedCount;
            }
        }
        let pool = weighted_pool(&scheme.item_rules);
        let mut rng = Mulberry32::new(7);
        for _ in 0..32 {
            assert_eq!(pick_weighted(&mut rng, &pool), ItemType::FireUp);
        }
    }
}
