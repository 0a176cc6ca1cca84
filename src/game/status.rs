//! Diseases
//!
//! Skull pickups infect players with timed status effects. Diseases spread
//! on contact (oldest first), are cured oldest-first by good pickups, and
//! expire after a fixed TTL. A player carries at most three at once.

use serde::{Deserialize, Serialize};

use crate::TICK_HZ;

/// A disease lasts 20 seconds.
pub const DISEASE_TTL_TICKS: u32 = 20 * TICK_HZ;

/// At most this many concurrent diseases per player.
pub const MAX_DISEASES: usize = 3;

/// Every status effect a Skull can inflict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiseaseType {
    /// Speed pinned to 1.
    Molasses,
    /// Speed pinned to 10.
    Crack,
    /// Movement axes inverted.
    ReverseControls,
    /// Cannot place bombs.
    Constipation,
    /// Drops bombs involuntarily whenever possible.
    Poops,
    /// Flame pinned to 1.
    ShortFlame,
    /// Fuse capped at one second.
    ShortFuse,
}

impl DiseaseType {
    /// All effects, in roll order.
    pub const ALL: [DiseaseType; 7] = [
        DiseaseType::Molasses,
        DiseaseType::Crack,
        DiseaseType::ReverseControls,
        DiseaseType::Constipation,
        DiseaseType::Poops,
        DiseaseType::ShortFlame,
        DiseaseType::ShortFuse,
    ];
}

/// How the disease was contracted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiseaseSource {
    /// Ordinary Skull pickup.
    Skull,
    /// Ebola roll (three effects at once).
    Ebola,
}

/// An active disease on a player.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Disease {
    /// Effect in force.
    pub effect: DiseaseType,
    /// Remaining ticks.
    pub ttl_ticks: u32,
    /// Origin, kept for event reporting.
    pub source: DiseaseSource,
}

/// Ordered set of active diseases. Index 0 is the oldest.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DiseaseSet {
    diseases: Vec<Disease>,
}

impl DiseaseSet {
    /// Active disease count.
    pub fn len(&self) -> usize {
        self.diseases.len()
    }

    /// True when no disease is active.
    pub fn is_empty(&self) -> bool {
        self.diseases.is_empty()
    }

    /// Active diseases, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Disease> {
        self.diseases.iter()
    }

    /// Add a disease. Returns false when the player is already full.
    pub fn add(&mut self, effect: DiseaseType, source: DiseaseSource) -> bool {
        if self.diseases.len() >= MAX_DISEASES {
            return false;
        }
        self.diseases.push(Disease {
            effect,
            ttl_ticks: DISEASE_TTL_TICKS,
            source,
        });
        true
    }

    /// Decrement TTLs and drop the expired.
    pub fn tick(&mut self) {
        for d in &mut self.diseases {
            d.ttl_ticks = d.ttl_ticks.saturating_sub(1);
        }
        self.diseases.retain(|d| d.ttl_ticks > 0);
    }

    /// Remove and return the oldest disease.
    pub fn take_oldest(&mut self) -> Option<Disease> {
        if self.diseases.is_empty() {
            None
        } else {
            Some(self.diseases.remove(0))
        }
    }

    /// Re-insert a disease at the front (failed transfer keeps ordering).
    pub fn push_front(&mut self, d: Disease) {
        self.diseases.insert(0, d);
    }

    /// Cure the oldest disease. Returns true when one was removed.
    pub fn cure_oldest(&mut self) -> bool {
        self.take_oldest().is_some()
    }

    /// True when the given effect is active.
    pub fn has(&self, effect: DiseaseType) -> bool {
        self.diseases.iter().any(|d| d.effect == effect)
    }
}

/// Move the oldest disease from one set to another. If the target is full
/// the disease stays on the source and the transfer fails.
pub fn transfer_oldest(from: &mut DiseaseSet, to: &mut DiseaseSet) -> Option<DiseaseType> {
    let d = from.take_oldest()?;
    if to.diseases.len() >= MAX_DISEASES {
        from.push_front(d);
        return None;
    }
    to.diseases.push(d);
    Some(d.effect)
}

/// Stats after diseases and Full Fire are applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EffectiveStats {
    /// Movement speed level.
    pub speed: u8,
    /// Blast length in tiles.
    pub flame: u8,
    /// Fuse of newly placed timed bombs.
    pub fuse_ticks: u32,
    /// Movement axes inverted.
    pub reverse_controls: bool,
    /// Bomb placement blocked.
    pub constipation: bool,
    /// Involuntary bomb drops.
    pub poops: bool,
}

impl Default for EffectiveStats {
    fn default() -> Self {
        EffectiveStats {
            speed: 5,
            flame: 1,
            fuse_ticks: crate::BOMB_FUSE_TICKS,
            reverse_controls: false,
            constipation: false,
            poops: false,
        }
    }
}

/// Apply disease effects on top of base stats. Full Fire overrides even
/// ShortFlame.
pub fn effective_stats(
    speed: u8,
    flame: u8,
    fuse_ticks: u32,
    full_fire: bool,
    diseases: &DiseaseSet,
) -> EffectiveStats {
    let mut out = EffectiveStats {
        speed,
        flame,
        fuse_ticks,
        reverse_controls: false,
        constipation: false,
        poops: false,
    };
    let mut short_flame = false;
    for d in diseases.iter() {
        match d.effect {
            DiseaseType::Molasses => out.speed = 1,
            DiseaseType::Crack => out.speed = 10,
            DiseaseType::ReverseControls => out.reverse_controls = true,
            DiseaseType::Constipation => out.constipation = true,
            DiseaseType::Poops => out.poops = true,
            DiseaseType::ShortFlame => short_flame = true,
            DiseaseType::ShortFuse => out.fuse_ticks = out.fuse_ticks.min(TICK_HZ),
        }
    }
    if full_fire {
        out.flame = 10;
    } else if short_flame {
        out.flame = 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cap_at_three() {
        let mut set = DiseaseSet::default();
        assert!(set.add(DiseaseType::Molasses, DiseaseSource::Skull));
        assert!(set.add(DiseaseType::Crack, DiseaseSource::Skull));
        assert!(set.add(DiseaseType::Poops, DiseaseSource::Ebola));
        assert!(!set.add(DiseaseType::ShortFuse, DiseaseSource::Skull));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_tick_expires() {
        let mut set = DiseaseSet::default();
        set.add(DiseaseType::Molasses, DiseaseSource::Skull);
        for _ in 0..DISEASE_TTL_TICKS {
            set.tick();
        }
        assert!(set.is_empty());
    }

    #[test]
    fn test_cure_oldest_first() {
        let mut set = DiseaseSet::default();
        set.add(DiseaseType::Molasses, DiseaseSource::Skull);
        set.add(DiseaseType::Crack, DiseaseSource::Skull);
        assert!(set.cure_oldest());
        assert!(!set.has(DiseaseType::Molasses));
        assert!(set.has(DiseaseType::Crack));
    }

    #[test]
    fn test_transfer_to_full_target_fails() {
        let mut a = DiseaseSet::default();
        let mut b = DiseaseSet::default();
        a.add(DiseaseType::Poops, DiseaseSource::Skull);
        for _ in 0..MAX_DISEASES {
            b.add(DiseaseType::Crack, DiseaseSource::Skull);
        }
        assert_eq!(transfer_oldest(&mut a, &mut b), None);
        assert!(a.has(DiseaseType::Poops));
    }

    #[test]
    fn test_transfer_moves_oldest() {
        let mut a = DiseaseSet::default();
        let mut b = DiseaseSet::default();
        a.add(DiseaseType::Molasses, DiseaseSource::Skull);
        a.add(DiseaseType::ShortFuse, DiseaseSource::Skull);
        assert_eq!(transfer_oldest(&mut a, &mut b), Some(DiseaseType::Molasses));
        assert!(b.has(DiseaseType::Molasses));
        assert!(a.has(DiseaseType::ShortFuse));
    }

    #[test]
    fn test_effective_stats_pins() {
        let mut set = DiseaseSet::default();
        set.add(DiseaseType::Molasses, DiseaseSource::Skull);
        set.add(DiseaseType::ShortFlame, DiseaseSource::Skull);
        set.add(DiseaseType::ShortFuse, DiseaseSource::Skull);
        let stats = effective_stats(7, 5, 120, false, &set);
        assert_eq!(stats.speed, 1);
        assert_eq!(stats.flame, 1);
        assert_eq!(stats.fuse_ticks, TICK_HZ);
    }

    #[test]
    fn test_full_fire_beats_short_flame() {
        let mut set = DiseaseSet::default();
        set.add(DiseaseType::ShortFlame, DiseaseSource::Skull);
        let stats = effective_stats(3, 2, 120, true, &set);
        assert_eq!(stats.flame, 10);
    }
}
