//! Tick Pipeline
//!
//! One `World::step` advances the simulation by exactly one tick:
//!
//! 1. Round clock
//! 2. Enclosement (shrinking map)
//! 3. Per-player update: diseases, movement, pickups, actions
//! 4. Disease transfer by touch
//! 5. Bomb fuses, sliding bombs, detonations and chain reactions
//! 6. Explosion decay, then blast kills
//! 7. Kick detection from movement intent
//! 8. Bomb-slot recount
//!
//! All arithmetic is integer-only; identical inputs on an identical seed
//! replay bit-for-bit.

use std::collections::BTreeSet;

use crate::game::enclosement::enclosement_order;
use crate::game::events::GameEvent;
use crate::game::items::{self, is_good_pickup};
use crate::game::scheme::{ItemType, TileType};
use crate::game::status::{effective_stats, transfer_oldest, DiseaseSource, DiseaseType};
use crate::game::world::{
    BombFlags, BombMotion, CarriedBomb, DeathReason, Fuse, World,
};
use crate::{ENCLOSEMENT_INTERVAL_TICKS, ENCLOSEMENT_START_SECONDS, PLAYER_RADIUS, SUBTILE};

/// Double-tap window for line-bomb placement, ~200ms.
const SPOOGE_WINDOW_TICKS: u32 = 12;

/// Tiles a sliding bomb waits between steps.
const BOMB_MOVE_COOLDOWN: u8 = 2;

/// cos(45 deg) in 1/256ths, for diagonal movement.
const DIAGONAL_SCALE: i32 = 181;

impl World {
    /// Advance one tick.
    pub fn step(&mut self) {
        self.events.clear();
        self.tick += 1;

        self.round_ticks_remaining.tick();
        self.update_enclosement();

        for pi in 0..self.players.len() {
            self.update_player(pi);
        }

        self.transfer_diseases_by_touch();
        self.update_bombs();
        self.update_explosions();
        self.apply_explosions_to_players();
        self.detect_kicks();
        self.recount_bomb_slots();
    }

    // =========================================================================
    // PLAYER UPDATE
    // =========================================================================

    fn update_player(&mut self, pi: usize) {
        if !self.players[pi].alive {
            return;
        }
        let input = self.players[pi].input;

        {
            let p = &mut self.players[pi];
            p.diseases.tick();
            p.stats = effective_stats(
                p.stats_base.speed,
                p.stats_base.flame,
                p.stats_base.fuse_ticks,
                p.ability.full_fire,
                &p.diseases,
            );
        }
        let stats = self.players[pi].stats;

        let (mut raw_x, mut raw_y) = input.axes();
        if stats.reverse_controls {
            raw_x = -raw_x;
            raw_y = -raw_y;
        }

        if raw_x != 0 || raw_y != 0 {
            // Cardinal facing, horizontal wins ties.
            let p = &mut self.players[pi];
            p.facing = if raw_x.abs() >= raw_y.abs() {
                (raw_x.signum() as i8, 0)
            } else {
                (0, raw_y.signum() as i8)
            };
        }

        // 1 speed unit = 0.01 tiles/tick on top of a 0.05 base, rounded to
        // sub-tile units.
        let step = ((5 + i32::from(stats.speed)) * SUBTILE + 50) / 100;
        let (step_x, step_y) = if raw_x != 0 && raw_y != 0 {
            let d = step * DIAGONAL_SCALE / 256;
            (d * raw_x, d * raw_y)
        } else {
            (step * raw_x, step * raw_y)
        };
        let target_x = self.players[pi].x + step_x;
        let target_y = self.players[pi].y + step_y;

        // Slide: full move first, then each axis alone. The y retry runs from
        // wherever the x retry left the player, so a successful x-slide
        // re-tests the blocked diagonal and sticks.
        let py = self.players[pi].y;
        if !self.try_move_player(pi, target_x, target_y) {
            self.try_move_player(pi, target_x, py);
            let x_now = self.players[pi].x;
            self.try_move_player(pi, x_now, target_y);
        }

        self.pickup_floor_item(pi);

        if input.drop {
            self.handle_drop_pressed(pi);
        }
        if input.secondary {
            self.handle_secondary_pressed(pi);
        }

        // Poops acts on its own when the player does not.
        if stats.poops && !stats.constipation && !input.drop {
            self.place_bomb(pi);
        }
        if stats.poops && self.players[pi].carrying.is_some() && !input.secondary {
            self.throw_carried_bomb(pi);
        }
    }

    fn try_move_player(&mut self, pi: usize, nx: i32, ny: i32) -> bool {
        let id = self.players[pi].id;
        let r = PLAYER_RADIUS;
        for (sx, sy) in [(nx - r, ny - r), (nx + r, ny - r), (nx - r, ny + r), (nx + r, ny + r)] {
            let tx = sx.div_euclid(SUBTILE);
            let ty = sy.div_euclid(SUBTILE);
            if self.is_blocked_for_player(id, tx, ty) {
                return false;
            }
        }
        let p = &mut self.players[pi];
        p.x = nx;
        p.y = ny;
        true
    }

    // =========================================================================
    // PICKUPS
    // =========================================================================

    fn pickup_floor_item(&mut self, pi: usize) {
        let (tx, ty) = self.players[pi].tile();
        let Some(item) = self.items.remove(&(tx as u8, ty as u8)) else {
            return;
        };
        self.apply_item_pickup(pi, item);
        let player_id = self.players[pi].id;
        self.events.push(GameEvent::ItemPickup { player_id, item });
    }

    pub(crate) fn apply_item_pickup(&mut self, pi: usize, item: ItemType) {
        if is_good_pickup(item) {
            self.players[pi].diseases.cure_oldest();
        }

        match item {
            ItemType::SelectItem => {
                if let Some(rolled) = self.roll_select_item() {
                    self.apply_item_pickup(pi, rolled);
                }
            }
            ItemType::Skull => {
                let ebola = self.rng.chance(1, 10);
                let (count, source) = if ebola {
                    (3, DiseaseSource::Ebola)
                } else {
                    (1, DiseaseSource::Skull)
                };
                for _ in 0..count {
                    let idx = self.rng.next_below(DiseaseType::ALL.len() as u32) as usize;
                    let effect = DiseaseType::ALL[idx];
                    self.players[pi].diseases.add(effect, source);
                }
                let player_id = self.players[pi].id;
                self.events.push(GameEvent::DiseaseApplied { player_id, source });
            }
            ItemType::BombUp => {
                let p = &mut self.players[pi];
                p.stats_base.bomb_cap = (p.stats_base.bomb_cap + 1).min(10);
            }
            ItemType::FireUp => {
                let p = &mut self.players[pi];
                p.stats_base.flame = (p.stats_base.flame + 1).min(10);
            }
            ItemType::FullFire => {
                let p = &mut self.players[pi];
                p.ability.full_fire = true;
                p.stats_base.flame = 10;
            }
            ItemType::SpeedUp => {
                let p = &mut self.players[pi];
                p.stats_base.speed = (p.stats_base.speed + 1).min(10);
            }
            ItemType::SpeedDown => {
                let p = &mut self.players[pi];
                p.stats_base.speed = (p.stats_base.speed - 1).max(1);
            }
            _ => {
                let outcome = items::apply_ability_pickup(&mut self.players[pi].ability, item);
                let (tx, ty) = self.players[pi].tile();
                let player_id = self.players[pi].id;
                for ejected in outcome.ejected {
                    self.spawn_item(tx as u8, ty as u8, ejected);
                    self.events.push(GameEvent::ItemEjected {
                        player_id,
                        item: ejected,
                        tx: tx as u8,
                        ty: ty as u8,
                    });
                }
            }
        }
    }

    // =========================================================================
    // PRIMARY ACTION
    // =========================================================================

    fn handle_drop_pressed(&mut self, pi: usize) {
        let stats = self.players[pi].stats;
        if stats.constipation {
            return;
        }
        if self.players[pi].ability.hand && self.try_pickup_bomb(pi) {
            return;
        }

        if self.players[pi].ability.spooge {
            let last = self.players[pi].last_drop_tick;
            self.players[pi].last_drop_tick = Some(self.tick);
            if let Some(last) = last {
                if self.tick - last <= SPOOGE_WINDOW_TICKS && self.line_bomb(pi) {
                    return;
                }
            }
        }

        self.place_bomb(pi);
        if stats.poops {
            self.place_bomb(pi);
        }
    }

    fn place_bomb(&mut self, pi: usize) {
        let p = &self.players[pi];
        if !p.alive {
            return;
        }
        if p.bombs_placed >= u32::from(p.stats_base.bomb_cap) {
            return;
        }
        let (tx, ty) = p.tile();
        if self.is_blocking_tile(tx, ty) || self.bomb_at(tx as u8, ty as u8).is_some() {
            return;
        }

        let p = &self.players[pi];
        let fuse = if p.ability.trigger {
            Fuse::Unbounded
        } else {
            Fuse::Ticks(p.stats.fuse_ticks)
        };
        let flags = BombFlags {
            trigger: p.ability.trigger,
            jelly: p.ability.jelly,
        };
        let flame = p.stats.flame;
        let id = p.id;
        let mut passable = BTreeSet::new();
        passable.insert(id);
        if self
            .spawn_bomb(tx as u8, ty as u8, id, flame, fuse, flags, passable)
            .is_some()
        {
            self.players[pi].bombs_placed += 1;
        }
    }

    /// Lay bombs along the facing direction until capacity or the arena
    /// edge; blocked tiles are skipped, not stopped at.
    fn line_bomb(&mut self, pi: usize) -> bool {
        if !self.players[pi].ability.spooge {
            return false;
        }
        let (dx, dy) = self.players[pi].facing_dir();
        let (tx, ty) = self.players[pi].tile();
        let available = u32::from(self.players[pi].stats_base.bomb_cap)
            .saturating_sub(self.players[pi].bombs_placed);

        let mut cx = tx + dx;
        let mut cy = ty + dy;
        let mut placed = 0u32;
        while placed < available {
            if cx < 0 || cy < 0 || cx >= i32::from(self.width) || cy >= i32::from(self.height) {
                break;
            }
            if self.tile_at(cx, cy) != TileType::Floor
                || self.bomb_at(cx as u8, cy as u8).is_some()
            {
                cx += dx;
                cy += dy;
                continue;
            }
            let p = &self.players[pi];
            let fuse = if p.ability.trigger {
                Fuse::Unbounded
            } else {
                Fuse::Ticks(p.stats.fuse_ticks)
            };
            let flags = BombFlags {
                trigger: p.ability.trigger,
                jelly: p.ability.jelly,
            };
            let flame = p.stats.flame;
            let id = p.id;
            if self
                .spawn_bomb(cx as u8, cy as u8, id, flame, fuse, flags, BTreeSet::new())
                .is_some()
            {
                placed += 1;
            }
            cx += dx;
            cy += dy;
        }

        if placed > 0 {
            self.players[pi].bombs_placed += placed;
            let player_id = self.players[pi].id;
            self.events.push(GameEvent::Spooge { player_id, placed });
            true
        } else {
            false
        }
    }

    // =========================================================================
    // SECONDARY ACTION
    // =========================================================================

    /// Priority: throw carried bomb, then trigger the oldest armed bomb,
    /// then punch, then stop an own sliding bomb.
    fn handle_secondary_pressed(&mut self, pi: usize) {
        if self.players[pi].carrying.is_some() {
            self.throw_carried_bomb(pi);
            return;
        }
        if self.players[pi].ability.trigger {
            if let Some(next) = self.players[pi].trigger_bombs.front().copied() {
                self.detonate_bomb(next);
                return;
            }
        }
        let poops = self.players[pi].stats.poops;
        if self.try_punch_bomb(pi, poops) {
            return;
        }
        self.stop_owned_moving_bomb(pi);
    }

    fn try_pickup_bomb(&mut self, pi: usize) -> bool {
        let p = &self.players[pi];
        if !p.ability.hand || p.carrying.is_some() {
            return false;
        }
        let (dx, dy) = p.facing_dir();
        let (tx, ty) = p.tile();
        let (bx, by) = (tx + dx, ty + dy);
        if bx < 0 || by < 0 {
            return false;
        }
        let Some(bomb_id) = self.bomb_at(bx as u8, by as u8) else {
            return false;
        };
        let Some(bomb) = self.bomb(bomb_id) else {
            return false;
        };
        if bomb.moving.is_some() {
            return false;
        }

        let Some(bomb) = self.remove_bomb(bomb_id, true) else {
            return false;
        };
        self.players[pi].carrying = Some(CarriedBomb {
            flame: bomb.flame,
            fuse: bomb.fuse,
            flags: bomb.flags,
        });
        let player_id = self.players[pi].id;
        self.events.push(GameEvent::BombPickedUp {
            player_id,
            bomb_id,
        });
        true
    }

    fn throw_carried_bomb(&mut self, pi: usize) -> bool {
        let Some(carried) = self.players[pi].carrying else {
            return false;
        };
        let (dx, dy) = self.players[pi].facing_dir();
        let (tx, ty) = self.players[pi].tile();
        let Some((lx, ly)) = self.farthest_landing_tile(tx, ty, dx, dy) else {
            return false;
        };

        let fuse = if carried.flags.trigger {
            Fuse::Unbounded
        } else {
            carried.fuse
        };
        let id = self.players[pi].id;
        let Some(bomb_id) = self.spawn_bomb(
            lx,
            ly,
            id,
            carried.flame,
            fuse,
            carried.flags,
            BTreeSet::new(),
        ) else {
            return false;
        };
        self.players[pi].carrying = None;
        self.events.push(GameEvent::BombThrown {
            player_id: id,
            bomb_id,
            tx: lx,
            ty: ly,
            dx: dx as i8,
            dy: dy as i8,
        });
        true
    }

    fn try_punch_bomb(&mut self, pi: usize, poops_disabled: bool) -> bool {
        if !self.players[pi].ability.boxing || poops_disabled {
            return false;
        }
        let (dx, dy) = self.players[pi].facing_dir();
        let (tx, ty) = self.players[pi].tile();
        let (bx, by) = (tx + dx, ty + dy);
        if bx < 0 || by < 0 {
            return false;
        }
        let Some(bomb_id) = self.bomb_at(bx as u8, by as u8) else {
            return false;
        };
        if self.bomb(bomb_id).map(|b| b.moving.is_some()).unwrap_or(true) {
            return false;
        }
        let Some((lx, ly)) = self.farthest_landing_tile(bx, by, dx, dy) else {
            return false;
        };

        self.bombs_by_tile.remove(&(bx as u8, by as u8));
        if let Some(bomb) = self.bomb_mut(bomb_id) {
            bomb.tx = lx;
            bomb.ty = ly;
        }
        self.bombs_by_tile.insert((lx, ly), bomb_id);
        let owner_id = self.players[pi].id;
        self.events.push(GameEvent::BombPunched {
            id: bomb_id,
            owner_id,
            tx: lx,
            ty: ly,
            dx: dx as i8,
            dy: dy as i8,
        });
        true
    }

    fn stop_owned_moving_bomb(&mut self, pi: usize) -> bool {
        let id = self.players[pi].id;
        for bomb in &mut self.bombs {
            let Some(motion) = bomb.moving else {
                continue;
            };
            if motion.owner_id != id {
                continue;
            }
            bomb.moving = None;
            let bomb_id = bomb.id;
            self.events.push(GameEvent::BombStopped {
                id: bomb_id,
                owner_id: id,
            });
            return true;
        }
        false
    }

    // =========================================================================
    // BOMBS
    // =========================================================================

    fn update_bombs(&mut self) {
        for bi in 0..self.bombs.len() {
            // Placer passability lasts until the hurtbox fully leaves the
            // tile.
            let (btx, bty) = (self.bombs[bi].tx, self.bombs[bi].ty);
            let passable: Vec<_> = self.bombs[bi].passable_by.iter().copied().collect();
            for pid in passable {
                let keep = self
                    .player(pid)
                    .map(|p| {
                        p.alive
                            && World::hurtbox_overlaps_tile(
                                p.x,
                                p.y,
                                i32::from(btx),
                                i32::from(bty),
                            )
                    })
                    .unwrap_or(false);
                if !keep {
                    self.bombs[bi].passable_by.remove(&pid);
                }
            }

            if let Fuse::Ticks(t) = &mut self.bombs[bi].fuse {
                *t = t.saturating_sub(1);
            }

            if let Some(mut motion) = self.bombs[bi].moving {
                motion.cooldown = motion.cooldown.saturating_sub(1);
                self.bombs[bi].moving = Some(motion);
                if motion.cooldown == 0 {
                    self.step_moving_bomb(bi, motion);
                }
            }

            if self.bombs[bi].fuse == Fuse::Ticks(0) {
                let id = self.bombs[bi].id;
                self.detonation_queue.push_back((id, true));
            }
        }

        self.drain_detonations();
    }

    fn step_moving_bomb(&mut self, bi: usize, motion: BombMotion) {
        let bomb = &self.bombs[bi];
        let nx = i32::from(bomb.tx) + i32::from(motion.dx);
        let ny = i32::from(bomb.ty) + i32::from(motion.dy);
        let blocked = self.tile_is_bomb_blocked(nx, ny);

        if blocked {
            if self.bombs[bi].flags.jelly {
                // Bounce straight back if the reverse tile is open.
                let rx = i32::from(self.bombs[bi].tx) - i32::from(motion.dx);
                let ry = i32::from(self.bombs[bi].ty) - i32::from(motion.dy);
                if self.tile_is_bomb_blocked(rx, ry) {
                    self.bombs[bi].moving = None;
                } else {
                    self.bombs[bi].moving = Some(BombMotion {
                        dx: -motion.dx,
                        dy: -motion.dy,
                        cooldown: BOMB_MOVE_COOLDOWN,
                        owner_id: motion.owner_id,
                    });
                }
            } else {
                self.bombs[bi].moving = None;
            }
            return;
        }

        let (otx, oty) = (self.bombs[bi].tx, self.bombs[bi].ty);
        self.bombs_by_tile.remove(&(otx, oty));
        self.bombs[bi].tx = nx as u8;
        self.bombs[bi].ty = ny as u8;
        let id = self.bombs[bi].id;
        self.bombs_by_tile.insert((nx as u8, ny as u8), id);
        self.bombs[bi].moving = Some(BombMotion {
            cooldown: BOMB_MOVE_COOLDOWN,
            ..motion
        });
    }

    fn tile_is_bomb_blocked(&self, tx: i32, ty: i32) -> bool {
        if self.is_blocking_tile(tx, ty) {
            return true;
        }
        tx >= 0 && ty >= 0 && self.bombs_by_tile.contains_key(&(tx as u8, ty as u8))
    }

    // =========================================================================
    // EXPLOSIONS
    // =========================================================================

    fn update_explosions(&mut self) {
        for ex in &mut self.explosions {
            ex.ttl = ex.ttl.saturating_sub(1);
        }
        self.explosions.retain(|ex| ex.ttl > 0);
    }

    fn apply_explosions_to_players(&mut self) {
        if self.explosions.is_empty() {
            return;
        }
        let mut hot = BTreeSet::new();
        for ex in &self.explosions {
            for &t in &ex.tiles {
                hot.insert(t);
            }
        }
        for pi in 0..self.players.len() {
            if !self.players[pi].alive {
                continue;
            }
            let (tx, ty) = self.players[pi].tile();
            if hot.contains(&(tx as u8, ty as u8)) {
                self.kill_player(pi, DeathReason::Explosion);
            }
        }
    }

    // =========================================================================
    // DISEASES
    // =========================================================================

    /// Tagging: when a diseased player touches a healthy one, the oldest
    /// disease jumps over.
    fn transfer_diseases_by_touch(&mut self) {
        let touch_dist_sq = (2 * PLAYER_RADIUS) * (2 * PLAYER_RADIUS);
        let alive: Vec<usize> = (0..self.players.len())
            .filter(|&i| self.players[i].alive)
            .collect();

        for ai in 0..alive.len() {
            for bi in ai + 1..alive.len() {
                let (i, j) = (alive[ai], alive[bi]);
                let dx = self.players[i].x - self.players[j].x;
                let dy = self.players[i].y - self.players[j].y;
                if dx * dx + dy * dy > touch_dist_sq {
                    continue;
                }
                let a_sick = !self.players[i].diseases.is_empty();
                let b_sick = !self.players[j].diseases.is_empty();
                let (from, to) = match (a_sick, b_sick) {
                    (true, false) => (i, j),
                    (false, true) => (j, i),
                    _ => continue,
                };
                let (lo, hi) = if from < to { (from, to) } else { (to, from) };
                let (left, right) = self.players.split_at_mut(hi);
                let (from_p, to_p) = if from < to {
                    (&mut left[lo], &mut right[0])
                } else {
                    (&mut right[0], &mut left[lo])
                };
                if transfer_oldest(&mut from_p.diseases, &mut to_p.diseases).is_some() {
                    let (from_id, to_id) = (from_p.id, to_p.id);
                    self.events.push(GameEvent::DiseaseTransfer {
                        from: from_id,
                        to: to_id,
                    });
                }
            }
        }
    }

    // =========================================================================
    // KICKS
    // =========================================================================

    /// After movement, a player pressing into an adjacent resting bomb
    /// kicks it if the tile beyond is open.
    fn detect_kicks(&mut self) {
        for pi in 0..self.players.len() {
            if !self.players[pi].alive || !self.players[pi].ability.kick {
                continue;
            }
            let input = self.players[pi].input;
            let (mut dx, mut dy) = input.axes();
            if self.players[pi].stats.reverse_controls {
                dx = -dx;
                dy = -dy;
            }
            if dx == 0 && dy == 0 {
                continue;
            }
            let (dir_x, dir_y) = if dx.abs() >= dy.abs() {
                (dx.signum(), 0)
            } else {
                (0, dy.signum())
            };
            self.try_kick_bomb(pi, dir_x, dir_y);
        }
    }

    fn try_kick_bomb(&mut self, pi: usize, dx: i32, dy: i32) -> bool {
        let (tx, ty) = self.players[pi].tile();
        let (fx, fy) = (tx + dx, ty + dy);
        if fx < 0 || fy < 0 {
            return false;
        }
        let Some(bomb_id) = self.bomb_at(fx as u8, fy as u8) else {
            return false;
        };
        if self.bomb(bomb_id).map(|b| b.moving.is_some()).unwrap_or(true) {
            return false;
        }
        if self.tile_is_bomb_blocked(fx + dx, fy + dy) {
            return false;
        }

        let owner_id = self.players[pi].id;
        if let Some(bomb) = self.bomb_mut(bomb_id) {
            bomb.moving = Some(BombMotion {
                dx: dx as i8,
                dy: dy as i8,
                cooldown: 0,
                owner_id,
            });
        }
        self.events.push(GameEvent::BombKicked {
            id: bomb_id,
            dx: dx as i8,
            dy: dy as i8,
            owner_id,
        });
        true
    }

    // =========================================================================
    // ENCLOSEMENT
    // =========================================================================

    fn update_enclosement(&mut self) {
        let Some(seconds_remaining) = self.round_ticks_remaining.seconds_remaining() else {
            return;
        };
        if !self.enclosement_active && seconds_remaining <= ENCLOSEMENT_START_SECONDS {
            self.enclosement_active = true;
            self.enclosement_order =
                enclosement_order(self.width, self.height, self.enclosement_depth);
            self.enclosement_index = 0;
            self.enclosement_cooldown = 0;
            self.events.push(GameEvent::EnclosementStart);
        }
        if !self.enclosement_active {
            return;
        }

        self.enclosement_cooldown = self.enclosement_cooldown.saturating_sub(1);
        if self.enclosement_cooldown > 0 {
            return;
        }
        let Some(&(x, y)) = self.enclosement_order.get(self.enclosement_index) else {
            return;
        };

        for pi in 0..self.players.len() {
            if !self.players[pi].alive {
                continue;
            }
            let (ptx, pty) = self.players[pi].tile();
            if ptx == i32::from(x) && pty == i32::from(y) {
                self.kill_player(pi, DeathReason::Enclosement);
            }
        }

        self.set_tile(x, y, TileType::Hard);
        self.items.remove(&(x, y));
        if let Some(bomb_id) = self.bomb_at(x, y) {
            self.remove_bomb(bomb_id, true);
        }
        self.events.push(GameEvent::ClosingBlock { x, y });
        self.enclosement_index += 1;
        self.enclosement_cooldown = ENCLOSEMENT_INTERVAL_TICKS;
    }

    // =========================================================================
    // BOOKKEEPING
    // =========================================================================

    /// A detonated or crushed bomb frees its owner's slot; a carried bomb
    /// holds none.
    fn recount_bomb_slots(&mut self) {
        for pi in 0..self.players.len() {
            let id = self.players[pi].id;
            let count = self.bombs.iter().filter(|b| b.owner_id == id).count() as u32;
            self.players[pi].bombs_placed = count;
        }
    }
}
