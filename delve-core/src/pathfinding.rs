//! Breadth-first pathfinding over the tile grid.
//!
//! Movement is 8-connected and every step costs the same, so BFS gives
//! shortest paths. Neighbors are expanded in a fixed order, which keeps
//! results deterministic for a given grid.

use crate::dungeon::{Dungeon, Tile};
use crate::world::Pos;
use std::collections::{HashMap, HashSet, VecDeque};

/// Shortest path from `from` to `to` over tiles whose kind is in `walkable`.
///
/// The returned path excludes `from` and ends at `to`. It is empty when `to`
/// is unreachable or equal to `from`.
pub fn bfs_path(dungeon: &Dungeon, from: Pos, to: Pos, walkable: &[Tile]) -> Vec<Pos> {
    bfs_path_by(dungeon, from, to, |pos| walkable.contains(&dungeon.tile(pos)))
}

/// Like [`bfs_path`], with an arbitrary passability test.
pub fn bfs_path_by(dungeon: &Dungeon, from: Pos, to: Pos, passable: impl Fn(Pos) -> bool) -> Vec<Pos> {
    if from == to || !dungeon.in_bounds(to) || !passable(to) {
        return Vec::new();
    }

    let mut parents: HashMap<Pos, Pos> = HashMap::new();
    let mut visited: HashSet<Pos> = HashSet::from([from]);
    let mut queue: VecDeque<Pos> = VecDeque::from([from]);

    while let Some(current) = queue.pop_front() {
        if current == to {
            break;
        }
        for next in current.neighbors() {
            if !dungeon.in_bounds(next) || !passable(next) || !visited.insert(next) {
                continue;
            }
            parents.insert(next, current);
            queue.push_back(next);
        }
    }

    if !parents.contains_key(&to) {
        return Vec::new();
    }

    let mut path = vec![to];
    let mut cursor = to;
    while let Some(&parent) = parents.get(&cursor) {
        if parent == from {
            break;
        }
        path.push(parent);
        cursor = parent;
    }
    path.reverse();
    path
}

/// Every cell reachable from `from` in at most `budget` steps, with its
/// step count. `from` itself is included at 0.
pub fn reachable_within(
    dungeon: &Dungeon,
    from: Pos,
    budget: u32,
    passable: impl Fn(Pos) -> bool,
) -> HashMap<Pos, u32> {
    let mut steps: HashMap<Pos, u32> = HashMap::from([(from, 0)]);
    let mut queue: VecDeque<Pos> = VecDeque::from([from]);

    while let Some(current) = queue.pop_front() {
        let here = steps[&current];
        if here >= budget {
            continue;
        }
        for next in current.neighbors() {
            if !dungeon.in_bounds(next) || !passable(next) || steps.contains_key(&next) {
                continue;
            }
            steps.insert(next, here + 1);
            queue.push_back(next);
        }
    }
    steps
}

/// Every cell connected to `from` through tiles in `walkable`.
pub fn reachable_set(dungeon: &Dungeon, from: Pos, walkable: &[Tile]) -> HashSet<Pos> {
    reachable_within(dungeon, from, u32::MAX, |pos| walkable.contains(&dungeon.tile(pos)))
        .into_keys()
        .collect()
}

/// One greedy pursuit step: the walkable, unblocked neighbor that most
/// reduces Manhattan distance to `goal`. `None` when no neighbor is closer.
pub fn greedy_step(dungeon: &Dungeon, from: Pos, goal: Pos, blocked: impl Fn(Pos) -> bool) -> Option<Pos> {
    let mut best: Option<(i32, Pos)> = None;
    let current = from.manhattan(goal);
    for next in from.neighbors() {
        if next == goal || !dungeon.is_walkable(next) || blocked(next) {
            continue;
        }
        let distance = next.manhattan(goal);
        if distance >= current {
            continue;
        }
        if best.map_or(true, |(best_distance, _)| distance < best_distance) {
            best = Some((distance, next));
        }
    }
    best.map(|(_, pos)| pos)
}
