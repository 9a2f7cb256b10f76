//! Tile grid and the procedural floor generator.
//!
//! Floors are built from non-overlapping rectangular rooms chained together
//! by widened L-shaped corridors. Every room is joined to the one placed
//! before it, so the whole walkable area is a single connected region.

use crate::dice::DiceSource;
use crate::monster::MonsterKind;
use crate::world::Pos;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Monsters a floor can hold at most.
pub const MAX_MONSTERS_PER_FLOOR: u32 = 12;

/// Monsters a single room can hold at most.
pub const MAX_MONSTERS_PER_ROOM: u32 = 3;

/// Kinds of tile on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tile {
    Wall,
    Floor,
    Door,
    StairsDown,
    Chest,
    Trap,
}

impl Tile {
    pub fn is_walkable(&self) -> bool {
        !matches!(self, Tile::Wall)
    }
}

/// Every tile a creature can stand on.
pub const WALKABLE: [Tile; 5] = [Tile::Floor, Tile::Door, Tile::StairsDown, Tile::Chest, Tile::Trap];

/// An axis-aligned rectangular room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Room {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn center(&self) -> Pos {
        Pos::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    pub fn contains(&self, pos: Pos) -> bool {
        pos.x >= self.x && pos.x < self.x + self.width && pos.y >= self.y && pos.y < self.y + self.height
    }

    /// Whether the rooms touch once this room is grown by `margin` tiles.
    pub fn overlaps(&self, other: &Room, margin: i32) -> bool {
        self.x - margin < other.x + other.width
            && self.x + self.width + margin > other.x
            && self.y - margin < other.y + other.height
            && self.y + self.height + margin > other.y
    }

    pub fn cells(&self) -> impl Iterator<Item = Pos> + '_ {
        (self.y..self.y + self.height).flat_map(move |y| (self.x..self.x + self.width).map(move |x| Pos::new(x, y)))
    }

    /// The four cells one step in from each corner.
    pub fn inset_corners(&self) -> [Pos; 4] {
        let right = self.x + self.width - 2;
        let bottom = self.y + self.height - 2;
        [
            Pos::new(self.x + 1, self.y + 1),
            Pos::new(right, self.y + 1),
            Pos::new(self.x + 1, bottom),
            Pos::new(right, bottom),
        ]
    }
}

/// A monster the generator wants placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonsterSpawn {
    pub kind: MonsterKind,
    pub position: Pos,
}

/// A tile grid with its rooms and points of interest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dungeon {
    pub width: i32,
    pub height: i32,
    tiles: Vec<Tile>,
    pub rooms: Vec<Room>,
    pub spawn: Pos,
    /// `None` only for ambush arenas, which have no way down.
    pub stairs: Option<Pos>,
    explored: Vec<bool>,
    pub monster_spawns: Vec<MonsterSpawn>,
}

impl Dungeon {
    /// An all-wall grid.
    pub fn filled(width: i32, height: i32) -> Self {
        let cells = (width.max(0) * height.max(0)) as usize;
        Self {
            width,
            height,
            tiles: vec![Tile::Wall; cells],
            rooms: Vec::new(),
            spawn: Pos::default(),
            stairs: None,
            explored: vec![false; cells],
            monster_spawns: Vec::new(),
        }
    }

    /// A single open room with a wall border, used for roadside ambushes.
    pub fn arena(width: i32, height: i32) -> Self {
        let mut dungeon = Self::filled(width, height);
        let room = Room::new(1, 1, width - 2, height - 2);
        dungeon.carve_room(&room);
        dungeon.spawn = room.center();
        dungeon.rooms.push(room);
        dungeon
    }

    pub fn in_bounds(&self, pos: Pos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    /// Whether `pos` is off the outer wall ring.
    pub fn in_interior(&self, pos: Pos) -> bool {
        pos.x >= 1 && pos.y >= 1 && pos.x < self.width - 1 && pos.y < self.height - 1
    }

    fn index(&self, pos: Pos) -> Option<usize> {
        self.in_bounds(pos).then(|| (pos.y * self.width + pos.x) as usize)
    }

    /// Tile at `pos`; anything off the grid reads as wall.
    pub fn tile(&self, pos: Pos) -> Tile {
        self.index(pos).map(|i| self.tiles[i]).unwrap_or(Tile::Wall)
    }

    pub fn set_tile(&mut self, pos: Pos, tile: Tile) {
        if let Some(i) = self.index(pos) {
            self.tiles[i] = tile;
        }
    }

    pub fn is_walkable(&self, pos: Pos) -> bool {
        self.tile(pos).is_walkable()
    }

    pub fn count(&self, tile: Tile) -> usize {
        self.tiles.iter().filter(|t| **t == tile).count()
    }

    /// Every in-bounds cell with its tile.
    pub fn cells(&self) -> impl Iterator<Item = (Pos, Tile)> + '_ {
        self.tiles
            .iter()
            .enumerate()
            .map(move |(i, tile)| (Pos::new(i as i32 % self.width, i as i32 / self.width), *tile))
    }

    pub fn is_explored(&self, pos: Pos) -> bool {
        self.index(pos).map(|i| self.explored[i]).unwrap_or(false)
    }

    /// Mark every cell within `radius` tiles of `center` as explored.
    pub fn reveal_around(&mut self, center: Pos, radius: i32) {
        for y in center.y - radius..=center.y + radius {
            for x in center.x - radius..=center.x + radius {
                if let Some(i) = self.index(Pos::new(x, y)) {
                    self.explored[i] = true;
                }
            }
        }
    }

    fn carve_room(&mut self, room: &Room) {
        for pos in room.cells() {
            self.set_tile(pos, Tile::Floor);
        }
    }

    /// Turn a wall into floor. Never touches the outer border or existing
    /// open tiles.
    fn carve(&mut self, pos: Pos) {
        if self.in_interior(pos) && self.tile(pos) == Tile::Wall {
            self.set_tile(pos, Tile::Floor);
        }
    }

    /// Horizontal leg first, then vertical. Each leg is two tiles wide.
    fn carve_corridor(&mut self, from: Pos, to: Pos) {
        for x in from.x.min(to.x)..=from.x.max(to.x) {
            self.carve(Pos::new(x, from.y));
            self.carve(Pos::new(x, from.y + 1));
        }
        for y in from.y.min(to.y)..=from.y.max(to.y) {
            self.carve(Pos::new(to.x, y));
            self.carve(Pos::new(to.x + 1, y));
        }
    }

    fn is_reserved(&self, pos: Pos) -> bool {
        pos == self.spawn || Some(pos) == self.stairs
    }
}

// ============================================================================
// Generation
// ============================================================================

/// Knobs for the floor generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub width: i32,
    pub height: i32,
    pub room_min: i32,
    pub room_max: i32,
    /// Rooms requested on floor 0; each floor asks for one more.
    pub base_rooms: u32,
    pub max_rooms: u32,
    /// Room placement attempts before giving up.
    pub attempts: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            width: 32,
            height: 32,
            room_min: 4,
            room_max: 8,
            base_rooms: 5,
            max_rooms: 10,
            attempts: 200,
        }
    }
}

impl GeneratorConfig {
    pub fn with_size(mut self, width: i32, height: i32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn target_rooms(&self, floor: u32) -> u32 {
        (self.base_rooms + floor).min(self.max_rooms)
    }
}

/// Generate dungeon floor number `floor`.
pub fn generate<D: DiceSource + ?Sized>(config: &GeneratorConfig, floor: u32, dice: &mut D) -> Dungeon {
    let mut dungeon = Dungeon::filled(config.width, config.height);
    let target = config.target_rooms(floor) as usize;

    for _ in 0..config.attempts {
        if dungeon.rooms.len() >= target {
            break;
        }
        let width = dice.between(config.room_min, config.room_max);
        let height = dice.between(config.room_min, config.room_max);
        let x = dice.between(1, config.width - width - 1);
        let y = dice.between(1, config.height - height - 1);
        let candidate = Room::new(x, y, width, height);

        if x + width > config.width - 1 || y + height > config.height - 1 {
            continue;
        }
        if dungeon.rooms.iter().any(|room| candidate.overlaps(room, 1)) {
            continue;
        }

        dungeon.carve_room(&candidate);
        if let Some(previous) = dungeon.rooms.last().copied() {
            dungeon.carve_corridor(previous.center(), candidate.center());
        }
        dungeon.rooms.push(candidate);
    }

    if dungeon.rooms.is_empty() {
        // The grid is too small for even one room; open it up entirely.
        warn!(width = config.width, height = config.height, "no room fit, using an open arena");
        dungeon = Dungeon::arena(config.width, config.height);
    } else if dungeon.rooms.len() < target {
        warn!(floor, placed = dungeon.rooms.len(), target, "placed fewer rooms than requested");
    }

    dungeon.spawn = dungeon.rooms[0].center();
    place_stairs(&mut dungeon);
    place_features(&mut dungeon, floor, dice);
    place_monsters(&mut dungeon, floor, dice);

    debug!(
        floor,
        rooms = dungeon.rooms.len(),
        monsters = dungeon.monster_spawns.len(),
        traps = dungeon.count(Tile::Trap),
        chests = dungeon.count(Tile::Chest),
        "generated floor"
    );
    dungeon
}

/// Stairs go in the room whose center lies farthest from spawn. With only
/// one room, they go on the cell of that room farthest from spawn.
fn place_stairs(dungeon: &mut Dungeon) {
    let spawn = dungeon.spawn;
    let mut farthest = 0;
    for (index, room) in dungeon.rooms.iter().enumerate() {
        if room.center().distance_squared(spawn) > dungeon.rooms[farthest].center().distance_squared(spawn) {
            farthest = index;
        }
    }

    let stairs = if farthest == 0 {
        let room = dungeon.rooms[0];
        room.cells()
            .filter(|pos| *pos != spawn)
            .max_by_key(|pos| (pos.distance_squared(spawn), -pos.y, -pos.x))
    } else {
        Some(dungeon.rooms[farthest].center())
    };

    if let Some(pos) = stairs {
        dungeon.set_tile(pos, Tile::StairsDown);
        dungeon.stairs = Some(pos);
    }
}

/// Traps (not on the first floor) and chests in rooms other than the spawn room.
fn place_features<D: DiceSource + ?Sized>(dungeon: &mut Dungeon, floor: u32, dice: &mut D) {
    let rooms: Vec<Room> = dungeon.rooms.iter().skip(1).copied().collect();
    for room in rooms {
        if floor > 1 && dice.chance(1, 2) {
            let pos = Pos::new(
                dice.between(room.x, room.x + room.width - 1),
                dice.between(room.y, room.y + room.height - 1),
            );
            if dungeon.tile(pos) == Tile::Floor && !dungeon.is_reserved(pos) {
                dungeon.set_tile(pos, Tile::Trap);
            }
        }

        if dice.chance(1, 3) {
            let corners = room.inset_corners();
            let pos = corners[dice.roll_d(corners.len() as u32) as usize - 1];
            if dungeon.tile(pos) == Tile::Floor && !dungeon.is_reserved(pos) {
                dungeon.set_tile(pos, Tile::Chest);
            }
        }
    }
}

fn place_monsters<D: DiceSource + ?Sized>(dungeon: &mut Dungeon, floor: u32, dice: &mut D) {
    let species = MonsterKind::unlocked_at(floor);
    if species.is_empty() || dungeon.rooms.len() < 2 {
        return;
    }

    let total = (3 + floor).min(MAX_MONSTERS_PER_FLOOR);
    let per_room = (total / dungeon.rooms.len() as u32 + 1).min(MAX_MONSTERS_PER_ROOM);
    let rooms: Vec<Room> = dungeon.rooms.iter().skip(1).copied().collect();

    for room in rooms {
        let count = dice.between(1, per_room as i32) as u32;
        for _ in 0..count {
            if dungeon.monster_spawns.len() as u32 >= total {
                return;
            }
            let pos = Pos::new(
                dice.between(room.x + 1, room.x + room.width - 2),
                dice.between(room.y + 1, room.y + room.height - 2),
            );
            let kind = species[dice.roll_d(species.len() as u32) as usize - 1];

            let taken = dungeon.monster_spawns.iter().any(|s| s.position == pos);
            if dungeon.tile(pos) != Tile::Floor || dungeon.is_reserved(pos) || taken {
                debug!(%pos, "skipped monster placement");
                continue;
            }
            dungeon.monster_spawns.push(MonsterSpawn { kind, position: pos });
        }
    }
}
