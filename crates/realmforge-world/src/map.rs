//! Map geometry.

use crate::data::MapData;

/// The walkable surface of one map template.
#[derive(Debug, Clone)]
pub struct Map {
    pub id: i16,
    pub name: String,
    pub music: i32,
    pub shop_allowed: bool,
    width: i16,
    height: i16,
    /// Row-major, `true` for blocked cells.
    blocked: Vec<bool>,
}

impl Map {
    pub fn from_data(data: &MapData) -> Self {
        let (width, height) = (data.width.max(0), data.height.max(0));
        let mut blocked = vec![false; width as usize * height as usize];
        for zone in &data.blocked {
            for y in zone.y.max(0)..zone.y.saturating_add(zone.height).min(height) {
                for x in zone.x.max(0)..zone.x.saturating_add(zone.width).min(width) {
                    blocked[y as usize * width as usize + x as usize] = true;
                }
            }
        }
        Self {
            id: data.id,
            name: data.name.clone(),
            music: data.music,
            shop_allowed: data.shop_allowed,
            width,
            height,
            blocked,
        }
    }

    pub fn width(&self) -> i16 {
        self.width
    }

    pub fn height(&self) -> i16 {
        self.height
    }

    pub fn contains(&self, x: i16, y: i16) -> bool {
        (0..self.width).contains(&x) && (0..self.height).contains(&y)
    }

    /// Whether a character may stand on `(x, y)`. Cells outside the map
    /// count as blocked.
    pub fn is_walkable(&self, x: i16, y: i16) -> bool {
        self.contains(x, y) && !self.blocked[y as usize * self.width as usize + x as usize]
    }

    /// The walkable cell closest to `(x, y)` in Chebyshev rings, starting
    /// from the point clamped into the map. `None` when nothing is walkable.
    pub fn nearest_walkable(&self, x: i16, y: i16) -> Option<(i16, i16)> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        let x = x.clamp(0, self.width - 1);
        let y = y.clamp(0, self.height - 1);
        let max_radius = self.width.max(self.height);
        for radius in 0..=max_radius {
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    if dx.abs() != radius && dy.abs() != radius {
                        continue;
                    }
                    let (cx, cy) = (x.saturating_add(dx), y.saturating_add(dy));
                    if self.is_walkable(cx, cy) {
                        return Some((cx, cy));
                    }
                }
            }
        }
        None
    }

    /// Whether moving from `from` to `to` is impossible. Only the
    /// destination cell matters.
    pub fn is_blocked_zone(&self, _from: (i16, i16), to: (i16, i16)) -> bool {
        !self.is_walkable(to.0, to.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::BlockedZone;

    fn map() -> Map {
        Map::from_data(&MapData {
            id: 1,
            name: "village".into(),
            width: 10,
            height: 8,
            music: 0,
            shop_allowed: true,
            blocked: vec![BlockedZone {
                x: 2,
                y: 3,
                width: 3,
                height: 2,
            }],
            spawns: Vec::new(),
            portals: Vec::new(),
        })
    }

    #[test]
    fn test_is_walkable_respects_zones_and_bounds() {
        let map = map();
        assert!(map.is_walkable(0, 0));
        assert!(map.is_walkable(9, 7));
        assert!(!map.is_walkable(10, 0));
        assert!(!map.is_walkable(-1, 3));
        assert!(!map.is_walkable(2, 3));
        assert!(!map.is_walkable(4, 4));
        assert!(map.is_walkable(5, 4));
        assert!(map.is_blocked_zone((0, 0), (3, 3)));
    }

    #[test]
    fn test_nearest_walkable_moves_off_blocked_cells() {
        let map = map();
        assert_eq!(map.nearest_walkable(0, 0), Some((0, 0)));
        assert_eq!(map.nearest_walkable(3, 3), Some((2, 2)));
        assert_eq!(map.nearest_walkable(400, -9), Some((9, 0)));
        assert_eq!(map.nearest_walkable(i16::MIN, i16::MAX), Some((0, 7)));
    }

    #[test]
    fn test_zone_overhanging_the_edge_is_clipped() {
        let map = Map::from_data(&MapData {
            blocked: vec![BlockedZone {
                x: 8,
                y: -2,
                width: 10,
                height: 3,
            }],
            ..MapData {
                id: 2,
                name: "edge".into(),
                width: 10,
                height: 8,
                music: 0,
                shop_allowed: false,
                blocked: Vec::new(),
                spawns: Vec::new(),
                portals: Vec::new(),
            }
        });
        assert!(!map.is_walkable(9, 0));
        assert!(map.is_walkable(9, 1));
        assert!(map.is_walkable(7, 0));
    }
}
