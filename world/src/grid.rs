//! Spatial index mapping quantized keys to walkable cells.
//!
//! A [`GridIndex`] is an immutable snapshot. The world replaces the whole
//! snapshot whenever the marker set changes and hands out `Arc` clones, so a
//! planner holding an older generation keeps a consistent view.

use std::collections::HashMap;

use glam::{Vec2, Vec3};
use tilehop_core::{CellCategory, CellId, GridKey, GridMarker, MarkerId, ObstacleMask};

/// Walkable cell resolved from a marker.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridCell {
    id: CellId,
    key: GridKey,
    marker: MarkerId,
    position: Vec3,
    category: CellCategory,
}

impl GridCell {
    /// Index of the cell within its snapshot.
    #[must_use]
    pub const fn id(&self) -> CellId {
        self.id
    }

    /// Quantized key of the cell.
    #[must_use]
    pub const fn key(&self) -> GridKey {
        self.key
    }

    /// Marker the cell was resolved from.
    #[must_use]
    pub const fn marker(&self) -> MarkerId {
        self.marker
    }

    /// Centre of the cell in world space.
    #[must_use]
    pub const fn position(&self) -> Vec3 {
        self.position
    }

    /// Gameplay category of the cell.
    #[must_use]
    pub const fn category(&self) -> CellCategory {
        self.category
    }
}

/// Axis-aligned box on the obstacle layer that interrupts line of sight.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Blocker {
    key: GridKey,
    min: Vec3,
    max: Vec3,
}

impl Blocker {
    fn from_marker(marker: &GridMarker) -> Self {
        let half = marker.half_extents.abs();
        Self {
            key: GridKey::from_position(marker.position),
            min: marker.position - half,
            max: marker.position + half,
        }
    }

    /// Key of the marker that produced the blocker.
    #[must_use]
    pub const fn key(&self) -> GridKey {
        self.key
    }

    /// Lower corner of the box.
    #[must_use]
    pub const fn min(&self) -> Vec3 {
        self.min
    }

    /// Upper corner of the box.
    #[must_use]
    pub const fn max(&self) -> Vec3 {
        self.max
    }

    /// Whether the segment passes through the interior of the box.
    ///
    /// Segments that merely graze a face, edge or corner do not count.
    #[must_use]
    pub fn intersects_segment(&self, from: Vec3, to: Vec3) -> bool {
        let direction = to - from;
        let mut enter = 0.0_f32;
        let mut exit = 1.0_f32;

        for axis in 0..3 {
            let origin = from[axis];
            let delta = direction[axis];
            let (low, high) = (self.min[axis], self.max[axis]);

            if delta.abs() <= f32::EPSILON {
                if origin <= low || origin >= high {
                    return false;
                }
                continue;
            }

            let inverse = delta.recip();
            let mut near = (low - origin) * inverse;
            let mut far = (high - origin) * inverse;
            if near > far {
                std::mem::swap(&mut near, &mut far);
            }
            enter = enter.max(near);
            exit = exit.min(far);
            if enter >= exit {
                return false;
            }
        }

        true
    }
}

/// Immutable snapshot of the walkable grid.
#[derive(Clone, Debug, Default)]
pub struct GridIndex {
    generation: u64,
    cells: Vec<GridCell>,
    lookup: HashMap<GridKey, CellId>,
    blockers: Vec<Blocker>,
}

impl GridIndex {
    /// Builds a snapshot from the provided markers.
    ///
    /// Inactive markers and markers whose category is masked are skipped. When
    /// two markers quantize to the same key the first one wins. Markers on the
    /// obstacle layer additionally become line-of-sight blockers, whether or
    /// not the mask keeps them out of the cell set.
    #[must_use]
    pub fn build<'a, I>(generation: u64, markers: I, mask: &ObstacleMask) -> Self
    where
        I: IntoIterator<Item = (MarkerId, &'a GridMarker)>,
    {
        let mut index = Self {
            generation,
            ..Self::default()
        };

        for (marker_id, marker) in markers {
            if !marker.active {
                continue;
            }

            if marker.category.is_obstacle_layer() {
                index.blockers.push(Blocker::from_marker(marker));
            }

            if mask.contains(marker.category) {
                continue;
            }

            let key = GridKey::from_position(marker.position);
            if index.lookup.contains_key(&key) {
                continue;
            }

            let Ok(raw) = u32::try_from(index.cells.len()) else {
                break;
            };
            let id = CellId::new(raw);
            let _ = index.lookup.insert(key, id);
            index.cells.push(GridCell {
                id,
                key,
                marker: marker_id,
                position: marker.position,
                category: marker.category,
            });
        }

        index
    }

    /// Generation counter of the snapshot.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of indexed cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the snapshot holds no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// All indexed cells in insertion order.
    #[must_use]
    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    /// Line-of-sight blockers recorded during the build.
    #[must_use]
    pub fn blockers(&self) -> &[Blocker] {
        &self.blockers
    }

    /// Resolves a cell by identifier.
    #[must_use]
    pub fn cell(&self, id: CellId) -> Option<&GridCell> {
        self.cells.get(id.index())
    }

    /// Resolves the cell stored under the provided key.
    #[must_use]
    pub fn cell_at(&self, key: GridKey) -> Option<&GridCell> {
        self.lookup.get(&key).and_then(|id| self.cell(*id))
    }

    /// Finds the cell whose centre is horizontally closest to `position`.
    #[must_use]
    pub fn find_nearest(&self, position: Vec3) -> Option<&GridCell> {
        let mut best: Option<(&GridCell, f32)> = None;
        for cell in &self.cells {
            let distance = planar_distance(cell.position, position);
            if best.map_or(true, |(_, closest)| distance < closest) {
                best = Some((cell, distance));
            }
        }
        best.map(|(cell, _)| cell)
    }
}

/// Horizontal distance between two points, ignoring height.
#[must_use]
pub fn planar_distance(a: Vec3, b: Vec3) -> f32 {
    Vec2::new(a.x, a.z).distance(Vec2::new(b.x, b.z))
}
