//! Cell visits and spatial queries.
//!
//! Visitors receive each entity immutably together with the map's command queue.
//! Anything structural a visitor wants (removing what it sees, spawning something
//! next to it) is queued and applied at the next drain point, so the container being
//! walked never changes underneath it.

use super::{Map, MapCommands};
use crate::grid::{CellArea, CellCoord, ContainerType};
use crate::object::WorldObject;
use crate::types::{EntityKind, Guid, Position};

/// Callback applied to every entity of a visited cell.
pub trait CellVisitor {
    fn visit(&mut self, object: &WorldObject, commands: &mut MapCommands);
}

impl<F> CellVisitor for F
where
    F: FnMut(&WorldObject, &mut MapCommands),
{
    fn visit(&mut self, object: &WorldObject, commands: &mut MapCommands) {
        self(object, commands)
    }
}

const BOTH: [ContainerType; 2] = [ContainerType::Grid, ContainerType::World];

impl Map {
    /// Visits one cell, loading its grid first when `load` is set.
    ///
    /// Without `load` an unloaded cell is skipped.
    pub fn visit_cell<V: CellVisitor>(&mut self, cell: CellCoord, load: bool, visitor: &mut V) {
        if load {
            self.ensure_grid_loaded(cell.grid());
        }
        self.walk_cell(cell, &BOTH, None, visitor);
    }

    /// Visits both containers of every loaded cell within `radius` of `(x, y)`.
    pub fn visit_all<V: CellVisitor>(&mut self, x: f32, y: f32, radius: f32, visitor: &mut V) {
        self.visit_area(x, y, radius, &BOTH, visitor);
    }

    /// Visits far-visible entities and players within `radius` of `(x, y)`.
    pub fn visit_world<V: CellVisitor>(&mut self, x: f32, y: f32, radius: f32, visitor: &mut V) {
        self.visit_area(x, y, radius, &[ContainerType::World], visitor);
    }

    /// Visits ordinary entities within `radius` of `(x, y)`.
    pub fn visit_grid<V: CellVisitor>(&mut self, x: f32, y: f32, radius: f32, visitor: &mut V) {
        self.visit_area(x, y, radius, &[ContainerType::Grid], visitor);
    }

    fn visit_area<V: CellVisitor>(
        &mut self,
        x: f32,
        y: f32,
        radius: f32,
        containers: &[ContainerType],
        visitor: &mut V,
    ) {
        let center = Position::new(x, y, 0.0);
        let area = CellArea::around(x, y, radius);
        for cell in area.cells() {
            if !self.grids.contains(cell.grid()) {
                continue;
            }
            self.walk_cell(cell, containers, Some((center, radius)), visitor);
        }
    }

    fn walk_cell<V: CellVisitor>(
        &mut self,
        cell: CellCoord,
        containers: &[ContainerType],
        within: Option<(Position, f32)>,
        visitor: &mut V,
    ) {
        let Map { grids, objects, commands, touched, .. } = self;
        let Some(grid) = grids.get(cell.grid()) else {
            return;
        };
        touched.mark(cell);
        let cell = grid.cell(cell);
        for &container in containers {
            for kind in EntityKind::ALL {
                for guid in cell.container(container, kind).iter() {
                    let Some(object) = objects.get(guid) else {
                        continue;
                    };
                    if let Some((center, radius)) = within {
                        if object.position().distance_2d(&center) > radius {
                            continue;
                        }
                    }
                    visitor.visit(object, commands);
                }
            }
        }
    }

    /// Guids within `radius` of `center`, optionally restricted to one container.
    /// Never loads grids.
    pub fn guids_in_radius(&self, center: Position, radius: f32, container: Option<ContainerType>) -> Vec<Guid> {
        let containers: &[ContainerType] = match container {
            Some(ContainerType::Grid) => &[ContainerType::Grid],
            Some(ContainerType::World) => &[ContainerType::World],
            None => &BOTH,
        };
        let mut found = Vec::new();
        for cell in CellArea::around(center.x, center.y, radius).cells() {
            let Some(grid) = self.grids.get(cell.grid()) else {
                continue;
            };
            let cell = grid.cell(cell);
            for &container in containers {
                for kind in EntityKind::ALL {
                    found.extend(cell.container(container, kind).iter().copied().filter(|guid| {
                        self.objects
                            .get(guid)
                            .is_some_and(|object| object.position().distance_2d(&center) <= radius)
                    }));
                }
            }
        }
        found
    }

    /// Entities of `kind` within `radius` of `center`, nearest first.
    pub fn objects_in_range(&self, center: Position, radius: f32, kind: EntityKind) -> Vec<Guid> {
        let mut found: Vec<(f32, Guid)> = self
            .guids_in_radius(center, radius, None)
            .into_iter()
            .filter_map(|guid| self.objects.get(&guid))
            .filter(|object| object.kind() == kind && object.position().distance(&center) <= radius)
            .map(|object| (object.position().distance(&center), object.guid()))
            .collect();
        found.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        found.into_iter().map(|(_, guid)| guid).collect()
    }

    /// Nearest entity of `kind` within `radius` of `center` that satisfies `predicate`.
    pub fn find_nearest(
        &self,
        center: Position,
        radius: f32,
        kind: EntityKind,
        predicate: impl Fn(&WorldObject) -> bool,
    ) -> Option<Guid> {
        self.objects_in_range(center, radius, kind)
            .into_iter()
            .find(|guid| self.objects.get(guid).is_some_and(&predicate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::presets;
    use crate::grid::compute_cell_coord;
    use crate::persistence::InMemorySpawnStore;
    use crate::services::{NullPacketSink, WorldServices};
    use crate::types::MapKey;
    use std::sync::Arc;

    fn map_with_creatures(positions: &[(f32, f32)]) -> (Map, Vec<Guid>) {
        let services = WorldServices::new(
            Arc::new(InMemorySpawnStore::new()),
            Arc::new(NullPacketSink),
            presets::testing(),
        );
        let mut map = Map::new(MapKey::continent(0), services);
        let guids = positions
            .iter()
            .map(|&(x, y)| {
                let guid = map.generate_guid(EntityKind::Creature, 1);
                map.add_to_map(WorldObject::creature(guid, Position::new(x, y, 0.0), None))
                    .expect("added")
            })
            .collect();
        (map, guids)
    }

    #[test]
    fn removal_requested_during_visit_is_deferred() {
        let (mut map, guids) = map_with_creatures(&[(1.0, 1.0), (2.0, 2.0), (3.0, 3.0)]);
        let cell = compute_cell_coord(1.0, 1.0);
        let mut visited = 0;
        map.visit_cell(cell, false, &mut |object: &WorldObject, commands: &mut MapCommands| {
            visited += 1;
            commands.remove(object.guid());
        });
        assert_eq!(visited, 3);
        assert!(guids.iter().all(|guid| map.contains(*guid)));

        map.remove_all_objects_in_remove_list();
        assert!(guids.iter().all(|guid| !map.contains(*guid)));
    }

    #[test]
    fn area_visits_filter_by_radius_and_mark_cells() {
        let (mut map, _) = map_with_creatures(&[(0.0, 0.0), (30.0, 0.0), (200.0, 0.0)]);
        let mut seen = Vec::new();
        map.visit_all(0.0, 0.0, 50.0, &mut |object: &WorldObject, _: &mut MapCommands| {
            seen.push(object.position().x);
        });
        seen.sort_by(f32::total_cmp);
        assert_eq!(seen, vec![0.0, 30.0]);
        assert!(map.is_cell_touched(compute_cell_coord(0.0, 0.0)));
        assert!(!map.is_cell_touched(compute_cell_coord(200.0, 0.0)));
    }

    #[test]
    fn area_visits_never_load_grids() {
        let (mut map, _) = map_with_creatures(&[(0.0, 0.0)]);
        let before = map.loaded_grids().len();
        map.visit_all(0.0, 0.0, 900.0, &mut |_: &WorldObject, _: &mut MapCommands| {});
        assert_eq!(map.loaded_grids().len(), before);
    }

    #[test]
    fn container_specific_visits() {
        let (mut map, guids) = map_with_creatures(&[(0.0, 0.0), (5.0, 0.0)]);
        map.set_far_visible(guids[1], true).expect("resident");
        map.remove_all_objects_in_remove_list();

        let mut world = Vec::new();
        map.visit_world(0.0, 0.0, 20.0, &mut |object: &WorldObject, _: &mut MapCommands| world.push(object.guid()));
        assert_eq!(world, vec![guids[1]]);

        let mut grid = Vec::new();
        map.visit_grid(0.0, 0.0, 20.0, &mut |object: &WorldObject, _: &mut MapCommands| grid.push(object.guid()));
        assert_eq!(grid, vec![guids[0]]);
    }

    #[test]
    fn nearest_respects_predicate() {
        let (mut map, guids) = map_with_creatures(&[(10.0, 0.0), (20.0, 0.0), (40.0, 0.0)]);
        map.with_object_mut(guids[0], |object| object.set_death_state(crate::object::DeathState::Dead))
            .expect("resident");
        let center = Position::new(0.0, 0.0, 0.0);
        assert_eq!(map.objects_in_range(center, 30.0, EntityKind::Creature), vec![guids[0], guids[1]]);
        assert_eq!(map.find_nearest(center, 50.0, EntityKind::Creature, WorldObject::is_alive), Some(guids[1]));
        assert_eq!(map.find_nearest(center, 50.0, EntityKind::Player, |_| true), None);
    }
}
