use crate::grid::RoutingGrid;
use groute_common::geom::coord::GridCoord;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Copy, Clone, Eq, PartialEq)]
struct State {
    f_score: i64,
    g_score: i64,
    index: u32,
}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f_score
            .cmp(&self.f_score)
            .then_with(|| self.g_score.cmp(&other.g_score))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Step costs in units of one preferred-direction tile step.
#[derive(Clone, Copy, Debug)]
pub struct SearchCosts {
    pub via: f64,
    pub wrong_direction: f64,
    pub heuristic_weight: f64,
}

impl Default for SearchCosts {
    fn default() -> Self {
        Self {
            via: 10.0,
            wrong_direction: 25.0,
            heuristic_weight: 1.0,
        }
    }
}

#[derive(Clone, Copy)]
struct RoutingWindow {
    min_x: u32,
    max_x: u32,
    min_y: u32,
    max_y: u32,
    width: u32,
    height: u32,
    layers: u8,
}

impl RoutingWindow {
    fn new(
        starts: &[(GridCoord, f64)],
        end: GridCoord,
        margin: Option<u32>,
        grid_w: u32,
        grid_h: u32,
        layers: u8,
    ) -> Self {
        let (min_x, max_x, min_y, max_y) = match margin {
            None => (0, grid_w - 1, 0, grid_h - 1),
            Some(margin) => {
                let mut min_x = end.x;
                let mut max_x = end.x;
                let mut min_y = end.y;
                let mut max_y = end.y;
                for (s, _) in starts {
                    min_x = min_x.min(s.x);
                    max_x = max_x.max(s.x);
                    min_y = min_y.min(s.y);
                    max_y = max_y.max(s.y);
                }
                (
                    min_x.saturating_sub(margin),
                    (max_x + margin).min(grid_w - 1),
                    min_y.saturating_sub(margin),
                    (max_y + margin).min(grid_h - 1),
                )
            }
        };
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
            layers,
        }
    }
    #[inline(always)]
    fn contains(&self, c: GridCoord) -> bool {
        c.x >= self.min_x
            && c.x <= self.max_x
            && c.y >= self.min_y
            && c.y <= self.max_y
            && c.z < self.layers
    }
    #[inline(always)]
    fn get_local_idx(&self, c: GridCoord) -> usize {
        let lx = c.x - self.min_x;
        let ly = c.y - self.min_y;
        let lz = c.z as u32;
        (lz * self.width * self.height + ly * self.width + lx) as usize
    }
    #[inline(always)]
    fn get_coord(&self, idx: u32) -> GridCoord {
        let plane_size = self.width * self.height;
        let z = (idx / plane_size) as u8;
        let rem = idx % plane_size;
        let y = rem / self.width + self.min_y;
        let x = rem % self.width + self.min_x;
        GridCoord::new(x, y, z)
    }
}

/// Reusable A* workspace. Buffers grow to the largest window seen and are
/// invalidated by tag instead of being cleared.
#[derive(Clone)]
pub struct AStar {
    parents: Vec<u32>,
    g_score: Vec<i64>,
    visited_tag: Vec<u32>,
    current_tag: u32,
    capacity: usize,
}

impl Default for AStar {
    fn default() -> Self {
        Self::new()
    }
}

impl AStar {
    pub fn new() -> Self {
        let cap = 100_000;
        Self {
            parents: vec![u32::MAX; cap],
            g_score: vec![i64::MAX; cap],
            visited_tag: vec![0; cap],
            current_tag: 1,
            capacity: cap,
        }
    }
    fn ensure_capacity(&mut self, size: usize) {
        if size > self.capacity {
            self.capacity = size.max(self.capacity * 2);
            self.parents.resize(self.capacity, u32::MAX);
            self.g_score.resize(self.capacity, i64::MAX);
            self.visited_tag.resize(self.capacity, 0);
        }
    }
    fn reset_window(&mut self) {
        self.current_tag += 1;
        if self.current_tag == 0 {
            self.visited_tag.fill(0);
            self.current_tag = 1;
        }
    }

    /// Cheapest path from any of `starts` to `end`. Each start carries the
    /// cost already paid to reach it. `margin` bounds the search window
    /// around the terminals; `None` searches the whole grid.
    #[allow(clippy::too_many_arguments)]
    pub fn find_path<G: RoutingGrid + ?Sized>(
        &mut self,
        grid: &G,
        starts: &[(GridCoord, f64)],
        end: GridCoord,
        costs: &SearchCosts,
        layer_costs: &[f64],
        margin: Option<u32>,
        max_expansions: u32,
    ) -> Option<Vec<GridCoord>> {
        if starts.is_empty() || grid.width() == 0 || grid.height() == 0 {
            return None;
        }

        let window = RoutingWindow::new(
            starts,
            end,
            margin,
            grid.width(),
            grid.height(),
            grid.layers(),
        );
        if !window.contains(end) {
            return None;
        }
        self.ensure_capacity((window.width * window.height * window.layers as u32) as usize);
        self.reset_window();

        let mut heap = BinaryHeap::new();
        let scale = 100.0;

        for &(start, initial) in starts {
            if !window.contains(start) {
                continue;
            }
            let start_local = window.get_local_idx(start);
            let g = (initial * scale) as i64;
            if self.visited_tag[start_local] == self.current_tag && self.g_score[start_local] <= g
            {
                continue;
            }
            self.g_score[start_local] = g;
            self.visited_tag[start_local] = self.current_tag;
            self.parents[start_local] = u32::MAX;
            let h = Self::heuristic(start, end, costs.heuristic_weight);
            heap.push(State {
                f_score: g + (h * scale) as i64,
                g_score: g,
                index: start_local as u32,
            });
        }

        let via_cost = costs.via * scale;
        let wrong_dir_cost = costs.wrong_direction * scale;
        let base_move_cost = scale;
        let mut expansions = 0;

        while let Some(State { g_score, index, .. }) = heap.pop() {
            let curr_local = index as usize;
            if g_score > self.g_score[curr_local] {
                continue;
            }
            let position = window.get_coord(index);
            if position == end {
                return Some(self.reconstruct_path(end, &window));
            }

            expansions += 1;
            if expansions > max_expansions {
                return None;
            }

            let mut neighbors = [GridCoord { x: 0, y: 0, z: 0 }; 6];
            let mut n_count = 0;
            if position.x > window.min_x {
                neighbors[n_count] = GridCoord::new(position.x - 1, position.y, position.z);
                n_count += 1;
            }
            if position.x < window.max_x {
                neighbors[n_count] = GridCoord::new(position.x + 1, position.y, position.z);
                n_count += 1;
            }
            if position.y > window.min_y {
                neighbors[n_count] = GridCoord::new(position.x, position.y - 1, position.z);
                n_count += 1;
            }
            if position.y < window.max_y {
                neighbors[n_count] = GridCoord::new(position.x, position.y + 1, position.z);
                n_count += 1;
            }
            if position.z > 0 {
                neighbors[n_count] = GridCoord::new(position.x, position.y, position.z - 1);
                n_count += 1;
            }
            if position.z + 1 < window.layers {
                neighbors[n_count] = GridCoord::new(position.x, position.y, position.z + 1);
                n_count += 1;
            }

            for &neighbor in &neighbors[..n_count] {
                let step_cost = if position.z != neighbor.z {
                    via_cost
                } else {
                    let horizontal_move = position.y == neighbor.y;
                    let preferred = grid.direction(position.z).is_horizontal() == horizontal_move;
                    let move_cost = if preferred {
                        base_move_cost
                    } else {
                        wrong_dir_cost
                    };
                    let layer_cost = layer_costs.get(position.z as usize).copied().unwrap_or(0.0);
                    move_cost
                        + (grid.get_cost(position, neighbor) - 1.0) * scale
                        + layer_cost * scale
                };

                let tentative_g = g_score + step_cost as i64;
                let neighbor_local = window.get_local_idx(neighbor);

                if self.visited_tag[neighbor_local] != self.current_tag
                    || tentative_g < self.g_score[neighbor_local]
                {
                    self.parents[neighbor_local] = curr_local as u32;
                    self.g_score[neighbor_local] = tentative_g;
                    self.visited_tag[neighbor_local] = self.current_tag;
                    let h = Self::heuristic(neighbor, end, costs.heuristic_weight);
                    heap.push(State {
                        f_score: tentative_g + (h * scale) as i64,
                        g_score: tentative_g,
                        index: neighbor_local as u32,
                    });
                }
            }
        }
        None
    }

    #[inline(always)]
    fn heuristic(a: GridCoord, end: GridCoord, weight: f64) -> f64 {
        (a.planar_distance(&end) as f64 + (a.z as i32 - end.z as i32).abs() as f64 * 5.0) * weight
    }

    fn reconstruct_path(&self, end: GridCoord, window: &RoutingWindow) -> Vec<GridCoord> {
        let mut path = Vec::new();
        let mut curr_local = window.get_local_idx(end);
        loop {
            path.push(window.get_coord(curr_local as u32));
            let parent = self.parents[curr_local];
            if parent == u32::MAX {
                break;
            }
            curr_local = parent as usize;
        }
        path.reverse();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Direction, EdgeCapacities, EdgeGrid};

    fn two_layer_grid() -> EdgeGrid {
        let mut caps = EdgeCapacities::new(10, 10, 2);
        caps.fill(1, Direction::Horizontal, 4);
        caps.fill(2, Direction::Vertical, 4);
        EdgeGrid::from_capacities(&caps, vec![Direction::Horizontal, Direction::Vertical])
    }

    #[test]
    fn straight_run_stays_on_its_layer() {
        let grid = two_layer_grid();
        let mut astar = AStar::new();
        let path = astar
            .find_path(
                &grid,
                &[(GridCoord::new(1, 3, 0), 0.0)],
                GridCoord::new(7, 3, 0),
                &SearchCosts::default(),
                &[],
                Some(2),
                10_000,
            )
            .unwrap();
        assert_eq!(path.len(), 7);
        assert!(path.iter().all(|c| c.y == 3 && c.z == 0));
    }

    #[test]
    fn bends_use_the_vertical_layer() {
        let grid = two_layer_grid();
        let mut astar = AStar::new();
        let path = astar
            .find_path(
                &grid,
                &[(GridCoord::new(0, 0, 0), 0.0)],
                GridCoord::new(5, 6, 0),
                &SearchCosts::default(),
                &[],
                None,
                100_000,
            )
            .unwrap();
        assert_eq!(path.first(), Some(&GridCoord::new(0, 0, 0)));
        assert_eq!(path.last(), Some(&GridCoord::new(5, 6, 0)));
        for pair in path.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if a.z == b.z && a.x == b.x {
                assert_eq!(a.z, 1, "vertical move on the horizontal layer");
            }
        }
    }

    #[test]
    fn cheaper_start_wins() {
        let grid = two_layer_grid();
        let mut astar = AStar::new();
        let starts = [(GridCoord::new(0, 5, 0), 0.0), (GridCoord::new(9, 5, 0), 50.0)];
        let path = astar
            .find_path(
                &grid,
                &starts,
                GridCoord::new(6, 5, 0),
                &SearchCosts::default(),
                &[],
                None,
                100_000,
            )
            .unwrap();
        assert_eq!(path[0], GridCoord::new(0, 5, 0));
    }
}
