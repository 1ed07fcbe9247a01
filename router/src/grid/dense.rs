use super::capacity::{Edge, EdgeCapacities};
use super::direction::Direction;
use super::RoutingGrid;
use groute_common::geom::coord::GridCoord;

// 16 bytes per unit edge.
#[derive(Clone, Copy, Debug)]
struct EdgeNode {
    capacity: u32,
    usage: u32,
    history: f32,
    cost_cache: f32, // Pre-calculated cost for A*
}

impl Default for EdgeNode {
    fn default() -> Self {
        Self {
            capacity: 0,
            usage: 0,
            history: 0.0,
            cost_cache: 1.0,
        }
    }
}

impl EdgeNode {
    #[inline(always)]
    fn refresh(&mut self, penalty: f32) {
        let congestion = if self.usage >= self.capacity {
            (self.usage - self.capacity + 1) as f32 * penalty
        } else {
            0.0
        };
        self.cost_cache = 1.0 + self.history + congestion;
    }

    fn overflow(&self) -> u32 {
        self.usage.saturating_sub(self.capacity)
    }
}

/// Dense per-edge state (capacity, usage, history, cached cost) of every
/// unit edge in the tile graph. Horizontal and vertical edges live in
/// separate flat arrays, one plane per layer.
pub struct EdgeGrid {
    width: u32,
    height: u32,
    layers: u8,
    directions: Vec<Direction>,
    h_nodes: Vec<EdgeNode>,
    v_nodes: Vec<EdgeNode>,
    current_penalty: f32,
}

impl EdgeGrid {
    pub fn new(width: u32, height: u32, directions: Vec<Direction>) -> Self {
        let layers = directions.len();
        let h_len = width.saturating_sub(1) as usize * height as usize * layers;
        let v_len = width as usize * height.saturating_sub(1) as usize * layers;

        if h_len + v_len > 2_000_000_000 {
            log::warn!(
                "Allocating large EdgeGrid: {} edges. Ensure sufficient RAM.",
                h_len + v_len
            );
        }

        Self {
            width,
            height,
            layers: layers as u8,
            directions,
            h_nodes: vec![EdgeNode::default(); h_len],
            v_nodes: vec![EdgeNode::default(); v_len],
            current_penalty: 1.0,
        }
    }

    pub fn from_capacities(caps: &EdgeCapacities, directions: Vec<Direction>) -> Self {
        let mut grid = Self::new(caps.x_grids() as u32, caps.y_grids() as u32, directions);
        for layer in 1..=grid.layers as usize {
            for dir in [Direction::Horizontal, Direction::Vertical] {
                for edge in caps.edges(layer, dir) {
                    grid.set_edge_capacity(edge, caps.get(edge));
                }
            }
        }
        grid
    }

    #[inline(always)]
    fn plane(&self, direction: Direction) -> (usize, usize) {
        match direction {
            Direction::Horizontal => {
                (self.width.saturating_sub(1) as usize, self.height as usize)
            }
            Direction::Vertical => (self.width as usize, self.height.saturating_sub(1) as usize),
        }
    }

    #[inline(always)]
    fn edge_slot(&self, edge: Edge) -> Option<usize> {
        let (w, h) = self.plane(edge.direction);
        if edge.layer == 0 || edge.layer > self.layers as usize || edge.x >= w || edge.y >= h {
            return None;
        }
        Some((edge.layer - 1) * w * h + edge.y * w + edge.x)
    }

    /// Edge between two planar neighbours on the same layer.
    #[inline(always)]
    fn edge_between(a: GridCoord, b: GridCoord) -> Option<Edge> {
        if a.z != b.z {
            return None;
        }
        let layer = a.z as usize + 1;
        if a.y == b.y && a.x.abs_diff(b.x) == 1 {
            Some(Edge::horizontal(layer, a.x.min(b.x) as usize, a.y as usize))
        } else if a.x == b.x && a.y.abs_diff(b.y) == 1 {
            Some(Edge::vertical(layer, a.x as usize, a.y.min(b.y) as usize))
        } else {
            None
        }
    }

    fn node(&self, edge: Edge) -> Option<&EdgeNode> {
        let slot = self.edge_slot(edge)?;
        match edge.direction {
            Direction::Horizontal => self.h_nodes.get(slot),
            Direction::Vertical => self.v_nodes.get(slot),
        }
    }

    fn node_mut(&mut self, edge: Edge) -> Option<&mut EdgeNode> {
        let slot = self.edge_slot(edge)?;
        match edge.direction {
            Direction::Horizontal => self.h_nodes.get_mut(slot),
            Direction::Vertical => self.v_nodes.get_mut(slot),
        }
    }

    pub fn edge_capacity(&self, edge: Edge) -> u32 {
        self.node(edge).map_or(0, |n| n.capacity)
    }

    pub fn edge_usage(&self, edge: Edge) -> u32 {
        self.node(edge).map_or(0, |n| n.usage)
    }

    pub fn set_edge_capacity(&mut self, edge: Edge, capacity: u32) {
        let penalty = self.current_penalty;
        if let Some(node) = self.node_mut(edge) {
            node.capacity = capacity;
            node.refresh(penalty);
        }
    }

    pub fn set_edge_usage(&mut self, edge: Edge, usage: u32) {
        let penalty = self.current_penalty;
        if let Some(node) = self.node_mut(edge) {
            node.usage = usage;
            node.refresh(penalty);
        }
    }

    /// Summed usage and capacity of a tile-pair edge over all layers.
    pub fn planar_totals(&self, direction: Direction, x: usize, y: usize) -> (u32, u32) {
        (1..=self.layers as usize)
            .filter_map(|layer| self.node(Edge::new(layer, direction, x, y)))
            .fold((0, 0), |(u, c), n| (u + n.usage, c + n.capacity))
    }

    /// Drops all usage and history, keeping capacities.
    pub fn clear_usage(&mut self) {
        let penalty = self.current_penalty;
        for node in self.h_nodes.iter_mut().chain(self.v_nodes.iter_mut()) {
            node.usage = 0;
            node.history = 0.0;
            node.refresh(penalty);
        }
    }

    pub fn num_overflowed_edges(&self) -> usize {
        self.h_nodes
            .iter()
            .chain(self.v_nodes.iter())
            .filter(|n| n.usage > n.capacity)
            .count()
    }
}

impl RoutingGrid for EdgeGrid {
    fn width(&self) -> u32 {
        self.width
    }
    fn height(&self) -> u32 {
        self.height
    }
    fn layers(&self) -> u8 {
        self.layers
    }

    fn direction(&self, z: u8) -> Direction {
        self.directions
            .get(z as usize)
            .copied()
            .unwrap_or(Direction::Horizontal)
    }

    fn add_wire(&mut self, a: GridCoord, b: GridCoord) {
        let penalty = self.current_penalty;
        if let Some(node) = Self::edge_between(a, b).and_then(|e| self.node_mut(e)) {
            node.usage += 1;
            node.refresh(penalty);
        }
    }

    fn remove_wire(&mut self, a: GridCoord, b: GridCoord) {
        let penalty = self.current_penalty;
        if let Some(node) = Self::edge_between(a, b).and_then(|e| self.node_mut(e)) {
            node.usage = node.usage.saturating_sub(1);
            node.refresh(penalty);
        }
    }

    #[inline(always)]
    fn get_cost(&self, a: GridCoord, b: GridCoord) -> f64 {
        Self::edge_between(a, b)
            .and_then(|e| self.node(e))
            .map_or(1.0, |n| n.cost_cache as f64)
    }

    fn update_history(&mut self, history_increment: f64) {
        let penalty = self.current_penalty;
        for node in self.h_nodes.iter_mut().chain(self.v_nodes.iter_mut()) {
            let overflow = node.overflow();
            if overflow > 0 {
                node.history += overflow as f32 * history_increment as f32;
                node.refresh(penalty);
            }
        }
    }

    fn is_congested(&self, a: GridCoord, b: GridCoord) -> bool {
        Self::edge_between(a, b)
            .and_then(|e| self.node(e))
            .is_some_and(|n| n.usage > n.capacity)
    }

    fn total_overflow(&self) -> u64 {
        self.h_nodes
            .iter()
            .chain(self.v_nodes.iter())
            .map(|n| n.overflow() as u64)
            .sum()
    }

    fn capacity(&self, a: GridCoord, b: GridCoord) -> u32 {
        Self::edge_between(a, b).map_or(0, |e| self.edge_capacity(e))
    }

    fn set_penalty(&mut self, penalty: f64) {
        self.current_penalty = penalty as f32;
        let penalty = self.current_penalty;
        for node in self.h_nodes.iter_mut().chain(self.v_nodes.iter_mut()) {
            node.refresh(penalty);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> EdgeGrid {
        let mut caps = EdgeCapacities::new(4, 3, 2);
        caps.fill(1, Direction::Horizontal, 2);
        caps.fill(2, Direction::Vertical, 1);
        EdgeGrid::from_capacities(&caps, vec![Direction::Horizontal, Direction::Vertical])
    }

    #[test]
    fn wires_update_usage_in_both_orders() {
        let mut g = grid();
        let a = GridCoord::new(1, 1, 0);
        let b = GridCoord::new(2, 1, 0);
        g.add_wire(a, b);
        g.add_wire(b, a);
        assert_eq!(g.edge_usage(Edge::horizontal(1, 1, 1)), 2);
        assert!(!g.is_congested(a, b));
        g.add_wire(a, b);
        assert!(g.is_congested(a, b));
        assert_eq!(g.total_overflow(), 1);
        g.remove_wire(a, b);
        assert_eq!(g.total_overflow(), 0);
    }

    #[test]
    fn cost_grows_with_overflow_and_history() {
        let mut g = grid();
        let a = GridCoord::new(0, 0, 1);
        let b = GridCoord::new(0, 1, 1);
        assert_eq!(g.get_cost(a, b), 1.0);
        g.add_wire(a, b);
        // Full edge: one unit of penalty.
        assert_eq!(g.get_cost(a, b), 2.0);
        g.add_wire(a, b);
        g.set_penalty(4.0);
        assert_eq!(g.get_cost(a, b), 9.0);
        g.update_history(0.5);
        assert_eq!(g.get_cost(a, b), 9.5);
    }

    #[test]
    fn planar_totals_sum_layers() {
        let mut g = grid();
        g.set_edge_capacity(Edge::horizontal(2, 0, 0), 3);
        g.add_wire(GridCoord::new(0, 0, 0), GridCoord::new(1, 0, 0));
        assert_eq!(g.planar_totals(Direction::Horizontal, 0, 0), (1, 5));
        g.clear_usage();
        assert_eq!(g.planar_totals(Direction::Horizontal, 0, 0), (0, 5));
    }

    #[test]
    fn vias_and_far_moves_touch_no_edge() {
        let mut g = grid();
        g.add_wire(GridCoord::new(0, 0, 0), GridCoord::new(0, 0, 1));
        g.add_wire(GridCoord::new(0, 0, 0), GridCoord::new(2, 0, 0));
        assert_eq!(g.num_overflowed_edges(), 0);
        assert_eq!(g.planar_totals(Direction::Horizontal, 0, 0).0, 0);
    }
}
