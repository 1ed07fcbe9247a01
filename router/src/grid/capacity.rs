use super::direction::Direction;

/// Edge between two adjacent tiles of one routing level. A horizontal edge
/// joins `(x, y)` and `(x + 1, y)`; a vertical one joins `(x, y)` and
/// `(x, y + 1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge {
    pub layer: usize,
    pub direction: Direction,
    pub x: usize,
    pub y: usize,
}

impl Edge {
    pub fn new(layer: usize, direction: Direction, x: usize, y: usize) -> Self {
        Self {
            layer,
            direction,
            x,
            y,
        }
    }

    pub fn horizontal(layer: usize, x: usize, y: usize) -> Self {
        Self::new(layer, Direction::Horizontal, x, y)
    }

    pub fn vertical(layer: usize, x: usize, y: usize) -> Self {
        Self::new(layer, Direction::Vertical, x, y)
    }

    /// Tile on the far side of the edge.
    pub fn far_tile(&self) -> (usize, usize) {
        match self.direction {
            Direction::Horizontal => (self.x + 1, self.y),
            Direction::Vertical => (self.x, self.y + 1),
        }
    }
}

/// Every edge of one level and direction on an `x_grids` by `y_grids`
/// tiling, row by row.
pub fn edges_of(
    x_grids: usize,
    y_grids: usize,
    layer: usize,
    direction: Direction,
) -> impl Iterator<Item = Edge> {
    let (w, h) = match direction {
        Direction::Horizontal => (x_grids.saturating_sub(1), y_grids),
        Direction::Vertical => (x_grids, y_grids.saturating_sub(1)),
    };
    (0..h).flat_map(move |y| (0..w).map(move |x| Edge::new(layer, direction, x, y)))
}

/// Per-edge track counts for every routing level, stored as two flat
/// arrays per level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdgeCapacities {
    x_grids: usize,
    y_grids: usize,
    num_layers: usize,
    horizontal: Vec<u32>,
    vertical: Vec<u32>,
}

impl EdgeCapacities {
    pub fn new(x_grids: usize, y_grids: usize, num_layers: usize) -> Self {
        let h_len = x_grids.saturating_sub(1) * y_grids;
        let v_len = x_grids * y_grids.saturating_sub(1);
        Self {
            x_grids,
            y_grids,
            num_layers,
            horizontal: vec![0; h_len * num_layers],
            vertical: vec![0; v_len * num_layers],
        }
    }

    pub fn x_grids(&self) -> usize {
        self.x_grids
    }
    pub fn y_grids(&self) -> usize {
        self.y_grids
    }
    pub fn num_layers(&self) -> usize {
        self.num_layers
    }

    /// Number of edges of one direction along x and y.
    pub fn extent(&self, direction: Direction) -> (usize, usize) {
        match direction {
            Direction::Horizontal => (self.x_grids.saturating_sub(1), self.y_grids),
            Direction::Vertical => (self.x_grids, self.y_grids.saturating_sub(1)),
        }
    }

    pub fn contains(&self, edge: Edge) -> bool {
        let (w, h) = self.extent(edge.direction);
        edge.layer >= 1 && edge.layer <= self.num_layers && edge.x < w && edge.y < h
    }

    #[inline]
    fn slot(&self, edge: Edge) -> Option<usize> {
        if !self.contains(edge) {
            return None;
        }
        let (w, h) = self.extent(edge.direction);
        Some((edge.layer - 1) * w * h + edge.y * w + edge.x)
    }

    pub fn get(&self, edge: Edge) -> u32 {
        match (self.slot(edge), edge.direction) {
            (Some(i), Direction::Horizontal) => self.horizontal[i],
            (Some(i), Direction::Vertical) => self.vertical[i],
            (None, _) => 0,
        }
    }

    pub fn set(&mut self, edge: Edge, value: u32) {
        match (self.slot(edge), edge.direction) {
            (Some(i), Direction::Horizontal) => self.horizontal[i] = value,
            (Some(i), Direction::Vertical) => self.vertical[i] = value,
            (None, _) => {}
        }
    }

    /// Lowers an edge to `value`; a larger value leaves it untouched.
    pub fn reduce(&mut self, edge: Edge, value: u32) {
        let current = self.get(edge);
        if value < current {
            self.set(edge, value);
        }
    }

    /// Every edge of one level and direction, row by row.
    pub fn edges(
        &self,
        layer: usize,
        direction: Direction,
    ) -> impl Iterator<Item = Edge> + use<> {
        edges_of(self.x_grids, self.y_grids, layer, direction)
    }

    /// Sets every edge of one level and direction.
    pub fn fill(&mut self, layer: usize, direction: Direction, value: u32) {
        for edge in self.edges(layer, direction) {
            self.set(edge, value);
        }
    }

    pub fn total(&self) -> u64 {
        self.horizontal
            .iter()
            .chain(self.vertical.iter())
            .map(|&c| c as u64)
            .sum()
    }
}
