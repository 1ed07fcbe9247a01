use groute_common::db::indices::NetId;
use groute_common::geom::point::Point;
use std::collections::{BTreeMap, HashMap};

/// Straight piece of a global route in database units. Same layers at
/// both ends make a wire; different layers at the same x/y make a via.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GSegment {
    pub init_x: i64,
    pub init_y: i64,
    pub init_layer: usize,
    pub final_x: i64,
    pub final_y: i64,
    pub final_layer: usize,
}

pub type GRoute = Vec<GSegment>;
pub type NetRouteMap = BTreeMap<NetId, GRoute>;

impl GSegment {
    pub fn new(
        init_x: i64,
        init_y: i64,
        init_layer: usize,
        final_x: i64,
        final_y: i64,
        final_layer: usize,
    ) -> Self {
        Self {
            init_x,
            init_y,
            init_layer,
            final_x,
            final_y,
            final_layer,
        }
    }

    pub fn wire(a: Point<i64>, b: Point<i64>, layer: usize) -> Self {
        Self::new(a.x, a.y, layer, b.x, b.y, layer)
    }

    pub fn via(at: Point<i64>, from: usize, to: usize) -> Self {
        Self::new(at.x, at.y, from, at.x, at.y, to)
    }

    pub fn is_via(&self) -> bool {
        self.init_layer != self.final_layer
    }

    pub fn is_wire(&self) -> bool {
        self.init_layer == self.final_layer
    }

    pub fn init_point(&self) -> Point<i64> {
        Point::new(self.init_x, self.init_y)
    }

    pub fn final_point(&self) -> Point<i64> {
        Point::new(self.final_x, self.final_y)
    }

    pub fn lo(&self) -> Point<i64> {
        Point::new(self.init_x.min(self.final_x), self.init_y.min(self.final_y))
    }

    pub fn hi(&self) -> Point<i64> {
        Point::new(self.init_x.max(self.final_x), self.init_y.max(self.final_y))
    }

    pub fn min_layer(&self) -> usize {
        self.init_layer.min(self.final_layer)
    }

    pub fn max_layer(&self) -> usize {
        self.init_layer.max(self.final_layer)
    }

    pub fn length(&self) -> i64 {
        (self.init_x - self.final_x).abs() + (self.init_y - self.final_y).abs()
    }

    pub fn is_zero_length(&self) -> bool {
        self.init_x == self.final_x && self.init_y == self.final_y
    }

    pub fn is_diagonal(&self) -> bool {
        self.init_x != self.final_x && self.init_y != self.final_y
    }

    /// True when `p` lies on the wire (inclusive of its ends).
    pub fn touches(&self, p: Point<i64>) -> bool {
        let (lo, hi) = (self.lo(), self.hi());
        p.x >= lo.x && p.x <= hi.x && p.y >= lo.y && p.y <= hi.y
    }
}

type RoutePt = (i64, i64, usize);

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

fn collinear(a: &GSegment, b: &GSegment) -> bool {
    let (alo, ahi, blo, bhi) = (a.lo(), a.hi(), b.lo(), b.hi());
    (alo.x == ahi.x && blo.x == bhi.x && alo.x == blo.x)
        || (alo.y == ahi.y && blo.y == bhi.y && alo.y == blo.y)
}

/// Joins same-layer collinear wires that meet at a point touched by
/// exactly those two segments. Branch points and via landings are kept.
/// Merged wires run low to high; everything else keeps its order.
pub fn merge_segments(route: &GRoute) -> GRoute {
    if route.len() < 2 {
        return route.clone();
    }

    let mut at_point: HashMap<RoutePt, Vec<usize>> = HashMap::new();
    for (i, seg) in route.iter().enumerate() {
        at_point
            .entry((seg.init_x, seg.init_y, seg.init_layer))
            .or_default()
            .push(i);
        at_point
            .entry((seg.final_x, seg.final_y, seg.final_layer))
            .or_default()
            .push(i);
    }

    let mut parent: Vec<usize> = (0..route.len()).collect();
    for (&(x, y, _), segs) in &at_point {
        let &[i, j] = segs.as_slice() else {
            continue;
        };
        let (a, b) = (&route[i], &route[j]);
        if i == j || !a.is_wire() || !b.is_wire() || a.init_layer != b.init_layer {
            continue;
        }
        if a.is_zero_length() || b.is_zero_length() || !collinear(a, b) {
            continue;
        }
        let p = Point::new(x, y);
        if (a.hi() == p && b.lo() == p) || (a.lo() == p && b.hi() == p) {
            let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
            if ri != rj {
                parent[ri.max(rj)] = ri.min(rj);
            }
        }
    }

    let mut merged: Vec<Option<GSegment>> = vec![None; route.len()];
    let mut order = Vec::with_capacity(route.len());
    for (i, seg) in route.iter().enumerate() {
        let root = find(&mut parent, i);
        match merged[root] {
            None => {
                merged[root] = Some(*seg);
                order.push(root);
            }
            Some(current) => {
                let lo = Point::new(current.lo().x.min(seg.lo().x), current.lo().y.min(seg.lo().y));
                let hi = Point::new(current.hi().x.max(seg.hi().x), current.hi().y.max(seg.hi().y));
                merged[root] = Some(GSegment::wire(lo, hi, seg.init_layer));
            }
        }
    }

    order.into_iter().filter_map(|root| merged[root]).collect()
}

/// Routed length of one net: `|dx| + |dy|` per segment, plus half a tile
/// in each direction for every segment of nonzero length.
pub fn route_wirelength(route: &GRoute, tile_width: i64, tile_height: i64) -> i64 {
    route
        .iter()
        .map(|seg| {
            let len = seg.length();
            if len > 0 {
                len + (tile_width + tile_height) / 2
            } else {
                0
            }
        })
        .sum()
}
