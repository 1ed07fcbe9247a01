use groute_common::geom::coord::GridCoord;
use priority_queue::PriorityQueue;
use std::cmp::Reverse;

const KEY_SCALE: f64 = 1000.0;

fn distance(a: GridCoord, b: GridCoord) -> u32 {
    a.planar_distance(&b) + (a.z as i32 - b.z as i32).unsigned_abs()
}

/// Prim-Dijkstra spanning order over the pins of one net, rooted at pin 0.
///
/// A pin joins through the tree node minimising
/// `alpha * pathlen(node) + dist(node, pin)`: `alpha = 0` gives a minimum
/// spanning tree, `alpha = 1` a shortest-path tree. Returns `(pin, parent)`
/// pairs in insertion order, root excluded.
pub fn prim_dijkstra_order(pins: &[GridCoord], alpha: f64) -> Vec<(usize, usize)> {
    let n = pins.len();
    if n < 2 {
        return Vec::new();
    }

    let mut in_tree = vec![false; n];
    let mut path_len = vec![0u32; n];
    let mut parent = vec![0usize; n];
    let mut queue: PriorityQueue<usize, Reverse<i64>> = PriorityQueue::with_capacity(n);

    in_tree[0] = true;
    for v in 1..n {
        let key = distance(pins[0], pins[v]) as f64;
        queue.push(v, Reverse((key * KEY_SCALE) as i64));
    }

    let mut order = Vec::with_capacity(n - 1);
    while let Some((u, _)) = queue.pop() {
        in_tree[u] = true;
        path_len[u] = path_len[parent[u]] + distance(pins[parent[u]], pins[u]);
        order.push((u, parent[u]));

        for v in 0..n {
            if in_tree[v] {
                continue;
            }
            let key = alpha * path_len[u] as f64 + distance(pins[u], pins[v]) as f64;
            let key = Reverse((key * KEY_SCALE) as i64);
            if let Some(current) = queue.get_priority(&v)
                && key > *current
            {
                parent[v] = u;
                queue.change_priority(&v, key);
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pins() -> Vec<GridCoord> {
        // Source at the origin, a far sink and a sink halfway along the way.
        vec![
            GridCoord::new(0, 0, 0),
            GridCoord::new(10, 0, 0),
            GridCoord::new(10, 1, 0),
            GridCoord::new(5, 1, 0),
        ]
    }

    #[test]
    fn mst_order_chains_nearest_pins() {
        let order = prim_dijkstra_order(&pins(), 0.0);
        assert_eq!(order, vec![(3, 0), (2, 3), (1, 2)]);
    }

    #[test]
    fn high_alpha_pulls_sinks_toward_the_source() {
        let order = prim_dijkstra_order(&pins(), 1.0);
        assert!(order.iter().all(|&(_, p)| p == 0 || p == 3));
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn single_pin_has_no_connections() {
        assert!(prim_dijkstra_order(&[GridCoord::new(1, 1, 0)], 0.5).is_empty());
    }
}
