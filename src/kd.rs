// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

/// A graph node projected onto a local tangent plane, in meters.
/// `idx` is the dense index of the node in the [CompactGraph](crate::CompactGraph).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanePoint {
    pub x: f64,
    pub y: f64,
    pub idx: u32,
}

/// KDTree implements the [k-d tree data structure](https://en.wikipedia.org/wiki/K-d_tree),
/// used to speed up nearest-node snapping for large graphs. Scanning every node
/// takes significantly more time than route finding itself when generating
/// multiple routes; a k-d tree helps with that, trading memory usage for CPU time.
///
/// The tree assumes euclidean geometry over [PlanePoints](PlanePoint), which are
/// expected to be equirectangular projections scaled by the cosine of the mean
/// latitude. The projection is not distance-exact, hence queries return multiple
/// candidates for the caller to re-rank with a spherical distance function.
#[derive(Debug, Clone)]
pub struct KDTree {
    pivot: PlanePoint,
    left: Option<Box<KDTree>>,
    right: Option<Box<KDTree>>,
}

impl KDTree {
    /// Builds a k-d tree from a mutable slice of [PlanePoints](PlanePoint).
    /// Points will be reordered in the slice to facilitate building the tree.
    pub fn build(points: &mut [PlanePoint]) -> Option<Self> {
        Self::build_impl(points, false)
    }

    fn build_impl(points: &mut [PlanePoint], y_divides: bool) -> Option<Self> {
        match points.len() {
            0 => None,
            1 => Some(Self {
                pivot: points[0],
                left: None,
                right: None,
            }),
            _ => {
                if y_divides {
                    points.sort_by(|a, b| a.y.partial_cmp(&b.y).unwrap());
                } else {
                    points.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap());
                }
                let median = points.len() / 2;
                let pivot = points[median];
                let (left, right_and_pivot) = points.split_at_mut(median);
                let right = &mut right_and_pivot[1..];
                Some(Self {
                    pivot,
                    left: box_option(Self::build_impl(left, !y_divides)),
                    right: box_option(Self::build_impl(right, !y_divides)),
                })
            }
        }
    }

    /// Finds up to `k` points closest to `(x, y)` under the euclidean metric,
    /// ordered from closest to farthest.
    pub fn nearest(&self, x: f64, y: f64, k: usize) -> Vec<u32> {
        if k == 0 {
            return Vec::new();
        }
        let mut best: Vec<(f64, u32)> = Vec::with_capacity(k + 1);
        self.nearest_impl(x, y, k, false, &mut best);
        best.into_iter().map(|(_, idx)| idx).collect()
    }

    fn nearest_impl(&self, x: f64, y: f64, k: usize, y_divides: bool, best: &mut Vec<(f64, u32)>) {
        let dx = x - self.pivot.x;
        let dy = y - self.pivot.y;
        push_candidate(best, k, dx * dx + dy * dy, self.pivot.idx);

        // Select which branch to recurse into first
        let first_left = if y_divides {
            y < self.pivot.y
        } else {
            x < self.pivot.x
        };
        let (first, second) = if first_left {
            (&self.left, &self.right)
        } else {
            (&self.right, &self.left)
        };

        // Recurse into the first branch
        if let Some(ref branch) = first {
            branch.nearest_impl(x, y, k, !y_divides, best);
        }

        // (Optionally) recurse into the second branch.
        // A useful candidate is possible there if and only if the splitting
        // axis is closer than the current worst candidate, or the candidate
        // list is not full yet.
        if let Some(ref branch) = second {
            let axis_delta = if y_divides { dy } else { dx };
            let axis_dist_sq = axis_delta * axis_delta;
            if best.len() < k || axis_dist_sq < best[best.len() - 1].0 {
                branch.nearest_impl(x, y, k, !y_divides, best);
            }
        }
    }
}

/// Inserts a candidate into the sorted best-list, keeping at most `k` entries.
fn push_candidate(best: &mut Vec<(f64, u32)>, k: usize, dist_sq: f64, idx: u32) {
    if best.len() == k && dist_sq >= best[best.len() - 1].0 {
        return;
    }
    let at = best.partition_point(|&(d, _)| d <= dist_sq);
    best.insert(at, (dist_sq, idx));
    best.truncate(k);
}

#[inline]
fn box_option<T>(o: Option<T>) -> Option<Box<T>> {
    o.map(|thing| Box::new(thing))
}
