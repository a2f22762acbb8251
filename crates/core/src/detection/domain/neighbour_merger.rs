use crate::detection::domain::partition::partition;
use crate::shared::region::Region;

/// Relative corner tolerance for treating two raw hits as one face.
pub const DEFAULT_GROUP_EPS: f64 = 0.2;

/// Confirms raw cascade hits by neighbour count and averages each cluster.
///
/// Hits are clustered by [`Region::is_similar`] (transitively). A cluster
/// becomes a detection only if it holds at least `min_neighbours` hits. A
/// confirmed box lying inside a stronger confirmed box is dropped, so one
/// face scanned at two scales is not reported twice.
///
/// `min_neighbours = 0` disables grouping and returns the raw hits.
#[derive(Clone, Debug)]
pub struct NeighbourMerger {
    min_neighbours: usize,
    eps: f64,
}

impl NeighbourMerger {
    pub fn new(min_neighbours: usize) -> Self {
        Self {
            min_neighbours,
            eps: DEFAULT_GROUP_EPS,
        }
    }

    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    pub fn min_neighbours(&self) -> usize {
        self.min_neighbours
    }

    pub fn merge(&self, raw: &[Region]) -> Vec<Region> {
        if self.min_neighbours == 0 {
            return raw.to_vec();
        }

        let eps = self.eps;
        let (labels, n_clusters) = partition(raw, |a, b| a.is_similar(b, eps));

        let mut sums = vec![[0i64; 4]; n_clusters];
        let mut counts = vec![0usize; n_clusters];
        for (r, &label) in raw.iter().zip(&labels) {
            let s = &mut sums[label];
            s[0] += r.x as i64;
            s[1] += r.y as i64;
            s[2] += r.width as i64;
            s[3] += r.height as i64;
            counts[label] += 1;
        }

        let confirmed: Vec<(Region, usize)> = (0..n_clusters)
            .filter(|&c| counts[c] >= self.min_neighbours)
            .map(|c| {
                let n = counts[c] as f64;
                let avg = |v: i64| (v as f64 / n).round() as i32;
                let s = sums[c];
                (Region::new(avg(s[0]), avg(s[1]), avg(s[2]), avg(s[3])), counts[c])
            })
            .collect();

        confirmed
            .iter()
            .enumerate()
            .filter(|&(i, (inner, n_inner))| {
                !confirmed.iter().enumerate().any(|(j, (outer, n_outer))| {
                    let margin = (outer.width as f64 * eps).round() as i32;
                    i != j
                        && *n_outer > (*n_inner).max(3)
                        && inner.is_inside(outer, margin)
                })
            })
            .map(|(_, (r, _))| *r)
            .collect()
    }
}
