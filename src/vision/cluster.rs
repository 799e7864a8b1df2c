//! Greedy spatial clustering of color matches into a single blob center

use super::scanner::ColorMatch;
use super::Position;

/// Minimum matches required before a detection is reported
pub const MIN_MATCHES: usize = 5;

/// Maximum distance from a cluster center for a match to join it
pub const DEFAULT_CLUSTER_RADIUS: f32 = 50.0;

/// A group of nearby matches
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cluster {
    pub center: Position,
    pub count: usize,
    pub total_weight: f32,
}

impl Cluster {
    fn seed(m: &ColorMatch) -> Self {
        Self {
            center: Position::new(m.x, m.y),
            count: 1,
            total_weight: m.weight,
        }
    }

    /// Fold a match into the running weighted-average center
    fn absorb(&mut self, m: &ColorMatch) {
        let total = self.total_weight + m.weight;
        if total > 0.0 {
            self.center.x = (self.center.x * self.total_weight + m.x * m.weight) / total;
            self.center.y = (self.center.y * self.total_weight + m.y * m.weight) / total;
        }
        self.total_weight = total;
        self.count += 1;
    }

    /// Ranking score: dense and confident clusters win
    pub fn score(&self) -> f32 {
        self.count as f32 * self.total_weight
    }
}

/// Picks the best blob center out of a set of weighted matches
#[derive(Debug, Clone, Copy)]
pub struct ClusterLocator {
    radius: f32,
    min_matches: usize,
}

impl Default for ClusterLocator {
    fn default() -> Self {
        Self::new(DEFAULT_CLUSTER_RADIUS, MIN_MATCHES)
    }
}

impl ClusterLocator {
    pub fn new(radius: f32, min_matches: usize) -> Self {
        Self {
            radius: radius.max(0.0),
            min_matches: min_matches.max(1),
        }
    }

    /// Group matches greedily; each match joins the nearest cluster in range
    pub fn clusters(&self, matches: &[ColorMatch]) -> Vec<Cluster> {
        let mut clusters: Vec<Cluster> = Vec::new();

        for m in matches {
            let point = Position::new(m.x, m.y);
            let nearest = clusters
                .iter()
                .enumerate()
                .map(|(i, c)| (i, c.center.distance_to(&point)))
                .filter(|(_, d)| *d <= self.radius)
                .min_by(|a, b| a.1.total_cmp(&b.1));

            match nearest {
                Some((i, _)) => clusters[i].absorb(m),
                None => clusters.push(Cluster::seed(m)),
            }
        }

        clusters
    }

    /// Best blob center, or `None` when there is not enough signal
    pub fn locate(&self, matches: &[ColorMatch]) -> Option<Position> {
        if matches.len() < self.min_matches {
            return None;
        }

        let best = self
            .clusters(matches)
            .into_iter()
            .filter(|c| c.total_weight > 0.0)
            .max_by(|a, b| a.score().total_cmp(&b.score()));

        match best {
            Some(cluster) => Some(cluster.center),
            None => weighted_centroid(matches),
        }
    }
}

/// Global weighted centroid; `None` when the total weight is zero
pub fn weighted_centroid(matches: &[ColorMatch]) -> Option<Position> {
    let total: f32 = matches.iter().map(|m| m.weight).sum();
    if total <= 0.0 || !total.is_finite() {
        return None;
    }

    let x = matches.iter().map(|m| m.x * m.weight).sum::<f32>() / total;
    let y = matches.iter().map(|m| m.y * m.weight).sum::<f32>() / total;
    Some(Position::new(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(x: f32, y: f32, weight: f32) -> ColorMatch {
        ColorMatch { x, y, weight }
    }

    #[test]
    fn too_few_matches_is_no_detection() {
        let locator = ClusterLocator::default();
        let matches = vec![m(10.0, 10.0, 1.0); 4];
        assert_eq!(locator.locate(&matches), None);
    }

    #[test]
    fn merged_center_lies_on_segment_toward_heavier_point() {
        let locator = ClusterLocator::default();
        let clusters = locator.clusters(&[m(0.0, 0.0, 0.25), m(30.0, 40.0, 0.75)]);
        assert_eq!(clusters.len(), 1);

        let c = clusters[0].center;
        // collinear with (0,0)-(30,40)
        assert!((c.x * 40.0 - c.y * 30.0).abs() < 1e-3);
        assert!((c.x - 22.5).abs() < 1e-4);
        assert!((c.y - 30.0).abs() < 1e-4);
        assert!(c.distance_to(&Position::new(30.0, 40.0)) < c.distance_to(&Position::ORIGIN));
    }

    #[test]
    fn distant_points_start_new_clusters() {
        let locator = ClusterLocator::default();
        let clusters = locator.clusters(&[m(0.0, 0.0, 1.0), m(200.0, 0.0, 1.0)]);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn dense_cluster_beats_isolated_perfect_point() {
        let locator = ClusterLocator::default();
        let mut matches = vec![m(400.0, 400.0, 1.0)];
        for i in 0..6 {
            matches.push(m(100.0 + i as f32 * 6.0, 100.0, 0.5));
        }
        let center = locator.locate(&matches).unwrap();
        assert!((center.x - 115.0).abs() < 1e-3);
        assert!((center.y - 100.0).abs() < 1e-3);
    }

    #[test]
    fn zero_weight_matches_are_no_detection() {
        let locator = ClusterLocator::default();
        let matches = vec![m(10.0, 10.0, 0.0); 8];
        assert_eq!(locator.locate(&matches), None);
        assert_eq!(weighted_centroid(&matches), None);
    }

    #[test]
    fn centroid_of_uniform_weights_is_mean() {
        let c = weighted_centroid(&[m(0.0, 0.0, 1.0), m(10.0, 20.0, 1.0)]).unwrap();
        assert_eq!(c, Position::new(5.0, 10.0));
    }
}
