use anyhow::{Result, ensure};
use opencv::core::{DMatch, Mat, Ptr, Vector, no_array};
use opencv::prelude::*;
use opencv::{features2d, flann};

// KD-tree forest size and per-query search effort
pub const KDTREE_TREES: i32 = 5;
pub const SEARCH_CHECKS: i32 = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f32,
}

/// Approximate k-nearest-neighbor search over a fixed descriptor matrix,
/// backed by a randomized FLANN KD-tree forest.
pub struct KnnSearcher {
    matcher: features2d::FlannBasedMatcher,
}

impl KnnSearcher {
    pub fn new(points: &Mat) -> Result<Self> {
        ensure!(points.rows() > 0, "cannot build a search index over zero descriptors");
        let index_params =
            Ptr::new(flann::IndexParams::from(flann::KDTreeIndexParams::new(KDTREE_TREES)?));
        let search_params = Ptr::new(flann::SearchParams::new_1(SEARCH_CHECKS, 0., true)?);
        let mut matcher = features2d::FlannBasedMatcher::new(&index_params, &search_params)?;
        FlannBasedMatcherTrait::add(&mut matcher, &Vector::<Mat>::from_iter([points.try_clone()?]))?;
        FlannBasedMatcherTrait::train(&mut matcher)?;
        Ok(Self { matcher })
    }

    /// Return up to `knn` neighbors per query row, nearest first.
    pub fn knn_search(&mut self, points: &Mat, knn: usize) -> Result<Vec<Vec<Neighbor>>> {
        if points.rows() == 0 {
            return Ok(vec![]);
        }
        let mut matches = Vector::<Vector<DMatch>>::new();
        self.matcher.knn_match(points, &mut matches, knn as i32, &no_array(), false)?;
        Ok(matches
            .iter()
            .map(|row| {
                row.iter()
                    .map(|m| Neighbor { index: m.train_idx as usize, distance: m.distance })
                    .collect()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_exact_and_second_neighbor() {
        let points =
            Mat::from_slice_2d(&[[0f32, 0.], [10., 0.], [0., 10.], [100., 100.]]).unwrap();
        let mut searcher = KnnSearcher::new(&points).unwrap();

        let query = Mat::from_slice_2d(&[[0.5f32, 0.]]).unwrap();
        let neighbors = searcher.knn_search(&query, 2).unwrap();

        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].len(), 2);
        assert_eq!(neighbors[0][0].index, 0);
        assert!(neighbors[0][0].distance < neighbors[0][1].distance);
    }

    #[test]
    fn empty_query_yields_no_rows() {
        let points = Mat::from_slice_2d(&[[0f32, 0.], [1., 1.]]).unwrap();
        let mut searcher = KnnSearcher::new(&points).unwrap();
        assert!(searcher.knn_search(&Mat::default(), 2).unwrap().is_empty());
    }

    #[test]
    fn rejects_empty_index() {
        assert!(KnnSearcher::new(&Mat::default()).is_err());
    }
}
