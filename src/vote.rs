//! Nearest-neighbor voting over a descriptor index.
//!
//! Every query descriptor is matched against the whole stored matrix; matches
//! that pass the distance-ratio test vote for the stored image owning the
//! matched row. The image with the most votes wins if it reaches the minimum
//! matched-points threshold.

use log::warn;

use crate::knn::Neighbor;

pub const DISTANCE_RATIO_DEFAULT: f32 = 0.6;
pub const MIN_MATCHED_POINTS_DEFAULT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchParams {
    /// Nearest / second-nearest distance ratio threshold
    pub distance_ratio: f32,
    /// Minimum vote count for an image to be declared a match (inclusive)
    pub min_points: usize,
}

impl Default for MatchParams {
    fn default() -> Self {
        Self { distance_ratio: DISTANCE_RATIO_DEFAULT, min_points: MIN_MATCHED_POINTS_DEFAULT }
    }
}

impl MatchParams {
    /// Normalize raw CLI values. Out-of-range values fall back to the
    /// defaults instead of aborting.
    pub fn resolve(distance_ratio: f32, min_point: i64) -> Self {
        let distance_ratio = if distance_ratio.abs() < 0.01 || distance_ratio < 0. {
            warn!("use {} as distance ratio", DISTANCE_RATIO_DEFAULT);
            DISTANCE_RATIO_DEFAULT
        } else {
            distance_ratio
        };
        let min_points = if min_point <= 0 {
            warn!("use {} as minimum number of matched points", MIN_MATCHED_POINTS_DEFAULT);
            MIN_MATCHED_POINTS_DEFAULT
        } else {
            min_point as usize
        };
        Self { distance_ratio, min_points }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    /// Index into the stored filename list
    pub image: usize,
    /// Number of confident matches attributed to that image
    pub points: usize,
}

/// Map a row of the stored descriptor matrix to the image owning it: the
/// image with the greatest start offset not exceeding `row`.
///
/// `offsets` must be non-decreasing with first entry 0.
pub fn owner_image(offsets: &[usize], row: usize) -> usize {
    debug_assert!(offsets.first() == Some(&0));
    offsets.partition_point(|&o| o <= row) - 1
}

/// Count per-image votes from the 2-nearest-neighbor lists of one query image.
///
/// A query descriptor is a confident match iff its nearest distance is
/// strictly below `ratio` times the second-nearest distance. Rows with fewer
/// than two neighbors cannot pass the ratio test and are ignored.
pub fn count_votes(neighbors: &[Vec<Neighbor>], offsets: &[usize], ratio: f32) -> Vec<usize> {
    let mut votes = vec![0usize; offsets.len()];
    for row in neighbors {
        let [first, second, ..] = row.as_slice() else { continue };
        if first.distance < ratio * second.distance {
            votes[owner_image(offsets, first.index)] += 1;
        }
    }
    votes
}

/// Pick the image with the most votes. Ties go to the lowest image index;
/// images with zero votes never win.
pub fn best_candidate(votes: &[usize]) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;
    for (image, &points) in votes.iter().enumerate() {
        if points > best.map_or(0, |b| b.points) {
            best = Some(Candidate { image, points });
        }
    }
    best
}

/// The full decision for one query image: `None` means "no match found".
pub fn decide(neighbors: &[Vec<Neighbor>], offsets: &[usize], params: &MatchParams) -> Option<Candidate> {
    let votes = count_votes(neighbors, offsets, params.distance_ratio);
    best_candidate(&votes).filter(|c| c.points >= params.min_points)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(index: usize, d0: f32, d1: f32) -> Vec<Neighbor> {
        vec![Neighbor { index, distance: d0 }, Neighbor { index: index + 1, distance: d1 }]
    }

    #[test]
    fn owner_image_attributes_by_greatest_offset() {
        let offsets = [0, 10, 25];
        assert_eq!(owner_image(&offsets, 0), 0);
        assert_eq!(owner_image(&offsets, 9), 0);
        assert_eq!(owner_image(&offsets, 10), 1);
        assert_eq!(owner_image(&offsets, 17), 1);
        assert_eq!(owner_image(&offsets, 24), 1);
        // rows of the last image must be attributable too
        assert_eq!(owner_image(&offsets, 25), 2);
        assert_eq!(owner_image(&offsets, 1000), 2);
    }

    #[test]
    fn ratio_test_is_strict() {
        let offsets = [0];
        // 0.3 < 0.6 * 0.5 does not hold: equality is not a match
        assert_eq!(count_votes(&[pair(0, 0.3, 0.5)], &offsets, 0.6), vec![0]);
        assert_eq!(count_votes(&[pair(0, 0.2, 0.5)], &offsets, 0.6), vec![1]);
    }

    #[test]
    fn rows_without_two_neighbors_are_ignored() {
        let offsets = [0, 5];
        let neighbors = vec![vec![Neighbor { index: 0, distance: 0.1 }], vec![]];
        assert_eq!(count_votes(&neighbors, &offsets, 0.6), vec![0, 0]);
    }

    #[test]
    fn tie_break_picks_lowest_image_index() {
        assert_eq!(
            best_candidate(&[3, 7, 1, 0, 2, 7]),
            Some(Candidate { image: 1, points: 7 })
        );
    }

    #[test]
    fn zero_votes_is_no_match() {
        assert_eq!(best_candidate(&[0, 0, 0]), None);
        let params = MatchParams::default();
        assert_eq!(decide(&[], &[0, 10], &params), None);
    }

    #[test]
    fn threshold_is_inclusive() {
        let params = MatchParams { distance_ratio: 0.6, min_points: 5 };
        let offsets = [0, 1];
        // five confident matches into image 1, exactly at the threshold
        let neighbors = (0..5).map(|_| pair(1, 0.1, 0.5)).collect::<Vec<_>>();
        assert_eq!(decide(&neighbors, &offsets, &params), Some(Candidate { image: 1, points: 5 }));

        let neighbors = &neighbors[..4];
        assert_eq!(decide(neighbors, &offsets, &params), None);
    }

    #[test]
    fn resolve_rejects_out_of_range_params() {
        assert_eq!(MatchParams::resolve(0.7, 8), MatchParams { distance_ratio: 0.7, min_points: 8 });
        assert_eq!(MatchParams::resolve(0.005, 5), MatchParams::default());
        assert_eq!(MatchParams::resolve(-0.5, 5), MatchParams::default());
        assert_eq!(MatchParams::resolve(0.6, 0), MatchParams::default());
        assert_eq!(MatchParams::resolve(0.6, -3), MatchParams::default());
    }
}
