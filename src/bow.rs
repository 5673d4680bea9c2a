use anyhow::{Result, ensure};
use opencv::core::{self, DMatch, Mat, Ptr, TermCriteria, TermCriteria_Type, Vector, no_array};
use opencv::features2d::DescriptorMatcher;
use opencv::prelude::*;

use crate::features::MatcherKind;

// k-means termination and retry parameters
pub const KMEANS_MAX_ITER: i32 = 100;
pub const KMEANS_EPSILON: f64 = 0.001;
pub const KMEANS_ATTEMPTS: i32 = 3;

/// Cluster a CV_32F descriptor matrix into `vocabulary_size` visual words
/// (k-means++ seeding, 3 retries, 100 iterations or 0.001 tolerance).
pub fn build_vocabulary(descriptors: &Mat, vocabulary_size: i32) -> Result<Mat> {
    ensure!(vocabulary_size > 0, "vocabulary size must be positive");
    ensure!(
        descriptors.rows() >= vocabulary_size,
        "cannot cluster {} descriptors into {} words",
        descriptors.rows(),
        vocabulary_size
    );
    let criteria = TermCriteria::new(
        TermCriteria_Type::COUNT as i32 + TermCriteria_Type::EPS as i32,
        KMEANS_MAX_ITER,
        KMEANS_EPSILON,
    )?;
    let mut labels = Mat::default();
    let mut centers = Mat::default();
    core::kmeans(
        descriptors,
        vocabulary_size,
        &mut labels,
        criteria,
        KMEANS_ATTEMPTS,
        core::KMEANS_PP_CENTERS,
        &mut centers,
    )?;
    Ok(centers)
}

/// Turns a descriptor matrix into a fixed-length histogram over the
/// vocabulary: each descriptor votes for its nearest visual word, counts are
/// normalized by the number of descriptors.
pub struct BowExtractor {
    vocabulary_size: usize,
    matcher: Ptr<DescriptorMatcher>,
}

impl BowExtractor {
    pub fn new(vocabulary: &Mat, kind: MatcherKind) -> Result<Self> {
        ensure!(vocabulary.rows() > 0, "empty vocabulary");
        let mut matcher = kind.create()?;
        matcher.add(&Vector::<Mat>::from_iter([vocabulary.try_clone()?]))?;
        matcher.train()?;
        Ok(Self { vocabulary_size: vocabulary.rows() as usize, matcher })
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary_size
    }

    /// Zero descriptors yield the all-zero histogram.
    pub fn compute(&mut self, descriptors: &Mat) -> Result<Vec<f32>> {
        let mut histogram = vec![0f32; self.vocabulary_size];
        if descriptors.rows() == 0 {
            return Ok(histogram);
        }
        let mut matches = Vector::<Vector<DMatch>>::new();
        self.matcher.knn_match(descriptors, &mut matches, 1, &no_array(), false)?;
        for row in matches.iter() {
            if let Some(m) = row.iter().next() {
                histogram[m.train_idx as usize] += 1.;
            }
        }
        let total = descriptors.rows() as f32;
        histogram.iter_mut().for_each(|v| *v /= total);
        Ok(histogram)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_counts_nearest_words() {
        let vocabulary = Mat::from_slice_2d(&[[0f32, 0.], [10., 10.]]).unwrap();
        let mut bow = BowExtractor::new(&vocabulary, MatcherKind::BruteForce).unwrap();

        let descriptors =
            Mat::from_slice_2d(&[[0.1f32, 0.], [0., 0.2], [0.3, 0.3], [9.5, 10.]]).unwrap();
        let histogram = bow.compute(&descriptors).unwrap();

        assert_eq!(histogram, vec![0.75, 0.25]);
    }

    #[test]
    fn zero_descriptors_yield_zero_histogram() {
        let vocabulary = Mat::from_slice_2d(&[[0f32, 0.], [1., 1.]]).unwrap();
        let mut bow = BowExtractor::new(&vocabulary, MatcherKind::BruteForce).unwrap();
        assert_eq!(bow.compute(&Mat::default()).unwrap(), vec![0., 0.]);
    }

    #[test]
    fn vocabulary_has_requested_size() {
        // two well-separated clusters
        let descriptors = Mat::from_slice_2d(&[
            [0f32, 0.],
            [0.1, 0.1],
            [0.2, 0.],
            [10., 10.],
            [10.1, 9.9],
            [9.8, 10.2],
        ])
        .unwrap();
        let vocabulary = build_vocabulary(&descriptors, 2).unwrap();
        assert_eq!(vocabulary.rows(), 2);
        assert_eq!(vocabulary.cols(), 2);
    }

    #[test]
    fn vocabulary_larger_than_corpus_is_rejected() {
        let descriptors = Mat::from_slice_2d(&[[0f32, 0.], [1., 1.]]).unwrap();
        assert!(build_vocabulary(&descriptors, 3).is_err());
    }
}
