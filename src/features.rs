use anyhow::Result;
use clap::ValueEnum;
use log::{info, warn};
use opencv::core::{KeyPoint, Mat, Point2f, Ptr, Rect, Size, Vector};
use opencv::prelude::*;
use opencv::{features2d, imgproc};

use crate::config::FeatureOptions;
use crate::utils;

/// Keypoint detection algorithms, resolved to `features2d` constructors.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorKind {
    Sift,
    Orb,
    Brisk,
    Akaze,
    Kaze,
    Fast,
    Gftt,
    Harris,
    Mser,
    SimpleBlob,
}

/// Descriptor extraction algorithms. Only algorithms that can compute
/// descriptors for externally supplied keypoints are listed.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorKind {
    Sift,
    Orb,
    Brisk,
    Akaze,
    Kaze,
}

/// Detector adapter wrappers, after OpenCV 2.x `GridAdapted` / `PyramidAdapted`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    Grid,
    Pyramid,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatcherKind {
    FlannBased,
    BruteForce,
    BruteForceL1,
    BruteForceHamming,
}

impl DetectorKind {
    fn create(&self) -> Result<Ptr<features2d::Feature2D>> {
        let detector: Ptr<features2d::Feature2D> = match self {
            Self::Sift => features2d::SIFT::create_def()?.into(),
            Self::Orb => features2d::ORB::create_def()?.into(),
            Self::Brisk => features2d::BRISK::create_def()?.into(),
            Self::Akaze => features2d::AKAZE::create_def()?.into(),
            Self::Kaze => features2d::KAZE::create_def()?.into(),
            Self::Fast => features2d::FastFeatureDetector::create_def()?.into(),
            Self::Gftt => features2d::GFTTDetector::create_def()?.into(),
            Self::Harris => features2d::GFTTDetector::create(1000, 0.01, 1., 3, true, 0.04)?.into(),
            Self::Mser => features2d::MSER::create_def()?.into(),
            Self::SimpleBlob => features2d::SimpleBlobDetector::create_def()?.into(),
        };
        Ok(detector)
    }
}

impl ExtractorKind {
    fn create(&self) -> Result<Ptr<features2d::Feature2D>> {
        let extractor: Ptr<features2d::Feature2D> = match self {
            Self::Sift => features2d::SIFT::create_def()?.into(),
            Self::Orb => features2d::ORB::create_def()?.into(),
            Self::Brisk => features2d::BRISK::create_def()?.into(),
            Self::Akaze => features2d::AKAZE::create_def()?.into(),
            Self::Kaze => features2d::KAZE::create_def()?.into(),
        };
        Ok(extractor)
    }
}

impl MatcherKind {
    pub fn create(&self) -> Result<Ptr<features2d::DescriptorMatcher>> {
        let name = match self {
            Self::FlannBased => "FlannBased",
            Self::BruteForce => "BruteForce",
            Self::BruteForceL1 => "BruteForce-L1",
            Self::BruteForceHamming => "BruteForce-Hamming",
        };
        Ok(features2d::DescriptorMatcher::create(name)?)
    }
}

// Grid adapter defaults, after OpenCV 2.x GridAdaptedFeatureDetector
const GRID_ROWS: i32 = 4;
const GRID_COLS: i32 = 4;
const GRID_MAX_KEYPOINTS: usize = 1000;
// Pyramid levels above the base image
const PYRAMID_LEVELS: i32 = 2;

/// Detector + extractor pair behind one `detect_and_compute` call.
///
/// Descriptors are always returned as CV_32F so that the KD-tree and k-means
/// stages downstream accept any extractor choice.
pub struct FeaturePipeline {
    detector: Ptr<features2d::Feature2D>,
    extractor: Ptr<features2d::Feature2D>,
    adapter: Option<AdapterKind>,
}

impl FeaturePipeline {
    pub fn new(opts: &FeatureOptions) -> Result<Self> {
        info!("create feature detector: {:?} (adapter: {:?})", opts.detector, opts.detector_adapter);
        info!("create descriptor extractor: {:?}", opts.extractor);
        if let Some(adapter) = opts.extractor_adapter {
            warn!("extractor adapter {:?} has no effect on a grayscale pipeline", adapter);
        }
        Ok(Self {
            detector: opts.detector.create()?,
            extractor: opts.extractor.create()?,
            adapter: opts.detector_adapter,
        })
    }

    pub fn detect(&mut self, image: &Mat) -> Result<Vector<KeyPoint>> {
        match self.adapter {
            None => {
                let mut kps = Vector::new();
                self.detector.detect_def(image, &mut kps)?;
                Ok(kps)
            }
            Some(AdapterKind::Grid) => self.detect_grid(image),
            Some(AdapterKind::Pyramid) => self.detect_pyramid(image),
        }
    }

    pub fn detect_and_compute(&mut self, image: &Mat) -> Result<(Vector<KeyPoint>, Mat)> {
        let mut kps = self.detect(image)?;
        let mut des = Mat::default();
        if !kps.is_empty() {
            self.extractor.compute(image, &mut kps, &mut des)?;
        }
        let des = utils::to_f32(&des)?;
        Ok((kps, des))
    }

    /// Detect per grid cell, keeping the strongest keypoints of each cell.
    fn detect_grid(&mut self, image: &Mat) -> Result<Vector<KeyPoint>> {
        let max_per_cell = GRID_MAX_KEYPOINTS / (GRID_ROWS * GRID_COLS) as usize;
        let mut all = Vec::new();
        for gy in 0..GRID_ROWS {
            for gx in 0..GRID_COLS {
                let x = image.cols() * gx / GRID_COLS;
                let y = image.rows() * gy / GRID_ROWS;
                let w = image.cols() * (gx + 1) / GRID_COLS - x;
                let h = image.rows() * (gy + 1) / GRID_ROWS - y;
                if w == 0 || h == 0 {
                    continue;
                }
                let cell = Mat::roi(image, Rect::new(x, y, w, h))?.try_clone()?;
                let mut kps = Vector::<KeyPoint>::new();
                self.detector.detect_def(&cell, &mut kps)?;

                let mut kps = kps.into_iter().collect::<Vec<_>>();
                kps.sort_by(|a, b| b.response().total_cmp(&a.response()));
                kps.truncate(max_per_cell);
                for mut kp in kps {
                    let pt = kp.pt();
                    kp.set_pt(Point2f::new(pt.x + x as f32, pt.y + y as f32));
                    all.push(kp);
                }
            }
        }
        Ok(Vector::from_iter(all))
    }

    /// Detect on a halving image pyramid, rescaling keypoints to base coordinates.
    fn detect_pyramid(&mut self, image: &Mat) -> Result<Vector<KeyPoint>> {
        let mut all = Vec::new();
        let mut level_img = image.try_clone()?;
        let mut scale = 1f32;
        for level in 0..=PYRAMID_LEVELS {
            let mut kps = Vector::<KeyPoint>::new();
            self.detector.detect_def(&level_img, &mut kps)?;
            for mut kp in kps {
                let pt = kp.pt();
                kp.set_pt(Point2f::new(pt.x * scale, pt.y * scale));
                kp.set_size(kp.size() * scale);
                kp.set_octave(level);
                all.push(kp);
            }
            if level < PYRAMID_LEVELS {
                if level_img.cols() < 32 || level_img.rows() < 32 {
                    break;
                }
                let mut smaller = Mat::default();
                imgproc::resize(&level_img, &mut smaller, Size::default(), 0.5, 0.5, imgproc::INTER_AREA)?;
                level_img = smaller;
                scale *= 2.;
            }
        }
        Ok(Vector::from_iter(all))
    }
}
