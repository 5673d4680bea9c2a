use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};
use opencv::prelude::*;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::matrix::Matrix2D;

/// A directory scan produced zero decodable images. Mapped to its own exit
/// code in `main`.
#[derive(Debug)]
pub struct EmptyCorpus;

impl fmt::Display for EmptyCorpus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "there is no image in directory")
    }
}

impl std::error::Error for EmptyCorpus {}

/// Raw-descriptor index: all descriptors of all images in one matrix, plus
/// the per-image start offsets and the index-aligned filename list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureIndex {
    pub features: Matrix2D,
    pub offsets: Vec<usize>,
    pub filenames: Vec<String>,
}

impl FeatureIndex {
    pub fn save(&self, path: &Path) -> Result<()> {
        save_to(self, path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        load_from(path)
    }
}

/// Accumulates the descriptor matrix during a directory scan, finalized into
/// an immutable `FeatureIndex`.
#[derive(Debug, Default)]
pub struct FeatureIndexBuilder {
    features: Matrix2D,
    offsets: Vec<usize>,
    filenames: Vec<String>,
}

impl FeatureIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one image: its offset is the current matrix height.
    /// Returns the number of descriptor rows appended.
    pub fn add(&mut self, filename: String, descriptors: &Mat) -> Result<usize> {
        self.offsets.push(self.features.rows());
        self.filenames.push(filename);
        self.features.push_mat(descriptors)
    }

    pub fn finish(self) -> Result<FeatureIndex> {
        if self.filenames.is_empty() {
            return Err(EmptyCorpus.into());
        }
        Ok(FeatureIndex {
            features: self.features,
            offsets: self.offsets,
            filenames: self.filenames,
        })
    }
}

/// BOW visual-word vocabulary, one row per cluster centroid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vocabulary {
    pub vocabulary: Matrix2D,
}

impl Vocabulary {
    pub fn save(&self, path: &Path) -> Result<()> {
        save_to(self, path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        load_from(path)
    }
}

/// Per-image BOW histograms with the index-aligned filename list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BowIndex {
    pub descriptors: Matrix2D,
    pub filenames: Vec<String>,
}

impl BowIndex {
    pub fn save(&self, path: &Path) -> Result<()> {
        save_to(self, path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        load_from(path)
    }
}

fn save_to<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("could not create output file {}", path.display()))?;
    bincode::serialize_into(BufWriter::new(file), value)
        .with_context(|| format!("could not write {}", path.display()))
}

fn load_from<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file =
        File::open(path).with_context(|| format!("could not open input file {}", path.display()))?;
    bincode::deserialize_from(BufReader::new(file))
        .with_context(|| format!("could not read {}", path.display()))
}
