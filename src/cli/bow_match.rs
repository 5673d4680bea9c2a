use std::path::PathBuf;

use anyhow::{Result, ensure};
use clap::Parser;
use opencv::core::{DMatch, Mat, Vector, no_array};
use opencv::prelude::*;

use crate::bow::BowExtractor;
use crate::cli::SubCommandExtend;
use crate::config::{FeatureOptions, MatcherOptions, Opts, require_directory};
use crate::features::FeaturePipeline;
use crate::index::{BowIndex, Vocabulary};
use crate::utils;

#[derive(Parser, Debug, Clone)]
pub struct BowMatchCommand {
    #[command(flatten)]
    pub feature: FeatureOptions,
    #[command(flatten)]
    pub matcher: MatcherOptions,
    /// 查询图片所在目录
    #[arg(long, value_name = "DIR")]
    pub directory: Option<PathBuf>,
    /// 词汇表输入文件
    #[arg(long = "features_input", value_name = "FILE", default_value = "features.db")]
    pub features_input: PathBuf,
    /// 直方图输入文件
    #[arg(long = "descriptors_input", value_name = "FILE", default_value = "descriptors.db")]
    pub descriptors_input: PathBuf,
}

impl SubCommandExtend for BowMatchCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let directory = require_directory(&self.directory)?;
        let files = utils::image_files(directory)?;

        let vocabulary = Vocabulary::load(&self.features_input)?;
        let index = BowIndex::load(&self.descriptors_input)?;
        ensure!(!index.descriptors.is_empty(), "descriptors input contains no histograms");

        let mut pipeline = FeaturePipeline::new(&self.feature)?;
        let mut extractor = BowExtractor::new(&vocabulary.vocabulary.to_mat()?, self.matcher.matcher)?;

        // one row per stored image, searched with the same matcher algorithm
        let mut matcher = self.matcher.matcher.create()?;
        matcher.add(&Vector::<Mat>::from_iter([index.descriptors.to_mat()?]))?;
        matcher.train()?;

        println!("matching...");
        for path in &files {
            let Some(image) = utils::imread(path)? else {
                continue;
            };
            let filename = path.file_name().unwrap_or_default().to_string_lossy();
            print!("File {}...", filename);

            let (_, descriptors) = pipeline.detect_and_compute(&image)?;
            let histogram = extractor.compute(&descriptors)?;
            let query = Mat::from_slice(&histogram)?.try_clone()?;

            let mut matches = Vector::<Vector<DMatch>>::new();
            matcher.knn_match(&query, &mut matches, 1, &no_array(), false)?;
            match matches.iter().next().and_then(|row| row.iter().next()) {
                Some(m) => {
                    let matched = &index.filenames[m.train_idx as usize];
                    println!("matching image: {}; distance: {:.4}...done", matched, m.distance);
                }
                None => println!("could not find matched image...done"),
            }
        }
        Ok(())
    }
}
