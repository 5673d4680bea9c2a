use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use log::info;

use crate::bow::{self, BowExtractor};
use crate::cli::SubCommandExtend;
use crate::config::{FeatureOptions, MatcherOptions, Opts, require_directory};
use crate::features::FeaturePipeline;
use crate::index::{BowIndex, EmptyCorpus, Vocabulary};
use crate::matrix::Matrix2D;
use crate::utils;

#[derive(Parser, Debug, Clone)]
pub struct BowGenerateCommand {
    #[command(flatten)]
    pub feature: FeatureOptions,
    #[command(flatten)]
    pub matcher: MatcherOptions,
    /// 图片所在目录
    #[arg(long, value_name = "DIR")]
    pub directory: Option<PathBuf>,
    /// 词汇表输出文件
    #[arg(long = "features_output", value_name = "FILE", default_value = "features.db")]
    pub features_output: PathBuf,
    /// 直方图输出文件
    #[arg(long = "descriptors_output", value_name = "FILE", default_value = "descriptors.db")]
    pub descriptors_output: PathBuf,
}

impl SubCommandExtend for BowGenerateCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let directory = require_directory(&self.directory)?;
        let files = utils::image_files(directory)?;
        let mut pipeline = FeaturePipeline::new(&self.feature)?;

        // first pass: accumulate every descriptor for clustering; the
        // vocabulary size is the number of usable images
        let mut all_descriptors = Matrix2D::new();
        let mut vocabulary_size = 0i32;

        println!("building vocabulary...");
        let start = Instant::now();
        for path in &files {
            let Some(image) = utils::imread(path)? else {
                continue;
            };
            let filename = path.file_name().unwrap_or_default().to_string_lossy();
            print!("File {}...", filename);
            let (_, descriptors) = pipeline.detect_and_compute(&image)?;
            all_descriptors.push_mat(&descriptors)?;
            vocabulary_size += 1;
            println!(" done");
        }
        if vocabulary_size == 0 {
            return Err(EmptyCorpus.into());
        }

        print!("cluster features...");
        let vocabulary = bow::build_vocabulary(&all_descriptors.to_mat()?, vocabulary_size)?;
        println!("\tdone");

        print!("write features to file {}...", self.features_output.display());
        Vocabulary { vocabulary: Matrix2D::from_mat(&vocabulary)? }.save(&self.features_output)?;
        println!("\tdone");

        // second pass: one histogram per image over the fresh vocabulary
        let mut extractor = BowExtractor::new(&vocabulary, self.matcher.matcher)?;
        let mut histograms = Matrix2D::new();
        let mut filenames = vec![];

        println!("generate bow descriptors...");
        for path in &files {
            let Some(image) = utils::imread(path)? else {
                continue;
            };
            let filename = path.file_name().unwrap_or_default().to_string_lossy().into_owned();
            print!("File {}...", filename);
            let (_, descriptors) = pipeline.detect_and_compute(&image)?;
            let histogram = extractor.compute(&descriptors)?;
            histograms.push_row(&histogram)?;
            filenames.push(filename);
            println!(" done");
        }
        info!("generation finished in {:.0}ms", start.elapsed().as_secs_f64() * 1000.);

        print!("write descriptors to file {}...", self.descriptors_output.display());
        BowIndex { descriptors: histograms, filenames }.save(&self.descriptors_output)?;
        println!("\tdone");
        Ok(())
    }
}
