use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use log::info;

use crate::cli::SubCommandExtend;
use crate::config::{FeatureOptions, MatcherOptions, Opts, require_directory};
use crate::features::FeaturePipeline;
use crate::index::FeatureIndex;
use crate::knn::KnnSearcher;
use crate::vote::{self, DISTANCE_RATIO_DEFAULT, MIN_MATCHED_POINTS_DEFAULT, MatchParams};

#[derive(Parser, Debug, Clone)]
pub struct FdMatchCommand {
    #[command(flatten)]
    pub feature: FeatureOptions,
    #[command(flatten)]
    pub matcher: MatcherOptions,
    /// 查询图片所在目录
    #[arg(long, value_name = "DIR")]
    pub directory: Option<PathBuf>,
    /// 索引输入文件
    #[arg(long, value_name = "FILE", default_value = "input.db")]
    pub input: PathBuf,
    /// 最近邻 / 次近邻距离比阈值，超出范围时回退到默认值
    #[arg(long = "distance_ratio", value_name = "RATIO", default_value_t = DISTANCE_RATIO_DEFAULT)]
    pub distance_ratio: f32,
    /// 判定为匹配图片所需的最少匹配点数，非正数时回退到默认值
    #[arg(long = "min_point", value_name = "N", default_value_t = MIN_MATCHED_POINTS_DEFAULT as i64)]
    pub min_point: i64,
}

impl SubCommandExtend for FdMatchCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let directory = require_directory(&self.directory)?;
        let files = crate::utils::image_files(directory)?;
        let params = MatchParams::resolve(self.distance_ratio, self.min_point);

        print!("open input file...");
        let index = FeatureIndex::load(&self.input)?;
        println!("\tdone");

        let features = index.features.to_mat()?;
        let mut searcher = KnnSearcher::new(&features)?;
        let mut pipeline = FeaturePipeline::new(&self.feature)?;

        let mut total_files = 0usize;
        let mut true_matches = 0usize;

        println!("matching...");
        let start = Instant::now();
        for path in &files {
            let Some(image) = crate::utils::imread(path)? else {
                continue;
            };
            total_files += 1;
            let filename = path.file_name().unwrap_or_default().to_string_lossy();
            print!("File {}...", filename);

            let (_, descriptors) = pipeline.detect_and_compute(&image)?;
            let neighbors = searcher.knn_search(&descriptors, 2)?;
            match vote::decide(&neighbors, &index.offsets, &params) {
                Some(candidate) => {
                    let matched = &index.filenames[candidate.image];
                    print!("matching image: {}; number of matched points: {}", matched, candidate.points);
                    if *matched == filename {
                        true_matches += 1;
                        print!("...true match");
                    } else {
                        print!("...false match");
                    }
                }
                None => print!("could not find matched image"),
            }
            println!("...done");
        }
        info!("matching finished in {:.0}ms", start.elapsed().as_secs_f64() * 1000.);

        if total_files > 0 {
            println!();
            println!("correct rate: {:.2}", 100. * true_matches as f64 / total_files as f64);
        }
        Ok(())
    }
}
