use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use log::info;

use crate::cli::SubCommandExtend;
use crate::config::{FeatureOptions, Opts, require_directory};
use crate::features::FeaturePipeline;
use crate::index::FeatureIndexBuilder;
use crate::utils;

#[derive(Parser, Debug, Clone)]
pub struct FdGenerateCommand {
    #[command(flatten)]
    pub feature: FeatureOptions,
    /// 图片所在目录
    #[arg(long, value_name = "DIR")]
    pub directory: Option<PathBuf>,
    /// 索引输出文件
    #[arg(long, value_name = "FILE", default_value = "output.db")]
    pub output: PathBuf,
}

impl SubCommandExtend for FdGenerateCommand {
    fn run(&self, _opts: &Opts) -> Result<()> {
        let directory = require_directory(&self.directory)?;
        let files = utils::image_files(directory)?;
        let mut pipeline = FeaturePipeline::new(&self.feature)?;
        let mut builder = FeatureIndexBuilder::new();

        println!("building...");
        let start = Instant::now();
        for path in &files {
            let Some(image) = utils::imread(path)? else {
                continue;
            };
            let filename = path.file_name().unwrap_or_default().to_string_lossy().into_owned();
            print!("File {}...", filename);
            let (_, descriptors) = pipeline.detect_and_compute(&image)?;
            let rows = builder.add(filename, &descriptors)?;
            println!(" done ({} descriptors)", rows);
        }
        info!("scan finished in {:.0}ms", start.elapsed().as_secs_f64() * 1000.);

        let index = builder.finish()?;
        print!("write to output file {}...", self.output.display());
        index.save(&self.output)?;
        println!("\tdone");
        Ok(())
    }
}
