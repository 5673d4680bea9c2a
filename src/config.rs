use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};

use crate::cli::*;
use crate::features::{AdapterKind, DetectorKind, ExtractorKind, MatcherKind};

/// 缺失或无效的必要输入（目录、索引文件）
pub const EXIT_INVALID_INPUT: i32 = -1;
/// 目录中没有可解码的图片
pub const EXIT_EMPTY_CORPUS: i32 = -2;

#[derive(Parser, Debug, Clone)]
#[command(name = "imatch", version, about = "基于特征点与视觉词袋的图片匹配工具")]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 扫描目录，生成特征描述子索引
    FdGenerate(FdGenerateCommand),
    /// 在特征描述子索引中匹配查询图片
    FdMatch(FdMatchCommand),
    /// 扫描目录，生成视觉词袋词汇表与直方图
    BowGenerate(BowGenerateCommand),
    /// 在视觉词袋直方图中匹配查询图片
    BowMatch(BowMatchCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct FeatureOptions {
    /// 特征点检测算法
    #[arg(long, value_enum, value_name = "ALGORITHM", default_value_t = DetectorKind::Sift)]
    pub detector: DetectorKind,
    /// 检测器包装层
    #[arg(long = "detector_adapter", value_enum, value_name = "ADAPTER")]
    pub detector_adapter: Option<AdapterKind>,
    /// 描述子提取算法
    #[arg(long, value_enum, value_name = "ALGORITHM", default_value_t = ExtractorKind::Sift)]
    pub extractor: ExtractorKind,
    /// 提取器包装层（灰度管线下无效，仅为兼容保留）
    #[arg(long = "extractor_adapter", value_enum, value_name = "ADAPTER")]
    pub extractor_adapter: Option<AdapterKind>,
}

#[derive(Parser, Debug, Clone)]
pub struct MatcherOptions {
    /// 描述子匹配算法
    #[arg(long, value_enum, value_name = "ALGORITHM", default_value_t = MatcherKind::FlannBased)]
    pub matcher: MatcherKind,
}

/// `--directory` 为必要参数，但缺失时需要以 -1 退出而不是 clap 默认的 2，
/// 因此在这里手动检查
pub fn require_directory(directory: &Option<PathBuf>) -> Result<&PathBuf> {
    directory.as_ref().ok_or_else(|| anyhow!("need input directory"))
}
