// 该文件是 Jianshi （鉴识） 项目的一部分。
// src/args.rs - 分类器参数配置
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use clap::Args;
use tracing::info;
use url::Url;

use crate::{
  FromUrl,
  model::{
    Classifier, DEFAULT_TOP_N, InferenceEngine, InputGeometry, LabelList, MeanSource, TractEngine,
    TractEngineBuilder,
  },
};

/// 构建分类器所需的参数，各个程序通过 `#[command(flatten)]` 复用
#[derive(Args, Debug, Clone)]
pub struct ClassifierArgs {
  /// ONNX 模型文件，例如 onnx:///models/caffenet.onnx
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 均值来源: binaryproto:///path/mean.binaryproto、mean:?values=104,117,123，
  /// 不减均值时显式写 mean:
  #[arg(long, value_name = "MEAN")]
  pub mean: Url,

  /// 标签文件，每行一个标签，例如 labels:///data/synset_words.txt
  #[arg(long, value_name = "LABELS")]
  pub labels: Url,

  /// 网络输入通道数（1、3 或 4），省略时使用模型自带的输入形状
  #[arg(long, requires_all = ["height", "width"])]
  pub channels: Option<usize>,

  /// 网络输入高度
  #[arg(long, requires_all = ["channels", "width"])]
  pub height: Option<u32>,

  /// 网络输入宽度
  #[arg(long, requires_all = ["channels", "height"])]
  pub width: Option<u32>,

  /// 每帧输出的预测数量
  #[arg(long, default_value_t = DEFAULT_TOP_N)]
  pub top_n: usize,
}

impl ClassifierArgs {
  /// 命令行给出的输入尺寸，未给出时为 `None`
  pub fn geometry(&self) -> Result<Option<InputGeometry>, crate::frame::FrameError> {
    match (self.channels, self.height, self.width) {
      (Some(channels), Some(height), Some(width)) => {
        InputGeometry::new(channels, height, width).map(Some)
      }
      _ => Ok(None),
    }
  }

  /// 依次加载模型、均值与标签
  pub fn build_classifier(&self) -> anyhow::Result<Classifier<TractEngine>> {
    info!("模型文件路径: {}", self.model);
    info!("均值来源: {}", self.mean);
    info!("标签文件路径: {}", self.labels);

    let mut builder = TractEngineBuilder::from_url(&self.model)?;
    if let Some(geometry) = self.geometry()? {
      builder = builder.geometry(geometry);
    }
    let engine = builder.build()?;

    // 均值通道数与网络实际输入比较
    let geometry = engine.geometry();
    let mean = MeanSource::from_url(&self.mean)?.into_mean_image(geometry)?;

    let labels = LabelList::from_url(&self.labels)?;

    Ok(Classifier::new(engine, mean, labels)?.with_top_n(self.top_n))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use clap::Parser;

  #[derive(Parser)]
  struct Cli {
    #[command(flatten)]
    classifier: ClassifierArgs,
  }

  const REQUIRED: [&str; 7] = [
    "jianshi",
    "--model",
    "onnx:///models/caffenet.onnx",
    "--mean",
    "binaryproto:///data/imagenet_mean.binaryproto",
    "--labels",
    "labels:///data/synset_words.txt",
  ];

  #[test]
  fn geometry_defaults_to_the_model() {
    let args = Cli::try_parse_from(REQUIRED).unwrap().classifier;
    assert_eq!(args.geometry().unwrap(), None);
    assert_eq!(args.top_n, DEFAULT_TOP_N);
    assert_eq!(args.mean.scheme(), "binaryproto");
  }

  #[test]
  fn explicit_geometry_is_parsed() {
    let argv = REQUIRED
      .into_iter()
      .chain(["--channels", "1", "--height", "224", "--width", "200"]);
    let args = Cli::try_parse_from(argv).unwrap().classifier;
    assert_eq!(
      args.geometry().unwrap().map(|g| g.shape()),
      Some([1, 1, 224, 200])
    );
  }

  #[test]
  fn partial_geometry_is_rejected() {
    let argv = REQUIRED.into_iter().chain(["--height", "224"]);
    assert!(Cli::try_parse_from(argv).is_err());
  }

  #[test]
  fn mean_is_required() {
    assert!(
      Cli::try_parse_from([
        "jianshi",
        "--model",
        "onnx:///models/caffenet.onnx",
        "--labels",
        "labels:///data/synset_words.txt",
      ])
      .is_err()
    );
  }

  #[test]
  fn invalid_url_is_rejected() {
    assert!(
      Cli::try_parse_from([
        "jianshi", "--model", "not a url", "--mean", "mean:", "--labels", "labels:///x"
      ])
        .is_err()
    );
  }
}
