// 该文件是 Jianshi （鉴识） 项目的一部分。
// src/main.rs - 项目主程序
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

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use jianshi::{
  FromUrl,
  args::ClassifierArgs,
  input::{InputWrapper, open_camera},
  output::{ConsoleOutput, OutputWrapper},
  task::{ContinuousTask, OneShotTask, Task},
};

/// 用预训练网络识别一张图片，然后持续识别摄像头画面
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(flatten)]
  pub classifier: ClassifierArgs,

  /// 待识别的图片，例如 image:///home/user/cat.jpg
  #[arg(long, value_name = "IMAGE")]
  pub image: Url,

  /// 摄像头设备
  #[arg(long, value_name = "CAMERA", default_value = "v4l:///dev/video0")]
  pub camera: Url,

  /// 摄像头循环的额外输出，可重复: preview:?sink=ximagesink、folder:///path
  #[arg(long, value_name = "OUTPUT")]
  pub output: Vec<Url>,

  /// 不打开实时预览窗口
  #[arg(long)]
  pub no_preview: bool,

  /// 摄像头循环最多处理的帧数
  #[arg(long, value_name = "COUNT")]
  pub max_frames: Option<usize>,
}

const PREVIEW_SCHEME: &str = "preview";
const PREVIEW_URL: &str = "preview:";

// 用户没有自己指定预览输出时，默认打开一个预览窗口
fn default_preview(args: &Args) -> Option<&'static str> {
  let explicit = args
    .output
    .iter()
    .any(|url| url.scheme() == PREVIEW_SCHEME);
  (cfg!(feature = "gstreamer_output") && !args.no_preview && !explicit).then_some(PREVIEW_URL)
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("鉴识 图像分类");
  let classifier = args.classifier.build_classifier()?;

  info!("图片路径: {}", args.image);
  let image = InputWrapper::from_url(&args.image)?;
  OneShotTask.run_task(image, &classifier, ConsoleOutput::stdout())?;

  let Some(camera) = open_camera(&args.camera)? else {
    info!("没有视频源");
    return Ok(());
  };

  let mut outputs = vec![OutputWrapper::ConsoleOutput(
    ConsoleOutput::stdout().with_separator(true),
  )];
  if let Some(preview) = default_preview(&args) {
    info!("打开预览窗口");
    outputs.push(OutputWrapper::from_url(&Url::parse(preview)?)?);
  }
  for url in &args.output {
    info!("输出路径: {}", url);
    outputs.push(OutputWrapper::from_url(url)?);
  }

  ContinuousTask::default()
    .with_frame_number(args.max_frames)
    .run_task(camera, &classifier, outputs)?;

  Ok(())
}
