// 该文件是 Jianshi （鉴识） 项目的一部分。
// src/model/preprocess.rs - 输入预处理
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

use thiserror::Error;
use tracing::debug;

use crate::{
  frame::{Frame, FrameError},
  model::{InputGeometry, MeanError, MeanImage},
};

#[derive(Error, Debug)]
pub enum PreprocessError {
  #[error("帧错误: {0}")]
  Frame(#[from] FrameError),
  #[error("均值错误: {0}")]
  Mean(#[from] MeanError),
  #[error("输入缓冲区大小不匹配: 期望 {expected}, 实际 {actual}")]
  BufferSize { expected: usize, actual: usize },
}

/// 把任意尺寸的 1/3/4 通道帧变成网络输入：通道转换、缩放、转浮点、减均值、拆成平面
#[derive(Debug, Clone)]
pub struct Preprocessor {
  mean: MeanImage,
}

impl Preprocessor {
  pub fn new(mean: MeanImage) -> Self {
    Self { mean }
  }

  pub fn geometry(&self) -> InputGeometry {
    self.mean.geometry()
  }

  /// 写入 `planes`，通常是输入张量自身的存储
  pub fn preprocess_into(&self, frame: &Frame, planes: &mut [f32]) -> Result<(), PreprocessError> {
    let geometry = self.geometry();
    if planes.len() != geometry.tensor_len() {
      return Err(PreprocessError::BufferSize {
        expected: geometry.tensor_len(),
        actual: planes.len(),
      });
    }

    let sample = frame.convert_channels(geometry.channels)?;
    let sample = sample.resize(geometry.width, geometry.height)?;
    debug!(
      "预处理: {}x{}x{} -> {}",
      frame.width(),
      frame.height(),
      frame.channels().count(),
      geometry
    );

    write_planar(&sample, planes);
    self.mean.subtract_from(planes)?;
    Ok(())
  }

  pub fn preprocess(&self, frame: &Frame) -> Result<Vec<f32>, PreprocessError> {
    let mut planes = vec![0.0; self.geometry().tensor_len()];
    self.preprocess_into(frame, &mut planes)?;
    Ok(planes)
  }
}

// HWC 交错 u8 -> CHW 平面 f32
fn write_planar(frame: &Frame, planes: &mut [f32]) {
  let channels = frame.channels().count();
  let plane = frame.width() as usize * frame.height() as usize;
  for (i, pixel) in frame.as_ref().chunks_exact(channels).enumerate() {
    for (c, &v) in pixel.iter().enumerate() {
      planes[c * plane + i] = v as f32;
    }
  }
}
