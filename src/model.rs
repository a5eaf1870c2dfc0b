// 该文件是 Jianshi （鉴识） 项目的一部分。
// src/model.rs - 模型
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

use tract_onnx::prelude::{Tensor, TractResult};

use crate::frame::{Channels, FrameError};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

impl<M: Model> Model for &M {
  type Input = M::Input;
  type Output = M::Output;
  type Error = M::Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    (**self).infer(input)
  }
}

/// 推理引擎能力接口：固定输入形状，一次前向计算返回第一个输出张量
pub trait InferenceEngine {
  fn geometry(&self) -> InputGeometry;
  fn forward(&self, input: Tensor) -> TractResult<Vec<f32>>;
}

impl<E: InferenceEngine> InferenceEngine for &E {
  fn geometry(&self) -> InputGeometry {
    (**self).geometry()
  }

  fn forward(&self, input: Tensor) -> TractResult<Vec<f32>> {
    (**self).forward(input)
  }
}

/// 网络输入的通道数与空间尺寸，批大小固定为 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputGeometry {
  pub channels: Channels,
  pub height: u32,
  pub width: u32,
}

impl InputGeometry {
  pub fn new(channels: usize, height: u32, width: u32) -> Result<Self, FrameError> {
    if width == 0 || height == 0 {
      return Err(FrameError::InvalidSize { width, height });
    }
    Ok(Self {
      channels: Channels::from_count(channels)?,
      height,
      width,
    })
  }

  pub fn plane_len(&self) -> usize {
    self.height as usize * self.width as usize
  }

  pub fn tensor_len(&self) -> usize {
    self.channels.count() * self.plane_len()
  }

  /// NCHW 形状
  pub fn shape(&self) -> [usize; 4] {
    [
      1,
      self.channels.count(),
      self.height as usize,
      self.width as usize,
    ]
  }
}

impl std::fmt::Display for InputGeometry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "1x{}x{}x{}",
      self.channels.count(),
      self.height,
      self.width
    )
  }
}

/// 一条分类结果。`score` 是网络最后一层的原始输出，不保证是概率
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
  pub label: String,
  pub score: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifyResult {
  pub items: Box<[Prediction]>,
}

impl ClassifyResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn best(&self) -> Option<&Prediction> {
    self.items.first()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Prediction> {
    self.items.iter()
  }
}

mod classifier;
mod labels;
mod mean;
mod preprocess;
mod top_n;
mod tract_engine;

pub use self::classifier::{Classifier, ClassifierError, DEFAULT_TOP_N};
pub use self::labels::{LabelError, LabelList};
pub use self::mean::{BlobProto, BlobShape, MeanError, MeanImage, MeanSource};
pub use self::preprocess::{PreprocessError, Preprocessor};
pub use self::top_n::top_n;
pub use self::tract_engine::{TractEngine, TractEngineBuilder, TractEngineError};
