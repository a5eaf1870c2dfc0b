// 该文件是 Jianshi （鉴识） 项目的一部分。
// src/model/classifier.rs - 图像分类器
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
use tract_onnx::prelude::{Tensor, TractError};
use tracing::{debug, warn};

use crate::{
  frame::Frame,
  model::{
    ClassifyResult, InferenceEngine, InputGeometry, LabelList, MeanImage, Model, Prediction,
    PreprocessError, Preprocessor, top_n,
  },
};

pub const DEFAULT_TOP_N: usize = 5;

#[derive(Error, Debug)]
pub enum ClassifierError {
  #[error("预处理错误: {0}")]
  Preprocess(#[from] PreprocessError),
  #[error("推理错误: {0}")]
  Inference(#[from] TractError),
  #[error("均值图像尺寸 {mean} 与网络输入 {engine} 不一致")]
  GeometryMismatch {
    engine: InputGeometry,
    mean: InputGeometry,
  },
  #[error("输出下标 {index} 没有对应的标签（共 {labels} 个标签）")]
  MissingLabel { index: usize, labels: usize },
}

/// 推理引擎、均值图像与标签的组合，启动时构建一次，之后只读
pub struct Classifier<E> {
  engine: E,
  preprocessor: Preprocessor,
  labels: LabelList,
  top_n: usize,
}

impl<E: InferenceEngine> Classifier<E> {
  pub fn new(engine: E, mean: MeanImage, labels: LabelList) -> Result<Self, ClassifierError> {
    if engine.geometry() != mean.geometry() {
      return Err(ClassifierError::GeometryMismatch {
        engine: engine.geometry(),
        mean: mean.geometry(),
      });
    }

    Ok(Self {
      engine,
      preprocessor: Preprocessor::new(mean),
      labels,
      top_n: DEFAULT_TOP_N,
    })
  }

  pub fn with_top_n(mut self, top_n: usize) -> Self {
    self.top_n = top_n;
    self
  }

  pub fn labels(&self) -> &LabelList {
    &self.labels
  }

  pub fn geometry(&self) -> InputGeometry {
    self.engine.geometry()
  }

  /// 一次前向计算，返回第一个输出的全部原始分数
  pub fn predict(&self, frame: &Frame) -> Result<Vec<f32>, ClassifierError> {
    let geometry = self.engine.geometry();
    let mut input = Tensor::zero::<f32>(&geometry.shape())?;
    self
      .preprocessor
      .preprocess_into(frame, input.as_slice_mut::<f32>()?)?;

    let output = self.engine.forward(input)?;
    debug!("输出向量长度: {}", output.len());
    Ok(output)
  }

  /// 返回前 `n` 个预测，`n` 不超过标签数量
  pub fn classify(&self, frame: &Frame, n: usize) -> Result<ClassifyResult, ClassifierError> {
    let output = self.predict(frame)?;
    let n = n.min(self.labels.len());
    if output.len() < n {
      warn!("输出向量长度 {} 小于请求的 {}", output.len(), n);
    }

    let items = top_n(&output, n)
      .into_iter()
      .map(|index| {
        let label = self
          .labels
          .get(index)
          .ok_or(ClassifierError::MissingLabel {
            index,
            labels: self.labels.len(),
          })?;
        Ok(Prediction {
          label: label.to_string(),
          score: output[index],
        })
      })
      .collect::<Result<Vec<_>, ClassifierError>>()?;

    Ok(ClassifyResult {
      items: items.into_boxed_slice(),
    })
  }
}

impl<E: InferenceEngine> Model for Classifier<E> {
  type Input = Frame;
  type Output = ClassifyResult;
  type Error = ClassifierError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.classify(input, self.top_n)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::Channels;
  use tract_onnx::prelude::TractResult;

  /// 输出向量为输入张量首个元素加上下标偏移
  struct PlaneMeanEngine {
    geometry: InputGeometry,
    outputs: usize,
  }

  impl InferenceEngine for PlaneMeanEngine {
    fn geometry(&self) -> InputGeometry {
      self.geometry
    }

    fn forward(&self, input: Tensor) -> TractResult<Vec<f32>> {
      assert_eq!(input.shape(), &self.geometry.shape());
      let data = input.as_slice::<f32>()?;
      let first = data[0];
      Ok((0..self.outputs).map(|i| first + (i % 7) as f32).collect())
    }
  }

  fn classifier(outputs: usize, labels: usize) -> Classifier<PlaneMeanEngine> {
    let geometry = InputGeometry::new(3, 8, 8).unwrap();
    let engine = PlaneMeanEngine { geometry, outputs };
    let labels = (0..labels).map(|i| format!("label-{i}")).collect();
    Classifier::new(engine, MeanImage::zero(geometry), labels).unwrap()
  }

  #[test]
  fn predictions_are_sorted_and_labelled() {
    let classifier = classifier(20, 20);
    let frame = Frame::filled(8, 8, Channels::Bgr, &[1, 2, 3]).unwrap();
    let result = classifier.infer(&frame).unwrap();

    assert_eq!(result.len(), DEFAULT_TOP_N);
    assert!(result.items.windows(2).all(|w| w[0].score >= w[1].score));
    assert_eq!(result.best().map(|p| p.score), Some(7.0));
    assert!(
      result
        .iter()
        .all(|p| ["label-6", "label-13", "label-5", "label-12", "label-19"].contains(&p.label.as_str()))
    );
  }

  /// 分数随下标递减
  struct DescendingEngine {
    geometry: InputGeometry,
    outputs: usize,
  }

  impl InferenceEngine for DescendingEngine {
    fn geometry(&self) -> InputGeometry {
      self.geometry
    }

    fn forward(&self, _input: Tensor) -> TractResult<Vec<f32>> {
      Ok((0..self.outputs).map(|i| (self.outputs - i) as f32).collect())
    }
  }

  #[test]
  fn n_is_clamped_to_label_count() {
    let geometry = InputGeometry::new(1, 8, 8).unwrap();
    let engine = DescendingEngine {
      geometry,
      outputs: 20,
    };
    let labels = (0..5).map(|i| format!("label-{i}")).collect();
    let classifier = Classifier::new(engine, MeanImage::zero(geometry), labels)
      .unwrap()
      .with_top_n(10);
    let frame = Frame::filled(8, 8, Channels::Gray, &[0]).unwrap();
    let result = classifier.infer(&frame).unwrap();
    assert_eq!(result.len(), 5);
    assert_eq!(result.best().map(|p| p.label.as_str()), Some("label-0"));
  }

  #[test]
  fn output_without_label_is_an_error() {
    // 标签只有 3 个，但得分最高的下标是 6
    let classifier = classifier(20, 3).with_top_n(1);
    let frame = Frame::filled(8, 8, Channels::Bgr, &[0, 0, 0]).unwrap();
    assert!(matches!(
      classifier.infer(&frame),
      Err(ClassifierError::MissingLabel { index: 6 | 13, .. })
    ));
  }

  #[test]
  fn geometry_mismatch_is_rejected() {
    let geometry = InputGeometry::new(3, 8, 8).unwrap();
    let engine = PlaneMeanEngine {
      geometry,
      outputs: 3,
    };
    let mean = MeanImage::zero(InputGeometry::new(1, 8, 8).unwrap());
    assert!(matches!(
      Classifier::new(engine, mean, LabelList::default()),
      Err(ClassifierError::GeometryMismatch { .. })
    ));
  }
}
