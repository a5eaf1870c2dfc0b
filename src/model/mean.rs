// 该文件是 Jianshi （鉴识） 项目的一部分。
// src/model/mean.rs - 均值图像
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

//! # 均值图像
//!
//! 网络训练时减去了数据集的均值图像，推理前需要做同样的处理。均值可以来自：
//!
//! - `binaryproto:///path/mean.binaryproto`：Caffe `BlobProto` 格式的平面 float 数据
//! - `mean:?values=104,117,123`：直接给出每个通道的均值
//! - `mean:`：不做均值减法
//!
//! 无论来源如何，每个通道都会先被平均为一个标量，再铺满网络输入尺寸。

use std::path::PathBuf;

use prost::Message;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{FromUrl, model::InputGeometry, url_file_path};

const BINARYPROTO_SCHEME: &str = "binaryproto";
const MEAN_VALUES_SCHEME: &str = "mean";

#[derive(Error, Debug)]
pub enum MeanError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("无法读取均值文件 {}: {source}", .path.display())]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("均值文件解码失败: {0}")]
  Decode(#[from] prost::DecodeError),
  #[error("均值文件的通道数与网络输入不一致: 网络 {expected}, 均值文件 {actual}")]
  ChannelMismatch { expected: usize, actual: usize },
  #[error("均值数据长度不匹配: 期望 {expected}, 实际 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("无效的均值参数: {0}")]
  InvalidValues(String),
}

/// Caffe `BlobShape`
#[derive(Clone, PartialEq, Message)]
pub struct BlobShape {
  #[prost(int64, repeated, tag = "1")]
  pub dim: Vec<i64>,
}

/// Caffe `BlobProto`，只保留均值文件会用到的字段
#[derive(Clone, PartialEq, Message)]
pub struct BlobProto {
  #[prost(int32, optional, tag = "1")]
  pub num: Option<i32>,
  #[prost(int32, optional, tag = "2")]
  pub channels: Option<i32>,
  #[prost(int32, optional, tag = "3")]
  pub height: Option<i32>,
  #[prost(int32, optional, tag = "4")]
  pub width: Option<i32>,
  #[prost(float, repeated, tag = "5")]
  pub data: Vec<f32>,
  #[prost(message, optional, tag = "7")]
  pub shape: Option<BlobShape>,
  #[prost(double, repeated, tag = "8")]
  pub double_data: Vec<f64>,
}

impl BlobProto {
  /// 4 维形状；旧字段 num/channels/height/width 优先于 `shape`
  pub fn dims(&self) -> Vec<i64> {
    if self.num.is_some() || self.channels.is_some() || self.height.is_some() || self.width.is_some()
    {
      return [self.num, self.channels, self.height, self.width]
        .iter()
        .map(|d| d.unwrap_or(0) as i64)
        .collect();
    }
    self
      .shape
      .as_ref()
      .map(|s| s.dim.clone())
      .unwrap_or_default()
  }

  // 维度不足 4 时按 1 处理
  fn legacy_axis(&self, axis: usize) -> usize {
    self.dims().get(axis).map(|&d| d.max(0) as usize).unwrap_or(1)
  }

  pub fn num_count(&self) -> usize {
    self.legacy_axis(0).max(1)
  }

  pub fn channel_count(&self) -> usize {
    self.legacy_axis(1)
  }

  pub fn plane_len(&self) -> usize {
    self.legacy_axis(2) * self.legacy_axis(3)
  }

  fn values(&self) -> Vec<f32> {
    if self.data.is_empty() {
      self.double_data.iter().map(|&v| v as f32).collect()
    } else {
      self.data.clone()
    }
  }
}

/// 均值来源
#[derive(Debug, Clone, PartialEq)]
pub enum MeanSource {
  BinaryProto(PathBuf),
  Values(Vec<f32>),
  Zero,
}

impl FromUrl for MeanSource {
  type Error = MeanError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      BINARYPROTO_SCHEME => Ok(MeanSource::BinaryProto(url_file_path(url))),
      MEAN_VALUES_SCHEME => {
        let values = url
          .query_pairs()
          .find(|(k, _)| k == "values")
          .map(|(_, v)| v.into_owned());
        match values {
          None => Ok(MeanSource::Zero),
          Some(values) => values
            .split(',')
            .map(|v| {
              v.trim()
                .parse::<f32>()
                .map_err(|e| MeanError::InvalidValues(format!("'{}': {}", v, e)))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(MeanSource::Values),
        }
      }
      other => Err(MeanError::SchemeMismatch(format!(
        "期望 '{}' 或 '{}', 实际 '{}'",
        BINARYPROTO_SCHEME, MEAN_VALUES_SCHEME, other
      ))),
    }
  }
}

impl MeanSource {
  pub fn into_mean_image(self, geometry: InputGeometry) -> Result<MeanImage, MeanError> {
    match self {
      MeanSource::BinaryProto(path) => MeanImage::from_binaryproto(path, geometry),
      MeanSource::Values(values) => MeanImage::from_channel_means(geometry, &values),
      MeanSource::Zero => Ok(MeanImage::zero(geometry)),
    }
  }
}

/// 铺满网络输入尺寸的平面均值图像（CHW）
#[derive(Debug, Clone, PartialEq)]
pub struct MeanImage {
  geometry: InputGeometry,
  channel_means: Box<[f32]>,
  data: Box<[f32]>,
}

impl MeanImage {
  pub fn zero(geometry: InputGeometry) -> Self {
    Self {
      geometry,
      channel_means: vec![0.0; geometry.channels.count()].into_boxed_slice(),
      data: vec![0.0; geometry.tensor_len()].into_boxed_slice(),
    }
  }

  pub fn from_channel_means(geometry: InputGeometry, means: &[f32]) -> Result<Self, MeanError> {
    let expected = geometry.channels.count();
    if means.len() != expected {
      return Err(MeanError::ChannelMismatch {
        expected,
        actual: means.len(),
      });
    }

    let plane = geometry.plane_len();
    let data = means
      .iter()
      .flat_map(|&m| std::iter::repeat_n(m, plane))
      .collect::<Vec<_>>();

    debug!("各通道均值: {:?}", means);
    Ok(Self {
      geometry,
      channel_means: means.into(),
      data: data.into_boxed_slice(),
    })
  }

  pub fn from_blob(blob: &BlobProto, geometry: InputGeometry) -> Result<Self, MeanError> {
    let expected = geometry.channels.count();
    let channels = blob.channel_count();
    if channels != expected {
      return Err(MeanError::ChannelMismatch {
        expected,
        actual: channels,
      });
    }

    let plane = blob.plane_len();
    let values = blob.values();
    let expected_len = blob.num_count() * channels * plane;
    if plane == 0 || values.len() != expected_len {
      return Err(MeanError::LengthMismatch {
        expected: expected_len,
        actual: values.len(),
      });
    }

    // 每个通道平均为一个标量
    let means = values
      .chunks_exact(plane)
      .take(channels)
      .map(|c| (c.iter().map(|&v| v as f64).sum::<f64>() / plane as f64) as f32)
      .collect::<Vec<_>>();

    Self::from_channel_means(geometry, &means)
  }

  pub fn from_binaryproto(
    path: impl Into<PathBuf>,
    geometry: InputGeometry,
  ) -> Result<Self, MeanError> {
    let path = path.into();
    info!("加载均值文件: {}", path.display());
    let bytes = std::fs::read(&path).map_err(|source| MeanError::Io {
      path: path.clone(),
      source,
    })?;
    let blob = BlobProto::decode(bytes.as_slice())?;
    debug!("均值文件形状: {:?}", blob.dims());
    Self::from_blob(&blob, geometry)
  }

  pub fn geometry(&self) -> InputGeometry {
    self.geometry
  }

  pub fn channel_means(&self) -> &[f32] {
    &self.channel_means
  }

  pub fn as_planar(&self) -> &[f32] {
    &self.data
  }

  /// 从平面数据中逐元素减去均值，两者尺寸必须一致
  pub fn subtract_from(&self, planes: &mut [f32]) -> Result<(), MeanError> {
    if planes.len() != self.data.len() {
      return Err(MeanError::LengthMismatch {
        expected: self.data.len(),
        actual: planes.len(),
      });
    }
    planes
      .iter_mut()
      .zip(self.data.iter())
      .for_each(|(v, m)| *v -= m);
    Ok(())
  }
}
