// 该文件是 Jianshi （鉴识） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageReader};
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame, url_file_path};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("无效的读取模式: {0}")]
  InvalidMode(String),
  #[error("无法打开图像文件 {}: {source}", .path.display())]
  Io {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("图像解码错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 读取图像时的通道处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
  /// 转为 3 通道 BGR
  #[default]
  Color,
  /// 转为单通道灰度
  Gray,
  /// 保留文件本身的通道数（1、3 或 4）
  Unchanged,
}

impl ReadMode {
  fn from_query(value: &str) -> Result<Self, ImageFileInputError> {
    match value {
      "color" => Ok(ReadMode::Color),
      "gray" | "grey" => Ok(ReadMode::Gray),
      "unchanged" => Ok(ReadMode::Unchanged),
      other => Err(ImageFileInputError::InvalidMode(other.to_string())),
    }
  }

  fn apply(self, image: DynamicImage) -> Frame {
    match self {
      ReadMode::Color => Frame::from(&image.to_rgb8()),
      ReadMode::Gray => Frame::from(&image.to_luma8()),
      ReadMode::Unchanged => match image {
        DynamicImage::ImageLuma8(gray) => Frame::from(&gray),
        DynamicImage::ImageRgb8(rgb) => Frame::from(&rgb),
        DynamicImage::ImageRgba8(rgba) => Frame::from(&rgba),
        other if other.color().has_alpha() && other.color().has_color() => {
          Frame::from(&other.to_rgba8())
        }
        other if other.color().has_color() => Frame::from(&other.to_rgb8()),
        other => Frame::from(&other.to_luma8()),
      },
    }
  }
}

/// 单张图像输入，作为迭代器只产生一帧
pub struct ImageFileInput {
  frame: Option<Frame>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemeMismatch);
    }

    let mode = match url.query_pairs().find(|(k, _)| k == "mode") {
      Some((_, v)) => ReadMode::from_query(&v)?,
      None => ReadMode::default(),
    };

    Self::open(url_file_path(url), mode)
  }
}

impl ImageFileInput {
  pub fn open(path: impl AsRef<Path>, mode: ReadMode) -> Result<Self, ImageFileInputError> {
    let path = path.as_ref();
    let image = ImageReader::open(path)
      .map_err(|source| ImageFileInputError::Io {
        path: path.to_path_buf(),
        source,
      })?
      .with_guessed_format()
      .map_err(|source| ImageFileInputError::Io {
        path: path.to_path_buf(),
        source,
      })?
      .decode()?;

    let frame = mode.apply(image);
    debug!(
      "读取图像 {}: {}x{}x{}",
      path.display(),
      frame.width(),
      frame.height(),
      frame.channels().count()
    );

    Ok(Self { frame: Some(frame) })
  }

  pub fn into_frame(mut self) -> Option<Frame> {
    self.frame.take()
  }
}

impl Iterator for ImageFileInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    self.frame.take()
  }
}
