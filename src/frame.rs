// 该文件是 Jianshi （鉴识） 项目的一部分。
// src/frame.rs - BGR 帧定义
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

use std::borrow::Cow;

use image::{
  GrayImage, ImageBuffer, Luma, Pixel, Rgb, RgbImage, Rgba, RgbaImage,
  imageops::{self, FilterType},
};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("不支持的通道数: {0}")]
  UnsupportedChannels(usize),
  #[error("不支持的通道转换: {from} -> {to}")]
  UnsupportedConversion { from: usize, to: usize },
  #[error("无效的帧尺寸: {width}x{height}")]
  InvalidSize { width: u32, height: u32 },
}

/// 帧的通道布局，彩色数据按 BGR 顺序交错存放
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channels {
  Gray,
  Bgr,
  Bgra,
}

impl Channels {
  pub fn count(self) -> usize {
    match self {
      Channels::Gray => 1,
      Channels::Bgr => 3,
      Channels::Bgra => 4,
    }
  }

  pub fn from_count(count: usize) -> Result<Self, FrameError> {
    match count {
      1 => Ok(Channels::Gray),
      3 => Ok(Channels::Bgr),
      4 => Ok(Channels::Bgra),
      n => Err(FrameError::UnsupportedChannels(n)),
    }
  }
}

/// 交错存储的 8 位图像帧（HWC）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
  width: u32,
  height: u32,
  channels: Channels,
  data: Box<[u8]>,
}

fn sample_count(width: u32, height: u32, channels: Channels) -> usize {
  width as usize * height as usize * channels.count()
}

impl Frame {
  pub fn new(
    width: u32,
    height: u32,
    channels: Channels,
    data: Vec<u8>,
  ) -> Result<Self, FrameError> {
    if width == 0 || height == 0 {
      return Err(FrameError::InvalidSize { width, height });
    }

    let expected = sample_count(width, height, channels);
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      width,
      height,
      channels,
      data: data.into_boxed_slice(),
    })
  }

  /// 生成所有像素都为 `pixel` 的帧，`pixel` 长度必须等于通道数
  pub fn filled(
    width: u32,
    height: u32,
    channels: Channels,
    pixel: &[u8],
  ) -> Result<Self, FrameError> {
    if pixel.len() != channels.count() {
      return Err(FrameError::LengthMismatch {
        expected: channels.count(),
        actual: pixel.len(),
      });
    }
    let pixels = width as usize * height as usize;
    let data = pixel.iter().copied().cycle().take(pixels * pixel.len()).collect();
    Self::new(width, height, channels, data)
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn channels(&self) -> Channels {
    self.channels
  }

  pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
    let c = self.channels.count();
    let offset = (y as usize * self.width as usize + x as usize) * c;
    &self.data[offset..offset + c]
  }

  /// 转换为网络需要的通道数。
  ///
  /// 支持 3→1、4→1、4→3、1→3，通道数相同时直接借用原帧，其余组合返回错误。
  pub fn convert_channels(&self, target: Channels) -> Result<Cow<'_, Frame>, FrameError> {
    let data: Vec<u8> = match (self.channels, target) {
      (from, to) if from == to => return Ok(Cow::Borrowed(self)),
      (Channels::Bgr, Channels::Gray) | (Channels::Bgra, Channels::Gray) => self
        .data
        .chunks_exact(self.channels.count())
        .map(|px| bgr_to_gray(px[0], px[1], px[2]))
        .collect(),
      (Channels::Bgra, Channels::Bgr) => self
        .data
        .chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect(),
      (Channels::Gray, Channels::Bgr) => self.data.iter().flat_map(|&g| [g, g, g]).collect(),
      (from, to) => {
        return Err(FrameError::UnsupportedConversion {
          from: from.count(),
          to: to.count(),
        });
      }
    };

    Ok(Cow::Owned(Frame::new(self.width, self.height, target, data)?))
  }

  /// 双线性缩放到指定尺寸，尺寸相同时直接借用原帧
  pub fn resize(&self, width: u32, height: u32) -> Result<Cow<'_, Frame>, FrameError> {
    if width == 0 || height == 0 {
      return Err(FrameError::InvalidSize { width, height });
    }
    if self.width == width && self.height == height {
      return Ok(Cow::Borrowed(self));
    }

    let data = match self.channels {
      Channels::Gray => resize_raw::<Luma<u8>>(self, width, height)?,
      Channels::Bgr => resize_raw::<Rgb<u8>>(self, width, height)?,
      Channels::Bgra => resize_raw::<Rgba<u8>>(self, width, height)?,
    };

    Ok(Cow::Owned(Frame::new(width, height, self.channels, data)?))
  }

  /// 按 RGB 顺序导出，用于保存与显示
  pub fn to_rgb_image(&self) -> RgbImage {
    let pixels = self.data.chunks_exact(self.channels.count());
    let data: Vec<u8> = match self.channels {
      Channels::Gray => pixels.flat_map(|px| [px[0], px[0], px[0]]).collect(),
      Channels::Bgr | Channels::Bgra => pixels.flat_map(|px| [px[2], px[1], px[0]]).collect(),
    };
    // 长度由构造时的检查保证
    RgbImage::from_raw(self.width, self.height, data)
      .unwrap_or_else(|| RgbImage::new(self.width, self.height))
  }
}

// 与 OpenCV COLOR_BGR2GRAY 相同的 BT.601 定点系数
fn bgr_to_gray(b: u8, g: u8, r: u8) -> u8 {
  let y = (b as u32 * 1868 + g as u32 * 9617 + r as u32 * 4899 + (1 << 13)) >> 14;
  y.min(255) as u8
}

fn resize_raw<P: Pixel<Subpixel = u8> + 'static>(
  frame: &Frame,
  width: u32,
  height: u32,
) -> Result<Vec<u8>, FrameError> {
  let source = ImageBuffer::<P, &[u8]>::from_raw(frame.width, frame.height, &frame.data[..])
    .ok_or(FrameError::LengthMismatch {
      expected: sample_count(frame.width, frame.height, frame.channels),
      actual: frame.data.len(),
    })?;
  Ok(imageops::resize(&source, width, height, FilterType::Triangle).into_raw())
}

impl AsRef<[u8]> for Frame {
  fn as_ref(&self) -> &[u8] {
    &self.data
  }
}

impl From<&RgbImage> for Frame {
  fn from(image: &RgbImage) -> Self {
    let (width, height) = image.dimensions();
    let data: Vec<u8> = image.pixels().flat_map(|p| [p[2], p[1], p[0]]).collect();
    Frame {
      width,
      height,
      channels: Channels::Bgr,
      data: data.into_boxed_slice(),
    }
  }
}

impl From<&RgbaImage> for Frame {
  fn from(image: &RgbaImage) -> Self {
    let (width, height) = image.dimensions();
    let data: Vec<u8> = image.pixels().flat_map(|p| [p[2], p[1], p[0], p[3]]).collect();
    Frame {
      width,
      height,
      channels: Channels::Bgra,
      data: data.into_boxed_slice(),
    }
  }
}

impl From<&GrayImage> for Frame {
  fn from(image: &GrayImage) -> Self {
    let (width, height) = image.dimensions();
    Frame {
      width,
      height,
      channels: Channels::Gray,
      data: image.as_raw().clone().into_boxed_slice(),
    }
  }
}
