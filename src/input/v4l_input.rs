// 该文件是 Jianshi （鉴识） 项目的一部分。
// src/input/v4l_input.rs - V4L 摄像头输入
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

use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;
use v4l::{
  Device, FourCC, buffer::Type, io::mmap::Stream, io::traits::CaptureStream, video::Capture,
};

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Channels, Frame, FrameError},
  url_file_path,
};

const DEFAULT_DEVICE: &str = "/dev/video0";
const BUFFER_COUNT: u32 = 4;

#[derive(Error, Debug)]
pub enum V4lInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("视频设备不可用: {}: {reason}", .path.display())]
  DeviceUnavailable { path: PathBuf, reason: String },
  #[error("V4L 错误: {0}")]
  V4lError(#[from] std::io::Error),
  #[error("不支持的像素格式: {0}")]
  UnsupportedPixelFormat(String),
  #[error("帧错误: {0}")]
  Frame(#[from] FrameError),
  #[error("MJPG 解码错误: {0}")]
  Decode(#[from] image::ImageError),
}

/// 设备实际协商到的像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PixelFormat {
  Bgr3,
  Rgb3,
  Yuyv,
  Mjpg,
}

impl PixelFormat {
  fn from_fourcc(fourcc: FourCC) -> Result<Self, V4lInputError> {
    match &fourcc.repr {
      b"BGR3" => Ok(PixelFormat::Bgr3),
      b"RGB3" => Ok(PixelFormat::Rgb3),
      b"YUYV" => Ok(PixelFormat::Yuyv),
      b"MJPG" => Ok(PixelFormat::Mjpg),
      _ => Err(V4lInputError::UnsupportedPixelFormat(fourcc.to_string())),
    }
  }

  fn to_frame(self, buffer: &[u8], width: u32, height: u32) -> Result<Frame, V4lInputError> {
    let pixels = width as usize * height as usize;
    let data = match self {
      PixelFormat::Bgr3 => buffer.get(..pixels * 3).unwrap_or(buffer).to_vec(),
      PixelFormat::Rgb3 => buffer
        .chunks_exact(3)
        .take(pixels)
        .flat_map(|px| [px[2], px[1], px[0]])
        .collect(),
      PixelFormat::Yuyv => yuyv_to_bgr(buffer, pixels),
      PixelFormat::Mjpg => {
        let image = image::load_from_memory_with_format(buffer, image::ImageFormat::Jpeg)?;
        return Ok(Frame::from(&image.to_rgb8()));
      }
    };
    Ok(Frame::new(width, height, Channels::Bgr, data)?)
  }
}

fn yuv_to_bgr(y: f32, u: f32, v: f32) -> [u8; 3] {
  let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
  let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
  let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
  [b, g, r]
}

// 每 4 字节 (Y0 U Y1 V) 对应两个像素
fn yuyv_to_bgr(yuyv: &[u8], pixels: usize) -> Vec<u8> {
  let mut bgr = Vec::with_capacity(pixels * 3);
  for chunk in yuyv.chunks_exact(4).take(pixels / 2) {
    let u = chunk[1] as f32 - 128.0;
    let v = chunk[3] as f32 - 128.0;
    bgr.extend_from_slice(&yuv_to_bgr(chunk[0] as f32, u, v));
    bgr.extend_from_slice(&yuv_to_bgr(chunk[2] as f32, u, v));
  }
  bgr
}

/// 默认摄像头输入，逐帧产生 BGR 帧
pub struct V4lInput {
  stream: Stream<'static>,
  _device: Device,
  format: PixelFormat,
  width: u32,
  height: u32,
}

impl FromUrlWithScheme for V4lInput {
  const SCHEME: &'static str = "v4l";
}

impl FromUrl for V4lInput {
  type Error = V4lInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(V4lInputError::SchemeMismatch);
    }

    // v4l:///dev/video0 或 v4l: （默认设备）
    let path = url_file_path(url);
    let path = if path.as_os_str().is_empty() || path == Path::new("/") {
      PathBuf::from(DEFAULT_DEVICE)
    } else {
      path
    };

    Self::open(path)
  }
}

impl V4lInput {
  /// 打开并协商格式。设备不存在、被占用或不是采集设备时返回 `DeviceUnavailable`。
  pub fn open(device_path: impl Into<PathBuf>) -> Result<Self, V4lInputError> {
    let device_path = device_path.into();
    if !device_path.exists() {
      return Err(V4lInputError::DeviceUnavailable {
        path: device_path,
        reason: "设备节点不存在".to_string(),
      });
    }

    Self::negotiate(&device_path).map_err(|e| match e {
      V4lInputError::V4lError(_) | V4lInputError::UnsupportedPixelFormat(_) => {
        V4lInputError::DeviceUnavailable {
          path: device_path.clone(),
          reason: e.to_string(),
        }
      }
      other => other,
    })
  }

  fn negotiate(device_path: &Path) -> Result<Self, V4lInputError> {
    let device = Device::with_path(device_path)?;

    let mut format = device.format()?;
    format.fourcc = FourCC::new(b"BGR3");
    let format = device.set_format(&format)?;
    let pixel_format = PixelFormat::from_fourcc(format.fourcc)?;
    if pixel_format != PixelFormat::Bgr3 {
      warn!("摄像头不支持 BGR3，改用 {} 并在读取时转换", format.fourcc);
    }

    let stream = Stream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT)?;
    info!(
      "打开摄像头 {}: {}x{} {}",
      device_path.display(),
      format.width,
      format.height,
      format.fourcc
    );

    Ok(Self {
      stream,
      _device: device,
      format: pixel_format,
      width: format.width,
      height: format.height,
    })
  }

  pub fn capture_frame(&mut self) -> Result<Frame, V4lInputError> {
    let (buffer, _meta) = self.stream.next()?;
    self.format.to_frame(buffer, self.width, self.height)
  }
}

impl Iterator for V4lInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    match self.capture_frame() {
      Ok(frame) => Some(frame),
      Err(e) => {
        error!("无法捕获帧: {}", e);
        None
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_device_is_unavailable() {
    let url = Url::parse("v4l:///dev/jianshi-no-such-video").unwrap();
    assert!(matches!(
      V4lInput::from_url(&url),
      Err(V4lInputError::DeviceUnavailable { .. })
    ));
  }

  #[test]
  fn non_capture_node_is_unavailable() {
    let url = Url::parse("v4l:///dev/null").unwrap();
    assert!(matches!(
      V4lInput::from_url(&url),
      Err(V4lInputError::DeviceUnavailable { path, .. }) if path == Path::new("/dev/null")
    ));
  }

  #[test]
  fn wrong_scheme_is_rejected() {
    let url = Url::parse("image:///dev/video0").unwrap();
    assert!(matches!(
      V4lInput::from_url(&url),
      Err(V4lInputError::SchemeMismatch)
    ));
  }

  #[test]
  fn rgb3_is_swapped_to_bgr() {
    let frame = PixelFormat::Rgb3
      .to_frame(&[1, 2, 3, 4, 5, 6], 2, 1)
      .unwrap();
    assert_eq!(frame.as_ref(), &[3, 2, 1, 6, 5, 4]);
  }

  #[test]
  fn yuyv_gray_stays_gray() {
    // U = V = 128 时没有色度
    let frame = PixelFormat::Yuyv
      .to_frame(&[100, 128, 200, 128], 2, 1)
      .unwrap();
    assert_eq!(frame.as_ref(), &[100, 100, 100, 200, 200, 200]);
  }

  #[test]
  fn short_buffer_is_an_error() {
    assert!(matches!(
      PixelFormat::Bgr3.to_frame(&[0; 5], 2, 1),
      Err(V4lInputError::Frame(FrameError::LengthMismatch { .. }))
    ));
  }
}
