// 该文件是 Jianshi （鉴识） 项目的一部分。
// src/output/gstreamer_preview_output.rs - GStreamer 实时预览窗口
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

//! # GStreamer 预览输出
//!
//! 把摄像头帧推送到 `autovideosink`，在桌面上显示一个实时窗口。
//!
//! ## URL Scheme
//!
//! `preview:`，可选参数 `sink` 指定其他 sink 元素，例如
//! `preview:?sink=ximagesink`。
//!
//! 帧尺寸或通道数变化时会重新设置 caps。

use std::sync::Mutex;

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Channels, Frame},
  model::ClassifyResult,
  output::Render,
};

#[derive(Error, Debug)]
pub enum GStreamerPreviewOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("GStreamer 错误: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  #[error("GStreamer 操作失败: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  #[error("无法获取 appsrc 元素")]
  AppSrcNotFound,
  #[error("管道错误: {0}")]
  PipelineError(String),
  #[error("状态切换错误: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
  #[error("推送缓冲区失败: {0}")]
  FlowError(#[from] gst::FlowError),
}

const DEFAULT_SINK: &str = "autovideosink";

fn video_format(channels: Channels) -> gst_video::VideoFormat {
  match channels {
    Channels::Gray => gst_video::VideoFormat::Gray8,
    Channels::Bgr => gst_video::VideoFormat::Bgr,
    Channels::Bgra => gst_video::VideoFormat::Bgra,
  }
}

pub struct GStreamerPreviewOutput {
  pipeline: gst::Pipeline,
  appsrc: gst_app::AppSrc,
  info: Mutex<Option<gst_video::VideoInfo>>,
}

impl FromUrlWithScheme for GStreamerPreviewOutput {
  const SCHEME: &'static str = "preview";
}

impl FromUrl for GStreamerPreviewOutput {
  type Error = GStreamerPreviewOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(GStreamerPreviewOutputError::SchemeMismatch);
    }

    let sink = url
      .query_pairs()
      .find(|(k, _)| k == "sink")
      .map(|(_, v)| v.into_owned())
      .unwrap_or_else(|| DEFAULT_SINK.to_string());

    gst::init()?;

    let pipeline_desc = format!(
      "appsrc name=src is-live=true do-timestamp=true format=time ! videoconvert ! {} sync=false",
      sink
    );
    info!("创建预览管道: {}", pipeline_desc);

    let pipeline = gst::parse::launch(&pipeline_desc)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerPreviewOutputError::PipelineError("无法创建管道".to_string()))?;

    let appsrc = pipeline
      .by_name("src")
      .ok_or(GStreamerPreviewOutputError::AppSrcNotFound)?
      .downcast::<gst_app::AppSrc>()
      .map_err(|_| GStreamerPreviewOutputError::AppSrcNotFound)?;

    pipeline.set_state(gst::State::Playing)?;

    Ok(GStreamerPreviewOutput {
      pipeline,
      appsrc,
      info: Mutex::new(None),
    })
  }
}

impl Drop for GStreamerPreviewOutput {
  fn drop(&mut self) {
    let _ = self.appsrc.end_of_stream();
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("无法停止预览管道: {}", e);
    }
    info!("预览窗口已关闭");
  }
}

impl GStreamerPreviewOutput {
  // 尺寸或格式变化时更新 caps
  fn video_info(&self, frame: &Frame) -> Result<gst_video::VideoInfo, GStreamerPreviewOutputError> {
    let mut current = self
      .info
      .lock()
      .map_err(|_| GStreamerPreviewOutputError::PipelineError("状态锁已损坏".to_string()))?;

    let format = video_format(frame.channels());
    let unchanged = current.as_ref().filter(|info| {
      info.width() == frame.width() && info.height() == frame.height() && info.format() == format
    });
    if let Some(info) = unchanged {
      return Ok(info.clone());
    }

    let info = gst_video::VideoInfo::builder(format, frame.width(), frame.height()).build()?;
    self.appsrc.set_caps(Some(&info.to_caps()?));
    debug!("预览 caps: {}x{} {:?}", frame.width(), frame.height(), format);
    *current = Some(info.clone());
    Ok(info)
  }

  fn push_frame(&self, frame: &Frame) -> Result<(), GStreamerPreviewOutputError> {
    let info = self.video_info(frame)?;
    let row = frame.width() as usize * frame.channels().count();
    let stride = info.stride()[0] as usize;

    let mut buffer = gst::Buffer::with_size(info.size())?;
    {
      let buffer = buffer
        .get_mut()
        .ok_or_else(|| GStreamerPreviewOutputError::PipelineError("缓冲区不可写".to_string()))?;
      let mut map = buffer
        .map_writable()
        .map_err(|_| GStreamerPreviewOutputError::PipelineError("无法映射缓冲区".to_string()))?;
      // gstreamer 的行宽按 4 字节对齐
      for (dst, src) in map
        .as_mut_slice()
        .chunks_mut(stride)
        .zip(frame.as_ref().chunks_exact(row))
      {
        dst[..row].copy_from_slice(src);
      }
    }

    self.appsrc.push_buffer(buffer)?;
    Ok(())
  }
}

impl Render<Frame, ClassifyResult> for GStreamerPreviewOutput {
  type Error = GStreamerPreviewOutputError;

  fn render_result(&self, frame: &Frame, _result: &ClassifyResult) -> Result<(), Self::Error> {
    self.push_frame(frame)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn wrong_scheme_is_rejected() {
    let url = Url::parse("folder:///tmp").unwrap();
    assert!(matches!(
      GStreamerPreviewOutput::from_url(&url),
      Err(GStreamerPreviewOutputError::SchemeMismatch)
    ));
  }

  #[test]
  fn channel_layouts_map_to_video_formats() {
    assert_eq!(video_format(Channels::Gray), gst_video::VideoFormat::Gray8);
    assert_eq!(video_format(Channels::Bgr), gst_video::VideoFormat::Bgr);
    assert_eq!(video_format(Channels::Bgra), gst_video::VideoFormat::Bgra);
  }
}
