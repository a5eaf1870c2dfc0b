// 该文件是 Jianshi （鉴识） 项目的一部分。
// src/output.rs - 输出定义
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
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame, model::ClassifyResult};

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

impl<F, D, R: Render<F, D>> Render<F, D> for &R {
  type Error = R::Error;

  fn render_result(&self, frame: &F, result: &D) -> Result<(), Self::Error> {
    (**self).render_result(frame, result)
  }
}

/// 依次交给每个输出，遇到第一个错误即返回
impl<F, D, R: Render<F, D>> Render<F, D> for Vec<R> {
  type Error = R::Error;

  fn render_result(&self, frame: &F, result: &D) -> Result<(), Self::Error> {
    self
      .iter()
      .try_for_each(|output| output.render_result(frame, result))
  }
}

mod console_output;
pub use self::console_output::{ConsoleOutput, ConsoleOutputError, format_prediction};

#[cfg(feature = "gstreamer_output")]
mod gstreamer_preview_output;
#[cfg(feature = "gstreamer_output")]
pub use self::gstreamer_preview_output::{GStreamerPreviewOutput, GStreamerPreviewOutputError};

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("控制台输出错误: {0}")]
  ConsoleOutputError(#[from] ConsoleOutputError),
  #[cfg(feature = "gstreamer_output")]
  #[error("GStreamer 预览输出错误: {0}")]
  GStreamerPreviewOutputError(#[from] GStreamerPreviewOutputError),
  #[cfg(feature = "directory_record")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper {
  ConsoleOutput(ConsoleOutput),
  #[cfg(feature = "gstreamer_output")]
  GStreamerPreviewOutput(GStreamerPreviewOutput),
  #[cfg(feature = "directory_record")]
  DirectoryRecordOutput(DirectoryRecordOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      <ConsoleOutput>::SCHEME => Ok(OutputWrapper::ConsoleOutput(ConsoleOutput::from_url(url)?)),
      #[cfg(feature = "gstreamer_output")]
      GStreamerPreviewOutput::SCHEME => {
        let output = GStreamerPreviewOutput::from_url(url)?;
        Ok(OutputWrapper::GStreamerPreviewOutput(output))
      }
      #[cfg(feature = "directory_record")]
      DirectoryRecordOutput::SCHEME => {
        let output = DirectoryRecordOutput::from_url(url)?;
        Ok(OutputWrapper::DirectoryRecordOutput(output))
      }
      other => Err(OutputError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Render<Frame, ClassifyResult> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, frame: &Frame, result: &ClassifyResult) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::ConsoleOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      #[cfg(feature = "gstreamer_output")]
      OutputWrapper::GStreamerPreviewOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn console_scheme_is_dispatched() {
    let url = Url::parse("console:").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Ok(OutputWrapper::ConsoleOutput(_))
    ));
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = Url::parse("rtsp://0.0.0.0:8554/live").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Err(OutputError::SchemeMismatch(s)) if s == "rtsp"
    ));
  }

  #[test]
  fn every_sink_in_a_list_is_rendered() {
    let sinks = vec![
      ConsoleOutput::new(Vec::new()),
      ConsoleOutput::new(Vec::new()).with_separator(true),
    ];
    let frame = Frame::filled(1, 1, crate::frame::Channels::Gray, &[0]).unwrap();
    let result = ClassifyResult::default();
    (&sinks).render_result(&frame, &result).unwrap();

    let written: Vec<Vec<u8>> = sinks
      .into_iter()
      .map(|s| s.into_inner().unwrap())
      .collect();
    assert_eq!(written, vec![Vec::new(), b"\n".to_vec()]);
  }
}
