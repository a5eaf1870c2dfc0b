// 该文件是 Jianshi （鉴识） 项目的一部分。
// src/output/console_output.rs - 控制台输出
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

use std::{
  io::{self, Write},
  sync::Mutex,
};

use thiserror::Error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  model::{ClassifyResult, Prediction},
  output::Render,
};

#[derive(Error, Debug)]
pub enum ConsoleOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] io::Error),
  #[error("输出锁已损坏")]
  Poisoned,
}

/// 一行预测：四位小数的分数，后跟带引号的标签
pub fn format_prediction(prediction: &Prediction) -> String {
  format!("{:.4} - \"{}\"", prediction.score, prediction.label)
}

/// 把预测逐行写到标准输出（或任意 writer）
pub struct ConsoleOutput<W = io::Stdout> {
  writer: Mutex<W>,
  separate: bool,
}

impl FromUrlWithScheme for ConsoleOutput {
  const SCHEME: &'static str = "console";
}

impl FromUrl for ConsoleOutput {
  type Error = ConsoleOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ConsoleOutputError::SchemeMismatch);
    }
    let separate = url.query_pairs().any(|(k, _)| k == "separate");
    Ok(ConsoleOutput::stdout().with_separator(separate))
  }
}

impl ConsoleOutput {
  pub fn stdout() -> Self {
    Self::new(io::stdout())
  }
}

impl<W: Write> ConsoleOutput<W> {
  pub fn new(writer: W) -> Self {
    Self {
      writer: Mutex::new(writer),
      separate: false,
    }
  }

  /// 每组预测前先输出一个空行，用于区分连续的摄像头帧
  pub fn with_separator(mut self, separate: bool) -> Self {
    self.separate = separate;
    self
  }

  pub fn write_result(&self, result: &ClassifyResult) -> Result<(), ConsoleOutputError> {
    let mut writer = self
      .writer
      .lock()
      .map_err(|_| ConsoleOutputError::Poisoned)?;
    if self.separate {
      writeln!(writer)?;
    }
    for prediction in result.iter() {
      writeln!(writer, "{}", format_prediction(prediction))?;
    }
    writer.flush()?;
    Ok(())
  }

  pub fn into_inner(self) -> Result<W, ConsoleOutputError> {
    self
      .writer
      .into_inner()
      .map_err(|_| ConsoleOutputError::Poisoned)
  }
}

impl<W: Write> Render<Frame, ClassifyResult> for ConsoleOutput<W> {
  type Error = ConsoleOutputError;

  fn render_result(&self, _frame: &Frame, result: &ClassifyResult) -> Result<(), Self::Error> {
    self.write_result(result)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::Channels;

  fn result() -> ClassifyResult {
    ClassifyResult {
      items: vec![
        Prediction {
          label: "n02123045 tabby, tabby cat".to_string(),
          score: 0.3134,
        },
        Prediction {
          label: "n02124075 Egyptian cat".to_string(),
          score: 0.08,
        },
      ]
      .into_boxed_slice(),
    }
  }

  #[test]
  fn prediction_line_format() {
    let p = Prediction {
      label: "n02123159 tiger cat".to_string(),
      score: 0.23473,
    };
    assert_eq!(format_prediction(&p), "0.2347 - \"n02123159 tiger cat\"");
  }

  #[test]
  fn writes_one_line_per_prediction() {
    let output = ConsoleOutput::new(Vec::new());
    let frame = Frame::filled(1, 1, Channels::Gray, &[0]).unwrap();
    output.render_result(&frame, &result()).unwrap();
    let text = String::from_utf8(output.into_inner().unwrap()).unwrap();
    assert_eq!(
      text,
      "0.3134 - \"n02123045 tabby, tabby cat\"\n0.0800 - \"n02124075 Egyptian cat\"\n"
    );
  }

  #[test]
  fn separator_adds_blank_line_per_frame() {
    let output = ConsoleOutput::new(Vec::new()).with_separator(true);
    output.write_result(&result()).unwrap();
    output.write_result(&result()).unwrap();
    let text = String::from_utf8(output.into_inner().unwrap()).unwrap();
    assert_eq!(text.lines().filter(|l| l.is_empty()).count(), 2);
    assert!(text.starts_with('\n'));
  }

  #[test]
  fn url_enables_separator() {
    let url = Url::parse("console:?separate").unwrap();
    assert!(ConsoleOutput::from_url(&url).unwrap().separate);
  }
}
