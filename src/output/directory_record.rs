// 该文件是 Jianshi （鉴识） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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
  fs,
  path::{Path, PathBuf},
  sync::atomic::{AtomicU16, Ordering},
};

use chrono::{DateTime, Datelike, Utc};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  model::ClassifyResult,
  output::Render,
  url_file_path,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 把每一帧保存为 PNG，并在旁边写一个同名的 JSON 记录预测结果。
///
/// 目录结构为 `<root>/<年>/<月>/<日>/<时-分-秒>-<序号>.png`。
/// `?min_score=0.5` 只保存最高分不低于阈值的帧。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  min_score: Option<f32>,
  frame_counter: AtomicU16,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let min_score = uri
      .query_pairs()
      .find(|(k, _)| k == "min_score")
      .and_then(|(_, v)| v.parse().ok());

    Ok(DirectoryRecordOutput::new(url_file_path(uri)).with_min_score(min_score))
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl Into<PathBuf>) -> Self {
    Self {
      directory: directory.into(),
      min_score: None,
      frame_counter: AtomicU16::new(0),
    }
  }

  pub fn with_min_score(mut self, min_score: Option<f32>) -> Self {
    self.min_score = min_score;
    self
  }

  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  fn frame_path(&self, now: DateTime<Utc>) -> Result<PathBuf, DirectoryRecordOutputError> {
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }

  fn should_save(&self, result: &ClassifyResult) -> bool {
    match self.min_score {
      None => true,
      Some(min) => result.best().is_some_and(|p| p.score >= min),
    }
  }

  fn write_record(
    path: &Path,
    now: DateTime<Utc>,
    frame: &Frame,
    result: &ClassifyResult,
  ) -> Result<(), DirectoryRecordOutputError> {
    let predictions: Vec<_> = result
      .iter()
      .map(|p| json!({ "label": p.label, "score": p.score }))
      .collect();
    let record = json!({
      "time": now.to_rfc3339(),
      "width": frame.width(),
      "height": frame.height(),
      "channels": frame.channels().count(),
      "predictions": predictions,
    });
    fs::write(
      path.with_extension("json"),
      serde_json::to_string_pretty(&record)?,
    )?;
    Ok(())
  }
}

impl Render<Frame, ClassifyResult> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &Frame, result: &ClassifyResult) -> Result<(), Self::Error> {
    if !self.should_save(result) {
      return Ok(());
    }

    let now = Utc::now();
    let path = self.frame_path(now)?;
    frame.to_rgb_image().save(&path)?;
    Self::write_record(&path, now, frame, result)?;
    debug!("保存帧: {}", path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{frame::Channels, model::Prediction};

  fn result(score: f32) -> ClassifyResult {
    ClassifyResult {
      items: vec![Prediction {
        label: "n01440764 tench".to_string(),
        score,
      }]
      .into_boxed_slice(),
    }
  }

  fn saved_files(root: &Path, extension: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
      for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
          stack.push(path);
        } else if path.extension().is_some_and(|e| e == extension) {
          found.push(path);
        }
      }
    }
    found
  }

  #[test]
  fn saves_image_and_record() {
    let dir = tempfile::tempdir().unwrap();
    let output = DirectoryRecordOutput::new(dir.path());
    let frame = Frame::filled(4, 4, Channels::Bgr, &[0, 0, 255]).unwrap();
    output.render_result(&frame, &result(0.9)).unwrap();

    let images = saved_files(dir.path(), "png");
    assert_eq!(images.len(), 1);
    let saved = image::open(&images[0]).unwrap().to_rgb8();
    assert_eq!(saved.get_pixel(0, 0).0, [255, 0, 0]);

    let record: serde_json::Value =
      serde_json::from_str(&fs::read_to_string(images[0].with_extension("json")).unwrap())
        .unwrap();
    assert_eq!(record["predictions"][0]["label"], "n01440764 tench");
    assert_eq!(record["width"], 4);
  }

  #[test]
  fn min_score_filters_frames() {
    let dir = tempfile::tempdir().unwrap();
    let url = url::Url::parse(&format!("folder://{}?min_score=0.5", dir.path().display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    let frame = Frame::filled(2, 2, Channels::Gray, &[10]).unwrap();

    output.render_result(&frame, &result(0.1)).unwrap();
    assert!(saved_files(dir.path(), "png").is_empty());
    output.render_result(&frame, &result(0.7)).unwrap();
    assert_eq!(saved_files(dir.path(), "png").len(), 1);
  }
}
