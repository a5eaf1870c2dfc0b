// 该文件是 Jianshi （鉴识） 项目的一部分。
// src/model/labels.rs - 标签列表
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
  fs::File,
  io::{BufRead, BufReader},
  path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, url_file_path};

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("无法打开标签文件 {}: {source}", .path.display())]
  Open {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("读取标签文件失败: {0}")]
  Read(#[from] std::io::Error),
}

/// 按行排列的标签，第 i 行对应网络输出的第 i 个分数
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelList {
  labels: Box<[String]>,
}

impl FromUrlWithScheme for LabelList {
  const SCHEME: &'static str = "labels";
}

impl FromUrl for LabelList {
  type Error = LabelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(LabelError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }
    Self::from_path(url_file_path(url))
  }
}

impl LabelList {
  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LabelError> {
    let path = path.as_ref();
    info!("加载标签文件: {}", path.display());
    let file = File::open(path).map_err(|source| LabelError::Open {
      path: path.to_path_buf(),
      source,
    })?;
    let labels = Self::from_reader(BufReader::new(file))?;
    info!("已加载 {} 个标签", labels.len());
    if labels.is_empty() {
      warn!("标签文件为空: {}", path.display());
    }
    Ok(labels)
  }

  pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, LabelError> {
    let labels = reader
      .lines()
      .map(|line| line.map(|l| l.trim_end_matches('\r').to_string()))
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Self {
      labels: labels.into_boxed_slice(),
    })
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  pub fn get(&self, index: usize) -> Option<&str> {
    self.labels.get(index).map(String::as_str)
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.labels.iter().map(String::as_str)
  }
}

impl<S: Into<String>> FromIterator<S> for LabelList {
  fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
    Self {
      labels: iter.into_iter().map(Into::into).collect(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn lines_keep_their_order() {
    let text = "n01440764 tench, Tinca tinca\nn01443537 goldfish\r\nn01484850 great white shark\n";
    let labels = LabelList::from_reader(text.as_bytes()).unwrap();
    assert_eq!(labels.len(), 3);
    assert_eq!(labels.get(0), Some("n01440764 tench, Tinca tinca"));
    assert_eq!(labels.get(1), Some("n01443537 goldfish"));
    assert_eq!(labels.get(2), Some("n01484850 great white shark"));
    assert_eq!(labels.get(3), None);
  }

  #[test]
  fn loads_from_url() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "cat").unwrap();
    writeln!(file, "dog").unwrap();
    let url = Url::from_file_path(file.path()).unwrap();
    let url = Url::parse(&format!("labels://{}", url.path())).unwrap();

    let labels = LabelList::from_url(&url).unwrap();
    assert_eq!(labels.iter().collect::<Vec<_>>(), vec!["cat", "dog"]);
  }

  #[test]
  fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = LabelList::from_path(dir.path().join("missing.txt")).unwrap_err();
    assert!(matches!(err, LabelError::Open { .. }));
  }

  #[test]
  fn wrong_scheme_is_rejected() {
    let url = Url::parse("image:///tmp/labels.txt").unwrap();
    assert!(matches!(
      LabelList::from_url(&url),
      Err(LabelError::SchemeMismatch(_))
    ));
  }
}
