// 该文件是 Jianshi （鉴识） 项目的一部分。
// src/model/top_n.rs - Top-N 选择
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

use std::cmp::Ordering;

// 降序，NaN 排在所有数值之后
fn descending(a: &(f32, usize), b: &(f32, usize)) -> Ordering {
  match (a.0.is_nan(), b.0.is_nan()) {
    (true, true) => Ordering::Equal,
    (true, false) => Ordering::Greater,
    (false, true) => Ordering::Less,
    (false, false) => b.0.total_cmp(&a.0),
  }
}

/// 返回分数最高的 `n` 个下标，按分数降序排列。
///
/// `n` 超过 `scores` 长度时截断。相同分数之间的先后顺序不作保证。
pub fn top_n(scores: &[f32], n: usize) -> Vec<usize> {
  let n = n.min(scores.len());
  if n == 0 {
    return Vec::new();
  }

  let mut pairs: Vec<(f32, usize)> = scores.iter().copied().zip(0..).collect();
  pairs.select_nth_unstable_by(n - 1, descending);
  pairs.truncate(n);
  pairs.sort_unstable_by(descending);
  pairs.into_iter().map(|(_, i)| i).collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;

  #[test]
  fn picks_highest_scores() {
    let scores = [0.1, 0.7, 0.05, 0.9, 0.15];
    assert_eq!(top_n(&scores, 3), vec![3, 1, 4]);
  }

  #[test]
  fn n_is_clamped_to_length() {
    let scores = [0.3, 0.2];
    assert_eq!(top_n(&scores, 10), vec![0, 1]);
    assert!(top_n(&scores, 0).is_empty());
    assert!(top_n(&[], 5).is_empty());
  }

  #[test]
  fn nan_sorts_last() {
    let scores = [f32::NAN, -1.0, 2.0];
    assert_eq!(top_n(&scores, 3), vec![2, 1, 0]);
  }

  #[test]
  fn raw_logits_are_supported() {
    let scores = [-3.5, -0.25, -10.0, 4.0];
    assert_eq!(top_n(&scores, 2), vec![3, 1]);
  }

  proptest! {
    #[test]
    fn matches_full_sort(
      scores in prop::collection::vec(-1000.0f32..1000.0, 1..300),
      n in 0usize..320,
    ) {
      let picked = top_n(&scores, n);
      let expected_len = n.min(scores.len());
      prop_assert_eq!(picked.len(), expected_len);

      let picked_scores: Vec<f32> = picked.iter().map(|&i| scores[i]).collect();
      prop_assert!(picked_scores.windows(2).all(|w| w[0] >= w[1]));

      let mut sorted = scores.clone();
      sorted.sort_by(|a, b| b.total_cmp(a));
      prop_assert_eq!(picked_scores, sorted[..expected_len].to_vec());

      let mut unique = picked.clone();
      unique.sort_unstable();
      unique.dedup();
      prop_assert_eq!(unique.len(), picked.len());
    }
  }
}
