// 该文件是 Jianshi （鉴识） 项目的一部分。
// src/model/tract_engine.rs - tract ONNX 推理引擎
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

use std::path::PathBuf;

use thiserror::Error;
use tract_onnx::prelude::*;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{InferenceEngine, InputGeometry},
  url_file_path,
};

#[derive(Error, Debug)]
pub enum TractEngineError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("模型文件不存在: {}", .0.display())]
  ModelNotFound(PathBuf),
  #[error("tract 错误: {0}")]
  Tract(#[from] TractError),
}

type Plan = TypedRunnableModel<TypedModel>;

/// 由 tract 执行的 ONNX 网络，输入形状在加载时固定
pub struct TractEngine {
  plan: Plan,
  geometry: InputGeometry,
}

pub struct TractEngineBuilder {
  model_path: PathBuf,
  geometry: Option<InputGeometry>,
  optimize: bool,
}

impl FromUrlWithScheme for TractEngineBuilder {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for TractEngineBuilder {
  type Error = TractEngineError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(TractEngineError::SchemeMismatch(format!(
        "模型路径必须使用 {} 方案, 实际为 {}",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let optimize = !url
      .query_pairs()
      .any(|(k, v)| k == "optimize" && (v == "false" || v == "0"));

    Ok(TractEngineBuilder {
      model_path: url_file_path(url),
      geometry: None,
      optimize,
    })
  }
}

impl TractEngineBuilder {
  pub fn geometry(mut self, geometry: InputGeometry) -> Self {
    self.geometry = Some(geometry);
    self
  }

  pub fn optimize(mut self, optimize: bool) -> Self {
    self.optimize = optimize;
    self
  }

  pub fn build(self) -> Result<TractEngine, TractEngineError> {
    if !self.model_path.is_file() {
      return Err(TractEngineError::ModelNotFound(self.model_path));
    }

    info!("加载模型文件: {}", self.model_path.display());
    let model = tract_onnx::onnx().model_for_path(&self.model_path)?;
    self.build_from(model)
  }

  /// 未指定输入尺寸时使用模型自带的输入形状
  fn build_from(self, mut model: InferenceModel) -> Result<TractEngine, TractEngineError> {
    let geometry = match self.geometry {
      Some(geometry) => geometry,
      None => {
        debug!("从模型读取输入形状");
        geometry_from_model(&model)?
      }
    };
    info!("网络输入形状: {}", geometry);

    model.set_input_fact(0, f32::fact(geometry.shape()).into())?;

    let model = if self.optimize {
      debug!("优化模型");
      model.into_optimized()?
    } else {
      model.into_typed()?.into_decluttered()?
    };

    for (ix, outlet) in model.output_outlets()?.iter().enumerate() {
      debug!("模型输出 {}: {:?}", ix, model.outlet_fact(*outlet)?);
    }

    let plan = model.into_runnable()?;
    info!("模型加载完成");

    Ok(TractEngine { plan, geometry })
  }
}

// 模型自带固定输入形状时直接使用，例如 caffenet 的 1x3x227x227
fn geometry_from_model(model: &InferenceModel) -> Result<InputGeometry, TractEngineError> {
  let fact = model.input_fact(0)?;
  let shape = fact
    .shape
    .as_concrete_finite()?
    .ok_or_else(|| anyhow::anyhow!("模型输入形状不固定，需要显式指定输入尺寸: {:?}", fact))?;

  match shape.as_slice() {
    &[1, c, h, w] => InputGeometry::new(c, h as u32, w as u32)
      .map_err(|e| TractEngineError::Tract(anyhow::anyhow!("模型输入形状无效: {}", e))),
    other => Err(TractEngineError::Tract(anyhow::anyhow!(
      "期望 NCHW 输入且批大小为 1, 实际为 {:?}",
      other
    ))),
  }
}

impl InferenceEngine for TractEngine {
  fn geometry(&self) -> InputGeometry {
    self.geometry
  }

  fn forward(&self, input: Tensor) -> TractResult<Vec<f32>> {
    let outputs = self.plan.run(tvec!(input.into()))?;
    let first = outputs
      .first()
      .ok_or_else(|| anyhow::anyhow!("模型没有输出"))?;
    Ok(first.to_array_view::<f32>()?.iter().copied().collect())
  }
}
