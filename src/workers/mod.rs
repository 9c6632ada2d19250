// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 批处理编排与完整的资源生成流水线
pub mod orchestrator;
pub mod pipeline;

pub use orchestrator::{BatchConfig, BatchOrchestrator, BatchRun};
pub use pipeline::{Pipeline, PipelineOptions};
