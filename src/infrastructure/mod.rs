// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 领域层抽象的具体实现：对象存储、资源仓库、数据文件读写与指标导出。
///
/// 包含的子模块：
/// - 资源仓库实现（asset_repo_impl）
/// - 网站目录（catalog）
/// - 凭据文件（credential_file）
/// - 指标（metrics）
/// - 构建报告（report）
/// - 存储（storage）
pub mod asset_repo_impl;
pub mod catalog;
pub mod credential_file;
pub mod json_file;
pub mod metrics;
pub mod report;
pub mod storage;
