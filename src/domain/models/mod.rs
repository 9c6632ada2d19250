// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 资源（asset）：生成的截图、Logo、Favicon 及其元数据
/// - 批处理结果（batch）：一次运行的成功/失败汇总与构建报告
/// - 凭据（credential）：网站的认证配置
/// - 网站（website）：目录中的站点及其处理状态
pub mod asset;
pub mod batch;
pub mod credential;
pub mod website;
