// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含系统的核心业务逻辑，包括：
/// - 错误类型（errors）：领域错误与校验错误
/// - 领域模型（models）：网站、凭据、资源与批处理结果
/// - 资源生成器（generators）：截图、Logo、Favicon 的生成与回退
/// - 仓库接口（repositories）：资源与二进制存储的抽象接口
/// - 服务（services）：凭据存储与图片优化
///
/// 领域层不依赖具体的浏览器或存储实现，只依赖 engines 中定义的接口。
pub mod errors;
pub mod generators;
pub mod models;
pub mod repositories;
pub mod services;
