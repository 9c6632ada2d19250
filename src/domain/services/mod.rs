// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含的服务：
/// - 凭据存储（credential_store）：网站 id 到认证配置的内存映射
/// - 图片优化器（optimizer）：缩放与重新编码位图资源
pub mod credential_store;
pub mod optimizer;
