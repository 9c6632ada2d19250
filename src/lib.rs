// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 命令行模块
///
/// 子命令定义与分派
pub mod cli;

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含核心实体、资源生成器、服务和仓库接口
pub mod domain;

/// 引擎模块
///
/// 浏览器引擎抽象、会话与页面定位
pub mod engines;

/// 基础设施模块
///
/// 对象存储、资源仓库、数据文件与指标导出
pub mod infrastructure;

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
pub mod utils;

/// 工作器模块
///
/// 批处理编排与完整流水线
pub mod workers;
