// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 浏览器引擎模块
///
/// - traits：引擎与页面的能力接口
/// - chromium_engine：基于 chromiumoxide 的实现
/// - session：单次网站访问的会话（导航、登录、截图、资源定位）
/// - locators：按优先级排列的候选选择器
/// - validators：URL 校验
pub mod chromium_engine;
pub mod locators;
pub mod session;
pub mod traits;
pub mod validators;
