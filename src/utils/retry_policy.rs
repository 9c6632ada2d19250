// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;

/// 重试策略配置
///
/// 线性退避：第 k 次失败后等待 `backoff_base * k`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 最大尝试次数（至少为 1）
    pub max_attempts: u32,
    /// 退避基数
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
        }
    }

    /// 第 `attempt` 次失败之后的退避时间
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(attempt)
    }

    /// 已尝试 `attempt` 次后是否还能继续
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// 创建一次新的重试状态
    pub fn start(&self) -> RetryState {
        RetryState {
            policy: *self,
            attempts: 0,
        }
    }
}

/// 一次失败之后的决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// 等待 `delay` 后进行下一次尝试
    Retry { delay: Duration },
    /// 放弃，共尝试了 `attempts` 次
    GiveUp { attempts: u32 },
}

/// 单个条目的重试状态机
///
/// `begin_attempt` 与 `on_failure` 交替调用；次数与延迟完全由状态决定，
/// 调用方负责真正的等待。
#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    attempts: u32,
}

impl RetryState {
    /// 记录一次新的尝试，返回当前是第几次
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// 当前尝试失败
    ///
    /// 错误不可重试或次数已用尽时放弃。
    pub fn on_failure(&mut self, retryable: bool) -> RetryDecision {
        if retryable && self.policy.should_retry(self.attempts) {
            RetryDecision::Retry {
                delay: self.policy.calculate_backoff(self.attempts),
            }
        } else {
            RetryDecision::GiveUp {
                attempts: self.attempts,
            }
        }
    }
}

/// 根据错误信息判断是否为暂时性错误
pub fn is_retryable_error(message: &str) -> bool {
    let error_string = message.to_lowercase();

    // 网络相关错误可重试
    let retryable_patterns = [
        "timeout",
        "timed out",
        "connection reset",
        "connection refused",
        "dns error",
        "500 internal server error",
        "502 bad gateway",
        "503 service unavailable",
        "504 gateway timeout",
        "network is unreachable",
        "broken pipe",
        "too many connections",
        "rate limit",
        "net::err_",
    ];

    retryable_patterns.iter().any(|&p| error_string.contains(p))
}
