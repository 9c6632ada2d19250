// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;

/// 可注入的等待能力
///
/// 重试退避与批次间隔都通过它等待，测试中可以替换为记录型实现。
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// 基于 tokio 定时器的实现
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// 只记录等待时长、不真正等待的实现
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    calls: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按调用顺序返回全部等待时长
    pub fn sleeps(&self) -> Vec<Duration> {
        self.calls.lock().clone()
    }

    pub fn count_of(&self, duration: Duration) -> usize {
        self.calls.lock().iter().filter(|d| **d == duration).count()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.calls.lock().push(duration);
        tokio::task::yield_now().await;
    }
}
