// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::WorkerSettings;
use crate::queue::llm_queue::LlmQueue;
use crate::utils::errors::WorkerError;
use crate::workers::worker::Worker;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// 队列触发句柄
///
/// 入队后调用 `fire` 唤醒后台工作器。没有等待者时信号会被保留，
/// 因此不会丢失唤醒。
#[derive(Clone)]
pub struct QueueTrigger {
    notify: Arc<Notify>,
}

impl QueueTrigger {
    pub fn fire(&self) {
        self.notify.notify_one();
    }
}

/// LLM队列后台工作器
///
/// 反复调用 `tick` 直到队列中没有未完成的条目。排空过程由互斥锁保护，
/// 同一时刻至多只有一个 `tick` 在执行。
pub struct LlmQueueWorker<Q>
where
    Q: LlmQueue + 'static,
{
    queue: Arc<Q>,
    notify: Arc<Notify>,
    drain_lock: Arc<Mutex<()>>,
    poll_interval: Duration,
    idle_interval: Duration,
    max_ticks_per_drain: u32,
}

impl<Q> LlmQueueWorker<Q>
where
    Q: LlmQueue + 'static,
{
    pub fn new(queue: Arc<Q>, settings: &WorkerSettings) -> Self {
        Self {
            queue,
            notify: Arc::new(Notify::new()),
            drain_lock: Arc::new(Mutex::new(())),
            poll_interval: settings.poll_interval(),
            idle_interval: settings.idle_interval(),
            max_ticks_per_drain: settings.max_ticks_per_drain,
        }
    }

    /// 获取触发句柄
    pub fn trigger(&self) -> QueueTrigger {
        QueueTrigger {
            notify: self.notify.clone(),
        }
    }

    /// 排空队列
    ///
    /// `tick` 返回 `false` 时若仍有未完成条目（冷却中或等待卡住恢复），
    /// 则等待一个轮询间隔后重试；没有未完成条目时结束。
    ///
    /// # 返回值
    ///
    /// * `Ok(u32)` - 本次排空处理的条目数
    /// * `Err(WorkerError)` - 存储不可用
    pub async fn drain(&self) -> Result<u32, WorkerError> {
        let _guard = self.drain_lock.lock().await;
        let mut processed = 0;

        for _ in 0..self.max_ticks_per_drain {
            if self.queue.tick().await? {
                processed += 1;
                continue;
            }

            if !self.queue.has_unfinished_work().await? {
                break;
            }

            tokio::time::sleep(self.poll_interval).await;
        }

        Ok(processed)
    }

    /// 启动后台运行
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.run().await {
                error!("LLM queue worker stopped: {}", e);
            }
        })
    }
}

#[async_trait]
impl<Q> Worker for LlmQueueWorker<Q>
where
    Q: LlmQueue + 'static,
{
    async fn run(&self) -> Result<(), WorkerError> {
        info!("LLM queue worker started");

        loop {
            tokio::select! {
                _ = self.notify.notified() => debug!("LLM queue worker triggered"),
                _ = tokio::time::sleep(self.idle_interval) => {}
            }

            match self.drain().await {
                Ok(count) if count > 0 => info!("Drained {} LLM queue entries", count),
                Ok(_) => {}
                Err(e) => error!("Failed to drain LLM queue: {}", e),
            }
        }
    }

    fn name(&self) -> &str {
        "llm_queue_worker"
    }
}

#[cfg(test)]
#[path = "llm_queue_worker_test.rs"]
mod tests;
