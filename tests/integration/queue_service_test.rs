// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{
    build_queue, find_entry, find_task, insert_entry, insert_task, now, seconds_ago, setup_db,
    EntrySeed, ScriptedGenerator,
};
use chrono::Duration;
use llmq::config::settings::QueueSettings;
use llmq::domain::models::queue_entry::{QueueEntry, QueueStatus, FEATURE_XP_REWARD};
use llmq::domain::models::task_reward::TaskRewardUpdate;
use llmq::domain::repositories::queue_entry_repository::QueueEntryRepository;
use llmq::domain::services::llm_service::GenerationOutcome;
use llmq::domain::services::post_processing::{PostProcessEffect, PostProcessorRegistry};
use llmq::infrastructure::repositories::queue_entry_repo_impl::QueueEntryRepositoryImpl;
use llmq::queue::llm_queue::LlmQueue;
use std::sync::Arc;
use uuid::Uuid;

/// 入队后立即可查询到 Pending 状态
#[tokio::test]
async fn test_enqueue_returns_pending_entry() {
    let db = setup_db().await;
    let queue = build_queue(&db, Arc::new(ScriptedGenerator::default()), Duration::zero());

    let id = queue
        .enqueue("user-1", "Suggest XP", "generic", None)
        .await
        .unwrap();

    let result = queue.get_result(id, "user-1").await.unwrap().unwrap();
    assert_eq!(result.status, QueueStatus::Pending);
    assert_eq!(result.feature, "generic");
    assert!(result.result.is_none());
    assert!(result.error.is_none());
    assert!(result.processed_at.is_none());
}

/// 其他用户的条目不可见
#[tokio::test]
async fn test_get_result_hides_other_users_entries() {
    let db = setup_db().await;
    let queue = build_queue(&db, Arc::new(ScriptedGenerator::default()), Duration::zero());

    let id = queue
        .enqueue("owner", "Suggest XP", "generic", None)
        .await
        .unwrap();

    assert!(queue.get_result(id, "someone-else").await.unwrap().is_none());
    assert!(queue
        .get_result(Uuid::new_v4(), "owner")
        .await
        .unwrap()
        .is_none());
    assert!(queue.get_result(id, "owner").await.unwrap().is_some());
}

/// 去重检查只关注 xp-reward 且未完成的条目
#[tokio::test]
async fn test_pending_xp_suggestion_guard() {
    let db = setup_db().await;
    insert_task(&db, "t1", 0).await;
    let queue = build_queue(
        &db,
        Arc::new(ScriptedGenerator::new(vec![GenerationOutcome::success("10")])),
        Duration::zero(),
    );

    assert!(!queue.has_pending_xp_suggestion_for_task("t1").await.unwrap());

    queue
        .enqueue("user-1", "Rate t1", FEATURE_XP_REWARD, Some("t1"))
        .await
        .unwrap();
    queue
        .enqueue("user-1", "Summarise t2", "generic", Some("t2"))
        .await
        .unwrap();

    assert!(queue.has_pending_xp_suggestion_for_task("t1").await.unwrap());
    assert!(!queue.has_pending_xp_suggestion_for_task("t2").await.unwrap());

    // Once finished the task is free for a new suggestion
    assert!(queue.tick().await.unwrap());
    assert!(!queue.has_pending_xp_suggestion_for_task("t1").await.unwrap());
}

/// 处理中的条目同样会阻止重复提交
#[tokio::test]
async fn test_processing_entry_counts_as_pending_suggestion() {
    let db = setup_db().await;
    let repo = QueueEntryRepositoryImpl::new(db.clone());
    let entry = QueueEntry::new("user-1", "Rate t1", FEATURE_XP_REWARD, Some("t1".into()));
    repo.create(&entry).await.unwrap();
    assert!(repo
        .compare_and_set_status(entry.id, QueueStatus::Pending, QueueStatus::Processing, now())
        .await
        .unwrap());

    let queue = build_queue(&db, Arc::new(ScriptedGenerator::default()), Duration::zero());
    assert!(queue.has_pending_xp_suggestion_for_task("t1").await.unwrap());
}

/// 按创建顺序处理条目
#[tokio::test]
async fn test_tick_processes_in_fifo_order() {
    let db = setup_db().await;
    let generator = Arc::new(ScriptedGenerator::default());
    let queue = build_queue(&db, generator.clone(), Duration::zero());

    let mut ids = Vec::new();
    for prompt in ["first", "second", "third"] {
        ids.push(queue.enqueue("user-1", prompt, "generic", None).await.unwrap());
    }

    for _ in 0..3 {
        assert!(queue.tick().await.unwrap());
    }
    assert!(!queue.tick().await.unwrap());

    assert_eq!(generator.prompts(), vec!["first", "second", "third"]);
    for id in ids {
        let result = queue.get_result(id, "user-1").await.unwrap().unwrap();
        assert_eq!(result.status, QueueStatus::Done);
    }
}

/// 并发 tick 争抢同一条目时只有一个成功
#[tokio::test]
async fn test_concurrent_ticks_claim_entry_once() {
    let db = setup_db().await;
    let generator = Arc::new(ScriptedGenerator::default());
    let first = build_queue(&db, generator.clone(), Duration::zero());
    let second = build_queue(&db, generator.clone(), Duration::zero());

    let id = first
        .enqueue("user-1", "only one", "generic", None)
        .await
        .unwrap();

    let (a, b) = tokio::join!(first.tick(), second.tick());
    let processed = [a.unwrap(), b.unwrap()];

    assert_eq!(processed.iter().filter(|p| **p).count(), 1);
    assert_eq!(generator.calls(), 1);
    assert_eq!(find_entry(&db, id).await.status, "DONE");
}

/// 冷却时间内不认领任何条目
#[tokio::test]
async fn test_tick_respects_cooldown_window() {
    let db = setup_db().await;
    let generator = Arc::new(ScriptedGenerator::default());
    let queue = build_queue(&db, generator.clone(), Duration::seconds(4));

    insert_entry(&db, "finished", EntrySeed::done(seconds_ago(3.0), "ok")).await;
    let pending = insert_entry(&db, "waiting", EntrySeed::pending()).await;

    assert!(!queue.tick().await.unwrap());
    assert_eq!(generator.calls(), 0);
    assert_eq!(find_entry(&db, pending).await.status, "PENDING");
}

/// 超过冷却时间后可以认领
#[tokio::test]
async fn test_tick_claims_after_cooldown_elapsed() {
    let db = setup_db().await;
    let generator = Arc::new(ScriptedGenerator::default());
    let queue = build_queue(&db, generator.clone(), Duration::seconds(4));

    insert_entry(&db, "failed", EntrySeed::failed(seconds_ago(4.5), "boom")).await;
    let pending = insert_entry(&db, "waiting", EntrySeed::pending()).await;

    assert!(queue.tick().await.unwrap());
    assert_eq!(generator.prompts(), vec!["waiting"]);
    assert_eq!(find_entry(&db, pending).await.status, "DONE");
}

/// 刚完成一个条目后，紧接着的 tick 被冷却拦下
#[tokio::test]
async fn test_back_to_back_ticks_are_throttled() {
    let db = setup_db().await;
    let generator = Arc::new(ScriptedGenerator::default());
    let queue = build_queue(&db, generator.clone(), Duration::seconds(4));

    queue.enqueue("user-1", "one", "generic", None).await.unwrap();
    let second = queue.enqueue("user-1", "two", "generic", None).await.unwrap();

    assert!(queue.tick().await.unwrap());
    assert!(!queue.tick().await.unwrap());

    assert_eq!(generator.calls(), 1);
    let result = queue.get_result(second, "user-1").await.unwrap().unwrap();
    assert_eq!(result.status, QueueStatus::Pending);
}

/// 卡住的条目被退回 Pending，随后可再次认领
#[tokio::test]
async fn test_stuck_entry_is_recovered_then_processed() {
    let db = setup_db().await;
    let generator = Arc::new(ScriptedGenerator::default());

    // A recent completion keeps the cooldown closed so only recovery runs
    insert_entry(&db, "recent", EntrySeed::done(seconds_ago(1.0), "ok")).await;
    let stuck = insert_entry(&db, "stuck", EntrySeed::processing(seconds_ago(20.0))).await;

    let throttled = build_queue(&db, generator.clone(), Duration::seconds(4));
    assert!(!throttled.tick().await.unwrap());

    let recovered = find_entry(&db, stuck).await;
    assert_eq!(recovered.status, "PENDING");
    assert!(recovered.updated_at > seconds_ago(5.0));
    assert_eq!(generator.calls(), 0);

    let open = build_queue(&db, generator.clone(), Duration::zero());
    assert!(open.tick().await.unwrap());
    assert_eq!(generator.prompts(), vec!["stuck"]);
    assert_eq!(find_entry(&db, stuck).await.status, "DONE");
}

/// 未超过卡住阈值的 Processing 条目保持不变
#[tokio::test]
async fn test_fresh_processing_entry_is_left_alone() {
    let db = setup_db().await;
    let queue = build_queue(&db, Arc::new(ScriptedGenerator::default()), Duration::zero());

    let in_flight = insert_entry(&db, "in flight", EntrySeed::processing(seconds_ago(5.0))).await;

    assert!(!queue.tick().await.unwrap());
    assert_eq!(find_entry(&db, in_flight).await.status, "PROCESSING");
}

/// 卡住判定时长超出时间范围时跳过恢复，tick 正常返回
#[tokio::test]
async fn test_huge_stale_threshold_skips_recovery() {
    let db = setup_db().await;
    let in_flight = insert_entry(&db, "in flight", EntrySeed::processing(seconds_ago(60.0))).await;

    let queue = build_queue(&db, Arc::new(ScriptedGenerator::default()), Duration::zero())
        .with_settings(&QueueSettings {
            cooldown_ms: 0,
            stale_after_ms: u64::MAX / 2,
        });

    assert!(!queue.tick().await.unwrap());
    assert_eq!(find_entry(&db, in_flight).await.status, "PROCESSING");
}

/// 每次 tick 最多恢复一个卡住的条目，且先恢复最旧的
#[tokio::test]
async fn test_recovery_handles_one_entry_per_tick() {
    let db = setup_db().await;
    insert_entry(&db, "recent", EntrySeed::done(seconds_ago(1.0), "ok")).await;
    let older = insert_entry(&db, "older", EntrySeed::processing(seconds_ago(60.0))).await;
    let newer = insert_entry(&db, "newer", EntrySeed::processing(seconds_ago(30.0))).await;

    let queue = build_queue(&db, Arc::new(ScriptedGenerator::default()), Duration::seconds(4));

    assert!(!queue.tick().await.unwrap());
    assert_eq!(find_entry(&db, older).await.status, "PENDING");
    assert_eq!(find_entry(&db, newer).await.status, "PROCESSING");

    assert!(!queue.tick().await.unwrap());
    assert_eq!(find_entry(&db, newer).await.status, "PENDING");
}

/// 终态条目不会被后续 tick 修改
#[tokio::test]
async fn test_terminal_entries_are_never_modified() {
    let db = setup_db().await;
    let done = insert_entry(&db, "done", EntrySeed::done(seconds_ago(120.0), "42")).await;
    let failed = insert_entry(&db, "failed", EntrySeed::failed(seconds_ago(90.0), "boom")).await;
    let before_done = find_entry(&db, done).await;
    let before_failed = find_entry(&db, failed).await;

    let generator = Arc::new(ScriptedGenerator::default());
    let queue = build_queue(&db, generator.clone(), Duration::zero());
    queue.enqueue("user-1", "fresh", "generic", None).await.unwrap();

    assert!(queue.tick().await.unwrap());
    assert!(!queue.tick().await.unwrap());
    assert!(!queue.tick().await.unwrap());

    assert_eq!(generator.prompts(), vec!["fresh"]);
    assert_eq!(find_entry(&db, done).await, before_done);
    assert_eq!(find_entry(&db, failed).await, before_failed);
}

/// 场景：xp-reward 生成 "7500" 后回写任务奖励
#[tokio::test]
async fn test_xp_reward_success_updates_task() {
    let db = setup_db().await;
    insert_task(&db, "t1", 0).await;
    let queue = build_queue(
        &db,
        Arc::new(ScriptedGenerator::new(vec![GenerationOutcome::success("7500")])),
        Duration::zero(),
    );

    let id = queue
        .enqueue("user-1", "How much XP?", FEATURE_XP_REWARD, Some("t1"))
        .await
        .unwrap();
    assert!(queue.tick().await.unwrap());

    let result = queue.get_result(id, "user-1").await.unwrap().unwrap();
    assert_eq!(result.status, QueueStatus::Done);
    assert_eq!(result.result.as_deref(), Some("7500"));
    assert!(result.error.is_none());
    assert!(result.processed_at.is_some());

    let task = find_task(&db, "t1").await;
    assert_eq!(task.xp_reward, 7500);
    assert_eq!(task.xp_award_source.as_deref(), Some("AI_CONFIRMED"));
}

/// 从带说明的文本中取第一个整数
#[tokio::test]
async fn test_xp_reward_extracts_integer_from_sentence() {
    let db = setup_db().await;
    insert_task(&db, "t1", 0).await;
    let queue = build_queue(
        &db,
        Arc::new(ScriptedGenerator::new(vec![GenerationOutcome::success(
            "The answer is 4200 XP",
        )])),
        Duration::zero(),
    );

    queue
        .enqueue("user-1", "How much XP?", FEATURE_XP_REWARD, Some("t1"))
        .await
        .unwrap();
    assert!(queue.tick().await.unwrap());

    let task = find_task(&db, "t1").await;
    assert_eq!(task.xp_reward, 4200);
    assert_eq!(task.xp_award_source.as_deref(), Some("AI_CONFIRMED"));
}

/// 无法解析的输出：条目仍为 Done，任务标记 AI 失败且奖励不变
#[tokio::test]
async fn test_xp_reward_unusable_output_keeps_reward() {
    let db = setup_db().await;
    insert_task(&db, "t1", 300).await;
    let queue = build_queue(
        &db,
        Arc::new(ScriptedGenerator::new(vec![GenerationOutcome::success(
            "I cannot answer",
        )])),
        Duration::zero(),
    );

    let id = queue
        .enqueue("user-1", "How much XP?", FEATURE_XP_REWARD, Some("t1"))
        .await
        .unwrap();
    assert!(queue.tick().await.unwrap());

    let result = queue.get_result(id, "user-1").await.unwrap().unwrap();
    assert_eq!(result.status, QueueStatus::Done);
    assert_eq!(result.result.as_deref(), Some("I cannot answer"));

    let task = find_task(&db, "t1").await;
    assert_eq!(task.xp_reward, 300);
    assert_eq!(task.xp_award_source.as_deref(), Some("AI_FAILED"));
}

/// 生成失败时任务同样标记 AI 失败
#[tokio::test]
async fn test_xp_reward_generation_failure_marks_task_failed() {
    let db = setup_db().await;
    insert_task(&db, "t1", 120).await;
    let queue = build_queue(
        &db,
        Arc::new(ScriptedGenerator::new(vec![GenerationOutcome::failure(
            "upstream timeout",
        )])),
        Duration::zero(),
    );

    let id = queue
        .enqueue("user-1", "How much XP?", FEATURE_XP_REWARD, Some("t1"))
        .await
        .unwrap();
    assert!(queue.tick().await.unwrap());

    let result = queue.get_result(id, "user-1").await.unwrap().unwrap();
    assert_eq!(result.status, QueueStatus::Failed);
    assert_eq!(result.error.as_deref(), Some("upstream timeout"));

    let task = find_task(&db, "t1").await;
    assert_eq!(task.xp_reward, 120);
    assert_eq!(task.xp_award_source.as_deref(), Some("AI_FAILED"));
}

/// 场景：普通功能生成失败，错误原样保存
#[tokio::test]
async fn test_generic_failure_is_recorded() {
    let db = setup_db().await;
    let queue = build_queue(
        &db,
        Arc::new(ScriptedGenerator::new(vec![GenerationOutcome::failure(
            "rate limited",
        )])),
        Duration::zero(),
    );

    let id = queue
        .enqueue("user-1", "Write a haiku", "generic", None)
        .await
        .unwrap();
    assert!(queue.tick().await.unwrap());

    let result = queue.get_result(id, "user-1").await.unwrap().unwrap();
    assert_eq!(result.status, QueueStatus::Failed);
    assert_eq!(result.error.as_deref(), Some("rate limited"));
    assert!(result.result.is_none());
    assert!(result.processed_at.is_some());
    assert!(result.updated_at >= result.created_at);
}

/// 没有错误信息的失败记录为 Unknown error
#[tokio::test]
async fn test_failure_without_message_defaults_to_unknown_error() {
    let db = setup_db().await;
    let queue = build_queue(
        &db,
        Arc::new(ScriptedGenerator::new(vec![GenerationOutcome::Failure {
            error: None,
        }])),
        Duration::zero(),
    );

    let id = queue
        .enqueue("user-1", "Write a haiku", "generic", None)
        .await
        .unwrap();
    assert!(queue.tick().await.unwrap());

    let result = queue.get_result(id, "user-1").await.unwrap().unwrap();
    assert_eq!(result.error.as_deref(), Some("Unknown error"));
}

/// 关联任务不存在时仍完成条目
#[tokio::test]
async fn test_xp_reward_for_missing_task_still_finishes() {
    let db = setup_db().await;
    let queue = build_queue(
        &db,
        Arc::new(ScriptedGenerator::new(vec![GenerationOutcome::success("50")])),
        Duration::zero(),
    );

    let id = queue
        .enqueue("user-1", "How much XP?", FEATURE_XP_REWARD, Some("ghost"))
        .await
        .unwrap();
    assert!(queue.tick().await.unwrap());

    let result = queue.get_result(id, "user-1").await.unwrap().unwrap();
    assert_eq!(result.status, QueueStatus::Done);
}

/// 自定义功能后处理通过注册表接入
#[tokio::test]
async fn test_custom_post_processor_is_applied() {
    fn streak_bonus(
        entry: &QueueEntry,
        outcome: &GenerationOutcome,
    ) -> Option<PostProcessEffect> {
        let task_id = entry.task_id.as_deref()?;
        outcome
            .is_success()
            .then(|| PostProcessEffect::UpdateTaskReward(TaskRewardUpdate::confirmed(task_id, 10)))
    }

    let db = setup_db().await;
    insert_task(&db, "t7", 0).await;

    let mut registry = PostProcessorRegistry::default();
    registry.register("streak-bonus", streak_bonus);
    let queue = build_queue(
        &db,
        Arc::new(ScriptedGenerator::new(vec![GenerationOutcome::success(
            "Keep going!",
        )])),
        Duration::zero(),
    )
    .with_post_processors(registry);

    queue
        .enqueue("user-1", "Cheer me on", "streak-bonus", Some("t7"))
        .await
        .unwrap();
    assert!(queue.tick().await.unwrap());

    let task = find_task(&db, "t7").await;
    assert_eq!(task.xp_reward, 10);
    assert_eq!(task.xp_award_source.as_deref(), Some("AI_CONFIRMED"));
}

/// 未完成条目统计
#[tokio::test]
async fn test_has_unfinished_work() {
    let db = setup_db().await;
    let queue = build_queue(&db, Arc::new(ScriptedGenerator::default()), Duration::zero());

    assert!(!queue.has_unfinished_work().await.unwrap());
    queue.enqueue("user-1", "one", "generic", None).await.unwrap();
    assert!(queue.has_unfinished_work().await.unwrap());

    assert!(queue.tick().await.unwrap());
    assert!(!queue.has_unfinished_work().await.unwrap());
}
