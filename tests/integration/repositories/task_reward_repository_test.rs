// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::integration::helpers::{find_task, insert_task, setup_db};
use llmq::domain::models::task_reward::TaskRewardUpdate;
use llmq::domain::repositories::task_reward_repository::TaskRewardRepository;
use llmq::infrastructure::repositories::task_reward_repo_impl::TaskRewardRepositoryImpl;

#[tokio::test]
async fn test_confirmed_update_sets_reward_and_source() {
    let db = setup_db().await;
    insert_task(&db, "t1", 0).await;
    let repo = TaskRewardRepositoryImpl::new(db.clone());

    let applied = repo
        .apply(&TaskRewardUpdate::confirmed("t1", 250))
        .await
        .unwrap();
    assert!(applied);

    let task = find_task(&db, "t1").await;
    assert_eq!(task.xp_reward, 250);
    assert_eq!(task.xp_award_source.as_deref(), Some("AI_CONFIRMED"));
}

/// 失败标记不修改已有奖励
#[tokio::test]
async fn test_failed_update_keeps_existing_reward() {
    let db = setup_db().await;
    insert_task(&db, "t1", 800).await;
    let repo = TaskRewardRepositoryImpl::new(db.clone());
    let before = find_task(&db, "t1").await;

    assert!(repo.apply(&TaskRewardUpdate::failed("t1")).await.unwrap());

    let task = find_task(&db, "t1").await;
    assert_eq!(task.xp_reward, 800);
    assert_eq!(task.xp_award_source.as_deref(), Some("AI_FAILED"));
    assert!(task.updated_at >= before.updated_at);
}

#[tokio::test]
async fn test_update_for_missing_task_returns_false() {
    let db = setup_db().await;
    let repo = TaskRewardRepositoryImpl::new(db.clone());

    let applied = repo
        .apply(&TaskRewardUpdate::confirmed("missing", 10))
        .await
        .unwrap();
    assert!(!applied);
}
