//! Follow state machine scenarios against the in-memory backend.

#![allow(clippy::unwrap_used)]

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::{Harness, SERVER_URL, local, remote, settings};
use relgraph_common::{AppError, AppResult, BlockKind};
use relgraph_core::{
    Actor, FollowOutcome, InstanceStat, InternalEvent, MemoryBackend, NewRequest,
    NotificationKind, ProtocolActivity, RelationshipStore, RelationshipStoreService, UserEventKind,
    WebhookKind,
};
use relgraph_db::{
    entities::{follow_request, following},
    repositories::EdgeInsert,
};

#[tokio::test]
async fn test_follow_unlocked_local_creates_edge_and_counts() {
    let mut h = Harness::new();
    h.add(local("alice")).await;
    h.add(local("bob")).await;

    let outcome = h.service.follow("alice", "bob", None, false).await.unwrap();
    h.flush().await;

    assert_eq!(outcome, FollowOutcome::Followed);
    assert!(h.backend.has_edge("alice", "bob").await);
    assert_eq!(h.counts("alice").await, (1, 0));
    assert_eq!(h.counts("bob").await, (0, 1));
    assert!(h.recorder.deliveries().is_empty());
    assert_eq!(
        h.recorder.internal_events(),
        vec![InternalEvent::Follow {
            follower_id: "alice".to_string(),
            followee_id: "bob".to_string(),
        }]
    );
    assert!(h.recorder.user_events().contains(&(
        "alice".to_string(),
        UserEventKind::Follow,
        "bob".to_string()
    )));
    assert!(h.recorder.user_events().contains(&(
        "bob".to_string(),
        UserEventKind::Followed,
        "alice".to_string()
    )));
    assert_eq!(
        h.recorder.notifications(),
        vec![("bob".to_string(), NotificationKind::Follow, "alice".to_string())]
    );
    assert_eq!(h.backend.chart_updates().await.len(), 1);
}

#[tokio::test]
async fn test_silent_follow_skips_follower_events() {
    let mut h = Harness::new();
    h.add(local("alice")).await;
    h.add(local("bob")).await;

    h.service.follow("alice", "bob", None, true).await.unwrap();
    h.flush().await;

    assert!(
        !h.recorder
            .user_events()
            .iter()
            .any(|(user, kind, _)| user == "alice" && *kind == UserEventKind::Follow)
    );
    assert_eq!(
        h.recorder.webhooks(),
        vec![("bob".to_string(), WebhookKind::Followed, "alice".to_string())]
    );
}

#[tokio::test]
async fn test_follow_locked_creates_request_without_counter_change() {
    let mut h = Harness::new();
    h.add(local("alice")).await;
    let mut bob = local("bob");
    bob.is_locked = true;
    h.add(bob).await;

    let outcome = h.service.follow("alice", "bob", None, false).await.unwrap();
    h.flush().await;

    assert_eq!(outcome, FollowOutcome::Requested);
    assert!(h.backend.has_request("alice", "bob").await);
    assert!(!h.backend.has_edge("alice", "bob").await);
    assert_eq!(h.counts("alice").await, (0, 0));
    assert_eq!(h.counts("bob").await, (0, 0));
    assert_eq!(
        h.recorder.notifications(),
        vec![(
            "bob".to_string(),
            NotificationKind::ReceiveFollowRequest,
            "alice".to_string()
        )]
    );
    assert!(h.recorder.user_events().contains(&(
        "bob".to_string(),
        UserEventKind::MeUpdated,
        "bob".to_string()
    )));
}

#[tokio::test]
async fn test_self_follow_is_ignored() {
    let mut h = Harness::new();
    h.add(local("alice")).await;

    let outcome = h.service.follow("alice", "alice", None, false).await.unwrap();
    h.flush().await;

    assert_eq!(outcome, FollowOutcome::Ignored);
    assert_eq!(h.backend.edge_count().await, 0);
    assert!(h.recorder.user_events().is_empty());
}

#[tokio::test]
async fn test_follow_of_owned_channel_is_ignored() {
    let h = Harness::new();
    h.add(local("alice")).await;
    let mut channel = local("alice-channel");
    channel.owner_id = Some("alice".to_string());
    h.add(channel).await;

    let outcome = h
        .service
        .follow("alice", "alice-channel", None, false)
        .await
        .unwrap();

    assert_eq!(outcome, FollowOutcome::Ignored);
    assert_eq!(h.backend.edge_count().await, 0);
}

#[tokio::test]
async fn test_local_follow_across_block_fails_both_directions() {
    let h = Harness::new();
    h.add(local("alice")).await;
    h.add(local("bob")).await;
    h.add(local("carol")).await;
    h.backend.block("alice", "bob").await;
    h.backend.block("carol", "alice").await;

    let blocking = h.service.follow("alice", "bob", None, false).await.unwrap_err();
    let blocked = h.service.follow("alice", "carol", None, false).await.unwrap_err();

    assert!(matches!(blocking, AppError::BlockingViolation(BlockKind::Blocking)));
    assert!(matches!(blocked, AppError::BlockingViolation(BlockKind::Blocked)));
    assert_eq!(h.backend.edge_count().await, 0);
}

#[tokio::test]
async fn test_remote_follower_blocked_by_local_gets_reject_only() {
    let mut h = Harness::new();
    h.add(remote("rita", "remote.example")).await;
    h.add(local("bob")).await;
    h.backend.block("bob", "rita").await;

    let outcome = h
        .service
        .follow("rita", "bob", Some("https://remote.example/follows/1"), false)
        .await
        .unwrap();
    h.flush().await;

    assert_eq!(outcome, FollowOutcome::Rejected);
    assert!(!h.backend.has_edge("rita", "bob").await);
    assert!(!h.backend.has_request("rita", "bob").await);

    let deliveries = h.recorder.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].source_actor_id, "bob");
    assert_eq!(deliveries[0].inbox, "https://remote.example/users/rita/inbox");
    assert!(deliveries[0].high_priority);
    match &deliveries[0].activity {
        ProtocolActivity::Reject { actor, object } => {
            assert_eq!(actor, &format!("{SERVER_URL}/users/bob"));
            assert_eq!(object.id, "https://remote.example/follows/1");
        }
        other => panic!("Expected Reject, got {other:?}"),
    }
}

#[tokio::test]
async fn test_remote_follower_blocking_local_is_unblocked() {
    let mut h = Harness::new();
    h.add(remote("rita", "remote.example")).await;
    h.add(local("bob")).await;
    h.backend.block("rita", "bob").await;

    let outcome = h.service.follow("rita", "bob", None, false).await.unwrap();
    h.flush().await;

    assert_eq!(outcome, FollowOutcome::Followed);
    assert!(h.backend.has_edge("rita", "bob").await);
    assert_eq!(h.recorder.delivered_kinds(), vec!["Accept"]);
    assert_eq!(
        h.backend
            .instance_stat("remote.example", InstanceStat::FollowingCount)
            .await,
        1
    );
}

#[tokio::test]
async fn test_local_follow_of_remote_sends_follow_request() {
    let mut h = Harness::new();
    h.add(local("alice")).await;
    h.add(remote("rita", "remote.example")).await;

    let outcome = h.service.follow("alice", "rita", None, false).await.unwrap();
    h.flush().await;

    assert_eq!(outcome, FollowOutcome::Requested);
    let request = h
        .backend
        .find_follow_request("alice", "rita")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(request.followee_inbox.as_deref(), Some("https://remote.example/users/rita/inbox"));

    let deliveries = h.recorder.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert!(!deliveries[0].high_priority);
    match &deliveries[0].activity {
        ProtocolActivity::Follow(follow) => {
            assert_eq!(follow.id, format!("{SERVER_URL}/follows/{}", request.id));
            assert_eq!(follow.object, "https://remote.example/users/rita");
        }
        other => panic!("Expected Follow, got {other:?}"),
    }
}

#[tokio::test]
async fn test_remote_accept_completes_local_request() {
    let mut h = Harness::new();
    h.add(local("alice")).await;
    h.add(remote("rita", "remote.example")).await;

    h.service.follow("alice", "rita", None, false).await.unwrap();
    h.service.accept_follow_request("rita", "alice").await.unwrap();
    h.flush().await;

    assert!(h.backend.has_edge("alice", "rita").await);
    assert!(!h.backend.has_request("alice", "rita").await);
    assert!(h.recorder.notifications().contains(&(
        "alice".to_string(),
        NotificationKind::FollowRequestAccepted,
        "rita".to_string()
    )));
    assert_eq!(
        h.backend
            .instance_stat("remote.example", InstanceStat::FollowersCount)
            .await,
        1
    );
}

#[tokio::test]
async fn test_duplicate_remote_follow_is_idempotent() {
    let mut h = Harness::new();
    h.add(remote("rita", "remote.example")).await;
    h.add(local("bob")).await;

    let first = h.service.follow("rita", "bob", None, false).await.unwrap();
    let second = h.service.follow("rita", "bob", None, false).await.unwrap();
    h.flush().await;

    assert_eq!(first, FollowOutcome::Followed);
    assert_eq!(second, FollowOutcome::AlreadyFollowing);
    assert_eq!(h.backend.edge_count().await, 1);
    assert_eq!(h.counts("bob").await, (0, 1));
    assert_eq!(h.recorder.delivered_kinds(), vec!["Accept", "Accept"]);
    assert_eq!(h.recorder.internal_events().len(), 1);
}

#[tokio::test]
async fn test_concurrent_remote_follows_produce_one_edge() {
    let mut h = Harness::new();
    h.add(remote("rita", "remote.example")).await;
    h.add(local("bob")).await;

    let (a, b) = tokio::join!(
        h.service.follow("rita", "bob", None, false),
        h.service.follow("rita", "bob", None, false)
    );
    h.flush().await;

    let mut outcomes = vec![a.unwrap(), b.unwrap()];
    outcomes.sort_by_key(|o| *o == FollowOutcome::AlreadyFollowing);
    assert_eq!(
        outcomes,
        vec![FollowOutcome::Followed, FollowOutcome::AlreadyFollowing]
    );
    assert_eq!(h.backend.edge_count().await, 1);
    assert_eq!(h.counts("bob").await, (0, 1));
}

#[tokio::test]
async fn test_duplicate_local_follow_is_conflict() {
    let h = Harness::new();
    h.add(local("alice")).await;
    h.add(local("bob")).await;

    h.service.follow("alice", "bob", None, false).await.unwrap();
    let err = h.service.follow("alice", "bob", None, false).await.unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(h.counts("bob").await, (0, 1));
}

#[tokio::test]
async fn test_unfollow_missing_edge_is_noop() {
    let mut h = Harness::new();
    h.add(local("alice")).await;
    h.add(local("bob")).await;

    h.service.unfollow("alice", "bob", false).await.unwrap();
    h.flush().await;

    assert!(h.recorder.internal_events().is_empty());
    assert_eq!(h.counts("bob").await, (0, 0));
}

#[tokio::test]
async fn test_unfollow_remote_sends_undo() {
    let mut h = Harness::new();
    h.add(local("alice")).await;
    h.add(remote("rita", "remote.example")).await;
    h.service.follow("alice", "rita", None, false).await.unwrap();
    h.service.accept_follow_request("rita", "alice").await.unwrap();
    h.flush().await;

    h.service.unfollow("alice", "rita", false).await.unwrap();
    h.flush().await;

    assert!(!h.backend.has_edge("alice", "rita").await);
    assert_eq!(h.counts("alice").await, (0, 0));
    assert_eq!(h.recorder.delivered_kinds(), vec!["Follow", "Undo"]);
    assert!(h.recorder.webhooks().contains(&(
        "alice".to_string(),
        WebhookKind::Unfollow,
        "rita".to_string()
    )));
    assert_eq!(
        h.backend
            .instance_stat("remote.example", InstanceStat::FollowersCount)
            .await,
        0
    );
}

#[tokio::test]
async fn test_unfollow_by_remote_follower_sends_reject() {
    let mut h = Harness::new();
    h.add(remote("rita", "remote.example")).await;
    h.add(local("bob")).await;
    h.service.follow("rita", "bob", None, false).await.unwrap();

    h.service.unfollow("rita", "bob", false).await.unwrap();
    h.flush().await;

    assert_eq!(h.recorder.delivered_kinds(), vec!["Accept", "Reject"]);
    assert_eq!(h.counts("bob").await, (0, 0));
}

#[tokio::test]
async fn test_auto_accept_followed_skips_request() {
    let h = Harness::new();
    h.add(local("alice")).await;
    let mut bob = local("bob");
    bob.is_locked = true;
    bob.auto_accept_followed = true;
    h.add(bob).await;

    h.service.follow("bob", "alice", None, false).await.unwrap();
    let outcome = h.service.follow("alice", "bob", None, false).await.unwrap();

    assert_eq!(outcome, FollowOutcome::Followed);
    assert!(h.backend.has_edge("alice", "bob").await);
}

#[tokio::test]
async fn test_careful_bot_requires_approval_for_bots_only() {
    let h = Harness::new();
    let mut bot = local("bot");
    bot.is_bot = true;
    h.add(bot).await;
    h.add(local("human")).await;
    let mut careful = local("careful");
    careful.careful_bot = true;
    h.add(careful).await;

    let from_bot = h.service.follow("bot", "careful", None, false).await.unwrap();
    let from_human = h.service.follow("human", "careful", None, false).await.unwrap();

    assert_eq!(from_bot, FollowOutcome::Requested);
    assert_eq!(from_human, FollowOutcome::Followed);
}

#[tokio::test]
async fn test_moved_ancestor_follow_is_carried_over() {
    let h = Harness::new();
    let mut bob = local("bob");
    bob.is_locked = true;
    h.add(bob).await;

    let old = h.add(remote("rita-old", "old.example")).await;
    let mut new = remote("rita-new", "new.example");
    new.also_known_as = vec![old.uri.clone()];
    h.add(new.clone()).await;

    h.service.create_follow_request("rita-old", "bob", None).await.unwrap();
    h.service.accept_follow_request("bob", "rita-old").await.unwrap();
    h.backend.set_moved("rita-old", &new.uri).await.unwrap();

    let outcome = h.service.follow("rita-new", "bob", None, false).await.unwrap();

    assert_eq!(outcome, FollowOutcome::Followed);
    assert!(h.backend.has_edge("rita-new", "bob").await);
}

#[tokio::test]
async fn test_alias_without_back_link_is_not_trusted() {
    let h = Harness::new();
    let mut bob = local("bob");
    bob.is_locked = true;
    h.add(bob).await;

    let old = h.add(remote("rita-old", "old.example")).await;
    let mut new = remote("rita-new", "new.example");
    new.also_known_as = vec![old.uri.clone()];
    h.add(new).await;
    h.service.create_follow_request("rita-old", "bob", None).await.unwrap();
    h.service.accept_follow_request("bob", "rita-old").await.unwrap();

    let outcome = h.service.follow("rita-new", "bob", None, false).await.unwrap();

    assert_eq!(outcome, FollowOutcome::Requested);
}

#[tokio::test]
async fn test_accept_then_reject_follow() {
    let mut h = Harness::new();
    h.add(remote("rita", "remote.example")).await;
    let mut bob = local("bob");
    bob.is_locked = true;
    h.add(bob).await;

    h.service
        .follow("rita", "bob", Some("https://remote.example/follows/9"), false)
        .await
        .unwrap();
    h.service.accept_follow_request("bob", "rita").await.unwrap();
    assert!(h.backend.has_edge("rita", "bob").await);
    assert!(!h.backend.has_request("rita", "bob").await);

    h.service.reject_follow("bob", "rita").await.unwrap();
    h.flush().await;

    assert!(!h.backend.has_edge("rita", "bob").await);
    assert!(!h.backend.has_request("rita", "bob").await);
    assert_eq!(h.counts("bob").await, (0, 0));

    let deliveries = h.recorder.deliveries();
    assert_eq!(h.recorder.delivered_kinds(), vec!["Accept", "Reject"]);
    assert_eq!(
        deliveries[0].activity.follow().id,
        "https://remote.example/follows/9"
    );
}

#[tokio::test]
async fn test_accept_missing_request_fails() {
    let h = Harness::new();
    h.add(local("alice")).await;
    h.add(local("bob")).await;

    let err = h
        .service
        .accept_follow_request("bob", "alice")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::FollowRequestNotFound));
}

#[tokio::test]
async fn test_reject_follow_request_echoes_request_id() {
    let mut h = Harness::new();
    h.add(remote("rita", "remote.example")).await;
    let mut bob = local("bob");
    bob.is_locked = true;
    h.add(bob).await;

    h.service
        .follow("rita", "bob", Some("https://remote.example/follows/7"), false)
        .await
        .unwrap();
    h.service.reject_follow_request("bob", "rita").await.unwrap();
    h.flush().await;

    assert!(!h.backend.has_request("rita", "bob").await);
    let deliveries = h.recorder.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert!(matches!(deliveries[0].activity, ProtocolActivity::Reject { .. }));
    assert_eq!(
        deliveries[0].activity.follow().id,
        "https://remote.example/follows/7"
    );
}

#[tokio::test]
async fn test_reject_local_request_notifies_follower() {
    let mut h = Harness::new();
    h.add(local("alice")).await;
    let mut bob = local("bob");
    bob.is_locked = true;
    h.add(bob).await;

    h.service.follow("alice", "bob", None, false).await.unwrap();
    h.service.reject_follow_request("bob", "alice").await.unwrap();
    h.flush().await;

    assert!(h.recorder.user_events().contains(&(
        "alice".to_string(),
        UserEventKind::Unfollow,
        "bob".to_string()
    )));
    assert!(h.recorder.deliveries().is_empty());
}

#[tokio::test]
async fn test_cancel_request_sends_undo_and_removes_row() {
    let mut h = Harness::new();
    h.add(local("alice")).await;
    h.add(remote("rita", "remote.example")).await;

    h.service.follow("alice", "rita", None, false).await.unwrap();
    h.service.cancel_follow_request("rita", "alice").await.unwrap();
    h.flush().await;

    assert!(!h.backend.has_request("alice", "rita").await);
    let deliveries = h.recorder.deliveries();
    assert_eq!(h.recorder.delivered_kinds(), vec!["Follow", "Undo"]);
    assert_eq!(
        deliveries[0].activity.follow().id,
        deliveries[1].activity.follow().id
    );
}

#[tokio::test]
async fn test_cancel_missing_request_still_sends_undo() {
    let mut h = Harness::new();
    h.add(local("alice")).await;
    h.add(remote("rita", "remote.example")).await;

    let err = h
        .service
        .cancel_follow_request("rita", "alice")
        .await
        .unwrap_err();
    h.flush().await;

    assert!(matches!(err, AppError::FollowRequestNotFound));
    assert_eq!(h.recorder.delivered_kinds(), vec!["Undo"]);
}

#[tokio::test]
async fn test_duplicate_request_emits_nothing() {
    let mut h = Harness::new();
    h.add(local("alice")).await;
    let mut bob = local("bob");
    bob.is_locked = true;
    h.add(bob).await;

    h.service.create_follow_request("alice", "bob", None).await.unwrap();
    h.flush().await;
    let before = h.recorder.notifications().len();

    let outcome = h
        .service
        .create_follow_request("alice", "bob", None)
        .await
        .unwrap();
    h.flush().await;

    assert_eq!(outcome, FollowOutcome::Requested);
    assert_eq!(h.recorder.notifications().len(), before);
}

#[tokio::test]
async fn test_create_request_across_block_fails() {
    let h = Harness::new();
    h.add(remote("rita", "remote.example")).await;
    h.add(local("bob")).await;
    h.backend.block("rita", "bob").await;

    let err = h
        .service
        .create_follow_request("rita", "bob", None)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::BlockingViolation(BlockKind::Blocking)));
    assert!(!h.backend.has_request("rita", "bob").await);
}

#[tokio::test]
async fn test_accept_all_continues_past_failures() {
    let h = Harness::new();
    let mut bob = local("bob");
    bob.is_locked = true;
    let bob = h.add(bob).await;
    for id in ["a1", "a2"] {
        h.add(local(id)).await;
        h.service.follow(id, "bob", None, false).await.unwrap();
    }
    // Requester that no longer resolves.
    h.backend
        .insert_follow_request(&local("ghost"), &bob, None)
        .await
        .unwrap();

    let report = h.service.accept_all_follow_requests("bob").await.unwrap();

    assert_eq!(report.accepted, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(
        h.backend.requests().await,
        vec![("ghost".to_string(), "bob".to_string())]
    );
    assert_eq!(h.backend.edge_count().await, 2);
    assert_eq!(h.counts("bob").await, (0, 2));
}

#[tokio::test]
async fn test_migrated_endpoint_triggers_recount() {
    let mut h = Harness::new();
    h.add(local("alice")).await;
    h.add(local("bob")).await;
    h.add(local("carol")).await;
    h.service.follow("alice", "bob", None, false).await.unwrap();
    h.service.follow("carol", "bob", None, false).await.unwrap();

    h.backend
        .set_moved("alice", "https://elsewhere.example/users/alice")
        .await
        .unwrap();
    h.service.unfollow("alice", "bob", false).await.unwrap();
    h.flush().await;

    let brute_force = h
        .backend
        .edges()
        .await
        .into_iter()
        .filter(|(_, followee)| followee == "bob")
        .count();
    assert_eq!(h.counts("bob").await.1, brute_force as i32);
    assert_eq!(h.backend.chart_updates().await.len(), 3);
}

#[tokio::test]
async fn test_federation_disabled_skips_delivery() {
    let mut settings = settings();
    settings.federation_enabled = false;
    let mut h = Harness::with_settings(settings);
    h.add(local("alice")).await;
    h.add(remote("rita", "remote.example")).await;

    h.service.follow("alice", "rita", None, false).await.unwrap();
    h.flush().await;

    assert!(h.backend.has_request("alice", "rita").await);
    assert!(h.recorder.deliveries().is_empty());
}

#[tokio::test]
async fn test_instance_stats_can_be_disabled() {
    let mut settings = settings();
    settings.enable_federated_instance_stats = false;
    let mut h = Harness::with_settings(settings);
    h.add(remote("rita", "remote.example")).await;
    h.add(local("bob")).await;

    h.service.follow("rita", "bob", None, false).await.unwrap();
    h.flush().await;

    assert_eq!(
        h.backend
            .instance_stat("remote.example", InstanceStat::FollowingCount)
            .await,
        0
    );
    assert_eq!(h.counts("bob").await, (0, 1));
}

#[tokio::test]
async fn test_followee_ids_cache_sees_new_edges() {
    let h = Harness::new();
    h.add(local("alice")).await;
    h.add(local("bob")).await;
    h.add(local("carol")).await;

    h.service.follow("alice", "bob", None, false).await.unwrap();
    let first = h.service.followee_ids("alice").await.unwrap();
    h.service.follow("alice", "carol", None, false).await.unwrap();
    let second = h.service.followee_ids("alice").await.unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 2);
    assert!(second.contains("carol"));
}

#[tokio::test]
async fn test_unknown_user_is_reported() {
    let h = Harness::new();
    h.add(local("alice")).await;

    let err = h.service.follow("alice", "ghost", None, false).await.unwrap_err();

    assert!(matches!(err, AppError::UserNotFound(id) if id == "ghost"));
}

#[tokio::test]
async fn test_internal_event_drops_cached_followees() {
    let h = Harness::new();
    let alice = h.add(local("alice")).await;
    let bob = h.add(local("bob")).await;

    assert!(h.service.followee_ids("alice").await.unwrap().is_empty());
    // Edge written by another process.
    h.backend.insert_following(&alice, &bob).await.unwrap();
    assert!(h.service.followee_ids("alice").await.unwrap().is_empty());

    h.service
        .handle_internal_event(&InternalEvent::Follow {
            follower_id: "alice".to_string(),
            followee_id: "bob".to_string(),
        })
        .await;

    assert!(h.service.followee_ids("alice").await.unwrap().contains("bob"));
}

#[tokio::test]
async fn test_request_for_existing_edge_is_ignored() {
    let mut h = Harness::new();
    h.add(remote("rita", "remote.example")).await;
    h.add(local("bob")).await;

    let follow = h.service.follow("rita", "bob", None, false).await.unwrap();
    h.flush().await;
    let notifications = h.recorder.notifications().len();

    let request = h
        .service
        .create_follow_request("rita", "bob", Some("https://remote.example/follows/2"))
        .await
        .unwrap();
    h.flush().await;

    assert_eq!(follow, FollowOutcome::Followed);
    assert_eq!(request, FollowOutcome::AlreadyFollowing);
    assert!(h.backend.has_edge("rita", "bob").await);
    assert!(!h.backend.has_request("rita", "bob").await);
    assert_eq!(h.recorder.notifications().len(), notifications);
}

#[tokio::test]
async fn test_local_request_for_existing_edge_is_ignored() {
    let h = Harness::new();
    h.add(local("alice")).await;
    h.add(local("bob")).await;

    h.service.follow("alice", "bob", None, false).await.unwrap();
    let request = h
        .service
        .create_follow_request("alice", "bob", None)
        .await
        .unwrap();

    assert_eq!(request, FollowOutcome::AlreadyFollowing);
    assert!(!h.backend.has_request("alice", "bob").await);
}

#[tokio::test]
async fn test_request_after_accept_all_is_ignored() {
    let h = Harness::new();
    h.add(local("alice")).await;
    let mut bob = local("bob");
    bob.is_locked = true;
    h.add(bob).await;

    h.service.create_follow_request("alice", "bob", None).await.unwrap();
    h.service.accept_all_follow_requests("bob").await.unwrap();
    let again = h
        .service
        .create_follow_request("alice", "bob", None)
        .await
        .unwrap();

    assert_eq!(again, FollowOutcome::AlreadyFollowing);
    assert!(h.backend.has_edge("alice", "bob").await);
    assert!(h.backend.requests().await.is_empty());
}

/// Store whose edge insert loses to a concurrent writer that left the
/// pending request behind.
struct LostRaceStore {
    inner: Arc<MemoryBackend>,
}

#[async_trait]
impl RelationshipStore for LostRaceStore {
    async fn find_following(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<Option<following::Model>> {
        self.inner.find_following(follower_id, followee_id).await
    }

    async fn insert_following(&self, follower: &Actor, followee: &Actor) -> AppResult<EdgeInsert> {
        let pending = self.inner.find_follow_request(&follower.id, &followee.id).await?;
        self.inner.insert_following(follower, followee).await?;
        Ok(EdgeInsert {
            inserted: false,
            superseded_request: pending,
        })
    }

    async fn delete_following(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<Option<following::Model>> {
        self.inner.delete_following(follower_id, followee_id).await
    }

    async fn find_follow_request(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<Option<follow_request::Model>> {
        self.inner.find_follow_request(follower_id, followee_id).await
    }

    async fn insert_follow_request(
        &self,
        follower: &Actor,
        followee: &Actor,
        request_id: Option<&str>,
    ) -> AppResult<NewRequest> {
        self.inner
            .insert_follow_request(follower, followee, request_id)
            .await
    }

    async fn delete_follow_request(&self, follower_id: &str, followee_id: &str) -> AppResult<bool> {
        self.inner.delete_follow_request(follower_id, followee_id).await
    }

    async fn pending_requests_for(&self, followee_id: &str) -> AppResult<Vec<follow_request::Model>> {
        self.inner.pending_requests_for(followee_id).await
    }

    async fn followee_ids(&self, follower_id: &str) -> AppResult<Vec<String>> {
        self.inner.followee_ids(follower_id).await
    }

    async fn adjust_counts(&self, follower_id: &str, followee_id: &str, delta: i32) -> AppResult<()> {
        self.inner.adjust_counts(follower_id, followee_id, delta).await
    }

    async fn count_active_following(&self, user_id: &str) -> AppResult<u64> {
        self.inner.count_active_following(user_id).await
    }

    async fn count_active_followers(&self, user_id: &str) -> AppResult<u64> {
        self.inner.count_active_followers(user_id).await
    }

    async fn set_following_count(&self, user_id: &str, count: i32) -> AppResult<()> {
        self.inner.set_following_count(user_id, count).await
    }

    async fn set_followers_count(&self, user_id: &str, count: i32) -> AppResult<()> {
        self.inner.set_followers_count(user_id, count).await
    }
}

#[tokio::test]
async fn test_accept_that_loses_edge_race_still_succeeds() {
    let mut h = Harness::with_store(|inner| {
        Arc::new(LostRaceStore { inner }) as RelationshipStoreService
    });
    h.add(local("alice")).await;
    let mut bob = local("bob");
    bob.is_locked = true;
    h.add(bob).await;

    h.service.follow("alice", "bob", None, false).await.unwrap();
    h.flush().await;

    h.service.accept_follow_request("bob", "alice").await.unwrap();
    h.flush().await;

    assert!(h.backend.has_edge("alice", "bob").await);
    assert!(!h.backend.has_request("alice", "bob").await);
    assert!(h.recorder.notifications().contains(&(
        "alice".to_string(),
        NotificationKind::FollowRequestAccepted,
        "bob".to_string()
    )));
    assert!(h.recorder.internal_events().is_empty());
    assert_eq!(h.counts("bob").await, (0, 0));
}
