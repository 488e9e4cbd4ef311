//! Operation-level tests for `AccountService`, driven through real SQLite
//! storage and real token/hash collaborators.

mod common;

use common::{Harness, EXCHANGE, ROUTING_KEY};
use roster_accounts::AccountStore;
use roster_auth::CredentialHasher;
use roster_notify::NotificationMessage;
use roster_server::{RequestContext, ServiceError};
use roster_types::AccountId;
use std::sync::atomic::Ordering;

fn ctx_for(h: &Harness, account: &roster_accounts::Account) -> RequestContext {
    RequestContext::bearer(&h.token(account))
}

// ── authentication ───────────────────────────────────────────────────

#[tokio::test]
async fn lookup_by_token_returns_own_view() {
    let h = Harness::new();
    let alice = h.seed("alice", "pw");

    let view = h.service.get_by_token(&ctx_for(&h, &alice)).await.unwrap();
    assert_eq!(view, alice.view());

    let json = serde_json::to_value(&view).unwrap();
    assert!(json.get("password_hash").is_none());
    assert!(json.get("verification_code").is_none());
}

#[tokio::test]
async fn missing_header_is_malformed_and_bad_token_is_unauthenticated() {
    let h = Harness::new();

    let err = h
        .service
        .get_by_token(&RequestContext::anonymous())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Malformed(_)), "{err:?}");

    let err = h
        .service
        .get_by_token(&RequestContext::bearer("garbage"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unauthenticated(_)), "{err:?}");
}

#[tokio::test]
async fn token_for_deleted_account_is_not_found() {
    let h = Harness::new();
    let alice = h.seed("alice", "pw");
    let ctx = ctx_for(&h, &alice);
    h.store.delete(alice.id).unwrap();

    let err = h.service.get_by_token(&ctx).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)), "{err:?}");
}

// ── public reads ─────────────────────────────────────────────────────

#[tokio::test]
async fn public_lookups_find_accounts() {
    let h = Harness::new();
    let alice = h.seed("alice", "pw");
    h.seed("bob", "pw");

    let by_id = h.service.get_by_id(&alice.id.to_string()).await.unwrap();
    assert_eq!(by_id.username, "alice");

    let by_email = h.service.get_by_identifier("alice@example.com").await.unwrap();
    let by_name = h.service.get_by_identifier("alice").await.unwrap();
    assert_eq!(by_email.id, alice.id);
    assert_eq!(by_name.id, alice.id);

    assert_eq!(h.service.list_all().await.unwrap().len(), 2);

    let err = h.service.get_by_id("not-a-uuid").await.unwrap_err();
    assert!(matches!(err, ServiceError::Malformed(_)));
    let err = h.service.get_by_identifier("").await.unwrap_err();
    assert!(matches!(err, ServiceError::Malformed(_)));
    let err = h
        .service
        .get_by_id(&AccountId::new_v4().to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

// ── username / password ──────────────────────────────────────────────

#[tokio::test]
async fn change_username_returns_updated_view() {
    let h = Harness::new();
    let alice = h.seed("alice", "pw");

    let view = h
        .service
        .change_username(&ctx_for(&h, &alice), "alicia")
        .await
        .unwrap();
    assert_eq!(view.username, "alicia");
    assert!(view.updated_at > alice.updated_at);
}

#[tokio::test]
async fn rename_into_existing_username_conflicts_and_changes_nothing() {
    let h = Harness::new();
    let alice = h.seed("alice", "pw");
    let bob = h.seed("bob", "pw");

    let err = h
        .service
        .change_username(&ctx_for(&h, &bob), "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)), "{err:?}");

    assert_eq!(h.reload(&alice), alice);
    assert_eq!(h.reload(&bob), bob);
}

#[tokio::test]
async fn invalid_usernames_are_malformed() {
    let h = Harness::new();
    let alice = h.seed("alice", "pw");
    let ctx = ctx_for(&h, &alice);

    let too_long = "x".repeat(33);
    for bad in ["", "   ", too_long.as_str()] {
        let err = h.service.change_username(&ctx, bad).await.unwrap_err();
        assert!(matches!(err, ServiceError::Malformed(_)), "{bad:?}: {err:?}");
    }
    assert_eq!(h.reload(&alice).username, "alice");
}

#[tokio::test]
async fn change_password_replaces_hash_and_keeps_token_valid() {
    let h = Harness::new();
    let alice = h.seed("alice", "old");
    let ctx = ctx_for(&h, &alice);

    h.service.change_password(&ctx, "new").await.unwrap();

    let stored = h.reload(&alice);
    assert_ne!(stored.password_hash, alice.password_hash);
    assert!(h.hasher.verify(&stored.password_hash, "new").is_ok());
    assert!(h.service.get_by_token(&ctx).await.is_ok());
}

#[tokio::test]
async fn empty_password_is_malformed() {
    let h = Harness::new();
    let alice = h.seed("alice", "old");
    let err = h
        .service
        .change_password(&ctx_for(&h, &alice), "")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Malformed(_)));
    assert_eq!(h.reload(&alice).password_hash, alice.password_hash);
}

// ── delete ───────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_with_all_gates_passing_removes_account() {
    let h = Harness::new();
    let alice = h.seed("alice", "pw");

    h.service
        .delete_account(&ctx_for(&h, &alice), "pw", "SUBMIT")
        .await
        .unwrap();
    assert!(h.store.fetch_by_id(alice.id).is_err());
}

#[tokio::test]
async fn delete_with_wrong_password_is_invalid_credential() {
    let h = Harness::new();
    let alice = h.seed("alice", "pw");

    let err = h
        .service
        .delete_account(&ctx_for(&h, &alice), "wrong", "SUBMIT")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidCredential(_)), "{err:?}");
    assert_eq!(h.reload(&alice), alice);
}

#[tokio::test]
async fn delete_with_wrong_confirmation_is_malformed() {
    let h = Harness::new();
    let alice = h.seed("alice", "pw");
    let ctx = ctx_for(&h, &alice);

    for confirmation in ["submit", "", " SUBMIT", "SUBMIT "] {
        let err = h
            .service
            .delete_account(&ctx, "pw", confirmation)
            .await
            .unwrap_err();
        assert!(
            matches!(err, ServiceError::Malformed(_)),
            "{confirmation:?}: {err:?}"
        );
    }
    assert_eq!(h.reload(&alice), alice);
}

#[tokio::test]
async fn delete_with_bad_token_changes_nothing() {
    let h = Harness::new();
    let alice = h.seed("alice", "pw");

    let err = h
        .service
        .delete_account(&RequestContext::bearer("garbage"), "pw", "SUBMIT")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unauthenticated(_)), "{err:?}");

    let err = h
        .service
        .delete_account(&RequestContext::anonymous(), "pw", "SUBMIT")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Malformed(_)), "{err:?}");

    assert_eq!(h.reload(&alice), alice);
}

#[tokio::test]
async fn wrong_password_is_reported_before_wrong_confirmation() {
    let h = Harness::new();
    let alice = h.seed("alice", "pw");
    let err = h
        .service
        .delete_account(&ctx_for(&h, &alice), "wrong", "submit")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidCredential(_)));
}

#[tokio::test]
async fn delete_all_empties_the_store() {
    let h = Harness::new();
    h.seed("alice", "pw");
    h.seed("bob", "pw");

    let status = h.service.delete_all().await.unwrap();
    assert_eq!(status.status, "deleted 2 accounts");
    assert!(h.service.list_all().await.unwrap().is_empty());
}

// ── verification codes ───────────────────────────────────────────────

#[tokio::test]
async fn issuing_twice_keeps_only_latest_code() {
    let h = Harness::new();
    let alice = h.seed("alice", "pw");
    let ctx = ctx_for(&h, &alice);

    h.service.issue_verification_code(&ctx).await.unwrap();
    let first = h.mailer.last_code_for("alice@example.com").unwrap();
    h.service.issue_verification_code(&ctx).await.unwrap();
    let second = h.mailer.last_code_for("alice@example.com").unwrap();

    assert_ne!(first, second);
    assert_eq!(h.reload(&alice).verification_code, second);

    let err = h
        .service
        .reset_password(&ctx, first, "new")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidCredential(_)));
}

#[tokio::test]
async fn mail_failure_is_internal_but_code_stays_persisted() {
    let h = Harness::new();
    let alice = h.seed("alice", "pw");
    h.mailer.fail.store(true, Ordering::SeqCst);

    let err = h
        .service
        .issue_verification_code(&ctx_for(&h, &alice))
        .await
        .unwrap_err();
    assert!(
        matches!(err, ServiceError::Internal { operation: "issue_verification_code", .. }),
        "{err:?}"
    );
    assert_ne!(h.reload(&alice).verification_code, 0);
    assert_eq!(h.mailer.count(), 0);
}

#[tokio::test]
async fn reset_with_correct_code_consumes_it_once() {
    let h = Harness::new();
    let alice = h.seed("alice", "old");
    let ctx = ctx_for(&h, &alice);

    h.service.issue_verification_code(&ctx).await.unwrap();
    let code = h.mailer.last_code_for("alice@example.com").unwrap();

    h.service.reset_password(&ctx, code, "new").await.unwrap();

    let stored = h.reload(&alice);
    assert_eq!(stored.verification_code, 0);
    assert!(h.hasher.verify(&stored.password_hash, "new").is_ok());

    let err = h
        .service
        .reset_password(&ctx, code, "newer")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidCredential(_)));
    assert!(h.hasher.verify(&h.reload(&alice).password_hash, "new").is_ok());
}

#[tokio::test]
async fn reset_with_wrong_code_changes_nothing() {
    let h = Harness::new();
    let alice = h.seed("alice", "old");
    let ctx = ctx_for(&h, &alice);

    h.service.issue_verification_code(&ctx).await.unwrap();
    let code = h.mailer.last_code_for("alice@example.com").unwrap();
    let before = h.reload(&alice);

    let err = h
        .service
        .reset_password(&ctx, code + 1, "new")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidCredential(_)));

    let after = h.reload(&alice);
    assert_eq!(after.verification_code, code);
    assert_eq!(after.password_hash, before.password_hash);
}

#[tokio::test]
async fn reset_without_pending_code_is_invalid_credential() {
    let h = Harness::new();
    let alice = h.seed("alice", "old");
    let ctx = ctx_for(&h, &alice);

    for code in [0, 123_456] {
        let err = h.service.reset_password(&ctx, code, "new").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCredential(_)), "{code}");
    }
}

#[tokio::test]
async fn concurrent_resets_with_same_code_succeed_once() {
    let h = Harness::new();
    let alice = h.seed("alice", "old");
    let ctx = ctx_for(&h, &alice);

    h.service.issue_verification_code(&ctx).await.unwrap();
    let code = h.mailer.last_code_for("alice@example.com").unwrap();

    let (a, b) = tokio::join!(
        h.service.reset_password(&ctx, code, "first"),
        h.service.reset_password(&ctx, code, "second"),
    );
    let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(successes, 1, "exactly one reset may consume the code");
    assert_eq!(h.reload(&alice).verification_code, 0);
}

// ── subscriptions ────────────────────────────────────────────────────

#[tokio::test]
async fn subscribing_twice_creates_one_relation_and_one_notification() {
    let mut h = Harness::new();
    let target = h.seed("target", "pw");
    let fan = h.seed("fan", "pw");
    let ctx = ctx_for(&h, &fan);

    let first = h.service.subscribe(&ctx, &target.id.to_string()).await.unwrap();
    let second = h.service.subscribe(&ctx, &target.id.to_string()).await.unwrap();
    assert_eq!(first.status, "subscribed");
    assert_eq!(second.status, "already subscribed");

    let subscribers = h
        .service
        .list_subscribers(&target.id.to_string())
        .await
        .unwrap();
    assert_eq!(subscribers, vec![fan.id]);

    let published = h.drain_published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].exchange, EXCHANGE);
    assert_eq!(published[0].routing_key, ROUTING_KEY);
    let message: NotificationMessage =
        serde_json::from_value(published[0].payload.clone()).unwrap();
    assert_eq!(message.sender_id, fan.id);
    assert_eq!(message.receiver_id, target.id);
}

#[tokio::test]
async fn subscribe_to_missing_account_is_not_found() {
    let mut h = Harness::new();
    let fan = h.seed("fan", "pw");

    let err = h
        .service
        .subscribe(&ctx_for(&h, &fan), &AccountId::new_v4().to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)), "{err:?}");
    assert!(h.drain_published().is_empty());
}

#[tokio::test]
async fn subscribe_with_unparseable_target_is_malformed() {
    let h = Harness::new();
    let fan = h.seed("fan", "pw");
    let err = h
        .service
        .subscribe(&ctx_for(&h, &fan), "nope")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Malformed(_)));
}

#[tokio::test]
async fn publish_failure_is_internal_but_subscription_stays() {
    let h = Harness::with_failing_publisher();
    let target = h.seed("target", "pw");
    let fan = h.seed("fan", "pw");

    let err = h
        .service
        .subscribe(&ctx_for(&h, &fan), &target.id.to_string())
        .await
        .unwrap_err();
    assert!(
        matches!(err, ServiceError::Internal { operation: "subscribe", .. }),
        "{err:?}"
    );
    assert_eq!(h.store.list_subscribers(target.id).unwrap(), vec![fan.id]);
}

#[tokio::test]
async fn unsubscribe_removes_relation_without_notifying() {
    let mut h = Harness::new();
    let target = h.seed("target", "pw");
    let fan = h.seed("fan", "pw");
    let ctx = ctx_for(&h, &fan);

    h.service.subscribe(&ctx, &target.id.to_string()).await.unwrap();
    h.drain_published();

    let removed = h.service.unsubscribe(&ctx, &target.id.to_string()).await.unwrap();
    assert_eq!(removed.status, "unsubscribed");
    let again = h.service.unsubscribe(&ctx, &target.id.to_string()).await.unwrap();
    assert_eq!(again.status, "not subscribed");

    assert!(h.store.list_subscribers(target.id).unwrap().is_empty());
    assert!(h.drain_published().is_empty());
}

#[tokio::test]
async fn deleting_subscriber_removes_relation() {
    let h = Harness::new();
    let target = h.seed("target", "pw");
    let fan = h.seed("fan", "pw");
    let ctx = ctx_for(&h, &fan);

    h.service.subscribe(&ctx, &target.id.to_string()).await.unwrap();
    h.service.delete_account(&ctx, "pw", "SUBMIT").await.unwrap();

    assert!(h
        .service
        .list_subscribers(&target.id.to_string())
        .await
        .unwrap()
        .is_empty());
}
