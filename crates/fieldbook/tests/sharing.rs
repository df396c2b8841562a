//! End-to-end sharing flows through the service layer.

use std::sync::Arc;
use std::time::Duration;

use fieldbook::core::{DocumentType, InviteToken, Principal, ShareScope, UserId};
use fieldbook::sharing::{
    Channel, GrantEventKind, NotificationDispatcher, SharingConfig, SharingError,
    ALREADY_SHARED_TO_YOU,
};
use fieldbook::store::{MemoryStore, Store};
use fieldbook::{
    AcceptInviteRequest, CreateShareRequest, CreateShareResponse, FieldbookError,
    ListSharesQuery, ShareService, TargetRef,
};
use fieldbook_testkit::{
    failing_dispatcher, multi_party_fixture, recording_dispatcher, FailingNotifier, FaultyStore,
    RecordingMailer, RecordingNotifier, TestFixture,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn service(
    fixture: &TestFixture,
) -> (
    ShareService<MemoryStore>,
    Arc<RecordingNotifier>,
    Arc<RecordingMailer>,
) {
    let config = SharingConfig::default();
    let (dispatcher, notifier, mailer) = recording_dispatcher(config.dispatch_wait);
    let service = ShareService::new(Arc::clone(&fixture.store), dispatcher, config);
    (service, notifier, mailer)
}

fn share_one(document_id: &str, athlete_type: &str, athlete_id: &str) -> CreateShareRequest {
    CreateShareRequest {
        document_type: "match-report".to_string(),
        document_id: Some(document_id.to_string()),
        scope: "one".to_string(),
        target: Some(TargetRef {
            athlete_type: athlete_type.to_string(),
            athlete_id: athlete_id.to_string(),
        }),
        email: None,
    }
}

fn share_all_with(user: UserId) -> CreateShareRequest {
    CreateShareRequest {
        document_type: "match-report".to_string(),
        document_id: None,
        scope: "all".to_string(),
        target: Some(TargetRef {
            athlete_type: "user".to_string(),
            athlete_id: user.to_hex(),
        }),
        email: None,
    }
}

fn share_by_email(document_id: &str, email: &str) -> CreateShareRequest {
    CreateShareRequest {
        document_type: "match-report".to_string(),
        document_id: Some(document_id.to_string()),
        scope: "one".to_string(),
        target: None,
        email: Some(email.to_string()),
    }
}

fn invite_token(mailer: &RecordingMailer) -> InviteToken {
    mailer
        .events()
        .into_iter()
        .rev()
        .find_map(|e| match e.kind {
            GrantEventKind::InviteIssued { token, .. } => Some(token),
            _ => None,
        })
        .expect("an invite email was sent")
}

#[tokio::test]
async fn test_three_party_sharing() {
    init_tracing();
    let fixture = TestFixture::new();
    let (service, notifier, mailer) = service(&fixture);

    let u1 = fixture.user("u1").await;
    let u2 = fixture.user("u2").await;
    let u3 = fixture.user("u3").await;
    let m1 = fixture.match_report(u1.id, "first half notes").await;
    let viewer = Principal::User(u2.id);

    // U2 cannot see M1 yet
    let err = service
        .fetch_report(viewer, "match-report", &m1.id.to_hex())
        .await
        .unwrap_err();
    assert!(matches!(err, FieldbookError::Forbidden(_)));

    // U1 shares M1 with U2
    let response = service
        .create_share(u1.id, share_one(&m1.id.to_hex(), "user", &u2.id.to_hex()))
        .await
        .unwrap();
    let CreateShareResponse::Share {
        share,
        was_inserted,
        warnings,
    } = response
    else {
        panic!("expected a share");
    };
    assert!(was_inserted);
    assert!(warnings.is_empty());
    assert_eq!(share.scope, ShareScope::One(m1.id));
    assert_eq!(notifier.len(), 1);
    assert_eq!(mailer.recipients(), vec![u2.email.clone()]);

    let report = service
        .fetch_report(viewer, "match-report", &m1.id.to_hex())
        .await
        .unwrap();
    assert_eq!(report.id, m1.id);

    // U2 tries to pass M1 on to U3
    let err = service
        .create_share(u2.id, share_one(&m1.id.to_hex(), "user", &u3.id.to_hex()))
        .await
        .unwrap_err();
    match err {
        FieldbookError::Sharing(SharingError::Conflict(reason)) => {
            assert_eq!(reason, ALREADY_SHARED_TO_YOU)
        }
        other => panic!("expected conflict, got {:?}", other),
    }

    // U1 shares all match reports with U2; M2 is created afterwards
    service.create_share(u1.id, share_all_with(u2.id)).await.unwrap();
    let m2 = fixture.match_report(u1.id, "second match").await;
    service
        .fetch_report(viewer, "match-report", &m2.id.to_hex())
        .await
        .unwrap();

    // The all-grant does not leak to U3 or to other owners' reports
    let m3 = fixture.match_report(u3.id, "u3 private").await;
    assert!(matches!(
        service
            .fetch_report(viewer, "match-report", &m3.id.to_hex())
            .await,
        Err(FieldbookError::Forbidden(_))
    ));
    assert!(matches!(
        service
            .fetch_report(Principal::User(u3.id), "match-report", &m2.id.to_hex())
            .await,
        Err(FieldbookError::Forbidden(_))
    ));

    let listing = service
        .list_shares(
            u1.id,
            ListSharesQuery {
                document_type: "match-report".to_string(),
                document_id: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(listing.shares.len(), 1);
    assert_eq!(listing.shares[0].scope, ShareScope::All);
}

#[tokio::test]
async fn test_concurrent_share_creates_one_grant() {
    init_tracing();
    let fixture = TestFixture::new();
    let (service, notifier, _mailer) = service(&fixture);
    let service = Arc::new(service);

    let owner = fixture.user("owner").await;
    let friend = fixture.user("friend").await;
    let report = fixture.match_report(owner.id, "set pieces").await;

    let owner_id = owner.id;
    let mut handles = Vec::new();
    for _ in 0..20 {
        let service = Arc::clone(&service);
        let request = share_one(&report.id.to_hex(), "user", &friend.id.to_hex());
        handles.push(tokio::spawn(async move {
            service.create_share(owner_id, request).await
        }));
    }

    let mut ids = Vec::new();
    let mut inserted = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            CreateShareResponse::Share {
                share,
                was_inserted,
                ..
            } => {
                ids.push(share.id);
                if was_inserted {
                    inserted += 1;
                }
            }
            other => panic!("expected a share, got {:?}", other),
        }
    }

    assert_eq!(inserted, 1);
    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(notifier.len(), 1);

    let shares = fixture
        .store
        .shares_for_principal(&Principal::User(friend.id), DocumentType::MatchReport)
        .await
        .unwrap();
    assert_eq!(shares.len(), 1);
}

#[tokio::test]
async fn test_notification_failures_become_warnings() {
    init_tracing();
    let fixture = TestFixture::new();
    let config = SharingConfig::default();
    let service = ShareService::new(
        Arc::clone(&fixture.store),
        failing_dispatcher(config.dispatch_wait),
        config,
    );

    let owner = fixture.user("owner").await;
    let friend = fixture.user("friend").await;
    let report = fixture.match_report(owner.id, "pressing triggers").await;

    let response = service
        .create_share(owner.id, share_one(&report.id.to_hex(), "user", &friend.id.to_hex()))
        .await
        .unwrap();

    let channels: Vec<Channel> = response.warnings().iter().map(|w| w.channel).collect();
    assert_eq!(channels.len(), 2);
    assert!(channels.contains(&Channel::Notification));
    assert!(channels.contains(&Channel::Email));

    // The grant is in place regardless
    service
        .fetch_report(Principal::User(friend.id), "match-report", &report.id.to_hex())
        .await
        .unwrap();

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["type"], "share");
    assert_eq!(json["warnings"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_failed_notification_still_emails() {
    init_tracing();
    let fixture = TestFixture::new();
    let config = SharingConfig::default();
    let mailer = RecordingMailer::new();
    let dispatcher = NotificationDispatcher::new(
        Arc::new(FailingNotifier),
        mailer.clone(),
        config.dispatch_wait,
    );
    let service = ShareService::new(Arc::clone(&fixture.store), dispatcher, config);

    let owner = fixture.user("owner").await;
    let friend = fixture.user("friend").await;

    let response = service
        .create_share(owner.id, share_all_with(friend.id))
        .await
        .unwrap();

    let channels: Vec<Channel> = response.warnings().iter().map(|w| w.channel).collect();
    assert_eq!(channels, vec![Channel::Notification]);
    assert_eq!(mailer.recipients(), vec![friend.email.clone()]);
}

#[tokio::test]
async fn test_directory_outage_after_grant_does_not_fail_share() {
    init_tracing();
    let fixture = TestFixture::new();
    let owner = fixture.user("owner").await;
    let parent = fixture.user("parent").await;
    let child = fixture.family_member(parent.id, "junior").await;
    let friend = fixture.user("friend").await;
    let report = fixture.match_report(owner.id, "wide overloads").await;

    let store =
        Arc::new(FaultyStore::new(Arc::clone(&fixture.store)).fail_directory_after_grant());
    let config = SharingConfig::default();
    let (dispatcher, notifier, mailer) = recording_dispatcher(config.dispatch_wait);
    let service = ShareService::new(Arc::clone(&store), dispatcher, config);

    let response = service
        .create_share(owner.id, share_one(&report.id.to_hex(), "user", &friend.id.to_hex()))
        .await
        .unwrap();
    let CreateShareResponse::Share { share, was_inserted, .. } = response else {
        panic!("expected a share");
    };
    assert!(was_inserted);
    assert_eq!(mailer.recipients(), vec![friend.email.clone()]);
    assert_eq!(notifier.len(), 1);

    let held = fixture
        .store
        .shares_for_principal(&Principal::User(friend.id), DocumentType::MatchReport)
        .await
        .unwrap();
    assert_eq!(held, vec![share]);

    // Directory is down now; a new grant fails before anything is written
    let err = service
        .create_share(owner.id, share_one(&report.id.to_hex(), "family", &child.id.to_hex()))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "internal");
    assert!(fixture
        .store
        .shares_for_principal(&Principal::Family(child.id), DocumentType::MatchReport)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_all_grants_from_two_owners_conflict() {
    init_tracing();
    let (fixture, users) = multi_party_fixture(3).await;
    let (service, notifier, _mailer) = service(&fixture);
    let (first, second, scout) = (&users[0], &users[1], &users[2]);

    let granted = service
        .create_share(first.id, share_all_with(scout.id))
        .await
        .unwrap();
    let err = service
        .create_share(second.id, share_all_with(scout.id))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "conflict");
    assert!(matches!(
        err,
        FieldbookError::Sharing(SharingError::Conflict(_))
    ));

    // The first owner repeating the grant still collapses onto it
    let again = service
        .create_share(first.id, share_all_with(scout.id))
        .await
        .unwrap();
    match (granted, again) {
        (
            CreateShareResponse::Share { share: a, .. },
            CreateShareResponse::Share { share: b, was_inserted, .. },
        ) => {
            assert_eq!(a.id, b.id);
            assert!(!was_inserted);
        }
        other => panic!("expected shares, got {:?}", other),
    }
    assert_eq!(notifier.len(), 1);

    let held = fixture
        .store
        .shares_for_principal(&Principal::User(scout.id), DocumentType::MatchReport)
        .await
        .unwrap();
    assert_eq!(held.len(), 1);
    assert_eq!(held[0].owner_id, first.id);
}

#[tokio::test]
async fn test_slow_mailer_does_not_block_share() {
    init_tracing();
    let fixture = TestFixture::new();
    let config = SharingConfig::default().with_dispatch_wait(Duration::from_millis(50));
    let dispatcher = NotificationDispatcher::new(
        RecordingNotifier::new(),
        Arc::new(fieldbook_testkit::SlowMailer(Duration::from_secs(30))),
        config.dispatch_wait,
    );
    let service = ShareService::new(Arc::clone(&fixture.store), dispatcher, config);

    let owner = fixture.user("owner").await;
    let friend = fixture.user("friend").await;

    let started = std::time::Instant::now();
    let response = service.create_share(owner.id, share_all_with(friend.id)).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(response.warnings().is_empty());
}

#[tokio::test]
async fn test_invite_flow() {
    init_tracing();
    let fixture = TestFixture::new();
    let (service, notifier, mailer) = service(&fixture);

    let owner = fixture.user("owner").await;
    let report = fixture.match_report(owner.id, "back four shape").await;

    // No account yet: invite
    let response = service
        .create_share(owner.id, share_by_email(&report.id.to_hex(), "New.Scout@Example.com"))
        .await
        .unwrap();
    let CreateShareResponse::Invite {
        invite_id,
        was_inserted,
        ..
    } = response
    else {
        panic!("expected an invite");
    };
    assert!(was_inserted);
    assert_eq!(mailer.recipients(), vec!["new.scout@example.com".to_string()]);
    assert!(notifier.is_empty());

    // Asking again reuses the pending invite and resends
    let again = service
        .create_share(owner.id, share_by_email(&report.id.to_hex(), "new.scout@example.com"))
        .await
        .unwrap();
    match again {
        CreateShareResponse::Invite {
            invite_id: reused,
            was_inserted,
            ..
        } => {
            assert_eq!(reused, invite_id);
            assert!(!was_inserted);
        }
        other => panic!("expected an invite, got {:?}", other),
    }
    assert_eq!(mailer.len(), 2);

    let listing = service
        .list_shares(
            owner.id,
            ListSharesQuery {
                document_type: "match-report".to_string(),
                document_id: Some(report.id.to_hex()),
            },
        )
        .await
        .unwrap();
    assert!(listing.shares.is_empty());
    assert_eq!(listing.invites.len(), 1);

    // The scout signs up and accepts
    let scout = fixture.user("new.scout").await;
    let token = invite_token(&mailer);
    let accepted = service
        .accept_invite(
            scout.id,
            AcceptInviteRequest {
                token: token.as_str().to_string(),
            },
        )
        .await
        .unwrap();
    assert!(accepted.was_inserted);
    assert_eq!(accepted.share.shared_with, Principal::User(scout.id));
    assert_eq!(notifier.len(), 1);

    service
        .fetch_report(Principal::User(scout.id), "match-report", &report.id.to_hex())
        .await
        .unwrap();

    // The token is single use
    let err = service
        .accept_invite(
            scout.id,
            AcceptInviteRequest {
                token: token.as_str().to_string(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "invite");

    // An email that now has an account becomes a direct share
    let other = fixture.match_report(owner.id, "another match").await;
    let direct = service
        .create_share(owner.id, share_by_email(&other.id.to_hex(), "NEW.SCOUT@example.com"))
        .await
        .unwrap();
    match direct {
        CreateShareResponse::Share { share, .. } => {
            assert_eq!(share.shared_with, Principal::User(scout.id))
        }
        other => panic!("expected a share, got {:?}", other),
    }
}

#[tokio::test]
async fn test_family_member_share_notifies_guardian() {
    init_tracing();
    let fixture = TestFixture::new();
    let (service, notifier, mailer) = service(&fixture);

    let coach = fixture.user("coach").await;
    let parent = fixture.user("parent").await;
    let child = fixture.family_member(parent.id, "junior").await;
    let report = fixture.personal_scout(coach.id, "good first touch").await;

    let request = CreateShareRequest {
        document_type: "personal-scout".to_string(),
        document_id: Some(report.id.to_hex()),
        scope: "one".to_string(),
        target: Some(TargetRef {
            athlete_type: "family".to_string(),
            athlete_id: child.id.to_hex(),
        }),
        email: None,
    };
    service.create_share(coach.id, request).await.unwrap();

    assert_eq!(notifier.events()[0].notify_user, Some(parent.id));
    assert_eq!(mailer.recipients(), vec![parent.email.clone()]);

    service
        .fetch_report(Principal::Family(child.id), "personal-scout", &report.id.to_hex())
        .await
        .unwrap();
    // The guardian's own account holds no grant
    assert!(matches!(
        service
            .fetch_report(Principal::User(parent.id), "personal-scout", &report.id.to_hex())
            .await,
        Err(FieldbookError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_delete_share_revokes_access() {
    init_tracing();
    let fixture = TestFixture::new();
    let (service, _notifier, _mailer) = service(&fixture);

    let owner = fixture.user("owner").await;
    let friend = fixture.user("friend").await;
    let report = fixture.match_report(owner.id, "transition play").await;

    let CreateShareResponse::Share { share, .. } = service
        .create_share(owner.id, share_one(&report.id.to_hex(), "user", &friend.id.to_hex()))
        .await
        .unwrap()
    else {
        panic!("expected a share");
    };

    // Only the owner may revoke
    let err = service
        .delete_share(friend.id, &share.id.to_hex())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "authorization");

    assert!(service.delete_share(owner.id, &share.id.to_hex()).await.unwrap().deleted);
    assert!(!service.delete_share(owner.id, &share.id.to_hex()).await.unwrap().deleted);

    assert!(matches!(
        service
            .fetch_report(Principal::User(friend.id), "match-report", &report.id.to_hex())
            .await,
        Err(FieldbookError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_validation_precedes_store_access() {
    let fixture = TestFixture::new();
    let (service, _notifier, _mailer) = service(&fixture);
    let owner = UserId::generate();

    let mut request = share_all_with(UserId::generate());
    request.document_type = "highlight-reel".to_string();
    let err = service.create_share(owner, request).await.unwrap_err();
    assert_eq!(err.code(), "validation");

    let err = service
        .create_share(owner, share_by_email(&UserId::generate().to_hex(), "not-an-email"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "validation");

    let err = service
        .accept_invite(
            owner,
            AcceptInviteRequest {
                token: "short".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "validation");
}
