//! End-to-end batch runs against the in-memory organizations.

use std::sync::Arc;
use std::time::Duration;

use account_mover::cloud::mocks::{FailPoint, FakeCall, FakeCloud, RecordingSleeper};
use account_mover::{
    AccountId, AccountOutcome, MigrationError, MigrationOrchestrator, MigrationSettings,
    MigrationStage, PollConfig, TrustPolicyDocument,
};

const SOURCE_MGMT: &str = "100000000000";
const TARGET_MGMT: &str = "200000000000";
const DEST_OU: &str = "ou-dst-workloads";

fn id(raw: &str) -> AccountId {
    AccountId::new(raw).unwrap()
}

struct Harness {
    cloud: FakeCloud,
    sleeper: RecordingSleeper,
}

impl Harness {
    fn new(members: &[&str]) -> Self {
        let cloud = FakeCloud::new();
        cloud.add_organization("source", &id(SOURCE_MGMT), "r-src", &[]);
        cloud.add_organization("target", &id(TARGET_MGMT), "r-dst", &[DEST_OU]);
        for member in members {
            cloud.add_member_account(&id(member), &id(SOURCE_MGMT));
        }
        Self {
            cloud,
            sleeper: RecordingSleeper::new(),
        }
    }

    fn orchestrator(&self, max_failures: u32) -> MigrationOrchestrator {
        MigrationOrchestrator::new(
            Arc::new(self.cloud.clone()),
            Arc::new(self.sleeper.clone()),
            MigrationSettings {
                source_profile: "source".to_string(),
                target_profile: "target".to_string(),
                target_ou_id: DEST_OU.to_string(),
                role_name: "OrganizationAccountAccessRole".to_string(),
                session_name: "AccountMover".to_string(),
                max_failures,
                settle_delay: Duration::from_secs(30),
                poll: PollConfig::default(),
            },
        )
    }
}

#[tokio::test]
async fn test_full_batch_moves_every_account() {
    let members = ["111111111111", "222222222222", "333333333333"];
    let harness = Harness::new(&members);
    let accounts: Vec<AccountId> = members.iter().map(|m| id(m)).collect();

    let report = harness.orchestrator(3).run(&accounts).await.unwrap();

    assert!(report.is_clean());
    assert_eq!(report.success_count(), 3);
    assert_eq!(report.successful(), accounts.iter().collect::<Vec<_>>());
    for account in &accounts {
        assert_eq!(harness.cloud.organization_of(account), Some(id(TARGET_MGMT)));
        assert_eq!(harness.cloud.parent_of(account).as_deref(), Some(DEST_OU));

        let trust = harness.cloud.trust_document(account).unwrap();
        assert_eq!(trust, TrustPolicyDocument::sole_trust(id(TARGET_MGMT).root_principal_arn()));
    }
}

#[tokio::test]
async fn test_steps_run_in_order_for_one_account() {
    let member = id("111111111111");
    let harness = Harness::new(&[member.as_str()]);

    harness.orchestrator(3).run(&[member.clone()]).await.unwrap();

    let steps: Vec<&'static str> = harness
        .cloud
        .calls_for(&member)
        .iter()
        .map(|call| match call {
            FakeCall::GetRole { .. } => "get-role",
            FakeCall::UpdateRole { .. } => "update-role",
            FakeCall::Remove { .. } => "remove",
            FakeCall::Invite { .. } => "invite",
            FakeCall::ListHandshakes { .. } => "list-handshakes",
            FakeCall::Accept { .. } => "accept",
            FakeCall::Move { .. } => "move",
            _ => "other",
        })
        .collect();

    assert_eq!(
        steps,
        vec![
            "get-role",
            "update-role",
            "remove",
            "invite",
            "list-handshakes",
            "accept",
            "update-role",
            "move",
        ]
    );
    assert!(harness.cloud.calls().contains(&FakeCall::Move {
        account: member,
        from: "r-dst".to_string(),
        to: DEST_OU.to_string(),
    }));
}

#[tokio::test]
async fn test_settle_delay_precedes_invitation() {
    let member = id("111111111111");
    let harness = Harness::new(&[member.as_str()]);

    harness.orchestrator(3).run(&[member]).await.unwrap();

    assert_eq!(harness.sleeper.waits(), vec![Duration::from_secs(30)]);
}

#[tokio::test]
async fn test_ceiling_of_one_stops_after_first_failure() {
    let members = ["111111111111", "222222222222", "333333333333"];
    let harness = Harness::new(&members);
    harness.cloud.fail_on(FailPoint::Remove, &id(members[0]));
    let accounts: Vec<AccountId> = members.iter().map(|m| id(m)).collect();

    let report = harness.orchestrator(1).run(&accounts).await.unwrap();

    assert_eq!(report.failure_count(), 1);
    assert_eq!(report.success_count(), 0);
    assert!(report.halted);
    assert_eq!(report.unvisited, 2);
    assert!(harness.cloud.calls_for(&accounts[1]).is_empty());
    assert!(harness.cloud.calls_for(&accounts[2]).is_empty());
}

#[tokio::test]
async fn test_failures_below_ceiling_do_not_stop_the_batch() {
    let members = ["111111111111", "222222222222", "333333333333"];
    let harness = Harness::new(&members);
    harness.cloud.fail_on(FailPoint::Invite, &id(members[1]));
    let accounts: Vec<AccountId> = members.iter().map(|m| id(m)).collect();

    let report = harness.orchestrator(3).run(&accounts).await.unwrap();

    assert!(!report.halted);
    assert_eq!(report.successful(), vec![&accounts[0], &accounts[2]]);
    assert_eq!(report.failed(), vec![&accounts[1]]);
    assert!(!report.is_clean());
}

#[tokio::test]
async fn test_ceiling_reached_on_last_account_is_not_halted() {
    let members = ["111111111111", "222222222222"];
    let harness = Harness::new(&members);
    harness.cloud.fail_on(FailPoint::Remove, &id(members[0]));
    harness.cloud.fail_on(FailPoint::Remove, &id(members[1]));
    let accounts: Vec<AccountId> = members.iter().map(|m| id(m)).collect();

    let report = harness.orchestrator(2).run(&accounts).await.unwrap();

    assert_eq!(report.failure_count(), 2);
    assert!(!report.halted);
    assert_eq!(report.unvisited, 0);
}

#[tokio::test]
async fn test_later_failure_leaves_earlier_success_intact() {
    let members = ["111111111111", "222222222222"];
    let harness = Harness::new(&members);
    harness.cloud.fail_on(FailPoint::Move, &id(members[1]));
    let accounts: Vec<AccountId> = members.iter().map(|m| id(m)).collect();

    let report = harness.orchestrator(1).run(&accounts).await.unwrap();

    assert_eq!(report.successful(), vec![&accounts[0]]);
    assert_eq!(harness.cloud.parent_of(&accounts[0]).as_deref(), Some(DEST_OU));
    match &report.outcomes[1] {
        AccountOutcome::Failed { stage, .. } => assert_eq!(*stage, MigrationStage::Accepted),
        other => panic!("expected failure, got {other:?}"),
    }
    // Joined the target organization but still sits at the root.
    assert_eq!(harness.cloud.organization_of(&accounts[1]), Some(id(TARGET_MGMT)));
    assert_eq!(harness.cloud.parent_of(&accounts[1]).as_deref(), Some("r-dst"));
}

#[tokio::test]
async fn test_invisible_handshake_times_out_after_ten_polls() {
    let member = id("111111111111");
    let harness = Harness::new(&[member.as_str()]);
    harness.cloud.set_handshake_visible_on_poll(&member, 11);

    let report = harness.orchestrator(3).run(&[member.clone()]).await.unwrap();

    match &report.outcomes[0] {
        AccountOutcome::Failed { stage, error, .. } => {
            assert_eq!(*stage, MigrationStage::Invited);
            assert!(matches!(
                error,
                MigrationError::HandshakeNotFound { attempts: 10, .. }
            ));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(harness.sleeper.total(), Duration::from_secs(30 + 100));
    assert!(!harness
        .cloud
        .calls_for(&member)
        .iter()
        .any(|call| matches!(call, FakeCall::Accept { .. })));
    // Left the source organization but never joined the target.
    assert_eq!(harness.cloud.organization_of(&member), None);
}

#[tokio::test]
async fn test_late_handshake_is_accepted() {
    let member = id("111111111111");
    let harness = Harness::new(&[member.as_str()]);
    harness.cloud.set_handshake_visible_on_poll(&member, 4);

    let report = harness.orchestrator(3).run(&[member]).await.unwrap();

    assert!(report.is_clean());
    assert_eq!(harness.sleeper.total(), Duration::from_secs(30 + 30));
}

#[tokio::test]
async fn test_unreachable_role_fails_before_removal() {
    let member = id("111111111111");
    let harness = Harness::new(&[member.as_str()]);
    harness.cloud.deny_assume_role(&member);

    let report = harness.orchestrator(3).run(&[member.clone()]).await.unwrap();

    match &report.outcomes[0] {
        AccountOutcome::Failed { stage, error, .. } => {
            assert_eq!(*stage, MigrationStage::Pending);
            assert!(matches!(error, MigrationError::AssumeRole { .. }));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(harness.cloud.organization_of(&member), Some(id(SOURCE_MGMT)));
}

#[tokio::test]
async fn test_missing_target_root_fails_placement() {
    let member = id("111111111111");
    let harness = Harness::new(&[member.as_str()]);
    harness.cloud.clear_root_ids(&id(TARGET_MGMT));

    let report = harness.orchestrator(3).run(&[member]).await.unwrap();

    match &report.outcomes[0] {
        AccountOutcome::Failed { error, .. } => {
            assert_eq!(*error, MigrationError::NoOrganizationRoot)
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unresolvable_target_identity_aborts_run() {
    let member = id("111111111111");
    let harness = Harness::new(&[member.as_str()]);
    let orchestrator = MigrationOrchestrator::new(
        Arc::new(harness.cloud.clone()),
        Arc::new(harness.sleeper.clone()),
        MigrationSettings {
            target_profile: "missing".to_string(),
            ..harness.orchestrator(3).settings().clone()
        },
    );

    let result = orchestrator.run(&[member.clone()]).await;

    assert!(matches!(result, Err(MigrationError::Credentials { .. })));
    assert!(harness.cloud.calls_for(&member).is_empty());
}

#[tokio::test]
async fn test_empty_input_produces_empty_report() {
    let harness = Harness::new(&[]);

    let report = harness.orchestrator(3).run(&[]).await.unwrap();

    assert!(report.outcomes.is_empty());
    assert!(report.is_clean());
}
