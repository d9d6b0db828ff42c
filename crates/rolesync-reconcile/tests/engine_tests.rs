//! Reconciliation engine tests
//!
//! Covers the three phases against the in-memory catalog:
//! - Provisioning: creation, default grant, all-or-nothing rollback
//! - Membership sync: grants/revokes restricted to managed principals
//! - Deprovisioning: drops isolated per account
//! - Prefix safety, idempotence, dry run, phase timeouts

mod common;

use std::time::Duration;

use common::{init_test_logging, CatalogState, Faults, MemoryCatalog};
use rolesync_reconcile::{
    EngineOptions, Phase, PhaseStatus, PhaseTimeouts, PrincipalSet, ReconciliationEngine,
    SyncError, SyncPolicy,
};

const DEFAULT_ROLE: &str = "ldap_users";

fn policy(prefixes: &[&str]) -> SyncPolicy {
    SyncPolicy::new(
        prefixes.iter().map(|p| (*p).to_string()).collect(),
        DEFAULT_ROLE,
    )
}

fn set(items: &[&str]) -> PrincipalSet {
    items.iter().copied().collect()
}

fn engine<'a>(
    catalog: &'a MemoryCatalog,
    policy: &'a SyncPolicy,
) -> ReconciliationEngine<'a, MemoryCatalog> {
    ReconciliationEngine::new(catalog, policy, EngineOptions::default())
}

// =============================================================================
// Provisioning
// =============================================================================

#[tokio::test]
async fn test_provision_creates_missing_accounts_with_default_role() {
    init_test_logging();
    let catalog = MemoryCatalog::new(CatalogState::default().with_account("nc_b", &[DEFAULT_ROLE]));
    let policy = policy(&["nc_"]);

    let report = engine(&catalog, &policy)
        .provision(&set(&["nc_a", "nc_b"]))
        .await
        .unwrap();

    assert_eq!(report.status, PhaseStatus::Completed);
    assert_eq!(report.created, vec!["nc_a"]);
    assert_eq!(report.already_present, 1);

    let state = catalog.snapshot();
    assert!(state.accounts.contains("nc_a"));
    assert_eq!(state.role_members(DEFAULT_ROLE), vec!["nc_a", "nc_b"]);
    assert_eq!(catalog.commits(), 1);
}

#[tokio::test]
async fn test_provision_rolls_back_everything_on_failure() {
    init_test_logging();
    let catalog = MemoryCatalog::new(CatalogState::default()).with_faults(Faults {
        fail_create: ["nc_c".to_string()].into_iter().collect(),
        ..Faults::default()
    });
    let policy = policy(&["nc_"]);

    let err = engine(&catalog, &policy)
        .provision(&set(&["nc_a", "nc_b", "nc_c"]))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Catalog(_)));
    // nc_a and nc_b were created inside the transaction but never committed.
    assert!(catalog.snapshot().accounts.is_empty());
    assert_eq!(catalog.commits(), 0);
    assert_eq!(catalog.rollbacks(), 1);
}

#[tokio::test]
async fn test_provision_refuses_principals_outside_prefixes() {
    init_test_logging();
    let catalog = MemoryCatalog::new(CatalogState::default());
    let policy = policy(&["nc_"]);

    let report = engine(&catalog, &policy)
        .provision(&set(&["nc_a", "postgres"]))
        .await
        .unwrap();

    assert_eq!(report.created, vec!["nc_a"]);
    assert!(!catalog.snapshot().accounts.contains("postgres"));
}

// =============================================================================
// Membership sync
// =============================================================================

#[tokio::test]
async fn test_sync_membership_grants_and_revokes() {
    init_test_logging();
    let catalog = MemoryCatalog::new(
        CatalogState::default()
            .with_account("nc_a", &[DEFAULT_ROLE])
            .with_account("nc_b", &[DEFAULT_ROLE, "readers"])
            .with_account("nc_c", &[DEFAULT_ROLE, "readers"]),
    );
    let policy = policy(&["nc_"]);

    let report = engine(&catalog, &policy)
        .sync_membership("readers", &set(&["nc_a", "nc_b"]))
        .await
        .unwrap();

    assert_eq!(report.granted, vec!["nc_a"]);
    assert_eq!(report.revoked, vec!["nc_c"]);
    assert_eq!(
        catalog.snapshot().role_members("readers"),
        vec!["nc_a", "nc_b"]
    );
}

#[tokio::test]
async fn test_sync_membership_never_touches_unmanaged_members() {
    init_test_logging();
    let catalog = MemoryCatalog::new(
        CatalogState::default()
            .with_account("nc_a", &[DEFAULT_ROLE])
            .with_account("svc_reporting", &["readers"])
            .with_account("postgres", &["readers"]),
    );
    let policy = policy(&["nc_"]);

    let report = engine(&catalog, &policy)
        .sync_membership("readers", &set(&["nc_a", "svc_reporting"]))
        .await
        .unwrap();

    // svc_reporting is desired but unmanaged: not granted again, and the
    // unmanaged members stay even though postgres is not desired.
    assert_eq!(report.granted, vec!["nc_a"]);
    assert!(report.revoked.is_empty());
    assert_eq!(
        catalog.snapshot().role_members("readers"),
        vec!["nc_a", "postgres", "svc_reporting"]
    );
}

#[tokio::test]
async fn test_sync_membership_failure_rolls_back_role_only() {
    init_test_logging();
    let catalog = MemoryCatalog::new(
        CatalogState::default()
            .with_account("nc_a", &[DEFAULT_ROLE])
            .with_account("nc_b", &[DEFAULT_ROLE, "writers"]),
    )
    .with_faults(Faults {
        fail_grant_on_role: ["writers".to_string()].into_iter().collect(),
        ..Faults::default()
    });
    let policy = policy(&["nc_"]);
    let engine = engine(&catalog, &policy);

    assert!(engine
        .sync_membership("writers", &set(&["nc_a"]))
        .await
        .is_err());
    // The revoke of nc_b was part of the same transaction.
    assert_eq!(catalog.snapshot().role_members("writers"), vec!["nc_b"]);

    let readers = engine
        .sync_membership("readers", &set(&["nc_a"]))
        .await
        .unwrap();
    assert_eq!(readers.granted, vec!["nc_a"]);
}

// =============================================================================
// Deprovisioning
// =============================================================================

#[tokio::test]
async fn test_deprovision_drops_managed_accounts_no_longer_valid() {
    init_test_logging();
    let catalog = MemoryCatalog::new(
        CatalogState::default()
            .with_account("nc_keep", &[DEFAULT_ROLE])
            .with_account("nc_gone", &[DEFAULT_ROLE, "readers"])
            .with_account("nc_manual", &[])
            .with_account("dba_admin", &[DEFAULT_ROLE]),
    );
    let policy = policy(&["nc_"]);

    let report = engine(&catalog, &policy)
        .deprovision(&set(&["nc_keep"]))
        .await
        .unwrap();

    assert_eq!(report.dropped, vec!["nc_gone"]);
    assert!(report.failures.is_empty());

    let state = catalog.snapshot();
    assert!(!state.accounts.contains("nc_gone"));
    assert!(state.role_members("readers").is_empty());
    // Not a member of the default role: not managed.
    assert!(state.accounts.contains("nc_manual"));
    // Outside the prefixes even though it holds the default role.
    assert!(state.accounts.contains("dba_admin"));
}

#[tokio::test]
async fn test_deprovision_partial_failure_commits_other_drops() {
    init_test_logging();
    let catalog = MemoryCatalog::new(
        CatalogState::default()
            .with_account("nc_a", &[DEFAULT_ROLE])
            .with_account("nc_owner", &[DEFAULT_ROLE])
            .with_account("nc_z", &[DEFAULT_ROLE]),
    )
    .with_faults(Faults {
        fail_drop: ["nc_owner".to_string()].into_iter().collect(),
        ..Faults::default()
    });
    let policy = policy(&["nc_"]);

    let report = engine(&catalog, &policy)
        .deprovision(&PrincipalSet::new())
        .await
        .unwrap();

    assert_eq!(report.dropped, vec!["nc_a", "nc_z"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].account, "nc_owner");

    let state = catalog.snapshot();
    assert_eq!(
        state.accounts.iter().cloned().collect::<Vec<_>>(),
        vec!["nc_owner"]
    );
    assert_eq!(catalog.commits(), 1);
}

// =============================================================================
// Safety and pass-level properties
// =============================================================================

#[tokio::test]
async fn test_empty_prefixes_make_no_catalog_calls() {
    init_test_logging();
    let catalog = MemoryCatalog::new(
        CatalogState::default()
            .with_account("nc_a", &[DEFAULT_ROLE, "readers"])
            .with_account("postgres", &[]),
    );
    let before = catalog.snapshot();
    let policy = policy(&[]);
    let engine = engine(&catalog, &policy);

    let provisioning = engine.provision(&set(&["nc_new"])).await.unwrap();
    let membership = engine
        .sync_membership("readers", &PrincipalSet::new())
        .await
        .unwrap();
    let deprovisioning = engine.deprovision(&PrincipalSet::new()).await.unwrap();

    assert_eq!(provisioning.status, PhaseStatus::Skipped);
    assert_eq!(membership.status, PhaseStatus::Skipped);
    assert_eq!(deprovisioning.status, PhaseStatus::Skipped);
    assert_eq!(catalog.begins(), 0);
    assert_eq!(catalog.mutations(), 0);
    assert_eq!(catalog.snapshot(), before);
}

#[tokio::test]
async fn test_second_pass_is_a_no_op() {
    init_test_logging();
    let catalog = MemoryCatalog::new(
        CatalogState::default()
            .with_account("nc_old", &[DEFAULT_ROLE, "readers"])
            .with_account("nc_b", &[DEFAULT_ROLE, "readers"]),
    );
    let policy = policy(&["nc_"]);
    let engine = engine(&catalog, &policy);
    let valid = set(&["nc_a", "nc_b"]);

    for _ in 0..2 {
        engine.provision(&valid).await.unwrap();
        engine.sync_membership("readers", &valid).await.unwrap();
        engine.deprovision(&valid).await.unwrap();
    }
    let after_first_and_second = catalog.mutations();
    let state = catalog.snapshot();

    let provisioning = engine.provision(&valid).await.unwrap();
    let membership = engine.sync_membership("readers", &valid).await.unwrap();
    let deprovisioning = engine.deprovision(&valid).await.unwrap();

    assert!(provisioning.created.is_empty());
    assert!(membership.granted.is_empty() && membership.revoked.is_empty());
    assert!(deprovisioning.dropped.is_empty());
    assert_eq!(catalog.mutations(), after_first_and_second);
    assert_eq!(catalog.snapshot(), state);
    assert_eq!(state.role_members("readers"), vec!["nc_a", "nc_b"]);
}

#[tokio::test]
async fn test_dry_run_rolls_back_every_phase() {
    init_test_logging();
    let catalog = MemoryCatalog::new(
        CatalogState::default().with_account("nc_old", &[DEFAULT_ROLE]),
    );
    let before = catalog.snapshot();
    let policy = policy(&["nc_"]);
    let engine = ReconciliationEngine::new(
        &catalog,
        &policy,
        EngineOptions {
            dry_run: true,
            ..EngineOptions::default()
        },
    );
    let valid = set(&["nc_a"]);

    let provisioning = engine.provision(&valid).await.unwrap();
    let deprovisioning = engine.deprovision(&valid).await.unwrap();

    // Reports describe what would have happened.
    assert_eq!(provisioning.created, vec!["nc_a"]);
    assert_eq!(deprovisioning.dropped, vec!["nc_old"]);
    assert_eq!(catalog.snapshot(), before);
    assert_eq!(catalog.mutations(), 0);
    assert_eq!(catalog.commits(), 0);
    assert_eq!(catalog.rollbacks(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_phase_timeout_aborts_phase() {
    init_test_logging();
    let catalog = MemoryCatalog::new(CatalogState::default()).with_faults(Faults {
        statement_delay: Some(Duration::from_secs(10)),
        ..Faults::default()
    });
    let policy = policy(&["nc_"]);
    let engine = ReconciliationEngine::new(
        &catalog,
        &policy,
        EngineOptions {
            timeouts: PhaseTimeouts {
                provisioning_secs: 15,
                ..PhaseTimeouts::default()
            },
            dry_run: false,
        },
    );

    // Two existence checks and a create cannot fit in 15 seconds.
    let err = engine
        .provision(&set(&["nc_a", "nc_b"]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SyncError::PhaseTimeout {
            phase: Phase::Provisioning,
            timeout_secs: 15
        }
    ));
    assert!(catalog.snapshot().accounts.is_empty());
    assert_eq!(catalog.commits(), 0);
}
