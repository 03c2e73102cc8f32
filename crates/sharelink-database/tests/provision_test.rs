//! Integration tests for provisioning against a live PostgreSQL.

mod helpers;

use serial_test::serial;

use sharelink_core::error::ErrorKind;
use sharelink_database::schema::definition::{INDEXES, MANAGE_POLICY, VIEW_POLICY};
use sharelink_database::schema::{self, StepOutcome};
use sharelink_entity::ShareLink;

#[tokio::test]
#[serial]
async fn test_fresh_provision_creates_everything() {
    let Some(mut conn) = helpers::test_connection().await else {
        return;
    };

    let report = schema::apply(&mut conn, |_| {}).await.unwrap();

    assert_eq!(report.row_count, 0);
    assert_eq!(report.steps.len(), 7);
    assert_eq!(report.policy_outcome(MANAGE_POLICY), Some(StepOutcome::Created));
    assert_eq!(report.policy_outcome(VIEW_POLICY), Some(StepOutcome::Created));

    let inspected = schema::inspect(&mut conn).await.unwrap();
    assert!(inspected.table_exists);
    assert!(inspected.rls_enabled);
    assert!(inspected.is_valid(), "unexpected issues: {:?}", inspected.issues);
    assert_eq!(inspected.columns.len(), 14);
    for index in INDEXES {
        assert!(inspected.has_index(index.name), "missing {}", index.name);
    }
    assert_eq!(inspected.policies.len(), 2);
    assert_eq!(
        inspected.policy(MANAGE_POLICY).map(|p| p.command.as_str()),
        Some("ALL")
    );
    assert_eq!(
        inspected.policy(VIEW_POLICY).map(|p| p.command.as_str()),
        Some("SELECT")
    );
}

#[tokio::test]
#[serial]
async fn test_second_run_skips_existing_policies() {
    let Some(mut conn) = helpers::test_connection().await else {
        return;
    };

    schema::apply(&mut conn, |_| {}).await.unwrap();
    let first = schema::inspect(&mut conn).await.unwrap();

    let mut skipped = Vec::new();
    let second_run = schema::apply(&mut conn, |step| {
        if step.outcome == StepOutcome::AlreadyExists {
            skipped.push(step.label.clone());
        }
    })
    .await
    .unwrap();
    assert_eq!(
        skipped,
        vec![
            "policy users_manage_share_links",
            "policy anyone_view_active_share_links"
        ]
    );
    assert_eq!(
        second_run.policy_outcome(MANAGE_POLICY),
        Some(StepOutcome::AlreadyExists)
    );
    assert_eq!(
        second_run.policy_outcome(VIEW_POLICY),
        Some(StepOutcome::AlreadyExists)
    );

    let second = schema::inspect(&mut conn).await.unwrap();
    assert_eq!(first.columns, second.columns);
    assert_eq!(first.indexes, second.indexes);
    assert_eq!(first.policies, second.policies);
    assert_eq!(first.issues, second.issues);
}

#[tokio::test]
#[serial]
async fn test_duplicate_slug_is_rejected() {
    let Some(mut conn) = helpers::test_connection().await else {
        return;
    };
    schema::apply(&mut conn, |_| {}).await.unwrap();

    helpers::insert_link(&mut conn, "q3-roadmap").await.unwrap();
    let err = helpers::insert_link(&mut conn, "q3-roadmap")
        .await
        .unwrap_err();

    let db_err = err.as_database_error().expect("expected a database error");
    assert!(db_err.is_unique_violation());
    assert_eq!(db_err.code().as_deref(), Some("23505"));

    assert_eq!(schema::count_rows(&mut conn).await.unwrap(), 1);
}

#[tokio::test]
#[serial]
async fn test_defaults_applied_to_new_rows() {
    let Some(mut conn) = helpers::test_connection().await else {
        return;
    };
    schema::apply(&mut conn, |_| {}).await.unwrap();
    helpers::insert_link(&mut conn, "onboarding-prompt")
        .await
        .unwrap();

    let link = sqlx::query_as::<_, ShareLink>("SELECT * FROM public.share_links WHERE slug = $1")
        .bind("onboarding-prompt")
        .fetch_one(&mut conn)
        .await
        .unwrap();

    assert_eq!(link.current_views, Some(0));
    assert_eq!(link.allow_copying, Some(true));
    assert_eq!(link.show_variables, Some(true));
    assert_eq!(link.is_active, Some(true));
    assert!(link.created_at.is_some());
    assert!(link.expires_at.is_none());
    assert!(link.is_viewable_at(chrono::Utc::now()));
}

#[tokio::test]
#[serial]
async fn test_failed_statement_rolls_back_whole_run() {
    let Some(mut conn) = helpers::test_connection().await else {
        return;
    };
    sqlx::query("CREATE TABLE public.share_links (slug TEXT)")
        .execute(&mut conn)
        .await
        .unwrap();

    let mut completed = Vec::new();
    let err = schema::apply(&mut conn, |step| completed.push(step.label.clone()))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Database);
    assert!(err.message.contains("idx_share_links_prompt_id"));
    assert_eq!(
        completed,
        vec!["table share_links", "index idx_share_links_slug"]
    );

    let inspected = schema::inspect(&mut conn).await.unwrap();
    assert!(!inspected.has_index("idx_share_links_slug"));
    assert!(!inspected.rls_enabled);
    assert!(inspected.policies.is_empty());

    helpers::drop_table(&mut conn).await;
}

#[tokio::test]
#[serial]
async fn test_inspect_missing_table() {
    let Some(mut conn) = helpers::test_connection().await else {
        return;
    };

    let inspected = schema::inspect(&mut conn).await.unwrap();
    assert!(!inspected.table_exists);
    assert!(!inspected.is_valid());
    assert!(inspected.columns.is_empty());
}
