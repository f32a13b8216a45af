//! Contention policies applied by the execution gateway.

mod common;

use common::{ScriptedRunner, count_rows, rows};
use serde_json::json;
use sql_data_inspector::gateway::{Contention, ExecutionGateway};
use sql_data_inspector::guard::ExecutionGate;
use sql_data_inspector::models::{DatabaseObject, Provider, SessionId};
use sql_data_inspector::{DbRepository, RepositoryOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[test]
fn test_contention_per_provider() {
    let options = RepositoryOptions::default();
    assert!(matches!(
        Contention::for_provider(Provider::Mssql, &options),
        Contention::Serialized(_)
    ));
    assert!(matches!(
        Contention::for_provider(Provider::Postgres, &options),
        Contention::Reaper(_)
    ));
    assert!(matches!(
        Contention::for_provider(Provider::MySql, &options),
        Contention::None
    ));
}

#[tokio::test]
async fn test_run_is_fail_soft_and_try_run_is_not() {
    let gateway = ExecutionGateway::new(
        ScriptedRunner::new(Provider::MySql).fail_on("broken", "syntax error"),
        Contention::None,
    );
    assert!(gateway.try_run("SELECT broken").await.is_err());
    assert!(gateway.run("SELECT broken").await.is_empty());

    let ok = gateway.run("SELECT 1").await;
    assert!(ok.is_empty());
    assert_eq!(gateway.runner().issued().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_mssql_queries_are_serialized_with_settle_delay() {
    let runner = ScriptedRunner::new(Provider::Mssql)
        .on("COUNT(*)", count_rows(1))
        .with_delay(Duration::from_millis(300));
    let options = RepositoryOptions {
        lock_settle_delay_ms: 500,
        ..RepositoryOptions::default()
    };
    let repo = DbRepository::new(runner, options);
    let object = DatabaseObject::table("dbo", "People");

    let start = Instant::now();
    let (a, b) = tokio::join!(
        repo.get_db_table_row_count(SessionId::from("a"), Some(&object), ""),
        repo.get_db_table_row_count(SessionId::from("b"), Some(&object), ""),
    );

    assert_eq!(a.data.count, 1);
    assert_eq!(b.data.count, 1);
    // Each query holds the gate for its run time plus the settle delay
    assert!(start.elapsed() >= Duration::from_millis(1600));
}

#[tokio::test(start_paused = true)]
async fn test_gate_wait_is_bounded() {
    let gateway = Arc::new(ExecutionGateway::new(
        ScriptedRunner::new(Provider::Mssql).with_delay(Duration::from_secs(10)),
        Contention::Serialized(ExecutionGate::new(
            Duration::from_millis(200),
            Duration::ZERO,
        )),
    ));

    let slow = {
        let gateway = gateway.clone();
        tokio::spawn(async move { gateway.run("SELECT slow").await })
    };
    tokio::task::yield_now().await;

    let start = Instant::now();
    gateway.run("SELECT fast").await;
    // Proceeds without the gate once the wait expires, then runs its own query
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(200));
    assert!(elapsed < Duration::from_secs(11));
    slow.await.unwrap();
}

#[tokio::test]
async fn test_postgres_reaper_sweeps_every_threshold_queries() {
    let runner = ScriptedRunner::new(Provider::Postgres)
        .on(
            "pg_terminate_backend",
            rows(vec![
                json!({ "terminated": true }),
                json!({ "terminated": false }),
            ]),
        )
        .on("COUNT(*)", count_rows(3));
    let options = RepositoryOptions {
        reaper_threshold: 3,
        ..RepositoryOptions::default()
    };
    let repo = DbRepository::new(runner, options);
    let object = DatabaseObject::table("public", "people");

    for i in 0..7 {
        let count = repo
            .get_db_table_row_count(SessionId::from(format!("s{}", i)), Some(&object), "")
            .await;
        assert_eq!(count.data.count, 3);
    }

    let runner = repo.gateway().runner();
    assert_eq!(runner.issued_matching("pg_terminate_backend"), 2);
    assert_eq!(runner.issued_matching("COUNT(*)"), 7);
    let sweep = runner
        .issued()
        .into_iter()
        .find(|sql| sql.contains("pg_terminate_backend"))
        .unwrap();
    assert!(sweep.contains("pg_backend_pid()"));
    assert!(sweep.contains("'%FROM pg_catalog.pg_type%'"));
}

#[tokio::test]
async fn test_sweeps_do_not_count_toward_threshold() {
    let options = RepositoryOptions {
        reaper_threshold: 2,
        ..RepositoryOptions::default()
    };
    let repo = DbRepository::new(ScriptedRunner::new(Provider::Postgres), options);
    let object = DatabaseObject::table("public", "people");
    for _ in 0..4 {
        repo.get_db_table_row_count(SessionId::new(), Some(&object), "")
            .await;
    }

    let runner = repo.gateway().runner();
    assert_eq!(runner.issued().len(), 6);
    assert_eq!(runner.issued_matching("pg_terminate_backend"), 2);
    match repo.gateway().contention() {
        Contention::Reaper(reaper) => assert_eq!(reaper.executed(), 0),
        other => panic!("unexpected contention: {:?}", other),
    }
}

#[tokio::test]
async fn test_reaper_disabled_with_zero_threshold() {
    let options = RepositoryOptions {
        reaper_threshold: 0,
        ..RepositoryOptions::default()
    };
    let repo = DbRepository::new(ScriptedRunner::new(Provider::Postgres), options);
    let object = DatabaseObject::table("public", "people");
    for _ in 0..100 {
        repo.get_db_table_row_count(SessionId::new(), Some(&object), "")
            .await;
    }
    assert_eq!(
        repo.gateway()
            .runner()
            .issued_matching("pg_terminate_backend"),
        0
    );
}

#[tokio::test]
async fn test_failed_sweep_does_not_affect_query_result() {
    let runner = ScriptedRunner::new(Provider::Postgres)
        .fail_on("pg_terminate_backend", "permission denied")
        .on("COUNT(*)", count_rows(9));
    let options = RepositoryOptions {
        reaper_threshold: 1,
        ..RepositoryOptions::default()
    };
    let repo = DbRepository::new(runner, options);
    let count = repo
        .get_db_table_row_count(
            SessionId::from("s"),
            Some(&DatabaseObject::table("public", "t")),
            "",
        )
        .await;
    assert_eq!(count.data.count, 9);
}
