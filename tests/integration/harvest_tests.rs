//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for the remote indexes and run the
//! full harvest cycle end-to-end against an on-disk SQLite sink.

use channel_harvest::config::{Config, HarvestMethod};
use channel_harvest::harvest::{run_harvest, HarvestOptions};
use channel_harvest::plan::{Granularity, ResumePoint};
use channel_harvest::storage::{RunStatus, Sink, SqliteSink};
use channel_harvest::{HarvestError, PlanError};
use chrono::NaiveDate;
use std::path::Path;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Creates a wayback test configuration pointed at the mock server
fn create_test_config(server: &MockServer, db_path: &Path, from: &str, to: &str) -> Config {
    let mut config = Config::default();
    config.harvest.method = HarvestMethod::Wayback;
    config.harvest.start_date = Some(from.parse::<NaiveDate>().unwrap());
    config.harvest.end_date = Some(to.parse::<NaiveDate>().unwrap());
    config.harvest.granularity = Granularity::Whole;
    config.harvest.batch_size = 3;
    config.harvest.patterns = vec!["youtube.com/@".to_string()];
    config.index.cdx_url = format!("{}/cdx", server.uri());
    config.index.max_attempts = 2;
    config.index.initial_backoff_ms = 0;
    config.index.max_backoff_ms = 0;
    config.index.request_timeout_secs = 5;
    config.sink.database_path = db_path.to_string_lossy().into_owned();
    config
}

fn query(request: &Request, key: &str) -> Option<String> {
    request
        .url
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// CDX responder that times out on multi-day windows and serves one
/// channel per day on single-day windows
fn one_channel_per_day(request: &Request) -> ResponseTemplate {
    let from = query(request, "from").unwrap_or_default();
    let to = query(request, "to").unwrap_or_default();
    if from != to {
        return ResponseTemplate::new(504);
    }
    ResponseTemplate::new(200).set_body_string(format!(
        r#"[["original"],["https://www.youtube.com/@day{}"],["http://m.youtube.com/@day{}/"]]"#,
        from, from
    ))
}

fn open(db_path: &Path) -> SqliteSink {
    SqliteSink::new(db_path).unwrap()
}

#[tokio::test]
async fn test_failed_week_recovered_day_by_day() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cdx"))
        .respond_with(one_channel_per_day)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("channels.db");
    let config = create_test_config(&server, &db_path, "2024-01-01", "2024-01-07");

    let outcome = run_harvest(&config, &HarvestOptions::default()).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Completed);
    assert!(outcome.summary.skipped.is_empty());
    assert_eq!(outcome.summary.new_entities, 7);
    assert_eq!(outcome.summary.duplicates, 7);

    let sink = open(&db_path);
    let identities = sink.load_identities().unwrap();
    assert_eq!(identities.len(), 7);
    for day in 1..=7 {
        assert!(identities.contains(&format!("https://www.youtube.com/@day2024010{}", day)));
    }

    let run = sink.get_run(outcome.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.new_entities, 7);
    assert_eq!(run.method, "wayback");
}

#[tokio::test]
async fn test_second_run_records_nothing_new() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cdx"))
        .respond_with(one_channel_per_day)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("channels.db");
    let mut config = create_test_config(&server, &db_path, "2024-01-01", "2024-01-03");
    config.harvest.granularity = Granularity::Days(1);

    let first = run_harvest(&config, &HarvestOptions::default()).await.unwrap();
    assert_eq!(first.summary.new_entities, 3);

    let second = run_harvest(&config, &HarvestOptions::default()).await.unwrap();
    assert_eq!(second.summary.new_entities, 0);
    assert_eq!(second.summary.duplicates, 6);
    assert_ne!(first.run_id, second.run_id);

    let sink = open(&db_path);
    assert_eq!(sink.count_entities().unwrap(), 3);
    assert_eq!(sink.recent_runs(10).unwrap().len(), 2);
}

#[tokio::test]
async fn test_continuation_tokens_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cdx"))
        .and(query_param("resumeKey", "next-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[["original"],["https://www.youtube.com/browse/x-UCsecond"]]"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cdx"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[["original"],["https://www.youtube.com/channel/UCfirst"],[],["next-1"]]"#,
        ))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("channels.db");
    let config = create_test_config(&server, &db_path, "2024-02-01", "2024-02-29");

    let outcome = run_harvest(&config, &HarvestOptions::default()).await.unwrap();
    assert_eq!(outcome.summary.new_entities, 2);

    let identities = open(&db_path).load_identities().unwrap();
    assert!(identities.contains("https://www.youtube.com/channel/UCfirst"));
    assert!(identities.contains("https://www.youtube.com/channel/UCsecond"));
}

#[tokio::test]
async fn test_cc_index_rate_limit_then_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collinfo.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[{"id": "CC-MAIN-2024-10"}, {"id": "CC-MAIN-2023-50"}]"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/CC-MAIN-2024-10-index"))
        .and(query_param("page", "0"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/CC-MAIN-2024-10-index"))
        .and(query_param("page", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(concat!(
            "{\"url\": \"https://www.youtube.com/@a\"}\n",
            "{\"url\": \"https://m.youtube.com/@a?feature=share\"}\n",
            "{\"url\": \"https://www.youtube.com/@b\"}\n",
            "{\"url\": \"https://www.youtube.com/watch?v=xyz\"}\n",
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/CC-MAIN-2024-10-index"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Page out of range"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("channels.db");
    let mut config = create_test_config(&server, &db_path, "2024-01-01", "2024-01-01");
    config.harvest.method = HarvestMethod::CcIndex;
    config.harvest.year = Some(2024);
    config.harvest.patterns = vec!["*.youtube.com/@*".to_string()];
    config.index.cc_index_url = server.uri();
    config.index.collinfo_url = format!("{}/collinfo.json", server.uri());

    let outcome = run_harvest(&config, &HarvestOptions::default()).await.unwrap();

    assert_eq!(outcome.summary.tasks, 1);
    assert_eq!(outcome.summary.raw_urls, 4);
    assert_eq!(outcome.summary.rejected_urls, 1);
    assert_eq!(outcome.summary.new_entities, 2);

    let sink = open(&db_path);
    let by_source = sink.count_entities_by_source().unwrap();
    assert_eq!(by_source.len(), 1);
    assert_eq!(by_source[0].1, 2);
    assert_eq!(sink.get_run(outcome.run_id).unwrap().method, "cc-index");
}

#[tokio::test]
async fn test_unknown_resume_point_fails_before_work() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(one_channel_per_day)
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("channels.db");
    let config = create_test_config(&server, &db_path, "2024-01-01", "2024-01-07");
    let options = HarvestOptions {
        resume_point: Some(ResumePoint {
            window: "2023-12-01".to_string(),
            pattern: None,
        }),
        resume_interrupted: false,
    };

    let result = run_harvest(&config, &options).await;
    assert!(matches!(
        result,
        Err(HarvestError::Plan(PlanError::UnknownResumePoint { .. }))
    ));
    assert!(open(&db_path).recent_runs(10).unwrap().is_empty());
}

#[tokio::test]
async fn test_resume_window_skips_earlier_tasks() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cdx"))
        .respond_with(one_channel_per_day)
        .expect(2)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("channels.db");
    let mut config = create_test_config(&server, &db_path, "2024-01-01", "2024-01-03");
    config.harvest.granularity = Granularity::Days(1);
    let options = HarvestOptions {
        resume_point: Some(ResumePoint {
            window: "2024-01-02".to_string(),
            pattern: Some("youtube.com/@".to_string()),
        }),
        resume_interrupted: false,
    };

    let outcome = run_harvest(&config, &options).await.unwrap();
    assert_eq!(outcome.summary.tasks, 2);
    assert_eq!(outcome.summary.new_entities, 2);
}

#[tokio::test]
async fn test_resume_interrupted_run_after_checkpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cdx"))
        .respond_with(one_channel_per_day)
        .expect(2)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("channels.db");

    let interrupted = {
        let mut sink = open(&db_path);
        let run_id = sink.begin_run("wayback", "older-config").unwrap();
        sink.record_checkpoint(run_id, "2024-01-01", "youtube.com/@").unwrap();
        run_id
    };

    let mut config = create_test_config(&server, &db_path, "2024-01-01", "2024-01-03");
    config.harvest.granularity = Granularity::Days(1);
    let options = HarvestOptions {
        resume_point: None,
        resume_interrupted: true,
    };

    let outcome = run_harvest(&config, &options).await.unwrap();
    assert_eq!(outcome.run_id, interrupted);
    assert_eq!(outcome.summary.tasks, 2);

    let sink = open(&db_path);
    let run = sink.get_run(interrupted).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.new_entities, 2);
    assert_eq!(sink.recent_runs(10).unwrap().len(), 1);

    let checkpoint = sink.last_checkpoint(interrupted).unwrap().unwrap();
    assert_eq!(checkpoint.window, "2024-01-03");
}

#[tokio::test]
async fn test_resume_without_interrupted_run_starts_fresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cdx"))
        .respond_with(one_channel_per_day)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("channels.db");
    let config = create_test_config(&server, &db_path, "2024-01-01", "2024-01-01");

    let first = run_harvest(&config, &HarvestOptions::default()).await.unwrap();
    let options = HarvestOptions {
        resume_point: None,
        resume_interrupted: true,
    };
    let second = run_harvest(&config, &options).await.unwrap();

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(second.summary.tasks, 1);
}

#[tokio::test]
async fn test_page_capped_snapshot_reported_as_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collinfo.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"[{"id": "CC-MAIN-2024-10"}]"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/CC-MAIN-2024-10-index"))
        .and(query_param("page", "0"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("{\"url\": \"https://www.youtube.com/@first\"}\n"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("channels.db");
    let mut config = create_test_config(&server, &db_path, "2024-01-01", "2024-01-01");
    config.harvest.method = HarvestMethod::CcIndex;
    config.harvest.year = Some(2024);
    config.harvest.max_pages = 1;
    config.harvest.patterns = vec!["*.youtube.com/@*".to_string()];
    config.index.cc_index_url = server.uri();
    config.index.collinfo_url = format!("{}/collinfo.json", server.uri());

    let outcome = run_harvest(&config, &HarvestOptions::default()).await.unwrap();

    assert_eq!(outcome.summary.completed_tasks, 0);
    assert_eq!(outcome.summary.skipped.len(), 1);
    assert!(outcome.summary.skipped[0].reason.contains("page limit"));
    // the page fetched before the limit is still recorded
    assert_eq!(outcome.summary.new_entities, 1);
}

#[tokio::test]
async fn test_page_capped_window_bisected() {
    let server = MockServer::start().await;
    // Multi-day windows always offer another page; single days do not
    Mock::given(method("GET"))
        .and(path("/cdx"))
        .respond_with(|request: &Request| {
            let from = query(request, "from").unwrap_or_default();
            let to = query(request, "to").unwrap_or_default();
            let body = if from == to {
                format!(r#"[["original"],["https://www.youtube.com/@day{}"]]"#, from)
            } else {
                r#"[["original"],["https://www.youtube.com/@busy"],[],["more"]]"#.to_string()
            };
            ResponseTemplate::new(200).set_body_string(body)
        })
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("channels.db");
    let mut config = create_test_config(&server, &db_path, "2024-01-01", "2024-01-04");
    config.harvest.max_pages = 1;

    let outcome = run_harvest(&config, &HarvestOptions::default()).await.unwrap();

    assert!(outcome.summary.skipped.is_empty());
    assert_eq!(outcome.summary.completed_tasks, 1);
    let identities = open(&db_path).load_identities().unwrap();
    for day in 1..=4 {
        assert!(identities.contains(&format!("https://www.youtube.com/@day2024010{}", day)));
    }
}
