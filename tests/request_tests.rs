//! Integration tests for request-scoped logging under concurrency.

use std::collections::HashSet;
use std::time::Duration;

use rstest::rstest;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fanpool::config::{Distribution, PoolConfig};
use fanpool::context::{ExecutionContext, Request};
use fanpool::error::GroupError;
use fanpool::fetch::{ListFetcher, fetch_lists, fetch_lists_linear, list_fetcher};
use fanpool::group::{RequestAction, request_action, run_requests};
use fanpool::linear::run_request_linear;
use fanpool::request::{run_data_with_context, run_with_context};

const UNITS: usize = 200;
const LINES_PER_UNIT: usize = 5;

/// Mirrors request entries to the test output when `RUST_LOG` asks for them.
fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

fn lines_of(logs: &[String], unit: usize) -> Vec<usize> {
    let tag = format!("unit {unit}:");
    logs.iter()
        .enumerate()
        .filter(|(_, line)| line.contains(&tag))
        .map(|(position, _)| position)
        .collect()
}

// =============================================================================
// Log Isolation
// =============================================================================

#[rstest]
#[case(Distribution::SharedQueue)]
#[case(Distribution::Striped)]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_units_never_interleave(#[case] distribution: Distribution) {
    init_tracing();
    let mut request = Request::new("isolation");
    let result = run_with_context(
        &mut request,
        0..UNITS,
        |rq: Request, unit| async move {
            for line in 0..LINES_PER_UNIT {
                rq.add_log(format!("unit {unit}: line {line}"));
                tokio::task::yield_now().await;
            }
            Ok::<(), String>(())
        },
        PoolConfig::new(16).with_distribution(distribution),
    )
    .await;

    assert_eq!(result.success, UNITS);

    let logs = request.logs();
    assert_eq!(logs.len(), 1 + UNITS * LINES_PER_UNIT);
    for unit in 0..UNITS {
        let positions = lines_of(&logs, unit);
        assert_eq!(positions.len(), LINES_PER_UNIT, "unit {unit}");
        assert!(
            positions.windows(2).all(|pair| pair[1] == pair[0] + 1),
            "unit {unit} lines are not contiguous"
        );
        for (line, position) in positions.iter().enumerate() {
            assert!(logs[*position].ends_with(&format!("unit {unit}: line {line}")));
        }
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failed_units_still_contribute_their_logs() {
    init_tracing();
    let mut request = Request::new("failures");
    let result = run_data_with_context(
        &mut request,
        0..50u32,
        |rq: Request, unit| async move {
            rq.add_log(format!("unit {unit}: started"));
            tokio::time::sleep(Duration::from_micros(u64::from(unit % 4) * 100)).await;
            if unit % 10 == 0 {
                rq.add_error_log(&std::io::Error::other(format!("unit {unit} failed")));
                Err(unit)
            } else {
                rq.add_log(format!("unit {unit}: finished"));
                Ok(unit * 2)
            }
        },
        8,
    )
    .await;

    assert_eq!(result.success, 45);
    assert_eq!(
        result.errors.keys().copied().collect::<HashSet<_>>(),
        HashSet::from([0, 10, 20, 30, 40])
    );
    assert_eq!(request.len(), 1 + 50 * 2);
    assert_eq!(
        request
            .logs()
            .iter()
            .filter(|line| line.contains("Error: unit"))
            .count(),
        5
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn request_group_merges_every_action() {
    let mut request = Request::new("group");
    let actions: Vec<RequestAction<Request, String>> = (0..UNITS)
        .map(|unit| {
            request_action(move |rq: Request| async move {
                for line in 0..LINES_PER_UNIT {
                    rq.add_log(format!("unit {unit}: line {line}"));
                    tokio::task::yield_now().await;
                }
                Ok(())
            })
        })
        .collect();

    assert_eq!(run_requests(&mut request, actions).await, Ok(()));

    let logs = request.logs();
    assert_eq!(logs.len(), 1 + UNITS * LINES_PER_UNIT);
    for unit in 0..UNITS {
        let positions = lines_of(&logs, unit);
        assert!(positions.windows(2).all(|pair| pair[1] == pair[0] + 1));
    }
}

#[rstest]
#[tokio::test]
async fn linear_units_log_directly_into_the_request() {
    let request = Request::new("linear");
    let result = run_request_linear(&request, 0..3, |rq: Request, unit: i32| async move {
        rq.add_log(format!("unit {unit}: ran"));
        Ok::<(), ()>(())
    })
    .await;

    assert_eq!(result.success, 3);
    assert_eq!(request.len(), 4);
}

// =============================================================================
// List Aggregation
// =============================================================================

fn source(name: &'static str, delay: u64, rows: Vec<&'static str>) -> ListFetcher<Request, &'static str, String> {
    list_fetcher(move |rq: Request| async move {
        tokio::time::sleep(Duration::from_millis(delay)).await;
        rq.add_log(format!("{name}: {} rows", rows.len()));
        Ok(rows)
    })
}

#[rstest]
#[tokio::test]
async fn fetched_lists_follow_fetcher_order() {
    let mut request = Request::new("list");
    let lists = fetch_lists(
        &mut request,
        vec![
            source("sessions", 20, vec!["s1", "s2"]),
            source("tokens", 0, vec!["t1"]),
            source("keys", 10, vec!["k1", "k2", "k3"]),
        ],
    )
    .await;

    assert_eq!(lists, Ok(vec!["s1", "s2", "t1", "k1", "k2", "k3"]));
    assert_eq!(request.len(), 4);
}

#[rstest]
#[tokio::test]
async fn failing_fetcher_fails_the_whole_list() {
    let mut request = Request::new("list");
    let failing: ListFetcher<Request, &'static str, String> =
        list_fetcher(|_: Request| async { Err("tokens unavailable".to_string()) });
    let lists = fetch_lists(
        &mut request,
        vec![source("sessions", 5, vec!["s1"]), failing],
    )
    .await;

    assert_eq!(
        lists,
        Err(GroupError::Failed("tokens unavailable".to_string()))
    );
    assert_eq!(request.len(), 2);
}

#[rstest]
#[tokio::test]
async fn linear_fetch_concatenates_in_order() {
    let request = Request::new("list");
    let lists = fetch_lists_linear(
        &request,
        vec![
            source("sessions", 0, vec!["s1"]),
            source("tokens", 0, vec!["t1", "t2"]),
        ],
    )
    .await;

    assert_eq!(lists, Ok(vec!["s1", "t1", "t2"]));
    assert_eq!(request.len(), 3);
    assert!(request.fork().is_empty());
}
