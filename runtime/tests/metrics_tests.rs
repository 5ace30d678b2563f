//! Store metrics as seen through the Prometheus recorder
//!
//! Lives in its own test binary: it installs the process-wide recorder.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use std::time::Duration;
use stockroom_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
use stockroom_runtime::metrics::PrometheusMetrics;
use stockroom_runtime::Store;

#[derive(Debug, Clone)]
enum TimerAction {
    Start(Duration),
    Fired,
}

#[derive(Clone)]
struct TimerReducer;

impl Reducer for TimerReducer {
    type State = u32;
    type Action = TimerAction;
    type Environment = ();

    fn reduce(
        &self,
        fired: &mut u32,
        action: TimerAction,
        _env: &(),
    ) -> SmallVec<[Effect<TimerAction>; 4]> {
        match action {
            TimerAction::Start(after) => smallvec![Effect::delay(after, TimerAction::Fired)],
            TimerAction::Fired => {
                *fired += 1;
                SmallVec::new()
            },
        }
    }
}

fn sample(exposition: &str, name: &str) -> Option<f64> {
    exposition
        .lines()
        .find_map(|line| line.strip_prefix(name)?.strip_prefix(' ')?.trim().parse().ok())
}

#[tokio::test]
async fn store_reports_running_effects_and_reductions() {
    let metrics = PrometheusMetrics::install().unwrap();
    let store = Store::new(0, TimerReducer, ());

    let mut handle = store
        .send(TimerAction::Start(Duration::from_millis(50)))
        .await
        .unwrap();
    assert_eq!(sample(&metrics.render(), "store_effects_pending"), Some(1.0));

    handle.wait().await;
    assert_eq!(store.state(|fired| *fired).await, 1);

    let exposition = metrics.render();
    assert_eq!(sample(&exposition, "store_effects_pending"), Some(0.0));
    assert_eq!(sample(&exposition, "store_commands_total"), Some(2.0));
}
