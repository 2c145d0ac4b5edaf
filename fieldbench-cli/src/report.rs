//! Terminal output for benchmark progress and results.

use std::time::Duration;

use bytesize::ByteSize;
use indicatif::{ProgressBar, ProgressStyle};
use loadtest::phase::PhaseKind;
use loadtest::{BenchmarkResult, Event};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use yansi::Paint;

/// Renders benchmark events as one progress bar per phase until the sender is dropped.
pub fn spawn_progress(mut events: UnboundedReceiver<Event>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut bar: Option<ProgressBar> = None;

        while let Some(event) = events.recv().await {
            match event {
                Event::Connected => tracing::debug!("preflight check passed"),
                Event::PhaseStarted {
                    phase,
                    requests,
                    concurrency,
                } => {
                    let style = ProgressStyle::with_template(
                        "{msg} {wide_bar} {pos}/{len} ({per_sec}) {elapsed}",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar());
                    let new_bar = ProgressBar::new(requests)
                        .with_style(style)
                        .with_message(format!("{phase} (concurrency {concurrency}):"));
                    new_bar.enable_steady_tick(Duration::from_millis(100));
                    bar = Some(new_bar);
                }
                Event::RequestCompleted { .. } => {
                    if let Some(bar) = &bar {
                        bar.inc(1);
                    }
                }
                Event::PhaseFinished {
                    phase,
                    elapsed,
                    success_count,
                    error_count,
                } => {
                    if let Some(bar) = bar.take() {
                        bar.finish_and_clear();
                    }
                    print_phase(phase, elapsed, success_count, error_count);
                }
            }
        }
    })
}

fn print_phase(phase: PhaseKind, elapsed: Duration, success_count: u64, error_count: u64) {
    print!(
        "{} {} requests in {:.2?}",
        format!("{phase}:").bold().green(),
        (success_count + error_count).bold(),
        elapsed
    );
    if error_count > 0 {
        print!(", {}", format!("{error_count} FAILURES").bold().red());
    }
    println!();
}

/// Prints the statistics of a finished benchmark.
pub fn print_result(title: &str, result: &BenchmarkResult) {
    let summary = &result.summary;

    println!();
    println!("{} {}", "##".bold(), title.bold().blue());
    print!(
        "{} ({} requests after {} warmup",
        "SEARCH:".bold().green(),
        result.benchmark_requests.bold(),
        result.warmup_requests
    );
    if summary.error_count > 0 {
        print!(
            ", {}",
            format!("{} FAILURES", summary.error_count).bold().red()
        );
    }
    println!(")");

    let elapsed = summary.elapsed_seconds.max(f64::EPSILON);
    let throughput = (summary.bytes_received as f64 / elapsed) as u64;
    println!(
        "  {:.2} requests/s, {:.2}/s",
        summary.throughput_req_sec.bold(),
        ByteSize::b(throughput).bold()
    );
    println!(
        "  avg: {:.2}ms; p50: {:.2}ms; p95: {:.2}ms; p99: {:.2}ms; max: {:.2}ms",
        summary.avg_latency_ms.bold(),
        summary.p50_latency_ms,
        summary.p95_latency_ms,
        summary.p99_latency_ms,
        summary.max_latency_ms
    );

    if summary.error_count > 0 {
        let failures = &summary.failures;
        println!(
            "  error rate: {}; status: {}; timeout: {}; transport: {}",
            format!("{:.2}%", summary.error_rate * 100.0).red(),
            failures.status,
            failures.timeout,
            failures.transport
        );
    }
}
