//! Three overlapping model calls in one session
//!
//! Each call takes about two seconds and they run side by side, so the
//! cumulative share of LLM time is close to 300% while timeline coverage
//! stays at 100%.
//!
//! ```bash
//! cargo run --example parallel_llm_calls
//! ```

use pipetime::{InstrumentationSession, OperationCategory};
use std::thread;
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    let session = InstrumentationSession::new();
    session.start_session();

    println!("Simulating 3 parallel LLM calls (2 seconds each)...");

    thread::scope(|scope| -> anyhow::Result<()> {
        let mut handles = Vec::new();
        for i in 1..=3 {
            let session = &session;
            let guard = session.track(OperationCategory::LlmCalls, format!("query_{}", i))?;
            handles.push(scope.spawn(move || {
                thread::sleep(Duration::from_secs(2));
                drop(guard);
            }));
            thread::sleep(Duration::from_millis(100));
        }
        for handle in handles {
            handle
                .join()
                .map_err(|_| anyhow::anyhow!("LLM worker panicked"))?;
        }
        Ok(())
    })?;

    session.print_summary();

    let summary = session.summary();
    let llm = summary.category(OperationCategory::LlmCalls);
    println!("Session duration:          {:.2}s", summary.session_duration.as_secs_f64());
    println!("Sum of LLM operation time: {:.2}s", llm.total_time.as_secs_f64());
    println!("Cumulative percentage:     {:.1}%", llm.cumulative_percentage);
    println!("Timeline coverage:         {:.1}%", llm.timeline_coverage_percentage);

    Ok(())
}
