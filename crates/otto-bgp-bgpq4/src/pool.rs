// crates/otto-bgp-bgpq4/src/pool.rs
// ============================================================================
// Module: bgpq4 worker pool
// Description: Worker pool + bounded semaphore over child processes (section
// 9 redesign note), replacing the per-process cache workaround the original
// needed for lack of real threads.
// Dependencies: otto-bgp-core, std::thread, std::sync::atomic
// ============================================================================

use std::sync::Mutex;
use std::sync::OnceLock;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::command::TunnelEndpoint;
use crate::error::Bgpq4Error;
use crate::runner::Bgpq4Request;
use crate::runner::run_one;
use otto_bgp_core::Policy;

static CPU_COUNT: OnceLock<usize> = OnceLock::new();

fn cpu_count() -> usize {
    *CPU_COUNT.get_or_init(num_cpus::get)
}

/// Generate policies for every request in `requests`, work-stealing across
/// `min(cpu_count, 8, requests.len())` worker threads (bounded by
/// `max_workers` when given). Results preserve input order.
#[must_use]
pub fn generate_parallel(
    requests: &[Bgpq4Request],
    tunnel: Option<TunnelEndpoint<'_>>,
    timeout: Duration,
    max_workers: Option<usize>,
) -> Vec<Result<Policy, Bgpq4Error>> {
    if requests.is_empty() {
        return Vec::new();
    }

    let worker_cap = max_workers
        .unwrap_or_else(cpu_count)
        .max(1)
        .min(8)
        .min(requests.len());

    let results: Mutex<Vec<Option<Result<Policy, Bgpq4Error>>>> =
        Mutex::new((0..requests.len()).map(|_| None).collect());
    let next_index = AtomicUsize::new(0);

    std::thread::scope(|scope| {
        for _ in 0..worker_cap {
            scope.spawn(|| {
                loop {
                    let index = next_index.fetch_add(1, Ordering::SeqCst);
                    if index >= requests.len() {
                        break;
                    }
                    let outcome = run_one(&requests[index], tunnel, timeout);
                    let mut guard = results.lock().unwrap_or_else(|p| p.into_inner());
                    guard[index] = Some(outcome);
                }
            });
        }
    });

    results
        .into_inner()
        .unwrap_or_else(|p| p.into_inner())
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| Err(Bgpq4Error::Spawn("worker never produced a result".to_owned())))
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use otto_bgp_core::Asn;

    #[test]
    fn empty_request_list_yields_empty_results() {
        let results = generate_parallel(&[], None, Duration::from_secs(1), Some(2));
        assert!(results.is_empty());
    }

    #[test]
    fn preserves_input_order_even_when_all_requests_fail_fast() {
        let requests: Vec<Bgpq4Request> = (0..6)
            .map(|i| Bgpq4Request {
                asn: Asn::new(i),
                policy_name: "bad;name".to_owned(),
            })
            .collect();
        let results = generate_parallel(&requests, None, Duration::from_secs(1), Some(3));
        assert_eq!(results.len(), 6);
        assert!(results.iter().all(|r| matches!(r, Err(Bgpq4Error::UnsafeArgument(_)))));
    }
}
