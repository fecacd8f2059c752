//! Indexed fan-out for concurrent trials.

use std::future::Future;

use futures_util::future::join_all;

/// Run `f(0)..f(n-1)` concurrently on the current task and wait for all of them.
///
/// Every future is polled to completion; nothing is cancelled when one
/// finishes early. Slot `i` of the output always holds the value of `f(i)`,
/// whatever order the futures completed in.
pub async fn fan_out<F, Fut, T>(n: usize, f: F) -> Vec<T>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = T>,
{
    join_all((0..n).map(f)).await
}
