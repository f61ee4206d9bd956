//! Aggregate timeouts over a batch of requests.

use std::future::Future;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::{Instant, timeout_at};

use crate::error::Error;

/// Run labelled futures concurrently under one shared deadline.
///
/// Results come back in input order. If the deadline passes first, the
/// remaining futures are dropped and [`Error::Timeout`] lists their labels.
/// The first future to fail aborts the batch with its error.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use chain_connect::*;
///
/// # async fn example(connection: NetworkConnection) -> Result<(), Error> {
/// let results = with_deadline(
///     Duration::from_secs(5),
///     vec![
///         ("chain id".to_string(), connection.request(RequestArguments::method("eth_chainId"))),
///         ("block".to_string(), connection.request(RequestArguments::method("eth_blockNumber"))),
///     ],
/// )
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn with_deadline<T, F>(limit: Duration, tasks: Vec<(String, F)>) -> Result<Vec<T>, Error>
where
    F: Future<Output = Result<T, Error>>,
{
    let deadline = Instant::now() + limit;
    let (labels, futures): (Vec<String>, Vec<F>) = tasks.into_iter().unzip();

    let mut results: Vec<Option<T>> = labels.iter().map(|_| None).collect();
    let mut running: FuturesUnordered<_> = futures
        .into_iter()
        .enumerate()
        .map(|(index, future)| async move { (index, future.await) })
        .collect();

    loop {
        match timeout_at(deadline, running.next()).await {
            Ok(Some((index, result))) => results[index] = Some(result?),
            Ok(None) => break,
            Err(_) => {
                let pending = labels
                    .into_iter()
                    .zip(&results)
                    .filter(|(_, result)| result.is_none())
                    .map(|(label, _)| label)
                    .collect();
                return Err(Error::Timeout { pending });
            }
        }
    }

    Ok(results.into_iter().flatten().collect())
}
