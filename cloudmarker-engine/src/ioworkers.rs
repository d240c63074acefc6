//! Concurrent I/O worker pool.
//!
//! A process-per-worker design would spawn `processes` OS processes,
//! each running `threads` OS threads, to sidestep an interpreter lock
//! while still getting CPU-bound post-processing parallelism. Rust's
//! async tasks have no such lock, so this collapses to a single tier of
//! `processes * threads` tokio tasks sharing one input queue and one
//! output queue — the two-parameter knob surface is kept for
//! configuration compatibility, not because it is still load bearing.

use futures::future::{AssertUnwindSafe, FutureExt};
use futures::stream::{self, Stream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{error, info};

/// Bound on the pool's input and output queues — the same backpressure
/// discipline as the audit graph's inter-worker queues
/// ([`crate::graph::DEFAULT_QUEUE_CAPACITY`]): large enough that a
/// burst of tasks or records rarely blocks, small enough that a stuck
/// consumer still applies backpressure instead of buffering without
/// bound.
const QUEUE_CAPACITY: usize = 1024;

/// Run `produce_tasks` once to generate tasks, fan them out across
/// `processes * threads` workers each running `consume_task`, and
/// yield every record produced. There is no ordering guarantee between
/// records from different tasks; records from the same task arrive in
/// the order `consume_task` produced them.
///
/// `processes <= 0` defaults to the host CPU count; `threads <= 0`
/// defaults to `5 * CPU count`. `tag` is included in every log line.
pub fn run<Task, Rec, Tasks, Consume, ConsumeFut, ConsumeStream>(
    produce_tasks: Tasks,
    consume_task: Consume,
    processes: i64,
    threads: i64,
    tag: &str,
) -> Pin<Box<dyn Stream<Item = Rec> + Send>>
where
    Task: Send + 'static,
    Rec: Send + 'static,
    Tasks: Stream<Item = Task> + Send + 'static,
    Consume: Fn(Task) -> ConsumeFut + Send + Sync + 'static,
    ConsumeFut: Future<Output = ConsumeStream> + Send + 'static,
    ConsumeStream: Stream<Item = Rec> + Send + 'static,
{
    let processes = if processes <= 0 {
        num_cpus::get() as i64
    } else {
        processes
    } as usize;
    let threads = if threads <= 0 {
        (num_cpus::get() * 5) as i64
    } else {
        threads
    } as usize;
    let worker_count = (processes * threads).max(1);
    let tag = tag.to_string();

    let (task_tx, task_rx) = async_channel::bounded::<Option<Task>>(QUEUE_CAPACITY);
    let (out_tx, out_rx) = async_channel::bounded::<Option<Rec>>(QUEUE_CAPACITY);
    let consume_task = Arc::new(consume_task);

    // Producer: feed tasks in, then signal end-of-input with one
    // sentinel per worker.
    {
        let producer_tag = tag.clone();
        tokio::spawn(async move {
            let mut tasks = Box::pin(produce_tasks);
            while let Some(task) = tasks.next().await {
                if task_tx.send(Some(task)).await.is_err() {
                    break;
                }
            }
            for _ in 0..worker_count {
                let _ = task_tx.send(None).await;
            }
            info!("{}producer done", prefix(&producer_tag));
        });
    }

    // Workers: pull tasks until the sentinel, run consume_task on each,
    // forward its records, then forward one sentinel of our own.
    for worker_id in 0..worker_count {
        let task_rx = task_rx.clone();
        let out_tx = out_tx.clone();
        let consume_task = consume_task.clone();
        let worker_tag = tag.clone();
        tokio::spawn(async move {
            info!("{}worker {} started", prefix(&worker_tag), worker_id);
            while let Ok(Some(task)) = task_rx.recv().await {
                let out_tx = out_tx.clone();
                let consume_task = consume_task.clone();
                let outcome = AssertUnwindSafe(async move {
                    let mut records = Box::pin(consume_task(task).await);
                    while let Some(record) = records.next().await {
                        if out_tx.send(Some(record)).await.is_err() {
                            break;
                        }
                    }
                })
                .catch_unwind()
                .await;
                if outcome.is_err() {
                    error!("{}task callback panicked", prefix(&worker_tag));
                }
            }
            let _ = out_tx.send(None).await;
            info!("{}worker {} stopped", prefix(&worker_tag), worker_id);
        });
    }

    let consumer_tag = tag;
    Box::pin(stream::unfold(
        (out_rx, 0usize),
        move |(out_rx, mut stopped)| {
            let tag = consumer_tag.clone();
            async move {
                loop {
                    match out_rx.recv().await {
                        Ok(Some(record)) => return Some((record, (out_rx, stopped))),
                        Ok(None) => {
                            stopped += 1;
                            if stopped == worker_count {
                                info!("{}done", prefix(&tag));
                                return None;
                            }
                        }
                        Err(_) => return None,
                    }
                }
            }
        },
    ))
}

fn prefix(tag: &str) -> String {
    if tag.is_empty() {
        String::new()
    } else {
        format!("{tag}: ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::collections::HashMap;

    #[tokio::test]
    async fn yields_every_task_times_k_records() {
        let n = 7;
        let k = 3;
        let tasks = stream::iter(0..n);
        let out = run(
            tasks,
            move |task: i32| async move { stream::iter((0..k).map(move |i| task * 100 + i)) },
            2,
            3,
            "test",
        );
        let mut records: Vec<i32> = out.collect().await;
        assert_eq!(records.len(), (n * k) as usize);

        // Every task produced exactly k records in order.
        let mut by_task: HashMap<i32, Vec<i32>> = HashMap::new();
        records.sort();
        for r in &records {
            by_task.entry(r / 100).or_default().push(*r);
        }
        assert_eq!(by_task.len(), n as usize);
        for recs in by_task.values() {
            assert_eq!(recs.len(), k as usize);
        }
    }

    #[tokio::test]
    async fn defaults_kick_in_for_non_positive_knobs() {
        let tasks = stream::iter(0..4);
        let out = run(
            tasks,
            |task: i32| async move { stream::iter(vec![task]) },
            0,
            0,
            "",
        );
        let records: Vec<i32> = out.collect().await;
        assert_eq!(records.len(), 4);
    }

    #[tokio::test]
    async fn a_failing_task_does_not_affect_others() {
        let tasks = stream::iter(0..5);
        let out = run(
            tasks,
            |task: i32| async move {
                if task == 2 {
                    stream::iter(Vec::new())
                } else {
                    stream::iter(vec![task])
                }
            },
            1,
            4,
            "test",
        );
        let mut records: Vec<i32> = out.collect().await;
        records.sort();
        assert_eq!(records, vec![0, 1, 3, 4]);
    }
}
