//! End-to-end scenarios exercising the primitives together.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parasync::{
    first_completed_of, timer, Context, CyclicBarrier, Executor, ExecutorConfig, ExecutorStatus,
    Map, Promise, ShardedMap, Task, WaitGroupContext,
};

#[test]
fn future_chain_transforms_a_delayed_result() {
    let promise = Promise::new();
    let future = promise.future();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        promise.success(10);
    });

    let result = future
        .map(|x| Ok(x * 2))
        .flat_map(|x| {
            let inner = Promise::new();
            inner.success(x + 5);
            Ok(inner.future())
        })
        .join()
        .expect("chain completes");
    assert_eq!(result, 25);
}

#[test]
fn deadline_future_wins_the_race_against_a_slow_promise() {
    let promise = Promise::new();
    let future = promise.future();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        promise.success(true);
    });

    let err = first_completed_of(vec![future, timer(Duration::from_millis(10))])
        .join()
        .expect_err("the deadline fires first");
    assert!(err.is_timeout());
}

#[test]
fn executor_saturates_then_drains_on_shutdown() {
    let ctx = Context::new();
    let executor: Executor<i32> = Executor::new(&ctx, ExecutorConfig::new(2, 2));

    let long_job = |_: &Context| {
        thread::sleep(Duration::from_millis(150));
        Ok(1)
    };

    // Two jobs keep the workers busy; give each time to be claimed.
    let running: Vec<_> = (0..2)
        .map(|_| {
            let future = executor.submit(long_job).expect("claimed by a worker");
            thread::sleep(Duration::from_millis(10));
            future
        })
        .collect();
    // Two more fill the queue.
    let queued: Vec<_> = (0..2)
        .map(|_| executor.submit(long_job).expect("buffered"))
        .collect();

    let err = executor.submit(long_job).expect_err("queue is saturated");
    assert!(err.is_queue_full());
    assert_eq!(executor.status(), ExecutorStatus::Running);

    executor.shutdown();
    assert!(executor.await_termination(Duration::from_secs(2)));
    assert_eq!(executor.status(), ExecutorStatus::ShutDown);

    for future in &running {
        assert_eq!(future.join().expect("ran to completion"), 1);
    }
    for future in &queued {
        assert!(future.join().expect_err("drained").is_shut_down());
    }
}

#[test]
fn barrier_coordinates_executor_jobs() {
    let ctx = Context::new();
    let parties = 4;
    let executor: Executor<usize> = Executor::new(&ctx, ExecutorConfig::new(parties, parties));
    let barrier = Arc::new(CyclicBarrier::new(parties));

    let futures: Vec<_> = (0..parties)
        .map(|index| {
            let barrier = Arc::clone(&barrier);
            executor
                .submit(move |_| {
                    barrier.wait()?;
                    Ok(index)
                })
                .expect("submitted")
        })
        .collect();

    let mut released: Vec<_> = futures
        .iter()
        .map(|f| f.join().expect("all jobs pass the barrier"))
        .collect();
    released.sort_unstable();
    assert_eq!(released, (0..parties).collect::<Vec<_>>());
}

#[test]
fn wait_group_returns_at_cancellation_while_work_finishes_safely() {
    let ctx = Context::new();
    let group = Arc::new(WaitGroupContext::new(&ctx));
    group.add(2);

    let finished = Arc::new(AtomicUsize::new(0));
    for delay in [10_u64, 300] {
        let group = Arc::clone(&group);
        let finished = Arc::clone(&finished);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(delay));
            group.done();
            finished.fetch_add(1, Ordering::SeqCst);
        });
    }

    {
        let ctx = ctx.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            ctx.cancel();
        });
    }

    let start = Instant::now();
    group.wait();
    let waited = start.elapsed();
    assert!(
        waited >= Duration::from_millis(80) && waited < Duration::from_millis(280),
        "wait returned at {waited:?}, expected around the cancellation point"
    );

    // The slow activity still completes its bookkeeping without panicking.
    thread::sleep(Duration::from_millis(260));
    assert_eq!(finished.load(Ordering::SeqCst), 2);
}

#[test]
fn tasks_feed_a_sharded_map() {
    let map: Arc<ShardedMap<String, usize>> = Arc::new(ShardedMap::new(4));

    let futures: Vec<_> = (0..16_usize)
        .map(|index| {
            let map = Arc::clone(&map);
            Task::new(move || {
                map.put(format!("entry-{index}"), Arc::new(index));
                Ok(index)
            })
            .call()
        })
        .collect();

    for future in &futures {
        future.join().expect("task ran");
    }

    assert_eq!(map.size(), 16);
    let mut values: Vec<usize> = map.values().iter().map(|v| **v).collect();
    values.sort_unstable();
    assert_eq!(values, (0..16).collect::<Vec<_>>());
}
