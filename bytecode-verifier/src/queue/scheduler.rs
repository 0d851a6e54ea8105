use super::{QueueError, ResultHandler, WorkItem, Worker};
use crate::metrics::{self, GuardedGauge};
use std::collections::VecDeque;
use tokio::task::JoinSet;

type Completed<T, W> = (W, WorkItem<T>, <W as Worker<T>>::Output);

/// Processes `items` with `workers`, passing every output to `handler` in the
/// order of `items`.
///
/// At most `workers.len() + work_ahead_limit` items are in flight or waiting
/// for an earlier item at any moment. Resolves once every dispatched item has
/// settled; if the handler failed, the first error is returned.
pub async fn process<T, W, H>(
    items: Vec<T>,
    workers: Vec<W>,
    handler: &mut H,
    work_ahead_limit: usize,
) -> Result<(), QueueError<H::Error>>
where
    T: Send + Sync + 'static,
    W: Worker<T> + 'static,
    W::Output: 'static,
    H: ResultHandler<T, W::Output>,
{
    if items.is_empty() {
        return Ok(());
    }
    if workers.is_empty() {
        return Err(QueueError::NoWorkers);
    }

    let total_count = items.len();
    let window = workers.len() + work_ahead_limit;

    let mut pending = items.into_iter().enumerate().peekable();
    let mut idle: VecDeque<W> = workers.into();
    let mut in_flight: JoinSet<Completed<T, W>> = JoinSet::new();
    // Slot `i` holds the output of item `head + i` once it completes.
    let mut completed: VecDeque<Option<(WorkItem<T>, W::Output)>> = VecDeque::new();
    let mut head = 0;
    let mut failure: Option<QueueError<H::Error>> = None;

    loop {
        while failure.is_none() {
            match pending.peek() {
                Some((index, _)) if *index < head + window => {}
                _ => break,
            }
            let Some(mut worker) = idle.pop_front() else {
                break;
            };
            let Some((index, payload)) = pending.next() else {
                break;
            };

            let mut item = WorkItem::start(index, total_count, payload);
            in_flight.spawn(async move {
                let _in_flight = metrics::QUEUE_ITEMS_IN_FLIGHT.guarded_inc();
                let output = worker.process(&item).await;
                item.finish();
                (worker, item, output)
            });
            completed.push_back(None);
        }

        let Some(joined) = in_flight.join_next().await else {
            break;
        };
        let (worker, item, output) = match joined {
            Ok(completion) => completion,
            Err(err) => {
                tracing::error!(err = %err, "queue worker task failed");
                if failure.is_none() {
                    failure = Some(QueueError::WorkerPanicked(err));
                    discard_buffered(&mut completed);
                }
                continue;
            }
        };
        idle.push_back(worker);

        if failure.is_some() {
            tracing::debug!(index = item.index, "discarding output while draining");
            continue;
        }

        let slot = item.index - head;
        completed[slot] = Some((item, output));
        metrics::QUEUE_ITEMS_BUFFERED.inc();

        while completed.front().is_some_and(Option::is_some) {
            let Some(Some((item, output))) = completed.pop_front() else {
                break;
            };
            metrics::QUEUE_ITEMS_BUFFERED.dec();
            head += 1;

            if let Err(err) = handler.handle(item, output).await {
                failure = Some(QueueError::Handler(err));
                discard_buffered(&mut completed);
                break;
            }
        }
    }

    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn discard_buffered<C>(completed: &mut VecDeque<Option<C>>) {
    let discarded = completed.drain(..).flatten().count();
    metrics::QUEUE_ITEMS_BUFFERED.sub(discarded as i64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::WorkStatus;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use rand::Rng;
    use std::{sync::Arc, time::Duration};

    #[derive(Default)]
    struct Journal {
        started: Vec<usize>,
        ended: Vec<usize>,
    }

    struct SleepingWorker {
        journal: Arc<Mutex<Journal>>,
        processed: usize,
    }

    impl SleepingWorker {
        fn pool(count: usize, journal: &Arc<Mutex<Journal>>) -> Vec<Self> {
            (0..count)
                .map(|_| Self {
                    journal: journal.clone(),
                    processed: 0,
                })
                .collect()
        }
    }

    #[async_trait]
    impl Worker<Duration> for SleepingWorker {
        type Output = usize;

        async fn process(&mut self, item: &WorkItem<Duration>) -> usize {
            assert!(!item.is_done());
            self.journal.lock().started.push(item.index);
            tokio::time::sleep(item.payload).await;
            self.journal.lock().ended.push(item.index);
            self.processed += 1;
            self.processed
        }
    }

    #[derive(Default)]
    struct Collector {
        handled: Vec<usize>,
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl ResultHandler<Duration, usize> for Collector {
        type Error = String;

        async fn handle(&mut self, item: WorkItem<Duration>, _output: usize) -> Result<(), String> {
            assert!(matches!(item.status, WorkStatus::Done { .. }));
            self.handled.push(item.index);
            match self.fail_on {
                Some(index) if index == item.index => Err(format!("failed on {index}")),
                _ => Ok(()),
            }
        }
    }

    fn random_latencies(count: usize) -> Vec<Duration> {
        let mut rng = rand::thread_rng();
        (0..count)
            .map(|_| Duration::from_millis(rng.gen_range(1..50)))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn results_are_delivered_in_input_order() {
        let journal = Arc::new(Mutex::new(Journal::default()));
        let mut handler = Collector::default();

        process(random_latencies(40), SleepingWorker::pool(4, &journal), &mut handler, 8)
            .await
            .expect("processing succeeds");

        let expected: Vec<_> = (0..40).collect();
        assert_eq!(expected, handler.handled);
        assert_eq!(expected, journal.lock().started);
        assert_eq!(40, journal.lock().ended.len());
    }

    #[tokio::test(start_paused = true)]
    async fn completion_order_may_differ_from_delivery_order() {
        let journal = Arc::new(Mutex::new(Journal::default()));
        let mut handler = Collector::default();
        let latencies = vec![
            Duration::from_millis(30),
            Duration::from_millis(20),
            Duration::from_millis(10),
        ];

        process(latencies, SleepingWorker::pool(3, &journal), &mut handler, 0)
            .await
            .expect("processing succeeds");

        assert_eq!(vec![2, 1, 0], journal.lock().ended);
        assert_eq!(vec![0, 1, 2], handler.handled);
    }

    #[tokio::test(start_paused = true)]
    async fn handler_error_stops_admission_and_drains() {
        let journal = Arc::new(Mutex::new(Journal::default()));
        let mut handler = Collector {
            fail_on: Some(5),
            ..Default::default()
        };

        let result = process(
            random_latencies(30),
            SleepingWorker::pool(3, &journal),
            &mut handler,
            2,
        )
        .await;

        assert!(matches!(result, Err(QueueError::Handler(ref message)) if message == "failed on 5"));
        assert_eq!((0..=5).collect::<Vec<_>>(), handler.handled);

        let journal = journal.lock();
        assert!(journal.started.len() < 30);
        assert!(journal.started.len() <= 5 + 1 + 3 + 2);
        assert_eq!(journal.started.len(), journal.ended.len());
    }

    struct ProbingWorker {
        started: Arc<Mutex<Vec<usize>>>,
        observed_while_head_pending: Arc<Mutex<Option<usize>>>,
    }

    #[async_trait]
    impl Worker<Duration> for ProbingWorker {
        type Output = ();

        async fn process(&mut self, item: &WorkItem<Duration>) {
            self.started.lock().push(item.index);
            tokio::time::sleep(item.payload).await;
            if item.index == 0 {
                *self.observed_while_head_pending.lock() = Some(self.started.lock().len());
            }
        }
    }

    struct Discard;

    #[async_trait]
    impl ResultHandler<Duration, ()> for Discard {
        type Error = ();

        async fn handle(&mut self, _item: WorkItem<Duration>, _output: ()) -> Result<(), ()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_head_bounds_work_ahead() {
        let started = Arc::new(Mutex::new(Vec::new()));
        let observed = Arc::new(Mutex::new(None));
        let workers: Vec<_> = (0..3)
            .map(|_| ProbingWorker {
                started: started.clone(),
                observed_while_head_pending: observed.clone(),
            })
            .collect();

        let mut latencies = vec![Duration::from_millis(1); 20];
        latencies[0] = Duration::from_secs(10);

        process(latencies, workers, &mut Discard, 2)
            .await
            .expect("processing succeeds");

        // 3 workers + 2 items of work-ahead
        assert_eq!(Some(5), *observed.lock());
        assert_eq!(20, started.lock().len());
    }

    #[tokio::test]
    async fn empty_worker_list_is_rejected() {
        let result = process(
            vec![Duration::ZERO],
            Vec::<SleepingWorker>::new(),
            &mut Collector::default(),
            1,
        )
        .await;
        assert!(matches!(result, Err(QueueError::NoWorkers)));
    }

    #[tokio::test]
    async fn empty_input_resolves_immediately() {
        let mut handler = Collector::default();
        process(Vec::new(), Vec::<SleepingWorker>::new(), &mut handler, 1)
            .await
            .expect("nothing to process");
        assert!(handler.handled.is_empty());
    }

    struct PanickingWorker;

    #[async_trait]
    impl Worker<Duration> for PanickingWorker {
        type Output = usize;

        async fn process(&mut self, item: &WorkItem<Duration>) -> usize {
            if item.index == 1 {
                panic!("worker failure");
            }
            item.index
        }
    }

    #[tokio::test]
    async fn worker_panic_is_reported() {
        let mut handler = Collector::default();
        let result = process(
            vec![Duration::ZERO; 4],
            vec![PanickingWorker, PanickingWorker],
            &mut handler,
            0,
        )
        .await;

        assert!(matches!(result, Err(QueueError::WorkerPanicked(_))));
        assert!(!handler.handled.contains(&1));
    }
}
