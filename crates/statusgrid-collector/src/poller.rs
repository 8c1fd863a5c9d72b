//! Poller — background task that re-evaluates every service on an interval.
//!
//! Each cycle fans out one task per service, joins them all, and publishes
//! the complete result set to the [`ResultCache`]. Results are written into
//! the slot matching their service's configuration position, so completion
//! order never affects the published order.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use statusgrid_config::ServiceSpec;

use crate::cache::ResultCache;
use crate::evaluator::Evaluator;
use crate::types::{EvalError, ServiceResult};

const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct Poller {
    services: Arc<[Arc<ServiceSpec>]>,
    evaluator: Evaluator,
    cache: ResultCache,
    interval: Duration,
    shutdown_grace: Duration,
}

impl Poller {
    /// Create a poller over `services`, in configuration order.
    pub fn new(
        services: Vec<ServiceSpec>,
        evaluator: Evaluator,
        cache: ResultCache,
        interval: Duration,
    ) -> Self {
        Self {
            services: services.into_iter().map(Arc::new).collect(),
            evaluator,
            cache,
            interval,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    /// How long an in-flight cycle may keep running once shutdown starts.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Evaluate every service concurrently and return results in
    /// configuration order. Does not touch the cache.
    pub async fn poll_cycle(&self) -> Vec<ServiceResult> {
        let mut tasks = JoinSet::new();
        for (index, service) in self.services.iter().enumerate() {
            let evaluator = self.evaluator.clone();
            let service = Arc::clone(service);
            tasks.spawn(async move { (index, evaluator.evaluate(service).await) });
        }

        let mut slots: Vec<Option<ServiceResult>> = self.services.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => warn!(error = %e, "evaluation task failed"),
            }
        }

        // A panicked task loses its index; its slot is still empty here.
        let now = SystemTime::now();
        slots
            .into_iter()
            .zip(self.services.iter())
            .map(|(slot, service)| {
                slot.unwrap_or_else(|| {
                    ServiceResult::failed(
                        Arc::clone(service),
                        EvalError::Task("evaluation did not complete".to_string()),
                        now,
                    )
                })
            })
            .collect()
    }

    /// Run one cycle and publish it, stamped with the cycle's start time.
    pub async fn poll_once(&self) {
        let started_at = SystemTime::now();
        let started = Instant::now();
        let results = self.poll_cycle().await;
        self.publish(results, started_at, started).await;
    }

    async fn publish(&self, results: Vec<ServiceResult>, started_at: SystemTime, started: Instant) {
        let total = results.len();
        let passing = results.iter().filter(|r| r.status).count();
        self.cache.set(results, started_at).await;
        debug!(
            total,
            passing,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "poll cycle complete"
        );
    }

    /// Poll until `shutdown` fires. The first cycle runs immediately.
    ///
    /// A cycle still running at shutdown gets `shutdown_grace` to finish.
    /// If it completes in time its results are published; otherwise they
    /// are discarded.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            services = self.services.len(),
            interval_secs = self.interval.as_secs(),
            "poller started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => {
                    info!("poller shutting down");
                    break;
                }
            }

            let started_at = SystemTime::now();
            let started = Instant::now();
            let cycle = self.poll_cycle();
            tokio::pin!(cycle);

            tokio::select! {
                results = &mut cycle => {
                    self.publish(results, started_at, started).await;
                }
                _ = shutdown.changed() => {
                    info!(
                        grace_ms = self.shutdown_grace.as_millis() as u64,
                        "poller shutting down mid-cycle"
                    );
                    match tokio::time::timeout(self.shutdown_grace, &mut cycle).await {
                        Ok(results) => self.publish(results, started_at, started).await,
                        Err(_) => warn!("in-flight poll cycle abandoned"),
                    }
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use statusgrid_config::QueryDefinition;
    use statusgrid_query::{MetricsClient, QueryError, QueryFuture, Sample};

    use super::*;
    use crate::aggregate::{Outage, classify};
    use crate::evaluator::mock::MockClient;

    fn spec(name: &str, group: &str) -> ServiceSpec {
        ServiceSpec {
            name: name.to_string(),
            group: group.to_string(),
            query: QueryDefinition::new(name),
        }
    }

    fn poller(services: Vec<ServiceSpec>, client: MockClient, interval: Duration) -> Poller {
        Poller::new(
            services,
            Evaluator::new(Arc::new(client)),
            ResultCache::new(),
            interval,
        )
    }

    /// Panics on the query text `boom`; everything else is healthy.
    struct PanickingClient;

    impl MetricsClient for PanickingClient {
        fn query<'a>(&'a self, query: &'a QueryDefinition) -> QueryFuture<'a, f64> {
            Box::pin(async move {
                if query.query == "boom" {
                    panic!("client blew up");
                }
                Ok(1.0)
            })
        }

        fn query_range<'a>(
            &'a self,
            _query: &'a QueryDefinition,
            _end: SystemTime,
        ) -> QueryFuture<'a, Vec<Sample>> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    fn names(results: &[ServiceResult]) -> Vec<&str> {
        results.iter().map(|r| r.name()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn results_keep_configuration_order_regardless_of_completion() {
        // Earlier services finish later.
        let client = MockClient::new()
            .respond_after("a", Duration::from_millis(400), 1.0)
            .respond_after("b", Duration::from_millis(300), 1.0)
            .respond_after("c", Duration::from_millis(200), 0.0)
            .respond_after("d", Duration::from_millis(100), 1.0)
            .respond_after("e", Duration::ZERO, 1.0);
        let services = ["a", "b", "c", "d", "e"].map(|n| spec(n, "default")).to_vec();
        let poller = poller(services, client, Duration::from_secs(30));

        for _ in 0..3 {
            let results = poller.poll_cycle().await;
            assert_eq!(names(&results), ["a", "b", "c", "d", "e"]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn evaluations_run_concurrently() {
        let client = MockClient::new()
            .respond_after("a", Duration::from_secs(1), 1.0)
            .respond_after("b", Duration::from_secs(1), 1.0)
            .respond_after("c", Duration::from_secs(1), 1.0);
        let services = ["a", "b", "c"].map(|n| spec(n, "default")).to_vec();
        let poller = poller(services, client, Duration::from_secs(30));

        let started = tokio::time::Instant::now();
        poller.poll_cycle().await;
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn one_failing_service_does_not_abort_the_cycle() {
        let client = MockClient::new()
            .respond("a", Ok(1.0))
            .respond("b", Err(QueryError::Connect("refused".into())))
            .respond("c", Ok(1.0));
        let services = ["a", "b", "c"].map(|n| spec(n, "web")).to_vec();
        let poller = poller(services, client, Duration::from_secs(30));

        poller.poll_once().await;

        let (results, at) = poller.cache().get().await;
        assert!(at.is_some());
        assert_eq!(results.len(), 3);
        assert!(results[0].status && results[2].status);
        assert!(!results[1].status);
        assert!(results[1].error.is_some());
        assert_eq!(classify(&results), Outage::Partial);
    }

    #[tokio::test]
    async fn panicked_evaluation_fills_its_slot_with_task_error() {
        let services = ["a", "boom", "c"].map(|n| spec(n, "default")).to_vec();
        let poller = Poller::new(
            services,
            Evaluator::new(Arc::new(PanickingClient)),
            ResultCache::new(),
            Duration::from_secs(30),
        );

        let results = poller.poll_cycle().await;

        assert_eq!(names(&results), ["a", "boom", "c"]);
        assert!(results[0].status && results[2].status);
        assert!(!results[1].status);
        assert!(results[1].value.is_none());
        assert!(matches!(results[1].error, Some(EvalError::Task(_))));
    }

    #[tokio::test]
    async fn empty_configuration_publishes_empty_set() {
        let poller = poller(Vec::new(), MockClient::new(), Duration::from_secs(30));
        poller.poll_once().await;

        let snapshot = poller.cache().snapshot().await;
        assert!(snapshot.is_ready());
        assert!(snapshot.results.is_empty());
        assert_eq!(snapshot.outage, Outage::None);
        assert_eq!(snapshot.groups.len(), 1);
    }

    #[tokio::test]
    async fn cache_is_stamped_with_cycle_start() {
        let client = MockClient::new().respond_after("a", Duration::from_millis(50), 1.0);
        let poller = poller(vec![spec("a", "default")], client, Duration::from_secs(30));

        let before = SystemTime::now();
        poller.poll_once().await;
        let (results, at) = poller.cache().get().await;
        let at = at.unwrap();

        assert!(at >= before);
        assert!(at <= results[0].evaluated_at);
    }

    #[tokio::test(start_paused = true)]
    async fn run_polls_immediately_then_on_interval() {
        let client = Arc::new(MockClient::new().respond("a", Ok(1.0)));
        let poller = Arc::new(Poller::new(
            vec![spec("a", "default")],
            Evaluator::new(client.clone()),
            ResultCache::new(),
            Duration::from_secs(10),
        ));
        let (tx, rx) = watch::channel(false);

        let handle = {
            let poller = Arc::clone(&poller);
            tokio::spawn(async move { poller.run(rx).await })
        };

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(poller.cache().entry().await.generation, 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(poller.cache().entry().await.generation, 2);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(poller.cache().entry().await.generation, 4);
        assert_eq!(client.calls().len(), 4);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_mid_cycle_discards_results() {
        let client = MockClient::new().respond_after("slow", Duration::from_secs(60), 1.0);
        let poller = Arc::new(
            poller(vec![spec("slow", "default")], client, Duration::from_secs(10))
                .with_shutdown_grace(Duration::from_secs(1)),
        );
        let (tx, rx) = watch::channel(false);

        let handle = {
            let poller = Arc::clone(&poller);
            tokio::spawn(async move { poller.run(rx).await })
        };

        tokio::time::sleep(Duration::from_secs(2)).await;
        tx.send(true).unwrap();

        let started = tokio::time::Instant::now();
        handle.await.unwrap();
        assert!(started.elapsed() <= Duration::from_secs(2));

        let (results, at) = poller.cache().get().await;
        assert!(results.is_empty());
        assert!(at.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_mid_cycle_publishes_when_cycle_finishes_within_grace() {
        let client = MockClient::new().respond_after("a", Duration::from_secs(3), 1.0);
        let poller = Arc::new(
            poller(vec![spec("a", "default")], client, Duration::from_secs(60))
                .with_shutdown_grace(Duration::from_secs(10)),
        );
        let (tx, rx) = watch::channel(false);

        let handle = {
            let poller = Arc::clone(&poller);
            tokio::spawn(async move { poller.run(rx).await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(true).unwrap();

        let started = tokio::time::Instant::now();
        handle.await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(10));

        let (results, at) = poller.cache().get().await;
        assert!(at.is_some());
        assert_eq!(names(&results), ["a"]);
        assert!(results[0].status);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_between_cycles_exits_promptly() {
        let client = MockClient::new().respond("a", Ok(1.0));
        let poller = Arc::new(poller(vec![spec("a", "default")], client, Duration::from_secs(60)));
        let (tx, rx) = watch::channel(false);

        let handle = {
            let poller = Arc::clone(&poller);
            tokio::spawn(async move { poller.run(rx).await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(poller.cache().entry().await.generation, 1);
    }
}
