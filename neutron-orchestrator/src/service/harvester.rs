//! Log Harvester
//!
//! One pass lists the jobs this service launched, keeps the finished ones,
//! and drains them through a fixed-width worker pool. Each worker streams
//! the logs of a job's terminal pods into the store, records the job's
//! outcome, and only then deletes the job. Any error leaves the job in place
//! for the next pass.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use neutron_core::domain::harvest::{JobOutcome, PodPhase};
use neutron_core::domain::job::JobAnnotations;
use neutron_core::dto::harvest::HarvestSummary;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;

use crate::cluster::types::Job;
use crate::cluster::{ClusterApi, ClusterError, managed_jobs_selector};
use crate::repository::{job_repository, log_repository};
use crate::service::log::Utf8Chunker;

/// Bytes of decoded log text buffered before each store append
const APPEND_THRESHOLD: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store error: {0}")]
    Store(String),
}

/// Where harvested logs and outcomes are written. Shared by all workers of
/// a pass, so implementations must tolerate concurrent calls.
#[async_trait]
pub trait HarvestStore: Send + Sync {
    /// Start (or restart) the log of one pod
    async fn open_log(&self, job: &str, pod: &str, phase: PodPhase) -> Result<(), HarvestError>;

    async fn append_log(&self, job: &str, pod: &str, chunk: &str) -> Result<(), HarvestError>;

    async fn upsert_outcome(&self, job: &str, outcome: &JobOutcome) -> Result<(), HarvestError>;
}

#[async_trait]
impl HarvestStore for PgPool {
    async fn open_log(&self, job: &str, pod: &str, phase: PodPhase) -> Result<(), HarvestError> {
        Ok(log_repository::open(self, job, pod, phase).await?)
    }

    async fn append_log(&self, job: &str, pod: &str, chunk: &str) -> Result<(), HarvestError> {
        Ok(log_repository::append(self, job, pod, chunk).await?)
    }

    async fn upsert_outcome(&self, job: &str, outcome: &JobOutcome) -> Result<(), HarvestError> {
        Ok(job_repository::upsert_outcome(self, job, outcome).await?)
    }
}

pub struct Harvester {
    cluster: Arc<dyn ClusterApi>,
    store: Arc<dyn HarvestStore>,
    workers: usize,
    include_failed: bool,
}

impl Harvester {
    pub fn new(
        cluster: Arc<dyn ClusterApi>,
        store: Arc<dyn HarvestStore>,
        workers: usize,
        include_failed: bool,
    ) -> Self {
        Self {
            cluster,
            store,
            workers: workers.max(1),
            include_failed,
        }
    }

    fn is_eligible(&self, job: &Job) -> bool {
        job.is_complete() || (self.include_failed && job.is_failed())
    }

    /// Run one harvest pass and wait for every worker to finish.
    ///
    /// Only listing the jobs can fail the pass as a whole; per-job failures
    /// are counted in the summary.
    pub async fn harvest_once(&self) -> Result<HarvestSummary, HarvestError> {
        let jobs = self.cluster.list_jobs(&managed_jobs_selector()).await?;
        let (eligible, waiting): (Vec<Job>, Vec<Job>) =
            jobs.into_iter().partition(|job| self.is_eligible(job));

        let mut summary = HarvestSummary {
            status: "ok".to_string(),
            skipped: waiting.len(),
            ..Default::default()
        };

        if eligible.is_empty() {
            tracing::debug!(skipped = summary.skipped, "No finished jobs to harvest");
            return Ok(summary);
        }

        let workers = self.workers.min(eligible.len());
        tracing::info!(jobs = eligible.len(), workers, "Starting harvest pass");

        // Sized to hold every job so queuing never waits on the workers
        let (tx, rx) = mpsc::channel(eligible.len());
        for job in eligible {
            tx.send(job)
                .await
                .map_err(|_| HarvestError::Store("harvest queue closed".to_string()))?;
        }
        drop(tx);

        let rx = Arc::new(Mutex::new(rx));
        let mut set = JoinSet::new();

        for worker in 0..workers {
            let rx = rx.clone();
            let cluster = self.cluster.clone();
            let store = self.store.clone();

            set.spawn(async move {
                let mut harvested = 0;
                let mut failed = 0;

                loop {
                    let next = rx.lock().await.recv().await;
                    let Some(job) = next else {
                        break;
                    };

                    match harvest_job(cluster.as_ref(), store.as_ref(), &job).await {
                        Ok(pods) => {
                            harvested += 1;
                            tracing::info!(worker, job = job.name(), pods, "Harvested job");
                        }
                        Err(e) => {
                            failed += 1;
                            tracing::error!(
                                worker,
                                job = job.name(),
                                "Harvest failed, job kept for next pass: {}",
                                e
                            );
                        }
                    }
                }

                (harvested, failed)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((harvested, failed)) => {
                    summary.harvested += harvested;
                    summary.failed += failed;
                }
                Err(e) => tracing::error!("Harvest worker panicked: {}", e),
            }
        }

        tracing::info!(
            harvested = summary.harvested,
            failed = summary.failed,
            skipped = summary.skipped,
            "Harvest pass finished"
        );

        Ok(summary)
    }
}

/// Persist one job and delete it. Returns the number of pod logs written.
async fn harvest_job(
    cluster: &dyn ClusterApi,
    store: &dyn HarvestStore,
    job: &Job,
) -> Result<usize, HarvestError> {
    let job_name = job.name();
    let pods = cluster.list_pods(&job.pod_selector()).await?;

    let mut seen = HashSet::new();
    for pod in &pods {
        let phase = pod.phase();
        if !phase.is_terminal() || !seen.insert(pod.name().to_string()) {
            continue;
        }
        persist_log(cluster, store, job_name, pod.name(), phase).await?;
    }

    let (active, succeeded, failed) = job.counters();
    let annotations = JobAnnotations::from_map(&job.metadata.annotations);
    let outcome = JobOutcome::from_parts(&annotations, active, succeeded, failed);
    store.upsert_outcome(job_name, &outcome).await?;

    cluster.delete_job(job_name).await?;

    Ok(seen.len())
}

/// Stream a pod's full log into the store, appending as it is read
async fn persist_log(
    cluster: &dyn ClusterApi,
    store: &dyn HarvestStore,
    job_name: &str,
    pod_name: &str,
    phase: PodPhase,
) -> Result<(), HarvestError> {
    let mut stream = cluster.stream_pod_logs(pod_name, false).await?;
    store.open_log(job_name, pod_name, phase).await?;

    let mut chunker = Utf8Chunker::new();
    let mut buffer = String::new();

    while let Some(chunk) = stream.next().await {
        push_storable(&mut buffer, &chunker.push(&chunk?));
        if buffer.len() >= APPEND_THRESHOLD {
            store.append_log(job_name, pod_name, &buffer).await?;
            buffer.clear();
        }
    }

    push_storable(&mut buffer, &chunker.finish());
    if !buffer.is_empty() {
        store.append_log(job_name, pod_name, &buffer).await?;
    }

    tracing::debug!(job = job_name, pod = pod_name, phase = %phase, "Persisted pod log");
    Ok(())
}

/// Postgres text cannot hold NUL, so it is stored as U+FFFD
fn push_storable(buffer: &mut String, text: &str) {
    for c in text.chars() {
        buffer.push(if c == '\0' { char::REPLACEMENT_CHARACTER } else { c });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeCluster, RecordingStore, finished_job, pod};
    use std::time::Duration;

    fn harvester(cluster: &Arc<FakeCluster>, store: &Arc<RecordingStore>, workers: usize) -> Harvester {
        Harvester::new(cluster.clone(), store.clone(), workers, false)
    }

    #[tokio::test]
    async fn test_only_complete_jobs_are_harvested() {
        let cluster = Arc::new(FakeCluster::default());
        cluster.add_job(finished_job("done", "Complete"));
        cluster.add_job(finished_job("broken", "Failed"));
        cluster.add_job(finished_job("running", ""));
        let store = Arc::new(RecordingStore::default());

        let summary = harvester(&cluster, &store, 5).harvest_once().await.unwrap();

        assert_eq!(summary.harvested, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(cluster.deleted_jobs(), vec!["done".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_jobs_harvested_when_opted_in() {
        let cluster = Arc::new(FakeCluster::default());
        cluster.add_job(finished_job("broken", "Failed"));
        let store = Arc::new(RecordingStore::default());

        let summary = Harvester::new(cluster.clone(), store.clone(), 5, true)
            .harvest_once()
            .await
            .unwrap();

        assert_eq!(summary.harvested, 1);
        assert_eq!(cluster.deleted_jobs(), vec!["broken".to_string()]);
    }

    #[tokio::test]
    async fn test_logs_and_outcome_persisted_before_delete() {
        let cluster = Arc::new(FakeCluster::default());
        cluster.add_job(finished_job("done", "Complete"));
        cluster.add_pod("job-name=done", pod("done-abc", PodPhase::Succeeded));
        cluster.add_log("done-abc", &["+ cargo test\n", "ok\n"]);
        let store = Arc::new(RecordingStore::default());

        harvester(&cluster, &store, 5).harvest_once().await.unwrap();

        assert_eq!(store.log("done", "done-abc").as_deref(), Some("+ cargo test\nok\n"));
        let outcome = store.outcome("done").unwrap();
        assert_eq!(outcome.trigger_type, "PUSH");
        assert_eq!(outcome.succeeded, 1);
        assert_eq!(cluster.deleted_jobs(), vec!["done".to_string()]);
    }

    #[tokio::test]
    async fn test_running_pods_are_not_persisted() {
        let cluster = Arc::new(FakeCluster::default());
        cluster.add_job(finished_job("done", "Complete"));
        cluster.add_pod("job-name=done", pod("done-old", PodPhase::Running));
        cluster.add_pod("job-name=done", pod("done-new", PodPhase::Failed));
        cluster.add_log("done-new", &["boom\n"]);
        let store = Arc::new(RecordingStore::default());

        harvester(&cluster, &store, 5).harvest_once().await.unwrap();

        assert!(store.log("done", "done-old").is_none());
        assert_eq!(store.log("done", "done-new").as_deref(), Some("boom\n"));
    }

    #[tokio::test]
    async fn test_log_failure_keeps_job() {
        let cluster = Arc::new(FakeCluster::default());
        cluster.add_job(finished_job("flaky", "Complete"));
        cluster.add_job(finished_job("fine", "Complete"));
        cluster.add_pod("job-name=flaky", pod("flaky-1", PodPhase::Succeeded));
        cluster.fail_logs("flaky-1");
        let store = Arc::new(RecordingStore::default());

        let summary = harvester(&cluster, &store, 2).harvest_once().await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.harvested, 1);
        assert!(store.outcome("flaky").is_none());
        assert_eq!(cluster.deleted_jobs(), vec!["fine".to_string()]);
    }

    #[tokio::test]
    async fn test_outcome_failure_keeps_job() {
        let cluster = Arc::new(FakeCluster::default());
        cluster.add_job(finished_job("done", "Complete"));
        let store = Arc::new(RecordingStore::default());
        store.fail_outcomes();

        let summary = harvester(&cluster, &store, 5).harvest_once().await.unwrap();

        assert_eq!(summary.failed, 1);
        assert!(cluster.deleted_jobs().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_pods_written_once() {
        let cluster = Arc::new(FakeCluster::default());
        cluster.add_job(finished_job("done", "Complete"));
        cluster.add_pod("job-name=done", pod("done-1", PodPhase::Succeeded));
        cluster.add_pod("job-name=done", pod("done-1", PodPhase::Succeeded));
        cluster.add_log("done-1", &["once\n"]);
        let store = Arc::new(RecordingStore::default());

        harvester(&cluster, &store, 5).harvest_once().await.unwrap();

        assert_eq!(store.opened(), vec![("done".to_string(), "done-1".to_string())]);
    }

    #[tokio::test]
    async fn test_streamed_log_keeps_multibyte_characters() {
        let cluster = Arc::new(FakeCluster::default());
        cluster.add_job(finished_job("done", "Complete"));
        cluster.add_pod("job-name=done", pod("done-1", PodPhase::Succeeded));
        let check = "✓".as_bytes();
        cluster.add_log_bytes(
            "done-1",
            vec![[b"ok ".as_slice(), &check[..1]].concat(), check[1..].to_vec()],
        );
        let store = Arc::new(RecordingStore::default());

        harvester(&cluster, &store, 5).harvest_once().await.unwrap();

        assert_eq!(store.log("done", "done-1").as_deref(), Some("ok ✓"));
    }

    #[tokio::test]
    async fn test_nul_bytes_in_log_do_not_block_cleanup() {
        let cluster = Arc::new(FakeCluster::default());
        cluster.add_job(finished_job("done", "Complete"));
        cluster.add_pod("job-name=done", pod("done-1", PodPhase::Succeeded));
        cluster.add_log_bytes("done-1", vec![b"a\0b".to_vec(), b"\0".to_vec()]);
        let store = Arc::new(RecordingStore::default());

        let summary = harvester(&cluster, &store, 5).harvest_once().await.unwrap();

        assert_eq!(summary.harvested, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(store.log("done", "done-1").as_deref(), Some("a\u{FFFD}b\u{FFFD}"));
        assert_eq!(cluster.deleted_jobs(), vec!["done".to_string()]);
    }

    async fn peak_concurrency(jobs: usize, workers: usize) -> usize {
        let cluster = Arc::new(FakeCluster::with_list_delay(Duration::from_millis(50)));
        for i in 0..jobs {
            cluster.add_job(finished_job(&format!("job-{}", i), "Complete"));
        }
        let store = Arc::new(RecordingStore::default());

        let summary = harvester(&cluster, &store, workers).harvest_once().await.unwrap();
        assert_eq!(summary.harvested, jobs);
        cluster.peak_in_flight()
    }

    #[tokio::test]
    async fn test_pool_width_five_runs_all_concurrently() {
        assert_eq!(peak_concurrency(5, 5).await, 5);
    }

    #[tokio::test]
    async fn test_pool_width_two_bounds_concurrency() {
        let peak = peak_concurrency(5, 2).await;
        assert!(peak <= 2, "{} jobs in flight", peak);
        assert!(peak >= 1);
    }
}
