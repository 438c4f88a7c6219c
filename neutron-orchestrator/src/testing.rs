//! In-memory collaborators for unit tests

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use neutron_client::{ClientError, CommitStatus, ManifestFetcher, StatusPublisher};
use neutron_core::domain::harvest::{HarvestRecord, JobOutcome, PodPhase};
use neutron_core::domain::job::JobAnnotations;
use neutron_core::domain::pipeline::PipelineManifest;

use crate::cluster::types::{Job, JobCondition, JobStatus, ObjectMeta, Pod, PodStatus};
use crate::cluster::{ClusterApi, ClusterError, LogStream, MANAGED_BY_LABEL, MANAGED_BY_VALUE};
use crate::config::Config;
use crate::service::harvester::{HarvestError, HarvestStore};

pub fn test_config() -> Config {
    let vars = HashMap::from([
        ("NEUTRON_PUBLIC_URL", "http://neutron.test"),
        ("GITLAB_URL", "https://gitlab.test"),
        ("GITLAB_TOKEN", "glpat-test"),
        ("KUBE_TOKEN", "kube-test"),
        ("NEUTRON_RUNNER_BIN_DIR", "/nonexistent/neutron-bin"),
    ]);
    Config::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap()
}

/// A managed job. `condition` is the one terminal condition set to `True`,
/// or empty for a job that is still running.
pub fn finished_job(name: &str, condition: &str) -> Job {
    let annotations = JobAnnotations {
        source_type: "GitLab".to_string(),
        repo_url: "git@gitlab.local:team/app.git".to_string(),
        trigger_type: "PUSH".to_string(),
        project_url: "https://gitlab.test/projects/17".to_string(),
    };
    let conditions = if condition.is_empty() {
        Vec::new()
    } else {
        vec![JobCondition {
            type_: condition.to_string(),
            status: "True".to_string(),
        }]
    };

    Job {
        api_version: "batch/v1".to_string(),
        kind: "Job".to_string(),
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: BTreeMap::from([(MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string())]),
            annotations: annotations.to_map(),
            ..Default::default()
        },
        spec: None,
        status: Some(JobStatus {
            active: if condition.is_empty() { 1 } else { 0 },
            succeeded: if condition == "Complete" { 1 } else { 0 },
            failed: if condition == "Failed" { 1 } else { 0 },
            conditions,
        }),
    }
}

pub fn pod(name: &str, phase: PodPhase) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        status: Some(PodStatus { phase: Some(phase) }),
    }
}

// =============================================================================
// Cluster
// =============================================================================

#[derive(Default)]
struct ClusterState {
    jobs: Vec<Job>,
    /// Pods keyed by the label selector that lists them
    pods: HashMap<String, Vec<Pod>>,
    logs: HashMap<String, Vec<Vec<u8>>>,
    failing_logs: HashSet<String>,
    created: Vec<Job>,
    deleted: Vec<String>,
    reject: Option<String>,
}

/// Cluster kept in memory. `list_pods` can be slowed down to observe how
/// many harvest workers are inside it at once.
#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<ClusterState>,
    list_delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeCluster {
    pub fn with_list_delay(delay: Duration) -> Self {
        Self {
            list_delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn add_job(&self, job: Job) {
        self.state.lock().unwrap().jobs.push(job);
    }

    pub fn add_pod(&self, selector: &str, pod: Pod) {
        self.state
            .lock()
            .unwrap()
            .pods
            .entry(selector.to_string())
            .or_default()
            .push(pod);
    }

    pub fn add_log(&self, pod: &str, chunks: &[&str]) {
        self.add_log_bytes(pod, chunks.iter().map(|c| c.as_bytes().to_vec()).collect());
    }

    pub fn add_log_bytes(&self, pod: &str, chunks: Vec<Vec<u8>>) {
        self.state.lock().unwrap().logs.insert(pod.to_string(), chunks);
    }

    /// Make the log stream of `pod` fail after it was opened
    pub fn fail_logs(&self, pod: &str) {
        self.state.lock().unwrap().failing_logs.insert(pod.to_string());
    }

    pub fn reject_creates(&self, message: &str) {
        self.state.lock().unwrap().reject = Some(message.to_string());
    }

    pub fn created_jobs(&self) -> Vec<Job> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn deleted_jobs(&self) -> Vec<String> {
        let mut deleted = self.state.lock().unwrap().deleted.clone();
        deleted.sort();
        deleted
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn create_job(&self, job: &Job) -> Result<Job, ClusterError> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = &state.reject {
            return Err(ClusterError::api(422, message.clone()));
        }
        state.created.push(job.clone());
        Ok(job.clone())
    }

    async fn get_job(&self, name: &str) -> Result<Option<Job>, ClusterError> {
        let state = self.state.lock().unwrap();
        Ok(state.jobs.iter().find(|j| j.name() == name).cloned())
    }

    async fn list_jobs(&self, label_selector: &str) -> Result<Vec<Job>, ClusterError> {
        let (key, value) = label_selector.split_once('=').unwrap_or((label_selector, ""));
        let state = self.state.lock().unwrap();
        Ok(state
            .jobs
            .iter()
            .filter(|j| j.metadata.labels.get(key).is_some_and(|v| v == value))
            .cloned()
            .collect())
    }

    async fn list_pods(&self, label_selector: &str) -> Result<Vec<Pod>, ClusterError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let state = self.state.lock().unwrap();
        Ok(state.pods.get(label_selector).cloned().unwrap_or_default())
    }

    async fn stream_pod_logs(&self, pod: &str, _follow: bool) -> Result<LogStream, ClusterError> {
        let state = self.state.lock().unwrap();
        let mut items: Vec<Result<Bytes, ClusterError>> = state
            .logs
            .get(pod)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|chunk| Ok(Bytes::from(chunk)))
            .collect();
        if state.failing_logs.contains(pod) {
            items.push(Err(ClusterError::api(500, "connection reset")));
        }
        Ok(futures::stream::iter(items).boxed())
    }

    async fn delete_job(&self, name: &str) -> Result<(), ClusterError> {
        let mut state = self.state.lock().unwrap();
        state.jobs.retain(|j| j.name() != name);
        state.deleted.push(name.to_string());
        Ok(())
    }
}

// =============================================================================
// Harvest store
// =============================================================================

#[derive(Default)]
struct StoreState {
    records: Vec<HarvestRecord>,
    outcomes: HashMap<String, JobOutcome>,
    fail_outcomes: bool,
}

#[derive(Default)]
pub struct RecordingStore {
    state: Mutex<StoreState>,
}

impl RecordingStore {
    pub fn fail_outcomes(&self) {
        self.state.lock().unwrap().fail_outcomes = true;
    }

    pub fn log(&self, job: &str, pod: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .records
            .iter()
            .find(|r| r.job_name == job && r.pod_name == pod)
            .map(|r| r.content.clone())
    }

    pub fn outcome(&self, job: &str) -> Option<JobOutcome> {
        self.state.lock().unwrap().outcomes.get(job).cloned()
    }

    /// `(job, pod)` of every `open_log` call, in order
    pub fn opened(&self) -> Vec<(String, String)> {
        let state = self.state.lock().unwrap();
        state
            .records
            .iter()
            .map(|r| (r.job_name.clone(), r.pod_name.clone()))
            .collect()
    }
}

#[async_trait]
impl HarvestStore for RecordingStore {
    async fn open_log(&self, job: &str, pod: &str, phase: PodPhase) -> Result<(), HarvestError> {
        self.state.lock().unwrap().records.push(HarvestRecord {
            job_name: job.to_string(),
            pod_name: pod.to_string(),
            phase,
            content: String::new(),
        });
        Ok(())
    }

    async fn append_log(&self, job: &str, pod: &str, chunk: &str) -> Result<(), HarvestError> {
        // Same rule as a Postgres text column
        if chunk.contains('\0') {
            return Err(HarvestError::Store("invalid byte sequence for encoding \"UTF8\": 0x00".to_string()));
        }
        let mut state = self.state.lock().unwrap();
        let record = state
            .records
            .iter_mut()
            .rev()
            .find(|r| r.job_name == job && r.pod_name == pod)
            .ok_or_else(|| HarvestError::Store(format!("log of {} not opened", pod)))?;
        record.content.push_str(chunk);
        Ok(())
    }

    async fn upsert_outcome(&self, job: &str, outcome: &JobOutcome) -> Result<(), HarvestError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_outcomes {
            return Err(HarvestError::Store("database unavailable".to_string()));
        }
        state.outcomes.insert(job.to_string(), outcome.clone());
        Ok(())
    }
}

// =============================================================================
// Source control
// =============================================================================

pub struct FakeFetcher {
    manifest: Option<String>,
    requests: Mutex<Vec<(String, String)>>,
}

impl FakeFetcher {
    pub fn with_manifest(yaml: &str) -> Self {
        Self {
            manifest: Some(yaml.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn missing() -> Self {
        Self {
            manifest: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ManifestFetcher for FakeFetcher {
    async fn fetch(&self, project_id: &str, manifest_ref: &str) -> neutron_client::Result<PipelineManifest> {
        self.requests
            .lock()
            .unwrap()
            .push((project_id.to_string(), manifest_ref.to_string()));
        match &self.manifest {
            Some(yaml) => PipelineManifest::from_yaml(yaml).map_err(|e| ClientError::Malformed(e.to_string())),
            None => Err(ClientError::NotFound("neutron.yaml".to_string())),
        }
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    posted: Mutex<Vec<(String, String, CommitStatus)>>,
}

impl RecordingPublisher {
    /// `(project, sha, status)` of every publish call
    pub fn posted(&self) -> Vec<(String, String, CommitStatus)> {
        self.posted.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusPublisher for RecordingPublisher {
    async fn publish(&self, project_id: &str, sha: &str, status: &CommitStatus) -> neutron_client::Result<()> {
        self.posted
            .lock()
            .unwrap()
            .push((project_id.to_string(), sha.to_string(), status.clone()));
        Ok(())
    }
}
