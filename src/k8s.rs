use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Event, Node, PersistentVolumeClaim, Pod, PodStatus, Service};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::api::{ListParams, LogParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::{Api, Client, Config, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command as TokioCommand;
use tokio::sync::Mutex;
use tokio::time::{Duration, timeout};
use tracing::{debug, info, warn};

use crate::model::{
    DaemonSetInfo, DeploymentInfo, EntityKey, EntityKind, EventInfo, JobInfo, NodeInfo, OwnerRef,
    PodInfo, PvcInfo, QueueInfo, ServiceInfo, Snapshot, StatefulSetInfo, VolcanoJobInfo,
};
use crate::provider::{
    CommandInvocation, CommandRunner, CoreError, DataProvider, LogSource, LogTarget,
    ResourceInspector,
};

const METRICS_REFRESH_TIMEOUT: Duration = Duration::from_secs(2);
const DESCRIBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Extended resources counted as accelerators.
const ACCELERATOR_RESOURCES: [&str; 4] = [
    "nvidia.com/gpu",
    "amd.com/gpu",
    "huawei.com/Ascend910",
    "habana.ai/gaudi",
];

type UsageMap = HashMap<String, (u64, u64)>;

struct CachedSnapshot {
    built: Instant,
    snapshot: Snapshot,
}

pub struct KubeGateway {
    client: Client,
    context: String,
    cluster: String,
    default_namespace: String,
    cache_ttl: Duration,
    cache: Mutex<Option<CachedSnapshot>>,
    kubectl_available: bool,
}

impl KubeGateway {
    pub async fn connect(cache_ttl: Duration) -> Result<Self> {
        let kubeconfig = Kubeconfig::read().ok();

        let config = if let Some(kubeconfig_value) = kubeconfig.clone() {
            Config::from_custom_kubeconfig(kubeconfig_value, &KubeConfigOptions::default())
                .await
                .context("failed to infer Kubernetes configuration")?
        } else {
            Config::infer()
                .await
                .context("failed to infer Kubernetes configuration")?
        };

        let cluster = config.cluster_url.to_string();
        let default_namespace = config.default_namespace.clone();
        let client = Client::try_from(config).context("failed to initialize Kubernetes client")?;
        let context = kubeconfig
            .and_then(|cfg| cfg.current_context)
            .unwrap_or_else(|| "in-cluster".to_string());
        let kubectl_available = executable_on_path("kubectl");
        info!(%context, %cluster, kubectl_available, "connected to cluster");

        Ok(Self {
            client,
            context,
            cluster,
            default_namespace,
            cache_ttl,
            cache: Mutex::new(None),
            kubectl_available,
        })
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    async fn build_snapshot(&self) -> Result<Snapshot> {
        let refreshed_at = Utc::now();
        let client = self.client.clone();

        let nodes = Api::<Node>::all(client.clone())
            .list(&list_params())
            .await
            .context("failed to list nodes")?;
        let pods = Api::<Pod>::all(client.clone())
            .list(&list_params())
            .await
            .context("failed to list pods")?;

        let (node_usage, pod_usage) = self.fetch_usage().await;

        let mut snapshot = Snapshot {
            refreshed_at: Some(refreshed_at),
            pods: pods
                .into_iter()
                .map(|pod| pod_info(&pod, &pod_usage))
                .collect(),
            ..Snapshot::default()
        };
        snapshot.nodes = nodes
            .into_iter()
            .map(|node| node_info(&node, &node_usage, &snapshot.pods))
            .collect();

        let summaries = join_all(
            snapshot
                .nodes
                .iter()
                .map(|node| self.fetch_stats_summary(node.name.clone())),
        )
        .await;
        for (name, summary) in summaries.into_iter().flatten() {
            apply_network_stats(&mut snapshot, &name, &summary);
        }

        snapshot.deployments = optional_list::<Deployment>(&client, "deployments")
            .await
            .iter()
            .map(deployment_info)
            .collect();
        snapshot.stateful_sets = optional_list::<StatefulSet>(&client, "statefulsets")
            .await
            .iter()
            .map(stateful_set_info)
            .collect();
        snapshot.daemon_sets = optional_list::<DaemonSet>(&client, "daemonsets")
            .await
            .iter()
            .map(daemon_set_info)
            .collect();
        snapshot.jobs = optional_list::<Job>(&client, "jobs")
            .await
            .iter()
            .map(job_info)
            .collect();
        snapshot.services = optional_list::<Service>(&client, "services")
            .await
            .iter()
            .map(service_info)
            .collect();
        snapshot.pvcs = optional_list::<PersistentVolumeClaim>(&client, "persistentvolumeclaims")
            .await
            .iter()
            .map(pvc_info)
            .collect();
        snapshot.events = optional_list::<Event>(&client, "events")
            .await
            .iter()
            .map(event_info)
            .collect();

        snapshot.volcano_jobs = self
            .list_dynamic(&volcano_job_resource())
            .await
            .iter()
            .map(volcano_job_info)
            .collect();
        snapshot.queues = self
            .list_dynamic(&volcano_queue_resource())
            .await
            .iter()
            .map(queue_info)
            .collect();

        debug!(
            nodes = snapshot.nodes.len(),
            pods = snapshot.pods.len(),
            volcano_jobs = snapshot.volcano_jobs.len(),
            "snapshot built"
        );
        Ok(snapshot)
    }

    /// Node and pod usage from `metrics.k8s.io`; empty when metrics-server is absent.
    async fn fetch_usage(&self) -> (UsageMap, UsageMap) {
        let node_metrics_gvk = GroupVersionKind::gvk("metrics.k8s.io", "v1beta1", "NodeMetrics");
        let node_metrics_resource = ApiResource::from_gvk_with_plural(&node_metrics_gvk, "nodes");
        let node_api: Api<DynamicObject> = Api::all_with(self.client.clone(), &node_metrics_resource);

        let pod_metrics_gvk = GroupVersionKind::gvk("metrics.k8s.io", "v1beta1", "PodMetrics");
        let pod_metrics_resource = ApiResource::from_gvk_with_plural(&pod_metrics_gvk, "pods");
        let pod_api: Api<DynamicObject> = Api::all_with(self.client.clone(), &pod_metrics_resource);

        let mut node_usage = UsageMap::new();
        match timeout(METRICS_REFRESH_TIMEOUT, node_api.list(&list_params())).await {
            Ok(Ok(list)) => {
                for metric in list {
                    node_usage.insert(metric.name_any(), parse_usage_from_value(&metric.data["usage"]));
                }
            }
            Ok(Err(err)) => debug!(error = %err, "node metrics unavailable"),
            Err(_) => debug!("node metrics timed out"),
        }

        let mut pod_usage = UsageMap::new();
        match timeout(METRICS_REFRESH_TIMEOUT, pod_api.list(&list_params())).await {
            Ok(Ok(list)) => {
                for metric in list {
                    let namespace = metric.namespace().unwrap_or_default();
                    pod_usage.insert(
                        format!("{namespace}/{}", metric.name_any()),
                        parse_pod_metrics_usage(&metric.data),
                    );
                }
            }
            Ok(Err(err)) => debug!(error = %err, "pod metrics unavailable"),
            Err(_) => debug!("pod metrics timed out"),
        }

        (node_usage, pod_usage)
    }

    async fn fetch_stats_summary(&self, node: String) -> Option<(String, StatsSummary)> {
        let path = format!("/api/v1/nodes/{node}/proxy/stats/summary");
        let request = match http::Request::get(path).body(Vec::new()) {
            Ok(request) => request,
            Err(err) => {
                debug!(%node, error = %err, "failed to build stats request");
                return None;
            }
        };

        match timeout(METRICS_REFRESH_TIMEOUT, self.client.request_text(request)).await {
            Ok(Ok(body)) => match serde_json::from_str::<StatsSummary>(&body) {
                Ok(summary) => Some((node, summary)),
                Err(err) => {
                    debug!(%node, error = %err, "unreadable kubelet summary");
                    None
                }
            },
            Ok(Err(err)) => {
                debug!(%node, error = %err, "kubelet summary unavailable");
                None
            }
            Err(_) => {
                debug!(%node, "kubelet summary timed out");
                None
            }
        }
    }

    /// Lists a custom resource; a missing CRD yields an empty list.
    async fn list_dynamic(&self, resource: &ApiResource) -> Vec<DynamicObject> {
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), resource);
        match api.list(&list_params()).await {
            Ok(list) => list.items,
            Err(err) => {
                debug!(kind = %resource.kind, error = %err, "custom resource unavailable");
                Vec::new()
            }
        }
    }

    async fn object_yaml(&self, key: &EntityKey) -> Result<String> {
        let client = self.client.clone();
        let namespace = key.namespace().unwrap_or(&self.default_namespace);
        let name = key.name();
        match key.kind {
            EntityKind::Node => render_yaml(Api::<Node>::all(client), name).await,
            EntityKind::Pod => render_yaml(Api::<Pod>::namespaced(client, namespace), name).await,
            EntityKind::Deployment => {
                render_yaml(Api::<Deployment>::namespaced(client, namespace), name).await
            }
            EntityKind::StatefulSet => {
                render_yaml(Api::<StatefulSet>::namespaced(client, namespace), name).await
            }
            EntityKind::DaemonSet => {
                render_yaml(Api::<DaemonSet>::namespaced(client, namespace), name).await
            }
            EntityKind::Job => render_yaml(Api::<Job>::namespaced(client, namespace), name).await,
            EntityKind::VolcanoJob => {
                let resource = volcano_job_resource();
                render_yaml(
                    Api::<DynamicObject>::namespaced_with(client, namespace, &resource),
                    name,
                )
                .await
            }
            EntityKind::Queue => {
                let resource = volcano_queue_resource();
                render_yaml(Api::<DynamicObject>::all_with(client, &resource), name).await
            }
            EntityKind::Service => {
                render_yaml(Api::<Service>::namespaced(client, namespace), name).await
            }
            EntityKind::PersistentVolumeClaim => {
                render_yaml(
                    Api::<PersistentVolumeClaim>::namespaced(client, namespace),
                    name,
                )
                .await
            }
            EntityKind::Event => {
                render_yaml(Api::<Event>::namespaced(client, namespace), name).await
            }
        }
    }

    fn describe_invocation(&self, key: &EntityKey) -> CommandInvocation {
        let mut args = vec![
            "describe".to_string(),
            key.kind.kubectl_resource().to_string(),
            key.name().to_string(),
        ];
        if let Some(namespace) = key.namespace() {
            args.push("-n".to_string());
            args.push(namespace.to_string());
        }
        if self.context != "in-cluster" {
            args.push("--context".to_string());
            args.push(self.context.clone());
        }
        CommandInvocation {
            program: "kubectl".to_string(),
            args,
            timeout: DESCRIBE_TIMEOUT,
        }
    }
}

#[async_trait]
impl DataProvider for KubeGateway {
    async fn get_snapshot(&self) -> Result<Snapshot, CoreError> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref()
            && cached.built.elapsed() < self.cache_ttl
        {
            return Ok(cached.snapshot.clone());
        }

        let snapshot = self
            .build_snapshot()
            .await
            .map_err(|err| CoreError::DataFetch(format!("{err:#}")))?;
        *cache = Some(CachedSnapshot {
            built: Instant::now(),
            snapshot: snapshot.clone(),
        });
        Ok(snapshot)
    }

    async fn force_refresh(&self) -> Result<(), CoreError> {
        self.cache.lock().await.take();
        Ok(())
    }
}

#[async_trait]
impl LogSource for KubeGateway {
    async fn fetch_log(&self, target: &LogTarget, tail_lines: i64) -> Result<String, CoreError> {
        let namespace = target
            .entity
            .namespace()
            .unwrap_or(&self.default_namespace);
        let pod_name = target.entity.name();
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = LogParams {
            container: target.container.clone(),
            tail_lines: Some(tail_lines.max(1)),
            ..LogParams::default()
        };

        pods.logs(pod_name, &params)
            .await
            .with_context(|| format!("failed to load logs for {namespace}/{pod_name}"))
            .map_err(|err| CoreError::LogFetch(format!("{err:#}")))
    }
}

#[async_trait]
impl ResourceInspector for KubeGateway {
    async fn describe(&self, key: &EntityKey) -> Result<String, CoreError> {
        if !self.kubectl_available {
            return Err(CoreError::UnsupportedOperation(format!("describe {key}")));
        }
        ProcessRunner.run(&self.describe_invocation(key)).await
    }

    async fn yaml(&self, key: &EntityKey) -> Result<String, CoreError> {
        self.object_yaml(key)
            .await
            .map_err(|err| CoreError::Command(format!("{err:#}")))
    }

    fn supports_describe(&self) -> bool {
        self.kubectl_available
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: &CommandInvocation) -> Result<String, CoreError> {
        let mut cmd = TokioCommand::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match timeout(invocation.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                return Err(CoreError::Command(format!(
                    "failed to execute {}: {err}",
                    invocation.program
                )));
            }
            Err(_) => {
                warn!(command = %invocation.display(), "command timed out");
                return Err(CoreError::Command(format!(
                    "{} timed out after {}s",
                    invocation.program,
                    invocation.timeout.as_secs()
                )));
            }
        };

        let rendered = render_output(&output.stdout, &output.stderr);
        if output.status.success() {
            Ok(rendered)
        } else {
            Err(CoreError::Command(format!(
                "{} exited with {}\n{rendered}",
                invocation.program, output.status
            )))
        }
    }
}

fn render_output(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    if stderr.trim().is_empty() {
        stdout.to_string()
    } else if stdout.trim().is_empty() {
        format!("stderr:\n{stderr}")
    } else {
        format!("stdout:\n{stdout}\n\nstderr:\n{stderr}")
    }
}

fn executable_on_path(program: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths).any(|dir| dir.join(program).is_file())
        })
        .unwrap_or(false)
}

async fn optional_list<K>(client: &Client, label: &str) -> Vec<K>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug,
{
    match Api::<K>::all(client.clone()).list(&list_params()).await {
        Ok(list) => list.items,
        Err(err) => {
            warn!(resource = label, error = %err, "list failed; section left empty");
            Vec::new()
        }
    }
}

async fn render_yaml<K>(api: Api<K>, name: &str) -> Result<String>
where
    K: Resource + Clone + DeserializeOwned + Debug + Serialize,
{
    let mut object = api
        .get(name)
        .await
        .with_context(|| format!("failed to load {name}"))?;
    object.meta_mut().managed_fields = None;
    serde_yaml::to_string(&object).context("failed to render YAML")
}

fn volcano_job_resource() -> ApiResource {
    let gvk = GroupVersionKind::gvk("batch.volcano.sh", "v1alpha1", "Job");
    ApiResource::from_gvk_with_plural(&gvk, "jobs")
}

fn volcano_queue_resource() -> ApiResource {
    let gvk = GroupVersionKind::gvk("scheduling.volcano.sh", "v1beta1", "Queue");
    ApiResource::from_gvk_with_plural(&gvk, "queues")
}

fn to_utc(timestamp: k8s_openapi::jiff::Timestamp) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(
        timestamp.as_second(),
        timestamp.subsec_nanosecond().max(0) as u32,
    )
}

fn node_info(node: &Node, usage: &UsageMap, pods: &[PodInfo]) -> NodeInfo {
    let name = node.name_any();
    let status = node.status.as_ref();
    let ready = status
        .and_then(|status| status.conditions.as_ref())
        .and_then(|conditions| {
            conditions
                .iter()
                .find(|condition| condition.type_ == "Ready")
        })
        .is_some_and(|condition| condition.status == "True");
    let allocatable = status.and_then(|status| status.allocatable.as_ref());
    let scheduled = pods
        .iter()
        .filter(|pod| pod.node.as_deref() == Some(name.as_str()))
        .collect::<Vec<_>>();

    NodeInfo {
        ready,
        unschedulable: node
            .spec
            .as_ref()
            .and_then(|spec| spec.unschedulable)
            .unwrap_or(false),
        roles: node_roles(node),
        kubelet_version: status
            .and_then(|status| status.node_info.as_ref())
            .map(|info| info.kubelet_version.clone())
            .unwrap_or_else(|| "-".to_string()),
        cpu_capacity_millis: allocatable
            .and_then(|values| values.get("cpu"))
            .and_then(|quantity| parse_cpu_millicores(&quantity.0))
            .unwrap_or(0),
        memory_capacity_bytes: allocatable
            .and_then(|values| values.get("memory"))
            .and_then(|quantity| parse_memory_bytes(&quantity.0))
            .unwrap_or(0),
        cpu_millis: usage.get(&name).map(|(cpu, _)| *cpu),
        memory_bytes: usage.get(&name).map(|(_, memory)| *memory),
        accelerator_capacity: allocatable.map(accelerator_count).unwrap_or(0),
        accelerators_allocated: scheduled
            .iter()
            .filter(|pod| !matches!(pod.phase.as_str(), "Succeeded" | "Failed"))
            .map(|pod| pod.accelerators)
            .sum(),
        pod_count: scheduled.len(),
        network_rx_bytes: None,
        network_tx_bytes: None,
        network_sampled_at: None,
        created_at: node
            .metadata
            .creation_timestamp
            .as_ref()
            .and_then(|time| to_utc(time.0)),
        name,
    }
}

fn pod_info(pod: &Pod, usage: &UsageMap) -> PodInfo {
    let namespace = pod.namespace().unwrap_or_default();
    let name = pod.name_any();
    let (ready_containers, total_containers, restarts) =
        pod.status.as_ref().map(pod_readiness).unwrap_or((0, 0, 0));
    let key = format!("{namespace}/{name}");
    let containers = pod
        .spec
        .as_ref()
        .map(|spec| {
            spec.containers
                .iter()
                .map(|container| container.name.clone())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    let accelerators = pod
        .spec
        .as_ref()
        .map(|spec| {
            spec.containers
                .iter()
                .filter_map(|container| container.resources.as_ref())
                .filter_map(|resources| resources.limits.as_ref().or(resources.requests.as_ref()))
                .map(accelerator_count)
                .sum()
        })
        .unwrap_or(0);
    let owner = pod.metadata.owner_references.as_ref().and_then(|owners| {
        owners
            .iter()
            .find(|owner| owner.controller == Some(true))
            .or_else(|| owners.first())
            .map(|owner| OwnerRef {
                api_version: owner.api_version.clone(),
                kind: owner.kind.clone(),
                name: owner.name.clone(),
            })
    });

    PodInfo {
        node: pod.spec.as_ref().and_then(|spec| spec.node_name.clone()),
        phase: pod
            .status
            .as_ref()
            .and_then(|status| status.phase.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
        status: pod_status_reason(pod),
        ready_containers,
        total_containers,
        restarts: u32::try_from(restarts.max(0)).unwrap_or(u32::MAX),
        containers,
        cpu_millis: usage.get(&key).map(|(cpu, _)| *cpu),
        memory_bytes: usage.get(&key).map(|(_, memory)| *memory),
        accelerators,
        network_rx_bytes: None,
        network_tx_bytes: None,
        network_sampled_at: None,
        owner,
        created_at: pod
            .metadata
            .creation_timestamp
            .as_ref()
            .and_then(|time| to_utc(time.0)),
        namespace,
        name,
    }
}

/// Status column as kubectl prints it: the most specific container reason wins.
fn pod_status_reason(pod: &Pod) -> String {
    if pod.metadata.deletion_timestamp.is_some() {
        return "Terminating".to_string();
    }
    let status = pod.status.as_ref();
    let phase = status
        .and_then(|status| status.phase.clone())
        .unwrap_or_else(|| "Unknown".to_string());
    if let Some(reason) = status.and_then(|status| status.reason.clone()) {
        return reason;
    }

    let container_statuses = status
        .and_then(|status| status.container_statuses.as_ref())
        .into_iter()
        .flatten();
    for container in container_statuses {
        let Some(state) = container.state.as_ref() else {
            continue;
        };
        if let Some(reason) = state
            .waiting
            .as_ref()
            .and_then(|waiting| waiting.reason.clone())
        {
            return reason;
        }
        if phase != "Succeeded"
            && let Some(reason) = state
                .terminated
                .as_ref()
                .and_then(|terminated| terminated.reason.clone())
        {
            return reason;
        }
    }
    phase
}

fn accelerator_count(resources: &BTreeMap<String, Quantity>) -> u64 {
    ACCELERATOR_RESOURCES
        .iter()
        .filter_map(|name| resources.get(*name))
        .filter_map(|quantity| quantity.0.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite() && *value > 0.0)
        .map(|value| value.floor() as u64)
        .sum()
}

fn deployment_info(deployment: &Deployment) -> DeploymentInfo {
    let status = deployment.status.as_ref();
    DeploymentInfo {
        namespace: deployment.namespace().unwrap_or_default(),
        name: deployment.name_any(),
        replicas: deployment
            .spec
            .as_ref()
            .and_then(|spec| spec.replicas)
            .unwrap_or(1),
        ready: status.and_then(|status| status.ready_replicas).unwrap_or(0),
        updated: status
            .and_then(|status| status.updated_replicas)
            .unwrap_or(0),
        available: status
            .and_then(|status| status.available_replicas)
            .unwrap_or(0),
        created_at: deployment
            .metadata
            .creation_timestamp
            .as_ref()
            .and_then(|time| to_utc(time.0)),
    }
}

fn stateful_set_info(set: &StatefulSet) -> StatefulSetInfo {
    StatefulSetInfo {
        namespace: set.namespace().unwrap_or_default(),
        name: set.name_any(),
        replicas: set
            .spec
            .as_ref()
            .and_then(|spec| spec.replicas)
            .unwrap_or(1),
        ready: set
            .status
            .as_ref()
            .and_then(|status| status.ready_replicas)
            .unwrap_or(0),
        created_at: set
            .metadata
            .creation_timestamp
            .as_ref()
            .and_then(|time| to_utc(time.0)),
    }
}

fn daemon_set_info(set: &DaemonSet) -> DaemonSetInfo {
    let status = set.status.as_ref();
    DaemonSetInfo {
        namespace: set.namespace().unwrap_or_default(),
        name: set.name_any(),
        desired: status
            .map(|status| status.desired_number_scheduled)
            .unwrap_or(0),
        ready: status.map(|status| status.number_ready).unwrap_or(0),
        available: status
            .and_then(|status| status.number_available)
            .unwrap_or(0),
        created_at: set
            .metadata
            .creation_timestamp
            .as_ref()
            .and_then(|time| to_utc(time.0)),
    }
}

fn job_info(job: &Job) -> JobInfo {
    let status = job.status.as_ref();
    JobInfo {
        namespace: job.namespace().unwrap_or_default(),
        name: job.name_any(),
        completions: job
            .spec
            .as_ref()
            .and_then(|spec| spec.completions)
            .unwrap_or(1),
        succeeded: status.and_then(|status| status.succeeded).unwrap_or(0),
        failed: status.and_then(|status| status.failed).unwrap_or(0),
        active: status.and_then(|status| status.active).unwrap_or(0),
        created_at: job
            .metadata
            .creation_timestamp
            .as_ref()
            .and_then(|time| to_utc(time.0)),
    }
}

fn service_info(service: &Service) -> ServiceInfo {
    let spec = service.spec.as_ref();
    ServiceInfo {
        namespace: service.namespace().unwrap_or_default(),
        name: service.name_any(),
        service_type: spec
            .and_then(|spec| spec.type_.clone())
            .unwrap_or_else(|| "ClusterIP".to_string()),
        cluster_ip: spec
            .and_then(|spec| spec.cluster_ip.clone())
            .unwrap_or_else(|| "-".to_string()),
        ports: service_ports_summary(service),
        created_at: service
            .metadata
            .creation_timestamp
            .as_ref()
            .and_then(|time| to_utc(time.0)),
    }
}

fn pvc_info(claim: &PersistentVolumeClaim) -> PvcInfo {
    let spec = claim.spec.as_ref();
    let status = claim.status.as_ref();
    PvcInfo {
        namespace: claim.namespace().unwrap_or_default(),
        name: claim.name_any(),
        status: status
            .and_then(|status| status.phase.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
        volume: spec
            .and_then(|spec| spec.volume_name.clone())
            .unwrap_or_else(|| "-".to_string()),
        capacity_bytes: status
            .and_then(|status| status.capacity.as_ref())
            .and_then(|capacity| capacity.get("storage"))
            .and_then(|quantity| parse_memory_bytes(&quantity.0))
            .unwrap_or(0),
        storage_class: spec
            .and_then(|spec| spec.storage_class_name.clone())
            .unwrap_or_else(|| "-".to_string()),
        created_at: claim
            .metadata
            .creation_timestamp
            .as_ref()
            .and_then(|time| to_utc(time.0)),
    }
}

fn event_info(event: &Event) -> EventInfo {
    let kind = event.involved_object.kind.as_deref().unwrap_or("-");
    let object = event.involved_object.name.as_deref().unwrap_or("-");
    EventInfo {
        namespace: event.namespace().unwrap_or_default(),
        name: event.name_any(),
        event_type: event.type_.clone().unwrap_or_else(|| "-".to_string()),
        reason: event.reason.clone().unwrap_or_else(|| "-".to_string()),
        object: format!("{kind}/{object}"),
        message: event.message.clone().unwrap_or_default(),
        count: event.count.unwrap_or(1),
        last_seen: event_last_seen(event),
    }
}

fn event_last_seen(event: &Event) -> Option<DateTime<Utc>> {
    event
        .event_time
        .as_ref()
        .map(|time| time.0)
        .or_else(|| event.last_timestamp.as_ref().map(|time| time.0))
        .or_else(|| event.first_timestamp.as_ref().map(|time| time.0))
        .or_else(|| {
            event
                .metadata
                .creation_timestamp
                .as_ref()
                .map(|time| time.0)
        })
        .and_then(to_utc)
}

fn json_i32(value: &Value, pointer: &str) -> i32 {
    value
        .pointer(pointer)
        .and_then(Value::as_i64)
        .and_then(|number| i32::try_from(number).ok())
        .unwrap_or(0)
}

fn json_str(value: &Value, pointer: &str, fallback: &str) -> String {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .unwrap_or(fallback)
        .to_string()
}

fn created_at(object: &DynamicObject) -> Option<DateTime<Utc>> {
    object
        .metadata
        .creation_timestamp
        .as_ref()
        .and_then(|time| to_utc(time.0))
}

fn volcano_job_info(object: &DynamicObject) -> VolcanoJobInfo {
    let data = &object.data;
    VolcanoJobInfo {
        namespace: object.namespace().unwrap_or_default(),
        name: object.name_any(),
        queue: json_str(data, "/spec/queue", "default"),
        phase: json_str(data, "/status/state/phase", "Pending"),
        min_available: json_i32(data, "/spec/minAvailable"),
        running: json_i32(data, "/status/running"),
        pending: json_i32(data, "/status/pending"),
        succeeded: json_i32(data, "/status/succeeded"),
        failed: json_i32(data, "/status/failed"),
        created_at: created_at(object),
    }
}

fn queue_info(object: &DynamicObject) -> QueueInfo {
    let data = &object.data;
    QueueInfo {
        name: object.name_any(),
        state: json_str(data, "/status/state", "Unknown"),
        weight: json_i32(data, "/spec/weight"),
        running: json_i32(data, "/status/running"),
        pending: json_i32(data, "/status/pending"),
        inqueue: json_i32(data, "/status/inqueue"),
        created_at: created_at(object),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsSummary {
    #[serde(default)]
    node: NodeStats,
    #[serde(default)]
    pods: Vec<PodStats>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct NodeStats {
    #[serde(default)]
    network: Option<NetworkStats>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodStats {
    pod_ref: PodRef,
    #[serde(default)]
    network: Option<NetworkStats>,
}

#[derive(Debug, Clone, Deserialize)]
struct PodRef {
    name: String,
    namespace: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NetworkStats {
    #[serde(default)]
    time: Option<DateTime<Utc>>,
    #[serde(default)]
    rx_bytes: Option<u64>,
    #[serde(default)]
    tx_bytes: Option<u64>,
}

fn apply_network_stats(snapshot: &mut Snapshot, node_name: &str, summary: &StatsSummary) {
    if let Some(network) = summary.node.network.as_ref()
        && let Some(node) = snapshot.nodes.iter_mut().find(|node| node.name == node_name)
    {
        node.network_rx_bytes = network.rx_bytes;
        node.network_tx_bytes = network.tx_bytes;
        node.network_sampled_at = network.time;
    }

    let by_key = summary
        .pods
        .iter()
        .filter_map(|pod| {
            pod.network
                .as_ref()
                .map(|network| ((pod.pod_ref.namespace.as_str(), pod.pod_ref.name.as_str()), network))
        })
        .collect::<HashMap<_, _>>();
    for pod in &mut snapshot.pods {
        if let Some(network) = by_key.get(&(pod.namespace.as_str(), pod.name.as_str())) {
            pod.network_rx_bytes = network.rx_bytes;
            pod.network_tx_bytes = network.tx_bytes;
            pod.network_sampled_at = network.time;
        }
    }
}

fn parse_pod_metrics_usage(data: &Value) -> (u64, u64) {
    let Some(containers) = data.get("containers").and_then(Value::as_array) else {
        return (0, 0);
    };

    containers
        .iter()
        .fold((0u64, 0u64), |(cpu, memory), container| {
            let (container_cpu, container_memory) = container
                .get("usage")
                .map(parse_usage_from_value)
                .unwrap_or((0, 0));
            (
                cpu.saturating_add(container_cpu),
                memory.saturating_add(container_memory),
            )
        })
}

fn parse_usage_from_value(value: &Value) -> (u64, u64) {
    let cpu = value
        .get("cpu")
        .and_then(Value::as_str)
        .and_then(parse_cpu_millicores)
        .unwrap_or(0);
    let memory = value
        .get("memory")
        .and_then(Value::as_str)
        .and_then(parse_memory_bytes)
        .unwrap_or(0);
    (cpu, memory)
}

fn parse_cpu_millicores(value: &str) -> Option<u64> {
    let raw = value.trim();
    if raw.is_empty() {
        return None;
    }

    let (number, multiplier) = if let Some(number) = raw.strip_suffix('m') {
        (number, 1.0)
    } else if let Some(number) = raw.strip_suffix('u') {
        (number, 0.001)
    } else if let Some(number) = raw.strip_suffix('n') {
        (number, 0.000001)
    } else {
        (raw, 1000.0)
    };

    let numeric = number.parse::<f64>().ok()?;
    let millicores = (numeric * multiplier).round();
    if !millicores.is_finite() || millicores < 0.0 {
        return None;
    }
    Some(millicores as u64)
}

fn parse_memory_bytes(value: &str) -> Option<u64> {
    const BINARY_UNITS: [(&str, f64); 6] = [
        ("Ei", 1_152_921_504_606_846_976.0),
        ("Pi", 1_125_899_906_842_624.0),
        ("Ti", 1_099_511_627_776.0),
        ("Gi", 1_073_741_824.0),
        ("Mi", 1_048_576.0),
        ("Ki", 1_024.0),
    ];
    const DECIMAL_UNITS: [(&str, f64); 6] = [
        ("E", 1_000_000_000_000_000_000.0),
        ("P", 1_000_000_000_000_000.0),
        ("T", 1_000_000_000_000.0),
        ("G", 1_000_000_000.0),
        ("M", 1_000_000.0),
        ("k", 1_000.0),
    ];

    let raw = value.trim();
    if raw.is_empty() {
        return None;
    }

    let scaled = BINARY_UNITS
        .iter()
        .chain(DECIMAL_UNITS.iter())
        .find_map(|(suffix, multiplier)| {
            raw.strip_suffix(suffix)
                .map(|number| (number, *multiplier))
        });
    let (number, multiplier) = match scaled {
        Some(found) => found,
        None => match raw.strip_suffix('m') {
            Some(number) => (number, 0.001),
            None => (raw, 1.0),
        },
    };

    let bytes = (number.parse::<f64>().ok()? * multiplier).round();
    if !bytes.is_finite() || bytes < 0.0 {
        return None;
    }
    Some(bytes as u64)
}

fn list_params() -> ListParams {
    ListParams::default().limit(500)
}

fn service_ports_summary(service: &Service) -> String {
    let ports = service
        .spec
        .as_ref()
        .and_then(|spec| spec.ports.clone())
        .unwrap_or_default();
    if ports.is_empty() {
        return "-".to_string();
    }

    ports
        .into_iter()
        .map(|port| {
            let protocol = port.protocol.unwrap_or_else(|| "TCP".to_string());
            format!("{}/{}", port.port, protocol)
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn pod_readiness(status: &PodStatus) -> (usize, usize, i32) {
    let container_statuses = status.container_statuses.as_deref().unwrap_or(&[]);
    let total = container_statuses.len();
    let ready = container_statuses
        .iter()
        .filter(|container| container.ready)
        .count();
    let restarts = container_statuses
        .iter()
        .map(|container| container.restart_count)
        .sum();

    (ready, total, restarts)
}

fn node_roles(node: &Node) -> String {
    let Some(labels) = node.metadata.labels.as_ref() else {
        return "-".to_string();
    };

    let mut roles = labels
        .keys()
        .filter_map(|key| key.strip_prefix("node-role.kubernetes.io/"))
        .map(|role| {
            if role.is_empty() {
                "worker".to_string()
            } else {
                role.to_string()
            }
        })
        .collect::<Vec<_>>();

    if roles.is_empty()
        && let Some(role) = labels.get("kubernetes.io/role")
    {
        roles.push(role.clone());
    }

    if roles.is_empty() {
        "-".to_string()
    } else {
        roles.sort();
        roles.dedup();
        roles.join(",")
    }
}
