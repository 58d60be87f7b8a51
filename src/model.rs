use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize)]
pub enum EntityKind {
    Node,
    Pod,
    Deployment,
    StatefulSet,
    DaemonSet,
    Job,
    VolcanoJob,
    Queue,
    Service,
    PersistentVolumeClaim,
    Event,
}

impl EntityKind {
    pub fn title(self) -> &'static str {
        match self {
            Self::Node => "Node",
            Self::Pod => "Pod",
            Self::Deployment => "Deployment",
            Self::StatefulSet => "StatefulSet",
            Self::DaemonSet => "DaemonSet",
            Self::Job => "Job",
            Self::VolcanoJob => "VolcanoJob",
            Self::Queue => "Queue",
            Self::Service => "Service",
            Self::PersistentVolumeClaim => "PVC",
            Self::Event => "Event",
        }
    }

    pub fn kubectl_resource(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Pod => "pod",
            Self::Deployment => "deployment",
            Self::StatefulSet => "statefulset",
            Self::DaemonSet => "daemonset",
            Self::Job => "job.batch",
            Self::VolcanoJob => "job.batch.volcano.sh",
            Self::Queue => "queue.scheduling.volcano.sh",
            Self::Service => "service",
            Self::PersistentVolumeClaim => "pvc",
            Self::Event => "event",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "node" | "nodes" | "no" => Some(Self::Node),
            "pod" | "pods" | "po" => Some(Self::Pod),
            "deploy" | "deployment" | "deployments" => Some(Self::Deployment),
            "sts" | "statefulset" | "statefulsets" => Some(Self::StatefulSet),
            "ds" | "daemonset" | "daemonsets" => Some(Self::DaemonSet),
            "job" | "jobs" => Some(Self::Job),
            "vcjob" | "vj" | "volcanojob" | "volcanojobs" => Some(Self::VolcanoJob),
            "queue" | "queues" | "q" => Some(Self::Queue),
            "svc" | "service" | "services" => Some(Self::Service),
            "pvc" | "persistentvolumeclaim" | "persistentvolumeclaims" => {
                Some(Self::PersistentVolumeClaim)
            }
            "event" | "events" | "ev" => Some(Self::Event),
            _ => None,
        }
    }
}

/// Stable identity of a resource: node name, or `namespace/name` for
/// namespaced kinds.
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityKey {
    pub fn cluster(kind: EntityKind, name: &str) -> Self {
        Self {
            kind,
            id: name.to_string(),
        }
    }

    pub fn namespaced(kind: EntityKind, namespace: &str, name: &str) -> Self {
        Self {
            kind,
            id: format!("{namespace}/{name}"),
        }
    }

    pub fn node(name: &str) -> Self {
        Self::cluster(EntityKind::Node, name)
    }

    pub fn pod(namespace: &str, name: &str) -> Self {
        Self::namespaced(EntityKind::Pod, namespace, name)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.id.split_once('/').map(|(namespace, _)| namespace)
    }

    pub fn name(&self) -> &str {
        self.id
            .split_once('/')
            .map(|(_, name)| name)
            .unwrap_or(&self.id)
    }
}

impl Display for EntityKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind.kubectl_resource(), self.id)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct OwnerRef {
    pub api_version: String,
    pub kind: String,
    pub name: String,
}

impl OwnerRef {
    pub fn is_batch_job(&self) -> bool {
        self.kind == "Job" && self.api_version.starts_with("batch/")
    }

    pub fn is_volcano_job(&self) -> bool {
        self.kind == "Job" && self.api_version.starts_with("batch.volcano.sh/")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeInfo {
    pub name: String,
    pub ready: bool,
    pub unschedulable: bool,
    pub roles: String,
    pub kubelet_version: String,
    pub cpu_capacity_millis: u64,
    pub memory_capacity_bytes: u64,
    pub cpu_millis: Option<u64>,
    pub memory_bytes: Option<u64>,
    pub accelerator_capacity: u64,
    pub accelerators_allocated: u64,
    pub pod_count: usize,
    pub network_rx_bytes: Option<u64>,
    pub network_tx_bytes: Option<u64>,
    pub network_sampled_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl NodeInfo {
    pub fn status(&self) -> String {
        match (self.ready, self.unschedulable) {
            (true, false) => "Ready".to_string(),
            (true, true) => "Ready,SchedulingDisabled".to_string(),
            (false, false) => "NotReady".to_string(),
            (false, true) => "NotReady,SchedulingDisabled".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PodInfo {
    pub namespace: String,
    pub name: String,
    pub node: Option<String>,
    pub phase: String,
    pub status: String,
    pub ready_containers: usize,
    pub total_containers: usize,
    pub restarts: u32,
    pub containers: Vec<String>,
    pub cpu_millis: Option<u64>,
    pub memory_bytes: Option<u64>,
    pub accelerators: u64,
    pub network_rx_bytes: Option<u64>,
    pub network_tx_bytes: Option<u64>,
    pub network_sampled_at: Option<DateTime<Utc>>,
    pub owner: Option<OwnerRef>,
    pub created_at: Option<DateTime<Utc>>,
}

impl PodInfo {
    pub fn is_owned_by_job(&self, job: &JobInfo) -> bool {
        self.namespace == job.namespace
            && self
                .owner
                .as_ref()
                .is_some_and(|owner| owner.is_batch_job() && owner.name == job.name)
    }

    pub fn is_owned_by_volcano_job(&self, job: &VolcanoJobInfo) -> bool {
        self.namespace == job.namespace
            && self
                .owner
                .as_ref()
                .is_some_and(|owner| owner.is_volcano_job() && owner.name == job.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeploymentInfo {
    pub namespace: String,
    pub name: String,
    pub replicas: i32,
    pub ready: i32,
    pub updated: i32,
    pub available: i32,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatefulSetInfo {
    pub namespace: String,
    pub name: String,
    pub replicas: i32,
    pub ready: i32,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DaemonSetInfo {
    pub namespace: String,
    pub name: String,
    pub desired: i32,
    pub ready: i32,
    pub available: i32,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobInfo {
    pub namespace: String,
    pub name: String,
    pub completions: i32,
    pub succeeded: i32,
    pub failed: i32,
    pub active: i32,
    pub created_at: Option<DateTime<Utc>>,
}

impl JobInfo {
    pub fn status(&self) -> &'static str {
        if self.completions > 0 && self.succeeded >= self.completions {
            "Complete"
        } else if self.active > 0 {
            "Running"
        } else if self.failed > 0 {
            "Failed"
        } else {
            "Pending"
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VolcanoJobInfo {
    pub namespace: String,
    pub name: String,
    pub queue: String,
    pub phase: String,
    pub min_available: i32,
    pub running: i32,
    pub pending: i32,
    pub succeeded: i32,
    pub failed: i32,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueInfo {
    pub name: String,
    pub state: String,
    pub weight: i32,
    pub running: i32,
    pub pending: i32,
    pub inqueue: i32,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServiceInfo {
    pub namespace: String,
    pub name: String,
    pub service_type: String,
    pub cluster_ip: String,
    pub ports: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PvcInfo {
    pub namespace: String,
    pub name: String,
    pub status: String,
    pub volume: String,
    pub capacity_bytes: u64,
    pub storage_class: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventInfo {
    pub namespace: String,
    pub name: String,
    pub event_type: String,
    pub reason: String,
    pub object: String,
    pub message: String,
    pub count: i32,
    pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    /// Build time stamped by the provider; `None` when the source has no clock.
    pub refreshed_at: Option<DateTime<Utc>>,
    pub nodes: Vec<NodeInfo>,
    pub pods: Vec<PodInfo>,
    pub deployments: Vec<DeploymentInfo>,
    pub stateful_sets: Vec<StatefulSetInfo>,
    pub daemon_sets: Vec<DaemonSetInfo>,
    pub jobs: Vec<JobInfo>,
    pub volcano_jobs: Vec<VolcanoJobInfo>,
    pub queues: Vec<QueueInfo>,
    pub services: Vec<ServiceInfo>,
    pub pvcs: Vec<PvcInfo>,
    pub events: Vec<EventInfo>,
}

impl Snapshot {
    pub fn namespaces(&self) -> Vec<String> {
        let mut namespaces = self
            .pods
            .iter()
            .map(|pod| pod.namespace.clone())
            .chain(self.deployments.iter().map(|item| item.namespace.clone()))
            .chain(self.jobs.iter().map(|item| item.namespace.clone()))
            .chain(self.volcano_jobs.iter().map(|item| item.namespace.clone()))
            .chain(self.services.iter().map(|item| item.namespace.clone()))
            .chain(self.pvcs.iter().map(|item| item.namespace.clone()))
            .collect::<Vec<_>>();
        namespaces.sort();
        namespaces.dedup();
        namespaces
    }

    pub fn find_pod(&self, key: &EntityKey) -> Option<&PodInfo> {
        self.pods.iter().find(|pod| &pod.key() == key)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Warning,
    Critical,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Self::Warning => "Warning",
            Self::Critical => "Critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertInfo {
    pub severity: Severity,
    pub target: EntityKey,
    pub reason: String,
    pub message: String,
}

const RESTART_ALERT_THRESHOLD: u32 = 5;

pub fn derive_alerts(snapshot: &Snapshot) -> Vec<AlertInfo> {
    let mut alerts = Vec::new();

    for node in &snapshot.nodes {
        if !node.ready {
            alerts.push(AlertInfo {
                severity: Severity::Critical,
                target: node.key(),
                reason: "NodeNotReady".to_string(),
                message: format!("node {} is not ready", node.name),
            });
        }
    }

    for pod in &snapshot.pods {
        let alert = if pod.phase == "Failed" || pod.status == "CrashLoopBackOff" {
            Some((Severity::Critical, pod.status.clone()))
        } else if pod.restarts > RESTART_ALERT_THRESHOLD {
            Some((Severity::Warning, "HighRestarts".to_string()))
        } else if pod.phase == "Pending" {
            Some((Severity::Warning, "Pending".to_string()))
        } else {
            None
        };
        if let Some((severity, reason)) = alert {
            alerts.push(AlertInfo {
                severity,
                target: pod.key(),
                message: format!(
                    "pod {}/{} {} ({} restarts)",
                    pod.namespace, pod.name, pod.status, pod.restarts
                ),
                reason,
            });
        }
    }

    for job in &snapshot.volcano_jobs {
        if matches!(job.phase.as_str(), "Failed" | "Aborted") {
            alerts.push(AlertInfo {
                severity: Severity::Critical,
                target: job.key(),
                reason: format!("VolcanoJob{}", job.phase),
                message: format!("volcano job {}/{} is {}", job.namespace, job.name, job.phase),
            });
        }
    }

    for pvc in &snapshot.pvcs {
        if pvc.status == "Pending" {
            alerts.push(AlertInfo {
                severity: Severity::Warning,
                target: pvc.key(),
                reason: "PvcPending".to_string(),
                message: format!("claim {}/{} is pending", pvc.namespace, pvc.name),
            });
        }
    }

    for event in &snapshot.events {
        if event.event_type == "Warning" {
            alerts.push(AlertInfo {
                severity: Severity::Warning,
                target: event.key(),
                reason: event.reason.clone(),
                message: format!("{}: {}", event.object, event.message),
            });
        }
    }

    alerts
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum SortField {
    Name,
    Namespace,
    Status,
    Restarts,
    Cpu,
    Memory,
    Accelerators,
    Pods,
    Age,
    Type,
    Capacity,
    Count,
    LastSeen,
    Severity,
    Running,
    Pending,
}

impl SortField {
    pub fn label(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Namespace => "namespace",
            Self::Status => "status",
            Self::Restarts => "restarts",
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::Accelerators => "accel",
            Self::Pods => "pods",
            Self::Age => "age",
            Self::Type => "type",
            Self::Capacity => "capacity",
            Self::Count => "count",
            Self::LastSeen => "last-seen",
            Self::Severity => "severity",
            Self::Running => "running",
            Self::Pending => "pending",
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Eq, PartialEq, PartialOrd, Ord)]
pub enum SortKey {
    Text(String),
    Number(u64),
    /// Seconds since epoch; missing times sort as oldest.
    Time(i64),
}

fn time_key(time: Option<DateTime<Utc>>) -> SortKey {
    SortKey::Time(time.map(|value| value.timestamp()).unwrap_or(i64::MIN))
}

fn clamp_count(value: i32) -> u64 {
    value.max(0) as u64
}

pub trait Listed {
    fn key(&self) -> EntityKey;

    fn namespace(&self) -> Option<&str>;

    fn search_fields(&self) -> Vec<&str>;

    fn sort_key(&self, field: SortField) -> SortKey;

    fn matches_search(&self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            return true;
        }

        let query_lower = query.to_ascii_lowercase();
        self.search_fields()
            .iter()
            .any(|field| field.to_ascii_lowercase().contains(&query_lower))
    }
}

/// Applies namespace filter, list search and sort in that order.
pub fn filter_sort<'a, T: Listed>(
    items: &'a [T],
    namespace: Option<&str>,
    search: &str,
    sort: Option<(SortField, SortOrder)>,
) -> Vec<&'a T> {
    let mut visible = items
        .iter()
        .filter(|item| match (namespace, item.namespace()) {
            (Some(wanted), Some(actual)) => wanted == actual,
            (Some(_), None) => true,
            (None, _) => true,
        })
        .filter(|item| item.matches_search(search))
        .collect::<Vec<_>>();

    if let Some((field, order)) = sort {
        visible.sort_by(|left, right| {
            let ordering = left
                .sort_key(field)
                .cmp(&right.sort_key(field))
                .then_with(|| left.key().cmp(&right.key()));
            match order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
    }

    visible
}

impl Listed for NodeInfo {
    fn key(&self) -> EntityKey {
        EntityKey::node(&self.name)
    }

    fn namespace(&self) -> Option<&str> {
        None
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![self.name.as_str(), self.roles.as_str()]
    }

    fn sort_key(&self, field: SortField) -> SortKey {
        match field {
            SortField::Cpu => SortKey::Number(self.cpu_millis.unwrap_or(0)),
            SortField::Memory => SortKey::Number(self.memory_bytes.unwrap_or(0)),
            SortField::Accelerators => SortKey::Number(self.accelerators_allocated),
            SortField::Pods => SortKey::Number(self.pod_count as u64),
            SortField::Status => SortKey::Text(self.status()),
            SortField::Age => time_key(self.created_at),
            _ => SortKey::Text(self.name.clone()),
        }
    }
}

impl Listed for PodInfo {
    fn key(&self) -> EntityKey {
        EntityKey::pod(&self.namespace, &self.name)
    }

    fn namespace(&self) -> Option<&str> {
        Some(&self.namespace)
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![
            self.name.as_str(),
            self.namespace.as_str(),
            self.status.as_str(),
        ];
        if let Some(node) = &self.node {
            fields.push(node.as_str());
        }
        fields
    }

    fn sort_key(&self, field: SortField) -> SortKey {
        match field {
            SortField::Namespace => SortKey::Text(format!("{}/{}", self.namespace, self.name)),
            SortField::Status => SortKey::Text(self.status.clone()),
            SortField::Restarts => SortKey::Number(u64::from(self.restarts)),
            SortField::Cpu => SortKey::Number(self.cpu_millis.unwrap_or(0)),
            SortField::Memory => SortKey::Number(self.memory_bytes.unwrap_or(0)),
            SortField::Accelerators => SortKey::Number(self.accelerators),
            SortField::Age => time_key(self.created_at),
            _ => SortKey::Text(self.name.clone()),
        }
    }
}

macro_rules! namespaced_listed {
    ($ty:ty, $kind:expr, $status:ident) => {
        impl Listed for $ty {
            fn key(&self) -> EntityKey {
                EntityKey::namespaced($kind, &self.namespace, &self.name)
            }

            fn namespace(&self) -> Option<&str> {
                Some(&self.namespace)
            }

            fn search_fields(&self) -> Vec<&str> {
                vec![self.name.as_str(), self.namespace.as_str(), $status(self)]
            }

            fn sort_key(&self, field: SortField) -> SortKey {
                match field {
                    SortField::Namespace => {
                        SortKey::Text(format!("{}/{}", self.namespace, self.name))
                    }
                    SortField::Age => time_key(self.created_at),
                    _ => SortKey::Text(self.name.clone()),
                }
            }
        }
    };
}

fn no_status<T>(_: &T) -> &str {
    ""
}

fn job_status(job: &JobInfo) -> &str {
    job.status()
}

namespaced_listed!(DeploymentInfo, EntityKind::Deployment, no_status);
namespaced_listed!(StatefulSetInfo, EntityKind::StatefulSet, no_status);
namespaced_listed!(DaemonSetInfo, EntityKind::DaemonSet, no_status);
namespaced_listed!(JobInfo, EntityKind::Job, job_status);

impl Listed for VolcanoJobInfo {
    fn key(&self) -> EntityKey {
        EntityKey::namespaced(EntityKind::VolcanoJob, &self.namespace, &self.name)
    }

    fn namespace(&self) -> Option<&str> {
        Some(&self.namespace)
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![
            self.name.as_str(),
            self.namespace.as_str(),
            self.queue.as_str(),
            self.phase.as_str(),
        ]
    }

    fn sort_key(&self, field: SortField) -> SortKey {
        match field {
            SortField::Namespace => SortKey::Text(format!("{}/{}", self.namespace, self.name)),
            SortField::Status => SortKey::Text(self.phase.clone()),
            SortField::Running => SortKey::Number(clamp_count(self.running)),
            SortField::Pending => SortKey::Number(clamp_count(self.pending)),
            SortField::Age => time_key(self.created_at),
            _ => SortKey::Text(self.name.clone()),
        }
    }
}

impl Listed for QueueInfo {
    fn key(&self) -> EntityKey {
        EntityKey::cluster(EntityKind::Queue, &self.name)
    }

    fn namespace(&self) -> Option<&str> {
        None
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![self.name.as_str(), self.state.as_str()]
    }

    fn sort_key(&self, field: SortField) -> SortKey {
        match field {
            SortField::Running => SortKey::Number(clamp_count(self.running)),
            SortField::Pending => SortKey::Number(clamp_count(self.pending)),
            SortField::Status => SortKey::Text(self.state.clone()),
            SortField::Age => time_key(self.created_at),
            _ => SortKey::Text(self.name.clone()),
        }
    }
}

impl Listed for ServiceInfo {
    fn key(&self) -> EntityKey {
        EntityKey::namespaced(EntityKind::Service, &self.namespace, &self.name)
    }

    fn namespace(&self) -> Option<&str> {
        Some(&self.namespace)
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![
            self.name.as_str(),
            self.namespace.as_str(),
            self.service_type.as_str(),
            self.cluster_ip.as_str(),
        ]
    }

    fn sort_key(&self, field: SortField) -> SortKey {
        match field {
            SortField::Namespace => SortKey::Text(format!("{}/{}", self.namespace, self.name)),
            SortField::Type => SortKey::Text(self.service_type.clone()),
            SortField::Age => time_key(self.created_at),
            _ => SortKey::Text(self.name.clone()),
        }
    }
}

impl Listed for PvcInfo {
    fn key(&self) -> EntityKey {
        EntityKey::namespaced(EntityKind::PersistentVolumeClaim, &self.namespace, &self.name)
    }

    fn namespace(&self) -> Option<&str> {
        Some(&self.namespace)
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![
            self.name.as_str(),
            self.namespace.as_str(),
            self.status.as_str(),
            self.storage_class.as_str(),
        ]
    }

    fn sort_key(&self, field: SortField) -> SortKey {
        match field {
            SortField::Namespace => SortKey::Text(format!("{}/{}", self.namespace, self.name)),
            SortField::Status => SortKey::Text(self.status.clone()),
            SortField::Capacity => SortKey::Number(self.capacity_bytes),
            SortField::Age => time_key(self.created_at),
            _ => SortKey::Text(self.name.clone()),
        }
    }
}

impl Listed for EventInfo {
    fn key(&self) -> EntityKey {
        EntityKey::namespaced(EntityKind::Event, &self.namespace, &self.name)
    }

    fn namespace(&self) -> Option<&str> {
        Some(&self.namespace)
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![
            self.namespace.as_str(),
            self.reason.as_str(),
            self.object.as_str(),
            self.message.as_str(),
            self.event_type.as_str(),
        ]
    }

    fn sort_key(&self, field: SortField) -> SortKey {
        match field {
            SortField::Type => SortKey::Text(self.event_type.clone()),
            SortField::Count => SortKey::Number(clamp_count(self.count)),
            SortField::LastSeen => time_key(self.last_seen),
            _ => SortKey::Text(self.name.clone()),
        }
    }
}

impl Listed for AlertInfo {
    fn key(&self) -> EntityKey {
        self.target.clone()
    }

    fn namespace(&self) -> Option<&str> {
        self.target.namespace()
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![
            self.target.id.as_str(),
            self.reason.as_str(),
            self.message.as_str(),
        ]
    }

    fn sort_key(&self, field: SortField) -> SortKey {
        match field {
            SortField::Severity => SortKey::Number(match self.severity {
                Severity::Warning => 0,
                Severity::Critical => 1,
            }),
            _ => SortKey::Text(self.target.id.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ViewState {
    Overview,
    Nodes,
    Pods,
    Workloads,
    Network,
    Storage,
    Events,
    Alerts,
    Queues,
    Topology,
    NodeDetail,
    PodDetail,
    DeploymentDetail,
    StatefulSetDetail,
    DaemonSetDetail,
    JobDetail,
    VolcanoJobDetail,
    QueueDetail,
    ServiceDetail,
    PvcDetail,
    EventDetail,
}

impl ViewState {
    pub const PRIMARY: [Self; 10] = [
        Self::Overview,
        Self::Nodes,
        Self::Pods,
        Self::Workloads,
        Self::Network,
        Self::Storage,
        Self::Events,
        Self::Alerts,
        Self::Queues,
        Self::Topology,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::Overview => "Overview",
            Self::Nodes => "Nodes",
            Self::Pods => "Pods",
            Self::Workloads => "Workloads",
            Self::Network => "Network",
            Self::Storage => "Storage",
            Self::Events => "Events",
            Self::Alerts => "Alerts",
            Self::Queues => "Queues",
            Self::Topology => "Topology",
            Self::NodeDetail => "Node",
            Self::PodDetail => "Pod",
            Self::DeploymentDetail => "Deployment",
            Self::StatefulSetDetail => "StatefulSet",
            Self::DaemonSetDetail => "DaemonSet",
            Self::JobDetail => "Job",
            Self::VolcanoJobDetail => "VolcanoJob",
            Self::QueueDetail => "Queue",
            Self::ServiceDetail => "Service",
            Self::PvcDetail => "PVC",
            Self::EventDetail => "Event",
        }
    }

    pub fn from_select(n: u8) -> Option<Self> {
        match n {
            1..=9 => Some(Self::PRIMARY[usize::from(n) - 1]),
            0 => Some(Self::Topology),
            _ => None,
        }
    }

    pub fn is_detail(self) -> bool {
        !Self::PRIMARY.contains(&self)
    }

    pub fn detail_for(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Node => Self::NodeDetail,
            EntityKind::Pod => Self::PodDetail,
            EntityKind::Deployment => Self::DeploymentDetail,
            EntityKind::StatefulSet => Self::StatefulSetDetail,
            EntityKind::DaemonSet => Self::DaemonSetDetail,
            EntityKind::Job => Self::JobDetail,
            EntityKind::VolcanoJob => Self::VolcanoJobDetail,
            EntityKind::Queue => Self::QueueDetail,
            EntityKind::Service => Self::ServiceDetail,
            EntityKind::PersistentVolumeClaim => Self::PvcDetail,
            EntityKind::Event => Self::EventDetail,
        }
    }

    /// List view a detail view belongs to when no origin was recorded.
    pub fn owning_list(self) -> Self {
        match self {
            Self::NodeDetail => Self::Nodes,
            Self::PodDetail => Self::Pods,
            Self::DeploymentDetail
            | Self::StatefulSetDetail
            | Self::DaemonSetDetail
            | Self::JobDetail
            | Self::VolcanoJobDetail => Self::Workloads,
            Self::QueueDetail => Self::Queues,
            Self::ServiceDetail => Self::Network,
            Self::PvcDetail => Self::Storage,
            Self::EventDetail => Self::Events,
            primary => primary,
        }
    }

    pub fn sort_cycle(self) -> &'static [(SortField, SortOrder)] {
        use SortField as F;
        use SortOrder::{Asc, Desc};
        match self {
            Self::Nodes => &[
                (F::Name, Asc),
                (F::Cpu, Desc),
                (F::Memory, Desc),
                (F::Accelerators, Desc),
                (F::Pods, Desc),
                (F::Age, Desc),
            ],
            Self::Pods => &[
                (F::Name, Asc),
                (F::Namespace, Asc),
                (F::Status, Asc),
                (F::Restarts, Desc),
                (F::Cpu, Desc),
                (F::Memory, Desc),
                (F::Age, Desc),
            ],
            Self::Workloads => &[(F::Name, Asc), (F::Namespace, Asc), (F::Age, Desc)],
            Self::Network => &[(F::Name, Asc), (F::Namespace, Asc), (F::Type, Asc)],
            Self::Storage => &[
                (F::Name, Asc),
                (F::Namespace, Asc),
                (F::Status, Asc),
                (F::Capacity, Desc),
            ],
            Self::Events => &[(F::LastSeen, Desc), (F::Type, Asc), (F::Count, Desc)],
            Self::Alerts => &[(F::Severity, Desc), (F::Name, Asc)],
            Self::Queues => &[(F::Name, Asc), (F::Running, Desc), (F::Pending, Desc)],
            Self::Topology => &[(F::Name, Asc)],
            _ => &[],
        }
    }
}

impl Display for ViewState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.title())
    }
}

pub fn format_cpu_millicores(value: u64) -> String {
    if value >= 1000 {
        let whole = value / 1000;
        let decimal = ((value % 1000) + 50) / 100;
        if decimal == 0 {
            format!("{whole}c")
        } else if decimal == 10 {
            format!("{}c", whole + 1)
        } else {
            format!("{whole}.{decimal}c")
        }
    } else {
        format!("{value}m")
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [(&str, u64); 6] = [
        ("Ei", 1_152_921_504_606_846_976),
        ("Pi", 1_125_899_906_842_624),
        ("Ti", 1_099_511_627_776),
        ("Gi", 1_073_741_824),
        ("Mi", 1_048_576),
        ("Ki", 1_024),
    ];

    if bytes == 0 {
        return "0B".to_string();
    }

    for (suffix, unit) in UNITS {
        if bytes >= unit {
            let whole = bytes / unit;
            let decimal = ((bytes % unit) * 10) / unit;
            if decimal == 0 {
                return format!("{whole}{suffix}");
            }
            return format!("{whole}.{decimal}{suffix}");
        }
    }

    format!("{bytes}B")
}

pub fn format_rate(bytes_per_second: f64) -> String {
    if !bytes_per_second.is_finite() || bytes_per_second <= 0.0 {
        return "0B/s".to_string();
    }
    format!("{}/s", format_bytes(bytes_per_second.round() as u64))
}

pub fn format_optional_cpu(value: Option<u64>) -> String {
    value.map(format_cpu_millicores).unwrap_or_else(|| "-".to_string())
}

pub fn format_optional_bytes(value: Option<u64>) -> String {
    value.map(format_bytes).unwrap_or_else(|| "-".to_string())
}

pub fn human_age(timestamp: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(timestamp) = timestamp else {
        return "-".to_string();
    };
    format_elapsed_seconds((now - timestamp).num_seconds().max(0))
}

fn format_elapsed_seconds(seconds: i64) -> String {
    if seconds >= 86_400 {
        return format!("{}d", seconds / 86_400);
    }

    if seconds >= 3_600 {
        return format!("{}h", seconds / 3_600);
    }

    if seconds >= 60 {
        return format!("{}m", seconds / 60);
    }

    format!("{seconds}s")
}

#[cfg(test)]
mod tests {
    use super::{
        EntityKey, EntityKind, Listed, PodInfo, Snapshot, SortField, SortOrder, ViewState,
        derive_alerts, filter_sort, format_bytes, format_cpu_millicores, format_rate, human_age,
    };
    use chrono::{Duration, Utc};

    fn pod(namespace: &str, name: &str, restarts: u32) -> PodInfo {
        PodInfo {
            namespace: namespace.to_string(),
            name: name.to_string(),
            phase: "Running".to_string(),
            status: "Running".to_string(),
            restarts,
            ..PodInfo::default()
        }
    }

    #[test]
    fn entity_key_splits_namespace_and_name() {
        let key = EntityKey::pod("batch", "trainer-0");
        assert_eq!(key.id, "batch/trainer-0");
        assert_eq!(key.namespace(), Some("batch"));
        assert_eq!(key.name(), "trainer-0");
        assert_eq!(EntityKey::node("gpu-1").namespace(), None);
    }

    #[test]
    fn kind_aliases_map_to_expected_kinds() {
        assert_eq!(EntityKind::from_token("vcjob"), Some(EntityKind::VolcanoJob));
        assert_eq!(EntityKind::from_token("svc"), Some(EntityKind::Service));
        assert_eq!(
            EntityKind::from_token("pvc"),
            Some(EntityKind::PersistentVolumeClaim)
        );
        assert_eq!(EntityKind::from_token("nope"), None);
    }

    #[test]
    fn select_numbers_map_to_primary_views() {
        assert_eq!(ViewState::from_select(1), Some(ViewState::Overview));
        assert_eq!(ViewState::from_select(3), Some(ViewState::Pods));
        assert_eq!(ViewState::from_select(9), Some(ViewState::Queues));
        assert_eq!(ViewState::from_select(0), Some(ViewState::Topology));
        assert_eq!(ViewState::from_select(11), None);
        assert!(ViewState::PodDetail.is_detail());
        assert!(!ViewState::Pods.is_detail());
    }

    #[test]
    fn filter_sort_applies_namespace_search_and_order() {
        let pods = vec![
            pod("a", "web-1", 0),
            pod("b", "web-2", 7),
            pod("a", "db-1", 3),
        ];

        let visible = filter_sort(&pods, Some("a"), "", Some((SortField::Name, SortOrder::Asc)));
        let names = visible.iter().map(|pod| pod.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["db-1", "web-1"]);

        let visible = filter_sort(&pods, None, "WEB", Some((SortField::Restarts, SortOrder::Desc)));
        let names = visible.iter().map(|pod| pod.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["web-2", "web-1"]);
    }

    #[test]
    fn search_matches_node_name_case_insensitively() {
        let item = pod("prod", "Api-Server", 0);
        assert!(item.matches_search("api"));
        assert!(item.matches_search("PROD"));
        assert!(!item.matches_search("worker"));
    }

    #[test]
    fn alerts_flag_crashloop_and_pending_pods() {
        let mut crashing = pod("a", "crash", 12);
        crashing.status = "CrashLoopBackOff".to_string();
        let mut pending = pod("a", "waiting", 0);
        pending.phase = "Pending".to_string();
        pending.status = "Pending".to_string();
        let snapshot = Snapshot {
            pods: vec![crashing, pending, pod("a", "fine", 0)],
            ..Snapshot::default()
        };

        let alerts = derive_alerts(&snapshot);
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].target, EntityKey::pod("a", "crash"));
        assert_eq!(alerts[1].reason, "Pending");
    }

    #[test]
    fn formats_quantities_compactly() {
        assert_eq!(format_cpu_millicores(250), "250m");
        assert_eq!(format_cpu_millicores(1500), "1.5c");
        assert_eq!(format_cpu_millicores(2000), "2c");
        assert_eq!(format_cpu_millicores(1990), "2c");
        assert_eq!(format_bytes(0), "0B");
        assert_eq!(format_bytes(1536), "1.5Ki");
        assert_eq!(format_bytes(3 * 1_073_741_824), "3Gi");
        assert_eq!(format_rate(2048.0), "2Ki/s");
        assert_eq!(format_rate(-1.0), "0B/s");
    }

    #[test]
    fn human_age_uses_largest_unit() {
        let now = Utc::now();
        assert_eq!(human_age(None, now), "-");
        assert_eq!(human_age(Some(now - Duration::seconds(42)), now), "42s");
        assert_eq!(human_age(Some(now - Duration::hours(5)), now), "5h");
        assert_eq!(human_age(Some(now - Duration::days(3)), now), "3d");
    }
}
