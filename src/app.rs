use crate::config::CustomAction;
use crate::history::MetricsHistory;
use crate::input::Action;
use crate::logs::{LOG_REFRESH_PERIOD, LogStream};
use crate::model::{
    AlertInfo, DaemonSetInfo, DeploymentInfo, EntityKey, EntityKind, EventInfo, JobInfo, Listed,
    NodeInfo, PodInfo, PvcInfo, QueueInfo, ServiceInfo, Snapshot, SortField, SortOrder,
    StatefulSetInfo, ViewState, VolcanoJobInfo, derive_alerts, filter_sort, format_bytes,
    format_cpu_millicores, format_optional_bytes, format_optional_cpu, human_age,
};
use crate::provider::{
    ActionKind, ActionRequest, Capabilities, CoreError, ExportRequest, LogRequest, LogTarget,
};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Rows taken by header, tabs, table header and footer around a list.
pub const LIST_RESERVED_ROWS: usize = 7;
/// Rows taken by chrome plus the entity summary above a detail child list.
pub const DETAIL_RESERVED_ROWS: usize = 12;
pub const LOG_RESERVED_ROWS: usize = 5;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum InputMode {
    Normal,
    Filter,
    Search,
    Logs,
    LogsSearch,
    ActionMenu,
    CommandOutput,
}

#[derive(Debug)]
pub enum Event {
    Input(Action),
    SnapshotArrived(Result<Snapshot, CoreError>),
    AsyncResult(AsyncResult),
    Resize { width: u16, height: u16 },
}

#[derive(Debug)]
pub enum AsyncResult {
    Logs {
        target: LogTarget,
        result: Result<String, CoreError>,
    },
    LogTick {
        target: LogTarget,
        generation: u64,
    },
    CommandOutput {
        request_id: u64,
        title: String,
        result: Result<String, CoreError>,
    },
    Exported {
        result: Result<PathBuf, CoreError>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    None,
    ForceRefresh,
    FetchLogs(LogRequest),
    ScheduleLogRefresh {
        target: LogTarget,
        generation: u64,
        after: Duration,
    },
    RunAction(ActionRequest),
    Export(ExportRequest),
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct SelectionState {
    pub selected_index: usize,
    pub scroll_offset: usize,
}

impl SelectionState {
    fn clamp(&mut self, item_count: usize, page_size: usize) {
        let page_size = page_size.max(1);
        self.selected_index = self.selected_index.min(item_count.saturating_sub(1));
        self.scroll_offset = self
            .scroll_offset
            .min(item_count.saturating_sub(page_size));
        if self.selected_index < self.scroll_offset {
            self.scroll_offset = self.selected_index;
        } else if self.selected_index >= self.scroll_offset + page_size {
            self.scroll_offset = self.selected_index + 1 - page_size;
        }
    }
}

/// Entities currently open in a detail view, captured by value at Enter time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetailSlots {
    pub node: Option<NodeInfo>,
    pub pod: Option<PodInfo>,
    pub deployment: Option<DeploymentInfo>,
    pub stateful_set: Option<StatefulSetInfo>,
    pub daemon_set: Option<DaemonSetInfo>,
    pub job: Option<JobInfo>,
    pub volcano_job: Option<VolcanoJobInfo>,
    pub queue: Option<QueueInfo>,
    pub service: Option<ServiceInfo>,
    pub pvc: Option<PvcInfo>,
    pub event: Option<EventInfo>,
}

fn refresh_slot<T: Listed + Clone>(slot: &mut Option<T>, items: &[T]) {
    if let Some(current) = slot.as_ref() {
        let key = current.key();
        if let Some(fresh) = items.iter().find(|item| item.key() == key) {
            *slot = Some(fresh.clone());
        }
    }
}

fn find_by_key<'a, T: Listed>(items: &'a [T], key: &EntityKey) -> Option<&'a T> {
    items.iter().find(|item| &item.key() == key)
}

impl DetailSlots {
    /// Swaps captured entities for their newest version; entities that
    /// disappeared keep their last known state.
    fn refresh(&mut self, snapshot: &Snapshot) {
        refresh_slot(&mut self.node, &snapshot.nodes);
        refresh_slot(&mut self.pod, &snapshot.pods);
        refresh_slot(&mut self.deployment, &snapshot.deployments);
        refresh_slot(&mut self.stateful_set, &snapshot.stateful_sets);
        refresh_slot(&mut self.daemon_set, &snapshot.daemon_sets);
        refresh_slot(&mut self.job, &snapshot.jobs);
        refresh_slot(&mut self.volcano_job, &snapshot.volcano_jobs);
        refresh_slot(&mut self.queue, &snapshot.queues);
        refresh_slot(&mut self.service, &snapshot.services);
        refresh_slot(&mut self.pvc, &snapshot.pvcs);
        refresh_slot(&mut self.event, &snapshot.events);
    }

    fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParentLink {
    JobDetail(EntityKey),
    VolcanoJobDetail(EntityKey),
}

impl ParentLink {
    pub fn key(&self) -> &EntityKey {
        match self {
            Self::JobDetail(key) | Self::VolcanoJobDetail(key) => key,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize)]
pub enum WorkloadSection {
    VolcanoJobs,
    Jobs,
    Deployments,
    StatefulSets,
    DaemonSets,
}

impl WorkloadSection {
    pub const ORDER: [Self; 5] = [
        Self::VolcanoJobs,
        Self::Jobs,
        Self::Deployments,
        Self::StatefulSets,
        Self::DaemonSets,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::VolcanoJobs => "VolcanoJobs",
            Self::Jobs => "Jobs",
            Self::Deployments => "Deployments",
            Self::StatefulSets => "StatefulSets",
            Self::DaemonSets => "DaemonSets",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "kind", content = "item")]
pub enum WorkloadRow<'a> {
    VolcanoJob(&'a VolcanoJobInfo),
    Job(&'a JobInfo),
    Deployment(&'a DeploymentInfo),
    StatefulSet(&'a StatefulSetInfo),
    DaemonSet(&'a DaemonSetInfo),
}

impl WorkloadRow<'_> {
    pub fn key(&self) -> EntityKey {
        match self {
            Self::VolcanoJob(item) => item.key(),
            Self::Job(item) => item.key(),
            Self::Deployment(item) => item.key(),
            Self::StatefulSet(item) => item.key(),
            Self::DaemonSet(item) => item.key(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "kind", content = "item")]
pub enum TopologyRow<'a> {
    Node(&'a NodeInfo),
    Pod(&'a PodInfo),
}

impl TopologyRow<'_> {
    pub fn key(&self) -> EntityKey {
        match self {
            Self::Node(node) => node.key(),
            Self::Pod(pod) => pod.key(),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum MenuAction {
    Describe,
    Yaml,
    Logs,
    Custom(usize),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MenuItem {
    pub label: String,
    pub description: String,
    pub action: MenuAction,
}

#[derive(Debug, Clone)]
struct ActionMenuState {
    target: EntityKey,
    items: Vec<MenuItem>,
    selected: usize,
}

#[derive(Debug, Clone)]
struct CommandOutputState {
    title: String,
    lines: Vec<String>,
    scroll: usize,
}

/// Screen state of the dashboard. Mutated only through [`App::apply`].
#[derive(Debug, Clone)]
pub struct App {
    running: bool,
    view: ViewState,
    mode: InputMode,
    detail_mode: bool,
    detail_origin: ViewState,
    selections: HashMap<ViewState, SelectionState>,
    detail_scroll_offset: usize,
    slots: DetailSlots,
    parent: Option<ParentLink>,
    snapshot: Snapshot,
    alerts: Vec<AlertInfo>,
    history: MetricsHistory,
    logs: LogStream,
    namespace_filter: Option<String>,
    filter_index: usize,
    search: String,
    sort_steps: HashMap<ViewState, usize>,
    capabilities: Capabilities,
    custom_actions: Vec<CustomAction>,
    action_menu: Option<ActionMenuState>,
    command_output: Option<CommandOutputState>,
    next_request_id: u64,
    pending_request: Option<u64>,
    viewport_height: u16,
    banner: Option<String>,
    status: Option<String>,
}

impl App {
    pub fn new(capabilities: Capabilities, namespace: Option<String>) -> Self {
        let mut app = Self {
            running: true,
            view: ViewState::Overview,
            mode: InputMode::Normal,
            detail_mode: false,
            detail_origin: ViewState::Overview,
            selections: HashMap::new(),
            detail_scroll_offset: 0,
            slots: DetailSlots::default(),
            parent: None,
            snapshot: Snapshot::default(),
            alerts: Vec::new(),
            history: MetricsHistory::default(),
            logs: LogStream::default(),
            namespace_filter: namespace.filter(|value| !value.trim().is_empty()),
            filter_index: 0,
            search: String::new(),
            sort_steps: HashMap::new(),
            capabilities,
            custom_actions: Vec::new(),
            action_menu: None,
            command_output: None,
            next_request_id: 0,
            pending_request: None,
            viewport_height: 40,
            banner: None,
            status: None,
        };
        app.logs.set_page_size(app.log_page_size());
        app
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn detail_mode(&self) -> bool {
        self.detail_mode
    }

    /// Tab a detail view was opened from, or the list itself.
    pub fn active_tab(&self) -> ViewState {
        if self.detail_mode && !self.detail_origin.is_detail() {
            self.detail_origin
        } else {
            self.view.owning_list()
        }
    }

    pub fn filter_mode(&self) -> bool {
        self.mode == InputMode::Filter
    }

    pub fn search_mode(&self) -> bool {
        self.mode == InputMode::Search
    }

    pub fn logs_mode(&self) -> bool {
        matches!(self.mode, InputMode::Logs | InputMode::LogsSearch)
    }

    pub fn logs_search_mode(&self) -> bool {
        self.mode == InputMode::LogsSearch
    }

    pub fn action_menu_mode(&self) -> bool {
        self.mode == InputMode::ActionMenu
    }

    pub fn command_output_mode(&self) -> bool {
        self.mode == InputMode::CommandOutput
    }

    pub fn slots(&self) -> &DetailSlots {
        &self.slots
    }

    pub fn parent_link(&self) -> Option<&ParentLink> {
        self.parent.as_ref()
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn history(&self) -> &MetricsHistory {
        &self.history
    }

    pub fn logs(&self) -> &LogStream {
        &self.logs
    }

    pub fn namespace_filter(&self) -> Option<&str> {
        self.namespace_filter.as_deref()
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn selection(&self, view: ViewState) -> SelectionState {
        self.selections.get(&view).copied().unwrap_or_default()
    }

    pub fn current_selection(&self) -> SelectionState {
        self.selection(self.view)
    }

    pub fn detail_scroll_offset(&self) -> usize {
        self.detail_scroll_offset
    }

    pub fn set_custom_actions(&mut self, actions: Vec<CustomAction>) {
        info!(count = actions.len(), "custom actions loaded");
        self.custom_actions = actions;
    }

    pub fn sort_spec(&self, view: ViewState) -> Option<(SortField, SortOrder)> {
        let cycle = view.sort_cycle();
        if cycle.is_empty() {
            return None;
        }
        let step = self.sort_steps.get(&view).copied().unwrap_or(0);
        cycle.get(step % cycle.len()).copied()
    }

    pub fn filter_options(&self) -> Vec<Option<String>> {
        std::iter::once(None)
            .chain(self.snapshot.namespaces().into_iter().map(Some))
            .collect()
    }

    pub fn filter_index(&self) -> usize {
        self.filter_index
    }

    pub fn action_menu_items(&self) -> &[MenuItem] {
        self.action_menu
            .as_ref()
            .map(|menu| menu.items.as_slice())
            .unwrap_or(&[])
    }

    pub fn action_menu_target(&self) -> Option<&EntityKey> {
        self.action_menu.as_ref().map(|menu| &menu.target)
    }

    pub fn action_menu_index(&self) -> usize {
        self.action_menu
            .as_ref()
            .map(|menu| menu.selected)
            .unwrap_or(0)
    }

    pub fn command_output_title(&self) -> &str {
        self.command_output
            .as_ref()
            .map(|output| output.title.as_str())
            .unwrap_or("")
    }

    pub fn command_output_page(&self) -> Vec<&str> {
        let Some(output) = self.command_output.as_ref() else {
            return Vec::new();
        };
        output
            .lines
            .iter()
            .skip(output.scroll)
            .take(self.detail_page_size())
            .map(String::as_str)
            .collect()
    }

    pub fn list_page_size(&self) -> usize {
        usize::from(self.viewport_height)
            .saturating_sub(LIST_RESERVED_ROWS)
            .max(1)
    }

    pub fn detail_page_size(&self) -> usize {
        usize::from(self.viewport_height)
            .saturating_sub(DETAIL_RESERVED_ROWS)
            .max(1)
    }

    pub fn log_page_size(&self) -> usize {
        usize::from(self.viewport_height)
            .saturating_sub(LOG_RESERVED_ROWS)
            .max(1)
    }

    pub fn page_size(&self, view: ViewState) -> usize {
        if view.is_detail() {
            self.detail_page_size()
        } else {
            self.list_page_size()
        }
    }

    fn visible<'a, T: Listed>(&self, items: &'a [T], view: ViewState) -> Vec<&'a T> {
        filter_sort(
            items,
            self.namespace_filter.as_deref(),
            &self.search,
            self.sort_spec(view),
        )
    }

    pub fn visible_nodes(&self) -> Vec<&NodeInfo> {
        self.visible(&self.snapshot.nodes, ViewState::Nodes)
    }

    pub fn visible_pods(&self) -> Vec<&PodInfo> {
        self.visible(&self.snapshot.pods, ViewState::Pods)
    }

    pub fn visible_services(&self) -> Vec<&ServiceInfo> {
        self.visible(&self.snapshot.services, ViewState::Network)
    }

    pub fn visible_pvcs(&self) -> Vec<&PvcInfo> {
        self.visible(&self.snapshot.pvcs, ViewState::Storage)
    }

    pub fn visible_events(&self) -> Vec<&EventInfo> {
        self.visible(&self.snapshot.events, ViewState::Events)
    }

    pub fn visible_alerts(&self) -> Vec<&AlertInfo> {
        self.visible(&self.alerts, ViewState::Alerts)
    }

    pub fn visible_queues(&self) -> Vec<&QueueInfo> {
        self.visible(&self.snapshot.queues, ViewState::Queues)
    }

    pub fn workload_sections(&self) -> Vec<(WorkloadSection, Vec<WorkloadRow<'_>>)> {
        let view = ViewState::Workloads;
        WorkloadSection::ORDER
            .iter()
            .map(|section| {
                let rows = match section {
                    WorkloadSection::VolcanoJobs => self
                        .visible(&self.snapshot.volcano_jobs, view)
                        .into_iter()
                        .map(WorkloadRow::VolcanoJob)
                        .collect(),
                    WorkloadSection::Jobs => self
                        .visible(&self.snapshot.jobs, view)
                        .into_iter()
                        .map(WorkloadRow::Job)
                        .collect(),
                    WorkloadSection::Deployments => self
                        .visible(&self.snapshot.deployments, view)
                        .into_iter()
                        .map(WorkloadRow::Deployment)
                        .collect(),
                    WorkloadSection::StatefulSets => self
                        .visible(&self.snapshot.stateful_sets, view)
                        .into_iter()
                        .map(WorkloadRow::StatefulSet)
                        .collect(),
                    WorkloadSection::DaemonSets => self
                        .visible(&self.snapshot.daemon_sets, view)
                        .into_iter()
                        .map(WorkloadRow::DaemonSet)
                        .collect(),
                };
                (*section, rows)
            })
            .collect()
    }

    pub fn workload_rows(&self) -> Vec<WorkloadRow<'_>> {
        self.workload_sections()
            .into_iter()
            .flat_map(|(_, rows)| rows)
            .collect()
    }

    /// Maps a flat Workloads index onto its section using counts taken from
    /// the data as it is now.
    fn resolve_workload(&self, index: usize) -> Option<WorkloadRow<'_>> {
        let mut remaining = index;
        for (_, rows) in self.workload_sections() {
            if remaining < rows.len() {
                return rows.get(remaining).copied();
            }
            remaining -= rows.len();
        }
        None
    }

    pub fn topology_rows(&self) -> Vec<TopologyRow<'_>> {
        let mut nodes = self.snapshot.nodes.iter().collect::<Vec<_>>();
        nodes.sort_by(|left, right| left.name.cmp(&right.name));
        let pods = filter_sort(
            &self.snapshot.pods,
            self.namespace_filter.as_deref(),
            "",
            Some((SortField::Name, SortOrder::Asc)),
        );

        let mut rows = Vec::new();
        for node in nodes {
            let node_pods = pods
                .iter()
                .copied()
                .filter(|pod| pod.node.as_deref() == Some(node.name.as_str()))
                .filter(|pod| pod.matches_search(&self.search))
                .collect::<Vec<_>>();
            if !node.matches_search(&self.search) && node_pods.is_empty() {
                continue;
            }
            rows.push(TopologyRow::Node(node));
            rows.extend(node_pods.into_iter().map(TopologyRow::Pod));
        }
        rows
    }

    pub fn job_pods(&self) -> Vec<&PodInfo> {
        let Some(job) = self.slots.job.as_ref() else {
            return Vec::new();
        };
        let mut pods = self
            .snapshot
            .pods
            .iter()
            .filter(|pod| pod.is_owned_by_job(job))
            .collect::<Vec<_>>();
        pods.sort_by(|left, right| left.name.cmp(&right.name));
        pods
    }

    pub fn volcano_job_pods(&self) -> Vec<&PodInfo> {
        let Some(job) = self.slots.volcano_job.as_ref() else {
            return Vec::new();
        };
        let mut pods = self
            .snapshot
            .pods
            .iter()
            .filter(|pod| pod.is_owned_by_volcano_job(job))
            .collect::<Vec<_>>();
        pods.sort_by(|left, right| left.name.cmp(&right.name));
        pods
    }

    pub fn queue_jobs(&self) -> Vec<&VolcanoJobInfo> {
        let Some(queue) = self.slots.queue.as_ref() else {
            return Vec::new();
        };
        let mut jobs = self
            .snapshot
            .volcano_jobs
            .iter()
            .filter(|job| job.queue == queue.name)
            .collect::<Vec<_>>();
        jobs.sort_by_key(|job| job.key());
        jobs
    }

    pub fn item_count(&self, view: ViewState) -> usize {
        match view {
            ViewState::Overview => 0,
            ViewState::Nodes => self.visible_nodes().len(),
            ViewState::Pods => self.visible_pods().len(),
            ViewState::Workloads => self
                .workload_sections()
                .iter()
                .map(|(_, rows)| rows.len())
                .sum(),
            ViewState::Network => self.visible_services().len(),
            ViewState::Storage => self.visible_pvcs().len(),
            ViewState::Events => self.visible_events().len(),
            ViewState::Alerts => self.visible_alerts().len(),
            ViewState::Queues => self.visible_queues().len(),
            ViewState::Topology => self.topology_rows().len(),
            ViewState::JobDetail => self.job_pods().len(),
            ViewState::VolcanoJobDetail => self.volcano_job_pods().len(),
            ViewState::QueueDetail => self.queue_jobs().len(),
            _ => 0,
        }
    }

    /// Entity the cursor refers to: the selected row, or the open detail.
    pub fn current_entity(&self) -> Option<EntityKey> {
        let selected = self.current_selection().selected_index;
        match self.view {
            ViewState::Overview => None,
            ViewState::Nodes => self.visible_nodes().get(selected).map(|node| node.key()),
            ViewState::Pods => self.visible_pods().get(selected).map(|pod| pod.key()),
            ViewState::Workloads => self.resolve_workload(selected).map(|row| row.key()),
            ViewState::Network => self.visible_services().get(selected).map(|item| item.key()),
            ViewState::Storage => self.visible_pvcs().get(selected).map(|item| item.key()),
            ViewState::Events => self.visible_events().get(selected).map(|item| item.key()),
            ViewState::Alerts => self.visible_alerts().get(selected).map(|item| item.key()),
            ViewState::Queues => self.visible_queues().get(selected).map(|item| item.key()),
            ViewState::Topology => self.topology_rows().get(selected).map(|row| row.key()),
            ViewState::NodeDetail => self.slots.node.as_ref().map(Listed::key),
            ViewState::PodDetail => self.slots.pod.as_ref().map(Listed::key),
            ViewState::DeploymentDetail => self.slots.deployment.as_ref().map(Listed::key),
            ViewState::StatefulSetDetail => self.slots.stateful_set.as_ref().map(Listed::key),
            ViewState::DaemonSetDetail => self.slots.daemon_set.as_ref().map(Listed::key),
            ViewState::JobDetail => self.slots.job.as_ref().map(Listed::key),
            ViewState::VolcanoJobDetail => self.slots.volcano_job.as_ref().map(Listed::key),
            ViewState::QueueDetail => self.slots.queue.as_ref().map(Listed::key),
            ViewState::ServiceDetail => self.slots.service.as_ref().map(Listed::key),
            ViewState::PvcDetail => self.slots.pvc.as_ref().map(Listed::key),
            ViewState::EventDetail => self.slots.event.as_ref().map(Listed::key),
        }
    }

    fn current_log_pod(&self) -> Option<PodInfo> {
        let selected = self.current_selection().selected_index;
        let pod = match self.view {
            ViewState::Pods => self.visible_pods().get(selected).copied(),
            ViewState::Topology => match self.topology_rows().get(selected) {
                Some(TopologyRow::Pod(pod)) => Some(*pod),
                _ => None,
            },
            ViewState::PodDetail => self.slots.pod.as_ref(),
            ViewState::JobDetail => self.job_pods().get(selected).copied(),
            ViewState::VolcanoJobDetail => self.volcano_job_pods().get(selected).copied(),
            ViewState::Alerts => self
                .visible_alerts()
                .get(selected)
                .filter(|alert| alert.target.kind == EntityKind::Pod)
                .and_then(|alert| self.snapshot.find_pod(&alert.target)),
            _ => None,
        };
        pod.cloned()
    }

    pub fn detail_fields(&self) -> Vec<(&'static str, String)> {
        let now = Utc::now();
        match self.view {
            ViewState::NodeDetail => self
                .slots
                .node
                .as_ref()
                .map(|node| {
                    vec![
                        ("Name", node.name.clone()),
                        ("Status", node.status()),
                        ("Roles", node.roles.clone()),
                        ("Kubelet", node.kubelet_version.clone()),
                        (
                            "CPU",
                            format!(
                                "{} / {}",
                                format_optional_cpu(node.cpu_millis),
                                format_cpu_millicores(node.cpu_capacity_millis)
                            ),
                        ),
                        (
                            "Memory",
                            format!(
                                "{} / {}",
                                format_optional_bytes(node.memory_bytes),
                                format_bytes(node.memory_capacity_bytes)
                            ),
                        ),
                        (
                            "Accelerators",
                            format!(
                                "{} / {}",
                                node.accelerators_allocated, node.accelerator_capacity
                            ),
                        ),
                        ("Pods", node.pod_count.to_string()),
                        ("Age", human_age(node.created_at, now)),
                    ]
                })
                .unwrap_or_default(),
            ViewState::PodDetail => self
                .slots
                .pod
                .as_ref()
                .map(|pod| {
                    vec![
                        ("Name", pod.name.clone()),
                        ("Namespace", pod.namespace.clone()),
                        ("Node", pod.node.clone().unwrap_or_else(|| "-".to_string())),
                        ("Phase", pod.phase.clone()),
                        ("Status", pod.status.clone()),
                        (
                            "Ready",
                            format!("{}/{}", pod.ready_containers, pod.total_containers),
                        ),
                        ("Restarts", pod.restarts.to_string()),
                        ("Containers", pod.containers.join(", ")),
                        ("CPU", format_optional_cpu(pod.cpu_millis)),
                        ("Memory", format_optional_bytes(pod.memory_bytes)),
                        ("Accelerators", pod.accelerators.to_string()),
                        (
                            "Owner",
                            pod.owner
                                .as_ref()
                                .map(|owner| format!("{}/{}", owner.kind, owner.name))
                                .unwrap_or_else(|| "-".to_string()),
                        ),
                        ("Age", human_age(pod.created_at, now)),
                    ]
                })
                .unwrap_or_default(),
            ViewState::DeploymentDetail => self
                .slots
                .deployment
                .as_ref()
                .map(|item| {
                    vec![
                        ("Name", item.name.clone()),
                        ("Namespace", item.namespace.clone()),
                        ("Ready", format!("{}/{}", item.ready, item.replicas)),
                        ("Up-to-date", item.updated.to_string()),
                        ("Available", item.available.to_string()),
                        ("Age", human_age(item.created_at, now)),
                    ]
                })
                .unwrap_or_default(),
            ViewState::StatefulSetDetail => self
                .slots
                .stateful_set
                .as_ref()
                .map(|item| {
                    vec![
                        ("Name", item.name.clone()),
                        ("Namespace", item.namespace.clone()),
                        ("Ready", format!("{}/{}", item.ready, item.replicas)),
                        ("Age", human_age(item.created_at, now)),
                    ]
                })
                .unwrap_or_default(),
            ViewState::DaemonSetDetail => self
                .slots
                .daemon_set
                .as_ref()
                .map(|item| {
                    vec![
                        ("Name", item.name.clone()),
                        ("Namespace", item.namespace.clone()),
                        ("Desired", item.desired.to_string()),
                        ("Ready", item.ready.to_string()),
                        ("Available", item.available.to_string()),
                        ("Age", human_age(item.created_at, now)),
                    ]
                })
                .unwrap_or_default(),
            ViewState::JobDetail => self
                .slots
                .job
                .as_ref()
                .map(|job| {
                    vec![
                        ("Name", job.name.clone()),
                        ("Namespace", job.namespace.clone()),
                        ("Status", job.status().to_string()),
                        ("Completions", format!("{}/{}", job.succeeded, job.completions)),
                        ("Active", job.active.to_string()),
                        ("Failed", job.failed.to_string()),
                        ("Age", human_age(job.created_at, now)),
                    ]
                })
                .unwrap_or_default(),
            ViewState::VolcanoJobDetail => self
                .slots
                .volcano_job
                .as_ref()
                .map(|job| {
                    vec![
                        ("Name", job.name.clone()),
                        ("Namespace", job.namespace.clone()),
                        ("Queue", job.queue.clone()),
                        ("Phase", job.phase.clone()),
                        ("MinAvailable", job.min_available.to_string()),
                        (
                            "Tasks",
                            format!(
                                "running {} pending {} succeeded {} failed {}",
                                job.running, job.pending, job.succeeded, job.failed
                            ),
                        ),
                        ("Age", human_age(job.created_at, now)),
                    ]
                })
                .unwrap_or_default(),
            ViewState::QueueDetail => self
                .slots
                .queue
                .as_ref()
                .map(|queue| {
                    vec![
                        ("Name", queue.name.clone()),
                        ("State", queue.state.clone()),
                        ("Weight", queue.weight.to_string()),
                        ("Running", queue.running.to_string()),
                        ("Pending", queue.pending.to_string()),
                        ("Inqueue", queue.inqueue.to_string()),
                        ("Age", human_age(queue.created_at, now)),
                    ]
                })
                .unwrap_or_default(),
            ViewState::ServiceDetail => self
                .slots
                .service
                .as_ref()
                .map(|service| {
                    vec![
                        ("Name", service.name.clone()),
                        ("Namespace", service.namespace.clone()),
                        ("Type", service.service_type.clone()),
                        ("ClusterIP", service.cluster_ip.clone()),
                        ("Ports", service.ports.clone()),
                        ("Age", human_age(service.created_at, now)),
                    ]
                })
                .unwrap_or_default(),
            ViewState::PvcDetail => self
                .slots
                .pvc
                .as_ref()
                .map(|pvc| {
                    vec![
                        ("Name", pvc.name.clone()),
                        ("Namespace", pvc.namespace.clone()),
                        ("Status", pvc.status.clone()),
                        ("Volume", pvc.volume.clone()),
                        ("Capacity", format_bytes(pvc.capacity_bytes)),
                        ("StorageClass", pvc.storage_class.clone()),
                        ("Age", human_age(pvc.created_at, now)),
                    ]
                })
                .unwrap_or_default(),
            ViewState::EventDetail => self
                .slots
                .event
                .as_ref()
                .map(|event| {
                    vec![
                        ("Type", event.event_type.clone()),
                        ("Reason", event.reason.clone()),
                        ("Object", event.object.clone()),
                        ("Namespace", event.namespace.clone()),
                        ("Count", event.count.to_string()),
                        ("Last seen", human_age(event.last_seen, now)),
                        ("Message", event.message.clone()),
                    ]
                })
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    pub fn apply(&mut self, event: Event) -> AppCommand {
        let command = match event {
            Event::Input(action) => {
                self.status = None;
                self.apply_action(action)
            }
            Event::SnapshotArrived(result) => {
                self.on_snapshot(result);
                AppCommand::None
            }
            Event::AsyncResult(result) => self.on_async_result(result),
            Event::Resize { width, height } => {
                debug!(width, height, "viewport resized");
                self.viewport_height = height;
                self.logs.set_page_size(self.log_page_size());
                AppCommand::None
            }
        };
        self.clamp_all();
        command
    }

    fn apply_action(&mut self, action: Action) -> AppCommand {
        if action == Action::Quit {
            self.running = false;
            self.status = Some("Exit requested".to_string());
            return AppCommand::None;
        }

        match self.mode {
            InputMode::Normal => self.apply_normal(action),
            InputMode::Filter => self.apply_filter(action),
            InputMode::Search => self.apply_search(action),
            InputMode::Logs => self.apply_logs(action),
            InputMode::LogsSearch => self.apply_logs_search(action),
            InputMode::ActionMenu => self.apply_action_menu(action),
            InputMode::CommandOutput => self.apply_command_output(action),
        }
    }

    fn apply_normal(&mut self, action: Action) -> AppCommand {
        match action {
            Action::Select(n) => {
                if let Some(view) = ViewState::from_select(n) {
                    self.switch_view(view);
                }
                AppCommand::None
            }
            Action::TabCycle => {
                let current = self.active_tab();
                let position = ViewState::PRIMARY
                    .iter()
                    .position(|view| *view == current)
                    .unwrap_or(0);
                let next = ViewState::PRIMARY[(position + 1) % ViewState::PRIMARY.len()];
                self.switch_view(next);
                AppCommand::None
            }
            Action::Enter => {
                self.enter_selected();
                AppCommand::None
            }
            Action::Back => {
                self.back();
                AppCommand::None
            }
            Action::EnterFilter => {
                let options = self.filter_options();
                self.filter_index = options
                    .iter()
                    .position(|option| option.as_deref() == self.namespace_filter.as_deref())
                    .unwrap_or(0);
                self.mode = InputMode::Filter;
                AppCommand::None
            }
            Action::ClearFilter => {
                self.namespace_filter = None;
                self.reset_list_selections();
                self.status = Some("Namespace filter cleared".to_string());
                AppCommand::None
            }
            Action::EnterSearch => {
                if !self.view.is_detail() && self.view != ViewState::Overview {
                    self.search.clear();
                    self.reset_selection(self.view);
                    self.mode = InputMode::Search;
                }
                AppCommand::None
            }
            Action::EnterLogs => self.enter_logs(),
            Action::EnterActions => {
                self.open_action_menu();
                AppCommand::None
            }
            Action::EnterExport => self.export(),
            Action::Sort => {
                let view = self.view.owning_list();
                let cycle_len = view.sort_cycle().len();
                if cycle_len > 0 && !self.view.is_detail() {
                    let step = self.sort_steps.entry(view).or_insert(0);
                    *step = (*step + 1) % cycle_len;
                    self.reset_selection(view);
                }
                AppCommand::None
            }
            Action::Refresh => {
                self.status = Some("Refreshing".to_string());
                AppCommand::ForceRefresh
            }
            Action::Up => {
                self.move_cursor(-1);
                AppCommand::None
            }
            Action::Down => {
                self.move_cursor(1);
                AppCommand::None
            }
            Action::PageUp => {
                self.move_cursor(-(self.page_size(self.view) as isize));
                AppCommand::None
            }
            Action::PageDown => {
                self.move_cursor(self.page_size(self.view) as isize);
                AppCommand::None
            }
            Action::Quit | Action::TextInput(_) | Action::Backspace | Action::Space => {
                AppCommand::None
            }
        }
    }

    fn apply_filter(&mut self, action: Action) -> AppCommand {
        let options = self.filter_options();
        match action {
            Action::Up => self.filter_index = self.filter_index.saturating_sub(1),
            Action::Down => {
                self.filter_index = (self.filter_index + 1).min(options.len().saturating_sub(1));
            }
            Action::Enter => {
                self.namespace_filter = options.get(self.filter_index).cloned().flatten();
                self.reset_list_selections();
                self.mode = InputMode::Normal;
                debug!(namespace = ?self.namespace_filter, "namespace filter applied");
            }
            Action::Back => self.mode = InputMode::Normal,
            _ => {}
        }
        AppCommand::None
    }

    fn apply_search(&mut self, action: Action) -> AppCommand {
        match action {
            Action::TextInput(c) if is_list_search_char(c) => {
                self.search.push(c);
                self.reset_selection(self.view);
            }
            Action::Space => {
                self.search.push(' ');
                self.reset_selection(self.view);
            }
            Action::Backspace => {
                self.search.pop();
                self.reset_selection(self.view);
            }
            Action::Enter => self.mode = InputMode::Normal,
            Action::Back => {
                self.search.clear();
                self.reset_selection(self.view);
                self.mode = InputMode::Normal;
            }
            Action::Up => self.move_cursor(-1),
            Action::Down => self.move_cursor(1),
            Action::PageUp => self.move_cursor(-(self.list_page_size() as isize)),
            Action::PageDown => self.move_cursor(self.list_page_size() as isize),
            _ => {}
        }
        AppCommand::None
    }

    fn apply_logs(&mut self, action: Action) -> AppCommand {
        match action {
            Action::Up => self.logs.scroll_by(-1),
            Action::Down => self.logs.scroll_by(1),
            Action::PageUp => self.logs.page_up(),
            Action::PageDown => self.logs.page_down(),
            Action::Space => {
                let resumed = self.logs.toggle_auto_refresh();
                self.status = Some(if self.logs.auto_refresh() {
                    "Log auto-refresh on".to_string()
                } else {
                    "Log auto-refresh paused".to_string()
                });
                if let Some(request) = resumed {
                    return AppCommand::FetchLogs(request);
                }
            }
            Action::TabCycle => return self.cycle_log_container(),
            Action::EnterSearch => {
                self.logs.begin_search();
                self.mode = InputMode::LogsSearch;
            }
            Action::Refresh => {
                if let Some(request) = self.logs.current_request() {
                    return AppCommand::FetchLogs(request);
                }
            }
            Action::Back => {
                self.logs.stop();
                self.mode = InputMode::Normal;
            }
            _ => {}
        }
        AppCommand::None
    }

    fn apply_logs_search(&mut self, action: Action) -> AppCommand {
        match action {
            Action::TextInput(c) if !c.is_control() => self.logs.push_search_char(c),
            Action::Space => self.logs.push_search_char(' '),
            Action::Backspace => self.logs.pop_search_char(),
            Action::Up => self.logs.scroll_by(-1),
            Action::Down => self.logs.scroll_by(1),
            Action::PageUp => self.logs.page_up(),
            Action::PageDown => self.logs.page_down(),
            Action::Back => {
                self.mode = InputMode::Logs;
                if let Some(request) = self.logs.end_search() {
                    return AppCommand::FetchLogs(request);
                }
            }
            _ => {}
        }
        AppCommand::None
    }

    fn apply_action_menu(&mut self, action: Action) -> AppCommand {
        let Some(menu) = self.action_menu.as_mut() else {
            self.mode = InputMode::Normal;
            return AppCommand::None;
        };
        match action {
            Action::Up => menu.selected = menu.selected.saturating_sub(1),
            Action::Down => {
                menu.selected = (menu.selected + 1).min(menu.items.len().saturating_sub(1));
            }
            Action::Enter => return self.run_menu_item(),
            Action::Back => {
                self.action_menu = None;
                self.mode = InputMode::Normal;
            }
            _ => {}
        }
        AppCommand::None
    }

    fn apply_command_output(&mut self, action: Action) -> AppCommand {
        let page = self.detail_page_size();
        let Some(output) = self.command_output.as_mut() else {
            self.mode = InputMode::Normal;
            return AppCommand::None;
        };
        let max_scroll = output.lines.len().saturating_sub(page);
        match action {
            Action::Up => output.scroll = output.scroll.saturating_sub(1),
            Action::Down => output.scroll = (output.scroll + 1).min(max_scroll),
            Action::PageUp => output.scroll = output.scroll.saturating_sub(page),
            Action::PageDown => output.scroll = (output.scroll + page).min(max_scroll),
            Action::Back | Action::Enter => {
                self.command_output = None;
                self.mode = InputMode::Normal;
            }
            _ => {}
        }
        AppCommand::None
    }

    fn switch_view(&mut self, view: ViewState) {
        if self.logs.is_active() {
            self.logs.stop();
        }
        self.mode = InputMode::Normal;
        self.detail_mode = false;
        self.slots = DetailSlots::default();
        self.parent = None;
        self.search.clear();
        self.detail_scroll_offset = 0;
        self.view = view;
        self.detail_origin = view;
        self.reset_selection(view);
    }

    fn reset_selection(&mut self, view: ViewState) {
        self.selections.insert(view, SelectionState::default());
    }

    fn reset_list_selections(&mut self) {
        for view in ViewState::PRIMARY {
            self.reset_selection(view);
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        let count = self.item_count(self.view);
        if self.view.is_detail() && count == 0 {
            let max_scroll = self
                .detail_fields()
                .len()
                .saturating_sub(self.detail_page_size());
            self.detail_scroll_offset = self
                .detail_scroll_offset
                .saturating_add_signed(delta)
                .min(max_scroll);
            return;
        }

        let page_size = self.page_size(self.view);
        let selection = self.selections.entry(self.view).or_default();
        if count == 0 {
            *selection = SelectionState::default();
            return;
        }
        let max_index = count.saturating_sub(1);
        selection.selected_index = selection
            .selected_index
            .min(max_index)
            .saturating_add_signed(delta)
            .min(max_index);
        selection.clamp(count, page_size);
    }

    fn open_detail(&mut self, view: ViewState, origin: ViewState) {
        self.detail_origin = origin;
        self.view = view;
        self.detail_mode = true;
        self.detail_scroll_offset = 0;
        self.reset_selection(view);
    }

    fn capture(&mut self, key: &EntityKey) -> bool {
        let snapshot = &self.snapshot;
        let slots = &mut self.slots;
        match key.kind {
            EntityKind::Node => {
                slots.node = find_by_key(&snapshot.nodes, key).cloned();
                slots.node.is_some()
            }
            EntityKind::Pod => {
                slots.pod = find_by_key(&snapshot.pods, key).cloned();
                slots.pod.is_some()
            }
            EntityKind::Deployment => {
                slots.deployment = find_by_key(&snapshot.deployments, key).cloned();
                slots.deployment.is_some()
            }
            EntityKind::StatefulSet => {
                slots.stateful_set = find_by_key(&snapshot.stateful_sets, key).cloned();
                slots.stateful_set.is_some()
            }
            EntityKind::DaemonSet => {
                slots.daemon_set = find_by_key(&snapshot.daemon_sets, key).cloned();
                slots.daemon_set.is_some()
            }
            EntityKind::Job => {
                slots.job = find_by_key(&snapshot.jobs, key).cloned();
                slots.job.is_some()
            }
            EntityKind::VolcanoJob => {
                slots.volcano_job = find_by_key(&snapshot.volcano_jobs, key).cloned();
                slots.volcano_job.is_some()
            }
            EntityKind::Queue => {
                slots.queue = find_by_key(&snapshot.queues, key).cloned();
                slots.queue.is_some()
            }
            EntityKind::Service => {
                slots.service = find_by_key(&snapshot.services, key).cloned();
                slots.service.is_some()
            }
            EntityKind::PersistentVolumeClaim => {
                slots.pvc = find_by_key(&snapshot.pvcs, key).cloned();
                slots.pvc.is_some()
            }
            EntityKind::Event => {
                slots.event = find_by_key(&snapshot.events, key).cloned();
                slots.event.is_some()
            }
        }
    }

    fn enter_selected(&mut self) {
        let selected = self.current_selection().selected_index;
        match self.view {
            ViewState::Overview => {}
            ViewState::JobDetail => {
                let pod = self.job_pods().get(selected).map(|pod| (*pod).clone());
                if let (Some(pod), Some(job)) = (pod, self.slots.job.as_ref()) {
                    let parent = ParentLink::JobDetail(job.key());
                    self.drill_into_pod(pod, parent);
                }
            }
            ViewState::VolcanoJobDetail => {
                let pod = self.volcano_job_pods().get(selected).map(|pod| (*pod).clone());
                if let (Some(pod), Some(job)) = (pod, self.slots.volcano_job.as_ref()) {
                    let parent = ParentLink::VolcanoJobDetail(job.key());
                    self.drill_into_pod(pod, parent);
                }
            }
            ViewState::QueueDetail => {
                let job = self.queue_jobs().get(selected).map(|job| (*job).clone());
                if let Some(job) = job {
                    self.parent = None;
                    self.slots.volcano_job = Some(job);
                    self.open_detail(ViewState::VolcanoJobDetail, self.detail_origin);
                }
            }
            view if view.is_detail() => {}
            view => {
                let Some(key) = self.current_entity() else {
                    return;
                };
                if self.capture(&key) {
                    self.open_detail(ViewState::detail_for(key.kind), view);
                } else {
                    self.status = Some(format!("{key} is no longer present"));
                }
            }
        }
    }

    fn drill_into_pod(&mut self, pod: PodInfo, parent: ParentLink) {
        self.slots.pod = Some(pod);
        self.parent = Some(parent);
        self.view = ViewState::PodDetail;
        self.detail_mode = true;
        self.detail_scroll_offset = 0;
        self.reset_selection(ViewState::PodDetail);
    }

    fn back(&mut self) {
        if !self.detail_mode {
            if !self.search.is_empty() {
                self.search.clear();
                self.reset_selection(self.view);
            }
            return;
        }

        let leaving = self.view;
        self.reset_selection(leaving);
        self.detail_scroll_offset = 0;

        if let Some(parent) = self.parent.take() {
            self.slots.pod = None;
            let snapshot = &self.snapshot;
            self.view = match &parent {
                ParentLink::JobDetail(key) => {
                    if let Some(job) = find_by_key(&snapshot.jobs, key) {
                        self.slots.job = Some(job.clone());
                    }
                    ViewState::JobDetail
                }
                ParentLink::VolcanoJobDetail(key) => {
                    if let Some(job) = find_by_key(&snapshot.volcano_jobs, key) {
                        self.slots.volcano_job = Some(job.clone());
                    }
                    ViewState::VolcanoJobDetail
                }
            };
            debug!(parent = %parent.key(), "returned to parent detail");
            return;
        }

        self.slots = DetailSlots::default();
        self.detail_mode = false;
        self.view = if self.detail_origin.is_detail() {
            leaving.owning_list()
        } else {
            self.detail_origin
        };
    }

    fn enter_logs(&mut self) -> AppCommand {
        let Some(pod) = self.current_log_pod() else {
            self.status = Some("Logs are available for pods only".to_string());
            return AppCommand::None;
        };
        let target = LogTarget {
            entity: pod.key(),
            container: pod.containers.first().cloned(),
        };
        self.action_menu = None;
        self.mode = InputMode::Logs;
        AppCommand::FetchLogs(self.logs.start(target))
    }

    fn cycle_log_container(&mut self) -> AppCommand {
        let Some(target) = self.logs.target().cloned() else {
            return AppCommand::None;
        };
        let Some(pod) = self.snapshot.find_pod(&target.entity) else {
            return AppCommand::None;
        };
        if pod.containers.len() < 2 {
            return AppCommand::None;
        }
        let position = target
            .container
            .as_ref()
            .and_then(|current| pod.containers.iter().position(|name| name == current))
            .unwrap_or(0);
        let next = pod.containers[(position + 1) % pod.containers.len()].clone();
        self.status = Some(format!("Container {next}"));
        let request = self.logs.start(LogTarget {
            entity: target.entity,
            container: Some(next),
        });
        AppCommand::FetchLogs(request)
    }

    fn open_action_menu(&mut self) {
        let Some(target) = self.current_entity() else {
            self.status = Some("Nothing selected".to_string());
            return;
        };
        let mut items = vec![
            MenuItem {
                label: "Describe".to_string(),
                description: "kubectl describe".to_string(),
                action: MenuAction::Describe,
            },
            MenuItem {
                label: "YAML".to_string(),
                description: "live object as YAML".to_string(),
                action: MenuAction::Yaml,
            },
        ];
        if target.kind == EntityKind::Pod {
            items.push(MenuItem {
                label: "Logs".to_string(),
                description: "tail container logs".to_string(),
                action: MenuAction::Logs,
            });
        }
        items.extend(
            self.custom_actions
                .iter()
                .enumerate()
                .filter(|(_, action)| action.applies_to(target.kind))
                .map(|(index, action)| MenuItem {
                    label: action.name.clone(),
                    description: action.description.clone(),
                    action: MenuAction::Custom(index),
                }),
        );
        self.action_menu = Some(ActionMenuState {
            target,
            items,
            selected: 0,
        });
        self.mode = InputMode::ActionMenu;
    }

    fn run_menu_item(&mut self) -> AppCommand {
        let Some(menu) = self.action_menu.take() else {
            return AppCommand::None;
        };
        self.mode = InputMode::Normal;
        let Some(item) = menu.items.get(menu.selected) else {
            return AppCommand::None;
        };

        let (title, kind) = match &item.action {
            MenuAction::Logs => return self.enter_logs(),
            MenuAction::Describe => (
                format!("describe {}", menu.target),
                ActionKind::Describe(menu.target.clone()),
            ),
            MenuAction::Yaml => (
                format!("yaml {}", menu.target),
                ActionKind::Yaml(menu.target.clone()),
            ),
            MenuAction::Custom(index) => {
                let Some(action) = self.custom_actions.get(*index) else {
                    return AppCommand::None;
                };
                let invocation = action.invocation(&menu.target);
                (
                    format!("{}: {}", action.name, invocation.display()),
                    ActionKind::Command(invocation),
                )
            }
        };

        if !self.capabilities.supports(&kind) {
            let err = CoreError::UnsupportedOperation(item.label.clone());
            warn!(entity = %menu.target, action = %item.label, "action not supported by provider");
            self.status = Some(err.to_string());
            return AppCommand::None;
        }

        self.next_request_id += 1;
        self.pending_request = Some(self.next_request_id);
        self.status = Some(format!("Running {title}"));
        AppCommand::RunAction(ActionRequest {
            request_id: self.next_request_id,
            title,
            kind,
        })
    }

    fn export(&mut self) -> AppCommand {
        match self.export_rows() {
            Ok(rows) => AppCommand::Export(ExportRequest {
                view: self.view,
                rows,
            }),
            Err(err) => {
                self.status = Some(CoreError::Export(err.to_string()).to_string());
                AppCommand::None
            }
        }
    }

    fn export_rows(&self) -> serde_json::Result<serde_json::Value> {
        match self.view {
            ViewState::Overview => serde_json::to_value(OverviewExport::from_app(self)),
            ViewState::Nodes => serde_json::to_value(self.visible_nodes()),
            ViewState::Pods => serde_json::to_value(self.visible_pods()),
            ViewState::Workloads => serde_json::to_value(self.workload_rows()),
            ViewState::Network => serde_json::to_value(self.visible_services()),
            ViewState::Storage => serde_json::to_value(self.visible_pvcs()),
            ViewState::Events => serde_json::to_value(self.visible_events()),
            ViewState::Alerts => serde_json::to_value(self.visible_alerts()),
            ViewState::Queues => serde_json::to_value(self.visible_queues()),
            ViewState::Topology => serde_json::to_value(self.topology_rows()),
            _ => serde_json::to_value(&self.slots),
        }
    }

    fn on_snapshot(&mut self, result: Result<Snapshot, CoreError>) {
        match result {
            Ok(snapshot) => {
                if self.history.ingest(&snapshot) {
                    debug!(history = self.history.len(), "snapshot ingested");
                }
                self.alerts = derive_alerts(&snapshot);
                self.slots.refresh(&snapshot);
                self.snapshot = snapshot;
                self.banner = None;
            }
            Err(err) => {
                warn!(error = %err, "snapshot refresh failed; keeping last data");
                self.banner = Some(err.to_string());
            }
        }
    }

    fn on_async_result(&mut self, result: AsyncResult) -> AppCommand {
        match result {
            AsyncResult::Logs { target, result } => {
                if self.logs.apply_fetch(&target, result) {
                    AppCommand::ScheduleLogRefresh {
                        target,
                        generation: self.logs.generation(),
                        after: LOG_REFRESH_PERIOD,
                    }
                } else {
                    AppCommand::None
                }
            }
            AsyncResult::LogTick { target, generation } => self
                .logs
                .on_tick(&target, generation)
                .map(AppCommand::FetchLogs)
                .unwrap_or(AppCommand::None),
            AsyncResult::CommandOutput {
                request_id,
                title,
                result,
            } => {
                let current = self.pending_request == Some(request_id)
                    && matches!(self.mode, InputMode::Normal | InputMode::ActionMenu);
                if !current {
                    debug!(request_id, "dropping superseded command output");
                    return AppCommand::None;
                }
                self.pending_request = None;
                let text = match result {
                    Ok(text) => text,
                    Err(CoreError::UnsupportedOperation(message)) => {
                        self.status = Some(format!("unsupported operation: {message}"));
                        return AppCommand::None;
                    }
                    Err(err) => err.to_string(),
                };
                self.status = None;
                self.action_menu = None;
                self.command_output = Some(CommandOutputState {
                    title,
                    lines: text.lines().map(str::to_string).collect(),
                    scroll: 0,
                });
                self.mode = InputMode::CommandOutput;
                AppCommand::None
            }
            AsyncResult::Exported { result } => {
                self.status = Some(match result {
                    Ok(path) => format!("Exported {}", path.display()),
                    Err(err) => err.to_string(),
                });
                AppCommand::None
            }
        }
    }

    fn clamp_all(&mut self) {
        let mut views = self.selections.keys().copied().collect::<Vec<_>>();
        if !views.contains(&self.view) {
            views.push(self.view);
        }
        for view in views {
            let count = self.item_count(view);
            let page_size = self.page_size(view);
            self.selections
                .entry(view)
                .or_default()
                .clamp(count, page_size);
        }

        let detail_max = self
            .detail_fields()
            .len()
            .saturating_sub(self.detail_page_size());
        self.detail_scroll_offset = self.detail_scroll_offset.min(detail_max);
        self.filter_index = self
            .filter_index
            .min(self.filter_options().len().saturating_sub(1));
        if !self.detail_mode && !self.slots.is_empty() {
            self.slots = DetailSlots::default();
        }
    }
}

fn is_list_search_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | '.')
}

#[derive(Debug, Serialize)]
struct OverviewExport {
    refreshed_at: Option<chrono::DateTime<Utc>>,
    nodes: usize,
    ready_nodes: usize,
    pods: usize,
    volcano_jobs: usize,
    queues: usize,
    alerts: usize,
}

impl OverviewExport {
    fn from_app(app: &App) -> Self {
        let snapshot = &app.snapshot;
        Self {
            refreshed_at: snapshot.refreshed_at,
            nodes: snapshot.nodes.len(),
            ready_nodes: snapshot.nodes.iter().filter(|node| node.ready).count(),
            pods: snapshot.pods.len(),
            volcano_jobs: snapshot.volcano_jobs.len(),
            queues: snapshot.queues.len(),
            alerts: app.alerts.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{App, AppCommand, AsyncResult, Event, InputMode, ParentLink, SelectionState};
    use crate::config::CustomAction;
    use crate::input::Action;
    use crate::model::{
        DeploymentInfo, EntityKey, EntityKind, JobInfo, NodeInfo, OwnerRef, PodInfo, QueueInfo,
        Snapshot, ViewState, VolcanoJobInfo,
    };
    use crate::provider::{ActionKind, Capabilities, CoreError};
    use chrono::{Duration, TimeZone, Utc};

    fn pod(namespace: &str, name: &str) -> PodInfo {
        PodInfo {
            namespace: namespace.to_string(),
            name: name.to_string(),
            node: Some("node-a".to_string()),
            phase: "Running".to_string(),
            status: "Running".to_string(),
            containers: vec!["main".to_string(), "sidecar".to_string()],
            ..PodInfo::default()
        }
    }

    fn owned_pod(name: &str, api_version: &str, owner: &str) -> PodInfo {
        PodInfo {
            owner: Some(OwnerRef {
                api_version: api_version.to_string(),
                kind: "Job".to_string(),
                name: owner.to_string(),
            }),
            ..pod("ml", name)
        }
    }

    fn snapshot(seconds: i64) -> Snapshot {
        let at = Utc
            .with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
            .single()
            .unwrap_or_default()
            + Duration::seconds(seconds);
        Snapshot {
            refreshed_at: Some(at),
            nodes: vec![NodeInfo {
                name: "node-a".to_string(),
                ready: true,
                ..NodeInfo::default()
            }],
            pods: vec![
                pod("default", "p0"),
                pod("default", "p1"),
                pod("default", "p2"),
                pod("default", "p3"),
                pod("default", "p4"),
                owned_pod("train-worker-0", "batch.volcano.sh/v1alpha1", "train"),
                owned_pod("report-abc", "batch/v1", "report"),
            ],
            deployments: vec![DeploymentInfo {
                namespace: "default".to_string(),
                name: "web".to_string(),
                replicas: 2,
                ready: 2,
                ..DeploymentInfo::default()
            }],
            jobs: vec![JobInfo {
                namespace: "ml".to_string(),
                name: "report".to_string(),
                active: 1,
                ..JobInfo::default()
            }],
            volcano_jobs: vec![VolcanoJobInfo {
                namespace: "ml".to_string(),
                name: "train".to_string(),
                queue: "gpu".to_string(),
                phase: "Running".to_string(),
                ..VolcanoJobInfo::default()
            }],
            queues: vec![QueueInfo {
                name: "gpu".to_string(),
                state: "Open".to_string(),
                ..QueueInfo::default()
            }],
            ..Snapshot::default()
        }
    }

    fn app() -> App {
        let mut app = App::new(Capabilities::default(), None);
        app.apply(Event::SnapshotArrived(Ok(snapshot(0))));
        app
    }

    fn press(app: &mut App, actions: &[Action]) -> AppCommand {
        let mut last = AppCommand::None;
        for action in actions {
            last = app.apply(Event::Input(*action));
        }
        last
    }

    fn assert_invariants(app: &App) {
        for view in ViewState::PRIMARY.into_iter().chain([app.view()]) {
            let selection = app.selection(view);
            let count = app.item_count(view);
            let page = app.page_size(view);
            assert!(selection.selected_index < count.max(1), "{view} selection");
            assert!(selection.scroll_offset <= count.saturating_sub(page), "{view} scroll");
        }
    }

    #[test]
    fn select_then_enter_then_back_restores_pod_list() {
        let mut app = App::new(Capabilities::default(), Some("default".to_string()));
        app.apply(Event::SnapshotArrived(Ok(snapshot(0))));
        assert_eq!(app.view(), ViewState::Overview);

        press(&mut app, &[Action::Select(3)]);
        assert_eq!(app.view(), ViewState::Pods);
        assert_eq!(app.visible_pods().len(), 5);

        press(&mut app, &[Action::Down, Action::Down, Action::Enter]);
        assert_eq!(app.view(), ViewState::PodDetail);
        assert!(app.detail_mode());
        assert_eq!(
            app.slots().pod.as_ref().map(|pod| pod.name.as_str()),
            Some("p2")
        );

        press(&mut app, &[Action::Back]);
        assert_eq!(app.view(), ViewState::Pods);
        assert!(!app.detail_mode());
        assert_eq!(app.current_selection().selected_index, 2);
        assert!(app.slots().pod.is_none());
    }

    #[test]
    fn enter_back_round_trip_keeps_scroll_offset() {
        let mut app = app();
        app.apply(Event::Resize {
            width: 80,
            height: 10,
        });
        press(&mut app, &[Action::Select(3)]);
        let page = app.list_page_size();
        assert_eq!(page, 3);
        press(&mut app, &[Action::Down; 5]);
        let before = app.current_selection();
        assert_eq!(before.selected_index, 5);
        assert_eq!(before.scroll_offset, 3);

        press(&mut app, &[Action::Enter, Action::Down, Action::Back]);
        assert_eq!(app.view(), ViewState::Pods);
        assert_eq!(app.current_selection(), before);
        assert_eq!(app.detail_scroll_offset(), 0);
    }

    #[test]
    fn selection_is_clamped_when_snapshot_shrinks() {
        let mut app = app();
        press(&mut app, &[Action::Select(3), Action::PageDown]);
        assert_eq!(app.current_selection().selected_index, 6);

        let mut smaller = snapshot(5);
        smaller.pods.truncate(2);
        app.apply(Event::SnapshotArrived(Ok(smaller)));
        assert_eq!(app.current_selection().selected_index, 1);
        assert_invariants(&app);

        let mut empty = snapshot(10);
        empty.pods.clear();
        app.apply(Event::SnapshotArrived(Ok(empty)));
        assert_eq!(app.current_selection(), SelectionState::default());
        assert_invariants(&app);
    }

    #[test]
    fn invariants_hold_after_every_event_on_tiny_viewport() {
        let mut app = app();
        app.apply(Event::Resize {
            width: 0,
            height: 0,
        });
        assert_eq!(app.list_page_size(), 1);
        assert_eq!(app.log_page_size(), 1);

        let script = [
            Action::Select(4),
            Action::PageDown,
            Action::Down,
            Action::Sort,
            Action::TabCycle,
            Action::PageDown,
            Action::EnterSearch,
            Action::TextInput('p'),
            Action::Down,
            Action::Back,
            Action::Select(0),
            Action::PageDown,
            Action::Enter,
            Action::Back,
            Action::Select(1),
            Action::Down,
        ];
        for action in script {
            app.apply(Event::Input(action));
            assert_invariants(&app);
        }
    }

    #[test]
    fn workloads_enter_resolves_section_from_current_data() {
        let mut app = app();
        press(&mut app, &[Action::Select(4)]);
        let titles = app
            .workload_rows()
            .iter()
            .map(|row| row.key().kind)
            .collect::<Vec<_>>();
        assert_eq!(
            titles,
            vec![EntityKind::VolcanoJob, EntityKind::Job, EntityKind::Deployment]
        );

        press(&mut app, &[Action::Down]);
        // the volcano job disappears between render and Enter
        let mut changed = snapshot(5);
        changed.volcano_jobs.clear();
        app.apply(Event::SnapshotArrived(Ok(changed)));
        press(&mut app, &[Action::Enter]);

        assert_eq!(app.view(), ViewState::DeploymentDetail);
        assert_eq!(
            app.slots().deployment.as_ref().map(|item| item.name.as_str()),
            Some("web")
        );
    }

    #[test]
    fn job_child_pod_back_returns_to_job_detail_once() {
        let mut app = app();
        press(&mut app, &[Action::Select(4), Action::Down, Action::Enter]);
        assert_eq!(app.view(), ViewState::JobDetail);
        assert_eq!(app.item_count(ViewState::JobDetail), 1);

        press(&mut app, &[Action::Enter]);
        assert_eq!(app.view(), ViewState::PodDetail);
        assert!(matches!(app.parent_link(), Some(ParentLink::JobDetail(key)) if key.name() == "report"));

        press(&mut app, &[Action::Back]);
        assert_eq!(app.view(), ViewState::JobDetail);
        assert!(app.parent_link().is_none());
        assert!(app.slots().pod.is_none());
        assert!(app.slots().job.is_some());

        press(&mut app, &[Action::Back]);
        assert_eq!(app.view(), ViewState::Workloads);
        assert_eq!(app.current_selection().selected_index, 1);
        assert!(app.slots().job.is_none());
    }

    #[test]
    fn back_to_parent_job_shows_latest_counters() {
        let mut app = app();
        press(&mut app, &[Action::Select(4), Action::Down, Action::Enter, Action::Enter]);
        assert_eq!(app.view(), ViewState::PodDetail);

        let mut later = snapshot(5);
        later.jobs[0].active = 0;
        later.jobs[0].succeeded = 1;
        app.apply(Event::SnapshotArrived(Ok(later)));
        press(&mut app, &[Action::Back]);

        assert_eq!(app.view(), ViewState::JobDetail);
        let job = app.slots().job.as_ref().map(|job| (job.active, job.succeeded));
        assert_eq!(job, Some((0, 1)));
        assert_invariants(&app);
    }

    #[test]
    fn tab_from_detail_advances_from_origin_tab() {
        let mut app = app();
        press(&mut app, &[Action::Select(0), Action::Down, Action::Enter]);
        assert_eq!(app.view(), ViewState::PodDetail);
        assert_eq!(app.active_tab(), ViewState::Topology);

        press(&mut app, &[Action::TabCycle]);
        assert_eq!(app.view(), ViewState::Overview);
        assert!(!app.detail_mode());
    }

    #[test]
    fn volcano_job_child_pod_records_parent() {
        let mut app = app();
        press(&mut app, &[Action::Select(4), Action::Enter]);
        assert_eq!(app.view(), ViewState::VolcanoJobDetail);
        press(&mut app, &[Action::Enter]);
        assert_eq!(app.view(), ViewState::PodDetail);
        assert!(matches!(
            app.parent_link(),
            Some(ParentLink::VolcanoJobDetail(_))
        ));
        press(&mut app, &[Action::Back]);
        assert_eq!(app.view(), ViewState::VolcanoJobDetail);
    }

    #[test]
    fn queue_job_drill_keeps_single_level_memory() {
        let mut app = app();
        press(&mut app, &[Action::Select(9), Action::Enter]);
        assert_eq!(app.view(), ViewState::QueueDetail);
        assert_eq!(app.item_count(ViewState::QueueDetail), 1);

        press(&mut app, &[Action::Enter]);
        assert_eq!(app.view(), ViewState::VolcanoJobDetail);
        assert!(app.parent_link().is_none());

        press(&mut app, &[Action::Back]);
        assert_eq!(app.view(), ViewState::Queues);
        assert!(!app.detail_mode());
    }

    #[test]
    fn topology_lists_pods_under_their_node() {
        let mut app = app();
        press(&mut app, &[Action::Select(0)]);
        assert_eq!(app.view(), ViewState::Topology);
        assert_eq!(app.item_count(ViewState::Topology), 8);

        press(&mut app, &[Action::Enter]);
        assert_eq!(app.view(), ViewState::NodeDetail);
        press(&mut app, &[Action::Back, Action::Down, Action::Enter]);
        assert_eq!(app.view(), ViewState::PodDetail);
        press(&mut app, &[Action::Back]);
        assert_eq!(app.view(), ViewState::Topology);
    }

    #[test]
    fn select_and_tab_reset_navigation_state() {
        let mut app = app();
        press(&mut app, &[Action::Select(3), Action::Down, Action::Enter]);
        press(&mut app, &[Action::Select(3)]);
        assert_eq!(app.view(), ViewState::Pods);
        assert!(!app.detail_mode());
        assert_eq!(app.current_selection().selected_index, 0);

        press(&mut app, &[Action::Select(0), Action::TabCycle]);
        assert_eq!(app.view(), ViewState::Overview);
        press(&mut app, &[Action::TabCycle]);
        assert_eq!(app.view(), ViewState::Nodes);
    }

    #[test]
    fn sort_advances_cycle_and_resets_selection() {
        let mut app = app();
        press(&mut app, &[Action::Select(3), Action::Down, Action::Down]);
        let first = app.sort_spec(ViewState::Pods);
        press(&mut app, &[Action::Sort]);
        assert_ne!(app.sort_spec(ViewState::Pods), first);
        assert_eq!(app.current_selection().selected_index, 0);

        let cycle = ViewState::Pods.sort_cycle().len();
        for _ in 1..cycle {
            press(&mut app, &[Action::Sort]);
        }
        assert_eq!(app.sort_spec(ViewState::Pods), first);
    }

    #[test]
    fn list_search_accepts_restricted_characters() {
        let mut app = app();
        press(&mut app, &[Action::Select(3), Action::Down, Action::EnterSearch]);
        assert!(app.search_mode());
        assert_eq!(app.current_selection().selected_index, 0);

        press(
            &mut app,
            &[
                Action::TextInput('p'),
                Action::TextInput('#'),
                Action::TextInput('3'),
                Action::Space,
                Action::Backspace,
            ],
        );
        assert_eq!(app.search(), "p3");
        assert_eq!(app.visible_pods().len(), 1);

        press(&mut app, &[Action::Enter]);
        assert!(!app.search_mode());
        assert_eq!(app.search(), "p3");

        press(&mut app, &[Action::EnterSearch]);
        assert_eq!(app.search(), "");
        press(&mut app, &[Action::TextInput('p'), Action::Back]);
        assert_eq!(app.search(), "");
        assert!(!app.search_mode());
    }

    #[test]
    fn namespace_filter_picker_applies_and_clears() {
        let mut app = app();
        press(&mut app, &[Action::Select(3), Action::EnterFilter]);
        assert!(app.filter_mode());
        assert_eq!(
            app.filter_options(),
            vec![None, Some("default".to_string()), Some("ml".to_string())]
        );

        press(&mut app, &[Action::Down, Action::Down, Action::Enter]);
        assert_eq!(app.namespace_filter(), Some("ml"));
        assert_eq!(app.visible_pods().len(), 2);

        press(&mut app, &[Action::EnterFilter, Action::Up, Action::Back]);
        assert_eq!(app.namespace_filter(), Some("ml"));

        press(&mut app, &[Action::ClearFilter]);
        assert_eq!(app.namespace_filter(), None);
        assert_eq!(app.visible_pods().len(), 7);
    }

    #[test]
    fn logs_flow_fetches_schedules_and_guards_stale_results() {
        let mut app = app();
        press(&mut app, &[Action::Select(3)]);
        let AppCommand::FetchLogs(request) = press(&mut app, &[Action::EnterLogs]) else {
            panic!("expected log fetch");
        };
        assert!(app.logs_mode());
        assert_eq!(request.target.container.as_deref(), Some("main"));

        let command = app.apply(Event::AsyncResult(AsyncResult::Logs {
            target: request.target.clone(),
            result: Ok("a\nb".to_string()),
        }));
        let AppCommand::ScheduleLogRefresh {
            target, generation, ..
        } = command
        else {
            panic!("expected refresh schedule");
        };
        let tick = app.apply(Event::AsyncResult(AsyncResult::LogTick { target, generation }));
        assert!(matches!(tick, AppCommand::FetchLogs(_)));

        press(&mut app, &[Action::Back]);
        assert!(!app.logs_mode());
        let late = app.apply(Event::AsyncResult(AsyncResult::Logs {
            target: request.target,
            result: Err(CoreError::LogFetch("late".to_string())),
        }));
        assert_eq!(late, AppCommand::None);
        assert_eq!(app.logs().line_count(), 0);
        assert_eq!(app.logs().last_error(), None);
    }

    #[test]
    fn logs_tab_switches_container_and_drops_old_results() {
        let mut app = app();
        press(&mut app, &[Action::Select(3), Action::EnterLogs]);
        let old = app.logs().target().cloned();

        let AppCommand::FetchLogs(request) = press(&mut app, &[Action::TabCycle]) else {
            panic!("expected container switch fetch");
        };
        assert_eq!(request.target.container.as_deref(), Some("sidecar"));

        if let Some(old) = old {
            let command = app.apply(Event::AsyncResult(AsyncResult::Logs {
                target: old,
                result: Ok("stale".to_string()),
            }));
            assert_eq!(command, AppCommand::None);
        }
        assert_eq!(app.logs().line_count(), 0);
    }

    #[test]
    fn log_search_pauses_and_back_refetches() {
        let mut app = app();
        press(&mut app, &[Action::Select(3), Action::EnterLogs]);
        press(&mut app, &[Action::EnterSearch]);
        assert!(app.logs_search_mode());
        press(
            &mut app,
            &[Action::TextInput('E'), Action::TextInput('#'), Action::Space],
        );
        assert_eq!(app.logs().search(), "E# ");
        assert_eq!(press(&mut app, &[Action::Enter]), AppCommand::None);

        let command = press(&mut app, &[Action::Back]);
        assert!(matches!(command, AppCommand::FetchLogs(_)));
        assert!(app.logs_mode());
        assert!(!app.logs_search_mode());
    }

    #[test]
    fn logs_require_a_pod() {
        let mut app = app();
        press(&mut app, &[Action::Select(2)]);
        assert_eq!(press(&mut app, &[Action::EnterLogs]), AppCommand::None);
        assert!(!app.logs_mode());
        assert!(app.status().is_some());
    }

    #[test]
    fn unsupported_action_reports_once() {
        let mut app = app();
        press(&mut app, &[Action::Select(3), Action::EnterActions]);
        assert!(app.action_menu_mode());
        assert_eq!(app.action_menu_items().len(), 3);

        let command = press(&mut app, &[Action::Enter]);
        assert_eq!(command, AppCommand::None);
        assert!(!app.action_menu_mode());
        assert_eq!(app.status(), Some("unsupported operation: Describe"));

        press(&mut app, &[Action::Down]);
        assert_eq!(app.status(), None);
    }

    #[test]
    fn supported_action_opens_output_and_drops_stale_ids() {
        let capabilities = Capabilities {
            describe: true,
            yaml: true,
            commands: true,
        };
        let mut app = App::new(capabilities, None);
        app.apply(Event::SnapshotArrived(Ok(snapshot(0))));
        app.set_custom_actions(vec![CustomAction {
            name: "vcctl".to_string(),
            command: "vcctl".to_string(),
            args: vec!["job".to_string(), "view".to_string(), "{name}".to_string()],
            description: String::new(),
            kinds: vec![EntityKind::VolcanoJob],
            timeout_secs: 20,
        }]);

        press(&mut app, &[Action::Select(4), Action::EnterActions]);
        assert_eq!(app.action_menu_items().len(), 3);
        let AppCommand::RunAction(first) = press(&mut app, &[Action::Down, Action::Down, Action::Enter])
        else {
            panic!("expected command");
        };
        assert!(matches!(first.kind, ActionKind::Command(ref invocation) if invocation.args[2] == "train"));

        press(&mut app, &[Action::EnterActions]);
        let AppCommand::RunAction(second) = press(&mut app, &[Action::Enter]) else {
            panic!("expected describe");
        };
        assert_eq!(
            second.kind,
            ActionKind::Describe(EntityKey::namespaced(EntityKind::VolcanoJob, "ml", "train"))
        );

        app.apply(Event::AsyncResult(AsyncResult::CommandOutput {
            request_id: first.request_id,
            title: first.title,
            result: Ok("old".to_string()),
        }));
        assert!(!app.command_output_mode());

        app.apply(Event::AsyncResult(AsyncResult::CommandOutput {
            request_id: second.request_id,
            title: second.title,
            result: Ok("Name: train\nQueue: gpu".to_string()),
        }));
        assert!(app.command_output_mode());
        assert_eq!(app.command_output_page(), vec!["Name: train", "Queue: gpu"]);

        press(&mut app, &[Action::Back]);
        assert!(!app.command_output_mode());
        assert_eq!(app.mode(), InputMode::Normal);
    }

    #[test]
    fn failed_snapshot_keeps_last_good_data() {
        let mut app = app();
        app.apply(Event::SnapshotArrived(Err(CoreError::DataFetch(
            "connection refused".to_string(),
        ))));
        assert_eq!(app.banner(), Some("data fetch failed: connection refused"));
        assert_eq!(app.snapshot().pods.len(), 7);
        assert!(app.running());

        app.apply(Event::SnapshotArrived(Ok(snapshot(5))));
        assert_eq!(app.banner(), None);
        assert_eq!(app.history().len(), 2);
    }

    #[test]
    fn repeated_snapshot_is_not_ingested_twice() {
        let mut app = app();
        app.apply(Event::SnapshotArrived(Ok(snapshot(0))));
        assert_eq!(app.history().len(), 1);
    }

    #[test]
    fn export_carries_visible_rows() {
        let mut app = app();
        press(&mut app, &[Action::Select(3), Action::EnterSearch, Action::TextInput('4')]);
        press(&mut app, &[Action::Enter]);
        let AppCommand::Export(request) = press(&mut app, &[Action::EnterExport]) else {
            panic!("expected export");
        };
        assert_eq!(request.view, ViewState::Pods);
        assert_eq!(request.rows.as_array().map(Vec::len), Some(1));
        assert_eq!(request.rows[0]["name"], "p4");
    }

    #[test]
    fn quit_stops_the_loop_from_any_mode() {
        let mut app = app();
        press(&mut app, &[Action::Select(3), Action::EnterLogs, Action::Quit]);
        assert!(!app.running());
    }
}
