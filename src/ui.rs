use chrono::Utc;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{
    Block, Borders, Cell, Clear, Paragraph, Row, Sparkline, Table, TableState, Wrap,
};

use crate::app::{App, InputMode, ParentLink, TopologyRow, WorkloadRow};
use crate::history::{Counter, MetricField, MetricsHistory, Trend};
use crate::logs::LogState;
use crate::model::{
    EntityKey, Listed, NodeInfo, PodInfo, Severity, SortOrder, ViewState, format_bytes,
    format_cpu_millicores, format_optional_bytes, format_optional_cpu, format_rate, human_age,
};

const BG: Color = Color::Rgb(9, 15, 25);
const PANEL: Color = Color::Rgb(16, 27, 44);
const ACCENT: Color = Color::Rgb(52, 211, 153);
const MUTED: Color = Color::Rgb(140, 156, 178);
const WARN: Color = Color::Rgb(251, 191, 36);
const ERROR: Color = Color::Rgb(248, 113, 113);
const HIGHLIGHT: Color = Color::Rgb(24, 36, 58);
const PL_A: Color = Color::Rgb(17, 94, 89);
const PL_B: Color = Color::Rgb(30, 64, 175);
const PL_C: Color = Color::Rgb(55, 48, 163);
const PL_D: Color = Color::Rgb(82, 24, 124);

#[derive(Debug, Clone, Default)]
pub struct HeaderContext {
    pub context: String,
    pub cluster: String,
}

/// Draws one frame. Row budgets here must agree with the reserved-row
/// constants the controller pages with.
pub fn render(frame: &mut Frame, app: &App, header: &HeaderContext) {
    let area = frame.area();
    frame.render_widget(Block::default().style(Style::default().bg(BG)), area);

    if app.logs_mode() {
        let root = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(3),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(area);
        render_header(frame, root[0], app, header);
        render_logs(frame, root[1], app);
        render_status_line(frame, root[2], app);
        render_footer(frame, root[3], app);
        return;
    }

    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(4),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);

    render_header(frame, root[0], app, header);
    render_tabs(frame, root[1], app);
    render_body(frame, root[2], app);
    render_status_line(frame, root[3], app);
    render_footer(frame, root[4], app);

    if app.filter_mode() {
        render_filter_picker(frame, app);
    } else if app.action_menu_mode() {
        render_action_menu(frame, app);
    } else if app.command_output_mode() {
        render_command_output(frame, root[2], app);
    }
}

fn render_header(frame: &mut Frame, area: Rect, app: &App, header: &HeaderContext) {
    let mut spans = Vec::new();
    push_powerline_segment(&mut spans, " VCDASH ", Color::Black, ACCENT, PL_A);
    push_powerline_segment(
        &mut spans,
        format!(" {} ", compact_text(&header.context, 18)),
        Color::White,
        PL_A,
        PL_B,
    );
    push_powerline_segment(
        &mut spans,
        format!(
            " {} ",
            compact_text(&display_cluster_endpoint(&header.cluster), 26)
        ),
        Color::White,
        PL_B,
        PL_C,
    );
    push_powerline_segment(
        &mut spans,
        format!(" ns:{} ", compact_text(app.namespace_filter().unwrap_or("all"), 16)),
        Color::White,
        PL_C,
        PL_D,
    );
    let sort = app
        .sort_spec(app.view().owning_list())
        .map(|(field, order)| {
            let arrow = match order {
                SortOrder::Asc => "↑",
                SortOrder::Desc => "↓",
            };
            format!(" sort:{}{arrow} ", field.label())
        })
        .unwrap_or_else(|| " sort:- ".to_string());
    push_powerline_segment(&mut spans, sort, Color::White, PL_D, BG);

    let snapshot = app.snapshot();
    let right = Line::from(vec![
        Span::styled(
            format!(
                "nodes {}  pods {}  ",
                snapshot.nodes.len(),
                snapshot.pods.len()
            ),
            Style::default().fg(MUTED),
        ),
        Span::styled(
            format!(
                "refreshed {} ago ",
                human_age(snapshot.refreshed_at, Utc::now())
            ),
            Style::default().fg(Color::Rgb(147, 197, 253)),
        ),
    ]);
    let right_width = spans_width(&right.spans) as u16;
    if area.width <= right_width + 42 {
        frame.render_widget(
            Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
            area,
        );
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(right_width)])
        .split(area);
    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
        chunks[0],
    );
    frame.render_widget(
        Paragraph::new(right)
            .style(Style::default().bg(BG))
            .alignment(Alignment::Right),
        chunks[1],
    );
}

fn render_tabs(frame: &mut Frame, area: Rect, app: &App) {
    let active = app.active_tab();
    let mut spans = Vec::new();
    for (index, view) in ViewState::PRIMARY.iter().enumerate() {
        let slot = (index + 1) % 10;
        let style = if *view == active {
            Style::default()
                .fg(Color::Black)
                .bg(ACCENT)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(MUTED)
        };
        spans.push(Span::styled(format!(" {slot} {} ", view.title()), style));
        spans.push(Span::raw(" "));
    }
    if app.view().is_detail() {
        spans.push(Span::styled(
            format!("› {}", app.view().title()),
            Style::default().fg(WARN).add_modifier(Modifier::BOLD),
        ));
    }
    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
        area,
    );
}

fn render_body(frame: &mut Frame, area: Rect, app: &App) {
    let history = app.history();
    match app.view() {
        ViewState::Overview => render_overview(frame, area, app),
        ViewState::Nodes => {
            let nodes = app.visible_nodes();
            let rows = nodes
                .iter()
                .map(|node| node_row(node, history))
                .collect::<Vec<_>>();
            render_list(
                frame,
                area,
                app,
                ListSpec {
                    title: list_title(app, nodes.len()),
                    headers: &[
                        "NAME", "STATUS", "ROLES", "CPU", "MEMORY", "ACCEL", "PODS", "RX", "TX",
                        "AGE",
                    ],
                    widths: &[22, 18, 12, 16, 18, 7, 5, 10, 10, 5],
                },
                rows,
            );
        }
        ViewState::Pods => {
            let pods = app.visible_pods();
            let rows = pods
                .iter()
                .map(|pod| pod_row(pod, history))
                .collect::<Vec<_>>();
            render_list(
                frame,
                area,
                app,
                ListSpec {
                    title: list_title(app, pods.len()),
                    headers: &[
                        "NAMESPACE", "NAME", "READY", "STATUS", "RESTARTS", "CPU", "MEMORY",
                        "ACCEL", "NODE", "AGE",
                    ],
                    widths: &[14, 30, 6, 18, 8, 9, 10, 5, 16, 5],
                },
                rows,
            );
        }
        ViewState::Workloads => {
            let workloads = app.workload_rows();
            let rows = workloads.iter().map(workload_row).collect::<Vec<_>>();
            render_list(
                frame,
                area,
                app,
                ListSpec {
                    title: list_title(app, workloads.len()),
                    headers: &["KIND", "NAMESPACE", "NAME", "STATUS", "PROGRESS", "AGE"],
                    widths: &[12, 14, 32, 12, 34, 5],
                },
                rows,
            );
        }
        ViewState::Network => {
            let services = app.visible_services();
            let now = Utc::now();
            let rows = services
                .iter()
                .map(|service| {
                    plain_row(vec![
                        service.namespace.clone(),
                        service.name.clone(),
                        service.service_type.clone(),
                        service.cluster_ip.clone(),
                        service.ports.clone(),
                        human_age(service.created_at, now),
                    ])
                })
                .collect::<Vec<_>>();
            render_list(
                frame,
                area,
                app,
                ListSpec {
                    title: list_title(app, services.len()),
                    headers: &["NAMESPACE", "NAME", "TYPE", "CLUSTER-IP", "PORTS", "AGE"],
                    widths: &[14, 28, 12, 16, 28, 5],
                },
                rows,
            );
        }
        ViewState::Storage => {
            let pvcs = app.visible_pvcs();
            let now = Utc::now();
            let rows = pvcs
                .iter()
                .map(|pvc| {
                    let color = if pvc.status == "Bound" {
                        Color::White
                    } else {
                        WARN
                    };
                    ListRow {
                        cells: vec![
                            pvc.namespace.clone(),
                            pvc.name.clone(),
                            pvc.status.clone(),
                            pvc.volume.clone(),
                            format_bytes(pvc.capacity_bytes),
                            pvc.storage_class.clone(),
                            human_age(pvc.created_at, now),
                        ],
                        color,
                    }
                })
                .collect::<Vec<_>>();
            render_list(
                frame,
                area,
                app,
                ListSpec {
                    title: list_title(app, pvcs.len()),
                    headers: &[
                        "NAMESPACE", "NAME", "STATUS", "VOLUME", "CAPACITY", "CLASS", "AGE",
                    ],
                    widths: &[14, 28, 9, 24, 9, 14, 5],
                },
                rows,
            );
        }
        ViewState::Events => {
            let events = app.visible_events();
            let now = Utc::now();
            let rows = events
                .iter()
                .map(|event| ListRow {
                    cells: vec![
                        human_age(event.last_seen, now),
                        event.event_type.clone(),
                        event.reason.clone(),
                        event.object.clone(),
                        event.count.to_string(),
                        event.message.clone(),
                    ],
                    color: if event.event_type == "Warning" {
                        WARN
                    } else {
                        Color::White
                    },
                })
                .collect::<Vec<_>>();
            render_list(
                frame,
                area,
                app,
                ListSpec {
                    title: list_title(app, events.len()),
                    headers: &["SEEN", "TYPE", "REASON", "OBJECT", "COUNT", "MESSAGE"],
                    widths: &[5, 8, 18, 30, 5, 60],
                },
                rows,
            );
        }
        ViewState::Alerts => {
            let alerts = app.visible_alerts();
            let rows = alerts
                .iter()
                .map(|alert| ListRow {
                    cells: vec![
                        alert.severity.label().to_string(),
                        alert.target.to_string(),
                        alert.reason.clone(),
                        alert.message.clone(),
                    ],
                    color: match alert.severity {
                        Severity::Critical => ERROR,
                        Severity::Warning => WARN,
                    },
                })
                .collect::<Vec<_>>();
            render_list(
                frame,
                area,
                app,
                ListSpec {
                    title: list_title(app, alerts.len()),
                    headers: &["SEVERITY", "TARGET", "REASON", "MESSAGE"],
                    widths: &[9, 40, 20, 60],
                },
                rows,
            );
        }
        ViewState::Queues => {
            let queues = app.visible_queues();
            let now = Utc::now();
            let rows = queues
                .iter()
                .map(|queue| {
                    plain_row(vec![
                        queue.name.clone(),
                        queue.state.clone(),
                        queue.weight.to_string(),
                        queue.running.to_string(),
                        queue.pending.to_string(),
                        queue.inqueue.to_string(),
                        human_age(queue.created_at, now),
                    ])
                })
                .collect::<Vec<_>>();
            render_list(
                frame,
                area,
                app,
                ListSpec {
                    title: list_title(app, queues.len()),
                    headers: &[
                        "NAME", "STATE", "WEIGHT", "RUNNING", "PENDING", "INQUEUE", "AGE",
                    ],
                    widths: &[24, 10, 7, 8, 8, 8, 5],
                },
                rows,
            );
        }
        ViewState::Topology => {
            let topology = app.topology_rows();
            let rows = topology
                .iter()
                .map(topology_row)
                .collect::<Vec<_>>();
            render_list(
                frame,
                area,
                app,
                ListSpec {
                    title: list_title(app, topology.len()),
                    headers: &["ENTITY", "STATUS", "CPU", "MEMORY", "ACCEL"],
                    widths: &[48, 18, 12, 14, 7],
                },
                rows,
            );
        }
        _ => render_detail(frame, area, app),
    }
}

struct ListSpec<'a> {
    title: String,
    headers: &'a [&'a str],
    widths: &'a [u16],
}

struct ListRow {
    cells: Vec<String>,
    color: Color,
}

fn plain_row(cells: Vec<String>) -> ListRow {
    ListRow {
        cells,
        color: Color::White,
    }
}

fn list_title(app: &App, count: usize) -> String {
    if app.search_mode() {
        format!("{} ({count})  /{}▏", app.view().title(), app.search())
    } else if app.search().is_empty() {
        format!("{} ({count})", app.view().title())
    } else {
        format!("{} ({count})  /{}", app.view().title(), app.search())
    }
}

fn render_list(frame: &mut Frame, area: Rect, app: &App, spec: ListSpec<'_>, rows: Vec<ListRow>) {
    let selection = app.current_selection();
    let page_size = app.page_size(app.view());
    let (start, end) = page_window(rows.len(), selection.scroll_offset, page_size);

    let header = Row::new(spec.headers.iter().map(|header| {
        Cell::from(*header).style(Style::default().add_modifier(Modifier::BOLD))
    }))
    .height(1)
    .style(Style::default().fg(ACCENT));

    let body = rows.into_iter().skip(start).take(end - start).map(|row| {
        let color = row.color;
        Row::new(
            row.cells
                .into_iter()
                .map(move |cell| Cell::from(cell).style(Style::default().fg(color))),
        )
    });

    let constraints = spec
        .widths
        .iter()
        .map(|width| Constraint::Length(*width))
        .collect::<Vec<_>>();
    let block = Block::default()
        .title(spec.title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ACCENT))
        .style(Style::default().bg(PANEL));

    let table = Table::new(body, constraints)
        .header(header)
        .block(block)
        .column_spacing(1)
        .row_highlight_style(Style::default().bg(HIGHLIGHT).add_modifier(Modifier::BOLD))
        .highlight_symbol("› ");

    let mut state = TableState::default();
    if end > start {
        state.select(Some(selection.selected_index.saturating_sub(start)));
    }
    frame.render_stateful_widget(table, area, &mut state);
}

fn page_window(len: usize, scroll_offset: usize, page_size: usize) -> (usize, usize) {
    let start = scroll_offset.min(len);
    let end = start.saturating_add(page_size.max(1)).min(len);
    (start, end)
}

fn node_row(node: &NodeInfo, history: &MetricsHistory) -> ListRow {
    let key = node.key();
    ListRow {
        cells: vec![
            node.name.clone(),
            node.status(),
            node.roles.clone(),
            format!(
                "{}/{}{}",
                format_optional_cpu(node.cpu_millis),
                format_cpu_millicores(node.cpu_capacity_millis),
                trend_suffix(history, &key, MetricField::Cpu, node.cpu_millis)
            ),
            format!(
                "{}/{}{}",
                format_optional_bytes(node.memory_bytes),
                format_bytes(node.memory_capacity_bytes),
                trend_suffix(history, &key, MetricField::Memory, node.memory_bytes)
            ),
            format!(
                "{}/{}",
                node.accelerators_allocated, node.accelerator_capacity
            ),
            node.pod_count.to_string(),
            format_rate(history.rate(&key, Counter::NetworkRx)),
            format_rate(history.rate(&key, Counter::NetworkTx)),
            human_age(node.created_at, Utc::now()),
        ],
        color: if node.ready { Color::White } else { ERROR },
    }
}

fn pod_row(pod: &PodInfo, history: &MetricsHistory) -> ListRow {
    let key = pod.key();
    ListRow {
        cells: vec![
            pod.namespace.clone(),
            pod.name.clone(),
            format!("{}/{}", pod.ready_containers, pod.total_containers),
            pod.status.clone(),
            pod.restarts.to_string(),
            format!(
                "{}{}",
                format_optional_cpu(pod.cpu_millis),
                trend_suffix(history, &key, MetricField::Cpu, pod.cpu_millis)
            ),
            format!(
                "{}{}",
                format_optional_bytes(pod.memory_bytes),
                trend_suffix(history, &key, MetricField::Memory, pod.memory_bytes)
            ),
            pod.accelerators.to_string(),
            pod.node.clone().unwrap_or_else(|| "-".to_string()),
            human_age(pod.created_at, Utc::now()),
        ],
        color: pod_color(pod),
    }
}

fn pod_color(pod: &PodInfo) -> Color {
    match pod.status.as_str() {
        "Running" | "Succeeded" | "Completed" => Color::White,
        "Pending" | "ContainerCreating" | "Terminating" => WARN,
        _ => ERROR,
    }
}

fn trend_suffix(
    history: &MetricsHistory,
    key: &EntityKey,
    field: MetricField,
    current: Option<u64>,
) -> String {
    match current {
        Some(value) => match history.trend(key, field, value as f64) {
            Trend::Stable => String::new(),
            trend => format!(" {}", trend.arrow()),
        },
        None => String::new(),
    }
}

fn workload_row(row: &WorkloadRow<'_>) -> ListRow {
    let now = Utc::now();
    match row {
        WorkloadRow::VolcanoJob(job) => ListRow {
            cells: vec![
                "VolcanoJob".to_string(),
                job.namespace.clone(),
                job.name.clone(),
                job.phase.clone(),
                format!(
                    "queue {} run {} pend {} min {}",
                    job.queue, job.running, job.pending, job.min_available
                ),
                human_age(job.created_at, now),
            ],
            color: match job.phase.as_str() {
                "Failed" | "Aborted" | "Terminated" => ERROR,
                "Pending" | "Inqueue" => WARN,
                _ => Color::White,
            },
        },
        WorkloadRow::Job(job) => ListRow {
            cells: vec![
                "Job".to_string(),
                job.namespace.clone(),
                job.name.clone(),
                job.status().to_string(),
                format!("{}/{} done", job.succeeded, job.completions),
                human_age(job.created_at, now),
            ],
            color: if job.failed > 0 { WARN } else { Color::White },
        },
        WorkloadRow::Deployment(item) => plain_row(vec![
            "Deployment".to_string(),
            item.namespace.clone(),
            item.name.clone(),
            format!("{}/{}", item.ready, item.replicas),
            format!("up-to-date {} available {}", item.updated, item.available),
            human_age(item.created_at, now),
        ]),
        WorkloadRow::StatefulSet(item) => plain_row(vec![
            "StatefulSet".to_string(),
            item.namespace.clone(),
            item.name.clone(),
            format!("{}/{}", item.ready, item.replicas),
            String::new(),
            human_age(item.created_at, now),
        ]),
        WorkloadRow::DaemonSet(item) => plain_row(vec![
            "DaemonSet".to_string(),
            item.namespace.clone(),
            item.name.clone(),
            format!("{}/{}", item.ready, item.desired),
            format!("available {}", item.available),
            human_age(item.created_at, now),
        ]),
    }
}

fn topology_row(row: &TopologyRow<'_>) -> ListRow {
    match row {
        TopologyRow::Node(node) => ListRow {
            cells: vec![
                format!("● {}", node.name),
                node.status(),
                format_optional_cpu(node.cpu_millis),
                format_optional_bytes(node.memory_bytes),
                format!(
                    "{}/{}",
                    node.accelerators_allocated, node.accelerator_capacity
                ),
            ],
            color: if node.ready { ACCENT } else { ERROR },
        },
        TopologyRow::Pod(pod) => ListRow {
            cells: vec![
                format!("  └ {}/{}", pod.namespace, pod.name),
                pod.status.clone(),
                format_optional_cpu(pod.cpu_millis),
                format_optional_bytes(pod.memory_bytes),
                pod.accelerators.to_string(),
            ],
            color: pod_color(pod),
        },
    }
}

fn render_overview(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .title("Cluster overview")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ACCENT))
        .style(Style::default().bg(PANEL));
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.width < 20 || inner.height < 4 {
        return;
    }

    let snapshot = app.snapshot();
    let history = app.history();
    let nodes = &snapshot.nodes;
    let ready_nodes = nodes.iter().filter(|node| node.ready).count();
    let cpu_used = nodes.iter().filter_map(|node| node.cpu_millis).sum::<u64>();
    let cpu_capacity = nodes.iter().map(|node| node.cpu_capacity_millis).sum::<u64>();
    let memory_used = nodes.iter().filter_map(|node| node.memory_bytes).sum::<u64>();
    let memory_capacity = nodes
        .iter()
        .map(|node| node.memory_capacity_bytes)
        .sum::<u64>();
    let accel_used = nodes
        .iter()
        .map(|node| node.accelerators_allocated)
        .sum::<u64>();
    let accel_capacity = nodes
        .iter()
        .map(|node| node.accelerator_capacity)
        .sum::<u64>();
    let metrics_available = nodes.iter().any(|node| node.cpu_millis.is_some());

    let pods = app.visible_pods();
    let count_phase = |phase: &str| pods.iter().filter(|pod| pod.phase == phase).count();
    let running_jobs = snapshot
        .volcano_jobs
        .iter()
        .filter(|job| job.phase == "Running")
        .count();
    let pending_jobs = snapshot
        .volcano_jobs
        .iter()
        .filter(|job| matches!(job.phase.as_str(), "Pending" | "Inqueue"))
        .count();
    let alerts = app.visible_alerts();
    let critical = alerts
        .iter()
        .filter(|alert| alert.severity == Severity::Critical)
        .count();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(inner);

    let summary = format!(
        "nodes {ready_nodes}/{} ready   pods {} running {} pending {} failed   volcano jobs {running_jobs} running {pending_jobs} waiting   queues {}",
        nodes.len(),
        count_phase("Running"),
        count_phase("Pending"),
        count_phase("Failed"),
        snapshot.queues.len(),
    );
    frame.render_widget(
        Paragraph::new(compact_text(&summary, inner.width as usize))
            .style(Style::default().fg(Color::Rgb(147, 197, 253))),
        chunks[0],
    );

    let bars = [
        GaugeBar {
            label: "CPU",
            value: if metrics_available {
                format!(
                    "{} / {}",
                    format_cpu_millicores(cpu_used),
                    format_cpu_millicores(cpu_capacity)
                )
            } else {
                "metrics unavailable".to_string()
            },
            percent: percent_of(cpu_used, cpu_capacity),
        },
        GaugeBar {
            label: "Memory",
            value: if metrics_available {
                format!(
                    "{} / {}",
                    format_bytes(memory_used),
                    format_bytes(memory_capacity)
                )
            } else {
                "metrics unavailable".to_string()
            },
            percent: percent_of(memory_used, memory_capacity),
        },
        GaugeBar {
            label: "Accelerators",
            value: format!("{accel_used} / {accel_capacity} allocated"),
            percent: percent_of(accel_used, accel_capacity),
        },
    ];
    for (index, bar) in bars.iter().enumerate() {
        render_metric_gauge(frame, chunks[1 + index], bar);
    }

    let network = format!(
        "network rx {}  tx {}",
        format_rate(history.cluster_rate(Counter::NetworkRx)),
        format_rate(history.cluster_rate(Counter::NetworkTx)),
    );
    frame.render_widget(
        Paragraph::new(network).style(Style::default().fg(Color::Rgb(94, 234, 212))),
        chunks[4],
    );

    let alert_color = if critical > 0 {
        ERROR
    } else if alerts.is_empty() {
        ACCENT
    } else {
        WARN
    };
    frame.render_widget(
        Paragraph::new(format!(
            "alerts {} ({critical} critical)",
            alerts.len()
        ))
        .style(Style::default().fg(alert_color)),
        chunks[5],
    );

    if chunks[6].height >= 3 {
        let trends = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[6]);
        render_series(
            frame,
            trends[0],
            "CPU history",
            &history.cluster_series(MetricField::Cpu),
        );
        render_series(
            frame,
            trends[1],
            "Memory history",
            &history.cluster_series(MetricField::Memory),
        );
    }
}

struct GaugeBar {
    label: &'static str,
    value: String,
    percent: u64,
}

fn percent_of(used: u64, capacity: u64) -> u64 {
    if capacity == 0 {
        return 0;
    }
    (used.saturating_mul(100) / capacity).min(100)
}

fn gauge_color(percent: u64) -> Color {
    if percent >= 90 {
        ERROR
    } else if percent >= 70 {
        WARN
    } else {
        ACCENT
    }
}

fn render_metric_gauge(frame: &mut Frame, area: Rect, bar: &GaugeBar) {
    if area.height == 0 || area.width == 0 {
        return;
    }

    let split = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    let label = format!("{:<13}{}", bar.label, bar.value);
    frame.render_widget(
        Paragraph::new(compact_text(
            &label,
            split[0].width.saturating_sub(1).max(1) as usize,
        ))
        .style(Style::default().fg(Color::White)),
        split[0],
    );

    let width = split[1].width as usize;
    if width == 0 {
        return;
    }
    let percent = bar.percent.min(100);
    let mut filled = width.saturating_mul(percent as usize) / 100;
    if percent > 0 && filled == 0 {
        filled = 1;
    }
    let meter_text = format!("{percent:>3}%");
    let meter_chars = meter_text.chars().collect::<Vec<_>>();
    let text_start = width.saturating_sub(meter_chars.len()) / 2;

    let spans = (0..width)
        .map(|idx| {
            let is_filled = idx < filled;
            let bg = if is_filled {
                gauge_color(percent)
            } else {
                Color::Rgb(30, 41, 59)
            };
            let fg = if is_filled { BG } else { MUTED };
            let ch = idx
                .checked_sub(text_start)
                .and_then(|offset| meter_chars.get(offset))
                .copied()
                .unwrap_or(' ');
            Span::styled(
                ch.to_string(),
                Style::default().fg(fg).bg(bg).add_modifier(Modifier::BOLD),
            )
        })
        .collect::<Vec<_>>();
    frame.render_widget(Paragraph::new(Line::from(spans)), split[1]);
}

fn render_series(frame: &mut Frame, area: Rect, title: &str, series: &[f64]) {
    let data = series
        .iter()
        .map(|value| value.max(0.0).round() as u64)
        .collect::<Vec<_>>();
    let sparkline = Sparkline::default()
        .block(
            Block::default()
                .title(title.to_string())
                .borders(Borders::ALL)
                .border_style(Style::default().fg(MUTED)),
        )
        .data(&data)
        .style(Style::default().fg(ACCENT));
    frame.render_widget(sparkline, area);
}

fn render_detail(frame: &mut Frame, area: Rect, app: &App) {
    let fields = app.detail_fields();
    let mut title = app
        .current_entity()
        .map(|key| format!("{} {}", app.view().title(), key.id))
        .unwrap_or_else(|| app.view().title().to_string());
    match app.parent_link() {
        Some(ParentLink::JobDetail(key)) => title.push_str(&format!("  ‹ Job {}", key.name())),
        Some(ParentLink::VolcanoJobDetail(key)) => {
            title.push_str(&format!("  ‹ VolcanoJob {}", key.name()))
        }
        None => {}
    }

    let has_children = matches!(
        app.view(),
        ViewState::JobDetail | ViewState::VolcanoJobDetail | ViewState::QueueDetail
    );
    if !has_children {
        let lines = fields
            .iter()
            .skip(app.detail_scroll_offset())
            .take(app.detail_page_size())
            .map(|(label, value)| field_line(label, value))
            .collect::<Vec<_>>();
        let paragraph = Paragraph::new(Text::from(lines))
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .title(title)
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(ACCENT))
                    .style(Style::default().bg(PANEL)),
            );
        frame.render_widget(paragraph, area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(3)])
        .split(area);
    let summary = fields
        .chunks(fields.len().div_ceil(3).max(1))
        .map(|group| {
            let mut spans = Vec::new();
            for (index, (label, value)) in group.iter().enumerate() {
                if index > 0 {
                    spans.push(Span::styled("  │  ", Style::default().fg(MUTED)));
                }
                spans.extend(field_line(label, value).spans);
            }
            Line::from(spans)
        })
        .collect::<Vec<_>>();
    frame.render_widget(
        Paragraph::new(Text::from(summary)).block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ACCENT))
                .style(Style::default().bg(PANEL)),
        ),
        chunks[0],
    );

    let history = app.history();
    if app.view() == ViewState::QueueDetail {
        let jobs = app.queue_jobs();
        let now = Utc::now();
        let rows = jobs
            .iter()
            .map(|job| {
                plain_row(vec![
                    job.namespace.clone(),
                    job.name.clone(),
                    job.phase.clone(),
                    job.running.to_string(),
                    job.pending.to_string(),
                    human_age(job.created_at, now),
                ])
            })
            .collect::<Vec<_>>();
        render_list(
            frame,
            chunks[1],
            app,
            ListSpec {
                title: format!("Jobs ({})", jobs.len()),
                headers: &["NAMESPACE", "NAME", "PHASE", "RUNNING", "PENDING", "AGE"],
                widths: &[14, 32, 12, 8, 8, 5],
            },
            rows,
        );
        return;
    }

    let pods = if app.view() == ViewState::JobDetail {
        app.job_pods()
    } else {
        app.volcano_job_pods()
    };
    let rows = pods
        .iter()
        .map(|pod| pod_row(pod, history))
        .collect::<Vec<_>>();
    render_list(
        frame,
        chunks[1],
        app,
        ListSpec {
            title: format!("Pods ({})", pods.len()),
            headers: &[
                "NAMESPACE", "NAME", "READY", "STATUS", "RESTARTS", "CPU", "MEMORY", "ACCEL",
                "NODE", "AGE",
            ],
            widths: &[14, 30, 6, 18, 8, 9, 10, 5, 16, 5],
        },
        rows,
    );
}

fn field_line(label: &str, value: &str) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            format!("{label}: "),
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::styled(value.to_string(), Style::default().fg(Color::White)),
    ])
}

fn render_logs(frame: &mut Frame, area: Rect, app: &App) {
    let logs = app.logs();
    let label = logs
        .target()
        .map(|target| target.label())
        .unwrap_or_else(|| "-".to_string());
    let state = match logs.state() {
        LogState::Idle => "idle",
        LogState::Loading => "loading",
        LogState::Streaming => "live",
        LogState::SearchActive => "search",
        LogState::Error => "error",
    };
    let mut title = format!("Logs {label} [{state}] {} lines", logs.line_count());
    if !logs.auto_refresh() {
        title.push_str(" paused");
    }
    if app.logs_search_mode() {
        title.push_str(&format!("  /{}▏", logs.search()));
    } else if !logs.search().is_empty() {
        title.push_str(&format!("  /{}", logs.search()));
    }

    let mut lines = Vec::new();
    if let Some(error) = logs.last_error() {
        lines.push(Line::from(Span::styled(
            error.to_string(),
            Style::default().fg(ERROR),
        )));
    }
    for (number, line) in logs.page() {
        lines.push(Line::from(vec![
            Span::styled(format!("{number:>6} "), Style::default().fg(MUTED)),
            Span::styled(line.to_string(), Style::default().fg(Color::White)),
        ]));
    }
    if lines.is_empty() && logs.state() == LogState::Loading {
        lines.push(Line::from(Span::styled(
            "loading…",
            Style::default().fg(MUTED),
        )));
    }

    let paragraph = Paragraph::new(Text::from(lines)).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(if logs.state() == LogState::Error {
                ERROR
            } else {
                ACCENT
            }))
            .style(Style::default().bg(PANEL)),
    );
    frame.render_widget(paragraph, area);
}

fn render_status_line(frame: &mut Frame, area: Rect, app: &App) {
    let line = if let Some(banner) = app.banner() {
        Line::from(Span::styled(
            format!(" ! {}", compact_text(banner, area.width.saturating_sub(4) as usize)),
            Style::default().fg(ERROR).add_modifier(Modifier::BOLD),
        ))
    } else if let Some(status) = app.status() {
        Line::from(Span::styled(
            format!(" {}", compact_text(status, area.width.saturating_sub(2) as usize)),
            Style::default().fg(Color::Rgb(147, 197, 253)),
        ))
    } else {
        Line::from("")
    };
    frame.render_widget(Paragraph::new(line).style(Style::default().bg(BG)), area);
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    let (label, hints) = match app.mode() {
        InputMode::Normal if app.view().is_detail() => (
            " nrm ",
            "j/k move  enter open  esc back  l logs  a actions  e export  r refresh  q quit"
                .to_string(),
        ),
        InputMode::Normal => (
            " nrm ",
            "1-9,0 views  tab next  enter open  f ns  c clear  / search  s sort  l logs  a actions  e export  q quit"
                .to_string(),
        ),
        InputMode::Filter => (" flt ", "j/k choose  enter apply  esc cancel".to_string()),
        InputMode::Search => (" srch ", format!("/{}", app.search())),
        InputMode::Logs => (
            " logs ",
            "j/k scroll  / search  space pause  tab container  esc close".to_string(),
        ),
        InputMode::LogsSearch => (" find ", format!("/{}", app.logs().search())),
        InputMode::ActionMenu => (" act ", "j/k choose  enter run  esc close".to_string()),
        InputMode::CommandOutput => (" out ", "j/k scroll  pgup/pgdn page  esc close".to_string()),
    };

    let mut spans = Vec::new();
    push_powerline_segment(&mut spans, label, Color::Black, ACCENT, PL_B);
    push_powerline_segment(
        &mut spans,
        format!(
            " {} ",
            compact_text(&hints, area.width.saturating_sub(10) as usize)
        ),
        Color::White,
        PL_B,
        BG,
    );
    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
        area,
    );
}

fn render_filter_picker(frame: &mut Frame, app: &App) {
    let area = centered_rect(40, 60, frame.area());
    frame.render_widget(Clear, area);

    let options = app.filter_options();
    let visible = area.height.saturating_sub(2).max(1) as usize;
    let start = app.filter_index().saturating_sub(visible.saturating_sub(1));
    let lines = options
        .iter()
        .enumerate()
        .skip(start)
        .take(visible)
        .map(|(index, option)| {
            let label = option.as_deref().unwrap_or("all namespaces");
            if index == app.filter_index() {
                Line::from(Span::styled(
                    format!("› {label}"),
                    Style::default()
                        .fg(Color::Black)
                        .bg(ACCENT)
                        .add_modifier(Modifier::BOLD),
                ))
            } else {
                Line::from(Span::styled(
                    format!("  {label}"),
                    Style::default().fg(Color::White),
                ))
            }
        })
        .collect::<Vec<_>>();

    let modal = Paragraph::new(lines).block(
        Block::default()
            .title("Namespace")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(ACCENT))
            .style(Style::default().bg(PANEL)),
    );
    frame.render_widget(modal, area);
}

fn render_action_menu(frame: &mut Frame, app: &App) {
    let area = centered_rect(56, 50, frame.area());
    frame.render_widget(Clear, area);

    let title = app
        .action_menu_target()
        .map(|target| format!("Actions {target}"))
        .unwrap_or_else(|| "Actions".to_string());
    let lines = app
        .action_menu_items()
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let selected = index == app.action_menu_index();
            let style = if selected {
                Style::default()
                    .fg(Color::Black)
                    .bg(ACCENT)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            Line::from(vec![
                Span::styled(format!(" {:<18}", item.label), style),
                Span::styled(format!(" {}", item.description), Style::default().fg(MUTED)),
            ])
        })
        .collect::<Vec<_>>();

    let modal = Paragraph::new(lines).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(ACCENT))
            .style(Style::default().bg(PANEL)),
    );
    frame.render_widget(modal, area);
}

fn render_command_output(frame: &mut Frame, area: Rect, app: &App) {
    frame.render_widget(Clear, area);
    let lines = app
        .command_output_page()
        .into_iter()
        .map(|line| Line::from(line.to_string()))
        .collect::<Vec<_>>();
    let paragraph = Paragraph::new(Text::from(lines))
        .block(
            Block::default()
                .title(app.command_output_title().to_string())
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ACCENT))
                .style(Style::default().bg(PANEL)),
        )
        .style(Style::default().fg(Color::White));
    frame.render_widget(paragraph, area);
}

fn push_powerline_segment(
    spans: &mut Vec<Span<'static>>,
    content: impl Into<String>,
    fg: Color,
    bg: Color,
    next_bg: Color,
) {
    spans.push(Span::styled(
        content.into(),
        Style::default().fg(fg).bg(bg).add_modifier(Modifier::BOLD),
    ));
    spans.push(Span::styled("", Style::default().fg(bg).bg(next_bg)));
}

fn spans_width(spans: &[Span<'_>]) -> usize {
    spans.iter().map(|span| span.content.chars().count()).sum()
}

fn compact_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }

    if max_chars <= 1 {
        return "…".to_string();
    }

    let mut out = value
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>();
    out.push('…');
    out
}

fn display_cluster_endpoint(cluster: &str) -> String {
    let trimmed = cluster.trim().trim_end_matches('/');
    trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed)
        .to_string()
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{
        HeaderContext, compact_text, display_cluster_endpoint, page_window, percent_of, render,
    };
    use crate::app::{App, Event};
    use crate::input::Action;
    use crate::model::{NodeInfo, PodInfo, Snapshot};
    use crate::provider::Capabilities;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn app_with_data() -> App {
        let mut app = App::new(Capabilities::default(), None);
        let snapshot = Snapshot {
            nodes: vec![NodeInfo {
                name: "gpu-1".to_string(),
                ready: true,
                cpu_capacity_millis: 8000,
                ..NodeInfo::default()
            }],
            pods: vec![PodInfo {
                namespace: "ml".to_string(),
                name: "trainer".to_string(),
                node: Some("gpu-1".to_string()),
                phase: "Running".to_string(),
                status: "Running".to_string(),
                ..PodInfo::default()
            }],
            ..Snapshot::default()
        };
        app.apply(Event::Resize {
            width: 120,
            height: 30,
        });
        app.apply(Event::SnapshotArrived(Ok(snapshot)));
        app
    }

    fn draw(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        terminal
            .draw(|frame| render(frame, app, &HeaderContext::default()))
            .unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn page_window_stays_inside_rows() {
        assert_eq!(page_window(10, 0, 4), (0, 4));
        assert_eq!(page_window(10, 8, 4), (8, 10));
        assert_eq!(page_window(3, 9, 4), (3, 3));
        assert_eq!(page_window(0, 0, 0), (0, 0));
    }

    #[test]
    fn text_helpers_truncate_and_strip_scheme() {
        assert_eq!(compact_text("abcdef", 4), "abc…");
        assert_eq!(compact_text("abc", 4), "abc");
        assert_eq!(display_cluster_endpoint("https://10.0.0.1:6443/"), "10.0.0.1:6443");
        assert_eq!(percent_of(50, 200), 25);
        assert_eq!(percent_of(5, 0), 0);
    }

    #[test]
    fn renders_pods_and_topology_views() {
        let mut app = app_with_data();
        app.apply(Event::Input(Action::Select(3)));
        assert!(draw(&app).contains("trainer"));

        app.apply(Event::Input(Action::Select(0)));
        let screen = draw(&app);
        assert!(screen.contains("gpu-1"));
        assert!(screen.contains("ml/trainer"));
    }

    #[test]
    fn overview_renders_on_tiny_terminal() {
        let app = app_with_data();
        let mut terminal = Terminal::new(TestBackend::new(20, 6)).unwrap();
        terminal
            .draw(|frame| render(frame, &app, &HeaderContext::default()))
            .unwrap();
    }
}
