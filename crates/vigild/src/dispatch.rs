//! Plan dispatcher: routes an `ActionPlan` to the tool that serves it and
//! renders the reply.
//!
//! Deterministic plans (boot time, process stats, watchlist, ports) are
//! rendered entirely from telemetry; only log-backed plans reach the
//! reasoning service, via the synthesizer.

use crate::query::EventQueryEngine;
use crate::log_source::LogSource;
use crate::reasoning::ReasoningService;
use crate::synthesize;
use crate::telemetry::{PortBinding, ProcessStat, TelemetryProvider};
use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone};
use std::collections::BTreeMap;
use tracing::{info, warn};
use vigil_shared::{ActionPlan, EventRecord, QueryFilter, Result, SearchParams, VigilError};

/// Record caps per plan shape.
const MOST_RECENT_CAP: usize = 5;
const SEARCH_CAP: usize = 500;
const HYBRID_CAP: usize = 100;

/// Everything a dispatched plan may touch.
pub struct Toolbox<'a> {
    pub engine: &'a EventQueryEngine,
    pub logs: &'a dyn LogSource,
    pub telemetry: &'a dyn TelemetryProvider,
    pub reasoning: &'a dyn ReasoningService,
    /// Executable-name needle to display-name map for the major-apps check
    pub watchlist: &'a BTreeMap<String, String>,
}

/// Result of one dispatched plan: the rendered reply plus the events it
/// was grounded on (empty for non-log plans).
#[derive(Debug)]
pub struct DispatchOutcome {
    pub reply: String,
    pub events: Vec<EventRecord>,
}

impl DispatchOutcome {
    fn text(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            events: Vec::new(),
        }
    }
}

/// Execute one plan.
pub async fn dispatch(
    tools: &Toolbox<'_>,
    plan: ActionPlan,
    now: DateTime<Local>,
) -> Result<DispatchOutcome> {
    match plan {
        ActionPlan::Chat { response } => Ok(DispatchOutcome::text(response)),
        ActionPlan::GetBootTime => boot_time(tools, now),
        ActionPlan::GetProcessStats { process_name } => process_stats(tools, &process_name).await,
        ActionPlan::CheckMajorApps => check_major_apps(tools).await,
        ActionPlan::PortAnalysis { port, process_name } => {
            port_analysis(tools, port, process_name.as_deref()).await
        }
        ActionPlan::SearchLogs {
            params,
            find_most_recent,
            analysis_goal,
        } => search_logs(tools, &params, find_most_recent, &analysis_goal).await,
        ActionPlan::HybridAnalysis {
            params,
            analysis_goal,
        } => hybrid_analysis(tools, &params, &analysis_goal, now).await,
    }
}

fn boot_time(tools: &Toolbox<'_>, now: DateTime<Local>) -> Result<DispatchOutcome> {
    let booted = tools.telemetry.boot_time()?;
    let uptime = now.signed_duration_since(booted);
    let days = uptime.num_days();
    let hours = uptime.num_hours() % 24;
    let minutes = uptime.num_minutes() % 60;

    Ok(DispatchOutcome::text(format!(
        "**Your PC has been on since:**\n\n📅 **Boot Time:** {}\n\n⏱️ **Total Uptime:** {} days, {} hours, and {} minutes.",
        booted.format("%A, %B %d, %Y at %I:%M %p"),
        days,
        hours,
        minutes
    )))
}

async fn process_stats(tools: &Toolbox<'_>, process_name: &str) -> Result<DispatchOutcome> {
    let query = process_name.trim().to_lowercase();
    if query.is_empty() {
        return Err(VigilError::MissingParameter("process_name".to_string()));
    }

    let processes = tools.telemetry.processes().await?;
    let matches: Vec<&ProcessStat> = processes
        .iter()
        .filter(|p| p.name.to_lowercase().contains(&query))
        .collect();

    if matches.is_empty() {
        return Ok(DispatchOutcome::text(format!(
            "I couldn't find any running process matching **{}**.",
            process_name
        )));
    }

    let total_cpu: f32 = matches.iter().map(|p| p.cpu_percent).sum();
    let total_mem_pct: f32 = matches.iter().map(|p| p.mem_percent).sum();
    let total_rss: u64 = matches.iter().map(|p| p.rss_bytes).sum();

    let mut reply = format!(
        "📊 **Stats for '{}'** ({} process{}):\n\n- **CPU:** {:.1}%\n- **RAM:** {:.0} MB ({:.1}% of total)",
        process_name,
        matches.len(),
        if matches.len() == 1 { "" } else { "es" },
        total_cpu,
        mb(total_rss),
        total_mem_pct
    );

    // More than one distinct executable matched the query: break the
    // aggregate down per name so the user can tell them apart.
    let mut by_name: BTreeMap<&str, (usize, u64)> = BTreeMap::new();
    for p in &matches {
        let entry = by_name.entry(p.name.as_str()).or_default();
        entry.0 += 1;
        entry.1 += p.rss_bytes;
    }
    if by_name.len() > 1 {
        let mut breakdown: Vec<(&str, usize, u64)> = by_name
            .into_iter()
            .map(|(name, (count, rss))| (name, count, rss))
            .collect();
        breakdown.sort_by(|a, b| b.2.cmp(&a.2));
        reply.push_str("\n\n**Breakdown:**");
        for (name, count, rss) in breakdown {
            reply.push_str(&format!(
                "\n- **{}**: {} process{}, {:.0} MB",
                name,
                count,
                if count == 1 { "" } else { "es" },
                mb(rss)
            ));
        }
    }

    Ok(DispatchOutcome::text(reply))
}

async fn check_major_apps(tools: &Toolbox<'_>) -> Result<DispatchOutcome> {
    let processes = tools.telemetry.processes().await?;

    // display name -> (process count, total RSS)
    let mut groups: BTreeMap<&str, (usize, u64)> = BTreeMap::new();
    for process in &processes {
        let name_lower = process.name.to_lowercase();
        if let Some(display) = tools
            .watchlist
            .iter()
            .find(|(needle, _)| name_lower.contains(needle.as_str()))
            .map(|(_, display)| display.as_str())
        {
            let entry = groups.entry(display).or_default();
            entry.0 += 1;
            entry.1 += process.rss_bytes;
        }
    }

    if groups.is_empty() {
        return Ok(DispatchOutcome::text(
            "None of the well-known heavy applications I watch for are currently running.",
        ));
    }

    let mut ranked: Vec<(&str, usize, u64)> = groups
        .into_iter()
        .map(|(display, (count, rss))| (display, count, rss))
        .collect();
    ranked.sort_by(|a, b| b.2.cmp(&a.2));

    let mut reply = String::from("**Major Applications Currently Running:**\n");
    for (display, count, rss) in ranked {
        reply.push_str(&format!(
            "\n🔹 **{}**: {} process{}, using **{:.0} MB** RAM",
            display,
            count,
            if count == 1 { "" } else { "es" },
            mb(rss)
        ));
    }
    Ok(DispatchOutcome::text(reply))
}

async fn port_analysis(
    tools: &Toolbox<'_>,
    port: Option<u16>,
    process_name: Option<&str>,
) -> Result<DispatchOutcome> {
    let bindings = tools.telemetry.connections().await?;

    // Keep only bindings with an identified owner; one entry per port.
    let mut by_port: BTreeMap<u16, PortBinding> = BTreeMap::new();
    for binding in bindings.into_iter().filter(|b| b.pid.is_some()) {
        by_port.entry(binding.local_port).or_insert(binding);
    }

    if let Some(port) = port {
        return Ok(match by_port.get(&port) {
            Some(binding) => DispatchOutcome::text(format!(
                "🔌 **Port {} Analysis:**\n\n- **Process:** {} (PID {})\n- **Status:** {}",
                port,
                binding.process_name,
                binding.pid.unwrap_or(0),
                binding.status
            )),
            None => DispatchOutcome::text(format!("No application is using port **{}**.", port)),
        });
    }

    if let Some(query) = process_name {
        let query_lower = query.to_lowercase();
        let owned: Vec<&PortBinding> = by_port
            .values()
            .filter(|b| b.process_name.to_lowercase().contains(&query_lower))
            .collect();
        if owned.is_empty() {
            return Ok(DispatchOutcome::text(format!(
                "Process **{}** is not using any ports.",
                query
            )));
        }
        let mut reply = format!("🔌 **Ports used by '{}':**\n", query);
        for binding in owned {
            reply.push_str(&format!(
                "\n- **Port {}**: {} (PID {}), {}",
                binding.local_port,
                binding.process_name,
                binding.pid.unwrap_or(0),
                binding.status
            ));
        }
        return Ok(DispatchOutcome::text(reply));
    }

    if by_port.is_empty() {
        return Ok(DispatchOutcome::text(
            "No active ports with an identified owning process were found.",
        ));
    }
    let mut reply = String::from("**All Active Ports:**\n");
    for (port, binding) in &by_port {
        reply.push_str(&format!(
            "\n- **Port {}**: {} (PID {}), {}",
            port,
            binding.process_name,
            binding.pid.unwrap_or(0),
            binding.status
        ));
    }
    Ok(DispatchOutcome::text(reply))
}

async fn search_logs(
    tools: &Toolbox<'_>,
    params: &SearchParams,
    find_most_recent: bool,
    analysis_goal: &str,
) -> Result<DispatchOutcome> {
    let log_name = params.log_name.as_deref().unwrap_or("System");
    let max_records = if find_most_recent {
        MOST_RECENT_CAP
    } else {
        SEARCH_CAP
    };
    let (start, end) = parse_window(params);

    let filter = QueryFilter::new(log_name, max_records)
        .between(start, end)
        .with_keywords(params.keywords.clone())
        .with_severities(params.severity_filter.clone());
    let events = tools.engine.query(tools.logs, &filter)?;

    if events.is_empty() {
        return Ok(DispatchOutcome::text(format!(
            "I searched the **{}** log but found **0 events** matching your criteria. Try widening the time range or removing keywords.",
            log_name
        )));
    }

    info!("synthesizing answer over {} events", events.len());
    let reply =
        synthesize::analyze_logs(tools.reasoning, analysis_goal, &events, find_most_recent).await;
    Ok(DispatchOutcome { reply, events })
}

async fn hybrid_analysis(
    tools: &Toolbox<'_>,
    params: &SearchParams,
    analysis_goal: &str,
    now: DateTime<Local>,
) -> Result<DispatchOutcome> {
    // Live snapshot first.
    let cpu = tools.telemetry.cpu_percent().await?;
    let memory = tools.telemetry.memory().await?;
    let mut processes = tools.telemetry.processes().await?;
    processes.retain(|p| p.cpu_percent > 0.1);
    processes.sort_by(|a, b| b.cpu_percent.total_cmp(&a.cpu_percent));
    processes.truncate(10);

    let mut snapshot = format!(
        "CPU usage: {:.1}%\nMemory: {:.1} GB / {:.1} GB ({:.1}%)\nTop processes by CPU:\n",
        cpu,
        gb(memory.used_bytes),
        gb(memory.total_bytes),
        memory.percent
    );
    if processes.is_empty() {
        snapshot.push_str("(no process above 0.1% CPU)\n");
    }
    for p in &processes {
        snapshot.push_str(&format!(
            "- {} (PID {}): {:.1}% CPU, {:.0} MB RAM\n",
            p.name, p.pid, p.cpu_percent, mb(p.rss_bytes)
        ));
    }

    // Then today's relevant log slice unless the planner chose a window.
    let log_name = params.log_name.as_deref().unwrap_or("Application");
    let (mut start, mut end) = parse_window(params);
    if start.is_none() && end.is_none() {
        let today = now.date_naive();
        start = local_datetime(today, NaiveTime::MIN);
        end = local_datetime(
            today,
            NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN),
        );
    }

    let filter = QueryFilter::new(log_name, HYBRID_CAP)
        .between(start, end)
        .with_keywords(params.keywords.clone())
        .with_severities(params.severity_filter.clone());
    let events = match tools.engine.query(tools.logs, &filter) {
        Ok(events) => events,
        Err(e) => {
            // The live snapshot is still worth reporting on its own.
            warn!("hybrid log query failed, continuing with snapshot only: {}", e);
            Vec::new()
        }
    };

    let reply = synthesize::analyze_hybrid(tools.reasoning, analysis_goal, &snapshot, &events).await;
    Ok(DispatchOutcome { reply, events })
}

fn mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

fn gb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0 * 1024.0)
}

/// Turn planner date/time strings into a concrete local window. Start
/// time defaults to midnight, end time to a second before the next day.
/// Unparseable fragments are dropped rather than failing the plan.
fn parse_window(params: &SearchParams) -> (Option<DateTime<Local>>, Option<DateTime<Local>>) {
    let start = params.start_date.as_deref().and_then(|d| {
        let date = NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()?;
        let time = parse_time(params.start_time.as_deref()).unwrap_or(NaiveTime::MIN);
        local_datetime(date, time)
    });
    let end = params.end_date.as_deref().and_then(|d| {
        let date = NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()?;
        let time = parse_time(params.end_time.as_deref())
            .or_else(|| NaiveTime::from_hms_opt(23, 59, 59))
            .unwrap_or(NaiveTime::MIN);
        local_datetime(date, time)
    });
    (start, end)
}

fn parse_time(text: Option<&str>) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text?, "%H:%M").ok()
}

fn local_datetime(date: NaiveDate, time: NaiveTime) -> Option<DateTime<Local>> {
    Local.from_local_datetime(&date.and_time(time)).single()
}
