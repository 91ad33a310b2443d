//! Investigation session: the long-lived conversational state machine.
//!
//! Owns the transcript, the explanation cache and the events backing the
//! current answer. One turn flows submit -> plan -> dispatch -> record;
//! turns are strictly sequential and every failure is rendered into a
//! user-facing reply rather than escaping.

use crate::config::VigilConfig;
use crate::dispatch::{self, Toolbox};
use crate::log_source::LogSource;
use crate::planner;
use crate::query::EventQueryEngine;
use crate::reasoning::{CompletionOptions, ReasoningService};
use crate::telemetry::TelemetryProvider;
use crate::prompts;
use chrono::Local;
use serde_json::Value;
use std::collections::BTreeMap;
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};
use vigil_shared::{
    ActionPlan, EventRecord, Explanation, ExplanationCache, QueryFilter, Result, Severity,
    Transcript,
};

pub struct InvestigationSession<L, T, R>
where
    L: LogSource,
    T: TelemetryProvider,
    R: ReasoningService,
{
    logs: L,
    telemetry: T,
    reasoning: R,
    engine: EventQueryEngine,
    watchlist: BTreeMap<String, String>,
    transcript: Transcript,
    explanations: ExplanationCache,
    /// Events backing the most recent log-based answer
    current_events: Vec<EventRecord>,
    progress: Option<UnboundedSender<String>>,
}

impl<L, T, R> InvestigationSession<L, T, R>
where
    L: LogSource,
    T: TelemetryProvider,
    R: ReasoningService,
{
    pub fn new(config: &VigilConfig, logs: L, telemetry: T, reasoning: R) -> Self {
        Self {
            logs,
            telemetry,
            reasoning,
            engine: EventQueryEngine::new(&config.engine),
            watchlist: config.watchlist.clone(),
            transcript: Transcript::new(),
            explanations: ExplanationCache::new(),
            current_events: Vec::new(),
            progress: None,
        }
    }

    /// Attach a status channel; each investigation step sends one line.
    pub fn with_progress(mut self, sender: UnboundedSender<String>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn current_events(&self) -> &[EventRecord] {
        &self.current_events
    }

    fn emit(&self, status: &str) {
        if let Some(sender) = &self.progress {
            // A closed receiver just means nobody is watching.
            let _ = sender.send(status.to_string());
        }
    }

    /// Run one conversational turn end to end and return the reply.
    pub async fn submit_turn(&mut self, text: &str) -> String {
        self.transcript.push_user(text);
        self.emit("🧠 Planning...");

        let plan = planner::plan(&self.reasoning, &self.transcript, Local::now()).await;
        info!("dispatching plan: {:?}", plan);
        self.emit(&status_for(&plan));

        let tools = Toolbox {
            engine: &self.engine,
            logs: &self.logs,
            telemetry: &self.telemetry,
            reasoning: &self.reasoning,
            watchlist: &self.watchlist,
        };

        let reply = match dispatch::dispatch(&tools, plan, Local::now()).await {
            Ok(outcome) => {
                self.current_events = outcome.events;
                outcome.reply
            }
            Err(e) => e.user_message(),
        };

        self.transcript.push_assistant(&reply);
        reply
    }

    /// Run a direct query outside the conversational flow, replacing the
    /// current event set.
    pub fn load_events(&mut self, filter: &QueryFilter) -> Result<&[EventRecord]> {
        self.current_events = self.engine.query(&self.logs, filter)?;
        Ok(&self.current_events)
    }

    /// Severity histogram of the current event set.
    pub fn severity_counts(&self) -> HashMap<Severity, usize> {
        let mut counts = HashMap::new();
        for event in &self.current_events {
            *counts.entry(event.severity).or_insert(0) += 1;
        }
        counts
    }

    /// Explain one event. Explanations are cached per event identity, and
    /// an unusable reply degrades to the deterministic fallback card.
    pub async fn explain_event(&mut self, event: &EventRecord) -> Explanation {
        if let Some(cached) = self.explanations.get(event) {
            debug!(
                "explanation cache hit for {}",
                ExplanationCache::key_for(event)
            );
            return cached.clone();
        }

        let explanation = match self
            .reasoning
            .complete(
                &prompts::explain_system(),
                &prompts::explain_user(event),
                &CompletionOptions::json_plan(),
            )
            .await
        {
            Ok(reply) => parse_explanation(&reply, event),
            Err(_) => Explanation::fallback(event),
        };

        self.explanations.insert(event, explanation.clone());
        explanation
    }
}

fn status_for(plan: &ActionPlan) -> String {
    match plan {
        ActionPlan::Chat { .. } => "💬 Replying...".to_string(),
        ActionPlan::GetBootTime => "⏱️ Checking boot time...".to_string(),
        ActionPlan::SearchLogs { params, .. } => format!(
            "🔍 Searching the {} log...",
            params.log_name.as_deref().unwrap_or("System")
        ),
        ActionPlan::HybridAnalysis { .. } => {
            "📡 Capturing a live snapshot and scanning recent logs...".to_string()
        }
        ActionPlan::GetProcessStats { process_name } => {
            format!("📊 Sampling processes matching '{}'...", process_name)
        }
        ActionPlan::CheckMajorApps => "📊 Checking major applications...".to_string(),
        ActionPlan::PortAnalysis { .. } => "🔌 Inspecting network ports...".to_string(),
    }
}

/// Lenient parse of an explanation reply: any missing or non-string field
/// falls back to the deterministic card for that field.
fn parse_explanation(reply: &str, event: &EventRecord) -> Explanation {
    let json_text = match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => reply,
    };
    let Ok(value) = serde_json::from_str::<Value>(json_text) else {
        return Explanation::fallback(event);
    };

    let fallback = Explanation::fallback(event);
    let field = |name: &str, default: &str| -> String {
        value
            .get(name)
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.to_string())
            .unwrap_or_else(|| default.to_string())
    };

    Explanation {
        title: field("title", &fallback.title),
        simple: field("simple", &fallback.simple),
        detail: field("detail", &fallback.detail),
        severity: field("severity", &fallback.severity),
        action: field("action", &fallback.action),
        technical: field("technical", &fallback.technical),
        impact: field("impact", &fallback.impact),
        prevention: field("prevention", &fallback.prevention),
        icon: field("icon", &fallback.icon),
    }
}
