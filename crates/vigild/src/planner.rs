//! Turn classification: conversation turn in, `ActionPlan` out.
//!
//! Layered: cheap deterministic fast paths first (an explicit port number
//! never needs a model call), then a narrow extraction call for port
//! queries that name an application, then the full JSON-constrained
//! classification. A lexical safety net runs last and can only retarget
//! the log name, never change the chosen action.

use crate::prompts;
use crate::reasoning::{CompletionOptions, ReasoningService};
use std::sync::OnceLock;
use tracing::{debug, info, warn};
use vigil_shared::{ActionPlan, Transcript, RECENT_TURN_WINDOW};

/// Symptom vocabulary that makes an application-log search more useful
/// than a system-log one.
const HANG_TERMS: &[&str] = &[
    "hang",
    "freeze",
    "lag",
    "stuck",
    "unresponsive",
    "not responding",
    "slow",
];

/// Phrases that mean "show me every port" without naming one.
const LIST_PORT_PHRASES: &[&str] = &["ports", "all ports", "show ports", "list ports"];

fn port_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"\bport\s*(\d+)\b").expect("valid port regex"))
}

/// Decide what to do about the latest user turn.
///
/// Never fails: any classification or parse error degrades to a `Chat`
/// plan carrying the error text, so the session always has something to
/// say.
pub async fn plan(
    reasoning: &dyn ReasoningService,
    transcript: &Transcript,
    now: chrono::DateTime<chrono::Local>,
) -> ActionPlan {
    let Some(latest) = transcript.latest_user() else {
        return ActionPlan::Chat {
            response: "What would you like me to investigate?".to_string(),
        };
    };
    let lower = latest.to_lowercase();

    // Explicit port number: no model needed at all.
    if let Some(caps) = port_regex().captures(&lower) {
        if let Ok(port) = caps[1].parse::<u16>() {
            info!("[>] fast path: explicit port {}", port);
            return apply_safety_net(
                ActionPlan::PortAnalysis {
                    port: Some(port),
                    process_name: None,
                },
                &lower,
            );
        }
    }

    // Port query naming an app ("which ports is mysql using?"): one tiny
    // extraction call resolves the executable name.
    if lower.contains("port") {
        match reasoning
            .complete(
                "You extract process names from user messages.",
                &prompts::extract_process_name(latest),
                &CompletionOptions::extraction(),
            )
            .await
        {
            Ok(reply) => {
                let name = reply.trim().to_lowercase();
                if !name.is_empty() && name != "none" {
                    info!("[>] fast path: port analysis for process '{}'", name);
                    return apply_safety_net(
                        ActionPlan::PortAnalysis {
                            port: None,
                            process_name: Some(name),
                        },
                        &lower,
                    );
                }
            }
            Err(e) => warn!("process-name extraction failed, continuing: {}", e),
        }

        if LIST_PORT_PHRASES.iter().any(|p| lower.contains(p)) {
            info!("[>] fast path: list all ports");
            return ActionPlan::PortAnalysis {
                port: None,
                process_name: None,
            };
        }
    }

    // Full classification.
    let system = prompts::planner_system(now);
    let user = prompts::planner_user(transcript, RECENT_TURN_WINDOW);
    let plan = match reasoning
        .complete(&system, &user, &CompletionOptions::json_plan())
        .await
        .and_then(|reply| ActionPlan::from_json(&reply))
    {
        Ok(plan) => plan,
        Err(e) => {
            warn!("classification failed: {}", e);
            return ActionPlan::Chat {
                response: format!("I encountered an error planning my next step: {}", e),
            };
        }
    };
    debug!("[<] classified plan: {:?}", plan);

    apply_safety_net(plan, &lower)
}

/// When the user describes hang or slowness symptoms, a search of the
/// system log will come up empty; retarget the plan at the application
/// log. Only the log name changes.
fn apply_safety_net(mut plan: ActionPlan, lower_msg: &str) -> ActionPlan {
    let symptomatic = HANG_TERMS.iter().any(|t| lower_msg.contains(t));
    if !symptomatic {
        return plan;
    }
    if matches!(
        plan,
        ActionPlan::SearchLogs { .. } | ActionPlan::HybridAnalysis { .. }
    ) && plan.log_name() != Some("Application")
    {
        info!("safety net: retargeting plan at the Application log");
        plan.override_log_name("Application");
    }
    plan
}
