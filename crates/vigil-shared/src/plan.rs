//! Action-plan schema and strict parser.
//!
//! The reasoning service answers the planner prompt with exactly one JSON
//! object matching one of seven shapes. That JSON comes from an external
//! text model, so it is never trusted: the parser rejects unknown action
//! tags and missing required fields instead of propagating partially
//! filled structures. It does tolerate the usual wire quirks (prose around
//! the object, numbers arriving as strings, explicit nulls).

use crate::error::VigilError;
use crate::event::Severity;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Partially-specified log query as produced by the planner. Dates and
/// keywords are optional; the dispatcher fills in defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Named log to scan ("System", "Application", "Security")
    pub log_name: Option<String>,
    /// "YYYY-MM-DD"
    pub start_date: Option<String>,
    /// "HH:MM"
    pub start_time: Option<String>,
    pub end_date: Option<String>,
    pub end_time: Option<String>,
    pub keywords: Vec<String>,
    pub severity_filter: Option<Vec<Severity>>,
}

/// The orchestrator's structured decision for one conversational turn.
/// Exactly one variant is ever active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionPlan {
    Chat {
        response: String,
    },
    GetBootTime,
    SearchLogs {
        params: SearchParams,
        find_most_recent: bool,
        analysis_goal: String,
    },
    HybridAnalysis {
        params: SearchParams,
        analysis_goal: String,
    },
    GetProcessStats {
        process_name: String,
    },
    CheckMajorApps,
    PortAnalysis {
        port: Option<u16>,
        process_name: Option<String>,
    },
}

impl ActionPlan {
    /// Parse a reasoning-service reply into a plan.
    ///
    /// The reply may wrap the JSON object in prose; everything outside the
    /// outermost braces is discarded before parsing.
    pub fn from_json(text: &str) -> Result<Self, VigilError> {
        let json_text = extract_json(text);
        let value: Value = serde_json::from_str(&json_text)
            .map_err(|e| VigilError::Parse(format!("not valid JSON: {}", e)))?;

        let action = value
            .get("action")
            .and_then(|a| a.as_str())
            .ok_or_else(|| VigilError::Parse("missing 'action' tag".to_string()))?;

        match action {
            "chat" => {
                let response = required_str(&value, "response")?;
                Ok(ActionPlan::Chat { response })
            }
            "get_boot_time" => Ok(ActionPlan::GetBootTime),
            "search_logs" => {
                let params = parse_search_params(value.get("params"));
                let find_most_recent = bool_field(&value, "find_most_recent");
                let analysis_goal = goal_field(&value)
                    .unwrap_or_else(|| "Analyze the user's query.".to_string());
                Ok(ActionPlan::SearchLogs {
                    params,
                    find_most_recent,
                    analysis_goal,
                })
            }
            "hybrid_analysis" => {
                let params = parse_search_params(value.get("params"));
                let analysis_goal = goal_field(&value)
                    .unwrap_or_else(|| "Analyze real-time system issues.".to_string());
                Ok(ActionPlan::HybridAnalysis {
                    params,
                    analysis_goal,
                })
            }
            "get_process_stats" => {
                // An empty name is surfaced later as MissingParameter so
                // the user gets a rephrase hint rather than a parse error.
                let process_name = value
                    .get("params")
                    .and_then(|p| p.get("process_name"))
                    .and_then(|n| n.as_str())
                    .unwrap_or_default()
                    .to_string();
                Ok(ActionPlan::GetProcessStats { process_name })
            }
            "check_major_apps" => Ok(ActionPlan::CheckMajorApps),
            "port_analysis" => {
                let params = value.get("params").cloned().unwrap_or(Value::Null);
                let port = parse_port(params.get("port"));
                let process_name = params
                    .get("process_name")
                    .and_then(|n| n.as_str())
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string());
                Ok(ActionPlan::PortAnalysis { port, process_name })
            }
            other => Err(VigilError::UnknownAction(other.to_string())),
        }
    }

    /// Log scope of a log-backed plan, if this plan has one.
    pub fn log_name(&self) -> Option<&str> {
        match self {
            ActionPlan::SearchLogs { params, .. } | ActionPlan::HybridAnalysis { params, .. } => {
                params.log_name.as_deref()
            }
            _ => None,
        }
    }

    /// Force the log scope of a log-backed plan. No effect on other plans.
    pub fn override_log_name(&mut self, log_name: &str) {
        match self {
            ActionPlan::SearchLogs { params, .. } | ActionPlan::HybridAnalysis { params, .. } => {
                params.log_name = Some(log_name.to_string());
            }
            _ => {}
        }
    }
}

/// Extract the outermost JSON object from text that may have prose around it.
fn extract_json(text: &str) -> String {
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            return text[start..=end].to_string();
        }
    }
    text.to_string()
}

fn required_str(value: &Value, field: &str) -> Result<String, VigilError> {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .ok_or_else(|| VigilError::Parse(format!("missing required field '{}'", field)))
}

/// Read a boolean that may live at the top level or inside params.
fn bool_field(value: &Value, field: &str) -> bool {
    value
        .get(field)
        .or_else(|| value.get("params").and_then(|p| p.get(field)))
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

/// The analysis goal is emitted at the top level or inside params
/// depending on the model's mood; accept both.
fn goal_field(value: &Value) -> Option<String> {
    value
        .get("analysis_request")
        .or_else(|| value.get("params").and_then(|p| p.get("analysis_request")))
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn parse_search_params(value: Option<&Value>) -> SearchParams {
    let Some(v) = value else {
        return SearchParams::default();
    };

    let str_field = |field: &str| -> Option<String> {
        v.get(field)
            .and_then(|x| x.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
    };

    let keywords = v
        .get("search_keywords")
        .and_then(|k| k.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|x| match x {
                    // Numeric event ids sometimes arrive as JSON numbers
                    Value::Number(n) => Some(n.to_string()),
                    Value::String(s) if !s.is_empty() => Some(s.clone()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    let severity_filter = v
        .get("event_type_filter")
        .and_then(|f| f.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|x| x.as_str())
                .map(Severity::from_label)
                .collect::<Vec<_>>()
        })
        .filter(|list: &Vec<Severity>| !list.is_empty());

    SearchParams {
        log_name: str_field("log_type"),
        start_date: str_field("start_date"),
        start_time: str_field("start_time"),
        end_date: str_field("end_date"),
        end_time: str_field("end_time"),
        keywords,
        severity_filter,
    }
}

/// Port numbers arrive as JSON numbers or decimal strings.
fn parse_port(value: Option<&Value>) -> Option<u16> {
    match value? {
        Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        Value::String(s) => s.trim().parse::<u16>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_plan() {
        let plan = ActionPlan::from_json(r#"{"action": "chat", "response": "hello"}"#).unwrap();
        assert_eq!(
            plan,
            ActionPlan::Chat {
                response: "hello".to_string()
            }
        );
    }

    #[test]
    fn test_chat_without_response_is_rejected() {
        let err = ActionPlan::from_json(r#"{"action": "chat"}"#).unwrap_err();
        assert!(matches!(err, VigilError::Parse(_)));
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let err = ActionPlan::from_json(r#"{"action": "reboot_machine"}"#).unwrap_err();
        assert!(err.to_string().contains("reboot_machine"));
    }

    #[test]
    fn test_parse_search_logs_full() {
        let plan = ActionPlan::from_json(
            r#"{
                "action": "search_logs",
                "params": {
                    "log_type": "System",
                    "search_keywords": ["1074", "restart"],
                    "start_date": "2026-08-29",
                    "end_date": "2026-08-30",
                    "event_type_filter": ["Error", "Warning"],
                    "find_most_recent": true,
                    "analysis_request": "User is checking for the last restart."
                }
            }"#,
        )
        .unwrap();

        match plan {
            ActionPlan::SearchLogs {
                params,
                find_most_recent,
                analysis_goal,
            } => {
                assert_eq!(params.log_name.as_deref(), Some("System"));
                assert_eq!(params.keywords, vec!["1074", "restart"]);
                assert_eq!(
                    params.severity_filter,
                    Some(vec![Severity::Error, Severity::Warning])
                );
                assert!(find_most_recent);
                assert!(analysis_goal.contains("last restart"));
            }
            other => panic!("expected SearchLogs, got {:?}", other),
        }
    }

    #[test]
    fn test_numeric_keywords_are_stringified() {
        let plan = ActionPlan::from_json(
            r#"{"action": "search_logs", "params": {"search_keywords": [6008, "crash"]}}"#,
        )
        .unwrap();
        match plan {
            ActionPlan::SearchLogs { params, .. } => {
                assert_eq!(params.keywords, vec!["6008", "crash"]);
            }
            other => panic!("expected SearchLogs, got {:?}", other),
        }
    }

    #[test]
    fn test_port_as_string_and_number() {
        let from_string =
            ActionPlan::from_json(r#"{"action": "port_analysis", "params": {"port": "8080"}}"#)
                .unwrap();
        let from_number =
            ActionPlan::from_json(r#"{"action": "port_analysis", "params": {"port": 8080}}"#)
                .unwrap();
        assert_eq!(from_string, from_number);
        assert_eq!(
            from_string,
            ActionPlan::PortAnalysis {
                port: Some(8080),
                process_name: None
            }
        );
    }

    #[test]
    fn test_json_wrapped_in_prose() {
        let plan =
            ActionPlan::from_json("Sure, here is my plan: {\"action\": \"get_boot_time\"} done")
                .unwrap();
        assert_eq!(plan, ActionPlan::GetBootTime);
    }

    #[test]
    fn test_override_log_name_only_touches_log_plans() {
        let mut search = ActionPlan::from_json(
            r#"{"action": "search_logs", "params": {"log_type": "System"}}"#,
        )
        .unwrap();
        search.override_log_name("Application");
        assert_eq!(search.log_name(), Some("Application"));

        let mut chat = ActionPlan::Chat {
            response: "hi".to_string(),
        };
        chat.override_log_name("Application");
        assert_eq!(chat.log_name(), None);
    }

    #[test]
    fn test_hybrid_goal_defaults_when_absent() {
        let plan = ActionPlan::from_json(r#"{"action": "hybrid_analysis", "params": {}}"#).unwrap();
        match plan {
            ActionPlan::HybridAnalysis { analysis_goal, .. } => {
                assert!(!analysis_goal.is_empty());
            }
            other => panic!("expected HybridAnalysis, got {:?}", other),
        }
    }
}
