//! Prompt templates for every reasoning-service call.
//!
//! All calls use fixed instruction templates built here; nothing
//! free-form ever reaches the service. The planner prompt carries the
//! closed catalogue of seven response shapes plus the NLU heuristics for
//! mapping time phrases, app names and tense onto plan parameters.

use chrono::{DateTime, Days, Local};
use vigil_shared::{EventRecord, Transcript};

/// How many events are quoted into a synthesis context.
pub const MAX_CONTEXT_EVENTS: usize = 10;
/// Message snippet length inside a synthesis context.
pub const MESSAGE_SNIPPET_CHARS: usize = 300;

/// System prompt for the plan classification call. Closed catalogue of
/// seven JSON response shapes with worked examples.
pub fn planner_system(now: DateTime<Local>) -> String {
    let current_time = now.format("%Y-%m-%d %A, %I:%M %p");
    let today = now.date_naive().format("%Y-%m-%d");
    let yesterday = now
        .date_naive()
        .checked_sub_days(Days::new(1))
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| today.to_string());

    format!(
        r#"You are an event-log investigation agent with real-time process, uptime and port tools.
Analyze the user's intent (in any language) in the context of the chat history and decide on a plan.
Today's date and time is: {current_time}.

You MUST respond with exactly one JSON object in one of these seven formats:

FORMAT 1: CHAT (follow-up or conversational question about events already presented)
{{"action": "chat", "response": "Your conversational answer. Helpful, concise, markdown, in the user's language."}}

FORMAT 2: GET BOOT TIME (uptime query, e.g. "when did my pc last boot?", "system uptime", "pc kab se on hai?")
{{"action": "get_boot_time"}}

FORMAT 3: SEARCH LOGS (past-tense or "last event" query, e.g. "what happened yesterday?", "last restart")
{{"action": "search_logs", "params": {{"log_type": "System", "search_keywords": [], "start_date": "YYYY-MM-DD", "start_time": "HH:MM", "end_date": "YYYY-MM-DD", "end_time": "HH:MM", "event_type_filter": ["Error", "Warning"], "find_most_recent": false, "analysis_request": "one-sentence summary of the user's goal"}}}}
All params are optional; only set what the query implies.

FORMAT 4: HYBRID ANALYSIS (present-tense issue, e.g. "why is my PC slow right now?")
Check both current stats and recent logs.
{{"action": "hybrid_analysis", "params": {{"log_type": "Application", "event_type_filter": ["Error", "Warning"], "start_date": "{today}", "end_date": "{today}"}}, "analysis_request": "one-sentence summary of the user's goal"}}

FORMAT 5: GET PROCESS STATS (CPU/RAM of one specific running program)
{{"action": "get_process_stats", "params": {{"process_name": "chrome"}}}}

FORMAT 6: CHECK MAJOR APPS (overview of well-known heavy applications)
{{"action": "check_major_apps"}}

FORMAT 7: PORT ANALYSIS (network port or application network query)
{{"action": "port_analysis", "params": {{"port": 8080, "process_name": "mysqld"}}}}
Both params optional; omit both to list every port.

How to fill search params (use your NLU):

* Process names: map colloquial app names to the executable name.
  "visual studio code" or "vs code" -> "code"; "visual studio" -> "devenv"; "google chrome" -> "chrome";
  "microsoft edge" -> "msedge"; "mysql server" -> "mysqld"; "postgres database" -> "postgres"; "word" -> "winword".

* Windows Update: "when was pc last updated?" -> search_logs, log_type "System", search_keywords ["19"], find_most_recent true.

* Application crash/hang: "when did chrome last crash?" -> search_logs, log_type "Application",
  search_keywords ["1000", "1002", "chrome"], find_most_recent true.

* Application start/stop: "when was chrome.exe last opened?" -> search_logs, log_type "Security",
  search_keywords ["4688", "4689", "chrome.exe"], find_most_recent true
  (note in analysis_request that process auditing must be enabled).

* System stability: crash -> ["6008"], restart/shutdown -> ["1074"], event-log service start/stop -> ["6005", "6006"],
  all on log_type "System". "last restart"/"last shutdown" -> find_most_recent true.

* Performance complaints: present tense ("is slow", "is hanging") -> hybrid_analysis, log_type "Application",
  event_type_filter ["Error", "Warning"], dates today. Past tense ("was slow", "hung last night") -> search_logs,
  log_type "Application", dates for the mentioned time.

* Time phrases (be precise):
  - "last X" / "most recent X": find_most_recent true and NO dates.
  - "yesterday": start_date "{yesterday}", end_date "{yesterday}".
  - "last night": start_date "{yesterday}", start_time "20:00", end_date "{today}", end_time "06:00".
  - "this morning": start_date "{today}", start_time "06:00", end_date "{today}", end_time "11:00".
  - explicit ranges ("between 3 am and 4 am of 6th november"): set both dates and times accordingly.
  - no time mentioned: default to today ({today}).

Respond with only the JSON object, nothing else."#
    )
}

/// User prompt for classification: the recent transcript plus the ask.
pub fn planner_user(transcript: &Transcript, window: usize) -> String {
    format!(
        "CHAT HISTORY:\n{}\nBased on the latest user message in the context of the history, what is your plan? Respond with only the JSON object.",
        transcript.render_recent(window)
    )
}

/// Extraction prompt: free text to lowercase process name, "none" when
/// there is no real application in the message.
pub fn extract_process_name(user_msg: &str) -> String {
    format!(
        r#"Extract the real application or process name from this message:

"{user_msg}"

Reply with only the process name in lowercase, no sentences.
Examples:
- "visual studio code" -> code
- "vs code" -> code
- "visual studio" -> devenv
- "google chrome" -> chrome
- "microsoft edge" -> msedge
- "mysql server" -> mysqld
- "postgres database" -> postgres
- "docker desktop" -> docker
- "which app uses port 8080" -> none

If unsure, reply "none"."#
    )
}

/// System prompt for log-only synthesis. When the goal asks for the last
/// or most recent event, the entire answer must be one direct sentence
/// naming the first (most recent) event's time.
pub fn log_analysis_system(analysis_goal: &str, event_count: usize, is_last_event_query: bool) -> String {
    let answer_rules = if is_last_event_query {
        r#"The user asked for the "last" or "most recent" event. Your entire response MUST be a single, direct sentence: the most recent event is the FIRST one in the list; state its time and a brief summary.
Example: "The last user-initiated restart (Event 1074) was on November 4th at 08:00 PM."
Do NOT produce timeline, pattern or root-cause sections for this query."#
    } else {
        r#"Provide a full investigation in this format:
1. Executive Summary: a 2-3 sentence answer.
2. Timeline of Key Events: the 3-5 most important events.
3. Pattern Identification: any recurring errors or warnings.
4. Hypothesized Root Cause: what do you think caused this?
5. Next Steps: what the user should check next."#
    };

    format!(
        r#"You are a senior system administrator and expert event-log analyst.
A user is investigating an issue. Their goal is: "{analysis_goal}"
You have been given {event_count} events matching their query.

{answer_rules}

Use markdown for formatting."#
    )
}

/// System prompt for hybrid synthesis: correlate a live telemetry
/// snapshot with recent log events.
pub fn hybrid_analysis_system(analysis_goal: &str) -> String {
    format!(
        r#"You are a senior system administrator.
A user is investigating a real-time issue. Their goal is: "{analysis_goal}"
You have two sets of data: the current resource snapshot, and a list of recent relevant log events.
Correlate and synthesize them into one high-level summary containing:

1. Executive Summary: 2-3 sentences answering the question, linking the snapshot to the logs.
2. Real-time Finding: what the resource snapshot shows (high CPU? high RAM? which process?).
3. Historical Finding: what the recent logs show (hangs? errors? warnings?).
4. Hypothesized Root Cause (Correlation): how the two findings relate.
5. Next Steps: what to check next.

Correlation instructions:
* If the snapshot shows a high-CPU process, look for that process name in the log events.
* If the logs show an error for a specific process, check whether it appears in the snapshot.
* If no clear correlation exists, say so.
* If no events were found, report on the real-time snapshot only.
Use markdown for formatting."#
    )
}

/// Render events into a synthesis context: capped count, capped snippets.
pub fn events_context(events: &[EventRecord]) -> String {
    if events.is_empty() {
        return "No relevant events were found in the specified time range.\n".to_string();
    }
    let mut out = String::new();
    for event in events.iter().take(MAX_CONTEXT_EVENTS) {
        let snippet: String = event
            .message
            .chars()
            .take(MESSAGE_SNIPPET_CHARS)
            .collect::<String>()
            .trim()
            .to_string();
        out.push_str(&format!(
            "- [{}] ID {} | {} | {} | Msg: {}...\n",
            event.severity,
            event.event_id,
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            event.source,
            snippet
        ));
    }
    out
}

/// System prompt for single-event explanation cards.
pub fn explain_system() -> String {
    "You are a system expert who provides detailed technical analysis in simple language. Always respond with valid JSON only.".to_string()
}

/// User prompt for a single-event explanation card.
pub fn explain_user(event: &EventRecord) -> String {
    let snippet: String = event.message.chars().take(800).collect();
    format!(
        r#"Generate a comprehensive explanation for this event:
Event ID: {}, Type: {}, Source: {}, Message: {}
Provide the response in this EXACT JSON format:
{{
    "title": "Brief title with emoji",
    "simple": "One clear sentence explaining what happened in plain English",
    "detail": "4-5 sentences of technical detail, root cause analysis, impact and context",
    "severity": "info/warning/error",
    "action": "2-3 sentences with specific actionable steps",
    "technical": "What triggered this event and which components were involved",
    "impact": "What this means for performance, security and stability",
    "prevention": "How to prevent similar events in the future",
    "icon": "Single emoji that represents this event"
}}"#,
        event.event_id, event.severity, event.source, snippet
    )
}
