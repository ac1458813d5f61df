//! Tool invocation through response gating, on one shared registry.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use witness_core::{ManualClock, Timestamp, TrackingConfig};
use witness_gate::{GateOutcome, Gatekeeper, InvalidReason};
use witness_registry::{ExecutionRegistry, ExecutionState};
use witness_tool::{track_fn, FnTool, Tool, ToolError, Toolbox, TrackedTool};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn session() -> (Arc<ExecutionRegistry>, Arc<ManualClock>) {
    init_tracing();
    let clock = Arc::new(ManualClock::new(Timestamp::from_millis(1_718_020_800_000)));
    let registry = ExecutionRegistry::with_clock(TrackingConfig::with_network_defaults(), clock.clone());
    (Arc::new(registry), clock)
}

fn dns_lookup() -> FnTool<impl Fn(Value) -> Result<Value, ToolError> + Send + Sync> {
    FnTool::new("dns_lookup", |_| Ok(json!({"ip": "93.184.216.34"})))
}

#[tokio::test]
async fn test_echoed_payload_passes_and_fabrication_fails() {
    let (registry, _) = session();
    let tool = TrackedTool::new(dns_lookup(), Arc::clone(&registry));
    let gate = Gatekeeper::new(Arc::clone(&registry));

    let output = tool.invoke(json!({"host": "example.com"})).await.unwrap();
    assert_eq!(output["ip"], json!("93.184.216.34"));
    assert!(output["execution_id"].as_str().unwrap().starts_with("dns_lookup_"));
    assert!(output["executed_at"].as_str().unwrap().ends_with('Z'));

    let honest = format!("example.com resolves to: {output}");
    assert_eq!(gate.filter(&honest), honest);

    let invented = r#"example.com resolves to: {"tool_name": "dns_lookup", "execution_id": "dns_lookup_1718020800000001_5eed1e55", "ip": "10.0.0.1"}"#;
    match gate.review(invented) {
        GateOutcome::Rejected { message, issues, .. } => {
            assert_eq!(issues.len(), 1);
            assert_eq!(issues[0].reason, InvalidReason::NotFound);
            assert_eq!(issues[0].tool_name.as_deref(), Some("dns_lookup"));
            assert!(message.contains("not_found"));
            assert!(!message.contains("10.0.0.1"));
        }
        GateOutcome::Passed { .. } => panic!("fabricated result passed the gate"),
    }
}

#[tokio::test]
async fn test_toolbox_session() {
    let (registry, _) = session();
    let mut toolbox = Toolbox::new(Arc::clone(&registry));
    toolbox.register(dns_lookup()).unwrap();
    toolbox
        .register(FnTool::new("ping", |_| Ok(json!({"latency_ms": 12.4, "loss": 0}))))
        .unwrap();
    toolbox
        .register(FnTool::new("traceroute", |_| {
            Err(ToolError::failed("no route to host"))
        }))
        .unwrap();

    let results = toolbox
        .invoke_all(vec![
            ("dns_lookup".to_string(), json!({"host": "example.com"})),
            ("ping".to_string(), json!({"host": "example.com"})),
            ("traceroute".to_string(), json!({"host": "example.com"})),
        ])
        .await;
    let dns = results[0].as_ref().unwrap();
    let ping = results[1].as_ref().unwrap();
    assert_eq!(results[2], Err(ToolError::failed("no route to host")));
    assert_eq!(registry.len(), 3);

    let gate = Gatekeeper::new(Arc::clone(&registry));
    let report = format!(
        "DNS: {{\"tool_name\": \"dns_lookup\", \"execution_id\": \"{}\"}}\n\
         Ping: {{\"tool_name\": \"ping\", \"execution_id\": \"{}\", \"loss\": 0}}",
        dns["execution_id"].as_str().unwrap(),
        ping["execution_id"].as_str().unwrap(),
    );
    let outcome = gate.review(&report);
    assert!(outcome.is_passed());

    let failed = registry
        .recent(3)
        .into_iter()
        .find(|r| r.tool_name == "traceroute")
        .unwrap();
    assert_eq!(failed.state, ExecutionState::Failed);
    let claim = format!(
        "Traceroute: {{'tool': 'traceroute', 'execution_id': '{}', 'hops': 7}}",
        failed.execution_id
    );
    let outcome = gate.review(&claim);
    assert_eq!(outcome.issues().len(), 1);
    assert_eq!(outcome.issues()[0].reason, InvalidReason::ExecutionIncomplete);
}

#[test]
fn test_synchronous_tool_and_retention() {
    let (registry, clock) = session();
    let ping = track_fn(Arc::clone(&registry), "ping", |_| {
        Ok::<_, String>(json!({"latency_ms": 8}))
    });
    let output = ping(json!({"host": "1.1.1.1"})).unwrap();
    let id = output["execution_id"].as_str().unwrap().to_string();

    let gate = Gatekeeper::new(Arc::clone(&registry));
    let text = format!("Latency 8 ms (execution_id: {id})");
    assert_eq!(gate.filter(&text), text);

    clock.advance(Duration::from_secs(301));
    let outcome = gate.review(&text);
    assert_eq!(outcome.issues()[0].reason, InvalidReason::Expired);
    assert_eq!(outcome.issues()[0].tool_name.as_deref(), Some("ping"));

    assert_eq!(registry.prune(), 1);
    let outcome = gate.review(&text);
    assert_eq!(outcome.issues()[0].reason, InvalidReason::NotFound);
}

#[test]
fn test_evicted_execution_not_found() {
    init_tracing();
    let registry = Arc::new(ExecutionRegistry::new(TrackingConfig::new().with_capacity(3)));
    let ping = track_fn(Arc::clone(&registry), "ping", |_| Ok::<_, String>(json!({})));

    let first = ping(json!({})).unwrap();
    for _ in 0..3 {
        ping(json!({})).unwrap();
    }
    assert_eq!(registry.len(), 3);

    let gate = Gatekeeper::new(Arc::clone(&registry));
    let outcome = gate.review(&first.to_string());
    assert_eq!(outcome.issues().len(), 1);
    assert_eq!(outcome.issues()[0].reason, InvalidReason::NotFound);
}

#[test]
fn test_mixed_response_is_rejected_whole() {
    let (registry, _) = session();
    let ping = track_fn(Arc::clone(&registry), "ping", |_| Ok::<_, String>(json!({"loss": 0})));
    let real = ping(json!({})).unwrap();

    let text = format!(
        "{real}\nPort scan: {{\"tool_name\": \"port_scan\", \"open\": [22, 443]}}"
    );
    let gate = Gatekeeper::new(registry);
    let outcome = gate.review(&text);
    assert_eq!(outcome.issues().len(), 1);
    assert_eq!(outcome.issues()[0].reason, InvalidReason::MissingExecutionId);

    let message = outcome.into_text();
    assert!(message.starts_with("Unverified tool results detected."));
    assert!(message.contains("tool: port_scan, execution_id: none, reason: missing_execution_id"));
    assert!(!message.contains("443"));
}

#[test]
fn test_echoed_nested_payload_passes() {
    let (registry, _) = session();
    let list_tools = track_fn(Arc::clone(&registry), "mcp_list", |_| {
        Ok::<_, String>(json!({
            "tools": [
                {"tool": "ping", "description": "ICMP echo"},
                {"tool_name": "traceroute", "function": {"name": "traceroute"}}
            ]
        }))
    });
    let output = list_tools(json!({})).unwrap();

    let gate = Gatekeeper::new(registry);
    let text = format!("Available tools: {output}");
    let outcome = gate.review(&text);
    assert!(outcome.is_passed(), "{:?}", outcome.issues());
    assert_eq!(outcome.verified().len(), 1);
    assert_eq!(outcome.verified()[0].tool_name, "mcp_list");
}
