//! Protocol tests against scripted `/bin/sh` tool servers.
//!
//! Each stub reads one JSON-RPC line at a time, pulls the request id out with
//! `sed`, and answers according to the method it sees.

use wayfarer_mcp::{McpClient, McpError, McpServerConfig, McpTool};
use wayfarer_types::ToolArguments;

/// Wrap `arms` (shell `case` arms matched against the request line) in a
/// read loop. `$id` holds the request id, empty for notifications.
fn stub(arms: &str) -> McpServerConfig {
    let script = format!(
        r#"while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -n 's/^{{"jsonrpc":"2.0","id":\([0-9][0-9]*\),.*/\1/p')
  case "$line" in
{arms}
  esac
done"#
    );
    let mut config = McpServerConfig::new("sh", vec!["-c".to_string(), script]);
    config.shutdown_timeout_ms = 500;
    config
}

const INIT_OK: &str = r#"    *'"method":"initialize"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2024-11-05","capabilities":{},"serverInfo":{"name":"travel-stub","version":"0.1.0"}}}\n' "$id" ;;"#;

const LIST_OK: &str = r#"    *'"method":"tools/list"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[{"name":"get_weather","description":"Weather forecast","inputSchema":{"type":"object","properties":{"location":{"type":"string","description":"City"}},"required":["location"]}},{"name":"search_flights","description":"Find flights","inputSchema":{"type":"object","properties":{"origin":{"type":"string"},"destination":{"type":"string"},"departure_date":{"type":"string"},"return_date":{"type":"string"}},"required":["origin","destination","departure_date"]}}]}}\n' "$id" ;;"#;

const FLIGHT_TEXT: &str = "3 flights found: JFK -> LAX on 2025-06-01, from $129";

fn travel_server() -> McpServerConfig {
    let call = r#"    *'"method":"tools/call"'*'"name":"search_flights"'*)
      case "$line" in
        *'"departure_date":"2025-06-01"'*'"destination":"LAX"'*'"origin":"JFK"'*|\
        *'"origin":"JFK"'*'"destination":"LAX"'*'"departure_date":"2025-06-01"'*)
          printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"3 flights found: JFK -> LAX on 2025-06-01, from $129"}],"isError":false}}\n' "$id" ;;
        *)
          printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"unexpected arguments"}]}}\n' "$id" ;;
      esac ;;
    *'"method":"tools/call"'*'"name":"get_weather"'*)
      printf '{"jsonrpc":"2.0","id":%s,"error":{"code":-32602,"message":"Unknown city: Atlantis"}}\n' "$id" ;;
    *'"method":"tools/call"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"request %s"}]}}\n' "$id" "$id" ;;"#;
    stub(&format!("{INIT_OK}\n{LIST_OK}\n{call}"))
}

fn flight_arguments() -> ToolArguments {
    let mut args = ToolArguments::new();
    args.insert("origin".into(), "JFK".into());
    args.insert("destination".into(), "LAX".into());
    args.insert("departure_date".into(), "2025-06-01".into());
    args
}

#[tokio::test]
async fn handshake_and_discovery() {
    let (mut client, tools) = McpClient::connect("travel", &travel_server()).await.unwrap();

    let info = client.server_info().unwrap();
    assert_eq!(info.name, "travel-stub");

    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["get_weather", "search_flights"]);

    let flights = &tools[1];
    assert_eq!(flights.description, "Find flights");
    let required: Vec<&str> = flights
        .arguments
        .iter()
        .filter(|a| a.required)
        .map(|a| a.name.as_str())
        .collect();
    assert_eq!(required.len(), 3);
    assert!(!required.contains(&"return_date"));

    client.shutdown().await;
}

#[tokio::test]
async fn call_tool_round_trip_returns_text_unmodified() {
    let (mut client, _) = McpClient::connect("travel", &travel_server()).await.unwrap();

    let text = client.call_tool("search_flights", &flight_arguments()).await;
    assert_eq!(text, FLIGHT_TEXT);

    client.shutdown().await;
}

#[tokio::test]
async fn error_response_becomes_text_with_message() {
    let (mut client, _) = McpClient::connect("travel", &travel_server()).await.unwrap();

    let mut args = ToolArguments::new();
    args.insert("location".into(), "Atlantis".into());
    let text = client.call_tool("get_weather", &args).await;
    assert!(text.contains("Unknown city: Atlantis"), "{text}");
    assert!(text.starts_with("Error"), "{text}");

    client.shutdown().await;
}

#[tokio::test]
async fn request_ids_strictly_increase() {
    let (mut client, _) = McpClient::connect("travel", &travel_server()).await.unwrap();

    // initialize = 1, tools/list = 2
    assert_eq!(client.call_tool("echo", &ToolArguments::new()).await, "request 3");
    assert_eq!(client.call_tool("echo", &ToolArguments::new()).await, "request 4");
    assert!(client.pending_request().is_none());

    client.shutdown().await;
}

#[tokio::test]
async fn remote_tool_validates_then_delegates() {
    let (client, tools) = McpClient::connect("travel", &travel_server()).await.unwrap();
    let shared = client.into_shared();
    let wrapped = McpTool::wrap_all(tools, &shared);
    let flights = wrapped.iter().find(|t| t.name() == "search_flights").unwrap();

    let text = flights.invoke(flight_arguments()).await.unwrap();
    assert_eq!(text, FLIGHT_TEXT);

    let mut partial = flight_arguments();
    partial.remove("origin");
    assert!(flights.invoke(partial).await.is_err());

    // initialize = 1, tools/list = 2, search_flights = 3. The rejected
    // call never reached the server, so the next request is 4.
    assert_eq!(
        shared.lock().await.call_tool("echo", &ToolArguments::new()).await,
        "request 4"
    );

    let weather = wrapped.iter().find(|t| t.name() == "get_weather").unwrap();
    assert!(weather.invoke(ToolArguments::new()).await.is_err());
    assert_eq!(
        shared.lock().await.call_tool("echo", &ToolArguments::new()).await,
        "request 5"
    );

    shared.lock().await.shutdown().await;
}

#[tokio::test]
async fn stray_output_is_skipped_while_waiting() {
    let arms = format!(
        r#"{INIT_OK}
{LIST_OK}
    *'"method":"tools/call"'*)
      echo 'DEBUG: fetching upstream data'
      echo '42'
      echo '"progress"'
      echo '[1,2]'
      printf '{{"jsonrpc":"2.0","method":"notifications/message","params":{{"level":"info"}}}}\n'
      printf '{{"jsonrpc":"2.0","id":999,"result":{{"content":[{{"text":"stale"}}]}}}}\n'
      printf '{{"jsonrpc":"2.0","id":%s,"result":{{"content":[{{"text":"fresh"}}]}}}}\n' "$id" ;;"#
    );
    let (mut client, _) = McpClient::connect("travel", &stub(&arms)).await.unwrap();

    assert_eq!(client.call_tool("anything", &ToolArguments::new()).await, "fresh");

    client.shutdown().await;
}

#[tokio::test]
async fn bare_json_values_do_not_break_the_handshake() {
    let arms = format!(
        r#"    *'"method":"initialize"'*)
      echo '42'
      echo 'null'
      printf '{{"jsonrpc":"2.0","id":%s,"result":{{"protocolVersion":"2024-11-05","capabilities":{{}},"serverInfo":{{"name":"noisy","version":"1"}}}}}}\n' "$id" ;;
{LIST_OK}"#
    );
    let (mut client, tools) = McpClient::connect("noisy", &stub(&arms)).await.unwrap();
    assert_eq!(client.server_info().unwrap().name, "noisy");
    assert_eq!(tools.len(), 2);

    client.shutdown().await;
}

#[tokio::test]
async fn null_id_error_answers_the_pending_call() {
    let arms = format!(
        r#"{INIT_OK}
{LIST_OK}
    *'"method":"tools/call"'*'"name":"broken"'*)
      printf '{{"jsonrpc":"2.0","id":null,"error":{{"code":-32700,"message":"Parse error"}}}}\n' ;;
    *'"method":"tools/call"'*)
      printf '{{"jsonrpc":"2.0","id":%s,"result":{{"content":[{{"type":"text","text":"request %s"}}]}}}}\n' "$id" "$id" ;;"#
    );
    let (mut client, _) = McpClient::connect("travel", &stub(&arms)).await.unwrap();

    let text = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        client.call_tool("broken", &ToolArguments::new()),
    )
    .await
    .expect("call should not hang on a null-id error");
    assert_eq!(text, "Error calling tool 'broken': Parse error");
    assert!(client.pending_request().is_none());

    // The session carries on with the next id
    assert_eq!(client.call_tool("echo", &ToolArguments::new()).await, "request 4");

    client.shutdown().await;
}

#[tokio::test]
async fn initialize_error_is_fatal_with_server_message() {
    let arms = r#"    *'"method":"initialize"'*)
      printf '{"jsonrpc":"2.0","id":%s,"error":{"code":-32600,"message":"unsupported protocol"}}\n' "$id" ;;"#;
    match McpClient::connect("travel", &stub(arms)).await {
        Err(McpError::Startup { source, .. }) => match *source {
            McpError::JsonRpc { message, .. } => assert_eq!(message, "unsupported protocol"),
            other => panic!("Expected JsonRpc, got: {other:?}"),
        },
        Err(other) => panic!("Expected Startup, got: {other:?}"),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[tokio::test]
async fn server_that_exits_gives_no_response_and_stderr() {
    let config = McpServerConfig::new(
        "sh",
        vec![
            "-c".to_string(),
            "echo 'Traceback: missing module fastmcp' >&2; exit 1".to_string(),
        ],
    );
    match McpClient::connect("travel", &config).await {
        Err(McpError::Startup { source, stderr, .. }) => {
            assert!(
                matches!(*source, McpError::NoResponse { .. } | McpError::Io(_)),
                "{source:?}"
            );
            // stderr capture is best effort, but when present it is the server's
            if let Some(first) = stderr.first() {
                assert!(first.contains("fastmcp"));
            }
        }
        Err(other) => panic!("Expected Startup, got: {other:?}"),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[tokio::test]
async fn missing_and_null_results_are_distinct_failures() {
    let missing = format!(
        r#"{INIT_OK}
    *'"method":"tools/list"'*)
      printf '{{"jsonrpc":"2.0","id":%s}}\n' "$id" ;;"#
    );
    let null = format!(
        r#"{INIT_OK}
    *'"method":"tools/list"'*)
      printf '{{"jsonrpc":"2.0","id":%s,"result":null}}\n' "$id" ;;"#
    );

    let err = McpClient::connect("travel", &stub(&missing)).await.err().unwrap();
    assert!(
        matches!(&err, McpError::Startup { source, .. } if matches!(**source, McpError::MissingResult { .. })),
        "{err:?}"
    );

    let err = McpClient::connect("travel", &stub(&null)).await.err().unwrap();
    assert!(
        matches!(&err, McpError::Startup { source, .. } if matches!(**source, McpError::NullResult { .. })),
        "{err:?}"
    );
}

#[tokio::test]
async fn duplicate_remote_names_fail_discovery() {
    let arms = format!(
        r#"{INIT_OK}
    *'"method":"tools/list"'*)
      printf '{{"jsonrpc":"2.0","id":%s,"result":{{"tools":[{{"name":"get_news"}},{{"name":"get_news"}}]}}}}\n' "$id" ;;"#
    );
    let err = McpClient::connect("travel", &stub(&arms)).await.err().unwrap();
    assert!(
        matches!(&err, McpError::Startup { source, .. } if matches!(**source, McpError::DuplicateTool { .. })),
        "{err:?}"
    );
}

#[tokio::test]
async fn empty_content_and_dead_server_degrade_to_text() {
    let arms = format!(
        r#"{INIT_OK}
{LIST_OK}
    *'"method":"tools/call"'*'"name":"empty"'*)
      printf '{{"jsonrpc":"2.0","id":%s,"result":{{"content":[]}}}}\n' "$id" ;;
    *'"method":"tools/call"'*)
      exit 0 ;;"#
    );
    let (mut client, _) = McpClient::connect("travel", &stub(&arms)).await.unwrap();

    let empty = client.call_tool("empty", &ToolArguments::new()).await;
    assert!(empty.contains("empty content"), "{empty}");

    let gone = client.call_tool("crash", &ToolArguments::new()).await;
    assert!(gone.starts_with("Error"), "{gone}");

    // Once the server is gone every call is still just text
    let again = client.call_tool("crash", &ToolArguments::new()).await;
    assert!(again.starts_with("Error"), "{again}");

    client.shutdown().await;
    client.shutdown().await;
}
