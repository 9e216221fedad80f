use crate::config::{AuthMode, Config, ResponseFormat, ResponseVerbosity, SessionMode, TransportType};
use crate::error::GitMcpError;
use crate::tools::{
    advanced, branching, browse, history, remote, repo, repo_files, staging, ToolContext,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use schemars::schema_for;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use std::future::Future;

const PROTOCOL_VERSION: &str = "2025-11-25";
const CACHE_ROOT_URI: &str = "git://cache-root";

pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let transport = config.transport_type;
    let ctx = ToolContext::new(config);

    match transport {
        TransportType::Http => {
            tracing::info!("Running in HTTP mode");
            run_http_server(ctx).await
        }
        TransportType::Stdio => {
            tracing::info!("Running in STDIO mode");
            run_stdio_server(ctx).await
        }
    }
}

async fn run_http_server(ctx: ToolContext) -> anyhow::Result<()> {
    use axum::extract::State;
    use axum::http::{HeaderMap, HeaderValue, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::Router;
    use std::collections::HashSet;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tokio::sync::RwLock;
    use uuid::Uuid;

    // One context for every session: the clone cache and its per-URL locks
    // are shared process-wide.
    #[derive(Clone)]
    struct AppState {
        ctx: ToolContext,
        sessions: Arc<RwLock<HashSet<String>>>,
    }

    async fn handler(
        State(state): State<AppState>,
        headers: HeaderMap,
        body: String,
    ) -> impl IntoResponse {
        let config = &state.ctx.config;
        let protocol_version = headers
            .get("MCP-Protocol-Version")
            .and_then(|v| v.to_str().ok())
            .unwrap_or(PROTOCOL_VERSION)
            .to_string();

        let session_id = headers
            .get("MCP-Session-Id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let mut response_headers = HeaderMap::new();
        response_headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        response_headers.insert(
            "MCP-Protocol-Version",
            HeaderValue::from_str(&protocol_version)
                .unwrap_or(HeaderValue::from_static(PROTOCOL_VERSION)),
        );

        let req: JsonRpcRequest = match serde_json::from_str(&body) {
            Ok(r) => r,
            Err(e) => {
                let resp = json_rpc_error(None, &format!("Parse error: {}", e), -32700);
                return (StatusCode::OK, response_headers, resp);
            }
        };

        if !config.allowed_origins.is_empty() {
            if let Some(origin) = headers.get("Origin").and_then(|v| v.to_str().ok()) {
                if !config.allowed_origins.iter().any(|allowed| allowed == origin) {
                    tracing::warn!("Rejected request from origin {}", origin);
                    let resp = json_rpc_error(req.id.clone(), "Forbidden origin", -32003);
                    return (StatusCode::FORBIDDEN, response_headers, resp);
                }
            }
        }

        if let Err(msg) = validate_auth(config, &headers) {
            let resp = json_rpc_error(req.id.clone(), &msg, -32001);
            return (StatusCode::UNAUTHORIZED, response_headers, resp);
        }

        if req.method == "initialize" && config.session_mode != SessionMode::Stateless {
            let new_id = Uuid::new_v4().to_string();
            state.sessions.write().await.insert(new_id.clone());
            tracing::debug!("Opened MCP session {}", new_id);
            if let Ok(val) = HeaderValue::from_str(&new_id) {
                response_headers.insert("MCP-Session-Id", val);
            }
        } else {
            match (config.session_mode, session_id) {
                (SessionMode::Stateful, Some(id)) | (SessionMode::Auto, Some(id)) => {
                    if !state.sessions.read().await.contains(&id) {
                        let resp = json_rpc_error(req.id.clone(), "Invalid MCP session", -32602);
                        return (StatusCode::OK, response_headers, resp);
                    }
                }
                (SessionMode::Stateful, None) => {
                    let resp = json_rpc_error(req.id.clone(), "Missing MCP-Session-Id", -32602);
                    return (StatusCode::OK, response_headers, resp);
                }
                _ => {}
            }
        }

        match dispatch(&state.ctx, req).await {
            Some(resp) => (StatusCode::OK, response_headers, resp),
            None => (StatusCode::ACCEPTED, response_headers, String::new()),
        }
    }

    let config = ctx.config.clone();
    let state = AppState {
        ctx,
        sessions: Arc::new(RwLock::new(HashSet::new())),
    };

    let router = Router::new()
        .route(&config.http_endpoint_path, post(handler))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.http_host, config.http_port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid HTTP bind address: {}", e))?;

    tracing::info!("Listening on http://{}{}", addr, config.http_endpoint_path);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;
    Ok(())
}

fn validate_auth(config: &Config, headers: &axum::http::HeaderMap) -> Result<(), String> {
    match config.auth_mode {
        AuthMode::None => Ok(()),
        AuthMode::Jwt => {
            let token = extract_bearer_token(headers)?;
            let secret = config
                .auth_secret_key
                .as_ref()
                .ok_or_else(|| "MCP_AUTH_SECRET_KEY is required in jwt mode".to_string())?;

            let mut validation = Validation::new(Algorithm::HS256);
            validation.validate_aud = false;
            decode::<Map<String, Value>>(
                &token,
                &DecodingKey::from_secret(secret.as_bytes()),
                &validation,
            )
            .map_err(|e| format!("Invalid JWT token: {}", e))?;
            Ok(())
        }
    }
}

fn extract_bearer_token(headers: &axum::http::HeaderMap) -> Result<String, String> {
    let auth = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| "Missing Authorization header".to_string())?;
    let token = auth
        .strip_prefix("Bearer ")
        .ok_or_else(|| "Authorization header must use Bearer token".to_string())?
        .trim();
    if token.is_empty() {
        return Err("Bearer token is empty".to_string());
    }
    Ok(token.to_string())
}

async fn run_stdio_server(ctx: ToolContext) -> anyhow::Result<()> {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(response) = handle_request(&ctx, &line).await {
            stdout.write_all(response.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
    }

    tracing::info!("stdin closed, shutting down");
    Ok(())
}

/// Handle one raw JSON-RPC message. Notifications produce no response.
pub async fn handle_request(ctx: &ToolContext, input: &str) -> Option<String> {
    match serde_json::from_str::<JsonRpcRequest>(input) {
        Ok(req) => dispatch(ctx, req).await,
        Err(e) => Some(json_rpc_error(None, &format!("Parse error: {}", e), -32700)),
    }
}

async fn dispatch(ctx: &ToolContext, req: JsonRpcRequest) -> Option<String> {
    if req.id.is_none() && req.method.starts_with("notifications/") {
        tracing::debug!("Notification {}", req.method);
        return None;
    }

    let id = req.id.clone();
    Some(match process_request(ctx, req).await {
        Ok(response) => json_rpc_response(id, response),
        Err(e) => json_rpc_error(id, &e.to_string(), -32603),
    })
}

#[derive(Debug, Clone, serde::Deserialize)]
struct JsonRpcRequest {
    #[serde(rename = "jsonrpc")]
    _jsonrpc: String,
    id: Option<Value>,
    method: String,
    params: Option<Value>,
}

fn json_rpc_response(id: Option<Value>, result: Value) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "result": result,
        "id": id
    })
    .to_string()
}

fn json_rpc_error(id: Option<Value>, message: &str, code: i32) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "error": {
            "code": code,
            "message": message
        },
        "id": id
    })
    .to_string()
}

async fn process_request(ctx: &ToolContext, req: JsonRpcRequest) -> anyhow::Result<Value> {
    match req.method.as_str() {
        "initialize" => Ok(serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {},
                "resources": {
                    "subscribe": false,
                    "listChanged": false
                }
            },
            "serverInfo": {
                "name": "git-repo-mcp",
                "version": env!("CARGO_PKG_VERSION")
            }
        })),

        "ping" => Ok(serde_json::json!({})),

        "tools/list" => Ok(serde_json::json!({
            "tools": get_tool_definitions()
        })),

        "tools/call" => {
            let params = req
                .params
                .ok_or_else(|| anyhow::anyhow!("Missing params"))?;
            let name = params
                .get("name")
                .and_then(|v| v.as_str())
                .ok_or_else(|| anyhow::anyhow!("Missing tool name"))?;
            let arguments = params
                .get("arguments")
                .cloned()
                .unwrap_or(serde_json::json!({}));

            tracing::debug!("Calling tool {}", name);
            match execute_tool(ctx, name, arguments).await {
                Ok(value) => Ok(call_tool_ok(&ctx.config, value)),
                Err(e) => {
                    tracing::debug!("Tool {} failed: {}", name, e);
                    Ok(call_tool_error(e.to_string()))
                }
            }
        }

        "resources/list" => Ok(serde_json::json!({
            "resources": [
                {
                    "uri": CACHE_ROOT_URI,
                    "name": "Repository Cache Root",
                    "description": "Directory holding the cached clones of remote repositories.",
                    "mimeType": "text/plain"
                }
            ]
        })),

        "resources/read" => {
            let params = req
                .params
                .ok_or_else(|| anyhow::anyhow!("Missing params"))?;
            let uri = params
                .get("uri")
                .and_then(|v| v.as_str())
                .ok_or_else(|| anyhow::anyhow!("Missing uri"))?;
            if uri != CACHE_ROOT_URI {
                return Err(anyhow::anyhow!("Resource not found: {}", uri));
            }

            Ok(serde_json::json!({
                "contents": [{
                    "uri": CACHE_ROOT_URI,
                    "mimeType": "text/plain",
                    "text": ctx.cache.root().display().to_string()
                }]
            }))
        }

        _ => Err(anyhow::anyhow!("Unknown method: {}", req.method)),
    }
}

/// Wrap a tool payload. Plain strings (the directory tree) are passed through
/// as text, anything else is rendered as JSON.
fn call_tool_ok(config: &Config, value: Value) -> Value {
    let text = match value {
        Value::String(text) => text,
        value => {
            let json = match config.response_verbosity {
                ResponseVerbosity::Minimal => serde_json::to_string(&value),
                ResponseVerbosity::Standard => serde_json::to_string_pretty(&value),
            }
            .unwrap_or_else(|_| value.to_string());
            match config.response_format {
                ResponseFormat::Markdown => format!("```json\n{}\n```", json),
                ResponseFormat::Json => json,
            }
        }
    };
    serde_json::json!({
        "content": [{
            "type": "text",
            "text": text
        }],
        "isError": false
    })
}

fn call_tool_error(message: String) -> Value {
    serde_json::json!({
        "content": [{
            "type": "text",
            "text": serde_json::json!({ "error": message }).to_string()
        }],
        "isError": true
    })
}

fn get_tool_definitions() -> Vec<Value> {
    vec![
        tool_def::<browse::GitDirectoryStructureInput>(
            "git_directory_structure",
            "Clone (or reuse a cached clone of) a repository and return its file tree",
        ),
        tool_def::<browse::GitReadFilesInput>(
            "git_read_files",
            "Read files from a cached clone of a repository",
        ),
        tool_def::<browse::GitSearchCodeInput>(
            "git_search_code",
            "Search a repository with git grep and return matches grouped by file with context",
        ),
        tool_def::<repo::GitLocalChangesInput>(
            "git_local_changes",
            "Summarize uncommitted changes in a local repository",
        ),
        tool_def::<repo::GitCloneInput>("git_clone", "Clone a repository into the cache"),
        tool_def::<repo::GitStatusInput>("git_status", "Show the working tree status"),
        tool_def::<repo::GitCleanInput>(
            "git_clean",
            "Remove untracked files from the working tree",
        ),
        tool_def::<repo::GitArchiveInput>("git_archive", "Create an archive of a tree"),
        tool_def::<staging::GitAddInput>("git_add", "Stage files for commit"),
        tool_def::<staging::GitCommitInput>("git_commit", "Create a new commit"),
        tool_def::<staging::GitDiffInput>("git_diff", "View differences"),
        tool_def::<staging::GitResetInput>("git_reset", "Reset current HEAD to specified state"),
        tool_def::<staging::GitRevertInput>("git_revert", "Revert a commit"),
        tool_def::<history::GitLogInput>("git_log", "View commit history"),
        tool_def::<history::GitShowInput>("git_show", "Show details of a git object"),
        tool_def::<history::GitBlameInput>("git_blame", "Show line-by-line authorship"),
        tool_def::<branching::GitBranchInput>("git_branch", "Manage branches"),
        tool_def::<branching::GitBranchDiffInput>(
            "git_branch_diff",
            "Compare two branches from their merge base",
        ),
        tool_def::<branching::GitCheckoutInput>(
            "git_checkout",
            "Switch branches or restore working tree files",
        ),
        tool_def::<branching::GitMergeInput>("git_merge", "Merge branches together"),
        tool_def::<branching::GitRebaseInput>("git_rebase", "Rebase commits onto another branch"),
        tool_def::<remote::GitRemoteInput>("git_remote", "Manage remote repositories"),
        tool_def::<remote::GitFetchInput>("git_fetch", "Fetch updates from a remote repository"),
        tool_def::<remote::GitPullInput>("git_pull", "Pull changes from a remote repository"),
        tool_def::<remote::GitPushInput>("git_push", "Push changes to a remote repository"),
        tool_def::<advanced::GitStashInput>("git_stash", "Manage stashes"),
        tool_def::<advanced::GitTagInput>("git_tag", "Manage tags"),
        tool_def::<advanced::GitConfigInput>("git_config", "Read or write repository configuration"),
        tool_def::<advanced::GitLfsInput>("git_lfs", "Manage Git LFS"),
        tool_def::<repo_files::GitHooksInput>("git_hooks", "List, read or install git hooks"),
        tool_def::<repo_files::GitAttributesInput>(
            "git_attributes",
            "Inspect or edit .gitattributes",
        ),
    ]
}

fn tool_def<T: JsonSchema>(name: &str, description: &str) -> Value {
    let schema = schema_for!(T);
    let mut input_schema = serde_json::to_value(&schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object"}));
    if let Some(obj) = input_schema.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }

    serde_json::json!({
        "name": name,
        "description": description,
        "inputSchema": input_schema
    })
}

async fn run<I, O, F, Fut>(ctx: &ToolContext, arguments: Value, handler: F) -> anyhow::Result<Value>
where
    I: DeserializeOwned,
    O: Serialize,
    F: FnOnce(ToolContext, I) -> Fut,
    Fut: Future<Output = crate::error::Result<O>>,
{
    let input: I = serde_json::from_value(arguments).map_err(GitMcpError::from)?;
    let result = handler(ctx.clone(), input).await?;
    Ok(serde_json::to_value(result)?)
}

pub async fn execute_tool(ctx: &ToolContext, name: &str, arguments: Value) -> anyhow::Result<Value> {
    match name {
        "git_directory_structure" => run(ctx, arguments, browse::git_directory_structure).await,
        "git_read_files" => run(ctx, arguments, browse::git_read_files).await,
        "git_search_code" => run(ctx, arguments, browse::git_search_code).await,
        "git_local_changes" => run(ctx, arguments, repo::git_local_changes).await,
        "git_clone" => run(ctx, arguments, repo::git_clone).await,
        "git_status" => run(ctx, arguments, repo::git_status).await,
        "git_clean" => run(ctx, arguments, repo::git_clean).await,
        "git_archive" => run(ctx, arguments, repo::git_archive).await,
        "git_add" => run(ctx, arguments, staging::git_add).await,
        "git_commit" => run(ctx, arguments, staging::git_commit).await,
        "git_diff" => run(ctx, arguments, staging::git_diff).await,
        "git_reset" => run(ctx, arguments, staging::git_reset).await,
        "git_revert" => run(ctx, arguments, staging::git_revert).await,
        "git_log" => run(ctx, arguments, history::git_log).await,
        "git_show" => run(ctx, arguments, history::git_show).await,
        "git_blame" => run(ctx, arguments, history::git_blame).await,
        "git_branch" => run(ctx, arguments, branching::git_branch).await,
        "git_branch_diff" => run(ctx, arguments, branching::git_branch_diff).await,
        "git_checkout" => run(ctx, arguments, branching::git_checkout).await,
        "git_merge" => run(ctx, arguments, branching::git_merge).await,
        "git_rebase" => run(ctx, arguments, branching::git_rebase).await,
        "git_remote" => run(ctx, arguments, remote::git_remote).await,
        "git_fetch" => run(ctx, arguments, remote::git_fetch).await,
        "git_pull" => run(ctx, arguments, remote::git_pull).await,
        "git_push" => run(ctx, arguments, remote::git_push).await,
        "git_stash" => run(ctx, arguments, advanced::git_stash).await,
        "git_tag" => run(ctx, arguments, advanced::git_tag).await,
        "git_config" => run(ctx, arguments, advanced::git_config).await,
        "git_lfs" => run(ctx, arguments, advanced::git_lfs).await,
        "git_hooks" => run(ctx, arguments, repo_files::git_hooks).await,
        "git_attributes" => run(ctx, arguments, repo_files::git_attributes).await,
        _ => Err(anyhow::anyhow!("Unknown tool: {}", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_listed_tool_is_unique_and_self_contained() {
        let defs = get_tool_definitions();
        let names: HashSet<&str> = defs.iter().filter_map(|d| d["name"].as_str()).collect();
        assert_eq!(names.len(), defs.len());

        for def in &defs {
            let schema = def["inputSchema"].to_string();
            assert!(!schema.contains("#/definitions/"), "{}", def["name"]);
            assert_eq!(def["inputSchema"]["type"], "object");
        }
    }

    #[test]
    fn plain_string_results_are_passed_through() {
        let out = call_tool_ok(&Config::default(), Value::String("|-- a.txt".into()));
        assert_eq!(out["content"][0]["text"], "|-- a.txt");
        assert_eq!(out["isError"], false);
    }

    #[test]
    fn minimal_markdown_rendering() {
        let config = Config {
            response_format: ResponseFormat::Markdown,
            response_verbosity: ResponseVerbosity::Minimal,
            ..Config::default()
        };
        let out = call_tool_ok(&config, serde_json::json!({"a": 1}));
        assert_eq!(out["content"][0]["text"], "```json\n{\"a\":1}\n```");
    }

    #[test]
    fn tool_errors_carry_an_error_object() {
        let out = call_tool_error("Repository not found: x".into());
        assert_eq!(out["isError"], true);
        let text: Value = serde_json::from_str(out["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(text["error"], "Repository not found: x");
    }

    #[tokio::test]
    async fn malformed_tool_arguments_become_tool_errors() {
        let ctx = ToolContext::new(Config::default());
        let call = r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"git_read_files","arguments":{"repo_url":"x"}}}"#;
        let reply: Value = serde_json::from_str(&handle_request(&ctx, call).await.unwrap()).unwrap();

        assert_eq!(reply["result"]["isError"], true);
        let text: Value =
            serde_json::from_str(reply["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
        let message = text["error"].as_str().unwrap();
        assert!(message.starts_with("JSON error: "), "{}", message);
        assert!(message.contains("file_paths"), "{}", message);
    }

    #[tokio::test]
    async fn notifications_get_no_reply() {
        let ctx = ToolContext::new(Config::default());
        let note = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        assert!(handle_request(&ctx, note).await.is_none());

        let ping = r#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#;
        let reply: Value = serde_json::from_str(&handle_request(&ctx, ping).await.unwrap()).unwrap();
        assert_eq!(reply["id"], 7);
        assert!(reply["result"].is_object());
    }
}
