use assert_cmd::cargo::cargo_bin;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use predicates::prelude::*;
use serde_json::Value;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

struct TestServer {
    child: std::process::Child,
    reader: BufReader<std::process::ChildStdout>,
    next_id: u64,
}

impl TestServer {
    fn new(cache_dir: &Path) -> Self {
        let mut child = Command::new(cargo_bin("git-repo-mcp"))
            .env("GIT_MCP_CACHE_DIR", cache_dir)
            .env_remove("GIT_BASE_DIR")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("Failed to start server");

        let reader = BufReader::new(child.stdout.take().unwrap());
        Self {
            child,
            reader,
            next_id: 1,
        }
    }

    fn write_line(&mut self, request: &str) {
        let stdin = self.child.stdin.as_mut().unwrap();
        stdin.write_all(request.as_bytes()).unwrap();
        stdin.write_all(b"\n").unwrap();
        stdin.flush().unwrap();
    }

    fn send(&mut self, request: &str) -> Value {
        self.write_line(request);
        let mut response = String::new();
        self.reader
            .read_line(&mut response)
            .expect("Failed to read response");
        serde_json::from_str(&response).expect("Response should be JSON")
    }

    /// Call a tool and return the `result` object (content + isError).
    fn call(&mut self, name: &str, arguments: Value) -> Value {
        let id = self.next_id;
        self.next_id += 1;
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": {"name": name, "arguments": arguments}
        })
        .to_string();
        let response = self.send(&request);
        assert_eq!(response["id"], id);
        response["result"].clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
    }
}

fn text_of(result: &Value) -> String {
    result["content"][0]["text"]
        .as_str()
        .expect("tool result should carry text")
        .to_string()
}

fn json_of(result: &Value) -> Value {
    assert_eq!(result["isError"], false, "tool failed: {}", result);
    serde_json::from_str(&text_of(result)).expect("tool text should be JSON")
}

fn error_of(result: &Value) -> String {
    assert_eq!(result["isError"], true, "tool should have failed: {}", result);
    let body: Value = serde_json::from_str(&text_of(result)).expect("error text should be JSON");
    body["error"].as_str().expect("error field").to_string()
}

fn git(path: &Path, args: &[&str]) {
    let out = Command::new("git")
        .args(args)
        .current_dir(path)
        .output()
        .expect("Failed to run git");
    assert!(
        out.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
}

fn init_repo(path: &Path) {
    git(path, &["init", "--initial-branch=main"]);
    git(path, &["config", "user.email", "test@test.com"]);
    git(path, &["config", "user.name", "Test"]);
}

fn commit_file(path: &Path, file: &str, content: &str, message: &str) {
    let target = path.join(file);
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(target, content).expect("Failed to write file");
    git(path, &["add", "."]);
    git(path, &["commit", "-m", message]);
}

/// A local "remote" with a couple of files; its path doubles as the clone URL.
fn origin_repo() -> (TempDir, String) {
    let dir = TempDir::new().unwrap();
    init_repo(dir.path());
    commit_file(dir.path(), "README.md", "# demo\n", "readme");
    commit_file(
        dir.path(),
        "src/lib.rs",
        "fn one() {}\nlet needle = 1;\nfn two() {}\n",
        "lib",
    );
    let url = dir.path().to_string_lossy().to_string();
    (dir, url)
}

#[test]
fn test_initialize() {
    let cache = TempDir::new().unwrap();
    let mut server = TestServer::new(cache.path());
    let request = r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"test","version":"1.0"}}}"#;
    let response = server.send(request);

    assert_eq!(response["result"]["serverInfo"]["name"], "git-repo-mcp");
    assert!(response["result"]["capabilities"]["tools"].is_object());
}

#[test]
fn test_tools_list() {
    let cache = TempDir::new().unwrap();
    let mut server = TestServer::new(cache.path());
    let response = server.send(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list","params":{}}"#);

    let names: Vec<&str> = response["result"]["tools"]
        .as_array()
        .expect("tools array")
        .iter()
        .filter_map(|t| t["name"].as_str())
        .collect();

    for tool in [
        "git_directory_structure",
        "git_read_files",
        "git_search_code",
        "git_local_changes",
        "git_clone",
        "git_status",
        "git_log",
        "git_branch",
        "git_branch_diff",
        "git_stash",
        "git_tag",
        "git_config",
        "git_hooks",
        "git_attributes",
        "git_lfs",
    ] {
        assert!(names.contains(&tool), "tools/list should contain {}", tool);
    }

    assert!(
        !response.to_string().contains("#/definitions/"),
        "tool schemas should be self-contained"
    );
}

#[test]
fn test_unknown_method_is_a_protocol_error() {
    let cache = TempDir::new().unwrap();
    let mut server = TestServer::new(cache.path());
    let response = server.send(r#"{"jsonrpc":"2.0","id":3,"method":"no/such","params":{}}"#);
    assert_eq!(response["error"]["code"], -32603);
}

#[test]
fn test_notifications_get_no_response() {
    let cache = TempDir::new().unwrap();
    let mut server = TestServer::new(cache.path());
    server.write_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#);
    let response = server.send(r#"{"jsonrpc":"2.0","id":4,"method":"ping"}"#);
    assert_eq!(response["id"], 4);
}

#[test]
fn test_clone_reuses_cache_slot() {
    let (_origin, url) = origin_repo();
    let cache = TempDir::new().unwrap();
    let mut server = TestServer::new(cache.path());

    let first = json_of(&server.call("git_clone", serde_json::json!({"repo_url": url})));
    let second = json_of(&server.call("git_clone", serde_json::json!({"repo_url": url})));

    let path = first["path"].as_str().unwrap();
    assert_eq!(path, second["path"].as_str().unwrap());
    assert!(Path::new(path).starts_with(cache.path()));
    assert!(path.contains("git_mcp_repo_"));
    assert!(Path::new(path).join("README.md").is_file());
}

#[test]
fn test_directory_structure() {
    let (_origin, url) = origin_repo();
    let cache = TempDir::new().unwrap();
    let mut server = TestServer::new(cache.path());

    let result = server.call(
        "git_directory_structure",
        serde_json::json!({"repo_url": url}),
    );
    assert_eq!(result["isError"], false);
    let tree = text_of(&result);
    assert_eq!(tree, "|-- README.md\n`-- src/\n    `-- lib.rs");
}

#[test]
fn test_read_files_reports_per_file_errors() {
    let (_origin, url) = origin_repo();
    let cache = TempDir::new().unwrap();
    let mut server = TestServer::new(cache.path());

    let out = json_of(&server.call(
        "git_read_files",
        serde_json::json!({"repo_url": url, "file_paths": ["README.md", "missing.txt", "../escape"]}),
    ));

    assert_eq!(out["files"]["README.md"], "# demo\n");
    assert!(out["files"]["missing.txt"].as_str().unwrap().starts_with("Error: "));
    assert!(out["files"]["../escape"].as_str().unwrap().starts_with("Error: "));
}

#[test]
fn test_search_code_groups_matches_with_context() {
    let (_origin, url) = origin_repo();
    let cache = TempDir::new().unwrap();
    let mut server = TestServer::new(cache.path());

    let report = json_of(&server.call(
        "git_search_code",
        serde_json::json!({"repo_url": url, "pattern": "NEEDLE", "context_lines": 1}),
    ));

    assert_eq!(report["pattern"], "NEEDLE");
    assert_eq!(report["case_sensitive"], false);
    assert_eq!(report["total_matches"], 1);
    assert_eq!(report["total_files"], 1);

    let file = &report["results"][0];
    assert_eq!(file["file"], "src/lib.rs");
    let m = &file["matches"][0];
    assert_eq!(m["line_number"], 2);
    assert_eq!(m["content"], "let needle = 1;");
    assert_eq!(m["context_before"][0]["line_number"], 1);
    assert_eq!(m["context_before"][0]["content"], "fn one() {}");
    assert_eq!(m["context_after"][0]["line_number"], 3);
}

#[test]
fn test_search_code_with_dated_file_names() {
    let (origin, url) = origin_repo();
    commit_file(
        origin.path(),
        "_posts/2024-01-15-title.md",
        "intro\nneedle post\noutro\n",
        "post",
    );
    let cache = TempDir::new().unwrap();
    let mut server = TestServer::new(cache.path());

    let report = json_of(&server.call(
        "git_search_code",
        serde_json::json!({"repo_url": url, "pattern": "needle", "context_lines": 1}),
    ));

    assert_eq!(report["total_files"], 2);
    assert_eq!(report["total_matches"], 2);
    let post = &report["results"][0];
    assert_eq!(post["file"], "_posts/2024-01-15-title.md");
    assert_eq!(post["matches"][0]["file"], "_posts/2024-01-15-title.md");
    assert_eq!(post["matches"][0]["line_number"], 2);
    assert_eq!(post["matches"][0]["context_before"][0]["content"], "intro");
    assert_eq!(report["results"][1]["file"], "src/lib.rs");
}

#[test]
fn test_search_code_without_matches() {
    let (_origin, url) = origin_repo();
    let cache = TempDir::new().unwrap();
    let mut server = TestServer::new(cache.path());

    let report = json_of(&server.call(
        "git_search_code",
        serde_json::json!({"repo_url": url, "pattern": "does-not-occur", "case_sensitive": true}),
    ));
    assert_eq!(report["total_matches"], 0);
    assert_eq!(report["results"].as_array().unwrap().len(), 0);
}

#[test]
fn test_failed_clone_uses_error_envelope() {
    let cache = TempDir::new().unwrap();
    let missing = cache.path().join("no-such-remote");
    let mut server = TestServer::new(cache.path());

    let message = error_of(&server.call(
        "git_directory_structure",
        serde_json::json!({"repo_url": missing.to_string_lossy()}),
    ));
    assert!(message.contains("Failed to clone"), "{}", message);

    let leftovers: Vec<_> = std::fs::read_dir(cache.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("git_mcp_repo_"))
        .collect();
    assert!(leftovers.is_empty(), "failed clone should not leave a slot");
}

#[test]
fn test_local_changes() {
    let repo = TempDir::new().unwrap();
    init_repo(repo.path());
    commit_file(repo.path(), "keep.txt", "one\n", "init");
    commit_file(repo.path(), "gone.txt", "bye\n", "second");

    std::fs::write(repo.path().join("keep.txt"), "two\n").unwrap();
    std::fs::remove_file(repo.path().join("gone.txt")).unwrap();
    std::fs::write(repo.path().join("fresh.txt"), "new\n").unwrap();
    std::fs::write(repo.path().join("staged.txt"), "s\n").unwrap();
    git(repo.path(), &["add", "staged.txt"]);

    let cache = TempDir::new().unwrap();
    let mut server = TestServer::new(cache.path());
    let out = json_of(&server.call(
        "git_local_changes",
        serde_json::json!({"repo_path": repo.path().to_string_lossy()}),
    ));

    assert_eq!(out["branch"], "main");
    assert_eq!(out["modified_files"], serde_json::json!(["keep.txt"]));
    assert_eq!(out["deleted_files"], serde_json::json!(["gone.txt"]));
    assert_eq!(out["staged_files"], serde_json::json!(["staged.txt"]));
    let new_files = out["new_files"].as_array().unwrap();
    assert!(new_files.contains(&Value::from("fresh.txt")));
    assert!(new_files.contains(&Value::from("staged.txt")));
    assert!(out["diffs"]["keep.txt"].as_str().unwrap().contains("+two"));
}

#[test]
fn test_log_branch_and_tag_on_local_repo() {
    let repo = TempDir::new().unwrap();
    init_repo(repo.path());
    commit_file(repo.path(), "a.txt", "a\n", "first commit");
    commit_file(repo.path(), "b.txt", "b\n", "second commit");
    let repo_path = repo.path().to_string_lossy().to_string();

    let cache = TempDir::new().unwrap();
    let mut server = TestServer::new(cache.path());

    let log = json_of(&server.call(
        "git_log",
        serde_json::json!({"repo_path": repo_path, "max_count": 1}),
    ));
    assert_eq!(log["total"], 1);
    assert_eq!(log["commits"][0]["message"], "second commit");

    json_of(&server.call(
        "git_branch",
        serde_json::json!({"repo_path": repo_path, "operation": "create", "name": "feature"}),
    ));
    let branches = json_of(&server.call("git_branch", serde_json::json!({"repo_path": repo_path})));
    assert_eq!(branches["current_branch"], "main");
    assert_eq!(branches["branches"].as_array().unwrap().len(), 2);

    json_of(&server.call(
        "git_tag",
        serde_json::json!({"repo_path": repo_path, "mode": "create", "tag_name": "v1.0", "message": "release"}),
    ));
    let tags = json_of(&server.call("git_tag", serde_json::json!({"repo_path": repo_path})));
    assert_eq!(tags["tags"][0]["name"], "v1.0");
}

#[test]
fn test_branch_diff() {
    let repo = TempDir::new().unwrap();
    init_repo(repo.path());
    commit_file(repo.path(), "a.txt", "a\n", "base");
    git(repo.path(), &["checkout", "-b", "topic"]);
    commit_file(repo.path(), "b.txt", "b\n", "topic work");

    let cache = TempDir::new().unwrap();
    let mut server = TestServer::new(cache.path());
    let out = json_of(&server.call(
        "git_branch_diff",
        serde_json::json!({"repo_path": repo.path().to_string_lossy(), "base": "main", "compare": "topic"}),
    ));
    assert_eq!(out["files"], serde_json::json!(["b.txt"]));
    assert_eq!(out["files_changed"], 1);
}

#[test]
fn test_stash_push_list_pop_and_out_of_range_index() {
    let repo = TempDir::new().unwrap();
    init_repo(repo.path());
    commit_file(repo.path(), "test.txt", "hello", "Initial commit");
    std::fs::write(repo.path().join("test.txt"), "modified").unwrap();
    let repo_path = repo.path().to_string_lossy().to_string();

    let cache = TempDir::new().unwrap();
    let mut server = TestServer::new(cache.path());

    json_of(&server.call(
        "git_stash",
        serde_json::json!({"repo_path": repo_path, "mode": "push", "message": "test stash"}),
    ));

    let list = json_of(&server.call(
        "git_stash",
        serde_json::json!({"repo_path": repo_path, "mode": "list"}),
    ));
    assert_eq!(list["stashes"].as_array().unwrap().len(), 1);
    assert_eq!(list["stashes"][0]["branch"], "main");

    let message = error_of(&server.call(
        "git_stash",
        serde_json::json!({"repo_path": repo_path, "mode": "pop", "index": 3}),
    ));
    assert!(message.contains("stash@{3}"), "{}", message);

    json_of(&server.call(
        "git_stash",
        serde_json::json!({"repo_path": repo_path, "mode": "pop", "index": 0}),
    ));
    assert_eq!(
        std::fs::read_to_string(repo.path().join("test.txt")).unwrap(),
        "modified"
    );

    let message = error_of(&server.call(
        "git_stash",
        serde_json::json!({"repo_path": repo_path, "mode": "drop"}),
    ));
    assert!(message.contains("0 stash entries"), "{}", message);
}

#[test]
fn test_hooks_and_attributes() {
    let repo = TempDir::new().unwrap();
    init_repo(repo.path());
    let repo_path = repo.path().to_string_lossy().to_string();

    let cache = TempDir::new().unwrap();
    let mut server = TestServer::new(cache.path());

    json_of(&server.call(
        "git_hooks",
        serde_json::json!({"repo_path": repo_path, "mode": "create", "name": "pre-commit", "script": "#!/bin/sh\nexit 0\n"}),
    ));
    let hook = json_of(&server.call(
        "git_hooks",
        serde_json::json!({"repo_path": repo_path, "mode": "get", "name": "pre-commit"}),
    ));
    assert_eq!(hook["content"], "#!/bin/sh\nexit 0\n");

    let message = error_of(&server.call(
        "git_hooks",
        serde_json::json!({"repo_path": repo_path, "mode": "create", "name": "evil", "script": "x"}),
    ));
    assert!(message.contains("not a standard git hook"), "{}", message);

    json_of(&server.call(
        "git_attributes",
        serde_json::json!({"repo_path": repo_path, "mode": "set", "pattern": "*.png", "attributes": "binary"}),
    ));
    let attrs = json_of(&server.call(
        "git_attributes",
        serde_json::json!({"repo_path": repo_path, "mode": "list"}),
    ));
    assert_eq!(attrs["attributes"][0]["pattern"], "*.png");
    assert_eq!(attrs["attributes"][0]["attributes"], "binary");
}

#[test]
fn test_resources_read_cache_root() {
    let cache = TempDir::new().unwrap();
    let mut server = TestServer::new(cache.path());

    let list = server.send(r#"{"jsonrpc":"2.0","id":5,"method":"resources/list"}"#);
    assert_eq!(list["result"]["resources"][0]["uri"], "git://cache-root");

    let read = server.send(
        r#"{"jsonrpc":"2.0","id":6,"method":"resources/read","params":{"uri":"git://cache-root"}}"#,
    );
    assert_eq!(
        read["result"]["contents"][0]["text"].as_str(),
        cache.path().to_str()
    );
}

#[test]
fn test_cli_help() {
    assert_cmd::Command::cargo_bin("git-repo-mcp")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--cache-dir"))
        .stdout(predicate::str::contains("--transport"));
}

struct HttpTestServer {
    child: std::process::Child,
    host: String,
    port: u16,
    endpoint_path: String,
    _cache: TempDir,
}

impl HttpTestServer {
    fn new_with_env(session_mode: &str, extra_env: &[(&str, &str)]) -> Self {
        let cache = TempDir::new().unwrap();
        let host = "127.0.0.1".to_string();
        let port = reserve_free_port();
        let endpoint_path = "/mcp".to_string();

        let mut cmd = Command::new(cargo_bin("git-repo-mcp"));
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .env("GIT_MCP_CACHE_DIR", cache.path())
            .env("MCP_TRANSPORT_TYPE", "http")
            .env("MCP_HTTP_HOST", &host)
            .env("MCP_HTTP_PORT", port.to_string())
            .env("MCP_HTTP_ENDPOINT_PATH", &endpoint_path)
            .env("MCP_SESSION_MODE", session_mode);
        for (k, v) in extra_env {
            cmd.env(k, v);
        }

        let child = cmd.spawn().expect("Failed to start HTTP server");
        let server = Self {
            child,
            host,
            port,
            endpoint_path,
            _cache: cache,
        };
        server.wait_ready();
        server
    }

    fn wait_ready(&self) {
        for _ in 0..100 {
            if TcpStream::connect((self.host.as_str(), self.port)).is_ok() {
                return;
            }
            thread::sleep(Duration::from_millis(20));
        }
        panic!("HTTP server did not become ready in time");
    }

    fn send(&self, body: &str, extra_headers: &[(&str, &str)]) -> (u16, HashMap<String, String>, String) {
        let mut stream =
            TcpStream::connect((self.host.as_str(), self.port)).expect("Failed to connect HTTP server");

        let mut req = format!(
            "POST {} HTTP/1.1\r\nHost: {}:{}\r\nContent-Type: application/json\r\nConnection: close\r\nContent-Length: {}\r\n",
            self.endpoint_path,
            self.host,
            self.port,
            body.len()
        );
        for (k, v) in extra_headers {
            req.push_str(&format!("{}: {}\r\n", k, v));
        }
        req.push_str("\r\n");
        req.push_str(body);
        stream.write_all(req.as_bytes()).expect("Failed to write HTTP request");
        stream.flush().unwrap();

        let mut raw = String::new();
        stream.read_to_string(&mut raw).expect("Failed to read HTTP response");

        let (head, body) = raw.split_once("\r\n\r\n").expect("Malformed HTTP response");
        let mut lines = head.lines();
        let status = lines
            .next()
            .and_then(|l| l.split_whitespace().nth(1))
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(500);

        let mut headers = HashMap::new();
        for line in lines {
            if let Some((k, v)) = line.split_once(':') {
                headers.insert(k.trim().to_ascii_lowercase(), v.trim().to_string());
            }
        }

        (status, headers, body.to_string())
    }
}

impl Drop for HttpTestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
    }
}

#[derive(serde::Serialize)]
struct JwtClaims {
    sub: String,
    exp: usize,
}

fn reserve_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind ephemeral port");
    let port = listener.local_addr().expect("Failed to get local addr").port();
    drop(listener);
    port
}

fn initialize_body(id: u64) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-11-25",
            "capabilities": {},
            "clientInfo": {"name": "test", "version": "1.0"}
        }
    })
    .to_string()
}

#[test]
fn test_http_stateful_sessions() {
    let server = HttpTestServer::new_with_env("stateful", &[]);

    let (status, headers, body) = server.send(&initialize_body(1), &[]);
    assert_eq!(status, 200);
    assert!(body.contains("protocolVersion"), "{}", body);
    assert_eq!(
        headers.get("content-type").map(|s| s.as_str()),
        Some("application/json")
    );
    let session_id = headers
        .get("mcp-session-id")
        .cloned()
        .expect("initialize should include MCP-Session-Id header");

    let list = r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#;
    let (_, _, body) = server.send(list, &[("MCP-Session-Id", &session_id)]);
    assert!(body.contains("git_search_code"), "{}", body);

    let (_, _, body) = server.send(list, &[]);
    assert!(body.contains("Missing MCP-Session-Id"), "{}", body);

    let (_, _, body) = server.send(list, &[("MCP-Session-Id", "not-a-session")]);
    assert!(body.contains("Invalid MCP session"), "{}", body);

    let (status, _, body) = server.send(
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        &[("MCP-Session-Id", &session_id)],
    );
    assert_eq!(status, 202);
    assert!(body.is_empty());
}

#[test]
fn test_http_auth_jwt_mode() {
    let secret = "test-secret-key-123456789";
    let server = HttpTestServer::new_with_env(
        "stateless",
        &[("MCP_AUTH_MODE", "jwt"), ("MCP_AUTH_SECRET_KEY", secret)],
    );

    let (status, _, body) = server.send(&initialize_body(100), &[]);
    assert_eq!(status, 401);
    assert!(body.contains("Missing Authorization header"), "{}", body);

    let claims = JwtClaims {
        sub: "test-client".to_string(),
        exp: 4_102_444_800,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("Failed to create jwt token");
    let auth = format!("Bearer {}", token);

    let (status, _, body) = server.send(&initialize_body(101), &[("Authorization", &auth)]);
    assert_eq!(status, 200, "{}", body);
    assert!(body.contains("protocolVersion"), "{}", body);

    let (status, _, _) = server.send(&initialize_body(102), &[("Authorization", "Bearer nope")]);
    assert_eq!(status, 401);
}

#[test]
fn test_http_origin_allowlist() {
    let server = HttpTestServer::new_with_env(
        "stateless",
        &[("MCP_ALLOWED_ORIGINS", "https://allowed.example")],
    );

    let request = r#"{"jsonrpc":"2.0","id":101,"method":"tools/list","params":{}}"#;

    let (status, _, body) = server.send(request, &[("Origin", "https://blocked.example")]);
    assert_eq!(status, 403);
    assert!(body.contains("Forbidden origin"), "{}", body);

    let (status, _, body) = server.send(request, &[("Origin", "https://allowed.example")]);
    assert_eq!(status, 200);
    assert!(body.contains("tools"), "{}", body);
}
