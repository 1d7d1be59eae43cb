use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Child, Command};
use std::time::Duration;
use tempfile::TempDir;

/// Find a free TCP port by binding to port 0
pub fn find_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind to port 0");
    listener.local_addr().unwrap().port()
}

/// Wait for a TCP port to accept connections
pub async fn wait_for_port(port: u16, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if tokio::time::Instant::now() > deadline {
            panic!("Timed out waiting for port {} to be ready", port);
        }
        if tokio::net::TcpStream::connect(format!("127.0.0.1:{}", port))
            .await
            .is_ok()
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Get the path to a compiled binary in the target directory
fn cargo_bin(name: &str) -> PathBuf {
    // target/debug/deps/integration-<hash> -> target/debug/<name>
    let mut path = std::env::current_exe()
        .expect("Failed to get current exe")
        .parent()
        .expect("No parent")
        .parent()
        .expect("No grandparent")
        .to_path_buf();
    path.push(name);
    if path.exists() {
        return path;
    }

    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.pop(); // integration-tests -> workspace root
    path.push("target");
    path.push("debug");
    path.push(name);
    if path.exists() {
        return path;
    }

    panic!(
        "Binary '{}' not found. Run `cargo build --workspace` first.",
        name
    );
}

fn spawn_panel(port: u16, db_path: &PathBuf) -> Child {
    Command::new(cargo_bin("hangar-control"))
        .args(["--bind", &format!("127.0.0.1:{}", port)])
        .args(["--db-path", db_path.to_str().unwrap()])
        .args(["--log-level", "debug"])
        .args(["--probe-timeout-secs", "2"])
        .args(["--purge-timeout-secs", "2"])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .expect("Failed to start panel")
}

/// A running panel process backed by a throwaway database
pub struct TestPanel {
    pub port: u16,
    process: Child,
    _temp_dir: TempDir,
    db_path: PathBuf,
}

impl TestPanel {
    /// Start a panel on an ephemeral port
    pub async fn new() -> Self {
        let port = find_free_port();
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("panel.db");

        let process = spawn_panel(port, &db_path);
        wait_for_port(port, Duration::from_secs(10)).await;

        Self {
            port,
            process,
            db_path,
            _temp_dir: temp_dir,
        }
    }

    /// Get the panel base URL
    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn process_mut(&mut self) -> &mut Child {
        &mut self.process
    }

    /// Restart the panel (same DB path, new port)
    pub async fn restart(&mut self) -> u16 {
        let _ = self.process.kill();
        let _ = self.process.wait();

        let port = find_free_port();
        self.process = spawn_panel(port, &self.db_path);
        wait_for_port(port, Duration::from_secs(10)).await;

        self.port = port;
        port
    }

    /// POST /nodes/create with the given JSON body
    pub async fn create_node(&self, body: serde_json::Value) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("{}/nodes/create", self.url()))
            .json(&body)
            .send()
            .await
            .expect("Failed to create node")
    }

    /// GET /admin/nodes
    pub async fn list_nodes(&self) -> ListNodesResponse {
        reqwest::get(format!("{}/admin/nodes", self.url()))
            .await
            .expect("Failed to list nodes")
            .json::<ListNodesResponse>()
            .await
            .expect("Failed to parse response")
    }
}

impl Drop for TestPanel {
    fn drop(&mut self) {
        let _ = self.process.kill();
        let _ = self.process.wait();
    }
}

/// Body for a node whose agent lives at `address:port`
pub fn node_form(name: &str, address: &str, port: u16) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "tags": ["integration"],
        "ram": 1024,
        "disk": 10,
        "processor": 1,
        "address": address,
        "port": port
    })
}

/// Response types for deserialization
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub name: String,
    pub tags: Vec<String>,
    pub api_key: Option<String>,
    pub configure_key: Option<String>,
    pub status: String,
    pub version_release: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListNodesResponse {
    pub nodes: Vec<Node>,
    pub instance_counts: std::collections::BTreeMap<String, usize>,
}
