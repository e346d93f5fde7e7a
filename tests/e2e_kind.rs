use std::error::Error;
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

/// Returns true if the given binary is accessible in PATH.
fn tool_available(binary: &str) -> bool {
    Command::new(binary)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

const TEST_NAMESPACE: &str = "seldon-e2e";
const DEPLOYMENT_NAME: &str = "iris";

// ---------------------------------------------------------------------------
// E2E ingress reconciliation test
//
// Runs the operator binary against a real Kind cluster.
// Run with: cargo test --test e2e_kind -- --ignored
// ---------------------------------------------------------------------------

/// End-to-end test of the Ingress lifecycle of a SeldonDeployment:
///
/// 1. Start (or reuse) a Kind cluster and install the CRD from `crdgen`.
/// 2. Run the operator with ingress enabled, watching the test namespace.
/// 3. Apply a SeldonDeployment with two predictors.
/// 4. Wait for the HTTP and gRPC Ingresses and check their backends.
/// 5. Change the host annotation and wait for the Ingress to follow.
/// 6. Delete the deployment and wait for the Ingresses to be collected.
#[test]
#[ignore]
fn e2e_seldon_deployment_ingress() -> Result<(), Box<dyn Error>> {
    for tool in &["kind", "kubectl"] {
        if !tool_available(tool) {
            eprintln!("Skipping e2e test: `{tool}` not found in PATH.");
            return Ok(());
        }
    }

    let cluster_name = std::env::var("KIND_CLUSTER_NAME").unwrap_or_else(|_| "seldon-e2e".into());
    ensure_kind_cluster(&cluster_name)?;

    // ── Install the CRD ──────────────────────────────────────────────────────
    let crd = run_cmd(env!("CARGO_BIN_EXE_crdgen"), &[])?;
    kubectl_apply(&crd)?;
    run_cmd(
        "kubectl",
        &[
            "wait",
            "--for=condition=Established",
            "crd/seldondeployments.machinelearning.seldon.io",
            "--timeout=60s",
        ],
    )?;

    run_cmd(
        "kubectl",
        &[
            "create",
            "namespace",
            TEST_NAMESPACE,
            "--dry-run=client",
            "-o",
            "yaml",
        ],
    )
    .and_then(|output| kubectl_apply(&output))?;

    // ── Run the operator ─────────────────────────────────────────────────────
    let operator = Command::new(env!("CARGO_BIN_EXE_seldon-ingress-operator"))
        .args(["run", "--namespace", TEST_NAMESPACE, "--api-port", "18080"])
        .env("KUBERNETES_INGRESS_ENABLED", "true")
        .env("KUBERNETES_INGRESS_CLASS_NAME", "nginx")
        .env("KUBERNETES_INGRESS_PATH_TYPE", "Prefix")
        .env("RUST_LOG", "info")
        .stdout(Stdio::null())
        .stderr(Stdio::inherit())
        .spawn()?;
    let _cleanup = Cleanup::new(operator);

    // ── Apply the SeldonDeployment ───────────────────────────────────────────
    kubectl_apply(&seldon_deployment_manifest(None))?;

    wait_for("HTTP and gRPC Ingresses", Duration::from_secs(120), || {
        let names = run_cmd(
            "kubectl",
            &[
                "get",
                "ingress",
                "-n",
                TEST_NAMESPACE,
                "-o",
                "jsonpath={.items[*].metadata.name}",
            ],
        )?;
        let names: Vec<&str> = names.split_whitespace().collect();
        Ok(names.contains(&DEPLOYMENT_NAME) && names.contains(&"iris-grpc"))
    })?;

    let backends = ingress_field(
        DEPLOYMENT_NAME,
        "{.spec.rules[0].http.paths[*].backend.service.name}",
    )?;
    assert_eq!(backends, "iris-default iris-canary");

    let port = ingress_field("iris-grpc", "{.spec.rules[0].http.paths[0].backend.service.port.name}")?;
    assert_eq!(port, "grpc");

    let class = ingress_field(DEPLOYMENT_NAME, "{.spec.ingressClassName}")?;
    assert_eq!(class, "nginx");

    let owner = ingress_field(DEPLOYMENT_NAME, "{.metadata.ownerReferences[0].kind}")?;
    assert_eq!(owner, "SeldonDeployment");

    wait_for("IngressReady condition", Duration::from_secs(60), || {
        let status = run_cmd(
            "kubectl",
            &[
                "get",
                "seldondeployment",
                DEPLOYMENT_NAME,
                "-n",
                TEST_NAMESPACE,
                "-o",
                "jsonpath={.status.conditions[?(@.type==\"IngressReady\")].status}",
            ],
        )?;
        Ok(status == "True")
    })?;

    // ── Change the host annotation ───────────────────────────────────────────
    kubectl_apply(&seldon_deployment_manifest(Some("iris.example.com")))?;

    wait_for("host annotation applied", Duration::from_secs(60), || {
        let host = ingress_field(DEPLOYMENT_NAME, "{.spec.rules[0].host}")?;
        Ok(host == "iris.example.com")
    })?;

    // ── Delete and verify garbage collection ─────────────────────────────────
    run_cmd(
        "kubectl",
        &[
            "delete",
            "seldondeployment",
            DEPLOYMENT_NAME,
            "-n",
            TEST_NAMESPACE,
            "--wait=true",
        ],
    )?;

    wait_for("Ingresses deleted", Duration::from_secs(120), || {
        let names = run_cmd(
            "kubectl",
            &[
                "get",
                "ingress",
                "-n",
                TEST_NAMESPACE,
                "-o",
                "jsonpath={.items[*].metadata.name}",
            ],
        )?;
        Ok(names.trim().is_empty())
    })?;

    Ok(())
}

fn seldon_deployment_manifest(host: Option<&str>) -> String {
    let annotations = match host {
        Some(host) => format!("\n  annotations:\n    seldon.io/ingress-host: {host}"),
        None => String::new(),
    };
    format!(
        r#"apiVersion: machinelearning.seldon.io/v1
kind: SeldonDeployment
metadata:
  name: {name}
  namespace: {namespace}{annotations}
spec:
  predictors:
    - name: default
      replicas: 1
      traffic: 90
    - name: canary
      replicas: 1
      traffic: 10
"#,
        name = DEPLOYMENT_NAME,
        namespace = TEST_NAMESPACE,
        annotations = annotations
    )
}

fn ingress_field(name: &str, jsonpath: &str) -> Result<String, Box<dyn Error>> {
    run_cmd(
        "kubectl",
        &[
            "get",
            "ingress",
            name,
            "-n",
            TEST_NAMESPACE,
            "-o",
            &format!("jsonpath={jsonpath}"),
        ],
    )
}

/// Stops the operator and removes the test namespace
struct Cleanup {
    operator: Child,
}

impl Cleanup {
    fn new(operator: Child) -> Self {
        Self { operator }
    }
}

impl Drop for Cleanup {
    fn drop(&mut self) {
        let _ = self.operator.kill();
        let _ = self.operator.wait();
        let _ = run_cmd_quiet(
            "kubectl",
            &[
                "delete",
                "namespace",
                TEST_NAMESPACE,
                "--ignore-not-found=true",
            ],
        );
    }
}

fn ensure_kind_cluster(name: &str) -> Result<(), Box<dyn Error>> {
    let clusters = run_cmd("kind", &["get", "clusters"])?;
    if clusters.lines().any(|line| line.trim() == name) {
        return Ok(());
    }
    run_cmd("kind", &["create", "cluster", "--name", name])?;
    Ok(())
}

fn kubectl_apply(manifest: &str) -> Result<(), Box<dyn Error>> {
    run_cmd_with_stdin("kubectl", &["apply", "-f", "-"], manifest)
}

fn run_cmd(program: &str, args: &[&str]) -> Result<String, Box<dyn Error>> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Ok(kubeconfig) = std::env::var("KUBECONFIG") {
        cmd.env("KUBECONFIG", kubeconfig);
    }
    let output = cmd.output()?;
    if !output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "command failed: {} {:?}\nstdout:\n{}\nstderr:\n{}",
            program, args, stdout, stderr
        )
        .into());
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn run_cmd_with_stdin(program: &str, args: &[&str], input: &str) -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Ok(kubeconfig) = std::env::var("KUBECONFIG") {
        cmd.env("KUBECONFIG", kubeconfig);
    }
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        use std::io::Write;
        stdin.write_all(input.as_bytes())?;
    }
    let output = child.wait_with_output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("command failed: {} {:?}\nstderr:\n{}", program, args, stderr).into());
    }
    Ok(())
}

fn run_cmd_quiet(program: &str, args: &[&str]) -> Result<(), Box<dyn Error>> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Ok(kubeconfig) = std::env::var("KUBECONFIG") {
        cmd.env("KUBECONFIG", kubeconfig);
    }
    let _ = cmd.output();
    Ok(())
}

fn wait_for<F>(label: &str, timeout: Duration, mut condition: F) -> Result<(), Box<dyn Error>>
where
    F: FnMut() -> Result<bool, Box<dyn Error>>,
{
    let start = Instant::now();
    let mut attempts: u32 = 0;
    loop {
        // Transient kubectl failures count as "not yet"
        if condition().unwrap_or(false) {
            return Ok(());
        }
        attempts += 1;
        if start.elapsed() > timeout {
            return Err(format!(
                "timeout while waiting for {} after {:?} (attempts={})",
                label, timeout, attempts
            )
            .into());
        }
        sleep(Duration::from_secs(3));
    }
}
