mod support;

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::sync::Arc;

use serde_json::json;
use tempfile::tempdir;

use support::{
    ConnectionMode, closed_port, run_trafficgen, spawn_recording_server_or_skip,
    spawn_server_or_skip,
};
use trafficgen::config::JobConfig;
use trafficgen::entropy::Entropy;
use trafficgen::http::{HttpJob, JobEnv};
use trafficgen::metrics::{HttpOutcome, MetricsRegistry, MetricsSink};
use trafficgen::pacing::IterationBudget;
use trafficgen::shutdown::shutdown_channel;

fn run_async_test<F>(future: F) -> Result<(), String>
where
    F: std::future::Future<Output = Result<(), String>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .map_err(|err| format!("Failed to build runtime: {}", err))?;
    runtime.block_on(future)
}

fn env_with(registry: &Arc<MetricsRegistry>) -> JobEnv {
    JobEnv {
        metrics: Arc::clone(registry) as Arc<dyn MetricsSink>,
        entropy: Arc::new(Entropy::from_seed(99)),
        debug: true,
    }
}

async fn run_job(config: &JobConfig, env: &JobEnv) -> Result<(HttpJob, u64), String> {
    let job = HttpJob::prepare(config, env).map_err(|err| err.to_string())?;
    let (shutdown_tx, _) = shutdown_channel();
    let mut budget = IterationBudget::new(config.count, shutdown_tx.subscribe());
    let ran = job.run(&mut budget).await;
    Ok((job, ran))
}

fn host_of(base: &str) -> Result<String, String> {
    base.strip_prefix("http://")
        .map(str::to_owned)
        .ok_or_else(|| format!("Unexpected base url: {}", base))
}

#[test]
fn e2e_job_sends_rendered_requests_byte_exact() -> Result<(), String> {
    let Some((base, server)) = spawn_recording_server_or_skip(500)? else {
        return Ok(());
    };
    run_async_test(async {
        let registry = Arc::new(MetricsRegistry::new());
        let env = env_with(&registry);
        let config = JobConfig {
            method: "POST".to_owned(),
            path: format!("{}/a/../items/%7e/{{{{ random_int 100 }}}}?q=1", base),
            body: "hello".to_owned(),
            headers: BTreeMap::from([(
                "X-{{ random_regex \"(alpha|beta)\" }}".to_owned(),
                "{{ random_uuid }}".to_owned(),
            )]),
            count: Some(12),
            ..JobConfig::default()
        };

        let (job, ran) = run_job(&config, &env).await?;
        if ran != 12 {
            return Err(format!("Expected 12 iterations, ran {}", ran));
        }

        let host = host_of(&base)?;
        let ok = registry.http_count(&host, "POST", HttpOutcome::Success);
        let failed = registry.http_count(&host, "POST", HttpOutcome::Fail);
        if ok != 12 || failed != 0 {
            return Err(format!("Unexpected outcomes: ok={} failed={}", ok, failed));
        }
        if registry.traffic(job.stream()) == 0 {
            return Err("Expected traffic volume to be recorded".to_owned());
        }

        let heads = server.heads();
        if heads.len() != 12 {
            return Err(format!("Expected 12 requests, server saw {}", heads.len()));
        }
        for head in heads {
            let lines: Vec<&str> = head.split("\r\n").collect();
            let request_line = lines.first().copied().unwrap_or_default();
            if !request_line.starts_with("POST /a/../items/%7e/")
                || !request_line.ends_with("?q=1 HTTP/1.1")
            {
                return Err(format!("Unexpected request line: {}", request_line));
            }
            let names: Vec<&str> = lines
                .iter()
                .skip(1)
                .filter_map(|line| line.split_once(": ").map(|(name, _)| name))
                .collect();
            let custom = names.get(2).copied().unwrap_or_default();
            if names.len() != 4
                || names.first() != Some(&"Host")
                || names.get(1) != Some(&"User-Agent")
                || !(custom == "X-alpha" || custom == "X-beta")
                || names.get(3) != Some(&"Content-Length")
            {
                return Err(format!("Unexpected header names {:?} in: {}", names, head));
            }
            if !lines.contains(&format!("Host: {}", host).as_str())
                || !lines.contains(&"Content-Length: 5")
            {
                return Err(format!("Unexpected Host or Content-Length: {}", head));
            }
            if !head.contains("\r\nUser-Agent: Mozilla/5.0") {
                return Err(format!("Missing randomized User-Agent: {}", head));
            }
        }
        Ok(())
    })
}

#[test]
fn e2e_job_tunnels_through_proxy_list() -> Result<(), String> {
    let Some((proxy, server)) = spawn_recording_server_or_skip(200)? else {
        return Ok(());
    };
    run_async_test(async {
        let registry = Arc::new(MetricsRegistry::new());
        let env = env_with(&registry);
        let config = JobConfig {
            path: "http://upstream.invalid/resource".to_owned(),
            client: json!({ "proxy_urls": format!("[\"{}\"]", proxy), "timeout": "5s" }),
            count: Some(3),
            ..JobConfig::default()
        };

        let (job, ran) = run_job(&config, &env).await?;
        if ran != 3 || job.client().proxies().len() != 1 {
            return Err(format!("Unexpected run: ran={}", ran));
        }
        if registry.http_count("upstream.invalid", "GET", HttpOutcome::Success) != 3 {
            return Err("Expected three proxied successes".to_owned());
        }
        let tunnels = server.tunnels();
        if tunnels.len() != 3 {
            return Err(format!("Expected 3 tunnels, saw {}", tunnels.len()));
        }
        for tunnel in tunnels {
            if !tunnel.starts_with("CONNECT upstream.invalid:80 HTTP/1.1\r\n")
                || tunnel.contains("Proxy-Authorization")
            {
                return Err(format!("Unexpected CONNECT: {}", tunnel));
            }
        }
        let heads = server.heads();
        if heads.len() != 3 {
            return Err(format!("Expected 3 tunnelled requests, saw {}", heads.len()));
        }
        for head in heads {
            if !head.starts_with("GET /resource HTTP/1.1\r\nHost: upstream.invalid\r\n") {
                return Err(format!("Expected an origin-form request: {}", head));
            }
        }
        Ok(())
    })
}

#[test]
fn e2e_job_sends_each_proxy_only_its_own_credentials() -> Result<(), String> {
    let Some((first, first_server)) = spawn_recording_server_or_skip(200)? else {
        return Ok(());
    };
    let Some((second, second_server)) = spawn_recording_server_or_skip(200)? else {
        return Ok(());
    };
    let first_host = host_of(&first)?;
    let second_host = host_of(&second)?;
    run_async_test(async {
        let registry = Arc::new(MetricsRegistry::new());
        let env = env_with(&registry);
        let proxies = format!(
            "[\"http://ua:pa@{}\",\"http://ub:pb@{}\"]",
            first_host, second_host
        );
        let config = JobConfig {
            path: "http://upstream.invalid/resource".to_owned(),
            client: json!({ "proxy_urls": proxies, "timeout": "5s" }),
            count: Some(20),
            ..JobConfig::default()
        };

        let (_job, ran) = run_job(&config, &env).await?;
        if ran != 20 {
            return Err(format!("Expected 20 iterations, ran {}", ran));
        }
        if registry.http_count("upstream.invalid", "GET", HttpOutcome::Success) != 20 {
            return Err("Expected every proxied request to succeed".to_owned());
        }

        // Basic ua:pa and ub:pb.
        let checks = [
            (&first_server, "dWE6cGE=", "dWI6cGI="),
            (&second_server, "dWI6cGI=", "dWE6cGE="),
        ];
        let mut used = 0usize;
        for (server, own, other) in checks {
            let tunnels = server.tunnels();
            for tunnel in &tunnels {
                let expected = format!("\r\nProxy-Authorization: Basic {}", own);
                if !tunnel.contains(&expected) || tunnel.contains(other) {
                    return Err(format!("Wrong credentials sent to proxy: {}", tunnel));
                }
            }
            for head in server.heads() {
                if head.to_ascii_lowercase().contains("proxy-authorization") {
                    return Err(format!("Credentials leaked into a request: {}", head));
                }
            }
            if tunnels.is_empty() {
                return Err("Expected both proxies to be used".to_owned());
            }
            used = used.saturating_add(tunnels.len());
        }
        if used != 20 {
            return Err(format!("Expected one tunnel per request, saw {}", used));
        }
        Ok(())
    })
}

#[test]
fn e2e_job_reuses_a_kept_alive_tunnel() -> Result<(), String> {
    let Some((proxy, server)) = spawn_server_or_skip(200, ConnectionMode::KeepAlive)? else {
        return Ok(());
    };
    run_async_test(async {
        let registry = Arc::new(MetricsRegistry::new());
        let env = env_with(&registry);
        let config = JobConfig {
            path: "http://upstream.invalid/resource".to_owned(),
            client: json!({ "proxy_urls": format!("[\"{}\"]", proxy), "timeout": "5s" }),
            count: Some(5),
            ..JobConfig::default()
        };

        let (_job, ran) = run_job(&config, &env).await?;
        if ran != 5 {
            return Err(format!("Expected 5 iterations, ran {}", ran));
        }
        let tunnels = server.tunnels().len();
        let requests = server.heads().len();
        if tunnels != 1 || requests != 5 {
            return Err(format!(
                "Expected one tunnel carrying 5 requests, saw {} tunnels and {} requests",
                tunnels, requests
            ));
        }
        Ok(())
    })
}

#[test]
fn e2e_job_counts_unreachable_target_as_failure() -> Result<(), String> {
    let port = closed_port()?;
    run_async_test(async {
        let registry = Arc::new(MetricsRegistry::new());
        let env = env_with(&registry);
        let config = JobConfig {
            path: format!("http://127.0.0.1:{}/", port),
            client: json!({ "timeout": "2s" }),
            count: Some(2),
            ..JobConfig::default()
        };

        let (job, ran) = run_job(&config, &env).await?;
        if ran != 2 {
            return Err(format!("Expected 2 iterations, ran {}", ran));
        }
        let host = format!("127.0.0.1:{}", port);
        if registry.http_count(&host, "GET", HttpOutcome::Fail) != 2
            || registry.http_count(&host, "GET", HttpOutcome::Success) != 0
        {
            return Err("Expected two failures and no successes".to_owned());
        }
        // Empty method, no body or headers: only the path is counted.
        let expected_volume = u64::try_from(config.path.len())
            .map_err(|err| err.to_string())?
            .saturating_mul(2);
        if registry.traffic(job.stream()) != expected_volume {
            return Err(format!(
                "Expected {} bytes, got {}",
                expected_volume,
                registry.traffic(job.stream())
            ));
        }
        Ok(())
    })
}

#[test]
fn e2e_cli_runs_jobs_file_to_completion() -> Result<(), String> {
    let Some((base, server)) = spawn_recording_server_or_skip(204)? else {
        return Ok(());
    };
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let path = dir.path().join("jobs.toml");
    let content = format!(
        r#"
[[jobs]]
name = "cli"
instances = 2

[jobs.args]
method = "GET"
path = "{}/ping?n={{{{ random_int 10 }}}}"
count = 3
"#,
        base
    );
    std::fs::write(&path, content).map_err(|err| format!("write failed: {}", err))?;

    let output = run_trafficgen([
        OsStr::new("--config"),
        path.as_os_str(),
        OsStr::new("--seed"),
        OsStr::new("7"),
        OsStr::new("--report-interval"),
        OsStr::new("1s"),
    ])?;
    if !output.status.success() {
        return Err(format!(
            "trafficgen failed: {}",
            String::from_utf8_lossy(&output.stderr)
        ));
    }
    let heads = server.heads();
    if heads.len() != 6 {
        return Err(format!("Expected 6 requests, server saw {}", heads.len()));
    }
    Ok(())
}

#[test]
fn e2e_cli_rejects_missing_jobs_file() -> Result<(), String> {
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let missing = dir.path().join("absent.toml");
    let output = run_trafficgen([OsStr::new("--config"), missing.as_os_str()])?;
    if output.status.success() {
        return Err("Expected a missing jobs file to fail".to_owned());
    }
    Ok(())
}
