//! Subprocess helpers used by the deployment check.

use std::path::Path;

use tokio::process::Command;

/// Captured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub code: Option<i32>,
}

/// Run a program to completion and capture its output.
///
/// Spawn failures (e.g. the program isn't installed) are returned as errors;
/// a non-zero exit is a successful call with `success == false`.
pub async fn run_command(program: &str, args: &[&str], cwd: Option<&Path>) -> std::io::Result<CommandOutput> {
    tracing::debug!(program, args = ?args, "running command");
    let mut command = Command::new(program);
    command.args(args);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    let output = command.output().await?;
    Ok(CommandOutput {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        code: output.status.code(),
    })
}

/// State of the compose service that hosts the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStatus {
    /// Which compose CLI answered.
    pub tool: String,
    pub running: bool,
    pub output: String,
}

/// Whether `service` shows as `Up` in `ps` output.
pub fn service_is_up(ps_output: &str, service: &str) -> bool {
    ps_output
        .lines()
        .any(|line| line.contains(service) && line.contains("Up"))
}

/// Run `docker-compose -f <file> ps`, falling back to `docker compose` when
/// the standalone binary isn't installed.
pub async fn compose_service_status(compose_file: &Path, service: &str) -> std::io::Result<ServiceStatus> {
    let file = compose_file.to_string_lossy();
    let (tool, output) = match run_command("docker-compose", &["-f", &file, "ps"], None).await {
        Ok(output) => ("docker-compose", output),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("docker-compose not found, trying docker compose");
            (
                "docker compose",
                run_command("docker", &["compose", "-f", &file, "ps"], None).await?,
            )
        }
        Err(e) => return Err(e),
    };

    if !output.success {
        tracing::warn!(tool, stderr = %output.stderr.trim(), "compose ps failed");
    }
    Ok(ServiceStatus {
        tool: tool.to_string(),
        running: output.success && service_is_up(&output.stdout, service),
        output: output.stdout,
    })
}
