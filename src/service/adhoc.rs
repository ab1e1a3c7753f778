//! Ad-hoc execution of one-shot commands.

use crate::error::{AppdError, Result};
use crate::service::process::build_command;
use crate::service::unit::Unit;
use tracing::{debug, Span};

/// Runs the unit's command to completion.
///
/// No handle is kept; a non-zero exit is reported as [`AppdError::Exit`].
pub async fn run(unit: &Unit, span: &Span) -> Result<()> {
    let mut cmd = build_command(unit)?;
    let status = cmd.status().await.map_err(|source| AppdError::Spawn {
        command: unit.command.clone(),
        source,
    })?;

    debug!(parent: span, command = %unit.command, exit_code = status.code(), "command completed");

    if !status.success() {
        return Err(AppdError::Exit {
            command: unit.command.clone(),
            status,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(cmd: &str, args: &[&str]) -> Unit {
        let mut unit = Unit::new("command", "adhoc-test").unwrap();
        unit.command = cmd.to_string();
        unit.arguments = args.iter().map(|s| s.to_string()).collect();
        unit
    }

    #[tokio::test]
    async fn test_run_success() {
        assert!(run(&command("true", &[]), &Span::none()).await.is_ok());
    }

    #[tokio::test]
    async fn test_run_non_zero_exit() {
        let err = run(&command("sh", &["-c", "exit 3"]), &Span::none())
            .await
            .unwrap_err();
        match err {
            AppdError::Exit { status, .. } => assert_eq!(status.code(), Some(3)),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_missing_executable() {
        let err = run(&command("/nonexistent/appd-test-binary", &[]), &Span::none())
            .await
            .unwrap_err();
        assert!(matches!(err, AppdError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_run_appends_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("echo.log");

        let mut unit = command("echo", &["hello"]);
        unit.std_out_file_path = Some(out.clone());

        run(&unit, &Span::none()).await.unwrap();
        run(&unit, &Span::none()).await.unwrap();

        let content = std::fs::read_to_string(&out).unwrap();
        assert_eq!(content, "hello\nhello\n");
    }
}
