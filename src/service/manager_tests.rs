//! Tests for Manager.

#[cfg(test)]
mod tests {
    use crate::error::AppdError;
    use crate::service::config::Config;
    use crate::service::manager::Manager;
    use crate::service::state::{StateKind, StatusKind};
    use crate::service::unit::Unit;
    use std::path::Path;
    use std::time::Duration;
    use tracing::Span;

    fn unit(kind: &str, name: &str, cmd: &str, args: &[&str]) -> Unit {
        let mut unit = Unit::new(kind, name).unwrap();
        unit.command = cmd.to_string();
        unit.arguments = args.iter().map(|s| s.to_string()).collect();
        unit
    }

    fn shell(kind: &str, name: &str, script: &str) -> Unit {
        unit(kind, name, "sh", &["-c", script])
    }

    /// An app that records its name in `log` when interrupted.
    fn recording_app(name: &str, log: &Path) -> Unit {
        let script = format!(
            "trap 'echo {} >> {}; exit 0' INT; while true; do sleep 0.1; done",
            name,
            log.display()
        );
        shell("app", name, &script)
    }

    fn manager(units: Vec<Unit>) -> Manager {
        let mut config = Config::new();
        for unit in units {
            config.add_unit(unit).unwrap();
        }
        Manager::new(config, Span::none()).unwrap()
    }

    #[tokio::test]
    async fn test_unprovisioned_manager_refuses() {
        let manager = Manager::default();
        assert!(!manager.is_provisioned());

        let failures = manager.start().await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].service_name, "all");
        assert!(matches!(
            failures[0].error.as_deref(),
            Some(AppdError::NotProvisioned)
        ));

        let failures = manager.stop().await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].current, StatusKind::Failure);
    }

    #[test]
    fn test_new_manager_propagates_config_error() {
        let mut config = Config::new();
        let mut web = unit("app", "web-server", "sleep", &["10"]);
        web.after = vec!["database".to_string()];
        config.add_unit(web).unwrap();

        let err = Manager::new(config, Span::none()).err().unwrap();
        assert!(matches!(err, AppdError::DanglingReference { .. }));
    }

    #[tokio::test]
    async fn test_start_and_stop_commands() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");

        let manager = manager(vec![
            shell("command", "first", &format!("echo one >> {}", marker.display())),
            shell("command", "second", &format!("echo two >> {}", marker.display())),
        ]);

        assert!(manager.start().await.is_empty());
        assert!(manager.is_started().await);
        assert_eq!(std::fs::read_to_string(&marker).unwrap(), "one\ntwo\n");

        assert!(manager.stop().await.is_empty());
        assert!(!manager.is_started().await);

        for svc in manager.snapshot().await {
            assert_eq!(svc.state.current, StateKind::Completed);
            assert_eq!(svc.status.current, StatusKind::Success);
        }
    }

    #[tokio::test]
    async fn test_start_fails_fast_on_missing_output_parent() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first");
        let third = dir.path().join("third");

        let mut broken = unit("app", "broken-output", "sleep", &["10"]);
        broken.std_out_file_path = Some(dir.path().join("missing").join("out.log"));

        let manager = manager(vec![
            unit("command", "first", "touch", &[first.to_str().unwrap()]),
            broken,
            unit("command", "third", "touch", &[third.to_str().unwrap()]),
        ]);

        let failures = manager.start().await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].service_name, "broken-output");
        assert_eq!(failures[0].current, StatusKind::Failure);
        assert!(matches!(
            failures[0].error.as_deref(),
            Some(AppdError::InvalidOutputPath { .. })
        ));

        assert!(first.exists());
        assert!(!third.exists());
        assert!(!manager.is_started().await);

        let snapshot = manager.snapshot().await;
        assert_eq!(snapshot[0].status.current, StatusKind::Success);
        assert_eq!(snapshot[1].status.current, StatusKind::Failure);
        assert_eq!(snapshot[2].status.current, StatusKind::Pending);
        assert_eq!(snapshot[2].state.current, StateKind::Pending);
    }

    #[tokio::test]
    async fn test_start_fails_fast_on_command_failure() {
        let dir = tempfile::tempdir().unwrap();
        let after = dir.path().join("after");

        let manager = manager(vec![
            unit("command", "failing", "false", &[]),
            unit("command", "never-run", "touch", &[after.to_str().unwrap()]),
        ]);

        let failures = manager.start().await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].service_name, "failing");
        assert!(!after.exists());
    }

    #[tokio::test]
    async fn test_noop_units_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");

        let mut skipped = unit("command", "skipped", "touch", &[marker.to_str().unwrap()]);
        skipped.noop = true;
        let manager = manager(vec![skipped]);

        assert!(manager.start().await.is_empty());
        assert!(!marker.exists());
        assert!(manager.stop().await.is_empty());

        let snapshot = manager.snapshot().await;
        assert_eq!(snapshot[0].status.current, StatusKind::Pending);
    }

    #[tokio::test]
    async fn test_stop_visits_services_in_descending_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("stop-order.log");

        let mut idle = unit("app", "idle-app", "sleep", &["30"]);
        idle.noop = true;

        let manager = manager(vec![
            recording_app("app-one", &log),
            unit("command", "hostname", "true", &[]),
            recording_app("app-two", &log),
            idle,
            recording_app("app-three", &log),
        ]);

        assert!(manager.start().await.is_empty());
        // Let the shells install their traps.
        tokio::time::sleep(Duration::from_millis(500)).await;

        let failures = manager.stop().await;
        let names: Vec<_> = failures.iter().map(|s| s.service_name.as_str()).collect();
        assert_eq!(names, ["app-three", "app-two", "app-one"]);

        // A clean exit after the interrupt is still reported as a failure.
        for status in &failures {
            assert_eq!(status.current, StatusKind::Failure);
            match status.error.as_deref() {
                Some(AppdError::ProcessExited { status }) => assert!(status.success()),
                other => panic!("unexpected error: {:?}", other),
            }
        }

        let order = std::fs::read_to_string(&log).unwrap();
        assert_eq!(order, "app-three\napp-two\napp-one\n");

        let snapshot = manager.snapshot().await;
        assert_eq!(snapshot[3].state.current, StateKind::Pending);
        assert!(!manager.is_started().await);
    }

    #[tokio::test]
    async fn test_stop_force_terminates_stubborn_app() {
        let manager = manager(vec![
            unit("command", "before-app", "true", &[]),
            shell("app", "stubborn", "trap '' INT; exec sleep 30"),
            unit("command", "after-app", "true", &[]),
        ]);

        assert!(manager.start().await.is_empty());
        tokio::time::sleep(Duration::from_millis(200)).await;

        let failures = manager.stop().await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].service_name, "stubborn");
        assert!(matches!(
            failures[0].error.as_deref(),
            Some(AppdError::ForceTerminated)
        ));

        let snapshot = manager.snapshot().await;
        assert_eq!(snapshot[0].status.current, StatusKind::Success);
        assert_eq!(snapshot[2].status.current, StatusKind::Success);
    }

    #[tokio::test]
    async fn test_start_refuses_while_started() {
        let manager = manager(vec![unit("app", "sleeper", "sleep", &["30"])]);
        assert!(manager.start().await.is_empty());

        let failures = manager.start().await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].service_name, "all");
        assert!(matches!(
            failures[0].error.as_deref(),
            Some(AppdError::AlreadyStarted)
        ));
        assert!(manager.is_started().await);

        // The original process is still reachable by Stop.
        let failures = manager.stop().await;
        assert_eq!(failures.len(), 1);
        assert!(matches!(
            failures[0].error.as_deref(),
            Some(AppdError::ProcessExited { .. })
        ));

        assert!(manager.start().await.is_empty());
        assert_eq!(manager.stop().await.len(), 1);
    }

    #[tokio::test]
    async fn test_stop_after_failed_start_skips_unstarted_apps() {
        let manager = manager(vec![
            unit("app", "sleeper", "sleep", &["30"]),
            unit("command", "failing", "false", &[]),
            unit("app", "never-started", "sleep", &["30"]),
        ]);

        assert_eq!(manager.start().await.len(), 1);

        let failures = manager.stop().await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].service_name, "sleeper");
    }
}
