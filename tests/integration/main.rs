//! Integration tests for extsync

mod support {
    use async_trait::async_trait;
    use extsync::channel::{CommandStatus, Connector, LocalChannel, RemoteChannel, TargetMachine};
    use extsync::error::{ExtsyncError, ExtsyncResult};
    use std::collections::{HashMap, HashSet};
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Call counters shared between a test and the channels it hands out
    #[derive(Debug, Default)]
    pub struct Calls {
        pub connects: AtomicUsize,
        pub exists: AtomicUsize,
        pub uploads: AtomicUsize,
        pub commands: AtomicUsize,
        pub closes: AtomicUsize,
    }

    impl Calls {
        pub fn uploads(&self) -> usize {
            self.uploads.load(Ordering::SeqCst)
        }

        pub fn commands(&self) -> usize {
            self.commands.load(Ordering::SeqCst)
        }

        pub fn closes(&self) -> usize {
            self.closes.load(Ordering::SeqCst)
        }

        pub fn exists_checks(&self) -> usize {
            self.exists.load(Ordering::SeqCst)
        }
    }

    /// Scripted behavior of one fake machine
    #[derive(Debug, Default)]
    pub struct FakeHost {
        pub existing: Mutex<HashSet<PathBuf>>,
        /// Exit code of every remote command
        pub command_code: i32,
        /// Paths that appear once any command has run
        pub created_by_command: Vec<PathBuf>,
        /// Latency added to every existence check
        pub latency: Duration,
        /// Existence checks fail with a transport error
        pub fail_exists: bool,
        /// Uploads fail after the archive was handed over
        pub fail_upload: bool,
        pub calls: Calls,
    }

    impl FakeHost {
        pub fn with_existing(path: impl Into<PathBuf>) -> Self {
            let host = Self::default();
            host.existing.lock().unwrap().insert(path.into());
            host
        }
    }

    pub struct FakeChannel {
        target: TargetMachine,
        host: Arc<FakeHost>,
    }

    #[async_trait]
    impl RemoteChannel for FakeChannel {
        fn target(&self) -> &TargetMachine {
            &self.target
        }

        async fn exists(&self, path: &Path) -> ExtsyncResult<bool> {
            self.host.calls.exists.fetch_add(1, Ordering::SeqCst);
            if !self.host.latency.is_zero() {
                tokio::time::sleep(self.host.latency).await;
            }
            if self.host.fail_exists {
                return Err(ExtsyncError::channel(
                    &self.target.host,
                    "stat exited with 2: Permission denied",
                ));
            }
            Ok(self.host.existing.lock().unwrap().contains(path))
        }

        async fn upload(&self, local: &Path, remote: &Path) -> ExtsyncResult<()> {
            assert!(local.is_file(), "archive missing during upload");
            self.host.calls.uploads.fetch_add(1, Ordering::SeqCst);
            if self.host.fail_upload {
                return Err(ExtsyncError::Transfer {
                    host: self.target.host.clone(),
                    path: remote.display().to_string(),
                    reason: "sftp exited with 1: No space left on device".to_string(),
                });
            }
            Ok(())
        }

        async fn run_command(&self, _command: &str) -> ExtsyncResult<CommandStatus> {
            self.host.calls.commands.fetch_add(1, Ordering::SeqCst);
            let mut existing = self.host.existing.lock().unwrap();
            existing.extend(self.host.created_by_command.iter().cloned());
            Ok(CommandStatus {
                code: self.host.command_code,
                stdout: String::new(),
                stderr: if self.host.command_code == 0 {
                    String::new()
                } else {
                    "tar: unexpected EOF".to_string()
                },
            })
        }

        async fn close(&self) -> ExtsyncResult<()> {
            self.host.calls.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Connector over a fixed set of fake hosts; unknown hosts refuse connections
    #[derive(Default)]
    pub struct FakeConnector {
        pub hosts: HashMap<String, Arc<FakeHost>>,
    }

    impl FakeConnector {
        pub fn add(&mut self, name: &str, host: FakeHost) -> Arc<FakeHost> {
            let host = Arc::new(host);
            self.hosts.insert(name.to_string(), Arc::clone(&host));
            host
        }
    }

    #[async_trait]
    impl Connector for FakeConnector {
        async fn connect(&self, target: &TargetMachine) -> ExtsyncResult<Box<dyn RemoteChannel>> {
            let host = self
                .hosts
                .get(&target.host)
                .ok_or_else(|| ExtsyncError::channel(&target.host, "connection refused"))?;
            host.calls.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeChannel {
                target: target.clone(),
                host: Arc::clone(host),
            }))
        }
    }

    /// Real local filesystem channel with call counting
    pub struct CountingChannel {
        inner: LocalChannel,
        calls: Arc<Calls>,
    }

    #[async_trait]
    impl RemoteChannel for CountingChannel {
        fn target(&self) -> &TargetMachine {
            self.inner.target()
        }

        async fn exists(&self, path: &Path) -> ExtsyncResult<bool> {
            self.calls.exists.fetch_add(1, Ordering::SeqCst);
            self.inner.exists(path).await
        }

        async fn upload(&self, local: &Path, remote: &Path) -> ExtsyncResult<()> {
            self.calls.uploads.fetch_add(1, Ordering::SeqCst);
            self.inner.upload(local, remote).await
        }

        async fn run_command(&self, command: &str) -> ExtsyncResult<CommandStatus> {
            self.calls.commands.fetch_add(1, Ordering::SeqCst);
            self.inner.run_command(command).await
        }

        async fn close(&self) -> ExtsyncResult<()> {
            self.calls.closes.fetch_add(1, Ordering::SeqCst);
            self.inner.close().await
        }
    }

    #[derive(Default)]
    pub struct CountingConnector {
        pub calls: Arc<Calls>,
    }

    #[async_trait]
    impl Connector for CountingConnector {
        async fn connect(&self, _target: &TargetMachine) -> ExtsyncResult<Box<dyn RemoteChannel>> {
            self.calls.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingChannel {
                inner: LocalChannel::new(),
                calls: Arc::clone(&self.calls),
            }))
        }
    }
}

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn extsync(home: &Path) -> Command {
        let config = home.join("config.toml");
        if !config.exists() {
            std::fs::write(&config, "[general]\njournal = false\n").unwrap();
        }
        let mut cmd = cargo_bin_cmd!("extsync");
        cmd.env("EXTSYNC_CONFIG", config).arg("--no-local");
        cmd
    }

    #[test]
    fn help_displays() {
        let home = TempDir::new().unwrap();
        extsync(home.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("cached external modules"));
    }

    #[test]
    fn version_displays() {
        let home = TempDir::new().unwrap();
        extsync(home.path())
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("extsync"));
    }

    #[test]
    fn config_path() {
        let home = TempDir::new().unwrap();
        extsync(home.path())
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let home = TempDir::new().unwrap();
        extsync(home.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[remote]"))
            .stdout(predicate::str::contains("journal = false"));
    }

    #[test]
    fn config_set_rejects_unknown_key() {
        let home = TempDir::new().unwrap();
        extsync(home.path())
            .args(["config", "set", "ssh.usr", "deploy"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key: ssh.usr"));

        extsync(home.path())
            .args(["config", "set", "ssh.user", "1234"])
            .assert()
            .success();
        extsync(home.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("user = \"1234\""));
    }

    #[test]
    fn identify_prints_stable_identity() {
        let home = TempDir::new().unwrap();
        let tree = home.path().join("foo");
        std::fs::create_dir(&tree).unwrap();
        std::fs::write(tree.join("contents.txt"), "hello").unwrap();

        let expected = extsync::identify(&tree).unwrap();
        extsync(home.path())
            .args(["identify"])
            .arg(&tree)
            .assert()
            .success()
            .stdout(predicate::str::diff(format!("{}\n", expected)));
    }

    #[test]
    fn identify_missing_directory_fails() {
        let home = TempDir::new().unwrap();
        extsync(home.path())
            .args(["identify", "/definitely/not/here"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Cannot identify"));
    }

    #[test]
    fn setup_without_manifest_fails() {
        let home = TempDir::new().unwrap();
        extsync(home.path())
            .current_dir(home.path())
            .args(["setup", "--local"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Manifest not found"));
    }

    #[test]
    fn setup_local_links_modules_into_project() {
        let home = TempDir::new().unwrap();
        let project = home.path().join("app");
        let source = home.path().join("foo-src");
        std::fs::create_dir_all(&project).unwrap();
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("contents.txt"), "fixed bytes").unwrap();
        std::fs::write(
            project.join("externals.toml"),
            "[[module]]\npath = \"vendor/plugins/foo\"\ntype = \"archive\"\nsource = \"../foo-src\"\n",
        )
        .unwrap();

        extsync(home.path())
            .current_dir(&project)
            .args(["setup", "--local", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"outcome\": \"completed\""));

        let identity = extsync::identify(&source).unwrap();
        let cached = home
            .path()
            .join("shared/externals/vendor/plugins/foo")
            .join(identity.as_str());
        assert_eq!(
            std::fs::read_to_string(cached.join("contents.txt")).unwrap(),
            "fixed bytes"
        );

        let link = project.join("vendor/plugins/foo");
        assert!(link.symlink_metadata().unwrap().file_type().is_symlink());
        assert_eq!(
            std::fs::read_to_string(link.join("contents.txt")).unwrap(),
            "fixed bytes"
        );

        extsync(home.path())
            .current_dir(&project)
            .args(["setup", "--local", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"outcome\": \"skipped\""));
    }

    #[test]
    fn check_reports_missing_then_present() {
        let home = TempDir::new().unwrap();
        let project = home.path().join("app");
        std::fs::create_dir_all(project.join("lib-src")).unwrap();
        std::fs::write(project.join("lib-src/a.rb"), "puts 1").unwrap();
        std::fs::write(
            project.join("externals.toml"),
            "[[module]]\npath = \"vendor/lib\"\nsource = \"lib-src\"\n",
        )
        .unwrap();

        extsync(home.path())
            .current_dir(&project)
            .args(["check", "--local", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("vendor/lib\tlocal\tmissing"));

        extsync(home.path())
            .current_dir(&project)
            .args(["setup", "--local"])
            .assert()
            .success();

        extsync(home.path())
            .current_dir(&project)
            .args(["check", "--local", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("vendor/lib\tlocal\tpresent"));
    }
}

mod sync_tests {
    use crate::support::{CountingConnector, FakeConnector, FakeHost};
    use extsync::channel::TargetMachine;
    use extsync::checkout::{CheckoutState, Outcome};
    use extsync::error::ExtsyncError;
    use extsync::{identify, SyncCoordinator, SyncSettings};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    const MODULE: &str = "vendor/plugins/foo";

    fn settings(shared_root: &Path) -> SyncSettings {
        SyncSettings {
            shared_root: shared_root.to_path_buf(),
            remote_tmp: shared_root.join("tmp"),
            scratch_dir: None,
            excludes: vec![],
        }
    }

    fn source_tree(dir: &TempDir) -> PathBuf {
        let tree = dir.path().join("foo");
        std::fs::create_dir_all(&tree).unwrap();
        std::fs::write(tree.join("contents.txt"), b"fixed bytes\n").unwrap();
        tree
    }

    fn targets(hosts: &[&str]) -> Vec<TargetMachine> {
        hosts.iter().map(|h| TargetMachine::ssh(*h)).collect()
    }

    #[tokio::test]
    async fn existing_destination_is_skipped_without_transfer() {
        let dir = TempDir::new().unwrap();
        let tree = source_tree(&dir);
        let identity = identify(&tree).unwrap();
        let root = PathBuf::from("/srv/shared/externals");
        let destination = root.join(MODULE).join(identity.as_str());

        let mut connector = FakeConnector::default();
        let web1 = connector.add("web1", FakeHost::with_existing(&destination));
        let coordinator = SyncCoordinator::new(settings(&root), Arc::new(connector));

        let report = coordinator
            .sync(MODULE, &tree, &identity, &targets(&["web1"]))
            .await
            .unwrap();

        assert!(report.is_success());
        assert!(matches!(report.checkouts[0].outcome, Outcome::Skipped));
        assert_eq!(
            report.checkouts[0].history,
            [
                CheckoutState::Pending,
                CheckoutState::CheckingDestination,
                CheckoutState::Skipped
            ]
        );
        assert_eq!(web1.calls.uploads(), 0);
        assert_eq!(web1.calls.commands(), 0);
        assert_eq!(web1.calls.closes(), 1);
    }

    #[tokio::test]
    async fn one_failing_machine_does_not_affect_others() {
        let dir = TempDir::new().unwrap();
        let tree = source_tree(&dir);
        let identity = identify(&tree).unwrap();

        let mut connector = FakeConnector::default();
        let healthy: Vec<_> = ["web1", "web2", "web4"]
            .iter()
            .map(|h| connector.add(h, FakeHost::default()))
            .collect();
        let broken = connector.add(
            "web3",
            FakeHost {
                command_code: 2,
                ..FakeHost::default()
            },
        );
        let coordinator = SyncCoordinator::new(
            settings(Path::new("/srv/shared/externals")),
            Arc::new(connector),
        );

        let report = coordinator
            .sync(MODULE, &tree, &identity, &targets(&["web1", "web2", "web3", "web4"]))
            .await
            .unwrap();

        assert!(!report.is_success());
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].host, "web3");
        match &failures[0].outcome {
            Outcome::Failed { step, error } => {
                assert_eq!(*step, CheckoutState::Extracting);
                match error {
                    ExtsyncError::RemoteCommand { code, command, .. } => {
                        assert_eq!(*code, 2);
                        assert!(command.contains("tar xzf"));
                    }
                    other => panic!("unexpected error: {other}"),
                }
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(report.completed(), 3);

        for host in healthy.iter().chain(std::iter::once(&broken)) {
            assert_eq!(host.calls.uploads(), 1);
            assert_eq!(host.calls.closes(), 1);
        }

        let err = report.into_result().unwrap_err();
        assert!(err.to_string().contains("web3"));
    }

    #[tokio::test]
    async fn lost_race_counts_as_completed() {
        let dir = TempDir::new().unwrap();
        let tree = source_tree(&dir);
        let identity = identify(&tree).unwrap();
        let root = PathBuf::from("/srv/shared/externals");
        let destination = root.join(MODULE).join(identity.as_str());

        let mut connector = FakeConnector::default();
        connector.add(
            "web1",
            FakeHost {
                command_code: 1,
                created_by_command: vec![destination],
                ..FakeHost::default()
            },
        );
        let coordinator = SyncCoordinator::new(settings(&root), Arc::new(connector));

        let report = coordinator
            .sync(MODULE, &tree, &identity, &targets(&["web1"]))
            .await
            .unwrap();

        assert!(report.is_success());
        assert!(matches!(report.checkouts[0].outcome, Outcome::Completed));
    }

    #[tokio::test]
    async fn unreachable_machine_fails_before_checking() {
        let dir = TempDir::new().unwrap();
        let tree = source_tree(&dir);
        let identity = identify(&tree).unwrap();

        let mut connector = FakeConnector::default();
        let web1 = connector.add("web1", FakeHost::default());
        let coordinator = SyncCoordinator::new(
            settings(Path::new("/srv/shared/externals")),
            Arc::new(connector),
        );

        let report = coordinator
            .sync(MODULE, &tree, &identity, &targets(&["web1", "gone"]))
            .await
            .unwrap();

        assert_eq!(report.checkouts[0].host, "web1");
        assert!(report.checkouts[0].outcome.is_success());
        assert_eq!(web1.calls.uploads(), 1);

        assert_eq!(report.checkouts[1].host, "gone");
        match &report.checkouts[1].outcome {
            Outcome::Failed { step, error } => {
                assert_eq!(*step, CheckoutState::Pending);
                assert!(matches!(error, ExtsyncError::Channel { .. }));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn upload_failure_is_reported_at_transfer() {
        let dir = TempDir::new().unwrap();
        let tree = source_tree(&dir);
        let identity = identify(&tree).unwrap();

        let mut connector = FakeConnector::default();
        let web1 = connector.add("web1", FakeHost::default());
        let full = connector.add(
            "web2",
            FakeHost {
                fail_upload: true,
                ..FakeHost::default()
            },
        );
        let web3 = connector.add("web3", FakeHost::default());
        let coordinator = SyncCoordinator::new(
            settings(Path::new("/srv/shared/externals")),
            Arc::new(connector),
        );

        let report = coordinator
            .sync(MODULE, &tree, &identity, &targets(&["web1", "web2", "web3"]))
            .await
            .unwrap();

        assert_eq!(report.completed(), 2);
        let failed = &report.checkouts[1];
        assert_eq!(failed.host, "web2");
        match &failed.outcome {
            Outcome::Failed { step, error } => {
                assert_eq!(*step, CheckoutState::Transferring);
                match error {
                    ExtsyncError::Transfer { host, reason, .. } => {
                        assert_eq!(host, "web2");
                        assert!(reason.contains("No space left"), "{reason}");
                    }
                    other => panic!("unexpected error: {other}"),
                }
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(failed.history.last(), Some(&CheckoutState::Failed));

        assert_eq!(full.calls.commands(), 0);
        for host in [&web1, &full, &web3] {
            assert_eq!(host.calls.uploads(), 1);
            assert_eq!(host.calls.closes(), 1);
        }
    }

    #[tokio::test]
    async fn existence_check_failure_is_a_channel_error() {
        let dir = TempDir::new().unwrap();
        let tree = source_tree(&dir);
        let identity = identify(&tree).unwrap();

        let mut connector = FakeConnector::default();
        let denied = connector.add(
            "web1",
            FakeHost {
                fail_exists: true,
                ..FakeHost::default()
            },
        );
        let web2 = connector.add("web2", FakeHost::default());
        let coordinator = SyncCoordinator::new(
            settings(Path::new("/srv/shared/externals")),
            Arc::new(connector),
        );

        let report = coordinator
            .sync(MODULE, &tree, &identity, &targets(&["web1", "web2"]))
            .await
            .unwrap();

        match &report.checkouts[0].outcome {
            Outcome::Failed { step, error } => {
                assert_eq!(*step, CheckoutState::CheckingDestination);
                assert!(matches!(error, ExtsyncError::Channel { host, .. } if host == "web1"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(denied.calls.uploads(), 0);
        assert_eq!(denied.calls.commands(), 0);
        assert_eq!(denied.calls.closes(), 1);

        assert!(report.checkouts[1].outcome.is_success());
        assert_eq!(web2.calls.uploads(), 1);
        assert_eq!(web2.calls.closes(), 1);
    }

    #[tokio::test]
    async fn machines_are_checked_out_concurrently() {
        let dir = TempDir::new().unwrap();
        let tree = source_tree(&dir);
        let identity = identify(&tree).unwrap();
        let latency = Duration::from_millis(500);
        let hosts = ["web1", "web2", "web3", "web4"];

        let mut connector = FakeConnector::default();
        let fakes: Vec<_> = hosts
            .iter()
            .map(|h| {
                connector.add(
                    h,
                    FakeHost {
                        latency,
                        ..FakeHost::default()
                    },
                )
            })
            .collect();
        let coordinator = SyncCoordinator::new(
            settings(Path::new("/srv/shared/externals")),
            Arc::new(connector),
        );

        let started = Instant::now();
        let report = coordinator
            .sync(MODULE, &tree, &identity, &targets(&hosts))
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert_eq!(report.completed(), hosts.len());
        assert!(fakes.iter().all(|h| h.calls.exists_checks() == 1));
        // One latency per machine in sequence would take 2s
        assert!(
            elapsed < latency * 3,
            "checkouts ran one after another: {elapsed:?}"
        );
    }

    #[tokio::test]
    async fn slow_machine_does_not_hold_back_the_others() {
        let dir = TempDir::new().unwrap();
        let tree = source_tree(&dir);
        let identity = identify(&tree).unwrap();

        let mut connector = FakeConnector::default();
        let web1 = connector.add("web1", FakeHost::default());
        let slow = connector.add(
            "web2",
            FakeHost {
                latency: Duration::from_secs(5),
                ..FakeHost::default()
            },
        );
        let web3 = connector.add("web3", FakeHost::default());
        let coordinator = SyncCoordinator::new(
            settings(Path::new("/srv/shared/externals")),
            Arc::new(connector),
        );
        let machines = targets(&["web1", "web2", "web3"]);

        let watch = async {
            let started = Instant::now();
            while web1.calls.closes() == 0 || web3.calls.closes() == 0 {
                assert!(
                    started.elapsed() < Duration::from_secs(3),
                    "fast machines waited on the slow one"
                );
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            // The fast machines are done while the slow one is still checking
            assert_eq!(slow.calls.uploads(), 0);
            assert_eq!(slow.calls.closes(), 0);
        };
        let (report, ()) = tokio::join!(coordinator.sync(MODULE, &tree, &identity, &machines), watch);

        let report = report.unwrap();
        assert_eq!(report.completed(), 3);
        assert_eq!(
            report.checkouts.iter().map(|c| c.host.as_str()).collect::<Vec<_>>(),
            ["web1", "web2", "web3"]
        );
        assert_eq!(slow.calls.closes(), 1);
    }

    #[tokio::test]
    async fn end_to_end_on_local_filesystem() {
        let dir = TempDir::new().unwrap();
        let tree = source_tree(&dir);
        let identity = identify(&tree).unwrap();
        let root = dir.path().join("shared").join("externals");
        std::fs::create_dir_all(root.join("tmp")).unwrap();

        let connector = Arc::new(CountingConnector::default());
        let coordinator = SyncCoordinator::new(settings(&root), connector.clone());
        let local = [TargetMachine::local()];

        let report = coordinator
            .sync(MODULE, &tree, &identity, &local)
            .await
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(report.completed(), 1);

        let destination = root.join(MODULE).join(identity.as_str());
        assert_eq!(
            std::fs::read(destination.join("contents.txt")).unwrap(),
            b"fixed bytes\n"
        );
        assert_eq!(identify(&destination).unwrap(), identity);
        assert_eq!(connector.calls.uploads(), 1);

        let leftovers: Vec<_> = std::fs::read_dir(root.join("tmp")).unwrap().collect();
        assert!(leftovers.is_empty(), "temporary archive left behind");

        let rerun = coordinator
            .sync(MODULE, &tree, &identity, &local)
            .await
            .unwrap();
        assert!(rerun.is_success());
        assert_eq!(rerun.skipped(), 1);
        assert_eq!(connector.calls.uploads(), 1);
        assert_eq!(connector.calls.commands(), 1);
        assert_eq!(connector.calls.closes(), 2);
    }

    #[tokio::test]
    async fn link_variant_points_at_source() {
        let dir = TempDir::new().unwrap();
        let tree = source_tree(&dir);
        let identity = identify(&tree).unwrap();
        let root = dir.path().join("cache");

        let connector = Arc::new(CountingConnector::default());
        let coordinator = SyncCoordinator::new(settings(&root), connector.clone());

        let report = coordinator
            .link(MODULE, &tree, &identity, &[TargetMachine::local()])
            .await
            .unwrap();
        assert!(report.is_success());

        let destination = root.join(MODULE).join(identity.as_str());
        let meta = std::fs::symlink_metadata(&destination).unwrap();
        assert!(meta.file_type().is_symlink());
        assert_eq!(std::fs::read_link(&destination).unwrap(), tree);
        assert_eq!(connector.calls.uploads(), 0);

        let rerun = coordinator
            .link(MODULE, &tree, &identity, &[TargetMachine::local()])
            .await
            .unwrap();
        assert_eq!(rerun.skipped(), 1);
    }
}

mod deploy_tests {
    use crate::support::CountingConnector;
    use extsync::channel::TargetMachine;
    use extsync::deploy::Deployment;
    use extsync::manifest::Manifest;
    use extsync::{SyncCoordinator, SyncSettings};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn deployment_syncs_and_activates_each_module() {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join("app");
        let release = dir.path().join("releases").join("1");
        std::fs::create_dir_all(project.join("plugins/foo")).unwrap();
        std::fs::create_dir_all(project.join("plugins/bar")).unwrap();
        std::fs::write(project.join("plugins/foo/init.rb"), "foo").unwrap();
        std::fs::write(project.join("plugins/bar/init.rb"), "bar").unwrap();

        let manifest = Manifest::parse(
            r#"
            [[module]]
            path = "vendor/plugins/foo"
            type = "archive"
            source = "plugins/foo"

            [[module]]
            path = "vendor/plugins/bar"
            type = "link"
            source = "plugins/bar"
            "#,
            &project.join("externals.toml"),
        )
        .unwrap();

        let root = dir.path().join("shared").join("externals");
        let settings = SyncSettings {
            shared_root: root.clone(),
            remote_tmp: std::env::temp_dir(),
            scratch_dir: None,
            excludes: vec![],
        };
        let connector = Arc::new(CountingConnector::default());
        let deployment = Deployment::new(
            SyncCoordinator::new(settings, connector.clone()),
            vec![TargetMachine::local()],
            release.clone(),
        );

        let report = deployment.run(&manifest).await.unwrap().into_result().unwrap();
        assert_eq!(report.modules.len(), 2);

        let foo = release.join("vendor/plugins/foo");
        assert!(foo.symlink_metadata().unwrap().file_type().is_symlink());
        assert_eq!(std::fs::read_to_string(foo.join("init.rb")).unwrap(), "foo");
        let bar = release.join("vendor/plugins/bar");
        assert_eq!(std::fs::read_to_string(bar.join("init.rb")).unwrap(), "bar");

        assert_eq!(connector.calls.uploads(), 1);
    }
}
