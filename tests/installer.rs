#[cfg(test)]
mod tests {
    use lru_tracker::libs::config::Packaging;
    use lru_tracker::libs::error::UpdateError;
    use lru_tracker::libs::hasher::digest_bytes;
    use lru_tracker::libs::http::TransportPolicy;
    use lru_tracker::libs::installer::{no_progress, InstallProgress, Installer, BACKUP_DIR_PREFIX};
    use lru_tracker::libs::manifest::UpdateManifest;
    use lru_tracker::libs::self_replace::RestartMode;
    use lru_tracker::libs::update::{UpdateInfo, UpdatePayload};
    use lru_tracker::libs::version::{Version, VersionRecord};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;
    use test_context::{test_context, AsyncTestContext};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const OLD_MAIN: &str = "print('v1.2.8')\n";
    const NEW_MAIN: &str = "print('v1.3.0')\n";
    const SHARED: &str = "STATIONS = []\n";
    const NEW_MODULE: &str = "def export(): pass\n";

    /// An installed 1.2.8 tree plus a server publishing 1.3.0.
    struct InstallContext {
        dir: TempDir,
        server: MockServer,
    }

    impl AsyncTestContext for InstallContext {
        async fn setup() -> Self {
            let dir = tempfile::tempdir().unwrap();
            fs::write(dir.path().join("main.py"), OLD_MAIN).unwrap();
            fs::write(dir.path().join("shared.py"), SHARED).unwrap();
            InstallContext {
                dir,
                server: MockServer::start().await,
            }
        }
    }

    impl InstallContext {
        fn installer(&self) -> Installer {
            Installer::new(
                self.dir.path(),
                &format!("{}/files/", self.server.uri()),
                TransportPolicy::AllowLoopback,
            )
        }

        async fn serve(&self, file: &str, body: &str) {
            Mock::given(method("GET"))
                .and(path(format!("/files/{}", file)))
                .respond_with(ResponseTemplate::new(200).set_body_string(body))
                .mount(&self.server)
                .await;
        }

        fn read(&self, relative: &str) -> Option<String> {
            fs::read_to_string(self.dir.path().join(relative)).ok()
        }

        fn staging_dirs(&self) -> usize {
            fs::read_dir(self.dir.path())
                .unwrap()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_name().to_string_lossy().starts_with(BACKUP_DIR_PREFIX))
                .count()
        }
    }

    fn release(files: &[(&str, &str)]) -> UpdateInfo {
        let mut entries = serde_json::Map::new();
        for (name, content) in files {
            entries.insert(
                name.to_string(),
                json!({"size": content.len(), "sha256": digest_bytes(content.as_bytes())}),
            );
        }
        let manifest = UpdateManifest::from_json(&json!({"version": "1.3.0", "files": entries}).to_string()).unwrap();

        UpdateInfo {
            version: Version::parse("1.3.0").unwrap(),
            release_notes: String::new(),
            release_date: None,
            payload: UpdatePayload::Incremental { manifest },
        }
    }

    fn full_release() -> UpdateInfo {
        release(&[("main.py", NEW_MAIN), ("shared.py", SHARED), ("export/csv.py", NEW_MODULE)])
    }

    #[test_context(InstallContext)]
    #[tokio::test]
    async fn test_only_changed_files_are_installed(ctx: &mut InstallContext) {
        ctx.serve("main.py", NEW_MAIN).await;
        ctx.serve("export/csv.py", NEW_MODULE).await;

        let events = Mutex::new(Vec::new());
        let progress = |event: InstallProgress| events.lock().push(event);
        let report = ctx.installer().install(&full_release(), &progress).await.unwrap();

        assert_eq!(report.files_updated, vec!["export/csv.py", "main.py"]);
        assert_eq!(report.restart, RestartMode::MultiFile);
        assert_eq!(ctx.read("main.py").as_deref(), Some(NEW_MAIN));
        assert_eq!(ctx.read("export/csv.py").as_deref(), Some(NEW_MODULE));
        assert_eq!(ctx.read("shared.py").as_deref(), Some(SHARED));
        assert_eq!(VersionRecord::new(ctx.dir.path()).read(), Version::parse("1.3.0").ok());
        assert_eq!(ctx.staging_dirs(), 0);

        let files: Vec<(usize, usize)> = events
            .lock()
            .iter()
            .filter_map(|e| match e {
                InstallProgress::File { index, total, .. } => Some((*index, *total)),
                _ => None,
            })
            .collect();
        assert_eq!(files, vec![(1, 2), (2, 2)]);
    }

    #[test_context(InstallContext)]
    #[tokio::test]
    async fn test_corrupted_download_rolls_everything_back(ctx: &mut InstallContext) {
        // export/csv.py is installed first and must disappear again.
        ctx.serve("export/csv.py", NEW_MODULE).await;
        ctx.serve("main.py", "print('tampered')\n").await;

        let result = ctx.installer().install(&full_release(), &no_progress).await;

        match result {
            Err(UpdateError::Integrity { path, expected, .. }) => {
                assert_eq!(path, "main.py");
                assert_eq!(expected, digest_bytes(NEW_MAIN.as_bytes()));
            }
            other => panic!("expected an integrity failure, got {:?}", other),
        }
        assert_eq!(ctx.read("main.py").as_deref(), Some(OLD_MAIN));
        assert_eq!(ctx.read("shared.py").as_deref(), Some(SHARED));
        assert!(!ctx.dir.path().join("export/csv.py").exists());
        assert!(!ctx.dir.path().join("export").exists());
        assert_eq!(VersionRecord::new(ctx.dir.path()).read(), None);
        assert_eq!(ctx.staging_dirs(), 0);
    }

    #[test_context(InstallContext)]
    #[tokio::test]
    async fn test_rollback_keeps_directories_that_existed(ctx: &mut InstallContext) {
        fs::create_dir_all(ctx.dir.path().join("export")).unwrap();
        fs::write(ctx.dir.path().join("export/readme.txt"), "keep").unwrap();
        ctx.serve("export/csv.py", NEW_MODULE).await;
        ctx.serve("main.py", "print('tampered')\n").await;

        let result = ctx.installer().install(&full_release(), &no_progress).await;

        assert!(matches!(result, Err(UpdateError::Integrity { .. })));
        assert!(!ctx.dir.path().join("export/csv.py").exists());
        assert_eq!(ctx.read("export/readme.txt").as_deref(), Some("keep"));
    }

    #[test_context(InstallContext)]
    #[tokio::test]
    async fn test_network_failure_rolls_back(ctx: &mut InstallContext) {
        ctx.serve("export/csv.py", NEW_MODULE).await;
        // main.py is not served: the mock server answers 404.

        let result = ctx.installer().install(&full_release(), &no_progress).await;

        assert!(result.is_err_and(|e| e.is_network()));
        assert_eq!(ctx.read("main.py").as_deref(), Some(OLD_MAIN));
        assert!(!ctx.dir.path().join("export").exists());
        assert_eq!(ctx.staging_dirs(), 0);
    }

    #[test_context(InstallContext)]
    #[tokio::test]
    async fn test_up_to_date_tree_downloads_nothing(ctx: &mut InstallContext) {
        let info = release(&[("main.py", OLD_MAIN), ("shared.py", SHARED)]);

        let report = ctx.installer().install(&info, &no_progress).await.unwrap();

        assert!(report.files_updated.is_empty());
        assert_eq!(report.bytes_downloaded, 0);
    }

    #[test_context(InstallContext)]
    #[tokio::test]
    async fn test_single_binary_is_staged_for_replacement(ctx: &mut InstallContext) {
        let live = ctx.dir.path().join("lru_tracker");
        fs::write(&live, "old binary").unwrap();
        ctx.serve("lru_tracker", "new binary").await;

        let installer = ctx
            .installer()
            .with_packaging(Packaging::SingleBinary)
            .with_live_binary(&live);
        let report = installer
            .install(&release(&[("lru_tracker", "new binary")]), &no_progress)
            .await
            .unwrap();

        assert_eq!(fs::read_to_string(&live).unwrap(), "old binary");
        assert_eq!(fs::read_to_string(live.with_file_name("lru_tracker.new")).unwrap(), "new binary");
        match report.restart {
            RestartMode::SingleBinary { script } => {
                assert!(script.exists());
                assert_eq!(script.parent(), Some(ctx.dir.path()));
            }
            other => panic!("unexpected restart mode {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test_context(InstallContext)]
    #[tokio::test]
    async fn test_swapped_binary_becomes_the_recorded_version(ctx: &mut InstallContext) {
        const NEW_BINARY: &str = "#!/bin/sh\nexit 0\n";
        let live = ctx.dir.path().join("lru_tracker");
        fs::write(&live, "old binary").unwrap();
        let record = VersionRecord::new(ctx.dir.path());
        record.write(&Version::parse("1.2.8").unwrap()).unwrap();
        ctx.serve("lru_tracker", NEW_BINARY).await;

        let installer = ctx
            .installer()
            .with_packaging(Packaging::SingleBinary)
            .with_live_binary(&live);
        let report = installer
            .install(&release(&[("lru_tracker", NEW_BINARY)]), &no_progress)
            .await
            .unwrap();
        let RestartMode::SingleBinary { script } = report.restart else {
            panic!("expected a scheduled swap");
        };

        // Nothing changes until the helper script runs.
        assert_eq!(record.read(), Version::parse("1.2.8").ok());

        let status = tokio::process::Command::new("sh").arg(&script).status().await.unwrap();
        assert!(status.success());
        assert_eq!(fs::read_to_string(&live).unwrap(), NEW_BINARY);
        assert_eq!(record.read(), Version::parse("1.3.0").ok());
        assert!(!script.exists());
    }

    #[test_context(InstallContext)]
    #[tokio::test]
    async fn test_corrupted_binary_is_discarded(ctx: &mut InstallContext) {
        let live = ctx.dir.path().join("lru_tracker");
        fs::write(&live, "old binary").unwrap();
        ctx.serve("lru_tracker", "truncated").await;

        let installer = ctx
            .installer()
            .with_packaging(Packaging::SingleBinary)
            .with_live_binary(&live);
        let result = installer.install(&release(&[("lru_tracker", "new binary")]), &no_progress).await;

        assert!(matches!(result, Err(UpdateError::Integrity { .. })));
        assert!(!Path::new(&live.with_file_name("lru_tracker.new")).exists());
        assert_eq!(fs::read_to_string(&live).unwrap(), "old binary");
    }

    #[test_context(InstallContext)]
    #[tokio::test]
    async fn test_install_holds_the_operation_guard(ctx: &mut InstallContext) {
        let installer = ctx.installer();
        let info = full_release();
        // A second install on the same installer shares its guard.
        let first = installer.install(&info, &no_progress);
        let second = installer.install(&info, &no_progress);
        ctx.serve("main.py", NEW_MAIN).await;
        ctx.serve("export/csv.py", NEW_MODULE).await;

        let (a, b) = tokio::join!(first, second);
        let busy = [&a, &b].iter().filter(|r| matches!(r, Err(UpdateError::Busy(_)))).count();
        assert_eq!(busy, 1);
        assert!(a.is_ok() || b.is_ok());
    }
}
