#[cfg(test)]
mod tests {
    use lru_tracker::api::{MemoryStore, RemoteStore};
    use lru_tracker::libs::error::SyncError;
    use lru_tracker::libs::guard::OperationGuard;
    use lru_tracker::libs::local_data::{LocalDataFile, LocalDocument};
    use lru_tracker::libs::sync::{PullOutcome, PushResult, RemoteCheck, SyncOrchestrator, SyncPhase, SyncPrompt, UnsavedChoice};
    use serde_json::json;
    use std::cell::Cell;
    use tempfile::TempDir;
    use test_context::{test_context, AsyncTestContext};

    /// Scripted answers, counting how often each question was asked.
    struct ScriptedPrompt {
        unsaved: UnsavedChoice,
        overwrite: bool,
        unsaved_asked: Cell<usize>,
        overwrite_asked: Cell<usize>,
    }

    impl ScriptedPrompt {
        fn new(unsaved: UnsavedChoice, overwrite: bool) -> Self {
            Self {
                unsaved,
                overwrite,
                unsaved_asked: Cell::new(0),
                overwrite_asked: Cell::new(0),
            }
        }
    }

    impl SyncPrompt for ScriptedPrompt {
        fn resolve_unsaved(&self) -> UnsavedChoice {
            self.unsaved_asked.set(self.unsaved_asked.get() + 1);
            self.unsaved
        }

        fn confirm_overwrite(&self) -> bool {
            self.overwrite_asked.set(self.overwrite_asked.get() + 1);
            self.overwrite
        }
    }

    /// Two machines sharing one remote document.
    struct TwoMachines {
        dir: TempDir,
        remote: MemoryStore,
    }

    impl AsyncTestContext for TwoMachines {
        async fn setup() -> Self {
            TwoMachines {
                dir: tempfile::tempdir().unwrap(),
                remote: MemoryStore::new(),
            }
        }
    }

    impl TwoMachines {
        fn machine(&self) -> SyncOrchestrator<MemoryStore> {
            SyncOrchestrator::new(self.remote.client(), OperationGuard::new())
        }

        fn local(&self, name: &str) -> LocalDataFile {
            LocalDataFile::load(self.dir.path().join(name)).unwrap()
        }
    }

    fn edited(file: &mut LocalDataFile, station: &str, current: u32) {
        let mut content = file.snapshot();
        content["stations"][station] = json!({"current": current});
        file.set_content(content);
    }

    #[test_context(TwoMachines)]
    #[tokio::test]
    async fn test_pull_of_empty_remote(ctx: &mut TwoMachines) {
        let mut machine = ctx.machine();
        let mut local = ctx.local("a.json");
        let prompt = ScriptedPrompt::new(UnsavedChoice::Abort, false);

        assert_eq!(machine.pull(&mut local, &prompt).await.unwrap(), PullOutcome::NoRemoteData);
        assert_eq!(machine.check().await.unwrap(), RemoteCheck::Missing);
    }

    #[test_context(TwoMachines)]
    #[tokio::test]
    async fn test_push_then_pull_on_another_machine(ctx: &mut TwoMachines) {
        let prompt = ScriptedPrompt::new(UnsavedChoice::Abort, false);

        let mut first = ctx.machine();
        let mut first_local = ctx.local("a.json");
        edited(&mut first_local, "A1", 4);
        let revision = match first.push(&first_local, &prompt, Some("first count")).await.unwrap() {
            PushResult::Pushed { revision } => revision,
            other => panic!("expected a push, got {:?}", other),
        };

        let mut second = ctx.machine();
        let mut second_local = ctx.local("b.json");
        let pulled = second.pull(&mut second_local, &prompt).await.unwrap();

        assert_eq!(pulled, PullOutcome::Pulled { revision: revision.clone() });
        assert_eq!(second_local.snapshot()["stations"]["A1"]["current"], 4);
        assert!(!second_local.has_unsaved_changes());
        assert_eq!(second.store().cached_revision(), Some(revision.as_str()));
        assert_eq!(ctx.remote.commits(), vec!["first count"]);
        assert_eq!(prompt.overwrite_asked.get(), 0);
    }

    #[test_context(TwoMachines)]
    #[tokio::test]
    async fn test_unsaved_changes_abort_keeps_local_edits(ctx: &mut TwoMachines) {
        let mut writer = ctx.machine();
        let mut writer_local = ctx.local("a.json");
        edited(&mut writer_local, "A1", 4);
        writer
            .push(&writer_local, &ScriptedPrompt::new(UnsavedChoice::Abort, false), None)
            .await
            .unwrap();

        let mut reader = ctx.machine();
        let mut reader_local = ctx.local("b.json");
        edited(&mut reader_local, "B7", 9);
        let prompt = ScriptedPrompt::new(UnsavedChoice::Abort, false);

        assert_eq!(reader.pull(&mut reader_local, &prompt).await.unwrap(), PullOutcome::Aborted);
        assert_eq!(prompt.unsaved_asked.get(), 1);
        assert!(reader_local.has_unsaved_changes());
        assert_eq!(reader_local.snapshot()["stations"]["B7"]["current"], 9);
        assert_eq!(reader.store().cached_revision(), None);
    }

    #[test_context(TwoMachines)]
    #[tokio::test]
    async fn test_unsaved_changes_saved_before_pull(ctx: &mut TwoMachines) {
        let mut writer = ctx.machine();
        let mut writer_local = ctx.local("a.json");
        edited(&mut writer_local, "A1", 4);
        writer
            .push(&writer_local, &ScriptedPrompt::new(UnsavedChoice::Abort, false), None)
            .await
            .unwrap();

        let mut reader = ctx.machine();
        let mut reader_local = ctx.local("b.json");
        edited(&mut reader_local, "B7", 9);
        let prompt = ScriptedPrompt::new(UnsavedChoice::SaveThenPull, false);

        let outcome = reader.pull(&mut reader_local, &prompt).await.unwrap();
        assert!(matches!(outcome, PullOutcome::Pulled { .. }));
        assert_eq!(reader_local.snapshot()["stations"]["A1"]["current"], 4);
        assert!(!reader_local.has_unsaved_changes());
    }

    #[test_context(TwoMachines)]
    #[tokio::test]
    async fn test_declined_overwrite_leaves_remote_alone(ctx: &mut TwoMachines) {
        let quiet = ScriptedPrompt::new(UnsavedChoice::Abort, false);
        let mut a = ctx.machine();
        let mut b = ctx.machine();
        let mut a_local = ctx.local("a.json");
        let mut b_local = ctx.local("b.json");

        edited(&mut a_local, "A1", 1);
        a.push(&a_local, &quiet, None).await.unwrap();
        b.pull(&mut b_local, &quiet).await.unwrap();

        edited(&mut a_local, "A1", 2);
        a.push(&a_local, &quiet, None).await.unwrap();
        let before = ctx.remote.snapshot();

        edited(&mut b_local, "A1", 3);
        let decline = ScriptedPrompt::new(UnsavedChoice::Abort, false);
        assert_eq!(b.push(&b_local, &decline, None).await.unwrap(), PushResult::Declined);
        assert_eq!(decline.overwrite_asked.get(), 1);
        assert_eq!(ctx.remote.snapshot(), before);
    }

    #[test_context(TwoMachines)]
    #[tokio::test]
    async fn test_confirmed_overwrite_replaces_remote(ctx: &mut TwoMachines) {
        let quiet = ScriptedPrompt::new(UnsavedChoice::Abort, false);
        let mut a = ctx.machine();
        let mut b = ctx.machine();
        let mut a_local = ctx.local("a.json");
        let mut b_local = ctx.local("b.json");

        edited(&mut a_local, "A1", 1);
        a.push(&a_local, &quiet, None).await.unwrap();
        b.pull(&mut b_local, &quiet).await.unwrap();
        edited(&mut a_local, "A1", 2);
        a.push(&a_local, &quiet, None).await.unwrap();

        assert!(matches!(b.check().await.unwrap(), RemoteCheck::Changed { .. }));

        edited(&mut b_local, "A1", 3);
        let overwrite = ScriptedPrompt::new(UnsavedChoice::Abort, true);
        assert!(matches!(b.push(&b_local, &overwrite, None).await.unwrap(), PushResult::Pushed { .. }));
        assert_eq!(ctx.remote.snapshot().unwrap().content["stations"]["A1"]["current"], 3);

        // The first machine is now the stale one.
        assert!(matches!(a.check().await.unwrap(), RemoteCheck::Changed { .. }));
        assert_eq!(b.check().await.unwrap(), RemoteCheck::UpToDate);
    }

    #[test_context(TwoMachines)]
    #[tokio::test]
    async fn test_stale_revision_write_is_rejected(ctx: &mut TwoMachines) {
        let mut a = ctx.remote.client();
        let mut b = ctx.remote.client();

        a.push(&json!({"v": 1}), None).await.unwrap();
        b.pull().await.unwrap();
        a.push(&json!({"v": 2}), None).await.unwrap();

        // b still holds the revision of {"v": 1}.
        let outcome = b.push(&json!({"v": 3}), None).await.unwrap();
        assert_eq!(outcome, lru_tracker::api::PushOutcome::Conflict);
        assert_eq!(ctx.remote.snapshot().unwrap().content, json!({"v": 2}));
        assert_eq!(ctx.remote.commits().len(), 2);
    }

    #[test_context(TwoMachines)]
    #[tokio::test]
    async fn test_offline_store_reports_network_error(ctx: &mut TwoMachines) {
        let mut machine = ctx.machine();
        let mut local = ctx.local("a.json");
        ctx.remote.set_offline(true);

        let result = machine.pull(&mut local, &ScriptedPrompt::new(UnsavedChoice::Abort, false)).await;
        assert!(matches!(result, Err(SyncError::Network(_))));
        assert_eq!(machine.phase(), SyncPhase::Idle);

        let (ok, _) = machine.store().test_connection().await;
        assert!(!ok);
    }

    #[test_context(TwoMachines)]
    #[tokio::test]
    async fn test_operations_are_single_flight(ctx: &mut TwoMachines) {
        let guard = OperationGuard::new();
        let mut machine = SyncOrchestrator::new(ctx.remote.client(), guard.clone());
        let mut local = ctx.local("a.json");

        let _update = guard.try_acquire("install").unwrap();
        let result = machine.pull(&mut local, &ScriptedPrompt::new(UnsavedChoice::Abort, false)).await;

        assert!(matches!(result, Err(SyncError::Busy(ref op)) if op == "install"));
        assert_eq!(machine.phase(), SyncPhase::Idle);
    }
}
