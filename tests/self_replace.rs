#[cfg(test)]
mod tests {
    use lru_tracker::libs::error::UpdateError;
    use lru_tracker::libs::self_replace::{
        backup_binary_path, helper_script_for, helper_script_recording, schedule_self_replace, schedule_self_replace_recording,
        staged_binary_path, ScriptFlavor,
    };
    use lru_tracker::libs::version::{Version, VersionRecord};
    use std::fs;
    use std::path::Path;

    #[test]
    fn test_sibling_paths() {
        let live = Path::new("/opt/lru/LRU_Tracker.exe");
        assert_eq!(staged_binary_path(live), Path::new("/opt/lru/LRU_Tracker.exe.new"));
        assert_eq!(backup_binary_path(live), Path::new("/opt/lru/LRU_Tracker.exe.backup"));
    }

    #[test]
    fn test_batch_script_is_silent_and_reversible() {
        let script = helper_script_for(Path::new("/apps/LRU_Tracker.exe"), ScriptFlavor::Batch);

        assert!(script.starts_with("@echo off"));
        assert!(!script.lines().any(|line| line.trim_start().starts_with("echo ")));
        assert!(script.contains("timeout /t 2 /nobreak >nul 2>nul"));
        assert!(script.contains("move /y \"LRU_Tracker.exe\" \"LRU_Tracker.exe.backup\""));
        assert!(script.contains("move /y \"LRU_Tracker.exe.new\" \"LRU_Tracker.exe\""));
        assert!(script.contains("\"LRU_Tracker.exe\" --version"));
        assert!(script.contains("start \"\" \"LRU_Tracker.exe\""));
        assert!(script.contains("del \"%~f0\""));

        // The backup is restored before the swap is abandoned.
        let restore = script.find(":restore").unwrap();
        assert!(script[restore..].contains("move /y \"LRU_Tracker.exe.backup\" \"LRU_Tracker.exe\""));
    }

    #[test]
    fn test_shell_script_swaps_and_relaunches() {
        let script = helper_script_for(Path::new("/opt/lru/lru-tracker"), ScriptFlavor::Shell);

        assert!(script.starts_with("#!/bin/sh"));
        assert!(script.contains("cd '/opt/lru'"));
        assert!(script.contains("mv -f 'lru-tracker.new' 'lru-tracker'"));
        assert!(script.contains("nohup './lru-tracker'"));
        assert!(script.contains("rm -f \"$0\""));
        assert!(!script.contains("printf"));
    }

    #[test]
    fn test_backup_outlives_the_relaunch() {
        for flavor in [ScriptFlavor::Shell, ScriptFlavor::Batch] {
            let script = helper_script_for(Path::new("/opt/lru/lru-tracker"), flavor);
            let (relaunch, delete) = match flavor {
                ScriptFlavor::Shell => ("nohup './lru-tracker'", "rm -f 'lru-tracker.backup'"),
                ScriptFlavor::Batch => ("start \"\" \"lru-tracker\"", "del /f /q \"lru-tracker.backup\""),
            };
            // The shell script also relaunches the old binary on its revert path, earlier in the file.
            let relaunched = match flavor {
                ScriptFlavor::Shell => script.rfind(relaunch),
                ScriptFlavor::Batch => script.find(relaunch),
            }
            .unwrap();
            let deleted = script.rfind(delete).unwrap();
            assert!(relaunched < deleted, "{:?} deletes the backup before relaunching", flavor);
        }
    }

    #[test]
    fn test_hostile_paths_are_quoted() {
        let shell = helper_script_for(Path::new("/tmp/$(touch pwned)/it's `x`/lru-tracker"), ScriptFlavor::Shell);
        assert!(shell.contains(r#"cd '/tmp/$(touch pwned)/it'\''s `x`' || exit 1"#));
        assert!(!shell.contains("\"/tmp/$("));

        let batch = helper_script_for(Path::new("/apps/100%PATH%/LRU_Tracker.exe"), ScriptFlavor::Batch);
        assert!(batch.contains("cd /d \"/apps/100%%PATH%%\""));
    }

    #[test]
    fn test_recording_script_writes_version_after_health_check() {
        let version = Version::parse("1.3.0").unwrap();
        let record = Path::new("/opt/lru/version.txt");

        let shell = helper_script_recording(Path::new("/opt/lru/lru-tracker"), record, &version, ScriptFlavor::Shell);
        let write = shell.find("printf '%s\\n' '1.3.0' > '/opt/lru/version.txt'").unwrap();
        assert!(shell.rfind("--version").unwrap() < write);

        let batch = helper_script_recording(Path::new("/apps/LRU_Tracker.exe"), Path::new("/apps/version.txt"), &version, ScriptFlavor::Batch);
        let write = batch.find("(echo 1.3.0)>\"/apps/version.txt\"").unwrap();
        assert!(batch.find("if errorlevel 1 goto revert").unwrap() < write);
        assert!(write < batch.find(":revert").unwrap());
    }

    #[test]
    fn test_schedule_requires_staged_binary() {
        let dir = tempfile::tempdir().unwrap();
        let wrong = dir.path().join("lru-tracker.download");
        fs::write(&wrong, "binary").unwrap();

        assert!(matches!(schedule_self_replace(&wrong), Err(UpdateError::Io { .. })));
    }

    #[test]
    fn test_schedule_writes_script_next_to_binary() {
        let dir = tempfile::tempdir().unwrap();
        let staged = dir.path().join("lru-tracker.new");
        fs::write(&staged, "binary").unwrap();

        let script = schedule_self_replace(&staged).unwrap();

        assert_eq!(script.parent(), Some(dir.path()));
        assert_eq!(
            script.file_name().unwrap().to_string_lossy(),
            ScriptFlavor::current().file_name()
        );
        let content = fs::read_to_string(&script).unwrap();
        assert!(content.contains("lru-tracker.new"));
        // Nothing is swapped until the script runs.
        assert!(staged.exists());
        assert!(!dir.path().join("lru-tracker").exists());
    }

    #[test]
    fn test_recording_schedule_names_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let staged = dir.path().join("lru-tracker.new");
        fs::write(&staged, "binary").unwrap();
        let record = VersionRecord::new(dir.path());

        let script = schedule_self_replace_recording(&staged, &record, &Version::parse("1.3.0").unwrap()).unwrap();

        let content = fs::read_to_string(&script).unwrap();
        assert!(content.contains(&record.path().display().to_string()));
        assert!(content.contains("1.3.0"));
        assert_eq!(record.read(), None);
    }
}
