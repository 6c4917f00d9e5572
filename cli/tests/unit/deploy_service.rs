//! Deploy and rollback sequencing against recording fakes.

use std::path::PathBuf;

use inbizio_deploy::application::services::deploy::{self, DeployMode, DeployPorts};
use inbizio_deploy::domain::{DeployError, DeployVersion};

use crate::helpers::{
    CapturingReporter, Event, EventLog, MockFs, RecordingRunner, ScriptedConnector,
    SessionBehavior, config_from, example_config, example_settings, fs_with_build,
};

fn version() -> DeployVersion {
    DeployVersion::parse("2.0.1").expect("valid version")
}

fn zip_event() -> Event {
    Event::Local {
        program: "zip".to_owned(),
        args: vec![
            "-r".to_owned(),
            "-q".to_owned(),
            "inbizio2.0.1.zip".to_owned(),
            ".".to_owned(),
        ],
        cwd: PathBuf::from("/app/dist"),
    }
}

fn exec(command: &str) -> Event {
    Event::Exec(command.to_owned())
}

fn clear_artifacts() -> Event {
    exec("rm -rf -- /srv/artifacts/*")
}

fn clear_live() -> Event {
    exec("rm -rf -- /srv/live/*")
}

fn upload_event() -> Event {
    Event::Upload {
        local: PathBuf::from("/app/dist/inbizio2.0.1.zip"),
        remote: "/srv/artifacts/inbizio2.0.1.zip".to_owned(),
    }
}

fn unzip_event() -> Event {
    exec("unzip -o -q /srv/artifacts/inbizio2.0.1.zip -d /srv/live")
}

// ── Deploy ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn deploy_runs_every_stage_in_order() {
    let log = EventLog::default();
    let connector = ScriptedConnector::accepting(&log);
    let runner = RecordingRunner::succeeding(&log);
    let fs = fs_with_build();
    let reporter = CapturingReporter::default();
    let ports = DeployPorts {
        connector: &connector,
        runner: &runner,
        fs: &fs,
        reporter: &reporter,
    };

    let report = deploy::run(&ports, &example_config(), DeployMode::Deploy, &version())
        .await
        .expect("deploy succeeds");

    assert_eq!(
        log.actions(),
        vec![
            zip_event(),
            clear_artifacts(),
            clear_live(),
            upload_event(),
            unzip_event(),
            Event::Close,
        ]
    );
    assert_eq!(report.mode, DeployMode::Deploy);
    assert_eq!(report.auth, "password");
    assert_eq!(
        report.local_archive,
        Some(PathBuf::from("/app/dist/inbizio2.0.1.zip"))
    );
    assert_eq!(report.remote_archive, "/srv/artifacts/inbizio2.0.1.zip");
    assert_eq!(report.extracted_to, "/srv/live");
}

#[tokio::test]
async fn deploy_reports_each_stage() {
    let log = EventLog::default();
    let connector = ScriptedConnector::accepting(&log);
    let runner = RecordingRunner::succeeding(&log);
    let fs = fs_with_build();
    let reporter = CapturingReporter::default();
    let ports = DeployPorts {
        connector: &connector,
        runner: &runner,
        fs: &fs,
        reporter: &reporter,
    };

    deploy::run(&ports, &example_config(), DeployMode::Deploy, &version())
        .await
        .expect("deploy succeeds");

    assert_eq!(
        reporter.lines(),
        vec![
            "step: Connecting to the server...",
            "success: Connected to the server with password",
            "step: Zipping the deploy...",
            "success: Deploy zipped",
            "step: Removing old deploy...",
            "success: Removed old deploy",
            "step: Uploading the deploy...",
            "success: Deploy uploaded",
            "step: Unzipping the deploy...",
            "success: Deploy unzipped",
        ]
    );
}

#[tokio::test]
async fn archive_failure_aborts_before_any_remote_change() {
    let log = EventLog::default();
    let connector = ScriptedConnector::accepting(&log);
    let runner = RecordingRunner::answering(&log, 12, "zip error: Nothing to do!");
    let fs = fs_with_build();
    let reporter = CapturingReporter::default();
    let ports = DeployPorts {
        connector: &connector,
        runner: &runner,
        fs: &fs,
        reporter: &reporter,
    };

    let err = deploy::run(&ports, &example_config(), DeployMode::Deploy, &version())
        .await
        .expect_err("zip failed");

    assert!(matches!(err, DeployError::Archive { .. }), "{err:?}");
    assert_eq!(err.to_string(), "Error zipping the build folder");
    assert_eq!(log.actions(), vec![zip_event(), Event::Close]);
}

#[tokio::test]
async fn archive_stderr_counts_as_failure() {
    let log = EventLog::default();
    let connector = ScriptedConnector::accepting(&log);
    let runner = RecordingRunner::answering(&log, 0, "zip warning: name not matched: foo");
    let fs = fs_with_build();
    let reporter = CapturingReporter::default();
    let ports = DeployPorts {
        connector: &connector,
        runner: &runner,
        fs: &fs,
        reporter: &reporter,
    };

    let err = deploy::run(&ports, &example_config(), DeployMode::Deploy, &version())
        .await
        .expect_err("stderr is fatal locally");

    assert!(matches!(err, DeployError::Archive { .. }), "{err:?}");
    assert_eq!(log.actions(), vec![zip_event(), Event::Close]);
}

#[tokio::test]
async fn missing_build_folder_never_runs_zip() {
    let log = EventLog::default();
    let connector = ScriptedConnector::accepting(&log);
    let runner = RecordingRunner::succeeding(&log);
    let mut fs = MockFs::new();
    fs.expect_is_dir().times(1).returning(|_| false);
    fs.expect_exists().never();
    let reporter = CapturingReporter::default();
    let ports = DeployPorts {
        connector: &connector,
        runner: &runner,
        fs: &fs,
        reporter: &reporter,
    };

    let err = deploy::run(&ports, &example_config(), DeployMode::Deploy, &version())
        .await
        .expect_err("no dist folder");

    assert!(matches!(err, DeployError::Archive { .. }), "{err:?}");
    assert_eq!(log.actions(), vec![Event::Close]);
}

#[tokio::test]
async fn artifact_cleanup_failure_stops_before_deploy_dir() {
    let log = EventLog::default();
    let connector = ScriptedConnector::accepting(&log).with_session(SessionBehavior {
        fail_exec_containing: Some("/srv/artifacts/*".to_owned()),
        ..SessionBehavior::default()
    });
    let runner = RecordingRunner::succeeding(&log);
    let fs = fs_with_build();
    let reporter = CapturingReporter::default();
    let ports = DeployPorts {
        connector: &connector,
        runner: &runner,
        fs: &fs,
        reporter: &reporter,
    };

    let err = deploy::run(&ports, &example_config(), DeployMode::Deploy, &version())
        .await
        .expect_err("cleanup failed");

    match &err {
        DeployError::Cleanup { dir, .. } => assert_eq!(dir, "/srv/artifacts"),
        other => panic!("expected Cleanup, got {other:?}"),
    }
    assert_eq!(
        log.actions(),
        vec![zip_event(), clear_artifacts(), Event::Close]
    );
}

#[tokio::test]
async fn deploy_dir_cleanup_failure_prevents_upload() {
    let log = EventLog::default();
    let connector = ScriptedConnector::accepting(&log).with_session(SessionBehavior {
        fail_exec_containing: Some("/srv/live/*".to_owned()),
        ..SessionBehavior::default()
    });
    let runner = RecordingRunner::succeeding(&log);
    let fs = fs_with_build();
    let reporter = CapturingReporter::default();
    let ports = DeployPorts {
        connector: &connector,
        runner: &runner,
        fs: &fs,
        reporter: &reporter,
    };

    let err = deploy::run(&ports, &example_config(), DeployMode::Deploy, &version())
        .await
        .expect_err("cleanup failed");

    assert!(
        matches!(&err, DeployError::Cleanup { dir, .. } if dir == "/srv/live"),
        "{err:?}"
    );
    assert!(err.to_string().contains("/srv/live"), "{err}");
    assert_eq!(
        log.actions(),
        vec![zip_event(), clear_artifacts(), clear_live(), Event::Close]
    );
}

#[tokio::test]
async fn missing_local_archive_is_reported_by_path() {
    let log = EventLog::default();
    let connector = ScriptedConnector::accepting(&log);
    let runner = RecordingRunner::succeeding(&log);
    let mut fs = MockFs::new();
    fs.expect_is_dir().returning(|_| true);
    fs.expect_exists().times(1).returning(|_| false);
    let reporter = CapturingReporter::default();
    let ports = DeployPorts {
        connector: &connector,
        runner: &runner,
        fs: &fs,
        reporter: &reporter,
    };

    let err = deploy::run(&ports, &example_config(), DeployMode::Deploy, &version())
        .await
        .expect_err("archive missing");

    assert!(
        matches!(&err, DeployError::MissingArchive { path } if path == "/app/dist/inbizio2.0.1.zip"),
        "{err:?}"
    );
    assert_eq!(
        err.to_string(),
        "The deploy file in path /app/dist/inbizio2.0.1.zip does not exist"
    );
    assert!(!log.actions().iter().any(|e| matches!(e, Event::Upload { .. })));
    assert_eq!(log.actions().last(), Some(&Event::Close));
}

#[tokio::test]
async fn upload_failure_skips_extraction() {
    let log = EventLog::default();
    let connector = ScriptedConnector::accepting(&log).with_session(SessionBehavior {
        fail_upload: true,
        ..SessionBehavior::default()
    });
    let runner = RecordingRunner::succeeding(&log);
    let fs = fs_with_build();
    let reporter = CapturingReporter::default();
    let ports = DeployPorts {
        connector: &connector,
        runner: &runner,
        fs: &fs,
        reporter: &reporter,
    };

    let err = deploy::run(&ports, &example_config(), DeployMode::Deploy, &version())
        .await
        .expect_err("upload failed");

    assert!(matches!(err, DeployError::Upload { .. }), "{err:?}");
    assert_eq!(
        log.actions(),
        vec![
            zip_event(),
            clear_artifacts(),
            clear_live(),
            upload_event(),
            Event::Close,
        ]
    );
}

#[tokio::test]
async fn extraction_failure_is_fatal_and_still_closes() {
    let log = EventLog::default();
    let connector = ScriptedConnector::accepting(&log).with_session(SessionBehavior {
        fail_exec_containing: Some("unzip".to_owned()),
        ..SessionBehavior::default()
    });
    let runner = RecordingRunner::succeeding(&log);
    let fs = fs_with_build();
    let reporter = CapturingReporter::default();
    let ports = DeployPorts {
        connector: &connector,
        runner: &runner,
        fs: &fs,
        reporter: &reporter,
    };

    let err = deploy::run(&ports, &example_config(), DeployMode::Deploy, &version())
        .await
        .expect_err("unzip failed");

    assert!(matches!(err, DeployError::Extract { .. }), "{err:?}");
    assert_eq!(err.code(), "EXTRACT_FAILED");
    assert_eq!(log.actions().last(), Some(&Event::Close));
}

#[tokio::test]
async fn remote_stderr_alone_is_only_a_warning() {
    let log = EventLog::default();
    let connector = ScriptedConnector::accepting(&log).with_session(SessionBehavior {
        exec_stderr: "warning: stripped absolute path spec".to_owned(),
        ..SessionBehavior::default()
    });
    let runner = RecordingRunner::succeeding(&log);
    let fs = fs_with_build();
    let reporter = CapturingReporter::default();
    let ports = DeployPorts {
        connector: &connector,
        runner: &runner,
        fs: &fs,
        reporter: &reporter,
    };

    deploy::run(&ports, &example_config(), DeployMode::Deploy, &version())
        .await
        .expect("stderr with exit 0 succeeds");

    let warnings = reporter.warnings();
    assert_eq!(warnings.len(), 3, "{warnings:?}");
    assert!(warnings.iter().all(|w| w.contains("stripped absolute path")));
}

#[tokio::test]
async fn close_failure_does_not_fail_a_finished_deploy() {
    let log = EventLog::default();
    let connector = ScriptedConnector::accepting(&log).with_session(SessionBehavior {
        fail_close: true,
        ..SessionBehavior::default()
    });
    let runner = RecordingRunner::succeeding(&log);
    let fs = fs_with_build();
    let reporter = CapturingReporter::default();
    let ports = DeployPorts {
        connector: &connector,
        runner: &runner,
        fs: &fs,
        reporter: &reporter,
    };

    deploy::run(&ports, &example_config(), DeployMode::Deploy, &version())
        .await
        .expect("close failure is a warning");

    assert!(
        reporter
            .warnings()
            .iter()
            .any(|w| w.contains("could not close the SSH session")),
        "{:?}",
        reporter.lines()
    );
}

#[tokio::test]
async fn deploy_subdir_changes_the_extract_target() {
    let mut settings = example_settings();
    settings.push(("INBIZIO_REMOTE_DEPLOY_SUBDIR", "html"));
    let config = config_from(&settings);

    let log = EventLog::default();
    let connector = ScriptedConnector::accepting(&log);
    let runner = RecordingRunner::succeeding(&log);
    let fs = fs_with_build();
    let reporter = CapturingReporter::default();
    let ports = DeployPorts {
        connector: &connector,
        runner: &runner,
        fs: &fs,
        reporter: &reporter,
    };

    let report = deploy::run(&ports, &config, DeployMode::Deploy, &version())
        .await
        .expect("deploy succeeds");

    assert_eq!(report.extracted_to, "/srv/live/html");
    assert!(log.actions().contains(&clear_live()));
    assert!(
        log.actions()
            .contains(&exec("unzip -o -q /srv/artifacts/inbizio2.0.1.zip -d /srv/live/html"))
    );
}

#[tokio::test]
async fn paths_with_spaces_are_quoted_for_the_remote_shell() {
    let mut settings = example_settings();
    settings.retain(|(k, _)| *k != "INBIZIO_REMOTE_DEPLOY_PATH");
    settings.push(("INBIZIO_REMOTE_DEPLOY_PATH", "/srv/live site"));
    let config = config_from(&settings);

    let log = EventLog::default();
    let connector = ScriptedConnector::accepting(&log);
    let runner = RecordingRunner::succeeding(&log);
    let fs = fs_with_build();
    let reporter = CapturingReporter::default();
    let ports = DeployPorts {
        connector: &connector,
        runner: &runner,
        fs: &fs,
        reporter: &reporter,
    };

    deploy::run(&ports, &config, DeployMode::Deploy, &version())
        .await
        .expect("deploy succeeds");

    let actions = log.actions();
    assert!(actions.contains(&exec("rm -rf -- '/srv/live site'/*")), "{actions:?}");
    assert!(
        actions.contains(&exec(
            "unzip -o -q /srv/artifacts/inbizio2.0.1.zip -d '/srv/live site'"
        )),
        "{actions:?}"
    );
}

// ── Rollback ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn rollback_never_archives_or_uploads() {
    let log = EventLog::default();
    let connector = ScriptedConnector::accepting(&log);
    let runner = RecordingRunner::succeeding(&log);
    let mut fs = MockFs::new();
    fs.expect_is_dir().never();
    fs.expect_exists().never();
    let reporter = CapturingReporter::default();
    let ports = DeployPorts {
        connector: &connector,
        runner: &runner,
        fs: &fs,
        reporter: &reporter,
    };

    let report = deploy::run(&ports, &example_config(), DeployMode::Rollback, &version())
        .await
        .expect("rollback succeeds");

    assert_eq!(
        log.actions(),
        vec![clear_artifacts(), clear_live(), unzip_event(), Event::Close]
    );
    assert_eq!(report.mode, DeployMode::Rollback);
    assert_eq!(report.local_archive, None);
}

#[tokio::test]
async fn rollback_extraction_failure_is_reported() {
    let log = EventLog::default();
    let connector = ScriptedConnector::accepting(&log).with_session(SessionBehavior {
        fail_exec_containing: Some("unzip".to_owned()),
        ..SessionBehavior::default()
    });
    let runner = RecordingRunner::succeeding(&log);
    let fs = MockFs::new();
    let reporter = CapturingReporter::default();
    let ports = DeployPorts {
        connector: &connector,
        runner: &runner,
        fs: &fs,
        reporter: &reporter,
    };

    let err = deploy::run(&ports, &example_config(), DeployMode::Rollback, &version())
        .await
        .expect_err("archive absent on server");

    assert!(matches!(err, DeployError::Extract { .. }), "{err:?}");
    assert_eq!(log.actions().last(), Some(&Event::Close));
}
