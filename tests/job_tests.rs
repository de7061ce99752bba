
use std::time::Duration;

use render_manager::error::RenderError;
use render_manager::render::{
    FrameRange, JobState, RenderJob, RenderRequest, CONNECTION_FAILED, KILLED,
};
use render_manager::session::{ProcessSignal, ReadOutcome};
use test_harness::{
    append_log, progress_line, test_session_config, TestEnv, COMPLETION_LINE, SENTINEL,
};

fn assert_bounds(job: &RenderJob) {
    assert!(job.current_frame() <= job.total_frames());
    assert!((0.0..=100.0).contains(&job.frame_progress()));
    assert!((0.0..=100.0).contains(&job.overall_progress()));
}

// =============================================================================
// Construction
// =============================================================================

#[tokio::test]
async fn test_negative_frame_range_is_rejected() {
    let env = TestEnv::new();
    let mut request = env.request("w32307");
    request.frame_range = FrameRange { start: 10, end: 4 };

    let result = RenderJob::new(
        request,
        env.connector.as_ref(),
        test_session_config(),
        env.logs.clone(),
    )
    .await;

    assert!(matches!(result, Err(RenderError::Configuration(_))));
    assert!(env.connector.handle("w32307").is_none());
}

#[tokio::test]
async fn test_new_job_is_idle_with_logs() {
    let env = TestEnv::new();
    let job = env.job(env.request("w32307")).await;

    assert_eq!(job.state(), JobState::Idle);
    assert_eq!(job.total_frames(), 4);
    assert_eq!(job.current_frame(), 0);
    assert_eq!(job.error_code(), None);
    assert_eq!(job.error_detail(), "n/a");
    assert!(job.has_session());
    assert_eq!(job.session_user(), "artist");
    assert!(job.log_path().exists());
    assert!(job
        .log_path()
        .starts_with(env.logs.root.join("renderLogs").join("AmbientFin").join("w32307")));

    let transcript = std::fs::read_to_string(job.job_log_path()).unwrap();
    assert!(transcript.contains("Render log path"));
    let name = job.job_log_path().file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("AmbientFin.ma@w32307_"));
}

#[tokio::test]
async fn test_failed_login_yields_error_job() {
    let env = TestEnv::new();
    env.connector.fail_host("w32399");

    let job = env.job(env.request("w32399")).await;

    assert_eq!(job.state(), JobState::Error);
    assert!(job.completed());
    assert_eq!(job.error_code(), Some(CONNECTION_FAILED));
    assert_eq!(job.error_detail(), "Connection to host failed");
    assert!(!job.has_session());
}

#[tokio::test]
async fn test_output_prefix_from_scene_file() {
    let env = TestEnv::new();
    let scene = env.dir.path().join("shot.ma");
    std::fs::write(
        &scene,
        "requires maya \"2014\";\n\tsetAttr \".ifp\" -type \"string\" \"fin_beauty\";\n",
    )
    .unwrap();
    let request = RenderRequest::new("w32307", &scene, "/out", FrameRange::new(1, 2).unwrap());

    let job = env.job(request).await;
    assert_eq!(job.output_prefix(), "fin_beauty");

    // unreadable scene falls back to its stem
    let job = env.job(env.request("w32307")).await;
    assert_eq!(job.output_prefix(), "AmbientFin");
}

#[tokio::test]
async fn test_remote_glob_covers_frame_range() {
    let env = TestEnv::new();
    let job = env.job(env.request("w32307")).await;

    assert_eq!(
        render_manager::transfer::remote_glob(&job),
        "/transfer/PJ/AmbientFin*{1..5}*"
    );
}

// =============================================================================
// Start-up
// =============================================================================

#[tokio::test]
async fn test_run_reaches_running_on_sentinel() {
    let env = TestEnv::new();
    let (job, handle) = env.running_job("w32307").await;

    assert_eq!(job.state(), JobState::Running);
    let sent = handle.sent_lines();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with("nice "));
    assert!(sent[0].contains(&format!("-log {}", job.log_path().display())));
    assert!(sent[0].contains("COMPLETE_SUCCESS"));

    let transcript = std::fs::read_to_string(job.job_log_path()).unwrap();
    assert!(transcript.contains("mental ray for Maya 2014"));
}

#[tokio::test]
async fn test_run_is_noop_when_not_idle() {
    let env = TestEnv::new();
    let (mut job, handle) = env.running_job("w32307").await;

    job.run().await.unwrap();

    assert_eq!(job.state(), JobState::Running);
    assert_eq!(handle.sent_lines().len(), 1);
}

#[tokio::test]
async fn test_premature_exit() {
    let env = TestEnv::new();
    let mut job = env.job(env.request("w32307")).await;
    let handle = env.connector.handle("w32307").unwrap();
    handle.push_output("// Error: file not found: AmbientFin.ma\nCOMPLETE_ERROR\n");

    let result = job.run().await;

    assert!(matches!(result, Err(RenderError::PrematureExit { .. })));
    assert_eq!(job.state(), JobState::Error);
    assert!(!job.has_session());
    let log = std::fs::read_to_string(job.log_path()).unwrap();
    assert!(log.contains("file not found"));
    assert!(job.output().iter().any(|l| l.contains("file not found")));
}

#[tokio::test]
async fn test_stream_end_during_startup() {
    let env = TestEnv::new();
    let mut job = env.job(env.request("w32307")).await;
    env.connector.handle("w32307").unwrap().close_stream();

    let result = job.run().await;

    assert!(matches!(result, Err(RenderError::StreamFatal(_))));
    assert_eq!(job.state(), JobState::Error);
}

#[tokio::test]
async fn test_fatal_read_during_startup() {
    let env = TestEnv::new();
    let mut job = env.job(env.request("w32307")).await;
    env.connector
        .handle("w32307")
        .unwrap()
        .push(ReadOutcome::Fatal("connection reset".into()));

    assert!(matches!(job.run().await, Err(RenderError::StreamFatal(_))));
    assert_eq!(job.state(), JobState::Error);
}

#[tokio::test]
async fn test_success_before_sentinel_finishes() {
    let env = TestEnv::new();
    let mut job = env.job(env.request("w32307")).await;
    env.connector
        .handle("w32307")
        .unwrap()
        .push_output("COMPLETE_SUCCESS\n");

    job.run().await.unwrap();

    assert_eq!(job.state(), JobState::Finished);
    assert_eq!(job.error_code(), Some(0));
    assert_eq!(job.current_frame(), job.total_frames());
}

#[tokio::test]
async fn test_startup_deadline_with_live_session() {
    let env = TestEnv::new();
    let mut job = env.job(env.request("w32307")).await;
    env.connector
        .handle("w32307")
        .unwrap()
        .push_output("Starting Maya\n");

    job.run().await.unwrap();

    assert_eq!(job.state(), JobState::Running);
}

#[tokio::test]
async fn test_launch_does_not_wait_for_sentinel() {
    let env = TestEnv::new();
    let mut job = env.job(env.request("w32307")).await;
    let handle = env.connector.handle("w32307").unwrap();

    job.launch().await.unwrap();
    assert!(job.is_starting());
    assert_eq!(job.state(), JobState::Idle);
    assert_eq!(handle.sent_lines().len(), 1);

    // launching twice sends nothing new
    job.launch().await.unwrap();
    assert_eq!(handle.sent_lines().len(), 1);

    job.poll_startup().await.unwrap();
    assert!(job.is_starting());

    handle.push_output(&format!("Starting Maya\n{}\n", SENTINEL));
    job.poll_startup().await.unwrap();
    assert!(!job.is_starting());
    assert_eq!(job.state(), JobState::Running);
}

#[tokio::test]
async fn test_startup_exit_status_is_reported() {
    let env = TestEnv::new();
    let mut job = env.job(env.request("w32307")).await;
    env.connector
        .handle("w32307")
        .unwrap()
        .push_output("// Maya exited with status 210\nCOMPLETE_ERROR\n");

    let result = job.run().await;

    assert!(matches!(result, Err(RenderError::RemoteProcess(210))));
    assert_eq!(job.state(), JobState::Error);
    assert_eq!(job.error_code(), Some(210));
}

#[tokio::test]
async fn test_startup_deadline_with_dead_session() {
    let env = TestEnv::new();
    let mut job = env.job(env.request("w32307")).await;
    env.connector.handle("w32307").unwrap().set_alive(false);

    assert!(matches!(job.run().await, Err(RenderError::StreamFatal(_))));
    assert_eq!(job.state(), JobState::Error);
}

// =============================================================================
// Progress
// =============================================================================

#[tokio::test]
async fn test_progress_within_first_frame() {
    let env = TestEnv::new();
    let (mut job, _handle) = env.running_job("w32307").await;

    append_log(job.log_path(), &format!("{}\n", progress_line(30.0)));
    job.poll().await;

    assert_eq!(job.current_frame(), 0);
    assert_eq!(job.frame_progress(), 30.0);
    assert_eq!(job.state(), JobState::Running);
    assert_bounds(&job);
}

#[tokio::test]
async fn test_completion_then_progress_advances_one_frame() {
    let env = TestEnv::new();
    let (mut job, _handle) = env.running_job("w32307").await;

    append_log(
        job.log_path(),
        &format!("{}\n{}\n", COMPLETION_LINE, progress_line(47.5)),
    );
    job.poll().await;

    assert_eq!(job.current_frame(), 1);
    assert_eq!(job.frame_progress(), 47.5);
    assert_bounds(&job);
}

#[tokio::test]
async fn test_completion_across_polls() {
    let env = TestEnv::new();
    let (mut job, _handle) = env.running_job("w32307").await;

    append_log(
        job.log_path(),
        &format!("{}\n{}\n", progress_line(90.0), COMPLETION_LINE),
    );
    job.poll().await;
    assert_eq!(job.current_frame(), 0);
    assert_eq!(job.frame_progress(), 100.0);

    // nothing new: counters hold
    job.poll().await;
    assert_eq!(job.current_frame(), 0);
    assert_eq!(job.frame_progress(), 100.0);

    append_log(job.log_path(), &format!("{}\n", progress_line(5.0)));
    job.poll().await;
    assert_eq!(job.current_frame(), 1);
    assert_eq!(job.frame_progress(), 5.0);
}

#[tokio::test]
async fn test_consecutive_completion_polls_count_each_frame() {
    let env = TestEnv::new();
    let (mut job, _handle) = env.running_job("w32307").await;

    let mut last = job.overall_progress();
    for expected in 0..4 {
        append_log(job.log_path(), &format!("{}\n", COMPLETION_LINE));
        job.poll().await;
        assert_eq!(job.current_frame(), expected);
        assert_eq!(job.frame_progress(), 100.0);
        assert!(job.overall_progress() > last);
        last = job.overall_progress();
    }

    append_log(job.log_path(), &format!("{}\n", progress_line(10.0)));
    job.poll().await;
    assert_eq!(job.current_frame(), 4);
    assert_eq!(job.frame_progress(), 10.0);
    assert_eq!(job.state(), JobState::Running);
    assert_bounds(&job);
}

#[tokio::test]
async fn test_pending_frame_and_new_frame_in_one_poll() {
    let env = TestEnv::new();
    let (mut job, _handle) = env.running_job("w32307").await;

    append_log(
        job.log_path(),
        &format!("{}\n{}\n", progress_line(90.0), COMPLETION_LINE),
    );
    job.poll().await;
    assert_eq!(job.current_frame(), 0);

    append_log(
        job.log_path(),
        &format!(
            "{}\n{}\n{}\n",
            progress_line(50.0),
            COMPLETION_LINE,
            progress_line(10.0)
        ),
    );
    job.poll().await;
    assert_eq!(job.current_frame(), 2);
    assert_eq!(job.frame_progress(), 10.0);
}

#[tokio::test]
async fn test_two_frames_finished_between_polls() {
    let env = TestEnv::new();
    let (mut job, _handle) = env.running_job("w32307").await;

    append_log(
        job.log_path(),
        &format!(
            "{c}\n{}\n{c}\n{}\n",
            progress_line(20.0),
            progress_line(30.0),
            c = COMPLETION_LINE
        ),
    );
    job.poll().await;

    assert_eq!(job.current_frame(), 2);
    assert_eq!(job.frame_progress(), 30.0);
    assert_bounds(&job);
}

#[tokio::test]
async fn test_partial_line_waits_for_newline() {
    let env = TestEnv::new();
    let (mut job, _handle) = env.running_job("w32307").await;

    append_log(job.log_path(), &progress_line(40.0));
    job.poll().await;
    assert_eq!(job.frame_progress(), 0.0);

    append_log(job.log_path(), "\n");
    job.poll().await;
    assert_eq!(job.frame_progress(), 40.0);
}

#[tokio::test]
async fn test_overall_progress_never_decreases_while_running() {
    let env = TestEnv::new();
    let (mut job, _handle) = env.running_job("w32307").await;

    let chunks = vec![
        format!("{}\n", progress_line(20.0)),
        format!("{}\n", progress_line(10.0)),
        format!("{}\n{}\n", progress_line(99.0), COMPLETION_LINE),
        format!("{}\n", progress_line(3.0)),
        format!("{}\n{}\n{}\n", COMPLETION_LINE, progress_line(1.0), COMPLETION_LINE),
        format!("{}\n", progress_line(60.0)),
        // more completions than the range holds
        format!("{}\n{}\n", COMPLETION_LINE, progress_line(2.0)),
        format!("{}\n{}\n", COMPLETION_LINE, progress_line(2.0)),
        format!("{}\n{}\n", COMPLETION_LINE, progress_line(2.0)),
        format!("{}\n", progress_line(50.0)),
    ];

    let mut last = job.overall_progress();
    for chunk in chunks {
        append_log(job.log_path(), &chunk);
        job.poll().await;
        assert_eq!(job.state(), JobState::Running);
        assert_bounds(&job);
        assert!(
            job.overall_progress() >= last,
            "progress went from {} to {}",
            last,
            job.overall_progress()
        );
        last = job.overall_progress();
    }
    assert_eq!(job.current_frame(), job.total_frames());
}

#[tokio::test]
async fn test_log_rewrite_resets_cursor() {
    let env = TestEnv::new();
    let (mut job, _handle) = env.running_job("w32307").await;

    append_log(
        job.log_path(),
        &format!("{}\n{}\n", progress_line(70.0), progress_line(80.0)),
    );
    job.poll().await;
    assert_eq!(job.frame_progress(), 80.0);

    std::fs::write(job.log_path(), format!("{}\n", progress_line(85.0))).unwrap();
    job.poll().await;
    assert_eq!(job.frame_progress(), 85.0);
}

// =============================================================================
// Completion
// =============================================================================

#[tokio::test]
async fn test_exit_status_zero_finishes() {
    let env = TestEnv::new();
    let (mut job, handle) = env.running_job("w32307").await;

    append_log(
        job.log_path(),
        &format!("{}\n// Maya exited with status 0\n", progress_line(50.0)),
    );
    job.poll().await;

    assert_eq!(job.state(), JobState::Finished);
    assert_eq!(job.error_code(), Some(0));
    assert_eq!(job.error_detail(), "Success");
    assert_eq!(job.current_frame(), job.total_frames());
    assert_eq!(job.frame_progress(), 0.0);
    assert!(!job.has_session());
    assert_eq!(handle.disconnects(), 1);
    assert!(job.output().iter().any(|l| l.contains("exited with status 0")));
}

#[tokio::test]
async fn test_exit_status_unknown_code_errors() {
    let env = TestEnv::new();
    let (mut job, _handle) = env.running_job("w32307").await;

    append_log(job.log_path(), "// Maya exited with status 3\n");
    job.poll().await;

    assert_eq!(job.state(), JobState::Error);
    assert_eq!(job.error_code(), Some(3));
    assert_eq!(job.error_detail(), "Unknown error");
}

#[tokio::test]
async fn test_exit_status_known_code() {
    let env = TestEnv::new();
    let (mut job, _handle) = env.running_job("w32307").await;

    append_log(job.log_path(), "// Maya exited with status 1\n");
    job.poll().await;

    assert_eq!(job.state(), JobState::Error);
    assert_eq!(job.error_detail(), "Render failed");
}

#[tokio::test]
async fn test_stream_success_marker_finishes() {
    let env = TestEnv::new();
    let (mut job, handle) = env.running_job("w32307").await;

    handle.push_output("COMPLETE_SUCCESS\n");
    job.poll().await;

    assert_eq!(job.state(), JobState::Finished);
    assert_eq!(job.error_code(), Some(0));
}

#[tokio::test]
async fn test_stream_error_marker_without_code() {
    let env = TestEnv::new();
    let (mut job, handle) = env.running_job("w32307").await;

    handle.push_output("COMPLETE_ERROR\n");
    job.poll().await;

    assert_eq!(job.state(), JobState::Error);
    assert_eq!(job.error_code(), None);
    assert_eq!(job.error_detail(), "n/a");
}

#[tokio::test]
async fn test_end_of_stream_while_running() {
    let env = TestEnv::new();
    let (mut job, handle) = env.running_job("w32307").await;

    handle.close_stream();
    job.poll().await;

    assert_eq!(job.state(), JobState::Error);
    assert!(!job.has_session());
}

#[tokio::test]
async fn test_liveness_loss_while_running() {
    let env = TestEnv::new();
    let (mut job, handle) = env.running_job("w32307").await;

    handle.set_alive(false);
    job.poll().await;

    assert_eq!(job.state(), JobState::Error);
}

// =============================================================================
// Control
// =============================================================================

#[tokio::test]
async fn test_pause_is_idempotent() {
    let env = TestEnv::new();
    let (mut job, handle) = env.running_job("w32307").await;

    job.pause().await;
    job.pause().await;

    assert_eq!(job.state(), JobState::Paused);
    assert_eq!(handle.signals(), vec![ProcessSignal::Suspend]);

    job.resume().await;
    assert_eq!(job.state(), JobState::Running);
    job.resume().await;
    assert_eq!(
        handle.signals(),
        vec![ProcessSignal::Suspend, ProcessSignal::Continue]
    );
}

#[tokio::test]
async fn test_resume_on_idle_is_noop() {
    let env = TestEnv::new();
    let mut job = env.job(env.request("w32307")).await;

    job.resume().await;
    job.pause().await;

    assert_eq!(job.state(), JobState::Idle);
    assert!(env.connector.handle("w32307").unwrap().signals().is_empty());
}

#[tokio::test]
async fn test_pause_fails_when_signal_fails() {
    let env = TestEnv::new();
    let (mut job, handle) = env.running_job("w32307").await;
    handle.fail_signals(true);

    job.pause().await;

    assert_eq!(job.state(), JobState::Running);
}

#[tokio::test]
async fn test_paused_job_still_tracks_progress() {
    let env = TestEnv::new();
    let (mut job, _handle) = env.running_job("w32307").await;
    job.pause().await;

    append_log(job.log_path(), &format!("{}\n", progress_line(12.0)));
    job.poll().await;

    assert_eq!(job.state(), JobState::Paused);
    assert_eq!(job.frame_progress(), 12.0);
}

#[tokio::test]
async fn test_kill_running_job() {
    let env = TestEnv::new();
    let (mut job, handle) = env.running_job("w32307").await;

    job.kill().await;

    assert!(job.completed());
    assert_eq!(job.state(), JobState::Finished);
    assert_eq!(
        handle.signals(),
        vec![ProcessSignal::Interrupt, ProcessSignal::Kill]
    );
    assert!(!job.has_session());
}

#[tokio::test]
async fn test_kill_paused_job_resumes_first() {
    let env = TestEnv::new();
    let (mut job, handle) = env.running_job("w32307").await;
    job.pause().await;

    job.kill().await;

    assert!(job.completed());
    assert_eq!(
        handle.signals(),
        vec![
            ProcessSignal::Suspend,
            ProcessSignal::Continue,
            ProcessSignal::Interrupt,
            ProcessSignal::Kill
        ]
    );
}

#[tokio::test]
async fn test_kill_while_starting_stops_remote() {
    let env = TestEnv::new();
    let mut job = env.job(env.request("w32307")).await;
    let handle = env.connector.handle("w32307").unwrap();
    job.launch().await.unwrap();

    job.kill().await;

    assert!(!job.is_starting());
    assert_eq!(job.state(), JobState::Error);
    assert_eq!(job.error_code(), Some(KILLED));
    assert_eq!(
        handle.signals(),
        vec![ProcessSignal::Interrupt, ProcessSignal::Kill]
    );
    assert!(!job.has_session());
}

#[tokio::test]
async fn test_kill_always_terminal() {
    let env = TestEnv::new();

    let mut idle = env.job(env.request("w1")).await;
    idle.kill().await;
    assert_eq!(idle.state(), JobState::Error);
    assert_eq!(idle.error_code(), Some(KILLED));
    assert_eq!(idle.error_detail(), "Killed");

    env.connector.fail_host("w2");
    let mut failed = env.job(env.request("w2")).await;
    failed.kill().await;
    assert_eq!(failed.state(), JobState::Error);

    let (mut unkillable, handle) = env.running_job("w3").await;
    handle.fail_signals(true);
    unkillable.kill().await;
    assert!(unkillable.completed());
}

#[tokio::test]
async fn test_close_running_job() {
    let env = TestEnv::new();
    let (mut job, handle) = env.running_job("w32307").await;
    append_log(job.log_path(), "mental ray: rendering\n");

    job.close().await;

    assert_eq!(job.state(), JobState::Error);
    assert!(!job.has_session());
    assert!(!handle.is_connected());
    assert!(job.output().iter().any(|l| l.contains("mental ray: rendering")));

    // a second close is harmless
    job.close().await;
    assert_eq!(handle.disconnects(), 1);
}

#[tokio::test]
async fn test_close_survives_disconnect_failure() {
    let env = TestEnv::new();
    let (mut job, handle) = env.running_job("w32307").await;
    handle.fail_disconnect(true);

    job.close().await;

    assert!(job.completed());
    assert!(!job.has_session());
}

#[tokio::test]
async fn test_close_finished_job_keeps_state() {
    let env = TestEnv::new();
    let (mut job, _handle) = env.running_job("w32307").await;
    append_log(job.log_path(), "exited with status 0\n");
    job.poll().await;

    job.close().await;

    assert_eq!(job.state(), JobState::Finished);
    assert_eq!(job.error_code(), Some(0));
}

// =============================================================================
// Restart and presentation
// =============================================================================

#[tokio::test]
async fn test_restart_finished_job() {
    let env = TestEnv::new();
    let (mut job, _handle) = env.running_job("w32307").await;
    append_log(job.log_path(), "exited with status 0\n");
    job.poll().await;
    assert_eq!(job.state(), JobState::Finished);

    let fresh = job.restart(env.connector.as_ref()).await.unwrap();

    assert_ne!(fresh.id(), job.id());
    assert_eq!(fresh.state(), JobState::Idle);
    assert_eq!(fresh.request(), job.request());
    assert_eq!(fresh.current_frame(), 0);
    assert!(fresh.has_session());
    assert_ne!(fresh.log_path(), job.log_path());

    assert_eq!(job.state(), JobState::Finished);
    assert!(!job.has_session());
    assert_eq!(env.connector.sessions("w32307").len(), 2);
}

#[tokio::test]
async fn test_snapshot_fields() {
    let env = TestEnv::new();
    let request = env.request("w32307").with_camera("persp").with_resolution(640, 480);
    let job = env.job(request).await;

    let snapshot = job.snapshot();

    assert_eq!(snapshot.id, job.id());
    assert_eq!(snapshot.state, "Idle");
    assert_eq!(snapshot.camera, "persp");
    assert_eq!(snapshot.resolution, "640x480");
    assert_eq!(snapshot.error_detail, "n/a");
    assert!(!snapshot.copied);

    let plain = env.job(env.request("w32307")).await.snapshot();
    assert_eq!(plain.camera, "n/a");
    assert_eq!(plain.resolution, "n/a");
}

#[tokio::test]
async fn test_display_line() {
    let env = TestEnv::new();
    let (mut job, _handle) = env.running_job("w32307").await;
    append_log(job.log_path(), &format!("{}\n", progress_line(50.0)));
    job.poll().await;

    assert_eq!(
        job.to_string(),
        "[Running] : AmbientFin.ma@w32307 : { Frame 0/4 } 10.00%"
    );
}

#[tokio::test]
async fn test_sentinel_is_configurable() {
    let env = TestEnv::new();
    let settings = render_manager::config::SessionConfig {
        startup_sentinel: "READY".into(),
        startup_timeout: Duration::from_secs(5),
        ..test_session_config()
    };
    let mut job = RenderJob::new(
        env.request("w32307"),
        env.connector.as_ref(),
        settings,
        env.logs.clone(),
    )
    .await
    .unwrap();
    let handle = env.connector.handle("w32307").unwrap();
    handle.push_output(&format!("{}\n", SENTINEL));
    handle.push_output("READY\n");

    job.run().await.unwrap();

    assert_eq!(job.state(), JobState::Running);
}
