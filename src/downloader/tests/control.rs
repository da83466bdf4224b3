use super::*;

#[tokio::test]
async fn pause_and_resume_queued_task() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let id = downloader
        .create(&mock_url("ok/a"), DownloadOptions::default())
        .await
        .unwrap();
    let mut events = downloader.subscribe();

    downloader.pause(id).await.unwrap();
    assert_eq!(downloader.get(id).await.unwrap().status, Status::Paused);
    assert!(downloader.pending_ids().await.is_empty());

    // pausing twice is a no-op
    downloader.pause(id).await.unwrap();

    downloader.resume(id).await.unwrap();
    assert_eq!(downloader.get(id).await.unwrap().status, Status::Pending);
    assert_eq!(downloader.pending_ids().await, vec![id]);

    let statuses: Vec<_> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            Event::Status { status, .. } => Some(status),
            _ => None,
        })
        .collect();
    assert_eq!(statuses, vec![Status::Paused, Status::Pending]);
}

#[tokio::test]
async fn last_status_event_matches_stored_status_under_contention() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let id = downloader
        .create(&mock_url("ok/a"), DownloadOptions::default())
        .await
        .unwrap();
    let mut events = downloader.subscribe();

    let mut handles = Vec::new();
    for i in 0..20 {
        let downloader = downloader.clone();
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                downloader.pause(id).await
            } else {
                downloader.resume(id).await
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let last = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            Event::Status { status, .. } => Some(status),
            _ => None,
        })
        .last();
    let stored = downloader.get(id).await.unwrap().status;
    if let Some(last) = last {
        assert_eq!(last, stored);
    }
    assert_eq!(
        downloader.pending_ids().await.contains(&id),
        stored == Status::Pending
    );
}

#[tokio::test]
async fn resume_appends_to_tail() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let a = downloader
        .create(&mock_url("ok/a"), DownloadOptions::default())
        .await
        .unwrap();
    let b = downloader
        .create(&mock_url("ok/b"), DownloadOptions::default())
        .await
        .unwrap();

    downloader.pause(a).await.unwrap();
    downloader.resume(a).await.unwrap();
    assert_eq!(downloader.pending_ids().await, vec![b, a]);
}

#[tokio::test]
async fn resume_of_pending_task_is_noop() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let id = downloader
        .create(&mock_url("ok/a"), DownloadOptions::default())
        .await
        .unwrap();

    downloader.resume(id).await.unwrap();
    assert_eq!(downloader.pending_ids().await, vec![id]);
    assert_eq!(downloader.get(id).await.unwrap().status, Status::Pending);
}

#[tokio::test]
async fn resume_of_active_task_is_invalid_state() {
    let (downloader, _temp_dir, mock) = create_test_downloader_with(|_| {}).await;
    downloader.start().await.unwrap();

    let id = downloader
        .create(&mock_url("gate/a"), DownloadOptions::default())
        .await
        .unwrap();
    wait_for_status(&downloader, id, Status::Active).await;

    let err = downloader.resume(id).await.unwrap_err();
    assert!(is_invalid_state(&err));
    match err {
        Error::Task(TaskError::InvalidState { current_state, .. }) => {
            assert_eq!(current_state, Status::Active.to_string())
        }
        other => panic!("unexpected error: {other:?}"),
    }

    mock.open_gate(1);
    wait_for_status(&downloader, id, Status::Completed).await;
    downloader.stop().await.unwrap();
}

#[tokio::test]
async fn resume_of_stale_active_record_is_invalid_state() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let id = downloader
        .create(&mock_url("ok/a"), DownloadOptions::default())
        .await
        .unwrap();
    downloader
        .db
        .update_task(
            id,
            &crate::db::TaskUpdate {
                status: Some(Status::Active),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(is_invalid_state(&downloader.resume(id).await.unwrap_err()));
}

#[tokio::test]
async fn cancel_queued_task_is_terminal() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let id = downloader
        .create(&mock_url("ok/a"), DownloadOptions::default())
        .await
        .unwrap();

    downloader.cancel(id).await.unwrap();
    let record = downloader.get(id).await.unwrap();
    assert_eq!(record.status, Status::Cancelled);
    assert!(record.completed_at.is_some());
    assert!(record.error.is_none());
    assert!(downloader.pending_ids().await.is_empty());

    assert!(is_invalid_state(&downloader.cancel(id).await.unwrap_err()));
    assert!(is_invalid_state(&downloader.pause(id).await.unwrap_err()));
    assert!(is_invalid_state(&downloader.resume(id).await.unwrap_err()));
}

#[tokio::test]
async fn cancel_paused_task_removes_partial_artifact() {
    let (downloader, temp_dir) = create_test_downloader().await;
    let id = downloader
        .create(&mock_url("ok/a"), DownloadOptions::default())
        .await
        .unwrap();
    downloader.pause(id).await.unwrap();

    let partial = temp_dir.path().join("a.part");
    tokio::fs::write(&partial, b"partial").await.unwrap();
    downloader
        .db
        .update_task(
            id,
            &crate::db::TaskUpdate {
                output_path: Some(Some(partial.clone())),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    downloader.cancel(id).await.unwrap();
    assert!(!partial.exists());
    let record = downloader.get(id).await.unwrap();
    assert_eq!(record.status, Status::Cancelled);
    assert!(record.output_path.is_none());
}

#[tokio::test]
async fn control_operations_on_unknown_task_are_not_found() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let missing = TaskId(12345);

    assert!(is_not_found(&downloader.pause(missing).await.unwrap_err()));
    assert!(is_not_found(&downloader.resume(missing).await.unwrap_err()));
    assert!(is_not_found(&downloader.cancel(missing).await.unwrap_err()));
}

#[tokio::test]
async fn pause_active_task_keeps_progress_then_resume_restarts() {
    let (downloader, _temp_dir, mock) = create_test_downloader_with(|_| {}).await;
    downloader.start().await.unwrap();

    let url = mock_url("gate/a");
    let id = downloader
        .create(&url, DownloadOptions::default())
        .await
        .unwrap();
    let active = wait_for_status(&downloader, id, Status::Active).await;
    assert!(active.started_at.is_some());
    wait_until("first sample", || async {
        downloader.get(id).await.unwrap().progress.bytes_done > 0
    })
    .await;

    downloader.pause(id).await.unwrap();
    let paused = downloader.get(id).await.unwrap();
    assert_eq!(paused.status, Status::Paused);
    assert_eq!(paused.progress.bytes_done, 10);
    assert_eq!(downloader.active_count().await, 0);

    mock.open_gate(1);
    downloader.resume(id).await.unwrap();
    let done = wait_for_status(&downloader, id, Status::Completed).await;
    assert_eq!(done.progress.percentage, 100.0);
    assert_eq!(mock.calls_for(&url), 2);

    downloader.stop().await.unwrap();
}

#[tokio::test]
async fn cancel_active_task_deletes_partial_output() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    downloader.start().await.unwrap();

    let id = downloader
        .create(&mock_url("gate/a"), DownloadOptions::default())
        .await
        .unwrap();
    wait_until("partial output", || async {
        downloader
            .get(id)
            .await
            .unwrap()
            .output_path
            .is_some_and(|p| p.exists())
    })
    .await;
    let partial = downloader.get(id).await.unwrap().output_path.unwrap();

    downloader.cancel(id).await.unwrap();
    let record = downloader.get(id).await.unwrap();
    assert_eq!(record.status, Status::Cancelled);
    assert!(record.output_path.is_none());
    assert!(!partial.exists());

    downloader.stop().await.unwrap();
}

#[tokio::test]
async fn cancel_wins_over_earlier_pause_request() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    downloader.start().await.unwrap();

    let id = downloader
        .create(&mock_url("stubborn/a"), DownloadOptions::default())
        .await
        .unwrap();
    wait_until("first sample", || async {
        downloader.get(id).await.unwrap().progress.bytes_done > 0
    })
    .await;

    let pauser = {
        let downloader = downloader.clone();
        tokio::spawn(async move { downloader.pause(id).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    downloader.cancel(id).await.unwrap();
    pauser.await.unwrap().unwrap();

    wait_for_status(&downloader, id, Status::Cancelled).await;
    downloader.stop().await.unwrap();
}

#[tokio::test]
async fn retry_failed_task_runs_again() {
    let (downloader, _temp_dir, mock) = create_test_downloader_with(|_| {}).await;
    downloader.start().await.unwrap();

    let url = mock_url("fail/a");
    let id = downloader
        .create(&url, DownloadOptions::default())
        .await
        .unwrap();
    let failed = wait_for_status(&downloader, id, Status::Failed).await;
    assert!(failed.error.unwrap().contains("mock failure"));
    wait_until("runner released", || async { downloader.active_count().await == 0 }).await;

    downloader.retry(id).await.unwrap();
    wait_until("second attempt", || async { mock.calls_for(&url) == 2 }).await;
    let failed_again = wait_for_status(&downloader, id, Status::Failed).await;
    assert!(failed_again.error.is_some());

    downloader.stop().await.unwrap();
}

#[tokio::test]
async fn cancel_wins_over_fetch_that_finishes_after_it() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    downloader.start().await.unwrap();

    let id = downloader
        .create(&mock_url("late/a"), DownloadOptions::default())
        .await
        .unwrap();
    wait_until("partial output", || async {
        downloader
            .get(id)
            .await
            .unwrap()
            .output_path
            .is_some_and(|p| p.exists())
    })
    .await;
    let artifact = downloader.get(id).await.unwrap().output_path.unwrap();

    downloader.cancel(id).await.unwrap();
    let record = wait_for_status(&downloader, id, Status::Cancelled).await;
    assert!(record.output_path.is_none());
    assert!(record.error.is_none());
    assert!(!artifact.exists());

    downloader.stop().await.unwrap();
}
