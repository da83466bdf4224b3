use super::test_helpers::{
    MOCK_HOST, create_test_downloader, create_test_downloader_with, mock_url, wait_for_status,
    wait_until,
};
use super::*;
use crate::error::TaskError;
use crate::types::{DownloadOptions, Event, Status, TaskId};
use std::time::Duration;

mod control;

/// Drain whatever events are already buffered
fn drain(subscription: &mut crate::hub::Subscription) -> Vec<Event> {
    let mut events = Vec::new();
    while let Some(event) = subscription.try_recv() {
        events.push(event);
    }
    events
}

fn is_invalid_state(err: &Error) -> bool {
    matches!(err, Error::Task(TaskError::InvalidState { .. }))
}

fn is_not_found(err: &Error) -> bool {
    matches!(err, Error::Task(TaskError::NotFound { .. }))
}
