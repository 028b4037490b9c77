use bus_client::logger::{LOG_FILE_NAME, initialize};

use log::info;

/// **VALUE**: The ready-made sink writes to its file and tolerates being
/// installed twice.
///
/// **WHY THIS MATTERS**: Hosts and libraries both tend to call
/// `initialize`. The second call must not fail.
///
/// This is the only test in the binary that installs a logger.
#[test]
fn given_log_dir_when_initialized_twice_then_second_call_is_ok_and_file_exists() {
    // GIVEN: A fresh log directory that does not exist yet
    let dir = tempfile::tempdir().unwrap();
    let log_dir = dir.path().join("logs");

    // WHEN
    initialize(&log_dir).unwrap();
    info!("bootstrap diagnostics go here");
    let second = initialize(&log_dir);

    // THEN
    assert!(second.is_ok());
    assert!(log_dir.join(LOG_FILE_NAME).exists());
}
