use chrono::NaiveDateTime;
use filetime::FileTime;
use photo_redate::adjust::resolve_local;
use photo_redate::model::{
    AdjustmentSpec, DstCompensation, FileOutcome, RedateExecuteResponse, RedateRequest,
    SelectionPolicy, SubOutcome, DEFAULT_RENAME_TEMPLATE,
};
use photo_redate::{execute, preview};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// File contents carrying one embedded date in the on-disk layout.
fn photo_bytes(iso: &str) -> Vec<u8> {
    let mut bytes = b"\xff\xd8 fake jpeg header ".to_vec();
    bytes.extend_from_slice(iso.replace('-', ":").as_bytes());
    bytes.push(0);
    bytes.extend_from_slice(b" trailing image data");
    bytes
}

fn base_request(paths: Vec<String>) -> RedateRequest {
    RedateRequest {
        input_paths: paths,
        include_subfolders: false,
        include_hidden: false,
        selection_policy: SelectionPolicy::Oldest,
        adjustment: AdjustmentSpec::default(),
        apply_timestamp: true,
        apply_rename: false,
        rename_template: DEFAULT_RENAME_TEMPLATE.to_string(),
        dry_run: false,
        tolerance_ms: None,
        read_limit: None,
        dst_compensation: Some(DstCompensation::Never),
    }
}

fn run(request: &RedateRequest) -> RedateExecuteResponse {
    execute(request, || false, |_| {}).expect("run succeeds")
}

fn target_millis(iso: &str) -> i64 {
    let naive = NaiveDateTime::parse_from_str(iso, "%Y-%m-%d %H:%M:%S").expect("test datetime");
    resolve_local(naive).expect("resolvable").timestamp_millis()
}

fn mtime_millis(path: &Path) -> i64 {
    let modified = fs::metadata(path)
        .and_then(|meta| meta.modified())
        .expect("metadata");
    let duration = modified
        .duration_since(std::time::UNIX_EPOCH)
        .expect("post-epoch mtime");
    duration.as_millis() as i64
}

fn set_mtime_millis(path: &Path, millis: i64) {
    let time = FileTime::from_unix_time(
        millis.div_euclid(1000),
        (millis.rem_euclid(1000) as u32) * 1_000_000,
    );
    filetime::set_file_mtime(path, time).expect("set mtime");
}

#[test]
fn execute_sets_the_timestamp_from_the_embedded_date() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("IMG_0001.JPG");
    fs::write(&file, photo_bytes("2001-01-01 00:00:00")).unwrap();
    set_mtime_millis(&file, target_millis("2010-05-05 10:00:00"));

    let response = run(&base_request(vec![file.to_string_lossy().to_string()]));

    assert_eq!(response.totals.files, 1);
    assert_eq!(response.totals.changed, 1);
    assert_eq!(response.totals.errors, 0);
    assert_eq!(response.details[0].timestamp_outcome, SubOutcome::Changed);
    assert_eq!(mtime_millis(&file), target_millis("2001-01-01 00:00:00"));
}

#[test]
fn a_second_run_reports_correct_not_changed() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("IMG_0001.JPG");
    fs::write(&file, photo_bytes("2001-01-01 00:00:00")).unwrap();
    set_mtime_millis(&file, target_millis("2010-05-05 10:00:00"));

    let request = base_request(vec![file.to_string_lossy().to_string()]);
    run(&request);
    let second = run(&request);

    assert_eq!(second.totals.changed, 0);
    assert_eq!(second.totals.correct, 1);
    assert_eq!(second.details[0].timestamp_outcome, SubOutcome::Correct);
}

#[test]
fn differences_below_the_tolerance_read_as_correct() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("close.jpg");
    fs::write(&file, photo_bytes("2001-01-01 00:00:00")).unwrap();
    set_mtime_millis(&file, target_millis("2001-01-01 00:00:00") - 1999);

    let response = run(&base_request(vec![file.to_string_lossy().to_string()]));

    assert_eq!(response.details[0].timestamp_outcome, SubOutcome::Correct);
    assert_eq!(response.totals.correct, 1);
    assert_eq!(response.totals.changed, 0);
}

#[test]
fn differences_above_the_tolerance_are_changed() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("off.jpg");
    fs::write(&file, photo_bytes("2001-01-01 00:00:00")).unwrap();
    set_mtime_millis(&file, target_millis("2001-01-01 00:00:00") - 2001);

    let response = run(&base_request(vec![file.to_string_lossy().to_string()]));

    assert_eq!(response.details[0].timestamp_outcome, SubOutcome::Changed);
    assert_eq!(response.totals.changed, 1);
}

#[test]
fn dry_run_records_the_decision_but_touches_nothing() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("IMG_0001.JPG");
    fs::write(&file, photo_bytes("2001-01-01 00:00:00")).unwrap();
    let before = target_millis("2010-05-05 10:00:00");
    set_mtime_millis(&file, before);

    let mut request = base_request(vec![file.to_string_lossy().to_string()]);
    request.dry_run = true;
    let response = run(&request);

    assert_eq!(response.details[0].timestamp_outcome, SubOutcome::Simulated);
    assert_eq!(response.totals.changed, 0);
    assert_eq!(mtime_millis(&file), before);
}

#[test]
fn rename_prepends_the_date_prefix_and_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("IMG_0001.JPG");
    fs::write(&file, photo_bytes("2001-01-01 00:00:00")).unwrap();

    let mut request = base_request(vec![dir.path().to_string_lossy().to_string()]);
    request.apply_timestamp = false;
    request.apply_rename = true;

    let first = run(&request);
    assert_eq!(first.totals.changed, 1);
    assert_eq!(first.details[0].rename_outcome, SubOutcome::Changed);
    let renamed = dir.path().join("2001-01-01 00-00-00 IMG_0001.JPG");
    assert!(renamed.exists());
    assert!(!file.exists());

    let second = run(&request);
    assert_eq!(second.totals.changed, 0);
    assert_eq!(second.totals.correct, 1);
    assert_eq!(second.details[0].rename_outcome, SubOutcome::Correct);
}

#[test]
fn an_older_different_prefix_is_not_stripped() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("2000-01-01 00-00-00 IMG.JPG");
    fs::write(&file, photo_bytes("2001-01-01 00:00:00")).unwrap();

    let mut request = base_request(vec![dir.path().to_string_lossy().to_string()]);
    request.apply_timestamp = false;
    request.apply_rename = true;
    run(&request);

    assert!(dir
        .path()
        .join("2001-01-01 00-00-00 2000-01-01 00-00-00 IMG.JPG")
        .exists());
}

#[test]
fn rename_refuses_to_overwrite_an_existing_destination() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("IMG_0001.JPG");
    fs::write(&file, photo_bytes("2001-01-01 00:00:00")).unwrap();
    fs::write(
        dir.path().join("2001-01-01 00-00-00 IMG_0001.JPG"),
        b"already here",
    )
    .unwrap();

    let mut request = base_request(vec![file.to_string_lossy().to_string()]);
    request.apply_timestamp = false;
    request.apply_rename = true;
    let response = run(&request);

    assert_eq!(response.details[0].rename_outcome, SubOutcome::Failed);
    assert_eq!(response.totals.errors, 1);
    assert!(file.exists());
}

#[test]
fn files_without_a_date_count_as_no_data_not_errors() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("plain.bin");
    fs::write(&file, b"no dates in here at all").unwrap();

    let response = run(&base_request(vec![file.to_string_lossy().to_string()]));

    assert_eq!(response.totals.no_data, 1);
    assert_eq!(response.totals.errors, 0);
    assert_eq!(response.details[0].outcome, FileOutcome::NoData);
}

#[test]
fn read_only_files_are_blocked_and_counted_as_errors() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("locked.jpg");
    fs::write(&file, photo_bytes("2001-01-01 00:00:00")).unwrap();
    set_mtime_millis(&file, target_millis("2010-05-05 10:00:00"));
    let mut perms = fs::metadata(&file).unwrap().permissions();
    perms.set_readonly(true);
    fs::set_permissions(&file, perms.clone()).unwrap();

    let response = run(&base_request(vec![file.to_string_lossy().to_string()]));

    perms.set_readonly(false);
    fs::set_permissions(&file, perms).unwrap();

    assert_eq!(response.details[0].timestamp_outcome, SubOutcome::Blocked);
    assert_eq!(response.totals.errors, 1);
    assert_eq!(response.totals.changed, 0);
}

#[test]
fn cancellation_before_the_first_file_processes_nothing() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("a.jpg"),
        photo_bytes("2001-01-01 00:00:00"),
    )
    .unwrap();

    let request = base_request(vec![dir.path().to_string_lossy().to_string()]);
    let response = execute(&request, || true, |_| {}).unwrap();

    assert!(response.canceled);
    assert_eq!(response.totals.files, 0);
    assert_eq!(response.totals.changed, 0);
}

#[test]
fn folder_counts_respect_the_recursion_flag() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("top.jpg"),
        photo_bytes("2001-01-01 00:00:00"),
    )
    .unwrap();
    let sub = dir.path().join("sub");
    fs::create_dir(&sub).unwrap();
    fs::write(sub.join("inner.jpg"), photo_bytes("2001-01-01 00:00:00")).unwrap();

    let mut request = base_request(vec![dir.path().to_string_lossy().to_string()]);
    request.dry_run = true;

    let flat = run(&request);
    assert_eq!(flat.totals.files, 1);
    assert_eq!(flat.totals.folders, 1);

    request.include_subfolders = true;
    let recursive = run(&request);
    assert_eq!(recursive.totals.files, 2);
    assert_eq!(recursive.totals.folders, 2);
}

#[test]
fn hidden_entries_are_skipped_unless_requested() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(".hidden.jpg"),
        photo_bytes("2001-01-01 00:00:00"),
    )
    .unwrap();

    let mut request = base_request(vec![dir.path().to_string_lossy().to_string()]);
    request.dry_run = true;

    assert_eq!(run(&request).totals.files, 0);

    request.include_hidden = true;
    assert_eq!(run(&request).totals.files, 1);
}

#[test]
fn preview_classifies_without_touching_the_disk() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("IMG_0001.JPG");
    fs::write(&file, photo_bytes("2001-01-01 00:00:00")).unwrap();
    let before = target_millis("2010-05-05 10:00:00");
    set_mtime_millis(&file, before);

    let request = base_request(vec![file.to_string_lossy().to_string()]);
    let response = preview(&request, |_| {}).unwrap();

    assert_eq!(response.would_change, 1);
    assert_eq!(
        response.items[0].timestamp_outcome,
        SubOutcome::WouldChange
    );
    assert_eq!(mtime_millis(&file), before);
}

#[test]
fn the_selection_policy_decides_between_embedded_dates() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("edited.jpg");
    let mut bytes = photo_bytes("2001-01-01 00:00:00");
    bytes.extend_from_slice(&photo_bytes("1999-06-01 00:00:00"));
    fs::write(&file, bytes).unwrap();

    let mut request = base_request(vec![file.to_string_lossy().to_string()]);
    request.dry_run = true;

    let oldest = run(&request);
    assert_eq!(
        oldest.details[0].found_datetime.as_deref(),
        Some("1999-06-01 00:00:00")
    );

    request.selection_policy = SelectionPolicy::Newest;
    let newest = run(&request);
    assert_eq!(
        newest.details[0].found_datetime.as_deref(),
        Some("2001-01-01 00:00:00")
    );
}

#[test]
fn out_of_range_adjustments_are_rejected_up_front() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("a.jpg");
    fs::write(&file, photo_bytes("2001-01-01 00:00:00")).unwrap();

    let mut request = base_request(vec![file.to_string_lossy().to_string()]);
    request.adjustment.years = 100;

    assert!(execute(&request, || false, |_| {}).is_err());
}

#[test]
fn the_adjustment_shifts_the_target_instant() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("late_clock.jpg");
    fs::write(&file, photo_bytes("2001-01-01 00:00:00")).unwrap();
    set_mtime_millis(&file, target_millis("2010-05-05 10:00:00"));

    let mut request = base_request(vec![file.to_string_lossy().to_string()]);
    request.adjustment = AdjustmentSpec {
        hours: 1,
        seconds: 30,
        ..AdjustmentSpec::default()
    };
    let response = run(&request);

    assert_eq!(
        response.details[0].target_datetime.as_deref(),
        Some("2001-01-01 01:00:30")
    );
    assert_eq!(mtime_millis(&file), target_millis("2001-01-01 01:00:30"));
}
