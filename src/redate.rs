use crate::adjust;
use crate::error::AppError;
use crate::file_collect::collect_targets;
use crate::model::{
    AdjustmentSpec, DstCompensation, FileOutcome, OperationProgressEvent, RedateDetail,
    RedateExecuteResponse, RedatePreviewResponse, RedateRequest, RunTotals, SelectionPolicy,
    SubOutcome, DEFAULT_READ_LIMIT, DEFAULT_TOLERANCE_MS,
};
use crate::scan;
use chrono::{DateTime, Local};
use filetime::{set_file_mtime, FileTime};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Characters that must not appear in a rendered file name prefix.
const INVALID_NAME_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApplyMode {
    /// Classify only, touch nothing (preview).
    Plan,
    /// Same records as a real run, no OS calls (dry run).
    Simulate,
    Apply,
}

/// Classify every file without touching the disk.
pub fn preview<FProgress>(
    request: &RedateRequest,
    report_progress: FProgress,
) -> Result<RedatePreviewResponse, AppError>
where
    FProgress: FnMut(OperationProgressEvent),
{
    let (details, _totals, _canceled) = run(request, ApplyMode::Plan, || false, report_progress)?;

    let mut would_change = 0usize;
    let mut correct = 0usize;
    let mut no_data = 0usize;
    let mut errors = 0usize;
    for item in &details {
        match item.outcome {
            FileOutcome::NoData => no_data += 1,
            FileOutcome::ReadFailed | FileOutcome::ParseFailed => errors += 1,
            _ => {
                let subs = [item.timestamp_outcome, item.rename_outcome];
                if subs.contains(&SubOutcome::Blocked) || subs.contains(&SubOutcome::Failed) {
                    errors += 1;
                }
                if subs.contains(&SubOutcome::WouldChange) {
                    would_change += 1;
                } else if subs.contains(&SubOutcome::Correct) {
                    correct += 1;
                }
            }
        }
    }

    Ok(RedatePreviewResponse {
        total: details.len(),
        items: details,
        would_change,
        correct,
        no_data,
        errors,
    })
}

/// Run the correction pass. Files are processed strictly one at a time;
/// the cancellation callback is polled between files, and per-file
/// failures never abort the run.
pub fn execute<FCancel, FProgress>(
    request: &RedateRequest,
    is_cancelled: FCancel,
    report_progress: FProgress,
) -> Result<RedateExecuteResponse, AppError>
where
    FCancel: Fn() -> bool,
    FProgress: FnMut(OperationProgressEvent),
{
    let mode = if request.dry_run {
        ApplyMode::Simulate
    } else {
        ApplyMode::Apply
    };
    let (details, totals, canceled) = run(request, mode, is_cancelled, report_progress)?;
    Ok(RedateExecuteResponse {
        details,
        totals,
        canceled,
    })
}

fn run<FCancel, FProgress>(
    request: &RedateRequest,
    mode: ApplyMode,
    is_cancelled: FCancel,
    mut report_progress: FProgress,
) -> Result<(Vec<RedateDetail>, RunTotals, bool), AppError>
where
    FCancel: Fn() -> bool,
    FProgress: FnMut(OperationProgressEvent),
{
    request
        .adjustment
        .validate()
        .map_err(AppError::InvalidRequest)?;

    // an empty template disables renaming rather than failing
    let rename_enabled = request.apply_rename && !request.rename_template.trim().is_empty();
    if rename_enabled {
        validate_template(&request.rename_template)?;
    }

    let collect = collect_targets(
        &request.input_paths,
        request.include_subfolders,
        request.include_hidden,
        &is_cancelled,
    )
    .map_err(AppError::InvalidRequest)?;

    let opts = Options {
        selection_policy: request.selection_policy,
        adjustment: request.adjustment,
        apply_timestamp: request.apply_timestamp,
        rename_enabled,
        rename_template: request.rename_template.clone(),
        tolerance_ms: request.tolerance_ms.unwrap_or(DEFAULT_TOLERANCE_MS),
        read_limit: request.read_limit.unwrap_or(DEFAULT_READ_LIMIT),
        dst_compensation: request.dst_compensation.unwrap_or_default(),
    };

    let total = collect.files.len();
    let mut totals = RunTotals {
        folders: collect.folders,
        ..RunTotals::default()
    };
    let mut details = Vec::with_capacity(total);
    let mut processed = 0usize;
    let mut canceled = is_cancelled();

    for file in &collect.files {
        if !canceled && is_cancelled() {
            canceled = true;
        }

        let path_str = file.to_string_lossy().to_string();
        let detail = if canceled {
            bare_detail(
                path_str.clone(),
                FileOutcome::Skipped,
                "キャンセルされました".to_string(),
            )
        } else {
            process_file(file, &opts, mode, &mut totals)
        };
        processed += 1;
        details.push(detail);

        report_progress(OperationProgressEvent {
            operation: "redate".to_string(),
            processed,
            total,
            totals,
            current_path: Some(path_str),
            done: false,
            canceled,
        });
    }

    report_progress(OperationProgressEvent {
        operation: "redate".to_string(),
        processed,
        total,
        totals,
        current_path: None,
        done: true,
        canceled,
    });

    Ok((details, totals, canceled))
}

struct Options {
    selection_policy: SelectionPolicy,
    adjustment: AdjustmentSpec,
    apply_timestamp: bool,
    rename_enabled: bool,
    rename_template: String,
    tolerance_ms: i64,
    read_limit: u64,
    dst_compensation: DstCompensation,
}

/// Detail record for a file the planner never reached.
fn bare_detail(source_path: String, outcome: FileOutcome, reason: String) -> RedateDetail {
    RedateDetail {
        source_path,
        outcome,
        reason: Some(reason),
        found_datetime: None,
        target_datetime: None,
        previous_datetime: None,
        timestamp_outcome: SubOutcome::NotRequested,
        timestamp_reason: None,
        rename_outcome: SubOutcome::NotRequested,
        rename_reason: None,
        destination_name: None,
    }
}

fn process_file(
    path: &Path,
    opts: &Options,
    mode: ApplyMode,
    totals: &mut RunTotals,
) -> RedateDetail {
    totals.files += 1;
    let path_str = path.to_string_lossy().to_string();
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();

    // scan the leading bytes for embedded dates and times
    let candidates = match fs::File::open(path)
        .and_then(|file| scan::scan_stream(file, opts.read_limit))
    {
        Ok(candidates) => candidates,
        Err(error) => {
            totals.errors += 1;
            return bare_detail(
                path_str,
                FileOutcome::ReadFailed,
                format!("ファイルの読み込みに失敗しました: {}", error),
            );
        }
    };

    let best = match scan::select_best(&candidates, opts.selection_policy) {
        Some(best) => best.clone(),
        None => {
            totals.no_data += 1;
            return bare_detail(
                path_str,
                FileOutcome::NoData,
                "日時情報が見つかりません".to_string(),
            );
        }
    };

    // the scanner only emits ISO-shaped strings, but a syntactically
    // valid string can still name an impossible date (month 13 etc)
    let naive = match best.to_naive() {
        Some(naive) => naive,
        None => {
            totals.errors += 1;
            return bare_detail(
                path_str,
                FileOutcome::ParseFailed,
                format!("抽出した日時を解釈できません: {}", best),
            );
        }
    };

    let adjusted = match adjust::apply_adjustment(naive, &opts.adjustment) {
        Some(adjusted) => adjusted,
        None => {
            totals.errors += 1;
            return bare_detail(
                path_str,
                FileOutcome::ParseFailed,
                format!("調整後の日時が有効な時刻になりません: {}", best),
            );
        }
    };
    if !opts.adjustment.is_zero() {
        tracing::debug!(
            found = best.as_str(),
            adjusted = %adjusted.format(adjust::DATE_TIME_FORMAT),
            "日時を調整"
        );
    }

    // the name prefix comes from the adjusted instant, before any
    // daylight saving compensation is applied for storage
    let prefix = if opts.rename_enabled {
        render_prefix(&opts.rename_template, &adjusted)
    } else {
        String::new()
    };
    let now_ms = Local::now().timestamp_millis();
    let target_ms = adjust::storage_write_millis(
        adjusted.timestamp_millis(),
        opts.dst_compensation,
        now_ms,
    );

    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(error) => {
            totals.errors += 1;
            return bare_detail(
                path_str,
                FileOutcome::ReadFailed,
                format!("ファイル情報の取得に失敗しました: {}", error),
            );
        }
    };
    let old_ms = metadata
        .modified()
        .map(system_time_millis)
        .unwrap_or_default();
    let read_only = metadata.permissions().readonly();
    let previous_datetime = adjust::format_millis(adjust::display_read_millis(
        old_ms,
        opts.dst_compensation,
        now_ms,
    ));
    let target_datetime = adjusted.format(adjust::DATE_TIME_FORMAT).to_string();

    // timestamp sub-outcome
    let (timestamp_outcome, timestamp_reason) = if !opts.apply_timestamp {
        (SubOutcome::NotRequested, None)
    } else if (target_ms - old_ms).abs() < opts.tolerance_ms {
        (SubOutcome::Correct, None)
    } else if read_only {
        (
            SubOutcome::Blocked,
            Some("読み取り専用のため日時を変更できません".to_string()),
        )
    } else {
        match mode {
            ApplyMode::Plan => (SubOutcome::WouldChange, None),
            ApplyMode::Simulate => (SubOutcome::Simulated, None),
            ApplyMode::Apply => match set_file_mtime(path, file_time_from_millis(target_ms)) {
                Ok(()) => (SubOutcome::Changed, None),
                Err(error) => (
                    SubOutcome::Failed,
                    Some(format!("日時の変更に失敗しました: {}", error)),
                ),
            },
        }
    };

    // rename sub-outcome; an already-matching prefix makes re-runs a
    // no-op, but an older prefix from a different configuration is left
    // in place and the new prefix goes in front of it
    let destination_name = format!("{}{}", prefix, file_name);
    let (rename_outcome, rename_reason) = if !opts.rename_enabled {
        (SubOutcome::NotRequested, None)
    } else if file_name.starts_with(&prefix) {
        (SubOutcome::Correct, None)
    } else if read_only {
        (
            SubOutcome::Blocked,
            Some("読み取り専用のため名前を変更できません".to_string()),
        )
    } else {
        match mode {
            ApplyMode::Plan => (SubOutcome::WouldChange, None),
            ApplyMode::Simulate => (SubOutcome::Simulated, None),
            ApplyMode::Apply => {
                let destination = path
                    .parent()
                    .map(|parent| parent.join(&destination_name))
                    .unwrap_or_else(|| Path::new(&destination_name).to_path_buf());
                if destination.exists() {
                    (
                        SubOutcome::Failed,
                        Some(format!(
                            "変更先の名前が既に存在します: {}",
                            destination_name
                        )),
                    )
                } else {
                    match fs::rename(path, &destination) {
                        Ok(()) => (SubOutcome::Changed, None),
                        Err(error) => (
                            SubOutcome::Failed,
                            Some(format!("名前の変更に失敗しました: {}", error)),
                        ),
                    }
                }
            }
        }
    };

    // one file counts at most once per counter, however many
    // sub-operations ran
    let any_changed =
        timestamp_outcome == SubOutcome::Changed || rename_outcome == SubOutcome::Changed;
    let any_correct =
        timestamp_outcome == SubOutcome::Correct || rename_outcome == SubOutcome::Correct;
    let any_failed = matches!(timestamp_outcome, SubOutcome::Blocked | SubOutcome::Failed)
        || matches!(rename_outcome, SubOutcome::Blocked | SubOutcome::Failed);
    if any_changed {
        totals.changed += 1;
    }
    if any_correct && !any_changed && !any_failed {
        totals.correct += 1;
    }
    if any_failed {
        totals.errors += 1;
    }

    RedateDetail {
        source_path: path_str,
        outcome: FileOutcome::Processed,
        reason: None,
        found_datetime: Some(best.as_str().to_string()),
        target_datetime: Some(target_datetime),
        previous_datetime: Some(previous_datetime),
        timestamp_outcome,
        timestamp_reason,
        rename_outcome,
        rename_reason,
        destination_name: if opts.rename_enabled {
            Some(destination_name)
        } else {
            None
        },
    }
}

fn system_time_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(duration) => i64::try_from(duration.as_millis()).unwrap_or(i64::MAX),
        Err(error) => -i64::try_from(error.duration().as_millis()).unwrap_or(i64::MAX),
    }
}

fn file_time_from_millis(millis: i64) -> FileTime {
    let seconds = millis.div_euclid(1000);
    let nanos = (millis.rem_euclid(1000) as u32) * 1_000_000;
    FileTime::from_unix_time(seconds, nanos)
}

/// Render the date and time prefix for a file name.
pub fn render_prefix(template: &str, instant: &DateTime<Local>) -> String {
    instant.format(&convert_datetime_format(template)).to_string()
}

fn convert_datetime_format(value: &str) -> String {
    value
        .replace("YYYY", "%Y")
        .replace("MM", "%m")
        .replace("DD", "%d")
        .replace("HH", "%H")
        .replace("mm", "%M")
        .replace("ss", "%S")
}

/// Reject templates chrono cannot format and templates whose rendered
/// prefix could not be part of a file name.
pub fn validate_template(template: &str) -> Result<(), AppError> {
    use chrono::format::{Item, StrftimeItems};

    let converted = convert_datetime_format(template);
    if StrftimeItems::new(&converted).any(|item| matches!(item, Item::Error)) {
        return Err(AppError::InvalidRequest(
            "リネーム書式を解釈できません".to_string(),
        ));
    }

    // render a fixed sample; the offending characters are the same for
    // any instant
    let sample = Local::now();
    let rendered = sample.format(&converted).to_string();
    if rendered.chars().any(|ch| INVALID_NAME_CHARS.contains(&ch)) {
        return Err(AppError::InvalidRequest(
            "リネーム書式にファイル名で使用できない文字が含まれています".to_string(),
        ));
    }
    if rendered.starts_with('.') || rendered.starts_with(' ') {
        return Err(AppError::InvalidRequest(
            "リネーム書式の先頭に . や空白は使用できません".to_string(),
        ));
    }
    Ok(())
}
