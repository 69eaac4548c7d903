use serde::{Deserialize, Serialize};

/// Fuzz when comparing file timestamps. FAT16/FAT32 directories store
/// modification times with 2-second granularity, so smaller differences
/// must read as already correct.
pub const DEFAULT_TOLERANCE_MS: i64 = 2000;

/// Cap on bytes read per file. Camera originals keep their datetime
/// strings within the first 1 KB, edited files within the first 8 KB.
pub const DEFAULT_READ_LIMIT: u64 = 0x10000;

/// Date and time prefix used when renaming files, unless overridden.
pub const DEFAULT_RENAME_TEMPLATE: &str = "YYYY-MM-DD HH-mm-ss ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectionPolicy {
    Oldest,
    Newest,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdjustmentSpec {
    pub years: i32,
    pub months: i32,
    pub days: i32,
    pub hours: i32,
    pub minutes: i32,
    pub seconds: i32,
}

impl AdjustmentSpec {
    pub fn is_zero(&self) -> bool {
        self.years == 0
            && self.months == 0
            && self.days == 0
            && self.hours == 0
            && self.minutes == 0
            && self.seconds == 0
    }

    pub fn validate(&self) -> Result<(), String> {
        check_range("年", self.years, 99)?;
        check_range("月", self.months, 999)?;
        check_range("日", self.days, 9_999)?;
        check_range("時", self.hours, 99_999)?;
        check_range("分", self.minutes, 999_999)?;
        check_range("秒", self.seconds, 9_999_999)?;
        Ok(())
    }
}

fn check_range(label: &str, value: i32, limit: i32) -> Result<(), String> {
    if value < -limit || value > limit {
        return Err(format!(
            "{}の調整値は -{}〜{} の範囲で指定してください",
            label, limit, limit
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DstCompensation {
    /// Compensate only on the platform family with the defect (Windows).
    #[default]
    Auto,
    Always,
    Never,
}

impl DstCompensation {
    pub fn is_active(&self) -> bool {
        match self {
            DstCompensation::Auto => cfg!(windows),
            DstCompensation::Always => true,
            DstCompensation::Never => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedateRequest {
    pub input_paths: Vec<String>,
    pub include_subfolders: bool,
    #[serde(default)]
    pub include_hidden: bool,
    pub selection_policy: SelectionPolicy,
    #[serde(default)]
    pub adjustment: AdjustmentSpec,
    pub apply_timestamp: bool,
    pub apply_rename: bool,
    pub rename_template: String,
    #[serde(default)]
    pub dry_run: bool,
    pub tolerance_ms: Option<i64>,
    pub read_limit: Option<u64>,
    pub dst_compensation: Option<DstCompensation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubOutcome {
    NotRequested,
    Correct,
    WouldChange,
    Simulated,
    Changed,
    Blocked,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileOutcome {
    Processed,
    NoData,
    ReadFailed,
    ParseFailed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedateDetail {
    pub source_path: String,
    pub outcome: FileOutcome,
    pub reason: Option<String>,
    pub found_datetime: Option<String>,
    pub target_datetime: Option<String>,
    pub previous_datetime: Option<String>,
    pub timestamp_outcome: SubOutcome,
    pub timestamp_reason: Option<String>,
    pub rename_outcome: SubOutcome,
    pub rename_reason: Option<String>,
    pub destination_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTotals {
    pub files: u64,
    pub folders: u64,
    pub correct: u64,
    pub changed: u64,
    pub errors: u64,
    pub no_data: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedatePreviewResponse {
    pub items: Vec<RedateDetail>,
    pub total: usize,
    pub would_change: usize,
    pub correct: usize,
    pub no_data: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedateExecuteResponse {
    pub details: Vec<RedateDetail>,
    pub totals: RunTotals,
    pub canceled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationProgressEvent {
    pub operation: String,
    pub processed: usize,
    pub total: usize,
    pub totals: RunTotals,
    pub current_path: Option<String>,
    pub done: bool,
    pub canceled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub selection_policy: SelectionPolicy,
    pub adjustment: AdjustmentSpec,
    pub apply_timestamp: bool,
    pub apply_rename: bool,
    pub rename_template: String,
    pub dst_compensation: DstCompensation,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            selection_policy: SelectionPolicy::Oldest,
            adjustment: AdjustmentSpec::default(),
            apply_timestamp: true,
            apply_rename: false,
            rename_template: DEFAULT_RENAME_TEMPLATE.to_string(),
            dst_compensation: DstCompensation::Auto,
        }
    }
}
