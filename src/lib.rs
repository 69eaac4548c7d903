//! Fix file modification dates and file names for JPEG photo files,
//! using an embedded date and time found near the start of most JPEG
//! files. The contents of the files are never changed.
//!
//! The oldest date in a JPEG file is usually the original capture date;
//! a newer one is often from editing. There is no undo: once a date or
//! name has been changed, the only way back is to change it again. The
//! dry-run mode reports every decision without touching the disk.

pub mod adjust;
pub mod error;
pub mod file_collect;
pub mod model;
pub mod redate;
pub mod scan;
pub mod settings;

pub use error::AppError;
pub use model::{
    AdjustmentSpec, AppSettings, DstCompensation, FileOutcome, OperationProgressEvent,
    RedateDetail, RedateExecuteResponse, RedatePreviewResponse, RedateRequest, RunTotals,
    SelectionPolicy, SubOutcome,
};
pub use redate::{execute, preview};

use std::sync::atomic::{AtomicBool, Ordering};

/// Run the correction pass with a shared cancellation flag, for callers
/// that drive the pass from a worker thread and flip the flag from a
/// controller. The flag is read with SeqCst ordering so a store from
/// another thread is seen at the next file boundary.
pub fn execute_with_flag<FProgress>(
    request: &RedateRequest,
    cancel_requested: &AtomicBool,
    report_progress: FProgress,
) -> Result<RedateExecuteResponse, AppError>
where
    FProgress: FnMut(OperationProgressEvent),
{
    redate::execute(
        request,
        || cancel_requested.load(Ordering::SeqCst),
        report_progress,
    )
}
