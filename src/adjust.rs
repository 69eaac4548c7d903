use crate::model::{AdjustmentSpec, DstCompensation};
use chrono::{DateTime, Days, Duration, Local, LocalResult, Months, NaiveDateTime, TimeZone};

/// Standard date and time format shown to the user.
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Resolve a wall-clock date and time in the local zone. An ambiguous
/// time (clocks set back) takes the earlier mapping; a nonexistent time
/// (clocks set forward) yields None.
pub fn resolve_local(naive: NaiveDateTime) -> Option<DateTime<Local>> {
    Local
        .from_local_datetime(&naive)
        .single()
        .or_else(|| Local.from_local_datetime(&naive).earliest())
}

fn shift_months(naive: NaiveDateTime, months: i64) -> Option<NaiveDateTime> {
    if months >= 0 {
        naive.checked_add_months(Months::new(u32::try_from(months).ok()?))
    } else {
        naive.checked_sub_months(Months::new(u32::try_from(-months).ok()?))
    }
}

fn shift_days(naive: NaiveDateTime, days: i64) -> Option<NaiveDateTime> {
    if days >= 0 {
        naive.checked_add_days(Days::new(u64::try_from(days).ok()?))
    } else {
        naive.checked_sub_days(Days::new(u64::try_from(-days).ok()?))
    }
}

/// Apply the six adjustment fields in fixed order, each step normalizing
/// before the next. Year, month and day shifts are calendar operations
/// that keep the wall-clock time (an overflowing day-of-month clamps to
/// the month end); hour, minute and second shifts are exact durations on
/// the resolved instant, so a shift across a clock change does not pick
/// up an extra hour.
pub fn apply_adjustment(
    found: NaiveDateTime,
    spec: &AdjustmentSpec,
) -> Option<DateTime<Local>> {
    let mut naive = shift_months(found, i64::from(spec.years) * 12)?;
    naive = shift_months(naive, i64::from(spec.months))?;
    naive = shift_days(naive, i64::from(spec.days))?;
    let mut local = resolve_local(naive)?;
    local = local.checked_add_signed(Duration::hours(i64::from(spec.hours)))?;
    local = local.checked_add_signed(Duration::minutes(i64::from(spec.minutes)))?;
    local = local.checked_add_signed(Duration::seconds(i64::from(spec.seconds)))?;
    Some(local)
}

/// UTC offset (milliseconds) of the local zone at the given instant.
fn utc_offset_ms(instant_ms: i64) -> i64 {
    match Local.timestamp_millis_opt(instant_ms) {
        LocalResult::Single(dt) => i64::from(dt.offset().local_minus_utc()) * 1000,
        _ => 0,
    }
}

/// The storage layer on the affected platforms applies the daylight
/// saving rule in force at the moment of the call, not the rule for the
/// target instant. Shift the value we hand over so the stored result
/// lands on the intended instant.
pub fn storage_write_millis(target_ms: i64, comp: DstCompensation, now_ms: i64) -> i64 {
    if comp.is_active() {
        target_ms + utc_offset_ms(target_ms) - utc_offset_ms(now_ms)
    } else {
        target_ms
    }
}

/// Reverse correction for reading a stored timestamp back, so a stored
/// instant displays the same string no matter which daylight saving
/// period "now" falls in.
pub fn display_read_millis(stored_ms: i64, comp: DstCompensation, now_ms: i64) -> i64 {
    if comp.is_active() {
        stored_ms - utc_offset_ms(stored_ms) + utc_offset_ms(now_ms)
    } else {
        stored_ms
    }
}

/// Format an instant for the user, local zone.
pub fn format_millis(instant_ms: i64) -> String {
    match Local.timestamp_millis_opt(instant_ms) {
        LocalResult::Single(dt) => dt.format(DATE_TIME_FORMAT).to_string(),
        _ => format!("({} ms)", instant_ms),
    }
}
