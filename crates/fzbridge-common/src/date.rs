use chrono::{Duration as ChronoDur, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/* ───────────────────── Serial date utilities ─────────────────────────
The host stores date/times as fractional day counts:
  Serial 1  = 1900-01-01
  Serial 60 = 1900-02-29  (phantom day kept for compatibility)
  Serial 61 = 1900-03-01
Time of day is the fractional part. No timezone.
------------------------------------------------------------------- */

const SERIAL_EPOCH: NaiveDate = NaiveDate::from_ymd_opt(1899, 12, 31).unwrap();
const PHANTOM_CUTOFF: NaiveDate = NaiveDate::from_ymd_opt(1900, 3, 1).unwrap();

pub fn datetime_to_serial(dt: &NaiveDateTime) -> f64 {
    let days = (dt.date() - SERIAL_EPOCH).num_days();
    let serial_days = if dt.date() >= PHANTOM_CUTOFF {
        days + 1
    } else {
        days
    };

    let secs_in_day = dt.time().num_seconds_from_midnight() as f64;
    serial_days as f64 + secs_in_day / 86_400.0
}

/// Inverse of [`datetime_to_serial`]; `None` for non-finite or negative
/// serials and for serials beyond chrono's range.
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 || serial > 2_958_465.0 {
        return None;
    }
    let days = serial.trunc() as i64;
    let frac_secs = (serial.fract() * 86_400.0).round() as i64;

    // serial 60 has no real date; collapse it onto 1900-02-28
    let date = if days == 60 {
        NaiveDate::from_ymd_opt(1900, 2, 28)?
    } else {
        let offset = if days < 60 { days } else { days - 1 };
        SERIAL_EPOCH.checked_add_signed(ChronoDur::days(offset))?
    };

    let (date, secs) = if frac_secs >= 86_400 {
        (date.succ_opt()?, frac_secs - 86_400)
    } else {
        (date, frac_secs)
    };
    let time = NaiveTime::from_num_seconds_from_midnight_opt(secs as u32, 0)?;
    Some(date.and_time(time))
}
