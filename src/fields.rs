//! Sub-field accessors over a decoded record
//!
//! Most top-level values are themselves delimiter-packed. Each accessor looks
//! up one vendor field id, re-splits its value and picks a positional slot.
//! Numbers used in arithmetic are read leniently: anything unparsable is zero.

use chrono::{Local, TimeZone};
use std::fmt;

use crate::decoder::discover_separator;
use crate::error::FieldError;
use crate::types::{OrderedRecord, ENCRYPTED, RAW};

/// Placeholder shown for absent values
pub const UNKNOWN: &str = "<unknown>";

/// Page URL
pub const URL: &str = "-112";
/// Device/browser descriptor, `,`-packed
pub const DEVICE: &str = "-100";
/// Fingerprint descriptor, `;`-packed
pub const FINGERPRINT: &str = "-70";
/// Browser timing and canvas block, `,`-packed
pub const TIMING: &str = "-115";
/// WebGL descriptor
pub const WEBGL: &str = "-129";
/// JS heap figures, `,`-packed
pub const JS_HEAP: &str = "-131";
/// Pointer event stream
pub const POINTER: &str = "-110";
/// Touch event stream
pub const TOUCH: &str = "-117";
/// Keyboard event stream
pub const KEYBOARD: &str = "-108";

/// Slot `index` of `value` split on `delimiter`
fn slot<'a>(
    field: &str,
    value: &'a str,
    delimiter: &str,
    index: usize,
) -> Result<&'a str, FieldError> {
    value
        .split(delimiter)
        .nth(index)
        .ok_or_else(|| FieldError::MissingSubField {
            field: field.to_string(),
            slot: index,
        })
}

fn field_slot<'a>(
    record: &'a OrderedRecord,
    field: &str,
    delimiter: &str,
    index: usize,
) -> Result<&'a str, FieldError> {
    slot(field, record.text(field)?, delimiter, index)
}

/// Integer parse that treats malformed input as zero
pub fn lenient_int(value: &str) -> i64 {
    value.parse().unwrap_or(0)
}

/// Group the digits of `n` by thousands with `,`
pub fn format_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

// Framing tokens: "<version>;<key1>;<key2>;<build>,<init>,<id>,<shuffle>,<encrypt>;<body>"

fn framing_token(record: &OrderedRecord, index: usize) -> Result<String, FieldError> {
    let encrypted = String::from_utf8_lossy(record.bytes(ENCRYPTED)?);
    slot(ENCRYPTED, &encrypted, ";", index).map(str::to_string)
}

fn framing_time(record: &OrderedRecord, index: usize) -> Result<String, FieldError> {
    let times = framing_token(record, 3)?;
    slot(ENCRYPTED, &times, ",", index).map(str::to_string)
}

pub fn encryption_key(record: &OrderedRecord) -> Result<String, FieldError> {
    framing_token(record, 1)
}

pub fn shuffling_key(record: &OrderedRecord) -> Result<String, FieldError> {
    framing_token(record, 2)
}

pub fn sensor_build_time(record: &OrderedRecord) -> Result<String, FieldError> {
    framing_time(record, 0)
}

pub fn script_init_time(record: &OrderedRecord) -> Result<String, FieldError> {
    framing_time(record, 1)
}

pub fn sensor_id_time(record: &OrderedRecord) -> Result<String, FieldError> {
    framing_time(record, 2)
}

pub fn shuffling_time(record: &OrderedRecord) -> Result<String, FieldError> {
    framing_time(record, 3)
}

pub fn encryption_time(record: &OrderedRecord) -> Result<String, FieldError> {
    framing_time(record, 4)
}

/// Separator recovered from the decrypted bytes
pub fn sensor_separator(record: &OrderedRecord) -> Result<String, FieldError> {
    discover_separator(record.bytes(RAW)?).map_err(|_| FieldError::MissingSubField {
        field: RAW.to_string(),
        slot: 0,
    })
}

pub fn url(record: &OrderedRecord) -> Result<String, FieldError> {
    record.text(URL).map(str::to_string)
}

fn device_slot(record: &OrderedRecord, index: usize) -> Result<String, FieldError> {
    field_slot(record, DEVICE, ",", index).map(str::to_string)
}

pub fn user_agent(record: &OrderedRecord) -> Result<String, FieldError> {
    device_slot(record, 0)
}

pub fn lang(record: &OrderedRecord) -> Result<String, FieldError> {
    device_slot(record, 4)
}

pub fn screen_width(record: &OrderedRecord) -> Result<String, FieldError> {
    device_slot(record, 12)
}

pub fn screen_height(record: &OrderedRecord) -> Result<String, FieldError> {
    device_slot(record, 13)
}

pub fn available_width(record: &OrderedRecord) -> Result<String, FieldError> {
    device_slot(record, 14)
}

pub fn available_height(record: &OrderedRecord) -> Result<String, FieldError> {
    device_slot(record, 15)
}

pub fn inner_width(record: &OrderedRecord) -> Result<String, FieldError> {
    device_slot(record, 16)
}

pub fn inner_height(record: &OrderedRecord) -> Result<String, FieldError> {
    device_slot(record, 17)
}

pub fn outer_width(record: &OrderedRecord) -> Result<String, FieldError> {
    device_slot(record, 18)
}

/// Start of the session in milliseconds.
///
/// The device descriptor stores half the epoch in the slot right before the
/// first `loc:` slot.
pub fn start_timestamp_ms(record: &OrderedRecord) -> Result<i64, FieldError> {
    let device = record.text(DEVICE)?;
    let slots: Vec<&str> = device.split(',').collect();
    let loc = slots
        .iter()
        .position(|s| s.starts_with("loc:"))
        .filter(|&i| i > 0)
        .ok_or_else(|| FieldError::MissingSubField {
            field: DEVICE.to_string(),
            slot: slots.len(),
        })?;
    let half: f64 = slots[loc - 1].parse().unwrap_or(0.0);
    Ok((half * 2.0).round() as i64)
}

/// RFC 1123 rendering with a numeric zone, e.g. `Mon, 02 Jan 2006 15:04:05 -0700`
pub fn format_timestamp<Tz>(ms: i64, tz: &Tz) -> Option<String>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    tz.timestamp_millis_opt(ms)
        .single()
        .map(|t| t.format("%a, %d %b %Y %H:%M:%S %z").to_string())
}

pub fn start_timestamp(record: &OrderedRecord) -> Result<String, FieldError> {
    let ms = start_timestamp_ms(record)?;
    format_timestamp(ms, &Local).ok_or_else(|| FieldError::MissingSubField {
        field: DEVICE.to_string(),
        slot: 0,
    })
}

pub fn fp_val_str(record: &OrderedRecord) -> Result<String, FieldError> {
    field_slot(record, FINGERPRINT, ";", 0).map(str::to_string)
}

pub fn do_not_track(record: &OrderedRecord) -> Result<String, FieldError> {
    let fingerprint = record.text(FINGERPRINT)?;
    Ok(fingerprint.rsplit(';').next().unwrap_or_default().to_string())
}

/// Minutes offset rendered as `UTC±HH:MM`
pub fn format_utc_offset(minutes: i64) -> String {
    let sign = if minutes < 0 { '-' } else { '+' };
    let minutes = minutes.unsigned_abs();
    format!("UTC{}{:02}:{:02}", sign, minutes / 60, minutes % 60)
}

pub fn timezone_offset(record: &OrderedRecord) -> Result<String, FieldError> {
    let raw = field_slot(record, FINGERPRINT, ";", 7)?;
    Ok(format_utc_offset(lenient_int(raw)))
}

pub fn rcfp(record: &OrderedRecord) -> Result<String, FieldError> {
    field_slot(record, TIMING, ",", 22).map(str::to_string)
}

pub fn r_value(record: &OrderedRecord) -> Result<String, FieldError> {
    field_slot(record, TIMING, ",", 23).map(str::to_string)
}

pub fn bpd_delta(record: &OrderedRecord) -> Result<String, FieldError> {
    let dt1 = lenient_int(field_slot(record, TIMING, ",", 7)?);
    let dt2 = lenient_int(field_slot(record, TIMING, ",", 17)?);
    Ok(format!(
        "dt 1 : {} ms, dt 2 : {} ms, difference : {} ms",
        dt1,
        dt2,
        dt2.saturating_sub(dt1)
    ))
}

fn heap_figure(record: &OrderedRecord, index: usize) -> Result<i64, FieldError> {
    field_slot(record, JS_HEAP, ",", index).map(lenient_int)
}

pub fn js_heap_limit(record: &OrderedRecord) -> Result<String, FieldError> {
    Ok(format_thousands(heap_figure(record, 0)?))
}

pub fn js_heap_total(record: &OrderedRecord) -> Result<String, FieldError> {
    let limit = heap_figure(record, 0)?;
    let total = heap_figure(record, 1)?;
    Ok(format!(
        "{} (limit-total = {})",
        format_thousands(total),
        format_thousands(limit.saturating_sub(total))
    ))
}

pub fn js_heap_used(record: &OrderedRecord) -> Result<String, FieldError> {
    let total = heap_figure(record, 1)?;
    let used = heap_figure(record, 2)?;
    Ok(format!(
        "{} (total-used = {})",
        format_thousands(used),
        format_thousands(total.saturating_sub(used))
    ))
}

pub fn lang_length(record: &OrderedRecord) -> Result<String, FieldError> {
    Ok(field_slot(record, JS_HEAP, ",", 4).unwrap_or(UNKNOWN).to_string())
}

pub fn lang_hash(record: &OrderedRecord) -> Result<String, FieldError> {
    Ok(field_slot(record, WEBGL, ",", 2).unwrap_or(UNKNOWN).to_string())
}

pub fn webgl_vendor(record: &OrderedRecord) -> Result<String, FieldError> {
    let Ok(webgl) = record.text(WEBGL) else {
        return Ok(UNKNOWN.to_string());
    };
    let head = webgl.split(";wl3").next().unwrap_or_default();
    let slots: Vec<&str> = head.split(',').collect();
    match slots.as_slice() {
        [_, .., last] => Ok(last.to_string()),
        _ => Ok(UNKNOWN.to_string()),
    }
}

pub fn webgl_renderer(record: &OrderedRecord) -> Result<String, FieldError> {
    let Ok(webgl) = record.text(WEBGL) else {
        return Ok(UNKNOWN.to_string());
    };
    let head = webgl.split(";wl4").next().unwrap_or_default();
    match head.split(",ANGLE (").nth(1) {
        Some(tail) => Ok(format!("ANGLE ({}", tail)),
        None => Ok(UNKNOWN.to_string()),
    }
}
