//! Input event stream analytics
//!
//! Pointer, touch and keyboard activity is packed as `;`-separated events,
//! each a `,`-separated tuple `counter,type,timestamp[,x,y,...]`. Streams are
//! re-parsed on every query and scanned left to right against the previous
//! event, starting from a zero origin.

use crate::error::FieldError;
use crate::fields::{lenient_int, KEYBOARD, POINTER, TOUCH};
use crate::render::{paint, LeafContext, CYAN, GREEN, YELLOW};
use crate::types::OrderedRecord;

/// Upper bound for deltas entering the max statistic, for every stream
const MAX_DELTA_THRESHOLD_MS: i64 = 30;

const NO_ACCELERATION: &str = "no acceleration";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Pointer,
    Touch,
    Keyboard,
}

/// Meaning of an event's type code within its stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Move,
    Click,
    Down,
    Up,
    KeyDown,
    KeyUp,
    KeyPress,
}

impl EventKind {
    pub fn name(self) -> &'static str {
        match self {
            EventKind::Move => "move",
            EventKind::Click => "click",
            EventKind::Down => "down",
            EventKind::Up => "up",
            EventKind::KeyDown => "keydown",
            EventKind::KeyUp => "keyup",
            EventKind::KeyPress => "keypress",
        }
    }

    pub fn color(self) -> Option<&'static str> {
        match self {
            EventKind::Move | EventKind::KeyPress => None,
            EventKind::Click => Some(GREEN),
            EventKind::Down | EventKind::KeyDown => Some(CYAN),
            EventKind::Up | EventKind::KeyUp => Some(YELLOW),
        }
    }

    fn paint(self, text: &str) -> String {
        match self.color() {
            Some(color) => paint(color, text),
            None => text.to_string(),
        }
    }
}

impl StreamKind {
    pub fn field_id(self) -> &'static str {
        match self {
            StreamKind::Pointer => POINTER,
            StreamKind::Touch => TOUCH,
            StreamKind::Keyboard => KEYBOARD,
        }
    }

    /// Text shown instead of statistics when the stream holds no event
    pub fn no_activity(self) -> &'static str {
        match self {
            StreamKind::Pointer => "no mouse movement",
            StreamKind::Touch => "no touch activity",
            StreamKind::Keyboard => "no keyboard activity",
        }
    }

    /// Upper bound (exclusive) for deltas entering the average.
    ///
    /// Keyboard uses 1000 ms here while its max statistic stays bounded by
    /// 30 ms like the other streams.
    pub fn average_threshold_ms(self) -> i64 {
        match self {
            StreamKind::Keyboard => 1000,
            StreamKind::Pointer | StreamKind::Touch => 30,
        }
    }

    pub fn max_threshold_ms(self) -> i64 {
        MAX_DELTA_THRESHOLD_MS
    }

    pub fn has_coordinates(self) -> bool {
        !matches!(self, StreamKind::Keyboard)
    }

    /// Event kind for a type code; `None` means the event is left out of lists
    pub fn classify(self, code: char) -> Option<EventKind> {
        match (self, code) {
            (StreamKind::Pointer, '2') => Some(EventKind::Click),
            (StreamKind::Pointer, '3') => Some(EventKind::Down),
            (StreamKind::Pointer, '4') => Some(EventKind::Up),
            (StreamKind::Pointer, _) => Some(EventKind::Move),
            (StreamKind::Touch, '2') => Some(EventKind::Down),
            (StreamKind::Touch, '3') => Some(EventKind::Up),
            (StreamKind::Touch, _) => Some(EventKind::Move),
            (StreamKind::Keyboard, '1') => Some(EventKind::KeyDown),
            (StreamKind::Keyboard, '2') => Some(EventKind::KeyUp),
            (StreamKind::Keyboard, '3') => Some(EventKind::KeyPress),
            (StreamKind::Keyboard, _) => None,
        }
    }

    fn legend_kinds(self) -> &'static [EventKind] {
        match self {
            StreamKind::Pointer => &[
                EventKind::Move,
                EventKind::Click,
                EventKind::Down,
                EventKind::Up,
            ],
            StreamKind::Touch => &[EventKind::Move, EventKind::Down, EventKind::Up],
            StreamKind::Keyboard => &[EventKind::KeyDown, EventKind::KeyPress, EventKind::KeyUp],
        }
    }

    /// Color key printed ahead of a list, as (plain, painted)
    pub fn legend(self) -> (String, String) {
        let kinds = self.legend_kinds();
        let plain: Vec<&str> = kinds.iter().map(|k| k.name()).collect();
        let painted: Vec<String> = kinds.iter().map(|k| k.paint(k.name())).collect();
        (
            format!("what's type : {} | ", plain.join(", ")),
            format!("what's type : {} | ", painted.join(", ")),
        )
    }
}

/// One recorded input action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventTuple {
    pub counter: i64,
    pub code: char,
    pub timestamp: i64,
    pub x: Option<i64>,
    pub y: Option<i64>,
}

impl EventTuple {
    fn position(&self) -> (i64, i64) {
        (self.x.unwrap_or(0), self.y.unwrap_or(0))
    }
}

/// Difference between an event and its predecessor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub event: EventTuple,
    pub counter: i64,
    pub time: i64,
    pub x: i64,
    pub y: i64,
}

impl Step {
    pub fn distance(&self) -> f64 {
        (self.x as f64).hypot(self.y as f64)
    }
}

fn parse_event(kind: StreamKind, entry: &str) -> Result<EventTuple, FieldError> {
    let parts: Vec<&str> = entry.split(',').collect();
    let required = if kind.has_coordinates() { 5 } else { 3 };
    if parts.len() < required {
        return Err(FieldError::MissingSubField {
            field: kind.field_id().to_string(),
            slot: parts.len(),
        });
    }
    let code = parts[1].chars().next().ok_or_else(|| FieldError::MissingSubField {
        field: kind.field_id().to_string(),
        slot: 1,
    })?;

    Ok(EventTuple {
        counter: lenient_int(parts[0]),
        code,
        timestamp: lenient_int(parts[2]),
        x: kind.has_coordinates().then(|| lenient_int(parts[3])),
        y: kind.has_coordinates().then(|| lenient_int(parts[4])),
    })
}

/// Parse the packed stream field of `kind`
pub fn parse_events(
    kind: StreamKind,
    record: &OrderedRecord,
) -> Result<Vec<EventTuple>, FieldError> {
    record
        .text(kind.field_id())?
        .split(';')
        .filter(|entry| !entry.is_empty())
        .map(|entry| parse_event(kind, entry))
        .collect()
}

/// Consecutive differences, the first one taken against a zero origin.
///
/// Differences saturate at the `i64` bounds.
pub fn steps(events: &[EventTuple]) -> Vec<Step> {
    let mut previous = EventTuple::default();
    events
        .iter()
        .map(|event| {
            let (x, y) = event.position();
            let (px, py) = previous.position();
            let step = Step {
                event: *event,
                counter: event.counter.saturating_sub(previous.counter),
                time: event.timestamp.saturating_sub(previous.timestamp),
                x: x.saturating_sub(px),
                y: y.saturating_sub(py),
            };
            previous = *event;
            step
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaStats {
    pub average: i64,
    pub min: i64,
    pub max: i64,
}

/// Delta-time statistics, `None` for an empty stream.
///
/// Average and max only use deltas in `(0, threshold)`; min uses every
/// positive delta.
pub fn delta_stats(kind: StreamKind, events: &[EventTuple]) -> Option<DeltaStats> {
    if events.is_empty() {
        return None;
    }

    let mut sum = 0;
    let mut count = 0;
    let mut min: Option<i64> = None;
    let mut max = 0;

    for step in steps(events) {
        let dt = step.time;
        if dt <= 0 {
            continue;
        }
        if dt < kind.average_threshold_ms() {
            sum += dt;
            count += 1;
        }
        if dt < kind.max_threshold_ms() && dt > max {
            max = dt;
        }
        min = Some(min.map_or(dt, |m| m.min(dt)));
    }

    Some(DeltaStats {
        average: if count > 0 { sum / count } else { 0 },
        min: min.unwrap_or(0),
        max,
    })
}

/// Acceleration over each window of three consecutive events
pub fn accelerations(events: &[EventTuple]) -> Vec<f64> {
    events
        .windows(3)
        .map(|w| {
            let elapsed = |a: &EventTuple, b: &EventTuple| b.timestamp as f64 - a.timestamp as f64;
            let speed = |a: &EventTuple, b: &EventTuple| {
                let (ax, ay) = a.position();
                let (bx, by) = b.position();
                (bx as f64 - ax as f64).hypot(by as f64 - ay as f64) / elapsed(a, b)
            };
            let v1 = speed(&w[0], &w[1]);
            let v2 = speed(&w[1], &w[2]);
            (v2 - v1) / elapsed(&w[0], &w[2])
        })
        .collect()
}

/// Two decimals; non-finite values spelled `+Inf`, `-Inf`, `NaN`
pub fn format_rate(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        let sign = if value > 0.0 { '+' } else { '-' };
        format!("{}Inf", sign)
    } else {
        format!("{:.2}", value)
    }
}

pub fn delta_time_summary(kind: StreamKind, record: &OrderedRecord) -> Result<String, FieldError> {
    let events = parse_events(kind, record)?;
    Ok(match delta_stats(kind, &events) {
        Some(s) => format!(
            "average: {} ms, min: {} ms, max: {} ms",
            s.average, s.min, s.max
        ),
        None => kind.no_activity().to_string(),
    })
}

/// Shared list renderer: legend, then one token per classified step
fn step_list(
    kind: StreamKind,
    ctx: &LeafContext<'_>,
    token: impl Fn(&Step) -> String,
) -> Result<String, FieldError> {
    let events = parse_events(kind, ctx.record)?;
    if events.is_empty() {
        return Ok(kind.no_activity().to_string());
    }

    let mut out = ctx.wrapper();
    let (plain, painted) = kind.legend();
    out.text(&plain, &painted);
    for step in steps(&events) {
        let Some(event_kind) = kind.classify(step.event.code) else {
            continue;
        };
        let text = token(&step);
        out.token(&text, &event_kind.paint(&text));
    }
    Ok(out.finish())
}

pub fn delta_time_list(kind: StreamKind, ctx: &LeafContext<'_>) -> Result<String, FieldError> {
    step_list(kind, ctx, |s| s.time.to_string())
}

pub fn delta_position_list(kind: StreamKind, ctx: &LeafContext<'_>) -> Result<String, FieldError> {
    step_list(kind, ctx, |s| format!("({}, {})", s.x, s.y))
}

pub fn delta_time_position_list(
    kind: StreamKind,
    ctx: &LeafContext<'_>,
) -> Result<String, FieldError> {
    step_list(kind, ctx, |s| format!("({}: {}, {})", s.time, s.x, s.y))
}

/// `sqrt(dx² + dy²) / dt` per step
pub fn velocity_list(kind: StreamKind, ctx: &LeafContext<'_>) -> Result<String, FieldError> {
    step_list(kind, ctx, |s| format_rate(s.distance() / s.time as f64))
}

/// `sqrt(dcounter) / dt` per step, from the event counter rather than coordinates
pub fn movement_ratio_list(kind: StreamKind, ctx: &LeafContext<'_>) -> Result<String, FieldError> {
    step_list(kind, ctx, |s| {
        format_rate((s.counter as f64).sqrt() / s.time as f64)
    })
}

pub fn acceleration_list(kind: StreamKind, ctx: &LeafContext<'_>) -> Result<String, FieldError> {
    let events = parse_events(kind, ctx.record)?;
    if events.is_empty() {
        return Ok(kind.no_activity().to_string());
    }
    let values = accelerations(&events);
    if values.is_empty() {
        return Ok(NO_ACCELERATION.to_string());
    }

    let mut out = ctx.wrapper();
    for value in values {
        let text = format_rate(value);
        out.token(&text, &text);
    }
    Ok(out.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::strip_ansi;
    use crate::types::FieldValue;
    use pretty_assertions::assert_eq;

    fn record_with(kind: StreamKind, packed: &str) -> OrderedRecord {
        let mut record = OrderedRecord::new();
        record.push(kind.field_id(), FieldValue::Text(packed.to_string()));
        record
    }

    fn ctx<'a>(record: &'a OrderedRecord, width: usize) -> LeafContext<'a> {
        LeafContext {
            record,
            label: "list",
            available_width: width,
            indent: "",
            label_width: 2,
        }
    }

    fn pointer(packed: &str) -> Vec<EventTuple> {
        parse_events(StreamKind::Pointer, &record_with(StreamKind::Pointer, packed)).unwrap()
    }

    #[test]
    fn test_parse_pointer_events() {
        let events = pointer("0,1,100,10,20,-1;1,3,130,12,25,0;");
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            EventTuple {
                counter: 1,
                code: '3',
                timestamp: 130,
                x: Some(12),
                y: Some(25),
            }
        );
    }

    #[test]
    fn test_parse_keyboard_has_no_coordinates() {
        let record = record_with(StreamKind::Keyboard, "2,1,5000,-2,0;");
        let events = parse_events(StreamKind::Keyboard, &record).unwrap();
        assert_eq!(events[0].x, None);
        assert_eq!(events[0].timestamp, 5000);
    }

    #[test]
    fn test_parse_short_event_is_missing_sub_field() {
        let record = record_with(StreamKind::Touch, "0,2,100;");
        assert!(matches!(
            parse_events(StreamKind::Touch, &record),
            Err(FieldError::MissingSubField { slot: 3, .. })
        ));
    }

    #[test]
    fn test_delta_filtering() {
        let events = pointer("0,1,0,0,0;1,1,10,0,0;2,1,50,0,0;3,1,55,0,0");
        let deltas: Vec<i64> = steps(&events).iter().map(|s| s.time).collect();
        assert_eq!(deltas, vec![0, 10, 40, 5]);

        let stats = delta_stats(StreamKind::Pointer, &events).unwrap();
        assert_eq!(stats, DeltaStats { average: 7, min: 5, max: 10 });
    }

    #[test]
    fn test_keyboard_thresholds_differ_for_average_and_max() {
        let record = record_with(StreamKind::Keyboard, "0,1,0;1,2,10;2,1,510;3,2,530");
        let events = parse_events(StreamKind::Keyboard, &record).unwrap();
        let stats = delta_stats(StreamKind::Keyboard, &events).unwrap();

        // 500 ms enters the average but not the max
        assert_eq!(stats, DeltaStats { average: 176, min: 10, max: 20 });
    }

    #[test]
    fn test_empty_stream_reports_no_activity() {
        let record = record_with(StreamKind::Touch, "");
        assert_eq!(
            delta_time_summary(StreamKind::Touch, &record).unwrap(),
            "no touch activity"
        );
        assert_eq!(
            delta_time_list(StreamKind::Touch, &ctx(&record, 80)).unwrap(),
            "no touch activity"
        );
    }

    #[test]
    fn test_missing_stream_field_is_error() {
        let record = OrderedRecord::new();
        assert_eq!(
            delta_time_summary(StreamKind::Keyboard, &record),
            Err(FieldError::MissingField(KEYBOARD.to_string()))
        );
    }

    #[test]
    fn test_delta_time_list_colors_by_event() {
        let record = record_with(StreamKind::Pointer, "0,1,5,0,0;1,2,9,0,0;2,4,20,0,0");
        let out = delta_time_list(StreamKind::Pointer, &ctx(&record, 200)).unwrap();

        assert!(out.contains(&format!("{}4{}", GREEN, RESET_CODE)));
        assert!(out.contains(&format!("{}11{}", YELLOW, RESET_CODE)));
        assert_eq!(
            strip_ansi(&out),
            "what's type : move, click, down, up | 5, 4, 11"
        );
    }

    const RESET_CODE: &str = crate::render::RESET;

    #[test]
    fn test_keyboard_list_skips_unknown_codes() {
        let record = record_with(StreamKind::Keyboard, "0,1,100;1,9,150;2,2,160");
        let out = delta_time_list(StreamKind::Keyboard, &ctx(&record, 200)).unwrap();
        assert_eq!(
            strip_ansi(&out),
            "what's type : keydown, keypress, keyup | 100, 10"
        );
    }

    #[test]
    fn test_list_wraps_under_label() {
        let record = record_with(StreamKind::Touch, "0,1,10,0,0;1,1,20,0,0;2,1,30,0,0");
        let mut context = ctx(&record, 36);
        context.indent = "| ";
        let out = strip_ansi(&delta_time_list(StreamKind::Touch, &context).unwrap());

        // legend takes 31 of 36 columns, leaving room for one "10, "
        assert_eq!(out, "what's type : move, down, up | 10, \n|   10, 10");
    }

    #[test]
    fn test_touch_position_lists() {
        let record = record_with(StreamKind::Touch, "1,1,10,100,200;4,2,20,103,196;5,3,24,103,196");
        let c = ctx(&record, 500);

        let positions = strip_ansi(&delta_position_list(StreamKind::Touch, &c).unwrap());
        assert!(positions.ends_with("| (100, 200), (3, -4), (0, 0)"));

        let combined = strip_ansi(&delta_time_position_list(StreamKind::Touch, &c).unwrap());
        assert!(combined.ends_with("| (10: 100, 200), (10: 3, -4), (4: 0, 0)"));

        let velocity = strip_ansi(&velocity_list(StreamKind::Touch, &c).unwrap());
        assert!(velocity.ends_with("| 22.36, 0.50, 0.00"));

        let ratio = strip_ansi(&movement_ratio_list(StreamKind::Touch, &c).unwrap());
        assert!(ratio.ends_with("| 0.10, 0.17, 0.25"));
    }

    #[test]
    fn test_zero_delta_rate_is_spelled_out() {
        assert_eq!(format_rate(1.0 / 0.0), "+Inf");
        assert_eq!(format_rate(f64::NAN), "NaN");
        assert_eq!(format_rate(-0.126), "-0.13");
    }

    #[test]
    fn test_acceleration_window() {
        let two = record_with(StreamKind::Pointer, "0,1,0,0,0;1,1,10,3,4");
        assert_eq!(
            acceleration_list(StreamKind::Pointer, &ctx(&two, 80)).unwrap(),
            "no acceleration"
        );

        let four = pointer("0,1,0,0,0;1,1,10,3,4;2,1,20,9,12;3,1,30,9,12");
        let values = accelerations(&four);
        assert_eq!(values.len(), 2);
        // v1 = 0.5, v2 = 1.0 over 20 ms
        assert!((values[0] - 0.025).abs() < 1e-9);
        // v1 = 1.0, v2 = 0.0 over 20 ms
        assert!((values[1] + 0.05).abs() < 1e-9);

        let record = record_with(
            StreamKind::Pointer,
            "0,1,0,0,0;1,1,10,3,4;2,1,20,9,12;3,1,30,9,12",
        );
        assert_eq!(
            acceleration_list(StreamKind::Pointer, &ctx(&record, 80)).unwrap(),
            "0.03, -0.05"
        );
    }

    #[test]
    fn test_acceleration_three_events_gives_one_value() {
        let events = pointer("0,1,0,0,0;1,1,10,3,4;2,1,20,9,12");
        assert_eq!(accelerations(&events).len(), 1);

        let record = record_with(StreamKind::Pointer, "0,1,0,0,0;1,1,10,3,4;2,1,20,9,12");
        assert_eq!(
            acceleration_list(StreamKind::Pointer, &ctx(&record, 80)).unwrap(),
            "0.03"
        );
    }

    #[test]
    fn test_large_coordinates_stay_finite() {
        let record = record_with(StreamKind::Touch, "0,1,10,4000000000,0;1,1,20,0,0");
        let c = ctx(&record, 500);

        let velocity = strip_ansi(&velocity_list(StreamKind::Touch, &c).unwrap());
        assert!(velocity.ends_with("| 400000000.00, 400000000.00"));
        let positions = strip_ansi(&delta_position_list(StreamKind::Touch, &c).unwrap());
        assert!(positions.ends_with("| (4000000000, 0), (-4000000000, 0)"));
    }

    #[test]
    fn test_extreme_values_saturate() {
        let packed = format!(
            "{},1,{},{},{};0,1,0,{},0",
            i64::MIN,
            i64::MIN,
            i64::MAX,
            i64::MIN,
            i64::MIN
        );
        let events = pointer(&packed);
        let deltas = steps(&events);

        assert_eq!(deltas[1].counter, i64::MAX);
        assert_eq!(deltas[1].time, i64::MAX);
        assert_eq!(deltas[1].x, i64::MIN);
        assert!(deltas[1].distance().is_finite());
        assert_eq!(accelerations(&events).len(), 0);

        let three = format!("{};2,1,20,{},0", packed, i64::MAX);
        assert!(accelerations(&pointer(&three))[0].is_finite());
    }

    #[test]
    fn test_acceleration_on_empty_stream() {
        let record = record_with(StreamKind::Pointer, "");
        assert_eq!(
            acceleration_list(StreamKind::Pointer, &ctx(&record, 80)).unwrap(),
            "no mouse movement"
        );
    }
}
