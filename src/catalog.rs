//! Information trees over a decoded record

use crate::error::FieldError;
use crate::fields;
use crate::render::{LeafContext, Node};
use crate::stream::{self, StreamKind};
use crate::types::OrderedRecord;

/// Full annotated view of a sensor record
pub fn information_tree() -> Vec<Node> {
    vec![
        Node::group("sensor_format", sensor_format()),
        Node::group("sensor_content", sensor_content()),
    ]
}

fn sensor_format() -> Vec<Node> {
    vec![
        Node::leaf("separator", |ctx| fields::sensor_separator(ctx.record)),
        Node::leaf("build_time", |ctx| fields::sensor_build_time(ctx.record)),
        Node::leaf("script_init_time", |ctx| fields::script_init_time(ctx.record)),
        Node::leaf("sensor_id_time", |ctx| fields::sensor_id_time(ctx.record)),
        Node::group(
            "shuffling",
            vec![
                Node::leaf("key", |ctx| fields::shuffling_key(ctx.record)),
                Node::leaf("time", |ctx| fields::shuffling_time(ctx.record)),
            ],
        ),
        Node::group(
            "encryption",
            vec![
                Node::leaf("key", |ctx| fields::encryption_key(ctx.record)),
                Node::leaf("time", |ctx| fields::encryption_time(ctx.record)),
            ],
        ),
    ]
}

fn sensor_content() -> Vec<Node> {
    vec![
        Node::leaf("url", |ctx| fields::url(ctx.record)),
        Node::group("browser", browser()),
        Node::group(
            fields::JS_HEAP,
            vec![Node::group(
                "js_heap",
                vec![
                    Node::leaf("limit", |ctx| fields::js_heap_limit(ctx.record)),
                    Node::leaf("total", |ctx| fields::js_heap_total(ctx.record)),
                    Node::leaf("used", |ctx| fields::js_heap_used(ctx.record)),
                ],
            )],
        ),
        Node::group(
            "locale",
            vec![
                Node::leaf("timezone_offset", |ctx| fields::timezone_offset(ctx.record)),
                Node::leaf("lang", |ctx| fields::lang(ctx.record)),
                Node::leaf("lang_length", |ctx| fields::lang_length(ctx.record)),
                Node::leaf("lang_hash", |ctx| fields::lang_hash(ctx.record)),
            ],
        ),
        Node::group(
            "timestamps",
            vec![
                Node::leaf("start", |ctx| fields::start_timestamp(ctx.record)),
                Node::leaf("bpd", |ctx| fields::bpd_delta(ctx.record)),
            ],
        ),
        Node::group("activity", activity()),
    ]
}

fn browser() -> Vec<Node> {
    vec![
        Node::leaf("user_agent", |ctx| fields::user_agent(ctx.record)),
        Node::leaf("do_not_track", |ctx| fields::do_not_track(ctx.record)),
        Node::group(
            "webgl",
            vec![
                Node::leaf("vendor", |ctx| fields::webgl_vendor(ctx.record)),
                Node::leaf("renderer", |ctx| fields::webgl_renderer(ctx.record)),
            ],
        ),
        Node::group(
            "canvas",
            vec![
                Node::leaf("rcfp", |ctx| fields::rcfp(ctx.record)),
                Node::leaf("r_value", |ctx| fields::r_value(ctx.record)),
                Node::leaf("fp_val_str", |ctx| fields::fp_val_str(ctx.record)),
            ],
        ),
        Node::group(
            "screen",
            vec![
                Node::leaf("width", |ctx| fields::screen_width(ctx.record)),
                Node::leaf("height", |ctx| fields::screen_height(ctx.record)),
                Node::leaf("available_width", |ctx| fields::available_width(ctx.record)),
                Node::leaf("available_height", |ctx| fields::available_height(ctx.record)),
                Node::leaf("inner_width", |ctx| fields::inner_width(ctx.record)),
                Node::leaf("inner_height", |ctx| fields::inner_height(ctx.record)),
                Node::leaf("outer_width", |ctx| fields::outer_width(ctx.record)),
            ],
        ),
    ]
}

fn activity() -> Vec<Node> {
    use StreamKind::{Keyboard, Pointer, Touch};

    vec![
        Node::group(
            "mact",
            vec![
                Node::group(
                    "delta_time",
                    vec![
                        Node::leaf("stats", |ctx| stream::delta_time_summary(Pointer, ctx.record)),
                        Node::leaf("list", |ctx| stream::delta_time_list(Pointer, ctx)),
                    ],
                ),
                Node::group(
                    "acceleration",
                    vec![Node::leaf("values", |ctx| stream::acceleration_list(Pointer, ctx))],
                ),
            ],
        ),
        Node::group(
            "kact",
            vec![Node::group(
                "delta_time",
                vec![
                    Node::leaf("stats", |ctx| stream::delta_time_summary(Keyboard, ctx.record)),
                    Node::leaf("list", |ctx| stream::delta_time_list(Keyboard, ctx)),
                ],
            )],
        ),
        Node::group(
            "tact",
            vec![
                Node::group(
                    "delta_time",
                    vec![
                        Node::leaf("stats", |ctx| stream::delta_time_summary(Touch, ctx.record)),
                        Node::leaf("list", |ctx| stream::delta_time_list(Touch, ctx)),
                    ],
                ),
                Node::group(
                    "delta_position",
                    vec![Node::leaf("list", |ctx| stream::delta_position_list(Touch, ctx))],
                ),
                Node::group(
                    "delta_time_delta_position",
                    vec![Node::leaf("list", |ctx| stream::delta_time_position_list(Touch, ctx))],
                ),
                Node::group(
                    "velocity",
                    vec![Node::leaf("list", |ctx| stream::velocity_list(Touch, ctx))],
                ),
                Node::group(
                    "ratio counter movement",
                    vec![Node::leaf("list", |ctx| stream::movement_ratio_list(Touch, ctx))],
                ),
            ],
        ),
    ]
}

fn field_value(ctx: &LeafContext<'_>) -> Result<String, FieldError> {
    ctx.record
        .get(ctx.label)
        .map(ToString::to_string)
        .ok_or_else(|| FieldError::MissingField(ctx.label.to_string()))
}

/// One leaf per entry of the record's order sequence, labeled by field id.
///
/// A repeated id yields several leaves that all show its final value.
pub fn record_tree(record: &OrderedRecord) -> Vec<Node> {
    record
        .order()
        .iter()
        .map(|id| Node::leaf(id.as_str(), field_value))
        .collect()
}
