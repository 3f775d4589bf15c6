//! Game-tick and duration conversions.
//!
//! Factorio runs at 60 updates per second, so one tick is 16.67 ms of
//! wall time. Instance-side metrics report durations in ticks; every
//! outward projection carries the millisecond equivalent alongside the
//! raw tick count.

use chrono::{TimeZone, Utc};
use serde_json::Value;

/// Milliseconds per game tick (60 UPS).
pub const MS_PER_TICK: f64 = 16.67;

/// Converts a tick count to rounded milliseconds.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn ticks_to_ms(ticks: f64) -> i64 {
    (ticks * MS_PER_TICK).round() as i64
}

/// Renders a millisecond duration for humans.
///
/// Durations below one second render in whole milliseconds; one second
/// and above render as one-decimal seconds.
#[must_use]
pub fn format_duration_ms(ms: i64) -> String {
    if ms < 1000 {
        format!("{ms}ms")
    } else {
        #[allow(clippy::cast_precision_loss)]
        let secs = ms as f64 / 1000.0;
        format!("{secs:.1}s")
    }
}

/// Formats epoch milliseconds as an ISO-8601 UTC timestamp.
///
/// Out-of-range values fall back to the epoch rather than panicking;
/// timestamps in this system are controller-generated and in range.
#[must_use]
pub fn iso_timestamp(epoch_ms: i64) -> String {
    Utc.timestamp_millis_opt(epoch_ms)
        .single()
        .unwrap_or_else(|| Utc.timestamp_millis_opt(0).unwrap())
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Adds `*_ms` companions for every top-level numeric `*_ticks` key.
///
/// Raw tick values are preserved verbatim; existing `*_ms` keys are left
/// untouched. Non-object values pass through unchanged.
#[must_use]
pub fn normalize_tick_metrics(metrics: Value) -> Value {
    let Value::Object(mut map) = metrics else {
        return metrics;
    };

    let conversions: Vec<(String, i64)> = map
        .iter()
        .filter_map(|(key, value)| {
            let stem = key.strip_suffix("_ticks")?;
            let ms_key = format!("{stem}_ms");
            if map.contains_key(&ms_key) {
                return None;
            }
            value.as_f64().map(|ticks| (ms_key, ticks_to_ms(ticks)))
        })
        .collect();

    for (ms_key, ms) in conversions {
        map.insert(ms_key, Value::from(ms));
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn ticks_convert_at_sixty_ups() {
        assert_eq!(ticks_to_ms(600.0), 10_002);
        assert_eq!(ticks_to_ms(1.0), 17);
        assert_eq!(ticks_to_ms(0.0), 0);
    }

    #[test]
    fn sub_second_durations_render_in_ms() {
        assert_eq!(format_duration_ms(0), "0ms");
        assert_eq!(format_duration_ms(42), "42ms");
        assert_eq!(format_duration_ms(999), "999ms");
    }

    #[test]
    fn second_and_above_render_one_decimal() {
        assert_eq!(format_duration_ms(1000), "1.0s");
        assert_eq!(format_duration_ms(1250), "1.2s");
        assert_eq!(format_duration_ms(125_400), "125.4s");
    }

    #[test]
    fn iso_timestamp_is_utc_millis() {
        assert_eq!(iso_timestamp(0), "1970-01-01T00:00:00.000Z");
        assert_eq!(iso_timestamp(1_700_000_000_000), "2023-11-14T22:13:20.000Z");
    }

    #[test]
    fn tick_metrics_gain_ms_companions() {
        let normalized = normalize_tick_metrics(json!({
            "total_ticks": 600,
            "serialize_ticks": 120.0,
            "entity_count": 4000,
        }));
        assert_eq!(normalized["total_ticks"], json!(600));
        assert_eq!(normalized["total_ms"], json!(10_002));
        assert_eq!(normalized["serialize_ms"], json!(2000));
        assert_eq!(normalized["entity_count"], json!(4000));
        assert!(normalized.get("entity_count_ms").is_none());
    }

    #[test]
    fn existing_ms_keys_are_not_overwritten() {
        let normalized = normalize_tick_metrics(json!({
            "total_ticks": 600,
            "total_ms": 1,
        }));
        assert_eq!(normalized["total_ms"], json!(1));
    }

    #[test]
    fn non_object_metrics_pass_through() {
        assert_eq!(normalize_tick_metrics(json!(null)), json!(null));
        assert_eq!(normalize_tick_metrics(json!([1, 2])), json!([1, 2]));
    }

    #[test]
    fn opaque_legacy_keys_are_preserved() {
        let normalized = normalize_tick_metrics(json!({
            "async_export_seconds": 1.5,
            "schedule_interrupt_count": 3,
        }));
        assert_eq!(normalized["async_export_seconds"], json!(1.5));
        assert_eq!(normalized["schedule_interrupt_count"], json!(3));
    }

    mod properties {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn duration_rendering_picks_the_right_unit(ms in 0_i64..10_000_000) {
                let rendered = format_duration_ms(ms);
                if ms < 1000 {
                    prop_assert!(rendered.ends_with("ms"));
                } else {
                    prop_assert!(rendered.ends_with('s') && !rendered.ends_with("ms"));
                    prop_assert!(rendered.contains('.'));
                }
            }

            #[test]
            fn tick_conversion_is_monotonic(a in 0.0_f64..1_000_000.0, b in 0.0_f64..1_000_000.0) {
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                prop_assert!(ticks_to_ms(lo) <= ticks_to_ms(hi));
                prop_assert!(ticks_to_ms(lo) >= 0);
            }

            #[test]
            fn normalization_preserves_every_original_key(count in 0_u64..100_000) {
                let normalized = normalize_tick_metrics(json!({
                    "total_ticks": count,
                    "entity_count": count,
                }));
                prop_assert_eq!(&normalized["total_ticks"], &json!(count));
                prop_assert_eq!(&normalized["entity_count"], &json!(count));
                #[allow(clippy::cast_precision_loss)]
                let expected = ticks_to_ms(count as f64);
                prop_assert_eq!(&normalized["total_ms"], &json!(expected));
            }
        }
    }
}
