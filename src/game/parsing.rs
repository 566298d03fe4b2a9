use log::warn;
use rand::Rng;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::game::chart::{Chart, ChartMeta, fingerprint_of};
use crate::game::note::Note;

/// Frame bitstrings are fixed-width; lanes occupy positions 2..16.
const BITS_LEN: usize = 16;
const LANE_BIT_OFFSET: usize = 2;

#[derive(Deserialize, Debug, Default)]
struct RawMeta {
    #[serde(default)]
    game: Option<String>,
    #[serde(default)]
    character: Option<String>,
    #[serde(default)]
    start_time: Option<String>,
}

impl From<RawMeta> for ChartMeta {
    fn from(raw: RawMeta) -> Self {
        Self { game: raw.game, character: raw.character, start_time: raw.start_time }
    }
}

fn frame_time(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        // Timestamps sometimes arrive as quoted numbers; accept those too.
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn frame_fields(frame: &Value) -> Option<(f64, &str)> {
    let (time, bits) = match frame {
        Value::Array(parts) => (frame_time(parts.first()?)?, parts.get(1)?.as_str()?),
        Value::Object(map) => (frame_time(map.get("t")?)?, map.get("bits")?.as_str()?),
        _ => return None,
    };
    if !time.is_finite() || bits.chars().count() != BITS_LEN {
        return None;
    }
    Some((time, bits))
}

/// Parses chart JSON into a canonical chart.
///
/// Accepted shapes: a bare array of frames, or an object carrying `frames`
/// (or `data`) plus optional `meta`. A frame is `[t, bits]` or
/// `{"t": .., "bits": ".."}` with a 16-character bitstring whose positions
/// 2..16 map to lanes 0..14, capped at the configured lane count.
///
/// Malformed entries are skipped, never fatal; a document that reduces to
/// zero valid notes yields a valid empty chart. The fingerprint is always
/// computed from the raw source text.
pub fn parse_chart(src: &str, lanes: usize) -> Chart {
    let fingerprint = fingerprint_of(src);

    let root: Value = match serde_json::from_str(src) {
        Ok(v) => v,
        Err(e) => {
            warn!("chart data is not valid JSON ({e}); loading empty chart");
            return Chart::new(ChartMeta::default(), Vec::new(), fingerprint);
        }
    };

    let mut meta = ChartMeta::default();
    let frames: &[Value] = match &root {
        Value::Array(frames) => frames,
        Value::Object(map) => {
            if let Some(raw_meta) = map.get("meta") {
                meta = RawMeta::deserialize(raw_meta).unwrap_or_default().into();
            }
            map.get("frames")
                .or_else(|| map.get("data"))
                .and_then(Value::as_array)
                .map_or(&[][..], Vec::as_slice)
        }
        _ => &[],
    };

    let mut notes = Vec::new();
    let mut skipped = 0usize;
    for frame in frames {
        let Some((time, bits)) = frame_fields(frame) else {
            skipped += 1;
            continue;
        };
        for (position, ch) in bits.chars().enumerate().skip(LANE_BIT_OFFSET) {
            if ch != '1' {
                continue;
            }
            let lane = position - LANE_BIT_OFFSET;
            if lane < lanes {
                notes.push(Note::new(time, lane));
            }
        }
    }

    if skipped > 0 {
        warn!("skipped {skipped} malformed frame(s) while parsing chart");
    }
    if notes.is_empty() {
        warn!("chart parsed to zero notes");
    }

    Chart::new(meta, notes, fingerprint)
}

fn bit_string(active_lanes: &[usize], lanes: usize) -> String {
    let mut bits = ['0'; BITS_LEN];
    for &lane in active_lanes {
        if lane < lanes && LANE_BIT_OFFSET + lane < BITS_LEN {
            bits[LANE_BIT_OFFSET + lane] = '1';
        }
    }
    bits.iter().collect()
}

/// Deterministic demo chart: 42 evenly spaced notes walking the lanes, with
/// a chord every fourth step.
pub fn sample_chart_json(lanes: usize) -> String {
    let start = 500.0;
    let step = 300.0;
    let total = 42;

    let mut frames = Vec::with_capacity(total);
    for i in 0..total {
        let t = start + i as f64 * step;
        let lane = i % lanes;
        let mut active = vec![lane];
        if i % 4 == 0 {
            active.push((lane + 7) % lanes);
        }
        frames.push(json!([t, bit_string(&active, lanes)]));
    }

    json!({
        "meta": { "game": "Demo", "character": "Sampler" },
        "frames": frames,
    })
    .to_string()
}

/// Random 30-second chart: 1-3 distinct lanes per frame, 200-800ms apart.
pub fn random_chart_json<R: Rng>(rng: &mut R, lanes: usize) -> String {
    let duration = 30_000.0;
    let mut frames = Vec::new();

    let mut t = 500.0;
    while t < duration {
        let count = rng.random_range(1..=3usize).min(lanes);
        let mut active: Vec<usize> = Vec::with_capacity(count);
        while active.len() < count {
            let lane = rng.random_range(0..lanes);
            if !active.contains(&lane) {
                active.push(lane);
            }
        }
        frames.push(json!([t, bit_string(&active, lanes)]));
        t += rng.random_range(200.0..800.0);
    }

    json!({
        "meta": { "game": "Random Pattern", "character": "Auto-Generated" },
        "frames": frames,
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LANES: usize = 12;

    #[test]
    fn parses_bare_frame_array() {
        let chart = parse_chart(r#"[[100, "0010000000000000"], [400, "0001000000000000"]]"#, LANES);
        assert_eq!(chart.len(), 2);
        // Bit position 2 is lane 0; times are normalized to the first note.
        assert_eq!(chart.notes()[0].lane, 0);
        assert_eq!(chart.notes()[0].time_ms, 0.0);
        assert_eq!(chart.notes()[1].lane, 1);
        assert_eq!(chart.notes()[1].time_ms, 300.0);
    }

    #[test]
    fn parses_tagged_object_with_meta() {
        let src = r#"{
            "meta": { "game": "Tekken", "character": "Kuma" },
            "frames": [ {"t": 250, "bits": "0000000000000011"} ]
        }"#;
        let chart = parse_chart(src, LANES);
        assert_eq!(chart.meta.game.as_deref(), Some("Tekken"));
        assert_eq!(chart.meta.character.as_deref(), Some("Kuma"));
        // Bit positions 14 and 15 are lanes 12 and 13, out of range for a
        // 12-lane field, so the meta parses but the notes drop.
        let lanes: Vec<usize> = chart.notes().iter().map(|n| n.lane).collect();
        assert_eq!(lanes, Vec::<usize>::new());
    }

    #[test]
    fn accepts_data_key_and_chords() {
        let src = r#"{ "data": [[0, "0011000000000000"]] }"#;
        let chart = parse_chart(src, LANES);
        let lanes: Vec<usize> = chart.notes().iter().map(|n| n.lane).collect();
        assert_eq!(lanes, vec![0, 1]);
    }

    #[test]
    fn skips_malformed_entries_without_failing() {
        let src = r#"[
            [100, "0010000000000000"],
            ["not-a-number", "0010000000000000"],
            [200, "too-short"],
            [300],
            {"bits": "0010000000000000"},
            [400, "0000100000000000"]
        ]"#;
        let chart = parse_chart(src, LANES);
        assert_eq!(chart.len(), 2);
    }

    #[test]
    fn numeric_string_times_are_accepted() {
        let chart = parse_chart(r#"[["750", "0010000000000000"]]"#, LANES);
        assert_eq!(chart.len(), 1);
    }

    #[test]
    fn invalid_json_fails_closed_to_empty_chart() {
        let chart = parse_chart("{ not json", LANES);
        assert!(chart.is_empty());
        assert_ne!(chart.fingerprint(), 0);
    }

    #[test]
    fn zero_valid_notes_is_a_valid_empty_chart() {
        let chart = parse_chart("[]", LANES);
        assert!(chart.is_empty());
    }

    #[test]
    fn lanes_beyond_the_configured_count_are_dropped() {
        // Bit 15 is lane 13.
        let chart = parse_chart(r#"[[0, "0000000000000001"]]"#, 4);
        assert!(chart.is_empty());
    }

    #[test]
    fn sample_chart_round_trips_through_the_parser() {
        let src = sample_chart_json(LANES);
        let chart = parse_chart(&src, LANES);
        // 42 steps, a chord every 4th: 42 + 11 extra notes.
        assert_eq!(chart.len(), 53);
        assert_eq!(chart.meta.game.as_deref(), Some("Demo"));
        assert_eq!(chart.notes()[0].time_ms, 0.0);
        let sorted = chart
            .notes()
            .windows(2)
            .all(|pair| pair[0].time_ms <= pair[1].time_ms);
        assert!(sorted);
    }

    #[test]
    fn random_chart_parses_and_stays_in_range() {
        use rand::SeedableRng;
        let mut rng = rand::rngs::StdRng::seed_from_u64(99);
        let src = random_chart_json(&mut rng, LANES);
        let chart = parse_chart(&src, LANES);
        assert!(!chart.is_empty());
        assert!(chart.notes().iter().all(|n| n.lane < LANES));
    }
}
