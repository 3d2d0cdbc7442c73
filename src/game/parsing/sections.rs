use log::{debug, warn};
use std::collections::BTreeMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Section {
    Preamble,
    General,
    Metadata,
    Difficulty,
    TimingPoints,
    HitObjects,
    Skipped,
}

fn section_for_header(name: &str) -> Section {
    match name {
        "General" => Section::General,
        "Metadata" => Section::Metadata,
        "Difficulty" => Section::Difficulty,
        "TimingPoints" => Section::TimingPoints,
        "HitObjects" => Section::HitObjects,
        // Editor, Events, Colours, ...
        _ => Section::Skipped,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TimingPoint {
    pub time: f64,
    pub beat_length: f64,
    /// Remaining columns, untouched.
    pub extra: Vec<String>,
}

/// The chart file split into its sections, before any note is interpreted.
#[derive(Clone, Debug, Default)]
pub struct RawSections {
    pub general: BTreeMap<String, String>,
    pub metadata: BTreeMap<String, String>,
    pub tags: Vec<String>,
    pub difficulty: BTreeMap<String, String>,
    pub timing_points: Vec<TimingPoint>,
    /// `(1-based line number, row)` for error reporting.
    pub hit_objects: Vec<(usize, String)>,
}

fn split_pair(line: &str) -> Option<(String, String)> {
    let (key, value) = line.split_once(':')?;
    Some((key.trim().to_string(), value.trim().to_string()))
}

fn parse_timing_point(line: &str) -> Option<TimingPoint> {
    let mut fields = line.split(',').map(str::trim);
    let time = fields.next()?.parse::<f64>().ok()?;
    let beat_length = fields.next()?.parse::<f64>().ok()?;
    Some(TimingPoint {
        time,
        beat_length,
        extra: fields.map(str::to_string).collect(),
    })
}

pub fn split_sections(source: &str) -> RawSections {
    let mut out = RawSections::default();
    let mut section = Section::Preamble;

    for (index, raw_line) in source.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            section = section_for_header(name.trim());
            debug!("Entering chart section [{}] at line {}.", name, index + 1);
            continue;
        }

        match section {
            Section::Preamble | Section::Skipped => {}
            Section::General | Section::Metadata | Section::Difficulty => {
                let Some((key, value)) = split_pair(line) else {
                    warn!("Ignoring malformed key/value line {}: '{}'", index + 1, line);
                    continue;
                };
                match section {
                    Section::General => {
                        out.general.insert(key, value);
                    }
                    Section::Metadata => {
                        if key == "Tags" {
                            out.tags = value.split_whitespace().map(str::to_string).collect();
                        }
                        out.metadata.insert(key, value);
                    }
                    _ => {
                        out.difficulty.insert(key, value);
                    }
                }
            }
            Section::TimingPoints => match parse_timing_point(line) {
                Some(point) => out.timing_points.push(point),
                None => warn!("Ignoring malformed timing point on line {}: '{}'", index + 1, line),
            },
            Section::HitObjects => out.hit_objects.push((index + 1, line.to_string())),
        }
    }

    out
}
