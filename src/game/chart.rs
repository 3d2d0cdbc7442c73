use crate::error::ChartError;
use crate::game::note::{Note, NoteId};
use crate::game::parsing::notes::parse_hit_objects;
use crate::game::parsing::sections::{TimingPoint, split_sections};
use log::info;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const UNKNOWN_TITLE: &str = "Unknown";

/// Everything in the chart file that is not a note.
#[derive(Clone, Debug, Default)]
pub struct ChartMetadata {
    pub general: BTreeMap<String, String>,
    pub metadata: BTreeMap<String, String>,
    pub tags: Vec<String>,
    pub difficulty: BTreeMap<String, String>,
    pub timing_points: Vec<TimingPoint>,
}

/// A song's notes in file order plus its metadata. Immutable once loaded.
#[derive(Clone, Debug)]
pub struct Chart {
    title: String,
    audio_ref: String,
    notes: Vec<Note>,
    metadata: ChartMetadata,
}

impl Chart {
    pub fn new(title: impl Into<String>, audio_ref: impl Into<String>, notes: Vec<Note>) -> Self {
        Self {
            title: title.into(),
            audio_ref: audio_ref.into(),
            notes,
            metadata: ChartMetadata::default(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn audio_ref(&self) -> &str {
        &self.audio_ref
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn metadata(&self) -> &ChartMetadata {
        &self.metadata
    }

    #[inline(always)]
    pub fn note(&self, id: NoteId) -> &Note {
        &self.notes[id.0]
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Levels live under `<levels_dir>/<title>/`, next to their audio.
    pub fn audio_path(&self, levels_dir: &Path) -> PathBuf {
        levels_dir.join(&self.title).join(&self.audio_ref)
    }

    /// Time of the last press or release the chart asks for.
    pub fn last_target_time(&self) -> Option<i64> {
        self.notes
            .iter()
            .map(|n| n.end_time().unwrap_or(n.time()))
            .max()
    }
}

/// Parses a chart from its text source.
pub fn load(source: &str) -> Result<Chart, ChartError> {
    let raw = split_sections(source);
    let notes = parse_hit_objects(&raw.hit_objects)?;

    let title = raw
        .metadata
        .get("TitleUnicode")
        .or_else(|| raw.metadata.get("Title"))
        .filter(|t| !t.is_empty())
        .cloned()
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

    let Some(audio_ref) = raw
        .general
        .get("AudioFilename")
        .filter(|a| !a.is_empty())
        .cloned()
    else {
        return Err(ChartError::MissingAudio { title });
    };

    info!("Loaded chart '{}' ({} notes, audio '{}').", title, notes.len(), audio_ref);

    Ok(Chart {
        title,
        audio_ref,
        notes,
        metadata: ChartMetadata {
            general: raw.general,
            metadata: raw.metadata,
            tags: raw.tags,
            difficulty: raw.difficulty,
            timing_points: raw.timing_points,
        },
    })
}

pub fn load_from_path(path: &Path) -> Result<Chart, ChartError> {
    info!("Reading chart file '{}'.", path.display());
    let source = fs::read_to_string(path)?;
    load(&source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::input::Lane;
    use std::io::Write;

    const CHART: &str = "[General]
AudioFilename: song.ogg

[Metadata]
Title:Plain
TitleUnicode:Fancy

[Difficulty]
OverallDifficulty:7

[TimingPoints]
0,400,4,1,0,100,1,0

[HitObjects]
1,0,1000,0,0
2,0,1500,7,0,2500:0:0:0:0:
7,0,1600,0,0
";

    #[test]
    fn loads_notes_and_metadata() {
        let chart = load(CHART).unwrap();
        assert_eq!(chart.title(), "Fancy");
        assert_eq!(chart.audio_ref(), "song.ogg");
        assert_eq!(chart.len(), 3);
        assert_eq!(chart.note(NoteId(1)).lane(), Lane::D);
        assert_eq!(chart.note(NoteId(1)).end_time(), Some(2500));
        assert_eq!(chart.metadata().difficulty.get("OverallDifficulty").map(String::as_str), Some("7"));
        assert_eq!(chart.metadata().timing_points.len(), 1);
        assert_eq!(chart.last_target_time(), Some(2500));
    }

    #[test]
    fn missing_audio_is_reported_with_title() {
        let source = CHART.replace("AudioFilename: song.ogg", "AudioLeadIn: 0");
        match load(&source) {
            Err(ChartError::MissingAudio { title }) => assert_eq!(title, "Fancy"),
            other => panic!("expected MissingAudio, got {:?}", other),
        }
    }

    #[test]
    fn bad_note_type_fails_the_load() {
        let source = CHART.replace("7,0,1600,0,0", "7,0,1600,5,0");
        assert!(matches!(load(&source), Err(ChartError::Format(_))));
    }

    #[test]
    fn falls_back_to_plain_title() {
        let source = CHART.replace("TitleUnicode:Fancy\n", "");
        assert_eq!(load(&source).unwrap().title(), "Plain");
    }

    #[test]
    fn audio_path_is_nested_under_title() {
        let chart = load(CHART).unwrap();
        assert_eq!(
            chart.audio_path(Path::new("Assets/Levels")),
            PathBuf::from("Assets/Levels/Fancy/song.ogg")
        );
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CHART.as_bytes()).unwrap();
        let chart = load_from_path(file.path()).unwrap();
        assert_eq!(chart.len(), 3);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_from_path(&dir.path().join("nope.osu")).unwrap_err();
        assert!(matches!(err, ChartError::Io(_)));
    }
}
