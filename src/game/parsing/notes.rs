use crate::core::input::Lane;
use crate::error::ChartError;
use crate::game::note::Note;
use log::info;

const TYPE_TAP: i64 = 0;
const TYPE_HOLD: i64 = 7;

fn field<'a>(fields: &[&'a str], index: usize, name: &str, line_no: usize) -> Result<&'a str, ChartError> {
    fields
        .get(index)
        .copied()
        .filter(|f| !f.is_empty())
        .ok_or_else(|| ChartError::Format(format!("line {}: missing {}", line_no, name)))
}

fn int_field(fields: &[&str], index: usize, name: &str, line_no: usize) -> Result<i64, ChartError> {
    let raw = field(fields, index, name, line_no)?;
    raw.parse::<i64>()
        .map_err(|_| ChartError::Format(format!("line {}: {} '{}' is not an integer", line_no, name, raw)))
}

/// Parses one `[HitObjects]` row: `lane,?,time,type,?,[endtime[:...]],...`.
///
/// Lanes are 1-based in the file. Type `0` is a tap, `7` a hold whose release
/// time is the sixth column up to its first `:`.
pub fn parse_hit_object(row: &str, line_no: usize) -> Result<Note, ChartError> {
    let fields: Vec<&str> = row.split(',').map(str::trim).collect();

    let lane_number = int_field(&fields, 0, "lane", line_no)?;
    let lane = usize::try_from(lane_number - 1)
        .ok()
        .and_then(Lane::from_index)
        .ok_or_else(|| ChartError::Format(format!("line {}: lane {} out of range 1..=7", line_no, lane_number)))?;
    let time = int_field(&fields, 2, "start time", line_no)?;
    let note_type = int_field(&fields, 3, "type discriminator", line_no)?;

    match note_type {
        TYPE_TAP => Ok(Note::tap(lane, time)),
        TYPE_HOLD => {
            let raw_end = field(&fields, 5, "hold end time", line_no)?;
            let end_str = raw_end.split(':').next().unwrap_or(raw_end);
            let end_time = end_str.parse::<i64>().map_err(|_| {
                ChartError::Format(format!("line {}: hold end time '{}' is not an integer", line_no, end_str))
            })?;
            Note::hold(lane, time, end_time).ok_or_else(|| {
                ChartError::Format(format!(
                    "line {}: hold ends at {} which is not after its start {}",
                    line_no, end_time, time
                ))
            })
        }
        other => Err(ChartError::Format(format!(
            "line {}: unrecognized note type {}",
            line_no, other
        ))),
    }
}

/// Converts every row in file order; the first bad row fails the whole load.
pub fn parse_hit_objects(rows: &[(usize, String)]) -> Result<Vec<Note>, ChartError> {
    let notes = rows
        .iter()
        .map(|(line_no, row)| parse_hit_object(row, *line_no))
        .collect::<Result<Vec<_>, _>>()?;
    info!("Parsed {} notes from chart data.", notes.len());
    Ok(notes)
}
