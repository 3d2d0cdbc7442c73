use keysync::app::{SessionControl, run_session};
use keysync::core::input::key_feed;
use keysync::error::Error as KeysyncError;
use keysync::{config, game::chart};
use log::{LevelFilter, error, info, warn};
use std::env;
use std::error::Error;
use std::path::{Path, PathBuf};

const USAGE: &str = "usage: keysync <chart.osu> [--auto] [--config <file>]";

struct Args {
    chart: PathBuf,
    auto_play: bool,
    config: Option<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, KeysyncError> {
    let mut chart = None;
    let mut auto_play = false;
    let mut config = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--auto" => auto_play = true,
            "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| KeysyncError::Usage(format!("--config needs a path; {}", USAGE)))?;
                config = Some(PathBuf::from(path));
            }
            _ if chart.is_none() => chart = Some(PathBuf::from(arg)),
            _ => return Err(KeysyncError::Usage(format!("unexpected argument '{}'; {}", arg, USAGE))),
        }
    }

    Ok(Args {
        chart: chart.ok_or_else(|| KeysyncError::Usage(USAGE.to_string()))?,
        auto_play,
        config,
    })
}

/// Bare names are looked up under the levels directory.
fn resolve_chart_path(chart: &Path, levels_dir: &Path) -> PathBuf {
    if chart.exists() {
        chart.to_path_buf()
    } else {
        levels_dir.join(chart)
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let args = parse_args(env::args().skip(1))?;

    config::load(args.config.as_deref());
    let mut config = config::get();
    config.auto_play |= args.auto_play;

    let chart_path = resolve_chart_path(&args.chart, &config.levels_dir);
    let chart = chart::load_from_path(&chart_path)?;
    let audio = chart.audio_path(&config.levels_dir);
    if !audio.exists() {
        warn!("Audio '{}' not found; playing silently.", audio.display());
    }

    // The feed stays open for the whole run; with no window attached nothing
    // is pressed, so only auto play scores anything.
    let (_feed, raw) = key_feed();
    let report = run_session(chart, &config, &SessionControl::new(), raw, &mut ())?;

    println!("{}", report.to_json()?);
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    // --- Logging Setup ---
    env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Info)
        .filter_module("keysync::game::parsing", LevelFilter::Info)
        .filter_module("keysync::game::gameplay", LevelFilter::Info)
        .filter_module("keysync::core::input", LevelFilter::Warn)
        .init();

    info!("keysync starting...");

    if let Err(e) = run() {
        error!("keysync exited with error: {}", e);
        return Err(e);
    }

    info!("keysync exited gracefully.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args, KeysyncError> {
        parse_args(list.iter().map(|a| a.to_string()))
    }

    #[test]
    fn reads_chart_and_flags() {
        let parsed = args(&["song.osu", "--auto", "--config", "alt.ini"]).unwrap();
        assert_eq!(parsed.chart, PathBuf::from("song.osu"));
        assert!(parsed.auto_play);
        assert_eq!(parsed.config, Some(PathBuf::from("alt.ini")));
    }

    #[test]
    fn bad_arguments_are_usage_errors() {
        for list in [&[][..], &["--config"][..], &["a.osu", "b.osu"][..]] {
            assert!(
                matches!(args(list), Err(KeysyncError::Usage(ref msg)) if msg.contains(USAGE)),
                "{:?} should be a usage error",
                list
            );
        }
    }
}
