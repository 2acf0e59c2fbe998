use clap::Subcommand;
use serde::Serialize;
use speakerlight_core::timer::{Preset, PresetGroup, PresetId};
use speakerlight_core::Config;

use super::fmt_marker;

#[derive(Subcommand)]
pub enum PresetsAction {
    /// List all presets, grouped
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one preset by name
    Show {
        /// Preset name (case-insensitive)
        name: String,
        #[arg(long)]
        json: bool,
    },
    /// Markers for evaluating N table topics speakers
    Eval {
        /// Number of speakers (1-10)
        #[arg(allow_negative_numbers = true)]
        speakers: i64,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct PresetView<'a> {
    name: &'a str,
    group: PresetGroup,
    green_secs: u64,
    yellow_secs: u64,
    red_secs: u64,
}

impl<'a> From<&'a Preset> for PresetView<'a> {
    fn from(p: &'a Preset) -> Self {
        Self {
            name: &p.name,
            group: p.group,
            green_secs: p.markers.green_ms / 1000,
            yellow_secs: p.markers.yellow_ms / 1000,
            red_secs: p.markers.red_ms / 1000,
        }
    }
}

fn print_row(preset: &Preset) {
    println!(
        "  {:<24} {:>6} {:>6} {:>6}",
        preset.name,
        fmt_marker(preset.markers.green_ms),
        fmt_marker(preset.markers.yellow_ms),
        fmt_marker(preset.markers.red_ms),
    );
}

fn print_one(preset: &Preset, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(&PresetView::from(preset))?);
    } else {
        println!("  {:<24} {:>6} {:>6} {:>6}", "", "GREEN", "YELLOW", "RED");
        print_row(preset);
    }
    Ok(())
}

pub fn run(action: PresetsAction) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = Config::load_or_default().catalog();

    match action {
        PresetsAction::List { json } => {
            if json {
                let views: Vec<PresetView> = catalog.presets().iter().map(Into::into).collect();
                println!("{}", serde_json::to_string_pretty(&views)?);
                return Ok(());
            }
            for (title, group) in [
                ("Speeches", PresetGroup::Speech),
                ("Evaluations", PresetGroup::Evaluation),
                ("Breaks", PresetGroup::Breaks),
                ("Custom", PresetGroup::Custom),
            ] {
                let mut rows = catalog.group(group).peekable();
                if rows.peek().is_none() {
                    continue;
                }
                println!("{title}");
                rows.for_each(print_row);
            }
            println!("Table topics evaluation: speakerlight presets eval <1-10>");
        }
        PresetsAction::Show { name, json } => {
            let preset = catalog.resolve(&PresetId::Named(name))?;
            print_one(&preset, json)?;
        }
        PresetsAction::Eval { speakers, json } => {
            let preset = catalog.resolve(&PresetId::MultiSpeaker(speakers))?;
            print_one(&preset, json)?;
        }
    }
    Ok(())
}
