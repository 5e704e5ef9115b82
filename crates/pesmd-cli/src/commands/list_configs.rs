use crate::config::{DEFAULT_PRESET, PRESETS, Preset};
use crate::error::Result;

fn describe(preset: &Preset) -> String {
    let marker = if preset.name == DEFAULT_PRESET {
        " (default)"
    } else {
        ""
    };
    format!(
        "{:<8} {:<16} lr={:<8} weight={}{}",
        preset.name,
        preset.architecture().stem(),
        preset.learning_rate,
        preset.weight,
        marker
    )
}

pub fn run() -> Result<()> {
    println!("Available presets:");
    for preset in &PRESETS {
        println!("  {}", describe(preset));
    }
    Ok(())
}
