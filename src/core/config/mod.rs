mod path;
mod settings;

pub use path::*;
pub use settings::*;

pub fn load() -> anyhow::Result<Settings> {
    Settings::load_or_default(settings_path())
}
