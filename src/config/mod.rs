//! Configuration: the `config.toml` file, its dotted-key editor and path helpers.

mod app;
mod edit;
mod path;

pub use app::{AppConfig, AssetSettings, CommandSettings, GeneralSettings, PluginSettings, StreamDeckSettings};
pub use edit::ConfigDocument;
pub use path::{PathResolver, default_config_path, home_dir, resolve_path};
