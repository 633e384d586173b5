//! Everything between the panel tree and the device: assets, key
//! composition and the main loop.

pub mod assets;
mod icons;
pub mod image;
pub mod manager;
pub mod render;
mod text;

pub use assets::AssetManager;
pub use icons::BUILTIN_ICONS;
pub use manager::{CommandAddr, DeckHandle, DeckInput, DeckManager, RunOptions};
pub use render::{DeckRenderer, KeyDisplay};
