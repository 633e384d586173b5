//! Panels and buttons: the tree shown on the deck.

pub mod button;
pub mod buttons;
pub mod factory;
pub mod node;
pub mod page;
pub mod registry;

pub use button::{Button, ItemContext};
pub use factory::{ButtonFactory, ButtonSpec};
pub use node::{ITEMS_FILE, ItemKind, ItemSpec, ItemsManifest, Panel, PanelEntry, PanelIcons, PanelId};
pub use page::{PanelPage, Slot, paginate};
pub use registry::{PanelRegistry, PanelTree, PanelTreeItem};
