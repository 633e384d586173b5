//! Panel nodes and the `items.toml` manifest that describes them.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};

use super::button::Button;
use super::page::{PanelPage, Slot, paginate};
use crate::error::{DpError, Result};

/// Manifest file read from every panel directory.
pub const ITEMS_FILE: &str = "items.toml";

/// Index of a panel in the registry arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PanelId(pub(crate) usize);

/// Kind of an `[[items]]` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Button,
    Panel,
}

/// One `[[items]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemSpec {
    pub name: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: ItemKind,
    pub class: Option<String>,
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub params: Map<String, Value>,
    pub icon: Option<String>,
    pub icon_pressed: Option<String>,
}

const fn default_kind() -> ItemKind {
    ItemKind::Button
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemsManifest {
    #[serde(default)]
    pub items: Vec<ItemSpec>,
}

impl ItemsManifest {
    /// Read `<dir>/items.toml`; a missing file is an empty manifest.
    pub fn load(panel: &str, dir: &Path) -> Result<Self> {
        let path = dir.join(ITEMS_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)?;
        toml::from_str(&text).map_err(|e| DpError::PanelLoad {
            panel: panel.to_string(),
            reason: format!("{}: {e}", path.display()),
        })
    }
}

/// Icons used when a panel is shown as an item of its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelIcons {
    pub icon: String,
    pub pressed: String,
}

impl Default for PanelIcons {
    fn default() -> Self {
        Self {
            icon: "default_panel".to_string(),
            pressed: "default_panel_pressed".to_string(),
        }
    }
}

impl PanelIcons {
    pub fn new(icon: Option<String>, pressed: Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            icon: icon.unwrap_or(defaults.icon),
            pressed: pressed.unwrap_or(defaults.pressed),
        }
    }
}

/// A named child of a panel.
pub enum PanelEntry {
    Button { name: String, button: Box<dyn Button> },
    Panel { name: String, id: PanelId },
}

impl PanelEntry {
    pub fn name(&self) -> &str {
        match self {
            Self::Button { name, .. } | Self::Panel { name, .. } => name,
        }
    }
}

/// A node of the panel tree.
pub struct Panel {
    pub name: String,
    pub directory: Option<PathBuf>,
    pub parent: Option<PanelId>,
    pub icons: PanelIcons,
    entries: Vec<PanelEntry>,
    pages: Vec<PanelPage>,
    current_page: usize,
}

impl Panel {
    pub(crate) fn new(name: impl Into<String>, directory: Option<PathBuf>, parent: Option<PanelId>, icons: PanelIcons) -> Self {
        Self {
            name: name.into(),
            directory,
            parent,
            icons,
            entries: Vec::new(),
            pages: vec![PanelPage::default()],
            current_page: 0,
        }
    }

    pub fn entries(&self) -> &[PanelEntry] {
        &self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [PanelEntry] {
        &mut self.entries
    }

    pub fn entry(&self, name: &str) -> Option<&PanelEntry> {
        self.entries.iter().find(|e| e.name() == name)
    }

    pub fn child(&self, name: &str) -> Option<PanelId> {
        self.entries.iter().find_map(|e| match e {
            PanelEntry::Panel { name: n, id } if n == name => Some(*id),
            _ => None,
        })
    }

    pub fn children(&self) -> impl Iterator<Item = PanelId> + '_ {
        self.entries.iter().filter_map(|e| match e {
            PanelEntry::Panel { id, .. } => Some(*id),
            PanelEntry::Button { .. } => None,
        })
    }

    /// Append an entry, rejecting duplicate names.
    pub(crate) fn push_entry(&mut self, entry: PanelEntry) -> Result<()> {
        if self.entry(entry.name()).is_some() {
            return Err(DpError::DuplicateItem {
                panel: self.name.clone(),
                name: entry.name().to_string(),
            });
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Rebuild pages for a deck with `capacity` keys.
    pub(crate) fn repaginate(&mut self, capacity: usize) -> Result<()> {
        self.pages = paginate(self.entries.len(), capacity, self.parent.is_some())?;
        self.current_page = self.current_page.min(self.pages.len() - 1);
        Ok(())
    }

    pub fn pages(&self) -> &[PanelPage] {
        &self.pages
    }

    pub const fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page(&self) -> &PanelPage {
        &self.pages[self.current_page]
    }

    pub fn item_at(&self, key: usize) -> Option<Slot> {
        self.page().get(key)
    }

    /// Jump to `page`. Returns `(old, new)` when the page changed.
    pub(crate) fn set_page(&mut self, page: usize) -> Option<(usize, usize)> {
        if page >= self.pages.len() || page == self.current_page {
            return None;
        }
        let old = self.current_page;
        self.current_page = page;
        Some((old, page))
    }

    pub(crate) fn next_page(&mut self) -> Option<(usize, usize)> {
        self.set_page(self.current_page + 1)
    }

    pub(crate) fn previous_page(&mut self) -> Option<(usize, usize)> {
        self.current_page.checked_sub(1).and_then(|p| self.set_page(p))
    }
}
