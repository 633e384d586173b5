//! The panel tree: loading, navigation and key routing.
//!
//! Panels live in an arena owned by [`PanelRegistry`]; exactly one panel is
//! active at a time and only its current page is shown on the deck.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::button::{Button, ItemContext};
use super::factory::{ButtonFactory, ButtonSpec};
use super::node::{ItemKind, ItemSpec, ItemsManifest, Panel, PanelEntry, PanelIcons, PanelId};
use super::page::Slot;
use crate::comm::{Event, EventBus, EventData, EventType};
use crate::deck::{DeckRenderer, KeyDisplay};
use crate::error::{DpError, Result};

const ROOT: PanelId = PanelId(0);
const ROOT_NAME: &str = "root";

/// Upper bound on chained dispatches triggered by a single hook.
const MAX_DISPATCHES: usize = 64;

/// Serializable view of the panel tree.
#[derive(Debug, Clone, Serialize)]
pub struct PanelTree {
    pub name: String,
    pub path: String,
    pub pages: usize,
    pub current_page: usize,
    pub active: bool,
    pub items: Vec<PanelTreeItem>,
    pub children: Vec<PanelTree>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PanelTreeItem {
    pub name: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
}

/// Owns every panel and routes input to the active one.
pub struct PanelRegistry {
    panels: Vec<Panel>,
    active: PanelId,
    renderer: Arc<DeckRenderer>,
    factory: Arc<ButtonFactory>,
    bus: EventBus,
}

impl PanelRegistry {
    /// A registry holding only an empty root panel.
    pub fn new(renderer: Arc<DeckRenderer>, factory: Arc<ButtonFactory>, bus: EventBus) -> Result<Self> {
        let mut root = Panel::new(ROOT_NAME, None, None, PanelIcons::default());
        root.repaginate(usize::from(renderer.key_count()))?;
        Ok(Self {
            panels: vec![root],
            active: ROOT,
            renderer,
            factory,
            bus,
        })
    }

    /// Build the tree rooted at `root_dir`.
    #[instrument(skip(renderer, factory, bus))]
    pub fn load(
        root_dir: Option<&Path>,
        renderer: Arc<DeckRenderer>,
        factory: Arc<ButtonFactory>,
        bus: EventBus,
    ) -> Result<Self> {
        let mut registry = Self::new(renderer, factory, bus)?;
        if let Some(dir) = root_dir {
            if !dir.is_dir() {
                return Err(DpError::PanelLoad {
                    panel: ROOT_NAME.to_string(),
                    reason: format!("directory {} does not exist", dir.display()),
                });
            }
            let manifest = ItemsManifest::load(ROOT_NAME, dir)?;
            registry.panels[ROOT.0].directory = Some(dir.to_path_buf());
            registry.populate(ROOT, dir, manifest);
        }
        info!(panels = registry.panels.len(), "Panel tree loaded");
        Ok(registry)
    }

    fn populate(&mut self, id: PanelId, dir: &Path, manifest: ItemsManifest) {
        for spec in manifest.items {
            let name = spec.name.clone();
            if let Err(e) = self.add_item(id, dir, spec) {
                warn!(panel = %self.panels[id.0].name, item = %name, error = %e, "Skipping item");
            }
        }
    }

    fn add_item(&mut self, id: PanelId, dir: &Path, spec: ItemSpec) -> Result<()> {
        let panel = &self.panels[id.0];
        if panel.entry(&spec.name).is_some() {
            return Err(DpError::DuplicateItem {
                panel: panel.name.clone(),
                name: spec.name,
            });
        }
        match spec.kind {
            ItemKind::Button => {
                let button_spec = ButtonSpec {
                    class: spec.class.unwrap_or_else(|| "button".to_string()),
                    name: spec.name,
                    params: spec.params,
                    icon: spec.icon,
                    icon_pressed: spec.icon_pressed,
                };
                let button = self.factory.create(&panel.name, &button_spec)?;
                self.add_button(id, &button_spec.name, button)
            }
            ItemKind::Panel => {
                let path = dir.join(spec.path.unwrap_or_else(|| PathBuf::from(&spec.name)));
                let icons = PanelIcons::new(spec.icon, spec.icon_pressed);
                self.mount_panel(id, &spec.name, &path, icons).map(|_| ())
            }
        }
    }

    fn capacity(&self) -> usize {
        usize::from(self.renderer.key_count())
    }

    /// Add a button to `panel`.
    pub fn add_button(&mut self, panel: PanelId, name: &str, button: Box<dyn Button>) -> Result<()> {
        let capacity = self.capacity();
        let target = self.panel_mut(panel)?;
        target.push_entry(PanelEntry::Button {
            name: name.to_string(),
            button,
        })?;
        target.repaginate(capacity)?;
        debug!(panel = %target.name, item = name, "Button added");
        Ok(())
    }

    /// Build a panel from `dir` and mount it under `parent` as `name`.
    #[instrument(skip(self, icons))]
    pub fn mount_panel(&mut self, parent: PanelId, name: &str, dir: &Path, icons: PanelIcons) -> Result<PanelId> {
        let capacity = self.capacity();
        let parent_panel = self.panel(parent)?;
        if parent_panel.entry(name).is_some() {
            return Err(DpError::DuplicateItem {
                panel: parent_panel.name.clone(),
                name: name.to_string(),
            });
        }
        if !dir.is_dir() {
            return Err(DpError::PanelLoad {
                panel: name.to_string(),
                reason: format!("directory {} does not exist", dir.display()),
            });
        }
        if let Some(ancestor) = self.ancestor_loaded_from(parent, dir) {
            return Err(DpError::PanelLoad {
                panel: name.to_string(),
                reason: format!("directory {} is already loaded by '{ancestor}'", dir.display()),
            });
        }
        let manifest = ItemsManifest::load(name, dir)?;

        let id = PanelId(self.panels.len());
        let mut panel = Panel::new(name, Some(dir.to_path_buf()), Some(parent), icons);
        panel.repaginate(capacity)?;
        self.panels.push(panel);

        let parent_panel = &mut self.panels[parent.0];
        parent_panel.push_entry(PanelEntry::Panel {
            name: name.to_string(),
            id,
        })?;
        parent_panel.repaginate(capacity)?;

        self.populate(id, dir, manifest);
        info!(panel = name, directory = %dir.display(), "Panel mounted");
        Ok(id)
    }

    /// Name of the panel on the path from `from` up to the root whose
    /// directory resolves to the same place as `dir`.
    fn ancestor_loaded_from(&self, from: PanelId, dir: &Path) -> Option<&str> {
        let target = dir.canonicalize().ok()?;
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            let panel = &self.panels[id.0];
            let same = panel
                .directory
                .as_deref()
                .and_then(|d| d.canonicalize().ok())
                .is_some_and(|d| d == target);
            if same {
                return Some(&panel.name);
            }
            cursor = panel.parent;
        }
        None
    }

    // === Lookup ===

    pub const fn root(&self) -> PanelId {
        ROOT
    }

    pub const fn active(&self) -> PanelId {
        self.active
    }

    pub fn active_panel(&self) -> &Panel {
        &self.panels[self.active.0]
    }

    pub fn panel(&self, id: PanelId) -> Result<&Panel> {
        self.panels.get(id.0).ok_or_else(|| DpError::PanelNotFound {
            path: format!("#{}", id.0),
        })
    }

    fn panel_mut(&mut self, id: PanelId) -> Result<&mut Panel> {
        self.panels.get_mut(id.0).ok_or_else(|| DpError::PanelNotFound {
            path: format!("#{}", id.0),
        })
    }

    pub fn panel_count(&self) -> usize {
        self.panels.len()
    }

    pub const fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub const fn renderer(&self) -> &Arc<DeckRenderer> {
        &self.renderer
    }

    /// Resolve a `/`-separated panel path. `""`, `"/"` and `"root"` are the root.
    pub fn find(&self, path: &str) -> Result<PanelId> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        self.find_path(&segments).ok_or_else(|| DpError::PanelNotFound {
            path: path.to_string(),
        })
    }

    /// Resolve a list of panel names from the root.
    pub fn find_path(&self, segments: &[&str]) -> Option<PanelId> {
        let segments = match segments.first() {
            Some(&ROOT_NAME) => &segments[1..],
            _ => segments,
        };
        segments
            .iter()
            .try_fold(ROOT, |id, name| self.panels[id.0].child(name))
    }

    /// `/`-joined names from the root to `id`.
    pub fn path_of(&self, id: PanelId) -> String {
        let mut names = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let panel = &self.panels[current.0];
            if panel.parent.is_some() {
                names.push(panel.name.as_str());
            }
            cursor = panel.parent;
        }
        names.reverse();
        format!("/{}", names.join("/"))
    }

    // === Events ===

    fn emit(&self, topic: EventType, data: EventData) {
        let source = self.active_panel().name.clone();
        self.bus.publish(&Event::new(topic, data).from_source(source));
    }

    fn item_event(&self, topic: EventType, index: usize, key: u8) {
        let panel = self.active_panel();
        let item = panel.entries()[index].name().to_string();
        let data = EventData::Item {
            panel: panel.name.clone(),
            item,
            key,
        };
        self.emit(topic, data);
    }

    // === Button hooks ===

    /// Key currently showing entry `index` of panel `id`.
    fn key_of(&self, id: PanelId, index: usize) -> Option<u8> {
        if id != self.active {
            return None;
        }
        self.panels[id.0]
            .page()
            .slots
            .iter()
            .position(|slot| *slot == Slot::Entry(index))
            .and_then(|key| u8::try_from(key).ok())
    }

    /// Run `f` on button `index` of panel `id`, then deliver its outbox.
    fn with_button<R>(
        &mut self,
        id: PanelId,
        index: usize,
        f: impl FnOnce(&mut dyn Button, &mut ItemContext<'_>) -> R,
    ) -> Option<R> {
        let key = self.key_of(id, index);
        let panel_name = self.panels[id.0].name.clone();
        let (result, item, outbox) = match &mut self.panels[id.0].entries_mut()[index] {
            PanelEntry::Button { name, button } => {
                let mut ctx = ItemContext::new(name, &panel_name, key, &self.bus);
                let result = f(button.as_mut(), &mut ctx);
                let outbox = ctx.take_outbox();
                (result, name.clone(), outbox)
            }
            PanelEntry::Panel { .. } => return None,
        };
        for data in outbox {
            self.dispatch(id, &item, data);
        }
        Some(result)
    }

    /// Deliver `data` to every button of `panel`.
    pub fn dispatch(&mut self, panel: PanelId, source: &str, data: Value) {
        let mut queue = VecDeque::from([(source.to_string(), data)]);
        let mut delivered = 0;
        let keys: Vec<Option<u8>> = (0..self.panels[panel.0].entries().len())
            .map(|index| self.key_of(panel, index))
            .collect();
        let panel_name = self.panels[panel.0].name.clone();

        while let Some((source, data)) = queue.pop_front() {
            if delivered == MAX_DISPATCHES {
                warn!(panel = %panel_name, "Dispatch limit reached, dropping the rest");
                break;
            }
            delivered += 1;
            debug!(panel = %panel_name, source = %source, %data, "Dispatching");
            for (index, entry) in self.panels[panel.0].entries_mut().iter_mut().enumerate() {
                if let PanelEntry::Button { name, button } = entry {
                    let mut ctx = ItemContext::new(name, &panel_name, keys[index], &self.bus);
                    button.on_dispatch(&mut ctx, &source, &data);
                    queue.extend(ctx.take_outbox().into_iter().map(|out| (name.clone(), out)));
                }
            }
        }
    }

    // === Rendering ===

    fn draw(&self, key: u8, display: &KeyDisplay) {
        if let Err(e) = self.renderer.render_key(key, display) {
            warn!(key, error = %e, "Failed to render key");
        }
    }

    fn slot_display(&mut self, key: u8, slot: Slot, pressed: bool) -> Option<KeyDisplay> {
        let id = self.active;
        let icon = |name: &str| {
            if pressed {
                KeyDisplay::icon(format!("{name}_pressed"))
            } else {
                KeyDisplay::icon(name)
            }
        };
        match slot {
            Slot::Parent => Some(icon("parent")),
            Slot::NextPage => Some(icon("next_page")),
            Slot::PreviousPage => Some(icon("previous_page")),
            Slot::Entry(index) => match &self.panels[id.0].entries()[index] {
                PanelEntry::Panel { name, id: child } => {
                    let icons = &self.panels[child.0].icons;
                    let icon = if pressed { &icons.pressed } else { &icons.icon };
                    Some(KeyDisplay::icon(icon).with_text(name))
                }
                PanelEntry::Button { .. } if pressed => {
                    let result = self.with_button(id, index, |button, ctx| button.on_pressed(ctx))?;
                    result.unwrap_or_else(|e| {
                        warn!(key, error = %e, "on_pressed failed");
                        None
                    })
                }
                PanelEntry::Button { .. } => self.with_button(id, index, |button, ctx| button.on_rendered(ctx)),
            },
        }
    }

    /// Clear the deck and draw the current page of the active panel.
    #[instrument(skip(self), fields(panel = %self.active_panel().name))]
    pub fn render(&mut self) {
        if let Err(e) = self.renderer.clear_deck() {
            warn!(error = %e, "Failed to clear deck");
        }
        let slots = self.active_panel().page().slots.clone();
        for (key, slot) in slots.into_iter().enumerate() {
            let Ok(key) = u8::try_from(key) else { break };
            if let Some(display) = self.slot_display(key, slot, false) {
                self.draw(key, &display);
            }
            if let Slot::Entry(index) = slot {
                self.item_event(EventType::ItemRendered, index, key);
            }
        }
        let panel = self.active_panel().name.clone();
        self.emit(EventType::PanelRendered, EventData::Panel { panel });
    }

    // === Navigation ===

    /// Make `id` the active panel, starting at its first page.
    pub fn activate(&mut self, id: PanelId) -> Result<()> {
        self.panel(id)?;
        let old = self.active_panel().name.clone();
        self.emit(EventType::PanelDeactivated, EventData::Panel { panel: old });
        self.active = id;
        self.panels[id.0].set_page(0);
        let panel = self.active_panel().name.clone();
        info!(panel = %panel, "Panel activated");
        self.emit(EventType::PanelActivated, EventData::Panel { panel });
        self.render();
        Ok(())
    }

    /// Go to the parent of the active panel. Returns false at the root.
    pub fn go_to_parent(&mut self) -> bool {
        match self.active_panel().parent {
            Some(parent) => self.activate(parent).is_ok(),
            None => false,
        }
    }

    pub fn next_page(&mut self) -> bool {
        let changed = self.panels[self.active.0].next_page();
        self.page_changed(changed)
    }

    pub fn previous_page(&mut self) -> bool {
        let changed = self.panels[self.active.0].previous_page();
        self.page_changed(changed)
    }

    /// Jump to a page of the active panel.
    pub fn set_page(&mut self, page: usize) -> bool {
        let changed = self.panels[self.active.0].set_page(page);
        self.page_changed(changed)
    }

    fn page_changed(&mut self, changed: Option<(usize, usize)>) -> bool {
        let Some((old, new)) = changed else {
            return false;
        };
        let panel = self.active_panel().name.clone();
        debug!(panel = %panel, old, new, "Page changed");
        self.emit(EventType::PanelPageChanged, EventData::PageChange { panel, old, new });
        self.render();
        true
    }

    // === Input ===

    /// Route a key transition to the active panel.
    #[instrument(skip(self), fields(panel = %self.active_panel().name))]
    pub fn handle_key(&mut self, key: u8, pressed: bool) {
        let Some(slot) = self.active_panel().item_at(usize::from(key)) else {
            debug!("No item on key");
            return;
        };

        if pressed {
            if let Some(display) = self.slot_display(key, slot, true) {
                self.draw(key, &display);
            }
            if let Slot::Entry(index) = slot {
                self.item_event(EventType::ItemPressed, index, key);
            }
            return;
        }

        let panel = self.active_panel().name.clone();
        match slot {
            Slot::Parent => {
                self.emit(EventType::PanelParent, EventData::Panel { panel });
                self.go_to_parent();
            }
            Slot::NextPage => {
                self.emit(EventType::PanelNextPage, EventData::Panel { panel });
                self.next_page();
            }
            Slot::PreviousPage => {
                self.emit(EventType::PanelPreviousPage, EventData::Panel { panel });
                self.previous_page();
            }
            Slot::Entry(index) => {
                self.item_event(EventType::ItemReleased, index, key);
                match &self.active_panel().entries()[index] {
                    PanelEntry::Panel { id, .. } => {
                        let child = *id;
                        if let Err(e) = self.activate(child) {
                            warn!(error = %e, "Cannot open panel");
                        }
                    }
                    PanelEntry::Button { .. } => {
                        let active = self.active;
                        match self.with_button(active, index, |button, ctx| button.on_released(ctx)) {
                            Some(Ok(Some(display))) => self.draw(key, &display),
                            Some(Err(e)) => warn!(error = %e, "on_released failed"),
                            _ => {}
                        }
                    }
                }
            }
        }
    }

    /// Clock tick for the buttons on the visible page.
    pub fn tick(&mut self, time_i: u64, time_count: u64) {
        let id = self.active;
        let slots = self.active_panel().page().slots.clone();
        for (key, slot) in slots.into_iter().enumerate() {
            let (Slot::Entry(index), Ok(key)) = (slot, u8::try_from(key)) else {
                continue;
            };
            if let Some(Some(display)) =
                self.with_button(id, index, |button, ctx| button.on_tick(ctx, time_i, time_count))
            {
                self.draw(key, &display);
            }
        }
    }

    /// Hidden tick for every button of the tree.
    pub fn internal_tick(&mut self, time_i: u64, time_count: u64) {
        for panel in 0..self.panels.len() {
            for index in 0..self.panels[panel].entries().len() {
                self.with_button(PanelId(panel), index, |button, ctx| {
                    button.on_internal_tick(ctx, time_i, time_count);
                });
            }
        }
    }

    // === Introspection ===

    pub fn structure(&self) -> PanelTree {
        self.subtree(ROOT)
    }

    fn subtree(&self, id: PanelId) -> PanelTree {
        let panel = &self.panels[id.0];
        PanelTree {
            name: panel.name.clone(),
            path: self.path_of(id),
            pages: panel.pages().len(),
            current_page: panel.current_page(),
            active: id == self.active,
            items: panel
                .entries()
                .iter()
                .map(|entry| match entry {
                    PanelEntry::Button { name, button } => PanelTreeItem {
                        name: name.clone(),
                        kind: "button",
                        class: Some(button.class().to_string()),
                    },
                    PanelEntry::Panel { name, .. } => PanelTreeItem {
                        name: name.clone(),
                        kind: "panel",
                        class: None,
                    },
                })
                .collect(),
            children: panel.children().map(|child| self.subtree(child)).collect(),
        }
    }
}
