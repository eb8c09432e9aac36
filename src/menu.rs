//! Menu tree for the shell, rebuilt from the [`ViewModel`] after every state change.

use crate::session::{ViewModel, ViewState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Refresh,
    SelectCamera(usize),
    ClosePreview,
    ExportCameras,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub label: String,
    pub accelerator: Option<&'static str>,
    pub action: Option<MenuAction>,
    pub enabled: bool,
    pub checked: bool,
    pub submenu: Vec<MenuItem>,
}

impl MenuItem {
    fn action(label: impl Into<String>, action: MenuAction) -> Self {
        Self {
            label: label.into(),
            accelerator: None,
            action: Some(action),
            enabled: true,
            checked: false,
            submenu: Vec::new(),
        }
    }

    fn submenu(label: impl Into<String>, submenu: Vec<MenuItem>) -> Self {
        Self {
            label: label.into(),
            accelerator: None,
            action: None,
            enabled: true,
            checked: false,
            submenu,
        }
    }

    /// A disabled line of text.
    fn note(label: impl Into<String>) -> Self {
        Self {
            enabled: false,
            ..Self::submenu(label, Vec::new())
        }
    }

    fn separator() -> Self {
        Self::note("")
    }

    pub fn is_separator(&self) -> bool {
        self.label.is_empty() && self.action.is_none() && self.submenu.is_empty()
    }

    fn accelerator(mut self, accelerator: &'static str) -> Self {
        self.accelerator = Some(accelerator);
        self
    }

    fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    fn checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    /// Depth-first search for the item bound to `action`.
    pub fn find(items: &[MenuItem], action: MenuAction) -> Option<&MenuItem> {
        items.iter().find_map(|item| {
            if item.action == Some(action) {
                Some(item)
            } else {
                Self::find(&item.submenu, action)
            }
        })
    }
}

/// Builds the complete menu bar for `view`.
pub fn render(view: &ViewModel) -> Vec<MenuItem> {
    let file = MenuItem::submenu(
        "File",
        vec![
            MenuItem::action("Export Camera Data...", MenuAction::ExportCameras)
                .accelerator("CmdOrCtrl+E")
                .enabled(!view.cameras.is_empty()),
            MenuItem::separator(),
            MenuItem::action("Quit", MenuAction::Quit).accelerator("CmdOrCtrl+Q"),
        ],
    );

    let mut cameras = vec![
        MenuItem::action("Refresh", MenuAction::Refresh)
            .accelerator("CmdOrCtrl+R")
            .enabled(!view.refreshing),
        MenuItem::separator(),
    ];
    match &view.state {
        ViewState::Loading => cameras.push(MenuItem::note("Scanning for cameras...")),
        ViewState::Empty => cameras.push(MenuItem::note("No cameras found")),
        ViewState::Error(_) => cameras.push(MenuItem::note("Camera discovery failed")),
        ViewState::CameraList => {}
    }
    if view.state != ViewState::Loading {
        cameras.extend(view.cameras.iter().enumerate().map(|(i, cam)| {
            MenuItem::action(
                format!("{} ({}:{})", cam.name(), cam.vendor_hex(), cam.product_hex()),
                MenuAction::SelectCamera(i),
            )
            .checked(view.is_previewing(cam))
        }));
    }

    let mut view_items = vec![MenuItem::action("Close Preview", MenuAction::ClosePreview)
        .accelerator("Escape")
        .enabled(view.preview.is_some())];
    if view.preview_error.is_some() {
        view_items.push(MenuItem::note("Preview unavailable"));
    }
    let view_menu = MenuItem::submenu("View", view_items);

    vec![file, MenuItem::submenu("Cameras", cameras), view_menu]
}
