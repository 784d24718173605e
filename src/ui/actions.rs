//! Resolved commands and their dispatch.
//!
//! Menus and the binding table produce an [`Action`]; the dispatcher maps it
//! onto the grid or forwards it to the host through [`ExternalActions`].

use std::collections::HashMap;
use std::rc::Rc;

use once_cell::sync::Lazy;
use tracing::{debug, trace};

use super::grid::ThumbnailGrid;
use super::keybindings::{Direction, Modifiers};
use super::selection::SelectFilter;
use crate::models::MediaId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Move focus and select only the target.
    Navigate(Direction),
    /// Extend the range from the anchor.
    Extend(Direction),
    /// Move focus, leave the selection alone.
    MoveFocus(Direction),
    SelectAll,
    SelectNone,
    InvertSelection,
    SelectInbox,
    SelectArchived,
    /// Drop the selected media from this view only.
    RemoveSelected,
    ArchiveSelected,
    InboxSelected,
    DeleteSelected,
    ExportSelection,
    OpenInNewPage,
    OpenFocused,
    /// Throw away and reload the selected thumbnails.
    RefreshThumbnails,
    ClearSelection,
}

static COMMANDS: Lazy<HashMap<&'static str, Action>> = Lazy::new(|| {
    HashMap::from([
        ("move_up", Action::Navigate(Direction::Up)),
        ("move_down", Action::Navigate(Direction::Down)),
        ("move_left", Action::Navigate(Direction::Left)),
        ("move_right", Action::Navigate(Direction::Right)),
        ("move_home", Action::Navigate(Direction::Home)),
        ("move_end", Action::Navigate(Direction::End)),
        ("move_page_up", Action::Navigate(Direction::PageUp)),
        ("move_page_down", Action::Navigate(Direction::PageDown)),
        ("select_all", Action::SelectAll),
        ("select_none", Action::SelectNone),
        ("invert_selection", Action::InvertSelection),
        ("select_inbox", Action::SelectInbox),
        ("select_archived", Action::SelectArchived),
        ("remove_selected", Action::RemoveSelected),
        ("archive", Action::ArchiveSelected),
        ("inbox", Action::InboxSelected),
        ("delete", Action::DeleteSelected),
        ("export_selection", Action::ExportSelection),
        ("open_in_new_page", Action::OpenInNewPage),
        ("open", Action::OpenFocused),
        ("refresh_thumbnails", Action::RefreshThumbnails),
        ("clear_selection", Action::ClearSelection),
    ])
});

/// Operations the grid hands to the surrounding application.
///
/// File ids are flattened: a selected collection contributes its members.
pub trait ExternalActions {
    fn archive(&self, _files: &[MediaId]) {}
    fn inbox(&self, _files: &[MediaId]) {}
    fn delete(&self, _files: &[MediaId]) {}
    fn export(&self, _files: &[MediaId]) {}
    fn open_in_new_page(&self, _files: &[MediaId]) {}
    fn open(&self, _media: MediaId) {}
}

/// Host with no external handlers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoExternalActions;

impl ExternalActions for NoExternalActions {}

/// Stateless mapping from actions to grid operations.
#[derive(Clone)]
pub struct ActionDispatcher {
    external: Rc<dyn ExternalActions>,
}

impl ActionDispatcher {
    pub fn new(external: Rc<dyn ExternalActions>) -> Self {
        Self { external }
    }

    pub fn resolve_command(command: &str) -> Option<Action> {
        COMMANDS.get(command).copied()
    }

    /// Runs a named command. Unknown names do nothing and return false.
    pub fn dispatch_command(&self, grid: &mut ThumbnailGrid, command: &str) -> bool {
        match Self::resolve_command(command) {
            Some(action) => {
                self.dispatch(grid, action);
                true
            }
            None => {
                debug!(command, "Ignoring unknown command");
                false
            }
        }
    }

    pub fn dispatch(&self, grid: &mut ThumbnailGrid, action: Action) {
        trace!(?action, "Dispatching action");
        match action {
            Action::Navigate(direction) => grid.navigate(direction, Modifiers::empty()),
            Action::Extend(direction) => grid.navigate(direction, Modifiers::SHIFT),
            Action::MoveFocus(direction) => grid.navigate(direction, Modifiers::CTRL),
            Action::SelectAll => grid.select(SelectFilter::All),
            Action::SelectNone => grid.select(SelectFilter::None),
            Action::InvertSelection => grid.select(SelectFilter::Invert),
            Action::SelectInbox => grid.select(SelectFilter::Inbox),
            Action::SelectArchived => grid.select(SelectFilter::Archived),
            Action::RemoveSelected => {
                let selected = grid.selected_ids();
                grid.remove_media(&selected);
            }
            Action::ArchiveSelected => self.forward(grid, |ext, files| ext.archive(files)),
            Action::InboxSelected => self.forward(grid, |ext, files| ext.inbox(files)),
            Action::DeleteSelected => self.forward(grid, |ext, files| ext.delete(files)),
            Action::ExportSelection => self.forward(grid, |ext, files| ext.export(files)),
            Action::OpenInNewPage => {
                self.forward(grid, |ext, files| ext.open_in_new_page(files))
            }
            Action::OpenFocused => {
                if let Some(focused) = grid.focused() {
                    self.external.open(focused);
                }
            }
            Action::RefreshThumbnails => {
                let selected = grid.selected_ids();
                grid.refresh_thumbnails(&selected);
            }
            Action::ClearSelection => grid.clear_selection(),
        }
    }

    fn forward(&self, grid: &ThumbnailGrid, send: impl FnOnce(&dyn ExternalActions, &[MediaId])) {
        let files = grid.selected_files();
        if !files.is_empty() {
            send(self.external.as_ref(), &files);
        }
    }
}

impl Default for ActionDispatcher {
    fn default() -> Self {
        Self::new(Rc::new(NoExternalActions))
    }
}

impl std::fmt::Debug for ActionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDispatcher").finish_non_exhaustive()
    }
}
