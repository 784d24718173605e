//! Selection and focus state for the grid.
//!
//! Owns the selected set, the focused item and the shift anchor. Every
//! gesture commits once: a single `SelectionChanged` is published if the
//! selection or focus moved, and the ids whose cells look different are
//! returned so the caller can redraw exactly those.

use std::collections::HashSet;
use std::rc::Rc;

use tracing::trace;

use super::events::{EventBus, GridEvent};
use super::keybindings::{Direction, Modifiers, PointerButton};
use crate::models::{Media, MediaId, MediaList};

/// Bulk selection filters.
#[derive(Clone, Copy)]
pub enum SelectFilter<'a> {
    All,
    None,
    Invert,
    Inbox,
    Archived,
    Predicate(&'a dyn Fn(&Media) -> bool),
}

impl std::fmt::Debug for SelectFilter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SelectFilter::All => "All",
            SelectFilter::None => "None",
            SelectFilter::Invert => "Invert",
            SelectFilter::Inbox => "Inbox",
            SelectFilter::Archived => "Archived",
            SelectFilter::Predicate(_) => "Predicate",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct SelectionController {
    selected: HashSet<MediaId>,
    focus: Option<MediaId>,
    /// Start of the current shift range. Identity only.
    anchor: Option<MediaId>,
    bus: Rc<EventBus>,
}

impl SelectionController {
    pub fn new(bus: Rc<EventBus>) -> Self {
        Self {
            selected: HashSet::new(),
            focus: None,
            anchor: None,
            bus,
        }
    }

    pub fn is_selected(&self, id: MediaId) -> bool {
        self.selected.contains(&id)
    }

    pub fn selected(&self) -> &HashSet<MediaId> {
        &self.selected
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    pub fn focus(&self) -> Option<MediaId> {
        self.focus
    }

    pub fn anchor(&self) -> Option<MediaId> {
        self.anchor
    }

    /// Selected ids in list order.
    pub fn selected_in_order(&self, list: &MediaList) -> Vec<MediaId> {
        let mut ids: Vec<(usize, MediaId)> = self
            .selected
            .iter()
            .filter_map(|&id| list.index_of(id).map(|index| (index, id)))
            .collect();
        ids.sort_unstable();
        ids.into_iter().map(|(_, id)| id).collect()
    }

    /// Pointer click on `hit` (`None` for empty space).
    pub fn click(
        &mut self,
        list: &MediaList,
        hit: Option<MediaId>,
        button: PointerButton,
        modifiers: Modifiers,
    ) -> Vec<MediaId> {
        match button {
            PointerButton::Middle => self.clear(list),
            PointerButton::Secondary => match hit {
                Some(id) if self.selected.contains(&id) => {
                    let selected = self.selected.clone();
                    self.commit(list, selected, Some(id), self.anchor)
                }
                _ => self.primary_click(list, hit, Modifiers::empty()),
            },
            PointerButton::Primary => self.primary_click(list, hit, modifiers),
        }
    }

    fn primary_click(
        &mut self,
        list: &MediaList,
        hit: Option<MediaId>,
        modifiers: Modifiers,
    ) -> Vec<MediaId> {
        let Some(id) = hit.filter(|id| list.contains(*id)) else {
            if modifiers.ctrl() || modifiers.shift() {
                return Vec::new();
            }
            return self.clear(list);
        };

        match (modifiers.ctrl(), modifiers.shift()) {
            (false, false) => self.commit(list, HashSet::from([id]), Some(id), None),
            (true, false) => {
                let mut selected = self.selected.clone();
                let focus = if selected.remove(&id) {
                    self.focus.filter(|f| *f != id)
                } else {
                    selected.insert(id);
                    Some(id)
                };
                self.commit(list, selected, focus, None)
            }
            (ctrl, true) => {
                let Some(anchor) = self.anchor.or(self.focus) else {
                    return self.commit(list, HashSet::from([id]), Some(id), None);
                };
                let range = list.ids_between(anchor, id);
                if range.is_empty() {
                    return self.commit(list, HashSet::from([id]), Some(id), None);
                }
                let mut selected = if ctrl {
                    self.selected.clone()
                } else {
                    HashSet::new()
                };
                selected.extend(range);
                self.commit(list, selected, Some(id), Some(anchor))
            }
        }
    }

    /// Keyboard movement. Plain moves select the target, shift extends from
    /// the anchor, ctrl moves focus only.
    pub fn navigate(
        &mut self,
        list: &MediaList,
        direction: Direction,
        modifiers: Modifiers,
        columns: usize,
        page_rows: usize,
    ) -> Vec<MediaId> {
        if list.is_empty() {
            return Vec::new();
        }
        let current = self.focus.and_then(|id| list.index_of(id));
        let target_index = match current {
            Some(index) => direction.step(index, list.len(), columns, page_rows),
            None if direction == Direction::End => list.len() - 1,
            None => 0,
        };
        let Some(target) = list.get(target_index).map(Media::id) else {
            return Vec::new();
        };

        if modifiers.shift() {
            let anchor = self.anchor.or(self.focus).unwrap_or(target);
            let selected = list.ids_between(anchor, target).into_iter().collect();
            self.commit(list, selected, Some(target), Some(anchor))
        } else if modifiers.ctrl() {
            let selected = self.selected.clone();
            self.commit(list, selected, Some(target), self.anchor)
        } else {
            self.commit(list, HashSet::from([target]), Some(target), None)
        }
    }

    /// Replaces the selection in bulk. Focus survives only if still selected.
    pub fn select(&mut self, list: &MediaList, filter: SelectFilter<'_>) -> Vec<MediaId> {
        let selected: HashSet<MediaId> = match filter {
            SelectFilter::All => list.ids().collect(),
            SelectFilter::None => HashSet::new(),
            SelectFilter::Invert => list.ids().filter(|id| !self.selected.contains(id)).collect(),
            SelectFilter::Inbox => list.iter().filter(|m| m.has_inbox()).map(Media::id).collect(),
            SelectFilter::Archived => list
                .iter()
                .filter(|m| m.is_archived())
                .map(Media::id)
                .collect(),
            SelectFilter::Predicate(predicate) => list
                .iter()
                .filter(|m| predicate(m))
                .map(Media::id)
                .collect(),
        };
        let focus = self.focus.filter(|id| selected.contains(id));
        trace!(?filter, count = selected.len(), "Bulk select");
        self.commit(list, selected, focus, None)
    }

    /// Escape: drop selection, focus and anchor.
    pub fn clear(&mut self, list: &MediaList) -> Vec<MediaId> {
        self.commit(list, HashSet::new(), None, None)
    }

    /// Drops every id the list no longer holds.
    pub fn prune(&mut self, list: &MediaList) -> Vec<MediaId> {
        let selected = self
            .selected
            .iter()
            .copied()
            .filter(|id| list.contains(*id))
            .collect();
        let focus = self.focus.filter(|id| list.contains(*id));
        let anchor = self.anchor.filter(|id| list.contains(*id));
        self.commit(list, selected, focus, anchor)
    }

    /// Installs the new state, publishing once if anything visible changed.
    /// Returns the ids whose cell appearance changed.
    fn commit(
        &mut self,
        list: &MediaList,
        selected: HashSet<MediaId>,
        focus: Option<MediaId>,
        anchor: Option<MediaId>,
    ) -> Vec<MediaId> {
        let mut affected: Vec<MediaId> = self
            .selected
            .symmetric_difference(&selected)
            .copied()
            .collect();
        if self.focus != focus {
            affected.extend(self.focus);
            affected.extend(focus);
        }
        affected.sort_unstable();
        affected.dedup();

        self.anchor = anchor;
        if affected.is_empty() {
            return affected;
        }

        self.selected = selected;
        self.focus = focus;
        self.bus.publish(GridEvent::SelectionChanged {
            selected: self.selected_in_order(list),
            focused: self.focus,
        });
        affected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CollectKey, MediaResult, SortBy, SortKey};
    use crate::ui::events::recording_bus;
    use std::cell::RefCell;

    const NONE: Modifiers = Modifiers::empty();

    /// Ten items whose ids equal their sorted positions.
    fn setup() -> (MediaList, SelectionController, Rc<RefCell<Vec<GridEvent>>>) {
        let (bus, log) = recording_bus();
        let mut list = MediaList::new(
            Rc::clone(&bus),
            SortKey::ascending(SortBy::FileSize),
            CollectKey::None,
        );
        list.add_media(
            (0..10)
                .map(|i| MediaResult::new(MediaId(i), 100 + i).with_inbox(i % 2 == 0))
                .collect(),
            false,
        );
        log.borrow_mut().clear();
        (list, SelectionController::new(bus), log)
    }

    fn ids(range: std::ops::RangeInclusive<u64>) -> HashSet<MediaId> {
        range.map(MediaId).collect()
    }

    fn selection_events(log: &Rc<RefCell<Vec<GridEvent>>>) -> usize {
        log.borrow()
            .iter()
            .filter(|e| matches!(e, GridEvent::SelectionChanged { .. }))
            .count()
    }

    fn click(sel: &mut SelectionController, list: &MediaList, id: u64, mods: Modifiers) {
        sel.click(list, Some(MediaId(id)), PointerButton::Primary, mods);
    }

    #[test]
    fn test_plain_click_selects_one() {
        let (list, mut sel, log) = setup();
        click(&mut sel, &list, 4, NONE);

        assert_eq!(sel.selected(), &ids(4..=4));
        assert_eq!(sel.focus(), Some(MediaId(4)));
        assert_eq!(sel.anchor(), None);
        assert_eq!(selection_events(&log), 1);
    }

    #[test]
    fn test_click_empty_space_clears() {
        let (list, mut sel, _) = setup();
        click(&mut sel, &list, 4, NONE);
        sel.click(&list, None, PointerButton::Primary, NONE);

        assert!(sel.selected().is_empty());
        assert_eq!(sel.focus(), None);
    }

    #[test]
    fn test_modified_click_on_empty_space_is_noop() {
        let (list, mut sel, log) = setup();
        click(&mut sel, &list, 4, NONE);
        let affected = sel.click(&list, None, PointerButton::Primary, Modifiers::CTRL);

        assert!(affected.is_empty());
        assert_eq!(sel.selected(), &ids(4..=4));
        assert_eq!(selection_events(&log), 1);
    }

    #[test]
    fn test_ctrl_click_toggle_is_its_own_inverse() {
        let (list, mut sel, _) = setup();
        click(&mut sel, &list, 1, NONE);
        click(&mut sel, &list, 3, Modifiers::CTRL);
        assert_eq!(sel.selected().len(), 2);

        click(&mut sel, &list, 5, Modifiers::CTRL);
        click(&mut sel, &list, 5, Modifiers::CTRL);
        assert_eq!(sel.selected(), &[MediaId(1), MediaId(3)].into_iter().collect());
    }

    #[test]
    fn test_ctrl_click_off_focused_clears_focus() {
        let (list, mut sel, _) = setup();
        click(&mut sel, &list, 2, NONE);
        click(&mut sel, &list, 2, Modifiers::CTRL);

        assert!(sel.selected().is_empty());
        assert_eq!(sel.focus(), None);
    }

    #[test]
    fn test_shift_click_range_scenario() {
        let (list, mut sel, _) = setup();
        click(&mut sel, &list, 2, NONE);
        click(&mut sel, &list, 7, Modifiers::SHIFT);

        assert_eq!(sel.selected(), &ids(2..=7));
        assert_eq!(sel.focus(), Some(MediaId(7)));
        assert_eq!(sel.anchor(), Some(MediaId(2)));

        // Anchor persists for the next shift-click
        click(&mut sel, &list, 4, Modifiers::SHIFT);
        assert_eq!(sel.selected(), &ids(2..=4));
        assert_eq!(sel.anchor(), Some(MediaId(2)));
    }

    #[test]
    fn test_shift_range_is_symmetric() {
        let (list, mut forward, _) = setup();
        click(&mut forward, &list, 1, NONE);
        click(&mut forward, &list, 8, Modifiers::SHIFT);

        let (list2, mut backward, _) = setup();
        click(&mut backward, &list2, 8, NONE);
        click(&mut backward, &list2, 1, Modifiers::SHIFT);

        assert_eq!(forward.selected(), backward.selected());
    }

    #[test]
    fn test_shift_click_without_focus_acts_plain() {
        let (list, mut sel, _) = setup();
        click(&mut sel, &list, 6, Modifiers::SHIFT);
        assert_eq!(sel.selected(), &ids(6..=6));
        assert_eq!(sel.anchor(), None);
    }

    #[test]
    fn test_ctrl_shift_adds_range() {
        let (list, mut sel, _) = setup();
        click(&mut sel, &list, 0, NONE);
        click(&mut sel, &list, 8, Modifiers::CTRL);
        click(&mut sel, &list, 6, Modifiers::CTRL | Modifiers::SHIFT);

        let mut expected = ids(6..=8);
        expected.insert(MediaId(0));
        assert_eq!(sel.selected(), &expected);
    }

    #[test]
    fn test_middle_click_resets_everything() {
        let (list, mut sel, _) = setup();
        click(&mut sel, &list, 2, NONE);
        click(&mut sel, &list, 5, Modifiers::SHIFT);
        sel.click(
            &list,
            Some(MediaId(3)),
            PointerButton::Middle,
            Modifiers::CTRL,
        );

        assert!(sel.selected().is_empty());
        assert_eq!(sel.focus(), None);
        assert_eq!(sel.anchor(), None);
    }

    #[test]
    fn test_right_click_on_selected_only_moves_focus() {
        let (list, mut sel, _) = setup();
        click(&mut sel, &list, 2, NONE);
        click(&mut sel, &list, 5, Modifiers::SHIFT);
        sel.click(&list, Some(MediaId(3)), PointerButton::Secondary, NONE);

        assert_eq!(sel.selected(), &ids(2..=5));
        assert_eq!(sel.focus(), Some(MediaId(3)));

        sel.click(&list, Some(MediaId(9)), PointerButton::Secondary, NONE);
        assert_eq!(sel.selected(), &ids(9..=9));
    }

    #[test]
    fn test_bulk_filters() {
        let (list, mut sel, _) = setup();
        click(&mut sel, &list, 3, NONE);

        sel.select(&list, SelectFilter::Inbox);
        assert_eq!(sel.selected().len(), 5);
        // 3 is odd, so not inbox: focus falls outside the new set
        assert_eq!(sel.focus(), None);

        sel.select(&list, SelectFilter::Invert);
        assert!(sel.selected().iter().all(|id| id.0 % 2 == 1));

        let big = |m: &Media| m.size() >= 108;
        sel.select(&list, SelectFilter::Predicate(&big));
        assert_eq!(sel.selected(), &ids(8..=9));

        sel.select(&list, SelectFilter::All);
        assert_eq!(sel.selected_count(), 10);
        sel.select(&list, SelectFilter::None);
        assert!(sel.selected().is_empty());
    }

    #[test]
    fn test_unchanged_state_publishes_nothing() {
        let (list, mut sel, log) = setup();
        click(&mut sel, &list, 4, NONE);
        let affected = sel.click(&list, Some(MediaId(4)), PointerButton::Primary, NONE);

        assert!(affected.is_empty());
        assert_eq!(selection_events(&log), 1);
    }

    #[test]
    fn test_affected_ids_cover_old_and_new() {
        let (list, mut sel, _) = setup();
        click(&mut sel, &list, 2, NONE);
        let affected = sel.click(&list, Some(MediaId(7)), PointerButton::Primary, NONE);
        assert_eq!(affected, vec![MediaId(2), MediaId(7)]);
    }

    #[test]
    fn test_navigate_moves_and_extends() {
        let (list, mut sel, _) = setup();
        // No focus yet: first move lands on the first item
        sel.navigate(&list, Direction::Right, NONE, 3, 2);
        assert_eq!(sel.focus(), Some(MediaId(0)));

        sel.navigate(&list, Direction::Down, NONE, 3, 2);
        assert_eq!(sel.selected(), &ids(3..=3));

        sel.navigate(&list, Direction::Right, Modifiers::SHIFT, 3, 2);
        sel.navigate(&list, Direction::Right, Modifiers::SHIFT, 3, 2);
        assert_eq!(sel.selected(), &ids(3..=5));
        assert_eq!(sel.anchor(), Some(MediaId(3)));

        sel.navigate(&list, Direction::Down, Modifiers::CTRL, 3, 2);
        assert_eq!(sel.focus(), Some(MediaId(8)));
        assert_eq!(sel.selected(), &ids(3..=5));
    }

    #[test]
    fn test_prune_removed_emits_once() {
        let (mut list, mut sel, log) = setup();
        click(&mut sel, &list, 2, NONE);
        click(&mut sel, &list, 5, Modifiers::SHIFT);
        log.borrow_mut().clear();

        let removed: Vec<MediaId> = ids(2..=5).into_iter().collect();
        list.remove_media(&removed);
        sel.prune(&list);

        assert!(sel.selected().is_empty());
        assert_eq!(sel.focus(), None);
        assert_eq!(sel.anchor(), None);
        assert_eq!(selection_events(&log), 1);
    }
}
