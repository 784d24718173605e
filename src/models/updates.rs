//! Content and service notifications pushed by the data layer.

use tracing::{debug, warn};

use super::media::{MediaId, MediaResult};
use super::media_list::{ListChange, MediaList};
use crate::error::GridError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentUpdateKind {
    Add,
    Delete,
    Archive,
    Inbox,
    Pending,
    Petition,
}

impl ContentUpdateKind {
    fn name(self) -> &'static str {
        match self {
            ContentUpdateKind::Add => "add",
            ContentUpdateKind::Delete => "delete",
            ContentUpdateKind::Archive => "archive",
            ContentUpdateKind::Inbox => "inbox",
            ContentUpdateKind::Pending => "pending",
            ContentUpdateKind::Petition => "petition",
        }
    }
}

#[derive(Debug, Clone)]
pub enum ContentPayload {
    None,
    /// Freshly read records, for `Add`.
    Results(Vec<MediaResult>),
    /// Free-text reason, for `Petition`.
    Reason(String),
}

#[derive(Debug, Clone)]
pub struct ContentUpdate {
    pub kind: ContentUpdateKind,
    pub ids: Vec<MediaId>,
    pub payload: ContentPayload,
}

impl ContentUpdate {
    pub fn new(kind: ContentUpdateKind, ids: Vec<MediaId>) -> Self {
        Self {
            kind,
            ids,
            payload: ContentPayload::None,
        }
    }

    pub fn add(results: Vec<MediaResult>) -> Self {
        Self {
            kind: ContentUpdateKind::Add,
            ids: results.iter().map(|r| r.id).collect(),
            payload: ContentPayload::Results(results),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceUpdateKind {
    /// Pending uploads and petitions were discarded.
    DeletePending,
    /// The service was wiped; the view must be requeried.
    Reset,
}

#[derive(Debug, Clone)]
pub struct ServiceUpdate {
    pub kind: ServiceUpdateKind,
}

/// What applying an update did to the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub change: ListChange,
    /// Top-level media that left the list.
    pub removed: Vec<MediaId>,
    /// Indices whose presentation changed in place.
    pub touched: Vec<usize>,
}

impl UpdateOutcome {
    fn unchanged() -> Self {
        Self {
            change: ListChange::Unchanged,
            removed: Vec::new(),
            touched: Vec::new(),
        }
    }

    fn touched(touched: Vec<usize>) -> Self {
        Self {
            touched,
            ..Self::unchanged()
        }
    }
}

impl MediaList {
    /// Applies a content update. Malformed payloads are rejected without
    /// touching the list.
    pub fn apply_content_update(
        &mut self,
        update: ContentUpdate,
    ) -> Result<UpdateOutcome, GridError> {
        let kind = update.kind;
        let malformed = |reason: &str| GridError::MalformedUpdate {
            kind: kind.name(),
            reason: reason.to_string(),
        };

        if kind != ContentUpdateKind::Add && update.ids.is_empty() {
            return Err(malformed("no identities"));
        }

        let outcome = match (kind, update.payload) {
            (ContentUpdateKind::Add, ContentPayload::Results(results)) => {
                if results.is_empty() {
                    return Err(malformed("empty result set"));
                }
                UpdateOutcome {
                    change: self.add_media(results, true),
                    ..UpdateOutcome::unchanged()
                }
            }
            (ContentUpdateKind::Add, _) => return Err(malformed("missing media results")),
            (ContentUpdateKind::Delete, _) => {
                let removal = self.remove_media(&update.ids);
                UpdateOutcome {
                    change: removal.change(),
                    removed: removal.removed,
                    touched: Vec::new(),
                }
            }
            (ContentUpdateKind::Archive, _) => {
                UpdateOutcome::touched(self.update_flags(&update.ids, |f| f.inbox = false))
            }
            (ContentUpdateKind::Inbox, _) => {
                UpdateOutcome::touched(self.update_flags(&update.ids, |f| f.inbox = true))
            }
            (ContentUpdateKind::Pending, _) => {
                UpdateOutcome::touched(self.update_flags(&update.ids, |f| f.pending = true))
            }
            (ContentUpdateKind::Petition, payload) => {
                if let ContentPayload::Reason(reason) = &payload {
                    debug!(%reason, count = update.ids.len(), "Petitioned media");
                }
                UpdateOutcome::touched(self.update_flags(&update.ids, |f| f.petitioned = true))
            }
        };
        Ok(outcome)
    }

    pub fn apply_service_update(&mut self, update: ServiceUpdate) -> UpdateOutcome {
        match update.kind {
            ServiceUpdateKind::DeletePending => {
                self.update_all_flags(|f| {
                    f.pending = false;
                    f.petitioned = false;
                });
                UpdateOutcome::touched((0..self.len()).collect())
            }
            ServiceUpdateKind::Reset => {
                let removed = self.clear();
                warn!(count = removed.len(), "Service reset, view cleared until requery");
                UpdateOutcome {
                    change: ListChange::Replaced,
                    removed,
                    touched: Vec::new(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sort::{CollectKey, SortBy, SortKey};
    use crate::ui::events::recording_bus;

    fn list() -> MediaList {
        let (bus, _) = recording_bus();
        let mut list = MediaList::new(bus, SortKey::ascending(SortBy::FileSize), CollectKey::None);
        list.add_media(
            (1..=4)
                .map(|i| MediaResult::new(MediaId(i), i).with_inbox(true))
                .collect(),
            false,
        );
        list
    }

    #[test]
    fn test_add_without_results_is_malformed() {
        let mut list = list();
        let update = ContentUpdate::new(ContentUpdateKind::Add, vec![MediaId(9)]);
        assert!(matches!(
            list.apply_content_update(update),
            Err(GridError::MalformedUpdate { kind: "add", .. })
        ));
        assert_eq!(list.len(), 4);
    }

    #[test]
    fn test_flag_update_without_ids_is_malformed() {
        let mut list = list();
        let update = ContentUpdate::new(ContentUpdateKind::Archive, Vec::new());
        assert!(list.apply_content_update(update).is_err());
    }

    #[test]
    fn test_add_appends() {
        let mut list = list();
        let outcome = list
            .apply_content_update(ContentUpdate::add(vec![MediaResult::new(MediaId(9), 0)]))
            .unwrap();
        assert_eq!(outcome.change, ListChange::InvalidatedFrom(0));
        assert_eq!(list.len(), 5);
    }

    #[test]
    fn test_delete_removes() {
        let mut list = list();
        let outcome = list
            .apply_content_update(ContentUpdate::new(
                ContentUpdateKind::Delete,
                vec![MediaId(2), MediaId(3)],
            ))
            .unwrap();
        assert_eq!(outcome.removed, vec![MediaId(2), MediaId(3)]);
        assert_eq!(outcome.change, ListChange::InvalidatedFrom(1));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_archive_touches_cells() {
        let mut list = list();
        let outcome = list
            .apply_content_update(ContentUpdate::new(
                ContentUpdateKind::Archive,
                vec![MediaId(4)],
            ))
            .unwrap();
        assert_eq!(outcome.touched, vec![3]);
        assert!(list.media(MediaId(4)).unwrap().is_archived());
    }

    #[test]
    fn test_petition_reason_is_optional() {
        let mut list = list();
        let update = ContentUpdate::new(ContentUpdateKind::Petition, vec![MediaId(1)]);
        let outcome = list.apply_content_update(update).unwrap();
        assert_eq!(outcome.touched, vec![0]);
        assert!(list.media(MediaId(1)).unwrap().representative().flags.petitioned);

        let mut update = ContentUpdate::new(ContentUpdateKind::Petition, vec![MediaId(2)]);
        update.payload = ContentPayload::Reason("dupe".into());
        let outcome = list.apply_content_update(update).unwrap();
        assert_eq!(outcome.touched, vec![1]);

        let empty = ContentUpdate::new(ContentUpdateKind::Petition, Vec::new());
        assert!(matches!(
            list.apply_content_update(empty),
            Err(GridError::MalformedUpdate { kind: "petition", .. })
        ));
    }

    #[test]
    fn test_service_updates() {
        let mut list = list();
        list.apply_content_update(ContentUpdate::new(ContentUpdateKind::Pending, vec![MediaId(1)]))
            .unwrap();
        list.apply_service_update(ServiceUpdate {
            kind: ServiceUpdateKind::DeletePending,
        });
        assert!(!list.media(MediaId(1)).unwrap().representative().flags.pending);

        let outcome = list.apply_service_update(ServiceUpdate {
            kind: ServiceUpdateKind::Reset,
        });
        assert_eq!(outcome.removed.len(), 4);
        assert!(list.is_empty());
    }
}
