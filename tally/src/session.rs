use crate::autosave::AutosaveTimer;
use crate::changes::{ChangeSet, EntityKind, Field, FieldValue, Placement};
use crate::commit::{CommitCoordinator, CommitOutcome, CommitReport, CommitState, PreparedCommit};
use crate::config::EditorSettings;
use crate::error::{LedgerError, StoreError};
use crate::events::EditEvent;
use crate::identity::{allocate_pending_id, PendingId, RowKey};
use crate::planner::SortListing;
use crate::store::{Identity, RowStore};

/// One user's editing session: pending edits, the commit state machine, and the
/// committed ordering new rows are placed against
#[derive(Debug, Default)]
pub struct EditSession {
    changes: ChangeSet,
    coordinator: CommitCoordinator,
    listing: SortListing,
    autosave: Option<AutosaveTimer>,
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a saved change set
    pub fn from_changes(changes: ChangeSet) -> Self {
        Self {
            changes,
            ..Self::default()
        }
    }

    pub fn with_settings(mut self, settings: &EditorSettings) -> Self {
        self.autosave = settings.autosave_timer();
        self
    }

    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    pub fn listing(&self) -> &SortListing {
        &self.listing
    }

    pub fn listing_mut(&mut self) -> &mut SortListing {
        &mut self.listing
    }

    pub fn commit_state(&self) -> CommitState {
        self.coordinator.state()
    }

    pub fn has_pending_changes(&self) -> bool {
        self.changes.has_pending_changes()
    }

    pub fn set_field(
        &mut self,
        row: &RowKey,
        field: impl Into<Field>,
        value: impl Into<FieldValue>,
        baseline: impl Into<FieldValue>,
    ) -> Result<(), LedgerError> {
        self.changes.set_field(row, field, value, baseline)?;
        self.touch();
        Ok(())
    }

    /// Start a new row and return its local id
    pub fn create_row(
        &mut self,
        kind: EntityKind,
        fields: Vec<(Field, FieldValue)>,
        placement: Placement,
    ) -> Result<PendingId, LedgerError> {
        let id = allocate_pending_id();
        self.changes
            .mark_creation(RowKey::Pending(id.clone()), kind, fields, placement)?;
        self.touch();
        Ok(id)
    }

    pub fn delete_row(&mut self, row: &RowKey, kind: EntityKind) -> Result<(), LedgerError> {
        self.changes.mark_deletion(row, kind)?;
        self.touch();
        Ok(())
    }

    /// Apply a grid event, returning the row it touched
    pub fn apply(&mut self, event: EditEvent) -> Result<Option<RowKey>, LedgerError> {
        tracing::trace!("Applying {:?}", event);
        match event {
            EditEvent::FieldBlur {
                row,
                field,
                value,
                baseline,
            } => {
                self.set_field(&row, field, value, baseline)?;
                Ok(Some(row))
            }
            EditEvent::CreateRow {
                kind,
                fields,
                placement,
            } => {
                let id = self.create_row(kind, fields, placement)?;
                Ok(Some(RowKey::Pending(id)))
            }
            EditEvent::DeleteRow { row, kind } => {
                self.delete_row(&row, kind)?;
                Ok(Some(row))
            }
            EditEvent::Discard { row } => Ok(self.changes.discard(&row).then_some(row)),
            EditEvent::UndoLast => Ok(self.changes.discard_last()),
        }
    }

    fn touch(&mut self) {
        if let Some(timer) = self.autosave.as_mut() {
            timer.touch();
        }
    }

    pub fn begin_commit(&mut self) -> Result<PreparedCommit, LedgerError> {
        self.coordinator.begin(&mut self.changes, &self.listing)
    }

    pub fn finish_commit(&mut self, outcome: CommitOutcome) -> CommitReport {
        let report = self.coordinator.finish(&mut self.changes, outcome);
        self.listing.apply(&report);
        report
    }

    pub fn abandon_commit(&mut self) {
        self.coordinator.abandon(&mut self.changes);
    }

    /// Commit everything pending and wait for the result
    pub async fn commit<S, I>(&mut self, store: &S, identity: &I) -> Result<CommitReport, LedgerError>
    where
        S: RowStore,
        I: Identity,
    {
        let prepared = self.begin_commit()?;
        let outcome = prepared.execute(store, identity).await;
        Ok(self.finish_commit(outcome))
    }

    /// Reload committed positions for every ordered kind
    pub async fn refresh_listing<S: RowStore>(&mut self, store: &S) -> Result<(), StoreError> {
        for kind in EntityKind::ALL {
            if kind.sort_field().is_some() {
                let rows = store.positions(kind).await?;
                tracing::debug!("Loaded {} {} positions", rows.len(), kind);
                self.listing.load(kind, rows);
            }
        }
        Ok(())
    }

    /// Wait for the autosave timer, then commit if anything is pending.
    ///
    /// Returns `None` when autosave is off.
    pub async fn autosave<S, I>(
        &mut self,
        store: &S,
        identity: &I,
    ) -> Option<Result<CommitReport, LedgerError>>
    where
        S: RowStore,
        I: Identity,
    {
        loop {
            self.autosave.as_mut()?.tick().await;
            if self.has_pending_changes() && self.commit_state() != CommitState::Committing {
                tracing::info!("Autosaving {} rows", self.changes.len());
                return Some(self.commit(store, identity).await);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::{AccountField, CategoryField};
    use crate::testing::{MockStore, StaticIdentity};
    use std::time::Duration;
    use tally_api::endpoints::RowId;

    fn saved(id: &str) -> RowKey {
        RowKey::Persisted(RowId::from(id))
    }

    #[test]
    fn events_drive_the_change_set() {
        let mut session = EditSession::new();

        let created = session
            .apply(EditEvent::CreateRow {
                kind: EntityKind::Category,
                fields: vec![(CategoryField::Name.into(), "Books".into())],
                placement: Placement::End,
            })
            .unwrap()
            .unwrap();
        assert!(created.is_pending());

        session
            .apply(EditEvent::blur(saved("acc-1"), AccountField::Name, "Main", "Checking"))
            .unwrap();
        assert_eq!(session.changes().len(), 2);

        assert_eq!(session.apply(EditEvent::UndoLast).unwrap(), Some(saved("acc-1")));
        assert!(session
            .apply(EditEvent::Discard { row: created })
            .unwrap()
            .is_some());
        assert!(!session.has_pending_changes());
    }

    #[tokio::test]
    async fn listing_follows_committed_rows() {
        let store = MockStore::new()
            .with_row(EntityKind::Category, "cat-1", serde_json::json!({ "sort_order": 1000 }));
        let identity = StaticIdentity::signed_in("user-1");
        let mut session = EditSession::new();
        session.refresh_listing(&store).await.unwrap();

        let first = session
            .create_row(
                EntityKind::Category,
                vec![(CategoryField::Name.into(), "Books".into())],
                Placement::End,
            )
            .unwrap();
        let report = session.commit(&store, &identity).await.unwrap();
        let first_id = report.new_id(&first).unwrap().clone();

        let second = session
            .create_row(
                EntityKind::Category,
                vec![(CategoryField::Name.into(), "Games".into())],
                Placement::End,
            )
            .unwrap();
        let report = session.commit(&store, &identity).await.unwrap();
        let second_id = report.new_id(&second).unwrap().clone();

        assert_eq!(
            store.row(EntityKind::Category, &first_id).unwrap()["sort_order"],
            serde_json::json!(2000)
        );
        assert_eq!(
            store.row(EntityKind::Category, &second_id).unwrap()["sort_order"],
            serde_json::json!(3000)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn autosave_commits_pending_work() {
        let store = MockStore::new();
        let identity = StaticIdentity::signed_in("user-1");
        let settings = EditorSettings {
            autosave: true,
            autosave_interval_secs: 5,
            autosave_quiet_secs: 1,
        };
        let mut session = EditSession::new().with_settings(&settings);
        session
            .set_field(&saved("acc-1"), AccountField::Name, "Main", "Checking")
            .unwrap();

        let report = tokio::time::timeout(
            Duration::from_secs(60),
            session.autosave(&store, &identity),
        )
        .await
        .unwrap()
        .unwrap()
        .unwrap();

        assert!(report.is_success());
        assert!(!session.has_pending_changes());
    }

    #[tokio::test]
    async fn autosave_disabled_returns_immediately() {
        let store = MockStore::new();
        let identity = StaticIdentity::signed_in("user-1");
        let mut session = EditSession::new();
        assert!(session.autosave(&store, &identity).await.is_none());
    }
}
