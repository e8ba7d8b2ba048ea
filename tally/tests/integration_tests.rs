use chrono::NaiveDate;
use tally::changes::{AccountField, CategoryField, ItemField, TransactionField};
use tally::planner::Scope;
use tally::testing::{MockStore, StaticIdentity, StoreCall};
use tally::{
    CommitState, EditSession, EntityKind, FieldValue, LedgerError, Placement, RowKey, StoreError,
};
use tally_api::endpoints::{Cents, RowId};

fn saved(id: &str) -> RowKey {
    RowKey::Persisted(RowId::from(id))
}

fn user() -> StaticIdentity {
    StaticIdentity::signed_in("user-1")
}

fn seeded_store() -> MockStore {
    MockStore::new()
        .with_row(
            EntityKind::Account,
            "acc-1",
            serde_json::json!({ "name": "Checking", "account_type": "checking", "sort_order": 1000 }),
        )
        .with_row(
            EntityKind::Category,
            "cat-a",
            serde_json::json!({ "name": "Housing", "sort_order": 10 }),
        )
        .with_row(
            EntityKind::Category,
            "cat-b",
            serde_json::json!({ "name": "Food", "sort_order": 20 }),
        )
        .with_row(
            EntityKind::Transaction,
            "t-1",
            serde_json::json!({ "date": "2026-02-01", "description": "Rent" }),
        )
}

#[test]
fn test_trailing_space_edit_is_not_a_change() {
    let mut session = EditSession::new();

    session
        .set_field(&saved("cat-b"), CategoryField::Name, "Food ", "Food")
        .unwrap();

    assert!(!session.has_pending_changes());
}

#[test]
fn test_deleting_pending_row_leaves_nothing() {
    let mut session = EditSession::new();
    let row = session
        .create_row(
            EntityKind::Category,
            vec![(CategoryField::Name.into(), "Travel".into())],
            Placement::End,
        )
        .unwrap();

    session
        .delete_row(&RowKey::Pending(row), EntityKind::Category)
        .unwrap();

    assert!(!session.has_pending_changes());
}

#[tokio::test]
async fn test_rows_between_neighbours_get_interpolated_positions() {
    let store = seeded_store();
    let mut session = EditSession::new();
    session.refresh_listing(&store).await.unwrap();

    let first = session
        .create_row(
            EntityKind::Category,
            vec![(CategoryField::Name.into(), "Utilities".into())],
            Placement::After(saved("cat-a")),
        )
        .unwrap();
    let second = session
        .create_row(
            EntityKind::Category,
            vec![(CategoryField::Name.into(), "Insurance".into())],
            Placement::Before(saved("cat-b")),
        )
        .unwrap();

    let report = session.commit(&store, &user()).await.unwrap();
    assert!(report.is_success());

    let position = |pending| {
        let id = report.new_id(pending).unwrap();
        store.row(EntityKind::Category, id).unwrap()["sort_order"].clone()
    };
    assert_eq!(position(&first), serde_json::json!(13));
    assert_eq!(position(&second), serde_json::json!(16));

    // neighbours were not touched
    assert!(store
        .calls()
        .iter()
        .all(|call| !matches!(call, StoreCall::Update { .. })));
}

#[tokio::test]
async fn test_partial_failure_keeps_only_the_failed_row() {
    let store = seeded_store();
    store.fail_update(
        "cat-b",
        StoreError::Rejected {
            status: 400,
            message: "value too long".to_string(),
        },
    );
    let mut session = EditSession::new();
    session
        .set_field(&saved("cat-a"), CategoryField::Name, "Home", "Housing")
        .unwrap();
    session
        .set_field(&saved("cat-b"), CategoryField::Name, "Groceries", "Food")
        .unwrap();

    let report = session.commit(&store, &user()).await.unwrap();

    assert_eq!(report.committed, vec![saved("cat-a")]);
    assert!(matches!(
        report.failure(&saved("cat-b")),
        Some(LedgerError::Remote { .. })
    ));
    assert!(session.changes().get(&saved("cat-a")).is_none());
    assert_eq!(
        session
            .changes()
            .pending_value(&saved("cat-b"), CategoryField::Name),
        Some(&FieldValue::from("Groceries"))
    );
    assert_eq!(session.commit_state(), CommitState::Failed);
}

#[tokio::test]
async fn test_second_commit_while_first_outstanding_is_rejected() {
    let store = seeded_store();
    let mut session = EditSession::new();
    session
        .set_field(&saved("acc-1"), AccountField::Name, "Everyday", "Checking")
        .unwrap();

    let prepared = session.begin_commit().unwrap();
    assert_eq!(session.commit_state(), CommitState::Committing);
    assert!(matches!(
        session.commit(&store, &user()).await,
        Err(LedgerError::Concurrency)
    ));

    let outcome = prepared.execute(&store, &user()).await;
    let report = session.finish_commit(outcome);
    assert!(report.is_success());
    assert_eq!(
        store.row(EntityKind::Account, &RowId::from("acc-1")).unwrap()["name"],
        serde_json::json!("Everyday")
    );
}

#[tokio::test]
async fn test_updates_send_only_changed_fields() {
    let store = seeded_store();
    let mut session = EditSession::new();
    let row = saved("t-1");
    session
        .set_field(&row, TransactionField::Description, "Rent (March)", "Rent")
        .unwrap();
    session
        .set_field(
            &row,
            TransactionField::Date,
            NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
        )
        .unwrap();
    session
        .set_field(&row, TransactionField::Memo, FieldValue::Empty, FieldValue::Empty)
        .unwrap();

    session.commit(&store, &user()).await.unwrap();

    let patches: Vec<_> = store
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            StoreCall::Update { patch, .. } => Some(patch),
            _ => None,
        })
        .collect();
    assert_eq!(patches.len(), 1);
    let columns: Vec<&String> = patches[0].keys().collect();
    assert_eq!(columns, vec!["description"]);
}

#[tokio::test]
async fn test_new_transaction_with_items_in_one_commit() {
    let store = seeded_store();
    let mut session = EditSession::new();
    session.refresh_listing(&store).await.unwrap();

    let transaction = session
        .create_row(
            EntityKind::Transaction,
            vec![
                (
                    TransactionField::Date.into(),
                    NaiveDate::from_ymd_opt(2026, 3, 3).unwrap().into(),
                ),
                (TransactionField::Description.into(), "Farmers market".into()),
            ],
            Placement::End,
        )
        .unwrap();
    for amount in [-2_500, -1_200] {
        session
            .create_row(
                EntityKind::Item,
                vec![
                    (ItemField::Transaction.into(), transaction.clone().into()),
                    (ItemField::Account.into(), RowId::from("acc-1").into()),
                    (ItemField::Category.into(), RowId::from("cat-b").into()),
                    (ItemField::Amount.into(), Cents::new(amount).into()),
                ],
                Placement::End,
            )
            .unwrap();
    }

    let report = session.commit(&store, &user()).await.unwrap();

    assert!(report.is_success());
    assert!(!session.has_pending_changes());
    let transaction_id = report.new_id(&transaction).unwrap().clone();
    let mut items: Vec<i64> = store
        .rows(EntityKind::Item)
        .into_iter()
        .map(|(_, row)| {
            assert_eq!(row["transaction_id"], serde_json::json!(transaction_id.as_str()));
            row["sort_order"].as_i64().unwrap()
        })
        .collect();
    items.sort();
    assert_eq!(items, vec![1000, 2000]);
    assert_eq!(
        session
            .listing()
            .rows(&Scope::Items(RowKey::Persisted(transaction_id)))
            .len(),
        2
    );
}

#[tokio::test]
async fn test_blocked_row_is_reported_and_retained() {
    let store = seeded_store();
    let mut session = EditSession::new();
    session
        .set_field(&saved("acc-1"), AccountField::Name, "", "Checking")
        .unwrap();
    session
        .set_field(&saved("cat-a"), CategoryField::Color, "#00aa00", FieldValue::Empty)
        .unwrap();

    let report = session.commit(&store, &user()).await.unwrap();

    assert!(matches!(
        report.failure(&saved("acc-1")),
        Some(LedgerError::Validation { .. })
    ));
    assert_eq!(report.committed, vec![saved("cat-a")]);
    assert!(session.changes().contains(&saved("acc-1")));
}

#[tokio::test]
async fn test_revert_during_save_is_written_back() {
    let store = seeded_store();
    let mut session = EditSession::new();
    let row = saved("cat-b");
    session
        .set_field(&row, CategoryField::Name, "Groceries", "Food")
        .unwrap();

    let prepared = session.begin_commit().unwrap();
    let identity = user();
    let (outcome, ()) = tokio::join!(prepared.execute(&store, &identity), async {
        assert!(session.changes().is_in_flight(&row));
        session
            .set_field(&row, CategoryField::Name, "Food", "Food")
            .unwrap();
    });
    let report = session.finish_commit(outcome);

    assert!(report.is_success());
    assert!(!session.changes().is_in_flight(&row));
    assert_eq!(
        session.changes().pending_value(&row, CategoryField::Name),
        Some(&FieldValue::from("Food"))
    );

    session.commit(&store, &user()).await.unwrap();
    assert!(!session.has_pending_changes());
    assert_eq!(
        store.row(EntityKind::Category, &RowId::from("cat-b")).unwrap()["name"],
        serde_json::json!("Food")
    );
}

#[tokio::test]
async fn test_renumbering_skips_rows_already_in_place() {
    let store = MockStore::new()
        .with_row(
            EntityKind::Category,
            "a",
            serde_json::json!({ "name": "Housing", "sort_order": 1000 }),
        )
        .with_row(
            EntityKind::Category,
            "b",
            serde_json::json!({ "name": "Food", "sort_order": 11 }),
        );
    let mut session = EditSession::new();
    session.refresh_listing(&store).await.unwrap();

    session
        .set_field(&saved("a"), CategoryField::SortOrder, 10_i64, 1000_i64)
        .unwrap();
    let new = session
        .create_row(
            EntityKind::Category,
            vec![(CategoryField::Name.into(), "Utilities".into())],
            Placement::After(saved("a")),
        )
        .unwrap();

    let report = session.commit(&store, &user()).await.unwrap();

    assert!(report.is_success());
    assert!(!session.has_pending_changes());
    assert!(report.committed.contains(&saved("a")));
    let updates: Vec<(RowId, serde_json::Value)> = store
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            StoreCall::Update { id, patch, .. } => Some((id, patch["sort_order"].clone())),
            _ => None,
        })
        .collect();
    assert_eq!(updates, vec![(RowId::from("b"), serde_json::json!(3000))]);

    let position = |id: &RowId| store.row(EntityKind::Category, id).unwrap()["sort_order"].clone();
    assert_eq!(position(&RowId::from("a")), serde_json::json!(1000));
    assert_eq!(position(report.new_id(&new).unwrap()), serde_json::json!(2000));
}
