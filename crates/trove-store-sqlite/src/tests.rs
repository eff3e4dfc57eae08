//! Integration tests for `SqliteStore` against an in-memory database.

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use chrono::{TimeZone as _, Utc};
use trove_core::{
  EntityKind,
  cascade::DeletionService,
  feed::{ChangeFeed, ChangeOp},
  record::{
    AccessLevel, Account, AccountStatus, Collection, Comment, FieldType, FieldValue,
    Item, Like, Tag, Topic,
  },
  store::{DocumentStore, Query, RecordStore, TextPath},
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn account(name: &str) -> Account {
  Account {
    id:            Uuid::new_v4(),
    created_at:    Utc::now(),
    name:          name.into(),
    email:         format!("{name}@example.com"),
    password_hash: "x".into(),
    status:        AccountStatus::Active,
    access:        AccessLevel::User,
  }
}

fn collection(owner: Uuid, title: &str) -> Collection {
  Collection {
    id: Uuid::new_v4(),
    created_at: Utc::now(),
    title: title.into(),
    description: String::new(),
    image: None,
    owner,
    topics: Vec::new(),
    fields: Vec::new(),
  }
}

fn item(collection: Uuid, title: &str) -> Item {
  Item {
    id: Uuid::new_v4(),
    created_at: Utc::now(),
    title: title.into(),
    collection,
    tags: Vec::new(),
    fields: Vec::new(),
  }
}

fn comment(item: Uuid, author: Uuid, message: &str) -> Comment {
  Comment {
    id: Uuid::new_v4(),
    created_at: Utc::now(),
    message: message.into(),
    item,
    author,
  }
}

fn like(item: Uuid, author: Uuid) -> Like {
  Like { id: Uuid::new_v4(), created_at: Utc::now(), item, author }
}

// ─── CRUD ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_get() {
  let s = store().await;
  let a = account("alice");
  s.insert(&a).await.unwrap();

  let fetched: Account = s.get(a.id).await.unwrap().expect("account");
  assert_eq!(fetched, a);
}

#[tokio::test]
async fn get_missing_returns_none() {
  let s = store().await;
  let got: Option<Account> = s.get(Uuid::new_v4()).await.unwrap();
  assert!(got.is_none());
}

#[tokio::test]
async fn get_checks_kind() {
  let s = store().await;
  let a = account("alice");
  s.insert(&a).await.unwrap();

  let wrong: Option<Collection> = s.get(a.id).await.unwrap();
  assert!(wrong.is_none());
}

#[tokio::test]
async fn duplicate_insert_fails() {
  let s = store().await;
  let a = account("alice");
  s.insert(&a).await.unwrap();
  assert!(s.insert(&a).await.is_err());
}

#[tokio::test]
async fn replace_overwrites_and_reports_missing() {
  let s = store().await;
  let mut a = account("alice");
  s.insert(&a).await.unwrap();

  a.status = AccountStatus::Blocked;
  assert!(s.replace(&a).await.unwrap());
  let fetched: Account = s.get(a.id).await.unwrap().unwrap();
  assert_eq!(fetched.status, AccountStatus::Blocked);

  let ghost = account("ghost");
  assert!(!s.replace(&ghost).await.unwrap());
}

#[tokio::test]
async fn get_many_skips_missing() {
  let s = store().await;
  let a = account("a");
  let b = account("b");
  s.insert(&a).await.unwrap();
  s.insert(&b).await.unwrap();

  let ids = BTreeSet::from([a.id, b.id, Uuid::new_v4()]);
  let got: Vec<Account> = s.get_many(&ids).await.unwrap();
  assert_eq!(got.len(), 2);
}

#[tokio::test]
async fn find_by_field_with_paging() {
  let s = store().await;
  let owner = account("owner");
  s.insert(&owner).await.unwrap();
  let c = collection(owner.id, "coins");
  s.insert(&c).await.unwrap();

  let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
  for n in 0..7 {
    let mut i = item(c.id, &format!("coin {n}"));
    i.created_at = base + chrono::Duration::seconds(n);
    s.insert(&i).await.unwrap();
  }
  // Unrelated item in another collection.
  s.insert(&item(Uuid::new_v4(), "stamp")).await.unwrap();

  let q = Query::new().eq("collection", c.id).page(2, 5);
  let page: Vec<Item> = s.find(&q).await.unwrap();
  let titles: Vec<_> = page.iter().map(|i| i.title.as_str()).collect();
  assert_eq!(titles, vec!["coin 5", "coin 6"]);
  assert_eq!(s.count(EntityKind::Item, &q).await.unwrap(), 7);

  let newest: Vec<Item> = s.find(&Query::new().newest_first().limit(1)).await.unwrap();
  assert_eq!(newest.len(), 1);
}

#[tokio::test]
async fn find_by_array_membership() {
  let s = store().await;
  let tag = Tag { id: Uuid::new_v4(), created_at: Utc::now(), title: "silver".into() };
  s.insert(&tag).await.unwrap();

  let mut tagged = item(Uuid::new_v4(), "tagged");
  tagged.tags = vec![tag.id];
  s.insert(&tagged).await.unwrap();
  s.insert(&item(Uuid::new_v4(), "plain")).await.unwrap();

  let found: Vec<Item> = s.find(&Query::new().contains("tags", tag.id)).await.unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].id, tagged.id);
}

#[tokio::test]
async fn text_search_matches_titles_and_field_values() {
  let s = store().await;
  let mut i = item(Uuid::new_v4(), "Morgan Dollar");
  i.fields = vec![FieldValue {
    title: "mint".into(),
    kind:  FieldType::Text,
    value: "Carson City".into(),
  }];
  s.insert(&i).await.unwrap();
  s.insert(&item(Uuid::new_v4(), "Peace Dollar")).await.unwrap();

  let search = |text: &str| {
    Query::new().text([TextPath::field("title"), TextPath::member("fields", "value")], text)
  };

  let by_title: Vec<Item> = s.find(&search("morgan")).await.unwrap();
  assert_eq!(by_title.len(), 1);
  let by_field: Vec<Item> = s.find(&search("carson")).await.unwrap();
  assert_eq!(by_field.len(), 1);
  let both: Vec<Item> = s.find(&search("dollar")).await.unwrap();
  assert_eq!(both.len(), 2);
  let none: Vec<Item> = s.find(&search("100%")).await.unwrap();
  assert!(none.is_empty());
}

#[tokio::test]
async fn text_search_ignores_keys_ids_and_other_fields() {
  let s = store().await;
  let mut i = item(Uuid::new_v4(), "Morgan Dollar");
  i.fields = vec![FieldValue {
    title: "mint".into(),
    kind:  FieldType::Text,
    value: "Carson City".into(),
  }];
  s.insert(&i).await.unwrap();
  s.insert(&item(Uuid::new_v4(), "Sovereign")).await.unwrap();

  let query = |text: &str| {
    Query::new().text([TextPath::field("title"), TextPath::member("fields", "value")], text)
  };
  for text in ["collection", "tags", "created_at", "mint", "fields"] {
    let found: Vec<Item> = s.find(&query(text)).await.unwrap();
    assert!(found.is_empty(), "{text:?} matched {} item(s)", found.len());
  }
  let id_prefix = &i.id.to_string()[..8];
  let found: Vec<Item> = s.find(&query(id_prefix)).await.unwrap();
  assert!(found.is_empty());
}

#[tokio::test]
async fn find_rejects_unsafe_field_names() {
  let s = store().await;
  let q = Query::new().eq("owner') OR 1=1 --", "x");
  let result: crate::Result<Vec<Collection>> = s.find(&q).await;
  assert!(matches!(result, Err(crate::Error::InvalidField(_))));
}

// ─── DocumentStore ───────────────────────────────────────────────────────────

#[tokio::test]
async fn find_ids_matches_foreign_key_set() {
  let s = store().await;
  let a = account("a");
  let b = account("b");
  let c = account("c");
  for acc in [&a, &b, &c] {
    s.insert(acc).await.unwrap();
  }
  let ca = collection(a.id, "a");
  let cb = collection(b.id, "b");
  let cc = collection(c.id, "c");
  for col in [&ca, &cb, &cc] {
    s.insert(col).await.unwrap();
  }

  let found = s
    .find_ids(EntityKind::Collection, "owner", &BTreeSet::from([a.id, b.id]))
    .await
    .unwrap();
  assert_eq!(found, BTreeSet::from([ca.id, cb.id]));

  let empty = s
    .find_ids(EntityKind::Collection, "owner", &BTreeSet::new())
    .await
    .unwrap();
  assert!(empty.is_empty());
}

#[tokio::test]
async fn delete_many_counts_only_existing_rows_of_kind() {
  let s = store().await;
  let a = account("a");
  let c = collection(a.id, "c");
  s.insert(&a).await.unwrap();
  s.insert(&c).await.unwrap();

  // The collection's ID under the wrong kind is not touched.
  let n = s
    .delete_many(EntityKind::Account, &BTreeSet::from([a.id, c.id, Uuid::new_v4()]))
    .await
    .unwrap();
  assert_eq!(n, 1);
  assert!(s.get::<Collection>(c.id).await.unwrap().is_some());
}

// ─── Cascade over SQLite ─────────────────────────────────────────────────────

struct Scenario {
  store: Arc<SqliteStore>,
  u:     Account,
  v:     Account,
  c1:    Collection,
  i1:    Item,
  i2:    Item,
  c1a:   Comment,
  c1b:   Comment,
  like:  Like,
  topic: Topic,
}

/// U owns C1 holding I1 and I2; I1 has two comments and a like by V.
async fn scenario() -> Scenario {
  let store = Arc::new(store().await);
  let u = account("u");
  let v = account("v");
  let topic = Topic { id: Uuid::new_v4(), created_at: Utc::now(), title: "coins".into() };
  let mut c1 = collection(u.id, "c1");
  c1.topics = vec![topic.id];
  let i1 = item(c1.id, "i1");
  let i2 = item(c1.id, "i2");
  let c1a = comment(i1.id, v.id, "nice");
  let c1b = comment(i1.id, u.id, "thanks");
  let like = like(i1.id, v.id);

  store.insert(&u).await.unwrap();
  store.insert(&v).await.unwrap();
  store.insert(&topic).await.unwrap();
  store.insert(&c1).await.unwrap();
  store.insert(&i1).await.unwrap();
  store.insert(&i2).await.unwrap();
  store.insert(&c1a).await.unwrap();
  store.insert(&c1b).await.unwrap();
  store.insert(&like).await.unwrap();

  Scenario { store, u, v, c1, i1, i2, c1a, c1b, like, topic }
}

#[tokio::test]
async fn deleting_account_cascades_through_sqlite() {
  let s = scenario().await;
  let svc = DeletionService::new(s.store.clone());

  let report = svc.delete(EntityKind::Account, [s.u.id]).await.unwrap();
  assert_eq!(report.affected(EntityKind::Account), 1);
  assert_eq!(report.affected(EntityKind::Collection), 1);
  assert_eq!(report.affected(EntityKind::Item), 2);
  assert_eq!(report.affected(EntityKind::Comment), 2);
  assert_eq!(report.affected(EntityKind::Like), 1);

  let st = &s.store;
  assert!(st.get::<Account>(s.u.id).await.unwrap().is_none());
  assert!(st.get::<Collection>(s.c1.id).await.unwrap().is_none());
  assert!(st.get::<Item>(s.i1.id).await.unwrap().is_none());
  assert!(st.get::<Item>(s.i2.id).await.unwrap().is_none());
  assert!(st.get::<Comment>(s.c1a.id).await.unwrap().is_none());
  assert!(st.get::<Comment>(s.c1b.id).await.unwrap().is_none());
  assert!(st.get::<Like>(s.like.id).await.unwrap().is_none());

  // Weak references survive.
  assert!(st.get::<Account>(s.v.id).await.unwrap().is_some());
  assert!(st.get::<Topic>(s.topic.id).await.unwrap().is_some());

  let owned = Query::new().eq("owner", s.u.id);
  assert_eq!(st.count(EntityKind::Collection, &owned).await.unwrap(), 0);
}

#[tokio::test]
async fn deleting_nonexistent_ids_affects_nothing() {
  let s = scenario().await;
  let svc = DeletionService::new(s.store.clone());

  let report = svc
    .delete(EntityKind::Account, [Uuid::new_v4()])
    .await
    .unwrap();
  assert!(report.is_noop());
  assert!(s.store.get::<Collection>(s.c1.id).await.unwrap().is_some());
}

#[tokio::test]
async fn deleting_twice_is_noop_the_second_time() {
  let s = scenario().await;
  let svc = DeletionService::new(s.store.clone());

  let first = svc.delete(EntityKind::Collection, [s.c1.id]).await.unwrap();
  assert_eq!(first.total_affected(), 6);

  let second = svc.delete(EntityKind::Collection, [s.c1.id]).await.unwrap();
  assert!(second.is_noop());
  assert!(s.store.get::<Account>(s.u.id).await.unwrap().is_some());
}

// ─── Change feed ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn feed_reports_inserts_of_watched_kind() {
  let s = store().await;
  let mut stream = s.watch(EntityKind::Comment).await.unwrap();

  let a = account("a");
  s.insert(&a).await.unwrap();
  let c = comment(Uuid::new_v4(), a.id, "hi");
  s.insert(&c).await.unwrap();

  let event = tokio::time::timeout(Duration::from_secs(1), stream.next())
    .await
    .expect("event in time")
    .unwrap();
  assert_eq!(event.kind, EntityKind::Comment);
  assert_eq!(event.op, ChangeOp::Insert);
  assert_eq!(event.id, c.id);
  let doc: Comment = serde_json::from_value(event.document.unwrap()).unwrap();
  assert_eq!(doc, c);
}

#[tokio::test]
async fn feed_reports_cascade_deletes() {
  let s = scenario().await;
  let mut stream = s.store.watch(EntityKind::Like).await.unwrap();

  DeletionService::new(s.store.clone())
    .delete(EntityKind::Item, [s.i1.id])
    .await
    .unwrap();

  let event = stream.next().await.unwrap();
  assert_eq!(event.op, ChangeOp::Delete);
  assert_eq!(event.id, s.like.id);
  assert!(event.document.is_none());
}

#[tokio::test]
async fn connect_opens_file_store() {
  let dir = std::env::temp_dir().join(format!("trove-{}", Uuid::new_v4()));
  std::fs::create_dir_all(&dir).unwrap();
  let path = dir.join("trove.db");

  let s = SqliteStore::connect(&path, Duration::from_secs(5)).await.unwrap();
  let a = account("persisted");
  s.insert(&a).await.unwrap();
  drop(s);

  let reopened = SqliteStore::open(&path).await.unwrap();
  assert!(reopened.get::<Account>(a.id).await.unwrap().is_some());

  std::fs::remove_dir_all(&dir).ok();
}
