//! Engine and mutation tests against the in-memory backend, plus a few
//! smoke tests of the same paths through SQLite.

use weft_core::{
  context::{AssertOutcome, EavResult, RejectReason},
  fact::{self, FactInput, FactUpdate, Value},
  message::NewMessage,
  mutations::{
    AddCardToCollectionArgs, AddChildBlockArgs, BlockArgs, Mutation,
    UpdateBlockContentArgs, UpdateTitleArgs,
  },
  schema,
  sync::PatchOp,
};

use crate::{
  FactStore, MemoryStorage, SqliteStorage,
  key::{Keyspace, Prefix},
  migration,
  storage::Storage,
};

fn store() -> FactStore<MemoryStorage> {
  FactStore::new(MemoryStorage::new())
}

async fn assert_ok<S: Storage>(
  store: &FactStore<S>,
  entity: &str,
  attribute: &str,
  value: Value,
) -> String {
  match store
    .assert_fact(FactInput::new(entity, attribute, value))
    .await
    .unwrap()
  {
    AssertOutcome::Asserted { fact_id } => fact_id,
    AssertOutcome::Rejected(reason) => {
      panic!("assert of {attribute} rejected: {reason:?}")
    }
  }
}

/// Sibling entities under `parent`, in fractional-position order.
async fn children_of<S: Storage>(
  store: &FactStore<S>,
  parent: &str,
) -> Vec<String> {
  let mut children = store.vae(parent, Some("block/parent")).await.unwrap();
  children.sort_by(fact::sort_by_position);
  children.into_iter().map(|f| f.entity).collect()
}

// ─── Retraction ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn retraction_hides_facts_but_keeps_the_record() {
  let s = store();
  let id = assert_ok(&s, "e1", "block/content", Value::from("Title")).await;

  let live = s.eav("e1", Some("block/content")).await.unwrap().one();
  assert!(live.is_some());

  s.retract_fact(&id).await.unwrap();

  assert!(s.eav("e1", Some("block/content")).await.unwrap().one().is_none());
  assert!(s.aev("block/content", Some("e1")).await.unwrap().is_empty());

  // Still addressable by id for undo and audit.
  let record = s.get_fact(&id).await.unwrap().unwrap();
  assert!(record.retracted);
  assert_eq!(record.value, Value::from("Title"));
}

#[tokio::test]
async fn retracting_a_missing_fact_is_a_noop() {
  let s = store();
  s.retract_fact("no-such-fact").await.unwrap();
}

#[tokio::test]
async fn retracted_references_leave_the_reverse_index() {
  let s = store();
  let id = assert_ok(
    &s,
    "child",
    "block/parent",
    Value::parent("root", "a0"),
  )
  .await;
  assert_eq!(s.vae("root", None).await.unwrap().len(), 1);

  s.retract_fact(&id).await.unwrap();
  assert!(s.vae("root", None).await.unwrap().is_empty());
}

// ─── Cardinality one ─────────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_cardinality_one_asserts_converge() {
  let s = store();

  let (a, b, c) = tokio::join!(
    s.assert_fact(FactInput::new("e1", "block/content", Value::from("one"))),
    s.assert_fact(FactInput::new("e1", "block/content", Value::from("two"))),
    s.assert_fact(FactInput::new("e1", "block/content", Value::from("three"))),
  );

  let ids: Vec<String> = [a, b, c]
    .into_iter()
    .map(|r| r.unwrap().fact_id().unwrap().to_string())
    .collect();
  assert_eq!(ids[0], ids[1]);
  assert_eq!(ids[1], ids[2]);

  // Exactly one live fact for the slot, whichever value won.
  let slot = s.aev("block/content", Some("e1")).await.unwrap();
  assert_eq!(slot.len(), 1);
}

#[tokio::test]
async fn cardinality_one_overwrites_in_place() {
  let s = store();
  let first = assert_ok(&s, "e1", "block/content", Value::from("draft")).await;
  let second = assert_ok(&s, "e1", "block/content", Value::from("final")).await;
  assert_eq!(first, second);

  let slot = s.eav("e1", Some("block/content")).await.unwrap().one().unwrap();
  assert_eq!(slot.value, Value::from("final"));

  // One fact record, one time-index entry; the old stamp's entry is gone.
  let facts = s
    .storage()
    .list_prefix(&Prefix::new(Keyspace::Fact, vec![]))
    .await
    .unwrap();
  assert_eq!(facts.len(), 1);
  let stamps = s
    .storage()
    .list_prefix(&Prefix::new(Keyspace::Ti, vec![]))
    .await
    .unwrap();
  assert_eq!(stamps.len(), 1);
}

#[tokio::test]
async fn caller_supplied_id_is_ignored_when_the_slot_is_taken() {
  let s = store();
  let original = assert_ok(&s, "e1", "block/content", Value::from("text")).await;

  let outcome = s
    .assert_fact(FactInput {
      fact_id: Some("pinned-id".into()),
      ..FactInput::new("e1", "block/content", Value::from("rewrite"))
    })
    .await
    .unwrap();
  assert_eq!(outcome.fact_id(), Some(original.as_str()));
  assert!(s.get_fact("pinned-id").await.unwrap().is_none());
}

#[tokio::test]
async fn cardinality_one_overwrite_preserves_positions() {
  let s = store();
  let id = s
    .assert_fact(FactInput {
      positions: Some([("aev".to_string(), "a0".to_string())].into()),
      ..FactInput::new("e1", "block/content", Value::from("v1"))
    })
    .await
    .unwrap()
    .fact_id()
    .unwrap()
    .to_string();

  assert_ok(&s, "e1", "block/content", Value::from("v2")).await;

  let fact = s.get_fact(&id).await.unwrap().unwrap();
  assert_eq!(fact::position_in(&fact, "aev"), Some("a0"));
}

// ─── Uniqueness ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn unique_attribute_rejects_other_entities() {
  let s = store();
  assert_ok(&s, "e1", "card/title", Value::from("Reading List")).await;

  let outcome = s
    .assert_fact(FactInput::new(
      "e2",
      "card/title",
      Value::from("Reading List"),
    ))
    .await
    .unwrap();
  assert_eq!(
    outcome,
    AssertOutcome::Rejected(RejectReason::UniqueConflict)
  );

  // The original owner still resolves.
  let owner = s.ave("card/title", "Reading List").await.unwrap().unwrap();
  assert_eq!(owner.entity, "e1");
}

#[tokio::test]
async fn unique_value_is_reusable_after_retraction() {
  let s = store();
  let id = assert_ok(&s, "e1", "card/title", Value::from("Notes")).await;
  s.retract_fact(&id).await.unwrap();

  assert!(s.ave("card/title", "Notes").await.unwrap().is_none());
  assert_ok(&s, "e2", "card/title", Value::from("Notes")).await;
}

#[tokio::test]
async fn stale_unique_index_entries_are_removed() {
  let s = store();
  assert_ok(&s, "e1", "card/title", Value::from("Old Title")).await;
  assert_ok(&s, "e1", "card/title", Value::from("New Title")).await;

  assert!(s.ave("card/title", "Old Title").await.unwrap().is_none());
  assert_eq!(
    s.ave("card/title", "New Title").await.unwrap().unwrap().entity,
    "e1"
  );

  // The abandoned value is free for someone else.
  assert_ok(&s, "e2", "card/title", Value::from("Old Title")).await;
}

// ─── Schema enforcement ──────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_attribute_leaves_no_trace() {
  let s = store();
  assert_ok(&s, "e1", "block/content", Value::from("existing")).await;
  let before = s.storage().len().unwrap();

  let outcome = s
    .assert_fact(FactInput::new("e2", "not/registered", Value::from("x")))
    .await
    .unwrap();
  assert_eq!(
    outcome,
    AssertOutcome::Rejected(RejectReason::UnknownAttribute)
  );
  assert_eq!(s.storage().len().unwrap(), before);
}

#[tokio::test]
async fn union_attributes_enforce_membership() {
  let s = store();
  let outcome = s
    .assert_fact(FactInput::new("attr", "cardinality", Value::from("several")))
    .await
    .unwrap();
  assert_eq!(outcome, AssertOutcome::Rejected(RejectReason::NotInUnion));

  assert_ok(&s, "attr", "cardinality", Value::from("many")).await;
}

// ─── Updates ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn update_merges_partial_data() {
  let s = store();
  let id = assert_ok(&s, "e1", "block/content", Value::from("before")).await;

  let updated = s
    .update_fact(&id, FactUpdate {
      value: Some(Value::from("after")),
      positions: Some([("aev".to_string(), "a1".to_string())].into()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert!(updated);

  let fact = s.get_fact(&id).await.unwrap().unwrap();
  assert_eq!(fact.value, Value::from("after"));
  assert_eq!(fact::position_in(&fact, "aev"), Some("a1"));
}

#[tokio::test]
async fn update_of_missing_fact_returns_false() {
  let s = store();
  let updated = s
    .update_fact("ghost", FactUpdate {
      value: Some(Value::from("x")),
      ..Default::default()
    })
    .await
    .unwrap();
  assert!(!updated);
}

#[tokio::test]
async fn update_changing_attribute_revalidates_uniqueness() {
  let s = store();
  assert_ok(&s, "e1", "card/title", Value::from("Taken")).await;
  let id = assert_ok(&s, "e2", "block/content", Value::from("Taken")).await;

  // Re-pointing the fact at a unique attribute collides with e1's title.
  let updated = s
    .update_fact(&id, FactUpdate {
      attribute: Some("card/title".into()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert!(!updated);

  let untouched = s.get_fact(&id).await.unwrap().unwrap();
  assert_eq!(untouched.attribute, "block/content");
}

// ─── Scan shapes ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn eav_collapses_cardinality_one_lookups() {
  let s = store();
  assert_ok(&s, "e1", "block/content", Value::from("text")).await;
  assert_ok(&s, "e1", "deck/contains", Value::reference("c1")).await;
  assert_ok(&s, "e1", "deck/contains", Value::reference("c2")).await;

  assert!(matches!(
    s.eav("e1", Some("block/content")).await.unwrap(),
    EavResult::One(Some(_))
  ));
  assert!(matches!(
    s.eav("e1", Some("deck/contains")).await.unwrap(),
    EavResult::Many(facts) if facts.len() == 2
  ));
  assert!(matches!(
    s.eav("e1", None).await.unwrap(),
    EavResult::Many(facts) if facts.len() == 3
  ));
}

#[tokio::test]
async fn vae_finds_referencing_facts() {
  let s = store();
  assert_ok(&s, "deck", "deck/contains", Value::reference("card")).await;
  assert_ok(&s, "card", "block/parent", Value::parent("room", "a0")).await;
  assert_ok(&s, "card", "block/content", Value::from("not a reference")).await;

  let backlinks = s.vae("card", None).await.unwrap();
  assert_eq!(backlinks.len(), 1);
  assert_eq!(backlinks[0].entity, "deck");

  let parents = s.vae("room", Some("block/parent")).await.unwrap();
  assert_eq!(parents.len(), 1);
  assert_eq!(parents[0].entity, "card");
}

// ─── Messages ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn messages_get_monotonic_sequence_indexes() {
  let s = store();
  for (id, content) in [("m1", "hello"), ("m2", "world")] {
    s.post_message(NewMessage {
      id:      id.into(),
      topic:   "general".into(),
      ts:      fact::timestamp_now(),
      sender:  "member-1".into(),
      content: content.into(),
    })
    .await
    .unwrap();
  }

  let messages = s.messages("general").await.unwrap();
  assert_eq!(messages.len(), 2);
  assert_eq!(messages[0].index, 0);
  assert_eq!(messages[1].index, 1);
  assert!(s.messages("other-topic").await.unwrap().is_empty());
}

// ─── Pull diffs ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn changes_since_tracks_puts_and_dels() {
  let s = store();
  let first = assert_ok(&s, "e1", "block/content", Value::from("v1")).await;

  let (patch, cookie) = s.changes_since(None).await.unwrap();
  assert_eq!(patch.len(), 1);
  assert!(matches!(&patch[0], PatchOp::Put { key, .. } if *key == first));

  // Nothing new: empty diff, cookie stays put.
  let (patch, unchanged) = s.changes_since(Some(&cookie)).await.unwrap();
  assert!(patch.is_empty());
  assert_eq!(unchanged, cookie);

  let second = assert_ok(&s, "e2", "block/content", Value::from("v2")).await;
  s.retract_fact(&first).await.unwrap();

  let (patch, next) = s.changes_since(Some(&cookie)).await.unwrap();
  assert!(next > cookie);
  let mut puts = 0;
  let mut dels = 0;
  for op in &patch {
    match op {
      PatchOp::Put { key, .. } => {
        assert_eq!(*key, second);
        puts += 1;
      }
      PatchOp::Del { key } => {
        assert_eq!(*key, first);
        dels += 1;
      }
    }
  }
  assert_eq!((puts, dels), (1, 1));
}

// ─── Block tree mutations ────────────────────────────────────────────────────

#[tokio::test]
async fn add_child_block_orders_siblings() {
  let s = store();

  let add = |child: &str, before: Option<&str>, after: Option<&str>| {
    Mutation::AddChildBlock(AddChildBlockArgs {
      parent:  "root".into(),
      child:   child.into(),
      fact_id: None,
      before:  before.map(str::to_string),
      after:   after.map(str::to_string),
    })
  };

  add("c1", None, None).apply(&s).await.unwrap();
  add("c2", None, Some("c1")).apply(&s).await.unwrap();
  add("c3", Some("c2"), None).apply(&s).await.unwrap();
  add("c4", None, Some("c3")).apply(&s).await.unwrap();

  assert_eq!(children_of(&s, "root").await, vec!["c1", "c3", "c4", "c2"]);
}

#[tokio::test]
async fn repeated_insertion_between_neighbours_stays_ordered() {
  let s = store();
  Mutation::AddChildBlock(AddChildBlockArgs {
    parent:  "root".into(),
    child:   "first".into(),
    fact_id: None,
    before:  None,
    after:   None,
  })
  .apply(&s)
  .await
  .unwrap();
  Mutation::AddChildBlock(AddChildBlockArgs {
    parent:  "root".into(),
    child:   "last".into(),
    fact_id: None,
    before:  None,
    after:   Some("first".into()),
  })
  .apply(&s)
  .await
  .unwrap();

  // Keep splitting the gap after "first"; every insertion must land
  // strictly between its anchors.
  let mut expected = vec!["first".to_string(), "last".to_string()];
  for i in 0..12 {
    let child = format!("mid{i}");
    Mutation::AddChildBlock(AddChildBlockArgs {
      parent:  "root".into(),
      child:   child.clone(),
      fact_id: None,
      before:  None,
      after:   Some("first".into()),
    })
    .apply(&s)
    .await
    .unwrap();
    expected.insert(1, child);
  }

  assert_eq!(children_of(&s, "root").await, expected);
}

#[tokio::test]
async fn move_up_and_down_swap_neighbours() {
  let s = store();
  for child in ["a", "b", "c"] {
    Mutation::AddChildBlock(AddChildBlockArgs {
      parent:  "root".into(),
      child:   child.into(),
      fact_id: None,
      before:  None,
      after:   None,
    })
    .apply(&s)
    .await
    .unwrap();
  }
  assert_eq!(children_of(&s, "root").await, vec!["a", "b", "c"]);

  Mutation::MoveBlockUp(BlockArgs { entity: "c".into() })
    .apply(&s)
    .await
    .unwrap();
  assert_eq!(children_of(&s, "root").await, vec!["a", "c", "b"]);

  Mutation::MoveBlockDown(BlockArgs { entity: "a".into() })
    .apply(&s)
    .await
    .unwrap();
  assert_eq!(children_of(&s, "root").await, vec!["c", "a", "b"]);

  // Edges are no-ops.
  Mutation::MoveBlockUp(BlockArgs { entity: "c".into() })
    .apply(&s)
    .await
    .unwrap();
  Mutation::MoveBlockDown(BlockArgs { entity: "b".into() })
    .apply(&s)
    .await
    .unwrap();
  assert_eq!(children_of(&s, "root").await, vec!["c", "a", "b"]);
}

#[tokio::test]
async fn indent_makes_block_a_child_of_its_previous_sibling() {
  let s = store();
  for child in ["a", "b"] {
    Mutation::AddChildBlock(AddChildBlockArgs {
      parent:  "root".into(),
      child:   child.into(),
      fact_id: None,
      before:  None,
      after:   None,
    })
    .apply(&s)
    .await
    .unwrap();
  }

  Mutation::IndentBlock(BlockArgs { entity: "b".into() })
    .apply(&s)
    .await
    .unwrap();
  assert_eq!(children_of(&s, "root").await, vec!["a"]);
  assert_eq!(children_of(&s, "a").await, vec!["b"]);

  // The first sibling has nothing above it to indent under.
  Mutation::IndentBlock(BlockArgs { entity: "a".into() })
    .apply(&s)
    .await
    .unwrap();
  assert_eq!(children_of(&s, "root").await, vec!["a"]);

  Mutation::OutdentBlock(BlockArgs { entity: "b".into() })
    .apply(&s)
    .await
    .unwrap();
  assert_eq!(children_of(&s, "root").await, vec!["a", "b"]);
  assert!(children_of(&s, "a").await.is_empty());
}

#[tokio::test]
async fn delete_block_retracts_subject_and_reference_facts() {
  let s = store();
  assert_ok(&s, "card", "block/content", Value::from("text")).await;
  assert_ok(&s, "deck", "deck/contains", Value::reference("card")).await;

  Mutation::DeleteBlock(BlockArgs { entity: "card".into() })
    .apply(&s)
    .await
    .unwrap();

  assert!(s.eav("card", None).await.unwrap().many().is_empty());
  assert!(s.vae("card", None).await.unwrap().is_empty());
  assert!(s.aev("deck/contains", Some("deck")).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_entity_descends_through_children() {
  let s = store();
  assert_ok(&s, "a", "block/content", Value::from("parent")).await;
  assert_ok(&s, "b", "block/content", Value::from("child")).await;
  assert_ok(&s, "b", "block/parent", Value::parent("a", "a0")).await;
  assert_ok(&s, "c", "block/content", Value::from("grandchild")).await;
  assert_ok(&s, "c", "block/parent", Value::parent("b", "a0")).await;

  Mutation::DeleteEntity(BlockArgs { entity: "a".into() })
    .apply(&s)
    .await
    .unwrap();

  for entity in ["a", "b", "c"] {
    assert!(
      s.eav(entity, None).await.unwrap().many().is_empty(),
      "{entity} still has live facts"
    );
  }
}

// ─── Collections ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_card_to_collection_appends_in_order() {
  let s = store();
  for card in ["c1", "c2", "c3"] {
    Mutation::AddCardToCollection(AddCardToCollectionArgs {
      collection: "deck".into(),
      card:       card.into(),
      fact_id:    None,
    })
    .apply(&s)
    .await
    .unwrap();
  }

  let mut contains = s.aev("deck/contains", Some("deck")).await.unwrap();
  contains.sort_by(|a, b| {
    let ap = fact::position_in(a, "aev").unwrap_or("");
    let bp = fact::position_in(b, "aev").unwrap_or("");
    ap.cmp(bp).then_with(|| a.id.cmp(&b.id))
  });
  let cards: Vec<&str> = contains
    .iter()
    .filter_map(|f| f.value.reference_target())
    .collect();
  assert_eq!(cards, vec!["c1", "c2", "c3"]);
}

// ─── Content and titles ──────────────────────────────────────────────────────

#[tokio::test]
async fn update_block_content_derives_title_and_diffs_links() {
  let s = store();
  assert_ok(&s, "target", "card/title", Value::from("Target")).await;
  assert_ok(&s, "other", "card/title", Value::from("Other")).await;

  Mutation::UpdateBlockContent(UpdateBlockContentArgs {
    entity:  "note".into(),
    content: "# Notes\nsee [[Target]] and [[Other]]".into(),
  })
  .apply(&s)
  .await
  .unwrap();

  let title = s.eav("note", Some("card/title")).await.unwrap().one().unwrap();
  assert_eq!(title.value, Value::from("Notes"));

  let links = s.eav("note", Some("card/inline-links-to")).await.unwrap().many();
  let mut targets: Vec<&str> =
    links.iter().filter_map(|f| f.value.reference_target()).collect();
  targets.sort();
  assert_eq!(targets, vec!["other", "target"]);

  // Dropping one link retracts its fact and keeps the other.
  Mutation::UpdateBlockContent(UpdateBlockContentArgs {
    entity:  "note".into(),
    content: "# Notes\nsee [[Target]] only".into(),
  })
  .apply(&s)
  .await
  .unwrap();

  let links = s.eav("note", Some("card/inline-links-to")).await.unwrap().many();
  assert_eq!(links.len(), 1);
  assert_eq!(links[0].value.reference_target(), Some("target"));
}

#[tokio::test]
async fn links_to_unknown_titles_are_ignored() {
  let s = store();
  Mutation::UpdateBlockContent(UpdateBlockContentArgs {
    entity:  "note".into(),
    content: "see [[Nobody Home]]".into(),
  })
  .apply(&s)
  .await
  .unwrap();

  assert!(
    s.eav("note", Some("card/inline-links-to"))
      .await
      .unwrap()
      .many()
      .is_empty()
  );
}

#[tokio::test]
async fn update_title_rewrites_backlink_text() {
  let s = store();
  assert_ok(&s, "target", "card/title", Value::from("Old Name")).await;
  Mutation::UpdateBlockContent(UpdateBlockContentArgs {
    entity:  "note".into(),
    content: "before [[Old Name]] after [[Old Name]]".into(),
  })
  .apply(&s)
  .await
  .unwrap();

  Mutation::UpdateTitle(UpdateTitleArgs {
    entity: "target".into(),
    title:  "New Name".into(),
  })
  .apply(&s)
  .await
  .unwrap();

  let title = s.eav("target", Some("card/title")).await.unwrap().one().unwrap();
  assert_eq!(title.value, Value::from("New Name"));

  let content =
    s.eav("note", Some("block/content")).await.unwrap().one().unwrap();
  assert_eq!(
    content.value,
    Value::from("before [[New Name]] after [[New Name]]")
  );

  // The link fact still points at the same entity.
  let links = s.eav("note", Some("card/inline-links-to")).await.unwrap().many();
  assert_eq!(links[0].value.reference_target(), Some("target"));
}

#[tokio::test]
async fn update_title_conflict_leaves_everything_untouched() {
  let s = store();
  assert_ok(&s, "target", "card/title", Value::from("Old Name")).await;
  assert_ok(&s, "squatter", "card/title", Value::from("New Name")).await;
  Mutation::UpdateBlockContent(UpdateBlockContentArgs {
    entity:  "note".into(),
    content: "see [[Old Name]]".into(),
  })
  .apply(&s)
  .await
  .unwrap();

  Mutation::UpdateTitle(UpdateTitleArgs {
    entity: "target".into(),
    title:  "New Name".into(),
  })
  .apply(&s)
  .await
  .unwrap();

  let title = s.eav("target", Some("card/title")).await.unwrap().one().unwrap();
  assert_eq!(title.value, Value::from("Old Name"));
  let content =
    s.eav("note", Some("block/content")).await.unwrap().one().unwrap();
  assert_eq!(content.value, Value::from("see [[Old Name]]"));
}

// ─── Migrations ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn migrations_apply_once_and_persist_the_tag() {
  let s = store();
  migration::ensure_migrated(&s).await.unwrap();

  let tag = s.meta_string("lastAppliedMigration").await.unwrap().unwrap();
  assert_eq!(
    tag.as_str(),
    migration::MIGRATIONS.last().unwrap().tag
  );

  // A second run is a no-op.
  migration::ensure_migrated(&s).await.unwrap();
  assert_eq!(
    s.meta_string("lastAppliedMigration").await.unwrap().unwrap(),
    tag
  );
}

#[tokio::test]
async fn refreeze_rewrites_stale_schema_copies() {
  let s = store();

  // A fact written under an old registry where block/content was
  // cardinality-many.
  let mut stale = weft_core::fact::Fact {
    id:           "f-stale".into(),
    entity:       "e1".into(),
    attribute:    "block/content".into(),
    value:        Value::from("text"),
    retracted:    false,
    last_updated: fact::timestamp_now(),
    schema:       schema::resolve("block/content").unwrap(),
    positions:    None,
  };
  stale.schema.cardinality = schema::Cardinality::Many;
  s.apply_remote_fact(stale).await.unwrap();

  migration::ensure_migrated(&s).await.unwrap();

  let refrozen = s.get_fact("f-stale").await.unwrap().unwrap();
  assert_eq!(refrozen.schema, schema::resolve("block/content").unwrap());
}

// ─── Watermarks ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn last_mutation_id_defaults_to_zero_and_round_trips() {
  let s = store();
  assert_eq!(s.last_mutation_id("client-1").await.unwrap(), 0);
  s.set_last_mutation_id("client-1", 7).await.unwrap();
  assert_eq!(s.last_mutation_id("client-1").await.unwrap(), 7);
  assert_eq!(s.last_mutation_id("client-2").await.unwrap(), 0);
}

// ─── SQLite smoke tests ──────────────────────────────────────────────────────

#[tokio::test]
async fn sqlite_backed_engine_retracts_and_scans() {
  let s = FactStore::new(SqliteStorage::open_in_memory().await.unwrap());
  let id = assert_ok(&s, "e1", "block/content", Value::from("persisted")).await;

  assert!(s.eav("e1", Some("block/content")).await.unwrap().one().is_some());
  s.retract_fact(&id).await.unwrap();
  assert!(s.eav("e1", Some("block/content")).await.unwrap().one().is_none());
  assert!(s.get_fact(&id).await.unwrap().unwrap().retracted);
}

#[tokio::test]
async fn sqlite_backed_engine_enforces_uniqueness() {
  let s = FactStore::new(SqliteStorage::open_in_memory().await.unwrap());
  assert_ok(&s, "e1", "card/title", Value::from("Solo")).await;
  let outcome = s
    .assert_fact(FactInput::new("e2", "card/title", Value::from("Solo")))
    .await
    .unwrap();
  assert_eq!(
    outcome,
    AssertOutcome::Rejected(RejectReason::UniqueConflict)
  );
}

#[tokio::test]
async fn sqlite_keys_with_delimiter_characters_stay_isolated() {
  let s = FactStore::new(SqliteStorage::open_in_memory().await.unwrap());
  // An entity id containing the byte a joined-string index would use as a
  // separator must not bleed into its neighbour's scan.
  assert_ok(&s, "e1-x", "block/content", Value::from("a")).await;
  assert_ok(&s, "e1", "block/content", Value::from("b")).await;

  let facts = s.eav("e1", None).await.unwrap().many();
  assert_eq!(facts.len(), 1);
  assert_eq!(facts[0].value, Value::from("b"));
}
