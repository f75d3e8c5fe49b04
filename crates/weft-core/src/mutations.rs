//! The closed registry of named mutations.
//!
//! A mutation is business logic expressed entirely through the
//! [`MutationContext`] capability interface. Given the same store state and
//! the same arguments, a mutation must produce the same resulting store
//! state whether it runs speculatively on a client replica or
//! authoritatively during server replay. That determinism is the entire
//! sync design: client and server share this module, never separate
//! implementations.
//!
//! Registration is closed: the wire resolves names through
//! [`Mutation::from_wire`], and unknown names surface as
//! [`Error::UnknownMutation`] so the push handler can skip them while still
//! advancing the client's watermark.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{
  context::{MutationContext, ServerEffect},
  error::Error,
  fact::{self, FactInput, FactUpdate, Value},
  fractional::generate_key_between,
  links,
  message::NewMessage,
};

// ─── Argument types ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetractFactArgs {
  pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFactArgs {
  pub id:   String,
  pub data: FactUpdate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePositionsArgs {
  pub fact_id:   String,
  pub positions: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddChildBlockArgs {
  pub parent: String,
  pub child:  String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fact_id: Option<String>,
  /// Insert immediately before this sibling entity.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub before: Option<String>,
  /// Insert immediately after this sibling entity.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub after:  Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockArgs {
  pub entity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCardToCollectionArgs {
  pub collection: String,
  pub card:       String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fact_id:    Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBlockContentArgs {
  pub entity:  String,
  pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTitleArgs {
  pub entity: String,
  pub title:  String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSpaceDataArgs {
  pub entity:      String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name:        Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

// ─── Registry ────────────────────────────────────────────────────────────────

/// Every mutation Weft knows how to replay, keyed on the wire by its
/// camelCase name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "args", rename_all = "camelCase")]
pub enum Mutation {
  AssertFact(Vec<FactInput>),
  RetractFact(RetractFactArgs),
  UpdateFact(UpdateFactArgs),
  UpdatePositions(UpdatePositionsArgs),
  AddChildBlock(AddChildBlockArgs),
  IndentBlock(BlockArgs),
  OutdentBlock(BlockArgs),
  MoveBlockUp(BlockArgs),
  MoveBlockDown(BlockArgs),
  DeleteBlock(BlockArgs),
  DeleteEntity(BlockArgs),
  AddCardToCollection(AddCardToCollectionArgs),
  UpdateBlockContent(UpdateBlockContentArgs),
  UpdateTitle(UpdateTitleArgs),
  UpdateSpaceData(UpdateSpaceDataArgs),
  PostMessage(NewMessage),
}

/// `assertFact` accepts a single input or a batch on the wire.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
  One(T),
  Many(Vec<T>),
}

impl<T> From<OneOrMany<T>> for Vec<T> {
  fn from(v: OneOrMany<T>) -> Self {
    match v {
      OneOrMany::One(item) => vec![item],
      OneOrMany::Many(items) => items,
    }
  }
}

impl Mutation {
  /// Resolve a wire (name, args) pair against the registry.
  pub fn from_wire(name: &str, args: JsonValue) -> Result<Self, Error> {
    fn parse<T: serde::de::DeserializeOwned>(
      name: &str,
      args: JsonValue,
    ) -> Result<T, Error> {
      serde_json::from_value(args).map_err(|source| Error::MalformedArgs {
        name: name.to_string(),
        source,
      })
    }

    let mutation = match name {
      "assertFact" => {
        Self::AssertFact(parse::<OneOrMany<FactInput>>(name, args)?.into())
      }
      "retractFact" => Self::RetractFact(parse(name, args)?),
      "updateFact" => Self::UpdateFact(parse(name, args)?),
      "updatePositions" => Self::UpdatePositions(parse(name, args)?),
      "addChildBlock" => Self::AddChildBlock(parse(name, args)?),
      "indentBlock" => Self::IndentBlock(parse(name, args)?),
      "outdentBlock" => Self::OutdentBlock(parse(name, args)?),
      "moveBlockUp" => Self::MoveBlockUp(parse(name, args)?),
      "moveBlockDown" => Self::MoveBlockDown(parse(name, args)?),
      "deleteBlock" => Self::DeleteBlock(parse(name, args)?),
      "deleteEntity" => Self::DeleteEntity(parse(name, args)?),
      "addCardToCollection" => Self::AddCardToCollection(parse(name, args)?),
      "updateBlockContent" => Self::UpdateBlockContent(parse(name, args)?),
      "updateTitle" => Self::UpdateTitle(parse(name, args)?),
      "updateSpaceData" => Self::UpdateSpaceData(parse(name, args)?),
      "postMessage" => Self::PostMessage(parse(name, args)?),
      other => return Err(Error::UnknownMutation(other.to_string())),
    };
    Ok(mutation)
  }

  /// The wire name this mutation registers under.
  pub fn name(&self) -> &'static str {
    match self {
      Self::AssertFact(_) => "assertFact",
      Self::RetractFact(_) => "retractFact",
      Self::UpdateFact(_) => "updateFact",
      Self::UpdatePositions(_) => "updatePositions",
      Self::AddChildBlock(_) => "addChildBlock",
      Self::IndentBlock(_) => "indentBlock",
      Self::OutdentBlock(_) => "outdentBlock",
      Self::MoveBlockUp(_) => "moveBlockUp",
      Self::MoveBlockDown(_) => "moveBlockDown",
      Self::DeleteBlock(_) => "deleteBlock",
      Self::DeleteEntity(_) => "deleteEntity",
      Self::AddCardToCollection(_) => "addCardToCollection",
      Self::UpdateBlockContent(_) => "updateBlockContent",
      Self::UpdateTitle(_) => "updateTitle",
      Self::UpdateSpaceData(_) => "updateSpaceData",
      Self::PostMessage(_) => "postMessage",
    }
  }

  /// The args payload as it appears on the wire. The full serialized form is
  /// `{"name": ..., "args": ...}`; we want only the payload.
  pub fn wire_args(&self) -> crate::Result<JsonValue> {
    let full = serde_json::to_value(self)?;
    Ok(full.get("args").cloned().unwrap_or(JsonValue::Null))
  }

  /// Execute against a store. A `Rejected` assert does not mutate state and
  /// does not abort the mutation; storage errors propagate and are caught
  /// per-mutation by the replay loop.
  pub async fn apply<C: MutationContext>(&self, ctx: &C) -> Result<(), C::Error> {
    match self {
      Self::AssertFact(facts) => {
        for input in facts {
          ctx.assert_fact(input.clone()).await?;
        }
      }

      Self::RetractFact(args) => ctx.retract_fact(&args.id).await?,

      Self::UpdateFact(args) => {
        ctx.update_fact(&args.id, args.data.clone()).await?;
      }

      Self::UpdatePositions(args) => {
        ctx
          .update_fact(&args.fact_id, FactUpdate {
            positions: Some(args.positions.clone()),
            ..Default::default()
          })
          .await?;
      }

      Self::AddChildBlock(args) => add_child_block(args, ctx).await?,
      Self::IndentBlock(args) => indent_block(args, ctx).await?,
      Self::OutdentBlock(args) => outdent_block(args, ctx).await?,
      Self::MoveBlockUp(args) => move_block_up(args, ctx).await?,
      Self::MoveBlockDown(args) => move_block_down(args, ctx).await?,
      Self::DeleteBlock(args) => delete_block(&args.entity, ctx).await?,
      Self::DeleteEntity(args) => delete_entity(args, ctx).await?,
      Self::AddCardToCollection(args) => add_card_to_collection(args, ctx).await?,
      Self::UpdateBlockContent(args) => update_block_content(args, ctx).await?,
      Self::UpdateTitle(args) => update_title(args, ctx).await?,
      Self::UpdateSpaceData(args) => update_space_data(args, ctx).await?,

      Self::PostMessage(message) => ctx.post_message(message.clone()).await?,
    }
    Ok(())
  }
}

// ─── Block tree mutations ────────────────────────────────────────────────────

/// The sibling list under `parent`, sorted by fractional position.
async fn siblings_of<C: MutationContext>(
  parent: &str,
  ctx: &C,
) -> Result<Vec<crate::fact::Fact>, C::Error> {
  let mut siblings = ctx.vae(parent, Some("block/parent")).await?;
  siblings.sort_by(fact::sort_by_position);
  Ok(siblings)
}

async fn add_child_block<C: MutationContext>(
  args: &AddChildBlockArgs,
  ctx: &C,
) -> Result<(), C::Error> {
  let children = siblings_of(&args.parent, ctx).await?;

  // The anchor index is the sibling the new block lands after; -1 means the
  // front of the list. With no anchor the block is appended.
  let anchor: isize = if let Some(before) = &args.before {
    match children.iter().position(|c| c.entity == *before) {
      Some(i) => i as isize - 1,
      None => children.len() as isize - 1,
    }
  } else if let Some(after) = &args.after {
    match children.iter().position(|c| c.entity == *after) {
      Some(i) => i as isize,
      None => children.len() as isize - 1,
    }
  } else {
    children.len() as isize - 1
  };

  let lower = if anchor >= 0 {
    children
      .get(anchor as usize)
      .and_then(|c| c.value.parent_position())
  } else {
    None
  };
  let upper = children
    .get((anchor + 1) as usize)
    .and_then(|c| c.value.parent_position());
  let position = generate_key_between(lower, upper);

  ctx
    .assert_fact(FactInput {
      entity:    args.child.clone(),
      attribute: "block/parent".into(),
      value:     Value::parent(&args.parent, position),
      fact_id:   args.fact_id.clone(),
      positions: None,
    })
    .await?;
  Ok(())
}

async fn indent_block<C: MutationContext>(
  args: &BlockArgs,
  ctx: &C,
) -> Result<(), C::Error> {
  let Some(parent) = ctx.eav(&args.entity, Some("block/parent")).await?.one()
  else {
    return Ok(());
  };
  let Some(parent_entity) = parent.value.reference_target().map(str::to_string)
  else {
    return Ok(());
  };

  let siblings = siblings_of(&parent_entity, ctx).await?;
  let Some(position) = siblings.iter().position(|s| s.entity == args.entity)
  else {
    return Ok(());
  };
  if position < 1 {
    return Ok(());
  }

  // The block becomes the last child of the sibling directly above it.
  let new_parent = siblings[position - 1].entity.clone();
  let new_siblings = siblings_of(&new_parent, ctx).await?;
  let last = new_siblings.last().and_then(|s| s.value.parent_position());
  let new_position = generate_key_between(last, None);

  ctx
    .update_fact(&parent.id, FactUpdate {
      value: Some(Value::parent(new_parent, new_position)),
      ..Default::default()
    })
    .await?;
  Ok(())
}

async fn outdent_block<C: MutationContext>(
  args: &BlockArgs,
  ctx: &C,
) -> Result<(), C::Error> {
  let Some(parent) = ctx.eav(&args.entity, Some("block/parent")).await?.one()
  else {
    return Ok(());
  };
  let Some(parent_entity) = parent.value.reference_target().map(str::to_string)
  else {
    return Ok(());
  };
  let Some(grandparent) =
    ctx.eav(&parent_entity, Some("block/parent")).await?.one()
  else {
    return Ok(());
  };
  let Some(grandparent_entity) =
    grandparent.value.reference_target().map(str::to_string)
  else {
    return Ok(());
  };

  // The block slots in directly after its old parent.
  let grand_siblings = siblings_of(&grandparent_entity, ctx).await?;
  let Some(position) =
    grand_siblings.iter().position(|s| s.entity == parent_entity)
  else {
    return Ok(());
  };

  let lower = grand_siblings
    .get(position)
    .and_then(|s| s.value.parent_position());
  let upper = grand_siblings
    .get(position + 1)
    .and_then(|s| s.value.parent_position());
  let new_position = generate_key_between(lower, upper);

  ctx
    .update_fact(&parent.id, FactUpdate {
      value: Some(Value::parent(grandparent_entity, new_position)),
      ..Default::default()
    })
    .await?;
  Ok(())
}

async fn move_block_up<C: MutationContext>(
  args: &BlockArgs,
  ctx: &C,
) -> Result<(), C::Error> {
  let Some(parent) = ctx.eav(&args.entity, Some("block/parent")).await?.one()
  else {
    return Ok(());
  };
  let Some(parent_entity) = parent.value.reference_target().map(str::to_string)
  else {
    return Ok(());
  };

  let siblings = siblings_of(&parent_entity, ctx).await?;
  let Some(position) = siblings.iter().position(|s| s.entity == args.entity)
  else {
    return Ok(());
  };
  if position == 0 {
    return Ok(());
  }

  let lower = if position >= 2 {
    siblings[position - 2].value.parent_position()
  } else {
    None
  };
  let upper = siblings[position - 1].value.parent_position();
  let new_position = generate_key_between(lower, upper);

  ctx
    .update_fact(&parent.id, FactUpdate {
      value: Some(Value::parent(parent_entity, new_position)),
      ..Default::default()
    })
    .await?;
  Ok(())
}

async fn move_block_down<C: MutationContext>(
  args: &BlockArgs,
  ctx: &C,
) -> Result<(), C::Error> {
  let Some(parent) = ctx.eav(&args.entity, Some("block/parent")).await?.one()
  else {
    return Ok(());
  };
  let Some(parent_entity) = parent.value.reference_target().map(str::to_string)
  else {
    return Ok(());
  };

  let siblings = siblings_of(&parent_entity, ctx).await?;
  let Some(position) = siblings.iter().position(|s| s.entity == args.entity)
  else {
    return Ok(());
  };
  if position + 1 >= siblings.len() {
    return Ok(());
  }

  let lower = siblings[position + 1].value.parent_position();
  let upper = siblings
    .get(position + 2)
    .and_then(|s| s.value.parent_position());
  let new_position = generate_key_between(lower, upper);

  ctx
    .update_fact(&parent.id, FactUpdate {
      value: Some(Value::parent(parent_entity, new_position)),
      ..Default::default()
    })
    .await?;
  Ok(())
}

// ─── Deletion ────────────────────────────────────────────────────────────────

/// Retract every fact where `entity` is the subject and every fact that
/// references it.
async fn delete_block<C: MutationContext>(
  entity: &str,
  ctx: &C,
) -> Result<(), C::Error> {
  let references = ctx.vae(entity, None).await?;
  let facts = ctx.eav(entity, None).await?.many();
  for fact in facts.into_iter().chain(references) {
    ctx.retract_fact(&fact.id).await?;
  }
  Ok(())
}

/// [`delete_block`], applied recursively through `block/parent` descendants.
async fn delete_entity<C: MutationContext>(
  args: &BlockArgs,
  ctx: &C,
) -> Result<(), C::Error> {
  let mut queue = vec![args.entity.clone()];
  let mut seen = BTreeSet::new();
  while let Some(entity) = queue.pop() {
    if !seen.insert(entity.clone()) {
      continue;
    }
    for child in ctx.vae(&entity, Some("block/parent")).await? {
      queue.push(child.entity.clone());
    }
    delete_block(&entity, ctx).await?;
  }
  Ok(())
}

// ─── Collections ─────────────────────────────────────────────────────────────

async fn add_card_to_collection<C: MutationContext>(
  args: &AddCardToCollectionArgs,
  ctx: &C,
) -> Result<(), C::Error> {
  let mut existing = ctx.aev("deck/contains", Some(&args.collection)).await?;
  existing.sort_by(|a, b| {
    let ap = fact::position_in(a, "aev").unwrap_or("");
    let bp = fact::position_in(b, "aev").unwrap_or("");
    ap.cmp(bp).then_with(|| a.id.cmp(&b.id))
  });

  let last = existing
    .last()
    .and_then(|f| fact::position_in(f, "aev"))
    .map(str::to_string);
  let position = generate_key_between(last.as_deref(), None);

  ctx
    .assert_fact(FactInput {
      entity:    args.collection.clone(),
      attribute: "deck/contains".into(),
      value:     Value::reference(&args.card),
      fact_id:   args.fact_id.clone(),
      positions: Some(BTreeMap::from([("aev".to_string(), position)])),
    })
    .await?;
  Ok(())
}

// ─── Content and titles ──────────────────────────────────────────────────────

async fn update_block_content<C: MutationContext>(
  args: &UpdateBlockContentArgs,
  ctx: &C,
) -> Result<(), C::Error> {
  ctx
    .assert_fact(FactInput::new(
      &args.entity,
      "block/content",
      Value::from(args.content.as_str()),
    ))
    .await?;

  // Mirror a leading markdown heading into the unique title attribute. A
  // title collision rejects silently; the heading text stays as plain
  // content.
  if let Some(title) = links::heading_title(&args.content) {
    let current = ctx.eav(&args.entity, Some("card/title")).await?.one();
    if current.as_ref().and_then(|f| f.value.as_str()) != Some(title) {
      ctx
        .assert_fact(FactInput::new(
          &args.entity,
          "card/title",
          Value::from(title),
        ))
        .await?;
    }
  }

  // Diff [[wiki-link]] occurrences against the existing link facts.
  let mut wanted = BTreeSet::new();
  for name in links::wiki_links(&args.content) {
    if let Some(target) = ctx.ave("card/title", &name).await? {
      wanted.insert(target.entity);
    }
  }

  let existing = ctx
    .eav(&args.entity, Some("card/inline-links-to"))
    .await?
    .many();
  for link in &existing {
    match link.value.reference_target() {
      Some(target) if wanted.remove(target) => {}
      _ => ctx.retract_fact(&link.id).await?,
    }
  }
  for target in wanted {
    ctx
      .assert_fact(FactInput::new(
        &args.entity,
        "card/inline-links-to",
        Value::reference(target),
      ))
      .await?;
  }
  Ok(())
}

async fn update_title<C: MutationContext>(
  args: &UpdateTitleArgs,
  ctx: &C,
) -> Result<(), C::Error> {
  let current = ctx.eav(&args.entity, Some("card/title")).await?.one();
  let old_title = current.as_ref().and_then(|f| f.value.as_str());
  if old_title == Some(args.title.as_str()) {
    return Ok(());
  }

  let outcome = ctx
    .assert_fact(FactInput::new(
      &args.entity,
      "card/title",
      Value::from(args.title.as_str()),
    ))
    .await?;
  if !outcome.is_asserted() {
    // The new title is already taken; leave everything untouched.
    return Ok(());
  }

  // Rewrite the literal [[old]] text inside every linking block. This is a
  // denormalized-text update, not an index update: the link facts keep
  // their entity references and only the content strings change.
  let Some(old_title) = old_title.map(str::to_string) else {
    return Ok(());
  };
  let backlinks = ctx.vae(&args.entity, Some("card/inline-links-to")).await?;
  for link in backlinks {
    let Some(content) =
      ctx.eav(&link.entity, Some("block/content")).await?.one()
    else {
      continue;
    };
    let Some(text) = content.value.as_str() else {
      continue;
    };
    let rewritten = links::rename_links(text, &old_title, &args.title);
    if rewritten != text {
      ctx
        .update_fact(&content.id, FactUpdate {
          value: Some(Value::from(rewritten)),
          ..Default::default()
        })
        .await?;
    }
  }
  Ok(())
}

// ─── Space metadata ──────────────────────────────────────────────────────────

async fn update_space_data<C: MutationContext>(
  args: &UpdateSpaceDataArgs,
  ctx: &C,
) -> Result<(), C::Error> {
  if let Some(name) = &args.name {
    ctx
      .assert_fact(FactInput::new(
        &args.entity,
        "this/name",
        Value::from(name.as_str()),
      ))
      .await?;
  }
  if let Some(description) = &args.description {
    ctx
      .assert_fact(FactInput::new(
        &args.entity,
        "this/description",
        Value::from(description.as_str()),
      ))
      .await?;
  }
  // Spaces that hold a local copy of this space's metadata refresh it out of
  // band; their copies are not part of this store's correctness.
  ctx.run_on_server(ServerEffect::NotifySpace {
    space: args.entity.clone(),
  });
  Ok(())
}
