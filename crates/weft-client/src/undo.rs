//! Command-pattern undo/redo.
//!
//! Each user-visible action records an [`ActionGroup`]: the list of
//! `{forward, inverse}` mutation pairs that performed it. Undoing replays
//! the inverses (in reverse order) as ordinary mutations, so an undo queues,
//! pushes, and converges across clients exactly like the original edit.
//! Nothing here captures closures over store state; both directions are
//! plain registry values that can be replayed at any time.

use weft_core::mutations::Mutation;

use crate::{Result, replica::Replica};

/// One reversible step: the mutation that was run and the mutation that
/// undoes it, both resolved against the registry.
pub struct Op {
  pub forward: Mutation,
  pub inverse: Mutation,
}

/// The ops making up one user-visible action, in execution order.
#[derive(Default)]
pub struct ActionGroup {
  pub ops: Vec<Op>,
}

impl ActionGroup {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, forward: Mutation, inverse: Mutation) {
    self.ops.push(Op { forward, inverse });
  }
}

/// Paired undo/redo stacks. Recording a new action clears the redo stack,
/// the usual linear-history rule.
#[derive(Default)]
pub struct UndoManager {
  done:   Vec<ActionGroup>,
  undone: Vec<ActionGroup>,
}

impl UndoManager {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record an already-executed action so it can be undone.
  pub fn record(&mut self, group: ActionGroup) {
    self.done.push(group);
    self.undone.clear();
  }

  pub fn can_undo(&self) -> bool {
    !self.done.is_empty()
  }

  pub fn can_redo(&self) -> bool {
    !self.undone.is_empty()
  }

  /// Replay the most recent action's inverses. `false` when there is
  /// nothing to undo.
  pub async fn undo(&mut self, replica: &mut Replica) -> Result<bool> {
    let Some(group) = self.done.pop() else {
      return Ok(false);
    };
    for op in group.ops.iter().rev() {
      replica.run(op.inverse.clone()).await?;
    }
    self.undone.push(group);
    Ok(true)
  }

  /// Replay the most recently undone action's forward ops. `false` when
  /// there is nothing to redo.
  pub async fn redo(&mut self, replica: &mut Replica) -> Result<bool> {
    let Some(group) = self.undone.pop() else {
      return Ok(false);
    };
    for op in &group.ops {
      replica.run(op.forward.clone()).await?;
    }
    self.done.push(group);
    Ok(true)
  }
}
