//! Scope frames: the grammar scope and the output attachment it owns, kept
//! together on one stack.
//!
//! The rule stack of the parser is the list of frame rules, root first. The
//! output attachment path is the concatenation of the loop slots the frames
//! own. Pushing or popping a frame therefore moves both at once.

use crate::grammar::{RuleNode, SegType, ROOT_CODE};
use crate::output::PathStep;

/// Position of one loop repetition: the sequence attribute on the parent
/// record and the element index within it. Accounts for two path steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSlot {
    pub attribute: String,
    pub index: usize,
}

impl LoopSlot {
    pub fn steps(&self) -> [PathStep; 2] {
        [
            PathStep::Key(self.attribute.clone()),
            PathStep::Index(self.index),
        ]
    }
}

/// One open grammar scope.
#[derive(Debug, Clone)]
pub struct ScopeFrame<'g> {
    /// Label used in scope paths (`ST`, or `ST:850` for a conditional variant)
    pub label: String,
    /// Rule whose children are legal while this frame is on top
    pub rule: &'g RuleNode,
    /// Loop repetition this frame attaches to, if it is a loop scope
    pub slot: Option<LoopSlot>,
}

impl<'g> ScopeFrame<'g> {
    pub fn new(label: impl Into<String>, rule: &'g RuleNode, slot: Option<LoopSlot>) -> Self {
        Self {
            label: label.into(),
            rule,
            slot,
        }
    }

    pub fn is_loop(&self) -> bool {
        self.rule.segtype == SegType::Loop
    }
}

/// Stack of open scopes. The root frame is always present.
#[derive(Debug, Clone)]
pub struct ScopeStack<'g> {
    frames: Vec<ScopeFrame<'g>>,
}

impl<'g> ScopeStack<'g> {
    pub fn new(root: &'g RuleNode) -> Self {
        Self {
            frames: vec![ScopeFrame::new(ROOT_CODE, root, None)],
        }
    }

    /// Innermost open scope.
    pub fn active(&self) -> &ScopeFrame<'g> {
        // the root frame is never popped
        &self.frames[self.frames.len() - 1]
    }

    /// Frame `n` levels below the top (0 is the active frame).
    pub fn nth_from_top(&self, n: usize) -> Option<&ScopeFrame<'g>> {
        self.frames.len().checked_sub(n + 1).map(|i| &self.frames[i])
    }

    /// Nesting depth; 0 when only the root scope is open.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn push(&mut self, frame: ScopeFrame<'g>) {
        self.frames.push(frame);
    }

    /// Close the innermost scope. Returns `None` at root depth.
    pub fn pop(&mut self) -> Option<ScopeFrame<'g>> {
        if self.frames.len() > 1 {
            self.frames.pop()
        } else {
            None
        }
    }

    /// Labels of the open scopes, root first.
    pub fn rule_path(&self) -> Vec<String> {
        self.frames.iter().map(|f| f.label.clone()).collect()
    }

    /// Path from the tree root to the record currently being populated.
    pub fn attachment_path(&self) -> Vec<PathStep> {
        self.frames
            .iter()
            .filter_map(|f| f.slot.as_ref())
            .flat_map(|slot| slot.steps())
            .collect()
    }

    pub fn attachment_len(&self) -> usize {
        self.frames.iter().filter(|f| f.slot.is_some()).count() * 2
    }
}
