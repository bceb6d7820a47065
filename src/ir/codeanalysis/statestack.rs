//! The per-scope typing state. Every lexical block of the program being
//! built gets one frame; a variable's current type is its binding in the
//! innermost frame that knows it. Frames of finished blocks are folded
//! back into their parent with the merge rules of the block protocol.

use rustc_hash::FxHashMap;

use super::types::{self, Type};
use crate::ir::variable::Variable;

/// What kind of lexical block a frame belongs to. Only metadata: the typer
/// decides the merge mode per construct, but the kind lets it assert that
/// Begin/End operations are properly bracketed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Root,
    Conditional,
    Loop,
    SwitchCase,
    Function,
    ClassBody,
    ObjectLiteral,
    ClassMethod,
    ClassStatic,
    ClassStaticInitializer,
    Try,
    Catch,
    Finally,
}

/// One level of the state stack. A non-root frame's slots are exactly the
/// variables reassigned while the frame was active, with their latest
/// types. The root frame holds the introduction of every variable.
#[derive(Debug)]
pub struct Frame {
    kind: BlockKind,
    slots: FxHashMap<Variable, Type>,
}

impl Frame {
    fn new(kind: BlockKind) -> Self {
        Self {
            kind,
            slots: FxHashMap::default(),
        }
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    /// The variables this frame reassigned, in a stable order.
    fn reassigned(&self) -> Vec<Variable> {
        let mut vars: Vec<Variable> = self.slots.keys().copied().collect();
        vars.sort_unstable_by_key(|v| v.0);
        vars
    }
}

/// The ordered sequence of frames, innermost last. The root frame always
/// exists and always defines every variable ever introduced.
pub struct StateStack {
    frames: Vec<Frame>,
}

impl StateStack {
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::new(BlockKind::Root)],
        }
    }

    /// Forget everything: all frames except a fresh root, all variables.
    pub fn reset(&mut self) {
        self.frames.clear();
        self.frames.push(Frame::new(BlockKind::Root));
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn top_kind(&self) -> BlockKind {
        self.frames.last().unwrap().kind
    }

    pub fn push(&mut self, kind: BlockKind) {
        debug_assert!(kind != BlockKind::Root, "the root frame is never pushed");
        self.frames.push(Frame::new(kind));
    }

    /// Discard and return the top frame. Popping the root is a bug in the
    /// program builder.
    pub fn pop(&mut self) -> Frame {
        assert!(
            self.frames.len() > 1,
            "block end without a matching block start"
        );
        self.frames.pop().unwrap()
    }

    /// Introduce a variable. Happens exactly once, at the operation that
    /// produces it, and always lands in the root frame so the variable
    /// stays queryable after the defining block closes.
    pub fn define(&mut self, variable: Variable, vtype: Type) {
        let root = &mut self.frames[0];
        debug_assert!(
            !root.slots.contains_key(&variable),
            "{} introduced twice",
            variable.print()
        );
        root.slots.insert(variable, vtype);
    }

    /// Reassign a variable in the innermost frame.
    pub fn set(&mut self, variable: Variable, vtype: Type) {
        self.frames
            .last_mut()
            .unwrap()
            .slots
            .insert(variable, vtype);
    }

    /// Walk the stack top to bottom for the current binding.
    pub fn get(&self, variable: Variable) -> Option<&Type> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.slots.get(&variable))
    }

    /// Fold one finished may-execute frame into the current state: the
    /// block may have been skipped, so every reassignment unions with the
    /// type from before the block.
    pub fn merge_one(&mut self, frame: Frame) {
        self.merge_siblings(vec![frame], false);
    }

    /// Fold the finished frames of sibling branches into the current
    /// state. Every variable reassigned in any sibling ends up as the
    /// union of its final type on each path; a sibling that did not assign
    /// contributes the pre-block type, and when the siblings do not cover
    /// all paths the pre-block type is included unconditionally. Results
    /// are written as reassignments so they keep propagating through the
    /// merges of enclosing blocks.
    pub fn merge_siblings(&mut self, siblings: Vec<Frame>, covers_all_paths: bool) {
        let mut vars: Vec<Variable> = siblings
            .iter()
            .flat_map(|frame| frame.reassigned())
            .collect();
        vars.sort_unstable_by_key(|v| v.0);
        vars.dedup();

        for v in vars {
            let pre = match self.get(v) {
                Some(t) => t.clone(),
                None => {
                    // Can only happen if the builder reassigned a variable
                    // it never introduced; stay permissive.
                    tracing::debug!("merge of never-introduced {}", v.print());
                    types::Unknown
                }
            };

            let mut merged = types::Nothing;
            let mut skipped_in_some_branch = false;
            for frame in &siblings {
                match frame.slots.get(&v) {
                    Some(t) => merged |= t.clone(),
                    None => skipped_in_some_branch = true,
                }
            }
            if skipped_in_some_branch || !covers_all_paths {
                merged |= pre;
            }
            self.set(v, merged);
        }
    }
}

//////////////////////////////////////////////
//////////////// TESTS ///////////////////////
//////////////////////////////////////////////
