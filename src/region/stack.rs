//! LIFO stack of region frames with visibility suppression.

use super::descriptor::{PrivateCopyId, RegionDescriptor, VariableAttributeEntry};
use crate::ast::{DeclId, DirectiveKind, SourceLocation};
use crate::error::{Error, Result};
use std::ops::{Deref, DerefMut};

/// Stack of region descriptors, innermost last
#[derive(Debug, Clone, Default)]
pub struct RegionScopeStack {
    /// Frames, outermost first
    frames: Vec<RegionDescriptor>,
    /// Innermost frames currently hidden by suppression guards
    hidden: usize,
    /// Next private-copy placeholder
    next_private_copy: u32,
}

impl RegionScopeStack {
    /// Creates an empty stack
    pub fn new() -> Self {
        RegionScopeStack::default()
    }

    /// Enters a region
    pub fn push(
        &mut self,
        kind: DirectiveKind,
        name: Option<String>,
        location: SourceLocation,
    ) -> Result<&mut RegionDescriptor> {
        if self.hidden > 0 {
            return Err(Error::StackSuppressed {
                hidden: self.hidden,
            });
        }
        tracing::trace!(%kind, depth = self.frames.len() + 1, "push region");
        self.frames.push(RegionDescriptor::new(kind, name, location));
        let idx = self.frames.len() - 1;
        Ok(&mut self.frames[idx])
    }

    /// Leaves the innermost region
    pub fn pop(&mut self) -> Result<RegionDescriptor> {
        if self.hidden > 0 {
            return Err(Error::StackSuppressed {
                hidden: self.hidden,
            });
        }
        let frame = self.frames.pop().ok_or(Error::EmptyStack)?;
        tracing::trace!(kind = %frame.kind, depth = self.frames.len(), "pop region");
        Ok(frame)
    }

    /// Number of visible frames
    pub fn depth(&self) -> usize {
        self.frames.len().saturating_sub(self.hidden)
    }

    /// Number of frames including hidden ones
    pub fn total_depth(&self) -> usize {
        self.frames.len()
    }

    /// No visible frames
    pub fn is_empty(&self) -> bool {
        self.depth() == 0
    }

    /// Visible frames, outermost first
    pub fn frames(&self) -> &[RegionDescriptor] {
        &self.frames[..self.depth()]
    }

    /// Visible frame by index (0 is outermost)
    pub fn frame(&self, index: usize) -> Option<&RegionDescriptor> {
        self.frames().get(index)
    }

    /// Mutable visible frame by index
    pub fn frame_mut(&mut self, index: usize) -> Option<&mut RegionDescriptor> {
        let depth = self.depth();
        self.frames[..depth].get_mut(index)
    }

    /// Innermost visible frame
    pub fn current(&self) -> Option<&RegionDescriptor> {
        self.frames().last()
    }

    /// Mutable innermost visible frame
    pub fn current_mut(&mut self) -> Option<&mut RegionDescriptor> {
        let depth = self.depth();
        self.frames[..depth].last_mut()
    }

    /// Frame enclosing the innermost visible one
    pub fn parent(&self) -> Option<&RegionDescriptor> {
        let frames = self.frames();
        frames.len().checked_sub(2).map(|i| &frames[i])
    }

    /// Visible frames, innermost first
    pub fn enclosing(&self) -> impl Iterator<Item = &RegionDescriptor> {
        self.frames().iter().rev()
    }

    /// Innermost visible frame matching `pred`, with its index
    pub fn innermost_matching(
        &self,
        pred: impl Fn(&RegionDescriptor) -> bool,
    ) -> Option<(usize, &RegionDescriptor)> {
        self.frames()
            .iter()
            .enumerate()
            .rev()
            .find(|(_, f)| pred(f))
    }

    /// Explicit or synthesized entry for `var` in the innermost visible frame
    pub fn current_entry(&self, var: DeclId) -> Option<&VariableAttributeEntry> {
        self.current().and_then(|f| f.entry(var))
    }

    /// Marks the innermost visible frame as targeted by `cancel`.
    ///
    /// A `section` forwards the mark to its enclosing `sections`.
    pub fn mark_cancel_target(&mut self) {
        let depth = self.depth();
        if depth == 0 {
            return;
        }
        self.frames[depth - 1].flags.cancel_present = true;
        if self.frames[depth - 1].kind == DirectiveKind::Section && depth >= 2 {
            self.frames[depth - 2].flags.cancel_present = true;
        }
    }

    /// New private-copy placeholder
    pub fn allocate_private_copy(&mut self) -> PrivateCopyId {
        let id = PrivateCopyId(self.next_private_copy);
        self.next_private_copy += 1;
        id
    }

    /// Hides the innermost visible frame until the returned view is dropped.
    ///
    /// Queries made through the view behave as if issued from the parent
    /// region. Views nest; each one hides one more frame.
    pub fn suppress_innermost(&mut self) -> ParentView<'_> {
        self.hidden += 1;
        ParentView { stack: self }
    }
}

/// Scoped view of a [`RegionScopeStack`] with one frame hidden
#[derive(Debug)]
pub struct ParentView<'a> {
    stack: &'a mut RegionScopeStack,
}

impl Deref for ParentView<'_> {
    type Target = RegionScopeStack;

    fn deref(&self) -> &RegionScopeStack {
        self.stack
    }
}

impl DerefMut for ParentView<'_> {
    fn deref_mut(&mut self) -> &mut RegionScopeStack {
        self.stack
    }
}

impl Drop for ParentView<'_> {
    fn drop(&mut self) {
        self.stack.hidden -= 1;
    }
}
