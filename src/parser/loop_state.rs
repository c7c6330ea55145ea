//! `break` / `continue` bookkeeping.
//!
//! Each loop body gets a fresh [`LoopState`]; the previous one is saved and
//! restored when the loop ends. Function, lambda and class bodies are
//! boundaries: they hide the enclosing loop, so `break` inside a nested
//! function is rejected even when the function sits inside a loop.

use crate::sst::LoopFlags;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopState {
    pub contains_break: bool,
    pub contains_continue: bool,
}

impl From<LoopState> for LoopFlags {
    fn from(state: LoopState) -> Self {
        LoopFlags {
            contains_break: state.contains_break,
            contains_continue: state.contains_continue,
        }
    }
}

#[derive(Debug, Default)]
pub struct LoopTracker {
    /// `None` when not directly inside a loop body.
    active: Option<LoopState>,
    saved: Vec<Option<LoopState>>,
}

impl LoopTracker {
    pub fn enter_loop(&mut self) {
        self.saved.push(self.active.take());
        self.active = Some(LoopState::default());
    }

    /// Close the innermost loop body and report what it contained.
    pub fn leave_loop(&mut self) -> LoopFlags {
        let finished = self.active.take().unwrap_or_default();
        self.active = self.saved.pop().flatten();
        finished.into()
    }

    pub fn enter_boundary(&mut self) {
        self.saved.push(self.active.take());
    }

    pub fn leave_boundary(&mut self) {
        self.active = self.saved.pop().flatten();
    }

    pub fn in_loop(&self) -> bool {
        self.active.is_some()
    }

    /// Returns `false` when there is no loop to break out of.
    pub fn mark_break(&mut self) -> bool {
        match self.active.as_mut() {
            Some(state) => {
                state.contains_break = true;
                true
            }
            None => false,
        }
    }

    /// Returns `false` when there is no loop to continue.
    pub fn mark_continue(&mut self) -> bool {
        match self.active.as_mut() {
            Some(state) => {
                state.contains_continue = true;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_break_outside_loop() {
        let mut loops = LoopTracker::default();
        assert!(!loops.mark_break());
        assert!(!loops.mark_continue());
    }

    #[test]
    fn test_nested_loops_restore_outer_state() {
        let mut loops = LoopTracker::default();
        loops.enter_loop();
        loops.enter_loop();
        assert!(loops.mark_continue());
        let inner = loops.leave_loop();
        assert!(inner.contains_continue && !inner.contains_break);
        assert!(loops.mark_break());
        let outer = loops.leave_loop();
        assert!(outer.contains_break && !outer.contains_continue);
        assert!(!loops.in_loop());
    }

    #[test]
    fn test_boundary_hides_enclosing_loop() {
        let mut loops = LoopTracker::default();
        loops.enter_loop();
        loops.enter_boundary();
        assert!(!loops.mark_break());
        loops.leave_boundary();
        assert!(loops.in_loop());
        assert_eq!(loops.leave_loop(), LoopFlags::default());
    }
}
