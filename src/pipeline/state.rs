use std::fmt;

/// Generation number of one active session of the frame loop.
///
/// Every `start` after a `stop` moves to a new epoch, so a result computed
/// for an earlier session can never be mistaken for a current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Epoch(u64);

impl Epoch {
    pub fn next(self) -> Self {
        Epoch(self.0 + 1)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether the pipeline may still produce observable effects.
///
/// Only the frame loop writes this. Every checkpoint (scheduled iteration,
/// result delivery) reads it before doing anything visible.
#[derive(Debug, Default)]
pub struct LoopState {
    epoch: Epoch,
    active: bool,
}

impl LoopState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Epoch the next `activate` should use
    pub fn upcoming(&self) -> Epoch {
        self.epoch.next()
    }

    pub fn activate(&mut self, epoch: Epoch) {
        debug_assert!(epoch > self.epoch);
        self.epoch = epoch;
        self.active = true;
    }

    /// Returns false when the state was already inactive.
    pub fn deactivate(&mut self) -> bool {
        std::mem::replace(&mut self.active, false)
    }

    /// True only for work belonging to the current, still active session
    pub fn admits(&self, epoch: Epoch) -> bool {
        self.active && epoch == self.epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_state_admits_nothing() {
        let state = LoopState::new();
        assert!(!state.is_active());
        assert!(!state.admits(state.epoch()));
        assert!(!state.admits(state.upcoming()));
    }

    #[test]
    fn activation_admits_only_its_own_epoch() {
        let mut state = LoopState::new();
        let first = state.upcoming();
        state.activate(first);

        assert!(state.admits(first));
        assert!(!state.admits(first.next()));

        assert!(state.deactivate());
        assert!(!state.admits(first));
        assert!(!state.deactivate());

        let second = state.upcoming();
        state.activate(second);
        assert!(second > first);
        assert!(state.admits(second));
        assert!(!state.admits(first));
    }
}
