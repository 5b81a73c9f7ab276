use super::types::{PendingTurn, Turn};

/// Ordered conversation record.
///
/// Finished turns live in `turns`; the turn being streamed lives apart in
/// `pending` and always renders last.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
    pending: Option<PendingTurn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Open the pending model turn. Returns `None` if one is already open.
    pub fn begin_pending(&mut self) -> Option<&mut PendingTurn> {
        if self.pending.is_some() {
            return None;
        }
        self.pending = Some(PendingTurn::new());
        self.pending.as_mut()
    }

    pub fn pending(&self) -> Option<&PendingTurn> {
        self.pending.as_ref()
    }

    pub fn pending_mut(&mut self) -> Option<&mut PendingTurn> {
        self.pending.as_mut()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Move the pending turn into the finished list.
    pub fn finish_pending(&mut self) -> Option<&Turn> {
        let pending = self.pending.take()?;
        self.turns.push(pending.into_turn());
        self.turns.last()
    }

    /// Everything the host should render, pending turn included.
    pub fn get_all(&self) -> Vec<Turn> {
        let mut all = self.turns.clone();
        if let Some(pending) = &self.pending {
            all.push(pending.snapshot());
        }
        all
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.pending = None;
    }

    pub fn len(&self) -> usize {
        self.turns.len() + usize::from(self.pending.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Role;

    #[test]
    fn test_single_pending_turn() {
        let mut transcript = Transcript::new();
        transcript.add(Turn::user("hi", None));
        assert!(transcript.begin_pending().is_some());
        assert!(transcript.begin_pending().is_none());
        assert_eq!(transcript.len(), 2);
    }

    #[test]
    fn test_pending_renders_last() {
        let mut transcript = Transcript::new();
        transcript.add(Turn::user("hi", None));
        transcript.begin_pending().unwrap().append("hello", &[]);

        let all = transcript.get_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].role(), Role::Model);
        assert_eq!(all[1].text(), "hello");
    }

    #[test]
    fn test_finish_pending() {
        let mut transcript = Transcript::new();
        transcript.begin_pending().unwrap().append("done", &[]);
        let id = transcript.pending().unwrap().id();

        let finished = transcript.finish_pending().unwrap();
        assert_eq!(finished.id(), id);
        assert!(!transcript.has_pending());
        assert_eq!(transcript.len(), 1);
        assert!(transcript.finish_pending().is_none());
    }

    #[test]
    fn test_clear() {
        let mut transcript = Transcript::new();
        transcript.add(Turn::model("welcome"));
        transcript.begin_pending();
        transcript.clear();
        assert!(transcript.is_empty());
        assert!(!transcript.has_pending());
    }
}
