use std::collections::{HashSet, VecDeque};

use shared::ObjectId;

/// Which list an object waits in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    /// Selected objects, sampled eagerly with the selection filter
    Selected,
    /// Other scene objects, sampled opportunistically
    Scene,
}

/// Result of [`ObjectQueue::enqueue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// Already fully processed this session
    Processed,
    /// Newly queued; the caller must stage it
    Inserted,
    /// Already queued and moved to the front
    Promoted,
    /// Already queued, left in place
    Unchanged,
}

/// Objects waiting to be sampled, plus the set already done
#[derive(Debug, Default)]
pub struct ObjectQueue {
    selected: VecDeque<ObjectId>,
    scene: VecDeque<ObjectId>,
    processed: HashSet<ObjectId>,
}

impl ObjectQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn list(&self, kind: QueueKind) -> &VecDeque<ObjectId> {
        match kind {
            QueueKind::Selected => &self.selected,
            QueueKind::Scene => &self.scene,
        }
    }

    fn list_mut(&mut self, kind: QueueKind) -> &mut VecDeque<ObjectId> {
        match kind {
            QueueKind::Selected => &mut self.selected,
            QueueKind::Scene => &mut self.scene,
        }
    }

    /// New selected objects go to the front, new scene objects to the back.
    /// A queued object only moves when `prioritize` is set.
    pub fn enqueue(&mut self, id: &str, kind: QueueKind, prioritize: bool) -> Enqueued {
        if self.processed.contains(id) {
            return Enqueued::Processed;
        }
        let list = self.list_mut(kind);
        if let Some(pos) = list.iter().position(|queued| queued == id) {
            if !prioritize || pos == 0 {
                return Enqueued::Unchanged;
            }
            if let Some(queued) = list.remove(pos) {
                list.push_front(queued);
            }
            return Enqueued::Promoted;
        }
        match kind {
            QueueKind::Selected => list.push_front(id.to_string()),
            QueueKind::Scene => list.push_back(id.to_string()),
        }
        Enqueued::Inserted
    }

    pub fn front(&self, kind: QueueKind) -> Option<&ObjectId> {
        self.list(kind).front()
    }

    /// Remove `id` from its list and record it as processed
    pub fn mark_processed(&mut self, id: &str, kind: QueueKind) {
        let list = self.list_mut(kind);
        if let Some(pos) = list.iter().position(|queued| queued == id) {
            list.remove(pos);
        }
        self.processed.insert(id.to_string());
    }

    pub fn is_processed(&self, id: &str) -> bool {
        self.processed.contains(id)
    }

    pub fn processed(&self) -> &HashSet<ObjectId> {
        &self.processed
    }

    pub fn is_empty(&self, kind: QueueKind) -> bool {
        self.list(kind).is_empty()
    }

    pub fn pending(&self, kind: QueueKind) -> usize {
        self.list(kind).len()
    }

    pub fn queued(&self, kind: QueueKind) -> impl Iterator<Item = &ObjectId> {
        self.list(kind).iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(queue: &ObjectQueue, kind: QueueKind) -> Vec<&str> {
        queue.queued(kind).map(String::as_str).collect()
    }

    #[test]
    fn test_insert_positions() {
        let mut q = ObjectQueue::new();
        assert_eq!(q.enqueue("a", QueueKind::Selected, false), Enqueued::Inserted);
        assert_eq!(q.enqueue("b", QueueKind::Selected, false), Enqueued::Inserted);
        assert_eq!(order(&q, QueueKind::Selected), vec!["b", "a"]);

        q.enqueue("x", QueueKind::Scene, true);
        q.enqueue("y", QueueKind::Scene, true);
        assert_eq!(order(&q, QueueKind::Scene), vec!["x", "y"]);
    }

    #[test]
    fn test_promote_only_when_prioritized() {
        let mut q = ObjectQueue::new();
        for id in ["a", "b", "c"] {
            q.enqueue(id, QueueKind::Scene, false);
        }
        assert_eq!(q.enqueue("c", QueueKind::Scene, false), Enqueued::Unchanged);
        assert_eq!(order(&q, QueueKind::Scene), vec!["a", "b", "c"]);
        assert_eq!(q.enqueue("c", QueueKind::Scene, true), Enqueued::Promoted);
        assert_eq!(order(&q, QueueKind::Scene), vec!["c", "a", "b"]);
        assert_eq!(q.enqueue("c", QueueKind::Scene, true), Enqueued::Unchanged);
    }

    #[test]
    fn test_processed_is_final() {
        let mut q = ObjectQueue::new();
        q.enqueue("a", QueueKind::Scene, false);
        q.mark_processed("a", QueueKind::Scene);
        assert!(q.is_empty(QueueKind::Scene));
        assert!(q.is_processed("a"));
        assert_eq!(q.enqueue("a", QueueKind::Scene, true), Enqueued::Processed);
        assert_eq!(q.enqueue("a", QueueKind::Selected, true), Enqueued::Processed);
        assert!(q.front(QueueKind::Selected).is_none());
    }
}
