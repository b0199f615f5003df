use crate::naming::{BucketKey, NameGenerator, ObjectName};

/// Which blob the writer is appending to, carried across flush cycles.
///
/// `previous` is the name the last successful cycle ended on. A cycle that
/// lands on a different name (new path or time bucket) starts over at
/// rotation index 0; one that lands on the same name keeps the index so
/// appends continue in the blob that was last rotated to.
#[derive(Debug, Clone, Default)]
pub struct WriterCursor {
    current: ObjectName,
    previous: ObjectName,
    rotation_index: u64,
}

impl WriterCursor {
    pub fn current(&self) -> &ObjectName {
        &self.current
    }

    pub fn previous(&self) -> &ObjectName {
        &self.previous
    }

    pub fn rotation_index(&self) -> u64 {
        self.rotation_index
    }

    /// Picks the object name for a new flush cycle.
    pub fn begin_cycle(&mut self, naming: &NameGenerator, key: &BucketKey) {
        let name = naming.generate(key, self.rotation_index);
        if name != self.previous {
            self.rotation_index = 0;
            self.current = naming.generate(key, 0);
        } else {
            self.current = name;
        }
    }

    /// Advances the rotation index. Returns false when the name did not change,
    /// i.e. the object key format cannot express rotation.
    pub fn rotate(&mut self, naming: &NameGenerator, key: &BucketKey) -> bool {
        self.rotation_index += 1;
        let next = naming.generate(key, self.rotation_index);
        if next == self.current {
            return false;
        }
        self.current = next;
        true
    }

    /// Records the name the cycle ended on. Only called after every block landed.
    pub fn finish_cycle(&mut self) {
        self.previous = self.current.clone();
    }
}
