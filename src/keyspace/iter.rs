use rand::RngCore;

use crate::pattern::CompiledPattern;
use crate::pattern::PatternRule;

/// One emitted key.
///
/// `value` is `None` when the key is a prefix emitted because generation
/// stopped above the leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEntry {
    pub level: usize,
    pub key: String,
    pub value: Option<String>,
}

#[derive(Debug)]
struct Frame {
    level: usize,
    next: usize,
    prefix: String,
}

/// Depth-first traversal state over one pattern, independent of the random
/// source so several cursors can share one.
#[derive(Debug)]
pub(crate) struct KeyCursor {
    stop_level: Option<usize>,
    stack: Vec<Frame>,
}

impl KeyCursor {
    pub(crate) fn new(
        prefix: &str,
        start_level: usize,
        stop_level: Option<usize>,
    ) -> Self {
        Self {
            stop_level,
            stack: vec![Frame {
                level: start_level,
                next: 0,
                prefix: prefix.to_string(),
            }],
        }
    }

    pub(crate) fn advance(
        &mut self,
        rules: &[PatternRule],
        rng: &mut dyn RngCore,
    ) -> Option<KeyEntry> {
        loop {
            let frame = self.stack.last_mut()?;
            let Some(rule) = rules.get(frame.level) else {
                self.stack.pop();
                continue;
            };
            if frame.next >= rule.count {
                self.stack.pop();
                continue;
            }

            let index = frame.next;
            frame.next += 1;
            let level = frame.level;
            let key = format!("{}/{}", frame.prefix, rule.instance(index, rng));

            if self.stop_level == Some(level) {
                return Some(KeyEntry { level, key, value: None });
            }
            if rule.is_leaf() {
                let value = rule.generate_value(rng);
                return Some(KeyEntry {
                    level,
                    key,
                    value: Some(value),
                });
            }

            self.stack.push(Frame {
                level: level + 1,
                next: 0,
                prefix: key,
            });
        }
    }
}

/// Lazily enumerates the keys of one pattern in declaration order.
///
/// # Example
/// ```ignore
/// // Rebuild the subtree below a prefix at level 1
/// let keys = KeyIter::new(&pattern, &mut rng).starting_at("/us-south/c1", 2);
/// for entry in keys { /* put entry.key = entry.value */ }
/// ```
pub struct KeyIter<'a, R> {
    rules: &'a [PatternRule],
    cursor: KeyCursor,
    rng: R,
}

impl<'a, R: RngCore> KeyIter<'a, R> {
    pub fn new(
        pattern: &'a CompiledPattern,
        rng: R,
    ) -> Self {
        Self {
            rules: pattern.rules(),
            cursor: KeyCursor::new("", 0, None),
            rng,
        }
    }

    /// Restarts the traversal below `prefix`, whose children live at `level`
    pub fn starting_at(
        mut self,
        prefix: &str,
        level: usize,
    ) -> Self {
        self.cursor = KeyCursor::new(prefix, level, self.cursor.stop_level);
        self
    }

    /// Emits prefixes at `level` instead of descending to the leaf
    pub fn stop_at(
        mut self,
        level: usize,
    ) -> Self {
        self.cursor.stop_level = Some(level);
        self
    }
}

impl<R: RngCore> Iterator for KeyIter<'_, R> {
    type Item = KeyEntry;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.advance(self.rules, &mut self.rng)
    }
}
