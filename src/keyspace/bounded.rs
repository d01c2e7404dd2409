use rand::RngCore;

use super::KeyCursor;
use super::KeyEntry;
use crate::pattern::CompiledPattern;

/// Enumerates leaf keys across several patterns until a total is reached.
///
/// Patterns are drained one after another; when every pattern is exhausted
/// before `total` keys were emitted, another pass starts from the first
/// pattern. A `total` of 0 means exactly one pass.
pub struct BoundedKeys<'a, R> {
    patterns: &'a [CompiledPattern],
    total: usize,
    emitted: usize,
    emitted_in_pass: usize,
    index: usize,
    cursor: Option<KeyCursor>,
    rng: R,
}

impl<'a, R: RngCore> BoundedKeys<'a, R> {
    pub fn new(
        patterns: &'a [CompiledPattern],
        total: usize,
        rng: R,
    ) -> Self {
        Self {
            patterns,
            total,
            emitted: 0,
            emitted_in_pass: 0,
            index: 0,
            cursor: (!patterns.is_empty()).then(|| KeyCursor::new("", 0, None)),
            rng,
        }
    }

    pub fn emitted(&self) -> usize {
        self.emitted
    }
}

impl<R: RngCore> Iterator for BoundedKeys<'_, R> {
    type Item = KeyEntry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.total > 0 && self.emitted >= self.total {
            return None;
        }

        loop {
            let cursor = self.cursor.as_mut()?;
            if let Some(entry) = cursor.advance(self.patterns[self.index].rules(), &mut self.rng) {
                self.emitted += 1;
                self.emitted_in_pass += 1;
                return Some(entry);
            }

            self.index += 1;
            if self.index >= self.patterns.len() {
                // A pass that emitted nothing would loop forever
                if self.total == 0 || self.emitted_in_pass == 0 {
                    self.cursor = None;
                    return None;
                }
                self.index = 0;
                self.emitted_in_pass = 0;
            }
            self.cursor = Some(KeyCursor::new("", 0, None));
        }
    }
}
