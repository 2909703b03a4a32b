use std::collections::BTreeMap;

use pl_core::PromptValue;

/// Stack of variable frames. Lookup walks innermost to outermost; writes
/// always land in the innermost frame. The root frame holds the simulation
/// state and is never popped.
#[derive(Debug, Clone)]
pub struct Scope {
    frames: Vec<BTreeMap<String, PromptValue>>,
}

impl Scope {
    pub fn new(root: BTreeMap<String, PromptValue>) -> Self {
        Self { frames: vec![root] }
    }

    pub fn push_frame(&mut self) {
        self.frames.push(BTreeMap::new());
    }

    pub fn pop_frame(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    pub fn get(&self, name: &str) -> Option<&PromptValue> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    pub fn set(&mut self, name: impl Into<String>, value: PromptValue) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.into(), value);
        }
    }
}
