// Suppose we have a set of fragments (indexed by a usize) and each one
// defines a set of signal names.  We want to remember, for every name,
// the first fragment that defined it, and be able to tell whether a
// later definition is a repeat from the same fragment or a collision
// with another one.
use std::collections::HashMap;

/// What happened when a definition was offered to the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Registration {
    /// First time the name was seen.
    Fresh,
    /// Already registered to the same fragment.
    Own,
    /// Already registered to another fragment (the owner).
    Collision(usize),
}

#[derive(Default)]
pub struct NameRegistry {
    pub owner: HashMap<String, usize>, // Fragment index that first defined a name
    pub list: Vec<String>,             // Names in registration order
}

impl NameRegistry {
    pub fn new() -> NameRegistry {
        NameRegistry {
            owner: HashMap::new(),
            list: Vec::new(),
        }
    }
    pub fn register(&mut self, name: &str, fragment: usize) -> Registration {
        match self.owner.get(name) {
            Some(&f) if f == fragment => Registration::Own,
            Some(&f) => Registration::Collision(f),
            None => {
                self.owner.insert(name.to_string(), fragment);
                self.list.push(name.to_string());
                Registration::Fresh
            }
        }
    }
    pub fn owner(&self, name: &str) -> Option<usize> {
        self.owner.get(name).copied()
    }
    pub fn contains(&self, name: &str) -> bool {
        self.owner.contains_key(name)
    }
    pub fn len(&self) -> usize {
        self.list.len()
    }
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}
