use std::collections::HashMap;
use std::ops::Deref;

/// Context captured from the request that asked for the upgrade. It is
/// re-established while the upgrade handler initializes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextSnapshot {
    component: String,
    entries: HashMap<String, String>,
}

impl ContextSnapshot {

    pub fn new(component: impl Into<String>) -> Self {
        ContextSnapshot { component: component.into(), entries: HashMap::new() }
    }

    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn entry(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}


#[derive(Debug, Default)]
pub struct ContextStack {
    frames: Vec<ContextSnapshot>,
}

impl ContextStack {

    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes `snapshot` until the returned scope is dropped. `None` pushes nothing.
    pub fn enter(&mut self, snapshot: Option<ContextSnapshot>) -> ContextScope<'_> {
        let pushed = match snapshot {
            Some(snapshot) => {
                self.frames.push(snapshot);
                true
            },
            None => false,
        };
        ContextScope { stack: self, pushed }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn current(&self) -> Option<&ContextSnapshot> {
        self.frames.last()
    }

    /// Innermost value for `key`.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.frames.iter().rev().find_map(|frame| frame.entry(key))
    }
}


pub struct ContextScope<'a> {
    stack: &'a mut ContextStack,
    pushed: bool,
}

impl Deref for ContextScope<'_> {
    type Target = ContextStack;

    fn deref(&self) -> &Self::Target {
        self.stack
    }
}

impl Drop for ContextScope<'_> {
    fn drop(&mut self) {
        if self.pushed {
            self.stack.frames.pop();
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[test]
    fn scope_pops_on_drop() {
        let mut stack = ContextStack::new();
        {
            let scope = stack.enter(Some(ContextSnapshot::new("app").with_entry("user", "bob")));
            assert_eq!(scope.depth(), 1);
            assert_eq!(scope.lookup("user"), Some("bob"));
            assert_eq!(scope.current().map(|c| c.component()), Some("app"));
        }
        assert_eq!(stack.depth(), 0);

        let scope = stack.enter(None);
        assert_eq!(scope.depth(), 0);
    }

    #[test]
    fn scope_pops_on_panic() {
        let mut stack = ContextStack::new();
        let result = catch_unwind(AssertUnwindSafe(|| {
            let _scope = stack.enter(Some(ContextSnapshot::new("app")));
            panic!("handler failed");
        }));
        assert!(result.is_err());
        assert_eq!(stack.depth(), 0);
    }
}
