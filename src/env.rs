//! Name-resolution contexts threaded through evaluation.
//!
//! An [`Environment`] is a chain of overlay scopes. Lookup walks from the
//! innermost scope outward, so shadowing is legal; "mutation" always
//! creates a new overlay and never touches an existing scope, which keeps
//! a parent safe to reuse across sibling FROM branches and nested
//! sub-selects. Scopes share structure through `Rc`.

use std::collections::HashMap;
use std::rc::Rc;

use crate::value::ExprValue;

#[derive(Debug, Clone)]
pub struct Environment {
    scope: Rc<Scope>,
}

#[derive(Debug)]
struct Scope {
    bindings: HashMap<String, ExprValue>,
    parent: Option<Environment>,
}

impl Environment {
    /// An environment with no bindings at all.
    pub fn empty() -> Self {
        Environment::new(HashMap::new())
    }

    /// A root environment over the given bindings.
    pub fn new(bindings: HashMap<String, ExprValue>) -> Self {
        Environment {
            scope: Rc::new(Scope {
                bindings,
                parent: None,
            }),
        }
    }

    /// A child environment that shadows this one without mutating it.
    pub fn nest(&self, bindings: HashMap<String, ExprValue>) -> Environment {
        Environment {
            scope: Rc::new(Scope {
                bindings,
                parent: Some(self.clone()),
            }),
        }
    }

    /// A child environment binding one name.
    pub fn nest_one(&self, name: String, value: ExprValue) -> Environment {
        let mut bindings = HashMap::new();
        bindings.insert(name, value);
        self.nest(bindings)
    }

    /// The scoped-binding view over a value: a child environment exposing
    /// a struct's fields as names. Non-struct values contribute no names
    /// (but the overlay still exists, keeping scope depth uniform).
    pub fn bind_value(&self, value: &ExprValue) -> Environment {
        let bindings = match value {
            ExprValue::Struct(fields) => fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            _ => HashMap::new(),
        };
        self.nest(bindings)
    }

    /// Walks from the innermost scope outward.
    pub fn lookup(&self, name: &str) -> Option<&ExprValue> {
        let mut scope: &Scope = &self.scope;
        loop {
            if let Some(value) = scope.bindings.get(name) {
                return Some(value);
            }
            match &scope.parent {
                Some(parent) => scope = &parent.scope,
                None => return None,
            }
        }
    }
}
