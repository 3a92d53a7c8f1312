//! Primitive Op Interface (§4.6): the contract by which host-provided
//! operations are packaged as first-class, introspectable, typed
//! multi-dispatch values.

use std::cell::RefCell;
use std::rc::Rc;

use crate::runtime::Runtime;
use crate::types::TypeRegistry;
use crate::value::{BuiltinData, Value};

/// `>bin`: an empty, arity-`arity` Builtin ready for `binhook`.
pub fn make_empty(name: &str, hint: &str, arity: usize) -> Value {
    Value::Builtin(Rc::new(RefCell::new(BuiltinData {
        name: name.to_string(),
        hint: hint.to_string(),
        arity,
        argck: Vec::new(),
        dispatches: Vec::new(),
    })))
}

/// `binhook`: prepend a new `(dispatch, types...)` row. Symbolic row
/// entries are recalled eagerly against `registry` so a user can name a
/// type rather than spell out its id (§4.6).
pub fn hook(bin: &Value, row_types: &[u32], dispatch: Value) -> Result<(), String> {
    match bin {
        Value::Builtin(rc) => {
            let mut data = rc.borrow_mut();
            if row_types.len() != data.arity {
                return Err(format!(
                    "This builtin wants {} type columns, not {}",
                    data.arity,
                    row_types.len()
                ));
            }
            data.argck.insert(0, row_types.to_vec());
            data.dispatches.insert(0, dispatch);
            Ok(())
        }
        _ => Err("binhook needs a Builtin".to_string()),
    }
}

/// Resolve a dispatch-row type name against the registry, for callers that
/// want to hook a row by type name instead of by id.
pub fn resolve_row(registry: &TypeRegistry, names: &[&str]) -> Result<Vec<u32>, String> {
    names
        .iter()
        .map(|n| {
            if *n == "Any" || n.is_empty() {
                Ok(0)
            } else {
                registry
                    .id_of(n)
                    .ok_or_else(|| format!("No such type: {n}"))
            }
        })
        .collect()
}

/// `bin>`: decompose a Builtin into (name, hint, arity, argck, dispatches).
pub fn decompose(bin: &Value) -> Option<(String, String, usize, Vec<Vec<u32>>, Vec<Value>)> {
    match bin {
        Value::Builtin(rc) => {
            let d = rc.borrow();
            Some((
                d.name.clone(),
                d.hint.clone(),
                d.arity,
                d.argck.clone(),
                d.dispatches.clone(),
            ))
        }
        _ => None,
    }
}

/// `setdispatch`: replace the dispatch table wholesale.
pub fn set_dispatch(bin: &Value, argck: Vec<Vec<u32>>, dispatches: Vec<Value>) -> Result<(), String> {
    match bin {
        Value::Builtin(rc) => {
            if argck.len() != dispatches.len() {
                return Err("argck and dispatches must be the same length".to_string());
            }
            let mut data = rc.borrow_mut();
            data.argck = argck;
            data.dispatches = dispatches;
            Ok(())
        }
        _ => Err("setdispatch needs a Builtin".to_string()),
    }
}

/// Evaluate a Builtin (§4.6): claim the blame pointer, check arity, scan
/// `argck` top-to-bottom for the first row whose non-wildcard entries match
/// the top `arity` operand-stack items' type-ids, and hand off to the
/// paired dispatch.
pub fn dispatch(rt: &mut Runtime, bin: &Value) -> Value {
    rt.set_caller(bin.clone());
    let (arity, argck, dispatches) = match bin {
        Value::Builtin(rc) => {
            let d = rc.borrow();
            (d.arity, d.argck.clone(), d.dispatches.clone())
        }
        _ => return rt.ded("dispatch called on a non-Builtin"),
    };

    let have = rt.stack_len();
    if have < arity {
        return rt.ded(&format!("How about {arity} arguments instead of {have}?"));
    }

    let top_types = rt.stack_top_type_ids(arity);
    for (row, target) in argck.iter().zip(dispatches.iter()) {
        let matches = row
            .iter()
            .zip(top_types.iter())
            .all(|(expected, actual)| *expected == 0 || *expected == *actual);
        if matches {
            return target.clone();
        }
    }
    rt.ded(&format!(
        "There are {} ways to call and you tried #{}",
        argck.len(),
        argck.len() + 1
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;

    fn pusher(label: &'static str) -> Value {
        Value::Internal(Rc::new(move |rt: &mut Runtime| {
            rt.stack_push(Value::Str(Rc::from(label)));
            Value::Context(match &rt.context {
                Value::Context(c) => c.clone(),
                _ => unreachable!(),
            })
        }))
    }

    /// §8 dispatch specificity: a row hooked after another, more specific
    /// than it, wins the scan — `binhook` prepends, so the newest row is
    /// always checked first.
    #[test]
    fn a_later_hooked_specific_row_beats_an_earlier_wildcard_row() {
        let mut rt = Runtime::new();
        let bin = make_empty("pick_a_lane", "( x -- label )", 1);
        hook(&bin, &[0], pusher("wildcard")).unwrap();
        let integer_id = rt.types.id_of("Integer").unwrap();
        hook(&bin, &[integer_id], pusher("integer")).unwrap();

        rt.stack_push(Value::Integer(1));
        dispatch(&mut rt, &bin).eval(&mut rt);
        assert!(matches!(rt.stack.last(), Some(Value::Str(s)) if &**s == "integer"));
    }

    #[test]
    fn the_wildcard_row_still_catches_everything_else() {
        let mut rt = Runtime::new();
        let bin = make_empty("pick_a_lane", "( x -- label )", 1);
        hook(&bin, &[0], pusher("wildcard")).unwrap();
        let integer_id = rt.types.id_of("Integer").unwrap();
        hook(&bin, &[integer_id], pusher("integer")).unwrap();

        rt.stack_push(Value::Str(Rc::from("not an integer")));
        dispatch(&mut rt, &bin).eval(&mut rt);
        assert!(matches!(rt.stack.last(), Some(Value::Str(s)) if &**s == "wildcard"));
    }
}
