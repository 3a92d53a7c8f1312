//! Reference primitive library (§4, supplemented from
//! `original_source/internals.py`): a small, illustrative slice of the
//! catalogue named in spec §6, installed under `I*` so the engine can be
//! exercised and tested end to end. Not a claim of completeness — the
//! `Builtin`/dispatch machinery in `builtin.rs` is the complete mechanism;
//! this module just populates a handful of rows in it.

use std::cell::RefCell;
use std::rc::Rc;

use crate::builtin::{decompose, hook, make_empty, set_dispatch};
use crate::consts::INTERNALS_DIR;
use crate::runtime::Runtime;
use crate::value::Value;

fn tid(rt: &Runtime, name: &str) -> u32 {
    rt.types.id_of(name).unwrap_or(0)
}

fn install_one(rt: &mut Runtime, name: &str, hint: &str, arity: usize, rows: &str, proc: Value) {
    let bin = make_empty(name, hint, arity);
    let row_names: Vec<u32> = if rows.is_empty() {
        vec![0; arity]
    } else {
        rows.split(',').map(|n| tid(rt, n.trim())).collect()
    };
    hook(&bin, &row_names, proc).expect("primitive row must type-check against its own arity");
    rt.store(&[INTERNALS_DIR.to_string(), name.to_string()], bin)
        .expect("bootstrap primitive install must succeed");
}

fn internal(f: impl Fn(&mut Runtime) -> Value + 'static) -> Value {
    Value::Internal(Rc::new(f))
}

fn continue_current(rt: &Runtime) -> Value {
    Value::Context(match &rt.context {
        Value::Context(c) => c.clone(),
        _ => unreachable!(),
    })
}

/// Install the reference subset under `I*`, plus a root-level `EXCEPT`
/// handler so an unhandled error unwinds to the caller instead of failing to
/// find `EXCEPT` itself and looping (§4.7).
pub fn install(rt: &mut Runtime) {
    install_default_except_handler(rt);
    install_stack_shuffling(rt);
    install_arithmetic(rt);
    install_comparisons(rt);
    install_store_ops(rt);
    install_flow(rt);
    install_errors(rt);
    install_introspection(rt);
    install_sequences(rt);
    install_builtin_introspection(rt);
    install_type_registry(rt);
}

/// Unwind one context on any unhandled error, leaving `errstate` available
/// for inspection by whatever catches it next. A host wanting richer
/// recovery re-stores `EXCEPT` with its own handler.
fn install_default_except_handler(rt: &mut Runtime) {
    let handler = internal(|rt| rt.ret());
    rt.store(&["EXCEPT".to_string()], handler)
        .expect("bootstrap EXCEPT handler install must succeed");
}

fn install_stack_shuffling(rt: &mut Runtime) {
    install_one(
        rt,
        "drop",
        "( x -- )",
        1,
        "",
        internal(|rt| {
            rt.stack_pop();
            continue_current(rt)
        }),
    );
    install_one(
        rt,
        "dup",
        "( x -- x x )",
        1,
        "",
        internal(|rt| {
            if let Some(top) = rt.stack.last().cloned() {
                rt.stack_push(top);
            }
            continue_current(rt)
        }),
    );
    install_one(
        rt,
        "swap",
        "( a b -- b a )",
        2,
        "",
        internal(|rt| {
            let b = rt.stack_pop().unwrap_or(Value::Integer(0));
            let a = rt.stack_pop().unwrap_or(Value::Integer(0));
            rt.stack_push(b);
            rt.stack_push(a);
            continue_current(rt)
        }),
    );
    install_one(
        rt,
        "rot",
        "( a b c -- b c a )",
        3,
        "",
        internal(|rt| {
            let c = rt.stack_pop().unwrap_or(Value::Integer(0));
            let b = rt.stack_pop().unwrap_or(Value::Integer(0));
            let a = rt.stack_pop().unwrap_or(Value::Integer(0));
            rt.stack_push(b);
            rt.stack_push(c);
            rt.stack_push(a);
            continue_current(rt)
        }),
    );
    install_one(
        rt,
        "pick",
        "( n -- x )",
        1,
        "Integer",
        internal(|rt| {
            let n = rt.stack_pop().and_then(|v| v.as_int()).unwrap_or(0);
            let len = rt.stack_len();
            match (n as usize).checked_add(1).filter(|depth| *depth <= len) {
                Some(depth) => {
                    let item = rt.stack[len - depth].clone();
                    rt.stack_push(item);
                    continue_current(rt)
                }
                None => rt.ded("Nothing that far down the stack"),
            }
        }),
    );
}

fn install_arithmetic(rt: &mut Runtime) {
    install_one(
        rt,
        "+int",
        "( a b -- a+b )",
        2,
        "Integer,Integer",
        internal(|rt| {
            let b = rt.stack_pop().and_then(|v| v.as_int()).unwrap_or(0);
            let a = rt.stack_pop().and_then(|v| v.as_int()).unwrap_or(0);
            rt.stack_push(Value::Integer(a.wrapping_add(b)));
            continue_current(rt)
        }),
    );
    install_one(
        rt,
        "-int",
        "( a b -- a-b )",
        2,
        "Integer,Integer",
        internal(|rt| {
            let b = rt.stack_pop().and_then(|v| v.as_int()).unwrap_or(0);
            let a = rt.stack_pop().and_then(|v| v.as_int()).unwrap_or(0);
            rt.stack_push(Value::Integer(a.wrapping_sub(b)));
            continue_current(rt)
        }),
    );
    install_one(
        rt,
        "*int",
        "( a b -- a*b )",
        2,
        "Integer,Integer",
        internal(|rt| {
            let b = rt.stack_pop().and_then(|v| v.as_int()).unwrap_or(0);
            let a = rt.stack_pop().and_then(|v| v.as_int()).unwrap_or(0);
            rt.stack_push(Value::Integer(a.wrapping_mul(b)));
            continue_current(rt)
        }),
    );
    install_one(
        rt,
        "/int",
        "( a b -- a/b )",
        2,
        "Integer,Integer",
        internal(|rt| {
            let b = rt.stack_pop().and_then(|v| v.as_int()).unwrap_or(0);
            let a = rt.stack_pop().and_then(|v| v.as_int()).unwrap_or(0);
            if b == 0 {
                rt.ded("Division by zero, which is still not allowed")
            } else {
                rt.stack_push(Value::Integer(a / b));
                continue_current(rt)
            }
        }),
    );
    install_one(
        rt,
        "+float",
        "( a b -- a+b )",
        2,
        "Float,Float",
        internal(|rt| {
            let b = pop_float(rt);
            let a = pop_float(rt);
            rt.stack_push(Value::Float(a + b));
            continue_current(rt)
        }),
    );
    install_one(
        rt,
        "-float",
        "( a b -- a-b )",
        2,
        "Float,Float",
        internal(|rt| {
            let b = pop_float(rt);
            let a = pop_float(rt);
            rt.stack_push(Value::Float(a - b));
            continue_current(rt)
        }),
    );
    install_one(
        rt,
        "+str",
        "( a b -- a++b )",
        2,
        "String,String",
        internal(|rt| {
            let b = rt.stack_pop().and_then(|v| v.as_str().map(str::to_string));
            let a = rt.stack_pop().and_then(|v| v.as_str().map(str::to_string));
            let joined = format!("{}{}", a.unwrap_or_default(), b.unwrap_or_default());
            rt.stack_push(Value::Str(Rc::from(joined.as_str())));
            continue_current(rt)
        }),
    );
}

fn pop_float(rt: &mut Runtime) -> f64 {
    match rt.stack_pop() {
        Some(Value::Float(f)) => f,
        Some(Value::Integer(i)) => i as f64,
        _ => 0.0,
    }
}

fn install_comparisons(rt: &mut Runtime) {
    install_one(
        rt,
        "==",
        "( a b -- bool )",
        2,
        "",
        internal(|rt| {
            let b = rt.stack_pop().unwrap_or(Value::Integer(0));
            let a = rt.stack_pop().unwrap_or(Value::Integer(0));
            rt.stack_push(Value::Integer(a.structural_eq(&b) as i64));
            continue_current(rt)
        }),
    );
    install_one(
        rt,
        "<",
        "( a b -- a<b )",
        2,
        "",
        internal(|rt| {
            let b = rt.stack_pop().unwrap_or(Value::Integer(0));
            let a = rt.stack_pop().unwrap_or(Value::Integer(0));
            rt.stack_push(Value::Integer(ordered_less(&a, &b) as i64));
            continue_current(rt)
        }),
    );
    install_one(
        rt,
        ">",
        "( a b -- a>b )",
        2,
        "",
        internal(|rt| {
            let b = rt.stack_pop().unwrap_or(Value::Integer(0));
            let a = rt.stack_pop().unwrap_or(Value::Integer(0));
            rt.stack_push(Value::Integer(ordered_less(&b, &a) as i64));
            continue_current(rt)
        }),
    );
}

/// `a b <` means `a < b` (Open Question b, resolved in `SPEC_FULL.md`).
fn ordered_less(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => x < y,
        (Value::Float(x), Value::Float(y)) => x < y,
        (Value::Str(x), Value::Str(y)) => x < y,
        _ => false,
    }
}

fn install_store_ops(rt: &mut Runtime) {
    install_one(
        rt,
        "rcl",
        "( Symbol -- value )",
        1,
        "Symbol",
        internal(|rt| {
            let path = match rt.stack_pop() {
                Some(Value::Symbol(p)) => p,
                _ => return rt.ded("rcl needs a Symbol"),
            };
            match rt.recall(&path) {
                Some(v) => {
                    rt.stack_push(v);
                    continue_current(rt)
                }
                None => {
                    let name = crate::value::symbol_to_string(&path);
                    rt.ded(&format!("We seek {name} but we cannot always find {name}"))
                }
            }
        }),
    );
    install_one(
        rt,
        "sto",
        "( value Symbol -- )",
        2,
        ",Symbol",
        internal(|rt| {
            let path = match rt.stack_pop() {
                Some(Value::Symbol(p)) => p,
                _ => return rt.ded("sto needs a Symbol on top"),
            };
            let value = rt.stack_pop().unwrap_or(Value::Integer(0));
            match rt.store(&path, value) {
                Ok(()) => continue_current(rt),
                Err(e) => rt.ded(&e),
            }
        }),
    );
    install_one(
        rt,
        "rm",
        "( Symbol -- )",
        1,
        "Symbol",
        internal(|rt| {
            let path = match rt.stack_pop() {
                Some(Value::Symbol(p)) => p,
                _ => return rt.ded("rm needs a Symbol"),
            };
            match rt.erase(&path) {
                Ok(()) => continue_current(rt),
                Err(e) => rt.ded(&e),
            }
        }),
    );
    install_one(
        rt,
        "exists",
        "( Symbol -- bool )",
        1,
        "Symbol",
        internal(|rt| {
            let path = match rt.stack_pop() {
                Some(Value::Symbol(p)) => p,
                _ => return rt.ded("exists needs a Symbol"),
            };
            let found = rt.recall(&path).is_some();
            rt.stack_push(Value::Integer(found as i64));
            continue_current(rt)
        }),
    );
}

fn install_flow(rt: &mut Runtime) {
    install_one(
        rt,
        "eval",
        "( obj -- ... )",
        1,
        "",
        internal(|rt| rt.stack_pop().unwrap_or_else(|| continue_current(rt))),
    );
    install_one(
        rt,
        "ift",
        "( cond obj -- ... )",
        2,
        "",
        internal(|rt| {
            let obj = rt.stack_pop().unwrap_or(Value::Integer(0));
            let cond = rt.stack_pop().and_then(|v| v.as_int()).unwrap_or(0);
            if cond != 0 {
                obj
            } else {
                continue_current(rt)
            }
        }),
    );
    install_one(
        rt,
        "ifte",
        "( cond then else -- ... )",
        3,
        "",
        internal(|rt| {
            let else_branch = rt.stack_pop().unwrap_or(Value::Integer(0));
            let then_branch = rt.stack_pop().unwrap_or(Value::Integer(0));
            let cond = rt.stack_pop().and_then(|v| v.as_int()).unwrap_or(0);
            if cond != 0 {
                then_branch
            } else {
                else_branch
            }
        }),
    );
}

fn install_errors(rt: &mut Runtime) {
    install_one(
        rt,
        "errstate",
        "( -- Caller Reason Interrupt )",
        0,
        "",
        internal(|rt| {
            let (caller, reason, interrupt) = rt.errstate();
            rt.stack_push(caller);
            rt.stack_push(Value::Str(Rc::from(reason.as_str())));
            rt.stack_push(Value::Integer(interrupt as i64));
            continue_current(rt)
        }),
    );
}

fn install_introspection(rt: &mut Runtime) {
    install_one(
        rt,
        "type",
        "( obj -- name )",
        1,
        "",
        internal(|rt| {
            let obj = rt.stack_pop().unwrap_or(Value::Integer(0));
            rt.stack_push(Value::Str(Rc::from(obj.type_name())));
            continue_current(rt)
        }),
    );
}

fn install_sequences(rt: &mut Runtime) {
    install_one(
        rt,
        "get",
        "( list n -- x )",
        2,
        "List,Integer",
        internal(|rt| {
            let n = rt.stack_pop().and_then(|v| v.as_int()).unwrap_or(0);
            match rt.stack_pop() {
                Some(Value::List(items)) => match items.borrow().get(n as usize).cloned() {
                    Some(v) => {
                        rt.stack_push(v);
                        continue_current(rt)
                    }
                    None => rt.ded("Nothing at that index"),
                },
                _ => rt.ded("get needs a List"),
            }
        }),
    );
}

/// `>bin`/`binhook`/`bin>`/`setdispatch` from user code (§4.6): the
/// `Builtin` construction and introspection mechanism in `builtin.rs`,
/// exposed the same way the arithmetic/store words above expose their
/// underlying Rust functions.
fn install_builtin_introspection(rt: &mut Runtime) {
    install_one(
        rt,
        ">bin",
        "( name hint arity -- Builtin )",
        3,
        "String,String,Integer",
        internal(|rt| {
            let arity = rt.stack_pop().and_then(|v| v.as_int()).unwrap_or(0).max(0) as usize;
            let hint = rt
                .stack_pop()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            let name = rt
                .stack_pop()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            rt.stack_push(make_empty(&name, &hint, arity));
            continue_current(rt)
        }),
    );
    install_one(
        rt,
        "binhook",
        "( Builtin dispatch rowtypes -- )",
        3,
        "Builtin,,List",
        internal(|rt| {
            let rows = match rt.stack_pop() {
                Some(Value::List(items)) => items.borrow().clone(),
                _ => return rt.ded("binhook needs a List of type names on top"),
            };
            let dispatch_val = rt.stack_pop().unwrap_or(Value::Integer(0));
            let bin = rt.stack_pop().unwrap_or(Value::Integer(0));
            let mut ids = Vec::with_capacity(rows.len());
            for row in &rows {
                let name = match row {
                    Value::Symbol(p) if p.len() == 1 => p[0].clone(),
                    Value::Str(s) => s.to_string(),
                    _ => return rt.ded("binhook row types must be Symbol or String names"),
                };
                let id = if name == "Any" || name.is_empty() {
                    0
                } else {
                    match rt.types.id_of(&name) {
                        Some(id) => id,
                        None => return rt.ded(&format!("No such type: {name}")),
                    }
                };
                ids.push(id);
            }
            match hook(&bin, &ids, dispatch_val) {
                Ok(()) => continue_current(rt),
                Err(e) => rt.ded(&e),
            }
        }),
    );
    install_one(
        rt,
        "bin>",
        "( Builtin -- name hint arity argck dispatches )",
        1,
        "Builtin",
        internal(|rt| {
            let bin = rt.stack_pop().unwrap_or(Value::Integer(0));
            match decompose(&bin) {
                Some((name, hint, arity, argck, dispatches)) => {
                    rt.stack_push(Value::Str(Rc::from(name.as_str())));
                    rt.stack_push(Value::Str(Rc::from(hint.as_str())));
                    rt.stack_push(Value::Integer(arity as i64));
                    let argck_list: Vec<Value> = argck
                        .into_iter()
                        .map(|row| {
                            Value::List(Rc::new(RefCell::new(
                                row.into_iter().map(|id| Value::Integer(id as i64)).collect(),
                            )))
                        })
                        .collect();
                    rt.stack_push(Value::List(Rc::new(RefCell::new(argck_list))));
                    rt.stack_push(Value::List(Rc::new(RefCell::new(dispatches))));
                    continue_current(rt)
                }
                None => rt.ded("bin> needs a Builtin"),
            }
        }),
    );
    install_one(
        rt,
        "setdispatch",
        "( Builtin argck dispatches -- )",
        3,
        "Builtin,List,List",
        internal(|rt| {
            let dispatches = match rt.stack_pop() {
                Some(Value::List(items)) => items.borrow().clone(),
                _ => return rt.ded("setdispatch needs a List of dispatches on top"),
            };
            let argck_raw = match rt.stack_pop() {
                Some(Value::List(items)) => items.borrow().clone(),
                _ => return rt.ded("setdispatch needs a List of argck rows"),
            };
            let bin = rt.stack_pop().unwrap_or(Value::Integer(0));
            let mut argck = Vec::with_capacity(argck_raw.len());
            for row in &argck_raw {
                match row {
                    Value::List(ids) => argck.push(
                        ids.borrow()
                            .iter()
                            .filter_map(|v| v.as_int())
                            .map(|i| i as u32)
                            .collect(),
                    ),
                    _ => return rt.ded("setdispatch argck rows must be Lists of Integer"),
                }
            }
            match set_dispatch(&bin, argck, dispatches) {
                Ok(()) => continue_current(rt),
                Err(e) => rt.ded(&e),
            }
        }),
    );
}

/// `regtype` (§4.2, §9): register a user type's prototype so a later Tag
/// literal of that name gets its evaluator wired up at parse time, and so
/// it sorts ahead of the base types in parse priority.
fn install_type_registry(rt: &mut Runtime) {
    install_one(
        rt,
        "regtype",
        "( prototype Symbol -- typeid )",
        2,
        ",Symbol",
        internal(|rt| {
            let path = match rt.stack_pop() {
                Some(Value::Symbol(p)) => p,
                _ => return rt.ded("regtype needs a Symbol on top"),
            };
            if path.len() != 1 {
                return rt.ded("regtype needs a single-component type name");
            }
            let prototype = rt.stack_pop().unwrap_or(Value::Integer(0));
            let id = rt.types.register_user(&path[0], prototype);
            rt.stack_push(Value::Integer(id as i64));
            continue_current(rt)
        }),
    );
}
