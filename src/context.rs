//! Call Stack & Eval Loop (§4.5): the trampoline that repeatedly evaluates
//! "the current object" until the `Running` flag clears.
//!
//! Every `Value::eval` call returns the *next* value whose `eval` should be
//! invoked — spec §9's "trampolined dispatch". The common case, "continue
//! the current context", is represented uniformly as `Value::Context(rt.context.clone())`,
//! so the outer loop never needs to special-case anything: it is just
//! `next = next.eval(rt)` until `!rt.running`.

use std::rc::Rc;

use crate::consts::CALL_DEPTH;
use crate::runtime::Runtime;
use crate::value::{symbol_to_string, Value};

/// `{ code: Code, ip: index, names: Directory, next: Context, depth }`
/// (§3). `next is self` marks the root context (invariant 4).
pub struct ContextData {
    pub code: Value,
    pub ip: usize,
    pub names: Value,
    pub next: Value,
    pub depth: i64,
}

impl ContextData {
    fn code_len(&self) -> usize {
        match &self.code {
            Value::Code(rc) => rc.borrow().len(),
            _ => 0,
        }
    }

    fn instruction_at(&self, ip: usize) -> Value {
        match &self.code {
            Value::Code(rc) => rc
                .borrow()
                .get(ip)
                .cloned()
                .expect("Context.ip walked past the end of its Code"),
            _ => panic!("Context.code is not a Code value"),
        }
    }
}

impl Value {
    /// The evaluate hook (§4.1/§4.5): returns the next value to `eval`.
    pub fn eval(&self, rt: &mut Runtime) -> Value {
        match self {
            Value::Context(ctx) => {
                if rt.break_requested() {
                    rt.clear_break();
                    rt.interrupt = true;
                    return rt.ded("Break");
                }
                if ctx.borrow().ip >= ctx.borrow().code_len() {
                    // A Code object missing its Return sentinel would walk
                    // off the end; every parser-produced Code carries one
                    // (invariant 1), so this only fires for hand-built Code
                    // that violates it.
                    return rt.ded("This code has nowhere further to go");
                }
                let ip = ctx.borrow().ip;
                let instr = ctx.borrow().instruction_at(ip);
                ctx.borrow_mut().ip = ip + 1;
                instr
            }
            Value::Integer(_)
            | Value::Float(_)
            | Value::Str(_)
            | Value::List(_)
            | Value::Directory(_)
            | Value::Handle(_) => {
                rt.stack_push(self.clone());
                Value::Context(rt.context.clone())
            }
            Value::Comment(_) => Value::Context(rt.context.clone()),
            Value::Quote(inner) => {
                rt.stack_push((**inner).clone());
                Value::Context(rt.context.clone())
            }
            Value::Symbol(path) => {
                match rt.recall(path) {
                    Some(target) => {
                        if rt.break_requested() {
                            rt.clear_break();
                            rt.interrupt = true;
                            return rt.ded("Break");
                        }
                        target
                    }
                    None => {
                        rt.set_caller_runtime();
                        let name = symbol_to_string(path);
                        rt.ded(&format!(
                            "We seek {name} but we cannot always find {name}"
                        ))
                    }
                }
            }
            Value::Tag(data) => {
                rt.stack_push(self.clone());
                match &data.borrow().evaluator {
                    Some(ev) => ev.clone(),
                    None => Value::Context(rt.context.clone()),
                }
            }
            Value::Code(_) => rt.newcall(self.clone()),
            Value::Builtin(_) => crate::builtin::dispatch(rt, self),
            Value::Internal(proc) => (proc.clone())(rt),
        }
    }
}

impl Runtime {
    /// True when the instruction about to execute in the current context is
    /// the Return sentinel — i.e. we are in tail position.
    fn at_tail_position(&self) -> bool {
        let ctx = match &self.context {
            Value::Context(c) => c,
            _ => return false,
        };
        let c = ctx.borrow();
        if c.ip >= c.code_len() {
            return false;
        }
        let next_instr = c.instruction_at(c.ip);
        self.is_return_sentinel(&next_instr)
    }

    pub fn is_return_sentinel(&self, v: &Value) -> bool {
        match (v, &self.return_sentinel) {
            (Value::Internal(a), Value::Internal(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn context_rc(&self) -> std::rc::Rc<std::cell::RefCell<ContextData>> {
        match &self.context {
            Value::Context(c) => c.clone(),
            _ => unreachable!("Runtime.context is always a Context value"),
        }
    }

    /// `newcall(code)` (§4.5): overwrite the current context in tail
    /// position (tail-call optimisation), else push a new context bounded
    /// by `CALL_DEPTH`.
    pub fn newcall(&mut self, obj: Value) -> Value {
        if self.at_tail_position() {
            let ctx = self.context_rc();
            let mut c = ctx.borrow_mut();
            c.ip = 0;
            c.code = obj;
        } else {
            let (depth, names) = {
                let ctx = self.context_rc();
                let c = ctx.borrow();
                (c.depth, c.names.clone())
            };
            if depth > 0 {
                let new_ctx = ContextData {
                    code: obj,
                    ip: 0,
                    names,
                    next: self.context.clone(),
                    depth: depth - 1,
                };
                self.context = Value::Context(std::rc::Rc::new(std::cell::RefCell::new(new_ctx)));
            } else {
                self.set_caller_runtime();
                return self.ded(&format!(
                    "You asked for {CALL_DEPTH} recursions and not a penny more"
                ));
            }
        }
        Value::Context(self.context_rc())
    }

    /// `newlocall(code, names)` (§4.5): like `newcall`, but installs a fresh
    /// name chain wrapping `names` — used when introducing local variables.
    pub fn newlocall(&mut self, obj: Value, names: Value) -> Value {
        let fresh_names = self.firstdir(names);
        if self.at_tail_position() {
            let ctx = self.context_rc();
            let mut c = ctx.borrow_mut();
            c.ip = 0;
            c.code = obj;
            c.names = fresh_names;
        } else {
            let depth = {
                let ctx = self.context_rc();
                ctx.borrow().depth
            };
            if depth > 0 {
                let new_ctx = ContextData {
                    code: obj,
                    ip: 0,
                    names: fresh_names,
                    next: self.context.clone(),
                    depth: depth - 1,
                };
                self.context = Value::Context(std::rc::Rc::new(std::cell::RefCell::new(new_ctx)));
            } else {
                self.set_caller_runtime();
                return self.ded(&format!(
                    "You asked for {CALL_DEPTH} recursions and not a penny more"
                ));
            }
        }
        Value::Context(self.context_rc())
    }

    /// `ret(rt)` (§4.5): return from the current context.
    pub fn ret(&mut self) -> Value {
        let ctx = self.context_rc();
        let is_root = {
            let c = ctx.borrow();
            match &c.next {
                Value::Context(n) => Rc::ptr_eq(n, &ctx),
                _ => false,
            }
        };
        if is_root {
            let mut c = ctx.borrow_mut();
            c.code = self.null_code.clone();
            c.ip = 0;
            drop(c);
            self.running = false;
        } else {
            let next = ctx.borrow().next.clone();
            self.context = next;
        }
        Value::Context(self.context_rc())
    }

    /// `ded(reason)` (§4.7): force a new context over the null-code with the
    /// same names, atop the current one, then dispatch to `EXCEPT`.
    pub fn ded(&mut self, reason: &str) -> Value {
        self.reason = reason.to_string();
        let (names, depth) = {
            let ctx = self.context_rc();
            let c = ctx.borrow();
            (c.names.clone(), c.depth)
        };
        let new_ctx = ContextData {
            code: self.null_code.clone(),
            ip: 0,
            names,
            next: self.context.clone(),
            depth: depth - 1,
        };
        self.context = Value::Context(Rc::new(std::cell::RefCell::new(new_ctx)));
        if depth - 1 < -1 {
            tracing::error!("panik! Excess recursion while already trying to handle an error");
            self.running = false;
        }
        Value::Symbol(Rc::new(vec![crate::consts::EXCEPT_SYMBOL.to_string()]))
    }
}
