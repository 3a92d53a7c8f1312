//! Value: the closed (but extensible) family of tagged values the VM
//! manipulates (spec §3, §4.1).
//!
//! Every variant that needs to be mutated in place or shared by reference
//! (`Tag`, `List`, `Code`, `Directory`, `Handle`, `Builtin`, `Context`) is
//! wrapped in `Rc<RefCell<_>>`. Immutable variants (`Int`, `Float`, `Str`,
//! `Comment`, `Symbol`, `Quote`) are cheap to clone directly.
//!
//! A tagged-pointer, FFI-safe layout would make sense if these values had
//! to cross an `extern "C"` boundary into generated machine code; this
//! engine has no code-generation backend, so `Rc<RefCell<_>>` is the
//! idiomatic safe substitute for the same shape (shared, mutable,
//! graph-like data). See DESIGN.md for the full rationale.

use std::cell::RefCell;
use std::fmt;
use std::io::{Read, Write};
use std::rc::Rc;

use crate::context::ContextData;

/// A function pointer suitable for `Internal` values: the atomic unit
/// underlying Builtins (§4.6, GLOSSARY).
pub type InternalProc = Rc<dyn Fn(&mut crate::runtime::Runtime) -> Value>;

#[derive(Clone)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Str(Rc<str>),
    Comment(Rc<str>),
    /// Ordered sequence of name components, e.g. `foo.bar` -> `["foo", "bar"]`.
    Symbol(Rc<Vec<String>>),
    Quote(Rc<Value>),
    Tag(Rc<RefCell<TagData>>),
    List(Rc<RefCell<Vec<Value>>>),
    Code(Rc<RefCell<Vec<Value>>>),
    Directory(Rc<RefCell<DirNode>>),
    Handle(Rc<RefCell<HandleData>>),
    Builtin(Rc<RefCell<BuiltinData>>),
    Internal(InternalProc),
    Context(Rc<RefCell<ContextData>>),
}

/// `{ name: single component, obj: value }` — mutable in its `obj` field.
pub struct TagData {
    pub name: String,
    pub obj: Value,
    /// A per-tag evaluator installed by `regtype`, realizing user types
    /// without inheritance (spec §9). `None` means "push self and continue".
    pub evaluator: Option<Value>,
}

/// `{ tag: Tag, next: Directory }`, a singly linked list terminated by the
/// process-wide sentinel `lastobj` (invariant 2).
pub struct DirNode {
    pub tag: Value,
    pub next: Value,
}

/// An opaque IO handle plus its EOF flag (§3, §5).
pub struct HandleData {
    pub file: Option<Box<dyn ReadWrite>>,
    pub eof: bool,
    pub closed: bool,
    pub label: String,
}

/// Trait object bound so `HandleData` can hold either a real file or, in
/// tests, an in-memory buffer.
pub trait ReadWrite: Read + Write {}
impl<T: Read + Write> ReadWrite for T {}

/// `{ name, arity, dispatch_table, hint }` — a user-constructible,
/// introspectable typed multi-dispatch primitive (§4.6).
pub struct BuiltinData {
    pub name: String,
    pub hint: String,
    pub arity: usize,
    /// Each row has `arity` entries; `0` means wildcard ("Any").
    pub argck: Vec<Vec<u32>>,
    /// Parallel to `argck`: the value to hand off to on a match.
    pub dispatches: Vec<Value>,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "Integer",
            Value::Float(_) => "Float",
            Value::Str(_) => "String",
            Value::Comment(_) => "Comment",
            Value::Symbol(_) => "Symbol",
            Value::Quote(_) => "Quote",
            Value::Tag(_) => "Tag",
            Value::List(_) => "List",
            Value::Code(_) => "Code",
            Value::Directory(_) => "Directory",
            Value::Handle(_) => "Handle",
            Value::Builtin(_) => "Builtin",
            Value::Internal(_) => "Internal",
            Value::Context(_) => "Context",
        }
    }

    /// The copy hook (§4.1): identity for immutable variants, a new spine
    /// with shared leaves for List/Code, a bounded recursive copy for
    /// Directory.
    pub fn cp(&self) -> Value {
        match self {
            Value::List(rc) => Value::List(Rc::new(RefCell::new(rc.borrow().clone()))),
            Value::Code(rc) => Value::Code(Rc::new(RefCell::new(rc.borrow().clone()))),
            Value::Directory(rc) => cp_directory(rc, crate::consts::CP_DEPTH),
            Value::Tag(rc) => {
                let data = rc.borrow();
                Value::Tag(Rc::new(RefCell::new(TagData {
                    name: data.name.clone(),
                    obj: data.obj.clone(),
                    evaluator: data.evaluator.clone(),
                })))
            }
            other => other.clone(),
        }
    }

    /// Structural equality (`==`): by value for scalars and composites, by
    /// identity for reference-semantics variants (Directory, Tag, Handle,
    /// Builtin, Internal, Context) — those are exactly what `==ref` also
    /// compares, so the two primitives coincide for them.
    pub fn structural_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Comment(a), Value::Comment(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Quote(a), Value::Quote(b)) => a.structural_eq(b),
            (Value::List(a), Value::List(b)) | (Value::Code(a), Value::Code(b)) => {
                let (av, bv) = (a.borrow(), b.borrow());
                av.len() == bv.len() && av.iter().zip(bv.iter()).all(|(x, y)| x.structural_eq(y))
            }
            (Value::Directory(a), Value::Directory(b)) => Rc::ptr_eq(a, b),
            (Value::Tag(a), Value::Tag(b)) => Rc::ptr_eq(a, b),
            (Value::Handle(a), Value::Handle(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => Rc::ptr_eq(a, b),
            (Value::Internal(a), Value::Internal(b)) => Rc::ptr_eq(a, b),
            (Value::Context(a), Value::Context(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn reference_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Directory(a), Value::Directory(b)) => Rc::ptr_eq(a, b),
            (Value::Tag(a), Value::Tag(b)) => Rc::ptr_eq(a, b),
            (Value::Handle(a), Value::Handle(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => Rc::ptr_eq(a, b),
            (Value::Internal(a), Value::Internal(b)) => Rc::ptr_eq(a, b),
            (Value::Context(a), Value::Context(b)) => Rc::ptr_eq(a, b),
            (Value::List(a), Value::List(b)) | (Value::Code(a), Value::Code(b)) => {
                Rc::ptr_eq(a, b)
            }
            _ => self.structural_eq(other),
        }
    }

    pub fn as_symbol_path(&self) -> Option<&Vec<String>> {
        match self {
            Value::Symbol(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "#{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Comment(s) => write!(f, "({s})"),
            Value::Symbol(p) => write!(f, "{}", symbol_to_string(p)),
            Value::Quote(v) => write!(f, "'{v:?}"),
            Value::Tag(t) => write!(f, ":{}:{:?}", t.borrow().name, t.borrow().obj),
            Value::List(l) => write!(f, "{{ {:?} }}", l.borrow()),
            Value::Code(c) => write!(f, ":: {:?} ;", c.borrow()),
            Value::Directory(_) => write!(f, "<directory>"),
            Value::Handle(_) => write!(f, "<handle>"),
            Value::Builtin(b) => write!(f, "<builtin {}>", b.borrow().name),
            Value::Internal(_) => write!(f, "<internal>"),
            Value::Context(_) => write!(f, "<context>"),
        }
    }
}

fn is_sentinel(rc: &Rc<RefCell<DirNode>>) -> bool {
    matches!(&rc.borrow().next, Value::Directory(n) if Rc::ptr_eq(n, rc))
}

/// Bounded recursive copy of a Directory chain (§4.1, invariant 5/CP_DEPTH).
/// Clones every "real" node's Tag up to (but never including) the shared
/// sentinel; subdirectories nested one level in are recursed into with the
/// depth budget decremented.
fn cp_directory(rc: &Rc<RefCell<DirNode>>, depth: u32) -> Value {
    if depth == 0 {
        return Value::Directory(rc.clone());
    }
    let new_head = Rc::new(RefCell::new(DirNode {
        tag: rc.borrow().tag.cp(),
        next: rc.borrow().next.clone(),
    }));
    let mut rest = new_head.clone();
    let mut current = rc.clone();
    loop {
        let next_of_current = match &current.borrow().next {
            Value::Directory(n) => n.clone(),
            _ => break,
        };
        if is_sentinel(&next_of_current) {
            break;
        }
        current = next_of_current;
        let cloned_tag = current.borrow().tag.cp();
        let new_node = Rc::new(RefCell::new(DirNode {
            tag: cloned_tag,
            next: current.borrow().next.clone(),
        }));
        rest.borrow_mut().next = Value::Directory(new_node.clone());
        rest = new_node;
        let maybe_dir = dir_tag_obj(&rest.borrow().tag);
        if let Value::Directory(sub_rc) = &maybe_dir {
            let copied = cp_directory(sub_rc, depth - 1);
            set_tag_obj(&rest.borrow().tag, copied);
        }
    }
    Value::Directory(new_head)
}

pub fn symbol_to_string(path: &[String]) -> String {
    path.join(".")
}

pub fn dir_tag_name(tag: &Value) -> String {
    match tag {
        Value::Tag(t) => t.borrow().name.clone(),
        _ => String::new(),
    }
}

pub fn dir_tag_obj(tag: &Value) -> Value {
    match tag {
        Value::Tag(t) => t.borrow().obj.clone(),
        other => other.clone(),
    }
}

pub fn set_tag_obj(tag: &Value, value: Value) {
    if let Value::Tag(t) = tag {
        t.borrow_mut().obj = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copying_a_list_gives_it_an_independent_spine() {
        let original = Value::List(Rc::new(RefCell::new(vec![
            Value::Integer(1),
            Value::Integer(2),
        ])));
        let copy = original.cp();
        if let Value::List(rc) = &copy {
            rc.borrow_mut().push(Value::Integer(3));
        }
        match (&original, &copy) {
            (Value::List(o), Value::List(c)) => {
                assert_eq!(o.borrow().len(), 2);
                assert_eq!(c.borrow().len(), 3);
            }
            _ => panic!("expected List values"),
        }
    }

    #[test]
    fn copying_a_tag_gives_it_an_independent_obj_slot() {
        let original = Value::Tag(Rc::new(RefCell::new(TagData {
            name: "x".to_string(),
            obj: Value::Integer(1),
            evaluator: None,
        })));
        let copy = original.cp();
        set_tag_obj(&copy, Value::Integer(99));
        assert!(matches!(dir_tag_obj(&original), Value::Integer(1)));
        assert!(matches!(dir_tag_obj(&copy), Value::Integer(99)));
    }

    #[test]
    fn copying_a_directory_does_not_share_its_nested_tags() {
        let sentinel_tag = Value::Tag(Rc::new(RefCell::new(TagData {
            name: String::new(),
            obj: Value::Comment(Rc::from("LASTOBJ")),
            evaluator: None,
        })));
        let sentinel = Rc::new(RefCell::new(DirNode {
            tag: sentinel_tag,
            next: Value::Integer(0),
        }));
        sentinel.borrow_mut().next = Value::Directory(sentinel.clone());

        let a_tag = Value::Tag(Rc::new(RefCell::new(TagData {
            name: "a".to_string(),
            obj: Value::Integer(1),
            evaluator: None,
        })));
        let a_node = Rc::new(RefCell::new(DirNode {
            tag: a_tag,
            next: Value::Directory(sentinel.clone()),
        }));
        let head_tag = Value::Tag(Rc::new(RefCell::new(TagData {
            name: String::new(),
            obj: Value::Comment(Rc::from("NIL")),
            evaluator: None,
        })));
        let head = Rc::new(RefCell::new(DirNode {
            tag: head_tag,
            next: Value::Directory(a_node),
        }));
        let dir = Value::Directory(head);

        let copy = dir.cp();
        if let Value::Directory(h) = &dir {
            if let Value::Directory(a) = &h.borrow().next {
                set_tag_obj(&a.borrow().tag, Value::Integer(99));
            }
        }
        match &copy {
            Value::Directory(h2) => match &h2.borrow().next {
                Value::Directory(a2) => {
                    assert!(matches!(dir_tag_obj(&a2.borrow().tag), Value::Integer(1)));
                }
                other => panic!("expected a nested Directory, got {other:?}"),
            },
            other => panic!("expected a Directory, got {other:?}"),
        }
    }
}
