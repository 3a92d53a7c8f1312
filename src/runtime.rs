//! Glue / Bootstrap (§4, §6): owns every piece of process-wide state — the
//! operand stack, the current `Context`, the type registry, the sentinels —
//! and the entry points that load and drive a program.

use std::cell::RefCell;
use std::rc::Rc;

use crate::consts::{BASE_DIR, CALL_DEPTH, INTERNALS_DIR, MAX_READ};
use crate::context::ContextData;
use crate::error::BreakFlag;
use crate::types::TypeRegistry;
use crate::value::{DirNode, TagData, Value};

pub struct Runtime {
    pub context: Value,
    pub running: bool,
    pub null_code: Value,
    pub return_sentinel: Value,
    pub reason: String,
    pub interrupt: bool,
    pub caller: Value,
    pub break_flag: BreakFlag,
    pub lastobj: Value,
    pub types: TypeRegistry,
    pub stack: Vec<Value>,
}

impl Runtime {
    pub fn new() -> Self {
        let types = TypeRegistry::new();

        let lastobj_tag = Value::Tag(Rc::new(RefCell::new(TagData {
            name: String::new(),
            obj: Value::Comment(Rc::from("LASTOBJ")),
            evaluator: None,
        })));
        let lastobj_node = Rc::new(RefCell::new(DirNode {
            tag: lastobj_tag,
            next: Value::Integer(0),
        }));
        lastobj_node.borrow_mut().next = Value::Directory(lastobj_node.clone());
        let lastobj = Value::Directory(lastobj_node);

        let return_sentinel = Value::Internal(Rc::new(|rt: &mut Runtime| rt.ret()));
        let null_code = Value::Code(Rc::new(RefCell::new(vec![return_sentinel.clone()])));

        let root_names_tag = Value::Tag(Rc::new(RefCell::new(TagData {
            name: String::new(),
            obj: Value::Comment(Rc::from("NIL")),
            evaluator: None,
        })));
        let root_names = Value::Directory(Rc::new(RefCell::new(DirNode {
            tag: root_names_tag,
            next: lastobj.clone(),
        })));

        let root_ctx = Rc::new(RefCell::new(ContextData {
            code: null_code.clone(),
            ip: 0,
            names: root_names,
            next: Value::Integer(0),
            depth: CALL_DEPTH,
        }));
        root_ctx.borrow_mut().next = Value::Context(root_ctx.clone());

        let mut rt = Runtime {
            context: Value::Context(root_ctx),
            running: true,
            null_code,
            return_sentinel,
            reason: String::new(),
            interrupt: false,
            caller: Value::Str(Rc::from("")),
            break_flag: BreakFlag::new(),
            lastobj,
            types,
            stack: Vec::new(),
        };
        rt.install_dir(&[INTERNALS_DIR.to_string()]);
        rt.install_dir(&[INTERNALS_DIR.to_string(), "Types".to_string()]);
        rt.sync_types_directory();
        crate::prims::install(&mut rt);
        rt
    }

    fn install_dir(&mut self, path: &[String]) {
        let empty = self.firstdir(self.lastobj.clone());
        self.store(path, empty)
            .expect("bootstrap directory install must succeed");
    }

    /// Mirror the type registry into `I*.Types` as name -> id Integers, so
    /// running code can look up a type's id by name (§4.2).
    fn sync_types_directory(&mut self) {
        let names: Vec<String> = self.types.id_to_name().to_vec();
        for (id, name) in names.iter().enumerate() {
            if name == "Any" {
                continue;
            }
            let path = vec![INTERNALS_DIR.to_string(), "Types".to_string(), name.clone()];
            self.store(&path, Value::Integer(id as i64))
                .expect("bootstrap type mirror install must succeed");
        }
    }

    pub fn type_id_of(&self, v: &Value) -> u32 {
        self.types.id_of(v.type_name()).unwrap_or(0)
    }

    pub fn stack_push(&mut self, v: Value) {
        self.stack.push(v);
    }

    pub fn stack_pop(&mut self) -> Option<Value> {
        self.stack.pop()
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// Type ids of the top `n` stack entries, deepest-first (so row index 0
    /// lines up with the first-pushed of the `n` operands, §4.6).
    pub fn stack_top_type_ids(&self, n: usize) -> Vec<u32> {
        let start = self.stack.len().saturating_sub(n);
        self.stack[start..]
            .iter()
            .map(|v| self.type_id_of(v))
            .collect()
    }

    /// Drive the trampoline from the current context until `running` clears.
    /// Check `errstate`/`reason` afterwards to see whether it stopped
    /// normally or on an unhandled error.
    pub fn run(&mut self) {
        let mut step = self.context.clone();
        while self.running {
            step = step.eval(self);
        }
    }

    /// `dsk>`-equivalent (§6): read a file (capped at `MAX_READ` bytes),
    /// wrap it in `:: … ;`, parse it, and evaluate it.
    pub fn boot(&mut self, path: &str) -> Result<(), String> {
        let text = read_capped(path)?;
        self.eval_str(&text)
    }

    /// Parse and run `src` (wrapped in `:: … ;`) against this runtime's
    /// current state, without going through the filesystem. `Runtime::boot`
    /// is the file-backed equivalent.
    pub fn eval_str(&mut self, src: &str) -> Result<(), String> {
        let wrapped = format!(":: {src} ;");
        let code = crate::parser::parse(self, &wrapped)?;
        self.running = true;
        let mut step = self.newcall(code);
        while self.running {
            step = step.eval(self);
        }
        Ok(())
    }

    pub fn base_dir(&self) -> &'static str {
        BASE_DIR
    }

    /// The startup sequence (§6): boot `boot.rpl` out of the base directory.
    pub fn boot_default(&mut self) -> Result<(), String> {
        let path = format!("{}{}", BASE_DIR, "boot.rpl");
        self.boot(&path)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

fn read_capped(path: &str) -> Result<String, String> {
    use std::io::Read;
    let mut file =
        std::fs::File::open(path).map_err(|e| format!("Could not open {path}: {e}"))?;
    let mut buf = vec![0u8; MAX_READ];
    let n = file
        .read(&mut buf)
        .map_err(|e| format!("Could not read {path}: {e}"))?;
    buf.truncate(n);
    String::from_utf8(buf).map_err(|e| format!("{path} is not valid UTF-8: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_runtime_starts_running_with_an_empty_stack() {
        let rt = Runtime::new();
        assert!(rt.running);
        assert_eq!(rt.stack_len(), 0);
    }

    #[test]
    fn internals_directory_exists_after_bootstrap() {
        let rt = Runtime::new();
        assert!(rt.recall(&[INTERNALS_DIR.to_string()]).is_some());
    }

    #[test]
    fn types_directory_mirrors_the_registry() {
        let rt = Runtime::new();
        let id = rt
            .recall(&[
                INTERNALS_DIR.to_string(),
                "Types".to_string(),
                "Integer".to_string(),
            ])
            .unwrap();
        assert!(matches!(id, Value::Integer(_)));
    }
}
