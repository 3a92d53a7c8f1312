//! Named Store (§4.3): hierarchical name resolution over a singly linked
//! list of directory entries, with cycle detection.

use std::rc::Rc;

use crate::consts::CP_DEPTH;
use crate::runtime::Runtime;
use crate::value::{dir_tag_name, dir_tag_obj, set_tag_obj, DirNode, TagData, Value};

impl Runtime {
    fn current_names(&self) -> Value {
        match &self.context {
            Value::Context(c) => c.borrow().names.clone(),
            _ => unreachable!(),
        }
    }

    /// Prepare a new first directory entry, wrapping `next` (or `lastobj`
    /// if `next` is the process sentinel chain's end). Only one `lastobj`
    /// is required, but first entries are all unique (§4.3).
    pub fn firstdir(&self, next: Value) -> Value {
        let head_tag = Value::Tag(Rc::new(std::cell::RefCell::new(TagData {
            name: String::new(),
            obj: Value::Comment(Rc::from("NIL")),
            evaluator: None,
        })));
        Value::Directory(Rc::new(std::cell::RefCell::new(DirNode {
            tag: head_tag,
            next,
        })))
    }

    /// `recall(path)` (§4.3): returns the matching tag's object, or `None`.
    pub fn recall(&self, path: &[String]) -> Option<Value> {
        self.recall_from(&self.current_names(), path)
    }

    pub fn recall_from(&self, names_head: &Value, path: &[String]) -> Option<Value> {
        let mut current = names_head.clone();
        for component in path {
            let node = self.find_in_directory(&current, component)?;
            current = dir_tag_obj(&node.borrow().tag);
        }
        Some(current)
    }

    /// `deref(path)` (§4.3): returns the matching Tag itself.
    pub fn deref(&self, path: &[String]) -> Option<Value> {
        let mut current = self.current_names();
        let last = path.len().checked_sub(1)?;
        for (idx, component) in path.iter().enumerate() {
            let node = self.find_in_directory(&current, component)?;
            if idx == last {
                return Some(node.borrow().tag.clone());
            }
            current = dir_tag_obj(&node.borrow().tag);
        }
        None
    }

    /// Walk `dir`'s chain looking for a tag named `name`, stopping at
    /// `lastobj` (invariant 2/3). Returns `None` if `dir` isn't a Directory
    /// or no match is found.
    fn find_in_directory(
        &self,
        dir: &Value,
        name: &str,
    ) -> Option<Rc<std::cell::RefCell<DirNode>>> {
        let mut node = match dir {
            Value::Directory(rc) => rc.clone(),
            _ => return None,
        };
        loop {
            if dir_tag_name(&node.borrow().tag) == name {
                return Some(node);
            }
            if Rc::ptr_eq(&node, &self.lastobj_rc()) {
                return None;
            }
            let next = node.borrow().next.clone();
            node = match next {
                Value::Directory(rc2) => rc2,
                _ => return None,
            };
        }
    }

    fn lastobj_rc(&self) -> Rc<std::cell::RefCell<DirNode>> {
        match &self.lastobj {
            Value::Directory(rc) => rc.clone(),
            _ => unreachable!(),
        }
    }

    /// `store(path, value)` (§4.3): walk to the final component in the
    /// CURRENT context's names, replacing an existing tag or appending a
    /// new one at the end of that directory's chain. Intermediate
    /// components must already exist and be Directories — no implicit
    /// directory creation. After a successful store, checks for a newly
    /// introduced cycle and rolls back if one is found.
    pub fn store(&mut self, path: &[String], value: Value) -> Result<(), String> {
        if path.is_empty() {
            return Err("Nothing to store to".to_string());
        }
        let previous = self.recall(path);
        self.store_raw(path, value.clone())?;
        let cycles = match &value {
            Value::Symbol(p) => self.circular_symbol(p),
            Value::Directory(_) => self.circular_directory(&value),
            _ => false,
        };
        if cycles {
            match previous {
                Some(old) => {
                    self.store_raw(path, old).ok();
                }
                None => {
                    self.erase(path).ok();
                }
            }
            return Err("That would make a circular reference, and those are bad news".to_string());
        }
        Ok(())
    }

    fn store_raw(&mut self, path: &[String], value: Value) -> Result<(), String> {
        let mut current = match self.current_names() {
            Value::Directory(rc) => rc,
            _ => return Err("Current name chain is not a Directory".to_string()),
        };
        let last = path.len() - 1;
        for (idx, component) in path.iter().enumerate() {
            loop {
                if dir_tag_name(&current.borrow().tag) == *component {
                    break;
                }
                let next_is_lastobj = {
                    let nxt = current.borrow().next.clone();
                    match &nxt {
                        Value::Directory(n) => Rc::ptr_eq(n, &self.lastobj_rc()),
                        _ => return Err("Corrupt directory chain".to_string()),
                    }
                };
                if next_is_lastobj {
                    if idx != last {
                        return Err(format!("No such directory to store {component} into"));
                    }
                    let new_tag = Value::Tag(Rc::new(std::cell::RefCell::new(TagData {
                        name: component.clone(),
                        obj: value,
                        evaluator: None,
                    })));
                    let new_node = Rc::new(std::cell::RefCell::new(DirNode {
                        tag: new_tag,
                        next: self.lastobj.clone(),
                    }));
                    current.borrow_mut().next = Value::Directory(new_node);
                    return Ok(());
                }
                let next_rc = {
                    let nxt = current.borrow().next.clone();
                    match nxt {
                        Value::Directory(n) => n,
                        _ => return Err("Corrupt directory chain".to_string()),
                    }
                };
                current = next_rc;
            }
            if idx != last {
                let obj = dir_tag_obj(&current.borrow().tag);
                match obj {
                    Value::Directory(rc2) => current = rc2,
                    _ => return Err(format!("{component} is not a directory")),
                }
            } else {
                set_tag_obj(&current.borrow().tag, value);
                return Ok(());
            }
        }
        Ok(())
    }

    /// `erase(path)`: splice the matching entry out of its directory's
    /// chain. The null-named head is never reachable by name and so is
    /// never erased.
    pub fn erase(&mut self, path: &[String]) -> Result<(), String> {
        if path.is_empty() {
            return Err("Nothing to erase".to_string());
        }
        let mut last_link = match self.current_names() {
            Value::Directory(rc) => rc,
            _ => return Err("Current name chain is not a Directory".to_string()),
        };
        let final_idx = path.len() - 1;
        for (idx, component) in path.iter().enumerate() {
            if Rc::ptr_eq(&last_link, &self.lastobj_rc()) {
                return Err("Directory is empty".to_string());
            }
            loop {
                let next = last_link.borrow().next.clone();
                let next_rc = match &next {
                    Value::Directory(n) => n.clone(),
                    _ => return Err("Corrupt directory chain".to_string()),
                };
                if Rc::ptr_eq(&next_rc, &self.lastobj_rc()) {
                    return Err(format!("No such name: {component}"));
                }
                if dir_tag_name(&next_rc.borrow().tag) == *component {
                    if idx == final_idx {
                        let after = next_rc.borrow().next.clone();
                        last_link.borrow_mut().next = after;
                        return Ok(());
                    }
                    let obj = dir_tag_obj(&next_rc.borrow().tag);
                    last_link = match obj {
                        Value::Directory(rc2) => rc2,
                        _ => return Err(format!("{component} is not a directory")),
                    };
                    break;
                }
                last_link = next_rc;
            }
        }
        Ok(())
    }

    /// Walk the chain of `Symbol -> recall(Symbol.path) -> ...`; true if a
    /// previously seen path is revisited.
    pub fn circular_symbol(&self, start: &[String]) -> bool {
        let mut seen: Vec<Vec<String>> = vec![start.to_vec()];
        let mut path = start.to_vec();
        loop {
            match self.recall(&path) {
                None => return false,
                Some(Value::Symbol(next)) => {
                    let next_path: Vec<String> = (*next).clone();
                    if seen.contains(&next_path) {
                        return true;
                    }
                    seen.push(next_path.clone());
                    path = next_path;
                }
                Some(_) => return false,
            }
        }
    }

    /// DFS (bounded by `CP_DEPTH`) into all Symbols and nested Directories
    /// reachable from `dir`; true if any Symbol circulates.
    pub fn circular_directory(&self, dir: &Value) -> bool {
        self.circular_directory_at(dir, CP_DEPTH)
    }

    fn circular_directory_at(&self, dir: &Value, depth: u32) -> bool {
        if depth == 0 {
            return false;
        }
        let rc = match dir {
            Value::Directory(rc) => rc.clone(),
            _ => return false,
        };
        let mut node = match rc.borrow().next.clone() {
            Value::Directory(n) => n,
            _ => return false,
        };
        loop {
            if Rc::ptr_eq(&node, &self.lastobj_rc()) {
                return false;
            }
            let obj = dir_tag_obj(&node.borrow().tag);
            match &obj {
                Value::Symbol(path) => {
                    if self.circular_symbol(path) {
                        return true;
                    }
                }
                Value::Directory(_) => {
                    if self.circular_directory_at(&obj, depth - 1) {
                        return true;
                    }
                }
                _ => {}
            }
            node = match node.borrow().next.clone() {
                Value::Directory(n) => n,
                _ => return false,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::Runtime;
    use crate::value::Value;

    #[test]
    fn store_then_recall_round_trips() {
        let mut rt = Runtime::new();
        rt.store(&["foo".to_string()], Value::Integer(1)).unwrap();
        let back = rt.recall(&["foo".to_string()]).unwrap();
        assert!(back.structural_eq(&Value::Integer(1)));
    }

    #[test]
    fn erase_then_exists_is_false() {
        let mut rt = Runtime::new();
        rt.store(&["foo".to_string()], Value::Integer(1)).unwrap();
        rt.erase(&["foo".to_string()]).unwrap();
        assert!(rt.recall(&["foo".to_string()]).is_none());
    }

    #[test]
    fn storing_a_self_referential_symbol_is_rejected() {
        let mut rt = Runtime::new();
        rt.store(&["x".to_string()], Value::Integer(0)).unwrap();
        let err = rt.store(
            &["x".to_string()],
            Value::Symbol(std::rc::Rc::new(vec!["x".to_string()])),
        );
        assert!(err.is_err());
        let back = rt.recall(&["x".to_string()]).unwrap();
        assert!(back.structural_eq(&Value::Integer(0)));
    }

    #[test]
    fn storing_to_a_missing_intermediate_directory_fails() {
        let mut rt = Runtime::new();
        let err = rt.store(
            &["nope".to_string(), "inner".to_string()],
            Value::Integer(1),
        );
        assert!(err.is_err());
    }
}
