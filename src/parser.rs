//! Parser (§4.4): a cursor-based reader that turns program text into
//! `Value`s, one object at a time, trying each literal form in
//! parse-priority order with `Symbol` always the fallback.

use std::cell::RefCell;
use std::rc::Rc;

use crate::runtime::Runtime;
use crate::value::{DirNode, TagData, Value};

struct Cursor {
    chars: Vec<char>,
    pos: usize,
}

impl Cursor {
    fn new(text: &str) -> Self {
        Cursor {
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn line_col(&self) -> (usize, usize) {
        let mut line = 1;
        let mut col = 1;
        for &c in &self.chars[..self.pos.min(self.chars.len())] {
            if c == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        (line, col)
    }

    fn err(&self, msg: &str) -> String {
        let (line, col) = self.line_col();
        format!("{msg} (line {line}, column {col})")
    }
}

/// Parse a single top-level object out of `text`. Boot wraps the whole
/// bootstrap file in `:: … ;`, so for that caller this parses exactly one
/// `Code` value; other callers may use it to read any one literal.
pub fn parse(rt: &mut Runtime, text: &str) -> Result<Value, String> {
    let mut cur = Cursor::new(text);
    cur.skip_ws();
    if cur.peek().is_none() {
        return Err("Nothing to parse".to_string());
    }
    let obj = require(next_object(&mut cur, rt)?, &cur)?;
    Ok(obj)
}

fn is_symbol_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '{' | '}' | '[' | ']' | '(' | ')' | '\'' | '"' | ':' | ';' | '`' | '~')
}

/// Consume a run of `` ` `` / `~` markers (whitespace between them is
/// skipped), returning the resulting `alternate` flag (§4.4): `` ` `` turns
/// it on, `~` turns it back off, and the run's last marker wins.
fn consume_alternate_marker(cur: &mut Cursor) -> bool {
    let mut alternate = false;
    loop {
        match cur.peek() {
            Some(c) if c.is_whitespace() => {
                cur.advance();
            }
            Some('`') => {
                alternate = true;
                cur.advance();
            }
            Some('~') => {
                alternate = false;
                cur.advance();
            }
            _ => break,
        }
    }
    alternate
}

/// An object position that can legitimately come back empty (a dropped
/// alternate-mode Comment, §4.4) has to be unwrapped before it can be used
/// as a value in its own right — a Quote's inner object, a Tag's object, or
/// the lone object a top-level `parse` call returns.
fn require(obj: Option<Value>, cur: &Cursor) -> Result<Value, String> {
    obj.ok_or_else(|| cur.err("Expected an object here, not a dropped alternate-mode Comment"))
}

/// `None` means "this position produced nothing" — only possible for an
/// alternate-mode Comment, which the parser silently drops (§4.4).
fn next_object(cur: &mut Cursor, rt: &mut Runtime) -> Result<Option<Value>, String> {
    let alternate = consume_alternate_marker(cur);
    let obj = match cur.peek() {
        None => return Err(cur.err("Expected an object but the text ran out")),
        Some('"') => parse_string(cur)?,
        Some('(') => {
            let comment = parse_comment(cur)?;
            if alternate {
                return Ok(None);
            }
            comment
        }
        Some('\'') => {
            cur.advance();
            let inner = require(next_object(cur, rt)?, cur)?;
            Value::Quote(Rc::new(inner))
        }
        Some('{') => parse_list(cur, rt)?,
        Some('[') => parse_directory(cur, rt)?,
        Some(':') if cur.peek_at(1) == Some(':') => parse_code(cur, rt)?,
        Some(':') => parse_tag(cur, rt)?,
        Some('#') => parse_integer(cur)?,
        Some(c) if c.is_ascii_digit() || c == '.' => parse_float(cur)?,
        Some(c) if (c == '-' || c == '+')
            && matches!(cur.peek_at(1), Some(d) if d.is_ascii_digit() || d == '.') =>
        {
            parse_float(cur)?
        }
        Some(_) => {
            let sym = parse_symbol(cur)?;
            if !alternate {
                sym
            } else if let Value::Symbol(path) = &sym {
                recall_at_parse_time(rt, path, cur)?
            } else {
                sym
            }
        }
    };
    Ok(Some(obj))
}

/// Alternate-mode Symbol handling (§4.4): recall it right now, at parse
/// time, and emit whatever was stored there instead of a Symbol to be
/// recalled later at eval time.
fn recall_at_parse_time(rt: &Runtime, path: &[String], cur: &Cursor) -> Result<Value, String> {
    match rt.recall(path) {
        Some(v) => Ok(v),
        None => {
            let name = crate::value::symbol_to_string(path);
            Err(cur.err(&format!(
                "We seek {name} but we cannot always find {name}"
            )))
        }
    }
}

/// `#` optional sign, one-or-more digits (§4.4).
fn parse_integer(cur: &mut Cursor) -> Result<Value, String> {
    cur.advance();
    let start = cur.pos;
    if matches!(cur.peek(), Some('+') | Some('-')) {
        cur.advance();
    }
    let digits_start = cur.pos;
    while matches!(cur.peek(), Some(c) if c.is_ascii_digit()) {
        cur.advance();
    }
    if cur.pos == digits_start {
        return Err(cur.err("An Integer needs at least one digit after '#'"));
    }
    let text: String = cur.chars[start..cur.pos].iter().collect();
    text.parse::<i64>()
        .map(Value::Integer)
        .map_err(|_| cur.err(&format!("{text} is not a valid Integer")))
}

/// No prefix: optional sign, then digits, or `.` digits, or digits `.`
/// optional-digits, then an optional signed `e` exponent (§4.4).
fn parse_float(cur: &mut Cursor) -> Result<Value, String> {
    let start = cur.pos;
    if matches!(cur.peek(), Some('+') | Some('-')) {
        cur.advance();
    }
    let mut saw_digit = false;
    while matches!(cur.peek(), Some(c) if c.is_ascii_digit()) {
        cur.advance();
        saw_digit = true;
    }
    if cur.peek() == Some('.') {
        cur.advance();
        while matches!(cur.peek(), Some(c) if c.is_ascii_digit()) {
            cur.advance();
            saw_digit = true;
        }
    }
    if !saw_digit {
        return Err(cur.err("A Float needs at least one digit"));
    }
    if matches!(cur.peek(), Some('e') | Some('E')) {
        let mark = cur.pos;
        cur.advance();
        if matches!(cur.peek(), Some('+') | Some('-')) {
            cur.advance();
        }
        let exp_start = cur.pos;
        while matches!(cur.peek(), Some(c) if c.is_ascii_digit()) {
            cur.advance();
        }
        if cur.pos == exp_start {
            cur.pos = mark;
        }
    }
    let text: String = cur.chars[start..cur.pos].iter().collect();
    text.parse::<f64>()
        .map(Value::Float)
        .map_err(|_| cur.err(&format!("{text} is not a valid Float")))
}

fn parse_string(cur: &mut Cursor) -> Result<Value, String> {
    cur.advance();
    let mut out = String::new();
    loop {
        match cur.advance() {
            None => return Err(cur.err("Unterminated String")),
            Some('"') => break,
            Some('\\') => match cur.advance() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(c) => out.push(c),
                None => return Err(cur.err("Unterminated String")),
            },
            Some(c) => out.push(c),
        }
    }
    Ok(Value::Str(Rc::from(out.as_str())))
}

fn parse_comment(cur: &mut Cursor) -> Result<Value, String> {
    cur.advance();
    let mut depth = 1u32;
    let mut out = String::new();
    loop {
        match cur.advance() {
            None => return Err(cur.err("Unterminated Comment")),
            Some('(') => {
                depth += 1;
                out.push('(');
            }
            Some(')') => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
                out.push(')');
            }
            Some(c) => out.push(c),
        }
    }
    Ok(Value::Comment(Rc::from(out.as_str())))
}

fn parse_symbol(cur: &mut Cursor) -> Result<Value, String> {
    let start = cur.pos;
    while matches!(cur.peek(), Some(c) if is_symbol_char(c)) {
        cur.advance();
    }
    if cur.pos == start {
        return Err(cur.err(&format!(
            "Unexpected character: {:?}",
            cur.peek().unwrap_or(' ')
        )));
    }
    let text: String = cur.chars[start..cur.pos].iter().collect();
    let parts: Vec<String> = text.split('.').map(|s| s.to_string()).collect();
    validate_name(cur, &parts)?;
    Ok(Value::Symbol(Rc::new(parts)))
}

fn validate_name(cur: &Cursor, parts: &[String]) -> Result<(), String> {
    if parts.iter().any(|p| p.is_empty()) {
        return Err(cur.err("A name component cannot be empty"));
    }
    Ok(())
}

fn parse_tag(cur: &mut Cursor, rt: &mut Runtime) -> Result<Value, String> {
    cur.advance();
    let start = cur.pos;
    while matches!(cur.peek(), Some(c) if c != ':') {
        cur.advance();
    }
    let name: String = cur.chars[start..cur.pos].iter().collect();
    if name.is_empty() {
        return Err(cur.err("A Tag needs a non-empty name"));
    }
    if cur.advance() != Some(':') {
        return Err(cur.err("Expected ':' after a Tag name"));
    }
    let obj = require(next_object(cur, rt)?, cur)?;
    let evaluator = realize_user_type(rt, &name);
    Ok(Value::Tag(Rc::new(RefCell::new(TagData {
        name,
        obj,
        evaluator,
    }))))
}

/// If `name` was `regtype`'d as a user type, a freshly parsed Tag of that
/// name gets its evaluator wired up from the registered prototype (§9):
/// a prototype that is itself a Tag contributes its evaluator, anything
/// else becomes the evaluator directly.
fn realize_user_type(rt: &Runtime, name: &str) -> Option<Value> {
    if !rt.types.parse_order().iter().any(|n| n == name) {
        return None;
    }
    match rt.types.user_prototypes.get(name)? {
        Value::Tag(t) => t.borrow().evaluator.clone(),
        other => Some(other.clone()),
    }
}

/// `:: … ;` (§3): a sequence of objects, terminated by a standalone `;`, with
/// the Return sentinel always appended (invariant 1).
fn parse_code(cur: &mut Cursor, rt: &mut Runtime) -> Result<Value, String> {
    cur.advance();
    cur.advance();
    let mut items = Vec::new();
    loop {
        cur.skip_ws();
        match cur.peek() {
            None => return Err(cur.err("Unterminated Code: expected ';'")),
            Some(';') => {
                cur.advance();
                break;
            }
            _ => {
                if let Some(obj) = next_object(cur, rt)? {
                    items.push(obj);
                }
            }
        }
    }
    items.push(rt.return_sentinel.clone());
    Ok(Value::Code(Rc::new(RefCell::new(items))))
}

fn parse_list(cur: &mut Cursor, rt: &mut Runtime) -> Result<Value, String> {
    cur.advance();
    let mut items = Vec::new();
    loop {
        cur.skip_ws();
        match cur.peek() {
            None => return Err(cur.err("Unterminated List: expected '}'")),
            Some('}') => {
                cur.advance();
                break;
            }
            _ => {
                if let Some(obj) = next_object(cur, rt)? {
                    items.push(obj);
                }
            }
        }
    }
    Ok(Value::List(Rc::new(RefCell::new(items))))
}

/// `[ :a:1 :b:2 ]`: a literal directory built from Tag entries, chained
/// onto the process-wide `lastobj` sentinel.
fn parse_directory(cur: &mut Cursor, rt: &mut Runtime) -> Result<Value, String> {
    cur.advance();
    let mut tags = Vec::new();
    loop {
        cur.skip_ws();
        match cur.peek() {
            None => return Err(cur.err("Unterminated Directory: expected ']'")),
            Some(']') => {
                cur.advance();
                break;
            }
            Some(':') if cur.peek_at(1) != Some(':') => tags.push(parse_tag(cur, rt)?),
            _ => return Err(cur.err("A Directory literal may only contain Tags")),
        }
    }
    let mut next = rt.lastobj.clone();
    for tag in tags.into_iter().rev() {
        next = Value::Directory(Rc::new(RefCell::new(DirNode { tag, next })));
    }
    Ok(rt.firstdir(next))
}
