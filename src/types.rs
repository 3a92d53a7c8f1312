//! Type Registry (§4.2): name <-> small-integer type-id catalogue, the
//! parse-priority ordering, and the user-prototype table.

use std::collections::HashMap;

use crate::value::Value;

/// The base variants, in the order the runtime registers them. Registration
/// order fixes the type-id (ascending from 1; 0 is reserved for "Any").
/// Parse priority is the *reverse* of this list (later registrations parse
/// first), matching spec §4.2 — new types outrank old ones, and unquoted
/// Symbol parsing (registered here, near the front, so it ends up last in
/// parse order) is always the fallback.
pub const BASE_TYPES: &[&str] = &[
    "Context",
    "Internal",
    "Symbol",
    "Float",
    "String",
    "Comment",
    "Builtin",
    "Directory",
    "Tag",
    "List",
    "Code",
    "Integer",
    "Handle",
    "Quote",
];

pub struct TypeRegistry {
    name_to_id: HashMap<String, u32>,
    id_to_name: Vec<String>,
    /// Names in parse-priority order: user types (most recently registered
    /// first), then the base types in reverse-registration order.
    parse_order: Vec<String>,
    /// Prototypes for user-registered types, keyed by type name.
    pub user_prototypes: HashMap<String, Value>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        let mut reg = TypeRegistry {
            name_to_id: HashMap::new(),
            id_to_name: vec!["Any".to_string()],
            parse_order: Vec::new(),
            user_prototypes: HashMap::new(),
        };
        reg.name_to_id.insert("Any".to_string(), 0);
        for name in BASE_TYPES {
            reg.register_base(name);
        }
        reg
    }

    fn register_base(&mut self, name: &str) {
        let id = self.id_to_name.len() as u32;
        self.name_to_id.insert(name.to_string(), id);
        self.id_to_name.push(name.to_string());
        // New registrations parse first.
        self.parse_order.insert(0, name.to_string());
    }

    /// Register a new USER type (`regtype`): stores a prototype that clones
    /// per instantiation. User types always parse before any base type.
    pub fn register_user(&mut self, name: &str, prototype: Value) -> u32 {
        let id = self.id_to_name.len() as u32;
        self.name_to_id.insert(name.to_string(), id);
        self.id_to_name.push(name.to_string());
        self.parse_order.insert(0, name.to_string());
        self.user_prototypes.insert(name.to_string(), prototype);
        id
    }

    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.name_to_id.get(name).copied()
    }

    pub fn name_of(&self, id: u32) -> Option<&str> {
        self.id_to_name.get(id as usize).map(|s| s.as_str())
    }

    pub fn parse_order(&self) -> &[String] {
        &self.parse_order
    }

    pub fn id_to_name(&self) -> &[String] {
        &self.id_to_name
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_is_zero_and_reserved() {
        let reg = TypeRegistry::new();
        assert_eq!(reg.id_of("Any"), Some(0));
        assert_eq!(reg.name_of(0), Some("Any"));
    }

    #[test]
    fn ids_are_dense_and_stable_after_registration() {
        let reg = TypeRegistry::new();
        let mut seen: Vec<u32> = BASE_TYPES.iter().map(|n| reg.id_of(n).unwrap()).collect();
        seen.sort_unstable();
        let expected: Vec<u32> = (1..=BASE_TYPES.len() as u32).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn parse_order_reverses_base_registration_and_user_types_go_first() {
        let mut reg = TypeRegistry::new();
        let reversed: Vec<String> = BASE_TYPES.iter().rev().map(|s| s.to_string()).collect();
        assert_eq!(reg.parse_order(), reversed.as_slice());

        reg.register_user("Complex", Value::Integer(0));
        assert_eq!(reg.parse_order()[0], "Complex");
    }
}
