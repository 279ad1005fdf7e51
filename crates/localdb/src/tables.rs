//! Table prefixes inside the engine's flat key space.
//!
//! Every row key is `[table_id][name bytes]`, so each store owns a disjoint
//! slice of the namespace and the same name in two tables never collides.

/// Revisioned local documents
pub const LOCAL_DOCS: u8 = 0x01;

/// Unversioned info records
pub const INFO: u8 = 0x02;

/// Build `[table_id][name]`.
pub fn table_key(table_id: u8, name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + name.len());
    key.push(table_id);
    key.extend_from_slice(name.as_bytes());
    key
}
