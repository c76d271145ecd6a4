//! Closed category/task id -> name mappings for the upstream platform.
//!
//! The upstream article index never exposes category ids; only the detail
//! page's "Kategorie:"/"Aufgabe:" list items do, as names. Both mappings
//! are authoritative and unknown ids resolve to `None`.

/// Category id -> display name.
pub const CATEGORY_MAPPING: &[(i64, &str)] = &[
    (4, "Anleiten"),
    (14, "Berichten"),
    (5, "Erklären"),
    (6, "Fragen"),
    (7, "Informieren"),
    (8, "Überzeugen"),
    (9, "Unterhalten"),
];

/// Task id -> display name.
pub const TASK_MAPPING: &[(i64, &str)] = &[
    (4, "Fiktionaler Dialog zwischen zwei Gegenständen"),
    (10, "Wo ist Hugo? (Anleitung schreiben)"),
];

/// Resolve a category id to its display name.
pub fn category_name(id: i64) -> Option<&'static str> {
    CATEGORY_MAPPING
        .iter()
        .find(|(cat_id, _)| *cat_id == id)
        .map(|(_, name)| *name)
}

/// Resolve a task id to its display name.
pub fn task_name(id: i64) -> Option<&'static str> {
    TASK_MAPPING
        .iter()
        .find(|(task_id, _)| *task_id == id)
        .map(|(_, name)| *name)
}

/// Resolve a category display name back to its id (used when parsing the
/// "Kategorie:" list item on the article detail page).
pub fn category_id(name: &str) -> Option<i64> {
    CATEGORY_MAPPING
        .iter()
        .find(|(_, cat_name)| *cat_name == name)
        .map(|(id, _)| *id)
}

/// Resolve a task display name back to its id (used when parsing the
/// "Aufgabe:" list item on the article detail page).
pub fn task_id(name: &str) -> Option<i64> {
    TASK_MAPPING
        .iter()
        .find(|(_, task_name)| *task_name == name)
        .map(|(id, _)| *id)
}
