//! Attribute maps and the minimal modification diff between two of them.

use indexmap::IndexMap;

/// Attribute name to ordered values. Insertion order is preserved so that
/// objects print back the way the directory returned them.
pub type Attributes = IndexMap<String, Vec<String>>;

/// A single change to one attribute of an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modification {
    Add { attribute: String, values: Vec<String> },
    Delete { attribute: String, values: Vec<String> },
}

impl Modification {
    pub fn attribute(&self) -> &str {
        match self {
            Modification::Add { attribute, .. } | Modification::Delete { attribute, .. } => {
                attribute
            }
        }
    }

    pub fn values(&self) -> &[String] {
        match self {
            Modification::Add { values, .. } | Modification::Delete { values, .. } => values,
        }
    }
}

/// Compute the per-value changes that turn `old` into `new`.
///
/// Values are compared as multisets, so a duplicated value that loses one copy
/// yields a single delete. Within an attribute deletes come before adds.
pub fn modifications(old: &Attributes, new: &Attributes) -> Vec<Modification> {
    let mut mods = Vec::new();

    let names = old
        .keys()
        .chain(new.keys().filter(|k| !old.contains_key(*k)));
    for name in names {
        let before = old.get(name).map(Vec::as_slice).unwrap_or_default();
        let after = new.get(name).map(Vec::as_slice).unwrap_or_default();

        let removed = difference(before, after);
        let added = difference(after, before);

        if !removed.is_empty() {
            mods.push(Modification::Delete {
                attribute: name.clone(),
                values: removed,
            });
        }
        if !added.is_empty() {
            mods.push(Modification::Add {
                attribute: name.clone(),
                values: added,
            });
        }
    }
    mods
}

/// Values of `a` not matched by a value of `b`, counting duplicates.
fn difference(a: &[String], b: &[String]) -> Vec<String> {
    let mut unmatched: Vec<Option<&String>> = b.iter().map(Some).collect();
    let mut out = Vec::new();
    for value in a {
        match unmatched.iter_mut().find(|slot| slot.is_some_and(|v| v == value)) {
            Some(slot) => *slot = None,
            None => out.push(value.clone()),
        }
    }
    out
}

/// Apply `mods` to `attributes`, dropping attributes left without values.
pub fn apply(attributes: &mut Attributes, mods: &[Modification]) {
    for m in mods {
        match m {
            Modification::Add { attribute, values } => attributes
                .entry(attribute.clone())
                .or_default()
                .extend(values.iter().cloned()),
            Modification::Delete { attribute, values } => {
                if let Some(existing) = attributes.get_mut(attribute) {
                    for value in values {
                        if let Some(pos) = existing.iter().position(|v| v == value) {
                            existing.remove(pos);
                        }
                    }
                    if existing.is_empty() {
                        attributes.shift_remove(attribute);
                    }
                }
            }
        }
    }
}
