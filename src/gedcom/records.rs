//! Individuals and families as the importer sees them.
//!
//! Files from different genealogy programs encode families differently,
//! so each piece of a family is found by an ordered list of strategies.
//! The first strategy that finds anything wins.

use std::collections::HashSet;

use super::{Document, Element};

/// An `INDI` record.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ParsedIndividual {
    pub pointer: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<String>,
    pub death_date: Option<String>,
    pub line: usize,
}

impl ParsedIndividual {
    pub fn from_element(element: &Element) -> Self {
        let (first_name, last_name) = element
            .child("NAME")
            .map(name_parts)
            .unwrap_or_default();

        ParsedIndividual {
            pointer: element.pointer().map(str::to_owned),
            first_name,
            last_name,
            birth_date: event_date(element, "BIRT"),
            death_date: event_date(element, "DEAT"),
            line: element.line(),
        }
    }

    pub fn has_name(&self) -> bool {
        !self.first_name.is_empty() || !self.last_name.is_empty()
    }

    /// The pointer, or the line number for records without one.
    pub fn label(&self) -> String {
        label(self.pointer.as_deref(), self.line)
    }
}

/// Splits `Given names /Surname/` and lets `GIVN` and `SURN` override the
/// parts.
fn name_parts(name: &Element) -> (String, String) {
    let value = name.full_value();

    let mut parts = value.splitn(3, '/');
    let mut given = parts.next().unwrap_or_default().trim().to_owned();
    let mut surname = parts.next().unwrap_or_default().trim().to_owned();

    if let Some(givn) = name.child("GIVN").and_then(Element::value) {
        given = givn.to_owned();
    }

    if let Some(surn) = name.child("SURN").and_then(Element::value) {
        surname = surn.to_owned();
    }

    (given, surname)
}

fn event_date(individual: &Element, event: &str) -> Option<String> {
    individual
        .child(event)
        .and_then(|e| e.child("DATE"))
        .map(|date| date.full_value().trim().to_owned())
        .filter(|date| !date.is_empty())
}

/// A family with its members resolved to pointers. Nothing here checks
/// that the pointers name individuals that were imported.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ParsedFamily {
    pub pointer: Option<String>,
    pub husband: Option<String>,
    pub wife: Option<String>,
    pub children: Vec<String>,
    pub line: usize,
}

impl ParsedFamily {
    pub fn from_element(document: &Document, family: &Element) -> Self {
        ParsedFamily {
            pointer: family.pointer().map(str::to_owned),
            husband: member(document, family, "HUSB"),
            wife: member(document, family, "WIFE"),
            children: children(document, family),
            line: family.line(),
        }
    }

    pub fn label(&self) -> String {
        label(self.pointer.as_deref(), self.line)
    }
}

fn label(pointer: Option<&str>, line: usize) -> String {
    match pointer {
        Some(pointer) => pointer.to_owned(),
        None => format!("<line {}>", line),
    }
}

pub type FamilyStrategy = for<'a> fn(&'a Document) -> Vec<&'a Element>;
pub type MemberStrategy = fn(&Document, &Element, &str) -> Option<String>;
pub type ChildrenStrategy = fn(&Document, &Element) -> Vec<String>;

pub const FAMILY_STRATEGIES: &[(&str, FamilyStrategy)] = &[
    ("record kind", families_by_record_kind),
    ("tag scan", families_by_tag_scan),
];

pub const MEMBER_STRATEGIES: &[MemberStrategy] = &[member_by_reference, member_by_tag_scan];

// CHIL lines are the primary source; not every producer writes FAMC back
// references
pub const CHILDREN_STRATEGIES: &[ChildrenStrategy] =
    &[children_by_tag_scan, children_by_back_reference];

/// Returns the family elements found by the first strategy that finds
/// any, along with that strategy's name.
pub fn find_families(document: &Document) -> Option<(&'static str, Vec<&Element>)> {
    FAMILY_STRATEGIES.iter().find_map(|(name, strategy)| {
        let families = strategy(document);

        if families.is_empty() {
            None
        } else {
            Some((*name, families))
        }
    })
}

/// Level-0 `FAM` records with a pointer.
pub fn families_by_record_kind(document: &Document) -> Vec<&Element> {
    document
        .records()
        .iter()
        .filter(|r| r.tag() == "FAM" && r.pointer().is_some())
        .collect()
}

/// Any `FAM` element, at any depth, that names at least one member.
pub fn families_by_tag_scan(document: &Document) -> Vec<&Element> {
    document
        .records()
        .iter()
        .flat_map(Element::walk)
        .filter(|e| {
            e.tag() == "FAM"
                && e.children()
                    .iter()
                    .any(|c| matches!(c.tag(), "HUSB" | "WIFE" | "CHIL") && c.value().is_some())
        })
        .collect()
}

fn member(document: &Document, family: &Element, role: &str) -> Option<String> {
    MEMBER_STRATEGIES
        .iter()
        .find_map(|strategy| strategy(document, family, role))
}

/// The first `role` value that is a pointer to an `INDI` record in the
/// document.
pub fn member_by_reference(document: &Document, family: &Element, role: &str) -> Option<String> {
    family
        .children_with_tag(role)
        .filter_map(Element::value)
        .find(|value| {
            is_pointer(value)
                && document
                    .record(value)
                    .map_or(false, |record| record.tag() == "INDI")
        })
        .map(str::to_owned)
}

/// The first non-empty `role` value, whatever it points at.
pub fn member_by_tag_scan(_document: &Document, family: &Element, role: &str) -> Option<String> {
    family
        .children_with_tag(role)
        .find_map(Element::value)
        .map(str::to_owned)
}

fn children(document: &Document, family: &Element) -> Vec<String> {
    let mut children = CHILDREN_STRATEGIES
        .iter()
        .map(|strategy| strategy(document, family))
        .find(|children| !children.is_empty())
        .unwrap_or_default();

    let mut seen = HashSet::new();
    children.retain(|child| seen.insert(child.clone()));

    children
}

pub fn children_by_tag_scan(_document: &Document, family: &Element) -> Vec<String> {
    family
        .children_with_tag("CHIL")
        .filter_map(Element::value)
        .map(str::to_owned)
        .collect()
}

/// Individuals with a `FAMC` line naming the family, in file order.
pub fn children_by_back_reference(document: &Document, family: &Element) -> Vec<String> {
    let pointer = match family.pointer() {
        Some(pointer) => pointer,
        None => return vec![],
    };

    document
        .individuals()
        .filter(|i| i.children_with_tag("FAMC").any(|f| f.value() == Some(pointer)))
        .filter_map(Element::pointer)
        .map(str::to_owned)
        .collect()
}

fn is_pointer(value: &str) -> bool {
    value.len() > 2 && value.starts_with('@') && value.ends_with('@')
}
