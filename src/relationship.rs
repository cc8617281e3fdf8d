use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::db::Db;
use crate::errors::BackendError;
use crate::person::{OwnerId, Person, PersonId};

/// What one person is to another.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipKind {
    Parent,
    Child,
    Spouse,
    Sibling,
}

impl RelationshipKind {
    pub const ALL: [RelationshipKind; 4] = [
        RelationshipKind::Parent,
        RelationshipKind::Child,
        RelationshipKind::Spouse,
        RelationshipKind::Sibling,
    ];

    /// Returns the kind that holds in the other direction: if A is B's
    /// parent, B is A's child.
    pub fn reciprocal(self) -> Self {
        use RelationshipKind::*;

        match self {
            Parent => Child,
            Child => Parent,
            Spouse => Spouse,
            Sibling => Sibling,
        }
    }

    pub fn as_str(self) -> &'static str {
        use RelationshipKind::*;

        match self {
            Parent => "PARENT",
            Child => "CHILD",
            Spouse => "SPOUSE",
            Sibling => "SIBLING",
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipKind {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelationshipKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| BackendError::UnknownRelationshipKind(s.to_owned()))
    }
}

/// A relationship that has not been stored yet, already in canonical
/// order: `person_a < person_b`.
#[derive(Clone, Debug, PartialEq)]
pub struct NewRelationship {
    pub(crate) owner_id: OwnerId,
    pub(crate) person_a: PersonId,
    pub(crate) person_b: PersonId,
    pub(crate) a_to_b: RelationshipKind,
    pub(crate) b_to_a: RelationshipKind,
    pub(crate) notes: String,
}

impl NewRelationship {
    /// Relates `a` to `b` as `a_to_b`, deriving the reciprocal kind.
    pub fn new(
        owner_id: OwnerId,
        a: &Person,
        b: &Person,
        a_to_b: RelationshipKind,
        notes: String,
    ) -> Result<Self, BackendError> {
        if a.owner_id() != owner_id || b.owner_id() != owner_id {
            return Err(BackendError::OwnerMismatch {
                person_a: a.id(),
                person_b: b.id(),
            });
        }

        Self::between(owner_id, a.id(), b.id(), a_to_b, a_to_b.reciprocal(), notes)
    }

    /// Relates two person IDs with explicit kinds in both directions.
    pub fn between(
        owner_id: OwnerId,
        a: PersonId,
        b: PersonId,
        a_to_b: RelationshipKind,
        b_to_a: RelationshipKind,
        notes: String,
    ) -> Result<Self, BackendError> {
        if a == b {
            return Err(BackendError::SelfRelationship(a));
        }

        if a_to_b.reciprocal() != b_to_a {
            return Err(BackendError::NonReciprocalKinds {
                a_to_b: a_to_b.to_string(),
                b_to_a: b_to_a.to_string(),
            });
        }

        let (person_a, person_b, a_to_b, b_to_a) = if a < b {
            (a, b, a_to_b, b_to_a)
        } else {
            (b, a, b_to_a, a_to_b)
        };

        Ok(NewRelationship {
            owner_id,
            person_a,
            person_b,
            a_to_b,
            b_to_a,
            notes,
        })
    }

    pub fn person_a(&self) -> PersonId {
        self.person_a
    }

    pub fn person_b(&self) -> PersonId {
        self.person_b
    }
}

/// A stored relationship.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Relationship {
    pub(crate) id: i64,
    pub(crate) owner_id: OwnerId,
    pub(crate) person_a: PersonId,
    pub(crate) person_b: PersonId,
    pub(crate) a_to_b: RelationshipKind,
    pub(crate) b_to_a: RelationshipKind,
    pub(crate) notes: String,
}

impl Relationship {
    pub fn from_new(id: i64, relationship: NewRelationship) -> Self {
        Relationship {
            id,
            owner_id: relationship.owner_id,
            person_a: relationship.person_a,
            person_b: relationship.person_b,
            a_to_b: relationship.a_to_b,
            b_to_a: relationship.b_to_a,
            notes: relationship.notes,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn owner_id(&self) -> OwnerId {
        self.owner_id
    }

    pub fn person_a(&self) -> PersonId {
        self.person_a
    }

    pub fn person_b(&self) -> PersonId {
        self.person_b
    }

    pub fn a_to_b(&self) -> RelationshipKind {
        self.a_to_b
    }

    pub fn b_to_a(&self) -> RelationshipKind {
        self.b_to_a
    }

    /// Whether the relationship joins `x` and `y`, in either order.
    pub fn joins(&self, x: PersonId, y: PersonId) -> bool {
        (self.person_a == x && self.person_b == y) || (self.person_a == y && self.person_b == x)
    }

    /// Returns the other endpoint and what it is to `person`, e.g. for a
    /// PARENT→CHILD relationship viewed from the child, the parent and
    /// `Parent`.
    pub fn counterpart(&self, person: PersonId) -> Option<(PersonId, RelationshipKind)> {
        if person == self.person_a {
            Some((self.person_b, self.b_to_a))
        } else if person == self.person_b {
            Some((self.person_a, self.a_to_b))
        } else {
            None
        }
    }
}

/// A person related to someone, as reported by [`relatives`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Relative {
    pub person_id: PersonId,
    pub kind: RelationshipKind,
    pub relationship_id: i64,
}

/// Lists who `person` is related to, optionally only those of the given
/// kind (from the person's perspective: `Parent` lists their parents).
pub fn relatives(
    relationships: &[Relationship],
    person: PersonId,
    kind: Option<RelationshipKind>,
) -> Vec<Relative> {
    relationships
        .iter()
        .filter_map(|r| {
            r.counterpart(person).map(|(person_id, k)| Relative {
                person_id,
                kind: k,
                relationship_id: r.id,
            })
        })
        .filter(|relative| kind.map_or(true, |k| relative.kind == k))
        .collect()
}

/// Loads the relationships of `person` and lists their relatives.
pub async fn find_relatives(
    db: &(dyn Db + Send + Sync),
    owner: OwnerId,
    person: PersonId,
    kind: Option<RelationshipKind>,
) -> Result<Vec<Relative>, BackendError> {
    let relationships = db.relationships_of(owner, person).await?;

    Ok(relatives(&relationships, person, kind))
}
