//! Sort specifications used by the "find last record" read workload.

use std::fmt;

/// Record fields a read query may order by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SortField {
    /// `url`
    Url,
    /// `secret`
    Secret,
    /// `creator_id`
    CreatorId,
    /// `owner_id`
    OwnerId,
    /// `related_to_id`
    RelatedToId,
    /// `related_to_type`
    RelatedToType,
    /// `logged_at`
    LoggedAt,
    /// `created_at`
    CreatedAt,
    /// `updated_at`
    UpdatedAt,
}

impl SortField {
    /// Column / document key name shared by every backend.
    pub fn column(self) -> &'static str {
        match self {
            SortField::Url => "url",
            SortField::Secret => "secret",
            SortField::CreatorId => "creator_id",
            SortField::OwnerId => "owner_id",
            SortField::RelatedToId => "related_to_id",
            SortField::RelatedToType => "related_to_type",
            SortField::LoggedAt => "logged_at",
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
        }
    }
}

/// Sort direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

impl Direction {
    /// Opposite direction.
    pub fn reverse(self) -> Self {
        match self {
            Direction::Ascending => Direction::Descending,
            Direction::Descending => Direction::Ascending,
        }
    }

    /// SQL keyword.
    pub fn sql(self) -> &'static str {
        match self {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        }
    }
}

/// Ordered `(field, direction)` pairs.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SortSpec {
    keys: Vec<(SortField, Direction)>,
}

impl SortSpec {
    /// Builds a spec; `keys` must be non-empty.
    pub fn new(keys: Vec<(SortField, Direction)>) -> Self {
        debug_assert!(!keys.is_empty(), "sort spec needs at least one key");
        Self { keys }
    }

    /// Applies one direction to every field of a group.
    pub fn uniform(fields: &[SortField], direction: Direction) -> Self {
        Self::new(fields.iter().map(|&field| (field, direction)).collect())
    }

    /// Sort keys in priority order.
    pub fn keys(&self) -> &[(SortField, Direction)] {
        &self.keys
    }

    /// Same fields with every direction flipped.
    pub fn reversed(&self) -> Self {
        Self {
            keys: self
                .keys
                .iter()
                .map(|&(field, direction)| (field, direction.reverse()))
                .collect(),
        }
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (field, direction)) in self.keys.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", field.column(), direction.sql().to_lowercase())?;
        }
        Ok(())
    }
}

/// Field groups visited by readers, in order.
pub const SORT_GROUPS: [&[SortField]; 8] = [
    &[SortField::Url],
    &[SortField::Secret],
    &[SortField::CreatorId],
    &[SortField::OwnerId],
    &[SortField::RelatedToId, SortField::RelatedToType],
    &[SortField::LoggedAt],
    &[SortField::CreatedAt],
    &[SortField::UpdatedAt],
];

const DIRECTIONS: [Direction; 2] = [Direction::Ascending, Direction::Descending];

/// Positions in one full pass over [`SORT_GROUPS`] in both directions.
pub const ROTATION_LEN: usize = SORT_GROUPS.len() * DIRECTIONS.len();

/// Endless iterator over the reader rotation: each group ascending, then
/// descending, then the next group.
#[derive(Clone, Debug, Default)]
pub struct SortRotation {
    position: usize,
}

impl SortRotation {
    /// Starts at the first group, ascending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spec at rotation `position` (taken modulo [`ROTATION_LEN`]).
    pub fn spec_at(position: usize) -> SortSpec {
        let position = position % ROTATION_LEN;
        let group = SORT_GROUPS[position / DIRECTIONS.len()];
        SortSpec::uniform(group, DIRECTIONS[position % DIRECTIONS.len()])
    }
}

impl Iterator for SortRotation {
    type Item = SortSpec;

    fn next(&mut self) -> Option<SortSpec> {
        let spec = Self::spec_at(self.position);
        self.position = (self.position + 1) % ROTATION_LEN;
        Some(spec)
    }
}
