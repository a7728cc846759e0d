use std::fmt;

/// What to do with the parts of a PolyLine record.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LineParts {
    /// A LineString of the first part. Any other parts are dropped.
    FirstPartOnly,
    /// A MultiLineString with one line per part.
    AllParts,
}

/// How to decide which polygon parts are outer rings.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RingRoles {
    /// Every part but the last uses its part type. The last part uses its own
    /// start index, read as a part type: a last ring starting at vertex 2 or 4
    /// is outer. Files written by older versions of this reader depend on it.
    Legacy,
    /// Every part uses its part type: OuterRing and FirstRing are outer.
    PartTypes,
    /// Clockwise rings are outer, as the ESRI whitepaper prescribes.
    Winding,
}

#[derive(Clone)]
pub struct ReadOptions {
    pub encoding: encoding::EncodingRef,
    pub line_parts: LineParts,
    pub ring_roles: RingRoles,
}

impl Default for ReadOptions {
    fn default() -> ReadOptions {
        ReadOptions {
            encoding: encoding::all::UTF_8,
            line_parts: LineParts::FirstPartOnly,
            ring_roles: RingRoles::Legacy,
        }
    }
}

impl ReadOptions {
    pub fn encoding(mut self, encoding: encoding::EncodingRef) -> ReadOptions {
        self.encoding = encoding;
        self
    }

    pub fn line_parts(mut self, line_parts: LineParts) -> ReadOptions {
        self.line_parts = line_parts;
        self
    }

    pub fn ring_roles(mut self, ring_roles: RingRoles) -> ReadOptions {
        self.ring_roles = ring_roles;
        self
    }
}

// encoding::EncodingRef does not implement std::fmt::Debug
impl fmt::Debug for ReadOptions {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("ReadOptions")
            .field("encoding", &self.encoding.name())
            .field("line_parts", &self.line_parts)
            .field("ring_roles", &self.ring_roles)
            .finish()
    }
}
