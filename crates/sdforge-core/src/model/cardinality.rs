use serde::{Deserialize, Serialize};

/// Upper cardinality bound (`*` is unbounded)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Max {
    Bounded(u32),
    Unbounded,
}

impl Max {
    /// True if `n` fits under this bound
    pub fn admits(&self, n: u32) -> bool {
        match self {
            Max::Bounded(max) => n <= *max,
            Max::Unbounded => true,
        }
    }

    /// The tighter of two bounds
    pub fn min_of(self, other: Max) -> Max {
        match (self, other) {
            (Max::Unbounded, m) | (m, Max::Unbounded) => m,
            (Max::Bounded(a), Max::Bounded(b)) => Max::Bounded(a.min(b)),
        }
    }
}

impl std::fmt::Display for Max {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Max::Bounded(n) => write!(f, "{}", n),
            Max::Unbounded => f.write_str("*"),
        }
    }
}

impl std::str::FromStr for Max {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "*" => Ok(Max::Unbounded),
            n => n
                .parse::<u32>()
                .map(Max::Bounded)
                .map_err(|_| format!("invalid max cardinality: {}", s)),
        }
    }
}

impl TryFrom<String> for Max {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Max> for String {
    fn from(max: Max) -> Self {
        max.to_string()
    }
}

/// A closed cardinality range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cardinality {
    pub min: u32,
    pub max: Max,
}

impl Cardinality {
    pub fn new(min: u32, max: Max) -> Self {
        Self { min, max }
    }

    /// True when at least one count satisfies the range
    pub fn is_satisfiable(&self) -> bool {
        self.max.admits(self.min)
    }

    /// Narrow this range by an optional requested min and max
    ///
    /// The result is the intersection of both ranges. Returns `None` when
    /// the intersection is empty.
    pub fn narrow(&self, min: Option<u32>, max: Option<Max>) -> Option<Cardinality> {
        let narrowed = Cardinality {
            min: min.map_or(self.min, |m| m.max(self.min)),
            max: max.map_or(self.max, |m| m.min_of(self.max)),
        };
        narrowed.is_satisfiable().then_some(narrowed)
    }
}

impl std::fmt::Display for Cardinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_parse_and_display() {
        assert_eq!("*".parse::<Max>(), Ok(Max::Unbounded));
        assert_eq!("3".parse::<Max>(), Ok(Max::Bounded(3)));
        assert!("many".parse::<Max>().is_err());
        assert_eq!(Max::Unbounded.to_string(), "*");
    }

    #[test]
    fn test_narrow_is_intersection() {
        let current = Cardinality::new(0, Max::Unbounded);
        let narrowed = current.narrow(Some(1), Some(Max::Bounded(1))).unwrap();
        assert_eq!(narrowed, Cardinality::new(1, Max::Bounded(1)));

        let current = Cardinality::new(1, Max::Bounded(1));
        let narrowed = current.narrow(Some(0), None).unwrap();
        assert_eq!(narrowed, Cardinality::new(1, Max::Bounded(1)));
    }

    #[test]
    fn test_narrow_disjoint_ranges() {
        let current = Cardinality::new(2, Max::Bounded(5));
        assert!(current.narrow(None, Some(Max::Bounded(1))).is_none());
    }

    #[test]
    fn test_max_serde_as_string() {
        let json = serde_json::to_value(Max::Bounded(0)).unwrap();
        assert_eq!(json, serde_json::json!("0"));
        let back: Max = serde_json::from_value(serde_json::json!("*")).unwrap();
        assert_eq!(back, Max::Unbounded);
    }
}
