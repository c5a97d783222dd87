use std::collections::BTreeMap;

/// The result of [`IntervalSet::insert_merge`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MergeOutcome {
    /// `[start, end]` was already covered by a single existing interval; the
    /// set was not modified.
    AlreadyCovered,
    /// A new interval was inserted, possibly absorbing and replacing one or
    /// more existing intervals it overlapped or touched.
    Merged { start: String, end: String },
}

/// A disjoint, non-adjacent set of closed `[start, end]` intervals over
/// date-key strings. Relies on the date key format sorting lexicographically
/// in the same order as chronologically, so a plain `BTreeMap<String,
/// String>` keyed by interval start gives sorted iteration for free.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IntervalSet {
    map: BTreeMap<String, String>,
}

impl IntervalSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(a, b)| (a.as_str(), b.as_str()))
    }

    /// True if some single interval in the set spans all of `[s, e]`.
    pub fn covers(&self, s: &str, e: &str) -> bool {
        self.map.iter().any(|(a, b)| a.as_str() <= s && e <= b.as_str())
    }

    /// Inserts `[s, e]`, merging it with any interval it overlaps or
    /// touches. No-ops (other than the return value) if `[s, e]` is already
    /// fully covered.
    pub fn insert_merge(&mut self, s: &str, e: &str) -> MergeOutcome {
        if self.covers(s, e) {
            return MergeOutcome::AlreadyCovered;
        }
        let mut new_s = s.to_string();
        let mut new_e = e.to_string();
        let mut absorbed = Vec::new();
        for (a, b) in self.map.iter() {
            let disjoint = a.as_str() > new_e.as_str() || b.as_str() < new_s.as_str();
            if disjoint {
                continue;
            }
            absorbed.push(a.clone());
            if a.as_str() < new_s.as_str() {
                new_s = a.clone();
            }
            if b.as_str() > new_e.as_str() {
                new_e = b.clone();
            }
        }
        for a in &absorbed {
            self.map.remove(a);
        }
        self.map.insert(new_s.clone(), new_e.clone());
        MergeOutcome::Merged { start: new_s, end: new_e }
    }

    /// The sub-intervals of `[s, e]` not covered by anything in the set,
    /// i.e. what a populate would still need to fetch. Empty if `[s, e]` is
    /// already fully covered.
    pub fn difference(&self, s: &str, e: &str) -> Vec<(String, String)> {
        let mut result = Vec::new();
        let mut cursor = s.to_string();
        for (a, b) in self.map.iter() {
            if b.as_str() < cursor.as_str() {
                continue;
            }
            if a.as_str() > e {
                break;
            }
            if a.as_str() > cursor.as_str() {
                result.push((cursor.clone(), a.clone()));
            }
            if b.as_str() > cursor.as_str() {
                cursor = b.clone();
            }
            if cursor.as_str() >= e {
                return result;
            }
        }
        if cursor.as_str() < e {
            result.push((cursor, e.to_string()));
        }
        result
    }
}
