use std::collections::BTreeMap;

/// Precinct sizes read from a report, counted by value.
#[derive(Debug, Default)]
pub(crate) struct PrecinctMultiset {
    counts: BTreeMap<u32, usize>,
}

impl PrecinctMultiset {
    pub(crate) fn insert(&mut self, size: u32) {
        *self.counts.entry(size).or_insert(0) += 1;
    }

    /// Remove one occurrence of `size`, returning whether there was one.
    pub(crate) fn take(&mut self, size: u32) -> bool {
        match self.counts.get_mut(&size) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    /// Occurrences never taken, smallest first.
    pub(crate) fn into_surplus(self) -> Vec<u32> {
        self.counts
            .into_iter()
            .flat_map(|(size, remaining)| std::iter::repeat(size).take(remaining))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_consumes_one_occurrence() {
        let mut precincts = PrecinctMultiset::default();
        precincts.insert(256);
        precincts.insert(128);
        precincts.insert(256);

        assert!(precincts.take(256));
        assert!(precincts.take(256));
        assert!(!precincts.take(256));
        assert!(!precincts.take(64));
        assert_eq!(precincts.into_surplus(), vec![128]);
    }
}
