//! Backtracking statistics.
//!
//! Recording is observational: the parser takes the same decisions whether
//! or not an [`Analyzer`] is attached.

use std::fmt;

use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SiteStats {
    pub attempts: u64,
    pub backtracks: u64,
    /// Tokens consumed by attempts that were thrown away.
    pub discarded: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    sites: IndexMap<&'static str, SiteStats>,
}

impl Analyzer {
    pub fn record(&mut self, site: &'static str, matched: bool, consumed: u64) {
        let s = self.sites.entry(site).or_default();
        s.attempts += 1;
        if !matched {
            s.backtracks += 1;
            s.discarded += consumed;
        }
    }

    pub fn sites(&self) -> impl Iterator<Item = (&'static str, &SiteStats)> {
        self.sites.iter().map(|(k, v)| (*k, v))
    }

    pub fn total_discarded(&self) -> u64 {
        self.sites.values().map(|s| s.discarded).sum()
    }

    /// Folds another file's statistics into this one.
    pub fn merge(&mut self, other: &Analyzer) {
        for (site, s) in other.sites() {
            let e = self.sites.entry(site).or_default();
            e.attempts += s.attempts;
            e.backtracks += s.backtracks;
            e.discarded += s.discarded;
        }
    }
}

impl fmt::Display for Analyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<24} {:>10} {:>10} {:>10}", "site", "attempts", "backtracks", "discarded")?;
        let mut rows: Vec<_> = self.sites().collect();
        rows.sort_by(|a, b| b.1.discarded.cmp(&a.1.discarded));
        for (site, s) in rows {
            writeln!(
                f,
                "{site:<24} {:>10} {:>10} {:>10}",
                s.attempts, s.backtracks, s.discarded
            )?;
        }
        Ok(())
    }
}
