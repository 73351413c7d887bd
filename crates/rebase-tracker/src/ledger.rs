//! The on-disk list of rebase transactions and what we know about their redemption.
//!
//! Stored as a pretty-printed JSON array of `{"terraTx": ..., "redeemed": ...}` objects in
//! discovery order (oldest first). Records are only ever appended or updated in place.

use eyre::Context as _;
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    fs,
    path::Path,
};

/// Redemption state of one record. Serialized as `null` / `true` / `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum RedemptionStatus {
    /// Never checked, or the check could not determine a sequence number.
    #[default]
    Unknown,
    Redeemed,
    Unredeemed,
}

impl From<Option<bool>> for RedemptionStatus {
    fn from(v: Option<bool>) -> Self {
        match v {
            None => Self::Unknown,
            Some(true) => Self::Redeemed,
            Some(false) => Self::Unredeemed,
        }
    }
}

impl From<RedemptionStatus> for Option<bool> {
    fn from(v: RedemptionStatus) -> Self {
        match v {
            RedemptionStatus::Unknown => None,
            RedemptionStatus::Redeemed => Some(true),
            RedemptionStatus::Unredeemed => Some(false),
        }
    }
}

impl RedemptionStatus {
    /// Combine a stored status with a fresh check result.
    ///
    /// Redeemed is terminal, and an inconclusive check never erases a known answer.
    pub const fn merge(self, fresh: Self) -> Self {
        match (self, fresh) {
            (Self::Redeemed, _) | (_, Self::Redeemed) => Self::Redeemed,
            (current, Self::Unknown) => current,
            (_, Self::Unredeemed) => Self::Unredeemed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckMode {
    /// Skip records already known to be redeemed.
    #[default]
    OnlyUnredeemed,
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebaseRecord {
    pub terra_tx: String,
    // Early ledgers were written before redemption tracking existed and omit this field.
    #[serde(default)]
    pub redeemed: RedemptionStatus,
}

impl RebaseRecord {
    pub fn new(terra_tx: impl Into<String>) -> Self {
        Self {
            terra_tx: terra_tx.into(),
            redeemed: RedemptionStatus::Unknown,
        }
    }

    pub fn needs_check(&self, mode: CheckMode) -> bool {
        match mode {
            CheckMode::All => true,
            CheckMode::OnlyUnredeemed => self.redeemed != RedemptionStatus::Redeemed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LedgerSummary {
    pub total: usize,
    pub redeemed: usize,
    pub unredeemed: usize,
    pub unknown: usize,
}

impl LedgerSummary {
    pub fn tally<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = RedemptionStatus>,
    {
        let mut s = Self::default();
        for status in statuses {
            s.total += 1;
            match status {
                RedemptionStatus::Redeemed => s.redeemed += 1,
                RedemptionStatus::Unredeemed => s.unredeemed += 1,
                RedemptionStatus::Unknown => s.unknown += 1,
            }
        }
        s
    }
}

/// Hashes from `fetched` that are not in `known`, in `fetched` order, each at most once.
pub fn new_hashes<'a, I>(fetched: I, known: &HashSet<&str>) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen: HashSet<&str> = HashSet::new();
    fetched
        .into_iter()
        .filter(|&h| !known.contains(h) && seen.insert(h))
        .map(ToOwned::to_owned)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    records: Vec<RebaseRecord>,
}

impl Ledger {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn load(path: &Path) -> eyre::Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "ledger file missing; starting empty");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(eyre::Report::new(e).wrap_err(format!("read {}", path.display())));
            }
        };
        Self::from_json(&raw).with_context(|| format!("parse {}", path.display()))
    }

    pub fn from_json(s: &str) -> eyre::Result<Self> {
        let ledger: Self = serde_json::from_str(s).context("decode ledger json")?;
        Ok(ledger)
    }

    /// Two-space indented JSON without a trailing newline.
    pub fn to_json(&self) -> eyre::Result<String> {
        serde_json::to_string_pretty(self).context("serialize ledger")
    }

    pub fn save(&self, path: &Path) -> eyre::Result<()> {
        let s = self.to_json()?;
        crate::fsutil::write_string_atomic(path, &s)
            .with_context(|| format!("write {}", path.display()))
    }

    /// Append every hash in `fetched_newest_first` that the ledger has not seen yet.
    ///
    /// The indexer lists newest first, so the new subset is reversed before appending to keep
    /// the file chronological. Returns the number of records added.
    pub fn append_discovered<'a, I>(&mut self, fetched_newest_first: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let fresh = {
            let known: HashSet<&str> = self.records.iter().map(|r| r.terra_tx.as_str()).collect();
            new_hashes(fetched_newest_first, &known)
        };
        let added = fresh.len();
        self.records
            .extend(fresh.into_iter().rev().map(RebaseRecord::new));
        added
    }

    pub fn needs_check(&self, mode: CheckMode) -> Vec<RebaseRecord> {
        self.records
            .iter()
            .filter(|r| r.needs_check(mode))
            .cloned()
            .collect()
    }

    /// Fold check results into the ledger. Unknown hashes are ignored. Returns how many
    /// records changed.
    pub fn apply<I>(&mut self, results: I) -> usize
    where
        I: IntoIterator<Item = (String, RedemptionStatus)>,
    {
        let index: HashMap<String, usize> = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.terra_tx.clone(), i))
            .collect();

        let mut changed = 0_usize;
        for (hash, fresh) in results {
            let Some(rec) = index.get(&hash).and_then(|&i| self.records.get_mut(i)) else {
                tracing::debug!(terra_tx = %hash, "result for hash not in ledger; ignoring");
                continue;
            };
            let merged = rec.redeemed.merge(fresh);
            if merged != rec.redeemed {
                rec.redeemed = merged;
                changed += 1;
            }
        }
        changed
    }

    pub fn summary(&self) -> LedgerSummary {
        LedgerSummary::tally(self.records.iter().map(|r| r.redeemed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hashes(l: &Ledger) -> Vec<&str> {
        l.records.iter().map(|r| r.terra_tx.as_str()).collect()
    }

    #[test]
    fn diff_filter_drops_known_and_duplicate_hashes() {
        let known: HashSet<&str> = ["A", "C"].into_iter().collect();
        let out = new_hashes(["D", "C", "B", "D", "A", "E"], &known);
        assert_eq!(out, vec!["D", "B", "E"]);
    }

    #[test]
    fn newest_first_batch_is_appended_oldest_first() -> eyre::Result<()> {
        let mut l = Ledger::from_json(r#"[{"terraTx":"A","redeemed":null}]"#)?;
        let added = l.append_discovered(["B", "A"]);
        assert_eq!(added, 1);
        assert_eq!(
            l.to_json()?,
            "[\n  {\n    \"terraTx\": \"A\",\n    \"redeemed\": null\n  },\n  {\n    \"terraTx\": \"B\",\n    \"redeemed\": null\n  }\n]"
        );

        l.append_discovered(["E", "D", "C", "B"]);
        assert_eq!(hashes(&l), vec!["A", "B", "C", "D", "E"]);
        Ok(())
    }

    #[test]
    fn rediscovering_nothing_leaves_serialization_unchanged() -> eyre::Result<()> {
        let original = "[\n  {\n    \"terraTx\": \"A\",\n    \"redeemed\": true\n  },\n  {\n    \"terraTx\": \"B\",\n    \"redeemed\": false\n  }\n]";
        let mut l = Ledger::from_json(original)?;
        assert_eq!(l.append_discovered(["B", "A"]), 0);
        assert_eq!(l.to_json()?, original);
        Ok(())
    }

    #[test]
    fn legacy_records_without_redeemed_load_as_unknown() -> eyre::Result<()> {
        let l = Ledger::from_json(r#"[{"terraTx":"A"},{"terraTx":"B","redeemed":true}]"#)?;
        let got: Vec<RedemptionStatus> = l.records.iter().map(|r| r.redeemed).collect();
        assert_eq!(
            got,
            vec![RedemptionStatus::Unknown, RedemptionStatus::Redeemed]
        );
        // Re-serializing writes the canonical shape.
        assert!(l.to_json()?.contains("\"redeemed\": null"));
        Ok(())
    }

    #[test]
    fn recheck_skips_only_redeemed_records() -> eyre::Result<()> {
        let l = Ledger::from_json(
            r#"[{"terraTx":"A","redeemed":true},{"terraTx":"B","redeemed":false},{"terraTx":"C","redeemed":null}]"#,
        )?;
        let pending: Vec<String> = l
            .needs_check(CheckMode::OnlyUnredeemed)
            .into_iter()
            .map(|r| r.terra_tx)
            .collect();
        assert_eq!(pending, vec!["B", "C"]);
        assert_eq!(l.needs_check(CheckMode::All).len(), 3);
        Ok(())
    }

    #[test]
    fn apply_is_monotonic() -> eyre::Result<()> {
        let mut l = Ledger::from_json(
            r#"[{"terraTx":"A","redeemed":true},{"terraTx":"B","redeemed":false},{"terraTx":"C","redeemed":null}]"#,
        )?;
        let changed = l.apply([
            ("A".to_owned(), RedemptionStatus::Unredeemed),
            ("B".to_owned(), RedemptionStatus::Unknown),
            ("C".to_owned(), RedemptionStatus::Unredeemed),
            ("Z".to_owned(), RedemptionStatus::Redeemed),
        ]);
        assert_eq!(changed, 1);
        let got: Vec<RedemptionStatus> = l.records.iter().map(|r| r.redeemed).collect();
        assert_eq!(
            got,
            vec![
                RedemptionStatus::Redeemed,
                RedemptionStatus::Unredeemed,
                RedemptionStatus::Unredeemed
            ]
        );

        assert_eq!(l.apply([("B".to_owned(), RedemptionStatus::Redeemed)]), 1);
        assert_eq!(l.summary().redeemed, 2);
        Ok(())
    }

    #[test]
    fn missing_file_loads_empty_and_save_round_trips() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let p = dir.path().join("data").join("rebases.json");
        let mut l = Ledger::load(&p)?;
        assert!(l.is_empty());

        l.append_discovered(["B", "A"]);
        l.save(&p)?;
        let back = Ledger::load(&p)?;
        assert_eq!(back, l);
        assert_eq!(hashes(&back), vec!["A", "B"]);
        Ok(())
    }

    #[test]
    fn malformed_file_is_an_error() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let p = dir.path().join("rebases.json");
        fs::write(&p, "{not json")?;
        let err = Ledger::load(&p).err().ok_or_else(|| eyre::eyre!("expected error"))?;
        assert!(format!("{err:#}").contains("rebases.json"));
        Ok(())
    }

    #[test]
    fn summary_counts_each_status() -> eyre::Result<()> {
        let l = Ledger::from_json(
            r#"[{"terraTx":"A","redeemed":true},{"terraTx":"B","redeemed":false},{"terraTx":"C"},{"terraTx":"D","redeemed":null}]"#,
        )?;
        assert_eq!(
            l.summary(),
            LedgerSummary {
                total: 4,
                redeemed: 1,
                unredeemed: 1,
                unknown: 2
            }
        );
        Ok(())
    }
}
