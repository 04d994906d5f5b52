//! Completeness partition of merged records.
//!
//! Records fall into [`Category::Complete`], [`Category::ParticipantOnly`] or
//! [`Category::EvaluatorOnly`] by which sides are present. Leftovers on both
//! sides whose keys agree on the participant's name (the first
//! `reconcile_key_len` key parts) are then paired one-to-one: this happens
//! when the participant named a different evaluator than the one who
//! answered.

use std::path::PathBuf;

use crate::config::DataLayout;
use crate::error::TableResult;
use crate::logs::{log_info, log_info_indent, log_success};
use crate::models::{CategorizedRecord, Category, MergedRecord, MergedTable, Table};
use crate::parser::write_table;

/// Records split by category. Each bucket is in merged order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Categorized {
    pub complete: Vec<MergedRecord>,
    pub participant_only: Vec<MergedRecord>,
    pub evaluator_only: Vec<MergedRecord>,
    /// Pairs formed by reconciliation (included in `complete`).
    pub reconciled: usize,
}

impl Categorized {
    pub fn records(&self, category: Category) -> &[MergedRecord] {
        match category {
            Category::Complete => &self.complete,
            Category::ParticipantOnly => &self.participant_only,
            Category::EvaluatorOnly => &self.evaluator_only,
        }
    }

    pub fn len(&self) -> usize {
        self.complete.len() + self.participant_only.len() + self.evaluator_only.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every record tagged with its category.
    pub fn tagged(&self) -> Vec<CategorizedRecord> {
        Category::ALL
            .iter()
            .flat_map(|&category| {
                self.records(category).iter().map(move |record| CategorizedRecord {
                    category,
                    record: record.clone(),
                })
            })
            .collect()
    }

    /// Flatten one category for its processed CSV.
    pub fn table(&self, merged: &MergedTable, category: Category) -> Table {
        merged.flatten(self.records(category), category.sides(), Some(category))
    }
}

/// Splits merged records and writes the processed CSVs.
#[derive(Debug, Clone)]
pub struct Categorizer {
    reconcile_key_len: usize,
}

impl Categorizer {
    /// `reconcile_key_len` of zero disables reconciliation.
    pub fn new(reconcile_key_len: usize) -> Self {
        Self { reconcile_key_len }
    }

    pub fn categorize(&self, merged: &MergedTable) -> Categorized {
        let mut out = Categorized::default();
        for record in &merged.records {
            match record.category() {
                Category::Complete => out.complete.push(record.clone()),
                Category::ParticipantOnly => out.participant_only.push(record.clone()),
                Category::EvaluatorOnly => out.evaluator_only.push(record.clone()),
            }
        }
        if self.reconcile_key_len > 0 {
            self.reconcile(&mut out);
        }
        out
    }

    /// Pair leftovers on the key prefix, first come first served.
    fn reconcile(&self, out: &mut Categorized) {
        let len = self.reconcile_key_len;
        let mut used = vec![false; out.evaluator_only.len()];
        let mut unpaired = Vec::new();

        for mut participant in std::mem::take(&mut out.participant_only) {
            let prefix = participant.key.prefix(len);
            let partner = if prefix.is_complete() && prefix.parts().len() == len {
                (0..out.evaluator_only.len())
                    .find(|&i| !used[i] && out.evaluator_only[i].key.prefix(len) == prefix)
            } else {
                None
            };
            match partner {
                Some(i) => {
                    used[i] = true;
                    participant.evaluator = out.evaluator_only[i].evaluator.clone();
                    out.complete.push(participant);
                    out.reconciled += 1;
                }
                None => unpaired.push(participant),
            }
        }

        out.participant_only = unpaired;
        out.evaluator_only = std::mem::take(&mut out.evaluator_only)
            .into_iter()
            .zip(used)
            .filter(|(_, used)| !used)
            .map(|(record, _)| record)
            .collect();
        out.complete.sort_by_key(|r| r.idx);
    }

    /// Categorize and write the three processed CSVs. Returns the split and
    /// the written paths in [`Category::ALL`] order.
    pub fn run(&self, merged: &MergedTable, layout: &DataLayout) -> TableResult<(Categorized, Vec<PathBuf>)> {
        log_info(format!("Categorizing {} merged records", merged.len()));
        let categorized = self.categorize(merged);
        if categorized.reconciled > 0 {
            log_info_indent(
                format!("Reconciled {} record(s) with a different evaluator", categorized.reconciled),
                1,
            );
        }

        let mut paths = Vec::with_capacity(Category::ALL.len());
        for category in Category::ALL {
            let path = layout.processed_path(category);
            write_table(&categorized.table(merged, category), &path)?;
            log_info_indent(
                format!("{}: {} record(s)", category, categorized.records(category).len()),
                1,
            );
            paths.push(path);
        }

        log_success(format!("Wrote processed data to {}", layout.processed_dir().display()));
        Ok((categorized, paths))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JoinKey, CATEGORY_COLUMN, IDX_COLUMN};
    use crate::parser::read_table;
    use std::collections::HashSet;

    fn key(parts: &[&str]) -> JoinKey {
        JoinKey(parts.iter().map(|s| s.to_string()).collect())
    }

    fn record(idx: usize, parts: &[&str], participant: bool, evaluator: bool) -> MergedRecord {
        let row = |tag: &str| vec![format!("{}{}", tag, idx), "5".to_string()];
        MergedRecord {
            idx,
            key: key(parts),
            participant: participant.then(|| row("p")),
            evaluator: evaluator.then(|| row("e")),
        }
    }

    fn merged(records: Vec<MergedRecord>) -> MergedTable {
        MergedTable {
            participant_headers: vec!["stuFirst".into(), "ssSelf_1".into()],
            evaluator_headers: vec!["firstNameIntern".into(), "ssSup_1".into()],
            records,
        }
    }

    #[test]
    fn test_participant_without_evaluator_is_participant_only() {
        let m = merged(vec![
            record(0, &["a", "x", "sam", "lee"], true, false),
            record(1, &["bo", "y", "kim", "ray"], true, true),
        ]);
        let out = Categorizer::new(2).categorize(&m);

        assert_eq!(out.participant_only.len(), 1);
        assert_eq!(out.participant_only[0].key, key(&["a", "x", "sam", "lee"]));
        assert!(out.complete.iter().all(|r| r.key.parts()[0] != "a"));
        assert!(out.evaluator_only.is_empty());
    }

    #[test]
    fn test_partition_is_disjoint_and_exhaustive() {
        let m = merged(vec![
            record(0, &["a", "x", "s1", "l1"], true, false),
            record(1, &["b", "y", "s2", "l2"], true, true),
            record(2, &["c", "z", "s3", "l3"], false, true),
            record(3, &["", "z", "s3", "l3"], true, false),
            record(4, &["d", "w", "s4", "l4"], false, true),
        ]);
        let out = Categorizer::new(2).categorize(&m);

        assert_eq!(out.len(), m.len());
        let ids: HashSet<usize> = out.tagged().iter().map(|t| t.record.idx).collect();
        assert_eq!(ids.len(), m.len());
        for tagged in out.tagged() {
            assert_eq!(tagged.record.category(), tagged.category);
        }
    }

    #[test]
    fn test_reconcile_pairs_same_participant_other_evaluator() {
        let m = merged(vec![
            record(0, &["ann", "ray", "sue", "kim"], true, false),
            record(1, &["bob", "cho", "tom", "fox"], true, true),
            record(2, &["ann", "ray", "max", "lin"], false, true),
            record(3, &["ann", "ray", "joe", "day"], false, true),
        ]);
        let out = Categorizer::new(2).categorize(&m);

        assert_eq!(out.reconciled, 1);
        let idx: Vec<usize> = out.complete.iter().map(|r| r.idx).collect();
        assert_eq!(idx, vec![0, 1]);
        assert_eq!(out.complete[0].evaluator.as_ref().unwrap()[0], "e2");
        assert!(out.participant_only.is_empty());
        assert_eq!(out.evaluator_only.len(), 1);
        assert_eq!(out.evaluator_only[0].idx, 3);
    }

    #[test]
    fn test_reconcile_disabled() {
        let m = merged(vec![
            record(0, &["ann", "ray", "sue", "kim"], true, false),
            record(1, &["ann", "ray", "max", "lin"], false, true),
        ]);
        let out = Categorizer::new(0).categorize(&m);
        assert_eq!(out.reconciled, 0);
        assert_eq!(out.participant_only.len(), 1);
        assert_eq!(out.evaluator_only.len(), 1);
    }

    #[test]
    fn test_blank_name_never_reconciled() {
        let m = merged(vec![
            record(0, &["", "ray", "sue", "kim"], true, false),
            record(1, &["", "ray", "max", "lin"], false, true),
        ]);
        let out = Categorizer::new(2).categorize(&m);
        assert!(out.complete.is_empty());
    }

    #[test]
    fn test_run_writes_three_csvs() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path().join("data"), dir.path().join("reports"));
        let m = merged(vec![
            record(0, &["a", "x", "s", "l"], true, false),
            record(1, &["b", "y", "s", "l"], true, true),
            record(2, &["c", "z", "s", "l"], false, true),
        ]);

        let (_, paths) = Categorizer::new(2).run(&m, &layout).unwrap();
        assert_eq!(paths.len(), 3);

        let complete = read_table(layout.processed_path(Category::Complete)).unwrap();
        assert_eq!(
            complete.headers,
            vec![CATEGORY_COLUMN, IDX_COLUMN, "stuFirst", "ssSelf_1", "firstNameIntern", "ssSup_1"]
        );
        assert_eq!(complete.rows[0][..3], ["Complete", "1", "p1"]);

        let only_p = read_table(layout.processed_path(Category::ParticipantOnly)).unwrap();
        assert_eq!(only_p.headers, vec![CATEGORY_COLUMN, IDX_COLUMN, "stuFirst", "ssSelf_1"]);
        assert_eq!(only_p.len(), 1);

        let only_e = read_table(layout.processed_path(Category::EvaluatorOnly)).unwrap();
        assert_eq!(only_e.rows[0][0], "Evaluator only");
    }
}
