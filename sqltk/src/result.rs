use std::fmt;

use expect_test::Expect;
use itertools::Itertools;
use pretty_assertions::assert_eq;
use sqltk_session::{rows_to_strings, RecordSet};
use tabled::builder::Builder;

/// Build expected rows from lines of space separated values.
///
/// `rows(&["1 a", "2 <nil>"])` is two rows of two columns each.
pub fn rows(lines: &[&str]) -> Vec<Vec<String>> {
    lines.iter().map(|line| line.split(' ').map(str::to_owned).collect()).collect()
}

/// The rows of a query rendered as text, plus a comment describing where they came from that
/// is included in every assertion failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    fields: Vec<String>,
    rows: Vec<Vec<String>>,
    comment: String,
}

impl QueryResult {
    pub fn new(fields: Vec<String>, rows: Vec<Vec<String>>, comment: impl Into<String>) -> Self {
        Self { fields, rows, comment: comment.into() }
    }

    /// Drain and close a record set.
    ///
    /// Panics if producing a row or closing fails.
    #[track_caller]
    pub fn from_record_set<R: RecordSet>(mut rs: R, comment: impl Into<String>) -> Self {
        let comment = comment.into();
        let fields = rs.fields().iter().map(|field| field.name().to_owned()).collect();
        let rows = match rows_to_strings(&mut rs) {
            Ok(rows) => rows,
            Err(err) => panic!("{comment}: failed to read rows: {err}"),
        };
        if let Err(err) = rs.close() {
            panic!("{comment}: failed to close record set: {err}");
        }
        Self { fields, rows, comment }
    }

    #[inline]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    #[inline]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    #[inline]
    pub fn comment(&self) -> &str {
        &self.comment
    }

    #[track_caller]
    pub fn check(&self, expected: Vec<Vec<String>>) {
        assert_eq!(self.rows, expected, "{}\n{self}", self.comment);
    }

    /// Check only the given columns of each row.
    #[track_caller]
    pub fn check_at(&self, cols: &[usize], expected: Vec<Vec<String>>) {
        let actual = self
            .rows
            .iter()
            .map(|row| {
                cols.iter()
                    .map(|&col| match row.get(col) {
                        Some(value) => value.clone(),
                        None => panic!(
                            "{}: column {col} out of range for a row of {} columns",
                            self.comment,
                            row.len()
                        ),
                    })
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        assert_eq!(actual, expected, "{}\n{self}", self.comment);
    }

    /// Sort the rows, for queries whose order is unspecified.
    pub fn sort(mut self) -> Self {
        self.rows.sort();
        self
    }

    pub fn equal(&self, expected: &[Vec<String>]) -> bool {
        self.rows == expected
    }

    /// Assert some value contains `expected`.
    #[track_caller]
    pub fn check_contain(&self, expected: &str) {
        assert!(
            self.contains(expected),
            "{}: the result doesn't contain the expected `{expected}`\n{self}",
            self.comment
        );
    }

    /// Assert no value contains `unexpected`.
    #[track_caller]
    pub fn check_not_contain(&self, unexpected: &str) {
        assert!(
            !self.contains(unexpected),
            "{}: the result contains the unexpected `{unexpected}`\n{self}",
            self.comment
        );
    }

    #[track_caller]
    pub fn multi_check_contain(&self, expected: &[&str]) {
        for s in expected {
            self.check_contain(s);
        }
    }

    /// Compare against a snapshot of the rows, one line per row with values separated by spaces.
    #[track_caller]
    pub fn expect(&self, expect: Expect) {
        expect.assert_eq(&self.lines());
    }

    /// Whether any row of an `EXPLAIN` result has `plan` in its operator id.
    pub fn has_plan(&self, plan: &str) -> bool {
        self.column_contains(0, plan)
    }

    /// Whether an `EXPLAIN` result accesses `index`. Looks at both the access object column and
    /// the one after it, as `EXPLAIN ANALYZE` has an extra column before the access object.
    pub fn uses_index(&self, index: &str) -> bool {
        let needle = format!("index:{index}");
        self.column_contains(3, &needle) || self.column_contains(4, &needle)
    }

    pub(crate) fn column_contains(&self, col: usize, needle: &str) -> bool {
        self.rows.iter().any(|row| row.get(col).is_some_and(|value| value.contains(needle)))
    }

    fn contains(&self, needle: &str) -> bool {
        self.rows.iter().flatten().any(|value| value.contains(needle))
    }

    fn lines(&self) -> String {
        self.rows.iter().map(|row| format!("{}\n", row.iter().join(" "))).collect()
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = Builder::default();
        if !self.fields.is_empty() {
            builder.push_record(self.fields.iter().cloned());
        }
        for row in &self.rows {
            builder.push_record(row.iter().cloned());
        }
        write!(f, "{}", builder.build())
    }
}

#[cfg(test)]
mod tests {
    use expect_test::expect;
    use pretty_assertions::assert_eq;

    use super::*;

    fn result() -> QueryResult {
        QueryResult::new(
            vec!["id".into(), "name".into()],
            rows(&["2 bob", "1 alice", "3 <nil>"]),
            "select * from users",
        )
    }

    #[test]
    fn rows_split_on_single_spaces() {
        assert_eq!(rows(&["1 a", "2  b"]), vec![vec!["1", "a"], vec!["2", "", "b"]]);
    }

    #[test]
    fn check_and_sort() {
        let res = result();
        res.check(rows(&["2 bob", "1 alice", "3 <nil>"]));
        res.check_at(&[1], rows(&["bob", "alice", "<nil>"]));
        assert!(!res.equal(&rows(&["1 alice", "2 bob", "3 <nil>"])));

        let res = res.sort();
        assert!(res.equal(&rows(&["1 alice", "2 bob", "3 <nil>"])));
        res.expect(expect![[r#"
            1 alice
            2 bob
            3 <nil>
        "#]]);
    }

    #[test]
    #[should_panic(expected = "select * from users")]
    fn check_failure_mentions_the_comment() {
        result().check(rows(&["1 alice"]));
    }

    #[test]
    #[should_panic(expected = "column 5 out of range")]
    fn check_at_out_of_range() {
        result().check_at(&[5], rows(&["2", "1", "3"]));
    }

    #[test]
    fn contains() {
        let res = result();
        res.check_contain("lic");
        res.multi_check_contain(&["bob", "<nil>"]);
        res.check_not_contain("carol");
    }

    #[test]
    #[should_panic(expected = "doesn't contain the expected `carol`")]
    fn check_contain_failure() {
        result().check_contain("carol");
    }

    #[test]
    fn plans_and_indexes() {
        let explain = QueryResult::new(
            vec![],
            vec![
                vec!["IndexLookUp_3", "1.00", "root", "", ""],
                vec!["├─IndexRangeScan_1(Build)", "1.00", "cop[tikv]", "table:t, index:k(b)", "range:[1,1]"],
                vec!["└─TableRowIDScan_2(Probe)", "1.00", "cop[tikv]", "table:t", "keep order:false"],
            ]
            .into_iter()
            .map(|row| row.into_iter().map(String::from).collect())
            .collect(),
            "explain",
        );
        assert!(explain.has_plan("IndexRangeScan"));
        assert!(!explain.has_plan("TableFullScan"));
        assert!(explain.uses_index("k"));
        assert!(!explain.uses_index("c"));

        // `EXPLAIN ANALYZE` shifts the access object one column to the right
        let analyze = QueryResult::new(
            vec![],
            vec![vec!["IndexRangeScan_1", "1.00", "1", "cop[tikv]", "table:t, index:k(b)"]
                .into_iter()
                .map(String::from)
                .collect()],
            "explain analyze",
        );
        assert!(analyze.uses_index("k"));
    }

    #[test]
    fn displays_as_a_table() {
        let table = result().to_string();
        for value in ["id", "name", "alice", "bob", "<nil>"] {
            assert!(table.contains(value), "{table}");
        }
        assert_eq!(table.lines().filter(|line| line.contains("alice")).count(), 1);
    }
}
