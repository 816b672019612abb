//! Access path selection and the operator trees shown by `EXPLAIN`.
//!
//! Rows are always produced by scanning the table, the chosen path only determines the plan that
//! is reported. Estimates are pseudo statistics derived from a fixed table size.

use std::fmt;
use std::time::Duration;

use itertools::Itertools;
use sqltk_core::Datum;
use sqltk_parse::{HintKind, IndexHint};
use sqltk_session::Row;

use crate::catalog::Table;
use crate::eval::{BoundExpr, Evaluator};
use crate::ir::BinaryOp;
use crate::{errors, Result};

/// Row count assumed for every table.
const PSEUDO_ROWS: f64 = 10000.0;

const EQ_SELECTIVITY: f64 = 0.001;
const RANGE_SELECTIVITY: f64 = 1.0 / 3.0;
const DEFAULT_SELECTIVITY: f64 = 0.8;

const KEEP_ORDER: &str = "keep order:false, stats:pseudo";

fn explain_datum(datum: &Datum) -> String {
    match datum {
        Datum::Null => "NULL".to_owned(),
        Datum::Text(s) => format!("\"{s}\""),
        datum => datum.to_string(),
    }
}

/// A range over the columns of a key, rendered like `[1 2,1 +inf]`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct KeyRange {
    low: Vec<String>,
    low_open: bool,
    high: Vec<String>,
    high_open: bool,
}

impl fmt::Display for KeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{},{}{}",
            if self.low_open { "(" } else { "[" },
            self.low.join(" "),
            self.high.join(" "),
            if self.high_open { ")" } else { "]" },
        )
    }
}

impl KeyRange {
    fn new(prefix: &[Datum], conds: &[&ColumnCond]) -> Self {
        let prefix = prefix.iter().map(explain_datum).collect::<Vec<_>>();
        let mut range = KeyRange { low: prefix.clone(), low_open: false, high: prefix, high_open: false };
        if conds.is_empty() {
            return range;
        }

        let mut low: Option<(&Datum, bool)> = None;
        let mut high: Option<(&Datum, bool)> = None;
        for cond in conds {
            match cond.op {
                BinaryOp::Gt | BinaryOp::GtEq => {
                    let open = cond.op == BinaryOp::Gt;
                    let tighter = low.map_or(true, |(value, _)| cond.value.sort_cmp(value).is_gt());
                    if tighter {
                        low = Some((&cond.value, open));
                    }
                }
                _ => {
                    let open = cond.op == BinaryOp::Lt;
                    let tighter = high.map_or(true, |(value, _)| cond.value.sort_cmp(value).is_lt());
                    if tighter {
                        high = Some((&cond.value, open));
                    }
                }
            }
        }

        match low {
            Some((value, open)) => {
                range.low.push(explain_datum(value));
                range.low_open = open;
            }
            None => range.low.push("-inf".to_owned()),
        }
        match high {
            Some((value, open)) => {
                range.high.push(explain_datum(value));
                range.high_open = open;
            }
            None => range.high.push("+inf".to_owned()),
        }
        range
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AccessPath {
    /// No table, a single empty row
    Dual,
    TableFullScan,
    /// Range over the clustered integer primary key
    TableRangeScan(KeyRange),
    /// A single row by its clustered primary key (`index` is `None`) or by a unique index
    PointGet { index: Option<usize>, key: Vec<Datum> },
    /// Index range scan followed by a row lookup. A `None` range scans the whole index.
    IndexLookUp { index: usize, range: Option<KeyRange> },
}

/// The access path chosen for a table and how the filter was split over it.
#[derive(Debug, Clone)]
pub(crate) struct Access {
    pub path: AccessPath,
    /// Conditions answered by the access path itself
    pub access_conds: Vec<BoundExpr>,
    /// Conditions evaluated on the rows the access path produces
    pub filter: Vec<BoundExpr>,
    est_access: f64,
}

impl Access {
    pub fn dual(filter: Vec<BoundExpr>) -> Self {
        Access { path: AccessPath::Dual, access_conds: vec![], filter, est_access: 1.0 }
    }

    fn est_filtered(&self) -> f64 {
        self.filter.iter().fold(self.est_access, |est, cond| est * selectivity(cond))
    }
}

fn selectivity(cond: &BoundExpr) -> f64 {
    match cond {
        BoundExpr::Binary { op: BinaryOp::Eq, .. } => EQ_SELECTIVITY,
        BoundExpr::Binary { op, .. } if op.is_comparison() => RANGE_SELECTIVITY,
        _ => DEFAULT_SELECTIVITY,
    }
}

/// A `column <op> constant` conjunct.
#[derive(Debug)]
struct ColumnCond {
    column: usize,
    op: BinaryOp,
    value: Datum,
    conjunct: usize,
}

impl ColumnCond {
    fn extract(conjunct: usize, expr: &BoundExpr) -> Option<Self> {
        let BoundExpr::Binary { op, lhs, rhs } = expr else { return None };
        if !op.is_comparison() || *op == BinaryOp::NotEq {
            return None;
        }
        let (column, op, constant) = match (&**lhs, &**rhs) {
            (BoundExpr::Column { index, .. }, constant) if constant.is_constant() => (*index, *op, constant),
            (constant, BoundExpr::Column { index, .. }) if constant.is_constant() => {
                (*index, op.flip(), constant)
            }
            _ => return None,
        };
        // conditions whose constant fails to evaluate are left to the filter
        let value = Evaluator::new(false).eval(constant, &[]).ok()?;
        if value.is_null() {
            return None;
        }
        Some(ColumnCond { column, op, value, conjunct })
    }

    #[inline]
    fn is_range(&self) -> bool {
        matches!(self.op, BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq)
    }
}

struct Candidate {
    path: AccessPath,
    used: Vec<usize>,
    score: usize,
    est: f64,
}

fn hinted_indexes(table: &Table, hint: &IndexHint) -> Result<Vec<usize>> {
    hint.indexes
        .iter()
        .map(|name| {
            table
                .indexes
                .iter()
                .position(|index| &index.name == name)
                .ok_or_else(|| errors::key_does_not_exist(name, &table.name).into())
        })
        .collect()
}

/// Chooses how to read `table` given the conjuncts of the filter and the index hints.
pub(crate) fn plan_access(table: &Table, hints: &[IndexHint], conjuncts: Vec<BoundExpr>) -> Result<Access> {
    let mut forced: Option<Vec<usize>> = None;
    let mut ignored = vec![];
    for hint in hints {
        let indexes = hinted_indexes(table, hint)?;
        match hint.kind {
            HintKind::Use => forced.get_or_insert_with(Vec::new).extend(indexes),
            HintKind::Ignore => ignored.extend(indexes),
        }
    }

    let candidates = match &forced {
        Some(forced) => forced.iter().copied().unique().collect::<Vec<_>>(),
        None => (0..table.indexes.len()).collect(),
    };
    let candidates = candidates.into_iter().filter(|i| !ignored.contains(i)).collect::<Vec<_>>();

    let conds = conjuncts
        .iter()
        .enumerate()
        .filter_map(|(i, expr)| ColumnCond::extract(i, expr))
        .collect::<Vec<_>>();

    let mut best: Option<Candidate> = None;
    for &pos in &candidates {
        let Some(candidate) = index_candidate(table, pos, &conds) else { continue };
        if best.as_ref().map_or(true, |best| candidate.score > best.score) {
            best = Some(candidate);
        }
    }

    let best = match best {
        Some(best) => best,
        // an index that is forced but matches no condition is scanned in full
        None => match (forced.is_some(), candidates.first()) {
            (true, Some(&pos)) if !is_clustered(table, pos) => Candidate {
                path: AccessPath::IndexLookUp { index: pos, range: None },
                used: vec![],
                score: 0,
                est: PSEUDO_ROWS,
            },
            _ => Candidate { path: AccessPath::TableFullScan, used: vec![], score: 0, est: PSEUDO_ROWS },
        },
    };

    let (access_conds, filter) = conjuncts
        .into_iter()
        .enumerate()
        .partition::<Vec<_>, _>(|(i, _)| best.used.contains(i));
    Ok(Access {
        path: best.path,
        access_conds: access_conds.into_iter().map(|(_, expr)| expr).collect(),
        filter: filter.into_iter().map(|(_, expr)| expr).collect(),
        est_access: best.est,
    })
}

fn is_clustered(table: &Table, pos: usize) -> bool {
    let index = &table.indexes[pos];
    index.is_primary() && table.handle_column().is_some()
}

fn index_candidate(table: &Table, pos: usize, conds: &[ColumnCond]) -> Option<Candidate> {
    let index = &table.indexes[pos];
    let eq_on = |column: usize| conds.iter().find(|c| c.column == column && c.op == BinaryOp::Eq);
    let ranges_on =
        |column: usize| conds.iter().filter(|c| c.column == column && c.is_range()).collect::<Vec<_>>();

    if is_clustered(table, pos) {
        let column = index.columns[0];
        if let Some(eq) = eq_on(column) {
            return Some(Candidate {
                path: AccessPath::PointGet { index: None, key: vec![eq.value.clone()] },
                used: vec![eq.conjunct],
                score: usize::MAX,
                est: 1.0,
            });
        }
        let ranges = ranges_on(column);
        if ranges.is_empty() {
            return None;
        }
        return Some(Candidate {
            path: AccessPath::TableRangeScan(KeyRange::new(&[], &ranges)),
            used: ranges.iter().map(|c| c.conjunct).collect(),
            score: 1,
            est: PSEUDO_ROWS * RANGE_SELECTIVITY,
        });
    }

    let mut prefix = vec![];
    let mut used = vec![];
    for &column in &index.columns {
        let Some(eq) = eq_on(column) else { break };
        prefix.push(eq.value.clone());
        used.push(eq.conjunct);
    }

    if index.unique && prefix.len() == index.columns.len() {
        return Some(Candidate {
            path: AccessPath::PointGet { index: Some(pos), key: prefix },
            used,
            score: usize::MAX - 1,
            est: 1.0,
        });
    }

    let ranges = index.columns.get(prefix.len()).map(|&column| ranges_on(column)).unwrap_or_default();
    if prefix.is_empty() && ranges.is_empty() {
        return None;
    }

    let mut est = PSEUDO_ROWS * EQ_SELECTIVITY.powi(prefix.len() as i32);
    if !ranges.is_empty() {
        est *= RANGE_SELECTIVITY;
    }
    used.extend(ranges.iter().map(|c| c.conjunct));
    Some(Candidate {
        score: prefix.len() * 2 + usize::from(!ranges.is_empty()),
        path: AccessPath::IndexLookUp { index: pos, range: Some(KeyRange::new(&prefix, &ranges)) },
        used,
        est,
    })
}

/// Which of the execution counters a node reports as its actual row count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    /// Every row of the table
    Table,
    /// Rows satisfying the access conditions
    Access,
    /// Rows satisfying the whole filter
    Matched,
    /// Rows returned
    Output,
    Nothing,
}

/// Row counts observed while executing a statement for `EXPLAIN ANALYZE`.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ExecStats {
    pub table: usize,
    pub access: usize,
    pub matched: usize,
    pub output: usize,
}

impl ExecStats {
    fn get(&self, stage: Stage) -> usize {
        match stage {
            Stage::Table => self.table,
            Stage::Access => self.access,
            Stage::Matched => self.matched,
            Stage::Output => self.output,
            Stage::Nothing => 0,
        }
    }
}

#[derive(Debug)]
pub(crate) struct PlanNode {
    id: String,
    label: &'static str,
    est_rows: Option<f64>,
    stage: Stage,
    task: &'static str,
    access_object: String,
    operator_info: String,
    children: Vec<PlanNode>,
}

#[derive(Default)]
struct IdGen(usize);

impl IdGen {
    fn node(&mut self, op: &str, task: &'static str, est_rows: Option<f64>, stage: Stage) -> PlanNode {
        self.0 += 1;
        PlanNode {
            id: format!("{op}_{}", self.0),
            label: "",
            est_rows,
            stage,
            task,
            access_object: String::new(),
            operator_info: String::new(),
            children: vec![],
        }
    }
}

impl PlanNode {
    fn object(mut self, access_object: String) -> Self {
        self.access_object = access_object;
        self
    }

    fn info(mut self, operator_info: String) -> Self {
        self.operator_info = operator_info;
        self
    }

    fn child(mut self, child: PlanNode) -> Self {
        self.children.push(child);
        self
    }

    fn label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }
}

/// The parts of a single table query that show up in its plan.
pub(crate) struct QueryShape<'a> {
    pub table: Option<&'a Table>,
    pub access: &'a Access,
    pub order_by: &'a [(BoundExpr, bool)],
    /// `(offset, count)` of an explicit `LIMIT`
    pub limit: Option<(u64, u64)>,
    /// `None` for a plain `SELECT *`
    pub projection: Option<&'a [BoundExpr]>,
}

fn index_object(table: &Table, pos: usize) -> String {
    let index = &table.indexes[pos];
    let columns = index.columns.iter().map(|&c| &table.columns[c].name).join(", ");
    format!("table:{}, index:{}({columns})", table.name, index.name)
}

fn conds_info(conds: &[BoundExpr]) -> String {
    conds.iter().map(BoundExpr::explain).join(", ")
}

fn data_source(ids: &mut IdGen, table: Option<&Table>, access: &Access) -> PlanNode {
    let est_filtered = access.est_filtered();
    let Some(table) = table else {
        let dual = ids.node("TableDual", "root", Some(1.0), Stage::Access).info("rows:1".into());
        if access.filter.is_empty() {
            return dual;
        }
        return ids
            .node("Selection", "root", Some(est_filtered), Stage::Matched)
            .info(conds_info(&access.filter))
            .child(dual);
    };
    let table_object = format!("table:{}", table.name);

    match &access.path {
        AccessPath::Dual | AccessPath::TableFullScan | AccessPath::TableRangeScan(_) => {
            let scan = match &access.path {
                AccessPath::TableRangeScan(range) => ids
                    .node("TableRangeScan", "cop[tikv]", Some(access.est_access), Stage::Access)
                    .info(format!("range:{range}, {KEEP_ORDER}")),
                _ => ids
                    .node("TableFullScan", "cop[tikv]", Some(PSEUDO_ROWS), Stage::Table)
                    .info(KEEP_ORDER.into()),
            }
            .object(table_object);

            let top = if access.filter.is_empty() {
                scan
            } else {
                ids.node("Selection", "cop[tikv]", Some(est_filtered), Stage::Matched)
                    .info(conds_info(&access.filter))
                    .child(scan)
            };
            let info = format!("data:{}", top.id);
            ids.node("TableReader", "root", Some(est_filtered), Stage::Matched).info(info).child(top)
        }
        AccessPath::PointGet { index, key } => {
            let get = ids.node("Point_Get", "root", Some(1.0), Stage::Access);
            let get = match index {
                None => get
                    .object(table_object)
                    .info(format!("handle:{}", key.iter().map(explain_datum).join(", "))),
                Some(pos) => get.object(index_object(table, *pos)),
            };
            if access.filter.is_empty() {
                return get;
            }
            ids.node("Selection", "root", Some(est_filtered.min(1.0)), Stage::Matched)
                .info(conds_info(&access.filter))
                .child(get)
        }
        AccessPath::IndexLookUp { index, range } => {
            let (op, info) = match range {
                Some(range) => ("IndexRangeScan", format!("range:{range}, {KEEP_ORDER}")),
                None => ("IndexFullScan", KEEP_ORDER.to_owned()),
            };
            let build = ids
                .node(op, "cop[tikv]", Some(access.est_access), Stage::Access)
                .object(index_object(table, *index))
                .info(info)
                .label("(Build)");

            let rowid = ids
                .node("TableRowIDScan", "cop[tikv]", Some(access.est_access), Stage::Access)
                .object(table_object)
                .info(KEEP_ORDER.into());
            let lookup = if access.filter.is_empty() {
                rowid
            } else {
                ids.node("Selection", "cop[tikv]", Some(est_filtered), Stage::Matched)
                    .info(conds_info(&access.filter))
                    .child(rowid)
            }
            .label("(Probe)");

            ids.node("IndexLookUp", "root", Some(est_filtered), Stage::Matched).child(build).child(lookup)
        }
    }
}

fn order_info(order_by: &[(BoundExpr, bool)]) -> String {
    order_by
        .iter()
        .map(|(expr, desc)| if *desc { format!("{}:desc", expr.explain()) } else { expr.explain() })
        .join(", ")
}

/// The operator tree of a query.
pub(crate) fn query_plan(shape: &QueryShape<'_>) -> PlanNode {
    let mut ids = IdGen::default();
    let mut top = data_source(&mut ids, shape.table, shape.access);
    let mut est = top.est_rows.unwrap_or(PSEUDO_ROWS);

    match (shape.order_by.is_empty(), shape.limit) {
        (false, Some((offset, count))) => {
            est = est.min(count as f64);
            let info = format!("{}, offset:{offset}, count:{count}", order_info(shape.order_by));
            top = ids.node("TopN", "root", Some(est), Stage::Output).info(info).child(top);
        }
        (false, None) => {
            let info = order_info(shape.order_by);
            top = ids.node("Sort", "root", Some(est), Stage::Matched).info(info).child(top);
        }
        (true, Some((offset, count))) => {
            est = est.min(count as f64);
            let info = format!("offset:{offset}, count:{count}");
            top = ids.node("Limit", "root", Some(est), Stage::Output).info(info).child(top);
        }
        (true, None) => {}
    }

    if let Some(projection) = shape.projection {
        let mut column_id = shape.table.map_or(0, |t| t.columns.len());
        let info = projection
            .iter()
            .map(|expr| match expr {
                BoundExpr::Column { .. } => expr.explain(),
                _ => {
                    column_id += 1;
                    format!("{}->Column#{column_id}", expr.explain())
                }
            })
            .join(", ");
        top = ids.node("Projection", "root", Some(est), Stage::Output).info(info).child(top);
    }
    top
}

/// The operator tree of a DML statement, `source` is the plan of the rows it reads.
pub(crate) fn dml_plan(op: &str, source: Option<PlanNode>) -> PlanNode {
    let mut ids = IdGen(source.as_ref().map_or(0, max_id));
    let node = ids.node(op, "root", None, Stage::Nothing).info("N/A".into());
    match source {
        Some(source) => node.child(source),
        None => node,
    }
}

fn max_id(node: &PlanNode) -> usize {
    let own = node.id.rsplit('_').next().and_then(|id| id.parse().ok()).unwrap_or(0);
    node.children.iter().map(max_id).fold(own, usize::max)
}

pub(crate) const EXPLAIN_FIELDS: &[&str] = &["id", "estRows", "task", "access object", "operator info"];

pub(crate) const EXPLAIN_ANALYZE_FIELDS: &[&str] = &[
    "id",
    "estRows",
    "actRows",
    "task",
    "access object",
    "execution info",
    "operator info",
    "memory",
    "disk",
];

/// Renders the tree one operator per row, children indented under their parent.
/// With `analyze`, the observed row counts and the elapsed time are included.
pub(crate) fn explain_rows(root: &PlanNode, analyze: Option<(&ExecStats, Duration)>) -> Vec<Row> {
    let mut rows = vec![];
    walk(root, "", None, analyze, &mut rows);
    rows
}

fn walk(
    node: &PlanNode,
    prefix: &str,
    last: Option<bool>,
    analyze: Option<(&ExecStats, Duration)>,
    rows: &mut Vec<Row>,
) {
    let (id, child_prefix) = match last {
        None => (format!("{}{}", node.id, node.label), String::new()),
        Some(last) => (
            format!("{prefix}{}{}{}", if last { "└─" } else { "├─" }, node.id, node.label),
            format!("{prefix}{}", if last { "  " } else { "│ " }),
        ),
    };
    let est_rows = node.est_rows.map_or_else(|| "N/A".to_owned(), |est| format!("{est:.2}"));

    let row = match analyze {
        None => vec![
            Datum::Text(id),
            Datum::Text(est_rows),
            Datum::from(node.task),
            Datum::Text(node.access_object.clone()),
            Datum::Text(node.operator_info.clone()),
        ],
        Some((stats, elapsed)) => {
            let act_rows = stats.get(node.stage);
            let loops = if act_rows > 0 { 2 } else { 1 };
            vec![
                Datum::Text(id),
                Datum::Text(est_rows),
                Datum::from(act_rows),
                Datum::from(node.task),
                Datum::Text(node.access_object.clone()),
                Datum::Text(format!("time:{elapsed:?}, loops:{loops}")),
                Datum::Text(node.operator_info.clone()),
                Datum::from("N/A"),
                Datum::from("N/A"),
            ]
        }
    };
    rows.push(row);

    for (i, child) in node.children.iter().enumerate() {
        let last = i + 1 == node.children.len();
        walk(child, &child_prefix, Some(last), analyze, rows);
    }
}
