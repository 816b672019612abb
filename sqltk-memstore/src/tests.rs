use expect_test::{expect, Expect};
use sqltk_core::{Datum, ErrorCode, WarnLevel};
use sqltk_session::{rows_to_strings, FallibleIterator, RecordSet, Session, Storage};
use tracing_subscriber::EnvFilter;

use crate::{MemSession, MemStore, Result};

fn session(store: &MemStore) -> MemSession {
    let filter = EnvFilter::try_from_env("SQLTK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt::fmt().with_env_filter(filter).with_test_writer().try_init();
    store.create_session().unwrap()
}

/// Executes every statement of `sql`, returning the rows of the last one that produced any.
fn run(session: &mut MemSession, sql: &str) -> Result<Vec<Vec<String>>> {
    let mut rows = vec![];
    for stmt in session.parse(sql)? {
        if let Some(mut rs) = session.execute_stmt(stmt)? {
            rows = rows_to_strings(&mut rs)?;
            rs.close()?;
        }
    }
    Ok(rows)
}

fn check_rows(session: &mut MemSession, sql: &str, expect: Expect) {
    let rows = run(session, sql).unwrap();
    let rendered = rows.iter().map(|row| row.join(" | ").trim_end().to_owned()).collect::<Vec<_>>();
    expect.assert_eq(&rendered.join("\n"));
}

fn check_err(session: &mut MemSession, sql: &str, expect: Expect) {
    let err = run(session, sql).unwrap_err();
    expect.assert_eq(&err.to_string());
}

#[test]
fn test_insert_update_delete() -> Result<()> {
    let store = MemStore::default();
    let mut s = session(&store);
    run(&mut s, "create table t (id int primary key auto_increment, v varchar(5) not null default 'x')")?;

    run(&mut s, "insert into t (v) values ('a'), ('b')")?;
    assert_eq!((s.affected_rows(), s.last_insert_id()), (2, 1));

    run(&mut s, "insert into t values (10, 'c')")?;
    assert_eq!((s.affected_rows(), s.last_insert_id()), (1, 0));

    run(&mut s, "insert into t () values ()")?;
    assert_eq!(s.last_insert_id(), 11);
    check_rows(
        &mut s,
        "select id, v from t order by id desc",
        expect![[r#"
            11 | x
            10 | c
            2 | b
            1 | a"#]],
    );
    check_rows(&mut s, "select last_insert_id()", expect![["11"]]);

    run(&mut s, "update t set v = 'z' where id > 2")?;
    assert_eq!(s.affected_rows(), 2);
    run(&mut s, "update t set v = 'z' where id > 2")?;
    assert_eq!(s.affected_rows(), 0);

    run(&mut s, "delete from t where id < 3")?;
    assert_eq!(s.affected_rows(), 2);
    check_rows(&mut s, "select * from t", expect![[r#"
        10 | z
        11 | z"#]]);
    Ok(())
}

#[test]
fn test_statements_are_atomic() -> Result<()> {
    let store = MemStore::default();
    let mut s = session(&store);
    run(&mut s, "create table u (a int, b int, unique key ua (a)); insert into u values (1, 1), (2, 2)")?;

    check_err(
        &mut s,
        "insert into u values (3, 3), (1, 4)",
        expect![["[table:1062]Duplicate entry '1' for key 'u.ua'"]],
    );
    check_err(&mut s, "update u set a = 2 where a = 1", expect![["[table:1062]Duplicate entry '2' for key 'u.ua'"]]);
    check_rows(&mut s, "select a, b from u", expect![[r#"
        1 | 1
        2 | 2"#]]);

    // NULLs never conflict
    run(&mut s, "insert into u values (null, 5), (null, 6)")?;
    assert_eq!(s.affected_rows(), 2);
    Ok(())
}

#[test]
fn test_schema_errors() -> Result<()> {
    let store = MemStore::default();
    let mut s = session(&store);
    run(&mut s, "create table t (a int, b int)")?;

    check_err(&mut s, "create table t (a int)", expect![["[schema:1050]Table 'test.t' already exists"]]);
    check_err(&mut s, "select * from nope", expect![["[schema:1146]Table 'test.nope' doesn't exist"]]);
    check_err(&mut s, "select c from t", expect![["[planner:1054]Unknown column 'c' in 'field list'"]]);
    check_err(&mut s, "select a from t where t2.a = 1", expect![["[planner:1054]Unknown column 't2.a' in 'where clause'"]]);
    check_err(&mut s, "drop table t, x, y", expect![["[schema:1051]Unknown table 'test.x,test.y'"]]);
    check_err(&mut s, "create table d (a int not null default null)", expect![["[schema:1067]Invalid default value for 'a'"]]);
    check_err(&mut s, "create index a on t (z)", expect![["[schema:1072]Key column 'z' doesn't exist in table"]]);
    check_err(&mut s, "select * from t use index (nope)", expect![["[planner:1176]Key 'nope' doesn't exist in table 't'"]]);
    check_err(&mut s, "select *", expect![["[planner:1096]No tables used"]]);
    check_err(&mut s, "select nope(1)", expect![["[expression:1305]FUNCTION test.nope does not exist"]]);
    check_err(&mut s, "explain create table x (a int)", expect![["[planner:1235]This version of MySQL doesn't yet support 'EXPLAIN CREATE TABLE'"]]);

    // the failed drop removed nothing
    run(&mut s, "create table if not exists t (a int)")?;
    check_rows(&mut s, "show warnings", expect![["Note | 1050 | Table 'test.t' already exists"]]);
    run(&mut s, "drop table if exists t, x")?;
    check_rows(&mut s, "show warnings", expect![["Note | 1051 | Unknown table 'test.x'"]]);
    check_rows(&mut s, "show tables", expect![[""]]);
    Ok(())
}

#[test]
fn test_indexes_and_truncate() -> Result<()> {
    let store = MemStore::default();
    let mut s = session(&store);
    run(&mut s, "create table t (id int primary key auto_increment, a int, b int); insert into t (a, b) values (1, 1), (2, 1)")?;

    check_err(&mut s, "create unique index ub on t (b)", expect![["[table:1062]Duplicate entry '1' for key 't.ub'"]]);
    run(&mut s, "create unique index ua on t (a)")?;
    check_err(&mut s, "insert into t (a, b) values (1, 3)", expect![["[table:1062]Duplicate entry '1' for key 't.ua'"]]);
    run(&mut s, "drop index ua on t; insert into t (a, b) values (1, 3)")?;
    check_err(&mut s, "drop index ua on t", expect![["[schema:1091]Can't DROP 'ua'; check that column/key exists"]]);

    run(&mut s, "delete from t where b > 0 limit 2")?;
    assert_eq!(s.affected_rows(), 2);
    check_rows(&mut s, "select id, a, b from t", expect![["3 | 1 | 3"]]);

    // truncating resets the auto increment counter
    run(&mut s, "truncate table t; insert into t (a) values (5)")?;
    assert_eq!(s.last_insert_id(), 1);
    check_rows(&mut s, "select id, a, b from t", expect![["1 | 5 | <nil>"]]);
    Ok(())
}

#[test]
fn test_unsupported_statements() -> Result<()> {
    let store = MemStore::default();
    let mut s = session(&store);
    run(&mut s, "create table t (a int); create table u (a int)")?;

    check_err(&mut s, "select * from t join u", expect![["[planner:1235]This version of MySQL doesn't yet support 'JOIN'"]]);
    check_err(&mut s, "select a from t group by a", expect![["[planner:1235]This version of MySQL doesn't yet support 'GROUP BY'"]]);
    check_err(&mut s, "create table d (a date)", expect![["[planner:1235]This version of MySQL doesn't yet support 'type DATE'"]]);
    check_err(
        &mut s,
        "update t set a = 1 limit 1",
        expect![["[parser:1064]You have an error in your SQL syntax; check the manual that corresponds to your MySQL server version for the right syntax to use near 'limit 1' at line 1"]],
    );
    Ok(())
}

#[test]
fn test_strict_mode() -> Result<()> {
    let store = MemStore::default();
    let mut s = session(&store);
    run(&mut s, "create table n (a int unsigned, b varchar(3), c int not null)")?;

    check_err(&mut s, "insert into n values (-1, 'x', 1)", expect![["[types:1264]Out of range value for column 'a' at row 1"]]);
    check_err(&mut s, "insert into n values (1, 'long', 1)", expect![["[types:1406]Data too long for column 'b' at row 1"]]);
    check_err(&mut s, "insert into n (a) values (1)", expect![["[table:1364]Field 'c' doesn't have a default value"]]);
    check_err(&mut s, "insert into n values (1, 'x', null)", expect![["[table:1048]Column 'c' cannot be null"]]);
    check_err(&mut s, "insert into n values (1, 'x')", expect![["[planner:1136]Column count doesn't match value count at row 1"]]);
    check_err(&mut s, "insert into n values (1 / 0, 'x', 1)", expect![["[expression:1365]Division by 0"]]);

    run(&mut s, "set sql_mode = ''")?;
    run(&mut s, "insert into n values (-1, 'long', 1)")?;
    check_rows(&mut s, "show warnings", expect![[r#"
        Warning | 1264 | Out of range value for column 'a' at row 1
        Warning | 1265 | Data truncated for column 'b' at row 1"#]]);
    check_rows(&mut s, "select * from n", expect![["0 | lon | 1"]]);
    Ok(())
}

#[test]
fn test_query_expressions() -> Result<()> {
    let store = MemStore::default();
    let mut s = session(&store);
    check_rows(&mut s, "select 1, 1 / 2, 'a', null, concat('a', 1), ifnull(null, 2), abs(-3)", expect![[
        "1 | 0.5 | a | <nil> | a1 | 2 | 3"
    ]]);

    check_rows(&mut s, "select 1 / 0", expect![["<nil>"]]);
    let warnings = s.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].level, WarnLevel::Warning);
    assert_eq!(warnings[0].error.code(), ErrorCode::DIVISION_BY_ZERO);

    run(&mut s, "create table o (a int, b varchar(10)); insert into o values (2, 'x'), (1, 'y'), (3, null)")?;
    check_rows(&mut s, "select b as c from o order by c", expect![[r#"
        <nil>
        x
        y"#]]);
    check_rows(&mut s, "select a, b from o order by 1 desc limit 1, 2", expect![[r#"
        2 | x
        1 | y"#]]);
    check_rows(&mut s, "select a from o where b is null or a > 2", expect![["3"]]);
    Ok(())
}

#[test]
fn test_errors_surface_while_streaming() -> Result<()> {
    let store = MemStore::default();
    let mut s = session(&store);
    run(&mut s, "create table big (a bigint); insert into big values (1), (9223372036854775807)")?;

    let stmt = s.parse("select a + 1 from big")?.remove(0);
    let mut rs = s.execute_stmt(stmt)?.expect("select returns rows");
    assert_eq!(rs.fields()[0].name(), "a + 1");
    assert_eq!(rs.next()?, Some(vec![Datum::Int(2)]));
    let err = rs.next().unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::DATA_OUT_OF_RANGE));
    assert_eq!(err.to_string(), "[types:1690]BIGINT value is out of range in '(test.big.a + 1)'");
    Ok(())
}

#[test]
fn test_explain() -> Result<()> {
    let store = MemStore::default();
    let mut s = session(&store);
    run(&mut s, "create table t (a int primary key, b int, c varchar(10), key idx_b (b))")?;

    check_rows(&mut s, "explain select * from t where a = 1", expect![[
        "Point_Get_1 | 1.00 | root | table:t | handle:1"
    ]]);
    check_rows(&mut s, "explain select * from t where b = 2", expect![[r#"
        IndexLookUp_3 | 10.00 | root |  |
        ├─IndexRangeScan_1(Build) | 10.00 | cop[tikv] | table:t, index:idx_b(b) | range:[2,2], keep order:false, stats:pseudo
        └─TableRowIDScan_2(Probe) | 10.00 | cop[tikv] | table:t | keep order:false, stats:pseudo"#]]);
    check_rows(&mut s, "explain select a + 1 from t where c = 'x' order by a limit 3", expect![[r#"
        Projection_5 | 3.00 | root |  | plus(test.t.a, 1)->Column#4
        └─TopN_4 | 3.00 | root |  | test.t.a, offset:0, count:3
          └─TableReader_3 | 10.00 | root |  | data:Selection_2
            └─Selection_2 | 10.00 | cop[tikv] |  | eq(test.t.c, "x")
              └─TableFullScan_1 | 10000.00 | cop[tikv] | table:t | keep order:false, stats:pseudo"#]]);
    check_rows(&mut s, "explain select * from t ignore index (idx_b) where b = 2", expect![[r#"
        TableReader_3 | 10.00 | root |  | data:Selection_2
        └─Selection_2 | 10.00 | cop[tikv] |  | eq(test.t.b, 2)
          └─TableFullScan_1 | 10000.00 | cop[tikv] | table:t | keep order:false, stats:pseudo"#]]);
    check_rows(&mut s, "explain delete from t where a > 5", expect![[r#"
        Delete_3 | N/A | root |  | N/A
        └─TableReader_2 | 3333.33 | root |  | data:TableRangeScan_1
          └─TableRangeScan_1 | 3333.33 | cop[tikv] | table:t | range:(5,+inf], keep order:false, stats:pseudo"#]]);
    check_rows(&mut s, "explain select 1", expect![[r#"
        Projection_2 | 1.00 | root |  | 1->Column#1
        └─TableDual_1 | 1.00 | root |  | rows:1"#]]);
    Ok(())
}

#[test]
fn test_explain_analyze() -> Result<()> {
    let store = MemStore::default();
    let mut s = session(&store);
    run(&mut s, "create table t (a int primary key, b int, key idx_b (b)); insert into t values (1, 2), (2, 2), (3, 3)")?;

    let rows = run(&mut s, "explain analyze select * from t where b = 2")?;
    let counts = rows.iter().map(|row| (row[0].as_str(), row[2].as_str())).collect::<Vec<_>>();
    assert_eq!(
        counts,
        vec![("IndexLookUp_3", "2"), ("├─IndexRangeScan_1(Build)", "2"), ("└─TableRowIDScan_2(Probe)", "2")]
    );
    assert!(rows.iter().all(|row| row.len() == 9 && row[5].starts_with("time:")));

    // analyze executes the statement
    run(&mut s, "explain analyze delete from t where a = 1")?;
    assert_eq!(s.affected_rows(), 1);
    check_rows(&mut s, "select a from t", expect![[r#"
        2
        3"#]]);
    Ok(())
}

#[test]
fn test_prepared_statements() -> Result<()> {
    let store = MemStore::default();
    let mut s = session(&store);
    run(&mut s, "create table t (a int, b varchar(10)); insert into t values (1, 'a'), (2, 'b'), (3, 'c')")?;

    let prepared = s.prepare_stmt("select b from t where a > ? limit ?")?;
    assert_eq!(prepared.param_count, 2);
    assert_eq!(s.prepared_stmt_count(), 1);

    let mut rs = s.execute_prepared_stmt(prepared.id, &[Datum::from(1), Datum::from(1)])?.expect("rows");
    assert_eq!(rows_to_strings(&mut rs)?, vec![vec!["b"]]);
    drop(rs);

    let err = s.execute_prepared_stmt(prepared.id, &[Datum::from(1)]).unwrap_err();
    assert_eq!(err.to_string(), "[session:1210]Incorrect arguments to EXECUTE");

    s.drop_prepared_stmt(prepared.id)?;
    assert_eq!(s.prepared_stmt_count(), 0);
    let err = s.execute_prepared_stmt(prepared.id, &[]).unwrap_err();
    assert_eq!(err.to_string(), "[session:1243]Unknown prepared statement handler (1) given to EXECUTE");
    assert_eq!(s.drop_prepared_stmt(prepared.id).unwrap_err().code(), Some(ErrorCode::UNKNOWN_STMT_HANDLER));

    // ids are not reused
    assert_eq!(s.prepare_stmt("select 1")?.id.get(), 2);
    Ok(())
}

#[test]
fn test_record_sets_release_cursors() -> Result<()> {
    let store = MemStore::default();
    let mut s = session(&store);

    let stmt = s.parse("select 1")?.remove(0);
    let mut rs = s.execute_stmt(stmt)?.expect("rows");
    assert_eq!(s.open_record_sets(), 1);
    rs.close()?;
    rs.close()?;
    assert_eq!(s.open_record_sets(), 0);
    assert_eq!(rs.next()?, None);

    let stmt = s.parse("select 1")?.remove(0);
    let rs = s.execute_stmt(stmt)?;
    assert_eq!(s.open_record_sets(), 1);
    expect![[r#"Some(MemRecordSet { fields: [Field { name: "1" }], remaining: 1, closed: false, .. })"#]]
        .assert_eq(&format!("{rs:?}"));
    drop(rs);
    assert_eq!(s.open_record_sets(), 0);
    Ok(())
}

#[test]
fn test_system_variables() -> Result<()> {
    let store = MemStore::default();
    let mut s = session(&store);
    run(&mut s, "create table t (a int); insert into t values (1), (2), (3)")?;

    run(&mut s, "set @@session.sql_select_limit = 1")?;
    check_rows(&mut s, "select a from t", expect![["1"]]);
    check_rows(&mut s, "select a from t limit 2", expect![[r#"
        1
        2"#]]);
    check_rows(&mut s, "select @@sql_select_limit", expect![["1"]]);

    run(&mut s, "set global autocommit = OFF")?;
    check_rows(&mut s, "select @@autocommit, @@global.autocommit", expect![["1 | 0"]]);
    let mut other = session(&store);
    check_rows(&mut other, "select @@autocommit", expect![["0"]]);

    check_err(&mut s, "set nope = 1", expect![["[variable:1193]Unknown system variable 'nope'"]]);
    check_err(&mut s, "set sql_select_limit = 'x'", expect![["[variable:1231]Variable 'sql_select_limit' can't be set to the value of 'x'"]]);
    Ok(())
}

#[test]
fn test_connection_id() {
    let store = MemStore::default();
    let mut s = session(&store);
    s.set_connection_id(42);
    check_rows(&mut s, "select connection_id()", expect![["42"]]);
}
