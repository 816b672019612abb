use expect_test::expect;
use sqltk::{args, rows, ErrorCode, Session, TestContext, TestKit, WarnLevel};

#[test]
fn test_batch_returns_the_first_record_set() {
    let ctx = TestContext::mock();
    let mut tk = TestKit::new(&ctx);
    tk.must_exec("create table t (a int)");

    let rs = tk.exec("select 1; insert into t values (1); select 2").unwrap().expect("rows");
    // the last statement's record set was closed by the kit
    assert_eq!(tk.session().open_record_sets(), 1);
    tk.result_set_to_result(rs, "batch").check(rows(&["1"]));
    assert_eq!(tk.session().open_record_sets(), 0);

    tk.must_query("select a from t").check(rows(&["1"]));
}

#[test]
fn test_batch_stops_at_the_first_failure() {
    let ctx = TestContext::mock();
    let mut tk = TestKit::new(&ctx);
    tk.must_exec("create table t (a int); insert into t values (1)");

    let err = tk.exec_to_err("insert into t values (2); select * from nope; insert into t values (3)").unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::NO_SUCH_TABLE));
    assert_eq!(err.sql(), "insert into t values (2); select * from nope; insert into t values (3)");

    // the failure is recorded as an error level warning
    tk.must_query("show warnings").expect(expect![[r#"
        Error 1146 Table 'test.nope' doesn't exist
    "#]]);
    tk.must_query("select a from t order by a").check(rows(&["1", "2"]));

    // nothing runs when the batch does not parse
    let err = tk.exec_to_err("insert into t values (4); selec 1").unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::PARSE));
    tk.must_query("select a from t order by a").check(rows(&["1", "2"]));
}

#[test]
fn test_parser_warnings_survive_execution() {
    let ctx = TestContext::mock();
    let mut tk = TestKit::new(&ctx);
    tk.must_exec("create table w (a int(11))");

    let warnings = tk.session().warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].level, WarnLevel::Warning);
    assert_eq!(warnings[0].error.code(), ErrorCode::DEPRECATED_SYNTAX_NO_REPLACEMENT);

    tk.must_exec("insert into w values (1)");
    assert!(tk.session().warnings().is_empty());
}

#[test]
fn test_args_use_prepared_statements() {
    let ctx = TestContext::mock();
    let mut tk = TestKit::new(&ctx);

    assert_eq!(tk.must_query_with("select ?", &args![1]).rows(), tk.must_query("select 1").rows());
    tk.must_query_with("select ?, ?, ?", &args!["a", None::<i64>, 1.5]).check(rows(&["a <nil> 1.5"]));
    assert_eq!(tk.session().prepared_stmt_count(), 0);

    tk.must_exec("create table t (a int, b varchar(10))");
    tk.must_exec_with("insert into t values (?, ?), (?, ?)", &args![1, "x", 2, "y"]);
    tk.must_query_with("select b from t where a > ?", &args![1]).check(rows(&["y"]));

    // the statement is deallocated when execution fails too
    let err = tk.exec_to_err_with("select ? from nope", &args![1]).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::NO_SUCH_TABLE));
    let err = tk.exec_to_err_with("select ?, ?", &args![1]).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::WRONG_ARGUMENTS));
    assert_eq!(tk.session().prepared_stmt_count(), 0);
}

#[test]
fn test_streaming_errors() {
    let ctx = TestContext::mock();
    let mut tk = TestKit::new(&ctx);
    tk.must_exec("create table big (a bigint); insert into big values (1), (9223372036854775807)");

    let err = tk.query_to_err("select a + 1 from big").unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::DATA_OUT_OF_RANGE));
    assert_eq!(err.to_string(), "[types:1690]BIGINT value is out of range in '(test.big.a + 1)'");

    assert!(tk.query_to_err("select a from big").is_ok());
    assert!(tk.query_to_err_with("select a + ? from big", &args![-1]).is_ok());
    assert_eq!(tk.session().open_record_sets(), 0);
}

#[test]
fn test_record_sets_are_released() {
    let ctx = TestContext::mock();
    let mut tk = TestKit::new(&ctx);
    tk.must_exec("select 1");
    tk.must_exec_with("select ?", &args![1]);
    tk.must_query("select 1, 2").check(rows(&["1 2"]));
    tk.exec_to_err("select 1").unwrap();
    assert_eq!(tk.session().open_record_sets(), 0);
    assert_eq!(tk.session().prepared_stmt_count(), 0);
}

#[test]
#[should_panic(expected = "sql: select * from nope, args: []")]
fn test_must_exec_failure() {
    let ctx = TestContext::mock();
    TestKit::new(&ctx).must_exec("select * from nope");
}

#[test]
#[should_panic(expected = "the statement produced no rows")]
fn test_must_query_without_rows() {
    let ctx = TestContext::mock();
    TestKit::new(&ctx).must_query("create table t (a int)");
}
