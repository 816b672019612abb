use sqltk::{args, rows, ErrorCode, TestContext, TestKit};

#[test]
fn test_error_assertions() {
    let ctx = TestContext::mock();
    let mut tk = TestKit::new(&ctx);
    tk.must_exec("create table t (a int primary key)");

    tk.must_get_err_code("select * from nope", ErrorCode::NO_SUCH_TABLE);
    tk.must_get_err_code("create table t (a int)", 1050u16);
    tk.must_get_err_msg("select * from nope", "[schema:1146]Table 'test.nope' doesn't exist");

    tk.must_exec("insert into t values (1)");
    tk.must_get_err_msg("insert into t values (1)", "[table:1062]Duplicate entry '1' for key 't.PRIMARY'");

    let err = tk.exec_to_err_with("insert into t values (?)", &args![1]).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::DUP_ENTRY));
    assert_eq!(err.args(), args![1].as_slice());
    assert!(err.stack().contains("sql: insert into t values (?)"), "{}", err.stack());
}

#[test]
#[should_panic(expected = "expected error code 1050")]
fn test_wrong_error_code() {
    let ctx = TestContext::mock();
    TestKit::new(&ctx).must_get_err_code("select * from nope", ErrorCode::TABLE_EXISTS);
}

#[test]
#[should_panic(expected = "but the statement succeeded")]
fn test_error_code_of_a_successful_statement() {
    let ctx = TestContext::mock();
    TestKit::new(&ctx).must_get_err_code("select 1", ErrorCode::PARSE);
}

#[test]
#[should_panic(expected = "sql: select * from nope")]
fn test_error_message_is_compared_exactly() {
    let ctx = TestContext::mock();
    TestKit::new(&ctx).must_get_err_msg("select * from nope", "Table 'test.nope' doesn't exist");
}

#[test]
fn test_check_exec_result() {
    let ctx = TestContext::mock();
    let mut tk = TestKit::new(&ctx);
    tk.must_exec("create table t (id int primary key auto_increment, v int)");

    tk.must_exec("insert into t (v) values (1), (2)");
    tk.check_exec_result(2, 1);
    tk.must_exec_with("insert into t (v) values (?)", &args![3]);
    tk.check_exec_result(1, 3);
    tk.must_exec("update t set v = 0 where id > 1");
    tk.check_exec_result(2, 0);
    tk.must_exec("delete from t");
    tk.check_exec_result(3, 0);
    tk.must_exec("select 1");
    tk.check_exec_result(0, 0);
}

#[test]
fn test_result_assertions() {
    let ctx = TestContext::mock();
    let mut tk = TestKit::new(&ctx);
    tk.must_exec("create table t (a int, b varchar(10))");
    tk.must_exec("insert into t values (3, 'c'), (1, null), (2, 'b')");

    let res = tk.must_query("select a, b from t");
    assert_eq!(res.fields(), ["a", "b"]);
    assert!(res.comment().contains("select a, b from t"));
    res.check_at(&[0], rows(&["3", "1", "2"]));
    res.check_contain("<nil>");
    res.check_not_contain("d");
    res.multi_check_contain(&["b", "c"]);

    let res = res.sort();
    res.check(rows(&["1 <nil>", "2 b", "3 c"]));
    assert!(res.equal(&rows(&["1 <nil>", "2 b", "3 c"])));
    assert!(res.to_string().contains("<nil>"));
}
