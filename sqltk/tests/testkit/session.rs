use sqltk::{rows, ConnectionIds, MemStore, Session, Storage, TestContext, TestKit};

#[test]
fn test_connection_ids_increase() {
    let ctx = TestContext::mock();
    let mut a = TestKit::new(&ctx);
    let mut b = TestKit::new(&ctx);
    assert_eq!(a.session().connection_id(), 1);
    assert_eq!(b.session().connection_id(), 2);

    a.refresh_connection_id();
    assert_eq!(a.session().connection_id(), 3);
    a.must_query("select connection_id()").check(rows(&["3"]));

    b.refresh_session();
    assert_eq!(b.session().connection_id(), 4);
    assert_eq!(ctx.connection_ids().last_id(), 4);
}

#[test]
fn test_contexts_sharing_connection_ids() {
    let ids = ConnectionIds::new();
    let first = TestContext::with_connection_ids(MemStore::default(), ids.clone());
    let second = TestContext::with_connection_ids(MemStore::default(), ids);
    let a = TestKit::new(&first);
    let b = TestKit::new(&second);
    assert!(a.session().connection_id() < b.session().connection_id());
}

#[test]
fn test_kits_share_the_storage() {
    let ctx = TestContext::mock();
    let mut a = TestKit::new(&ctx);
    let mut b = TestKit::new(&ctx);
    a.must_exec("create table t (a int); insert into t values (1)");
    b.must_query("select a from t").check(rows(&["1"]));
    assert_eq!(ctx.storage().table_names(), ["t"]);
}

#[test]
fn test_replacing_the_session() {
    let ctx = TestContext::mock();
    let mut tk = TestKit::new(&ctx);
    tk.must_exec("set sql_select_limit = 1");
    tk.must_query("select @@sql_select_limit").check(rows(&["1"]));

    tk.refresh_session();
    tk.must_query("select @@sql_select_limit").check(rows(&["18446744073709551615"]));

    tk.session_mut().set_connection_id(42);
    tk.must_query("select connection_id()").check(rows(&["42"]));

    let session = ctx.storage().create_session().unwrap();
    tk.set_session(session);
    assert_eq!(tk.session().connection_id(), 0);
}

#[test]
fn test_with_variable() {
    let ctx = TestContext::mock();
    let mut tk = TestKit::new(&ctx);
    tk.must_exec("create table t (a int); insert into t values (1), (2), (3)");

    let seen = tk.with_variable("sql_select_limit", 1, |tk| {
        tk.must_query("select @@global.sql_select_limit").check(rows(&["1"]));
        // new sessions pick up the global value
        let mut other = TestKit::new(&ctx);
        other.must_query("select a from t").rows().len()
    });
    assert_eq!(seen, 1);

    tk.must_query("select a from t").check(rows(&["1", "2", "3"]));
    tk.must_query("select @@sql_select_limit, @@global.sql_select_limit")
        .check(rows(&["18446744073709551615 18446744073709551615"]));

    tk.with_variable("sql_mode", "", |tk| {
        tk.must_exec("create table n (a int unsigned)");
        tk.must_exec("insert into n values (-1)");
        tk.must_query("select a from n").check(rows(&["0"]));
    });
    tk.must_get_err_code("insert into n values (-1)", 1264u16);
}
