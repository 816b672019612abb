use expect_test::expect;
use sqltk::{args, TestContext, TestKit};

fn kit() -> TestKit<sqltk::MemStore> {
    let ctx = TestContext::mock();
    let mut tk = TestKit::new(&ctx);
    tk.must_exec("create table t (a int primary key, b int, c varchar(10), key idx_b (b))");
    tk.must_exec("insert into t values (1, 2, 'x'), (2, 2, 'y'), (3, 3, 'z')");
    tk
}

#[test]
fn test_has_plan() {
    let mut tk = kit();
    assert!(tk.has_plan("select * from t", "TableFullScan"));
    assert!(tk.has_plan("select * from t where a = 1", "Point_Get"));
    assert!(!tk.has_plan("select * from t where a = 1", "TableFullScan"));
    assert!(tk.has_plan_with("select * from t where b = ?", "IndexRangeScan", &args![2]));
    assert!(tk.has_plan("delete from t where c = 'x'", "Selection"));
}

#[test]
fn test_must_use_index() {
    let mut tk = kit();
    assert!(tk.must_use_index("select * from t where b = 1", "idx_b"));
    assert!(!tk.must_use_index("select * from t where c = 'x'", "idx_b"));
    assert!(!tk.must_use_index("select * from t ignore index (idx_b) where b = 1", "idx_b"));
    assert!(tk.must_use_index_with("select * from t use index (idx_b) where b > ?", "idx_b", &args![1]));
}

#[test]
fn test_explain_results() {
    let mut tk = kit();
    let res = tk.must_query("explain select * from t where b = 2");
    assert!(res.uses_index("idx_b"));
    res.check_contain("range:[2,2]");
    res.check_not_contain("TableFullScan");

    tk.must_query("explain select * from t where a = 1").expect(expect![[r#"
        Point_Get_1 1.00 root table:t handle:1
    "#]]);

    let analyze = tk.must_query("explain analyze select * from t where b = 2");
    assert!(analyze.uses_index("idx_b"));
    analyze.check_at(&[0, 2], sqltk::rows(&["IndexLookUp_3 2", "├─IndexRangeScan_1(Build) 2", "└─TableRowIDScan_2(Probe) 2"]));
}
