// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Plans run end to end through `prepare` and `Statement::execute`.

use std::rc::Rc;

use pql_eval::{prepare, CardinalityError, CompileError, Config, Error, Mode, Session};
use pql_expr::{
    AggregateExpr, AggregateFunc, BinaryFunc, ColumnRef, EvalError, ExcludePath, ExcludeStep,
    GlobalId, Id, JoinKind, LocalId, RelationExpr, ScalarExpr, SetOpKind, SortKey, UnaryFunc,
    UnmaterializableFunc, VariadicFunc, WindowExpr, WindowFunc,
};
use pql_repr::adt::numeric::Decimal;
use pql_repr::{Datum, PType};

fn ints(values: &[i64]) -> Vec<Datum> {
    values.iter().map(|v| Datum::from(*v)).collect()
}

fn bag(values: &[i64]) -> Datum {
    Datum::Bag(ints(values))
}

fn employee(name: &str, dept: &str, age: i32) -> Datum {
    Datum::struct_([
        ("name", Datum::from(name)),
        ("dept", Datum::from(dept)),
        ("age", Datum::from(age)),
    ])
}

fn session() -> Rc<Session> {
    let employees = Datum::Bag(vec![
        employee("ann", "eng", 25),
        employee("bob", "eng", 30),
        employee("cat", "eng", 30),
        employee("dan", "eng", 41),
        employee("eve", "mkt", 32),
        employee("fay", "mkt", 40),
    ]);
    Rc::new(Session::new(Config::default()).with_table("employees", PType::bag(), employees))
}

fn run(plan: &ScalarExpr, mode: Mode) -> Result<Datum, Error> {
    prepare(&session(), plan, mode)?.execute()
}

fn table(name: &str) -> ScalarExpr {
    ScalarExpr::Get(Id::Global(GlobalId::new(name)))
}

fn local(name: &str) -> ScalarExpr {
    ScalarExpr::Get(Id::Local(LocalId::new(name)))
}

fn with(bindings: Vec<(&str, ScalarExpr)>, body: ScalarExpr) -> ScalarExpr {
    ScalarExpr::With {
        bindings: bindings
            .into_iter()
            .map(|(name, expr)| (LocalId::new(name), expr))
            .collect(),
        body: Box::new(body),
    }
}

/// `SELECT VALUE v FROM <expr> AS v`.
fn select_value(expr: ScalarExpr) -> ScalarExpr {
    ScalarExpr::select(RelationExpr::scan(expr), ScalarExpr::column(0))
}

fn tinyint(value: i32) -> ScalarExpr {
    ScalarExpr::literal(value).cast(PType::TinyInt)
}

fn record(fields: Vec<(&str, ScalarExpr)>) -> ScalarExpr {
    ScalarExpr::Struct(
        fields
            .into_iter()
            .map(|(name, expr)| (ScalarExpr::literal(name), expr))
            .collect(),
    )
}

#[pql_ore::test]
fn test_with_select_value() {
    let plan = with(
        vec![("x", select_value(ScalarExpr::literal(bag(&[1, 2, 3]))))],
        select_value(local("x")),
    );
    assert_eq!(run(&plan, Mode::Strict).unwrap(), bag(&[1, 2, 3]));
}

#[pql_ore::test]
fn test_with_bindings_see_earlier_bindings() {
    let plan = with(
        vec![
            ("x", ScalarExpr::literal(bag(&[1, 2]))),
            ("y", select_value(local("x"))),
        ],
        select_value(local("y")),
    );
    assert_eq!(run(&plan, Mode::Strict).unwrap(), bag(&[1, 2]));
}

#[pql_ore::test]
fn test_with_self_reference() {
    let plan = with(vec![("x", select_value(local("x")))], local("x"));
    assert_eq!(
        run(&plan, Mode::Strict).unwrap_err(),
        Error::Compile(CompileError::CteSelfReference("x".into()))
    );
}

#[pql_ore::test]
fn test_with_forward_reference() {
    let plan = with(
        vec![
            ("x", select_value(local("y"))),
            ("y", ScalarExpr::literal(bag(&[1]))),
        ],
        local("x"),
    );
    assert_eq!(
        run(&plan, Mode::Strict).unwrap_err(),
        Error::Compile(CompileError::CteForwardReference("y".into()))
    );
}

#[pql_ore::test]
fn test_unresolved_names() {
    assert_eq!(
        run(&table("nope"), Mode::Strict).unwrap_err(),
        Error::Compile(CompileError::UnknownTable("nope".into()))
    );
    assert_eq!(
        run(&local("nope"), Mode::Permissive).unwrap_err(),
        Error::Compile(CompileError::UnresolvedVariable("nope".into()))
    );
}

#[pql_ore::test]
fn test_integer_overflow_by_mode() {
    let plan = tinyint(127).call_binary(tinyint(1), BinaryFunc::Add);
    assert_eq!(
        run(&plan, Mode::Strict).unwrap_err(),
        Error::Eval(EvalError::IntegerOutOfRange("TINYINT"))
    );
    assert_eq!(run(&plan, Mode::Permissive).unwrap(), Datum::Missing);
}

#[pql_ore::test]
fn test_permissive_errors_stay_local() {
    // SELECT VALUE 1 / v FROM <<1, 0>> AS v
    let plan = ScalarExpr::select(
        RelationExpr::scan(ScalarExpr::literal(bag(&[1, 0]))),
        ScalarExpr::literal(1).call_binary(ScalarExpr::column(0), BinaryFunc::Div),
    );
    assert_eq!(
        run(&plan, Mode::Strict).unwrap_err(),
        Error::Eval(EvalError::DivisionByZero)
    );
    assert_eq!(
        run(&plan, Mode::Permissive).unwrap(),
        Datum::Bag(vec![Datum::from(1), Datum::Missing])
    );
}

#[pql_ore::test]
fn test_decimal_scale() {
    let plan = ScalarExpr::literal(1).call_binary(
        ScalarExpr::literal("2.00000".parse::<Decimal>().unwrap()),
        BinaryFunc::Add,
    );
    let result = run(&plan, Mode::Strict).unwrap();
    let decimal = result.as_decimal().unwrap();
    assert_eq!((decimal.precision(), decimal.scale()), (16, 5));
    assert_eq!(result.to_string(), "3.00000");
}

#[pql_ore::test]
fn test_null_and_missing_predicates() {
    for (value, is_null, is_missing) in [
        (Datum::Null, true, false),
        (Datum::Missing, false, true),
        (Datum::from(0), false, false),
    ] {
        let test = |func| ScalarExpr::literal(value.clone()).call_unary(func);
        assert_eq!(
            run(&test(UnaryFunc::IsNull), Mode::Strict).unwrap(),
            Datum::from(is_null)
        );
        assert_eq!(
            run(&test(UnaryFunc::IsMissing), Mode::Strict).unwrap(),
            Datum::from(is_missing)
        );
    }
}

#[pql_ore::test]
fn test_order_by_nulls_first() {
    let rows = Datum::Bag(vec![
        Datum::struct_([("a", Datum::from(3)), ("b", Datum::from(4))]),
        Datum::struct_([("a", Datum::Null), ("b", Datum::from(1))]),
        Datum::struct_([("a", Datum::from(1)), ("b", Datum::from(2))]),
    ]);
    let plan = ScalarExpr::select(
        RelationExpr::scan(ScalarExpr::literal(rows))
            .sort(vec![SortKey::asc(ScalarExpr::column(0).field("a")).nulls_first(true)]),
        ScalarExpr::column(0),
    );
    assert_eq!(
        run(&plan, Mode::Strict).unwrap(),
        Datum::Array(vec![
            Datum::struct_([("a", Datum::Null), ("b", Datum::from(1))]),
            Datum::struct_([("a", Datum::from(1)), ("b", Datum::from(2))]),
            Datum::struct_([("a", Datum::from(3)), ("b", Datum::from(4))]),
        ])
    );
}

#[pql_ore::test]
fn test_order_by_defaults() {
    let values = ScalarExpr::literal(Datum::Bag(vec![
        Datum::from(2),
        Datum::Null,
        Datum::from(1),
    ]));
    let sorted = |key: SortKey| {
        let plan = ScalarExpr::select(
            RelationExpr::scan(values.clone()).sort(vec![key]),
            ScalarExpr::column(0),
        );
        run(&plan, Mode::Strict).unwrap()
    };
    assert_eq!(
        sorted(SortKey::asc(ScalarExpr::column(0))),
        Datum::Array(vec![Datum::from(1), Datum::from(2), Datum::Null])
    );
    assert_eq!(
        sorted(SortKey::desc(ScalarExpr::column(0))),
        Datum::Array(vec![Datum::Null, Datum::from(2), Datum::from(1)])
    );
}

#[pql_ore::test]
fn test_rank_and_dense_rank() {
    let by_dept = |func| WindowExpr {
        func,
        partition_by: vec![ScalarExpr::column(0).field("dept")],
        order_by: vec![SortKey::asc(ScalarExpr::column(0).field("age"))],
    };
    let plan = ScalarExpr::select(
        RelationExpr::scan(table("employees"))
            .window(vec![by_dept(WindowFunc::Rank), by_dept(WindowFunc::DenseRank)]),
        record(vec![
            ("name", ScalarExpr::column(0).field("name")),
            ("rank", ScalarExpr::column(1)),
            ("dense_rank", ScalarExpr::column(2)),
        ]),
    );
    let expected = [
        ("ann", 1, 1),
        ("bob", 2, 2),
        ("cat", 2, 2),
        ("dan", 4, 3),
        ("eve", 1, 1),
        ("fay", 2, 2),
    ]
    .into_iter()
    .map(|(name, rank, dense_rank)| {
        Datum::struct_([
            ("name", Datum::from(name)),
            ("rank", Datum::from(rank)),
            ("dense_rank", Datum::from(dense_rank)),
        ])
    })
    .collect();
    assert_eq!(run(&plan, Mode::Strict).unwrap(), Datum::Bag(expected));
}

#[pql_ore::test]
fn test_group_by_count() {
    let plan = ScalarExpr::select(
        RelationExpr::scan(table("employees")).reduce(
            vec![ScalarExpr::column(0).field("dept")],
            vec![AggregateExpr {
                func: AggregateFunc::CountAll,
                expr: ScalarExpr::literal(true),
                distinct: false,
            }],
        ),
        record(vec![
            ("dept", ScalarExpr::column(0)),
            ("n", ScalarExpr::column(1)),
        ]),
    );
    assert_eq!(
        run(&plan, Mode::Strict).unwrap(),
        Datum::Bag(vec![
            Datum::struct_([("dept", Datum::from("eng")), ("n", Datum::from(4))]),
            Datum::struct_([("dept", Datum::from("mkt")), ("n", Datum::from(2))]),
        ])
    );
}

#[pql_ore::test]
fn test_distinct_and_set_ops() {
    let scan = |values: &[i64]| RelationExpr::scan(ScalarExpr::literal(bag(values)));
    let run_rel = |rel: RelationExpr| {
        run(&ScalarExpr::select(rel, ScalarExpr::column(0)), Mode::Strict).unwrap()
    };
    assert_eq!(run_rel(scan(&[1, 1, 2, 2, 3]).distinct()), bag(&[1, 2, 3]));
    assert_eq!(
        run_rel(scan(&[1, 1, 2]).set_op(SetOpKind::Union, false, scan(&[2, 3]))),
        bag(&[1, 2, 3])
    );
    assert_eq!(
        run_rel(scan(&[1, 1, 2]).set_op(SetOpKind::Union, true, scan(&[2, 3]))),
        bag(&[1, 1, 2, 2, 3])
    );
    assert_eq!(
        run_rel(scan(&[1, 1, 2]).set_op(SetOpKind::Intersect, true, scan(&[1, 2, 2]))),
        bag(&[1, 2])
    );
    assert_eq!(
        run_rel(scan(&[1, 1, 2]).set_op(SetOpKind::Except, true, scan(&[1]))),
        bag(&[1, 2])
    );
}

#[pql_ore::test]
fn test_set_op_arity_mismatch() {
    let left = RelationExpr::scan(ScalarExpr::literal(bag(&[1])));
    let right = RelationExpr::scan_with_ordinal(ScalarExpr::literal(Datum::Array(ints(&[1]))));
    let plan = ScalarExpr::select(
        left.set_op(SetOpKind::Union, false, right),
        ScalarExpr::column(0),
    );
    assert_eq!(
        run(&plan, Mode::Strict).unwrap_err(),
        Error::Compile(CompileError::ArityMismatch {
            context: "set operation",
            left: 1,
            right: 2,
        })
    );
}

#[pql_ore::test]
fn test_scalar_subquery_cardinality() {
    let subquery =
        |values: &[i64]| select_value(ScalarExpr::literal(bag(values))).scalar_subquery();
    assert_eq!(run(&subquery(&[]), Mode::Strict).unwrap(), Datum::Null);
    assert_eq!(run(&subquery(&[7]), Mode::Strict).unwrap(), Datum::from(7));
    assert_eq!(
        run(&subquery(&[7, 8]), Mode::Strict).unwrap_err(),
        Error::Cardinality(CardinalityError::TooManyRows(2))
    );

    // A single row of a single column is unwrapped.
    let plan = ScalarExpr::select(
        RelationExpr::scan(ScalarExpr::literal(bag(&[5]))),
        record(vec![("a", ScalarExpr::column(0))]),
    )
    .scalar_subquery();
    assert_eq!(run(&plan, Mode::Strict).unwrap(), Datum::from(5));
}

#[pql_ore::test]
fn test_exclude() {
    let row = Datum::struct_([
        (
            "a",
            Datum::struct_([("b", Datum::from(1)), ("c", Datum::from(2))]),
        ),
        ("d", Datum::from(3)),
    ]);
    let field = |name: &str| ExcludeStep::Field {
        name: name.into(),
        case_sensitive: false,
    };
    let exclude = |paths: Vec<Vec<ExcludeStep>>| {
        let paths = paths
            .into_iter()
            .map(|steps| ExcludePath { column: 0, steps })
            .collect();
        let plan = ScalarExpr::select(
            RelationExpr::scan(ScalarExpr::literal(Datum::Bag(vec![row.clone()]))).exclude(paths),
            ScalarExpr::column(0),
        );
        run(&plan, Mode::Strict).unwrap()
    };

    // An ancestor and its descendant: the ancestor wins.
    assert_eq!(
        exclude(vec![vec![field("a")], vec![field("a"), field("b")]]),
        Datum::Bag(vec![Datum::struct_([("d", Datum::from(3))])])
    );
    // Paths that lead nowhere change nothing.
    assert_eq!(
        exclude(vec![vec![field("x"), field("y")], vec![field("d"), field("e")]]),
        Datum::Bag(vec![row.clone()])
    );
    assert_eq!(
        exclude(vec![vec![field("A"), field("C")]]),
        Datum::Bag(vec![Datum::struct_([
            ("a", Datum::struct_([("b", Datum::from(1))])),
            ("d", Datum::from(3)),
        ])])
    );
}

#[pql_ore::test]
fn test_let_bindings() {
    // FROM <<1>> AS v LET v + 1 AS w, w * 2 AS x SELECT VALUE x
    let plan = ScalarExpr::select(
        RelationExpr::scan(ScalarExpr::literal(bag(&[1]))).map(vec![
            ScalarExpr::column(0).call_binary(ScalarExpr::literal(1), BinaryFunc::Add),
            ScalarExpr::column(1).call_binary(ScalarExpr::literal(2), BinaryFunc::Mul),
        ]),
        ScalarExpr::column(2),
    );
    assert_eq!(run(&plan, Mode::Strict).unwrap(), bag(&[4]));

    let plan = ScalarExpr::select(
        RelationExpr::scan(ScalarExpr::literal(bag(&[1]))).map(vec![ScalarExpr::column(1)]),
        ScalarExpr::column(1),
    );
    assert_eq!(
        run(&plan, Mode::Strict).unwrap_err(),
        Error::Compile(CompileError::LetSelfReference(ColumnRef { scope: 0, index: 1 }))
    );
}

#[pql_ore::test]
fn test_lateral_join() {
    let items = Datum::Bag(vec![
        Datum::struct_([
            ("name", Datum::from("a")),
            ("tags", Datum::Array(ints(&[1, 2]))),
        ]),
        Datum::struct_([("name", Datum::from("b")), ("tags", Datum::Array(vec![]))]),
    ]);
    let joined = |kind| {
        let plan = ScalarExpr::select(
            RelationExpr::scan(ScalarExpr::literal(items.clone())).lateral_join(
                RelationExpr::scan(ScalarExpr::column(0).field("tags")),
                kind,
                ScalarExpr::literal(true),
            ),
            record(vec![
                ("name", ScalarExpr::column(0).field("name")),
                ("tag", ScalarExpr::column(1)),
            ]),
        );
        run(&plan, Mode::Strict)
    };
    let item = |name: &str, tag: Datum| Datum::struct_([("name", Datum::from(name)), ("tag", tag)]);
    assert_eq!(
        joined(JoinKind::Inner).unwrap(),
        Datum::Bag(vec![item("a", Datum::from(1)), item("a", Datum::from(2))])
    );
    assert_eq!(
        joined(JoinKind::Left).unwrap(),
        Datum::Bag(vec![
            item("a", Datum::from(1)),
            item("a", Datum::from(2)),
            item("b", Datum::Null),
        ])
    );
    assert_eq!(
        joined(JoinKind::Full).unwrap_err(),
        Error::Compile(CompileError::InvalidLateralJoin(JoinKind::Full))
    );
}

#[pql_ore::test]
fn test_right_join_column_order() {
    let plan = ScalarExpr::select(
        RelationExpr::scan(ScalarExpr::literal(bag(&[1, 2]))).join(
            RelationExpr::scan(ScalarExpr::literal(bag(&[2, 3]))),
            JoinKind::Right,
            ScalarExpr::column(0).call_binary(ScalarExpr::column(1), BinaryFunc::Eq),
        ),
        ScalarExpr::Array(vec![ScalarExpr::column(0), ScalarExpr::column(1)]),
    );
    assert_eq!(
        run(&plan, Mode::Strict).unwrap(),
        Datum::Bag(vec![
            Datum::Array(ints(&[2, 2])),
            Datum::Array(vec![Datum::Null, Datum::from(3)]),
        ])
    );
}

#[pql_ore::test]
fn test_limit() {
    let limited = |limit: i64, offset: i64| {
        let plan = ScalarExpr::select(
            RelationExpr::scan(ScalarExpr::literal(bag(&[1, 2, 3])))
                .sort(vec![SortKey::asc(ScalarExpr::column(0))])
                .limit(
                    Some(ScalarExpr::literal(limit)),
                    Some(ScalarExpr::literal(offset)),
                ),
            ScalarExpr::column(0),
        );
        run(&plan, Mode::Permissive)
    };
    assert_eq!(limited(2, 1).unwrap(), Datum::Array(ints(&[2, 3])));
    assert_eq!(limited(5, 3).unwrap(), Datum::Array(vec![]));
    assert_eq!(
        limited(-1, 0).unwrap_err(),
        Error::Compile(CompileError::NegativeLimit {
            clause: "LIMIT",
            value: -1,
        })
    );
}

#[pql_ore::test]
fn test_like() {
    let words = ScalarExpr::literal(Datum::Bag(vec![
        Datum::from("abc"),
        Datum::from("xbc"),
        Datum::from("a%c"),
    ]));
    let like = |pattern: ScalarExpr, escape: Option<&str>| {
        let mut args = vec![ScalarExpr::column(0), pattern];
        args.extend(escape.map(ScalarExpr::literal));
        let plan = ScalarExpr::select(
            RelationExpr::scan(words.clone())
                .filter(ScalarExpr::call_variadic(VariadicFunc::Like, args)),
            ScalarExpr::column(0),
        );
        run(&plan, Mode::Strict)
    };
    assert_eq!(
        like(ScalarExpr::literal("a%"), None).unwrap(),
        Datum::Bag(vec![Datum::from("abc"), Datum::from("a%c")])
    );
    assert_eq!(
        like(ScalarExpr::literal("a!%c"), Some("!")).unwrap(),
        Datum::Bag(vec![Datum::from("a%c")])
    );
    // A pattern computed per row is matched at run time.
    assert_eq!(
        like(ScalarExpr::column(0), None).unwrap(),
        Datum::Bag(vec![Datum::from("abc"), Datum::from("xbc"), Datum::from("a%c")])
    );
    assert!(like(ScalarExpr::literal("a%"), Some("!!")).is_err());
}

#[pql_ore::test]
fn test_strict_paths_are_checked() {
    let plan = ScalarExpr::literal(Datum::struct_([("a", Datum::from(1))])).field("b");
    assert!(matches!(
        run(&plan, Mode::Strict).unwrap_err(),
        Error::Compile(CompileError::UndefinedPath { name, .. }) if name == "b"
    ));
    assert_eq!(run(&plan, Mode::Permissive).unwrap(), Datum::Missing);
}

#[pql_ore::test]
fn test_current_user() {
    let config = Config {
        user: "alice".into(),
        ..Config::default()
    };
    let session = Rc::new(Session::new(config));
    let plan = ScalarExpr::CallUnmaterializable(UnmaterializableFunc::CurrentUser);
    let statement = session.prepare(&plan).unwrap();
    assert_eq!(statement.execute().unwrap(), Datum::from("alice"));
}

#[pql_ore::test]
fn test_reexecution_and_cancellation() {
    let config = Config {
        cancellation_check_interval: 1,
        ..Config::default()
    };
    let session = Rc::new(Session::new(config));
    let plan = select_value(ScalarExpr::literal(bag(&[1, 2, 3])));
    let statement = prepare(&session, &plan, Mode::Strict).unwrap();
    assert_eq!(statement.execute().unwrap(), bag(&[1, 2, 3]));
    assert_eq!(statement.execute().unwrap(), bag(&[1, 2, 3]));

    let token = session.cancellation_token();
    token.cancel();
    assert_eq!(statement.execute().unwrap_err(), Error::Cancelled);
    token.reset();
    assert_eq!(statement.execute().unwrap(), bag(&[1, 2, 3]));
}
