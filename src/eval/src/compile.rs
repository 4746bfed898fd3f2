// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Compilation of plans into evaluators.
//!
//! The compiler walks a plan once, keeping track of the rows in scope (one
//! frame per enclosing operator, holding the static column types) and of
//! the `WITH` bindings in scope. Every reference is checked and resolved to
//! a slot here, so evaluation never looks anything up by name.

use std::cell::RefCell;

use pql_expr::like_pattern;
use pql_expr::{
    AggregateExpr, ColumnRef, ExcludePath, GlobalId, Id, JoinKind, LocalId, PathStep,
    RelationExpr, ScalarExpr, SortKey, UnaryFunc, VariadicFunc, WindowExpr, WindowFunc,
};
use pql_repr::PType;
use tracing::debug;

use crate::error::{CompileError, Error};
use crate::expr::{Expr, Step};
use crate::mode::Mode;
use crate::relation::{
    Aggregate, Distinct, Exclude, ExclusionTree, Filter, Join, Limit, Map, OrderKey, Project,
    Reduce, Relation, Scan, SetOp, Sort, Unpivot, Window, WindowCall, WindowKind,
};
use crate::session::Session;

/// The columns of the row bound by one operator.
#[derive(Debug)]
struct Frame {
    types: Vec<PType>,
    /// Columns at or past this index belong to `LET` bindings not yet
    /// defined.
    bound: usize,
}

impl Frame {
    fn new(types: Vec<PType>) -> Frame {
        let bound = types.len();
        Frame { types, bound }
    }
}

#[derive(Debug)]
enum LocalEntry {
    Bound(LocalId),
    /// A `WITH` binding whose definition is being compiled (`defining`) or
    /// follows the one being compiled. Referencing either is an error.
    Pending { id: LocalId, defining: bool },
}

#[derive(Debug)]
pub(crate) struct CompileContext<'a> {
    session: &'a Session,
    mode: Mode,
    frames: Vec<Frame>,
    locals: Vec<LocalEntry>,
}

/// The element type of a collection type.
fn element_type(typ: PType) -> PType {
    match typ {
        PType::Array { element } | PType::Bag { element } => *element,
        _ => PType::Dynamic,
    }
}

/// Rejects a `LIMIT` or `OFFSET` that is a negative constant.
fn check_bound(expr: Option<&ScalarExpr>, clause: &'static str) -> Result<(), CompileError> {
    match expr.and_then(|e| e.as_literal()).and_then(|d| d.as_i64()) {
        Some(value) if value < 0 => Err(CompileError::NegativeLimit { clause, value }),
        _ => Ok(()),
    }
}

impl<'a> CompileContext<'a> {
    pub(crate) fn new(session: &'a Session, mode: Mode) -> CompileContext<'a> {
        CompileContext {
            session,
            mode,
            frames: vec![],
            locals: vec![],
        }
    }

    /// Runs `f` with `frame` as scope `0`.
    fn with_frame<T, F>(&mut self, frame: Frame, f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut Self) -> Result<T, Error>,
    {
        self.frames.push(frame);
        let result = f(self);
        self.frames.pop();
        result
    }

    fn column_type(&self, column: ColumnRef) -> Result<&PType, CompileError> {
        let frame = self
            .frames
            .len()
            .checked_sub(column.scope + 1)
            .and_then(|i| self.frames.get(i))
            .ok_or(CompileError::InvalidColumn(column))?;
        match frame.types.get(column.index) {
            Some(typ) if column.index < frame.bound => Ok(typ),
            Some(_) if column.index == frame.bound => Err(CompileError::LetSelfReference(column)),
            _ => Err(CompileError::InvalidColumn(column)),
        }
    }

    /// What is known about the type of `expr` without evaluating it.
    fn static_type(&self, expr: &ScalarExpr) -> PType {
        match expr {
            ScalarExpr::Column(column) => self
                .column_type(*column)
                .cloned()
                .unwrap_or(PType::Dynamic),
            ScalarExpr::Literal(datum) => datum.typ(),
            ScalarExpr::Get(Id::Global(GlobalId(name))) => self
                .session
                .resolve_table(name)
                .map(|(_, table)| table.typ.clone())
                .unwrap_or(PType::Dynamic),
            ScalarExpr::CallUnary {
                func: UnaryFunc::Cast(to),
                ..
            } => to.clone(),
            _ => PType::Dynamic,
        }
    }

    /// In the strict mode, rejects a path that navigates to a field its
    /// value's static type does not have.
    fn check_path(&self, expr: &ScalarExpr, steps: &[PathStep]) -> Result<(), CompileError> {
        if self.mode.is_permissive() {
            return Ok(());
        }
        let mut typ = self.static_type(expr);
        for step in steps {
            let PathStep::Field {
                name,
                case_sensitive,
            } = step
            else {
                break;
            };
            let PType::Struct {
                fields: Some(fields),
            } = &typ
            else {
                break;
            };
            let found = fields
                .iter()
                .find(|(field, _)| match case_sensitive {
                    true => field == name,
                    false => field.eq_ignore_ascii_case(name),
                })
                .map(|(_, typ)| typ.clone());
            match found {
                Some(field_type) => typ = field_type,
                None => {
                    return Err(CompileError::UndefinedPath {
                        name: name.clone(),
                        typ: typ.to_string(),
                    })
                }
            }
        }
        Ok(())
    }

    fn resolve_local(&self, id: &LocalId) -> Result<usize, CompileError> {
        let mut depth = 0;
        for entry in self.locals.iter().rev() {
            match entry {
                LocalEntry::Bound(bound) if bound == id => return Ok(depth),
                LocalEntry::Bound(_) => depth += 1,
                LocalEntry::Pending {
                    id: pending,
                    defining,
                } if pending == id => {
                    return Err(match defining {
                        true => CompileError::CteSelfReference(id.0.clone()),
                        false => CompileError::CteForwardReference(id.0.clone()),
                    })
                }
                LocalEntry::Pending { .. } => {}
            }
        }
        Err(CompileError::UnresolvedVariable(id.0.clone()))
    }

    /// Wraps expressions that can raise data exceptions in the boundary that
    /// absorbs them, if the mode asks for one.
    fn guard(&self, expr: Expr) -> Expr {
        let raises = matches!(
            expr,
            Expr::Path { .. }
                | Expr::Unary { .. }
                | Expr::Binary { .. }
                | Expr::Variadic { .. }
                | Expr::Struct(_)
                | Expr::Unmaterializable(_)
        );
        match self.mode {
            Mode::Permissive if raises => Expr::Permissive(Box::new(expr)),
            _ => expr,
        }
    }

    fn compile_all(&mut self, exprs: &[ScalarExpr]) -> Result<Vec<Expr>, Error> {
        exprs.iter().map(|e| self.compile_scalar(e)).collect()
    }

    fn compile_boxed(&mut self, expr: &ScalarExpr) -> Result<Box<Expr>, Error> {
        Ok(Box::new(self.compile_scalar(expr)?))
    }

    fn compile_pairs(
        &mut self,
        pairs: &[(ScalarExpr, ScalarExpr)],
    ) -> Result<Vec<(Expr, Expr)>, Error> {
        pairs
            .iter()
            .map(|(a, b)| Ok((self.compile_scalar(a)?, self.compile_scalar(b)?)))
            .collect()
    }

    pub(crate) fn compile_scalar(&mut self, expr: &ScalarExpr) -> Result<Expr, Error> {
        let compiled = match expr {
            ScalarExpr::Column(column) => {
                self.column_type(*column)?;
                Expr::Column(*column)
            }
            ScalarExpr::Literal(datum) => Expr::Literal(datum.clone()),
            ScalarExpr::Get(Id::Global(GlobalId(name))) => match self.session.resolve_table(name)
            {
                Some((index, _)) => Expr::Table(index),
                None => return Err(CompileError::UnknownTable(name.clone()).into()),
            },
            ScalarExpr::Get(Id::Local(id)) => Expr::Local(self.resolve_local(id)?),
            ScalarExpr::Path { expr, steps } => {
                self.check_path(expr, steps)?;
                let steps = steps
                    .iter()
                    .map(|step| self.compile_step(step))
                    .collect::<Result<_, _>>()?;
                Expr::Path {
                    expr: self.compile_boxed(expr)?,
                    steps,
                }
            }
            ScalarExpr::CallUnmaterializable(func) => Expr::Unmaterializable(*func),
            ScalarExpr::CallUnary { func, expr } => Expr::Unary {
                func: func.clone(),
                expr: self.compile_boxed(expr)?,
            },
            ScalarExpr::CallBinary { func, expr1, expr2 } => Expr::Binary {
                func: *func,
                expr1: self.compile_boxed(expr1)?,
                expr2: self.compile_boxed(expr2)?,
            },
            ScalarExpr::CallVariadic { func, exprs } => {
                if !func.accepts_arity(exprs.len()) {
                    return Err(CompileError::WrongArgumentCount {
                        func: func.to_string(),
                        count: exprs.len(),
                    }
                    .into());
                }
                match func {
                    VariadicFunc::Coalesce => Expr::Coalesce(self.compile_all(exprs)?),
                    VariadicFunc::Like => self.compile_like(exprs)?,
                    func => Expr::Variadic {
                        func: *func,
                        exprs: self.compile_all(exprs)?,
                    },
                }
            }
            ScalarExpr::Case {
                operand,
                branches,
                default,
            } => Expr::Case {
                operand: operand.as_deref().map(|e| self.compile_boxed(e)).transpose()?,
                branches: self.compile_pairs(branches)?,
                default: default.as_deref().map(|e| self.compile_boxed(e)).transpose()?,
            },
            ScalarExpr::Struct(fields) => Expr::Struct(self.compile_pairs(fields)?),
            ScalarExpr::Array(exprs) => Expr::Array(self.compile_all(exprs)?),
            ScalarExpr::Bag(exprs) => Expr::Bag(self.compile_all(exprs)?),
            ScalarExpr::TupleUnion(exprs) => Expr::TupleUnion(self.compile_all(exprs)?),
            ScalarExpr::Select { input, constructor } => {
                let (relation, types) = self.compile_relation(input)?;
                let constructor =
                    self.with_frame(Frame::new(types), |cx| cx.compile_boxed(constructor))?;
                Expr::Select {
                    input: RefCell::new(relation),
                    constructor,
                    ordered: input.is_ordered(),
                }
            }
            ScalarExpr::Pivot { input, key, value } => {
                let (relation, types) = self.compile_relation(input)?;
                let (key, value) = self.with_frame(Frame::new(types), |cx| {
                    Ok((cx.compile_boxed(key)?, cx.compile_boxed(value)?))
                })?;
                Expr::Pivot {
                    input: RefCell::new(relation),
                    key,
                    value,
                }
            }
            ScalarExpr::Subquery { expr, coercion } => Expr::Subquery {
                expr: self.compile_boxed(expr)?,
                coercion: *coercion,
            },
            ScalarExpr::With { bindings, body } => self.compile_with(bindings, body)?,
        };
        Ok(self.guard(compiled))
    }

    fn compile_step(&mut self, step: &PathStep) -> Result<Step, Error> {
        Ok(match step {
            PathStep::Field {
                name,
                case_sensitive,
            } => Step::Field {
                name: name.clone(),
                case_sensitive: *case_sensitive,
            },
            PathStep::Index(expr) => Step::Index(self.compile_scalar(expr)?),
            PathStep::Wildcard => Step::Wildcard,
            PathStep::FieldWildcard => Step::FieldWildcard,
        })
    }

    /// Compiles `LIKE`, matching against a pattern compiled ahead of time
    /// when the pattern and escape are valid constants.
    fn compile_like(&mut self, exprs: &[ScalarExpr]) -> Result<Expr, Error> {
        let pattern = exprs.get(1).and_then(|e| e.as_literal_str());
        let escape = match exprs.get(2) {
            None => Some(None),
            Some(e) => e
                .as_literal_str()
                .and_then(|s| like_pattern::escape_char(s).ok())
                .map(Some),
        };
        if let (Some(pattern), Some(escape), Some(value)) = (pattern, escape, exprs.first()) {
            if let Ok(matcher) = like_pattern::compile(pattern, escape) {
                debug!(pattern, "precompiled LIKE pattern");
                return Ok(Expr::Unary {
                    func: UnaryFunc::IsLikeMatch(matcher),
                    expr: self.compile_boxed(value)?,
                });
            }
        }
        Ok(Expr::Variadic {
            func: VariadicFunc::Like,
            exprs: self.compile_all(exprs)?,
        })
    }

    /// Compiles `WITH` bindings in order. While binding `i` is compiled,
    /// bindings `i..` are pending, so referencing binding `i` itself or any
    /// binding after it fails rather than resolving to an outer name.
    fn compile_with(
        &mut self,
        bindings: &[(LocalId, ScalarExpr)],
        body: &ScalarExpr,
    ) -> Result<Expr, Error> {
        let mark = self.locals.len();
        let mut compiled = Vec::with_capacity(bindings.len());
        for (i, (id, binding)) in bindings.iter().enumerate() {
            let pending = self.locals.len();
            self.locals
                .extend(bindings[i..].iter().enumerate().map(|(j, (id, _))| {
                    LocalEntry::Pending {
                        id: id.clone(),
                        defining: j == 0,
                    }
                }));
            let result = self.compile_scalar(binding);
            self.locals.truncate(pending);
            match result {
                Ok(expr) => compiled.push(expr),
                Err(e) => {
                    self.locals.truncate(mark);
                    return Err(e);
                }
            }
            self.locals.push(LocalEntry::Bound(id.clone()));
        }
        let body = self.compile_boxed(body);
        self.locals.truncate(mark);
        Ok(Expr::With {
            bindings: compiled,
            body: body?,
        })
    }

    fn compile_order_keys(&mut self, keys: &[SortKey]) -> Result<Vec<OrderKey>, Error> {
        keys.iter()
            .map(|key| {
                Ok(OrderKey {
                    expr: self.compile_scalar(&key.expr)?,
                    desc: key.desc,
                    nulls_first: key.effective_nulls_first(),
                })
            })
            .collect()
    }

    fn compile_aggregate(&mut self, agg: &AggregateExpr) -> Result<Aggregate, Error> {
        Ok(Aggregate {
            func: agg.func,
            expr: self.compile_scalar(&agg.expr)?,
            distinct: agg.distinct,
        })
    }

    fn compile_window(&mut self, window: &WindowExpr) -> Result<WindowCall, Error> {
        let kind = match &window.func {
            WindowFunc::RowNumber => WindowKind::RowNumber,
            WindowFunc::Rank => WindowKind::Rank,
            WindowFunc::DenseRank => WindowKind::DenseRank,
            WindowFunc::Lag {
                expr,
                offset,
                default,
            } => WindowKind::Lag {
                expr: self.compile_scalar(expr)?,
                offset: *offset,
                default: default.as_deref().map(|e| self.compile_scalar(e)).transpose()?,
            },
            WindowFunc::Lead {
                expr,
                offset,
                default,
            } => WindowKind::Lead {
                expr: self.compile_scalar(expr)?,
                offset: *offset,
                default: default.as_deref().map(|e| self.compile_scalar(e)).transpose()?,
            },
        };
        Ok(WindowCall {
            kind,
            partition_by: self.compile_all(&window.partition_by)?,
            order_by: self.compile_order_keys(&window.order_by)?,
        })
    }

    /// Compiles a relation, returning it with the static types of its
    /// columns.
    pub(crate) fn compile_relation(
        &mut self,
        expr: &RelationExpr,
    ) -> Result<(Relation, Vec<PType>), Error> {
        Ok(match expr {
            RelationExpr::Scan { expr, with_ordinal } => {
                let mut types = vec![element_type(self.static_type(expr))];
                if *with_ordinal {
                    types.push(PType::BigInt);
                }
                let scan = Scan::new(self.compile_scalar(expr)?, *with_ordinal, self.mode);
                (Relation::new("scan", scan), types)
            }
            RelationExpr::Unpivot { expr } => {
                let unpivot = Unpivot::new(self.compile_scalar(expr)?);
                let types = vec![PType::Dynamic, PType::String { length: None }];
                (Relation::new("unpivot", unpivot), types)
            }
            RelationExpr::Filter { input, predicate } => {
                let (input, types) = self.compile_relation(input)?;
                let predicate =
                    self.with_frame(Frame::new(types.clone()), |cx| cx.compile_scalar(predicate))?;
                (Relation::new("filter", Filter::new(input, predicate)), types)
            }
            RelationExpr::Project { input, exprs } => {
                let (input, input_types) = self.compile_relation(input)?;
                let (exprs, types) = self.with_frame(Frame::new(input_types), |cx| {
                    let types = exprs.iter().map(|e| cx.static_type(e)).collect();
                    Ok((cx.compile_all(exprs)?, types))
                })?;
                (Relation::new("project", Project::new(input, exprs)), types)
            }
            RelationExpr::Map { input, exprs } => {
                let (input, input_types) = self.compile_relation(input)?;
                let bound = input_types.len();
                let mut types = input_types;
                types.extend(exprs.iter().map(|_| PType::Dynamic));
                let mut compiled = Vec::with_capacity(exprs.len());
                for (i, expr) in exprs.iter().enumerate() {
                    let frame = Frame {
                        types: types.clone(),
                        bound: bound + i,
                    };
                    let (expr, typ) = self.with_frame(frame, |cx| {
                        Ok((cx.compile_scalar(expr)?, cx.static_type(expr)))
                    })?;
                    types[bound + i] = typ;
                    compiled.push(expr);
                }
                (Relation::new("map", Map::new(input, compiled)), types)
            }
            RelationExpr::Join {
                kind,
                left,
                right,
                on,
                lateral,
            } => self.compile_join(*kind, left, right, on, *lateral)?,
            RelationExpr::Distinct { input } => {
                let (input, types) = self.compile_relation(input)?;
                (Relation::new("distinct", Distinct::new(input)), types)
            }
            RelationExpr::Reduce {
                input,
                group_key,
                aggregates,
                group_as,
            } => {
                let (input, input_types) = self.compile_relation(input)?;
                if let Some(names) = group_as {
                    if names.len() != input_types.len() {
                        return Err(CompileError::ArityMismatch {
                            context: "GROUP AS",
                            left: names.len(),
                            right: input_types.len(),
                        }
                        .into());
                    }
                }
                let (keys, aggs, mut types) = self.with_frame(Frame::new(input_types), |cx| {
                    let types: Vec<_> = group_key.iter().map(|e| cx.static_type(e)).collect();
                    let keys = cx.compile_all(group_key)?;
                    let aggs = aggregates
                        .iter()
                        .map(|agg| cx.compile_aggregate(agg))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok((keys, aggs, types))
                })?;
                types.extend(aggregates.iter().map(|_| PType::Dynamic));
                if group_as.is_some() {
                    types.push(PType::bag());
                }
                let reduce = Reduce::new(input, keys, aggs, group_as.clone(), self.mode);
                (Relation::new("reduce", reduce), types)
            }
            RelationExpr::Sort { input, keys } => {
                let (input, types) = self.compile_relation(input)?;
                let keys =
                    self.with_frame(Frame::new(types.clone()), |cx| cx.compile_order_keys(keys))?;
                (Relation::new("sort", Sort::new(input, keys)), types)
            }
            RelationExpr::Limit {
                input,
                limit,
                offset,
            } => {
                check_bound(limit.as_ref(), "LIMIT")?;
                check_bound(offset.as_ref(), "OFFSET")?;
                let (input, types) = self.compile_relation(input)?;
                let limit = limit.as_ref().map(|e| self.compile_scalar(e)).transpose()?;
                let offset = offset.as_ref().map(|e| self.compile_scalar(e)).transpose()?;
                (Relation::new("limit", Limit::new(input, limit, offset)), types)
            }
            RelationExpr::Window { input, functions } => {
                let (input, mut types) = self.compile_relation(input)?;
                let calls = self.with_frame(Frame::new(types.clone()), |cx| {
                    functions.iter().map(|w| cx.compile_window(w)).collect()
                })?;
                types.extend(functions.iter().map(|w| match w.func {
                    WindowFunc::RowNumber | WindowFunc::Rank | WindowFunc::DenseRank => {
                        PType::BigInt
                    }
                    WindowFunc::Lag { .. } | WindowFunc::Lead { .. } => PType::Dynamic,
                }));
                (Relation::new("window", Window::new(input, calls)), types)
            }
            RelationExpr::SetOp {
                op,
                all,
                left,
                right,
            } => {
                let (left, left_types) = self.compile_relation(left)?;
                let (right, right_types) = self.compile_relation(right)?;
                if left_types.len() != right_types.len() {
                    return Err(CompileError::ArityMismatch {
                        context: "set operation",
                        left: left_types.len(),
                        right: right_types.len(),
                    }
                    .into());
                }
                let types = left_types
                    .into_iter()
                    .zip(right_types)
                    .map(|(l, r)| if l == r { l } else { PType::Dynamic })
                    .collect();
                (Relation::new("set_op", SetOp::new(*op, *all, left, right)), types)
            }
            RelationExpr::Exclude { input, paths } => {
                let (input, mut types) = self.compile_relation(input)?;
                for ExcludePath { column, .. } in paths {
                    match types.get_mut(*column) {
                        // The shape of an excluded-from value is no longer
                        // known.
                        Some(typ) => *typ = PType::Dynamic,
                        None => {
                            return Err(CompileError::InvalidColumn(ColumnRef {
                                scope: 0,
                                index: *column,
                            })
                            .into())
                        }
                    }
                }
                let trees = ExclusionTree::build(paths);
                (Relation::new("exclude", Exclude::new(input, trees)), types)
            }
        })
    }

    fn compile_join(
        &mut self,
        kind: JoinKind,
        left: &RelationExpr,
        right: &RelationExpr,
        on: &ScalarExpr,
        lateral: bool,
    ) -> Result<(Relation, Vec<PType>), Error> {
        if lateral && matches!(kind, JoinKind::Right | JoinKind::Full) {
            return Err(CompileError::InvalidLateralJoin(kind).into());
        }
        let (left, left_types) = self.compile_relation(left)?;
        let (right, right_types) = match lateral {
            true => self.with_frame(Frame::new(left_types.clone()), |cx| {
                cx.compile_relation(right)
            })?,
            false => self.compile_relation(right)?,
        };
        let (left_arity, right_arity) = (left_types.len(), right_types.len());
        let mut types = left_types;
        types.extend(right_types);
        let on = self.with_frame(Frame::new(types.clone()), |cx| cx.compile_scalar(on))?;
        let join = match kind {
            JoinKind::Right => Join::new(
                JoinKind::Left,
                (right, right_arity),
                (left, left_arity),
                on,
                false,
                true,
            ),
            kind => Join::new(kind, (left, left_arity), (right, right_arity), on, lateral, false),
        };
        Ok((Relation::new("join", join), types))
    }
}
