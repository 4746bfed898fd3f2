// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Fundamental data representation.
//!
//! This module contains the types for representing data in the PartiQL
//! evaluator, together with the canonical total order over them.
//!
//! The most basic data type is a [`Datum`], which represents a single value:
//! a scalar, an array, a bag or a struct. A [`Record`] is a fixed-arity tuple
//! of datums; [`PType`] describes the declared type of a value.

#![warn(missing_debug_implementations)]

pub mod adt;
mod error;
mod record;
mod scalar;
pub mod strconv;

pub use error::ValueError;
pub use record::Record;
pub use scalar::{decimal_datum, Datum, DatumKind, IntWidth, PType, PTypeKind, Struct};
