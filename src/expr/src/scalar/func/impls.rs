// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod boolean;
mod cast;
mod collection;
mod datetime;
mod interval;
mod numeric;
mod string;

pub use self::boolean::*;
pub use self::cast::*;
pub use self::collection::*;
pub use self::datetime::*;
pub use self::interval::*;
pub use self::numeric::*;
pub use self::string::*;
