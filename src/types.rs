// Copyright (c) Anza Technology, Inc.
// SPDX-License-Identifier: Apache-2.0

pub mod round;
pub mod value;

pub use self::round::Round;
pub use self::value::Value;
