// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer: configuration, definitions and the wiring of transport,
// store and journal into a reconciler.

pub mod data_dir;
pub mod setup;
