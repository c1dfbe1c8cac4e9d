// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Kernel diagnostics (structured logging)
//! OWNERS: @kernel-team
//! PUBLIC API: log_* macros via `crate::log`
//! DEPENDS_ON: console

#[macro_use]
pub mod log;
