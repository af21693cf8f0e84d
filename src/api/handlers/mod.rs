// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

mod health;
mod metrics;
mod pppoe;
mod routers;

pub use health::health_check;
pub use metrics::metrics_handler;
pub use pppoe::fuzzy_search;
pub use routers::{check_pppoe_status, test_connection, update_nat_rule};
