//! Monthly budgets and the warning sent when half of one has been spent.

mod core;
mod endpoints;
mod warning;

pub use core::{
    Budget, BudgetSummary, create_budget, create_budget_table, delete_budget, get_budget_summary,
    update_budget_amount,
};
pub use endpoints::{
    create_budget_endpoint, delete_budget_endpoint, get_budget_endpoint, update_budget_endpoint,
};
pub use warning::send_limit_warning;
