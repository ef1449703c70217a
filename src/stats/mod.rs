//! Spending statistics for daily, weekly, monthly and yearly periods.

mod core;
mod endpoints;

pub use core::{
    CategorySpend, ConsumeComparison, compare_category_spend, get_category_spend_entries,
    get_spend_by_category,
};
pub use endpoints::{category_list_endpoint, consume_endpoint, stat_list_endpoint};
