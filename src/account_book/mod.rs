//! Income and expense entries recorded by users.

mod core;
mod endpoints;

pub use core::{
    AccountBookEntry, EntryFilter, EntryType, NewEntry, Repeat, create_account_book_table,
    create_entry, delete_entry, get_entry, list_entries, sum_spend, update_entry,
};
pub(crate) use core::{SELECT_ENTRY, map_entry_row};
pub use endpoints::{
    create_entry_endpoint, delete_entry_endpoint, get_entry_endpoint, list_entries_endpoint,
    update_entry_endpoint,
};
