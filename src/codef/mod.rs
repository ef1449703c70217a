//! Bank account linking and transaction import through the Codef open banking API.

mod account;
mod client;
mod endpoints;

pub use account::{CodefAccount, create_codef_account_table, get_codef_account, upsert_codef_account};
pub use client::{BankCredentials, CodefClient, CodefConfig};
pub use endpoints::{connect_endpoint, get_token_endpoint, transactions_endpoint};
