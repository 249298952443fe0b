mod common;

mod reports;
mod scheduled;
mod search;
