pub mod apify;
pub mod cli;
pub mod lookup;
pub mod types;
