pub mod api {
    pub mod backend;
    pub mod client;
    pub mod error;
    pub mod models;
}

pub mod rate_limit;
