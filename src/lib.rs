mod database {
    pub mod actions;
    pub mod error;
    pub mod filters;
    pub mod form;
    pub mod import;
    pub mod pagination;
    pub mod schema;
    pub mod summary;
    pub mod validation;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
pub mod config;
mod constants;
pub mod media;
pub mod routes;

pub use authentication::*;
pub use constants::*;
pub use database::*;
