pub mod application {
    pub mod messages;
    pub mod user_service;
    pub mod validation;
}

pub mod data {
    pub mod memory;
    pub mod sqlite;
}

pub mod domain {
    pub mod error;
    pub mod repository;
    pub mod task;
    pub mod user;
}

pub mod infrastructure {
    pub mod config;
    pub mod database;
    pub mod logging;
    pub mod security;
}

pub mod presentation {
    pub mod handlers;
    pub mod middleware;
    pub mod session;
}
