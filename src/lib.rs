pub mod chart;
pub mod comparison;
pub mod config;
pub mod passers_by_year;
pub mod play_store;
pub mod scoring;
pub mod web;
