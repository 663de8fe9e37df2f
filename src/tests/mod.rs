#![cfg(test)]

mod common;

mod app_test;
mod client_ip_test;
mod middleware_test;
mod path_test;
