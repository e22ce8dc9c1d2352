#![cfg(unix)]

mod common;

mod cache_tests;
mod dispatch_tests;
mod resource_tests;
