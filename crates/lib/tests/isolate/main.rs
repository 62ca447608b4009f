mod common;
mod isolate_tests;
