mod common;
mod demo_tests;
mod pipeline_tests;
