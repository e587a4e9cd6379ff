mod config_tests;
mod console_tests;
mod dispatch_tests;
