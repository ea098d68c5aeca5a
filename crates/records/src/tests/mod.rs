mod helpers;
mod list_tests;
mod ping_tests;
