mod cursor_tests;
mod helpers;
