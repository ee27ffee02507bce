// Integration tests: one test binary, one module per area.

mod blocking;
mod common;
mod request_reply;
mod tcp;
