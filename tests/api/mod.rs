//! End-to-end tests over real sockets

mod broadcast_tests;
mod http_tests;
mod websocket_tests;
