pub mod backend;
pub mod batching;
pub mod config;
pub mod draw_state;
pub mod render_context;
