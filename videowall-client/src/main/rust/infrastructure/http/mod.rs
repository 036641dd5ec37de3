mod backend_client;
mod wire;

pub use backend_client::HttpStreamBackend;
