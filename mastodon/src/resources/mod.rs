pub mod register_app;

pub use register_app::RegisterAppResource;
