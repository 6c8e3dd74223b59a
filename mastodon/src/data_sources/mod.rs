pub mod account;
pub mod instance_self;

pub use account::AccountDataSource;
pub use instance_self::InstanceSelfDataSource;
