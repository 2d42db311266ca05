mod build;
mod dev;
mod publish;

pub use build::build;
pub use dev::dev;
pub use publish::publish;
