//! Core traits for the container.

mod dispose;
mod injectable;
mod lifecycle;
mod resolver;

pub use dispose::Dispose;
pub use injectable::Injectable;
pub use lifecycle::Initializable;
pub use resolver::{Resolver, ResolverCore};
