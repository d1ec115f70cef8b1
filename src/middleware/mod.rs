//! Request interceptors and the pipeline that runs them.

pub mod authenticate;
pub mod pipeline;
pub mod rate_limit;

pub use authenticate::{authenticate, Authenticate, AuthenticatedUser};
pub use pipeline::{Flow, Interceptor, Pipeline};
pub use rate_limit::{client_ip, RateLimit};
