pub mod rate;
pub mod raw;
pub mod scanner;
pub mod transport;

pub use rate::{RateBudget, RateLimited, RateLimitedClient};
pub use scanner::RepositoryScanner;
pub use transport::{CommitPage, CommitTransport, GithubTransport, MockTransport, TransportError};
