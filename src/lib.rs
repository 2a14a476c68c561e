//! condgate - hot-reloadable condition routing
//!
//! A filter stage for service-call routing. Given an ordered pool of
//! candidate endpoints and the context of one outbound call, it keeps the
//! endpoints the active condition rule allows. The rule is read from a
//! configuration source and replaced atomically whenever a new version is
//! pushed; calls in flight keep the version they started with.
//!
//! ```
//! use condgate::{ConditionRouter, Endpoint, MemoryConfigSource, RequestContext};
//! use std::sync::Arc;
//!
//! let source = MemoryConfigSource::new();
//! source.publish(
//!     "demo.condition-router",
//!     "conditions:\n  - \"region=hangzhou => region=hangzhou\"\n",
//! );
//! let (router, _changes) = ConditionRouter::subscribe_default(&source, "demo").unwrap();
//!
//! let pool = vec![
//!     Arc::new(Endpoint::new("a", "10.0.0.1", 20880).with_attribute("region", "hangzhou")),
//!     Arc::new(Endpoint::new("b", "10.0.0.2", 20880).with_attribute("region", "beijing")),
//! ];
//! let caller = RequestContext::new().with_attribute("region", "hangzhou");
//! let kept = router.evaluate(&pool, &caller).unwrap();
//! assert_eq!(kept.len(), 1);
//! ```

pub mod chain;
pub mod cli;
pub mod condition;
pub mod config;
pub mod endpoint;
pub mod listener;
pub mod logging;
pub mod routing;
pub mod rule;
pub mod source;

pub use chain::RouterChain;
pub use condition::{ClauseCompiler, ConditionCompiler, ConditionMatcher};
pub use endpoint::{Endpoint, Pool, RequestContext};
pub use listener::{attach, RuleChanged, RuleListener};
pub use routing::{ConditionRouter, RouteOutcome, RouterError, RoutingError};
pub use rule::RuleDocument;
pub use source::{ConfigSource, FileConfigSource, MemoryConfigSource};
