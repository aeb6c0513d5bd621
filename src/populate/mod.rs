//! Cross-service relation population.
//!
//! A service declares relations once; callers then request them by path:
//!
//! ```ignore
//! let mut relations = Relations::new();
//! relations.insert("author", RelationRule::action("authorId", "users.get"));
//! let engine = PopulationEngine::new(relations);
//!
//! // one `users.get` call for all posts, forwarding `populate: ["profile"]`
//! let posts = engine.populate(&ctx, posts, &["author".into(), "author.profile".into()]).await?;
//! ```

mod engine;
mod rule;

pub use engine::{GroupedRequest, PopulationEngine, collect_ids};
pub use rule::{PopulateHandler, RelationRule, RelationRuleConfig, Relations, RuleDispatch};
