// Shrink-step coordination
//
// Three concerns share this module: extending a tested variant's shrink
// step with its test variant's classes, the rule text driving a shrink
// pass, and the dedicated test-scoped pass that feeds packaging.

mod config;
mod coordinator;
mod executor;
mod rewriter;
mod rules;

pub use config::ShrinkConfiguration;
pub use coordinator::extend_tested_shrink;
pub use executor::{CommandShrinkExecutor, ShrinkExecutor};
pub use rewriter::{RewriteDecoration, RewriteOptions, TestShrinkRewriter};
pub use rules::{default_rules, effective_rules, keep_package_rule, RULES_VERSION};
