//! Constructor-style producers with explicit dependency lists.

use crate::error::DiResult;
use crate::key::Key;
use crate::provider::Dependencies;

/// A service constructed from an explicit, ordered list of dependencies.
///
/// `dependencies` is read at registration time, so
/// [`ServiceCollection::validate`](crate::ServiceCollection::validate) can
/// report missing or captive dependencies before anything is built.
///
/// # Examples
///
/// ```
/// use heist_bootstrap::{
///     key_of_type, Dependencies, DiResult, Injectable, Key, Lifetime, Resolver, ServiceCollection,
/// };
/// use std::sync::Arc;
///
/// struct Roster(Vec<&'static str>);
///
/// struct CrewPlanner {
///     roster: Arc<Roster>,
/// }
///
/// impl Injectable for CrewPlanner {
///     fn dependencies() -> Vec<Key> {
///         vec![key_of_type::<Roster>()]
///     }
///
///     fn construct(deps: &Dependencies) -> DiResult<Self> {
///         Ok(CrewPlanner { roster: deps.get::<Roster>()? })
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Roster(vec!["driver", "hacker"]));
/// services.add_injectable::<CrewPlanner>(Lifetime::Transient);
/// services.validate().unwrap();
///
/// let provider = services.build();
/// assert_eq!(provider.get::<CrewPlanner>().unwrap().roster.0.len(), 2);
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Dependency keys, resolved in this order before `construct`.
    fn dependencies() -> Vec<Key>;

    /// Build the service from its resolved dependencies.
    fn construct(deps: &Dependencies) -> DiResult<Self>;
}
