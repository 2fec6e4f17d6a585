//! Provider metadata.
//!
//! Every filter, interceptor or dynamic feature registered with an application
//! carries a [`ComponentModel`]: the contracts it satisfies, its priority per
//! contract, the binding tags restricting where it applies, and whether it runs
//! before routing. The model is resolved once at registration and never
//! inspected reflectively afterwards.
//!
//! # Example
//!
//! ```
//! use trellis_core::{BindingTag, ComponentModel, Contract, Priority};
//!
//! let model = ComponentModel::builder("audit")
//!     .contract(Contract::RequestFilter)
//!     .contract(Contract::ResponseFilter)
//!     .priority(Priority::new(100))
//!     .contract_priority(Contract::ResponseFilter, Priority::new(900))
//!     .name_binding(BindingTag::new("Admin"))
//!     .build();
//!
//! assert!(model.is_name_bound());
//! assert_eq!(model.priority_for(Contract::RequestFilter), Priority::new(100));
//! assert_eq!(model.priority_for(Contract::ResponseFilter), Priority::new(900));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// A capability a component provides to the request pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Contract {
    /// Inspects or aborts a request.
    RequestFilter,
    /// Inspects or modifies a response.
    ResponseFilter,
    /// Transforms the request entity before the endpoint reads it.
    ReaderInterceptor,
    /// Transforms the response entity before it is written.
    WriterInterceptor,
    /// Attaches providers to individual resource methods at model build time.
    DynamicFeature,
}

impl Contract {
    /// All contracts, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::RequestFilter,
        Self::ResponseFilter,
        Self::ReaderInterceptor,
        Self::WriterInterceptor,
        Self::DynamicFeature,
    ];

    const fn bit(self) -> u8 {
        1 << self as u8
    }
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RequestFilter => "request filter",
            Self::ResponseFilter => "response filter",
            Self::ReaderInterceptor => "reader interceptor",
            Self::WriterInterceptor => "writer interceptor",
            Self::DynamicFeature => "dynamic feature",
        };
        f.write_str(name)
    }
}

/// A compact set of [`Contract`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ContractSet(u8);

impl ContractSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Adds a contract.
    pub fn insert(&mut self, contract: Contract) {
        self.0 |= contract.bit();
    }

    /// Returns `true` if the set holds `contract`.
    #[must_use]
    pub const fn contains(&self, contract: Contract) -> bool {
        self.0 & contract.bit() != 0
    }

    /// Returns `true` if no contract is declared.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterates the contracts in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = Contract> + '_ {
        Contract::ALL.into_iter().filter(|c| self.contains(*c))
    }
}

impl FromIterator<Contract> for ContractSet {
    fn from_iter<I: IntoIterator<Item = Contract>>(iter: I) -> Self {
        let mut set = Self::empty();
        for contract in iter {
            set.insert(contract);
        }
        set
    }
}

/// Ordering weight of a component within its bucket.
///
/// Classified buckets run higher priorities first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(i32);

impl Priority {
    /// Authentication providers.
    pub const AUTHENTICATION: Self = Self(1000);
    /// Authorization providers.
    pub const AUTHORIZATION: Self = Self(2000);
    /// Header decorators.
    pub const HEADER_DECORATOR: Self = Self(3000);
    /// Entity encoders and decoders.
    pub const ENTITY_CODER: Self = Self(4000);
    /// Default for user components.
    pub const USER: Self = Self(5000);

    /// Creates a priority.
    #[must_use]
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn value(self) -> i32 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::USER
    }
}

/// An opaque marker identifying a name-binding group.
///
/// Components carrying a tag only apply to resource methods (or applications)
/// carrying the same tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BindingTag(Arc<str>);

impl BindingTag {
    /// Creates a tag.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    /// Returns the tag name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BindingTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BindingTag {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Registration-order identity of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(usize);

impl ComponentId {
    /// Creates an id from a registration index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the registration index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Metadata declared by a registered component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentModel {
    name: Arc<str>,
    contracts: ContractSet,
    priority: Priority,
    contract_priorities: BTreeMap<Contract, Priority>,
    name_bindings: BTreeSet<BindingTag>,
    pre_matching: bool,
}

impl ComponentModel {
    /// Starts building a model for a component called `name`.
    #[must_use]
    pub fn builder(name: impl Into<Arc<str>>) -> ComponentModelBuilder {
        ComponentModelBuilder {
            model: Self {
                name: name.into(),
                contracts: ContractSet::empty(),
                priority: Priority::USER,
                contract_priorities: BTreeMap::new(),
                name_bindings: BTreeSet::new(),
                pre_matching: false,
            },
        }
    }

    /// Component name used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared contracts.
    #[must_use]
    pub const fn contracts(&self) -> ContractSet {
        self.contracts
    }

    /// Returns `true` if the component declares `contract`.
    #[must_use]
    pub const fn implements(&self, contract: Contract) -> bool {
        self.contracts.contains(contract)
    }

    /// Priority used when classifying the component under `contract`.
    ///
    /// Falls back to the component-wide priority when no override exists.
    #[must_use]
    pub fn priority_for(&self, contract: Contract) -> Priority {
        self.contract_priorities
            .get(&contract)
            .copied()
            .unwrap_or(self.priority)
    }

    /// Binding tags restricting where the component applies.
    #[must_use]
    pub const fn name_bindings(&self) -> &BTreeSet<BindingTag> {
        &self.name_bindings
    }

    /// Returns `true` if the component carries at least one binding tag.
    #[must_use]
    pub fn is_name_bound(&self) -> bool {
        !self.name_bindings.is_empty()
    }

    /// Returns `true` if the component runs before routing.
    #[must_use]
    pub const fn is_pre_matching(&self) -> bool {
        self.pre_matching
    }
}

/// Builder for [`ComponentModel`].
#[derive(Debug, Clone)]
pub struct ComponentModelBuilder {
    model: ComponentModel,
}

impl ComponentModelBuilder {
    /// Declares a contract.
    pub fn contract(mut self, contract: Contract) -> Self {
        self.model.contracts.insert(contract);
        self
    }

    /// Sets the component-wide priority.
    pub fn priority(mut self, priority: Priority) -> Self {
        self.model.priority = priority;
        self
    }

    /// Overrides the priority for a single contract.
    pub fn contract_priority(mut self, contract: Contract, priority: Priority) -> Self {
        self.model.contract_priorities.insert(contract, priority);
        self
    }

    /// Adds a binding tag.
    pub fn name_binding(mut self, tag: impl Into<BindingTag>) -> Self {
        self.model.name_bindings.insert(tag.into());
        self
    }

    /// Marks the component as pre-matching.
    pub fn pre_matching(mut self) -> Self {
        self.model.pre_matching = true;
        self
    }

    /// Finishes the model.
    pub fn build(self) -> ComponentModel {
        self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_set() {
        let set: ContractSet = [Contract::WriterInterceptor, Contract::RequestFilter]
            .into_iter()
            .collect();
        assert!(set.contains(Contract::RequestFilter));
        assert!(!set.contains(Contract::ResponseFilter));
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![Contract::RequestFilter, Contract::WriterInterceptor]
        );
        assert!(ContractSet::empty().is_empty());
    }

    #[test]
    fn test_default_priority_is_user() {
        let model = ComponentModel::builder("plain")
            .contract(Contract::RequestFilter)
            .build();
        assert_eq!(model.priority_for(Contract::RequestFilter), Priority::USER);
        assert!(!model.is_name_bound());
        assert!(!model.is_pre_matching());
    }

    #[test]
    fn test_contract_priority_override() {
        let model = ComponentModel::builder("mixed")
            .contract(Contract::RequestFilter)
            .contract(Contract::ResponseFilter)
            .priority(Priority::new(10))
            .contract_priority(Contract::ResponseFilter, Priority::new(-3))
            .build();
        assert_eq!(model.priority_for(Contract::RequestFilter), Priority::new(10));
        assert_eq!(model.priority_for(Contract::ResponseFilter), Priority::new(-3));
    }

    #[test]
    fn test_binding_tags_are_deduplicated() {
        let model = ComponentModel::builder("bound")
            .name_binding("Admin")
            .name_binding(BindingTag::new("Admin"))
            .name_binding("Audit")
            .build();
        assert_eq!(model.name_bindings().len(), 2);
        assert!(model.name_bindings().contains(&BindingTag::new("Audit")));
    }
}
