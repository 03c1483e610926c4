//! Metamodel-driven invalidation
//!
//! The [`InvalidationMapper`] listens for [`MutationEvent`]s on a
//! [`MutationBus`] and bumps the generation of every dependency a mutation
//! affects: the object itself plus its structural relatives (owning domain
//! or project, relation endpoints, hierarchy root). Cached entries are never
//! deleted; their keys simply stop being produced.

mod event;
mod mapper;
mod metamodel;
mod model;

pub use event::{
    DEFAULT_BUS_CAPACITY, EventOrigin, MutationBus, MutationEvent, MutationKind, ObjectRef,
    ObjectType,
};
pub use mapper::{DependencySet, Invalidation, InvalidationMapper};
pub use metamodel::{
    HierarchyResolver, InMemoryMetamodel, MAX_HIERARCHY_DEPTH, MetamodelError,
    MetamodelHierarchyResolver, MetamodelResult, MetamodelStore, SchemaCacheInvalidator,
};
pub use model::{
    Attribute, AttributePk, Dimension, DimensionPk, Domain, DomainPk, HIERARCHY_SUFFIX,
    MetamodelObject, Metric, MetricPk, Project, ProjectPk, Relation, RelationPk,
};
