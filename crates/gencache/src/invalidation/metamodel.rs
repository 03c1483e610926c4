//! Metamodel collaborators used for derived-dependency lookups

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;

use super::model::{
    Dimension, DimensionPk, Domain, DomainPk, Project, ProjectPk, Relation, RelationPk,
};

/// Longest parent chain followed before a hierarchy is treated as cyclic
pub const MAX_HIERARCHY_DEPTH: usize = 64;

#[derive(Error, Debug)]
pub enum MetamodelError {
    #[error("Metamodel store unavailable: {0}")]
    Unavailable(String),

    #[error("Metamodel lookup failed: {0}")]
    Other(String),
}

impl MetamodelError {
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

pub type MetamodelResult<T> = std::result::Result<T, MetamodelError>;

/// Read access to the canonical metamodel.
///
/// Lookups are made with root privilege: implementations must not filter
/// objects by caller visibility. An object deleted concurrently is
/// reported as `Ok(None)`, not as an error.
#[async_trait]
pub trait MetamodelStore: Send + Sync {
    async fn project(&self, pk: &ProjectPk) -> MetamodelResult<Option<Project>>;

    async fn domain(&self, pk: &DomainPk) -> MetamodelResult<Option<Domain>>;

    async fn dimension(&self, pk: &DimensionPk) -> MetamodelResult<Option<Dimension>>;

    async fn relation(&self, pk: &RelationPk) -> MetamodelResult<Option<Relation>>;
}

/// Resolves the root of a dimension hierarchy.
#[async_trait]
pub trait HierarchyResolver: Send + Sync {
    /// Root dimension of the hierarchy containing `dimension`, which is
    /// `dimension` itself when it has no parent. `None` if it no longer exists.
    async fn root_of(&self, dimension: &DimensionPk) -> MetamodelResult<Option<DimensionPk>>;
}

/// Invalidates cached database schema metadata for a project whose
/// physical backing database changed.
#[async_trait]
pub trait SchemaCacheInvalidator: Send + Sync {
    async fn invalidate_schema(&self, project: &Project) -> MetamodelResult<()>;
}

/// [`HierarchyResolver`] that follows parent links through a [`MetamodelStore`].
pub struct MetamodelHierarchyResolver {
    store: Arc<dyn MetamodelStore>,
    max_depth: usize,
}

impl fmt::Debug for MetamodelHierarchyResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetamodelHierarchyResolver")
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

impl MetamodelHierarchyResolver {
    pub fn new(store: Arc<dyn MetamodelStore>) -> Self {
        Self {
            store,
            max_depth: MAX_HIERARCHY_DEPTH,
        }
    }

    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

#[async_trait]
impl HierarchyResolver for MetamodelHierarchyResolver {
    async fn root_of(&self, dimension: &DimensionPk) -> MetamodelResult<Option<DimensionPk>> {
        let mut current = dimension.clone();

        for _ in 0..=self.max_depth {
            let Some(found) = self.store.dimension(&current).await? else {
                return Ok(None);
            };
            match found.parent {
                Some(parent) => current = parent,
                None => return Ok(Some(current)),
            }
        }

        Err(MetamodelError::Other(format!(
            "hierarchy of {dimension} exceeds {} levels",
            self.max_depth
        )))
    }
}

/// In-process [`MetamodelStore`]
#[derive(Debug, Default)]
pub struct InMemoryMetamodel {
    projects: RwLock<HashMap<ProjectPk, Project>>,
    domains: RwLock<HashMap<DomainPk, Domain>>,
    dimensions: RwLock<HashMap<DimensionPk, Dimension>>,
    relations: RwLock<HashMap<RelationPk, Relation>>,
}

impl InMemoryMetamodel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_project(&self, project: Project) {
        self.projects.write().insert(project.pk.clone(), project);
    }

    pub fn put_domain(&self, domain: Domain) {
        self.domains.write().insert(domain.pk.clone(), domain);
    }

    pub fn put_dimension(&self, dimension: Dimension) {
        self.dimensions.write().insert(dimension.pk.clone(), dimension);
    }

    pub fn put_relation(&self, relation: Relation) {
        self.relations.write().insert(relation.pk.clone(), relation);
    }

    pub fn remove_dimension(&self, pk: &DimensionPk) -> Option<Dimension> {
        self.dimensions.write().remove(pk)
    }

    pub fn remove_relation(&self, pk: &RelationPk) -> Option<Relation> {
        self.relations.write().remove(pk)
    }
}

#[async_trait]
impl MetamodelStore for InMemoryMetamodel {
    async fn project(&self, pk: &ProjectPk) -> MetamodelResult<Option<Project>> {
        Ok(self.projects.read().get(pk).cloned())
    }

    async fn domain(&self, pk: &DomainPk) -> MetamodelResult<Option<Domain>> {
        Ok(self.domains.read().get(pk).cloned())
    }

    async fn dimension(&self, pk: &DimensionPk) -> MetamodelResult<Option<Dimension>> {
        Ok(self.dimensions.read().get(pk).cloned())
    }

    async fn relation(&self, pk: &RelationPk) -> MetamodelResult<Option<Relation>> {
        Ok(self.relations.read().get(pk).cloned())
    }
}
