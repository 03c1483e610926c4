//! Mutation event -> dependency names to bump

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use super::event::{MutationBus, MutationEvent, MutationKind, ObjectRef};
use super::metamodel::{
    HierarchyResolver, MetamodelHierarchyResolver, MetamodelStore, SchemaCacheInvalidator,
};
use super::model::{
    AttributePk, Dimension, DimensionPk, MetamodelObject, MetricPk, Project, ProjectPk, Relation,
    RelationPk,
};
use crate::keys::KeySynthesizer;

/// Dependency names bumped for one event, sorted and unique
pub type DependencySet = BTreeSet<String>;

/// Outcome of handling one mutation event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invalidation {
    pub dependencies: DependencySet,
    /// Whether the generation bump was applied
    pub applied: bool,
}

/// Translates metamodel mutations into generation bumps.
///
/// Lookups of derived dependencies are best effort: a failed lookup is
/// logged at error level and the dependencies resolved so far are still
/// bumped.
pub struct InvalidationMapper {
    synthesizer: Arc<KeySynthesizer>,
    metamodel: Arc<dyn MetamodelStore>,
    hierarchy: Arc<dyn HierarchyResolver>,
    schema_invalidator: Option<Arc<dyn SchemaCacheInvalidator>>,
}

impl fmt::Debug for InvalidationMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvalidationMapper")
            .field("synthesizer", &self.synthesizer)
            .field("schema_invalidator", &self.schema_invalidator.is_some())
            .finish_non_exhaustive()
    }
}

impl InvalidationMapper {
    pub fn new(synthesizer: Arc<KeySynthesizer>, metamodel: Arc<dyn MetamodelStore>) -> Self {
        let hierarchy = Arc::new(MetamodelHierarchyResolver::new(Arc::clone(&metamodel)));
        Self {
            synthesizer,
            metamodel,
            hierarchy,
            schema_invalidator: None,
        }
    }

    #[must_use]
    pub fn with_hierarchy_resolver(mut self, resolver: Arc<dyn HierarchyResolver>) -> Self {
        self.hierarchy = resolver;
        self
    }

    #[must_use]
    pub fn with_schema_invalidator(mut self, invalidator: Arc<dyn SchemaCacheInvalidator>) -> Self {
        self.schema_invalidator = Some(invalidator);
        self
    }

    /// Handle one event: compute its dependency set and bump it as a batch.
    pub async fn on_mutation(&self, event: &MutationEvent) -> Invalidation {
        let dependencies = self.dependencies(event).await;
        if dependencies.is_empty() {
            return Invalidation {
                dependencies,
                applied: true,
            };
        }

        let names: Vec<String> = dependencies.iter().cloned().collect();
        let applied = self.synthesizer.refresh(&names).await;

        tracing::debug!(
            invalidation.object = ?event.object_type(),
            invalidation.kind = ?event.kind,
            invalidation.count = names.len(),
            invalidation.applied = applied,
            "Handled metamodel mutation"
        );

        Invalidation {
            dependencies,
            applied,
        }
    }

    /// Dependency names affected by `event`, without bumping them.
    pub async fn dependencies(&self, event: &MutationEvent) -> DependencySet {
        let mut deps = DependencySet::new();

        if event.is_cache_irrelevant() {
            tracing::debug!(
                invalidation.object = ?event.object_type(),
                invalidation.origin = ?event.origin,
                "Skipping cache-irrelevant mutation"
            );
            return deps;
        }

        match &event.object {
            ObjectRef::Project(pk) => self.project_dependencies(pk, event, &mut deps).await,
            ObjectRef::Relation(pk) => self.relation_dependencies(pk, event, &mut deps).await,
            ObjectRef::Domain(pk) => {
                deps.insert(pk.to_string());
            }
            ObjectRef::Dimension(pk) => self.dimension_dependencies(pk, event, &mut deps).await,
            ObjectRef::Attribute(pk) => attribute_dependencies(pk, &mut deps),
            ObjectRef::Metric(pk) => metric_dependencies(pk, &mut deps),
            ObjectRef::Job(_) | ObjectRef::State(_) | ObjectRef::Session(_) => {}
        }

        deps
    }

    async fn project_dependencies(
        &self,
        pk: &ProjectPk,
        event: &MutationEvent,
        deps: &mut DependencySet,
    ) {
        match event.kind {
            MutationKind::Create => {}
            MutationKind::Update => {
                if let Some(project) = database_change(pk, event) {
                    self.invalidate_schema(project).await;
                }
                deps.insert(pk.to_string());
            }
            MutationKind::Delete => {
                deps.insert(pk.to_string());
            }
        }
    }

    async fn invalidate_schema(&self, project: &Project) {
        let Some(invalidator) = &self.schema_invalidator else {
            return;
        };
        match invalidator.invalidate_schema(project).await {
            Ok(()) => tracing::info!(
                invalidation.project = %project.pk,
                "Invalidated schema cache after database change"
            ),
            Err(e) => tracing::error!(
                invalidation.project = %project.pk,
                error = %e,
                "Schema cache invalidation failed, schema metadata may be stale"
            ),
        }
    }

    async fn relation_dependencies(
        &self,
        pk: &RelationPk,
        event: &MutationEvent,
        deps: &mut DependencySet,
    ) {
        deps.insert(pk.to_string());
        deps.insert(pk.project.to_string());

        let mut snapshots: Vec<Relation> = event
            .snapshots()
            .filter_map(|object| match object {
                MetamodelObject::Relation(r) if r.pk == *pk => Some(r.clone()),
                _ => None,
            })
            .collect();

        if snapshots.is_empty() {
            match self.metamodel.relation(pk).await {
                Ok(Some(relation)) => snapshots.push(relation),
                Ok(None) => tracing::error!(
                    invalidation.relation = %pk,
                    "Relation not found, endpoint domains not invalidated"
                ),
                Err(e) => tracing::error!(
                    invalidation.relation = %pk,
                    error = %e,
                    "Relation lookup failed, endpoint domains not invalidated"
                ),
            }
        }

        for relation in snapshots {
            deps.insert(relation.left.to_string());
            deps.insert(relation.right.to_string());
        }
    }

    async fn dimension_dependencies(
        &self,
        pk: &DimensionPk,
        event: &MutationEvent,
        deps: &mut DependencySet,
    ) {
        deps.insert(pk.domain.to_string());
        deps.insert(pk.domain.hierarchy_marker());
        deps.insert(pk.to_string());

        let mut snapshots: Vec<Dimension> = event
            .snapshots()
            .filter_map(|object| match object {
                MetamodelObject::Dimension(d) if d.pk == *pk => Some(d.clone()),
                _ => None,
            })
            .collect();

        if snapshots.is_empty() {
            match self.metamodel.dimension(pk).await {
                Ok(Some(dimension)) => snapshots.push(dimension),
                Ok(None) => tracing::error!(
                    invalidation.dimension = %pk,
                    "Dimension not found, hierarchy root not invalidated"
                ),
                Err(e) => tracing::error!(
                    invalidation.dimension = %pk,
                    error = %e,
                    "Dimension lookup failed, hierarchy root not invalidated"
                ),
            }
        }

        let parents: BTreeSet<DimensionPk> =
            snapshots.into_iter().filter_map(|d| d.parent).collect();

        for parent in parents {
            match self.hierarchy.root_of(&parent).await {
                Ok(Some(root)) => {
                    deps.insert(root.to_string());
                }
                Ok(None) => tracing::error!(
                    invalidation.dimension = %pk,
                    invalidation.parent = %parent,
                    "Parent dimension not found, hierarchy root not invalidated"
                ),
                Err(e) => tracing::error!(
                    invalidation.dimension = %pk,
                    invalidation.parent = %parent,
                    error = %e,
                    "Hierarchy root lookup failed, hierarchy root not invalidated"
                ),
            }
        }
    }

    /// Consume events until the channel closes.
    pub async fn run(&self, mut events: broadcast::Receiver<MutationEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => {
                    self.on_mutation(&event).await;
                }
                Err(RecvError::Lagged(missed)) => tracing::error!(
                    invalidation.missed = missed,
                    "Invalidation consumer lagged, missed mutations were not invalidated"
                ),
                Err(RecvError::Closed) => break,
            }
        }
        tracing::debug!("Mutation channel closed, invalidation consumer stopped");
    }

    /// Subscribe to `bus` and handle its events on a background task.
    pub fn spawn(self: Arc<Self>, bus: &MutationBus) -> JoinHandle<()> {
        let events = bus.subscribe();
        tokio::spawn(async move { self.run(events).await })
    }
}

/// New project snapshot when an update moved the project to another database.
fn database_change<'a>(pk: &ProjectPk, event: &'a MutationEvent) -> Option<&'a Project> {
    let project = |object: Option<&'a MetamodelObject>| match object {
        Some(MetamodelObject::Project(p)) if p.pk == *pk => Some(p),
        _ => None,
    };
    let previous = project(event.previous.as_ref())?;
    let current = project(event.current.as_ref())?;
    (previous.database != current.database).then_some(current)
}

fn attribute_dependencies(pk: &AttributePk, deps: &mut DependencySet) {
    deps.insert(pk.dimension.domain.to_string());
    deps.insert(pk.dimension.to_string());
    deps.insert(pk.to_string());
}

fn metric_dependencies(pk: &MetricPk, deps: &mut DependencySet) {
    deps.insert(pk.domain.to_string());
    deps.insert(pk.to_string());
}
